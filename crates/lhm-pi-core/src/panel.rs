use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Editable form fields, named by their element ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Field {
    PollInterval,
    TileBackground,
    TileTextColor,
    ShowLabel,
}

impl Field {
    pub const ALL: [Field; 4] = [
        Field::PollInterval,
        Field::TileBackground,
        Field::TileTextColor,
        Field::ShowLabel,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Field::PollInterval => "pollInterval",
            Field::TileBackground => "tileBackground",
            Field::TileTextColor => "tileTextColor",
            Field::ShowLabel => "showLabel",
        }
    }

    pub fn is_checkbox(&self) -> bool {
        matches!(self, Field::ShowLabel)
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Field {
    type Err = String;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        match input.trim() {
            "pollInterval" => Ok(Field::PollInterval),
            "tileBackground" => Ok(Field::TileBackground),
            "tileTextColor" => Ok(Field::TileTextColor),
            "showLabel" => Ok(Field::ShowLabel),
            other => Err(format!("Unknown field: {other}")),
        }
    }
}

/// Read-only text displays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Display {
    CurrentRate,
    ConnectionStatus,
}

impl Display {
    pub fn as_str(&self) -> &'static str {
        match self {
            Display::CurrentRate => "currentRate",
            Display::ConnectionStatus => "connectionStatus",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UiEventKind {
    Change,
    Input,
    Click,
}

impl FromStr for UiEventKind {
    type Err = String;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        match input.trim() {
            "change" => Ok(UiEventKind::Change),
            "input" => Ok(UiEventKind::Input),
            "click" => Ok(UiEventKind::Click),
            other => Err(format!("Unknown event kind: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UiEvent {
    pub field: Field,
    pub kind: UiEventKind,
}

impl UiEvent {
    pub fn new(field: Field, kind: UiEventKind) -> Self {
        Self { field, kind }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditValue {
    Text(String),
    Checked(bool),
    Toggle,
}

/// A user edit: write a value into a field, then optionally fire an event for it.
/// `event: None` models a widget that changed without reporting it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldEdit {
    pub field: Field,
    pub value: EditValue,
    pub event: Option<UiEventKind>,
}

impl FieldEdit {
    pub fn apply<P: Panel + ?Sized>(&self, panel: &mut P) {
        match &self.value {
            EditValue::Text(text) => panel.set_value(self.field, text),
            EditValue::Checked(checked) => panel.set_checked(self.field, *checked),
            EditValue::Toggle => {
                if let Some(checked) = panel.checked(self.field) {
                    panel.set_checked(self.field, !checked);
                }
            }
        }
    }

    pub fn ui_event(&self) -> Option<UiEvent> {
        self.event.map(|kind| UiEvent::new(self.field, kind))
    }
}

/// The rendered form as seen by the session. Every accessor returns `None` for an element
/// that is not rendered, and writers silently skip missing elements.
pub trait Panel {
    fn value(&self, field: Field) -> Option<String>;
    fn set_value(&mut self, field: Field, value: &str);
    fn checked(&self, field: Field) -> Option<bool>;
    fn set_checked(&mut self, field: Field, checked: bool);
    fn set_text(&mut self, display: Display, text: &str);
    fn set_tint(&mut self, display: Display, color: &str);

    fn has_field(&self, field: Field) -> bool {
        if field.is_checkbox() {
            self.checked(field).is_some()
        } else {
            self.value(field).is_some()
        }
    }

    fn is_rendered(&self) -> bool {
        Field::ALL.iter().all(|field| self.has_field(*field))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DisplayState {
    pub text: String,
    pub tint: Option<String>,
}

/// In-memory form. Counts field writes so callers can tell redundant writes apart.
#[derive(Debug, Clone, Default)]
pub struct MemoryPanel {
    pub poll_interval: Option<String>,
    pub tile_background: Option<String>,
    pub tile_text_color: Option<String>,
    pub show_label: Option<bool>,
    pub current_rate: Option<DisplayState>,
    pub connection_status: Option<DisplayState>,
    pub field_writes: usize,
}

impl MemoryPanel {
    /// Fully rendered form with the initial values of the settings page.
    pub fn new() -> Self {
        Self {
            poll_interval: Some("1000".to_string()),
            tile_background: Some("#000000".to_string()),
            tile_text_color: Some("#ffffff".to_string()),
            show_label: Some(true),
            current_rate: Some(DisplayState::default()),
            connection_status: Some(DisplayState::default()),
            field_writes: 0,
        }
    }

    /// Form whose elements do not exist yet.
    pub fn unrendered() -> Self {
        Self::default()
    }

    fn slot(&mut self, field: Field) -> Option<&mut Option<String>> {
        match field {
            Field::PollInterval => Some(&mut self.poll_interval),
            Field::TileBackground => Some(&mut self.tile_background),
            Field::TileTextColor => Some(&mut self.tile_text_color),
            Field::ShowLabel => None,
        }
    }

    fn display_mut(&mut self, display: Display) -> Option<&mut DisplayState> {
        match display {
            Display::CurrentRate => self.current_rate.as_mut(),
            Display::ConnectionStatus => self.connection_status.as_mut(),
        }
    }

    pub fn display(&self, display: Display) -> Option<&DisplayState> {
        match display {
            Display::CurrentRate => self.current_rate.as_ref(),
            Display::ConnectionStatus => self.connection_status.as_ref(),
        }
    }
}

impl Panel for MemoryPanel {
    fn value(&self, field: Field) -> Option<String> {
        match field {
            Field::PollInterval => self.poll_interval.clone(),
            Field::TileBackground => self.tile_background.clone(),
            Field::TileTextColor => self.tile_text_color.clone(),
            Field::ShowLabel => self.show_label.map(|checked| checked.to_string()),
        }
    }

    fn set_value(&mut self, field: Field, value: &str) {
        let written = match self.slot(field) {
            Some(Some(current)) => {
                *current = value.to_string();
                true
            }
            _ => false,
        };
        if written {
            self.field_writes += 1;
        }
    }

    fn checked(&self, field: Field) -> Option<bool> {
        match field {
            Field::ShowLabel => self.show_label,
            _ => None,
        }
    }

    fn set_checked(&mut self, field: Field, checked: bool) {
        if field == Field::ShowLabel {
            if let Some(current) = self.show_label.as_mut() {
                *current = checked;
                self.field_writes += 1;
            }
        }
    }

    fn set_text(&mut self, display: Display, text: &str) {
        if let Some(state) = self.display_mut(display) {
            state.text = text.to_string();
        }
    }

    fn set_tint(&mut self, display: Display, color: &str) {
        if let Some(state) = self.display_mut(display) {
            state.tint = Some(color.to_string());
        }
    }
}
