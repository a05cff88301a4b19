use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt;

use crate::normalize::{normalize_color_value, normalize_flag, read_current_appearance, Color};
use crate::panel::{Field, Panel};

const SIGNATURE_SEPARATOR: &str = "|";

/// Tile appearance as persisted by the controller.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct AppearanceSettings {
    #[serde(rename = "tileBackground")]
    pub tile_background: Color,
    #[serde(rename = "tileTextColor")]
    pub tile_text_color: Color,
    #[serde(rename = "showLabel")]
    pub show_label: bool,
}

impl Default for AppearanceSettings {
    fn default() -> Self {
        Self {
            tile_background: Color::default_background(),
            tile_text_color: Color::default_text(),
            show_label: true,
        }
    }
}

impl AppearanceSettings {
    /// Lenient read of an inbound settings object. Bad or missing members fall back.
    pub fn from_wire(settings: &Map<String, Value>) -> Self {
        Self {
            tile_background: normalize_color_value(
                settings.get("tileBackground"),
                &Color::default_background(),
            ),
            tile_text_color: normalize_color_value(
                settings.get("tileTextColor"),
                &Color::default_text(),
            ),
            show_label: normalize_flag(settings.get("showLabel")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Signature(String);

impl Signature {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

pub fn signature_of(settings: &AppearanceSettings) -> Signature {
    let flag = if settings.show_label { "1" } else { "0" };
    Signature(
        [
            settings.tile_background.as_str(),
            settings.tile_text_color.as_str(),
            flag,
        ]
        .join(SIGNATURE_SEPARATOR),
    )
}

/// Writes inbound appearance into the form, touching only fields whose value differs, and
/// returns the signature of what the form now holds. `None` when the form is not rendered.
pub fn apply_appearance<P: Panel + ?Sized>(
    panel: &mut P,
    settings: &Map<String, Value>,
) -> Option<Signature> {
    let current_background = panel.value(Field::TileBackground)?;
    let current_text = panel.value(Field::TileTextColor)?;
    let current_show = panel.checked(Field::ShowLabel)?;

    let incoming = AppearanceSettings::from_wire(settings);
    if current_background != incoming.tile_background.as_str() {
        panel.set_value(Field::TileBackground, incoming.tile_background.as_str());
    }
    if current_text != incoming.tile_text_color.as_str() {
        panel.set_value(Field::TileTextColor, incoming.tile_text_color.as_str());
    }
    if current_show != incoming.show_label {
        panel.set_checked(Field::ShowLabel, incoming.show_label);
    }

    Some(signature_of(&read_current_appearance(&*panel)))
}
