use serde::Serialize;
use serde_json::{Map, Value};

use crate::appearance::AppearanceSettings;
use crate::normalize::{normalize_interval_value, parse_object_or_empty, PollInterval};

pub const EVENT_GET_GLOBAL_SETTINGS: &str = "getGlobalSettings";
pub const EVENT_GET_SETTINGS: &str = "getSettings";
pub const EVENT_SET_GLOBAL_SETTINGS: &str = "setGlobalSettings";
pub const EVENT_SET_SETTINGS: &str = "setSettings";
pub const EVENT_SEND_TO_PLUGIN: &str = "sendToPlugin";

pub const EVENT_DID_RECEIVE_GLOBAL_SETTINGS: &str = "didReceiveGlobalSettings";
pub const EVENT_DID_RECEIVE_SETTINGS: &str = "didReceiveSettings";
pub const EVENT_SEND_TO_PROPERTY_INSPECTOR: &str = "sendToPropertyInspector";

pub const CONNECTED_STATUS: &str = "Connected";
pub const STATUS_OK_TINT: &str = "#4a4";
pub const STATUS_ERROR_TINT: &str = "#a44";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutboundMessage {
    pub event: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uuid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
}

/// Payloads understood by the controller on `sendToPlugin`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum PluginPayload {
    SettingsConnected(bool),
    SetPollInterval(PollInterval),
    UpdateTileAppearance(AppearanceSettings),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
struct GlobalSettingsPayload {
    poll_interval: PollInterval,
}

fn to_payload<T: Serialize>(value: &T) -> Option<Value> {
    serde_json::to_value(value).ok()
}

impl OutboundMessage {
    fn new(event: &str) -> Self {
        Self {
            event: event.to_string(),
            uuid: None,
            action: None,
            context: None,
            payload: None,
        }
    }

    fn with_context(mut self, context: &str) -> Self {
        self.context = Some(context.to_string());
        self
    }

    pub fn register(register_event: &str, registration_id: &str) -> Self {
        Self {
            uuid: Some(registration_id.to_string()),
            ..Self::new(register_event)
        }
    }

    pub fn get_global_settings(registration_id: &str) -> Self {
        Self::new(EVENT_GET_GLOBAL_SETTINGS).with_context(registration_id)
    }

    pub fn get_settings(context: &str) -> Self {
        Self::new(EVENT_GET_SETTINGS).with_context(context)
    }

    pub fn set_global_settings(registration_id: &str, interval: PollInterval) -> Self {
        Self {
            payload: to_payload(&GlobalSettingsPayload {
                poll_interval: interval,
            }),
            ..Self::new(EVENT_SET_GLOBAL_SETTINGS).with_context(registration_id)
        }
    }

    pub fn set_settings(context: &str, settings: &AppearanceSettings) -> Self {
        Self {
            payload: to_payload(settings),
            ..Self::new(EVENT_SET_SETTINGS).with_context(context)
        }
    }

    pub fn send_to_plugin(action: &str, context: &str, payload: &PluginPayload) -> Self {
        Self {
            action: Some(action.to_string()),
            payload: to_payload(payload),
            ..Self::new(EVENT_SEND_TO_PLUGIN).with_context(context)
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Inbound traffic after classification. Anything unusable becomes `Ignored`.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundEvent {
    GlobalSettings {
        poll_interval: PollInterval,
    },
    PanelSettings {
        settings: Map<String, Value>,
    },
    Status {
        connection_status: Option<String>,
        current_rate: Option<String>,
    },
    Ignored {
        event: Option<String>,
    },
}

fn settings_object(message: &Map<String, Value>) -> Map<String, Value> {
    match message.get("payload").and_then(|payload| payload.get("settings")) {
        Some(Value::Object(settings)) => settings.clone(),
        _ => Map::new(),
    }
}

fn is_falsy(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(flag) => !flag,
        Value::Number(number) => number.as_f64() == Some(0.0),
        Value::String(text) => text.is_empty(),
        _ => false,
    }
}

/// Text a display shows for an arbitrary JSON scalar.
pub fn display_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

/// Like [`display_text`], but a `null` status clears the display.
pub fn status_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        other => display_text(other),
    }
}

pub fn classify_inbound(raw: &str) -> InboundEvent {
    let message = parse_object_or_empty(raw).into_object();
    let event = message.get("event").and_then(Value::as_str);
    match event {
        Some(EVENT_DID_RECEIVE_GLOBAL_SETTINGS) => {
            let settings = settings_object(&message);
            let poll_interval = match settings.get("pollInterval") {
                Some(value) if !is_falsy(value) => normalize_interval_value(value),
                _ => PollInterval::DEFAULT,
            };
            InboundEvent::GlobalSettings { poll_interval }
        }
        Some(EVENT_DID_RECEIVE_SETTINGS) => InboundEvent::PanelSettings {
            settings: settings_object(&message),
        },
        Some(EVENT_SEND_TO_PROPERTY_INSPECTOR) => {
            let payload = message.get("payload");
            let field = |name: &str| payload.and_then(|payload| payload.get(name));
            InboundEvent::Status {
                connection_status: field("connectionStatus").map(status_text),
                current_rate: field("currentRate").map(display_text),
            }
        }
        other => InboundEvent::Ignored {
            event: other.map(str::to_string),
        },
    }
}
