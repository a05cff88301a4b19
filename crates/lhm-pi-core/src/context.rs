use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;
use url::form_urlencoded;

use crate::normalize::parse_object_or_empty;

pub const DEFAULT_ACTION: &str = "com.moeilijk.lhm.settings";
pub const DEFAULT_REGISTER_EVENT: &str = "registerPropertyInspector";

/// Identifier used to address messages for this panel instance.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionContext(String);

impl SessionContext {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Which identifier panel-local messages carry in their `context` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AddressingPolicy {
    /// The context resolved from action info, query, then registration id.
    #[default]
    ResolvedContext,
    /// Always the panel's own registration id.
    RegistrationId,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams(HashMap<String, String>);

impl QueryParams {
    /// Accepts `?a=b&c=d` or `a=b&c=d`. The first occurrence of a key wins.
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim().trim_start_matches('?');
        let mut params = HashMap::new();
        for (key, value) in form_urlencoded::parse(trimmed.as_bytes()) {
            params
                .entry(key.into_owned())
                .or_insert_with(|| value.into_owned());
        }
        Self(params)
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }
}

/// Values handed over by the host when it launches the panel.
#[derive(Debug, Clone, Default)]
pub struct ConnectionParams {
    pub port: u16,
    pub registration_id: String,
    pub register_event: String,
    pub info: Map<String, Value>,
    pub action_info: Map<String, Value>,
    pub query: QueryParams,
}

impl ConnectionParams {
    pub fn from_raw(
        port: u16,
        registration_id: &str,
        register_event: &str,
        raw_info: &str,
        raw_action_info: &str,
        raw_query: &str,
    ) -> Self {
        let register_event = if register_event.trim().is_empty() {
            DEFAULT_REGISTER_EVENT.to_string()
        } else {
            register_event.to_string()
        };
        Self {
            port,
            registration_id: registration_id.to_string(),
            register_event,
            info: parse_object_or_empty(raw_info).into_object(),
            action_info: parse_object_or_empty(raw_action_info).into_object(),
            query: QueryParams::parse(raw_query),
        }
    }

    pub fn resolve_context(&self) -> Option<SessionContext> {
        resolve_context(&self.action_info, &self.registration_id, &self.query)
    }

    pub fn resolve_action(&self) -> String {
        resolve_action(&self.action_info, &self.query)
    }

    /// Host application version from the info blob, when present.
    pub fn host_version(&self) -> Option<&str> {
        self.info
            .get("application")
            .and_then(|app| app.get("version"))
            .and_then(Value::as_str)
    }
}

fn non_empty(value: Option<&Value>) -> Option<&str> {
    value
        .and_then(Value::as_str)
        .filter(|text| !text.trim().is_empty())
}

pub fn resolve_context(
    action_info: &Map<String, Value>,
    registration_id: &str,
    query: &QueryParams,
) -> Option<SessionContext> {
    if let Some(value) = non_empty(action_info.get("payload").and_then(|p| p.get("context"))) {
        return Some(SessionContext::new(value));
    }
    if let Some(value) = non_empty(action_info.get("context")) {
        return Some(SessionContext::new(value));
    }
    if let Some(value) = query.get("context").filter(|v| !v.trim().is_empty()) {
        return Some(SessionContext::new(value));
    }
    if !registration_id.trim().is_empty() {
        return Some(SessionContext::new(registration_id));
    }
    None
}

pub fn resolve_action(action_info: &Map<String, Value>, query: &QueryParams) -> String {
    if let Some(value) = non_empty(action_info.get("action")) {
        return value.to_string();
    }
    if let Some(value) = query.get("action").filter(|v| !v.trim().is_empty()) {
        return value.to_string();
    }
    DEFAULT_ACTION.to_string()
}
