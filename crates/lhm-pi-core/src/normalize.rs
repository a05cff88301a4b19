use regex::Regex;
use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt;
use std::sync::OnceLock;

use crate::appearance::AppearanceSettings;
use crate::panel::{Field, Panel};

pub const ALLOWED_INTERVALS_MS: [u32; 6] = [250, 500, 1000, 2000, 5000, 10000];
pub const DEFAULT_INTERVAL_MS: u32 = 1000;

pub const DEFAULT_BACKGROUND: &str = "#000000";
pub const DEFAULT_TEXT_COLOR: &str = "#ffffff";

/// Poll interval in milliseconds, always a member of [`ALLOWED_INTERVALS_MS`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct PollInterval(u32);

impl PollInterval {
    pub const DEFAULT: Self = Self(DEFAULT_INTERVAL_MS);

    pub fn millis(self) -> u32 {
        self.0
    }

    /// Text shown in the rate display, e.g. `1000ms`.
    pub fn rate_label(self) -> String {
        format!("{}ms", self.0)
    }
}

impl Default for PollInterval {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl fmt::Display for PollInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Canonical `#rrggbb` colour, lower-cased.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Color(String);

impl Color {
    pub fn parse(raw: &str) -> Option<Self> {
        canonical_hex(raw)
    }

    pub fn default_background() -> Self {
        Self(DEFAULT_BACKGROUND.to_string())
    }

    pub fn default_text() -> Self {
        Self(DEFAULT_TEXT_COLOR.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn hex_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^#[0-9a-f]{6}$").expect("static hex pattern"))
}

fn canonical_hex(raw: &str) -> Option<Color> {
    let lowered = raw.trim().to_lowercase();
    if hex_pattern().is_match(&lowered) {
        Some(Color(lowered))
    } else {
        None
    }
}

/// Parses with leading-integer semantics: surrounding whitespace and trailing junk are
/// tolerated, `"2000ms"` reads as 2000.
pub fn parse_leading_int(raw: &str) -> Option<i64> {
    let trimmed = raw.trim_start();
    let (negative, digits) = match trimmed.as_bytes().first() {
        Some(b'-') => (true, &trimmed[1..]),
        Some(b'+') => (false, &trimmed[1..]),
        _ => (false, trimmed),
    };
    let end = digits
        .char_indices()
        .find(|(_, ch)| !ch.is_ascii_digit())
        .map(|(idx, _)| idx)
        .unwrap_or(digits.len());
    if end == 0 {
        return None;
    }
    // Only ASCII digits remain, so a parse failure means overflow.
    let magnitude = digits[..end].parse::<i64>().unwrap_or(i64::MAX);
    Some(if negative { -magnitude } else { magnitude })
}

/// Snaps any integer onto the allowed set. Ties resolve to the lower member.
pub fn snap_interval(value: i64) -> PollInterval {
    if let Some(exact) = ALLOWED_INTERVALS_MS
        .iter()
        .copied()
        .find(|allowed| i64::from(*allowed) == value)
    {
        return PollInterval(exact);
    }
    let mut nearest = ALLOWED_INTERVALS_MS[0];
    let mut nearest_diff = value.abs_diff(i64::from(nearest));
    for allowed in ALLOWED_INTERVALS_MS.iter().copied().skip(1) {
        let diff = value.abs_diff(i64::from(allowed));
        if diff < nearest_diff {
            nearest = allowed;
            nearest_diff = diff;
        }
    }
    PollInterval(nearest)
}

pub fn normalize_interval(raw: &str) -> PollInterval {
    match parse_leading_int(raw) {
        Some(value) => snap_interval(value),
        None => PollInterval::DEFAULT,
    }
}

/// Interval coming from JSON. Numbers are truncated, strings go through
/// [`normalize_interval`], anything else is the default.
pub fn normalize_interval_value(value: &Value) -> PollInterval {
    match value {
        Value::Number(number) => {
            if let Some(int) = number.as_i64() {
                snap_interval(int)
            } else if let Some(float) = number.as_f64().filter(|f| f.is_finite()) {
                snap_interval(float.trunc() as i64)
            } else {
                PollInterval::DEFAULT
            }
        }
        Value::String(text) => normalize_interval(text),
        _ => PollInterval::DEFAULT,
    }
}

pub fn normalize_color(raw: &str, fallback: &Color) -> Color {
    canonical_hex(raw).unwrap_or_else(|| fallback.clone())
}

pub fn normalize_color_value(value: Option<&Value>, fallback: &Color) -> Color {
    match value {
        Some(Value::String(text)) => normalize_color(text, fallback),
        _ => fallback.clone(),
    }
}

/// Absent means shown; otherwise only a literal `true` counts.
pub fn normalize_flag(value: Option<&Value>) -> bool {
    match value {
        None => true,
        Some(value) => matches!(value, Value::Bool(true)),
    }
}

pub fn read_current_appearance<P: Panel + ?Sized>(panel: &P) -> AppearanceSettings {
    let background = panel.value(Field::TileBackground);
    let text = panel.value(Field::TileTextColor);
    let show = panel.checked(Field::ShowLabel);
    match (background, text, show) {
        (Some(background), Some(text), Some(show)) => AppearanceSettings {
            tile_background: normalize_color(&background, &Color::default_background()),
            tile_text_color: normalize_color(&text, &Color::default_text()),
            show_label: show,
        },
        _ => AppearanceSettings::default(),
    }
}

/// Result of [`parse_object_or_empty`]. Never an error: unusable input is `Defaulted`.
#[derive(Debug, Clone, PartialEq)]
pub enum ParseOutcome {
    Parsed(Map<String, Value>),
    Defaulted,
}

impl ParseOutcome {
    pub fn is_parsed(&self) -> bool {
        matches!(self, ParseOutcome::Parsed(_))
    }

    pub fn into_object(self) -> Map<String, Value> {
        match self {
            ParseOutcome::Parsed(map) => map,
            ParseOutcome::Defaulted => Map::new(),
        }
    }
}

pub fn parse_object_or_empty(raw: &str) -> ParseOutcome {
    if raw.trim().is_empty() {
        return ParseOutcome::Defaulted;
    }
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(map)) => ParseOutcome::Parsed(map),
        _ => ParseOutcome::Defaulted,
    }
}
