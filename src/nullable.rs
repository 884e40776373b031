//! Tri-state optional values for numeric and temporal GPX fields.
//!
//! GPX producers are zero-value sensitive: `<ele>0</ele>` (sea level) and a
//! missing `<ele>` mean different things, so every optional number or
//! timestamp in the model is a [`Nullable`] rather than a bare value.

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// A value that is either absent or present.
///
/// Presence and payload live in one `Option`, so clearing a value can never
/// leave a stale payload behind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Nullable<T>(Option<T>);

impl<T> Nullable<T> {
    pub const fn new(value: T) -> Self {
        Self(Some(value))
    }

    pub const fn absent() -> Self {
        Self(None)
    }

    pub fn is_absent(&self) -> bool {
        self.0.is_none()
    }

    pub fn is_present(&self) -> bool {
        self.0.is_some()
    }

    pub fn set(&mut self, value: T) {
        self.0 = Some(value);
    }

    pub fn clear(&mut self) {
        self.0 = None;
    }

    pub fn get(&self) -> Option<&T> {
        self.0.as_ref()
    }

    pub fn get_mut(&mut self) -> Option<&mut T> {
        self.0.as_mut()
    }

    pub fn into_option(self) -> Option<T> {
        self.0
    }
}

impl<T: Copy> Nullable<T> {
    pub fn value(&self) -> Option<T> {
        self.0
    }

    /// The payload, or `default` when absent.
    pub fn value_or(&self, default: T) -> T {
        self.0.unwrap_or(default)
    }
}

impl<T> Default for Nullable<T> {
    fn default() -> Self {
        Self(None)
    }
}

impl<T> From<T> for Nullable<T> {
    fn from(value: T) -> Self {
        Self(Some(value))
    }
}

impl<T> From<Option<T>> for Nullable<T> {
    fn from(value: Option<T>) -> Self {
        Self(value)
    }
}

/// Textual form of a value as it appears in GPX element content.
pub trait WireValue: Sized {
    fn to_wire(&self) -> String;

    /// `None` when the text cannot be interpreted.
    fn from_wire(text: &str) -> Option<Self>;
}

impl WireValue for f64 {
    /// Shortest decimal that parses back to the same `f64`, no exponent.
    fn to_wire(&self) -> String {
        format!("{self}")
    }

    fn from_wire(text: &str) -> Option<Self> {
        text.trim().parse::<f64>().ok().filter(|v| v.is_finite())
    }
}

impl WireValue for i64 {
    fn to_wire(&self) -> String {
        self.to_string()
    }

    /// Accepts a decimal fraction (`"4.0"`) and truncates it.
    fn from_wire(text: &str) -> Option<Self> {
        let text = text.trim();
        text.parse::<i64>().ok().or_else(|| {
            text.parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
                .map(|v| v.trunc() as i64)
        })
    }
}

impl WireValue for DateTime<Utc> {
    fn to_wire(&self) -> String {
        self.to_rfc3339_opts(SecondsFormat::AutoSi, true)
    }

    fn from_wire(text: &str) -> Option<Self> {
        parse_time(text)
    }
}

/// Parses an RFC 3339 timestamp, treating a missing offset as UTC.
pub fn parse_time(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();
    if let Ok(t) = DateTime::parse_from_rfc3339(text) {
        return Some(t.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

impl<T: WireValue> Nullable<T> {
    /// Absent when the text is unparsable.
    pub fn parse(text: &str) -> Self {
        Self(T::from_wire(text))
    }

    /// `None` when absent, so callers skip the element entirely.
    pub fn format(&self) -> Option<String> {
        self.0.as_ref().map(WireValue::to_wire)
    }
}
