//! Fragment / Record - field-keyed event data
//!
//! Producers push partial [`Fragment`]s; the throttler merges them
//! last-write-wins into a pending [`Record`] and emits a detached copy.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Rate indicator injected into every record that lacks one
pub const FIELD_THROTTLE_MS: &str = "currentThrottleMs";

/// Marker carried by synthetic mode-change fragments
pub const FIELD_MODE_CHANGE: &str = "adaptiveModeChange";

/// Timestamp field (epoch milliseconds)
pub const FIELD_TIMESTAMP: &str = "ts";

/// Flat coalesced record handed to output sinks
pub type Record = BTreeMap<String, FieldValue>;

/// Scalar field value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl FieldValue {
    /// Numeric view (integers widen to f64)
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(v) => Some(*v as f64),
            Self::Float(v) => Some(*v),
            _ => None,
        }
    }

    /// Integer view (floats are not truncated)
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(v) => Some(*v),
            _ => None,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(v) => write!(f, "{v}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Text(v) => write!(f, "{v}"),
        }
    }
}

impl From<bool> for FieldValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i32> for FieldValue {
    fn from(v: i32) -> Self {
        Self::Int(v as i64)
    }
}

impl From<i64> for FieldValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<u64> for FieldValue {
    fn from(v: u64) -> Self {
        Self::Int(i64::try_from(v).unwrap_or(i64::MAX))
    }
}

impl From<f32> for FieldValue {
    fn from(v: f32) -> Self {
        Self::Float(v as f64)
    }
}

impl From<f64> for FieldValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for FieldValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

/// Partial event update
///
/// A fragment may carry only orientation fields, only location fields,
/// or only a mode-change marker. Fields merge last-write-wins.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fragment {
    fields: BTreeMap<String, FieldValue>,
}

impl Fragment {
    /// Create an empty fragment
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style field insertion
    pub fn with(mut self, name: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.insert(name, value);
        self
    }

    /// Attach the `ts` field (epoch milliseconds)
    pub fn with_timestamp(self, epoch_ms: i64) -> Self {
        self.with(FIELD_TIMESTAMP, epoch_ms)
    }

    /// Insert or overwrite a field
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<FieldValue>) {
        self.fields.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Iterate fields in name order
    pub fn iter(&self) -> impl Iterator<Item = (&String, &FieldValue)> {
        self.fields.iter()
    }

    /// Merge into `record`, overwriting existing fields
    pub fn merge_into(self, record: &mut Record) {
        record.extend(self.fields);
    }
}

impl<K, V> FromIterator<(K, V)> for Fragment
where
    K: Into<String>,
    V: Into<FieldValue>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            fields: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

impl From<Record> for Fragment {
    fn from(fields: Record) -> Self {
        Self { fields }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_last_write_wins() {
        let mut record = Record::new();
        Fragment::new()
            .with("heading", 10.0)
            .with("pitch", 1.0)
            .merge_into(&mut record);
        Fragment::new().with("heading", 12.0).merge_into(&mut record);

        assert_eq!(record.get("heading"), Some(&FieldValue::Float(12.0)));
        assert_eq!(record.get("pitch"), Some(&FieldValue::Float(1.0)));
    }

    #[test]
    fn test_field_value_json_shape() {
        let record: Record = Fragment::new()
            .with("lat", 1.5)
            .with(FIELD_THROTTLE_MS, 100i64)
            .with(FIELD_MODE_CHANGE, "static")
            .with("fresh", true)
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        let json = serde_json::to_string(&record).unwrap();
        assert_eq!(
            json,
            r#"{"adaptiveModeChange":"static","currentThrottleMs":100,"fresh":true,"lat":1.5}"#
        );

        let back: Record = serde_json::from_str(&json).unwrap();
        assert_eq!(back.get(FIELD_THROTTLE_MS), Some(&FieldValue::Int(100)));
    }

    #[test]
    fn test_numeric_views() {
        assert_eq!(FieldValue::Int(3).as_f64(), Some(3.0));
        assert_eq!(FieldValue::Float(3.5).as_i64(), None);
        assert_eq!(FieldValue::from("x").as_str(), Some("x"));
        assert_eq!(FieldValue::from(u64::MAX), FieldValue::Int(i64::MAX));
    }

    #[test]
    fn test_from_iterator() {
        let fragment: Fragment = [("a", 1i64), ("b", 2i64)].into_iter().collect();
        assert_eq!(fragment.len(), 2);
        assert!(fragment.contains("b"));
    }
}
