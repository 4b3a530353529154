//! Pin state types

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Function and level of one BCM pin, as last reported by the device
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct PinState {
    /// Function token ("IN", "OUT", "PWM", ...)
    pub function: String,
    /// Level as a string ("0" / "1")
    #[serde(deserialize_with = "string_or_scalar")]
    pub value: String,
}

impl PinState {
    pub fn new(function: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            function: function.into(),
            value: value.into(),
        }
    }

    /// Read one field
    pub fn get(&self, field: PinField) -> &str {
        match field {
            PinField::Function => &self.function,
            PinField::Value => &self.value,
        }
    }

    fn set(&mut self, field: PinField, new_value: String) {
        match field {
            PinField::Function => self.function = new_value,
            PinField::Value => self.value = new_value,
        }
    }
}

/// Field addressed by a single-pin REST call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinField {
    Function,
    Value,
}

impl PinField {
    /// Resource segment in `/GPIO/{id}/{segment}`
    pub fn segment(self) -> &'static str {
        match self {
            PinField::Function => "function",
            PinField::Value => "value",
        }
    }
}

/// Map of BCM id to pin state
pub type PinMap = BTreeMap<String, PinState>;

/// Immutable view of all pins from one refresh
///
/// Cloning is an `Arc` bump; patches go through copy-on-write.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    pins: Arc<PinMap>,
}

impl Snapshot {
    pub fn new(pins: PinMap) -> Self {
        Self {
            pins: Arc::new(pins),
        }
    }

    pub fn get(&self, bcm: &str) -> Option<&PinState> {
        self.pins.get(bcm)
    }

    pub fn contains(&self, bcm: &str) -> bool {
        self.pins.contains_key(bcm)
    }

    pub fn len(&self) -> usize {
        self.pins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pins.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.pins.keys().map(String::as_str)
    }

    /// Update one field of an existing pin, returns false if the pin is unknown
    pub(super) fn patch(&mut self, bcm: &str, field: PinField, new_value: String) -> bool {
        if !self.pins.contains_key(bcm) {
            return false;
        }
        match Arc::make_mut(&mut self.pins).get_mut(bcm) {
            Some(pin) => {
                pin.set(field, new_value);
                true
            }
            None => false,
        }
    }
}

impl From<PinMap> for Snapshot {
    fn from(pins: PinMap) -> Self {
        Self::new(pins)
    }
}

/// WebIOPi reports levels as numbers, older builds as strings
fn string_or_scalar<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Scalar {
        Text(String),
        Integer(i64),
        Float(f64),
        Flag(bool),
    }

    Ok(match Scalar::deserialize(deserializer)? {
        Scalar::Text(s) => s,
        Scalar::Integer(n) => n.to_string(),
        Scalar::Float(f) => f.to_string(),
        Scalar::Flag(b) => (if b { "1" } else { "0" }).to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_accepts_numbers_and_strings() {
        let pins: PinMap = serde_json::from_str(
            r#"{"17":{"function":"OUT","value":1},"18":{"function":"IN","value":"0"}}"#,
        )
        .unwrap();

        assert_eq!(pins["17"], PinState::new("OUT", "1"));
        assert_eq!(pins["18"], PinState::new("IN", "0"));
    }

    #[test]
    fn test_missing_function_is_rejected() {
        let result: Result<PinMap, _> = serde_json::from_str(r#"{"17":{"value":1}}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_patch_is_copy_on_write() {
        let mut pins = PinMap::new();
        pins.insert("17".to_string(), PinState::new("IN", "0"));
        let original = Snapshot::new(pins);
        let mut patched = original.clone();

        assert!(patched.patch("17", PinField::Value, "1".to_string()));
        assert_eq!(original.get("17").unwrap().value, "0");
        assert_eq!(patched.get("17").unwrap().value, "1");
    }

    #[test]
    fn test_patch_unknown_pin() {
        let mut snapshot = Snapshot::default();
        assert!(!snapshot.patch("4", PinField::Function, "OUT".to_string()));
        assert!(snapshot.is_empty());
    }
}
