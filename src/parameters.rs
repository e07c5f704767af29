//! The closed parameter-value grammar tools are allowed to exchange across
//! the executor boundary (spec "Data Model" §3: "No other runtime types
//! permitted across the boundary").
//!
//! Tool bodies still speak `serde_json::Value` for ergonomic interop with
//! [`crate::core::DynTool`] — that stays unchanged from the teacher's
//! design. `ParameterValue` exists for the pieces of the spec that need a
//! canonical, closed grammar to reason over: the fingerprint (deterministic
//! serialization) and cache dependency keys.

use std::collections::BTreeMap;

/// A single parameter value. Maps are `BTreeMap` so iteration order is
/// already key-sorted, which the fingerprint algorithm depends on.
#[derive(Debug, Clone, PartialEq)]
pub enum ParameterValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Array(Vec<ParameterValue>),
    Map(BTreeMap<String, ParameterValue>),
}

impl ParameterValue {
    /// Canonical JSON serialization used by the fingerprint algorithm for
    /// sequences, nested maps, and scalars (spec §4.1 step 4).
    pub fn to_canonical_json(&self) -> serde_json::Value {
        match self {
            ParameterValue::Null => serde_json::Value::Null,
            ParameterValue::Bool(b) => serde_json::Value::Bool(*b),
            ParameterValue::Int(i) => serde_json::Value::from(*i),
            ParameterValue::Float(f) => serde_json::json!(f),
            ParameterValue::String(s) => serde_json::Value::String(s.clone()),
            ParameterValue::Array(items) => {
                serde_json::Value::Array(items.iter().map(Self::to_canonical_json).collect())
            }
            ParameterValue::Map(map) => {
                // BTreeMap already iterates in key order.
                let obj = map
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_canonical_json()))
                    .collect();
                serde_json::Value::Object(obj)
            }
        }
    }

    /// A short type tag used when `includeParameterTypes` is requested.
    pub fn type_tag(&self) -> &'static str {
        match self {
            ParameterValue::Null => "Null",
            ParameterValue::Bool(_) => "Bool",
            ParameterValue::Int(_) => "Int64",
            ParameterValue::Float(_) => "Float64",
            ParameterValue::String(_) => "String",
            ParameterValue::Array(_) => "Array",
            ParameterValue::Map(_) => "Map",
        }
    }
}

impl From<serde_json::Value> for ParameterValue {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => ParameterValue::Null,
            serde_json::Value::Bool(b) => ParameterValue::Bool(b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    ParameterValue::Int(i)
                } else {
                    ParameterValue::Float(n.as_f64().unwrap_or(0.0))
                }
            }
            serde_json::Value::String(s) => ParameterValue::String(s),
            serde_json::Value::Array(items) => {
                ParameterValue::Array(items.into_iter().map(ParameterValue::from).collect())
            }
            serde_json::Value::Object(obj) => ParameterValue::Map(
                obj.into_iter()
                    .map(|(k, v)| (k, ParameterValue::from(v)))
                    .collect(),
            ),
        }
    }
}

impl From<ParameterValue> for serde_json::Value {
    fn from(value: ParameterValue) -> Self {
        value.to_canonical_json()
    }
}

/// A parameter map: unordered on the wire, but represented with `BTreeMap`
/// so that "unordered" callers never accidentally depend on insertion
/// order — the fingerprint module re-sorts explicitly regardless.
pub type ParameterMap = BTreeMap<String, ParameterValue>;

/// Convert a JSON object into a [`ParameterMap`]. Non-object values are
/// rejected since the spec's parameter map is always a mapping at the top
/// level.
pub fn parameter_map_from_json(value: &serde_json::Value) -> Option<ParameterMap> {
    value.as_object().map(|obj| {
        obj.iter()
            .map(|(k, v)| (k.clone(), ParameterValue::from(v.clone())))
            .collect()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_json() {
        let original = serde_json::json!({
            "b": 1,
            "a": [1, 2, "three", null],
            "c": {"nested": true}
        });
        let pv = ParameterValue::from(original.clone());
        let back: serde_json::Value = pv.into();
        assert_eq!(original, back);
    }

    #[test]
    fn map_preserves_key_order_as_sorted() {
        let mut map = ParameterMap::new();
        map.insert("z".to_string(), ParameterValue::Int(1));
        map.insert("a".to_string(), ParameterValue::Int(2));
        let keys: Vec<&String> = map.keys().collect();
        assert_eq!(keys, vec!["a", "z"]);
    }
}
