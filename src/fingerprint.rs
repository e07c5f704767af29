//! Deterministic `(toolId, parameters, context)` → cache key derivation.

use base64::Engine;
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;

use crate::parameters::ParameterMap;

/// Above this many bytes, the joined `k=v&k=v...` parameter string is
/// replaced by a hash instead of embedded literally. A cache-key sizing
/// heuristic; tunable, must stay deterministic.
pub const INLINE_PARAMS_LIMIT: usize = 200;

/// Context passed alongside the tool id and parameters when computing a
/// fingerprint. All fields are optional; absent fields are simply skipped
/// in the fixed ordering spec'd in §4.1 step 2.
#[derive(Debug, Clone, Default)]
pub struct FingerprintContext {
    pub user_id: Option<String>,
    pub env: Option<String>,
    pub version: Option<String>,
    /// Extra context entries, folded into the fingerprint in ascending key
    /// order.
    pub additional_context: std::collections::BTreeMap<String, String>,
    /// Parameter keys to drop before fingerprinting (e.g. a timestamp the
    /// caller doesn't want to bust the cache on).
    pub excluded_params: BTreeSet<String>,
    /// When set, each serialized parameter value is prefixed with its type
    /// tag (`"String:"`, `"Int64:"`, ...).
    pub include_parameter_types: bool,
}

/// Compute a deterministic fingerprint for `(tool_id, params, context)`.
///
/// Two calls whose parameter maps are equal as sets of key/value pairs
/// (regardless of how they were built) MUST produce identical fingerprints
/// — this holds because `ParameterMap` is a `BTreeMap`, so it is already
/// key-sorted, and we additionally re-derive a sorted key list explicitly
/// rather than relying on map iteration order as an implicit contract.
pub fn fingerprint(tool_id: &str, params: &ParameterMap, context: Option<&FingerprintContext>) -> String {
    let mut key = format!("tool:{}", tool_id);

    if let Some(ctx) = context {
        if let Some(user_id) = &ctx.user_id {
            key.push_str(&format!(":user:{}", user_id));
        }
        if let Some(env) = &ctx.env {
            key.push_str(&format!(":env:{}", env));
        }
        if let Some(version) = &ctx.version {
            key.push_str(&format!(":v:{}", version));
        }
        for (k, v) in &ctx.additional_context {
            key.push_str(&format!(":{}:{}", k, v));
        }
    }

    let excluded = context.map(|c| &c.excluded_params);
    let include_types = context.map(|c| c.include_parameter_types).unwrap_or(false);

    let mut sorted_keys: Vec<&String> = params.keys().collect();
    sorted_keys.sort();

    let mut pairs = Vec::with_capacity(sorted_keys.len());
    for k in sorted_keys {
        if let Some(excluded) = excluded {
            if excluded.contains(k) {
                continue;
            }
        }
        let value = &params[k];
        let serialized = serialize_value(value);
        if include_types {
            pairs.push(format!("{}={}:{}", k, value.type_tag(), serialized));
        } else {
            pairs.push(format!("{}={}", k, serialized));
        }
    }

    let joined = pairs.join("&");

    if joined.len() > INLINE_PARAMS_LIMIT {
        let mut hasher = Sha256::new();
        hasher.update(joined.as_bytes());
        let digest = hasher.finalize();
        let encoded = base64::engine::general_purpose::STANDARD.encode(digest);
        key.push_str(&format!(":params:{}", encoded));
    } else if !joined.is_empty() {
        key.push_str(&format!(":params:{}", joined));
    }

    key
}

fn serialize_value(value: &crate::parameters::ParameterValue) -> String {
    use crate::parameters::ParameterValue as PV;
    match value {
        PV::Null => "null".to_string(),
        PV::String(s) => s.clone(),
        PV::Array(_) | PV::Map(_) => value.to_canonical_json().to_string(),
        PV::Bool(_) | PV::Int(_) | PV::Float(_) => value.to_canonical_json().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parameters::ParameterValue as PV;
    use proptest::prelude::*;

    fn sample_params() -> ParameterMap {
        let mut m = ParameterMap::new();
        m.insert("b".to_string(), PV::Int(2));
        m.insert("a".to_string(), PV::String("x".to_string()));
        m
    }

    #[test]
    fn deterministic_for_same_inputs() {
        let params = sample_params();
        let f1 = fingerprint("echo", &params, None);
        let f2 = fingerprint("echo", &params, None);
        assert_eq!(f1, f2);
    }

    #[test]
    fn large_param_blob_is_hashed() {
        let mut m = ParameterMap::new();
        m.insert("payload".to_string(), PV::String("x".repeat(1000)));
        let fp = fingerprint("echo", &m, None);
        assert!(fp.contains(":params:"));
        assert!(fp.len() < 1000);
    }

    #[test]
    fn excluded_params_are_dropped() {
        let mut m = ParameterMap::new();
        m.insert("keep".to_string(), PV::Int(1));
        m.insert("drop_me".to_string(), PV::Int(2));
        let mut ctx = FingerprintContext::default();
        ctx.excluded_params.insert("drop_me".to_string());
        let with_exclusion = fingerprint("t", &m, Some(&ctx));
        assert!(!with_exclusion.contains("drop_me"));
        assert!(with_exclusion.contains("keep"));
    }

    proptest! {
        #[test]
        fn permutation_of_insertion_order_does_not_change_fingerprint(
            a in any::<i64>(), b in any::<i64>(), c in ".*"
        ) {
            // BTreeMap construction order can't actually vary iteration
            // order, but we build two maps via different insertion
            // sequences to exercise the same code path the invariant cares
            // about: key-set equality implies fingerprint equality.
            let mut m1 = ParameterMap::new();
            m1.insert("a".to_string(), PV::Int(a));
            m1.insert("b".to_string(), PV::Int(b));
            m1.insert("c".to_string(), PV::String(c.clone()));

            let mut m2 = ParameterMap::new();
            m2.insert("c".to_string(), PV::String(c));
            m2.insert("b".to_string(), PV::Int(b));
            m2.insert("a".to_string(), PV::Int(a));

            prop_assert_eq!(fingerprint("t", &m1, None), fingerprint("t", &m2, None));
        }
    }
}
