//! Content-addressed memoization of the planning stage
//!
//! The digest is a sha256 over a canonicalized serialization of the
//! planning inputs: object keys sorted, string arrays sorted. Two inputs
//! that differ only in evidence ordering produce the same digest — that
//! is the collision-avoidance invariant, tested directly.

use std::collections::BTreeMap;
use std::future::Future;

use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};
use strophe_core::{PlannerOutput, Result};

/// Stable digest over the canonical form of `value`
pub fn canonical_digest<T: Serialize>(value: &T) -> Result<String> {
    let json = serde_json::to_value(value)?;
    let canon = canonicalize(json);
    let mut hasher = Sha256::new();
    hasher.update(serde_json::to_string(&canon)?.as_bytes());
    Ok(hex::encode(hasher.finalize()))
}

// serde_json maps iterate in key order already; arrays get sorted by
// their serialized form so re-ordered evidence lists collapse together.
fn canonicalize(value: Value) -> Value {
    match value {
        Value::Array(items) => {
            let mut items: Vec<Value> = items.into_iter().map(canonicalize).collect();
            items.sort_by_key(|item| item.to_string());
            Value::Array(items)
        }
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(key, item)| (key, canonicalize(item)))
                .collect(),
        ),
        other => other,
    }
}

/// Read-through lookup: returns `(value, was_cached)`. The compute
/// function runs at most once per distinct digest — on a hit it is never
/// invoked. The caller inserts fresh values back into the Context's
/// cache so they persist with the session.
pub async fn get_or_compute<F, Fut>(
    cache: &BTreeMap<String, PlannerOutput>,
    digest: &str,
    compute: F,
) -> Result<(PlannerOutput, bool)>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<PlannerOutput>>,
{
    if let Some(hit) = cache.get(digest) {
        tracing::debug!("Planner cache hit for digest {}", &digest[..12]);
        return Ok((hit.clone(), true));
    }
    Ok((compute().await?, false))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use strophe_core::{Plan, Style, Toolcard};

    #[test]
    fn test_digest_ignores_key_order() {
        let a = json!({"brief": {"x": 1, "y": 2}, "pack": []});
        let b = json!({"pack": [], "brief": {"y": 2, "x": 1}});
        assert_eq!(
            canonical_digest(&a).unwrap(),
            canonical_digest(&b).unwrap()
        );
    }

    #[test]
    fn test_digest_ignores_array_order() {
        let a = json!({"taboo": ["moon", "rain", "heart"]});
        let b = json!({"taboo": ["heart", "moon", "rain"]});
        assert_eq!(
            canonical_digest(&a).unwrap(),
            canonical_digest(&b).unwrap()
        );
    }

    #[test]
    fn test_digest_distinguishes_content() {
        let a = json!({"taboo": ["moon"]});
        let b = json!({"taboo": ["rain"]});
        assert_ne!(
            canonical_digest(&a).unwrap(),
            canonical_digest(&b).unwrap()
        );
    }

    fn sample_output() -> PlannerOutput {
        PlannerOutput {
            plan: Plan::fallback(),
            style: Style::fallback(vec![]),
            toolcard: Toolcard::default(),
        }
    }

    #[tokio::test]
    async fn test_get_or_compute_runs_once() {
        let mut cache = BTreeMap::new();
        let mut computes = 0;

        let (value, cached) = get_or_compute(&cache, "d1", || {
            computes += 1;
            async { Ok(sample_output()) }
        })
        .await
        .unwrap();
        assert!(!cached);
        assert_eq!(computes, 1);
        cache.insert("d1".to_string(), value.clone());

        let (again, cached) = get_or_compute(&cache, "d1", || {
            computes += 1;
            async { Ok(sample_output()) }
        })
        .await
        .unwrap();
        assert!(cached);
        assert_eq!(computes, 1);
        assert_eq!(again, value);
    }
}
