//! Recursive merge of JSON documents.
//!
//! Nested objects in the patch are merged key by key into the target; every
//! other patch value (string, number, bool, array, null) replaces the target
//! value wholesale. Keys missing from the patch are left untouched.
//!
//! # Example
//!
//! ```
//! use serde_json::json;
//! use tune_forge::utils::json_merge::deep_merge;
//!
//! let mut run = json!({"id": "r1", "output": {"output": "old", "rating": null}});
//! deep_merge(&mut run, json!({"output": {"output": "new"}}));
//! assert_eq!(run, json!({"id": "r1", "output": {"output": "new", "rating": null}}));
//! ```

use serde_json::{Map, Value};

/// Merges `patch` into `target` in place.
pub fn deep_merge(target: &mut Value, patch: Value) {
    match patch {
        Value::Object(patch) => {
            if !target.is_object() {
                *target = Value::Object(Map::new());
            }
            if let Value::Object(target) = target {
                for (key, value) in patch {
                    deep_merge(target.entry(key).or_insert(Value::Null), value);
                }
            }
        }
        other => *target = other,
    }
}
