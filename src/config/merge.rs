//! Field-by-field merging of configuration tiers.
//!
//! Objects merge key by key. Arrays and scalars from a higher tier replace
//! the lower tier's value outright. A `null` in a higher tier means "not
//! specified" and keeps the lower value.

use serde_json::Value;

/// Merge `overlay` on top of `base`.
pub fn deep_merge(mut base: Value, overlay: Value) -> Value {
    merge_into(&mut base, overlay);
    base
}

fn merge_into(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (_, Value::Null) => {}
        (Value::Object(base_map), Value::Object(overlay_map)) => {
            for (key, value) in overlay_map {
                match base_map.get_mut(&key) {
                    Some(existing) => merge_into(existing, value),
                    None => {
                        base_map.insert(key, value);
                    }
                }
            }
        }
        (slot, value) => *slot = value,
    }
}

/// Merge tiers lowest first.
pub fn deep_merge_all(tiers: impl IntoIterator<Item = Value>) -> Value {
    tiers.into_iter().fold(Value::Null, deep_merge)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn nested_sections_merge_per_field() {
        let defaults = json!({
            "server": { "bind": "127.0.0.1", "port": 5000 },
            "store": { "backend": "sqlite" }
        });
        let project = json!({ "server": { "port": 8080 } });

        assert_eq!(
            deep_merge(defaults, project),
            json!({
                "server": { "bind": "127.0.0.1", "port": 8080 },
                "store": { "backend": "sqlite" }
            })
        );
    }

    #[test]
    fn origin_lists_are_replaced() {
        let base = json!({ "server": { "cors_origins": ["http://localhost:3000"] } });
        let overlay = json!({ "server": { "cors_origins": [] } });
        assert_eq!(
            deep_merge(base, overlay),
            json!({ "server": { "cors_origins": [] } })
        );
    }

    #[test]
    fn token_maps_merge_by_key() {
        let base = json!({ "auth": { "tokens": { "a": "alice" } } });
        let overlay = json!({ "auth": { "tokens": { "b": "bob", "a": "alicia" } } });
        assert_eq!(
            deep_merge(base, overlay),
            json!({ "auth": { "tokens": { "a": "alicia", "b": "bob" } } })
        );
    }

    #[test]
    fn null_keeps_lower_tier() {
        let base = json!({ "store": { "db_path": "tasks.db" }, "query": { "strict_sort_fields": true } });
        let overlay = json!({ "store": { "db_path": null }, "query": null });
        assert_eq!(deep_merge(base.clone(), overlay), base);
    }

    #[test]
    fn scalar_and_object_replace_each_other() {
        assert_eq!(
            deep_merge(json!({ "auth": "off" }), json!({ "auth": { "mode": "header" } })),
            json!({ "auth": { "mode": "header" } })
        );
        assert_eq!(
            deep_merge(json!({ "auth": { "mode": "header" } }), json!({ "auth": 1 })),
            json!({ "auth": 1 })
        );
    }

    #[test]
    fn later_tiers_win() {
        let merged = deep_merge_all([
            json!({ "server": { "port": 5000 } }),
            json!({ "server": { "port": 6000, "bind": "0.0.0.0" } }),
            json!({ "server": { "port": 7000 } }),
        ]);
        assert_eq!(merged, json!({ "server": { "port": 7000, "bind": "0.0.0.0" } }));
    }
}
