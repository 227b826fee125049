//! Canonical JSON for MAC input (spec §4.G): insertion-order keys, `<`
//! escaped as `<`, and empty sub-objects/arrays/strings stripped
//! recursively bottom-up before serialization.

use serde_json::Value;

/// Strip empty subtrees (`{}`, `[]`, `""`) from `value`, recursively,
/// working from the leaves up so a parent that becomes empty only because
/// its children were stripped is itself removed by the caller.
pub fn strip_empty(value: &mut Value) {
    match value {
        Value::Object(map) => {
            map.retain(|_, v| {
                strip_empty(v);
                !is_empty(v)
            });
        }
        Value::Array(items) => {
            for item in items.iter_mut() {
                strip_empty(item);
            }
            items.retain(|v| !is_empty(v));
        }
        _ => {}
    }
}

fn is_empty(value: &Value) -> bool {
    match value {
        Value::Object(map) => map.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}

/// Serialize `value` in its current key order, compactly, with literal
/// `<` characters escaped to `<` to match the reference
/// implementation's MAC input (spec §4.G).
pub fn canonical_string(value: &Value) -> String {
    let compact = serde_json::to_string(value).expect("Value serialization never fails");
    compact.replace('<', "\\u003C")
}

/// Strip empty subtrees from a clone of `value`, then serialize
/// canonically. The tree handed to `hmac_hex` must have empties removed
/// first (spec §4.G); the caller's original tree (with empties intact) is
/// left untouched so it can still be written to disk as-is.
pub fn canonicalize_for_mac(value: &Value) -> String {
    let mut stripped = value.clone();
    strip_empty(&mut stripped);
    canonical_string(&stripped)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn strips_empty_object_array_and_string_recursively() {
        let mut value = json!({
            "keep": "value",
            "empty_str": "",
            "empty_obj": {},
            "empty_arr": [],
            "nested": { "inner_empty": {}, "inner_keep": 1 },
        });
        strip_empty(&mut value);
        assert_eq!(value, json!({ "keep": "value", "nested": { "inner_keep": 1 } }));
    }

    #[test]
    fn nested_object_that_becomes_empty_after_stripping_is_itself_removed() {
        let mut value = json!({ "outer": { "inner": {} } });
        strip_empty(&mut value);
        assert_eq!(value, json!({}));
    }

    #[test]
    fn canonical_string_escapes_angle_bracket() {
        let value = json!({ "a": "<script>" });
        let s = canonical_string(&value);
        assert!(s.contains("\\u003Cscript>"));
        assert!(!s.contains('<'));
    }

    #[test]
    fn canonical_string_preserves_insertion_order() {
        let value = json!({ "z": 1, "a": 2, "m": 3 });
        let s = canonical_string(&value);
        let z = s.find("\"z\"").unwrap();
        let a = s.find("\"a\"").unwrap();
        let m = s.find("\"m\"").unwrap();
        assert!(z < a && a < m);
    }

    #[test]
    fn round_trips_through_parse() {
        let value = json!({ "b": 1, "a": [1, 2, 3] });
        let s = canonical_string(&value);
        let reparsed: Value = serde_json::from_str(&s).unwrap();
        assert_eq!(canonical_string(&reparsed), s);
    }
}
