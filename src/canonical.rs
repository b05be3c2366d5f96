//! Recipe canonicalization for content addressing.
//!
//! A canonical recipe is a deep copy with environment-variant fields removed.
//! Its byte encoding sorts object keys, uses no whitespace and escapes every
//! non-ASCII character, so two recipes that differ only in key order or
//! source representation encode to identical bytes.

use serde_json::Value;

/// Paths removed before hashing. They identify *where* a recipe was compiled
/// from, not *what* it compiles to.
pub const EXCLUDED_PATHS: &[&[&str]] = &[&["source", "commit_sha"]];

pub fn canonicalize(recipe: &Value) -> Value {
    let mut canonical = recipe.clone();
    for path in EXCLUDED_PATHS {
        remove_path(&mut canonical, path);
    }
    canonical
}

fn remove_path(value: &mut Value, path: &[&str]) {
    let Some((last, parents)) = path.split_last() else {
        return;
    };

    let mut cursor = value;
    for key in parents {
        cursor = match cursor.get_mut(*key) {
            Some(next) => next,
            None => return,
        };
    }

    if let Some(map) = cursor.as_object_mut() {
        map.remove(*last);
    }
}

/// Stable byte encoding of `value`: sorted keys, `,`/`:` separators,
/// ASCII-only output.
pub fn canonical_bytes(value: &Value) -> Vec<u8> {
    let mut out = String::new();
    write_value(value, &mut out);
    out.into_bytes()
}

fn write_value(value: &Value, out: &mut String) {
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        Value::Number(n) => out.push_str(&n.to_string()),
        Value::String(s) => write_string(s, out),
        Value::Array(items) => {
            out.push('[');
            for (idx, item) in items.iter().enumerate() {
                if idx > 0 {
                    out.push(',');
                }
                write_value(item, out);
            }
            out.push(']');
        }
        Value::Object(map) => {
            // Map iteration order depends on serde_json features; sort explicitly.
            let mut entries = map.iter().collect::<Vec<_>>();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            out.push('{');
            for (idx, (key, item)) in entries.into_iter().enumerate() {
                if idx > 0 {
                    out.push(',');
                }
                write_string(key, out);
                out.push(':');
                write_value(item, out);
            }
            out.push('}');
        }
    }
}

fn write_string(s: &str, out: &mut String) {
    out.push('"');
    for ch in s.chars() {
        match ch {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\u{08}' => out.push_str("\\b"),
            '\u{0c}' => out.push_str("\\f"),
            ' '..='~' => out.push(ch),
            _ => {
                let mut units = [0u16; 2];
                for unit in ch.encode_utf16(&mut units) {
                    out.push_str(&format!("\\u{unit:04x}"));
                }
            }
        }
    }
    out.push('"');
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn canonicalize_removes_commit_sha_without_touching_input() {
        let recipe = json!({
            "source": { "commit_sha": "abc123", "branch": "main" },
            "scope": { "include_episodes": ["ep1"] },
        });

        let canonical = canonicalize(&recipe);

        assert_eq!(canonical.pointer("/source/commit_sha"), None);
        assert_eq!(canonical.pointer("/source/branch"), Some(&json!("main")));
        assert_eq!(recipe.pointer("/source/commit_sha"), Some(&json!("abc123")));
    }

    #[test]
    fn canonicalize_tolerates_missing_or_non_object_parents() {
        let cases = [
            json!({}),
            json!({ "source": null }),
            json!({ "source": "HEAD" }),
            json!({ "source": ["commit_sha"] }),
            json!([1, 2, 3]),
            json!("scalar"),
        ];

        for recipe in cases {
            assert_eq!(canonicalize(&recipe), recipe, "recipe={recipe}");
        }
    }

    #[test]
    fn canonicalize_is_idempotent() {
        let recipe = json!({ "source": { "commit_sha": "x" }, "a": [{ "b": 1 }] });
        let once = canonicalize(&recipe);
        let twice = canonicalize(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn canonical_bytes_sort_keys_and_drop_whitespace() {
        let value = json!({ "b": [1, 2.5, true, null], "a": { "d": "x", "c": "y" } });
        let bytes = canonical_bytes(&value);
        assert_eq!(
            String::from_utf8(bytes).unwrap(),
            r#"{"a":{"c":"y","d":"x"},"b":[1,2.5,true,null]}"#
        );
    }

    #[test]
    fn canonical_bytes_escape_non_ascii_and_control_characters() {
        let value = json!({ "title": "Café\n\"🎄\"" });
        let bytes = canonical_bytes(&value);
        assert_eq!(
            String::from_utf8(bytes).unwrap(),
            r#"{"title":"Caf\u00e9\n\"\ud83c\udf84\""}"#
        );
    }
}
