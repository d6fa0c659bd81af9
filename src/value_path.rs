//! Typed dot-path access into JSON trees.
//!
//! Agent outputs and account snapshots are loosely-shaped JSON; consumers
//! read nested fields with a documented default instead of erroring on a
//! missing or mistyped key.

use serde_json::Value;

/// Walk a dot-separated path (`"metrics.bot_score"`) through a JSON value.
///
/// Numeric path segments index into arrays (`"posts.0.likes"`).
/// Returns `None` if any segment is missing or the shape doesn't match.
pub fn get_path<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = root;

    for segment in path.split('.') {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => {
                let index: usize = segment.parse().ok()?;
                items.get(index)?
            }
            _ => return None,
        };
    }

    Some(current)
}

/// Read a float at `path`, falling back to `default` on missing/mistyped.
///
/// Integers are widened; strings are parsed so `"42.5"` counts as 42.5,
/// matching how models sometimes quote numeric fields.
pub fn f64_at(root: &Value, path: &str, default: f64) -> f64 {
    match get_path(root, path) {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(default),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(default),
        _ => default,
    }
}

/// Read an unsigned integer at `path`, falling back to `default`.
pub fn u64_at(root: &Value, path: &str, default: u64) -> u64 {
    match get_path(root, path) {
        Some(Value::Number(n)) => n.as_u64().unwrap_or(default),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(default),
        _ => default,
    }
}

/// Read a string at `path`, falling back to `default`.
pub fn str_at<'a>(root: &'a Value, path: &str, default: &'a str) -> &'a str {
    match get_path(root, path) {
        Some(Value::String(s)) => s.as_str(),
        _ => default,
    }
}

/// Read an array at `path`; missing or mistyped yields an empty slice.
pub fn array_at<'a>(root: &'a Value, path: &str) -> &'a [Value] {
    match get_path(root, path) {
        Some(Value::Array(items)) => items.as_slice(),
        _ => &[],
    }
}

/// Read a boolean at `path`, falling back to `default`.
pub fn bool_at(root: &Value, path: &str, default: bool) -> bool {
    match get_path(root, path) {
        Some(Value::Bool(b)) => *b,
        _ => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Value {
        json!({
            "profile": {
                "followers": 10000,
                "engagement_rate": "1.8",
                "verified": true
            },
            "posts": [
                { "likes": 120 },
                { "likes": 85 }
            ]
        })
    }

    #[test]
    fn test_get_path_nested() {
        let v = sample();
        assert_eq!(
            get_path(&v, "profile.followers").and_then(Value::as_u64),
            Some(10000)
        );
        assert!(get_path(&v, "profile.missing").is_none());
        assert!(get_path(&v, "profile.followers.deeper").is_none());
    }

    #[test]
    fn test_array_indexing() {
        let v = sample();
        assert_eq!(f64_at(&v, "posts.1.likes", 0.0), 85.0);
        assert_eq!(f64_at(&v, "posts.9.likes", -1.0), -1.0);
    }

    #[test]
    fn test_f64_parses_quoted_numbers() {
        let v = sample();
        assert_eq!(f64_at(&v, "profile.engagement_rate", 0.0), 1.8);
    }

    #[test]
    fn test_defaults_on_missing() {
        let v = sample();
        assert_eq!(f64_at(&v, "nope", 2.5), 2.5);
        assert_eq!(u64_at(&v, "profile.nope", 7), 7);
        assert_eq!(str_at(&v, "profile.nope", "n/a"), "n/a");
        assert!(array_at(&v, "profile.followers").is_empty());
        assert!(bool_at(&v, "profile.verified", false));
    }
}
