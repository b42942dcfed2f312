//! Per-request option bags.
//!
//! Control calls carry an opaque key/value map.  Values arrive as JSON, so a
//! flag may be `true`, `1` or `"true"` depending on the client; the typed
//! getters here accept all of those and fall back to a default otherwise.

use serde_json::{Map, Value};

/// Opaque key/value options attached to a control call.
pub type Options = Map<String, Value>;

/// Typed, lenient accessors over [`Options`].
pub trait OptionsExt {
    fn bool_or(&self, key: &str, default: bool) -> bool;
    fn int_or(&self, key: &str, default: i64) -> i64;
    fn str_or<'a>(&'a self, key: &str, default: &'a str) -> &'a str;
    fn f64_or(&self, key: &str, default: f64) -> f64;
}

impl OptionsExt for Options {
    fn bool_or(&self, key: &str, default: bool) -> bool {
        match self.get(key) {
            Some(Value::Bool(b)) => *b,
            Some(Value::Number(n)) => n.as_i64().map(|v| v != 0).unwrap_or(default),
            Some(Value::String(s)) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "1" | "yes" => true,
                "false" | "0" | "no" | "" => false,
                _ => default,
            },
            _ => default,
        }
    }

    fn int_or(&self, key: &str, default: i64) -> i64 {
        match self.get(key) {
            Some(Value::Number(n)) => n
                .as_i64()
                .or_else(|| n.as_f64().map(|f| f as i64))
                .unwrap_or(default),
            Some(Value::String(s)) => s.trim().parse().unwrap_or(default),
            Some(Value::Bool(b)) => i64::from(*b),
            _ => default,
        }
    }

    fn str_or<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        match self.get(key) {
            Some(Value::String(s)) => s,
            _ => default,
        }
    }

    fn f64_or(&self, key: &str, default: f64) -> f64 {
        match self.get(key) {
            Some(Value::Number(n)) => n.as_f64().unwrap_or(default),
            Some(Value::String(s)) => s.trim().parse().unwrap_or(default),
            _ => default,
        }
    }
}

/// Strip a region suffix and lowercase a language id (`"en-US"` → `"en"`).
pub fn normalize_lang(lang: &str) -> String {
    lang.split('-').next().unwrap_or_default().trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn opts(v: Value) -> Options {
        v.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn bool_accepts_numbers_and_strings() {
        let o = opts(json!({"a": true, "b": 1, "c": "yes", "d": "0", "e": "maybe"}));
        assert!(o.bool_or("a", false));
        assert!(o.bool_or("b", false));
        assert!(o.bool_or("c", false));
        assert!(!o.bool_or("d", true));
        assert!(o.bool_or("e", true));
        assert!(!o.bool_or("missing", false));
    }

    #[test]
    fn int_accepts_numeric_strings() {
        let o = opts(json!({"a": 3, "b": "7", "c": "x", "d": 2.9}));
        assert_eq!(o.int_or("a", 0), 3);
        assert_eq!(o.int_or("b", 0), 7);
        assert_eq!(o.int_or("c", -1), -1);
        assert_eq!(o.int_or("d", 0), 2);
    }

    #[test]
    fn str_only_reads_strings() {
        let o = opts(json!({"a": "hello", "b": 5}));
        assert_eq!(o.str_or("a", ""), "hello");
        assert_eq!(o.str_or("b", "dflt"), "dflt");
    }

    #[test]
    fn normalize_lang_strips_region() {
        assert_eq!(normalize_lang("en-US"), "en");
        assert_eq!(normalize_lang("PL"), "pl");
        assert_eq!(normalize_lang(""), "");
    }
}
