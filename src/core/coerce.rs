// src/core/coerce.rs

//! Turning command-line text into stored values.

use lazy_static::lazy_static;
use regex::Regex;
use serde_json::Value;

lazy_static! {
    static ref DIGITS_RE: Regex = Regex::new(r"^[0-9]+$").expect("digit pattern is valid");
}

/// Coerces a `--set` value: `true`/`false` (any case) become booleans, `none`/`null`
/// become null, digit-only text becomes an integer and anything else stays a string.
/// Digit strings too large for `u64` stay strings.
pub fn coerce_value(raw: &str) -> Value {
    match raw.to_lowercase().as_str() {
        "true" => return Value::Bool(true),
        "false" => return Value::Bool(false),
        "none" | "null" => return Value::Null,
        _ => {}
    }

    if DIGITS_RE.is_match(raw)
        && let Ok(number) = raw.parse::<u64>()
    {
        return Value::from(number);
    }
    Value::String(raw.to_string())
}

/// Coerces a value typed on the command line, using the option's current default as a
/// hint: if the default is a string the text is kept verbatim.
pub fn coerce_like(raw: &str, hint: &Value) -> Value {
    match hint {
        Value::String(_) => Value::String(raw.to_string()),
        _ => coerce_value(raw),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_coerce_booleans_any_case() {
        assert_eq!(coerce_value("true"), json!(true));
        assert_eq!(coerce_value("FALSE"), json!(false));
        assert_eq!(coerce_value("True"), json!(true));
    }

    #[test]
    fn test_coerce_null_words() {
        assert_eq!(coerce_value("none"), Value::Null);
        assert_eq!(coerce_value("NULL"), Value::Null);
        assert_eq!(coerce_value("None"), Value::Null);
    }

    #[test]
    fn test_coerce_digit_strings() {
        assert_eq!(coerce_value("10"), json!(10));
        assert_eq!(coerce_value("007"), json!(7));
        assert_eq!(coerce_value("-3"), json!("-3"));
        assert_eq!(coerce_value("1.5"), json!("1.5"));
        assert_eq!(
            coerce_value("99999999999999999999999"),
            json!("99999999999999999999999")
        );
    }

    #[test]
    fn test_coerce_plain_strings() {
        assert_eq!(coerce_value("png"), json!("png"));
        assert_eq!(coerce_value(""), json!(""));
        assert_eq!(coerce_value("truthy"), json!("truthy"));
    }

    #[test]
    fn test_coerce_like_respects_string_hint() {
        assert_eq!(coerce_like("42", &json!("name")), json!("42"));
        assert_eq!(coerce_like("42", &json!(4)), json!(42));
        assert_eq!(coerce_like("true", &Value::Null), json!(true));
        assert_eq!(coerce_like("x", &json!(false)), json!("x"));
    }
}
