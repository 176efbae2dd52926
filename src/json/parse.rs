//! Purpose: Provide the runtime JSON decode entrypoints.
//! Exports: `from_str`, `parse_or_raw`.
//! Role: Parser boundary used for stored record values and CLI arguments.
//! Notes: Error mapping is done by callsites so domain context stays explicit.

use serde::de::DeserializeOwned;
use serde_json::Value;

pub(crate) fn from_str<T: DeserializeOwned>(input: &str) -> Result<T, serde_json::Error> {
    serde_json::from_str(input)
}

/// Best-effort decode: text that is not valid JSON is kept as a JSON string.
pub fn parse_or_raw(input: &str) -> Value {
    from_str(input).unwrap_or_else(|_| Value::String(input.to_string()))
}

#[cfg(test)]
mod tests {
    use super::parse_or_raw;
    use serde_json::json;

    #[test]
    fn json_text_is_decoded() {
        assert_eq!(parse_or_raw("1"), json!(1));
        assert_eq!(parse_or_raw("\"2\""), json!("2"));
        assert_eq!(parse_or_raw("null"), json!(null));
        assert_eq!(parse_or_raw("{\"a\":[true]}"), json!({"a": [true]}));
    }

    #[test]
    fn anything_else_stays_raw() {
        assert_eq!(parse_or_raw("hello"), json!("hello"));
        assert_eq!(parse_or_raw("{broken"), json!("{broken"));
        assert_eq!(parse_or_raw(""), json!(""));
    }
}
