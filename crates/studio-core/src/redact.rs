//! Sensitive-field redaction for request logging

use serde_json::Value;

/// Placeholder written over redacted values
pub const REDACTED: &str = "[REDACTED]";

/// Key fragments treated as sensitive (matched case-insensitively)
const SENSITIVE_KEYS: &[&str] = &[
    "password",
    "token",
    "secret",
    "authorization",
    "api_key",
    "apikey",
    "card_number",
    "cvv",
    "signature",
];

/// Check if a JSON key names a sensitive field
#[must_use]
pub fn is_sensitive_key(key: &str) -> bool {
    let key = key.to_ascii_lowercase();
    SENSITIVE_KEYS.iter().any(|fragment| key.contains(fragment))
}

/// Copy of `value` with every sensitive field replaced by [`REDACTED`]
#[must_use]
pub fn redact(value: &Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(key, inner)| {
                    let replaced = if is_sensitive_key(key) {
                        Value::String(REDACTED.to_string())
                    } else {
                        redact(inner)
                    };
                    (key.clone(), replaced)
                })
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(redact).collect()),
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn redacts_nested_keys() {
        let input = json!({
            "title": "Hello",
            "Authorization": "Bearer abc",
            "payment": { "card_number": "4111", "amount": 500 },
            "hooks": [{ "webhook_secret": "s3" }]
        });

        let output = redact(&input);

        assert_eq!(output["title"], "Hello");
        assert_eq!(output["Authorization"], REDACTED);
        assert_eq!(output["payment"]["card_number"], REDACTED);
        assert_eq!(output["payment"]["amount"], 500);
        assert_eq!(output["hooks"][0]["webhook_secret"], REDACTED);
    }

    #[test]
    fn leaves_scalars_alone() {
        assert_eq!(redact(&json!("token")), json!("token"));
    }
}
