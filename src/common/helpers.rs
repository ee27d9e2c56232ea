// Helper functions for safe logging

use serde_json::Value;

/// Masks email addresses for safe logging
/// Prevents sensitive data exposure while preserving debugging utility
///
/// # Example
/// ```
/// use session_edge::common::safe_email_log;
/// assert_eq!(safe_email_log("user@example.com"), "u***@example.com");
/// ```
pub fn safe_email_log(email: &str) -> String {
    if email.len() > 3 {
        let parts: Vec<&str> = email.split('@').collect();
        if parts.len() == 2 && !parts[0].is_empty() {
            let first = parts[0].chars().next().map(String::from).unwrap_or_default();
            format!("{}***@{}", first, parts[1])
        } else {
            "***@***.***".to_string()
        }
    } else {
        "***@***.***".to_string()
    }
}

/// Masks tokens for safe logging
/// Shows only first and last 4 characters
///
/// # Example
/// ```
/// use session_edge::common::safe_token_log;
/// assert_eq!(safe_token_log("eyJhbGciOiJIUzI1NiIsInR5cCI6IkpXVCJ9"), "eyJh...VCJ9");
/// ```
pub fn safe_token_log(token: &str) -> String {
    let chars: Vec<char> = token.chars().collect();
    if chars.len() > 8 {
        let head: String = chars[..4].iter().collect();
        let tail: String = chars[chars.len() - 4..].iter().collect();
        format!("{}...{}", head, tail)
    } else {
        "***".to_string()
    }
}

const SECRET_FIELDS: [&str; 6] = [
    "password",
    "accessToken",
    "refreshToken",
    "token",
    "access_token",
    "refresh_token",
];

/// Replaces credential-bearing fields of a JSON document in place.
/// Passwords are blanked, token fields are masked with [`safe_token_log`].
pub fn redact_secrets(value: &mut Value) {
    match value {
        Value::Object(map) => {
            for (key, field) in map.iter_mut() {
                if SECRET_FIELDS.contains(&key.as_str()) {
                    let masked = match &*field {
                        Value::String(s) if key != "password" => safe_token_log(s),
                        _ => "***".to_string(),
                    };
                    *field = Value::String(masked);
                } else {
                    redact_secrets(field);
                }
            }
        }
        Value::Array(items) => items.iter_mut().for_each(redact_secrets),
        _ => {}
    }
}
