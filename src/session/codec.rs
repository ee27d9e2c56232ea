//! Unverified bearer-token payload decoding
//!
//! The claims produced here are display hints. They are never checked
//! against a signature or an expiry and must not feed an authorization
//! decision or a cache key.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use tracing::debug;

/// Decoded (unverified) token payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenClaims {
    #[serde(deserialize_with = "deserialize_subject")]
    pub sub: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default, rename = "type")]
    pub token_type: Option<String>,
    #[serde(default)]
    pub iat: Option<i64>,
    #[serde(default)]
    pub exp: Option<i64>,
}

impl TokenClaims {
    pub fn issued_at(&self) -> Option<DateTime<Utc>> {
        self.iat.and_then(|ts| Utc.timestamp_opt(ts, 0).single())
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.exp.and_then(|ts| Utc.timestamp_opt(ts, 0).single())
    }
}

/// Backends disagree on whether `sub` is a string or a number
fn deserialize_subject<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) if !s.is_empty() => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "unsupported subject claim: {}",
            other
        ))),
    }
}

/// Decodes the payload segment of a `header.payload.signature` token.
/// Returns `None` for any structural, encoding or parse problem.
pub fn decode(token: &str) -> Option<TokenClaims> {
    let parts: Vec<&str> = token.trim().split('.').collect();
    if parts.len() != 3 {
        debug!(parts = parts.len(), "Token is not a three-part token");
        return None;
    }

    let payload = parts[1].trim_end_matches('=');
    let bytes = match URL_SAFE_NO_PAD.decode(payload) {
        Ok(b) => b,
        Err(e) => {
            debug!(error = %e, "Token payload is not base64url");
            return None;
        }
    };

    match serde_json::from_slice::<TokenClaims>(&bytes) {
        Ok(claims) => Some(claims),
        Err(e) => {
            debug!(error = %e, "Token payload is not a claims record");
            None
        }
    }
}

pub fn subject(token: &str) -> Option<String> {
    decode(token).map(|claims| claims.sub)
}
