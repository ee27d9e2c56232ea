//! Locating the access token of an inbound request
//!
//! Precedence is fixed: trusted `Authorization: Bearer` header, then the
//! `x-access-token` fallback header, then the `access_token` cookie.
//! Nothing else is consulted.

use axum::http::{header::AUTHORIZATION, header::COOKIE, HeaderMap};
use cookie::Cookie;

use super::store::{ACCESS_COOKIE_NAME, REFRESH_COOKIE_NAME};

pub const FALLBACK_TOKEN_HEADER: &str = "x-access-token";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenOrigin {
    TrustedHeader,
    FallbackHeader,
    Cookie,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocatedToken {
    pub token: String,
    pub origin: TokenOrigin,
}

fn bearer_from_authorization(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?.trim();
    let (scheme, token) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then(|| token.to_string())
}

fn fallback_header(headers: &HeaderMap) -> Option<String> {
    let token = headers.get(FALLBACK_TOKEN_HEADER)?.to_str().ok()?.trim();
    (!token.is_empty()).then(|| token.to_string())
}

/// Value of a named cookie across every `Cookie` header of the request
pub fn read_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|raw| Cookie::split_parse(raw.to_string()))
        .filter_map(Result::ok)
        .find(|c| c.name() == name && !c.value().is_empty())
        .map(|c| c.value().to_string())
}

pub fn locate(headers: &HeaderMap) -> Option<LocatedToken> {
    if let Some(token) = bearer_from_authorization(headers) {
        return Some(LocatedToken {
            token,
            origin: TokenOrigin::TrustedHeader,
        });
    }

    if let Some(token) = fallback_header(headers) {
        return Some(LocatedToken {
            token,
            origin: TokenOrigin::FallbackHeader,
        });
    }

    read_cookie(headers, ACCESS_COOKIE_NAME).map(|token| LocatedToken {
        token,
        origin: TokenOrigin::Cookie,
    })
}

/// `None` means unauthenticated
pub fn resolve(headers: &HeaderMap) -> Option<String> {
    locate(headers).map(|located| located.token)
}

/// Refresh tokens only ever travel as the httpOnly cookie
pub fn refresh_cookie(headers: &HeaderMap) -> Option<String> {
    read_cookie(headers, REFRESH_COOKIE_NAME)
}
