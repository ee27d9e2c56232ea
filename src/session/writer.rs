//! Session cookies written at the server boundary

use axum::http::{header::SET_COOKIE, HeaderMap, HeaderValue};
use cookie::{time::Duration, Cookie};
use tracing::{debug, error};

use super::store::TokenClass;
use super::TokenPair;
use crate::common::config::CookieConfig;
use crate::common::ApiError;

#[derive(Debug, Clone)]
pub struct CookieSessionWriter {
    config: CookieConfig,
}

impl CookieSessionWriter {
    pub fn new(config: CookieConfig) -> Self {
        Self { config }
    }

    fn max_age(&self, class: TokenClass) -> Duration {
        match class {
            TokenClass::Access => Duration::seconds(self.config.access_max_age_secs),
            TokenClass::Refresh => Duration::seconds(self.config.refresh_max_age_secs),
        }
    }

    fn build(&self, class: TokenClass, value: String) -> Cookie<'static> {
        Cookie::build((class.cookie_name(), value))
            .http_only(true)
            .secure(self.config.secure)
            .same_site(self.config.same_site)
            .path("/")
            .max_age(self.max_age(class))
            .build()
    }

    /// Appends both session cookies. Nothing is appended unless both values
    /// are valid header content.
    pub fn commit(&self, headers: &mut HeaderMap, pair: &TokenPair) -> Result<(), ApiError> {
        let mut values = Vec::with_capacity(2);
        for (class, token) in [
            (TokenClass::Access, &pair.access_token),
            (TokenClass::Refresh, &pair.refresh_token),
        ] {
            let cookie = self.build(class, token.clone());
            let value = HeaderValue::from_str(&cookie.to_string()).map_err(|e| {
                error!(error = %e, class = %class, "Token is not valid cookie content");
                ApiError::internal()
            })?;
            values.push(value);
        }

        for value in values {
            headers.append(SET_COOKIE, value);
        }
        debug!("Session cookies committed");
        Ok(())
    }

    /// Appends removal cookies for both names
    pub fn revoke(&self, headers: &mut HeaderMap) {
        for class in TokenClass::ALL {
            let mut cookie = self.build(class, String::new());
            cookie.make_removal();
            if let Ok(value) = HeaderValue::from_str(&cookie.to_string()) {
                headers.append(SET_COOKIE, value);
            }
        }
        debug!("Session cookies revoked");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cookie::SameSite;

    fn writer() -> CookieSessionWriter {
        CookieSessionWriter::new(CookieConfig::default())
    }

    fn set_cookies(headers: &HeaderMap) -> Vec<Cookie<'static>> {
        headers
            .get_all(SET_COOKIE)
            .iter()
            .map(|v| Cookie::parse(v.to_str().unwrap().to_string()).unwrap())
            .collect()
    }

    #[test]
    fn test_commit_sets_both_cookies_with_class_max_age() {
        let mut headers = HeaderMap::new();
        let pair = TokenPair::new("A", "R");
        writer().commit(&mut headers, &pair).unwrap();

        let cookies = set_cookies(&headers);
        assert_eq!(cookies.len(), 2);

        let access = cookies.iter().find(|c| c.name() == "access_token").unwrap();
        assert_eq!(access.value(), "A");
        assert_eq!(access.max_age(), Some(Duration::seconds(900)));
        assert_eq!(access.http_only(), Some(true));
        assert_eq!(access.secure(), Some(true));
        assert_eq!(access.same_site(), Some(SameSite::Lax));
        assert_eq!(access.path(), Some("/"));

        let refresh = cookies.iter().find(|c| c.name() == "refresh_token").unwrap();
        assert_eq!(refresh.value(), "R");
        assert_eq!(refresh.max_age(), Some(Duration::seconds(2_592_000)));
        assert_eq!(refresh.http_only(), Some(true));
    }

    #[test]
    fn test_commit_rejects_unencodable_token_without_partial_write() {
        let mut headers = HeaderMap::new();
        let pair = TokenPair::new("A", "bad\nvalue");
        assert!(writer().commit(&mut headers, &pair).is_err());
        assert!(headers.get(SET_COOKIE).is_none());
    }

    #[test]
    fn test_revoke_expires_both_cookies() {
        let mut headers = HeaderMap::new();
        writer().revoke(&mut headers);

        let cookies = set_cookies(&headers);
        assert_eq!(cookies.len(), 2);
        for cookie in cookies {
            assert!(cookie.value().is_empty());
            assert_eq!(cookie.max_age(), Some(Duration::ZERO));
            assert_eq!(cookie.path(), Some("/"));
        }
    }

    #[test]
    fn test_strict_same_site_and_insecure_for_local_http() {
        let writer = CookieSessionWriter::new(CookieConfig {
            secure: false,
            same_site: SameSite::Strict,
            ..CookieConfig::default()
        });
        let mut headers = HeaderMap::new();
        writer.commit(&mut headers, &TokenPair::new("A", "R")).unwrap();
        let cookie = &set_cookies(&headers)[0];
        assert_eq!(cookie.same_site(), Some(SameSite::Strict));
        assert_ne!(cookie.secure(), Some(true));
    }
}
