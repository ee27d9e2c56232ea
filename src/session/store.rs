//! Credential storage per token class
//!
//! Three backing mechanisms:
//! - [`MemoryTokenStore`]: ephemeral, lives as long as the process (the
//!   "tab"); holds the access token.
//! - [`FileTokenStore`]: persistent JSON file; holds the refresh token.
//! - [`CookieMirror`]: the transport's cookie jar. Only `Set-Cookie`
//!   headers from the server write to it and client code can see whether a
//!   cookie exists but never read its value.
//!
//! [`CredentialStore`] composes them and keeps them consistent on clear.

use chrono::{DateTime, Utc};
use cookie::Cookie;
use reqwest::header::HeaderValue;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

pub const ACCESS_COOKIE_NAME: &str = "access_token";
pub const REFRESH_COOKIE_NAME: &str = "refresh_token";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenClass {
    Access,
    Refresh,
}

impl TokenClass {
    pub const ALL: [TokenClass; 2] = [TokenClass::Access, TokenClass::Refresh];

    pub fn cookie_name(self) -> &'static str {
        match self {
            TokenClass::Access => ACCESS_COOKIE_NAME,
            TokenClass::Refresh => REFRESH_COOKIE_NAME,
        }
    }
}

impl fmt::Display for TokenClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenClass::Access => write!(f, "access"),
            TokenClass::Refresh => write!(f, "refresh"),
        }
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Token file error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Token file is not valid JSON: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub trait TokenStore: Send + Sync + fmt::Debug {
    fn get(&self) -> Option<String>;
    fn set(&self, value: &str) -> Result<(), StoreError>;
    fn clear(&self) -> Result<(), StoreError>;
}

#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    value: RwLock<Option<String>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TokenStore for MemoryTokenStore {
    fn get(&self) -> Option<String> {
        self.value
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn set(&self, value: &str) -> Result<(), StoreError> {
        *self.value.write().unwrap_or_else(PoisonError::into_inner) = Some(value.to_string());
        Ok(())
    }

    fn clear(&self) -> Result<(), StoreError> {
        *self.value.write().unwrap_or_else(PoisonError::into_inner) = None;
        Ok(())
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct PersistedToken {
    token: String,
    saved_at: DateTime<Utc>,
}

/// Token persisted to a JSON file until explicitly cleared
#[derive(Debug, Clone)]
pub struct FileTokenStore {
    path: PathBuf,
}

impl FileTokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> Result<Option<PersistedToken>, StoreError> {
        match std::fs::read(&self.path) {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

impl TokenStore for FileTokenStore {
    fn get(&self) -> Option<String> {
        match self.read() {
            Ok(persisted) => persisted.map(|p| p.token),
            Err(e) => {
                warn!(error = %e, path = %self.path.display(), "Ignoring unreadable token file");
                None
            }
        }
    }

    fn set(&self, value: &str) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let record = PersistedToken {
            token: value.to_string(),
            saved_at: Utc::now(),
        };
        // private to this write; created owner-only, never reused
        let tmp = self.path.with_extension(format!("{}.tmp", Uuid::new_v4().simple()));
        let mut options = OpenOptions::new();
        options.write(true).create_new(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        let mut file = options.open(&tmp)?;
        file.write_all(&serde_json::to_vec_pretty(&record)?)?;
        file.sync_all()?;
        drop(file);

        std::fs::rename(&tmp, &self.path)?;
        debug!(path = %self.path.display(), "Token persisted");
        Ok(())
    }

    fn clear(&self) -> Result<(), StoreError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Cookie jar plugged into the client transport (single origin)
#[derive(Debug, Default)]
pub struct CookieMirror {
    cookies: RwLock<BTreeMap<String, String>>,
}

impl CookieMirror {
    pub fn new() -> Self {
        Self::default()
    }

    /// Presence only; values stay inside the transport
    pub fn contains(&self, name: &str) -> bool {
        self.cookies
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(name)
    }

    pub fn remove(&self, name: &str) {
        self.cookies
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(name);
    }

    pub fn clear(&self) {
        self.cookies
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    fn apply_set_cookie(&self, raw: &str) {
        let parsed = match Cookie::parse(raw.to_string()) {
            Ok(c) => c,
            Err(e) => {
                debug!(error = %e, "Ignoring malformed Set-Cookie header");
                return;
            }
        };

        let expired_by_age = parsed
            .max_age()
            .map(|age| age <= cookie::time::Duration::ZERO)
            .unwrap_or(false);
        let expired_by_date = parsed
            .expires_datetime()
            .map(|at| at <= cookie::time::OffsetDateTime::now_utc())
            .unwrap_or(false);

        let mut jar = self.cookies.write().unwrap_or_else(PoisonError::into_inner);
        if expired_by_age || expired_by_date || parsed.value().is_empty() {
            jar.remove(parsed.name());
        } else {
            jar.insert(parsed.name().to_string(), parsed.value().to_string());
        }
    }
}

impl reqwest::cookie::CookieStore for CookieMirror {
    fn set_cookies(&self, cookie_headers: &mut dyn Iterator<Item = &HeaderValue>, _url: &reqwest::Url) {
        for header in cookie_headers {
            if let Ok(raw) = header.to_str() {
                self.apply_set_cookie(raw);
            }
        }
    }

    fn cookies(&self, _url: &reqwest::Url) -> Option<HeaderValue> {
        let jar = self.cookies.read().unwrap_or_else(PoisonError::into_inner);
        if jar.is_empty() {
            return None;
        }
        let joined = jar
            .iter()
            .map(|(name, value)| format!("{}={}", name, value))
            .collect::<Vec<_>>()
            .join("; ");
        HeaderValue::from_str(&joined).ok()
    }
}

#[derive(Debug, Clone)]
pub struct CredentialStore {
    access: Arc<dyn TokenStore>,
    refresh: Arc<dyn TokenStore>,
    cookies: Arc<CookieMirror>,
}

impl CredentialStore {
    pub fn new(
        access: Arc<dyn TokenStore>,
        refresh: Arc<dyn TokenStore>,
        cookies: Arc<CookieMirror>,
    ) -> Self {
        Self {
            access,
            refresh,
            cookies,
        }
    }

    /// Ephemeral access slot, refresh token persisted at `path`
    pub fn with_refresh_file(path: impl Into<PathBuf>) -> Self {
        Self::new(
            Arc::new(MemoryTokenStore::new()),
            Arc::new(FileTokenStore::new(path)),
            Arc::new(CookieMirror::new()),
        )
    }

    /// Both slots in memory
    pub fn in_memory() -> Self {
        Self::new(
            Arc::new(MemoryTokenStore::new()),
            Arc::new(MemoryTokenStore::new()),
            Arc::new(CookieMirror::new()),
        )
    }

    fn slot(&self, class: TokenClass) -> &Arc<dyn TokenStore> {
        match class {
            TokenClass::Access => &self.access,
            TokenClass::Refresh => &self.refresh,
        }
    }

    pub fn cookies(&self) -> Arc<CookieMirror> {
        self.cookies.clone()
    }

    pub fn get(&self, class: TokenClass) -> Option<String> {
        self.slot(class).get().filter(|v| !v.is_empty())
    }

    pub fn set(&self, class: TokenClass, value: &str) -> Result<(), StoreError> {
        self.slot(class).set(value)
    }

    /// Clears the client slot and the mirrored cookie of one class
    pub fn clear(&self, class: TokenClass) -> Result<(), StoreError> {
        self.cookies.remove(class.cookie_name());
        self.slot(class).clear()
    }

    /// Clears every mechanism for both classes. A failing slot does not stop
    /// the others from being cleared; its error is returned afterwards.
    pub fn clear_all(&self) -> Result<(), StoreError> {
        self.cookies.clear();
        let mut first_error = None;
        for class in TokenClass::ALL {
            if let Err(e) = self.slot(class).clear() {
                warn!(error = %e, class = %class, "Failed to clear token slot");
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
