// src/services/shared_refresh.rs
//! One backend refresh per refresh token.
//!
//! Parallel requests carrying the same refresh cookie would otherwise each
//! exchange it, and with rotating refresh tokens every exchange after the
//! first is refused. Callers presenting the same token share one exchange,
//! and its outcome is kept for a short window so late arrivals get the same
//! pair. Transport failures are not kept.

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{Mutex, OnceCell};
use tracing::debug;

use crate::session::{ApiClientError, TokenPair};

pub const DEFAULT_REUSE_WINDOW_SECS: i64 = 30;

type Outcome = Result<TokenPair, ApiClientError>;

struct Entry {
    outcome: Arc<OnceCell<Outcome>>,
    started_at: DateTime<Utc>,
}

pub struct SharedRefresh {
    entries: Mutex<HashMap<String, Entry>>,
    window: Duration,
}

impl fmt::Debug for SharedRefresh {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // keys are refresh tokens
        f.debug_struct("SharedRefresh")
            .field("window", &self.window)
            .finish_non_exhaustive()
    }
}

impl Default for SharedRefresh {
    fn default() -> Self {
        Self::new(DEFAULT_REUSE_WINDOW_SECS)
    }
}

impl SharedRefresh {
    pub fn new(window_secs: i64) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            window: Duration::seconds(window_secs.max(1)),
        }
    }

    /// Runs `exchange` unless an exchange of `refresh_token` is in flight or
    /// finished within the window, in which case its outcome is returned.
    pub async fn run<F, Fut>(&self, refresh_token: &str, exchange: F) -> Outcome
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Outcome>,
    {
        let cell = {
            let now = Utc::now();
            let mut entries = self.entries.lock().await;
            entries.retain(|_, entry| now - entry.started_at < self.window);
            entries
                .entry(refresh_token.to_string())
                .or_insert_with(|| Entry {
                    outcome: Arc::new(OnceCell::new()),
                    started_at: now,
                })
                .outcome
                .clone()
        };

        if cell.initialized() {
            debug!("Reusing a recent refresh outcome");
        }
        let outcome = cell.get_or_init(exchange).await.clone();

        if matches!(&outcome, Err(e) if e.is_transport()) {
            let mut entries = self.entries.lock().await;
            if entries
                .get(refresh_token)
                .is_some_and(|entry| Arc::ptr_eq(&entry.outcome, &cell))
            {
                entries.remove(refresh_token);
            }
        }
        outcome
    }
}
