// src/services/identity_cache.rs
//! Short-lived cache of `/auth/me` results.
//!
//! Entries are keyed by the exact access token the backend accepted, never
//! by decoded claims, so a forged token cannot hit another user's entry.
//! The subject stored alongside comes from the backend's user record.

use chrono::{DateTime, Duration, Utc};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;
use tracing::{debug, info};

#[derive(Debug, Clone)]
struct CachedIdentity {
    user: Value,
    subject: Option<String>,
    expires_at: DateTime<Utc>,
    seq: u64,
}

#[derive(Debug)]
pub struct IdentityCache {
    entries: RwLock<HashMap<String, CachedIdentity>>,
    ttl: Duration,
    capacity: usize,
    next_seq: AtomicU64,
}

/// `id` > `_id` > `userId`, numbers stringified
fn user_subject(user: &Value) -> Option<String> {
    ["id", "_id", "userId"]
        .iter()
        .filter_map(|key| user.get(*key))
        .find_map(|v| match v {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
}

impl IdentityCache {
    pub fn new(ttl_secs: i64, capacity: usize) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl: Duration::seconds(ttl_secs.max(0)),
            capacity: capacity.max(1),
            next_seq: AtomicU64::new(0),
        }
    }

    pub async fn get(&self, access_token: &str) -> Option<Value> {
        let entries = self.entries.read().await;
        let cached = entries.get(access_token)?;
        if cached.expires_at > Utc::now() {
            debug!("Identity retrieved from cache");
            Some(cached.user.clone())
        } else {
            None
        }
    }

    pub async fn insert(&self, access_token: &str, user: Value) {
        if self.ttl <= Duration::zero() {
            return;
        }

        let now = Utc::now();
        let mut entries = self.entries.write().await;
        if entries.len() >= self.capacity && !entries.contains_key(access_token) {
            entries.retain(|_, cached| cached.expires_at > now);
            if entries.len() >= self.capacity {
                // still full: drop whatever expires first
                if let Some(oldest) = entries
                    .iter()
                    .min_by_key(|(_, cached)| (cached.expires_at, cached.seq))
                    .map(|(key, _)| key.clone())
                {
                    entries.remove(&oldest);
                }
            }
        }

        entries.insert(
            access_token.to_string(),
            CachedIdentity {
                subject: user_subject(&user),
                user,
                expires_at: now + self.ttl,
                seq: self.next_seq.fetch_add(1, Ordering::Relaxed),
            },
        );
    }

    /// Logout path
    pub async fn invalidate_token(&self, access_token: &str) {
        if self.entries.write().await.remove(access_token).is_some() {
            debug!("Identity cache entry invalidated");
        }
    }

    /// Drops every entry of one user, e.g. after a profile or role change
    pub async fn invalidate_subject(&self, subject: &str) {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, cached| cached.subject.as_deref() != Some(subject));
        let removed = before - entries.len();
        if removed > 0 {
            info!(removed = removed, "Identity cache invalidated for subject");
        }
    }

    /// Subject of a cached entry, if the token is cached
    pub async fn subject_for(&self, access_token: &str) -> Option<String> {
        self.entries
            .read()
            .await
            .get(access_token)
            .and_then(|cached| cached.subject.clone())
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_insert_and_get() {
        let cache = IdentityCache::new(60, 10);
        cache.insert("A", json!({ "id": "u1", "email": "a@b.com" })).await;
        assert_eq!(cache.get("A").await.unwrap()["id"], "u1");
        assert!(cache.get("B").await.is_none());
    }

    #[tokio::test]
    async fn test_zero_ttl_disables_caching() {
        let cache = IdentityCache::new(0, 10);
        cache.insert("A", json!({ "id": "u1" })).await;
        assert!(cache.get("A").await.is_none());
        assert_eq!(cache.len().await, 0);
    }

    #[tokio::test]
    async fn test_invalidate_token() {
        let cache = IdentityCache::new(60, 10);
        cache.insert("A", json!({ "id": "u1" })).await;
        cache.invalidate_token("A").await;
        assert!(cache.get("A").await.is_none());
    }

    #[tokio::test]
    async fn test_invalidate_subject_drops_every_token_of_user() {
        let cache = IdentityCache::new(60, 10);
        cache.insert("A1", json!({ "id": "u1" })).await;
        cache.insert("A2", json!({ "_id": "u1" })).await;
        cache.insert("B", json!({ "id": 7 })).await;

        assert_eq!(cache.subject_for("B").await.as_deref(), Some("7"));
        cache.invalidate_subject("u1").await;

        assert!(cache.get("A1").await.is_none());
        assert!(cache.get("A2").await.is_none());
        assert!(cache.get("B").await.is_some());
    }

    #[tokio::test]
    async fn test_capacity_is_bounded() {
        let cache = IdentityCache::new(60, 2);
        cache.insert("A", json!({ "id": "a" })).await;
        cache.insert("B", json!({ "id": "b" })).await;
        cache.insert("C", json!({ "id": "c" })).await;

        assert_eq!(cache.len().await, 2);
        assert!(cache.get("A").await.is_none());
        assert!(cache.get("C").await.is_some());
    }
}
