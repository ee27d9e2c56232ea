//! Refresh-and-retry behaviour of the gateway against a fake backend

#[cfg(test)]
mod tests {
    use axum::http::{HeaderMap, StatusCode};
    use reqwest::Client;
    use std::sync::atomic::Ordering;

    use crate::services::BackendService;
    use crate::session::gateway::Anonymous;
    use crate::session::{
        CallOptions, CookieSessionWriter, RefreshOutcome, RequestSession, TokenSource,
    };
    use crate::common::CookieConfig;
    use crate::testing::{dead_url, spawn_backend};

    fn session(base_url: &str, access: &str, refresh: Option<&str>) -> (BackendService, RequestSession) {
        let backend = BackendService::new(Client::new(), base_url);
        let session = RequestSession::new(
            backend.clone(),
            Some(access.to_string()),
            refresh.map(str::to_string),
        );
        (backend, session)
    }

    #[tokio::test]
    async fn test_one_401_then_refresh_means_two_calls_and_one_refresh() {
        let (url, fake) = spawn_backend().await;
        let (backend, session) = session(&url, "stale", Some("R"));

        let response = backend
            .gateway()
            .call(&session, "/campaigns", &CallOptions::get())
            .await
            .unwrap();

        assert_eq!(response.status(), 200);
        assert_eq!(fake.hits("GET /campaigns"), 2);
        assert_eq!(fake.hits("POST /auth/refresh"), 1);
        assert_eq!(session.access_token().await.as_deref(), Some("A-1"));
        match session.outcome().await {
            RefreshOutcome::Refreshed(pair) => {
                assert_eq!(pair.access_token, "A-1");
                assert_eq!(pair.refresh_token, "R-1");
            }
            other => panic!("unexpected outcome {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_failed_refresh_returns_original_401_without_retry() {
        let (url, fake) = spawn_backend().await;
        fake.refresh_enabled.store(false, Ordering::SeqCst);
        let (backend, session) = session(&url, "stale", Some("R"));

        let response = backend
            .gateway()
            .call(&session, "/campaigns", &CallOptions::get())
            .await
            .unwrap();

        assert_eq!(response.status(), 401);
        let body: serde_json::Value = response.json().await.unwrap();
        assert_eq!(body["message"], "Token expired");
        assert_eq!(fake.hits("GET /campaigns"), 1);
        assert_eq!(fake.hits("POST /auth/refresh"), 1);
        assert_eq!(session.outcome().await, RefreshOutcome::Failed);
    }

    #[tokio::test]
    async fn test_second_401_is_returned_without_another_refresh() {
        let (url, fake) = spawn_backend().await;
        let (backend, session) = session(&url, "A", Some("R"));

        let response = backend
            .gateway()
            .call(&session, "/locked", &CallOptions::get())
            .await
            .unwrap();

        assert_eq!(response.status(), 401);
        assert_eq!(fake.hits("GET /locked"), 2);
        assert_eq!(fake.hits("POST /auth/refresh"), 1);

        // refreshed, then still unauthorized: the session ends
        let writer = CookieSessionWriter::new(CookieConfig::default());
        let mut headers = HeaderMap::new();
        session
            .apply_to(&writer, &mut headers, StatusCode::UNAUTHORIZED)
            .await;
        let set: Vec<_> = headers.get_all("set-cookie").iter().collect();
        assert_eq!(set.len(), 2);
        assert!(set.iter().all(|v| v.to_str().unwrap().contains("Max-Age=0")));
    }

    #[tokio::test]
    async fn test_success_is_returned_untouched() {
        let (url, fake) = spawn_backend().await;
        let (backend, session) = session(&url, "A", Some("R"));

        let response = backend
            .gateway()
            .call(&session, "/creators", &CallOptions::get())
            .await
            .unwrap();

        assert_eq!(response.status(), 200);
        assert_eq!(fake.hits("GET /creators"), 1);
        assert_eq!(fake.hits("POST /auth/refresh"), 0);
        assert_eq!(session.outcome().await, RefreshOutcome::NotAttempted);
    }

    #[tokio::test]
    async fn test_non_401_errors_do_not_trigger_refresh() {
        let (url, fake) = spawn_backend().await;
        let (backend, session) = session(&url, "A", Some("R"));

        let response = backend
            .gateway()
            .call(&session, "/campaigns/missing", &CallOptions::get())
            .await
            .unwrap();

        assert_eq!(response.status(), 404);
        assert_eq!(fake.hits("POST /auth/refresh"), 0);
    }

    #[tokio::test]
    async fn test_without_refresh_token_nothing_is_attempted() {
        let (url, fake) = spawn_backend().await;
        let (backend, session) = session(&url, "stale", None);

        let response = backend
            .gateway()
            .call(&session, "/campaigns", &CallOptions::get())
            .await
            .unwrap();

        assert_eq!(response.status(), 401);
        assert_eq!(fake.hits("POST /auth/refresh"), 0);
        assert_eq!(session.outcome().await, RefreshOutcome::NotAttempted);
    }

    #[tokio::test]
    async fn test_unreachable_backend_is_a_transport_error() {
        let url = dead_url().await;
        let backend = BackendService::new(Client::new(), url);

        let err = backend
            .gateway()
            .call(&Anonymous, "/campaigns", &CallOptions::get())
            .await
            .unwrap_err();

        assert!(err.is_transport());
        assert_eq!(err.context.as_deref(), Some("/campaigns"));
    }

    #[tokio::test]
    async fn test_backend_refresh_reads_rotated_cookies() {
        let (url, _fake) = spawn_backend().await;
        let backend = BackendService::new(Client::new(), url);

        let pair = backend.refresh("R").await.unwrap();
        assert_eq!(pair.access_token, "A-1");
        assert_eq!(pair.refresh_token, "R-1");

        let err = backend.refresh("R").await.unwrap_err();
        assert!(err.is_unauthorized());
    }
}
