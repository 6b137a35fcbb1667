// Signer + exchanger + cache against a mocked token endpoint.

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use chrono::{SecondsFormat, TimeDelta, Utc};
    use httpmock::Method::POST;
    use httpmock::MockServer;
    use serde_json::json;

    use crate::credential::sign;
    use crate::error::{AuthError, ExchangeError};
    use crate::helpers::time::SystemClock;
    use crate::sinks::EnvFileStore;
    use crate::sources::{ExchangeToken, IamExchanger};
    use crate::tests::common::test_credential;
    use crate::TokenCache;

    static TOKEN_PATH: &str = "/iam/v1/tokens";

    fn exchanger(server: &MockServer) -> IamExchanger {
        IamExchanger::new(server.url(TOKEN_PATH), Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn assertion_is_exchanged_for_token() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path(TOKEN_PATH)
                    .body_includes("\"jwt\":\"ey");
                then.status(200).json_body(json!({
                    "iamToken": "t1.9euelZqVkJ",
                    "expiresAt": "2030-02-15T03:49:28.171524891Z"
                }));
            })
            .await;

        let exchanger = exchanger(&server);
        let assertion = sign(&test_credential(), exchanger.audience(), Utc::now()).unwrap();
        let token = exchanger.exchange(&assertion).await.unwrap();

        assert_eq!(token.value, "t1.9euelZqVkJ");
        assert_eq!(
            token.expires_at.to_rfc3339_opts(SecondsFormat::Nanos, true),
            "2030-02-15T03:49:28.171524891Z"
        );
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn rejection_carries_status_and_body() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path(TOKEN_PATH);
                then.status(401)
                    .body("{\"code\":16,\"message\":\"Unauthenticated\"}");
            })
            .await;

        let exchanger = exchanger(&server);
        let assertion = sign(&test_credential(), exchanger.audience(), Utc::now()).unwrap();
        let err = exchanger.exchange(&assertion).await.unwrap_err();

        match err {
            ExchangeError::Status { status, body } => {
                assert_eq!(status, 401);
                assert!(body.contains("Unauthenticated"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn unexpected_shapes_are_malformed() {
        for body in [
            "not json at all",
            "{\"iamToken\":\"t1\"}",
            "{\"iamToken\":\"\",\"expiresAt\":\"2030-02-15T03:49:28Z\"}",
            "{\"iamToken\":\"t1\",\"expiresAt\":\"soon\"}",
        ] {
            let server = MockServer::start_async().await;
            server
                .mock_async(|when, then| {
                    when.method(POST).path(TOKEN_PATH);
                    then.status(200).body(body);
                })
                .await;

            let exchanger = exchanger(&server);
            let assertion = sign(&test_credential(), exchanger.audience(), Utc::now()).unwrap();
            let err = exchanger.exchange(&assertion).await.unwrap_err();
            assert!(
                matches!(err, ExchangeError::Malformed { status: 200, .. }),
                "body {body:?} gave {err:?}"
            );
        }
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_transport_error() {
        let exchanger =
            IamExchanger::new("http://127.0.0.1:1/iam/v1/tokens", Duration::from_secs(2)).unwrap();
        let assertion = sign(&test_credential(), exchanger.audience(), Utc::now()).unwrap();
        let err = exchanger.exchange(&assertion).await.unwrap_err();
        assert!(matches!(err, ExchangeError::Transport(_)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn cache_hits_endpoint_once_and_persists() {
        let server = MockServer::start_async().await;
        let expires_at = (Utc::now() + TimeDelta::hours(12)).to_rfc3339_opts(SecondsFormat::Secs, true);
        let mock = server
            .mock_async(|when, then| {
                when.method(POST).path(TOKEN_PATH);
                then.status(200)
                    .json_body(json!({ "iamToken": "t1.live", "expiresAt": &expires_at }));
            })
            .await;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".env");
        std::fs::write(&path, "TELEGRAM_TOKEN=123:abc\n").unwrap();

        let exchanger = exchanger(&server);
        let audience = exchanger.audience().to_owned();
        let cache = TokenCache::new(
            Arc::new(test_credential()),
            audience,
            exchanger,
            EnvFileStore::new(&path),
            Arc::new(SystemClock),
            TimeDelta::minutes(5),
        );

        let callers = (0..8).map(|_| {
            let cache = cache.clone();
            tokio::spawn(async move { cache.get_valid_token().await })
        });
        for result in futures::future::join_all(callers).await {
            assert_eq!(result.unwrap().unwrap(), "t1.live");
        }
        assert_eq!(cache.get_valid_token().await.unwrap(), "t1.live");
        assert_eq!(mock.calls(), 1);

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(
            content,
            format!("TELEGRAM_TOKEN=123:abc\nIAM_TOKEN=t1.live\nIAM_TOKEN_EXPIRES={}\n", expires_at)
        );
    }

    #[tokio::test]
    async fn endpoint_failure_surfaces_as_auth_error() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST).path(TOKEN_PATH);
                then.status(500).body("internal");
            })
            .await;

        let dir = tempfile::tempdir().unwrap();
        let exchanger = exchanger(&server);
        let audience = exchanger.audience().to_owned();
        let cache = TokenCache::new(
            Arc::new(test_credential()),
            audience,
            exchanger,
            EnvFileStore::new(dir.path().join(".env")),
            Arc::new(SystemClock),
            TimeDelta::minutes(5),
        );

        for _ in 0..2 {
            let err = cache.get_valid_token().await.unwrap_err();
            assert!(matches!(err, AuthError::Exchange(ExchangeError::Status { status: 500, .. })));
            assert!(err.is_retryable());
        }
        assert_eq!(mock.calls(), 2);
        assert!(!dir.path().join(".env").exists());
    }
}
