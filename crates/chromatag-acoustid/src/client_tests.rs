// SPDX-License-Identifier: GPL-3.0-or-later

#[cfg(test)]
mod tests {
    use crate::{AcoustidClient, Meta, RateLimiter, Submission, WebServiceError};
    use chromatag_fingerprint::Fingerprint;
    use flate2::read::GzDecoder;
    use std::io::Read;
    use std::time::{Duration, Instant};
    use wiremock::matchers::{header, method, path};
    use wiremock::{Match, Mock, MockServer, Request, ResponseTemplate};

    const API_KEY: &str = "test-key";
    const FINGERPRINT: &str = "AQADtNIyRUkkZUqS";

    /// Matches a form field inside a gzip-compressed request body.
    struct GzipFormParam {
        key: &'static str,
        value: String,
    }

    fn form_param(key: &'static str, value: impl Into<String>) -> GzipFormParam {
        GzipFormParam {
            key,
            value: value.into(),
        }
    }

    impl Match for GzipFormParam {
        fn matches(&self, request: &Request) -> bool {
            let mut form = String::new();
            if GzDecoder::new(request.body.as_slice())
                .read_to_string(&mut form)
                .is_err()
            {
                return false;
            }
            url::form_urlencoded::parse(form.as_bytes())
                .any(|(k, v)| k == self.key && v == self.value)
        }
    }

    fn fingerprint() -> Fingerprint {
        Fingerprint::new(FINGERPRINT, 215.3)
    }

    fn one_match_response() -> serde_json::Value {
        serde_json::json!({
            "status": "ok",
            "results": [{
                "id": "9ff43b6a-4f16-427c-93c2-92307ca505e0",
                "score": 0.95,
                "recordings": [{
                    "id": "abc-123",
                    "title": "Song",
                    "artists": [{"id": "89ad4ac3-39f7-470e-963a-56509c546377", "name": "Band"}]
                }]
            }]
        })
    }

    fn client_for(server: &MockServer) -> AcoustidClient {
        AcoustidClient::builder(API_KEY)
            .base_url(server.uri())
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_lookup_sends_compressed_form() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/lookup"))
            .and(header("content-encoding", "gzip"))
            .and(header("content-type", "application/x-www-form-urlencoded"))
            .and(form_param("client", API_KEY))
            .and(form_param("fingerprint", FINGERPRINT))
            .and(form_param("duration", "215"))
            .and(form_param("meta", "recordings releasegroups"))
            .and(form_param("format", "json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(one_match_response()))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = client_for(&mock_server);
        let response = client
            .lookup(&fingerprint(), &[Meta::Recordings, Meta::ReleaseGroups])
            .await
            .unwrap();

        assert_eq!(response.status, "ok");
        let results = response.results.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].recordings[0].id, "abc-123");
    }

    #[tokio::test]
    async fn test_lookup_matches() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/lookup"))
            .and(form_param("meta", "recordings"))
            .respond_with(ResponseTemplate::new(200).set_body_json(one_match_response()))
            .mount(&mock_server)
            .await;

        let client = client_for(&mock_server);
        let matches: Vec<_> = client
            .lookup_matches(&fingerprint())
            .await
            .unwrap()
            .collect();

        assert_eq!(matches.len(), 1);
        assert!((matches[0].score - 0.95).abs() < 1e-6);
        assert_eq!(matches[0].recording_id, "abc-123");
        assert_eq!(matches[0].title.as_deref(), Some("Song"));
        assert_eq!(matches[0].artist.as_deref(), Some("Band"));
    }

    #[tokio::test]
    async fn test_lookup_empty_results() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/lookup"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"status": "ok", "results": []})),
            )
            .mount(&mock_server)
            .await;

        let client = client_for(&mock_server);
        let matches = client.lookup_matches(&fingerprint()).await.unwrap();

        assert_eq!(matches.count(), 0);
    }

    #[tokio::test]
    async fn test_lookup_error_status() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/lookup"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status": "error",
                "error": {"code": 4, "message": "invalid API key"}
            })))
            .mount(&mock_server)
            .await;

        let client = client_for(&mock_server);
        let err = client.lookup(&fingerprint(), &[]).await.unwrap_err();

        match err {
            WebServiceError::Service { code, message } => {
                assert_eq!(code, Some(4));
                assert_eq!(message, "invalid API key");
            }
            other => panic!("expected Service error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_lookup_http_error_with_json_body() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/lookup"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "status": "error",
                "error": {"code": 6, "message": "invalid fingerprint"}
            })))
            .mount(&mock_server)
            .await;

        let client = client_for(&mock_server);
        let err = client.lookup(&fingerprint(), &[]).await.unwrap_err();

        match err {
            WebServiceError::Http { status, message } => {
                assert_eq!(status, 400);
                assert_eq!(message, "invalid fingerprint");
            }
            other => panic!("expected Http error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_lookup_server_error() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/lookup"))
            .respond_with(ResponseTemplate::new(503).set_body_string("Service Unavailable"))
            .mount(&mock_server)
            .await;

        let client = client_for(&mock_server);
        let err = client.lookup(&fingerprint(), &[]).await.unwrap_err();

        assert!(matches!(err, WebServiceError::Http { status: 503, .. }));
        assert!(err.to_string().contains("Service Unavailable"));
    }

    #[tokio::test]
    async fn test_lookup_invalid_json() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/lookup"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&mock_server)
            .await;

        let client = client_for(&mock_server);
        let err = client.lookup(&fingerprint(), &[]).await.unwrap_err();

        assert!(matches!(err, WebServiceError::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn test_lookup_rejects_invalid_fingerprint_without_request() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(one_match_response()))
            .expect(0)
            .mount(&mock_server)
            .await;

        let client = client_for(&mock_server);
        let err = client
            .lookup(&Fingerprint::new("", 120.0), &[])
            .await
            .unwrap_err();

        assert!(matches!(err, WebServiceError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn test_custom_base_url_is_used() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/mirror/v2/lookup"))
            .respond_with(ResponseTemplate::new(200).set_body_json(one_match_response()))
            .expect(1)
            .mount(&mock_server)
            .await;

        Mock::given(method("POST"))
            .and(path("/mirror/v2/submit"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status": "ok",
                "submissions": [{"index": "0", "id": 7, "status": "pending"}]
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        // Trailing slash is tolerated
        let client = AcoustidClient::builder(API_KEY)
            .base_url(format!("{}/mirror/v2/", mock_server.uri()))
            .build()
            .unwrap();

        assert_eq!(
            client.lookup_url(),
            format!("{}/mirror/v2/lookup", mock_server.uri())
        );

        client.lookup(&fingerprint(), &[]).await.unwrap();
        client
            .submit("user-key", &[Submission::new(&fingerprint())])
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_submit_indexed_fields() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/submit"))
            .and(form_param("client", API_KEY))
            .and(form_param("user", "user-key"))
            .and(form_param("fingerprint.0", FINGERPRINT))
            .and(form_param("duration.0", "215"))
            .and(form_param("track.0", "Song"))
            .and(form_param("mbid.1", "abc-123"))
            .and(form_param("duration.1", "180"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status": "ok",
                "submissions": [
                    {"index": "0", "id": 101, "status": "pending"},
                    {"index": "1", "id": 102, "status": "pending"}
                ]
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = client_for(&mock_server);
        let submissions = [
            Submission::new(&fingerprint()).track("Song"),
            Submission::new(&Fingerprint::new("AQADdEkyaUmSJEqU", 180.0)).mbid("abc-123"),
        ];
        let statuses = client.submit("user-key", &submissions).await.unwrap();

        assert_eq!(statuses.len(), 2);
        assert_eq!(statuses[0].id, 101);
        assert_eq!(statuses[1].id, 102);
        assert!(!statuses[0].is_imported());
    }

    #[tokio::test]
    async fn test_submit_requires_submissions() {
        let client = AcoustidClient::new(API_KEY).unwrap();
        let err = client.submit("user-key", &[]).await.unwrap_err();
        assert!(matches!(err, WebServiceError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn test_submit_rejects_missing_duration() {
        let client = AcoustidClient::new(API_KEY).unwrap();
        let submission = Submission {
            fingerprint: FINGERPRINT.to_string(),
            ..Submission::default()
        };
        let err = client.submit("user-key", &[submission]).await.unwrap_err();
        assert!(matches!(err, WebServiceError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn test_submission_status() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/submission_status"))
            .and(form_param("id", "101"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status": "ok",
                "submissions": [{
                    "id": 101,
                    "status": "imported",
                    "result": {"id": "9ff43b6a-4f16-427c-93c2-92307ca505e0"}
                }]
            })))
            .mount(&mock_server)
            .await;

        let client = client_for(&mock_server);
        let status = client.submission_status(101).await.unwrap();

        assert!(status.is_imported());
        assert_eq!(status.acoustid(), Some("9ff43b6a-4f16-427c-93c2-92307ca505e0"));
    }

    #[tokio::test]
    async fn test_submission_status_missing_from_response() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/submission_status"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"status": "ok", "submissions": []})),
            )
            .mount(&mock_server)
            .await;

        let client = client_for(&mock_server);
        let err = client.submission_status(101).await.unwrap_err();

        assert!(matches!(err, WebServiceError::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn test_injected_rate_limiter_is_shared() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/lookup"))
            .respond_with(ResponseTemplate::new(200).set_body_json(one_match_response()))
            .expect(2)
            .mount(&mock_server)
            .await;

        let limiter = RateLimiter::new(1, Duration::from_millis(300));
        let first = AcoustidClient::builder(API_KEY)
            .base_url(mock_server.uri())
            .rate_limiter(limiter.clone())
            .build()
            .unwrap();
        let second = AcoustidClient::builder(API_KEY)
            .base_url(mock_server.uri())
            .rate_limiter(limiter)
            .build()
            .unwrap();

        let start = Instant::now();
        first.lookup(&fingerprint(), &[]).await.unwrap();
        second.lookup(&fingerprint(), &[]).await.unwrap();

        assert!(
            start.elapsed() >= Duration::from_millis(300),
            "expected >= 300ms, got {:?}",
            start.elapsed()
        );
    }

    #[test]
    fn test_invalid_base_url() {
        let result = AcoustidClient::builder(API_KEY)
            .base_url("not-a-valid-url")
            .build();
        assert!(result.is_err());

        let result = AcoustidClient::builder(API_KEY)
            .base_url("ht!tp://invalid")
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_default_configuration() {
        let client = AcoustidClient::new(API_KEY).unwrap();
        assert_eq!(client.base_url(), "https://api.acoustid.org/v2");
        assert_eq!(client.rate_limiter().max_requests(), 3);
        assert_eq!(client.rate_limiter().window(), Duration::from_secs(1));
    }
}
