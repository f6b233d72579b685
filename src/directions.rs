//! Traffic-aware travel-time queries against the Google Directions API.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Url;
use serde_json::Value;
use tracing::{debug, warn};

use crate::fetch::{HttpClient, fetch_text};
use crate::stats::round_minutes;

pub const DEFAULT_DIRECTIONS_URL: &str = "https://maps.googleapis.com/maps/api/directions/json";

/// Environment variable holding the API credential.
pub const API_KEY_ENV: &str = "GOOGLE_MAPS_KEY";

const DURATION_POINTER: &str = "/routes/0/legs/0/duration_in_traffic/value";

/// Why a single directions query produced no usable measurement.
#[derive(Debug, thiserror::Error)]
pub enum QueryFailure {
    #[error("GOOGLE_MAPS_KEY is not set")]
    MissingApiKey,

    /// The URL is stripped since it carries the API key.
    #[error("request failed: {0}")]
    Transport(reqwest::Error),

    #[error("directions API returned HTTP {0}")]
    HttpStatus(u16),

    #[error("response is not valid JSON: {0}")]
    MalformedResponse(#[from] serde_json::Error),

    #[error("response has no traffic duration (status: {})", .status.as_deref().unwrap_or("unknown"))]
    MissingDuration { status: Option<String> },
}

impl From<reqwest::Error> for QueryFailure {
    fn from(e: reqwest::Error) -> Self {
        QueryFailure::Transport(e.without_url())
    }
}

/// Source of travel-time measurements.
#[async_trait]
pub trait DirectionsApi: Send + Sync {
    /// Travel time in whole minutes from `origin` to `destination`, departing now.
    async fn travel_minutes(&self, origin: &str, destination: &str) -> Result<u32, QueryFailure>;
}

/// Extracts `routes[0].legs[0].duration_in_traffic.value` (seconds) and converts it to minutes.
pub fn parse_duration_minutes(body: &str) -> Result<u32, QueryFailure> {
    let json: Value = serde_json::from_str(body)?;

    match json.pointer(DURATION_POINTER).and_then(Value::as_f64) {
        Some(secs) if secs >= 0.0 => Ok(round_minutes(secs / 60.0)),
        _ => Err(QueryFailure::MissingDuration {
            status: json.get("status").and_then(Value::as_str).map(str::to_owned),
        }),
    }
}

/// [`DirectionsApi`] backed by the HTTP endpoint. The credential is expected
/// to be applied by the client (see [`crate::fetch::auth::UrlParam`]).
pub struct GoogleDirections<C> {
    client: C,
    endpoint: Url,
}

impl<C: HttpClient> GoogleDirections<C> {
    pub fn new(client: C, endpoint: &str) -> Result<Self> {
        let endpoint = Url::parse(endpoint)
            .with_context(|| format!("Invalid directions endpoint '{endpoint}'"))?;
        Ok(Self { client, endpoint })
    }

    fn request_url(&self, origin: &str, destination: &str) -> Url {
        let mut url = self.endpoint.clone();
        url.query_pairs_mut()
            .append_pair("origin", origin)
            .append_pair("destination", destination)
            .append_pair("departure_time", "now");
        url
    }
}

#[async_trait]
impl<C: HttpClient> DirectionsApi for GoogleDirections<C> {
    #[tracing::instrument(skip(self))]
    async fn travel_minutes(&self, origin: &str, destination: &str) -> Result<u32, QueryFailure> {
        let (status, body) = fetch_text(&self.client, self.request_url(origin, destination)).await?;

        if !status.is_success() {
            warn!(status = %status, response = %body, "Directions API returned an error status");
            return Err(QueryFailure::HttpStatus(status.as_u16()));
        }

        match parse_duration_minutes(&body) {
            Ok(minutes) => {
                debug!(minutes, "Directions response parsed");
                Ok(minutes)
            }
            Err(e) => {
                warn!(error = %e, response = %body, "Unusable directions response");
                Err(e)
            }
        }
    }
}

/// Stand-in used when no credential is configured: every query fails without
/// touching the network.
pub struct MissingCredential;

#[async_trait]
impl DirectionsApi for MissingCredential {
    async fn travel_minutes(&self, _origin: &str, _destination: &str) -> Result<u32, QueryFailure> {
        Err(QueryFailure::MissingApiKey)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::BasicClient;
    use crate::fetch::auth::UrlParam;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    /// Answers every request with a fixed status and body, remembering the URLs it saw.
    #[derive(Clone)]
    struct CannedClient {
        status: u16,
        body: &'static str,
        seen: Arc<Mutex<Vec<Url>>>,
    }

    impl CannedClient {
        fn new(status: u16, body: &'static str) -> Self {
            Self {
                status,
                body,
                seen: Arc::new(Mutex::new(Vec::new())),
            }
        }
    }

    #[async_trait]
    impl HttpClient for CannedClient {
        async fn execute(&self, req: reqwest::Request) -> reqwest::Result<reqwest::Response> {
            self.seen.lock().unwrap().push(req.url().clone());
            let resp = http::Response::builder()
                .status(self.status)
                .body(self.body)
                .unwrap();
            Ok(reqwest::Response::from(resp))
        }
    }

    const OK_BODY: &str = r#"{
        "status": "OK",
        "routes": [{
            "legs": [{
                "duration": {"text": "25 mins", "value": 1500},
                "duration_in_traffic": {"text": "31 mins", "value": 1850}
            }]
        }]
    }"#;

    #[test]
    fn test_parse_duration_in_traffic() {
        // 1850s = 30.83 min
        assert_eq!(parse_duration_minutes(OK_BODY).unwrap(), 31);
    }

    #[test]
    fn test_parse_rounds_half_minute_up() {
        let body = r#"{"routes":[{"legs":[{"duration_in_traffic":{"value":90}}]}]}"#;
        assert_eq!(parse_duration_minutes(body).unwrap(), 2);
    }

    #[test]
    fn test_parse_denied_request() {
        let body = r#"{"error_message": "The provided API key is invalid.", "routes": [], "status": "REQUEST_DENIED"}"#;
        match parse_duration_minutes(body) {
            Err(QueryFailure::MissingDuration { status }) => {
                assert_eq!(status.as_deref(), Some("REQUEST_DENIED"))
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_parse_without_traffic_field() {
        let body = r#"{"status":"OK","routes":[{"legs":[{"duration":{"value":1500}}]}]}"#;
        assert!(matches!(
            parse_duration_minutes(body),
            Err(QueryFailure::MissingDuration { .. })
        ));
    }

    #[test]
    fn test_parse_negative_duration() {
        let body = r#"{"routes":[{"legs":[{"duration_in_traffic":{"value":-60}}]}]}"#;
        assert!(parse_duration_minutes(body).is_err());
    }

    #[test]
    fn test_parse_not_json() {
        assert!(matches!(
            parse_duration_minutes("<html>502</html>"),
            Err(QueryFailure::MalformedResponse(_))
        ));
    }

    #[test]
    fn test_request_url_carries_route_and_departure() {
        let client = BasicClient::with_timeout(Duration::from_secs(1)).unwrap();
        let api = GoogleDirections::new(client, DEFAULT_DIRECTIONS_URL).unwrap();

        let url = api.request_url("18.5376206,73.936613", "18.5502336,73.8942478");
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();

        assert_eq!(
            pairs,
            vec![
                ("origin".to_string(), "18.5376206,73.936613".to_string()),
                ("destination".to_string(), "18.5502336,73.8942478".to_string()),
                ("departure_time".to_string(), "now".to_string()),
            ]
        );
    }

    #[test]
    fn test_invalid_endpoint_rejected() {
        let client = BasicClient::with_timeout(Duration::from_secs(1)).unwrap();
        assert!(GoogleDirections::new(client, "not a url").is_err());
    }

    #[tokio::test]
    async fn test_travel_minutes_from_http_body() {
        let api = GoogleDirections::new(CannedClient::new(200, OK_BODY), DEFAULT_DIRECTIONS_URL).unwrap();
        assert_eq!(api.travel_minutes("1,2", "3,4").await.unwrap(), 31);
    }

    #[tokio::test]
    async fn test_error_status_is_http_failure() {
        let api = GoogleDirections::new(
            CannedClient::new(503, "upstream unavailable"),
            DEFAULT_DIRECTIONS_URL,
        )
        .unwrap();

        let result = api.travel_minutes("1,2", "3,4").await;
        assert!(matches!(result, Err(QueryFailure::HttpStatus(503))));

        let api = GoogleDirections::new(CannedClient::new(403, "{}"), DEFAULT_DIRECTIONS_URL).unwrap();
        assert!(matches!(
            api.travel_minutes("1,2", "3,4").await,
            Err(QueryFailure::HttpStatus(403))
        ));
    }

    #[tokio::test]
    async fn test_url_param_appends_key() {
        let transport = CannedClient::new(200, OK_BODY);
        let seen = transport.seen.clone();
        let client = UrlParam::new(transport, "key", "test-key".to_string());
        let api = GoogleDirections::new(client, DEFAULT_DIRECTIONS_URL).unwrap();

        api.travel_minutes("1,2", "3,4").await.unwrap();

        let urls = seen.lock().unwrap();
        assert_eq!(urls.len(), 1);
        let pairs: Vec<(String, String)> = urls[0].query_pairs().into_owned().collect();
        assert_eq!(pairs.last(), Some(&("key".to_string(), "test-key".to_string())));
        assert!(pairs.contains(&("departure_time".to_string(), "now".to_string())));
    }

    #[tokio::test]
    async fn test_transport_error_hides_api_key() {
        // Nothing listens on port 1, so the connection is refused.
        let transport = BasicClient::with_timeout(Duration::from_secs(2)).unwrap();
        let client = UrlParam::new(transport, "key", "SECRET_KEY_123".to_string());
        let api = GoogleDirections::new(client, "http://127.0.0.1:1/maps/api/directions/json").unwrap();

        let err = api.travel_minutes("1,2", "3,4").await.unwrap_err();

        assert!(matches!(err, QueryFailure::Transport(_)));
        assert!(!err.to_string().contains("SECRET_KEY_123"));
        assert!(!format!("{err:?}").contains("SECRET_KEY_123"));
    }

    #[tokio::test]
    async fn test_missing_credential_always_fails() {
        let result = MissingCredential.travel_minutes("a", "b").await;
        assert!(matches!(result, Err(QueryFailure::MissingApiKey)));
    }
}
