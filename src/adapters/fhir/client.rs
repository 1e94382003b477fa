//! HTTP client for FHIR bulk data, transaction and import endpoints
//!
//! One [`FhirClient`] is built per server (source registry, destination
//! store). Idempotent GETs are retried with exponential backoff when no
//! response was received; POSTs are sent once.

use super::models::{extract_diagnostics, BinaryPayload, StatusResponse};
use crate::config::{FhirServerConfig, RetryConfig};
use crate::domain::{BridgeError, FhirError, Result};
use reqwest::header::{ACCEPT, CONTENT_LOCATION, CONTENT_TYPE};
use reqwest::{Client, ClientBuilder, Response, StatusCode};
use serde::Serialize;
use std::time::Duration;
use url::Url;

const FHIR_JSON: &str = "application/fhir+json";
const PREFER: &str = "Prefer";
const RESPOND_ASYNC: &str = "respond-async";
const X_PROGRESS: &str = "X-Progress";

/// Client for one FHIR server
#[derive(Clone)]
pub struct FhirClient {
    base_url: String,
    client: Client,
    retry: RetryConfig,
}

impl FhirClient {
    /// Builds a client from server configuration
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the CA certificate cannot be read or
    /// the HTTP client cannot be constructed.
    pub fn new(config: &FhirServerConfig) -> Result<Self> {
        let mut builder = ClientBuilder::new()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .connect_timeout(Duration::from_secs(30));

        if !config.tls_verify {
            builder = builder.danger_accept_invalid_certs(true);
        }

        if let Some(path) = &config.tls_ca_cert {
            let pem = std::fs::read(path).map_err(|e| {
                BridgeError::Configuration(format!("Failed to read CA certificate {path}: {e}"))
            })?;
            let cert = reqwest::Certificate::from_pem(&pem).map_err(|e| {
                BridgeError::Configuration(format!("Invalid CA certificate {path}: {e}"))
            })?;
            builder = builder.add_root_certificate(cert);
        }

        let client = builder.build().map_err(|e| {
            BridgeError::Configuration(format!("Failed to build HTTP client: {e}"))
        })?;

        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            client,
            retry: config.retry.clone(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn retry_config(&self) -> &RetryConfig {
        &self.retry
    }

    /// Issues `GET <base>/$export[?_type=A,B]` and returns the poll location
    ///
    /// # Errors
    ///
    /// [`FhirError::KickoffFailed`] when the response carries no
    /// `Content-Location`, with any diagnostics from the body attached;
    /// [`FhirError::ConnectionFailed`] when no response arrives after retries.
    pub async fn kickoff_export(&self, resource_types: &[String]) -> Result<String> {
        let mut url = format!("{}/$export", self.base_url);
        if !resource_types.is_empty() {
            url.push_str("?_type=");
            url.push_str(&resource_types.join(","));
        }

        tracing::info!(url = %url, "Requesting bulk export");

        let response = self
            .retry_request(|| async {
                self.client
                    .get(&url)
                    .header(ACCEPT, FHIR_JSON)
                    .header(PREFER, RESPOND_ASYNC)
                    .send()
                    .await
                    .map_err(transport_error)
            })
            .await?;

        let status = response.status();
        let location = header_value(&response, CONTENT_LOCATION.as_str());
        let body = response.text().await.unwrap_or_default();

        match location {
            Some(location) if status.is_success() => self.resolve(&location),
            _ => Err(FhirError::KickoffFailed {
                message: format!("status {status} without Content-Location header"),
                diagnostics: extract_diagnostics(&body),
            }
            .into()),
        }
    }

    /// Performs one status request against a bulk operation
    ///
    /// Not retried here: the poll loop owns retry and attempt accounting.
    pub async fn poll_status(&self, url: &str) -> Result<StatusResponse> {
        let response = self
            .client
            .get(url)
            .header(ACCEPT, FHIR_JSON)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        match status {
            StatusCode::ACCEPTED => Ok(StatusResponse::Running {
                progress: header_value(&response, X_PROGRESS),
            }),
            StatusCode::OK => {
                let body = response.text().await.map_err(transport_error)?;
                let value = if body.trim().is_empty() {
                    serde_json::Value::Null
                } else {
                    serde_json::from_str(&body).map_err(|e| {
                        FhirError::InvalidResponse(format!("status body is not JSON: {e}"))
                    })?
                };
                Ok(StatusResponse::Complete(value))
            }
            other => {
                let body = response.text().await.unwrap_or_default();
                Ok(StatusResponse::Failed {
                    status: other.as_u16(),
                    diagnostics: extract_diagnostics(&body),
                })
            }
        }
    }

    /// Fetches one manifest output and returns its base64 `data` field
    pub async fn fetch_binary(&self, url: &str) -> Result<String> {
        let response = self
            .retry_request(|| async {
                self.client
                    .get(url)
                    .header(ACCEPT, FHIR_JSON)
                    .send()
                    .await
                    .map_err(transport_error)
            })
            .await?;

        let status = response.status();
        let body = response.text().await.map_err(transport_error)?;
        if !status.is_success() {
            return Err(rejected(status, body).into());
        }

        let payload: BinaryPayload = serde_json::from_str(&body).map_err(|e| {
            FhirError::InvalidResponse(format!("binary body has no data field: {e}"))
        })?;
        Ok(payload.data)
    }

    /// POSTs a transaction bundle to the server base
    ///
    /// Returns the server's response body on 200/201.
    pub async fn post_transaction<T: Serialize + ?Sized>(
        &self,
        bundle: &T,
    ) -> Result<serde_json::Value> {
        let url = format!("{}/", self.base_url);
        let body = serde_json::to_vec(bundle)?;

        let response = self
            .client
            .post(&url)
            .header(CONTENT_TYPE, FHIR_JSON)
            .header(ACCEPT, FHIR_JSON)
            .body(body)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        let text = response.text().await.map_err(transport_error)?;

        if status == StatusCode::OK || status == StatusCode::CREATED {
            Ok(serde_json::from_str(&text).unwrap_or(serde_json::Value::String(text)))
        } else {
            Err(rejected(status, text).into())
        }
    }

    /// POSTs an `$import` Parameters body and returns the import status location
    pub async fn kickoff_import(&self, parameters: &serde_json::Value) -> Result<String> {
        let url = format!("{}/$import", self.base_url);
        let body = serde_json::to_vec(parameters)?;

        let response = self
            .client
            .post(&url)
            .header(CONTENT_TYPE, FHIR_JSON)
            .header(ACCEPT, FHIR_JSON)
            .header(PREFER, RESPOND_ASYNC)
            .body(body)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        let location = header_value(&response, CONTENT_LOCATION.as_str());
        let text = response.text().await.unwrap_or_default();

        if status != StatusCode::ACCEPTED {
            return Err(rejected(status, text).into());
        }

        match location {
            Some(location) => self.resolve(&location),
            None => Err(FhirError::KickoffFailed {
                message: "import accepted without Content-Location header".to_string(),
                diagnostics: extract_diagnostics(&text),
            }
            .into()),
        }
    }

    /// Resolves a possibly relative location against the base URL
    fn resolve(&self, location: &str) -> Result<String> {
        if location.starts_with("http://") || location.starts_with("https://") {
            return Ok(location.to_string());
        }
        let base = Url::parse(&format!("{}/", self.base_url))
            .map_err(|e| FhirError::InvalidResponse(format!("invalid base URL: {e}")))?;
        base.join(location)
            .map(|u| u.to_string())
            .map_err(|e| FhirError::InvalidResponse(format!("invalid location {location}: {e}")).into())
    }

    /// Retries `operation` with exponential backoff while it fails without a response
    async fn retry_request<F, Fut>(&self, operation: F) -> Result<Response>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = Result<Response>>,
    {
        let max_retries = self.retry.max_retries;
        let mut attempt = 0;

        loop {
            match operation().await {
                Ok(response) => return Ok(response),
                Err(BridgeError::Fhir(e)) if e.is_transport() && attempt < max_retries => {
                    attempt += 1;
                    let delay = self.retry.delay_for(attempt);
                    tracing::warn!(
                        attempt = attempt,
                        max_retries = max_retries,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Retrying request after transport error"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

fn header_value(response: &Response, name: &str) -> Option<String> {
    response
        .headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(String::from)
}

fn transport_error(err: reqwest::Error) -> BridgeError {
    FhirError::ConnectionFailed(err.to_string()).into()
}

fn rejected(status: StatusCode, body: String) -> FhirError {
    FhirError::Rejected {
        status: status.as_u16(),
        diagnostics: extract_diagnostics(&body),
        body,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use serde_json::json;

    fn client_for(url: &str) -> FhirClient {
        let mut config = FhirServerConfig::new(url);
        config.retry = RetryConfig {
            max_retries: 1,
            initial_delay_ms: 1,
            max_delay_ms: 1,
            backoff_multiplier: 1.0,
        };
        FhirClient::new(&config).unwrap()
    }

    #[tokio::test]
    async fn test_kickoff_returns_content_location() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/$export")
            .match_query(Matcher::UrlEncoded(
                "_type".into(),
                "Immunization,Condition".into(),
            ))
            .match_header("accept", FHIR_JSON)
            .match_header("prefer", RESPOND_ASYNC)
            .with_status(202)
            .with_header("Content-Location", "https://x/poll?_jobId=abc123")
            .create_async()
            .await;

        let client = client_for(&server.url());
        let location = client
            .kickoff_export(&["Immunization".to_string(), "Condition".to_string()])
            .await
            .unwrap();

        assert_eq!(location, "https://x/poll?_jobId=abc123");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_kickoff_without_location_carries_diagnostics() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/$export")
            .with_status(400)
            .with_body(r#"{"issue":[{"diagnostics":"Unsupported _type"}]}"#)
            .create_async()
            .await;

        let client = client_for(&server.url());
        let err = client.kickoff_export(&[]).await.unwrap_err();
        match err {
            BridgeError::Fhir(FhirError::KickoffFailed { diagnostics, .. }) => {
                assert_eq!(diagnostics.as_deref(), Some("Unsupported _type"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_relative_location_is_resolved() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/fhir/$export")
            .with_status(202)
            .with_header("Content-Location", "status?_jobId=rel1")
            .create_async()
            .await;

        let client = client_for(&format!("{}/fhir", server.url()));
        let location = client.kickoff_export(&[]).await.unwrap();
        assert_eq!(location, format!("{}/fhir/status?_jobId=rel1", server.url()));
    }

    #[tokio::test]
    async fn test_poll_status_classification() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/running")
            .with_status(202)
            .with_header("X-Progress", "50%")
            .create_async()
            .await;
        server
            .mock("GET", "/done")
            .with_status(200)
            .with_body(r#"{"output":[]}"#)
            .create_async()
            .await;
        server
            .mock("GET", "/broken")
            .with_status(500)
            .with_body(r#"{"issue":[{"diagnostics":"boom"}]}"#)
            .create_async()
            .await;

        let client = client_for(&server.url());
        assert_eq!(
            client
                .poll_status(&format!("{}/running", server.url()))
                .await
                .unwrap(),
            StatusResponse::Running {
                progress: Some("50%".to_string())
            }
        );
        assert_eq!(
            client
                .poll_status(&format!("{}/done", server.url()))
                .await
                .unwrap(),
            StatusResponse::Complete(json!({"output": []}))
        );
        assert_eq!(
            client
                .poll_status(&format!("{}/broken", server.url()))
                .await
                .unwrap(),
            StatusResponse::Failed {
                status: 500,
                diagnostics: Some("boom".to_string())
            }
        );
    }

    #[tokio::test]
    async fn test_poll_status_transport_error() {
        let client = client_for("http://127.0.0.1:1");
        let err = client.poll_status("http://127.0.0.1:1/poll").await.unwrap_err();
        assert!(matches!(err, BridgeError::Fhir(FhirError::ConnectionFailed(_))));
    }

    #[tokio::test]
    async fn test_fetch_binary() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/bin1")
            .with_status(200)
            .with_body(r#"{"data":"eyJpZCI6IjEifQ=="}"#)
            .create_async()
            .await;
        server
            .mock("GET", "/gone")
            .with_status(404)
            .create_async()
            .await;

        let client = client_for(&server.url());
        let data = client
            .fetch_binary(&format!("{}/bin1", server.url()))
            .await
            .unwrap();
        assert_eq!(data, "eyJpZCI6IjEifQ==");

        let err = client
            .fetch_binary(&format!("{}/gone", server.url()))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            BridgeError::Fhir(FhirError::Rejected { status: 404, .. })
        ));
    }

    #[tokio::test]
    async fn test_post_transaction_success_and_rejection() {
        let mut server = mockito::Server::new_async().await;
        let ok = server
            .mock("POST", "/")
            .match_header("content-type", FHIR_JSON)
            .match_body(Matcher::PartialJson(json!({"type": "transaction"})))
            .with_status(200)
            .with_body(r#"{"resourceType":"Bundle","type":"transaction-response"}"#)
            .expect(1)
            .create_async()
            .await;

        let client = client_for(&server.url());
        let result = client
            .post_transaction(&json!({"resourceType": "Bundle", "type": "transaction"}))
            .await
            .unwrap();
        assert_eq!(result["type"], "transaction-response");
        ok.assert_async().await;

        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/")
            .with_status(422)
            .with_body(r#"{"issue":[{"diagnostics":"Patient/5 not found"}]}"#)
            .create_async()
            .await;
        let client = client_for(&server.url());
        let err = client.post_transaction(&json!({})).await.unwrap_err();
        match err {
            BridgeError::Fhir(FhirError::Rejected {
                status,
                diagnostics,
                body,
            }) => {
                assert_eq!(status, 422);
                assert_eq!(diagnostics.as_deref(), Some("Patient/5 not found"));
                assert!(body.contains("Patient/5"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_kickoff_import() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/$import")
            .match_header("prefer", RESPOND_ASYNC)
            .with_status(202)
            .with_header("Content-Location", "https://dest/import-status/9")
            .create_async()
            .await;

        let client = client_for(&server.url());
        let location = client
            .kickoff_import(&json!({"resourceType": "Parameters"}))
            .await
            .unwrap();
        assert_eq!(location, "https://dest/import-status/9");
    }

    #[tokio::test]
    async fn test_kickoff_import_rejected() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/$import")
            .with_status(400)
            .create_async()
            .await;

        let client = client_for(&server.url());
        let err = client.kickoff_import(&json!({})).await.unwrap_err();
        assert!(matches!(
            err,
            BridgeError::Fhir(FhirError::Rejected { status: 400, .. })
        ));
    }
}
