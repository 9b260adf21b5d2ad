//! HTTP client wrapper - executes one authenticated request per call

use std::time::Duration;

use base64::Engine;
use chrono::Local;
use futures_util::StreamExt;
use tokio::sync::mpsc;

use crate::constants::{CLIENT_HEADER_NAME, CLIENT_HEADER_VALUE, REQUEST_TIMEOUT};
use crate::error::TransportError;
use crate::messages::NetworkResponse;
use crate::models::{ApiResponse, Credentials, HttpMethod, RequestBody, RequestSpec};

/// Performs exactly one HTTP exchange per `execute` call and reports progress
/// on the status channel.
#[derive(Clone)]
pub struct RequestExecutor {
    client: reqwest::Client,
    status_tx: Option<mpsc::UnboundedSender<NetworkResponse>>,
}

impl RequestExecutor {
    pub fn new(status_tx: Option<mpsc::UnboundedSender<NetworkResponse>>) -> Self {
        Self::with_timeout(REQUEST_TIMEOUT, status_tx)
    }

    pub fn with_timeout(
        timeout: Duration,
        status_tx: Option<mpsc::UnboundedSender<NetworkResponse>>,
    ) -> Self {
        RequestExecutor {
            client: create_client(timeout),
            status_tx,
        }
    }

    fn emit(&self, line: String) {
        if let Some(tx) = &self.status_tx {
            let _ = tx.send(NetworkResponse::Status(line));
        }
    }

    /// Send `spec` and wait for the reply or the deadline.
    ///
    /// Any HTTP status, including 4xx/5xx, is an `Ok`. Only failures below the
    /// HTTP layer are errors.
    pub async fn execute(
        &self,
        credentials: &Credentials,
        spec: &RequestSpec,
    ) -> Result<ApiResponse, TransportError> {
        self.emit(format!(
            "Sending {} request to {}...",
            spec.method.as_str(),
            spec.endpoint
        ));
        tracing::info!(method = spec.method.as_str(), endpoint = %spec.endpoint, stream = spec.stream, "Executing request");

        let result = self.exchange(credentials, spec).await;

        match &result {
            Ok(response) => {
                tracing::info!(status = response.status, bytes = response.body.len(), "Request completed");
                self.emit(format!("Response: {} - {}", response.status, response.reason));
            }
            Err(err) => {
                tracing::warn!(error = %err, endpoint = %spec.endpoint, "Request failed");
                self.emit(err.status_line());
            }
        }

        result
    }

    async fn exchange(
        &self,
        credentials: &Credentials,
        spec: &RequestSpec,
    ) -> Result<ApiResponse, TransportError> {
        let req_builder = build_request(&self.client, credentials, spec)?;
        let resp = req_builder.send().await?;

        let status = resp.status();
        let reason = status.canonical_reason().unwrap_or("").to_string();
        let url = resp.url().to_string();
        let headers = resp
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_string(),
                    String::from_utf8_lossy(value.as_bytes()).into_owned(),
                )
            })
            .collect();

        let body = if spec.stream {
            let mut stream = resp.bytes_stream();
            let mut body = Vec::new();
            while let Some(chunk) = stream.next().await {
                body.extend_from_slice(&chunk?);
            }
            body
        } else {
            resp.bytes().await?.to_vec()
        };

        Ok(ApiResponse {
            status: status.as_u16(),
            reason,
            headers,
            body,
            url,
            received_at: Local::now(),
        })
    }
}

/// Build a request from the given parameters
fn build_request(
    client: &reqwest::Client,
    credentials: &Credentials,
    spec: &RequestSpec,
) -> Result<reqwest::RequestBuilder, TransportError> {
    let url = join_url(&credentials.base_url, &spec.endpoint);
    let url = reqwest::Url::parse(&url)
        .map_err(|e| TransportError::Other(format!("Invalid URL '{}': {}", url, e)))?;

    let mut req_builder = match spec.method {
        HttpMethod::GET => client.get(url),
        HttpMethod::POST => client.post(url),
        HttpMethod::PUT => client.put(url),
        HttpMethod::DELETE => client.delete(url),
    };

    let auth = format!("{}:{}", credentials.username, credentials.password);
    let encoded = base64::engine::general_purpose::STANDARD.encode(auth);
    req_builder = req_builder
        .header("Authorization", format!("Basic {}", encoded))
        .header(CLIENT_HEADER_NAME, CLIENT_HEADER_VALUE);

    if !spec.query.is_empty() {
        req_builder = req_builder.query(&spec.query);
    }

    match &spec.body {
        Some(RequestBody::Form(pairs)) => req_builder = req_builder.form(pairs),
        Some(RequestBody::Raw(text)) => req_builder = req_builder.body(text.clone()),
        None => {}
    }

    Ok(req_builder)
}

fn join_url(base: &str, endpoint: &str) -> String {
    let base = base.trim().trim_end_matches('/');
    let endpoint = endpoint.trim();
    if endpoint.starts_with('/') {
        format!("{}{}", base, endpoint)
    } else {
        format!("{}/{}", base, endpoint)
    }
}

/// Create an HTTP client with the fixed deadline
pub fn create_client(timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Falling back to default HTTP client");
            reqwest::Client::new()
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    fn credentials(base_url: String) -> Credentials {
        Credentials::new(base_url, "user", "pass")
    }

    #[test]
    fn joins_base_and_endpoint() {
        assert_eq!(join_url("https://h/", "/api/2.0/fo/scan/"), "https://h/api/2.0/fo/scan/");
        assert_eq!(join_url("https://h", "api/"), "https://h/api/");
    }

    #[tokio::test]
    async fn sends_basic_auth_and_client_header() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/api/2.0/fo/scan/")
                    .query_param("action", "list")
                    .header("Authorization", "Basic dXNlcjpwYXNz")
                    .header(CLIENT_HEADER_NAME, CLIENT_HEADER_VALUE);
                then.status(200).header("content-type", "text/xml").body("<SCANS/>");
            })
            .await;

        let executor = RequestExecutor::new(None);
        let spec = RequestSpec::new(HttpMethod::GET, "/api/2.0/fo/scan/")
            .with_params(vec![("action".into(), "list".into())]);
        let response = executor.execute(&credentials(server.base_url()), &spec).await.unwrap();

        mock.assert_async().await;
        assert_eq!(response.status, 200);
        assert_eq!(response.reason, "OK");
        assert_eq!(response.text(), "<SCANS/>");
        assert_eq!(response.content_type(), "text/xml");
        assert!(response.url.contains("action=list"));
    }

    #[tokio::test]
    async fn posts_form_body() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/api/2.0/fo/report/")
                    .x_www_form_urlencoded_tuple("action", "delete")
                    .x_www_form_urlencoded_tuple("id", "42");
                then.status(200).body("<OK/>");
            })
            .await;

        let executor = RequestExecutor::new(None);
        let spec = RequestSpec::new(HttpMethod::POST, "/api/2.0/fo/report/").with_params(vec![
            ("action".into(), "delete".into()),
            ("id".into(), "42".into()),
        ]);
        let response = executor.execute(&credentials(server.base_url()), &spec).await.unwrap();

        mock.assert_async().await;
        assert!(response.is_success());
    }

    #[tokio::test]
    async fn error_statuses_are_responses() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.path("/missing");
                then.status(404).body("not here");
            })
            .await;

        let executor = RequestExecutor::new(None);
        let spec = RequestSpec::new(HttpMethod::GET, "/missing");
        let response = executor.execute(&credentials(server.base_url()), &spec).await.unwrap();

        assert_eq!(response.status, 404);
        assert_eq!(response.reason, "Not Found");
        assert!(!response.is_success());
    }

    #[tokio::test]
    async fn streamed_body_is_collected() {
        let server = MockServer::start_async().await;
        let payload: Vec<u8> = (0..=255u8).cycle().take(64 * 1024).collect();
        let body = payload.clone();
        server
            .mock_async(move |when, then| {
                when.path("/api/2.0/fo/report/");
                then.status(200).header("content-type", "application/pdf").body(body.clone());
            })
            .await;

        let executor = RequestExecutor::new(None);
        let spec = RequestSpec::new(HttpMethod::GET, "/api/2.0/fo/report/").streamed();
        let response = executor.execute(&credentials(server.base_url()), &spec).await.unwrap();

        assert_eq!(response.body, payload);
    }

    #[tokio::test]
    async fn slow_server_is_a_timeout() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.path("/slow");
                then.status(200).delay(Duration::from_millis(800));
            })
            .await;

        let executor = RequestExecutor::with_timeout(Duration::from_millis(100), None);
        let err = executor
            .execute(&credentials(server.base_url()), &RequestSpec::new(HttpMethod::GET, "/slow"))
            .await
            .unwrap_err();

        assert_eq!(err, TransportError::Timeout);
    }

    #[tokio::test]
    async fn unreachable_host_is_a_connection_failure() {
        let executor = RequestExecutor::new(None);
        let err = executor
            .execute(
                &credentials("http://127.0.0.1:1".into()),
                &RequestSpec::new(HttpMethod::GET, "/"),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, TransportError::Connection(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn malformed_url_is_other_and_reported() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let executor = RequestExecutor::new(Some(tx));
        let err = executor
            .execute(&credentials("not a url".into()), &RequestSpec::new(HttpMethod::GET, "/x"))
            .await
            .unwrap_err();

        assert!(matches!(err, TransportError::Other(_)));

        let mut lines = Vec::new();
        while let Ok(NetworkResponse::Status(line)) = rx.try_recv() {
            lines.push(line);
        }
        assert_eq!(lines[0], "Sending GET request to /x...");
        assert!(lines[1].starts_with("Error: Invalid URL"));
    }
}
