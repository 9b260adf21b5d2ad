use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;

/// HTTP Method enum
#[allow(clippy::upper_case_acronyms)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum HttpMethod {
    GET,
    POST,
    PUT,
    DELETE,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::GET => "GET",
            HttpMethod::POST => "POST",
            HttpMethod::PUT => "PUT",
            HttpMethod::DELETE => "DELETE",
        }
    }

    pub fn parse(value: &str) -> Option<HttpMethod> {
        match value.trim().to_ascii_uppercase().as_str() {
            "GET" => Some(HttpMethod::GET),
            "POST" => Some(HttpMethod::POST),
            "PUT" => Some(HttpMethod::PUT),
            "DELETE" => Some(HttpMethod::DELETE),
            _ => None,
        }
    }

    /// POST and PUT carry their parameters as a form body; GET and DELETE
    /// use the query string.
    pub fn has_body(&self) -> bool {
        matches!(self, HttpMethod::POST | HttpMethod::PUT)
    }
}

/// Session credentials. Kept in memory only.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Credentials {
    pub base_url: String,
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(
        base_url: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Credentials {
            base_url: base_url.into(),
            username: username.into(),
            password: password.into(),
        }
    }
}

/// Request payload
#[derive(Clone, Debug, PartialEq)]
pub enum RequestBody {
    /// Flat form-encoded key/value pairs
    Form(Vec<(String, String)>),
    /// Free-form text, sent as-is
    Raw(String),
}

/// One HTTP exchange to perform
#[derive(Clone, Debug, PartialEq)]
pub struct RequestSpec {
    pub method: HttpMethod,
    pub endpoint: String,
    pub query: Vec<(String, String)>,
    pub body: Option<RequestBody>,
    /// Read the body as a byte stream instead of one buffered read
    pub stream: bool,
}

impl RequestSpec {
    pub fn new(method: HttpMethod, endpoint: impl Into<String>) -> Self {
        RequestSpec {
            method,
            endpoint: endpoint.into(),
            query: Vec::new(),
            body: None,
            stream: false,
        }
    }

    /// Place `params` where the method expects them: query string for
    /// GET/DELETE, form body for POST/PUT.
    pub fn with_params(mut self, params: Vec<(String, String)>) -> Self {
        if params.is_empty() {
            return self;
        }
        if self.method.has_body() {
            self.body = Some(RequestBody::Form(params));
        } else {
            self.query = params;
        }
        self
    }

    pub fn streamed(mut self) -> Self {
        self.stream = true;
        self
    }
}

/// A received HTTP reply, any status
#[derive(Clone, Debug)]
pub struct ApiResponse {
    pub status: u16,
    pub reason: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
    pub url: String,
    pub received_at: DateTime<Local>,
}

impl ApiResponse {
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }

    pub fn is_success(&self) -> bool {
        self.status == 200
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn content_type(&self) -> &str {
        self.header("content-type").unwrap_or("text/plain")
    }
}
