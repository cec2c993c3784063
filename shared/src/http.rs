//! HTTP helpers for the gateway Lambda.

use lambda_http::http::header::{
    HeaderValue, ACCESS_CONTROL_ALLOW_CREDENTIALS, ACCESS_CONTROL_ALLOW_HEADERS,
    ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN, ACCESS_CONTROL_MAX_AGE,
    CONTENT_TYPE, VARY,
};
use lambda_http::http::StatusCode;
use lambda_http::{Body, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::{Error, Result};

/// Methods the gateway serves, in preflight answers and checks.
const ALLOWED_METHODS: [&str; 2] = ["GET", "POST"];

/// Body used if a payload cannot be serialized.
const FALLBACK_ERROR_BODY: &str = r#"{"success":false,"error":"Internal server error"}"#;

/// Standard API response wrapper.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn error(message: impl Into<String>) -> ApiResponse<()> {
        ApiResponse {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

/// Create a JSON response with the given status code and data.
pub fn json_response<T: Serialize>(status: StatusCode, data: &T) -> Response<Body> {
    let (status, body) = match serde_json::to_string(data) {
        Ok(body) => (status, body),
        Err(_) => (StatusCode::INTERNAL_SERVER_ERROR, FALLBACK_ERROR_BODY.to_string()),
    };

    let mut response = Response::new(Body::from(body));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response
}

/// Create an error response with the given status code and message.
pub fn error_response(status: StatusCode, message: impl Into<String>) -> Response<Body> {
    json_response(status, &ApiResponse::<()>::error(message))
}

/// Parse a request body as JSON.
pub fn parse_json_body<T: DeserializeOwned>(body: &Body) -> Result<T> {
    let bytes: &[u8] = body.as_ref();
    if bytes.is_empty() {
        return Err(Error::Validation("Missing request body".to_string()));
    }
    serde_json::from_slice(bytes)
        .map_err(|e| Error::Validation(format!("Invalid request body: {}", e)))
}

/// Host and origin allow-lists applied before routing.
#[derive(Debug, Clone)]
pub struct AccessPolicy {
    allowed_hosts: Vec<String>,
    allowed_origins: Vec<String>,
}

impl Default for AccessPolicy {
    /// Any host, no cross-origin access.
    fn default() -> Self {
        Self::new(vec!["*".to_string()], Vec::new())
    }
}

impl AccessPolicy {
    pub fn new(allowed_hosts: Vec<String>, allowed_origins: Vec<String>) -> Self {
        Self {
            allowed_hosts: allowed_hosts.into_iter().map(|h| h.to_ascii_lowercase()).collect(),
            allowed_origins,
        }
    }

    /// Entries may be exact hosts, `*`, or `*.domain` wildcards. The port is ignored.
    pub fn host_allowed(&self, host: Option<&str>) -> bool {
        if self.allowed_hosts.iter().any(|h| h == "*") {
            return true;
        }
        let Some(host) = host else {
            return false;
        };
        let host = host.split(':').next().unwrap_or_default().to_ascii_lowercase();

        self.allowed_hosts.iter().any(|pattern| match pattern.strip_prefix("*.") {
            Some(domain) => host.ends_with(&format!(".{domain}")),
            None => *pattern == host,
        })
    }

    pub fn origin_allowed(&self, origin: &str) -> bool {
        self.allowed_origins.iter().any(|o| o == "*" || o == origin)
    }

    /// Add CORS headers for an allowed origin; other responses pass through.
    pub fn apply_cors(&self, response: &mut Response<Body>, origin: Option<&str>) {
        let Some(origin) = origin.filter(|o| self.origin_allowed(o)) else {
            return;
        };
        let Ok(origin) = HeaderValue::from_str(origin) else {
            return;
        };

        let headers = response.headers_mut();
        headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, origin);
        headers.insert(ACCESS_CONTROL_ALLOW_CREDENTIALS, HeaderValue::from_static("true"));
        headers.insert(VARY, HeaderValue::from_static("Origin"));
    }

    /// Answer a CORS preflight request.
    pub fn preflight(
        &self,
        origin: &str,
        requested_method: &str,
        requested_headers: Option<&str>,
    ) -> Result<Response<Body>> {
        if !self.origin_allowed(origin) {
            return Err(Error::Validation("Disallowed CORS origin".to_string()));
        }
        if !ALLOWED_METHODS.contains(&requested_method.trim()) {
            return Err(Error::Validation("Disallowed CORS method".to_string()));
        }

        let mut response = Response::new(Body::Empty);
        self.apply_cors(&mut response, Some(origin));

        let headers = response.headers_mut();
        headers.insert(ACCESS_CONTROL_ALLOW_METHODS, HeaderValue::from_static("GET, POST"));
        headers.insert(ACCESS_CONTROL_MAX_AGE, HeaderValue::from_static("600"));
        if let Some(value) = requested_headers.and_then(|h| HeaderValue::from_str(h).ok()) {
            headers.insert(ACCESS_CONTROL_ALLOW_HEADERS, value);
        }

        Ok(response)
    }
}
