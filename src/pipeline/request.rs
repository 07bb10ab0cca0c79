//! Transport-independent request value.

use axum::body::Bytes;
use axum::http::{header, HeaderMap, HeaderName, HeaderValue, Method};
use serde_json::Value;
use std::collections::BTreeMap;
use std::net::IpAddr;

use crate::error::ApiError;

pub const X_API_KEY: &str = "x-api-key";
pub const X_FORWARDED_FOR: &str = "x-forwarded-for";

/// One inbound API call.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub request_id: String,
    pub method: Method,
    pub action: Option<String>,
    pub table: Option<String>,
    /// Query parameters other than `action` and `table`.
    pub params: BTreeMap<String, String>,
    pub headers: HeaderMap,
    pub body: Bytes,
    /// Address of the directly connected peer.
    pub peer_addr: Option<IpAddr>,
}

impl ApiRequest {
    pub fn new(method: Method) -> Self {
        Self {
            request_id: uuid::Uuid::new_v4().to_string(),
            method,
            action: None,
            table: None,
            params: BTreeMap::new(),
            headers: HeaderMap::new(),
            body: Bytes::new(),
            peer_addr: None,
        }
    }

    pub fn with_action(mut self, action: impl Into<String>) -> Self {
        self.action = Some(action.into());
        self
    }

    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = Some(table.into());
        self
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    /// Add a header. Invalid names or values are ignored.
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            self.headers.append(name, value);
        }
        self
    }

    pub fn with_json(mut self, body: &Value) -> Self {
        self.body = Bytes::from(body.to_string());
        self.headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        self
    }

    pub fn with_peer(mut self, addr: IpAddr) -> Self {
        self.peer_addr = Some(addr);
        self
    }

    pub fn header_str(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// API key from `X-API-Key`, falling back to the `api_key` parameter.
    pub fn api_key(&self) -> Option<&str> {
        self.header_str(X_API_KEY)
            .or_else(|| self.params.get("api_key").map(String::as_str))
            .map(str::trim)
            .filter(|k| !k.is_empty())
    }

    /// Token from `Authorization: Bearer <token>`.
    pub fn bearer_token(&self) -> Option<&str> {
        self.header_str(header::AUTHORIZATION.as_str())
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|t| !t.is_empty())
    }

    /// First address of `X-Forwarded-For`, else the peer address.
    pub fn client_ip(&self) -> Option<String> {
        self.header_str(X_FORWARDED_FOR)
            .and_then(|chain| chain.split(',').next())
            .map(str::trim)
            .filter(|ip| !ip.is_empty())
            .map(str::to_string)
            .or_else(|| self.peer_addr.map(|ip| ip.to_string()))
    }

    pub fn origin(&self) -> Option<&str> {
        self.header_str(header::ORIGIN.as_str())
    }

    /// A CORS preflight probe.
    pub fn is_preflight(&self) -> bool {
        self.method == Method::OPTIONS
            && self
                .headers
                .contains_key(header::ACCESS_CONTROL_REQUEST_METHOD)
    }

    /// Parse the body as JSON; an empty body is `None`.
    pub fn json_body(&self) -> Result<Option<Value>, ApiError> {
        if self.body.iter().all(u8::is_ascii_whitespace) {
            return Ok(None);
        }
        serde_json::from_slice(&self.body)
            .map(Some)
            .map_err(|e| ApiError::BadRequest(format!("request body is not valid JSON: {e}")))
    }
}
