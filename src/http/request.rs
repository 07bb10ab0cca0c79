//! HTTP → [`ApiRequest`] conversion.
//!
//! # Responsibilities
//! - Read `action` and `table` from the path or the query string
//! - Keep every other query parameter for the action
//! - Carry the request id set by the request-id layer, and the peer address
//!
//! # Design Decisions
//! - Path segments win over query parameters
//! - A malformed query string yields no parameters; the pipeline then
//!   reports the missing action

use axum::extract::{ConnectInfo, Query};
use axum::http::request::Parts;
use std::collections::BTreeMap;
use std::net::SocketAddr;

use crate::pipeline::request::ApiRequest;
use crate::pipeline::response::X_REQUEST_ID;

/// `table` and `action` taken from `/api/{table}/{action}`.
#[derive(Debug, Clone)]
pub struct RouteTarget {
    pub table: String,
    pub action: String,
}

/// Build the pipeline request from the head of an HTTP request. The body is
/// attached by the caller once it has been read under the size limit.
pub fn from_parts(parts: &Parts, target: Option<RouteTarget>) -> ApiRequest {
    let mut params = Query::<BTreeMap<String, String>>::try_from_uri(&parts.uri)
        .map(|Query(params)| params)
        .unwrap_or_else(|e| {
            tracing::debug!(error = %e, uri = %parts.uri, "Ignoring malformed query string");
            BTreeMap::new()
        });

    let mut request = ApiRequest::new(parts.method.clone());
    if let Some(id) = parts
        .headers
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .filter(|id| !id.is_empty())
    {
        request.request_id = id.to_string();
    }

    let query_action = params.remove("action");
    let query_table = params.remove("table");
    match target {
        Some(target) => {
            request.action = Some(target.action);
            request.table = Some(target.table);
        }
        None => {
            request.action = query_action;
            request.table = query_table;
        }
    }

    request.params = params;
    request.headers = parts.headers.clone();
    request.peer_addr = parts
        .extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip());
    request
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{Method, Request};

    fn parts(uri: &str) -> Parts {
        Request::builder()
            .method(Method::GET)
            .uri(uri)
            .header("x-request-id", "req-1")
            .body(())
            .unwrap()
            .into_parts()
            .0
    }

    #[test]
    fn test_query_form() {
        let request = from_parts(&parts("/api?action=list&table=orders&status=open&limit=5"), None);
        assert_eq!(request.action.as_deref(), Some("list"));
        assert_eq!(request.table.as_deref(), Some("orders"));
        assert_eq!(request.params.len(), 2);
        assert_eq!(request.params["status"], "open");
        assert_eq!(request.request_id, "req-1");
    }

    #[test]
    fn test_path_form_wins() {
        let target = RouteTarget {
            table: "orders".into(),
            action: "read".into(),
        };
        let request = from_parts(&parts("/api/orders/read?id=3&action=delete"), Some(target));
        assert_eq!(request.action.as_deref(), Some("read"));
        assert_eq!(request.params.get("id").map(String::as_str), Some("3"));
        assert!(!request.params.contains_key("action"));
    }

    #[test]
    fn test_peer_address_from_connect_info() {
        let mut head = parts("/api?action=tables");
        head.extensions
            .insert(ConnectInfo(SocketAddr::from(([192, 0, 2, 1], 4000))));
        let request = from_parts(&head, None);
        assert_eq!(request.client_ip().as_deref(), Some("192.0.2.1"));
    }
}
