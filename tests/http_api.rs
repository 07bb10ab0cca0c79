//! HTTP surface tests driven through the router without a socket.

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use tablegate::admin::setup_admin_router;
use tablegate::http::{build_router, AppState};
use tablegate::plugins::PluginRegistry;

mod common;

use common::{TestGateway, ADMIN_API_KEY, ADMIN_KEY};

fn api(gw: &TestGateway) -> Router {
    build_router(AppState {
        gateway: gw.gateway.clone(),
    })
}

fn admin(gw: &TestGateway) -> Router {
    setup_admin_router(AppState {
        gateway: gw.gateway.clone(),
    })
}

async fn send(router: Router, request: Request<Body>) -> (StatusCode, axum::http::HeaderMap, Value) {
    let response = router.oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, headers, body)
}

fn call(method: Method, uri: &str, body: Option<Value>) -> Request<Body> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("x-api-key", ADMIN_KEY);
    match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

#[tokio::test]
async fn test_health() {
    let gw = common::gateway();
    let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
    let (status, _, body) = send(api(&gw), request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_query_and_path_routes() {
    let gw = common::gateway();

    let (status, _, created) = send(
        api(&gw),
        call(Method::POST, "/api/orders/create", Some(json!({"item": "pen"}))),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(created["data"]["id"], 1);

    let (status, headers, listed) = send(
        api(&gw),
        call(Method::GET, "/api?action=list&table=orders", None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed["count"], 1);
    assert!(headers.contains_key("x-request-id"));
    assert_eq!(headers["x-ratelimit-limit"], "1000");

    let (status, _, read) = send(api(&gw), call(Method::GET, "/api/orders/read?id=1", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(read["data"]["item"], "pen");
}

#[tokio::test]
async fn test_request_id_is_propagated() {
    let gw = common::gateway();
    let request = Request::builder()
        .uri("/api?action=tables")
        .header("x-api-key", ADMIN_KEY)
        .header("x-request-id", "trace-me")
        .body(Body::empty())
        .unwrap();
    let (_, headers, _) = send(api(&gw), request).await;
    assert_eq!(headers["x-request-id"], "trace-me");
    assert_eq!(gw.observer.last().request_id, "trace-me");
}

#[tokio::test]
async fn test_oversized_body_is_rejected_and_observed() {
    let mut config = common::test_config();
    config.security.max_body_size = 16;
    let gw = common::gateway_with(config, &PluginRegistry::with_builtin());

    let (status, _, body) = send(
        api(&gw),
        call(
            Method::POST,
            "/api/orders/create",
            Some(json!({"item": "a description that is far too long"})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(body["error"], "Payload too large");
    assert_eq!(gw.observer.count(), 1);
}

#[tokio::test]
async fn test_admin_requires_bearer_key() {
    let gw = common::gateway();

    let anonymous = Request::builder().uri("/admin/status").body(Body::empty()).unwrap();
    let (status, _, _) = send(admin(&gw), anonymous).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let wrong = Request::builder()
        .uri("/admin/status")
        .header(header::AUTHORIZATION, "Bearer nope")
        .body(Body::empty())
        .unwrap();
    let (status, _, _) = send(admin(&gw), wrong).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

fn admin_call(method: Method, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {ADMIN_API_KEY}"))
        .body(Body::empty())
        .unwrap()
}

#[tokio::test]
async fn test_admin_endpoints() {
    let gw = common::gateway();
    send(api(&gw), call(Method::GET, "/api?action=list&table=orders", None)).await;

    let (status, _, body) = send(admin(&gw), admin_call(Method::GET, "/admin/status")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "operational");
    assert_eq!(body["rate_limit"]["max_requests"], 1000);
    assert!(body["actions"].as_array().unwrap().contains(&json!("stats")));

    let (_, _, body) = send(admin(&gw), admin_call(Method::GET, "/admin/plugins")).await;
    assert_eq!(body["boot_order"], json!(["audit", "table_stats"]));
    assert_eq!(body["grants"]["*"]["admin"], json!(["stats"]));

    let (_, _, body) = send(admin(&gw), admin_call(Method::GET, "/admin/cache")).await;
    assert_eq!(body["size"], 1);

    let (_, _, body) = send(admin(&gw), admin_call(Method::POST, "/admin/cache/clear")).await;
    assert_eq!(body["cleared"], true);
    assert_eq!(gw.gateway.cache.stats().size, 0);

    let (status, _, body) =
        send(admin(&gw), admin_call(Method::POST, "/admin/rate-limit/sweep")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["rate_limit_records"], 0);
}
