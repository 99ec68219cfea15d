//! Ordering of the admission chain, driven in-process through the router.

use std::net::SocketAddr;

use axum::body::{to_bytes, Body};
use axum::extract::ConnectInfo;
use axum::http::{Request, StatusCode};
use forward_gate::config::ProxyConfig;
use forward_gate::http::{build_router, AppState};
use tower::ServiceExt;

fn state(configure: impl FnOnce(&mut ProxyConfig)) -> AppState {
    let mut config = ProxyConfig::default();
    configure(&mut config);
    AppState::from_config(&config).unwrap()
}

fn request() -> axum::http::request::Builder {
    Request::builder().uri("/some/path")
}

async fn body_text(response: axum::response::Response) -> String {
    let bytes = to_bytes(response.into_body(), 1024).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

#[tokio::test]
async fn missing_target_is_bad_request() {
    let app = build_router(state(|_| {}));
    let res = app.oneshot(request().body(Body::empty()).unwrap()).await.unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_text(res).await, "forward-url is required");
}

#[tokio::test]
async fn custom_control_header_is_honored() {
    let app = build_router(state(|c| {
        c.proxy.control_header = "X-Target".into();
        c.access.allowed_forwarded_hosts = vec!["allowed.example".into()];
    }));
    let res = app
        .oneshot(
            request()
                .header("forward-url", "http://allowed.example/")
                .header("x-target", "http://denied.example/")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn saturation_is_checked_before_anything_else() {
    let state = state(|c| {
        c.proxy.max_concurrency = 1;
        c.access.allowed_source_ips = vec!["10.0.0.0/8".into()];
    });
    let held = state.admission.try_acquire().unwrap();
    let app = build_router(state.clone());

    let res = app.clone().oneshot(request().body(Body::empty()).unwrap()).await.unwrap();
    assert_eq!(res.status(), StatusCode::TOO_MANY_REQUESTS);

    drop(held);
    // Without any address the client check now runs and fails.
    let res = app.oneshot(request().body(Body::empty()).unwrap()).await.unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_text(res).await, "invalid client ip");
    assert_eq!(state.admission.available(), 1);
}

#[tokio::test]
async fn client_check_precedes_target_parsing() {
    let app = build_router(state(|c| c.access.allowed_source_ips = vec!["10.0.0.0/8".into()]));
    let peer: SocketAddr = "192.0.2.10:4000".parse().unwrap();

    let mut req = request().body(Body::empty()).unwrap();
    req.extensions_mut().insert(ConnectInfo(peer));
    let res = app.clone().oneshot(req).await.unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    let mut req = request().header("x-forwarded-for", "10.0.0.9").body(Body::empty()).unwrap();
    req.extensions_mut().insert(ConnectInfo(peer));
    let res = app.oneshot(req).await.unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn denied_host_is_forbidden_before_body_capture() {
    let app = build_router(state(|c| {
        c.proxy.max_body_size = "4".into();
        c.access.allowed_forwarded_hosts = vec!["api.example.com".into()];
    }));

    let res = app
        .clone()
        .oneshot(
            request()
                .method("POST")
                .header("forward-url", "https://other.example.com/")
                .body(Body::from("way more than four bytes"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    let res = app
        .oneshot(
            request()
                .method("POST")
                .header("forward-url", "https://API.EXAMPLE.COM/upload")
                .body(Body::from("way more than four bytes"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::PAYLOAD_TOO_LARGE);
}

#[tokio::test]
async fn permits_return_after_each_rejection() {
    let state = state(|c| c.proxy.max_concurrency = 2);
    let app = build_router(state.clone());

    for _ in 0..5 {
        let res = app.clone().oneshot(request().body(Body::empty()).unwrap()).await.unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }
    assert_eq!(state.admission.available(), 2);
}
