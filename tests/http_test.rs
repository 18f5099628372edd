use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use serde_json::Value;
use std::sync::Arc;
use tokenpair::auth::{
    InMemoryDirectory, InMemoryRefreshStore, Principal, RotationCoordinator, TokenHasher, TokenIssuer,
    TokenLifetimes, TokenPair, TokenSigner, TokenValidator,
};
use tokenpair::http::{build_router, HttpServerState};
use tower::ServiceExt;
use uuid::Uuid;

const SECRET: &[u8] = b"integration-secret-key-at-least-32-chars";

fn app(users: &[Principal]) -> Router {
    let signer = Arc::new(TokenSigner::new(SECRET));
    let lifetimes = TokenLifetimes::default();
    let store = Arc::new(InMemoryRefreshStore::new(
        TokenHasher::hmac_sha256(SECRET).unwrap(),
        lifetimes.refresh,
    ));
    let coordinator = Arc::new(RotationCoordinator::new(
        TokenIssuer::new(signer.clone(), lifetimes),
        TokenValidator::new(signer),
        store,
    ));
    let directory = Arc::new(InMemoryDirectory::with_users(users.iter().copied()));
    build_router(HttpServerState::new(coordinator, directory))
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Vec<u8>) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, body.to_vec())
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post_json(uri: &str, body: String) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body))
        .unwrap()
}

async fn authorize(app: &Router, principal: Principal) -> TokenPair {
    let (status, body) = send(app, get(&format!("/authorize/{}", principal))).await;
    assert_eq!(status, StatusCode::OK);
    serde_json::from_slice(&body).unwrap()
}

async fn refresh(app: &Router, pair: &TokenPair) -> (StatusCode, Vec<u8>) {
    send(app, post_json("/refresh", serde_json::to_string(pair).unwrap())).await
}

#[tokio::test]
async fn test_ping() {
    let app = app(&[]);
    let (status, body) = send(&app, get("/ping")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, b"Pong");
}

#[tokio::test]
async fn test_authorize_status_codes() {
    let known = Principal::new(Uuid::new_v4());
    let app = app(&[known]);

    let (status, body) = send(&app, get(&format!("/authorize/{}", known))).await;
    assert_eq!(status, StatusCode::OK);
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert!(json["access_token"].is_string());
    assert!(json["refresh_token"].is_string());

    let (status, _) = send(&app, get("/authorize/not-a-guid")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(&app, get(&format!("/authorize/{}", Uuid::new_v4()))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["code"], "UserNotFound");
}

#[tokio::test]
async fn test_refresh_rotates_once() {
    let principal = Principal::new(Uuid::new_v4());
    let app = app(&[principal]);

    let pair = authorize(&app, principal).await;

    let (status, body) = refresh(&app, &pair).await;
    assert_eq!(status, StatusCode::OK);
    let new_pair: TokenPair = serde_json::from_slice(&body).unwrap();
    assert_ne!(new_pair, pair);

    let (status, body) = refresh(&app, &pair).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["code"], "RefreshNotFound");

    let (status, _) = refresh(&app, &new_pair).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_refresh_rejects_bad_input() {
    let principal = Principal::new(Uuid::new_v4());
    let app = app(&[principal]);
    let first = authorize(&app, principal).await;
    let second = authorize(&app, principal).await;

    // 不成对
    let mixed = TokenPair {
        access_token: first.access_token.clone(),
        refresh_token: second.refresh_token.clone(),
    };
    let (status, body) = refresh(&app, &mixed).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["code"], "PairingMismatch");

    // 格式错误
    let garbage = TokenPair {
        access_token: "garbage".to_string(),
        refresh_token: first.refresh_token.clone(),
    };
    let (status, body) = refresh(&app, &garbage).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["code"], "Malformed");

    // 请求体不是 token 对
    let (status, _) = send(&app, post_json("/refresh", "{\"access_token\":1}".to_string())).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // 失败的请求不会消耗记录
    let (status, _) = refresh(&app, &first).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = refresh(&app, &second).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_foreign_tokens_are_rejected() {
    let principal = Principal::new(Uuid::new_v4());
    let app = app(&[principal]);

    let foreign_signer = Arc::new(TokenSigner::new(b"some-other-secret-key-at-least-32-chars"));
    let (pair, _) = TokenIssuer::new(foreign_signer, TokenLifetimes::default())
        .issue(principal)
        .unwrap();

    let (status, body) = refresh(&app, &pair).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["code"], "Authentication");
    assert_eq!(json["message"], "Invalid token");
}

#[tokio::test]
async fn test_metrics_without_recorder() {
    let app = app(&[]);
    let (status, _) = send(&app, get("/metrics")).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}
