// tests/auth_guard_tests.rs

use std::sync::Arc;

use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
};
use exam_platform::{
    config::Config,
    models::user::Role,
    routes,
    state::AppState,
    store::MemoryStore,
    utils::jwt::sign_jwt,
};
use tower::ServiceExt;
use uuid::Uuid;

const SECRET: &str = "guard_test_secret";

fn app() -> axum::Router {
    let config = Config {
        database_url: None,
        jwt_secret: SECRET.to_string(),
        jwt_expiration: 600,
        rust_log: "error".to_string(),
        admin_username: None,
        admin_password: None,
        tick_interval_ms: 1000,
        session_max_age_secs: 3600,
        bind_addr: "127.0.0.1:0".to_string(),
    };
    routes::create_router(AppState::new(Arc::new(MemoryStore::new()), config))
}

fn request(method: Method, uri: &str, token: Option<&str>) -> Request<Body> {
    let mut req = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json");
    if let Some(token) = token {
        req = req.header("authorization", format!("Bearer {}", token));
    }
    req.body(Body::empty())
        .expect("request build should succeed")
}

#[tokio::test]
async fn protected_routes_reject_missing_token() {
    let app = app();
    let id = Uuid::new_v4();

    let cases = [
        (Method::GET, "/api/auth/me".to_string()),
        (Method::GET, "/api/exam-sets".to_string()),
        (Method::POST, "/api/attempts".to_string()),
        (Method::GET, format!("/api/attempts/{}", id)),
        (Method::POST, format!("/api/attempts/{}/submit", id)),
        (Method::GET, "/api/results/me".to_string()),
        (Method::GET, "/api/admin/attempts".to_string()),
    ];

    for (method, uri) in cases {
        let resp = app
            .clone()
            .oneshot(request(method, &uri, None))
            .await
            .expect("router should respond");

        assert_eq!(
            resp.status(),
            StatusCode::UNAUTHORIZED,
            "expected UNAUTHORIZED for {uri}",
        );
    }
}

#[tokio::test]
async fn tokens_signed_with_another_secret_are_rejected() {
    let token = sign_jwt(Uuid::new_v4(), Role::Admin, "someone_else", 600).unwrap();

    let resp = app()
        .oneshot(request(Method::GET, "/api/admin/exam-sets", Some(&token)))
        .await
        .expect("router should respond");

    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn admin_routes_check_role() {
    let app = app();
    let student = sign_jwt(Uuid::new_v4(), Role::Student, SECRET, 600).unwrap();
    let admin = sign_jwt(Uuid::new_v4(), Role::Admin, SECRET, 600).unwrap();

    let resp = app
        .clone()
        .oneshot(request(Method::GET, "/api/admin/exam-sets", Some(&student)))
        .await
        .expect("router should respond");
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    let resp = app
        .oneshot(request(Method::GET, "/api/admin/exam-sets", Some(&admin)))
        .await
        .expect("router should respond");
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn unknown_attempt_is_not_found() {
    let student = sign_jwt(Uuid::new_v4(), Role::Student, SECRET, 600).unwrap();
    let uri = format!("/api/attempts/{}", Uuid::new_v4());

    let resp = app()
        .oneshot(request(Method::GET, &uri, Some(&student)))
        .await
        .expect("router should respond");

    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}
