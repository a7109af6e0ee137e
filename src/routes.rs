// src/routes.rs

use axum::{
    Router,
    http::{HeaderValue, Method},
    middleware,
    routing::{get, post, put},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    handlers::{admin, attempt, auth, catalog, results},
    state::AppState,
    utils::jwt::{admin_middleware, auth_middleware},
};

/// Assembles the main application router.
///
/// * Merges all sub-routers (auth, exam sets, attempts, results, admin).
/// * Applies global middleware (Trace, CORS).
/// * Injects global state.
pub fn create_router(state: AppState) -> Router {
    let origins = [
        HeaderValue::from_static("http://localhost:3000"),
        HeaderValue::from_static("http://127.0.0.1:3000"),
    ];

    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([
            axum::http::header::AUTHORIZATION,
            axum::http::header::CONTENT_TYPE,
        ]);

    let require_auth = middleware::from_fn_with_state(state.clone(), auth_middleware);

    let auth_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .merge(
            Router::new()
                .route("/me", get(auth::me))
                .layer(require_auth.clone()),
        );

    let exam_set_routes = Router::new()
        .route("/", get(catalog::list_exam_sets))
        .route("/{id}", get(catalog::get_exam_set))
        .route("/{id}/stats", get(catalog::exam_set_stats))
        .layer(require_auth.clone());

    let attempt_routes = Router::new()
        .route("/", post(attempt::start_attempt))
        .route(
            "/{id}",
            get(attempt::get_attempt).delete(attempt::abandon_attempt),
        )
        .route("/{id}/answers", put(attempt::record_answer))
        .route("/{id}/navigate", post(attempt::navigate))
        .route("/{id}/submit", post(attempt::submit_attempt))
        .layer(require_auth.clone());

    let result_routes = Router::new()
        .route("/me", get(results::my_results))
        .route("/", get(results::list_attempts))
        .layer(require_auth.clone());

    let admin_routes = Router::new()
        .route(
            "/exam-sets",
            get(admin::list_exam_sets).post(admin::create_exam_set),
        )
        .route(
            "/exam-sets/{id}",
            put(admin::update_exam_set).delete(admin::delete_exam_set),
        )
        .route("/exam-sets/{id}/questions", post(admin::create_question))
        .route("/exam-sets/{id}/stats", get(catalog::exam_set_stats))
        .route(
            "/questions/{id}",
            put(admin::update_question).delete(admin::delete_question),
        )
        .route("/attempts", get(results::list_attempts))
        // Double middleware protection: Auth first, then Admin check
        .layer(middleware::from_fn(admin_middleware))
        .layer(require_auth);

    Router::new()
        .nest("/api/auth", auth_routes)
        .nest("/api/exam-sets", exam_set_routes)
        .nest("/api/attempts", attempt_routes)
        .nest("/api/results", result_routes)
        .nest("/api/admin", admin_routes)
        // Global Middleware (applied from outside in)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
