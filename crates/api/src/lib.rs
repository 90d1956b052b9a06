pub mod error;
pub mod extractors;
pub mod routes;
pub mod state;
pub mod ws;

use axum::{
    Router,
    routing::{get, patch, post},
};
use state::AppState;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Auth routes
    let auth_routes = Router::new()
        .route("/register", post(routes::auth::register))
        .route("/login", post(routes::auth::login))
        .route("/logout", post(routes::auth::logout))
        .route("/refresh", post(routes::auth::refresh))
        .route("/me", get(routes::auth::me));

    // Credit ledger routes
    let credit_routes = Router::new()
        .route("/adjust", post(routes::credit::adjust))
        .route("/transactions", get(routes::credit::transactions));

    // Payment routes (manual top-up flow)
    let payment_routes = Router::new()
        .route("/", get(routes::payment::list_own))
        .route("/", post(routes::payment::submit));

    // Transcription history routes
    let history_routes = Router::new()
        .route("/", get(routes::history::list))
        .route("/", post(routes::history::save));

    // Admin routes (role-gated by the AdminUser extractor)
    let admin_routes = Router::new()
        .route("/users", get(routes::admin::list_users))
        .route("/users/{user_id}", get(routes::admin::get_user))
        .route("/payments", get(routes::admin::list_payments))
        .route(
            "/payments/{payment_id}",
            patch(routes::admin::review_payment),
        );

    // Compose API
    let api = Router::new()
        .nest("/auth", auth_routes)
        .nest("/credits", credit_routes)
        .nest("/payments", payment_routes)
        .nest("/history", history_routes)
        .nest("/admin", admin_routes);

    // Health check
    let health = Router::new().route("/health", get(health_check));

    Router::new()
        .nest("/api", api)
        .merge(health)
        .route("/ws", get(ws::handler::ws_upgrade))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

async fn health_check() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
