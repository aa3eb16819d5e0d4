pub mod auth;
pub mod error;
pub mod routes;
pub mod state;

use axum::http::StatusCode;
use axum::middleware;
use axum::response::Response;
use axum::routing::{delete, get, put};
use axum::Router;
use std::path::Path;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use state::AppState;

/// Build the axum Router with all API routes and middleware.
/// Used by `serve_on()` and available for integration testing.
pub fn build_router(app_state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api = Router::new()
        // Tasks
        .route(
            "/tasks",
            get(routes::tasks::list_tasks).post(routes::tasks::add_task),
        )
        .route(
            "/tasks/completed",
            delete(routes::tasks::delete_completed_tasks),
        )
        .route("/tasks/{id}", put(routes::tasks::set_task_completion))
        // Sessions
        .route(
            "/sessions",
            get(routes::sessions::session_history).post(routes::sessions::record_session),
        )
        .route("/sessions/summary", get(routes::sessions::session_summary))
        // Events (SSE)
        .route("/events", get(routes::events::sse_events))
        .method_not_allowed_fallback(method_not_allowed)
        .route_layer(middleware::from_fn_with_state(
            app_state.clone(),
            auth::auth_middleware,
        ));

    Router::new()
        .nest("/api/v1", api)
        .fallback(not_found)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(app_state)
}

async fn not_found() -> Response {
    error::json_error(StatusCode::NOT_FOUND, "not found")
}

async fn method_not_allowed() -> Response {
    error::json_error(StatusCode::METHOD_NOT_ALLOWED, "method not allowed")
}

/// Serve the API for the data in `root` on a pre-bound listener, so the
/// caller can report the actual port (the OS picks one for port 0).
pub async fn serve_on(root: &Path, listener: tokio::net::TcpListener) -> anyhow::Result<()> {
    let actual_port = listener.local_addr()?.port();
    let app = build_router(AppState::open(root)?);

    tracing::info!("pomo server listening on http://localhost:{actual_port}");

    axum::serve(listener, app).await?;
    Ok(())
}
