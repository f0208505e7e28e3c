//! `api` crate — HTTP REST API layer
//!
//! Exposes:
//!   GET    /api/v2/workflows
//!   POST   /api/v2/workflows
//!   GET    /api/v2/workflows/:id
//!   DELETE /api/v2/workflows/:id
//!   POST   /api/v2/workflows/:name/executions
//!   GET    /api/v2/executions/:id
//!   GET    /api/v2/executions/:id/tasks
//!   GET    /api/v2/tasks
//!   GET    /api/v2/tasks/:id
//!   PUT    /api/v2/tasks/:id

pub mod handlers;

use std::sync::Arc;

use axum::{
    routing::{get, post, put},
    Router,
};
use db::DbPool;
use engine::Engine;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

#[derive(Clone)]
pub struct AppState {
    pub pool: DbPool,
    pub engine: Arc<Engine>,
}

pub async fn serve(bind: &str, pool: DbPool, engine: Arc<Engine>) -> Result<(), std::io::Error> {
    let state = AppState { pool, engine };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_router = Router::new()
        .route("/workflows", get(handlers::workflows::list).post(handlers::workflows::create))
        .route("/workflows/:id", get(handlers::workflows::get).delete(handlers::workflows::delete))
        .route("/workflows/:name/executions", post(handlers::executions::start))
        .route("/executions/:id", get(handlers::executions::get))
        .route("/executions/:id/tasks", get(handlers::executions::list_tasks))
        .route("/tasks", get(handlers::tasks::list))
        .route("/tasks/:id", get(handlers::tasks::get).put(handlers::tasks::complete));

    let app = Router::new()
        .nest("/api/v2", api_router)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(bind).await?;
    tracing::info!("Server listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await
}
