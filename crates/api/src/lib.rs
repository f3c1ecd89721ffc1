//! `api` crate — the HTTP surface (C13).
//!
//! Exposes, under `/v0/namespace/{ns}` (all requiring `X-API-Key`):
//!   PUT    /graph/:g                 upsert a template, schedules async validation
//!   GET    /graph/:g                 read a template + validation status
//!   GET    /graphs/                  list templates
//!   PUT    /nodes/                   register a worker runtime's node kinds
//!   GET    /nodes/                   list registered nodes
//!   POST   /graph/:g/trigger         start a run
//!   POST   /states/enqueue           worker pull
//!   POST   /state/:id/executed       worker report: success
//!   POST   /state/:id/errored        worker report: failure
//!   POST   /state/:id/prune          worker report: abandon
//!   POST   /state/:id/re-enqueue-after
//!   GET    /state/:id/secrets        unsealed secret envelope
//!   GET    /runs/:page/:size         paginated run list
//!   GET    /states/run/:run_id/graph actual-state graph render
//! plus an unauthenticated, unprefixed `GET /health`.

pub mod error;
pub mod handlers;
pub mod middleware;

use axum::routing::{get, post, put};
use axum::Router;
use db::DbPool;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

#[derive(Clone)]
pub struct AppState {
    pub pool: DbPool,
    pub api_key: String,
    pub secrets_key: [u8; 32],
}

pub fn router(state: AppState, cors: CorsLayer) -> Router {
    let namespaced = Router::new()
        .route("/graph/:g", put(handlers::graphs::upsert).get(handlers::graphs::get))
        .route("/graphs/", get(handlers::graphs::list))
        .route("/nodes/", put(handlers::nodes::upsert).get(handlers::nodes::list))
        .route("/graph/:g/trigger", post(handlers::graphs::trigger))
        .route("/states/enqueue", post(handlers::states::enqueue))
        .route("/state/:id/executed", post(handlers::states::executed))
        .route("/state/:id/errored", post(handlers::states::errored))
        .route("/state/:id/prune", post(handlers::states::prune))
        .route("/state/:id/re-enqueue-after", post(handlers::states::reenqueue_after))
        .route("/state/:id/secrets", get(handlers::states::secrets))
        .route("/runs/:page/:size", get(handlers::runs::list_page))
        .route("/states/run/:run_id/graph", get(handlers::runs::graph))
        .route_layer(axum::middleware::from_fn_with_state(state.clone(), middleware::auth::require_api_key));

    Router::new()
        .route("/health", get(handlers::health::health))
        .nest("/v0/namespace/:ns", namespaced)
        .layer(axum::middleware::from_fn(middleware::request_id::propagate_request_id))
        .layer(TraceLayer::new_for_http())
        .layer(CatchPanicLayer::new())
        .layer(cors)
        .with_state(state)
}

pub async fn serve(bind: &str, state: AppState, cors: CorsLayer) -> Result<(), std::io::Error> {
    let app = router(state, cors);

    let listener = tokio::net::TcpListener::bind(bind).await?;
    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await
}
