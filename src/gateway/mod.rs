pub mod handlers;
pub mod openapi;
pub mod state;
pub mod types;

use axum::{
    Router,
    routing::{get, post},
};
use std::sync::Arc;
use tokio::net::TcpListener;

use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::engine::ReferralEngine;
use state::AppState;

/// Build the HTTP router over a shared engine
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/v1/health", get(handlers::health_check))
        // Participants
        .route("/api/v1/participants", post(handlers::register_participant))
        .route("/api/v1/participants/{id}", get(handlers::get_participant))
        .route(
            "/api/v1/participants/{id}/referrals",
            get(handlers::get_referrals),
        )
        .route("/api/v1/participants/{id}/tree", get(handlers::get_subtree))
        .route("/api/v1/participants/{id}/ledger", get(handlers::get_ledger))
        // Sales
        .route("/api/v1/sales", post(handlers::record_sale))
        .route("/api/v1/corrections", post(handlers::correct_financials))
        // Tree
        .route("/api/v1/tree", get(handlers::list_tree))
        .route("/api/v1/consolidation", post(handlers::run_consolidation))
        .route("/api/v1/ledger.csv", get(handlers::export_ledger))
        .with_state(state)
        // Swagger UI is stateless, merged after with_state
        .merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", openapi::ApiDoc::openapi()))
}

/// Start HTTP Gateway server
pub async fn run_server(host: &str, port: u16, engine: Arc<ReferralEngine>) -> anyhow::Result<()> {
    let state = Arc::new(AppState::new(engine));
    let app = router(state);

    let addr = format!("{}:{}", host, port);
    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|e| anyhow::anyhow!("failed to bind {}: {}", addr, e))?;

    tracing::info!(%addr, "Gateway listening");
    tracing::info!("API Docs: http://{}/docs", addr);

    axum::serve(listener, app).await?;
    Ok(())
}
