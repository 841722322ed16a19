//! Whole-tree handlers (listing, consolidation, ledger export)

use std::sync::Arc;

use axum::{
    extract::State,
    http::header,
    response::{IntoResponse, Response},
};

use crate::consolidation::ConsolidationReport;

use super::super::state::AppState;
use super::super::types::{ApiError, ApiResult, TreeData, ok};

/// Level-order listing from the founder
///
/// Served from the last published snapshot while a consolidation run holds
/// the tree.
#[utoipa::path(
    get,
    path = "/api/v1/tree",
    responses(
        (status = 200, description = "Tree levels, level 0 is the founder", body = TreeData, content_type = "application/json")
    ),
    tag = "Tree"
)]
pub async fn list_tree(State(state): State<Arc<AppState>>) -> ApiResult<TreeData> {
    let snapshot = state.engine.list_tree()?;
    ok(TreeData::new(snapshot.version, snapshot.levels.clone()))
}

/// Run one consolidation cycle
///
/// POST /api/v1/consolidation
#[utoipa::path(
    post,
    path = "/api/v1/consolidation",
    responses(
        (status = 200, description = "Consolidation report", body = ConsolidationReport, content_type = "application/json"),
        (status = 500, description = "Consolidation aborted, tree unchanged")
    ),
    tag = "Tree"
)]
pub async fn run_consolidation(
    State(state): State<Arc<AppState>>,
) -> ApiResult<ConsolidationReport> {
    ok(state.call(|engine| engine.run_consolidation()).await?)
}

/// Full ledger as CSV
///
/// GET /api/v1/ledger.csv
#[utoipa::path(
    get,
    path = "/api/v1/ledger.csv",
    responses(
        (status = 200, description = "Ledger CSV", body = String, content_type = "text/csv")
    ),
    tag = "Tree"
)]
pub async fn export_ledger(State(state): State<Arc<AppState>>) -> Result<Response, ApiError> {
    let csv = state
        .call(|engine| {
            let mut buf = Vec::new();
            engine.export_ledger_csv(&mut buf)?;
            Ok(buf)
        })
        .await?;
    Ok(([(header::CONTENT_TYPE, "text/csv; charset=utf-8")], csv).into_response())
}
