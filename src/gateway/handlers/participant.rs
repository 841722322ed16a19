//! Participant handlers (register, lookup, referrals, subtree, ledger)

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
};

use crate::core_types::NodeId;
use crate::ledger::LedgerEntry;
use crate::view::NodeView;

use super::super::state::AppState;
use super::super::types::{ApiResult, RegisterRequest, RegistrationData, TreeData, ok};

/// Register a participant under a sponsor
///
/// POST /api/v1/participants
#[utoipa::path(
    post,
    path = "/api/v1/participants",
    request_body = RegisterRequest,
    responses(
        (status = 200, description = "Participant placed", body = RegistrationData, content_type = "application/json"),
        (status = 400, description = "Invalid attributes"),
        (status = 404, description = "Sponsor not found")
    ),
    tag = "Participants"
)]
pub async fn register_participant(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RegisterRequest>,
) -> ApiResult<RegistrationData> {
    let sponsor = req.sponsor_id;
    let attrs = req.into_participant()?;
    let placement = state
        .call(move |engine| engine.register(sponsor, attrs))
        .await?;
    ok(placement.into())
}

/// Get one participant
///
/// GET /api/v1/participants/{id}
#[utoipa::path(
    get,
    path = "/api/v1/participants/{id}",
    params(("id" = u64, Path, description = "Node ID")),
    responses(
        (status = 200, description = "Node view", body = NodeView, content_type = "application/json"),
        (status = 404, description = "Node not found")
    ),
    tag = "Participants"
)]
pub async fn get_participant(
    State(state): State<Arc<AppState>>,
    Path(id): Path<NodeId>,
) -> ApiResult<NodeView> {
    ok(state.call(move |engine| engine.get_node(id)).await?)
}

/// Participants sponsored by a node, in registration order
///
/// GET /api/v1/participants/{id}/referrals
#[utoipa::path(
    get,
    path = "/api/v1/participants/{id}/referrals",
    params(("id" = u64, Path, description = "Sponsor node ID")),
    responses(
        (status = 200, description = "Direct referrals", body = Vec<NodeView>, content_type = "application/json"),
        (status = 404, description = "Node not found")
    ),
    tag = "Participants"
)]
pub async fn get_referrals(
    State(state): State<Arc<AppState>>,
    Path(id): Path<NodeId>,
) -> ApiResult<Vec<NodeView>> {
    ok(state.call(move |engine| engine.direct_referrals(id)).await?)
}

/// Level-order listing of a node's structural subtree
///
/// GET /api/v1/participants/{id}/tree
#[utoipa::path(
    get,
    path = "/api/v1/participants/{id}/tree",
    params(("id" = u64, Path, description = "Subtree root node ID")),
    responses(
        (status = 200, description = "Subtree levels", body = TreeData, content_type = "application/json"),
        (status = 404, description = "Node not found")
    ),
    tag = "Tree"
)]
pub async fn get_subtree(
    State(state): State<Arc<AppState>>,
    Path(id): Path<NodeId>,
) -> ApiResult<TreeData> {
    let snapshot = state.call(move |engine| engine.list_subtree(id)).await?;
    ok(TreeData::new(snapshot.version, snapshot.levels))
}

/// Income and credit history of one node
///
/// GET /api/v1/participants/{id}/ledger
#[utoipa::path(
    get,
    path = "/api/v1/participants/{id}/ledger",
    params(("id" = u64, Path, description = "Node ID")),
    responses(
        (status = 200, description = "Ledger entries, oldest first", body = Vec<LedgerEntry>, content_type = "application/json"),
        (status = 404, description = "Node not found")
    ),
    tag = "Participants"
)]
pub async fn get_ledger(
    State(state): State<Arc<AppState>>,
    Path(id): Path<NodeId>,
) -> ApiResult<Vec<LedgerEntry>> {
    ok(state.call(move |engine| engine.ledger_entries(id)).await?)
}
