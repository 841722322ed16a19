//! Sale and correction handlers

use std::sync::Arc;

use axum::{Json, extract::State};

use crate::money;
use crate::view::NodeView;

use super::super::state::AppState;
use super::super::types::{ApiResult, CorrectionRequest, SaleData, SaleRequest, ok};

/// Record a sale and pay its commissions
///
/// POST /api/v1/sales
#[utoipa::path(
    post,
    path = "/api/v1/sales",
    request_body = SaleRequest,
    responses(
        (status = 200, description = "Sale recorded", body = SaleData, content_type = "application/json"),
        (status = 400, description = "Invalid amount"),
        (status = 404, description = "Seller not found")
    ),
    tag = "Sales"
)]
pub async fn record_sale(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SaleRequest>,
) -> ApiResult<SaleData> {
    let decimals = state.currency_decimals;
    let amount = money::parse_amount(&req.amount, decimals)?;
    let seller = req.seller_id;
    let receipt = state
        .call(move |engine| engine.record_sale(seller, amount))
        .await?;
    ok(SaleData::new(receipt, decimals))
}

/// Apply a signed correction to a node's figures
///
/// POST /api/v1/corrections
#[utoipa::path(
    post,
    path = "/api/v1/corrections",
    request_body = CorrectionRequest,
    responses(
        (status = 200, description = "Corrected node", body = NodeView, content_type = "application/json"),
        (status = 400, description = "Correction out of range"),
        (status = 404, description = "Node not found")
    ),
    tag = "Sales"
)]
pub async fn correct_financials(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CorrectionRequest>,
) -> ApiResult<NodeView> {
    let correction = req.to_correction(state.currency_decimals)?;
    let id = req.node_id;
    ok(state
        .call(move |engine| engine.correct_financials(id, correction))
        .await?)
}
