use std::sync::Arc;

use crate::engine::ReferralEngine;
use crate::error::EngineResult;

use super::types::ApiError;

/// Gateway shared state
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<ReferralEngine>,
    /// Decimal places of amounts on the wire
    pub currency_decimals: u32,
}

impl AppState {
    pub fn new(engine: Arc<ReferralEngine>) -> Self {
        let currency_decimals = engine.settings().rewards.currency_decimals;
        Self {
            engine,
            currency_decimals,
        }
    }

    /// Run an engine call on the blocking pool. Writers may wait on the tree
    /// lock for a whole consolidation run.
    pub async fn call<T, F>(&self, f: F) -> Result<T, ApiError>
    where
        F: FnOnce(&ReferralEngine) -> EngineResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let engine = Arc::clone(&self.engine);
        tokio::task::spawn_blocking(move || f(&engine))
            .await
            .map_err(|e| ApiError::internal(format!("engine task failed: {}", e)))?
            .map_err(ApiError::from)
    }
}
