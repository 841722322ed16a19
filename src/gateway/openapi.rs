//! OpenAPI / Swagger UI Documentation
//!
//! - Swagger UI: `http://localhost:8080/docs`
//! - OpenAPI JSON: `http://localhost:8080/api-docs/openapi.json`

use utoipa::OpenApi;

use crate::commission::{DirectCredit, IndirectCredit, SaleReceipt};
use crate::consolidation::{ConsolidationReport, CreditAllocation, SwapDetail};
use crate::gateway::handlers::HealthResponse;
use crate::gateway::types::{
    CorrectionRequest, RegisterRequest, RegistrationData, SaleData, SaleRequest, TreeData,
};
use crate::ledger::{LedgerEntry, LedgerField, LedgerOp, LedgerReason};
use crate::node::{Side, UserType};
use crate::view::NodeView;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Referral Tree API",
        version = "1.0.0",
        description = "Binary referral tree with spillover placement, multi-level commissions and periodic consolidation.",
        license(
            name = "MIT"
        )
    ),
    servers(
        (url = "http://localhost:8080", description = "Development"),
    ),
    paths(
        crate::gateway::handlers::health_check,
        // Participants
        crate::gateway::handlers::register_participant,
        crate::gateway::handlers::get_participant,
        crate::gateway::handlers::get_referrals,
        crate::gateway::handlers::get_subtree,
        crate::gateway::handlers::get_ledger,
        // Sales
        crate::gateway::handlers::record_sale,
        crate::gateway::handlers::correct_financials,
        // Tree
        crate::gateway::handlers::list_tree,
        crate::gateway::handlers::run_consolidation,
        crate::gateway::handlers::export_ledger,
    ),
    components(
        schemas(
            HealthResponse,
            RegisterRequest,
            RegistrationData,
            SaleRequest,
            SaleData,
            SaleReceipt,
            DirectCredit,
            IndirectCredit,
            CorrectionRequest,
            NodeView,
            TreeData,
            ConsolidationReport,
            SwapDetail,
            CreditAllocation,
            LedgerEntry,
            LedgerField,
            LedgerReason,
            LedgerOp,
            UserType,
            Side,
        )
    ),
    tags(
        (name = "Participants", description = "Registration and per-node queries"),
        (name = "Sales", description = "Sales, commissions and corrections"),
        (name = "Tree", description = "Tree listing, consolidation and ledger export"),
        (name = "System", description = "Health checks and system info")
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_spec_generates() {
        let spec = ApiDoc::openapi();
        assert_eq!(spec.info.title, "Referral Tree API");
        assert_eq!(spec.info.version, "1.0.0");
    }

    #[test]
    fn test_openapi_json_serializable() {
        let json = ApiDoc::openapi().to_json().unwrap();
        assert!(json.contains("Referral Tree API"));
        assert!(json.contains("ConsolidationReport"));
    }

    #[test]
    fn test_endpoints_registered() {
        let paths = ApiDoc::openapi().paths.paths;
        for path in [
            "/api/v1/health",
            "/api/v1/participants",
            "/api/v1/participants/{id}",
            "/api/v1/participants/{id}/referrals",
            "/api/v1/participants/{id}/tree",
            "/api/v1/participants/{id}/ledger",
            "/api/v1/sales",
            "/api/v1/corrections",
            "/api/v1/tree",
            "/api/v1/consolidation",
            "/api/v1/ledger.csv",
        ] {
            assert!(paths.contains_key(path), "missing {}", path);
        }
    }
}
