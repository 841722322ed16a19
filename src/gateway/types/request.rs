//! Request bodies and response DTOs

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::commission::SaleReceipt;
use crate::core_types::NodeId;
use crate::money::{self, MoneyError};
use crate::node::{FinancialCorrection, NewParticipant, Side, UserType};
use crate::placement::Placement;
use crate::view::NodeView;

use super::response::ApiError;

fn default_user_type() -> UserType {
    UserType::Customer
}

/// POST /api/v1/participants
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct RegisterRequest {
    #[schema(example = 1)]
    pub sponsor_id: NodeId,
    #[schema(example = "Alice")]
    pub name: String,
    #[schema(example = "alice@example.com")]
    pub email: String,
    /// `customer` (default) or `brand_owner`
    #[serde(default = "default_user_type")]
    pub user_type: UserType,
    #[serde(default)]
    pub brand_name: Option<String>,
}

impl RegisterRequest {
    pub fn into_participant(self) -> Result<NewParticipant, ApiError> {
        if self.user_type == UserType::Founder {
            return Err(ApiError::bad_request(
                "founder is created at start-up and cannot be registered",
            ));
        }
        Ok(NewParticipant {
            name: self.name,
            email: self.email,
            user_type: self.user_type,
            brand_name: self.brand_name,
        })
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RegistrationData {
    pub node_id: NodeId,
    pub sponsor_id: NodeId,
    pub structural_parent_id: NodeId,
    pub side: Side,
    /// Placed below the sponsor's own slots
    pub spillover: bool,
}

impl From<Placement> for RegistrationData {
    fn from(p: Placement) -> Self {
        Self {
            node_id: p.node_id,
            sponsor_id: p.sponsor_id,
            structural_parent_id: p.structural_parent_id,
            side: p.side,
            spillover: p.is_spillover(),
        }
    }
}

/// POST /api/v1/sales
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct SaleRequest {
    #[schema(example = 3)]
    pub seller_id: NodeId,
    /// Decimal string in currency units
    #[schema(example = "1000.00")]
    pub amount: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SaleData {
    pub receipt: SaleReceipt,
    #[schema(example = "1000.00")]
    pub amount_display: String,
    #[schema(example = "150.00")]
    pub total_paid_display: String,
}

impl SaleData {
    pub fn new(receipt: SaleReceipt, decimals: u32) -> Self {
        Self {
            amount_display: money::format_amount(receipt.amount, decimals),
            total_paid_display: money::format_amount(receipt.total_paid, decimals),
            receipt,
        }
    }
}

/// POST /api/v1/corrections
///
/// Each field is a signed decimal string; omitted fields are left alone.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CorrectionRequest {
    pub node_id: NodeId,
    #[serde(default)]
    #[schema(example = "-10.00")]
    pub direct_income: Option<String>,
    #[serde(default)]
    pub indirect_income: Option<String>,
    #[serde(default)]
    pub total_sales: Option<String>,
}

impl CorrectionRequest {
    pub fn to_correction(&self, decimals: u32) -> Result<FinancialCorrection, MoneyError> {
        let field = |v: &Option<String>| -> Result<i64, MoneyError> {
            v.as_deref()
                .map(|s| money::parse_signed_amount(s, decimals))
                .transpose()
                .map(|v| v.unwrap_or(0))
        };
        Ok(FinancialCorrection {
            direct_income: field(&self.direct_income)?,
            indirect_income: field(&self.indirect_income)?,
            total_sales: field(&self.total_sales)?,
        })
    }
}

/// Level-order listing; `levels[0]` is the root
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct TreeData {
    /// State version the listing was taken at
    pub version: u64,
    pub total_nodes: usize,
    pub levels: Vec<Vec<NodeView>>,
}

impl TreeData {
    pub fn new(version: u64, levels: Vec<Vec<NodeView>>) -> Self {
        Self {
            version,
            total_nodes: levels.iter().map(Vec::len).sum(),
            levels,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_request_defaults_to_customer() {
        let req: RegisterRequest =
            serde_json::from_str(r#"{"sponsor_id":1,"name":"a","email":"a@x.io"}"#).unwrap();
        let attrs = req.into_participant().unwrap();
        assert_eq!(attrs.user_type, UserType::Customer);
    }

    #[test]
    fn test_register_request_rejects_founder() {
        let req: RegisterRequest = serde_json::from_str(
            r#"{"sponsor_id":1,"name":"a","email":"a@x.io","user_type":"founder"}"#,
        )
        .unwrap();
        assert!(req.into_participant().is_err());
    }

    #[test]
    fn test_correction_request() {
        let req: CorrectionRequest =
            serde_json::from_str(r#"{"node_id":2,"direct_income":"-1.50","total_sales":"3"}"#)
                .unwrap();
        let c = req.to_correction(2).unwrap();
        assert_eq!(
            c,
            FinancialCorrection {
                direct_income: -150,
                indirect_income: 0,
                total_sales: 300,
            }
        );

        let bad: CorrectionRequest =
            serde_json::from_str(r#"{"node_id":2,"direct_income":"1.234"}"#).unwrap();
        assert!(bad.to_correction(2).is_err());
    }
}
