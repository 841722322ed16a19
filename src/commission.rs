//! Commission calculation
//!
//! All rates use 10^6 precision: 100_000 = 10.00%
//!
//! Routing:
//! - direct income goes to the seller's sponsor (`direct_parent_id`)
//! - indirect income walks the structural ancestor chain, one schedule
//!   entry per paid level; brand owners are skipped without consuming a level

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::core_types::{Amount, NodeId, Rate, SaleId};
use crate::error::{EngineError, EngineResult};
use crate::node::{FinancialDelta, UserType};
use crate::store::NodeStore;

/// Rate precision (10^6 = 1,000,000)
pub const RATE_PRECISION: u64 = 1_000_000;

/// Default direct commission (100_000 = 10%)
pub const DEFAULT_DIRECT_RATE: Rate = 100_000;

/// Default indirect commission for the first structural level (50_000 = 5%)
pub const DEFAULT_INDIRECT_RATE: Rate = 50_000;

/// Calculate commission from amount and rate, rounding down.
///
/// Uses u128 intermediate; a result that does not fit an `Amount` (rate
/// above 100%) is an error, never a truncated value.
///
/// # Example
/// ```
/// use referral_tree::commission::calculate_commission;
/// // 1000 * 10% = 100
/// assert_eq!(calculate_commission(1000, 100_000), Ok(100));
/// ```
#[inline]
pub fn calculate_commission(amount: Amount, rate: Rate) -> EngineResult<Amount> {
    let raw = amount as u128 * rate as u128 / RATE_PRECISION as u128;
    Amount::try_from(raw).map_err(|_| {
        EngineError::InvalidAmount(format!(
            "commission on {} at rate {} overflows",
            amount, rate
        ))
    })
}

/// Direct rate plus a per-level indirect schedule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommissionSchedule {
    #[serde(default = "default_direct_rate")]
    pub direct_rate: Rate,
    /// `indirect_rates[0]` applies to the first paid structural ancestor
    #[serde(default = "default_indirect_rates")]
    pub indirect_rates: Vec<Rate>,
}

fn default_direct_rate() -> Rate {
    DEFAULT_DIRECT_RATE
}

fn default_indirect_rates() -> Vec<Rate> {
    vec![DEFAULT_INDIRECT_RATE]
}

impl Default for CommissionSchedule {
    fn default() -> Self {
        Self {
            direct_rate: DEFAULT_DIRECT_RATE,
            indirect_rates: default_indirect_rates(),
        }
    }
}

impl CommissionSchedule {
    /// Rates above 100% would pay out more than the sale.
    pub fn validate(&self) -> Result<(), String> {
        if self.direct_rate > RATE_PRECISION {
            return Err(format!("direct_rate {} exceeds 100%", self.direct_rate));
        }
        if let Some(r) = self.indirect_rates.iter().find(|r| **r > RATE_PRECISION) {
            return Err(format!("indirect rate {} exceeds 100%", r));
        }
        let total: u128 = self.direct_rate as u128
            + self.indirect_rates.iter().map(|r| *r as u128).sum::<u128>();
        if total > RATE_PRECISION as u128 {
            return Err("combined commission rates exceed 100%".into());
        }
        Ok(())
    }
}

/// One indirect credit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
pub struct IndirectCredit {
    pub node_id: NodeId,
    /// 1 = first paid structural ancestor
    pub level: usize,
    pub amount: Amount,
}

/// Every figure one sale changes, computed before anything is written
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommissionPlan {
    pub seller_id: NodeId,
    pub amount: Amount,
    /// `(sponsor, amount)`; `None` for the founder, who has no sponsor
    pub direct: Option<(NodeId, Amount)>,
    pub indirect: Vec<IndirectCredit>,
}

impl CommissionPlan {
    /// Deltas for [`NodeStore::apply_deltas`]. Zero-value credits are kept
    /// out.
    pub fn deltas(&self) -> Vec<(NodeId, FinancialDelta)> {
        let mut deltas = vec![(self.seller_id, FinancialDelta::sale(self.amount))];
        if let Some((sponsor, amount)) = self.direct {
            if amount > 0 {
                deltas.push((sponsor, FinancialDelta::direct(amount)));
            }
        }
        deltas.extend(
            self.indirect
                .iter()
                .filter(|c| c.amount > 0)
                .map(|c| (c.node_id, FinancialDelta::indirect(c.amount))),
        );
        deltas
    }

    pub fn total_paid(&self) -> Amount {
        self.direct.map(|(_, a)| a).unwrap_or(0)
            + self.indirect.iter().map(|c| c.amount).sum::<Amount>()
    }
}

/// Direct credit paid to the seller's sponsor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
pub struct DirectCredit {
    pub node_id: NodeId,
    pub amount: Amount,
}

/// What a recorded sale paid out
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct SaleReceipt {
    pub sale_id: SaleId,
    pub seller_id: NodeId,
    pub amount: Amount,
    pub direct: Option<DirectCredit>,
    pub indirect: Vec<IndirectCredit>,
    pub total_paid: Amount,
}

impl SaleReceipt {
    pub fn new(sale_id: SaleId, plan: &CommissionPlan) -> Self {
        Self {
            sale_id,
            seller_id: plan.seller_id,
            amount: plan.amount,
            direct: plan
                .direct
                .map(|(node_id, amount)| DirectCredit { node_id, amount }),
            indirect: plan.indirect.clone(),
            total_paid: plan.total_paid(),
        }
    }
}

pub struct CommissionCalculator;

impl CommissionCalculator {
    /// Plan the income effects of a sale without touching the store.
    pub fn plan(
        store: &NodeStore,
        schedule: &CommissionSchedule,
        seller: NodeId,
        amount: Amount,
    ) -> EngineResult<CommissionPlan> {
        if amount == 0 {
            return Err(EngineError::InvalidAmount(
                "sale amount must be positive".into(),
            ));
        }
        schedule.validate().map_err(EngineError::InvalidAmount)?;
        let seller_node = store.get_node(seller)?;

        let direct = match seller_node.direct_parent_id() {
            Some(sponsor) => Some((sponsor, calculate_commission(amount, schedule.direct_rate)?)),
            None => None,
        };

        let mut indirect = Vec::with_capacity(schedule.indirect_rates.len());
        let mut rates = schedule.indirect_rates.iter();
        if !schedule.indirect_rates.is_empty() {
            for ancestor in store.structural_ancestors(seller)? {
                if store.get_node(ancestor)?.user_type() == UserType::BrandOwner {
                    continue;
                }
                let Some(rate) = rates.next() else {
                    break;
                };
                indirect.push(IndirectCredit {
                    node_id: ancestor,
                    level: indirect.len() + 1,
                    amount: calculate_commission(amount, *rate)?,
                });
            }
        }

        Ok(CommissionPlan {
            seller_id: seller,
            amount,
            direct,
            indirect,
        })
    }

    /// Plan and apply a sale as one unit.
    pub fn apply(
        store: &mut NodeStore,
        schedule: &CommissionSchedule,
        seller: NodeId,
        amount: Amount,
    ) -> EngineResult<CommissionPlan> {
        let plan = Self::plan(store, schedule, seller, amount)?;
        store.apply_deltas(&plan.deltas())?;
        Ok(plan)
    }
}
