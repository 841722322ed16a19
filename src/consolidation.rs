//! Consolidation Scheduler - the periodic whole-tree cycle
//!
//! ```text
//! verify structure ─▶ aggregate turnover ─▶ swap pass ─▶ aggregate again ─▶ allocate credits ─▶ report
//! ```
//!
//! The run works on a private copy of the store. The caller receives the
//! rewritten store only when every pass succeeded, so a failed run leaves
//! no partial reordering behind.
//!
//! # Swap pass
//!
//! One top-down pass over the level order captured when the pass starts.
//! For each customer parent, the richest customer child whose income
//! strictly exceeds the parent's is promoted (left wins a tie between
//! children). A node that moved once is not compared again in the same
//! pass. No iteration to a fixpoint.
//!
//! Runs are therefore not idempotent. On a chain whose income increases
//! with depth, one pass leaves the lower earner of a swapped pair above a
//! richer descendant, and the next run swaps again with no new sales.

use chrono::{DateTime, Utc};
use rustc_hash::FxHashSet;
use serde::Serialize;
use tracing::{debug, info, warn};
use utoipa::ToSchema;

use crate::core_types::{Amount, Credits, NodeId};
use crate::error::{EngineError, EngineResult};
use crate::node::{FinancialDelta, UserType};
use crate::reward::{RewardConfig, credits_to_award};
use crate::store::NodeStore;
use crate::turnover::TurnoverAggregator;

/// One parent/child exchange
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct SwapDetail {
    pub parent_id: NodeId,
    pub parent_name: String,
    pub parent_income: Amount,
    pub child_id: NodeId,
    pub child_name: String,
    pub child_income: Amount,
}

/// Credits added to one wallet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct CreditAllocation {
    pub node_id: NodeId,
    pub name: String,
    pub combined_turnover: Amount,
    /// Credits the current tier is worth
    pub tier_credits: Credits,
    pub credits_awarded: Credits,
    pub wallet_after: Credits,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct ConsolidationReport {
    pub run_id: u64,
    pub message: String,
    pub total_users: usize,
    pub swaps_performed: usize,
    pub swap_details: Vec<SwapDetail>,
    pub credit_allocations: Vec<CreditAllocation>,
    /// Founder's Franchise A + B after restructuring
    pub platform_turnover: Amount,
    pub completed_at: DateTime<Utc>,
}

/// A successful run: the rewritten store plus its report
#[derive(Debug)]
pub struct ConsolidationOutcome {
    pub store: NodeStore,
    pub report: ConsolidationReport,
}

pub struct ConsolidationScheduler;

impl ConsolidationScheduler {
    /// Run one full cycle against a copy of `store`.
    ///
    /// Any failure is reported as [`EngineError::ConsolidationAborted`] and
    /// `store` itself is never touched.
    pub fn run(
        store: &NodeStore,
        rewards: &RewardConfig,
        run_id: u64,
    ) -> EngineResult<ConsolidationOutcome> {
        let mut work = store.clone();
        match Self::run_passes(&mut work, rewards, run_id) {
            Ok(report) => {
                info!(
                    run_id,
                    users = report.total_users,
                    swaps = report.swaps_performed,
                    allocations = report.credit_allocations.len(),
                    platform_turnover = report.platform_turnover,
                    "Consolidation completed"
                );
                Ok(ConsolidationOutcome {
                    store: work,
                    report,
                })
            }
            Err(e) => {
                warn!(run_id, error = %e, "Consolidation aborted");
                Err(match e {
                    EngineError::ConsolidationAborted(_) => e,
                    other => EngineError::ConsolidationAborted(other.to_string()),
                })
            }
        }
    }

    fn run_passes(
        store: &mut NodeStore,
        rewards: &RewardConfig,
        run_id: u64,
    ) -> EngineResult<ConsolidationReport> {
        store.verify_structure()?;

        TurnoverAggregator::recompute(store)?;
        let swap_details = Self::swap_pass(store)?;
        store.verify_structure()?;

        // Subtree sums change when nodes trade places
        let summary = TurnoverAggregator::recompute(store)?;
        let credit_allocations = Self::allocate_credits(store, rewards)?;

        let total_users = store.len();
        let awarded: Credits = credit_allocations
            .iter()
            .map(|a| a.credits_awarded)
            .fold(0, Credits::saturating_add);
        let message = format!(
            "Consolidation #{} complete: {} users, {} swaps, {} credits awarded to {} users",
            run_id,
            total_users,
            swap_details.len(),
            awarded,
            credit_allocations.len()
        );

        Ok(ConsolidationReport {
            run_id,
            message,
            total_users,
            swaps_performed: swap_details.len(),
            swap_details,
            credit_allocations,
            platform_turnover: summary.platform_turnover,
            completed_at: Utc::now(),
        })
    }

    /// Promote children that out-earn their parent.
    pub fn swap_pass(store: &mut NodeStore) -> EngineResult<Vec<SwapDetail>> {
        let Some(founder) = store.founder_id() else {
            return Ok(Vec::new());
        };
        let order: Vec<NodeId> = store.level_order(founder)?.into_iter().flatten().collect();
        let mut moved: FxHashSet<NodeId> = FxHashSet::default();
        let mut details = Vec::new();

        for parent_id in order {
            if moved.contains(&parent_id) {
                continue;
            }
            let parent = store.get_node(parent_id)?;
            if parent.user_type() != UserType::Customer {
                continue;
            }
            let parent_income = parent.ranking_income();

            let mut best: Option<(NodeId, Amount)> = None;
            for child_id in parent.children() {
                if moved.contains(&child_id) {
                    continue;
                }
                let child = store.get_node(child_id)?;
                if child.user_type() != UserType::Customer {
                    continue;
                }
                let income = child.ranking_income();
                if income > parent_income && best.is_none_or(|(_, b)| income > b) {
                    best = Some((child_id, income));
                }
            }
            let Some((child_id, child_income)) = best else {
                continue;
            };

            let detail = SwapDetail {
                parent_id,
                parent_name: parent.name().to_string(),
                parent_income,
                child_id,
                child_name: store.get_node(child_id)?.name().to_string(),
                child_income,
            };
            store.swap_with_parent(child_id)?;
            moved.insert(parent_id);
            moved.insert(child_id);
            debug!(
                parent_id,
                child_id, parent_income, child_income, "Swapped parent and child"
            );
            details.push(detail);
        }
        Ok(details)
    }

    /// Turn each node's current tier into wallet credits.
    pub fn allocate_credits(
        store: &mut NodeStore,
        rewards: &RewardConfig,
    ) -> EngineResult<Vec<CreditAllocation>> {
        let mut deltas = Vec::new();
        let mut bases = Vec::new();
        let mut allocations = Vec::new();

        for id in store.ids() {
            let node = store.get_node(id)?;
            let turnover = node.combined_turnover();
            let tier = rewards.tier_credits(turnover);
            let (award, basis) =
                credits_to_award(rewards.policy, tier, node.tier_credits_granted());

            if basis != node.tier_credits_granted() {
                bases.push((id, basis));
            }
            if award == 0 {
                continue;
            }
            let wallet_after = node.credit_wallet().checked_add(award).ok_or_else(|| {
                EngineError::InvalidAmount(format!("credit wallet overflow on node {}", id))
            })?;
            deltas.push((id, FinancialDelta::credits(award)));
            allocations.push(CreditAllocation {
                node_id: id,
                name: node.name().to_string(),
                combined_turnover: turnover,
                tier_credits: tier,
                credits_awarded: award,
                wallet_after,
            });
        }

        store.apply_deltas(&deltas)?;
        for (id, basis) in bases {
            store.set_tier_credits_granted(id, basis)?;
        }
        Ok(allocations)
    }
}
