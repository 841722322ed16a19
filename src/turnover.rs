//! Turnover Aggregator - Franchise A/B rollup
//!
//! For every node:
//! - `franchise_a_turnover` = total sales of the whole left subtree
//! - `franchise_b_turnover` = total sales of the whole right subtree
//!
//! Computed bottom-up by walking the founder's level order in reverse, so
//! every child is finished before its parent. A full recomputation, not an
//! increment: running it twice without new sales yields identical values.

use rustc_hash::FxHashMap;
use tracing::debug;

use crate::core_types::{Amount, NodeId};
use crate::error::{EngineError, EngineResult};
use crate::store::NodeStore;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TurnoverSummary {
    /// Founder's Franchise A + B
    pub platform_turnover: Amount,
    /// Sum of every node's own sales, founder included
    pub total_sales: Amount,
    pub nodes_updated: usize,
}

pub struct TurnoverAggregator;

impl TurnoverAggregator {
    /// Recompute Franchise A/B for the whole tree and write the results
    /// back. Values are computed completely before any write.
    pub fn recompute(store: &mut NodeStore) -> EngineResult<TurnoverSummary> {
        let Some(founder) = store.founder_id() else {
            return Ok(TurnoverSummary::default());
        };

        let levels = store.level_order(founder)?;
        // id -> (own + descendants' sales, franchise A, franchise B)
        let mut totals: FxHashMap<NodeId, (Amount, Amount, Amount)> = FxHashMap::default();

        for level in levels.iter().rev() {
            for &id in level {
                let node = store.get_node(id)?;
                let subtree = |child: Option<NodeId>| -> EngineResult<Amount> {
                    match child {
                        None => Ok(0),
                        Some(c) => totals.get(&c).map(|t| t.0).ok_or_else(|| {
                            EngineError::InvariantViolation(format!(
                                "child {} of {} not aggregated",
                                c, id
                            ))
                        }),
                    }
                };
                let a = subtree(node.left_child_id())?;
                let b = subtree(node.right_child_id())?;
                let total = node
                    .total_sales()
                    .checked_add(a)
                    .and_then(|t| t.checked_add(b))
                    .ok_or_else(|| {
                        EngineError::InvalidAmount(format!("turnover overflow at node {}", id))
                    })?;
                totals.insert(id, (total, a, b));
            }
        }

        let mut summary = TurnoverSummary {
            nodes_updated: totals.len(),
            ..Default::default()
        };
        if let Some(&(all, a, b)) = totals.get(&founder) {
            summary.platform_turnover = a + b;
            summary.total_sales = all;
        }

        for (id, (_, a, b)) in totals {
            store.set_turnover(id, a, b)?;
        }

        debug!(
            platform_turnover = summary.platform_turnover,
            nodes = summary.nodes_updated,
            "Turnover recomputed"
        );
        Ok(summary)
    }
}
