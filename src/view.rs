//! Read-only node views for listing and lookup

use serde::Serialize;
use utoipa::ToSchema;

use crate::core_types::{Amount, Credits, NodeId};
use crate::error::EngineResult;
use crate::node::{ParticipantNode, UserType};
use crate::store::NodeStore;

/// Display copy of one node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct NodeView {
    pub id: NodeId,
    pub name: String,
    pub email: String,
    pub user_type: UserType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub brand_name: Option<String>,
    /// Sponsor; receives direct income
    pub direct_parent_id: Option<NodeId>,
    pub structural_parent_id: Option<NodeId>,
    pub left_child_id: Option<NodeId>,
    pub right_child_id: Option<NodeId>,
    /// Structural parent before the node first moved
    pub logical_parent_id: Option<NodeId>,
    pub has_moved_position: bool,
    pub direct_referral_ids: Vec<NodeId>,
    pub franchise_a_turnover: Amount,
    pub franchise_b_turnover: Amount,
    pub direct_income: Amount,
    /// Absent for brand owners
    pub indirect_income: Option<Amount>,
    pub total_sales: Amount,
    pub credit_wallet: Credits,
}

impl From<&ParticipantNode> for NodeView {
    fn from(node: &ParticipantNode) -> Self {
        Self {
            id: node.id(),
            name: node.name().to_string(),
            email: node.email().to_string(),
            user_type: node.user_type(),
            brand_name: node.brand_name().map(str::to_string),
            direct_parent_id: node.direct_parent_id(),
            structural_parent_id: node.structural_parent_id(),
            left_child_id: node.left_child_id(),
            right_child_id: node.right_child_id(),
            logical_parent_id: node.logical_parent_id(),
            has_moved_position: node.has_moved_position(),
            direct_referral_ids: node.direct_referral_ids().to_vec(),
            franchise_a_turnover: node.franchise_a_turnover(),
            franchise_b_turnover: node.franchise_b_turnover(),
            direct_income: node.direct_income(),
            indirect_income: node.reported_indirect_income(),
            total_sales: node.total_sales(),
            credit_wallet: node.credit_wallet(),
        }
    }
}

/// Level-order listing; `levels[0]` holds the root
pub type TreeLevels = Vec<Vec<NodeView>>;

/// Breadth-first views of the subtree rooted at `root`.
pub fn subtree_levels(store: &NodeStore, root: NodeId) -> EngineResult<TreeLevels> {
    store
        .level_order(root)?
        .into_iter()
        .map(|level| {
            level
                .into_iter()
                .map(|id| store.get_node(id).map(NodeView::from))
                .collect()
        })
        .collect()
}

/// Whole tree from the founder; empty before the founder exists.
pub fn tree_levels(store: &NodeStore) -> EngineResult<TreeLevels> {
    match store.founder_id() {
        Some(founder) => subtree_levels(store, founder),
        None => Ok(Vec::new()),
    }
}
