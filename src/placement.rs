//! Placement Engine - attaches new participants to the binary tree
//!
//! # Algorithm
//!
//! ```text
//! sponsor has an open slot?  ──yes──▶ attach (left first)
//!          │
//!          no (3rd+ referral)
//!          ▼
//! BFS over the sponsor's own subtree, level by level, left to right
//!          ▼
//! first node with an open slot (left before right) receives the joiner
//! ```
//!
//! The sponsor stays the joiner's `direct_parent_id` either way, so direct
//! commission keeps flowing to whoever made the referral. The search never
//! leaves the sponsor's subtree and never relocates an existing node. It is
//! iterative, so tree depth does not grow the call stack.

use std::collections::VecDeque;

use tracing::debug;

use crate::core_types::NodeId;
use crate::error::{EngineError, EngineResult};
use crate::node::{NewParticipant, Side};
use crate::store::NodeStore;

/// Where a registration landed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placement {
    pub node_id: NodeId,
    pub sponsor_id: NodeId,
    pub structural_parent_id: NodeId,
    pub side: Side,
    /// Levels between the sponsor and the structural parent (0 = direct)
    pub depth_below_sponsor: usize,
}

impl Placement {
    /// True when the joiner did not land directly under its sponsor.
    pub fn is_spillover(&self) -> bool {
        self.structural_parent_id != self.sponsor_id
    }
}

pub struct PlacementEngine;

impl PlacementEngine {
    /// Locate the first open slot in `sponsor`'s subtree, breadth first.
    ///
    /// Returns `(parent, side, depth_below_sponsor)`.
    pub fn find_slot(store: &NodeStore, sponsor: NodeId) -> EngineResult<(NodeId, Side, usize)> {
        store.get_node(sponsor)?;

        let mut queue = VecDeque::from([(sponsor, 0usize)]);
        let mut visited = 0usize;

        while let Some((id, depth)) = queue.pop_front() {
            visited += 1;
            if visited > store.len() {
                return Err(EngineError::InvariantViolation(format!(
                    "placement search below {} revisited nodes",
                    sponsor
                )));
            }

            let node = store.get_node(id)?;
            match (node.left_child_id(), node.right_child_id()) {
                (None, _) => return Ok((id, Side::Left, depth)),
                (Some(_), None) => return Ok((id, Side::Right, depth)),
                (Some(left), Some(right)) => {
                    queue.push_back((left, depth + 1));
                    queue.push_back((right, depth + 1));
                }
            }
        }

        // A finite binary subtree always has an open slot
        Err(EngineError::InvariantViolation(format!(
            "no open slot below {}",
            sponsor
        )))
    }

    /// Create a node under `sponsor` and attach it. Nothing is left behind
    /// in the store if any step fails.
    pub fn register(
        store: &mut NodeStore,
        sponsor: NodeId,
        attrs: NewParticipant,
    ) -> EngineResult<Placement> {
        let (parent, side, depth) = Self::find_slot(store, sponsor)?;
        let node_id = store.create_node(Some(sponsor), attrs)?;

        if let Err(e) = store.set_child(parent, side, node_id) {
            store.discard_unplaced(node_id)?;
            return Err(e);
        }

        debug!(
            node_id,
            sponsor,
            parent,
            ?side,
            depth,
            "Placed new participant"
        );

        Ok(Placement {
            node_id,
            sponsor_id: sponsor,
            structural_parent_id: parent,
            side,
            depth_below_sponsor: depth,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::UserType;

    fn founder_store() -> (NodeStore, NodeId) {
        let mut store = NodeStore::new();
        let f = store
            .create_node(None, NewParticipant::founder("root", "root@x.io"))
            .unwrap();
        (store, f)
    }

    fn join(store: &mut NodeStore, sponsor: NodeId, name: &str) -> Placement {
        PlacementEngine::register(store, sponsor, NewParticipant::customer(name, "c@x.io"))
            .unwrap()
    }

    #[test]
    fn test_first_two_referrals_fill_sponsor_slots() {
        let (mut store, f) = founder_store();
        let a = join(&mut store, f, "a");
        let b = join(&mut store, f, "b");

        assert_eq!((a.structural_parent_id, a.side), (f, Side::Left));
        assert_eq!((b.structural_parent_id, b.side), (f, Side::Right));
        assert!(!a.is_spillover());
        assert_eq!(store.get_node(f).unwrap().left_child_id(), Some(a.node_id));
        assert_eq!(store.get_node(f).unwrap().right_child_id(), Some(b.node_id));
    }

    #[test]
    fn test_third_referral_spills_over_breadth_first() {
        let (mut store, f) = founder_store();
        let a = join(&mut store, f, "a");
        let b = join(&mut store, f, "b");
        let c = join(&mut store, f, "c");
        let d = join(&mut store, f, "d");
        let e = join(&mut store, f, "e");

        assert_eq!((c.structural_parent_id, c.side), (a.node_id, Side::Left));
        assert_eq!((d.structural_parent_id, d.side), (a.node_id, Side::Right));
        assert_eq!((e.structural_parent_id, e.side), (b.node_id, Side::Left));
        assert!(c.is_spillover());
        assert_eq!(c.depth_below_sponsor, 1);

        // sponsor stays the founder for every referral
        for p in [a, b, c, d, e] {
            assert_eq!(store.get_node(p.node_id).unwrap().direct_parent_id(), Some(f));
        }
        assert_eq!(store.get_node(f).unwrap().direct_referral_ids().len(), 5);
        store.verify_structure().unwrap();
    }

    #[test]
    fn test_search_stays_inside_sponsor_subtree() {
        let (mut store, f) = founder_store();
        let a = join(&mut store, f, "a");
        let _b = join(&mut store, f, "b");
        let a1 = join(&mut store, a.node_id, "a1");
        let a2 = join(&mut store, a.node_id, "a2");
        // f's right side is wide open, but a's third referral must stay below a
        let a3 = join(&mut store, a.node_id, "a3");

        assert_eq!(a3.structural_parent_id, a1.node_id);
        assert_ne!(a3.structural_parent_id, a2.node_id);
        let ancestors = store.structural_ancestors(a3.node_id).unwrap();
        assert!(ancestors.contains(&a.node_id));
    }

    #[test]
    fn test_unknown_sponsor() {
        let (mut store, _f) = founder_store();
        let err = PlacementEngine::register(
            &mut store,
            404,
            NewParticipant::customer("x", "x@x.io"),
        )
        .unwrap_err();
        assert_eq!(err, EngineError::NotFound(404));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_invalid_attrs_leave_store_untouched() {
        let (mut store, f) = founder_store();
        let mut attrs = NewParticipant::customer("x", "x@x.io");
        attrs.user_type = UserType::BrandOwner;
        assert!(PlacementEngine::register(&mut store, f, attrs).is_err());
        assert_eq!(store.len(), 1);
        assert!(store.get_node(f).unwrap().direct_referral_ids().is_empty());
    }

    #[test]
    fn test_deep_chain_does_not_recurse() {
        let (mut store, f) = founder_store();
        let mut sponsor = f;
        for i in 0..5_000 {
            sponsor = join(&mut store, sponsor, &format!("n{}", i)).node_id;
        }
        // 5_000 levels deep, placement below the bottom still works
        let p = join(&mut store, sponsor, "tail");
        assert_eq!(p.structural_parent_id, sponsor);
        assert_eq!(store.len(), 5_002);
    }
}
