//! Node Store - authoritative in-memory tree state
//!
//! Holds every participant node and its relationships. Pure data access,
//! no commission or placement policy. Every structural write is checked
//! against the tree invariants before anything changes:
//!
//! - at most one structural parent per node, no cycles
//! - exactly one founder, always the structural root
//! - a sponsor exists and was created before the nodes it sponsors
//!
//! # Thread Safety
//!
//! `NodeStore` is a plain single-threaded structure. Concurrency is handled
//! one level up by [`ReferralEngine`](crate::engine::ReferralEngine), which
//! owns the store behind a single-writer lock.

use rustc_hash::{FxHashMap, FxHashSet};

use crate::core_types::{Amount, Credits, NodeId};
use crate::error::{EngineError, EngineResult};
use crate::node::{
    FinancialCorrection, FinancialDelta, NewParticipant, ParticipantNode, Side, UserType,
};

/// Result of a parent/child position exchange
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwapOutcome {
    /// Node that moved up
    pub promoted: NodeId,
    /// Node that moved down
    pub demoted: NodeId,
    /// Structural parent the promoted node now hangs under
    pub new_parent: NodeId,
}

#[derive(Debug, Clone)]
pub struct NodeStore {
    nodes: FxHashMap<NodeId, ParticipantNode>,
    founder_id: Option<NodeId>,
    next_id: NodeId,
}

impl Default for NodeStore {
    fn default() -> Self {
        Self::new()
    }
}

impl NodeStore {
    pub fn new() -> Self {
        Self {
            nodes: FxHashMap::default(),
            founder_id: None,
            next_id: 1,
        }
    }

    // ============================================================
    // QUERY OPERATIONS (Read-Only)
    // ============================================================

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn founder_id(&self) -> Option<NodeId> {
        self.founder_id
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn get_node(&self, id: NodeId) -> EngineResult<&ParticipantNode> {
        self.nodes.get(&id).ok_or(EngineError::NotFound(id))
    }

    fn node_mut(&mut self, id: NodeId) -> EngineResult<&mut ParticipantNode> {
        self.nodes.get_mut(&id).ok_or(EngineError::NotFound(id))
    }

    /// All nodes, unordered.
    pub fn nodes(&self) -> impl Iterator<Item = &ParticipantNode> {
        self.nodes.values()
    }

    /// All node ids in creation order.
    pub fn ids(&self) -> Vec<NodeId> {
        let mut ids: Vec<NodeId> = self.nodes.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Structural ancestors of `id`, nearest first.
    pub fn structural_ancestors(&self, id: NodeId) -> EngineResult<Vec<NodeId>> {
        let mut ancestors = Vec::new();
        let mut current = self.get_node(id)?.structural_parent_id();
        while let Some(parent) = current {
            if ancestors.len() >= self.nodes.len() {
                return Err(EngineError::InvariantViolation(format!(
                    "cycle detected above node {}",
                    id
                )));
            }
            ancestors.push(parent);
            current = self.get_node(parent)?.structural_parent_id();
        }
        Ok(ancestors)
    }

    /// Breadth-first levels of the structural subtree rooted at `root`,
    /// left before right at each level.
    pub fn level_order(&self, root: NodeId) -> EngineResult<Vec<Vec<NodeId>>> {
        self.get_node(root)?;

        let mut levels = Vec::new();
        let mut seen = FxHashSet::default();
        let mut current = vec![root];
        seen.insert(root);

        while !current.is_empty() {
            let mut next = Vec::new();
            for &id in &current {
                for child in self.get_node(id)?.children() {
                    if !seen.insert(child) {
                        return Err(EngineError::InvariantViolation(format!(
                            "node {} reached twice below {}",
                            child, root
                        )));
                    }
                    next.push(child);
                }
            }
            levels.push(current);
            current = next;
        }
        Ok(levels)
    }

    /// Full structural audit: single founder root, consistent parent/child
    /// pointers, every node reachable from the founder exactly once.
    pub fn verify_structure(&self) -> EngineResult<()> {
        if self.nodes.is_empty() {
            return Ok(());
        }
        let founder = self.founder_id.ok_or_else(|| {
            EngineError::InvariantViolation("tree has nodes but no founder".into())
        })?;
        if self.get_node(founder)?.structural_parent_id().is_some() {
            return Err(EngineError::InvariantViolation(
                "founder has a structural parent".into(),
            ));
        }

        for node in self.nodes.values() {
            for child in node.children() {
                let c = self.nodes.get(&child).ok_or_else(|| {
                    EngineError::InvariantViolation(format!(
                        "node {} points at missing child {}",
                        node.id(),
                        child
                    ))
                })?;
                if c.structural_parent_id() != Some(node.id()) {
                    return Err(EngineError::InvariantViolation(format!(
                        "child {} does not point back at parent {}",
                        child,
                        node.id()
                    )));
                }
            }
            if let Some(parent) = node.structural_parent_id() {
                let p = self.nodes.get(&parent).ok_or_else(|| {
                    EngineError::InvariantViolation(format!(
                        "node {} points at missing parent {}",
                        node.id(),
                        parent
                    ))
                })?;
                if p.side_of(node.id()).is_none() {
                    return Err(EngineError::InvariantViolation(format!(
                        "parent {} does not hold child {}",
                        parent,
                        node.id()
                    )));
                }
            }
        }

        let reached: usize = self.level_order(founder)?.iter().map(Vec::len).sum();
        if reached != self.nodes.len() {
            return Err(EngineError::InvariantViolation(format!(
                "{} of {} nodes reachable from founder",
                reached,
                self.nodes.len()
            )));
        }
        Ok(())
    }

    // ============================================================
    // STRUCTURAL WRITES
    // ============================================================

    /// Create a node. With `sponsor == None` this creates the founder; the
    /// node is otherwise created unattached and must be placed with
    /// [`Self::set_child`].
    pub fn create_node(
        &mut self,
        sponsor: Option<NodeId>,
        attrs: NewParticipant,
    ) -> EngineResult<NodeId> {
        attrs.validate()?;

        match (sponsor, attrs.user_type) {
            (None, UserType::Founder) => {
                if self.founder_id.is_some() {
                    return Err(EngineError::InvalidParticipant(
                        "a founder already exists".into(),
                    ));
                }
            }
            (None, _) => {
                return Err(EngineError::InvalidParticipant(
                    "only the founder may be created without a sponsor".into(),
                ));
            }
            (Some(_), UserType::Founder) => {
                return Err(EngineError::InvalidParticipant(
                    "the founder cannot have a sponsor".into(),
                ));
            }
            (Some(sponsor_id), _) => {
                self.get_node(sponsor_id)?;
            }
        }

        let id = self.next_id;
        let user_type = attrs.user_type;
        self.nodes
            .insert(id, ParticipantNode::new(id, sponsor, attrs));
        self.next_id += 1;

        if let Some(sponsor_id) = sponsor {
            self.node_mut(sponsor_id)?.push_referral(id);
        }
        if user_type == UserType::Founder {
            self.founder_id = Some(id);
        }
        Ok(id)
    }

    /// Remove a node that was created but never attached. Used to roll back
    /// a registration whose placement failed.
    pub(crate) fn discard_unplaced(&mut self, id: NodeId) -> EngineResult<()> {
        let node = self.get_node(id)?;
        if node.structural_parent_id().is_some()
            || node.children().next().is_some()
            || node.user_type() == UserType::Founder
            || id + 1 != self.next_id
        {
            return Err(EngineError::InvariantViolation(format!(
                "node {} is not a discardable fresh node",
                id
            )));
        }
        let sponsor = node.direct_parent_id();
        self.nodes.remove(&id);
        self.next_id = id;
        if let Some(sponsor_id) = sponsor {
            self.node_mut(sponsor_id)?.pop_referral(id);
        }
        Ok(())
    }

    /// Attach `child` into `parent`'s empty `side` slot.
    pub fn set_child(&mut self, parent: NodeId, side: Side, child: NodeId) -> EngineResult<()> {
        if parent == child {
            return Err(EngineError::InvariantViolation(format!(
                "node {} cannot be its own child",
                parent
            )));
        }
        let p = self.get_node(parent)?;
        let c = self.get_node(child)?;

        if c.user_type() == UserType::Founder {
            return Err(EngineError::InvariantViolation(
                "the founder cannot be placed under another node".into(),
            ));
        }
        if let Some(existing) = c.structural_parent_id() {
            return Err(EngineError::InvariantViolation(format!(
                "node {} already has structural parent {}",
                child, existing
            )));
        }
        if let Some(occupant) = p.child(side) {
            return Err(EngineError::InvariantViolation(format!(
                "{:?} slot of node {} already holds {}",
                side, parent, occupant
            )));
        }
        if self.structural_ancestors(parent)?.contains(&child) {
            return Err(EngineError::InvariantViolation(format!(
                "attaching {} under {} would create a cycle",
                child, parent
            )));
        }

        self.node_mut(parent)?.set_child_slot(side, Some(child));
        self.node_mut(child)?.set_structural_parent(Some(parent));
        Ok(())
    }

    /// Exchange `child` with its structural parent. The promoted node takes
    /// the parent's slot and sibling, the demoted node takes the promoted
    /// node's former children. Only customer pairs may swap; sponsors are
    /// never touched.
    pub fn swap_with_parent(&mut self, child: NodeId) -> EngineResult<SwapOutcome> {
        let c = self.get_node(child)?;
        let parent = c.structural_parent_id().ok_or_else(|| {
            EngineError::InvariantViolation(format!("node {} has no structural parent", child))
        })?;
        let p = self.get_node(parent)?;
        if c.user_type().is_static() || p.user_type().is_static() {
            return Err(EngineError::InvariantViolation(format!(
                "swap {} <-> {} involves a static node",
                child, parent
            )));
        }
        let grandparent = p.structural_parent_id().ok_or_else(|| {
            EngineError::InvariantViolation(format!("customer {} has no structural parent", parent))
        })?;
        let child_side = p.side_of(child).ok_or_else(|| {
            EngineError::InvariantViolation(format!(
                "parent {} does not hold child {}",
                parent, child
            ))
        })?;
        let parent_side = self.get_node(grandparent)?.side_of(parent).ok_or_else(|| {
            EngineError::InvariantViolation(format!(
                "grandparent {} does not hold parent {}",
                grandparent, parent
            ))
        })?;
        let sibling = p.child(child_side.other());
        let (child_left, child_right) = (c.left_child_id(), c.right_child_id());

        self.node_mut(grandparent)?
            .set_child_slot(parent_side, Some(child));

        let promoted = self.node_mut(child)?;
        promoted.set_structural_parent(Some(grandparent));
        promoted.set_child_slot(child_side, Some(parent));
        promoted.set_child_slot(child_side.other(), sibling);
        promoted.mark_moved(Some(parent));

        let demoted = self.node_mut(parent)?;
        demoted.set_structural_parent(Some(child));
        demoted.set_child_slot(Side::Left, child_left);
        demoted.set_child_slot(Side::Right, child_right);
        demoted.mark_moved(Some(grandparent));

        if let Some(s) = sibling {
            self.node_mut(s)?.set_structural_parent(Some(child));
        }
        for grandchild in [child_left, child_right].into_iter().flatten() {
            self.node_mut(grandchild)?.set_structural_parent(Some(parent));
        }

        Ok(SwapOutcome {
            promoted: child,
            demoted: parent,
            new_parent: grandparent,
        })
    }

    // ============================================================
    // FINANCIAL WRITES
    // ============================================================

    pub fn update_financials(&mut self, id: NodeId, delta: FinancialDelta) -> EngineResult<()> {
        self.apply_deltas(&[(id, delta)])
    }

    /// Apply a batch of deltas as one unit: either every delta lands or
    /// none does.
    pub fn apply_deltas(&mut self, deltas: &[(NodeId, FinancialDelta)]) -> EngineResult<()> {
        let mut merged: FxHashMap<NodeId, FinancialDelta> = FxHashMap::default();
        for (id, delta) in deltas {
            let node = self.get_node(*id)?;
            if node.user_type() == UserType::BrandOwner && delta.indirect_income > 0 {
                return Err(EngineError::InvariantViolation(format!(
                    "brand owner {} cannot receive indirect income",
                    id
                )));
            }
            let entry = merged.entry(*id).or_default();
            *entry = entry.checked_merge(delta).ok_or_else(|| {
                EngineError::InvalidAmount(format!("delta overflow on node {}", id))
            })?;
        }

        for (id, delta) in &merged {
            self.get_node(*id)?.check_delta(delta)?;
        }
        for (id, delta) in &merged {
            self.node_mut(*id)?.apply_delta(delta)?;
        }
        Ok(())
    }

    pub fn apply_correction(
        &mut self,
        id: NodeId,
        correction: &FinancialCorrection,
    ) -> EngineResult<()> {
        self.node_mut(id)?.apply_correction(correction)
    }

    pub(crate) fn set_turnover(
        &mut self,
        id: NodeId,
        franchise_a: Amount,
        franchise_b: Amount,
    ) -> EngineResult<()> {
        self.node_mut(id)?.set_turnover(franchise_a, franchise_b);
        Ok(())
    }

    pub(crate) fn set_tier_credits_granted(
        &mut self,
        id: NodeId,
        credits: Credits,
    ) -> EngineResult<()> {
        self.node_mut(id)?.set_tier_credits_granted(credits);
        Ok(())
    }

    /// Bypasses every check. Only for corrupting a tree in tests.
    #[cfg(test)]
    pub(crate) fn force_child(&mut self, parent: NodeId, side: Side, child: NodeId) {
        if let Some(p) = self.nodes.get_mut(&parent) {
            p.set_child_slot(side, Some(child));
        }
        if let Some(c) = self.nodes.get_mut(&child) {
            c.set_structural_parent(Some(parent));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with_founder() -> (NodeStore, NodeId) {
        let mut store = NodeStore::new();
        let f = store
            .create_node(None, NewParticipant::founder("root", "root@x.io"))
            .unwrap();
        (store, f)
    }

    fn customer(store: &mut NodeStore, sponsor: NodeId, name: &str) -> NodeId {
        store
            .create_node(Some(sponsor), NewParticipant::customer(name, "c@x.io"))
            .unwrap()
    }

    #[test]
    fn test_create_node_assigns_sequential_ids() {
        let (mut store, f) = store_with_founder();
        assert_eq!(f, 1);
        let a = customer(&mut store, f, "a");
        let b = customer(&mut store, a, "b");
        assert_eq!((a, b), (2, 3));
        assert_eq!(store.get_node(b).unwrap().direct_parent_id(), Some(a));
        assert_eq!(store.get_node(f).unwrap().direct_referral_ids(), &[a]);
        assert_eq!(store.founder_id(), Some(f));
    }

    #[test]
    fn test_create_node_rejects_bad_roles() {
        let (mut store, f) = store_with_founder();
        assert!(matches!(
            store.create_node(None, NewParticipant::founder("again", "x@x.io")),
            Err(EngineError::InvalidParticipant(_))
        ));
        assert!(matches!(
            store.create_node(Some(f), NewParticipant::founder("child", "x@x.io")),
            Err(EngineError::InvalidParticipant(_))
        ));
        assert!(matches!(
            store.create_node(None, NewParticipant::customer("orphan", "x@x.io")),
            Err(EngineError::InvalidParticipant(_))
        ));
        assert_eq!(
            store.create_node(Some(99), NewParticipant::customer("lost", "x@x.io")),
            Err(EngineError::NotFound(99))
        );
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_set_child_rejects_second_parent_and_occupied_slot() {
        let (mut store, f) = store_with_founder();
        let a = customer(&mut store, f, "a");
        let b = customer(&mut store, f, "b");
        store.set_child(f, Side::Left, a).unwrap();

        assert!(matches!(
            store.set_child(f, Side::Left, b),
            Err(EngineError::InvariantViolation(_))
        ));
        store.set_child(f, Side::Right, b).unwrap();
        assert!(matches!(
            store.set_child(a, Side::Left, b),
            Err(EngineError::InvariantViolation(_))
        ));
        assert!(matches!(
            store.set_child(a, Side::Left, f),
            Err(EngineError::InvariantViolation(_))
        ));
        assert_eq!(store.set_child(a, Side::Left, 42), Err(EngineError::NotFound(42)));
        store.verify_structure().unwrap();
    }

    #[test]
    fn test_set_child_rejects_cycle() {
        let (mut store, f) = store_with_founder();
        let a = customer(&mut store, f, "a");
        let b = customer(&mut store, f, "b");
        // b is detached with a as its child; hanging b under a would loop
        store.set_child(b, Side::Left, a).unwrap();
        assert!(matches!(
            store.set_child(a, Side::Left, b),
            Err(EngineError::InvariantViolation(_))
        ));
    }

    #[test]
    fn test_swap_with_parent_exchanges_positions() {
        // f
        // └─L p
        //     ├─L c
        //     │   ├─L cl
        //     │   └─R cr
        //     └─R s
        let (mut store, f) = store_with_founder();
        let p = customer(&mut store, f, "p");
        let c = customer(&mut store, p, "c");
        let s = customer(&mut store, p, "s");
        let cl = customer(&mut store, c, "cl");
        let cr = customer(&mut store, c, "cr");
        store.set_child(f, Side::Left, p).unwrap();
        store.set_child(p, Side::Left, c).unwrap();
        store.set_child(p, Side::Right, s).unwrap();
        store.set_child(c, Side::Left, cl).unwrap();
        store.set_child(c, Side::Right, cr).unwrap();

        let outcome = store.swap_with_parent(c).unwrap();
        assert_eq!(outcome.promoted, c);
        assert_eq!(outcome.demoted, p);

        let fnode = store.get_node(f).unwrap();
        assert_eq!(fnode.left_child_id(), Some(c));
        let cnode = store.get_node(c).unwrap();
        assert_eq!(cnode.structural_parent_id(), Some(f));
        assert_eq!(cnode.left_child_id(), Some(p));
        assert_eq!(cnode.right_child_id(), Some(s));
        assert_eq!(cnode.logical_parent_id(), Some(p));
        assert!(cnode.has_moved_position());
        let pnode = store.get_node(p).unwrap();
        assert_eq!(pnode.structural_parent_id(), Some(c));
        assert_eq!(pnode.left_child_id(), Some(cl));
        assert_eq!(pnode.right_child_id(), Some(cr));
        assert_eq!(pnode.logical_parent_id(), Some(f));
        assert_eq!(store.get_node(cl).unwrap().structural_parent_id(), Some(p));
        assert_eq!(store.get_node(s).unwrap().structural_parent_id(), Some(c));

        // sponsors untouched
        assert_eq!(cnode.direct_parent_id(), Some(p));
        assert_eq!(store.get_node(cl).unwrap().direct_parent_id(), Some(c));
        store.verify_structure().unwrap();
    }

    #[test]
    fn test_swap_rejects_static_nodes() {
        let (mut store, f) = store_with_founder();
        let b = store
            .create_node(Some(f), NewParticipant::brand_owner("b", "b@x.io", "Acme"))
            .unwrap();
        let c = customer(&mut store, b, "c");
        store.set_child(f, Side::Left, b).unwrap();
        store.set_child(b, Side::Left, c).unwrap();

        assert!(matches!(
            store.swap_with_parent(b),
            Err(EngineError::InvariantViolation(_))
        ));
        assert!(matches!(
            store.swap_with_parent(c),
            Err(EngineError::InvariantViolation(_))
        ));
    }

    #[test]
    fn test_apply_deltas_is_all_or_nothing() {
        let (mut store, f) = store_with_founder();
        let a = customer(&mut store, f, "a");
        store.set_child(f, Side::Left, a).unwrap();

        let result = store.apply_deltas(&[
            (f, FinancialDelta::direct(100)),
            (a, FinancialDelta::sale(1000)),
            (77, FinancialDelta::indirect(5)),
        ]);
        assert_eq!(result, Err(EngineError::NotFound(77)));
        assert_eq!(store.get_node(f).unwrap().direct_income(), 0);
        assert_eq!(store.get_node(a).unwrap().total_sales(), 0);

        store
            .apply_deltas(&[
                (f, FinancialDelta::direct(100)),
                (f, FinancialDelta::indirect(5)),
                (a, FinancialDelta::sale(1000)),
            ])
            .unwrap();
        assert_eq!(store.get_node(f).unwrap().direct_income(), 100);
        assert_eq!(store.get_node(f).unwrap().indirect_income(), 5);
        assert_eq!(store.get_node(a).unwrap().total_sales(), 1000);
    }

    #[test]
    fn test_apply_deltas_rejects_brand_owner_indirect() {
        let (mut store, f) = store_with_founder();
        let b = store
            .create_node(Some(f), NewParticipant::brand_owner("b", "b@x.io", "Acme"))
            .unwrap();
        assert!(matches!(
            store.update_financials(b, FinancialDelta::indirect(1)),
            Err(EngineError::InvariantViolation(_))
        ));
    }

    #[test]
    fn test_discard_unplaced_rolls_back_creation() {
        let (mut store, f) = store_with_founder();
        let a = customer(&mut store, f, "a");
        store.discard_unplaced(a).unwrap();
        assert!(!store.contains(a));
        assert!(store.get_node(f).unwrap().direct_referral_ids().is_empty());
        // id is reused
        assert_eq!(customer(&mut store, f, "a2"), a);
    }

    #[test]
    fn test_verify_structure_detects_cycle() {
        let (mut store, f) = store_with_founder();
        let a = customer(&mut store, f, "a");
        let b = customer(&mut store, a, "b");
        store.set_child(f, Side::Left, a).unwrap();
        store.set_child(a, Side::Left, b).unwrap();
        store.verify_structure().unwrap();

        store.force_child(b, Side::Left, a);
        assert!(matches!(
            store.verify_structure(),
            Err(EngineError::InvariantViolation(_))
        ));
        assert!(store.structural_ancestors(b).is_err());
    }

    #[test]
    fn test_level_order() {
        let (mut store, f) = store_with_founder();
        let a = customer(&mut store, f, "a");
        let b = customer(&mut store, f, "b");
        let c = customer(&mut store, f, "c");
        store.set_child(f, Side::Right, b).unwrap();
        store.set_child(f, Side::Left, a).unwrap();
        store.set_child(b, Side::Right, c).unwrap();
        assert_eq!(
            store.level_order(f).unwrap(),
            vec![vec![f], vec![a, b], vec![c]]
        );
        assert_eq!(store.structural_ancestors(c).unwrap(), vec![b, f]);
    }
}
