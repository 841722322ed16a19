//! Participant node - the unit of the referral tree
//!
//! A node carries two independent parent relationships:
//! - `direct_parent_id`: the sponsor who referred it (commission routing)
//! - `structural_parent_id`: the binary-tree parent (turnover rollup,
//!   indirect commission, restructuring)
//!
//! The two are never conflated. Fields are private; structural pointers can
//! only be rewired by the [`NodeStore`](crate::store::NodeStore), financial
//! figures only through validated deltas.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::core_types::{Amount, Credits, NodeId};
use crate::error::{EngineError, EngineResult};

/// Participant role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum UserType {
    /// Tree root, exactly one per tree
    Founder,
    Customer,
    /// Earns direct income only, never relocated
    BrandOwner,
}

impl UserType {
    /// Founders and brand owners are never moved by restructuring.
    #[inline]
    pub fn is_static(self) -> bool {
        !matches!(self, UserType::Customer)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            UserType::Founder => "founder",
            UserType::Customer => "customer",
            UserType::BrandOwner => "brand_owner",
        }
    }
}

impl std::fmt::Display for UserType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structural child slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Left,
    Right,
}

impl Side {
    #[inline]
    pub fn other(self) -> Side {
        match self {
            Side::Left => Side::Right,
            Side::Right => Side::Left,
        }
    }
}

/// Registration attributes for a new participant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct NewParticipant {
    pub name: String,
    pub email: String,
    pub user_type: UserType,
    #[serde(default)]
    pub brand_name: Option<String>,
}

impl NewParticipant {
    pub fn customer(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
            user_type: UserType::Customer,
            brand_name: None,
        }
    }

    pub fn brand_owner(
        name: impl Into<String>,
        email: impl Into<String>,
        brand_name: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
            user_type: UserType::BrandOwner,
            brand_name: Some(brand_name.into()),
        }
    }

    pub fn founder(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
            user_type: UserType::Founder,
            brand_name: None,
        }
    }

    /// Attribute-level checks (no tree lookups).
    pub fn validate(&self) -> EngineResult<()> {
        if self.name.trim().is_empty() {
            return Err(EngineError::InvalidParticipant("name is empty".into()));
        }
        if self.email.trim().is_empty() {
            return Err(EngineError::InvalidParticipant("email is empty".into()));
        }
        match (self.user_type, &self.brand_name) {
            (UserType::BrandOwner, None) => Err(EngineError::InvalidParticipant(
                "brand owner requires a brand name".into(),
            )),
            (UserType::BrandOwner, Some(b)) if b.trim().is_empty() => Err(
                EngineError::InvalidParticipant("brand owner requires a brand name".into()),
            ),
            (UserType::Founder | UserType::Customer, Some(_)) => Err(
                EngineError::InvalidParticipant("brand name is only valid for brand owners".into()),
            ),
            _ => Ok(()),
        }
    }
}

/// Non-negative increments applied to a node's financial figures.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FinancialDelta {
    pub direct_income: Amount,
    pub indirect_income: Amount,
    pub total_sales: Amount,
    pub credits: Credits,
}

impl FinancialDelta {
    pub fn direct(amount: Amount) -> Self {
        Self {
            direct_income: amount,
            ..Default::default()
        }
    }

    pub fn indirect(amount: Amount) -> Self {
        Self {
            indirect_income: amount,
            ..Default::default()
        }
    }

    pub fn sale(amount: Amount) -> Self {
        Self {
            total_sales: amount,
            ..Default::default()
        }
    }

    pub fn credits(credits: Credits) -> Self {
        Self {
            credits,
            ..Default::default()
        }
    }

    pub fn is_zero(&self) -> bool {
        *self == Self::default()
    }

    /// Field-wise checked sum, used to merge deltas aimed at the same node.
    pub fn checked_merge(&self, other: &FinancialDelta) -> Option<FinancialDelta> {
        Some(FinancialDelta {
            direct_income: self.direct_income.checked_add(other.direct_income)?,
            indirect_income: self.indirect_income.checked_add(other.indirect_income)?,
            total_sales: self.total_sales.checked_add(other.total_sales)?,
            credits: self.credits.checked_add(other.credits)?,
        })
    }
}

/// Signed adjustment of monetary figures. This is the only way a figure
/// may decrease.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct FinancialCorrection {
    #[serde(default)]
    pub direct_income: i64,
    #[serde(default)]
    pub indirect_income: i64,
    #[serde(default)]
    pub total_sales: i64,
}

impl FinancialCorrection {
    pub fn is_zero(&self) -> bool {
        *self == Self::default()
    }
}

fn apply_signed(current: Amount, delta: i64, field: &str) -> EngineResult<Amount> {
    let next = if delta >= 0 {
        current.checked_add(delta as u64)
    } else {
        current.checked_sub(delta.unsigned_abs())
    };
    next.ok_or_else(|| {
        EngineError::InvalidAmount(format!(
            "correction of {} on {} ({}) is out of range",
            delta, field, current
        ))
    })
}

/// Participant node
///
/// # Invariants (enforced by private fields):
/// - `id`, `user_type`, `direct_parent_id` are immutable after creation
/// - structural pointers change only through the store
/// - financial figures only grow, except through [`FinancialCorrection`]
/// - `credit_wallet` only grows
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipantNode {
    id: NodeId,
    name: String,
    email: String,
    brand_name: Option<String>,
    user_type: UserType,
    direct_parent_id: Option<NodeId>,
    structural_parent_id: Option<NodeId>,
    left_child_id: Option<NodeId>,
    right_child_id: Option<NodeId>,
    logical_parent_id: Option<NodeId>,
    has_moved_position: bool,
    direct_referral_ids: Vec<NodeId>,
    franchise_a_turnover: Amount,
    franchise_b_turnover: Amount,
    direct_income: Amount,
    indirect_income: Amount,
    total_sales: Amount,
    credit_wallet: Credits,
    /// Tier credits granted so far, basis for delta-mode allocation
    tier_credits_granted: Credits,
}

impl ParticipantNode {
    pub(crate) fn new(id: NodeId, sponsor: Option<NodeId>, attrs: NewParticipant) -> Self {
        Self {
            id,
            name: attrs.name,
            email: attrs.email,
            brand_name: attrs.brand_name,
            user_type: attrs.user_type,
            direct_parent_id: sponsor,
            structural_parent_id: None,
            left_child_id: None,
            right_child_id: None,
            logical_parent_id: None,
            has_moved_position: false,
            direct_referral_ids: Vec::new(),
            franchise_a_turnover: 0,
            franchise_b_turnover: 0,
            direct_income: 0,
            indirect_income: 0,
            total_sales: 0,
            credit_wallet: 0,
            tier_credits_granted: 0,
        }
    }

    // ============================================================
    // READ-ONLY GETTERS
    // ============================================================

    #[inline]
    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn brand_name(&self) -> Option<&str> {
        self.brand_name.as_deref()
    }

    #[inline]
    pub fn user_type(&self) -> UserType {
        self.user_type
    }

    /// Sponsor. `None` only for the founder.
    #[inline]
    pub fn direct_parent_id(&self) -> Option<NodeId> {
        self.direct_parent_id
    }

    #[inline]
    pub fn structural_parent_id(&self) -> Option<NodeId> {
        self.structural_parent_id
    }

    #[inline]
    pub fn left_child_id(&self) -> Option<NodeId> {
        self.left_child_id
    }

    #[inline]
    pub fn right_child_id(&self) -> Option<NodeId> {
        self.right_child_id
    }

    #[inline]
    pub fn child(&self, side: Side) -> Option<NodeId> {
        match side {
            Side::Left => self.left_child_id,
            Side::Right => self.right_child_id,
        }
    }

    /// Structural children, left first.
    pub fn children(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.left_child_id.into_iter().chain(self.right_child_id)
    }

    /// Which slot `child` occupies under this node, if any.
    pub fn side_of(&self, child: NodeId) -> Option<Side> {
        if self.left_child_id == Some(child) {
            Some(Side::Left)
        } else if self.right_child_id == Some(child) {
            Some(Side::Right)
        } else {
            None
        }
    }

    pub fn logical_parent_id(&self) -> Option<NodeId> {
        self.logical_parent_id
    }

    pub fn has_moved_position(&self) -> bool {
        self.has_moved_position
    }

    pub fn direct_referral_ids(&self) -> &[NodeId] {
        &self.direct_referral_ids
    }

    pub fn franchise_a_turnover(&self) -> Amount {
        self.franchise_a_turnover
    }

    pub fn franchise_b_turnover(&self) -> Amount {
        self.franchise_b_turnover
    }

    /// Franchise A + B. Saturates instead of wrapping.
    pub fn combined_turnover(&self) -> Amount {
        self.franchise_a_turnover
            .saturating_add(self.franchise_b_turnover)
    }

    pub fn direct_income(&self) -> Amount {
        self.direct_income
    }

    /// Raw stored value. Brand owners never accrue indirect income; use
    /// [`Self::reported_indirect_income`] for display.
    pub fn indirect_income(&self) -> Amount {
        self.indirect_income
    }

    /// `None` (not applicable) for brand owners.
    pub fn reported_indirect_income(&self) -> Option<Amount> {
        match self.user_type {
            UserType::BrandOwner => None,
            _ => Some(self.indirect_income),
        }
    }

    /// Income used to rank parent/child pairs during restructuring.
    pub fn ranking_income(&self) -> Amount {
        let indirect = self.reported_indirect_income().unwrap_or(0);
        self.direct_income.saturating_add(indirect)
    }

    pub fn total_sales(&self) -> Amount {
        self.total_sales
    }

    pub fn credit_wallet(&self) -> Credits {
        self.credit_wallet
    }

    pub fn tier_credits_granted(&self) -> Credits {
        self.tier_credits_granted
    }

    // ============================================================
    // CRATE-INTERNAL MUTATIONS (store only)
    // ============================================================

    pub(crate) fn set_child_slot(&mut self, side: Side, child: Option<NodeId>) {
        match side {
            Side::Left => self.left_child_id = child,
            Side::Right => self.right_child_id = child,
        }
    }

    pub(crate) fn set_structural_parent(&mut self, parent: Option<NodeId>) {
        self.structural_parent_id = parent;
    }

    /// Records the first displacement only: the logical parent stays the
    /// structural parent the node had before it was ever moved.
    pub(crate) fn mark_moved(&mut self, previous_parent: Option<NodeId>) {
        if !self.has_moved_position {
            self.logical_parent_id = previous_parent;
            self.has_moved_position = true;
        }
    }

    pub(crate) fn push_referral(&mut self, id: NodeId) {
        self.direct_referral_ids.push(id);
    }

    pub(crate) fn pop_referral(&mut self, id: NodeId) {
        if self.direct_referral_ids.last() == Some(&id) {
            self.direct_referral_ids.pop();
        }
    }

    pub(crate) fn set_turnover(&mut self, franchise_a: Amount, franchise_b: Amount) {
        self.franchise_a_turnover = franchise_a;
        self.franchise_b_turnover = franchise_b;
    }

    pub(crate) fn set_tier_credits_granted(&mut self, credits: Credits) {
        self.tier_credits_granted = credits;
    }

    /// Dry-run of [`Self::apply_delta`].
    pub(crate) fn check_delta(&self, delta: &FinancialDelta) -> EngineResult<()> {
        let mut trial = self.clone();
        trial.apply_delta(delta)
    }

    pub(crate) fn apply_delta(&mut self, delta: &FinancialDelta) -> EngineResult<()> {
        let overflow = |field: &str| {
            EngineError::InvalidAmount(format!("{} overflow on node {}", field, self.id))
        };
        let direct_income = self
            .direct_income
            .checked_add(delta.direct_income)
            .ok_or_else(|| overflow("direct_income"))?;
        let indirect_income = self
            .indirect_income
            .checked_add(delta.indirect_income)
            .ok_or_else(|| overflow("indirect_income"))?;
        let total_sales = self
            .total_sales
            .checked_add(delta.total_sales)
            .ok_or_else(|| overflow("total_sales"))?;
        let credit_wallet = self
            .credit_wallet
            .checked_add(delta.credits)
            .ok_or_else(|| overflow("credit_wallet"))?;

        self.direct_income = direct_income;
        self.indirect_income = indirect_income;
        self.total_sales = total_sales;
        self.credit_wallet = credit_wallet;
        Ok(())
    }

    pub(crate) fn apply_correction(&mut self, c: &FinancialCorrection) -> EngineResult<()> {
        let direct_income = apply_signed(self.direct_income, c.direct_income, "direct_income")?;
        let indirect_income =
            apply_signed(self.indirect_income, c.indirect_income, "indirect_income")?;
        let total_sales = apply_signed(self.total_sales, c.total_sales, "total_sales")?;
        if self.user_type == UserType::BrandOwner && indirect_income != 0 {
            return Err(EngineError::InvalidAmount(
                "brand owners cannot hold indirect income".into(),
            ));
        }

        self.direct_income = direct_income;
        self.indirect_income = indirect_income;
        self.total_sales = total_sales;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(user_type: UserType) -> ParticipantNode {
        let attrs = match user_type {
            UserType::BrandOwner => NewParticipant::brand_owner("b", "b@x.io", "Acme"),
            UserType::Founder => NewParticipant::founder("f", "f@x.io"),
            UserType::Customer => NewParticipant::customer("c", "c@x.io"),
        };
        ParticipantNode::new(2, Some(1), attrs)
    }

    #[test]
    fn test_validate_attrs() {
        assert!(NewParticipant::customer("alice", "a@x.io").validate().is_ok());
        assert!(NewParticipant::customer(" ", "a@x.io").validate().is_err());
        assert!(NewParticipant::customer("alice", "").validate().is_err());

        let mut brand = NewParticipant::brand_owner("bob", "b@x.io", "Acme");
        assert!(brand.validate().is_ok());
        brand.brand_name = None;
        assert!(brand.validate().is_err());

        let mut customer = NewParticipant::customer("carol", "c@x.io");
        customer.brand_name = Some("Nope".into());
        assert!(customer.validate().is_err());
    }

    #[test]
    fn test_apply_delta() {
        let mut n = node(UserType::Customer);
        n.apply_delta(&FinancialDelta::direct(100)).unwrap();
        n.apply_delta(&FinancialDelta::indirect(50)).unwrap();
        n.apply_delta(&FinancialDelta::sale(1000)).unwrap();
        n.apply_delta(&FinancialDelta::credits(10)).unwrap();
        assert_eq!(n.direct_income(), 100);
        assert_eq!(n.indirect_income(), 50);
        assert_eq!(n.total_sales(), 1000);
        assert_eq!(n.credit_wallet(), 10);
        assert_eq!(n.ranking_income(), 150);
    }

    #[test]
    fn test_apply_delta_overflow_leaves_node_unchanged() {
        let mut n = node(UserType::Customer);
        n.apply_delta(&FinancialDelta::sale(u64::MAX)).unwrap();
        let before = n.clone();

        let delta = FinancialDelta {
            direct_income: 5,
            total_sales: 1,
            ..Default::default()
        };
        assert!(n.check_delta(&delta).is_err());
        assert!(n.apply_delta(&delta).is_err());
        assert_eq!(n, before);
    }

    #[test]
    fn test_brand_owner_indirect_not_applicable() {
        let mut n = node(UserType::BrandOwner);
        n.apply_delta(&FinancialDelta::direct(300)).unwrap();
        assert_eq!(n.reported_indirect_income(), None);
        assert_eq!(n.ranking_income(), 300);
    }

    #[test]
    fn test_correction_cannot_go_negative() {
        let mut n = node(UserType::Customer);
        n.apply_delta(&FinancialDelta::direct(100)).unwrap();

        let c = FinancialCorrection {
            direct_income: -150,
            ..Default::default()
        };
        assert!(n.apply_correction(&c).is_err());
        assert_eq!(n.direct_income(), 100);

        let c = FinancialCorrection {
            direct_income: -40,
            total_sales: 25,
            ..Default::default()
        };
        n.apply_correction(&c).unwrap();
        assert_eq!(n.direct_income(), 60);
        assert_eq!(n.total_sales(), 25);
    }

    #[test]
    fn test_mark_moved_keeps_first_logical_parent() {
        let mut n = node(UserType::Customer);
        n.mark_moved(Some(1));
        n.mark_moved(Some(9));
        assert!(n.has_moved_position());
        assert_eq!(n.logical_parent_id(), Some(1));
    }

    #[test]
    fn test_side_of_and_children() {
        let mut n = node(UserType::Customer);
        n.set_child_slot(Side::Right, Some(5));
        assert_eq!(n.side_of(5), Some(Side::Right));
        assert_eq!(n.side_of(6), None);
        assert_eq!(n.children().collect::<Vec<_>>(), vec![5]);
        n.set_child_slot(Side::Left, Some(4));
        assert_eq!(n.children().collect::<Vec<_>>(), vec![4, 5]);
    }
}
