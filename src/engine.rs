//! ReferralEngine - single-writer facade over the tree
//!
//! # Concurrency
//!
//! ```text
//! register / record_sale / correct / consolidate ──▶ Mutex<EngineState> (one writer)
//!                                                          │ version bump + publish
//! list_tree ──try_lock──▶ rebuild snapshot if stale ───────┘
//!           └─ busy ─────▶ last published snapshot (RwLock<Arc<TreeSnapshot>>)
//! ```
//!
//! Every committed write publishes a fresh snapshot before releasing the
//! writer lock, so the snapshot served during a long run reflects the last
//! completed write.
//!
//! Every write is planned against the current state and applied as one
//! unit, so a rejected operation leaves nothing behind. Consolidation holds
//! the writer lock for the whole run and works on a copy of the store, so
//! tree listings keep being served from the last snapshot while it runs.

use std::io::Write;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, TryLockError};

use tracing::{error, info, warn};

use crate::commission::{CommissionCalculator, CommissionSchedule, SaleReceipt};
use crate::consolidation::{ConsolidationReport, ConsolidationScheduler};
use crate::core_types::{Amount, NodeId, SaleId};
use crate::error::{EngineError, EngineResult};
use crate::ledger::{EntryDraft, Ledger, LedgerEntry, LedgerField, LedgerOp, LedgerReason};
use crate::node::{FinancialCorrection, NewParticipant, UserType};
use crate::placement::{Placement, PlacementEngine};
use crate::reward::RewardConfig;
use crate::store::NodeStore;
use crate::turnover::{TurnoverAggregator, TurnoverSummary};
use crate::view::{NodeView, TreeLevels, subtree_levels, tree_levels};

/// Commission and reward rules the engine runs with
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EngineSettings {
    pub commission: CommissionSchedule,
    pub rewards: RewardConfig,
}

/// Level-order listing as of one state version
#[derive(Debug, Clone, Default)]
pub struct TreeSnapshot {
    pub version: u64,
    pub levels: TreeLevels,
}

#[derive(Debug, Default)]
struct EngineState {
    store: NodeStore,
    ledger: Ledger,
    last_sale_id: SaleId,
    consolidation_runs: u64,
    /// Bumped on every successful write
    version: u64,
}

pub struct ReferralEngine {
    settings: EngineSettings,
    state: Mutex<EngineState>,
    snapshot: RwLock<Arc<TreeSnapshot>>,
}

impl EngineSettings {
    /// Rates above 100% and unit scales beyond `u64` are refused.
    pub fn validate(&self) -> EngineResult<()> {
        self.commission
            .validate()
            .map_err(EngineError::InvalidAmount)?;
        self.rewards.validate().map_err(EngineError::InvalidAmount)
    }
}

impl ReferralEngine {
    pub fn new(settings: EngineSettings) -> EngineResult<Self> {
        settings.validate()?;
        Ok(Self {
            settings,
            state: Mutex::new(EngineState::default()),
            snapshot: RwLock::new(Arc::new(TreeSnapshot::default())),
        })
    }

    /// New engine with its founder already in place.
    pub fn with_founder(settings: EngineSettings, founder: NewParticipant) -> EngineResult<Self> {
        let engine = Self::new(settings)?;
        engine.create_founder(founder)?;
        Ok(engine)
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    fn lock(&self) -> MutexGuard<'_, EngineState> {
        // Writes are all-or-nothing, a panicking holder leaves valid state
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Bump the version and publish the listing for it.
    fn commit(&self, state: &mut EngineState) {
        state.version += 1;
        if let Err(e) = self.refresh_snapshot(state) {
            error!(version = state.version, error = %e, "Snapshot publish failed, keeping previous");
        }
    }

    // ============================================================
    // WRITE OPERATIONS
    // ============================================================

    /// Create the tree root. Only one founder may exist.
    pub fn create_founder(&self, attrs: NewParticipant) -> EngineResult<NodeId> {
        if attrs.user_type != UserType::Founder {
            return Err(EngineError::InvalidParticipant(
                "the tree root must be a founder".into(),
            ));
        }
        let mut state = self.lock();
        let id = state.store.create_node(None, attrs)?;
        self.commit(&mut state);
        info!(founder_id = id, "Founder created");
        Ok(id)
    }

    /// Register a participant under `sponsor` and place it in the tree.
    pub fn register(&self, sponsor: NodeId, attrs: NewParticipant) -> EngineResult<Placement> {
        let mut state = self.lock();
        match PlacementEngine::register(&mut state.store, sponsor, attrs) {
            Ok(placement) => {
                self.commit(&mut state);
                info!(
                    node_id = placement.node_id,
                    sponsor,
                    parent = placement.structural_parent_id,
                    spillover = placement.is_spillover(),
                    "Participant registered"
                );
                Ok(placement)
            }
            Err(e) => {
                warn!(sponsor, error = %e, "Registration rejected");
                Err(e)
            }
        }
    }

    /// Record one sale and pay its commissions.
    pub fn record_sale(&self, seller: NodeId, amount: Amount) -> EngineResult<SaleReceipt> {
        let mut state = self.lock();
        let plan = match CommissionCalculator::apply(
            &mut state.store,
            &self.settings.commission,
            seller,
            amount,
        ) {
            Ok(plan) => plan,
            Err(e) => {
                warn!(seller, amount, error = %e, "Sale rejected");
                return Err(e);
            }
        };

        state.last_sale_id += 1;
        let sale_id = state.last_sale_id;
        let receipt = SaleReceipt::new(sale_id, &plan);

        let EngineState { store, ledger, .. } = &mut *state;
        let sales_after = store.get_node(seller)?.total_sales();
        ledger.record(EntryDraft {
            sale_id: Some(sale_id),
            node_id: seller,
            field: LedgerField::TotalSales,
            reason: LedgerReason::Sale,
            op: LedgerOp::Credit,
            delta: amount,
            value_after: sales_after,
        });
        if let Some(direct) = receipt.direct.filter(|d| d.amount > 0) {
            ledger.record(EntryDraft {
                sale_id: Some(sale_id),
                node_id: direct.node_id,
                field: LedgerField::DirectIncome,
                reason: LedgerReason::DirectCommission,
                op: LedgerOp::Credit,
                delta: direct.amount,
                value_after: store.get_node(direct.node_id)?.direct_income(),
            });
        }
        for credit in receipt.indirect.iter().filter(|c| c.amount > 0) {
            ledger.record(EntryDraft {
                sale_id: Some(sale_id),
                node_id: credit.node_id,
                field: LedgerField::IndirectIncome,
                reason: LedgerReason::IndirectCommission {
                    level: credit.level,
                },
                op: LedgerOp::Credit,
                delta: credit.amount,
                value_after: store.get_node(credit.node_id)?.indirect_income(),
            });
        }
        self.commit(&mut state);

        info!(
            sale_id,
            seller,
            amount,
            paid = receipt.total_paid,
            "Sale recorded"
        );
        Ok(receipt)
    }

    /// Apply a signed adjustment to a node's income and sales figures.
    pub fn correct_financials(
        &self,
        id: NodeId,
        correction: FinancialCorrection,
    ) -> EngineResult<NodeView> {
        if correction.is_zero() {
            return Err(EngineError::InvalidAmount(
                "correction changes nothing".into(),
            ));
        }
        let mut state = self.lock();
        if let Err(e) = state.store.apply_correction(id, &correction) {
            warn!(node_id = id, error = %e, "Correction rejected");
            return Err(e);
        }

        let EngineState { store, ledger, .. } = &mut *state;
        let node = store.get_node(id)?;
        for (field, delta, value_after) in [
            (
                LedgerField::DirectIncome,
                correction.direct_income,
                node.direct_income(),
            ),
            (
                LedgerField::IndirectIncome,
                correction.indirect_income,
                node.indirect_income(),
            ),
            (
                LedgerField::TotalSales,
                correction.total_sales,
                node.total_sales(),
            ),
        ] {
            if delta == 0 {
                continue;
            }
            ledger.record(EntryDraft {
                sale_id: None,
                node_id: id,
                field,
                reason: LedgerReason::Correction,
                op: if delta > 0 {
                    LedgerOp::Credit
                } else {
                    LedgerOp::Debit
                },
                delta: delta.unsigned_abs(),
                value_after,
            });
        }
        let view = NodeView::from(node);
        self.commit(&mut state);

        info!(node_id = id, ?correction, "Financials corrected");
        Ok(view)
    }

    /// Run the Turnover Aggregator alone.
    pub fn recompute_turnover(&self) -> EngineResult<TurnoverSummary> {
        let mut state = self.lock();
        let summary = TurnoverAggregator::recompute(&mut state.store)?;
        self.commit(&mut state);
        Ok(summary)
    }

    /// Run one full consolidation cycle. The live tree is replaced only when
    /// the run succeeds.
    pub fn run_consolidation(&self) -> EngineResult<ConsolidationReport> {
        let mut state = self.lock();
        let run_id = state.consolidation_runs + 1;

        let outcome = match ConsolidationScheduler::run(&state.store, &self.settings.rewards, run_id)
        {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(run_id, error = %e, "Consolidation run failed, tree left unchanged");
                return Err(e);
            }
        };

        let EngineState { store, ledger, .. } = &mut *state;
        *store = outcome.store;
        for alloc in &outcome.report.credit_allocations {
            ledger.record(EntryDraft {
                sale_id: None,
                node_id: alloc.node_id,
                field: LedgerField::CreditWallet,
                reason: LedgerReason::RewardAllocation { run: run_id },
                op: LedgerOp::Credit,
                delta: alloc.credits_awarded,
                value_after: alloc.wallet_after,
            });
        }
        state.consolidation_runs = run_id;
        self.commit(&mut state);

        Ok(outcome.report)
    }

    // ============================================================
    // QUERY OPERATIONS (Read-Only)
    // ============================================================

    /// Level-order listing from the founder.
    ///
    /// Never waits for a writer: while the tree is locked the last
    /// published snapshot is returned.
    pub fn list_tree(&self) -> EngineResult<Arc<TreeSnapshot>> {
        match self.state.try_lock() {
            Ok(state) => self.refresh_snapshot(&state),
            Err(TryLockError::Poisoned(poisoned)) => self.refresh_snapshot(&poisoned.into_inner()),
            Err(TryLockError::WouldBlock) => Ok(self.published_snapshot()),
        }
    }

    /// State version of the published listing. Never locks the writer.
    pub fn tree_version(&self) -> u64 {
        self.published_snapshot().version
    }

    fn published_snapshot(&self) -> Arc<TreeSnapshot> {
        self.snapshot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn refresh_snapshot(&self, state: &EngineState) -> EngineResult<Arc<TreeSnapshot>> {
        let current = self.published_snapshot();
        if current.version == state.version {
            return Ok(current);
        }
        let fresh = Arc::new(TreeSnapshot {
            version: state.version,
            levels: tree_levels(&state.store)?,
        });
        *self.snapshot.write().unwrap_or_else(PoisonError::into_inner) = fresh.clone();
        Ok(fresh)
    }

    /// Level-order listing rooted at any node.
    pub fn list_subtree(&self, root: NodeId) -> EngineResult<TreeSnapshot> {
        let state = self.lock();
        Ok(TreeSnapshot {
            version: state.version,
            levels: subtree_levels(&state.store, root)?,
        })
    }

    pub fn get_node(&self, id: NodeId) -> EngineResult<NodeView> {
        self.lock().store.get_node(id).map(NodeView::from)
    }

    /// Everyone `id` sponsored, in registration order.
    pub fn direct_referrals(&self, id: NodeId) -> EngineResult<Vec<NodeView>> {
        let state = self.lock();
        state
            .store
            .get_node(id)?
            .direct_referral_ids()
            .iter()
            .map(|r| state.store.get_node(*r).map(NodeView::from))
            .collect()
    }

    pub fn founder_id(&self) -> Option<NodeId> {
        self.lock().store.founder_id()
    }

    pub fn total_users(&self) -> usize {
        self.lock().store.len()
    }

    pub fn consolidation_runs(&self) -> u64 {
        self.lock().consolidation_runs
    }

    pub fn ledger_entries(&self, id: NodeId) -> EngineResult<Vec<LedgerEntry>> {
        let state = self.lock();
        state.store.get_node(id)?;
        Ok(state.ledger.entries_for(id))
    }

    /// Write the full ledger as CSV. Returns the number of entries.
    pub fn export_ledger_csv<W: Write>(&self, out: W) -> EngineResult<u64> {
        self.lock()
            .ledger
            .export_csv(out)
            .map_err(|e| EngineError::InvariantViolation(format!("ledger export failed: {}", e)))
    }

    /// Full structural audit of the live tree.
    pub fn verify(&self) -> EngineResult<()> {
        self.lock().store.verify_structure()
    }
}
