//! Referral Tree - binary referral engine
//!
//! Participants join under a sponsor and are placed by breadth-first
//! spillover into a binary tree. Sales pay a direct commission to the
//! seller's sponsor and multi-level indirect commissions up the seller's
//! structural parent chain. A periodic consolidation run promotes high
//! earners and awards reward credits.
//!
//! # Modules
//!
//! - [`core_types`] - Ids and amount aliases
//! - [`node`] - Participant node and its attributes
//! - [`store`] - Id-keyed node arena
//! - [`placement`] - Breadth-first spillover placement
//! - [`turnover`] - Subtree turnover aggregation
//! - [`commission`] - Direct and multi-level commissions
//! - [`reward`] - Reward tier schedule
//! - [`consolidation`] - Swap pass and credit allocation
//! - [`ledger`] - Income and credit audit log
//! - [`engine`] - Thread-safe facade over all of the above
//! - [`gateway`] - HTTP API

pub mod core_types;

pub mod error;
pub mod money;

// Tree model
pub mod node;
pub mod placement;
pub mod store;
pub mod view;

// Money flows
pub mod commission;
pub mod consolidation;
pub mod ledger;
pub mod reward;
pub mod turnover;

pub mod engine;

// Service
pub mod config;
pub mod gateway;
pub mod logging;

// Convenient re-exports at crate root
pub use commission::{CommissionCalculator, CommissionSchedule, SaleReceipt};
pub use consolidation::{ConsolidationReport, ConsolidationScheduler};
pub use core_types::{Amount, NodeId};
pub use engine::{EngineSettings, ReferralEngine, TreeSnapshot};
pub use error::{EngineError, EngineResult};
pub use ledger::{Ledger, LedgerEntry};
pub use node::{NewParticipant, ParticipantNode, Side, UserType};
pub use reward::{CreditPolicy, RewardConfig, RewardSchedule};
pub use store::NodeStore;
pub use view::NodeView;
