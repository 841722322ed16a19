//! Core types used throughout the system
//!
//! These are fundamental type aliases used by all modules.
//! They provide semantic meaning and enable future type evolution.

/// Node ID - globally unique identifier for a participant.
///
/// # Constraints:
/// - **Immutable**: Once assigned, NEVER changes
/// - **Sequential**: Assigned contiguously (1, 2, 3, ...), the founder is always 1
/// - **Ordered**: A sponsor's id is always smaller than the id of anyone it sponsored
pub type NodeId = u64;

/// Monetary amount in the smallest currency unit (e.g. cents).
///
/// Never a float: repeated aggregation over the whole tree must not drift.
pub type Amount = u64;

/// Reward credit count
pub type Credits = u64;

/// Sale ID - unique within the engine, assigned by `record_sale`
pub type SaleId = u64;

/// Rate in 10^6 precision (100_000 = 10%)
pub type Rate = u64;

/// Sequence number for ledger ordering
pub type SeqNum = u64;
