//! HTTP handlers
//!
//! - [`health`]: liveness and version
//! - [`participant`]: registration and per-node queries
//! - [`sale`]: sales and corrections
//! - [`tree`]: tree listing, consolidation and ledger export

pub mod health;
pub mod participant;
pub mod sale;
pub mod tree;

// Globs carry the generated `__path_*` items the OpenAPI derive looks up
pub use health::*;
pub use participant::*;
pub use sale::*;
pub use tree::*;
