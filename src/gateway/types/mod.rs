//! Gateway types module
//!
//! ## Input Types
//! - [`RegisterRequest`], [`SaleRequest`], [`CorrectionRequest`]: JSON
//!   bodies; money travels as decimal strings
//!
//! ## Output Types
//! - [`ApiResponse<T>`]: Unified API response wrapper
//! - [`ApiError`]: Error envelope with HTTP status
//!
//! ## Submodules
//! - [`request`]: Request bodies and their response DTOs
//! - [`response`]: Response types and error codes

pub mod request;
pub mod response;

pub use request::{
    CorrectionRequest, RegisterRequest, RegistrationData, SaleData, SaleRequest, TreeData,
};
pub use response::{ApiError, ApiResponse, ApiResult, error_codes, ok};
