//! HTTP boundary: service info, health and the authenticated extraction
//! endpoint.

pub mod auth;
pub mod errors;
mod router;
mod state;

pub use errors::{ApiError, ApiResult};
pub use router::build_router;
pub use state::AppState;
