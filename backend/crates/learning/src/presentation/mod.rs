//! Presentation Layer
//!
//! HTTP handlers, DTOs, router, and middleware.

pub mod dto;
pub mod handlers;
pub mod middleware;
pub mod router;

pub use handlers::AppState;
pub use middleware::{Caller, ContextState, attach_request_context, error_envelope, panic_response};
pub use router::learning_router;
