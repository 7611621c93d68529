//! Learning Backend Module
//!
//! Clean Architecture structure:
//! - `domain/` - Entities, value objects, repository traits
//! - `application/` - Commands, queries, handlers, registration consumer
//! - `infra/` - PostgreSQL and in-memory stores, read-side replication
//! - `presentation/` - HTTP handlers, router, middleware
//!
//! ## Features
//! - Registration, login (email or nickname) and email confirmation
//! - Topics, levels and lessons with their vocabulary
//! - Per-language learning activity for each user
//!
//! ## Consistency Model
//! - Commands write the system-of-record store; queries read the read store
//! - Every committed write is replicated through a `ReplicationHook`; a hook
//!   failure is logged and the write stands
//! - `UserRegisteredEvent` replays the user into the read store and drives
//!   the confirmation email

pub mod application;
pub mod domain;
pub mod error;
pub mod infra;
pub mod presentation;

// Re-exports for convenience
pub use application::{Dependencies, build_mediator, config::LearningConfig};
pub use error::{StoreError, StoreResult};
pub use infra::{MemoryStore, NoReplication, PgStore, ReadStoreMirror, WriteStore};
pub use presentation::router::learning_router;

// Re-export kernel error types for unified error handling
pub use kernel::error::{
    app_error::{AppError, AppResult},
    kind::ErrorKind,
};

pub mod config {
    pub use crate::application::config::*;
}

pub mod models {
    pub use crate::application::dto::*;
    pub use crate::domain::entity::*;
    pub use crate::domain::value_object::*;
}

pub mod consumer {
    pub use crate::application::consumer::*;
}

#[cfg(test)]
mod tests;
