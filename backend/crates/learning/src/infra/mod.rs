//! Infrastructure Layer
//!
//! Store backends and the write/replication seam.

pub mod memory;
pub mod postgres;
pub mod replication;

pub use memory::MemoryStore;
pub use postgres::PgStore;
pub use replication::{NoReplication, ReadStoreMirror, WriteScope, WriteStore};
