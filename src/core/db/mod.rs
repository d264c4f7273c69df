//! Database module for SocialEcho
//!
//! This module provides the storage contracts the identity core consumes,
//! their PostgreSQL repositories, and in-memory implementations.

pub mod memory;
pub mod models;
pub mod pool;
pub mod repositories;
pub mod store;

// Re-export commonly used items
pub use memory::{MemoryAccountStore, MemoryVerificationStore};
pub use models::*;
pub use pool::{DEFAULT_MAX_CONNECTIONS, DbConfig, DbError, connect};
pub use repositories::{PgAccountRepository, PgVerificationRepository};
pub use store::{AccountStore, StoreError, VerificationStore};

// Re-export sqlx types that might be needed
pub use sqlx::PgPool;
