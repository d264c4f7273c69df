//! Database repositories for SocialEcho
//!
//! PostgreSQL implementations of the storage contracts in [`super::store`].

pub mod account;
pub mod verification;

pub use account::PgAccountRepository;
pub use verification::PgVerificationRepository;
