//! SocialEcho - identity and session backend
//!
//! Password signup/login, stateless bearer tokens kept in an encrypted
//! session cookie, OAuth federation and email verification, served with axum.

pub mod app;
pub mod core;
