//! Core identity logic, storage and configuration

pub mod auth;
pub mod config;
pub mod db;

#[cfg(test)]
mod tests;
