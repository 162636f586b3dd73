//! Domain layer for the knowledge sync controller
//!
//! This module contains the sync lifecycle models and the port traits
//! that adapters implement.

pub mod errors;
pub mod models;
pub mod ports;

pub use errors::{DomainError, DomainResult};
