//! Arbot Core Library
//!
//! Shared types, configuration, error taxonomy, and database models for the
//! Arbot multi-tenant bot control plane.

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod store;
pub mod types;

pub use error::{Error, Result};
