//! # finres Common Library
//!
//! Shared code for the finres crates:
//! - Error type and result alias
//! - TOML configuration loading and config path resolution
//! - Logging initialisation

pub mod config;
pub mod error;
pub mod logging;

pub use error::{Error, Result};
