//! # FID Common Library
//!
//! Shared code for facility identifier generation including:
//! - Canonical identifier codec (`FacilityIdentifier`)
//! - Sequence partition keys
//! - Database initialization and models
//! - Configuration loading
//! - Logging setup
//! - Error taxonomy

pub mod config;
pub mod db;
pub mod error;
pub mod identifier;
pub mod logging;
pub mod time;

pub use error::{Error, Result};
pub use identifier::{FacilityIdentifier, SequencePartitionKey};
