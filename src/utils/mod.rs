//! Utilities Module
//!
//! Hashing helpers and logging shared across the crate.

pub mod crypto;
pub mod logging;

pub use crypto::*;
