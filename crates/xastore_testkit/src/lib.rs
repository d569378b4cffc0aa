//! # xastore testkit
//!
//! Test utilities for xastore.
//!
//! This crate provides:
//! - Engine fixtures with a manual clock and seeded scenarios
//! - Property-based test generators using proptest
//! - A reference model and a differential checker for command sequences
//!
//! ## Usage
//!
//! ```rust
//! use xastore_testkit::prelude::*;
//! use xastore_core::Intent;
//!
//! let commands = vec![
//!     Command::Prepare(Intent::insert("f0:t0", "user0", "a")),
//!     Command::Commit("f0:t0".to_string()),
//! ];
//! check_sequence(&commands).unwrap();
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod model;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::model::*;
}

pub use fixtures::*;
pub use generators::*;
pub use model::*;
