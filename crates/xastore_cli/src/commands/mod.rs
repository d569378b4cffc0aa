//! CLI command implementations.

pub mod inspect;
pub mod snapshot;
pub mod txn;
pub mod verify;
