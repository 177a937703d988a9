//! Shared utilities.
//!
//! Content hashing for the library cache and container idempotency checks,
//! plus test helpers.

pub mod hash;

#[cfg(test)]
pub mod testutil;
