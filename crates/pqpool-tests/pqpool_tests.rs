//! pqpool integration test suite
//!
//! Exercises the pool end to end: first against a mock connector that counts
//! every open and close, then against a real PostgreSQL server started with
//! testcontainers-rs.
//!
//! # Usage
//!
//! ```bash
//! # Pool behaviour against the mock connector
//! cargo test -p pqpool-tests
//!
//! # Include the PostgreSQL tests (needs Docker)
//! cargo test -p pqpool-tests -- --include-ignored
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod fixtures;
pub mod test_containers;

#[cfg(test)]
pub mod pool_tests;

#[cfg(test)]
pub mod postgres_tests;
