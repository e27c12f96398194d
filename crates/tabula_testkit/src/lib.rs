//! # tabula Testkit
//!
//! Test utilities for tabula.
//!
//! This crate provides:
//! - Store fixtures and scenario helpers
//! - Temporary snapshot files
//! - Property-based generators for value graphs, records and observed
//!   mutations using proptest
//!
//! ## Usage
//!
//! ```rust
//! use tabula_testkit::prelude::*;
//!
//! with_users(|store| {
//!     let john = add_user(store, "John", "j@x.com");
//!     assert_eq!(store.record_count(USERS).unwrap(), 1);
//!     store.remove_record(USERS, &john).unwrap();
//! });
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
}

pub use fixtures::*;
pub use generators::*;
