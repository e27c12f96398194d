//! # tabula Core
//!
//! Embedded, in-process record store.
//!
//! This crate provides:
//! - [`Store`]: named tables of records with monotonically assigned ids
//! - Secondary [`index`]es for exact-match lookup, kept consistent with
//!   every observed mutation
//! - [`Observer`]: explicit read/write access to stored values, so that
//!   nested edits are attributed to their record and column
//! - Nested [`transaction`] frames with rollback by inverse events
//! - Change and table-change [`feed`]s for persistence collaborators
//! - Whole-store snapshots via [`Store::serialize`] and [`Store::load`]
//!
//! Values and the wire codec come from [`tabula_codec`].
//!
//! ## Usage
//!
//! ```rust
//! use tabula_core::Store;
//! use tabula_codec::Value;
//!
//! let mut store = Store::new();
//! store.create_table("users", &[]);
//!
//! let hobbies = store.heap_mut().list([Value::from("a"), Value::from("b"), Value::from("c")]);
//! let user = store.heap_mut().object([("hobbies", hobbies)]);
//! let user = store.add_record("users", user).unwrap();
//! let hobbies = store.observe(&user).get("hobbies").unwrap().unwrap().into_handle().unwrap();
//!
//! store.begin();
//! store.observe(&hobbies).push("d").unwrap();
//! store.observe(&hobbies).splice(1, 1, [Value::from("x"), Value::from("y")]).unwrap();
//! store.rollback().unwrap();
//!
//! let items: Vec<Value> = store.observe(&hobbies).iter().unwrap().map(Value::from).collect();
//! assert_eq!(items, vec![Value::from("a"), Value::from("b"), Value::from("c")]);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod change;
mod config;
mod error;
pub mod feed;
pub mod index;
mod observer;
mod store;
mod table;
pub mod transaction;
mod types;

pub use change::{ChangeEvent, ChangeKind, TableChangeType, TableEvent};
pub use config::{StoreConfig, FORMAT_VERSION, RECORD_ID_SYMBOL_NAME};
pub use error::{StoreError, StoreResult};
pub use feed::{Feed, Sequenced};
pub use index::{IndexMismatch, MismatchKind};
pub use observer::{Attribution, Handle, Observed, Observer, RecordHandle};
pub use store::Store;
pub use table::Table;
pub use types::RecordId;
