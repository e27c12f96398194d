//! Transactions as nested undo frames.
//!
//! tabula transactions give rollback, not isolation:
//! - `begin` pushes a frame; every observed mutation appends its event to
//!   the innermost frame
//! - `commit` pops the innermost frame and keeps its effects
//! - `rollback` pops the innermost frame and applies the inverse of each
//!   event, newest first
//!
//! An outer frame stays open across an inner commit or rollback.

mod log;

pub use log::{Frame, TransactionLog, TransactionState};
