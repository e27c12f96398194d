//! Undo frame stack.

use crate::change::ChangeEvent;
use crate::error::{StoreError, StoreResult};

/// State of the log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    /// No frame is open.
    Idle,
    /// At least one frame is open; the value is the nesting depth.
    Active(usize),
}

/// Events recorded since one `begin`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Frame {
    events: Vec<ChangeEvent>,
}

impl Frame {
    /// Recorded events, oldest first.
    pub fn events(&self) -> &[ChangeEvent] {
        &self.events
    }

    /// Number of recorded events.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Returns true if nothing was recorded.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Inverse events in the order they must be applied to undo the frame.
    pub fn undo_events(self) -> impl Iterator<Item = ChangeEvent> {
        self.events.into_iter().rev().map(|event| event.inverse())
    }
}

/// A stack of undo frames.
///
/// Only the innermost frame is ever appended to or popped. The log does
/// not apply anything itself: [`rollback`](Self::rollback) hands the frame
/// back and the store applies its [`undo_events`](Frame::undo_events).
#[derive(Debug, Default)]
pub struct TransactionLog {
    frames: Vec<Frame>,
}

impl TransactionLog {
    /// Creates an idle log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens a frame.
    pub fn begin(&mut self) {
        self.frames.push(Frame::default());
    }

    /// Closes the innermost frame, keeping its effects.
    ///
    /// # Errors
    ///
    /// Returns `NoActiveTransaction` if no frame is open.
    pub fn commit(&mut self) -> StoreResult<Frame> {
        self.frames.pop().ok_or(StoreError::NoActiveTransaction)
    }

    /// Closes the innermost frame and returns it for undoing.
    ///
    /// # Errors
    ///
    /// Returns `NoActiveTransaction` if no frame is open.
    pub fn rollback(&mut self) -> StoreResult<Frame> {
        self.frames.pop().ok_or(StoreError::NoActiveTransaction)
    }

    /// Appends to the innermost frame. Returns false when idle.
    pub fn record(&mut self, event: &ChangeEvent) -> bool {
        match self.frames.last_mut() {
            Some(frame) => {
                frame.events.push(event.clone());
                true
            }
            None => false,
        }
    }

    /// Number of open frames.
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// Returns true if a frame is open.
    pub fn is_active(&self) -> bool {
        !self.frames.is_empty()
    }

    /// Current state.
    pub fn state(&self) -> TransactionState {
        match self.frames.len() {
            0 => TransactionState::Idle,
            n => TransactionState::Active(n),
        }
    }

    /// Drops every open frame without undoing anything.
    pub(crate) fn discard_all(&mut self) -> usize {
        let open = self.frames.len();
        self.frames.clear();
        open
    }
}
