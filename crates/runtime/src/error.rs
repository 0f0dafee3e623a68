//! The first-error report a scheduler run surfaces (§5.E, §4.H).
//!
//! Carries just enough to reconstruct a counterexample trace: the
//! violation message and the offending state's own arena handle, so
//! `trace::reconstruct` can walk `predecessor` links back to a
//! startstate without the scheduler needing to know anything about
//! trace formatting.

use crate::state::State;

#[derive(Debug, Clone)]
pub struct ErrorReport {
    pub message: String,
    pub state: State,
}

impl ErrorReport {
    pub fn new(message: String, state: State) -> Self {
        ErrorReport { message, state }
    }
}
