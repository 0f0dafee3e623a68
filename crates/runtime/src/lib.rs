//! `rumur-runtime`: the library a generated checker links against.
//!
//! Mirrors §4.G/§5 of the design: a bit-packed [`state::State`], a
//! lock-free [`seen_set::SeenSet`], work-stealing [`queue`]s, the
//! [`scheduler`] that drives parallel breadth-first exploration over a
//! generated [`scheduler::RuleSet`], [`symmetry`] canonicalisation over
//! scalarset-typed state slots, [`trace`] reconstruction for a
//! counterexample, and an optional per-platform [`sandbox`].

pub mod arena;
pub mod dword_cas;
pub mod error;
pub mod progress;
pub mod queue;
pub mod sandbox;
pub mod scheduler;
pub mod seen_set;
pub mod state;
pub mod symmetry;
pub mod trace;

pub use error::ErrorReport;
pub use scheduler::{explore, ExplorationResult, RuleSet, SchedulerConfig};
pub use state::State;
