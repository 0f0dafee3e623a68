//! Shared primitives for the rumur workspace.
//!
//! - `location`: source positions attached to every IR node.
//! - `arena`: an index-based arena that replaces parent-pointer graphs
//!   for the IR (see `Arena<T>`).
//! - `bits`: the only two primitives that cross the bit boundary when
//!   reading or writing packed state, shared by the layout planner,
//!   the code generator and the runtime.

pub mod arena;
pub mod bits;
pub mod location;

pub use arena::{Arena, NodeId};
pub use bits::{read_bits, write_bits};
pub use location::SourceLocation;
