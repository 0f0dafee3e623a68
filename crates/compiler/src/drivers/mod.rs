//! Alternate back ends over the same IR (§4.H): `murphi2c`,
//! `murphi2xml`, `murphi2uclid`, `murphi-format`. None of these touch
//! the BFS scheduler or bit-packed state layout the main `rumur`
//! driver targets — each is a different rendering of the same typed
//! `Model`, grounded the way `codegen` renders it to Rust.

pub mod c;
pub mod format;
pub mod uclid;
pub mod xml;

/// Folds a fully-reduced expression down to a literal, the same
/// narrow job `codegen::env::const_i64` does for the Rust back end.
/// Drivers only ever need this for `const` declarations, which
/// `simplify::fold_model` has already reduced to literals by the time
/// a `CompiledModel` reaches here.
pub(crate) fn literal_i64(e: &crate::ast::Expr) -> Option<i64> {
    use crate::ast::Expr;
    match e {
        Expr::IntLit { value, .. } => Some(*value),
        Expr::BoolLit { value, .. } => Some(if *value { 1 } else { 0 }),
        _ => None,
    }
}
