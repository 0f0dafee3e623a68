//! Host-representation choices for the code generator.
//!
//! Every Murphi value is stored, at rest, as packed bits (`layout::
//! encoded_width` bits at some bit offset). Scalar values are decoded
//! into a native Rust type to evaluate expressions; composite values
//! (arrays, records) are never decoded to a native type and stay
//! addressed as `(buffer, bit_offset)` pairs all the way through.

use crate::ast::Type;

/// The Rust type an expression of `ty` evaluates to, once decoded out
/// of its packed bits. Only meaningful for `Type::is_simple()` types;
/// composite types are addressed, never decoded.
pub fn host_scalar_type(ty: &Type) -> &'static str {
    match ty {
        Type::Boolean => "bool",
        Type::Range { .. } | Type::Enum { .. } | Type::Scalarset { .. } => "i64",
        _ => "i64",
    }
}

/// The sentinel encoded value that means "undefined" for `ty`, i.e.
/// the first value past its normal range (§3).
pub fn undefined_sentinel(ty: &Type) -> u64 {
    crate::layout::cardinality(ty)
}

/// Rewrites a Murphi identifier into one safe to splice as a Rust
/// identifier: Murphi's own identifier grammar is already
/// alphanumeric-plus-underscore, so the only real risk is colliding
/// with a Rust keyword.
pub fn safe_ident(name: &str) -> String {
    const KEYWORDS: &[&str] = &[
        "as", "break", "const", "continue", "crate", "else", "enum", "extern", "false", "fn",
        "for", "if", "impl", "in", "let", "loop", "match", "mod", "move", "mut", "pub", "ref",
        "return", "self", "Self", "static", "struct", "super", "trait", "true", "type", "unsafe",
        "use", "where", "while", "async", "await", "dyn", "abstract", "become", "box", "do",
        "final", "macro", "override", "priv", "typeof", "unsized", "virtual", "yield", "try",
        "state", "out",
    ];
    if KEYWORDS.contains(&name) {
        format!("r#{name}")
    } else {
        name.to_string()
    }
}

/// A state/local variable's Rust constant name for its bit offset,
/// e.g. `x` -> `OFFSET_X`.
pub fn offset_const_name(var: &str) -> String {
    format!("OFFSET_{}", var.to_uppercase())
}

pub fn width_const_name(var: &str) -> String {
    format!("WIDTH_{}", var.to_uppercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn booleans_decode_to_bool_everything_else_to_i64() {
        assert_eq!(host_scalar_type(&Type::Boolean), "bool");
        assert_eq!(host_scalar_type(&Type::Range { lo: 0, hi: 3 }), "i64");
    }

    #[test]
    fn a_murphi_identifier_that_collides_with_a_keyword_is_raw() {
        assert_eq!(safe_ident("type"), "r#type");
        assert_eq!(safe_ident("x"), "x");
    }

    #[test]
    fn undefined_sentinel_sits_one_past_cardinality() {
        assert_eq!(undefined_sentinel(&Type::Range { lo: 0, hi: 3 }), 4);
    }
}
