//! The compiler's error taxonomy.
//!
//! A small tagged enum with a `Display` impl, in the same spirit as
//! `codegen::error::CodeGenError`: no `anyhow`/`thiserror`, just a
//! `From`-convertible enum that every fallible pass returns in its
//! `Result`.

use rumur_core::SourceLocation;
use std::fmt;

#[derive(Debug)]
pub enum Diagnostic {
    Lex { message: String, loc: SourceLocation },
    Parse { message: String, loc: SourceLocation },
    Name { message: String, loc: SourceLocation },
    Type { message: String, loc: SourceLocation },
    ConstEval { message: String, loc: SourceLocation },
    RuntimeCompile { message: String, loc: SourceLocation },
    Io { message: String },
    Internal { message: String },
}

impl Diagnostic {
    pub fn lex(message: impl Into<String>, loc: SourceLocation) -> Self {
        Diagnostic::Lex { message: message.into(), loc }
    }
    pub fn parse(message: impl Into<String>, loc: SourceLocation) -> Self {
        Diagnostic::Parse { message: message.into(), loc }
    }
    pub fn name(message: impl Into<String>, loc: SourceLocation) -> Self {
        Diagnostic::Name { message: message.into(), loc }
    }
    pub fn ty(message: impl Into<String>, loc: SourceLocation) -> Self {
        Diagnostic::Type { message: message.into(), loc }
    }
    pub fn const_eval(message: impl Into<String>, loc: SourceLocation) -> Self {
        Diagnostic::ConstEval { message: message.into(), loc }
    }
    pub fn runtime_compile(message: impl Into<String>, loc: SourceLocation) -> Self {
        Diagnostic::RuntimeCompile { message: message.into(), loc }
    }
    pub fn io(message: impl Into<String>) -> Self {
        Diagnostic::Io { message: message.into() }
    }
    pub fn internal(message: impl Into<String>) -> Self {
        Diagnostic::Internal { message: message.into() }
    }

    pub fn loc(&self) -> Option<SourceLocation> {
        match self {
            Diagnostic::Lex { loc, .. }
            | Diagnostic::Parse { loc, .. }
            | Diagnostic::Name { loc, .. }
            | Diagnostic::Type { loc, .. }
            | Diagnostic::ConstEval { loc, .. }
            | Diagnostic::RuntimeCompile { loc, .. } => Some(*loc),
            Diagnostic::Io { .. } | Diagnostic::Internal { .. } => None,
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::Lex { message, loc } => write!(f, "{loc}: lex error: {message}"),
            Diagnostic::Parse { message, loc } => write!(f, "{loc}: parse error: {message}"),
            Diagnostic::Name { message, loc } => write!(f, "{loc}: {message}"),
            Diagnostic::Type { message, loc } => write!(f, "{loc}: type error: {message}"),
            Diagnostic::ConstEval { message, loc } => {
                write!(f, "{loc}: expected a constant expression: {message}")
            }
            Diagnostic::RuntimeCompile { message, loc } => write!(f, "{loc}: {message}"),
            Diagnostic::Io { message } => write!(f, "io error: {message}"),
            Diagnostic::Internal { message } => write!(f, "internal error (this is a bug): {message}"),
        }
    }
}

impl std::error::Error for Diagnostic {}

impl From<std::io::Error> for Diagnostic {
    fn from(e: std::io::Error) -> Self {
        Diagnostic::io(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Diagnostic>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_location_for_located_variants() {
        let loc = SourceLocation::point(0, 4, 2);
        let d = Diagnostic::ty("mismatched arms", loc);
        assert!(d.to_string().contains("line 4"));
        assert!(d.to_string().contains("mismatched arms"));
    }

    #[test]
    fn io_and_internal_have_no_location() {
        assert!(Diagnostic::io("boom").loc().is_none());
        assert!(Diagnostic::internal("unreachable").loc().is_none());
    }
}
