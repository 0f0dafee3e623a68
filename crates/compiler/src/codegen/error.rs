//! Code generator error type.
//!
//! Mirrors the teacher's `codegen::error::CodeGenError`: a small enum
//! with a manual `Display` and `From` conversions rather than a boxed
//! trait object.

use std::fmt;

#[derive(Debug)]
pub enum CodeGenError {
    Logic(String),
    Format(std::fmt::Error),
}

impl fmt::Display for CodeGenError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CodeGenError::Logic(msg) => write!(f, "code generation error: {msg}"),
            CodeGenError::Format(e) => write!(f, "formatting error: {e}"),
        }
    }
}

impl std::error::Error for CodeGenError {}

impl From<String> for CodeGenError {
    fn from(s: String) -> Self {
        CodeGenError::Logic(s)
    }
}

impl From<std::fmt::Error> for CodeGenError {
    fn from(e: std::fmt::Error) -> Self {
        CodeGenError::Format(e)
    }
}

impl From<crate::diagnostics::Diagnostic> for CodeGenError {
    fn from(d: crate::diagnostics::Diagnostic) -> Self {
        CodeGenError::Logic(d.to_string())
    }
}

pub type CodeGenResult<T> = Result<T, CodeGenError>;
