//! Source positions.

use std::fmt;

/// A half-open span of source text, named the way the compiler's
/// diagnostics want to print it: `file:start_line-end_line`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SourceLocation {
    pub file: u32,
    pub start_line: u32,
    pub start_col: u32,
    pub end_line: u32,
    pub end_col: u32,
}

impl SourceLocation {
    pub fn new(file: u32, start_line: u32, start_col: u32, end_line: u32, end_col: u32) -> Self {
        SourceLocation {
            file,
            start_line,
            start_col,
            end_line,
            end_col,
        }
    }

    /// A zero-width location at a single point, used for synthesized
    /// nodes (e.g. an `invariant` rewritten into a `rule`).
    pub fn point(file: u32, line: u32, col: u32) -> Self {
        SourceLocation::new(file, line, col, line, col)
    }

    pub fn contains(&self, line: u32, col: u32) -> bool {
        if line < self.start_line || line > self.end_line {
            return false;
        }
        if line == self.start_line && col < self.start_col {
            return false;
        }
        if line == self.end_line && col > self.end_col {
            return false;
        }
        true
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.start_line == self.end_line {
            write!(f, "line {}", self.start_line)
        } else {
            write!(f, "line {}-{}", self.start_line, self.end_line)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contains_single_line_span() {
        let loc = SourceLocation::new(0, 3, 5, 3, 10);
        assert!(loc.contains(3, 5));
        assert!(loc.contains(3, 10));
        assert!(!loc.contains(3, 4));
        assert!(!loc.contains(3, 11));
        assert!(!loc.contains(2, 7));
    }

    #[test]
    fn contains_multi_line_span() {
        let loc = SourceLocation::new(0, 3, 5, 5, 2);
        assert!(loc.contains(4, 0));
        assert!(loc.contains(3, 5));
        assert!(!loc.contains(3, 4));
        assert!(loc.contains(5, 2));
        assert!(!loc.contains(5, 3));
    }
}
