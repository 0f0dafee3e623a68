//! Project-level configuration (`rumur.toml`), layered underneath the
//! CLI flags in `main.rs`.
//!
//! Following the teacher's lint-config pattern (`seqc lint --config
//! PATH` reading a TOML file), an optional `rumur.toml` next to the
//! input file supplies defaults for anything not given on the command
//! line: thread count, sandboxing, and SMT solver wiring. CLI flags
//! always win over the file.

use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FileConfig {
    pub threads: Option<usize>,
    pub sandbox: Option<bool>,
    pub symmetry_reduction: Option<bool>,
    pub smt: Option<SmtFileConfig>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SmtFileConfig {
    pub path: Option<String>,
    pub args: Option<Vec<String>>,
    pub prelude: Option<String>,
    pub logic: Option<String>,
    pub bitvectors: Option<bool>,
}

impl FileConfig {
    /// Loads `rumur.toml` from `dir` if present; a missing file is not
    /// an error (it simply yields all-`None` defaults), matching the
    /// spec's requirement that ambient tooling never becomes a hard
    /// dependency.
    pub fn load(dir: &Path) -> Result<Self, crate::diagnostics::Diagnostic> {
        let path = dir.join("rumur.toml");
        if !path.exists() {
            return Ok(FileConfig::default());
        }
        let text = std::fs::read_to_string(&path)?;
        toml::from_str(&text)
            .map_err(|e| crate::diagnostics::Diagnostic::io(format!("{}: {e}", path.display())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = std::env::temp_dir();
        let cfg = FileConfig::load(&dir.join("definitely-not-rumur-toml-here")).unwrap();
        assert!(cfg.threads.is_none());
    }

    #[test]
    fn parses_a_minimal_config() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("rumur.toml"), "threads = 4\nsandbox = true\n").unwrap();
        let cfg = FileConfig::load(dir.path()).unwrap();
        assert_eq!(cfg.threads, Some(4));
        assert_eq!(cfg.sandbox, Some(true));
    }
}
