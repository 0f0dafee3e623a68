//! Optional SMT-solver collaboration for unreachable-branch pruning.
//!
//! Spawned as a child process, one query per guard, at most once. A
//! missing solver binary is never fatal: `SmtSolver::probe` caches the
//! result of checking for the configured executable so repeated guard
//! queries don't repeatedly touch the filesystem, mirroring the
//! `OnceLock`-cached external-tool check the teacher uses for its
//! clang version probe.
use std::io::Write as _;
use std::process::{Command, Stdio};
use std::sync::OnceLock;

#[derive(Debug, Clone)]
pub struct SmtConfig {
    pub solver_path: Option<String>,
    pub extra_args: Vec<String>,
    pub prelude: Option<String>,
    pub logic: Option<String>,
    pub bitvectors: bool,
}

impl Default for SmtConfig {
    fn default() -> Self {
        SmtConfig {
            solver_path: None,
            extra_args: Vec::new(),
            prelude: None,
            logic: None,
            bitvectors: false,
        }
    }
}

pub struct SmtSolver {
    config: SmtConfig,
    available: OnceLock<bool>,
}

impl SmtSolver {
    pub fn new(config: SmtConfig) -> Self {
        SmtSolver { config, available: OnceLock::new() }
    }

    fn is_available(&self) -> bool {
        *self.available.get_or_init(|| match &self.config.solver_path {
            None => false,
            Some(path) => Command::new(path)
                .arg("--version")
                .stdin(Stdio::null())
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .status()
                .map(|s| s.success())
                .unwrap_or(false),
        })
    }

    /// Returns `true` if the solver proved the query `unsat` (the
    /// guard is unreachable and may be pruned). Any other outcome,
    /// including solver absence or a non-`unsat` reply, returns
    /// `false`: "do not prune".
    pub fn query_unsat(&self, smt_expr: &str) -> bool {
        if !self.is_available() {
            return false;
        }
        let path = self.config.solver_path.as_ref().expect("checked by is_available");
        let logic = self.config.logic.clone().unwrap_or_else(|| {
            if self.config.bitvectors { "AUFBV".to_string() } else { "AUFLIA".to_string() }
        });
        let mut script = String::new();
        if !logic.is_empty() {
            script.push_str(&format!("(set-logic {logic})\n"));
        }
        if let Some(prelude) = &self.config.prelude {
            script.push_str(prelude);
            script.push('\n');
        }
        script.push_str(smt_expr);
        script.push_str("\n(check-sat)\n");

        let mut child = match Command::new(path)
            .args(&self.config.extra_args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
        {
            Ok(c) => c,
            Err(_) => return false,
        };
        if let Some(stdin) = child.stdin.as_mut() {
            if stdin.write_all(script.as_bytes()).is_err() {
                return false;
            }
        }
        let output = match child.wait_with_output() {
            Ok(o) => o,
            Err(_) => return false,
        };
        String::from_utf8_lossy(&output.stdout).trim() == "unsat"
    }
}

/// Renders an expression as an SMT-LIB s-expression for a
/// `(check-sat)` query. Returns `None` for node kinds the guard
/// pruner has no use translating (quantifiers, user function calls,
/// record/array l-values) rather than guessing at a semantics.
pub fn expr_to_smt_sexpr(e: &crate::ast::Expr) -> Option<String> {
    use crate::ast::{BinOp, Expr};
    match e {
        Expr::IntLit { value, .. } => Some(value.to_string()),
        Expr::BoolLit { value, .. } => Some(value.to_string()),
        Expr::VarRead { path, .. } if path.steps.is_empty() => Some(path.root.clone()),
        Expr::Not { operand, .. } => Some(format!("(not {})", expr_to_smt_sexpr(operand)?)),
        Expr::Bin { op, lhs, rhs, .. } => {
            let l = expr_to_smt_sexpr(lhs)?;
            let r = expr_to_smt_sexpr(rhs)?;
            let sym = match op {
                BinOp::Add => "+",
                BinOp::Sub => "-",
                BinOp::Mul => "*",
                BinOp::Div => "div",
                BinOp::Mod => "mod",
                BinOp::And => "and",
                BinOp::Or => "or",
                BinOp::Lt => "<",
                BinOp::Le => "<=",
                BinOp::Gt => ">",
                BinOp::Ge => ">=",
                BinOp::Eq | BinOp::BoolEq | BinOp::IntEq => "=",
                BinOp::Neq | BinOp::BoolNeq | BinOp::IntNeq => return Some(format!("(not (= {l} {r}))")),
                BinOp::Implies => "=>",
            };
            Some(format!("({sym} {l} {r})"))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn translates_simple_arithmetic_guard() {
        use crate::ast::{BinOp, Expr, LValue};
        use rumur_core::SourceLocation;
        let loc = SourceLocation::point(0, 1, 1);
        let e = Expr::Bin {
            op: BinOp::Lt,
            lhs: Box::new(Expr::VarRead { path: LValue { root: "x".into(), steps: vec![], loc }, loc }),
            rhs: Box::new(Expr::IntLit { value: 0, loc }),
            loc,
        };
        assert_eq!(expr_to_smt_sexpr(&e).unwrap(), "(< x 0)");
    }

    #[test]
    fn missing_solver_path_never_prunes() {
        let solver = SmtSolver::new(SmtConfig::default());
        assert!(!solver.query_unsat("(assert false)"));
    }

    #[test]
    fn nonexistent_solver_binary_is_treated_as_absent() {
        let solver = SmtSolver::new(SmtConfig {
            solver_path: Some("/definitely/not/a/real/solver-binary".to_string()),
            ..SmtConfig::default()
        });
        assert!(!solver.query_unsat("(assert false)"));
    }
}
