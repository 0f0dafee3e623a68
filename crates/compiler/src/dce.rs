//! Dead code elimination (component D, part 3).
//!
//! Removes `if` branches whose guard folded to a literal `false`,
//! drops empty `for` bodies and empty `put ""`, but leaves detecting a
//! literal-`true` infinite `while` loop to the type checker (it is a
//! compile-time error there, not silently dropped here).

use crate::ast::*;

pub fn dce_stmts(stmts: Vec<Stmt>) -> Vec<Stmt> {
    stmts.into_iter().filter_map(dce_stmt).collect()
}

fn dce_stmt(s: Stmt) -> Option<Stmt> {
    match s {
        Stmt::IfChain { branches, else_branch, loc } => {
            let branches: Vec<(Expr, Vec<Stmt>)> = branches
                .into_iter()
                .filter(|(cond, _)| !matches!(cond, Expr::BoolLit { value: false, .. }))
                .map(|(cond, body)| (cond, dce_stmts(body)))
                .collect();
            let else_branch = dce_stmts(else_branch);
            if branches.is_empty() && else_branch.is_empty() {
                None
            } else if branches.is_empty() {
                // Every guarded branch was dead; only the else survives.
                Some(Stmt::IfChain { branches: vec![(Expr::BoolLit { value: true, loc }, else_branch)], else_branch: Vec::new(), loc })
            } else {
                Some(Stmt::IfChain { branches, else_branch, loc })
            }
        }
        Stmt::For { quantifier, body, loc } => {
            let body = dce_stmts(body);
            if body.is_empty() {
                None
            } else {
                Some(Stmt::For { quantifier, body, loc })
            }
        }
        Stmt::While { guard, body, loc } => Some(Stmt::While { guard, body: dce_stmts(body), loc }),
        Stmt::Alias { bindings, body, loc } => {
            let body = dce_stmts(body);
            if body.is_empty() {
                None
            } else {
                Some(Stmt::Alias { bindings, body, loc })
            }
        }
        Stmt::PutString { text, loc } if text.is_empty() => {
            let _ = loc;
            None
        }
        Stmt::SwitchChain { scrutinee, cases, default, loc } => {
            let cases: Vec<(Vec<Expr>, Vec<Stmt>)> =
                cases.into_iter().map(|(labels, body)| (labels, dce_stmts(body))).collect();
            Some(Stmt::SwitchChain { scrutinee, cases, default: dce_stmts(default), loc })
        }
        other => Some(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rumur_core::SourceLocation;

    fn loc() -> SourceLocation {
        SourceLocation::point(0, 1, 1)
    }

    #[test]
    fn drops_if_branch_with_false_guard() {
        let stmts = vec![Stmt::IfChain {
            branches: vec![(Expr::BoolLit { value: false, loc: loc() }, vec![Stmt::Error { message: "x".into(), loc: loc() }])],
            else_branch: vec![Stmt::PutString { text: "ok".into(), loc: loc() }],
            loc: loc(),
        }];
        let reduced = dce_stmts(stmts);
        match &reduced[0] {
            Stmt::IfChain { branches, .. } => {
                assert_eq!(branches.len(), 1);
                assert!(matches!(branches[0].0, Expr::BoolLit { value: true, .. }));
            }
            _ => panic!("expected an if chain"),
        }
    }

    #[test]
    fn drops_empty_for_loop() {
        let q = Quantifier { name: "i".into(), kind: QuantifierKind::OverType(Type::Boolean), loc: loc() };
        let stmts = vec![Stmt::For { quantifier: q, body: vec![], loc: loc() }];
        assert!(dce_stmts(stmts).is_empty());
    }

    #[test]
    fn drops_empty_put_string() {
        let stmts = vec![Stmt::PutString { text: String::new(), loc: loc() }];
        assert!(dce_stmts(stmts).is_empty());
    }

    #[test]
    fn keeps_nonempty_put_string() {
        let stmts = vec![Stmt::PutString { text: "hi".into(), loc: loc() }];
        assert_eq!(dce_stmts(stmts).len(), 1);
    }
}
