//! `rumur`: compiles a Murphi finite-state specification into a
//! standalone explicit-state model checker.
//!
//! The pipeline mirrors §2 of the design: lexer/parser produce an
//! untyped-but-structured [`ast::Model`], the type checker binds
//! identifiers and assigns every state variable a bit slot, the
//! simplifier/strength-reducer/DCE passes narrow the IR to the set the
//! code generator actually has to handle, and [`codegen`] emits a Rust
//! source module that links against `rumur-runtime`.

pub mod ast;
pub mod codegen;
pub mod config;
pub mod dce;
pub mod diagnostics;
pub mod drivers;
pub mod layout;
pub mod lexer;
pub mod parser;
pub mod scope;
pub mod simplify;
pub mod smt;
pub mod strength_reduce;
pub mod typecheck;

use ast::{Model, Rule, Type};
use diagnostics::Result;
use scope::{Binding, Storage};
use smt::SmtSolver;
use typecheck::TypeChecker;

/// The fully resolved, simplified, and laid-out model handed to the
/// code generator and to the alternate drivers (§4.H).
pub struct CompiledModel {
    pub model: Model,
    pub checker: TypeChecker,
    /// Human-readable debug trace emitted by passes that the `--debug`
    /// flag wants surfaced (record-reordering notices, SMT prune
    /// decisions). Empty unless `debug` was requested.
    pub debug_log: Vec<String>,
}

impl CompiledModel {
    pub fn total_state_bits(&self) -> u32 {
        self.checker.scopes.total_state_bits()
    }

    /// The resolved type and `(bit_offset, bit_width)` of a top-level
    /// state variable. `None` if `name` is not a state variable (the
    /// state scope is the only one still open once compilation has
    /// finished).
    pub fn state_var(&self, name: &str) -> Option<(Type, u32, u32)> {
        match self.checker.scopes.lookup_value(name)? {
            Binding::Var(sym) => match sym.storage {
                Storage::StateSlot { bit_offset, bit_width } => {
                    Some((sym.ty.clone(), bit_offset, bit_width))
                }
                _ => None,
            },
            Binding::Const { .. } => None,
        }
    }

    pub fn uses_undefined(&self) -> bool {
        self.checker.undefined_referenced.values().any(|v| *v)
    }
}

/// Runs the full front end (components A-E) over `source`, producing a
/// [`CompiledModel`] ready for [`codegen::generate`] or a driver in
/// [`drivers`].
pub fn compile_source(
    source: &str,
    file: u32,
    debug: bool,
    smt_config: Option<smt::SmtConfig>,
) -> Result<CompiledModel> {
    let (tokens, _comments) = lexer::tokenize(source, file)?;
    let mut model = parser::parse(tokens, file)?;

    let mut checker = TypeChecker::new();
    checker.check_model(&mut model)?;
    resolve_equalities(&mut checker, &mut model);

    let mut debug_log = Vec::new();
    lower_invariants(&mut model);
    simplify::fold_model(&mut model);

    let solver = smt_config.map(SmtSolver::new);
    reduce_model(&mut model, solver.as_ref(), &mut debug_log);
    dce_model(&mut model);

    if debug {
        record_reorder_diagnostics(&checker, &model, &mut debug_log);
    }

    Ok(CompiledModel { model, checker, debug_log })
}

/// Rewrites every `Eq`/`Neq` binary node into the spec-mandated
/// `BoolEq`/`BoolNeq`/`IntEq`/`IntNeq` split, based on the operand
/// type re-inferred at each node (the checker already proved both
/// operands share a type, so only the left operand needs inspecting).
fn resolve_equalities(checker: &mut TypeChecker, model: &mut Model) {
    for r in model.rules.iter_mut() {
        resolve_equalities_rule(checker, r);
    }
    for c in model.callables.iter_mut() {
        for s in c.body.iter_mut() {
            resolve_equalities_stmt(checker, s);
        }
    }
}

fn resolve_equalities_rule(checker: &mut TypeChecker, r: &mut Rule) {
    match r {
        Rule::Startstate { body, .. } | Rule::Simple { body, .. } => {
            for s in body.iter_mut() {
                resolve_equalities_stmt(checker, s);
            }
        }
        Rule::Invariant { predicate, .. }
        | Rule::Liveness { predicate, .. }
        | Rule::Cover { predicate, .. } => resolve_equalities_expr(checker, predicate),
        Rule::RuleSet { rules, .. } | Rule::AliasRule { rules, .. } => {
            for inner in rules.iter_mut() {
                resolve_equalities_rule(checker, inner);
            }
        }
    }
    if let Rule::Simple { guard: Some(g), .. } = r {
        resolve_equalities_expr(checker, g);
    }
}

fn resolve_equalities_stmt(checker: &mut TypeChecker, s: &mut ast::Stmt) {
    use ast::Stmt::*;
    match s {
        Assign { value, .. } | PutExpr { value, .. } => resolve_equalities_expr(checker, value),
        IfChain { branches, else_branch, .. } => {
            for (cond, body) in branches.iter_mut() {
                resolve_equalities_expr(checker, cond);
                for s in body.iter_mut() {
                    resolve_equalities_stmt(checker, s);
                }
            }
            for s in else_branch.iter_mut() {
                resolve_equalities_stmt(checker, s);
            }
        }
        SwitchChain { scrutinee, cases, default, .. } => {
            resolve_equalities_expr(checker, scrutinee);
            for (labels, body) in cases.iter_mut() {
                for l in labels.iter_mut() {
                    resolve_equalities_expr(checker, l);
                }
                for s in body.iter_mut() {
                    resolve_equalities_stmt(checker, s);
                }
            }
            for s in default.iter_mut() {
                resolve_equalities_stmt(checker, s);
            }
        }
        For { body, .. } | While { body, .. } | Alias { body, .. } => {
            for s in body.iter_mut() {
                resolve_equalities_stmt(checker, s);
            }
        }
        ProcCall { args, .. } => {
            for a in args.iter_mut() {
                resolve_equalities_expr(checker, a);
            }
        }
        Assert { cond, .. } => resolve_equalities_expr(checker, cond),
        Return { value: Some(v), .. } => resolve_equalities_expr(checker, v),
        Clear { .. } | Error { .. } | PutString { .. } | Return { value: None, .. } => {}
    }
}

fn resolve_equalities_expr(checker: &mut TypeChecker, e: &mut ast::Expr) {
    use ast::{BinOp, Expr};
    match e {
        Expr::Bin { op, lhs, rhs, .. } => {
            resolve_equalities_expr(checker, lhs);
            resolve_equalities_expr(checker, rhs);
            if matches!(op, BinOp::Eq | BinOp::Neq) {
                let lhs_is_boolean = checker.type_of(lhs).map(|t| t == Type::Boolean).unwrap_or(false);
                typecheck::split_equality_nodes(e, lhs_is_boolean);
            }
        }
        Expr::Not { operand, .. } => resolve_equalities_expr(checker, operand),
        Expr::Ternary { cond, then_branch, else_branch, .. } => {
            resolve_equalities_expr(checker, cond);
            resolve_equalities_expr(checker, then_branch);
            resolve_equalities_expr(checker, else_branch);
        }
        Expr::Forall { body, .. } | Expr::Exists { body, .. } => resolve_equalities_expr(checker, body),
        Expr::FuncCall { args, .. } => {
            for a in args.iter_mut() {
                resolve_equalities_expr(checker, a);
            }
        }
        Expr::IntLit { .. } | Expr::BoolLit { .. } | Expr::EnumLit { .. } | Expr::VarRead { .. } | Expr::IsUndefined { .. } => {}
    }
}

/// `invariant "n" P` becomes `rule "n" when !P do error(...) end`
/// (§4.D). `liveness`/`cover` have no such rewrite and are left for
/// the code generator to handle as distinct rule kinds.
fn lower_invariants(model: &mut Model) {
    let mut lowered = Vec::with_capacity(model.rules.len());
    for r in model.rules.drain(..) {
        lowered.push(lower_invariants_rule(r));
    }
    model.rules = lowered;
}

fn lower_invariants_rule(r: Rule) -> Rule {
    match r {
        Rule::Invariant { name, predicate, loc } => strength_reduce::invariant_to_rule(name, predicate, loc),
        Rule::RuleSet { quantifiers, rules, loc } => Rule::RuleSet {
            quantifiers,
            rules: rules.into_iter().map(lower_invariants_rule).collect(),
            loc,
        },
        Rule::AliasRule { bindings, rules, loc } => Rule::AliasRule {
            bindings,
            rules: rules.into_iter().map(lower_invariants_rule).collect(),
            loc,
        },
        other => other,
    }
}

fn reduce_model(model: &mut Model, solver: Option<&SmtSolver>, debug_log: &mut Vec<String>) {
    let mut rules = Vec::with_capacity(model.rules.len());
    for r in model.rules.drain(..) {
        rules.push(reduce_rule(r, solver, debug_log));
    }
    model.rules = rules;
    for c in model.callables.iter_mut() {
        c.body = std::mem::take(&mut c.body).into_iter().flat_map(strength_reduce::reduce_stmt).collect();
    }
}

fn reduce_rule(r: Rule, solver: Option<&SmtSolver>, debug_log: &mut Vec<String>) -> Rule {
    match r {
        Rule::Simple { name, guard, decls, body, loc } => {
            let guard = guard.map(strength_reduce::reduce_expr).map(|g| smt_prune_guard(g, solver, debug_log));
            Rule::Simple {
                name,
                guard,
                decls,
                body: body.into_iter().flat_map(strength_reduce::reduce_stmt).collect(),
                loc,
            }
        }
        Rule::Startstate { name, decls, body, loc } => Rule::Startstate {
            name,
            decls,
            body: body.into_iter().flat_map(strength_reduce::reduce_stmt).collect(),
            loc,
        },
        Rule::Liveness { name, predicate, loc } => {
            Rule::Liveness { name, predicate: strength_reduce::reduce_expr(predicate), loc }
        }
        Rule::Cover { name, predicate, loc } => {
            Rule::Cover { name, predicate: strength_reduce::reduce_expr(predicate), loc }
        }
        Rule::Invariant { .. } => unreachable!("invariants are lowered before strength reduction"),
        Rule::RuleSet { quantifiers, rules, loc } => Rule::RuleSet {
            quantifiers,
            rules: rules.into_iter().map(|r| reduce_rule(r, solver, debug_log)).collect(),
            loc,
        },
        Rule::AliasRule { bindings, rules, loc } => Rule::AliasRule {
            bindings,
            rules: rules.into_iter().map(|r| reduce_rule(r, solver, debug_log)).collect(),
            loc,
        },
    }
}

/// Sends a guard to the optional SMT solver at most once (§4.D); an
/// `unsat` reply replaces the guard with a literal `false` so the
/// dead-code-elimination pass can drop the rule body entirely.
fn smt_prune_guard(guard: ast::Expr, solver: Option<&SmtSolver>, debug_log: &mut Vec<String>) -> ast::Expr {
    let Some(solver) = solver else { return guard };
    let Some(query) = smt::expr_to_smt_sexpr(&guard) else { return guard };
    if solver.query_unsat(&format!("(assert {query})")) {
        debug_log.push(format!("smt: pruned unreachable guard `{query}`"));
        ast::Expr::BoolLit { value: false, loc: guard.loc() }
    } else {
        guard
    }
}

fn dce_model(model: &mut Model) {
    for r in model.rules.iter_mut() {
        dce_rule(r);
    }
    for c in model.callables.iter_mut() {
        c.body = dce::dce_stmts(std::mem::take(&mut c.body));
    }
}

fn dce_rule(r: &mut Rule) {
    match r {
        Rule::Simple { body, .. } | Rule::Startstate { body, .. } => {
            *body = dce::dce_stmts(std::mem::take(body));
        }
        Rule::RuleSet { rules, .. } | Rule::AliasRule { rules, .. } => {
            for inner in rules.iter_mut() {
                dce_rule(inner);
            }
        }
        Rule::Liveness { .. } | Rule::Cover { .. } | Rule::Invariant { .. } => {}
    }
}

/// Walks every top-level variable's *resolved* type and logs a
/// `sorted fields {..} -> {..}` line once per *occurrence* (§4.E's
/// test: two variables of the same named record type are each an
/// occurrence, so the message is reported twice, not once for the
/// type declaration plus once per variable).
fn record_reorder_diagnostics(checker: &TypeChecker, model: &Model, debug_log: &mut Vec<String>) {
    for v in &model.vars {
        if let Ok(resolved) = checker.resolve_type(&v.ty) {
            record_reorder_diagnostics_type(&resolved, debug_log);
        }
    }
}

fn record_reorder_diagnostics_type(ty: &Type, debug_log: &mut Vec<String>) {
    match ty {
        Type::Record { fields } => {
            let (reordered, changed) = layout::reorder_record_fields(fields);
            if changed {
                let before: Vec<&str> = fields.iter().map(|(n, _)| n.as_str()).collect();
                let after: Vec<&str> = reordered.iter().map(|(n, _)| n.as_str()).collect();
                debug_log.push(format!(
                    "sorted fields {{{}}} -> {{{}}}",
                    before.join(", "),
                    after.join(", ")
                ));
            }
            for (_, field_ty) in fields {
                record_reorder_diagnostics_type(field_ty, debug_log);
            }
        }
        Type::Array { element, .. } => record_reorder_diagnostics_type(element, debug_log),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compiles_the_toy_counter_model() {
        let src = "var x: 0..10;\nstartstate begin x := 0; end;\nrule \"inc\" x < 10 ==> begin x := x + 1; end;\n";
        let compiled = compile_source(src, 0, false, None).unwrap();
        assert_eq!(compiled.model.rules.len(), 2);
        let (_, offset, width) = compiled.state_var("x").unwrap();
        assert_eq!(offset, 0);
        assert_eq!(width, 4); // ceil(log2(11))
    }

    #[test]
    fn invariant_lowers_to_a_guarded_error_rule() {
        let src = "var x: 0..10;\nstartstate begin x := 0; end;\nrule \"inc\" x < 10 ==> begin x := x + 1; end;\ninvariant \"bounded\" x <= 5;\n";
        let compiled = compile_source(src, 0, false, None).unwrap();
        assert_eq!(compiled.model.rules.len(), 3);
        assert!(matches!(compiled.model.rules[2], Rule::Simple { .. }));
    }

    #[test]
    fn isundefined_grows_the_referenced_variables_width() {
        let src = "var x: 0..3;\nstartstate begin x := 0; end;\nrule \"r\" begin if isundefined(x) then x := 0; end; end;\n";
        let compiled = compile_source(src, 0, false, None).unwrap();
        let (_, _, width) = compiled.state_var("x").unwrap();
        // cardinality 4 + undefined sentinel = 5 values -> 3 bits.
        assert_eq!(width, 3);
    }

    #[test]
    fn debug_mode_reports_record_reordering_once_per_occurrence() {
        let src = "type r: record a: boolean; b: scalarset(4); c: boolean; end;\nvar v1: r;\nvar v2: r;\nstartstate begin end;\n";
        let compiled = compile_source(src, 0, true, None).unwrap();
        let hits = compiled.debug_log.iter().filter(|l| l.starts_with("sorted fields")).count();
        assert_eq!(hits, 2);
    }
}
