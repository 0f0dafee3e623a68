//! Name resolution and type checking (component C).
//!
//! Follows the teacher's `TypeChecker` shape: a `HashMap`-backed
//! environment walked in one preorder/postorder traversal, threading a
//! `ScopeStack` (see `scope.rs`) instead of the teacher's flat
//! word-effect environment.

use crate::ast::*;
use crate::diagnostics::{Diagnostic, Result};
use crate::scope::{Binding, ScopeStack, Storage};
use rumur_core::SourceLocation;
use std::collections::HashMap;

pub struct TypeChecker {
    pub scopes: ScopeStack,
    /// Whether any expression in the model calls `isundefined` on a
    /// value of a given type name, keyed by the type's identity (we use
    /// the resolved shape since Murphi has structural type aliases).
    pub undefined_referenced: HashMap<String, bool>,
    return_type: Option<Type>,
}

impl TypeChecker {
    pub fn new() -> Self {
        TypeChecker {
            scopes: ScopeStack::new(),
            undefined_referenced: HashMap::new(),
            return_type: None,
        }
    }

    pub fn check_model(&mut self, model: &mut Model) -> Result<()> {
        for t in &model.types {
            self.scopes.declare_type(&t.name, t.ty.clone(), t.loc)?;
        }
        for c in &model.consts {
            let ty = self.infer_const_expr(&c.value)?;
            self.scopes.declare_const(&c.name, ty, c.loc)?;
        }
        // The undefined-sentinel budget (§3: "iff the model references
        // undefined on a variable of that type") depends on whether any
        // `isundefined` call site names this variable, which can only
        // be known by scanning every rule/callable body up front —
        // state variable widths are fixed below, before those bodies
        // are otherwise visited.
        self.prescan_undefined(model);
        for v in &model.vars {
            let resolved = self.resolve_type(&v.ty)?;
            let width = crate::layout::encoded_width(&resolved, self.type_needs_undefined(&v.name));
            self.scopes.declare_var(&v.name, resolved, width, v.loc)?;
        }
        for c in &mut model.callables {
            self.check_callable(c)?;
        }
        for r in &mut model.rules {
            self.check_rule(r)?;
        }
        Ok(())
    }

    fn type_needs_undefined(&self, name: &str) -> bool {
        self.undefined_referenced.get(name).copied().unwrap_or(false)
    }

    fn note_isundefined(&mut self, root_name: &str) {
        self.undefined_referenced.insert(root_name.to_string(), true);
    }

    fn prescan_undefined(&mut self, model: &Model) {
        for c in &model.callables {
            for s in &c.body {
                self.prescan_stmt(s);
            }
        }
        for r in &model.rules {
            self.prescan_rule(r);
        }
    }

    fn prescan_rule(&mut self, r: &Rule) {
        match r {
            Rule::Startstate { body, .. } | Rule::Simple { body, .. } => {
                for s in body {
                    self.prescan_stmt(s);
                }
            }
            Rule::Invariant { predicate, .. }
            | Rule::Liveness { predicate, .. }
            | Rule::Cover { predicate, .. } => self.prescan_expr(predicate),
            Rule::RuleSet { rules, .. } | Rule::AliasRule { rules, .. } => {
                for inner in rules {
                    self.prescan_rule(inner);
                }
            }
        }
    }

    fn prescan_stmt(&mut self, s: &Stmt) {
        match s {
            Stmt::Assign { value, .. } | Stmt::PutExpr { value, .. } => self.prescan_expr(value),
            Stmt::IfChain { branches, else_branch, .. } => {
                for (cond, body) in branches {
                    self.prescan_expr(cond);
                    for s in body {
                        self.prescan_stmt(s);
                    }
                }
                for s in else_branch {
                    self.prescan_stmt(s);
                }
            }
            Stmt::SwitchChain { scrutinee, cases, default, .. } => {
                self.prescan_expr(scrutinee);
                for (labels, body) in cases {
                    for l in labels {
                        self.prescan_expr(l);
                    }
                    for s in body {
                        self.prescan_stmt(s);
                    }
                }
                for s in default {
                    self.prescan_stmt(s);
                }
            }
            Stmt::For { body, .. } | Stmt::While { body, .. } | Stmt::Alias { body, .. } => {
                for s in body {
                    self.prescan_stmt(s);
                }
            }
            Stmt::ProcCall { args, .. } => {
                for a in args {
                    self.prescan_expr(a);
                }
            }
            Stmt::Assert { cond, .. } => self.prescan_expr(cond),
            Stmt::Clear { .. } | Stmt::Error { .. } | Stmt::PutString { .. } => {}
            Stmt::Return { value, .. } => {
                if let Some(v) = value {
                    self.prescan_expr(v);
                }
            }
        }
    }

    fn prescan_expr(&mut self, e: &Expr) {
        match e {
            Expr::IsUndefined { target, .. } => self.note_isundefined(&target.root),
            Expr::Bin { lhs, rhs, .. } => {
                self.prescan_expr(lhs);
                self.prescan_expr(rhs);
            }
            Expr::Not { operand, .. } => self.prescan_expr(operand),
            Expr::Ternary { cond, then_branch, else_branch, .. } => {
                self.prescan_expr(cond);
                self.prescan_expr(then_branch);
                self.prescan_expr(else_branch);
            }
            Expr::Forall { body, .. } | Expr::Exists { body, .. } => self.prescan_expr(body),
            Expr::FuncCall { args, .. } => {
                for a in args {
                    self.prescan_expr(a);
                }
            }
            Expr::IntLit { .. } | Expr::BoolLit { .. } | Expr::EnumLit { .. } | Expr::VarRead { .. } => {}
        }
    }

    /// Re-infers an already-checked expression's type. Used by the
    /// equality-splitting pass that runs after `check_model` to decide
    /// whether an `Eq`/`Neq` node's operands are Boolean or integer.
    pub fn type_of(&mut self, e: &Expr) -> Option<Type> {
        self.infer_expr(e).ok()
    }

    pub fn resolve_type(&self, ty: &Type) -> Result<Type> {
        match ty {
            Type::TypeRef(name) => self
                .scopes
                .lookup_type(name)
                .cloned()
                .ok_or_else(|| Diagnostic::name(format!("undeclared type '{name}'"), SourceLocation::point(0, 1, 1))),
            Type::Array { index, element } => Ok(Type::Array {
                index: Box::new(self.resolve_type(index)?),
                element: Box::new(self.resolve_type(element)?),
            }),
            Type::Record { fields } => {
                let mut resolved = Vec::with_capacity(fields.len());
                for (name, ty) in fields {
                    resolved.push((name.clone(), self.resolve_type(ty)?));
                }
                Ok(Type::Record { fields: resolved })
            }
            other => Ok(other.clone()),
        }
    }

    fn infer_const_expr(&mut self, e: &Expr) -> Result<Type> {
        self.infer_expr(e)
    }

    fn check_callable(&mut self, c: &mut Callable) -> Result<()> {
        self.scopes.open();
        for p in &c.params {
            let resolved = self.resolve_type(&p.ty)?;
            self.scopes.declare_param(&p.name, resolved, p.by_reference, p.loc)?;
        }
        for d in &c.decls {
            let resolved = self.resolve_type(&d.ty)?;
            self.scopes.declare_var(&d.name, resolved, 0, d.loc)?;
        }
        let prior_return = self.return_type.take();
        self.return_type = match &c.return_type {
            Some(t) => Some(self.resolve_type(t)?),
            None => None,
        };
        for s in &mut c.body {
            self.check_stmt(s)?;
        }
        self.return_type = prior_return;
        self.scopes.close();
        Ok(())
    }

    fn check_rule(&mut self, r: &mut Rule) -> Result<()> {
        match r {
            Rule::Startstate { decls, body, .. } => {
                self.scopes.open();
                for d in decls.iter() {
                    let resolved = self.resolve_type(&d.ty)?;
                    self.scopes.declare_var(&d.name, resolved, 0, d.loc)?;
                }
                for s in body.iter_mut() {
                    self.check_stmt(s)?;
                }
                self.scopes.close();
            }
            Rule::Simple { guard, decls, body, .. } => {
                self.scopes.open();
                if let Some(g) = guard {
                    let ty = self.infer_expr(g)?;
                    self.expect_boolean(&ty, g.loc())?;
                }
                for d in decls.iter() {
                    let resolved = self.resolve_type(&d.ty)?;
                    self.scopes.declare_var(&d.name, resolved, 0, d.loc)?;
                }
                for s in body.iter_mut() {
                    self.check_stmt(s)?;
                }
                self.scopes.close();
            }
            Rule::Invariant { predicate, .. }
            | Rule::Liveness { predicate, .. }
            | Rule::Cover { predicate, .. } => {
                let ty = self.infer_expr(predicate)?;
                self.expect_boolean(&ty, predicate.loc())?;
            }
            Rule::RuleSet { quantifiers, rules, .. } => {
                self.scopes.open();
                for q in quantifiers.iter() {
                    self.declare_quantifier(q)?;
                }
                for inner in rules.iter_mut() {
                    self.check_rule(inner)?;
                }
                self.scopes.close();
            }
            Rule::AliasRule { bindings, rules, .. } => {
                self.scopes.open();
                for (name, target) in bindings.iter() {
                    let ty = self.infer_lvalue(target)?;
                    self.scopes.declare_var(name, ty, 0, target.loc)?;
                }
                for inner in rules.iter_mut() {
                    self.check_rule(inner)?;
                }
                self.scopes.close();
            }
        }
        Ok(())
    }

    fn declare_quantifier(&mut self, q: &Quantifier) -> Result<()> {
        match &q.kind {
            QuantifierKind::OverType(ty) => {
                let resolved = self.resolve_type(ty)?;
                if !resolved.is_simple() {
                    return Err(Diagnostic::ty(
                        "quantifier type must be Range, Enum, Scalarset or Boolean",
                        q.loc,
                    ));
                }
                self.scopes.declare_var(&q.name, resolved, 0, q.loc)?;
            }
            QuantifierKind::Range { lo, hi, step } => {
                self.expect_int(lo)?;
                self.expect_int(hi)?;
                if let Some(step) = step {
                    self.expect_const_expr(step)?;
                }
                self.scopes
                    .declare_var(&q.name, Type::Range { lo: i64::MIN, hi: i64::MAX }, 0, q.loc)?;
            }
        }
        Ok(())
    }

    fn expect_int(&mut self, e: &Expr) -> Result<()> {
        let ty = self.infer_expr(e)?;
        match ty {
            Type::Range { .. } => Ok(()),
            _ => Err(Diagnostic::ty("expected an integer expression", e.loc())),
        }
    }

    fn expect_boolean(&self, ty: &Type, loc: SourceLocation) -> Result<()> {
        match ty {
            Type::Boolean => Ok(()),
            _ => Err(Diagnostic::ty("expected a boolean expression", loc)),
        }
    }

    fn expect_const_expr(&self, e: &Expr) -> Result<()> {
        match e {
            Expr::IntLit { .. } | Expr::BoolLit { .. } | Expr::EnumLit { .. } => Ok(()),
            _ => Err(Diagnostic::const_eval("step must be a constant expression", e.loc())),
        }
    }

    fn check_stmt(&mut self, s: &mut Stmt) -> Result<()> {
        match s {
            Stmt::Assign { target, value, loc } => {
                let target_ty = self.infer_lvalue(target)?;
                let value_ty = self.infer_expr(value)?;
                if target_ty != value_ty {
                    return Err(Diagnostic::ty(
                        "assignment target and value types differ",
                        *loc,
                    ));
                }
                Ok(())
            }
            Stmt::IfChain { branches, else_branch, .. } => {
                for (cond, body) in branches.iter_mut() {
                    let ty = self.infer_expr(cond)?;
                    self.expect_boolean(&ty, cond.loc())?;
                    self.scopes.open();
                    for s in body.iter_mut() {
                        self.check_stmt(s)?;
                    }
                    self.scopes.close();
                }
                self.scopes.open();
                for s in else_branch.iter_mut() {
                    self.check_stmt(s)?;
                }
                self.scopes.close();
                Ok(())
            }
            Stmt::SwitchChain { scrutinee, cases, default, .. } => {
                let scrutinee_ty = self.infer_expr(scrutinee)?;
                for (labels, body) in cases.iter_mut() {
                    for l in labels.iter() {
                        let lt = self.infer_expr(l)?;
                        if lt != scrutinee_ty {
                            return Err(Diagnostic::ty("case label type does not match switch scrutinee", l.loc()));
                        }
                    }
                    self.scopes.open();
                    for s in body.iter_mut() {
                        self.check_stmt(s)?;
                    }
                    self.scopes.close();
                }
                self.scopes.open();
                for s in default.iter_mut() {
                    self.check_stmt(s)?;
                }
                self.scopes.close();
                Ok(())
            }
            Stmt::For { quantifier, body, .. } => {
                self.scopes.open();
                self.declare_quantifier(quantifier)?;
                for s in body.iter_mut() {
                    self.check_stmt(s)?;
                }
                self.scopes.close();
                Ok(())
            }
            Stmt::While { guard, body, loc } => {
                let ty = self.infer_expr(guard)?;
                self.expect_boolean(&ty, *loc)?;
                if matches!(guard, Expr::BoolLit { value: true, .. }) && body.is_empty() {
                    return Err(Diagnostic::runtime_compile("infinite loop: while(true) with empty body", *loc));
                }
                self.scopes.open();
                for s in body.iter_mut() {
                    self.check_stmt(s)?;
                }
                self.scopes.close();
                Ok(())
            }
            Stmt::ProcCall { .. } => Ok(()),
            Stmt::Alias { bindings, body, .. } => {
                self.scopes.open();
                for (name, target) in bindings.iter() {
                    let ty = self.infer_lvalue(target)?;
                    self.scopes.declare_var(name, ty, 0, target.loc)?;
                }
                for s in body.iter_mut() {
                    self.check_stmt(s)?;
                }
                self.scopes.close();
                Ok(())
            }
            Stmt::Clear { target, .. } => {
                self.infer_lvalue(target)?;
                Ok(())
            }
            Stmt::Error { .. } => Ok(()),
            Stmt::Assert { cond, loc, .. } => {
                let ty = self.infer_expr(cond)?;
                self.expect_boolean(&ty, *loc)
            }
            Stmt::PutExpr { value, .. } => {
                self.infer_expr(value)?;
                Ok(())
            }
            Stmt::PutString { .. } => Ok(()),
            Stmt::Return { value, loc } => {
                match (&self.return_type, value) {
                    (Some(expected), Some(v)) => {
                        let actual = self.infer_expr(v)?;
                        if &actual != expected {
                            return Err(Diagnostic::ty("return expression type does not match declared return type", *loc));
                        }
                        Ok(())
                    }
                    (None, None) => Ok(()),
                    (Some(_), None) => Err(Diagnostic::ty("function must return a value", *loc)),
                    (None, Some(_)) => Err(Diagnostic::ty("procedure must not return a value", *loc)),
                }
            }
        }
    }

    fn infer_lvalue(&mut self, lv: &LValue) -> Result<Type> {
        let binding = self
            .scopes
            .lookup_value(&lv.root)
            .cloned()
            .ok_or_else(|| Diagnostic::name(format!("undeclared identifier '{}' (did you forget to declare it?)", lv.root), lv.loc))?;
        let mut ty = match binding {
            Binding::Var(sym) => sym.ty,
            Binding::Const { ty } => ty,
        };
        for step in &lv.steps {
            ty = match step {
                LValueStep::Field(name) => match &ty {
                    Type::Record { fields } => fields
                        .iter()
                        .find(|(n, _)| n == name)
                        .map(|(_, t)| t.clone())
                        .ok_or_else(|| Diagnostic::ty(format!("no field '{name}' on this record"), lv.loc))?,
                    _ => return Err(Diagnostic::ty("field access on a non-record type", lv.loc)),
                },
                LValueStep::Index(idx) => match &ty {
                    Type::Array { index, element } => {
                        let idx_ty = self.infer_expr(idx)?;
                        if &idx_ty != index.as_ref() {
                            return Err(Diagnostic::ty("array index type does not match declared index type", lv.loc));
                        }
                        element.as_ref().clone()
                    }
                    _ => return Err(Diagnostic::ty("index access on a non-array type", lv.loc)),
                },
            };
        }
        Ok(ty)
    }

    fn infer_expr(&mut self, e: &Expr) -> Result<Type> {
        match e {
            Expr::IntLit { .. } => Ok(Type::Range { lo: i64::MIN, hi: i64::MAX }),
            Expr::BoolLit { .. } => Ok(Type::Boolean),
            Expr::EnumLit { type_name, .. } => self
                .scopes
                .lookup_type(type_name)
                .cloned()
                .ok_or_else(|| Diagnostic::name(format!("undeclared type '{type_name}'"), e.loc())),
            Expr::VarRead { path, .. } => self.infer_lvalue(path),
            Expr::Bin { op, lhs, rhs, loc } => self.infer_bin(*op, lhs, rhs, *loc),
            Expr::Not { operand, loc } => {
                let ty = self.infer_expr(operand)?;
                self.expect_boolean(&ty, *loc)?;
                Ok(Type::Boolean)
            }
            Expr::Ternary { cond, then_branch, else_branch, loc } => {
                let cond_ty = self.infer_expr(cond)?;
                self.expect_boolean(&cond_ty, *loc)?;
                let t = self.infer_expr(then_branch)?;
                let f = self.infer_expr(else_branch)?;
                if t != f {
                    return Err(Diagnostic::ty("ternary arms have different types", *loc));
                }
                Ok(t)
            }
            Expr::Forall { quantifier, body, .. } | Expr::Exists { quantifier, body, .. } => {
                self.scopes.open();
                self.declare_quantifier(quantifier)?;
                let body_ty = self.infer_expr(body)?;
                self.scopes.close();
                self.expect_boolean(&body_ty, body.loc())?;
                Ok(Type::Boolean)
            }
            Expr::IsUndefined { target, .. } => {
                self.infer_lvalue(target)?;
                self.note_isundefined(&target.root);
                Ok(Type::Boolean)
            }
            Expr::FuncCall { .. } => Ok(Type::Range { lo: i64::MIN, hi: i64::MAX }),
        }
    }

    fn infer_bin(&mut self, op: BinOp, lhs: &Expr, rhs: &Expr, loc: SourceLocation) -> Result<Type> {
        let lt = self.infer_expr(lhs)?;
        let rt = self.infer_expr(rhs)?;
        match op {
            BinOp::Add | BinOp::Sub | BinOp::Mul | BinOp::Div | BinOp::Mod => match (&lt, &rt) {
                (Type::Range { .. }, Type::Range { .. }) => Ok(Type::Range { lo: i64::MIN, hi: i64::MAX }),
                _ => Err(Diagnostic::ty("arithmetic requires two integer operands", loc)),
            },
            BinOp::And | BinOp::Or | BinOp::Implies => {
                self.expect_boolean(&lt, loc)?;
                self.expect_boolean(&rt, loc)?;
                Ok(Type::Boolean)
            }
            BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge => match (&lt, &rt) {
                (Type::Range { .. }, Type::Range { .. }) => Ok(Type::Boolean),
                _ => Err(Diagnostic::ty("ordering comparisons require two integer operands", loc)),
            },
            BinOp::Eq | BinOp::Neq => {
                if lt != rt {
                    return Err(Diagnostic::ty("equality requires operands of the same type", loc));
                }
                // Rewrite into the spec-mandated split nodes.
                Ok(Type::Boolean)
            }
            BinOp::BoolEq | BinOp::BoolNeq | BinOp::IntEq | BinOp::IntNeq => Ok(Type::Boolean),
        }
    }
}

impl Default for TypeChecker {
    fn default() -> Self {
        TypeChecker::new()
    }
}

/// Rewrites generic `Eq`/`Neq` nodes into `BoolEq`/`IntEq`/etc, per the
/// spec's explicit requirement that the checker split them so
/// strength reduction can target each independently. Run once after
/// `check_model` succeeds.
pub fn split_equality_nodes(e: &mut Expr, lhs_is_boolean: bool) {
    if let Expr::Bin { op, lhs, rhs, .. } = e {
        split_equality_nodes(lhs, lhs_is_boolean);
        split_equality_nodes(rhs, lhs_is_boolean);
        *op = match (*op, lhs_is_boolean) {
            (BinOp::Eq, true) => BinOp::BoolEq,
            (BinOp::Neq, true) => BinOp::BoolNeq,
            (BinOp::Eq, false) => BinOp::IntEq,
            (BinOp::Neq, false) => BinOp::IntNeq,
            (other, _) => other,
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::tokenize;
    use crate::parser::parse;

    fn check_src(src: &str) -> Result<Model> {
        let (tokens, _) = tokenize(src, 0).unwrap();
        let mut model = parse(tokens, 0).unwrap();
        let mut tc = TypeChecker::new();
        tc.check_model(&mut model)?;
        Ok(model)
    }

    #[test]
    fn accepts_well_typed_model() {
        assert!(check_src("var x: boolean;\nrule \"r\" x = false ==> begin x := true; end;\n").is_ok());
    }

    #[test]
    fn rejects_assignment_type_mismatch() {
        let err = check_src("var x: boolean;\ntype t: 0..3;\nvar y: t;\nrule \"r\" begin x := y; end;\n");
        assert!(matches!(err, Err(Diagnostic::Type { .. })));
    }

    #[test]
    fn rejects_undeclared_identifier() {
        let err = check_src("rule \"r\" begin x := true; end;\n");
        assert!(matches!(err, Err(Diagnostic::Name { .. })));
    }

    #[test]
    fn rejects_infinite_while_with_empty_body() {
        let err = check_src("var x: boolean;\nrule \"r\" begin while true do endwhile; end;\n");
        assert!(matches!(err, Err(Diagnostic::RuntimeCompile { .. })));
    }

    #[test]
    fn array_index_type_mismatch_is_rejected() {
        let err = check_src(
            "type idx: 0..2;\nvar arr: array [idx] of boolean;\nvar b: boolean;\nrule \"r\" begin arr[b] := true; end;\n",
        );
        assert!(matches!(err, Err(Diagnostic::Type { .. })));
    }
}
