//! `murphi2c` driver (§4.H): a pure-C transliteration of type decls,
//! const decls, functions and procedures. There is no bit-packing here
//! and no rule table — the point of this driver is to let C tooling
//! sanity-check the declared surface of a model, not to run it.
//!
//! Murphi's undefined sentinel (§3) has no C representation, so a
//! model that ever asks `isundefined` is rejected outright rather than
//! silently dropping the check.

use crate::ast::{BinOp, Callable, Expr, LValue, LValueStep, Param, Stmt, Type};
use crate::codegen::error::{CodeGenError, CodeGenResult};
use crate::layout::cardinality;
use crate::CompiledModel;
use std::collections::{HashMap, HashSet};
use std::fmt::Write as _;

pub fn generate(compiled: &CompiledModel, header: bool) -> CodeGenResult<String> {
    if compiled.uses_undefined() {
        return Err(CodeGenError::Logic(
            "murphi2c: model uses isundefined, which has no C representation".to_string(),
        ));
    }

    let model = &compiled.model;
    let checker = &compiled.checker;
    let mut type_decls = HashMap::new();
    for t in &model.types {
        type_decls.insert(t.name.clone(), checker.resolve_type(&t.ty)?);
    }

    let mut out = String::new();
    out.push_str("/* Generated by murphi2c. Do not edit by hand. */\n");
    if header {
        out.push_str("#ifndef RUMUR_MODEL_H\n#define RUMUR_MODEL_H\n\n");
    }
    out.push_str("#include <stdint.h>\n#include <stdio.h>\n#include <stdlib.h>\n\n");

    for t in &model.types {
        let resolved = checker.resolve_type(&t.ty)?;
        emit_type_decl(&mut out, &t.name, &resolved, &type_decls)?;
    }
    out.push('\n');

    for c in &model.consts {
        let value = super::literal_i64(&c.value)
            .ok_or_else(|| format!("murphi2c: const '{}' did not fold to a literal", c.name))?;
        writeln!(out, "#define {} {}", safe_c_ident(&c.name), value)?;
    }
    out.push('\n');

    for v in &model.vars {
        let resolved = checker.resolve_type(&v.ty)?;
        writeln!(out, "extern {};", c_declarator(&resolved, &safe_c_ident(&v.name), &type_decls)?)?;
    }
    out.push('\n');

    for c in &model.callables {
        emit_callable(&mut out, c, checker, &type_decls)?;
    }

    if header {
        out.push_str("\n/* a header must still compile stand-alone */\nstatic inline int rumur_model_main(void) { return 0; }\n\n#endif /* RUMUR_MODEL_H */\n");
    }
    Ok(out)
}

fn emit_type_decl(out: &mut String, name: &str, resolved: &Type, type_decls: &HashMap<String, Type>) -> CodeGenResult<()> {
    let typedef_name = c_typedef_name(name);
    if let Type::Enum { members } = resolved {
        for (i, m) in members.iter().enumerate() {
            writeln!(out, "#define {} {}", safe_c_ident(m), i)?;
        }
        writeln!(out, "typedef long {typedef_name};")?;
        return Ok(());
    }
    let decl = c_declarator(resolved, &typedef_name, type_decls)?;
    writeln!(out, "typedef {decl};")?;
    Ok(())
}

fn c_typedef_name(name: &str) -> String {
    format!("murphi_{}_t", safe_c_ident(name))
}

/// Builds a full C declarator (`"long x"`, `"long x[3]"`, `"struct { ... } x"`)
/// by growing `ident` outward the way C's own declarator grammar does,
/// rather than trying to name every anonymous aggregate.
fn c_declarator(ty: &Type, ident: &str, type_decls: &HashMap<String, Type>) -> CodeGenResult<String> {
    match ty {
        Type::Boolean => Ok(format!("int {ident}")),
        Type::Range { .. } | Type::Scalarset { .. } | Type::Enum { .. } => Ok(format!("long {ident}")),
        Type::TypeRef(name) => Ok(format!("{} {ident}", c_typedef_name(name))),
        Type::Array { index, element } => {
            let n = cardinality(index);
            c_declarator(element, &format!("{ident}[{n}]"), type_decls)
        }
        Type::Record { fields } => {
            let mut body = String::from("struct { ");
            for (fname, fty) in fields {
                let decl = c_declarator(fty, &safe_c_ident(fname), type_decls)?;
                write!(body, "{decl}; ")?;
            }
            body.push('}');
            Ok(format!("{body} {ident}"))
        }
    }
}

pub fn safe_c_ident(name: &str) -> String {
    const KEYWORDS: &[&str] = &[
        "auto", "break", "case", "char", "const", "continue", "default", "do", "double", "else",
        "enum", "extern", "float", "for", "goto", "if", "int", "long", "register", "return",
        "short", "signed", "sizeof", "static", "struct", "switch", "typedef", "union", "unsigned",
        "void", "volatile", "while",
    ];
    if KEYWORDS.contains(&name) {
        format!("murphi_{name}")
    } else {
        name.to_string()
    }
}

struct Ctx<'a> {
    type_decls: &'a HashMap<String, Type>,
    aliases: HashMap<String, LValue>,
    byref: HashSet<String>,
}

fn dealias(lv: &LValue, ctx: &Ctx) -> LValue {
    let mut current = lv.clone();
    loop {
        match ctx.aliases.get(&current.root) {
            Some(target) => {
                let mut steps = target.steps.clone();
                steps.extend(current.steps.into_iter());
                current = LValue { root: target.root.clone(), steps, loc: lv.loc };
            }
            None => return current,
        }
    }
}

fn emit_c_lvalue(lv: &LValue, ctx: &Ctx) -> CodeGenResult<String> {
    let lv = dealias(lv, ctx);
    let mut s = if ctx.byref.contains(&lv.root) {
        format!("(*{})", safe_c_ident(&lv.root))
    } else {
        safe_c_ident(&lv.root)
    };
    for step in &lv.steps {
        match step {
            LValueStep::Field(name) => {
                write!(s, ".{}", safe_c_ident(name))?;
            }
            LValueStep::Index(idx) => {
                let idx_code = emit_c_expr(idx, ctx)?;
                write!(s, "[{idx_code}]")?;
            }
        }
    }
    Ok(s)
}

fn enum_member_value(ctx: &Ctx, type_name: &str, member: &str) -> Option<i64> {
    match ctx.type_decls.get(type_name)? {
        Type::Enum { members } => members.iter().position(|m| m == member).map(|p| p as i64),
        _ => None,
    }
}

fn emit_c_expr(e: &Expr, ctx: &Ctx) -> CodeGenResult<String> {
    match e {
        Expr::IntLit { value, .. } => Ok(value.to_string()),
        Expr::BoolLit { value, .. } => Ok(if *value { "1".to_string() } else { "0".to_string() }),
        Expr::EnumLit { type_name, member, .. } => match enum_member_value(ctx, type_name, member) {
            Some(_) => Ok(safe_c_ident(member)),
            None => Err(CodeGenError::Logic(format!("murphi2c: unknown enum member '{member}'"))),
        },
        Expr::VarRead { path, .. } => emit_c_lvalue(path, ctx),
        Expr::Bin { op, lhs, rhs, .. } => {
            let l = emit_c_expr(lhs, ctx)?;
            let r = emit_c_expr(rhs, ctx)?;
            Ok(match op {
                BinOp::Add => format!("({l} + {r})"),
                BinOp::Sub => format!("({l} - {r})"),
                BinOp::Mul => format!("({l} * {r})"),
                BinOp::Div => format!("({l} / {r})"),
                BinOp::Mod => format!("({l} % {r})"),
                BinOp::And => format!("({l} && {r})"),
                BinOp::Or => format!("({l} || {r})"),
                BinOp::Implies => format!("(!({l}) || ({r}))"),
                BinOp::Lt => format!("({l} < {r})"),
                BinOp::Le => format!("({l} <= {r})"),
                BinOp::Gt => format!("({l} > {r})"),
                BinOp::Ge => format!("({l} >= {r})"),
                BinOp::Eq | BinOp::BoolEq | BinOp::IntEq => format!("({l} == {r})"),
                BinOp::Neq | BinOp::BoolNeq | BinOp::IntNeq => format!("({l} != {r})"),
            })
        }
        Expr::Not { operand, .. } => Ok(format!("(!{})", emit_c_expr(operand, ctx)?)),
        Expr::Ternary { cond, then_branch, else_branch, .. } => {
            Ok(format!("({} ? {} : {})", emit_c_expr(cond, ctx)?, emit_c_expr(then_branch, ctx)?, emit_c_expr(else_branch, ctx)?))
        }
        Expr::FuncCall { name, args, .. } => {
            let mut rendered = Vec::with_capacity(args.len());
            for a in args {
                rendered.push(emit_c_expr(a, ctx)?);
            }
            Ok(format!("{}({})", safe_c_ident(name), rendered.join(", ")))
        }
        Expr::Forall { .. } | Expr::Exists { .. } => Err(CodeGenError::Logic(
            "murphi2c: quantified expressions are not transliterated to C".to_string(),
        )),
        Expr::IsUndefined { .. } => unreachable!("uses_undefined() already rejected this model"),
    }
}

fn quantifier_bounds(q: &crate::ast::Quantifier, ctx: &Ctx) -> CodeGenResult<(i64, i64, i64)> {
    use crate::ast::QuantifierKind;
    match &q.kind {
        QuantifierKind::OverType(ty) => match ty {
            Type::Range { lo, hi } => Ok((*lo, *hi, 1)),
            Type::Boolean => Ok((0, 1, 1)),
            Type::Enum { members } => Ok((0, members.len() as i64 - 1, 1)),
            Type::Scalarset { n } => Ok((0, *n as i64 - 1, 1)),
            _ => Err(CodeGenError::Logic("murphi2c: quantifier over a non-scalar type".to_string())),
        },
        QuantifierKind::Range { lo, hi, step } => {
            let lo = crate::codegen::env::const_i64(lo, &crate::codegen::env::Env::new(ctx.type_decls.clone()))
                .ok_or_else(|| "murphi2c: for-loop bound is not a compile-time constant".to_string())?;
            let hi = crate::codegen::env::const_i64(hi, &crate::codegen::env::Env::new(ctx.type_decls.clone()))
                .ok_or_else(|| "murphi2c: for-loop bound is not a compile-time constant".to_string())?;
            let step = match step {
                Some(s) => crate::codegen::env::const_i64(s, &crate::codegen::env::Env::new(ctx.type_decls.clone()))
                    .ok_or_else(|| "murphi2c: for-loop step is not a compile-time constant".to_string())?,
                None => 1,
            };
            Ok((lo, hi, step))
        }
    }
}

fn emit_c_stmt(s: &Stmt, ctx: &mut Ctx, out: &mut String, indent: usize) -> CodeGenResult<()> {
    let pad = "    ".repeat(indent);
    match s {
        Stmt::Assign { target, value, .. } => {
            writeln!(out, "{pad}{} = {};", emit_c_lvalue(target, ctx)?, emit_c_expr(value, ctx)?)?;
        }
        Stmt::IfChain { branches, else_branch, .. } => {
            for (i, (cond, body)) in branches.iter().enumerate() {
                let kw = if i == 0 { "if" } else { "} else if" };
                writeln!(out, "{pad}{kw} ({}) {{", emit_c_expr(cond, ctx)?)?;
                for st in body {
                    emit_c_stmt(st, ctx, out, indent + 1)?;
                }
            }
            if !else_branch.is_empty() {
                writeln!(out, "{pad}}} else {{")?;
                for st in else_branch {
                    emit_c_stmt(st, ctx, out, indent + 1)?;
                }
            }
            writeln!(out, "{pad}}}")?;
        }
        Stmt::SwitchChain { scrutinee, cases, default, .. } => {
            writeln!(out, "{pad}switch ({}) {{", emit_c_expr(scrutinee, ctx)?)?;
            for (labels, body) in cases {
                for l in labels {
                    writeln!(out, "{pad}case {}:", emit_c_expr(l, ctx)?)?;
                }
                writeln!(out, "{pad}{{")?;
                for st in body {
                    emit_c_stmt(st, ctx, out, indent + 2)?;
                }
                writeln!(out, "{pad}    break;\n{pad}}}")?;
            }
            if !default.is_empty() {
                writeln!(out, "{pad}default: {{")?;
                for st in default {
                    emit_c_stmt(st, ctx, out, indent + 2)?;
                }
                writeln!(out, "{pad}    break;\n{pad}}}")?;
            }
            writeln!(out, "{pad}}}")?;
        }
        Stmt::For { quantifier, body, .. } => {
            let (lo, hi, step) = quantifier_bounds(quantifier, ctx)?;
            let v = safe_c_ident(&quantifier.name);
            writeln!(out, "{pad}for (long {v} = {lo}; {v} <= {hi}; {v} += {step}) {{")?;
            for st in body {
                emit_c_stmt(st, ctx, out, indent + 1)?;
            }
            writeln!(out, "{pad}}}")?;
        }
        Stmt::While { guard, body, .. } => {
            writeln!(out, "{pad}while ({}) {{", emit_c_expr(guard, ctx)?)?;
            for st in body {
                emit_c_stmt(st, ctx, out, indent + 1)?;
            }
            writeln!(out, "{pad}}}")?;
        }
        Stmt::ProcCall { name, args, .. } => {
            let mut rendered = Vec::with_capacity(args.len());
            for a in args {
                rendered.push(emit_c_expr(a, ctx)?);
            }
            writeln!(out, "{pad}{}({});", safe_c_ident(name), rendered.join(", "))?;
        }
        Stmt::Alias { bindings, body, .. } => {
            let mut saved = Vec::with_capacity(bindings.len());
            for (name, target) in bindings {
                saved.push((name.clone(), ctx.aliases.insert(name.clone(), target.clone())));
            }
            for st in body {
                emit_c_stmt(st, ctx, out, indent)?;
            }
            for (name, prev) in saved {
                match prev {
                    Some(p) => { ctx.aliases.insert(name, p); }
                    None => { ctx.aliases.remove(&name); }
                }
            }
        }
        Stmt::Clear { target, .. } => {
            writeln!(out, "{pad}memset(&{}, 0, sizeof({}));", emit_c_lvalue(target, ctx)?, emit_c_lvalue(target, ctx)?)?;
        }
        Stmt::Error { message, .. } => {
            writeln!(out, "{pad}fprintf(stderr, \"%s\\n\", {:?}); abort();", message)?;
        }
        Stmt::Assert { cond, message, .. } => {
            writeln!(out, "{pad}if (!({})) {{ fprintf(stderr, \"%s\\n\", {:?}); abort(); }}", emit_c_expr(cond, ctx)?, message)?;
        }
        Stmt::PutExpr { value, .. } => {
            writeln!(out, "{pad}printf(\"%ld\", (long){});", emit_c_expr(value, ctx)?)?;
        }
        Stmt::PutString { text, .. } => {
            writeln!(out, "{pad}printf(\"%s\", {:?});", text)?;
        }
        Stmt::Return { value, .. } => match value {
            Some(v) => writeln!(out, "{pad}return {};", emit_c_expr(v, ctx)?)?,
            None => writeln!(out, "{pad}return;")?,
        },
    }
    Ok(())
}

fn emit_callable(out: &mut String, c: &Callable, checker: &crate::typecheck::TypeChecker, type_decls: &HashMap<String, Type>) -> CodeGenResult<()> {
    let mut ctx = Ctx { type_decls, aliases: HashMap::new(), byref: HashSet::new() };
    let mut params = Vec::with_capacity(c.params.len());
    for p in &c.params {
        params.push(emit_param(&mut ctx, p, checker)?);
    }
    let ret_ty = match &c.return_type {
        Some(t) => c_declarator(&checker.resolve_type(t)?, "", type_decls)?.trim_end().to_string(),
        None => "void".to_string(),
    };
    writeln!(out, "{ret_ty} {}({}) {{", safe_c_ident(&c.name), if params.is_empty() { "void".to_string() } else { params.join(", ") })?;
    for d in &c.decls {
        let resolved = checker.resolve_type(&d.ty)?;
        writeln!(out, "    {};", c_declarator(&resolved, &safe_c_ident(&d.name), type_decls)?)?;
    }
    for s in &c.body {
        emit_c_stmt(s, &mut ctx, out, 1)?;
    }
    if c.return_type.is_some() {
        writeln!(out, "    abort(); /* murphi function fell through without returning */")?;
    }
    writeln!(out, "}}\n")?;
    Ok(())
}

fn emit_param(ctx: &mut Ctx, p: &Param, checker: &crate::typecheck::TypeChecker) -> CodeGenResult<String> {
    let resolved = checker.resolve_type(&p.ty)?;
    let safe = safe_c_ident(&p.name);
    if p.by_reference {
        ctx.byref.insert(p.name.clone());
        Ok(c_declarator(&resolved, &format!("*{safe}"), ctx.type_decls)?)
    } else {
        Ok(c_declarator(&resolved, &safe, ctx.type_decls)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_a_model_using_isundefined() {
        let src = "var x: 0..3;\nstartstate begin x := 0; end;\nrule \"r\" begin if isundefined(x) then x := 0; end; end;\n";
        let compiled = crate::compile_source(src, 0, false, None).unwrap();
        assert!(generate(&compiled, false).is_err());
    }

    #[test]
    fn transliterates_a_simple_procedure() {
        let src = "var x: 0..10;\nprocedure bump(var y: 0..10);\nbegin\n  y := y + 1;\nend;\nstartstate begin x := 0; end;\nrule \"inc\" x < 10 ==> begin bump(x); end;\n";
        let compiled = crate::compile_source(src, 0, false, None).unwrap();
        let out = generate(&compiled, false).unwrap();
        assert!(out.contains("void bump(long *y)"));
        assert!(out.contains("(*y) = ((*y) + 1);"));
    }

    #[test]
    fn header_mode_wraps_with_an_include_guard_and_a_stub_main() {
        let src = "var x: 0..10;\nstartstate begin x := 0; end;\nrule \"inc\" x < 10 ==> begin x := x + 1; end;\n";
        let compiled = crate::compile_source(src, 0, false, None).unwrap();
        let out = generate(&compiled, true).unwrap();
        assert!(out.contains("#ifndef RUMUR_MODEL_H"));
        assert!(out.contains("rumur_model_main(void) { return 0; }"));
    }
}
