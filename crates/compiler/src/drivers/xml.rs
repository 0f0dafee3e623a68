//! `murphi2xml` driver (§4.H): prints the entire typed IR as an XML
//! document, one element per node kind, attributes carrying the source
//! location. No general-purpose XML writer is pulled in for this —
//! every element here has a fixed, small attribute set, so hand-written
//! `write!`-into-`String` (matching the code generator's own style)
//! stays simpler than wiring up a DOM builder.

use crate::ast::{
    BinOp, Callable, ConstDecl, Expr, LValue, LValueStep, Model, Param, Quantifier, QuantifierKind, Rule, Stmt, Type, TypeDecl, VarDecl,
};
use crate::codegen::error::CodeGenResult;
use crate::CompiledModel;
use rumur_core::SourceLocation;
use std::fmt::Write as _;

pub fn generate(compiled: &CompiledModel) -> CodeGenResult<String> {
    let model = &compiled.model;
    let mut out = String::new();
    out.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    out.push_str("<model>\n");
    emit_consts(&mut out, &model.consts)?;
    emit_types(&mut out, &model.types)?;
    emit_vars(&mut out, &model.vars)?;
    emit_callables(&mut out, &model.callables)?;
    emit_rules(&mut out, &model.rules)?;
    out.push_str("</model>\n");
    Ok(out)
}

fn loc_attrs(loc: SourceLocation) -> String {
    format!(
        " file=\"{}\" start_line=\"{}\" start_col=\"{}\" end_line=\"{}\" end_col=\"{}\"",
        loc.file, loc.start_line, loc.start_col, loc.end_line, loc.end_col
    )
}

fn xml_escape(s: &str) -> String {
    s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;").replace('"', "&quot;")
}

fn emit_consts(out: &mut String, consts: &[ConstDecl]) -> CodeGenResult<()> {
    for c in consts {
        writeln!(out, "  <const name=\"{}\"{}>", xml_escape(&c.name), loc_attrs(c.loc))?;
        emit_expr(out, &c.value, 2)?;
        writeln!(out, "  </const>")?;
    }
    Ok(())
}

fn emit_types(out: &mut String, types: &[TypeDecl]) -> CodeGenResult<()> {
    for t in types {
        writeln!(out, "  <typedecl name=\"{}\"{}>", xml_escape(&t.name), loc_attrs(t.loc))?;
        emit_type(out, &t.ty, 2)?;
        writeln!(out, "  </typedecl>")?;
    }
    Ok(())
}

fn emit_vars(out: &mut String, vars: &[VarDecl]) -> CodeGenResult<()> {
    for v in vars {
        writeln!(out, "  <vardecl name=\"{}\"{}>", xml_escape(&v.name), loc_attrs(v.loc))?;
        emit_type(out, &v.ty, 2)?;
        writeln!(out, "  </vardecl>")?;
    }
    Ok(())
}

fn emit_type(out: &mut String, ty: &Type, indent: usize) -> CodeGenResult<()> {
    let pad = "  ".repeat(indent);
    match ty {
        Type::Boolean => writeln!(out, "{pad}<boolean/>")?,
        Type::Range { lo, hi } => writeln!(out, "{pad}<range lo=\"{lo}\" hi=\"{hi}\"/>")?,
        Type::Enum { members } => {
            writeln!(out, "{pad}<enum>")?;
            for m in members {
                writeln!(out, "{pad}  <member name=\"{}\"/>", xml_escape(m))?;
            }
            writeln!(out, "{pad}</enum>")?;
        }
        Type::Scalarset { n } => writeln!(out, "{pad}<scalarset size=\"{n}\"/>")?,
        Type::Array { index, element } => {
            writeln!(out, "{pad}<array>")?;
            writeln!(out, "{pad}  <index>")?;
            emit_type(out, index, indent + 2)?;
            writeln!(out, "{pad}  </index>")?;
            writeln!(out, "{pad}  <element>")?;
            emit_type(out, element, indent + 2)?;
            writeln!(out, "{pad}  </element>")?;
            writeln!(out, "{pad}</array>")?;
        }
        Type::Record { fields } => {
            writeln!(out, "{pad}<record>")?;
            for (name, fty) in fields {
                writeln!(out, "{pad}  <field name=\"{}\">", xml_escape(name))?;
                emit_type(out, fty, indent + 2)?;
                writeln!(out, "{pad}  </field>")?;
            }
            writeln!(out, "{pad}</record>")?;
        }
        Type::TypeRef(name) => writeln!(out, "{pad}<typeref name=\"{}\"/>", xml_escape(name))?,
    }
    Ok(())
}

fn emit_lvalue(out: &mut String, lv: &LValue, indent: usize) -> CodeGenResult<()> {
    let pad = "  ".repeat(indent);
    writeln!(out, "{pad}<lvalue root=\"{}\"{}>", xml_escape(&lv.root), loc_attrs(lv.loc))?;
    for step in &lv.steps {
        match step {
            LValueStep::Field(name) => writeln!(out, "{pad}  <field name=\"{}\"/>", xml_escape(name))?,
            LValueStep::Index(idx) => {
                writeln!(out, "{pad}  <index>")?;
                emit_expr(out, idx, indent + 2)?;
                writeln!(out, "{pad}  </index>")?;
            }
        }
    }
    writeln!(out, "{pad}</lvalue>")?;
    Ok(())
}

fn binop_tag(op: BinOp) -> &'static str {
    match op {
        BinOp::Add => "add",
        BinOp::Sub => "sub",
        BinOp::Mul => "mul",
        BinOp::Div => "div",
        BinOp::Mod => "mod",
        BinOp::And => "and",
        BinOp::Or => "or",
        BinOp::Implies => "implies",
        BinOp::Lt => "lt",
        BinOp::Le => "le",
        BinOp::Gt => "gt",
        BinOp::Ge => "ge",
        BinOp::Eq => "eq",
        BinOp::Neq => "neq",
        BinOp::BoolEq => "booleq",
        BinOp::BoolNeq => "boolneq",
        BinOp::IntEq => "inteq",
        BinOp::IntNeq => "intneq",
    }
}

fn emit_quantifier(out: &mut String, q: &Quantifier, indent: usize) -> CodeGenResult<()> {
    let pad = "  ".repeat(indent);
    writeln!(out, "{pad}<quantifier name=\"{}\"{}>", xml_escape(&q.name), loc_attrs(q.loc))?;
    match &q.kind {
        QuantifierKind::OverType(ty) => {
            writeln!(out, "{pad}  <overtype>")?;
            emit_type(out, ty, indent + 2)?;
            writeln!(out, "{pad}  </overtype>")?;
        }
        QuantifierKind::Range { lo, hi, step } => {
            writeln!(out, "{pad}  <lo>")?;
            emit_expr(out, lo, indent + 2)?;
            writeln!(out, "{pad}  </lo>")?;
            writeln!(out, "{pad}  <hi>")?;
            emit_expr(out, hi, indent + 2)?;
            writeln!(out, "{pad}  </hi>")?;
            if let Some(s) = step {
                writeln!(out, "{pad}  <step>")?;
                emit_expr(out, s, indent + 2)?;
                writeln!(out, "{pad}  </step>")?;
            }
        }
    }
    writeln!(out, "{pad}</quantifier>")?;
    Ok(())
}

fn emit_expr(out: &mut String, e: &Expr, indent: usize) -> CodeGenResult<()> {
    let pad = "  ".repeat(indent);
    match e {
        Expr::IntLit { value, loc } => writeln!(out, "{pad}<intlit value=\"{value}\"{}/>", loc_attrs(*loc))?,
        Expr::BoolLit { value, loc } => writeln!(out, "{pad}<boollit value=\"{value}\"{}/>", loc_attrs(*loc))?,
        Expr::EnumLit { type_name, member, loc } => {
            writeln!(out, "{pad}<enumlit type=\"{}\" member=\"{}\"{}/>", xml_escape(type_name), xml_escape(member), loc_attrs(*loc))?
        }
        Expr::VarRead { path, .. } => emit_lvalue(out, path, indent)?,
        Expr::Bin { op, lhs, rhs, loc } => {
            writeln!(out, "{pad}<binop kind=\"{}\"{}>", binop_tag(*op), loc_attrs(*loc))?;
            emit_expr(out, lhs, indent + 1)?;
            emit_expr(out, rhs, indent + 1)?;
            writeln!(out, "{pad}</binop>")?;
        }
        Expr::Not { operand, loc } => {
            writeln!(out, "{pad}<not{}>", loc_attrs(*loc))?;
            emit_expr(out, operand, indent + 1)?;
            writeln!(out, "{pad}</not>")?;
        }
        Expr::Ternary { cond, then_branch, else_branch, loc } => {
            writeln!(out, "{pad}<ternary{}>", loc_attrs(*loc))?;
            emit_expr(out, cond, indent + 1)?;
            emit_expr(out, then_branch, indent + 1)?;
            emit_expr(out, else_branch, indent + 1)?;
            writeln!(out, "{pad}</ternary>")?;
        }
        Expr::Forall { quantifier, body, loc } => {
            writeln!(out, "{pad}<forall{}>", loc_attrs(*loc))?;
            emit_quantifier(out, quantifier, indent + 1)?;
            emit_expr(out, body, indent + 1)?;
            writeln!(out, "{pad}</forall>")?;
        }
        Expr::Exists { quantifier, body, loc } => {
            writeln!(out, "{pad}<exists{}>", loc_attrs(*loc))?;
            emit_quantifier(out, quantifier, indent + 1)?;
            emit_expr(out, body, indent + 1)?;
            writeln!(out, "{pad}</exists>")?;
        }
        Expr::IsUndefined { target, loc } => {
            writeln!(out, "{pad}<isundefined{}>", loc_attrs(*loc))?;
            emit_lvalue(out, target, indent + 1)?;
            writeln!(out, "{pad}</isundefined>")?;
        }
        Expr::FuncCall { name, args, loc } => {
            writeln!(out, "{pad}<funccall name=\"{}\"{}>", xml_escape(name), loc_attrs(*loc))?;
            for a in args {
                emit_expr(out, a, indent + 1)?;
            }
            writeln!(out, "{pad}</funccall>")?;
        }
    }
    Ok(())
}

fn emit_stmt(out: &mut String, s: &Stmt, indent: usize) -> CodeGenResult<()> {
    let pad = "  ".repeat(indent);
    match s {
        Stmt::Assign { target, value, loc } => {
            writeln!(out, "{pad}<assign{}>", loc_attrs(*loc))?;
            emit_lvalue(out, target, indent + 1)?;
            emit_expr(out, value, indent + 1)?;
            writeln!(out, "{pad}</assign>")?;
        }
        Stmt::IfChain { branches, else_branch, loc } => {
            writeln!(out, "{pad}<ifchain{}>", loc_attrs(*loc))?;
            for (cond, body) in branches {
                writeln!(out, "{pad}  <branch>")?;
                emit_expr(out, cond, indent + 2)?;
                for st in body {
                    emit_stmt(out, st, indent + 2)?;
                }
                writeln!(out, "{pad}  </branch>")?;
            }
            if !else_branch.is_empty() {
                writeln!(out, "{pad}  <else>")?;
                for st in else_branch {
                    emit_stmt(out, st, indent + 2)?;
                }
                writeln!(out, "{pad}  </else>")?;
            }
            writeln!(out, "{pad}</ifchain>")?;
        }
        Stmt::SwitchChain { scrutinee, cases, default, loc } => {
            writeln!(out, "{pad}<switchchain{}>", loc_attrs(*loc))?;
            emit_expr(out, scrutinee, indent + 1)?;
            for (labels, body) in cases {
                writeln!(out, "{pad}  <case>")?;
                for l in labels {
                    emit_expr(out, l, indent + 2)?;
                }
                for st in body {
                    emit_stmt(out, st, indent + 2)?;
                }
                writeln!(out, "{pad}  </case>")?;
            }
            if !default.is_empty() {
                writeln!(out, "{pad}  <default>")?;
                for st in default {
                    emit_stmt(out, st, indent + 2)?;
                }
                writeln!(out, "{pad}  </default>")?;
            }
            writeln!(out, "{pad}</switchchain>")?;
        }
        Stmt::For { quantifier, body, loc } => {
            writeln!(out, "{pad}<for{}>", loc_attrs(*loc))?;
            emit_quantifier(out, quantifier, indent + 1)?;
            for st in body {
                emit_stmt(out, st, indent + 1)?;
            }
            writeln!(out, "{pad}</for>")?;
        }
        Stmt::While { guard, body, loc } => {
            writeln!(out, "{pad}<while{}>", loc_attrs(*loc))?;
            emit_expr(out, guard, indent + 1)?;
            for st in body {
                emit_stmt(out, st, indent + 1)?;
            }
            writeln!(out, "{pad}</while>")?;
        }
        Stmt::ProcCall { name, args, loc } => {
            writeln!(out, "{pad}<proccall name=\"{}\"{}>", xml_escape(name), loc_attrs(*loc))?;
            for a in args {
                emit_expr(out, a, indent + 1)?;
            }
            writeln!(out, "{pad}</proccall>")?;
        }
        Stmt::Alias { bindings, body, loc } => {
            writeln!(out, "{pad}<alias{}>", loc_attrs(*loc))?;
            for (name, target) in bindings {
                writeln!(out, "{pad}  <binding name=\"{}\">", xml_escape(name))?;
                emit_lvalue(out, target, indent + 2)?;
                writeln!(out, "{pad}  </binding>")?;
            }
            for st in body {
                emit_stmt(out, st, indent + 1)?;
            }
            writeln!(out, "{pad}</alias>")?;
        }
        Stmt::Clear { target, loc } => {
            writeln!(out, "{pad}<clear{}>", loc_attrs(*loc))?;
            emit_lvalue(out, target, indent + 1)?;
            writeln!(out, "{pad}</clear>")?;
        }
        Stmt::Error { message, loc } => writeln!(out, "{pad}<error message=\"{}\"{}/>", xml_escape(message), loc_attrs(*loc))?,
        Stmt::Assert { cond, message, loc } => {
            writeln!(out, "{pad}<assert message=\"{}\"{}>", xml_escape(message), loc_attrs(*loc))?;
            emit_expr(out, cond, indent + 1)?;
            writeln!(out, "{pad}</assert>")?;
        }
        Stmt::PutExpr { value, loc } => {
            writeln!(out, "{pad}<putexpr{}>", loc_attrs(*loc))?;
            emit_expr(out, value, indent + 1)?;
            writeln!(out, "{pad}</putexpr>")?;
        }
        Stmt::PutString { text, loc } => writeln!(out, "{pad}<putstring text=\"{}\"{}/>", xml_escape(text), loc_attrs(*loc))?,
        Stmt::Return { value, loc } => {
            writeln!(out, "{pad}<return{}>", loc_attrs(*loc))?;
            if let Some(v) = value {
                emit_expr(out, v, indent + 1)?;
            }
            writeln!(out, "{pad}</return>")?;
        }
    }
    Ok(())
}

fn emit_callables(out: &mut String, callables: &[Callable]) -> CodeGenResult<()> {
    for c in callables {
        let tag = if c.return_type.is_some() { "function" } else { "procedure" };
        writeln!(out, "  <{tag} name=\"{}\"{}>", xml_escape(&c.name), loc_attrs(c.loc))?;
        for p in &c.params {
            emit_param(out, p)?;
        }
        if let Some(rt) = &c.return_type {
            writeln!(out, "    <returntype>")?;
            emit_type(out, rt, 3)?;
            writeln!(out, "    </returntype>")?;
        }
        for d in &c.decls {
            writeln!(out, "    <localvar name=\"{}\">", xml_escape(&d.name))?;
            emit_type(out, &d.ty, 3)?;
            writeln!(out, "    </localvar>")?;
        }
        for s in &c.body {
            emit_stmt(out, s, 2)?;
        }
        writeln!(out, "  </{tag}>")?;
    }
    Ok(())
}

fn emit_param(out: &mut String, p: &Param) -> CodeGenResult<()> {
    writeln!(out, "    <param name=\"{}\" by_reference=\"{}\">", xml_escape(&p.name), p.by_reference)?;
    emit_type(out, &p.ty, 3)?;
    writeln!(out, "    </param>")?;
    Ok(())
}

fn emit_rules(out: &mut String, rules: &[Rule]) -> CodeGenResult<()> {
    for r in rules {
        emit_rule(out, r, 1)?;
    }
    Ok(())
}

fn emit_rule(out: &mut String, r: &Rule, indent: usize) -> CodeGenResult<()> {
    let pad = "  ".repeat(indent);
    match r {
        Rule::Startstate { name, decls, body, loc } => {
            writeln!(out, "{pad}<startstate name=\"{}\"{}>", xml_escape(name), loc_attrs(*loc))?;
            for d in decls {
                writeln!(out, "{pad}  <localvar name=\"{}\">", xml_escape(&d.name))?;
                emit_type(out, &d.ty, indent + 2)?;
                writeln!(out, "{pad}  </localvar>")?;
            }
            for s in body {
                emit_stmt(out, s, indent + 1)?;
            }
            writeln!(out, "{pad}</startstate>")?;
        }
        Rule::Simple { name, guard, decls, body, loc } => {
            writeln!(out, "{pad}<rule name=\"{}\"{}>", xml_escape(name), loc_attrs(*loc))?;
            if let Some(g) = guard {
                writeln!(out, "{pad}  <guard>")?;
                emit_expr(out, g, indent + 2)?;
                writeln!(out, "{pad}  </guard>")?;
            }
            for d in decls {
                writeln!(out, "{pad}  <localvar name=\"{}\">", xml_escape(&d.name))?;
                emit_type(out, &d.ty, indent + 2)?;
                writeln!(out, "{pad}  </localvar>")?;
            }
            for s in body {
                emit_stmt(out, s, indent + 1)?;
            }
            writeln!(out, "{pad}</rule>")?;
        }
        Rule::Invariant { name, predicate, loc } => {
            writeln!(out, "{pad}<invariant name=\"{}\"{}>", xml_escape(name), loc_attrs(*loc))?;
            emit_expr(out, predicate, indent + 1)?;
            writeln!(out, "{pad}</invariant>")?;
        }
        Rule::Liveness { name, predicate, loc } => {
            writeln!(out, "{pad}<liveness name=\"{}\"{}>", xml_escape(name), loc_attrs(*loc))?;
            emit_expr(out, predicate, indent + 1)?;
            writeln!(out, "{pad}</liveness>")?;
        }
        Rule::Cover { name, predicate, loc } => {
            writeln!(out, "{pad}<cover name=\"{}\"{}>", xml_escape(name), loc_attrs(*loc))?;
            emit_expr(out, predicate, indent + 1)?;
            writeln!(out, "{pad}</cover>")?;
        }
        Rule::RuleSet { quantifiers, rules, loc } => {
            writeln!(out, "{pad}<ruleset{}>", loc_attrs(*loc))?;
            for q in quantifiers {
                emit_quantifier(out, q, indent + 1)?;
            }
            for inner in rules {
                emit_rule(out, inner, indent + 1)?;
            }
            writeln!(out, "{pad}</ruleset>")?;
        }
        Rule::AliasRule { bindings, rules, loc } => {
            writeln!(out, "{pad}<aliasrule{}>", loc_attrs(*loc))?;
            for (name, target) in bindings {
                writeln!(out, "{pad}  <binding name=\"{}\">", xml_escape(name))?;
                emit_lvalue(out, target, indent + 2)?;
                writeln!(out, "{pad}  </binding>")?;
            }
            for inner in rules {
                emit_rule(out, inner, indent + 1)?;
            }
            writeln!(out, "{pad}</aliasrule>")?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emits_a_rooted_document_with_one_rule_element() {
        let src = "var x: 0..10;\nstartstate begin x := 0; end;\nrule \"inc\" x < 10 ==> begin x := x + 1; end;\n";
        let compiled = crate::compile_source(src, 0, false, None).unwrap();
        let out = generate(&compiled).unwrap();
        assert!(out.starts_with("<?xml"));
        assert!(out.contains("<model>"));
        assert!(out.contains("</model>"));
        assert!(out.contains("<vardecl name=\"x\""));
    }

    #[test]
    fn a_record_type_round_trips_its_field_names() {
        let src = "type r: record a: boolean; b: boolean; end;\nvar v: r;\nstartstate begin end;\n";
        let compiled = crate::compile_source(src, 0, false, None).unwrap();
        let out = generate(&compiled).unwrap();
        assert!(out.contains("<field name=\"a\">"));
        assert!(out.contains("<field name=\"b\">"));
    }
}
