//! Expression and statement emission.
//!
//! Every Murphi scalar value (Range/Enum/Scalarset/Boolean) is
//! represented in generated code as a plain `i64` holding its
//! *decoded* (real) value — `Range{lo,..}` values included, not the
//! `lo`-subtracted encoding §3 describes for storage. Only at the
//! point a scalar crosses into or out of a packed `State` buffer does
//! the encoding/decoding happen (`read_scalar`/`write_scalar` below);
//! arithmetic, comparisons and locals all work in the decoded domain,
//! which keeps every operator a direct Rust operator instead of a
//! `+ lo`-laced mess at every use site.
//!
//! Composite values (records, arrays) are never decoded: they stay
//! addressed as `(buffer, offset)` pairs (`env::Place`) all the way
//! through, per §4.F.

use crate::ast::{BinOp, Expr, LValue, QuantifierKind, Stmt};
use crate::codegen::env::{const_i64, resolve_lvalue, Env, Resolved, VarKind};
use crate::codegen::types::{safe_ident, undefined_sentinel};
use crate::layout::cardinality;
use std::fmt::Write;

pub type CResult<T> = Result<T, String>;

/// Emits `e` as a Rust expression of type `i64` (booleans included —
/// `0`/`1`). Only valid for expressions whose Murphi type is simple;
/// composite-typed expressions never reach this function (they are
/// only ever read through `resolve_lvalue` for `Assign`/`Clear`/calls).
pub fn emit_scalar_expr(e: &Expr, env: &Env) -> CResult<String> {
    match e {
        Expr::IntLit { value, .. } => Ok(value.to_string()),
        Expr::BoolLit { value, .. } => Ok(if *value { "1".to_string() } else { "0".to_string() }),
        Expr::EnumLit { type_name, member, .. } => env
            .enum_member_index(type_name, member)
            .map(|i| i.to_string())
            .ok_or_else(|| format!("codegen: unknown enum member '{type_name}.{member}'")),
        Expr::VarRead { path, .. } => emit_lvalue_read(path, env),
        Expr::Bin { op, lhs, rhs, .. } => emit_bin(*op, lhs, rhs, env),
        Expr::Not { operand, .. } => Ok(format!("(({}) == 0) as i64", emit_scalar_expr(operand, env)?)),
        Expr::Ternary { cond, then_branch, else_branch, .. } => Ok(format!(
            "(if ({}) != 0 {{ {} }} else {{ {} }})",
            emit_scalar_expr(cond, env)?,
            emit_scalar_expr(then_branch, env)?,
            emit_scalar_expr(else_branch, env)?,
        )),
        Expr::Forall { quantifier, body, .. } => emit_forall(quantifier, body, env),
        Expr::Exists { .. } => Err("codegen: exists should have been strength-reduced away".to_string()),
        Expr::IsUndefined { target, .. } => emit_is_undefined(target, env),
        Expr::FuncCall { name, args, .. } => {
            let parts = build_call_args(name, args, env)?;
            Ok(format!("func_{}(state, {}).unwrap_or(0)", safe_ident(name), parts.join(", ")))
        }
    }
}

fn emit_bin(op: BinOp, lhs: &Expr, rhs: &Expr, env: &Env) -> CResult<String> {
    let l = emit_scalar_expr(lhs, env)?;
    let r = emit_scalar_expr(rhs, env)?;
    Ok(match op {
        BinOp::Add => format!("({l} + {r})"),
        BinOp::Sub => format!("({l} - {r})"),
        BinOp::Mul => format!("({l} * {r})"),
        BinOp::Div => format!("rt_div({l}, {r})"),
        BinOp::Mod => format!("rt_mod({l}, {r})"),
        BinOp::And => format!("((({l}) != 0 && ({r}) != 0) as i64)"),
        BinOp::Or => format!("((({l}) != 0 || ({r}) != 0) as i64)"),
        BinOp::Implies => format!("((({l}) == 0 || ({r}) != 0) as i64)"),
        BinOp::Lt => format!("(({l}) < ({r})) as i64"),
        BinOp::Le => format!("(({l}) <= ({r})) as i64"),
        BinOp::Gt => format!("(({l}) > ({r})) as i64"),
        BinOp::Ge => format!("(({l}) >= ({r})) as i64"),
        BinOp::Eq | BinOp::IntEq | BinOp::BoolEq => format!("(({l}) == ({r})) as i64"),
        BinOp::Neq | BinOp::IntNeq | BinOp::BoolNeq => format!("(({l}) != ({r})) as i64"),
    })
}

fn emit_lvalue_read(path: &LValue, env: &Env) -> CResult<String> {
    match resolve_lvalue(path, env)? {
        Resolved::Scalar(code) => Ok(code),
        Resolved::Addressed(place) => {
            if !place.ty.is_simple() {
                return Err(format!("codegen: '{}' names a composite value in a scalar context", path.root));
            }
            Ok(read_scalar(&place.buffer, &place.offset, place.width, &place.ty))
        }
    }
}

/// `<buffer>.read_bits(<offset>, width)` decoded into a real Murphi
/// value: `Range` adds its `lo` back; every other simple type is
/// already a zero-based index. `width` must be the width the value was
/// actually stored with (`env::Place::width`), not recomputed from
/// `ty`, since a state variable's slot may be wider than `ty` alone
/// implies (an `isundefined`-budgeted sentinel).
pub fn read_scalar(buffer: &str, offset: &str, width: u32, ty: &crate::ast::Type) -> String {
    match ty {
        crate::ast::Type::Range { lo, .. } if *lo != 0 => {
            format!("(({buffer}.read_bits({offset}, {width}) as i64) + ({lo}))")
        }
        _ => format!("({buffer}.read_bits({offset}, {width}) as i64)"),
    }
}

/// The inverse of `read_scalar`, plus the range check §4.F requires:
/// an out-of-range write surfaces as the enclosing body's error return
/// (`Err` inside a `function`, `Some` everywhere else) rather than
/// panicking or silently truncating.
pub fn emit_write_scalar(buffer: &str, offset: &str, width: u32, ty: &crate::ast::Type, value_code: &str, env: &Env, out: &mut String) {
    let wrap = if env.returns_value { "Err" } else { "Some" };
    match ty {
        crate::ast::Type::Range { lo, hi } => {
            writeln!(out, "    {{ let __v: i64 = {value_code}; if __v < {lo} || __v > {hi} {{ return {wrap}(format!(\"range error: value {{}} out of range {lo}..{hi}\", __v)); }} {buffer}.write_bits({offset}, {width}, (__v - ({lo})) as u64); }}").ok();
        }
        _ => {
            writeln!(out, "    {buffer}.write_bits({offset}, {width}, ({value_code}) as u64);").ok();
        }
    }
}

fn emit_is_undefined(target: &LValue, env: &Env) -> CResult<String> {
    match resolve_lvalue(target, env)? {
        Resolved::Scalar(_) => Ok("0".to_string()),
        Resolved::Addressed(place) => {
            let sentinel = undefined_sentinel(&place.ty);
            Ok(format!("(({}.read_bits({}, {}) as u64) == {sentinel}) as i64", place.buffer, place.offset, place.width))
        }
    }
}

pub(crate) fn quantifier_domain(kind: &QuantifierKind, env: &Env) -> CResult<(i64, i64, i64)> {
    use crate::ast::Type;
    match kind {
        QuantifierKind::OverType(Type::Range { lo, hi }) => Ok((*lo, *hi, 1)),
        QuantifierKind::OverType(Type::Boolean) => Ok((0, 1, 1)),
        QuantifierKind::OverType(Type::Enum { members }) => Ok((0, members.len() as i64 - 1, 1)),
        QuantifierKind::OverType(Type::Scalarset { n }) => Ok((0, *n as i64 - 1, 1)),
        QuantifierKind::OverType(_) => Err("codegen: quantifier over a non-simple type".to_string()),
        QuantifierKind::Range { lo, hi, step } => {
            let lo = const_i64(lo, env).ok_or("codegen: quantifier lower bound must be constant")?;
            let hi = const_i64(hi, env).ok_or("codegen: quantifier upper bound must be constant")?;
            let step = match step {
                Some(s) => const_i64(s, env).ok_or("codegen: quantifier step must be constant")?,
                None => 1,
            };
            Ok((lo, hi, step))
        }
    }
}

fn emit_forall(quantifier: &crate::ast::Quantifier, body: &Expr, env: &Env) -> CResult<String> {
    let (lo, hi, step) = quantifier_domain(&quantifier.kind, env)?;
    let var = safe_ident(&quantifier.name);
    let child = env.child_with(&quantifier.name, VarKind::LocalScalar { ty: crate::ast::Type::Range { lo, hi } });
    let body_code = emit_scalar_expr(body, &child)?;
    Ok(format!(
        "({{ let mut __ok = true; let mut {var} = {lo}i64; while {var} <= {hi} {{ if ({body_code}) == 0 {{ __ok = false; break; }} {var} += {step}; }} __ok as i64 }})"
    ))
}

/// Emits one statement into `out`. `out` accumulates the body of a
/// function returning `Option<String>` (`None` = ran to completion,
/// `Some(message)` = an `error`/`assert`/range-check fired), so every
/// early exit is a literal `return ...;` line.
pub fn emit_stmt(s: &Stmt, env: &Env, out: &mut String) -> CResult<()> {
    match s {
        Stmt::Assign { target, value, .. } => emit_assign(target, value, env, out),
        Stmt::IfChain { branches, else_branch, .. } => {
            for (i, (cond, body)) in branches.iter().enumerate() {
                let kw = if i == 0 { "if" } else { "} else if" };
                writeln!(out, "    {kw} ({}) != 0 {{", emit_scalar_expr(cond, env)?).ok();
                for st in body {
                    emit_stmt(st, env, out)?;
                }
            }
            if !branches.is_empty() {
                writeln!(out, "    }} else {{").ok();
            } else {
                writeln!(out, "    if true {{").ok();
            }
            for st in else_branch {
                emit_stmt(st, env, out)?;
            }
            writeln!(out, "    }}").ok();
            Ok(())
        }
        Stmt::SwitchChain { .. } => Err("codegen: switch should have been strength-reduced to if/else".to_string()),
        Stmt::For { quantifier, body, .. } => {
            let (lo, hi, step) = quantifier_domain(&quantifier.kind, env)?;
            let var = safe_ident(&quantifier.name);
            let child = env.child_with(&quantifier.name, VarKind::LocalScalar { ty: crate::ast::Type::Range { lo, hi } });
            writeln!(out, "    {{ let mut {var}: i64 = {lo}; while {var} <= {hi} {{").ok();
            for st in body {
                emit_stmt(st, &child, out)?;
            }
            writeln!(out, "    {var} += {step}; }} }}").ok();
            Ok(())
        }
        Stmt::While { guard, body, .. } => {
            writeln!(out, "    while ({}) != 0 {{", emit_scalar_expr(guard, env)?).ok();
            for st in body {
                emit_stmt(st, env, out)?;
            }
            writeln!(out, "    }}").ok();
            Ok(())
        }
        Stmt::ProcCall { name, args, .. } => {
            let call = emit_call(name, args, env)?;
            let propagate = if env.returns_value { "Err(__e)" } else { "Some(__e)" };
            writeln!(out, "    if let Some(__e) = {call} {{ return {propagate}; }}").ok();
            Ok(())
        }
        Stmt::Alias { bindings, body, .. } => {
            let mut child = env.clone();
            for (name, target) in bindings {
                child.bind(name, VarKind::Alias { target: target.clone() });
            }
            for st in body {
                emit_stmt(st, &child, out)?;
            }
            Ok(())
        }
        Stmt::Clear { target, .. } => emit_clear(target, env, out),
        Stmt::Error { message, .. } => {
            let wrap = if env.returns_value { "Err" } else { "Some" };
            writeln!(out, "    return {wrap}({:?}.to_string());", message).ok();
            Ok(())
        }
        Stmt::Assert { cond, message, .. } => {
            let wrap = if env.returns_value { "Err" } else { "Some" };
            writeln!(
                out,
                "    if ({}) == 0 {{ return {wrap}(format!(\"assertion failed: {}\")); }}",
                emit_scalar_expr(cond, env)?,
                message.replace('"', "\\\"")
            )
            .ok();
            Ok(())
        }
        Stmt::PutExpr { value, .. } => {
            writeln!(out, "    print!(\"{{}}\", {});", emit_scalar_expr(value, env)?).ok();
            Ok(())
        }
        Stmt::PutString { text, .. } => {
            writeln!(out, "    print!({:?});", text).ok();
            Ok(())
        }
        Stmt::Return { value, .. } => {
            match value {
                Some(v) => writeln!(out, "    return Ok({});", emit_scalar_expr(v, env)?).ok(),
                None => writeln!(out, "    return None;").ok(),
            };
            Ok(())
        }
    }
}

fn emit_assign(target: &LValue, value: &Expr, env: &Env, out: &mut String) -> CResult<()> {
    let resolved_target = resolve_lvalue(target, env)?;
    match resolved_target {
        Resolved::Scalar(name) => {
            writeln!(out, "    {name} = {};", emit_scalar_expr(value, env)?).ok();
            Ok(())
        }
        Resolved::Addressed(place) if place.ty.is_simple() => {
            let value_code = emit_scalar_expr(value, env)?;
            emit_write_scalar(&place.buffer, &place.offset, place.width, &place.ty, &value_code, env, out);
            Ok(())
        }
        Resolved::Addressed(place) => {
            // Composite assignment: Murphi's grammar only allows another
            // l-value of the same type on the right, never a literal.
            let src = match value {
                Expr::VarRead { path, .. } => resolve_lvalue(path, env)?,
                _ => return Err("codegen: composite assignment from a non-lvalue expression".to_string()),
            };
            let Resolved::Addressed(src_place) = src else {
                return Err("codegen: composite assignment source resolved to a scalar".to_string());
            };
            // Clone the source first: `buffer` and `src_place.buffer` may
            // name the same underlying `State` (e.g. copying one array
            // element over another within the same array), which would
            // otherwise borrow it both mutably and immutably in one call.
            writeln!(
                out,
                "    {{ let __src = {}.clone(); {}.blit({}, &__src, {}, {}); }}",
                src_place.buffer, place.buffer, place.offset, src_place.offset, place.width
            )
            .ok();
            Ok(())
        }
    }
}

fn emit_clear(target: &LValue, env: &Env, out: &mut String) -> CResult<()> {
    let place = match resolve_lvalue(target, env)? {
        Resolved::Scalar(name) => {
            writeln!(out, "    {name} = 0;").ok();
            return Ok(());
        }
        Resolved::Addressed(p) => p,
    };
    emit_clear_place(&place, out);
    Ok(())
}

fn emit_clear_place(place: &crate::codegen::env::Place, out: &mut String) {
    use crate::ast::Type;
    match &place.ty {
        Type::Record { fields } => {
            for slot in crate::codegen::state::record_layout(fields) {
                let field_place = crate::codegen::env::Place {
                    buffer: place.buffer.clone(),
                    offset: format!("({} + {})", place.offset, slot.offset),
                    width: slot.width,
                    ty: slot.ty,
                };
                emit_clear_place(&field_place, out);
            }
        }
        Type::Array { index, element } => {
            let n = cardinality(index);
            let ew = crate::codegen::state::element_width(element);
            writeln!(out, "    for __i in 0..{n}u32 {{").ok();
            let elem_place = crate::codegen::env::Place {
                buffer: place.buffer.clone(),
                offset: format!("({} + __i * {ew})", place.offset),
                width: ew,
                ty: element.as_ref().clone(),
            };
            emit_clear_place(&elem_place, out);
            writeln!(out, "    }}").ok();
        }
        _ => {
            // Clear zeroes the raw encoding directly rather than going
            // through `emit_write_scalar`'s range check: 0 is always a
            // valid encoding (it decodes to `lo` for a Range, member 0
            // for an Enum/Scalarset, `false` for a Boolean).
            writeln!(out, "    {}.write_bits({}, {}, 0);", place.buffer, place.offset, place.width).ok();
        }
    }
}

/// Builds the argument list for a call to `name`, forwarding by-value
/// scalars, by-value composite copies, and by-reference `(buffer,
/// offset)` pairs per the parameter's kind.
///
/// A by-value composite argument is blitted into a throwaway owned
/// `State` first (`env.call_sigs` tells us which side of the
/// by-value/by-reference line a given positional argument falls on) —
/// passing the caller's own buffer/offset straight through, as a
/// by-reference argument does, would let the callee's writes leak
/// back into the caller's variable.
fn build_call_args(name: &str, args: &[Expr], env: &Env) -> CResult<Vec<String>> {
    let by_reference = env.call_sigs.get(name);
    let mut parts = Vec::with_capacity(args.len());
    for (i, a) in args.iter().enumerate() {
        let code = match a {
            Expr::VarRead { path, .. } => match resolve_lvalue(path, env)? {
                Resolved::Scalar(code) => code,
                Resolved::Addressed(place) if place.ty.is_simple() => {
                    read_scalar(&place.buffer, &place.offset, place.width, &place.ty)
                }
                Resolved::Addressed(place) => {
                    let is_by_ref = by_reference.and_then(|flags| flags.get(i)).copied().unwrap_or(false);
                    if is_by_ref {
                        format!("&mut {}, {}", place.buffer, place.offset)
                    } else {
                        // By-value: blit into a single owned `State`
                        // sized to this place's own width, not the
                        // caller's whole buffer, and pass it by value
                        // (one Rust argument, matching the callee's
                        // `ByValCompositeParam` signature).
                        let bytes = place.width.div_ceil(8);
                        format!(
                            "{{ let mut __tmp = rumur_runtime::State::new({bytes} as usize); __tmp.blit(0, &{}, {}, {}); __tmp }}",
                            place.buffer, place.offset, place.width
                        )
                    }
                }
            },
            other => emit_scalar_expr(other, env)?,
        };
        parts.push(code);
    }
    Ok(parts)
}

fn emit_call(name: &str, args: &[Expr], env: &Env) -> CResult<String> {
    let parts = build_call_args(name, args, env)?;
    Ok(format!("proc_{}(state, {})", safe_ident(name), parts.join(", ")))
}
