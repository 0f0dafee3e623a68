//! Per-rule/per-callable name environment used while emitting
//! expressions and statements.
//!
//! Every name a body can read or write — a state variable, a rule or
//! procedure local, a by-value or by-reference parameter, a `const`,
//! or an `alias` binding — resolves through one `Env`. Resolution
//! bottoms out in either a bare scalar Rust identifier (`VarKind::
//! LocalScalar`/`Const`) or a `(buffer, offset)` pair addressing a
//! `rumur_runtime::State` (`VarKind::State`/`*Composite*`/
//! `ByRefParam`), which is all `statements.rs` needs to read, write, or
//! blit a value.

use crate::ast::{Expr, LValue, LValueStep, Type};
use crate::codegen::state::{element_width, record_layout};
use crate::codegen::types::safe_ident;
use crate::layout::encoded_width;
use std::collections::HashMap;

#[derive(Clone, Debug)]
pub enum VarKind {
    /// A top-level state variable; addressed at `OFFSET_<NAME>` in the
    /// single `state: &mut State` the rule/function was handed.
    /// `width` is the checker's slot width, which already budgets an
    /// extra undefined-sentinel value when `isundefined` is ever
    /// applied to this variable — it must be used instead of
    /// recomputing from `ty` so reads/writes agree with the slot the
    /// layout planner actually reserved.
    State { ty: Type, width: u32 },
    /// A rule/function-local scalar, represented as a plain Rust `i64`
    /// local named `safe_ident(name)`.
    LocalScalar { ty: Type },
    /// A rule/function-local composite, backed by its own owned
    /// `rumur_runtime::State` buffer named `safe_ident(name)`.
    LocalComposite { ty: Type },
    /// A `var` (by-reference) parameter: the caller's buffer and
    /// offset are forwarded as two extra arguments,
    /// `<name>_buf`/`<name>_off`.
    ByRefParam { ty: Type },
    /// A by-value composite parameter: the caller blits a fresh copy
    /// into an owned local before the call; inside the callee it is
    /// addressed exactly like `LocalComposite`.
    ByValCompositeParam { ty: Type },
    /// `const NAME = ...;`, folded to a literal by the simplifier.
    Const { value: i64, ty: Type },
    /// `alias NAME = <lvalue> do ... end`; reads/writes of `NAME`
    /// resolve through `target` before addressing begins.
    Alias { target: LValue },
}

impl VarKind {
    pub fn ty(&self) -> &Type {
        match self {
            VarKind::State { ty, .. }
            | VarKind::LocalScalar { ty }
            | VarKind::LocalComposite { ty }
            | VarKind::ByRefParam { ty }
            | VarKind::ByValCompositeParam { ty }
            | VarKind::Const { ty, .. } => ty,
            VarKind::Alias { .. } => unreachable!("aliases are resolved before ty() is asked"),
        }
    }
}

#[derive(Clone)]
pub struct Env {
    pub vars: HashMap<String, VarKind>,
    pub type_decls: HashMap<String, Type>,
    /// `true` while emitting the body of a Murphi `function` (which
    /// returns `Result<i64, String>`); `false` for a procedure, rule
    /// guard/body, or invariant (which return `Option<String>`). Error
    /// propagation (`Error`/`Assert`/a called procedure's failure) is
    /// worded as `Err(..)` or `Some(..)` accordingly.
    pub returns_value: bool,
    /// Per-parameter `by_reference` flags for every declared
    /// function/procedure, keyed by its Murphi name. Needed at a call
    /// site to tell a by-value composite argument (which must be
    /// blitted into a fresh temporary so the callee's writes never
    /// reach the caller's buffer) from a by-reference one (which is
    /// passed the caller's own `(buffer, offset)` untouched).
    pub call_sigs: HashMap<String, Vec<bool>>,
}

impl Env {
    pub fn new(type_decls: HashMap<String, Type>) -> Self {
        Env { vars: HashMap::new(), type_decls, returns_value: false, call_sigs: HashMap::new() }
    }

    pub fn bind(&mut self, name: &str, kind: VarKind) {
        self.vars.insert(name.to_string(), kind);
    }

    /// A copy of this environment with one extra binding, used to
    /// enter a quantifier/alias/local-decl scope without disturbing
    /// the caller's environment.
    pub fn child_with(&self, name: &str, kind: VarKind) -> Env {
        let mut child = self.clone();
        child.bind(name, kind);
        child
    }

    pub fn lookup(&self, name: &str) -> Option<&VarKind> {
        self.vars.get(name)
    }

    pub fn enum_member_index(&self, type_name: &str, member: &str) -> Option<u64> {
        match self.type_decls.get(type_name)? {
            Type::Enum { members } => members.iter().position(|m| m == member).map(|p| p as u64),
            _ => None,
        }
    }
}

/// The fully-resolved address of an l-value: a Rust expression
/// yielding the buffer (`&State`/`&mut State`) and one yielding the
/// bit offset within it, plus the resolved Murphi type at that
/// address.
pub struct Place {
    pub buffer: String,
    pub offset: String,
    pub ty: Type,
    /// The bit width actually reserved for this slot. For a top-level
    /// state variable this comes from the checker (and may exceed
    /// `layout::encoded_width(&ty, false)` when `isundefined` budgeted
    /// a sentinel); everywhere else it is `encoded_width(&ty, false)`.
    pub width: u32,
}

/// A resolved l-value is either a bare scalar local/const (no buffer
/// to address — just a Rust value expression) or a `Place` in some
/// `State` buffer.
pub enum Resolved {
    Scalar(String),
    Addressed(Place),
}

/// Rewrites `lv`'s root through any chain of `alias` bindings, so the
/// caller never has to special-case `VarKind::Alias` itself.
fn dealias(lv: &LValue, env: &Env) -> LValue {
    let mut current = lv.clone();
    loop {
        match env.lookup(&current.root) {
            Some(VarKind::Alias { target }) => {
                let mut steps = target.steps.clone();
                steps.extend(current.steps.into_iter());
                current = LValue { root: target.root.clone(), steps, loc: lv.loc };
            }
            _ => return current,
        }
    }
}

/// Resolves `lv` to either a bare scalar or an addressed `Place`,
/// composing offsets through field/index steps per §4.F.
pub fn resolve_lvalue(lv: &LValue, env: &Env) -> Result<Resolved, String> {
    let lv = dealias(lv, env);
    let kind = env
        .lookup(&lv.root)
        .ok_or_else(|| format!("codegen: unresolved identifier '{}'", lv.root))?;

    if lv.steps.is_empty() {
        return Ok(match kind {
            VarKind::Const { value, .. } => Resolved::Scalar(value.to_string()),
            VarKind::LocalScalar { .. } => Resolved::Scalar(safe_ident(&lv.root)),
            VarKind::State { ty, width } => Resolved::Addressed(Place {
                buffer: "state".to_string(),
                offset: crate::codegen::types::offset_const_name(&lv.root),
                ty: ty.clone(),
                width: *width,
            }),
            VarKind::LocalComposite { ty } | VarKind::ByValCompositeParam { ty } => Resolved::Addressed(Place {
                buffer: safe_ident(&lv.root),
                offset: "0".to_string(),
                width: encoded_width(ty, false),
                ty: ty.clone(),
            }),
            VarKind::ByRefParam { ty } => Resolved::Addressed(Place {
                buffer: format!("{}_buf", safe_ident(&lv.root)),
                offset: format!("{}_off", safe_ident(&lv.root)),
                width: encoded_width(ty, false),
                ty: ty.clone(),
            }),
            VarKind::Alias { .. } => unreachable!("dealias already followed the chain"),
        });
    }

    let mut place = match kind {
        VarKind::State { ty, width } => Place {
            buffer: "state".to_string(),
            offset: crate::codegen::types::offset_const_name(&lv.root),
            ty: ty.clone(),
            width: *width,
        },
        VarKind::LocalComposite { ty } | VarKind::ByValCompositeParam { ty } => {
            Place { buffer: safe_ident(&lv.root), offset: "0".to_string(), width: encoded_width(ty, false), ty: ty.clone() }
        }
        VarKind::ByRefParam { ty } => Place {
            buffer: format!("{}_buf", safe_ident(&lv.root)),
            offset: format!("{}_off", safe_ident(&lv.root)),
            width: encoded_width(ty, false),
            ty: ty.clone(),
        },
        VarKind::Const { .. } | VarKind::LocalScalar { .. } => {
            return Err(format!("codegen: '{}' is a scalar and cannot be indexed or have fields", lv.root));
        }
        VarKind::Alias { .. } => unreachable!(),
    };

    for step in &lv.steps {
        place = apply_step(place, step, env)?;
    }
    Ok(Resolved::Addressed(place))
}

fn apply_step(place: Place, step: &LValueStep, env: &Env) -> Result<Place, String> {
    match step {
        LValueStep::Field(name) => match &place.ty {
            Type::Record { fields } => {
                let slot = record_layout(fields)
                    .into_iter()
                    .find(|s| &s.name == name)
                    .ok_or_else(|| format!("codegen: no field '{name}' on this record"))?;
                Ok(Place { buffer: place.buffer, offset: format!("({} + {})", place.offset, slot.offset), width: slot.width, ty: slot.ty })
            }
            _ => Err(format!("codegen: '.{name}' on a non-record place")),
        },
        LValueStep::Index(idx) => match &place.ty {
            Type::Array { index, element } => {
                let ew = element_width(element);
                let index_lo = match index.as_ref() {
                    Type::Range { lo, .. } => *lo,
                    _ => 0,
                };
                let offset_expr = match const_i64(idx, env) {
                    Some(v) => format!("({} + {})", place.offset, (v - index_lo) as u64 * ew as u64),
                    None => {
                        let idx_code = super::statements::emit_scalar_expr(idx, env)?;
                        format!("({} + (({idx_code} - {index_lo}) as u32) * {ew})", place.offset)
                    }
                };
                Ok(Place { buffer: place.buffer, offset: offset_expr, width: ew, ty: element.as_ref().clone() })
            }
            _ => Err("codegen: '[...]' on a non-array place".to_string()),
        },
    }
}

/// Evaluates `e` at codegen time if every leaf is a literal or a
/// `const`; used to keep constant array indices and ruleset/quantifier
/// bounds as compile-time offsets instead of runtime arithmetic.
pub fn const_i64(e: &Expr, env: &Env) -> Option<i64> {
    match e {
        Expr::IntLit { value, .. } => Some(*value),
        Expr::BoolLit { value, .. } => Some(if *value { 1 } else { 0 }),
        Expr::EnumLit { type_name, member, .. } => env.enum_member_index(type_name, member).map(|i| i as i64),
        Expr::VarRead { path, .. } if path.steps.is_empty() => match env.lookup(&path.root) {
            Some(VarKind::Const { value, .. }) => Some(*value),
            _ => None,
        },
        Expr::Bin { op, lhs, rhs, .. } => {
            let l = const_i64(lhs, env)?;
            let r = const_i64(rhs, env)?;
            use crate::ast::BinOp::*;
            match op {
                Add => Some(l + r),
                Sub => Some(l - r),
                Mul => Some(l * r),
                Div if r != 0 => Some(l / r),
                Mod if r != 0 => Some(l % r),
                _ => None,
            }
        }
        Expr::Not { operand, .. } => const_i64(operand, env).map(|v| if v == 0 { 1 } else { 0 }),
        _ => None,
    }
}
