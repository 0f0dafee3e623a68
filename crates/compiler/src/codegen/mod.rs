//! Code generator (component F): emits a self-contained Rust module
//! for the checker described in §4.F, linking against
//! [`rumur_runtime`] for the parallel-BFS scheduler, bit-packed
//! `State`, symmetry canonicaliser and trace printer (§4.G). The
//! target language is Rust — the spec leaves the target language
//! unfixed (§1 Non-goals) so long as it can express bit-packed state,
//! atomic double-word CAS and POSIX-like threads, all three of which
//! `rumur_runtime` already supplies.
//!
//! Emission order follows §4.F exactly: prologue, constants, type
//! width/offset constants, functions/procedures, one guard/body
//! function pair per expanded rule, the rule table, and `main`.

pub mod env;
pub mod error;
pub mod state;
pub mod statements;
pub mod types;

use crate::ast::{Callable, Expr, Model, Param, Quantifier, QuantifierKind, Rule, Stmt, Type, VarDecl};
use crate::codegen::env::{Env, VarKind};
use crate::codegen::error::{CodeGenError, CodeGenResult};
use crate::codegen::state::{element_width, record_layout};
use crate::codegen::statements::{emit_scalar_expr, emit_stmt, quantifier_domain};
use crate::codegen::types::{offset_const_name, safe_ident, width_const_name};
use crate::layout::{cardinality, encoded_width};
use crate::CompiledModel;
use std::collections::HashMap;
use std::fmt::Write as _;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum OutputFormat {
    Plain,
    MachineReadable,
}

/// Options baked into the emitted checker at generation time (§6's
/// generator CLI flags that have no equivalent runtime flag on the
/// checker binary — `--threads` and `--output-format` are overridable
/// at runtime too, so they become *defaults* here, not hard-codes).
#[derive(Clone)]
pub struct GenConfig {
    pub default_threads: Option<usize>,
    pub sandbox: bool,
    pub output_format: OutputFormat,
    /// Bakes scalarset canonicalization into the emitted checker's
    /// scheduler config (`--symmetry-reduction`, default on). Turning
    /// it off is a debugging escape hatch for comparing reduced vs.
    /// full state-space counts, not something a model ever needs.
    pub symmetry_reduction: bool,
}

impl Default for GenConfig {
    fn default() -> Self {
        GenConfig { default_threads: None, sandbox: false, output_format: OutputFormat::Plain, symmetry_reduction: true }
    }
}

/// A fully Cartesian-producted rule/startstate/cover/liveness instance
/// (§4.F point 7), ready to become one emitted function (or function
/// pair) plus, for transition rules, one rule-table row.
struct FlatRule {
    display_name: String,
    env: Env,
    kind: FlatKind,
}

enum FlatKind {
    Startstate { decls: Vec<VarDecl>, body: Vec<Stmt> },
    Simple { guard: Option<Expr>, decls: Vec<VarDecl>, body: Vec<Stmt> },
    Liveness { predicate: Expr },
    Cover { predicate: Expr },
}

/// Emits the full checker source for `compiled`, ready to be compiled
/// (by `rustc`/`cargo`) against `rumur-runtime`.
pub fn generate(compiled: &CompiledModel, config: &GenConfig) -> CodeGenResult<String> {
    let model = &compiled.model;
    let checker = &compiled.checker;

    let mut type_decls = HashMap::new();
    for t in &model.types {
        type_decls.insert(t.name.clone(), checker.resolve_type(&t.ty)?);
    }

    let mut call_sigs = HashMap::new();
    for c in &model.callables {
        call_sigs.insert(c.name.clone(), c.params.iter().map(|p| p.by_reference).collect());
    }

    let mut base_env = Env::new(type_decls.clone());
    base_env.call_sigs = call_sigs;
    for c in &model.consts {
        let value = env::const_i64(&c.value, &base_env)
            .ok_or_else(|| format!("codegen: const '{}' did not fold to a literal", c.name))?;
        base_env.bind(&c.name, VarKind::Const { value, ty: Type::Range { lo: value, hi: value } });
    }
    for v in &model.vars {
        let (ty, _offset, width) = compiled
            .state_var(&v.name)
            .ok_or_else(|| format!("codegen: no state slot recorded for '{}'", v.name))?;
        base_env.bind(&v.name, VarKind::State { ty, width });
    }

    let mut out = String::new();
    emit_prologue(&mut out);
    emit_state_layout_consts(&mut out, compiled, model)?;
    emit_callables(&mut out, model, checker, &base_env)?;

    let mut flat = Vec::new();
    for r in &model.rules {
        flatten_rule(r, &base_env, checker, &mut flat)?;
    }

    let mut startstate_fns = Vec::new();
    let mut rule_rows: Vec<(String, Option<String>, String)> = Vec::new();
    let mut cover_rows: Vec<(String, String)> = Vec::new();

    for (i, flat_rule) in flat.iter().enumerate() {
        match &flat_rule.kind {
            FlatKind::Startstate { decls, body } => {
                let fn_name = format!("startstate_{i}");
                emit_startstate_fn(&mut out, &fn_name, decls, body, &flat_rule.env, checker)?;
                startstate_fns.push(fn_name);
            }
            FlatKind::Simple { guard, decls, body } => {
                let guard_fn = guard
                    .as_ref()
                    .map(|g| {
                        let fn_name = format!("guard_{i}");
                        emit_guard_fn(&mut out, &fn_name, g, &flat_rule.env)?;
                        Ok::<String, CodeGenError>(fn_name)
                    })
                    .transpose()?;
                let body_fn = format!("body_{i}");
                emit_body_fn(&mut out, &body_fn, decls, body, &flat_rule.env, checker)?;
                rule_rows.push((flat_rule.display_name.clone(), guard_fn, body_fn));
            }
            FlatKind::Liveness { predicate } | FlatKind::Cover { predicate } => {
                let fn_name = format!("cover_{i}");
                emit_guard_fn(&mut out, &fn_name, predicate, &flat_rule.env)?;
                cover_rows.push((flat_rule.display_name.clone(), fn_name));
            }
        }
    }

    emit_rule_table(&mut out, &startstate_fns, &rule_rows, &cover_rows);
    emit_renderer(&mut out, compiled, model, checker)?;
    let scalarset_groups = collect_scalarset_groups(compiled, model)?;
    emit_main(&mut out, config, &scalarset_groups);

    Ok(out)
}

/// One scalarset type's worth of symmetry information: every state
/// slot that stores a value of the type directly, plus every array
/// the type indexes (so the canonicalizer can permute array positions,
/// not only relabel stored values — an `array[t] of boolean` has no
/// `Type::Scalarset` value slots at all, yet is exactly the case §4.G
/// and the GLOSSARY call out as the one symmetry reduction must
/// handle).
pub struct ScalarsetGroupSpec {
    pub cardinality: u32,
    pub value_slots: Vec<(u32, u32)>,
    pub index_blocks: Vec<(u32, u32)>,
}

/// Every scalarset type's symmetry information, grouped by
/// cardinality. Grouping key is cardinality rather than a type name
/// because `ast::Type::Scalarset` carries no declared-type identity
/// once resolved — two distinct `scalarset(n)` typedefs of equal `n`
/// are indistinguishable here and are canonicalized together, which is
/// still sound (a wider equivalence than the model draws, never a
/// narrower one).
fn collect_scalarset_groups(compiled: &CompiledModel, model: &Model) -> CodeGenResult<Vec<ScalarsetGroupSpec>> {
    let mut values: std::collections::BTreeMap<u32, Vec<(u32, u32)>> = std::collections::BTreeMap::new();
    let mut indices: std::collections::BTreeMap<u32, Vec<(u32, u32)>> = std::collections::BTreeMap::new();
    for v in &model.vars {
        let (_, offset, _) = compiled
            .state_var(&v.name)
            .ok_or_else(|| format!("codegen: no state slot recorded for '{}'", v.name))?;
        let resolved = compiled.checker.resolve_type(&v.ty)?;
        collect_scalarset_groups_type(&resolved, offset, &mut values, &mut indices);
    }
    let cardinalities: std::collections::BTreeSet<u32> = values.keys().chain(indices.keys()).copied().collect();
    Ok(cardinalities
        .into_iter()
        .map(|n| ScalarsetGroupSpec {
            cardinality: n,
            value_slots: values.remove(&n).unwrap_or_default(),
            index_blocks: indices.remove(&n).unwrap_or_default(),
        })
        .collect())
}

fn collect_scalarset_groups_type(
    ty: &Type,
    offset: u32,
    values: &mut std::collections::BTreeMap<u32, Vec<(u32, u32)>>,
    indices: &mut std::collections::BTreeMap<u32, Vec<(u32, u32)>>,
) {
    match ty {
        Type::Record { fields } => {
            for slot in record_layout(fields) {
                collect_scalarset_groups_type(&slot.ty, offset + slot.offset, values, indices);
            }
        }
        Type::Array { index, element } => {
            let ew = element_width(element);
            if let Type::Scalarset { n } = index.as_ref() {
                indices.entry(*n as u32).or_default().push((offset, ew));
            }
            let n = cardinality(index);
            for i in 0..n {
                collect_scalarset_groups_type(element, offset + (i as u32) * ew, values, indices);
            }
        }
        Type::Scalarset { n } => {
            values.entry(*n as u32).or_default().push((offset, encoded_width(ty, false)));
        }
        _ => {}
    }
}

fn emit_prologue(out: &mut String) {
    out.push_str(
        "// Generated by rumur. Do not edit by hand.\n\
         #![allow(unused_mut, unused_parens, clippy::all)]\n\
         use rumur_runtime::state::State;\n\
         use rumur_runtime::scheduler::{explore, RuleSet, SchedulerConfig};\n\
         use rumur_runtime::trace::StateRenderer;\n\
         use rumur_runtime::progress::Deadline;\n\n\
         #[inline]\n\
         fn rt_div(a: i64, b: i64) -> i64 {\n    if b == 0 { panic!(\"runtime error: division by zero\"); }\n    a.wrapping_div(b)\n}\n\n\
         #[inline]\n\
         fn rt_mod(a: i64, b: i64) -> i64 {\n    if b == 0 { panic!(\"runtime error: modulo by zero\"); }\n    a.wrapping_rem(b)\n}\n\n\
         fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {\n\
         \u{20}\u{20}\u{20}\u{20}if let Some(s) = payload.downcast_ref::<&str>() {\n        s.to_string()\n    } else if let Some(s) = payload.downcast_ref::<String>() {\n        s.clone()\n    } else {\n        \"runtime error\".to_string()\n    }\n}\n\n",
    );
}

fn emit_state_layout_consts(out: &mut String, compiled: &CompiledModel, model: &Model) -> CodeGenResult<()> {
    writeln!(out, "pub const STATE_BITS: u32 = {};", compiled.total_state_bits())?;
    writeln!(out, "pub const STATE_BYTES: usize = {};", compiled.total_state_bits().div_ceil(8))?;
    for v in &model.vars {
        let (_, offset, width) = compiled
            .state_var(&v.name)
            .ok_or_else(|| format!("codegen: no state slot recorded for '{}'", v.name))?;
        writeln!(out, "pub const {}: u32 = {offset};", offset_const_name(&v.name))?;
        writeln!(out, "pub const {}: u32 = {width};", width_const_name(&v.name))?;
    }
    out.push('\n');
    Ok(())
}

/// Declares `name` as a local in `env` and emits its initialising
/// `let mut` line: a zeroed `i64` for a scalar, a zeroed owned `State`
/// for a composite.
fn declare_local(env: &mut Env, name: &str, ty: &Type, out: &mut String) {
    let safe = safe_ident(name);
    if ty.is_simple() {
        env.bind(name, VarKind::LocalScalar { ty: ty.clone() });
        writeln!(out, "    let mut {safe}: i64 = 0;").ok();
    } else {
        env.bind(name, VarKind::LocalComposite { ty: ty.clone() });
        let bytes = encoded_width(ty, false).div_ceil(8);
        writeln!(out, "    let mut {safe} = State::new({bytes} as usize);").ok();
    }
}

fn emit_callables(out: &mut String, model: &Model, checker: &crate::typecheck::TypeChecker, base_env: &Env) -> CodeGenResult<()> {
    for c in &model.callables {
        emit_callable(out, c, checker, base_env)?;
    }
    Ok(())
}

fn emit_callable(out: &mut String, c: &Callable, checker: &crate::typecheck::TypeChecker, base_env: &Env) -> CodeGenResult<()> {
    let mut env = base_env.clone();
    env.returns_value = c.return_type.is_some();

    let mut params = Vec::new();
    for p in &c.params {
        emit_param(&mut env, p, checker, &mut params)?;
    }

    let ret_ty = if c.return_type.is_some() { "Result<i64, String>" } else { "Option<String>" };
    writeln!(out, "fn {}(state: &mut State{}) -> {ret_ty} {{", callable_ident(c), comma_join(&params))?;

    let mut body_locals = String::new();
    for d in &c.decls {
        let resolved = checker.resolve_type(&d.ty)?;
        declare_local(&mut env, &d.name, &resolved, &mut body_locals);
    }
    out.push_str(&body_locals);

    let mut body = String::new();
    for s in &c.body {
        emit_stmt(s, &env, &mut body)?;
    }
    out.push_str(&body);

    if c.return_type.is_some() {
        writeln!(out, "    Err(\"function '{}' fell through without returning\".to_string())", c.name)?;
    } else {
        writeln!(out, "    None")?;
    }
    writeln!(out, "}}\n")?;
    Ok(())
}

fn callable_ident(c: &Callable) -> String {
    if c.return_type.is_some() {
        format!("func_{}", safe_ident(&c.name))
    } else {
        format!("proc_{}", safe_ident(&c.name))
    }
}

fn comma_join(params: &[String]) -> String {
    if params.is_empty() {
        String::new()
    } else {
        format!(", {}", params.join(", "))
    }
}

fn emit_param(env: &mut Env, p: &Param, checker: &crate::typecheck::TypeChecker, params: &mut Vec<String>) -> CodeGenResult<()> {
    let resolved = checker.resolve_type(&p.ty)?;
    let safe = safe_ident(&p.name);
    if p.by_reference {
        env.bind(&p.name, VarKind::ByRefParam { ty: resolved });
        params.push(format!("{safe}_buf: &mut State"));
        params.push(format!("{safe}_off: u32"));
    } else if resolved.is_simple() {
        env.bind(&p.name, VarKind::LocalScalar { ty: resolved });
        params.push(format!("mut {safe}: i64"));
    } else {
        env.bind(&p.name, VarKind::ByValCompositeParam { ty: resolved });
        params.push(format!("mut {safe}: State"));
    }
    Ok(())
}

/// Recursively expands `r` (and any enclosing ruleset/alias binders
/// already folded into `env`) into its leaf instances.
fn flatten_rule(
    r: &Rule,
    env: &Env,
    checker: &crate::typecheck::TypeChecker,
    acc: &mut Vec<FlatRule>,
) -> CodeGenResult<()> {
    match r {
        Rule::Startstate { name, decls, body, .. } => {
            acc.push(FlatRule {
                display_name: name.clone(),
                env: env.clone(),
                kind: FlatKind::Startstate { decls: decls.clone(), body: body.clone() },
            });
        }
        Rule::Simple { name, guard, decls, body, .. } => {
            acc.push(FlatRule {
                display_name: name.clone(),
                env: env.clone(),
                kind: FlatKind::Simple { guard: guard.clone(), decls: decls.clone(), body: body.clone() },
            });
        }
        Rule::Invariant { .. } => {
            return Err(CodeGenError::Logic(
                "codegen: an invariant reached the generator unlowered".to_string(),
            ));
        }
        Rule::Liveness { name, predicate, .. } => {
            acc.push(FlatRule { display_name: name.clone(), env: env.clone(), kind: FlatKind::Liveness { predicate: predicate.clone() } });
        }
        Rule::Cover { name, predicate, .. } => {
            acc.push(FlatRule { display_name: name.clone(), env: env.clone(), kind: FlatKind::Cover { predicate: predicate.clone() } });
        }
        Rule::RuleSet { quantifiers, rules, .. } => {
            flatten_ruleset(quantifiers, rules, 0, env.clone(), checker, acc)?;
        }
        Rule::AliasRule { bindings, rules, .. } => {
            let mut child = env.clone();
            for (name, target) in bindings {
                child.bind(name, VarKind::Alias { target: target.clone() });
            }
            for inner in rules {
                flatten_rule(inner, &child, checker, acc)?;
            }
        }
    }
    Ok(())
}

fn flatten_ruleset(
    quantifiers: &[Quantifier],
    rules: &[Rule],
    idx: usize,
    env: Env,
    checker: &crate::typecheck::TypeChecker,
    acc: &mut Vec<FlatRule>,
) -> CodeGenResult<()> {
    if idx == quantifiers.len() {
        for inner in rules {
            flatten_rule(inner, &env, checker, acc)?;
        }
        return Ok(());
    }
    let q = &quantifiers[idx];
    let resolved_kind = resolve_quantifier_kind(&q.kind, checker)?;
    let (lo, hi, step) = quantifier_domain(&resolved_kind, &env).map_err(CodeGenError::Logic)?;
    let mut v = lo;
    while v <= hi {
        let mut child = env.clone();
        child.bind(&q.name, VarKind::Const { value: v, ty: Type::Range { lo, hi } });
        flatten_ruleset(quantifiers, rules, idx + 1, child, checker, acc)?;
        v += step;
    }
    Ok(())
}

fn resolve_quantifier_kind(kind: &QuantifierKind, checker: &crate::typecheck::TypeChecker) -> CodeGenResult<QuantifierKind> {
    match kind {
        QuantifierKind::OverType(ty) => Ok(QuantifierKind::OverType(checker.resolve_type(ty)?)),
        QuantifierKind::Range { .. } => Ok(kind.clone()),
    }
}

fn emit_startstate_fn(
    out: &mut String,
    fn_name: &str,
    decls: &[VarDecl],
    body: &[Stmt],
    base_env: &Env,
    checker: &crate::typecheck::TypeChecker,
) -> CodeGenResult<()> {
    let mut env = base_env.clone();
    env.returns_value = true;
    writeln!(out, "fn {fn_name}() -> Result<State, String> {{")?;
    writeln!(out, "    let mut state = State::new(STATE_BYTES);")?;
    let mut locals = String::new();
    for d in decls {
        let resolved = checker.resolve_type(&d.ty)?;
        declare_local(&mut env, &d.name, &resolved, &mut locals);
    }
    out.push_str(&locals);
    for s in body {
        emit_stmt(s, &env, out)?;
    }
    writeln!(out, "    Ok(state)")?;
    writeln!(out, "}}\n")?;
    Ok(())
}

fn emit_guard_fn(out: &mut String, fn_name: &str, predicate: &Expr, env: &Env) -> CodeGenResult<()> {
    let code = emit_scalar_expr(predicate, env)?;
    writeln!(out, "fn {fn_name}(state: &State) -> bool {{\n    ({code}) != 0\n}}\n")?;
    Ok(())
}

fn emit_body_fn(
    out: &mut String,
    fn_name: &str,
    decls: &[VarDecl],
    body: &[Stmt],
    base_env: &Env,
    checker: &crate::typecheck::TypeChecker,
) -> CodeGenResult<()> {
    let mut env = base_env.clone();
    env.returns_value = false;
    writeln!(out, "fn {fn_name}(state: &mut State) -> Option<String> {{")?;
    let mut locals = String::new();
    for d in decls {
        let resolved = checker.resolve_type(&d.ty)?;
        declare_local(&mut env, &d.name, &resolved, &mut locals);
    }
    out.push_str(&locals);
    for s in body {
        emit_stmt(s, &env, out)?;
    }
    writeln!(out, "    None")?;
    writeln!(out, "}}\n")?;
    Ok(())
}

fn emit_rule_table(
    out: &mut String,
    startstate_fns: &[String],
    rule_rows: &[(String, Option<String>, String)],
    cover_rows: &[(String, String)],
) {
    out.push_str("struct RuleDef {\n    name: &'static str,\n    guard: Option<fn(&State) -> bool>,\n    body: fn(&mut State) -> Option<String>,\n}\n\n");
    writeln!(out, "static RULES: &[RuleDef] = &[").ok();
    for (name, guard, body) in rule_rows {
        let guard_code = match guard {
            Some(g) => format!("Some({g})"),
            None => "None".to_string(),
        };
        writeln!(out, "    RuleDef {{ name: {:?}, guard: {guard_code}, body: {body} }},", name).ok();
    }
    out.push_str("];\n\n");

    writeln!(out, "static COVERAGE_NAMES: &[&str] = &[").ok();
    for (name, _) in cover_rows {
        writeln!(out, "    {:?},", name).ok();
    }
    out.push_str("];\n\n");

    out.push_str("fn check_coverage_impl(state: &State, hits: &mut [bool]) {\n");
    for (i, (_, fn_name)) in cover_rows.iter().enumerate() {
        writeln!(out, "    if {fn_name}(state) {{ hits[{i}] = true; }}").ok();
    }
    out.push_str("}\n\n");

    out.push_str("fn build_startstates() -> Vec<State> {\n    let mut v = Vec::new();\n");
    for f in startstate_fns {
        writeln!(out, "    match {f}() {{").ok();
        out.push_str("        Ok(s) => v.push(s),\n");
        writeln!(out, "        Err(e) => panic!(\"startstate error: {{e}}\"),").ok();
        out.push_str("    }\n");
    }
    out.push_str("    v\n}\n\n");

    out.push_str(
        "struct GeneratedRules;\n\n\
         impl RuleSet for GeneratedRules {\n\
         \u{20}\u{20}\u{20}\u{20}fn startstates(&self) -> Vec<State> {\n        build_startstates()\n    }\n\n\
         \u{20}\u{20}\u{20}\u{20}fn fire_rules(&self, state: &State, out: &mut Vec<(State, u32)>) -> Option<String> {\n\
         \u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}for (idx, rule) in RULES.iter().enumerate() {\n\
         \u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}let enabled = match rule.guard {\n                Some(g) => g(state),\n                None => true,\n            };\n\
         \u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}if !enabled {\n                continue;\n            }\n\
         \u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}let mut next = state.clone();\n\
         \u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}let body = rule.body;\n\
         \u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| body(&mut next)));\n\
         \u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}match result {\n\
         \u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}Ok(Some(message)) => return Some(format!(\"{}: {}\", rule.name, message)),\n\
         \u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}Ok(None) => {}\n\
         \u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}Err(payload) => return Some(format!(\"{}: {}\", rule.name, panic_message(payload))),\n\
         \u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}}\n\
         \u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}out.push((next, idx as u32));\n\
         \u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}}\n        None\n    }\n\n\
         \u{20}\u{20}\u{20}\u{20}fn coverage_points(&self) -> &[&'static str] {\n        COVERAGE_NAMES\n    }\n\n\
         \u{20}\u{20}\u{20}\u{20}fn check_coverage(&self, state: &State, hits: &mut [bool]) {\n        check_coverage_impl(state, hits);\n    }\n\
         }\n\n",
    );
}

/// Expands a state variable's type into its scalar leaves: `(display
/// name, offset expression, width, type)`, walking records in their
/// packed field order and arrays element by element. Composite values
/// are never rendered as a single opaque blob — the trace format
/// (§4.G, §6) prints one `var := value` line per scalar leaf, matching
/// what `put` would print for a fully-indexed path.
fn flatten_var_paths(name: &str, ty: &Type, offset_expr: String) -> Vec<(String, String, u32, Type)> {
    match ty {
        Type::Record { fields } => {
            let mut out = Vec::new();
            for slot in record_layout(fields) {
                let child_offset = format!("({offset_expr} + {})", slot.offset);
                out.extend(flatten_var_paths(&format!("{name}.{}", slot.name), &slot.ty, child_offset));
            }
            out
        }
        Type::Array { index, element } => {
            let n = cardinality(index);
            let ew = element_width(element);
            let mut out = Vec::new();
            for i in 0..n {
                let child_offset = format!("({offset_expr} + {i} * {ew})");
                out.extend(flatten_var_paths(&format!("{name}[{i}]"), element, child_offset));
            }
            out
        }
        _ => vec![(name.to_string(), offset_expr, encoded_width(ty, false), ty.clone())],
    }
}

fn emit_render_expr(ty: &Type, raw_expr: &str) -> String {
    match ty {
        Type::Boolean => {
            format!("(match {raw_expr} {{ 0 => \"false\".to_string(), 1 => \"true\".to_string(), _ => \"undefined\".to_string() }})")
        }
        Type::Range { lo, .. } => {
            let card = cardinality(ty);
            format!(
                "{{ let __r = {raw_expr}; if __r == {card} {{ \"undefined\".to_string() }} else {{ (__r as i64 + ({lo})).to_string() }} }}"
            )
        }
        Type::Enum { members } => {
            let mut arms = String::new();
            for (i, m) in members.iter().enumerate() {
                write!(arms, "{i} => \"{m}\".to_string(), ").ok();
            }
            format!("(match {raw_expr} {{ {arms}_ => \"undefined\".to_string() }})")
        }
        Type::Scalarset { n } => {
            format!("{{ let __r = {raw_expr}; if __r == {n} {{ \"undefined\".to_string() }} else {{ format!(\"scalar_{{__r}}\") }} }}")
        }
        _ => "\"<unrenderable>\".to_string()".to_string(),
    }
}

fn emit_renderer(out: &mut String, compiled: &CompiledModel, model: &Model, checker: &crate::typecheck::TypeChecker) -> CodeGenResult<()> {
    let _ = checker;
    out.push_str("struct Renderer;\n\nimpl StateRenderer for Renderer {\n");
    out.push_str("    fn rule_name(&self, rule_id: u32) -> &str {\n        RULES.get(rule_id as usize).map(|r| r.name).unwrap_or(\"?\")\n    }\n\n");
    out.push_str("    fn render_vars(&self, state: &State) -> Vec<(String, String)> {\n        let mut v = Vec::new();\n");
    for decl in &model.vars {
        let (ty, offset, _width) = compiled
            .state_var(&decl.name)
            .ok_or_else(|| format!("codegen: no state slot recorded for '{}'", decl.name))?;
        let base_offset = offset_const_name(&decl.name);
        for (leaf_name, offset_expr, width, leaf_ty) in flatten_var_paths(&decl.name, &ty, base_offset) {
            let raw = format!("state.read_bits({offset_expr}, {width})");
            let rendered = emit_render_expr(&leaf_ty, &raw);
            writeln!(out, "        v.push(({:?}.to_string(), {rendered}));", leaf_name)?;
        }
        let _ = offset;
    }
    out.push_str("        v\n    }\n}\n\n");
    Ok(())
}

fn emit_main(out: &mut String, config: &GenConfig, scalarset_groups: &[ScalarsetGroupSpec]) {
    let symmetry_groups_expr = if config.symmetry_reduction && !scalarset_groups.is_empty() {
        let mut s = String::from("vec![");
        for group in scalarset_groups {
            let value_slots_str =
                group.value_slots.iter().map(|(o, w)| format!("({o}, {w})")).collect::<Vec<_>>().join(", ");
            let index_blocks_str =
                group.index_blocks.iter().map(|(o, w)| format!("({o}, {w})")).collect::<Vec<_>>().join(", ");
            write!(
                s,
                "rumur_runtime::symmetry::ScalarsetGroup {{ cardinality: {}, value_slots: vec![{value_slots_str}], index_blocks: vec![{index_blocks_str}] }}, ",
                group.cardinality
            )
            .ok();
        }
        s.push(']');
        s
    } else {
        "vec![]".to_string()
    };

    let default_threads = config
        .default_threads
        .map(|n| n.to_string())
        .unwrap_or_else(|| "std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1)".to_string());
    let sandbox_call = if config.sandbox {
        "    if let Err(e) = rumur_runtime::sandbox::enable() {\n        eprintln!(\"rumur: sandbox: {e}\");\n        std::process::exit(2);\n    }\n"
    } else {
        ""
    };
    let xml_default = matches!(config.output_format, OutputFormat::MachineReadable);

    writeln!(
        out,
        "fn main() {{\n\
         \u{20}\u{20}\u{20}\u{20}let mut threads: usize = {default_threads};\n\
         \u{20}\u{20}\u{20}\u{20}let mut xml = {xml_default};\n\
         \u{20}\u{20}\u{20}\u{20}let args: Vec<String> = std::env::args().collect();\n\
         \u{20}\u{20}\u{20}\u{20}let mut i = 1;\n\
         \u{20}\u{20}\u{20}\u{20}while i < args.len() {{\n\
         \u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}match args[i].as_str() {{\n\
         \u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\"--threads\" => {{\n\
         \u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}i += 1;\n\
         \u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}if let Some(n) = args.get(i).and_then(|s| s.parse::<usize>().ok()) {{\n\
         \u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}threads = n;\n\
         \u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}}}\n\
         \u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}}}\n\
         \u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\"--output-format\" => {{\n\
         \u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}i += 1;\n\
         \u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}xml = args.get(i).map(|s| s == \"machine-readable\").unwrap_or(xml);\n\
         \u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}}}\n\
         \u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\"--version\" => {{\n\
         \u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}println!(\"{{}}\", env!(\"CARGO_PKG_VERSION\"));\n\
         \u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}return;\n\
         \u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}}}\n\
         \u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\"--help\" => {{\n\
         \u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}println!(\"usage: checker [--threads N] [--output-format plain|machine-readable]\");\n\
         \u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}return;\n\
         \u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}}}\n\
         \u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}_ => {{}}\n\
         \u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}}}\n\
         \u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}i += 1;\n\
         \u{20}\u{20}\u{20}\u{20}}}\n\n\
         {sandbox_call}\n\
         \u{20}\u{20}\u{20}\u{20}let rules = GeneratedRules;\n\
         \u{20}\u{20}\u{20}\u{20}let config = SchedulerConfig {{\n\
         \u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}threads,\n\
         \u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}seen_capacity: 1 << 20,\n\
         \u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}overflow_capacity: 4096,\n\
         \u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}deadline: Deadline::none(),\n\
         \u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}symmetry_groups: {symmetry_groups_expr},\n\
         \u{20}\u{20}\u{20}\u{20}}};\n\
         \u{20}\u{20}\u{20}\u{20}let result = explore(&rules, config);\n\
         \u{20}\u{20}\u{20}\u{20}let renderer = Renderer;\n\n\
         \u{20}\u{20}\u{20}\u{20}match &result.error {{\n\
         \u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}Some(report) => {{\n\
         \u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}let stdout = std::io::stdout();\n\
         \u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}let mut handle = stdout.lock();\n\
         \u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}if xml {{\n\
         \u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}let _ = rumur_runtime::trace::print_xml(&renderer, &result.trace, Some(report.message.as_str()), result.states_explored, result.states_explored, &mut handle);\n\
         \u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}}} else {{\n\
         \u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}let _ = rumur_runtime::trace::print_plain(&renderer, &result.trace, &report.message, false, &mut handle);\n\
         \u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}}}\n\
         \u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}std::process::exit(1);\n\
         \u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}}}\n\
         \u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}None => {{\n\
         \u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}if xml {{\n\
         \u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}let stdout = std::io::stdout();\n\
         \u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}let mut handle = stdout.lock();\n\
         \u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}let _ = rumur_runtime::trace::print_xml(&renderer, &[], None, result.states_explored, result.states_explored, &mut handle);\n\
         \u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}}} else {{\n\
         \u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}println!(\"rumur: explored {{}} states, no errors found\", result.states_explored);\n\
         \u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}for (name, hit) in &result.coverage {{\n\
         \u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}println!(\"cover \\\"{{name}}\\\": {{}}\", if *hit {{ \"reached\" }} else {{ \"never reached\" }});\n\
         \u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}}}\n\
         \u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}}}\n\
         \u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}if result.timed_out {{\n\
         \u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}eprintln!(\"rumur: time budget exhausted\");\n\
         \u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}std::process::exit(1);\n\
         \u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}}}\n\
         \u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}\u{20}}}\n\
         \u{20}\u{20}\u{20}\u{20}}}\n}}\n",
    )
    .ok();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Type;

    #[test]
    fn flattens_a_record_into_its_packed_field_order() {
        let ty = Type::Record { fields: vec![("a".to_string(), Type::Boolean), ("b".to_string(), Type::Range { lo: 0, hi: 255 })] };
        let leaves = flatten_var_paths("v", &ty, "OFFSET_V".to_string());
        assert_eq!(leaves[0].0, "v.b");
        assert_eq!(leaves[1].0, "v.a");
    }

    #[test]
    fn flattens_an_array_into_one_leaf_per_element() {
        let ty = Type::Array { index: Box::new(Type::Range { lo: 0, hi: 2 }), element: Box::new(Type::Boolean) };
        let leaves = flatten_var_paths("arr", &ty, "OFFSET_ARR".to_string());
        assert_eq!(leaves.len(), 3);
        assert_eq!(leaves[0].0, "arr[0]");
        assert_eq!(leaves[2].0, "arr[2]");
    }

    #[test]
    fn generates_a_compilable_source_for_the_toy_counter() {
        let src = "var x: 0..10;\nstartstate begin x := 0; end;\nrule \"inc\" x < 10 ==> begin x := x + 1; end;\n";
        let compiled = crate::compile_source(src, 0, false, None).unwrap();
        let source = generate(&compiled, &GenConfig::default()).unwrap();
        assert!(source.contains("OFFSET_X"));
        assert!(source.contains("fn main()"));
        assert!(source.contains("struct GeneratedRules"));
    }

    #[test]
    fn generates_cover_and_coverage_table_for_a_cover_rule() {
        let src = "var x: 0..10;\nstartstate begin x := 0; end;\nrule \"inc\" x < 10 ==> begin x := x + 1; end;\ncover \"hit five\" x = 5;\n";
        let compiled = crate::compile_source(src, 0, false, None).unwrap();
        let source = generate(&compiled, &GenConfig::default()).unwrap();
        assert!(source.contains("COVERAGE_NAMES"));
        assert!(source.contains("hit five"));
    }

    #[test]
    fn a_scalarset_used_only_as_an_array_index_still_produces_a_symmetry_group() {
        // The canonical symmetry-reduction scenario: `t` never appears
        // as a stored value anywhere, only as an array index, so the
        // only way to discover its group is via `index_blocks`.
        let src = "type t: scalarset(3);\nvar a: array[t] of boolean;\nstartstate begin for i: t do a[i] := false; end; end;\nrule \"flip\" a[0] = false ==> begin a[0] := true; end;\n";
        let compiled = crate::compile_source(src, 0, false, None).unwrap();
        let model = &compiled.model;
        let groups = collect_scalarset_groups(&compiled, model).unwrap();
        let has_index_group = groups.iter().any(|g| g.cardinality == 3 && !g.index_blocks.is_empty());
        assert!(has_index_group, "expected a cardinality-3 group with index blocks, got: none matched");
    }

    #[test]
    fn collect_scalarset_groups_type_finds_an_array_index_with_no_value_slots() {
        let ty = Type::Array { index: Box::new(Type::Scalarset { n: 3 }), element: Box::new(Type::Boolean) };
        let mut values = std::collections::BTreeMap::new();
        let mut indices = std::collections::BTreeMap::new();
        collect_scalarset_groups_type(&ty, 0, &mut values, &mut indices);
        assert!(values.is_empty());
        assert_eq!(indices.get(&3), Some(&vec![(0u32, 1u32)]));
    }
}
