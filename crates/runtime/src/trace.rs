//! Counterexample trace reconstruction and printing (§4.G, §6).
//!
//! [`reconstruct`] walks a failing [`State`]'s `predecessor` chain
//! through the [`crate::arena::Arena`] back to a startstate (whose
//! `predecessor` is `None`), returning the path in forward order. The
//! generated checker supplies a [`StateRenderer`] so this crate never
//! has to know a variable's name or Murphi type — only how to walk
//! bytes and an arena.

use crate::arena::Arena;
use crate::error::ErrorReport;
use crate::state::State;
use std::io::{self, Write};

/// Implemented by the generated checker: the only two things trace
/// printing needs that this crate cannot know on its own.
pub trait StateRenderer {
    fn rule_name(&self, rule_id: u32) -> &str;
    /// Every state-resident variable's current value, in declaration
    /// order, rendered the way `put` would print it.
    fn render_vars(&self, state: &State) -> Vec<(String, String)>;
}

/// Walks `report.state`'s predecessor chain back to its startstate,
/// returning the path from startstate to failing state.
pub fn reconstruct(arena: &Arena, report: &ErrorReport) -> Vec<State> {
    let mut chain = vec![report.state.clone()];
    let mut current = report.state.clone();
    while let Some(handle) = current.predecessor {
        let predecessor = arena.get(handle);
        current = predecessor.clone();
        chain.push(predecessor);
    }
    chain.reverse();
    chain
}

/// Plain-text trace: alternating `Rule "name"` and `state:` blocks,
/// one `var := value` line per variable. `diff_only` restricts each
/// block to variables whose rendered value changed since the previous
/// state in the chain (the startstate's block is always printed in
/// full).
pub fn print_plain(
    renderer: &dyn StateRenderer,
    trace: &[State],
    message: &str,
    diff_only: bool,
    out: &mut dyn Write,
) -> io::Result<()> {
    let mut previous: Option<Vec<(String, String)>> = None;
    for state in trace {
        if state.rule_id != u32::MAX {
            writeln!(out, "Rule \"{}\"", renderer.rule_name(state.rule_id))?;
        }
        writeln!(out, "state:")?;
        let vars = renderer.render_vars(state);
        for (name, value) in &vars {
            let changed = match &previous {
                None => true,
                Some(prev) => prev.iter().find(|(n, _)| n == name).map(|(_, v)| v) != Some(value),
            };
            if !diff_only || changed {
                writeln!(out, "  {name} := {value}")?;
            }
        }
        previous = Some(vars);
    }
    writeln!(out, "{message}")
}

fn xml_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Machine-readable trace, validated against the bundled
/// `verifier.rng` schema: a `<result>` root with a `<summary>` always
/// present and an `<error>` element present only when `message` is
/// `Some`.
pub fn print_xml(
    renderer: &dyn StateRenderer,
    trace: &[State],
    message: Option<&str>,
    rules_fired: u64,
    states_explored: u64,
    out: &mut dyn Write,
) -> io::Result<()> {
    writeln!(out, "<?xml version=\"1.0\" encoding=\"UTF-8\"?>")?;
    writeln!(out, "<result>")?;
    writeln!(out, "  <summary rules_fired=\"{rules_fired}\" states=\"{states_explored}\"/>")?;
    if let Some(message) = message {
        writeln!(out, "  <error message=\"{}\">", xml_escape(message))?;
        for state in trace {
            if state.rule_id != u32::MAX {
                writeln!(out, "    <rule name=\"{}\"/>", xml_escape(renderer.rule_name(state.rule_id)))?;
            }
            writeln!(out, "    <state>")?;
            for (name, value) in renderer.render_vars(state) {
                writeln!(out, "      <var name=\"{}\" value=\"{}\"/>", xml_escape(&name), xml_escape(&value))?;
            }
            writeln!(out, "    </state>")?;
        }
        writeln!(out, "  </error>")?;
    }
    writeln!(out, "</result>")
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Renderer;
    impl StateRenderer for Renderer {
        fn rule_name(&self, rule_id: u32) -> &str {
            match rule_id {
                0 => "inc",
                _ => "?",
            }
        }
        fn render_vars(&self, state: &State) -> Vec<(String, String)> {
            vec![("x".to_string(), state.read_bits(0, 8).to_string())]
        }
    }

    fn chained_states() -> (Arena, ErrorReport) {
        let arena = Arena::new(1);
        let mut start = State::new(1);
        start.write_bits(0, 8, 0);
        let start_handle = arena.insert(0, start.clone());
        start.arena_handle = Some(start_handle);

        let mut next = State::new(1);
        next.write_bits(0, 8, 1);
        next.predecessor = Some(start_handle);
        next.rule_id = 0;
        let next_handle = arena.insert(0, next.clone());
        next.arena_handle = Some(next_handle);

        (arena, ErrorReport::new("Invariant violated: bounded".to_string(), next))
    }

    #[test]
    fn reconstructs_forward_order_from_startstate_to_failure() {
        let (arena, report) = chained_states();
        let chain = reconstruct(&arena, &report);
        assert_eq!(chain.len(), 2);
        assert_eq!(chain[0].read_bits(0, 8), 0);
        assert_eq!(chain[1].read_bits(0, 8), 1);
    }

    #[test]
    fn plain_trace_contains_rule_name_and_final_message() {
        let (arena, report) = chained_states();
        let chain = reconstruct(&arena, &report);
        let mut out = Vec::new();
        print_plain(&Renderer, &chain, &report.message, false, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("Rule \"inc\""));
        assert!(text.contains("x := 1"));
        assert!(text.contains("Invariant violated: bounded"));
    }

    #[test]
    fn xml_trace_always_has_a_summary_and_only_has_error_when_a_message_is_given() {
        let (arena, report) = chained_states();
        let chain = reconstruct(&arena, &report);
        let mut with_error = Vec::new();
        print_xml(&Renderer, &chain, Some(&report.message), 3, 2, &mut with_error).unwrap();
        let text = String::from_utf8(with_error).unwrap();
        assert!(text.contains("<summary rules_fired=\"3\" states=\"2\"/>"));
        assert!(text.contains("<error"));

        let mut without_error = Vec::new();
        print_xml(&Renderer, &[], None, 5, 5, &mut without_error).unwrap();
        let text = String::from_utf8(without_error).unwrap();
        assert!(!text.contains("<error"));
    }
}
