//! Explicit-state exploration scheduler (§5).
//!
//! One OS thread per worker, each pulling states from its own
//! `LocalQueue` (work-stealing deque + overflow, see `queue`),
//! expanding them against the generated rule set, and pushing
//! successors back in. Two pieces of shared state coordinate the
//! threads without ever blocking the hot path:
//!
//! - `ACTIVE_WORKERS`: a lock-free atomic counter of workers currently
//!   holding a state to expand, used for termination detection. A
//!   worker that finds its queue empty marks itself idle; exploration
//!   is over once every worker is simultaneously idle with nothing
//!   left to steal. This is a simplified termination check (no vector
//!   clocks or token passing) that is correct because a worker only
//!   ever goes idle -> busy by successfully popping a state, and all
//!   three sources it could pop from (local, overflow, steal) are
//!   checked before it commits to idle.
//! - `FIRST_ERROR`: a `Once`-style CAS claim so that when multiple
//!   workers hit a violated invariant concurrently, exactly one wins
//!   the right to record the counterexample trace and signal shutdown
//!   to the rest; the losers discard their own findings rather than
//!   racing to overwrite the report.
//!
//! Shutdown waits on a `Condvar` rather than spinning, matching the
//! event-driven wakeup a systems checker needs to avoid burning CPU
//! once exploration is idle.

use crate::error::ErrorReport;
use crate::progress::Deadline;
use crate::queue::{LocalQueue, WorkQueues};
use crate::seen_set::{Insert, SeenSet};
use crate::state::State;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Condvar, Mutex, OnceLock};

/// Callback the generated checker supplies: given a state, returns
/// its successors paired with the id of the rule that produced each,
/// plus any rule whose guard evaluated and turned out to violate an
/// invariant (already lowered to a `Simple` rule with an `error`
/// statement body by the compiler, so a violation here just means
/// "this rule's body ran an error statement").
pub trait RuleSet: Sync {
    fn startstates(&self) -> Vec<State>;
    /// Runs every enabled rule's body against `state`, appending
    /// successors to `out` and returning `Some(message)` if any rule
    /// body executed an `error` statement.
    fn fire_rules(&self, state: &State, out: &mut Vec<(State, u32)>) -> Option<String>;

    /// Names of every `cover`/`liveness` predicate in the model, in
    /// declaration order; empty for a model that declares none. This
    /// checker performs reachability analysis only — a `liveness`
    /// entry here records "this predicate held in some reached state",
    /// not a proven fair-path guarantee, since the BFS frontier this
    /// scheduler explores never retains the infinite traces real
    /// liveness checking needs.
    fn coverage_points(&self) -> &[&'static str] {
        &[]
    }

    /// Evaluates every coverage point against a newly discovered
    /// `state`, setting the corresponding bit in `hits` (sized to
    /// `coverage_points().len()`) when it holds.
    fn check_coverage(&self, _state: &State, _hits: &mut [bool]) {}
}

pub struct SchedulerConfig {
    pub threads: usize,
    pub seen_capacity: usize,
    pub overflow_capacity: usize,
    /// A wall-clock budget for the whole exploration; checked between
    /// rule firings, never mid-firing (§5 "in-flight rule evaluations
    /// are not interrupted").
    pub deadline: Deadline,
    /// Scalarset groups to canonicalize each newly discovered state
    /// against before the seen-set dedup check. Empty when the model
    /// declares no scalarsets or the generator was run with
    /// `--symmetry-reduction off`, in which case canonicalization is a
    /// pass-through clone.
    pub symmetry_groups: Vec<crate::symmetry::ScalarsetGroup>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        SchedulerConfig {
            threads: std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1),
            seen_capacity: 1 << 20,
            overflow_capacity: 4096,
            deadline: Deadline::none(),
            symmetry_groups: Vec::new(),
        }
    }
}

pub struct ExplorationResult {
    pub states_explored: u64,
    pub error: Option<ErrorReport>,
    /// `true` if exploration stopped because `config.deadline` expired
    /// rather than because the state space was exhausted.
    pub timed_out: bool,
    /// `error`'s predecessor chain, startstate first, already walked
    /// out of the (otherwise worker-local and dropped-on-return) trace
    /// arena. Empty when `error` is `None`.
    pub trace: Vec<State>,
    /// `(name, was observed at least once)` for every entry in
    /// `RuleSet::coverage_points`, in declaration order.
    pub coverage: Vec<(String, bool)>,
}

struct Shared {
    seen: SeenSet,
    arena: crate::arena::Arena,
    active_workers: AtomicUsize,
    shutdown: AtomicBool,
    shutdown_condvar: Condvar,
    shutdown_mutex: Mutex<()>,
    first_error: OnceLock<ErrorReport>,
    explored: AtomicUsize,
    deadline: Deadline,
    timed_out: AtomicBool,
    coverage: Mutex<Vec<bool>>,
    symmetry_groups: Vec<crate::symmetry::ScalarsetGroup>,
}

impl Shared {
    /// Relabels `state` to its canonical representative when symmetry
    /// reduction is configured; a plain clone otherwise.
    fn canonical(&self, state: &State) -> State {
        if self.symmetry_groups.is_empty() {
            state.clone()
        } else {
            crate::symmetry::canonicalize(state, &self.symmetry_groups)
        }
    }

    fn mark_idle(&self) {
        self.active_workers.fetch_sub(1, Ordering::AcqRel);
    }

    fn mark_busy(&self) {
        self.active_workers.fetch_add(1, Ordering::AcqRel);
    }

    fn all_idle(&self) -> bool {
        self.active_workers.load(Ordering::Acquire) == 0
    }

    fn signal_shutdown(&self) {
        self.shutdown.store(true, Ordering::Release);
        let _guard = self.shutdown_mutex.lock().expect("shutdown mutex poisoned");
        self.shutdown_condvar.notify_all();
    }
}

/// Explores the full reachable state space of `rules`, starting from
/// its startstates, spread across `config.threads` workers. Returns
/// once every worker has confirmed there is no more reachable work, or
/// as soon as one worker wins the `first_error` claim on a violated
/// invariant.
pub fn explore(rules: &(dyn RuleSet + Sync), config: SchedulerConfig) -> ExplorationResult {
    let num_workers = config.threads.max(1);
    let local_queues = WorkQueues::build(num_workers, config.overflow_capacity);

    let shared = Shared {
        seen: SeenSet::new(config.seen_capacity),
        arena: crate::arena::Arena::new(num_workers),
        active_workers: AtomicUsize::new(0),
        shutdown: AtomicBool::new(false),
        shutdown_condvar: Condvar::new(),
        shutdown_mutex: Mutex::new(()),
        first_error: OnceLock::new(),
        explored: AtomicUsize::new(0),
        deadline: config.deadline,
        timed_out: AtomicBool::new(false),
        coverage: Mutex::new(vec![false; rules.coverage_points().len()]),
        symmetry_groups: config.symmetry_groups,
    };

    for start in rules.startstates() {
        let mut start = shared.canonical(&start);
        if let Insert::Inserted = shared.seen.insert(start.clone()) {
            record_coverage(rules, &shared, &start);
            let handle = shared.arena.insert(0, start.clone());
            start.arena_handle = Some(handle);
            local_queues[0].push(start);
        }
    }

    std::thread::scope(|scope| {
        for (worker_id, queue) in local_queues.iter().enumerate() {
            scope.spawn(move || worker_loop(rules, &shared, queue, worker_id));
        }
    });

    let error = shared.first_error.get().cloned();
    let trace = match &error {
        Some(report) => crate::trace::reconstruct(&shared.arena, report),
        None => Vec::new(),
    };
    let hits = shared.coverage.lock().expect("coverage mutex poisoned").clone();
    let coverage = rules
        .coverage_points()
        .iter()
        .zip(hits)
        .map(|(name, hit)| (name.to_string(), hit))
        .collect();

    ExplorationResult {
        states_explored: shared.explored.load(Ordering::Relaxed) as u64,
        error,
        timed_out: shared.timed_out.load(Ordering::Relaxed),
        trace,
        coverage,
    }
}

/// Evaluates every coverage point against `state` and ORs the result
/// into the shared hit vector; called once per newly-discovered state,
/// i.e. exactly where an invariant would also be checked.
fn record_coverage(rules: &(dyn RuleSet + Sync), shared: &Shared, state: &State) {
    let points = rules.coverage_points();
    if points.is_empty() {
        return;
    }
    let mut local = vec![false; points.len()];
    rules.check_coverage(state, &mut local);
    let mut hits = shared.coverage.lock().expect("coverage mutex poisoned");
    for (slot, hit) in hits.iter_mut().zip(local) {
        *slot |= hit;
    }
}

fn worker_loop(rules: &(dyn RuleSet + Sync), shared: &Shared, queue: &LocalQueue, worker_id: usize) {
    shared.mark_busy();
    loop {
        if shared.shutdown.load(Ordering::Acquire) {
            return;
        }
        if shared.deadline.expired() {
            shared.timed_out.store(true, Ordering::Relaxed);
            shared.signal_shutdown();
            return;
        }
        let Some(state) = queue.pop() else {
            shared.mark_idle();
            if wait_for_more_work(shared, queue) {
                shared.mark_busy();
                continue;
            }
            return;
        };

        shared.explored.fetch_add(1, Ordering::Relaxed);
        let mut successors = Vec::new();
        if let Some(message) = rules.fire_rules(&state, &mut successors) {
            let report = ErrorReport::new(message, state.clone());
            let _ = shared.first_error.set(report);
            shared.signal_shutdown();
            return;
        }
        for (successor, rule_id) in successors {
            let mut successor = shared.canonical(&successor);
            successor.predecessor = state.arena_handle;
            successor.rule_id = rule_id;
            if let Insert::Inserted = shared.seen.insert(successor.clone()) {
                record_coverage(rules, shared, &successor);
                let handle = shared.arena.insert(worker_id, successor.clone());
                successor.arena_handle = Some(handle);
                queue.push(successor);
            }
        }
    }
}

/// Blocks briefly after a worker goes idle. Returns `true` as soon as
/// either this worker's own overflow queue gains an entry or another
/// worker is still busy (in which case the caller re-enters `pop()`,
/// which also attempts a steal against every sibling deque) — `false`
/// only once every worker is simultaneously idle, which is the
/// termination condition.
fn wait_for_more_work(shared: &Shared, queue: &LocalQueue) -> bool {
    use std::time::Duration;
    loop {
        if shared.shutdown.load(Ordering::Acquire) {
            return false;
        }
        if !queue.is_empty() {
            return true;
        }
        if shared.all_idle() {
            return false;
        }
        let guard = shared.shutdown_mutex.lock().expect("shutdown mutex poisoned");
        let _ = shared.shutdown_condvar.wait_timeout(guard, Duration::from_micros(200));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex as StdMutex;

    /// A toy rule set counting from 0 to `max` by incrementing one
    /// state byte, with no invariant to violate.
    struct CountUp {
        max: u8,
    }

    impl RuleSet for CountUp {
        fn startstates(&self) -> Vec<State> {
            vec![State::new(1)]
        }

        fn fire_rules(&self, state: &State, out: &mut Vec<(State, u32)>) -> Option<String> {
            let current = state.read_bits(0, 8) as u8;
            if current < self.max {
                let mut next = State::new(1);
                next.write_bits(0, 8, (current + 1) as u64);
                out.push((next, 0));
            }
            None
        }
    }

    #[test]
    fn explores_every_reachable_count_exactly_once() {
        let rules = CountUp { max: 20 };
        let result = explore(
            &rules,
            SchedulerConfig { threads: 4, seen_capacity: 256, overflow_capacity: 64, deadline: Deadline::none(), symmetry_groups: Vec::new() },
        );
        assert!(result.error.is_none());
        assert_eq!(result.states_explored as u8, 21);
    }

    struct AlwaysErrors;
    impl RuleSet for AlwaysErrors {
        fn startstates(&self) -> Vec<State> {
            vec![State::new(1)]
        }
        fn fire_rules(&self, _state: &State, _out: &mut Vec<(State, u32)>) -> Option<String> {
            Some("Invariant violated: never".to_string())
        }
    }

    #[test]
    fn a_violated_invariant_is_reported_exactly_once() {
        let rules = AlwaysErrors;
        let result = explore(
            &rules,
            SchedulerConfig { threads: 4, seen_capacity: 256, overflow_capacity: 64, deadline: Deadline::none(), symmetry_groups: Vec::new() },
        );
        let error = result.error.expect("expected a reported error");
        assert_eq!(error.message, "Invariant violated: never");
    }

    static SERIAL: StdMutex<()> = StdMutex::new(());

    #[test]
    fn single_threaded_exploration_still_terminates() {
        let _guard = SERIAL.lock().unwrap();
        let rules = CountUp { max: 5 };
        let result = explore(
            &rules,
            SchedulerConfig { threads: 1, seen_capacity: 64, overflow_capacity: 16, deadline: Deadline::none(), symmetry_groups: Vec::new() },
        );
        assert_eq!(result.states_explored, 6);
    }

    /// Two scalarset slots that can swap without any other rule ever
    /// distinguishing them; with symmetry reduction configured, the two
    /// swapped startstates collapse into a single canonical state.
    struct SwapsTwoScalars;
    impl RuleSet for SwapsTwoScalars {
        fn startstates(&self) -> Vec<State> {
            let mut a = State::new(1);
            a.write_bits(0, 4, 0);
            a.write_bits(4, 4, 1);
            let mut b = State::new(1);
            b.write_bits(0, 4, 1);
            b.write_bits(4, 4, 0);
            vec![a, b]
        }
        fn fire_rules(&self, _state: &State, _out: &mut Vec<(State, u32)>) -> Option<String> {
            None
        }
    }

    #[test]
    fn symmetric_startstates_canonicalize_to_one_state() {
        let rules = SwapsTwoScalars;
        let groups = vec![crate::symmetry::ScalarsetGroup {
            cardinality: 2,
            value_slots: vec![(0, 4), (4, 4)],
            index_blocks: vec![],
        }];
        let result = explore(
            &rules,
            SchedulerConfig {
                threads: 1,
                seen_capacity: 64,
                overflow_capacity: 16,
                deadline: Deadline::none(),
                symmetry_groups: groups,
            },
        );
        assert_eq!(result.states_explored, 1);
    }
}
