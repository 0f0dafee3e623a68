//! Lock-free, growable seen-state set (§5.B, §4.G).
//!
//! States are deduplicated against an open-addressed table. Each slot
//! publishes through one `DWordCell` holding `(tag, generation)` plus
//! an `UnsafeCell` holding the state itself: a thread claims a slot by
//! CAS-ing the pair from `(EMPTY, generation)` to `(CLAIMING,
//! generation)` in a single double-word instruction (`dword_cas`),
//! writes the state into the cell, then releases the real tag with a
//! second double-word CAS. Any other thread that observes `CLAIMING`
//! spins briefly rather than treating the slot as a mismatch, since
//! the winner is guaranteed to finish the publish with no intervening
//! allocation. The cell is write-once: a published slot is never
//! mutated again, so readers that observe a non-`CLAIMING` tag may
//! safely read the cell without additional synchronization beyond the
//! `Acquire` half of the CAS that observed it.
//!
//! Once occupancy crosses a 3/4 load factor (or a probe runs off the
//! end of the table), the table grows by a **quiescent migration**:
//! the first thread to notice CASes a shared `migrating` flag and
//! allocates a new table at double the capacity. Every thread,
//! including the one that triggered it, then helps: each call to
//! `insert` or `help_migrate` claims the next unrehashed bucket index
//! from a shared cursor and copies it (freezing the old slot in place
//! so a late writer can't resurrect it), until the cursor runs past
//! the old table's length, at which point whichever thread observes
//! that swaps the published table pointer and clears the flag. Lookups
//! always read whichever table is currently published; once migrating
//! begins, new inserts stop touching the old table at all and instead
//! join the rehash, so the two tables are never probed concurrently by
//! the same insert — the old table is only ever read by the
//! migration itself. A migrated-away table is never freed (this
//! runtime has no hazard-pointer or epoch scheme to prove no thread is
//! still mid-probe against it), matching how `arena.rs` treats
//! superseded allocations elsewhere in this crate; only the table
//! still live when the `SeenSet` itself drops is reclaimed.

use crate::dword_cas::{DWord, DWordCell};
use crate::state::State;
use std::cell::UnsafeCell;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicBool, AtomicPtr, AtomicUsize, Ordering};

const EMPTY: u64 = u64::MAX;
const CLAIMING: u64 = u64::MAX - 1;
const FROZEN: u64 = u64::MAX - 2;

struct Slot {
    /// `lo` is the slot's tag (`EMPTY`/`CLAIMING`/`FROZEN`, or a
    /// published state hash); `hi` is the owning table's generation,
    /// fixed at table creation. The generation half means a slot's CAS
    /// can never spuriously "succeed" against a stale `current`
    /// captured from a different table, even though in practice each
    /// `Table` is only ever reached through one pointer.
    record: DWordCell,
    value: UnsafeCell<Option<State>>,
}

// SAFETY: `value` is only ever written once, by the thread that wins
// the `EMPTY -> CLAIMING` double-word CAS on `record`, and only ever
// read after observing a published tag (non-CLAIMING) via the
// `Acquire` half of a CAS, which happens-after the writer's own
// `Release` half that published it.
unsafe impl Sync for Slot {}

impl Slot {
    fn new(generation: u64) -> Self {
        Slot { record: DWordCell::new(DWord::new(EMPTY, generation)), value: UnsafeCell::new(None) }
    }
}

struct Table {
    slots: Box<[Slot]>,
    mask: u64,
    generation: u64,
}

impl Table {
    fn new(capacity: usize, generation: u64) -> Self {
        let mut slots = Vec::with_capacity(capacity);
        slots.resize_with(capacity, || Slot::new(generation));
        Table { slots: slots.into_boxed_slice(), mask: (capacity - 1) as u64, generation }
    }
}

pub enum Insert {
    Inserted,
    AlreadyPresent,
}

enum ProbeOutcome {
    Inserted,
    AlreadyPresent,
    /// The probe ran a full pass of the table without finding an empty,
    /// claimable, or matching slot.
    TableFull,
    /// The bucket this hash would land in has already been rehashed
    /// into the next table; the caller must help finish the migration
    /// and retry there instead.
    Frozen,
}

pub struct SeenSet {
    table: AtomicPtr<Table>,
    next_table: AtomicPtr<Table>,
    migrating: AtomicBool,
    rehash_cursor: AtomicUsize,
    count: AtomicUsize,
}

fn hash_of(state: &State) -> u64 {
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    state.hash(&mut hasher);
    let h = hasher.finish();
    // EMPTY/CLAIMING/FROZEN are reserved sentinels; remapping the rare
    // collisions onto an adjacent value costs nothing in practice.
    if h >= FROZEN {
        h.wrapping_sub(4)
    } else {
        h
    }
}

fn probe_claim(table: &Table, tag: u64, state: &State) -> ProbeOutcome {
    let start = tag & table.mask;
    let mut idx = start;
    loop {
        let slot = &table.slots[idx as usize];
        let empty = DWord::new(EMPTY, table.generation);
        let claiming = DWord::new(CLAIMING, table.generation);
        match slot.record.compare_exchange(empty, claiming) {
            Ok(()) => {
                // SAFETY: we hold the exclusive CLAIMING tag on this slot.
                unsafe { *slot.value.get() = Some(state.clone()) };
                slot.record
                    .compare_exchange(claiming, DWord::new(tag, table.generation))
                    .expect("slot was exclusively claimed; no other writer can touch it");
                return ProbeOutcome::Inserted;
            }
            Err(mut observed) => {
                while observed.lo == CLAIMING {
                    std::hint::spin_loop();
                    observed = slot.record.load(Ordering::Acquire);
                }
                if observed.lo == FROZEN {
                    return ProbeOutcome::Frozen;
                }
                if observed.lo == tag {
                    // SAFETY: tag is published; the cell is initialized.
                    let existing = unsafe { &*slot.value.get() };
                    if existing.as_ref() == Some(state) {
                        return ProbeOutcome::AlreadyPresent;
                    }
                }
                idx = (idx + 1) & table.mask;
                if idx == start {
                    return ProbeOutcome::TableFull;
                }
            }
        }
    }
}

/// Places a state already known to be absent from the table, skipping
/// the duplicate check — used only while copying entries out of a
/// table being retired, which is itself deduplicated.
fn probe_place(table: &Table, tag: u64, state: State) {
    let start = tag & table.mask;
    let mut idx = start;
    loop {
        let slot = &table.slots[idx as usize];
        let empty = DWord::new(EMPTY, table.generation);
        let claiming = DWord::new(CLAIMING, table.generation);
        if slot.record.compare_exchange(empty, claiming).is_ok() {
            unsafe { *slot.value.get() = Some(state) };
            slot.record
                .compare_exchange(claiming, DWord::new(tag, table.generation))
                .expect("slot was exclusively claimed; no other writer can touch it");
            return;
        }
        idx = (idx + 1) & table.mask;
        debug_assert!(idx != start, "the new table is double the old capacity and cannot fill during one migration");
    }
}

impl SeenSet {
    /// `capacity` is rounded up to the next power of two so probing
    /// can use a bitmask instead of a modulo.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(16).next_power_of_two();
        let table = Box::new(Table::new(capacity, 0));
        SeenSet {
            table: AtomicPtr::new(Box::into_raw(table)),
            next_table: AtomicPtr::new(std::ptr::null_mut()),
            migrating: AtomicBool::new(false),
            rehash_cursor: AtomicUsize::new(0),
            count: AtomicUsize::new(0),
        }
    }

    /// Inserts `state` if not already present. Returns
    /// `Insert::AlreadyPresent` without touching memory beyond the
    /// probe chain if an equal state is already recorded.
    pub fn insert(&self, state: State) -> Insert {
        loop {
            if self.migrating.load(Ordering::Acquire) {
                self.help_migrate();
                continue;
            }
            let table_ptr = self.table.load(Ordering::Acquire);
            // SAFETY: a table is only freed once no `SeenSet` method can
            // observe it any more (it is either the table `Drop` reclaims,
            // or a retired table this method never dereferences again).
            let table = unsafe { &*table_ptr };
            let tag = hash_of(&state);
            match probe_claim(table, tag, &state) {
                ProbeOutcome::Inserted => {
                    self.count.fetch_add(1, Ordering::Relaxed);
                    self.maybe_begin_migration(table, false);
                    return Insert::Inserted;
                }
                ProbeOutcome::AlreadyPresent => return Insert::AlreadyPresent,
                ProbeOutcome::TableFull | ProbeOutcome::Frozen => {
                    self.maybe_begin_migration(table, true);
                    continue;
                }
            }
        }
    }

    /// Starts a migration if occupancy has crossed 3/4 of the current
    /// table's capacity, or unconditionally when `force` is set (a
    /// probe could not place its state at all). A losing CAS here just
    /// means another thread already started one.
    fn maybe_begin_migration(&self, table: &Table, force: bool) {
        let len = table.slots.len();
        let loaded = self.count.load(Ordering::Relaxed);
        if !force && loaded.saturating_mul(4) < len.saturating_mul(3) {
            return;
        }
        if self.migrating.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire).is_err() {
            return;
        }
        let new_table = Box::new(Table::new(len * 2, table.generation + 1));
        self.rehash_cursor.store(0, Ordering::Relaxed);
        self.next_table.store(Box::into_raw(new_table), Ordering::Release);
    }

    /// Claims and rehashes one bucket of the in-flight migration (or
    /// finalizes it if every bucket has already been claimed).
    fn help_migrate(&self) {
        let new_ptr = self.next_table.load(Ordering::Acquire);
        if new_ptr.is_null() {
            // The migrator has set `migrating` but not yet published
            // the new table; back off briefly.
            std::hint::spin_loop();
            return;
        }
        let old_ptr = self.table.load(Ordering::Acquire);
        // SAFETY: `old_ptr`/`new_ptr` are retired only after this flag
        // clears, which cannot happen until every `help_migrate` call in
        // flight has already read them.
        let old = unsafe { &*old_ptr };
        let new_table = unsafe { &*new_ptr };
        let idx = self.rehash_cursor.fetch_add(1, Ordering::AcqRel);
        if idx < old.slots.len() {
            rehash_bucket(old, new_table, idx);
        } else {
            self.finish_migration(old_ptr, new_ptr);
        }
    }

    fn finish_migration(&self, old_ptr: *mut Table, new_ptr: *mut Table) {
        if self.table.compare_exchange(old_ptr, new_ptr, Ordering::AcqRel, Ordering::Acquire).is_ok() {
            self.next_table.store(std::ptr::null_mut(), Ordering::Release);
            self.migrating.store(false, Ordering::Release);
            // `old_ptr` is intentionally leaked; see the module doc.
        }
    }

    pub fn len(&self) -> usize {
        self.count.load(Ordering::Relaxed)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Drop for SeenSet {
    fn drop(&mut self) {
        let current = *self.table.get_mut();
        if !current.is_null() {
            // SAFETY: `&mut self` proves no other thread can be
            // concurrently probing this table.
            unsafe { drop(Box::from_raw(current)) };
        }
        let pending = *self.next_table.get_mut();
        if !pending.is_null() {
            unsafe { drop(Box::from_raw(pending)) };
        }
    }
}

/// Copies one bucket of `old` into `new_table`, then marks the old
/// slot `FROZEN` so a concurrent insert that lost the race to observe
/// the migration flag cannot resurrect or duplicate it. An `EMPTY`
/// bucket is frozen directly, closing it off from ever being claimed
/// in the old table again.
fn rehash_bucket(old: &Table, new_table: &Table, idx: usize) {
    let slot = &old.slots[idx];
    loop {
        let observed = slot.record.load(Ordering::Acquire);
        match observed.lo {
            EMPTY => {
                let frozen = DWord::new(FROZEN, old.generation);
                if slot.record.compare_exchange(observed, frozen).is_ok() {
                    return;
                }
            }
            CLAIMING => std::hint::spin_loop(),
            FROZEN => return,
            tag => {
                // SAFETY: a non-sentinel tag means the cell was
                // published by the writer that set it, and a published
                // cell is never written again.
                let value = unsafe { (*slot.value.get()).clone() }.expect("a published slot always holds a value");
                probe_place(new_table, tag, value);
                let frozen = DWord::new(FROZEN, old.generation);
                if slot.record.compare_exchange(observed, frozen).is_ok() {
                    return;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state_with(byte: u8) -> State {
        let mut s = State::new(4);
        s.write_bits(0, 8, byte as u64);
        s
    }

    #[test]
    fn first_insert_of_a_state_succeeds_second_is_a_duplicate() {
        let set = SeenSet::new(64);
        assert!(matches!(set.insert(state_with(1)), Insert::Inserted));
        assert!(matches!(set.insert(state_with(1)), Insert::AlreadyPresent));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn distinct_states_both_get_recorded() {
        let set = SeenSet::new(64);
        set.insert(state_with(1));
        set.insert(state_with(2));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn concurrent_inserts_of_the_same_state_are_deduplicated() {
        use std::sync::Arc;
        let set = Arc::new(SeenSet::new(64));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let set = Arc::clone(&set);
                std::thread::spawn(move || set.insert(state_with(7)))
            })
            .collect();
        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        let inserted = results.iter().filter(|r| matches!(r, Insert::Inserted)).count();
        assert_eq!(inserted, 1);
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn growing_past_the_load_factor_migrates_instead_of_losing_entries() {
        // Capacity rounds up to 16; inserting 30 distinct states forces
        // at least one migration (3/4 of 16 is 12) while every state
        // must still be findable afterwards.
        let set = SeenSet::new(16);
        for i in 0..30u8 {
            assert!(matches!(set.insert(state_with(i)), Insert::Inserted));
        }
        assert_eq!(set.len(), 30);
        for i in 0..30u8 {
            assert!(matches!(set.insert(state_with(i)), Insert::AlreadyPresent));
        }
        assert_eq!(set.len(), 30);
    }

    #[test]
    fn many_threads_growing_the_table_concurrently_lose_nothing() {
        use std::sync::Arc;
        let set = Arc::new(SeenSet::new(16));
        let handles: Vec<_> = (0..100u16)
            .map(|i| {
                let set = Arc::clone(&set);
                std::thread::spawn(move || set.insert(state_with((i % 256) as u8)))
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(set.len(), 100);
    }
}
