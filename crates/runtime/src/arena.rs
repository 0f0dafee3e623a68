//! Per-worker trace arena (§5.F).
//!
//! Every state that enters the seen set is also archived here so a
//! counterexample can later walk its predecessor chain back to a
//! startstate. States are append-only and never individually freed —
//! the whole arena is dropped at once when exploration ends — so each
//! worker gets its own shard behind its own mutex and there is no
//! cross-worker contention on the common case of archiving a state
//! this worker just generated. A handle encodes which shard a state
//! lives in and its offset within that shard, so any worker can look
//! up any other worker's states when walking a trace.

use crate::state::State;
use std::sync::Mutex;

const SHARD_BITS: u32 = 16;
const SHARD_MASK: u64 = (1 << SHARD_BITS) - 1;

pub struct Arena {
    shards: Vec<Mutex<Vec<State>>>,
}

impl Arena {
    pub fn new(num_shards: usize) -> Self {
        let mut shards = Vec::with_capacity(num_shards.max(1));
        shards.resize_with(num_shards.max(1), || Mutex::new(Vec::new()));
        Arena { shards }
    }

    /// Archives `state` into `shard`'s slice, returning a handle that
    /// `get` can later resolve back to the same state.
    pub fn insert(&self, shard: usize, state: State) -> u64 {
        let mut slice = self.shards[shard].lock().expect("arena shard mutex poisoned");
        let offset = slice.len() as u64;
        slice.push(state);
        encode(shard, offset)
    }

    pub fn get(&self, handle: u64) -> State {
        let (shard, offset) = decode(handle);
        let slice = self.shards[shard].lock().expect("arena shard mutex poisoned");
        slice[offset as usize].clone()
    }
}

fn encode(shard: usize, offset: u64) -> u64 {
    ((shard as u64) << (64 - SHARD_BITS)) | (offset & !(SHARD_MASK << (64 - SHARD_BITS)))
}

fn decode(handle: u64) -> (usize, u64) {
    let shard = (handle >> (64 - SHARD_BITS)) as usize;
    let offset = handle & !(SHARD_MASK << (64 - SHARD_BITS));
    (shard, offset)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_a_state_through_its_handle() {
        let arena = Arena::new(4);
        let mut s = State::new(2);
        s.write_bits(0, 8, 99);
        let handle = arena.insert(2, s);
        assert_eq!(arena.get(handle).read_bits(0, 8), 99);
    }

    #[test]
    fn distinct_shards_do_not_collide() {
        let arena = Arena::new(4);
        let mut a = State::new(1);
        a.write_bits(0, 8, 1);
        let mut b = State::new(1);
        b.write_bits(0, 8, 2);
        let ha = arena.insert(0, a);
        let hb = arena.insert(1, b);
        assert_eq!(arena.get(ha).read_bits(0, 8), 1);
        assert_eq!(arena.get(hb).read_bits(0, 8), 2);
    }
}
