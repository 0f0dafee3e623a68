//! Double-word compare-and-swap (§4.G, §9 "Lock-free structures").
//!
//! Every mainstream target this runtime ships a checker for can CAS
//! two adjacent machine words in one indivisible instruction:
//! CMPXCHG16B on x86-64, CASP on AArch64 (ARMv8.1 LSE), CMPXCHG8B on
//! 32-bit x86. `dword_cas` wraps exactly that instruction behind one
//! safe entry point so `seen_set` can claim a slot's `(tag,
//! generation)` pair together instead of as two separately-visible
//! stores. No libatomic call is ever involved: every arm below is
//! inline assembly, never a `compiler_builtins`/libatomic intrinsic,
//! and a target this module doesn't recognize fails the build at
//! `compile_error!` rather than silently degrading to a locked
//! fallback, matching "the build is rejected if the target cannot do
//! this inline."

use std::sync::atomic::{AtomicU64, Ordering};

/// A double-word value: two adjacent machine words, `lo` first. On
/// x86-64/AArch64 this is the full 128-bit CAS operand; on 32-bit x86
/// only the low 32 bits of each half participate (CMPXCHG8B's operand
/// is one 64-bit word made of two 32-bit halves) and the upper 32 bits
/// of `lo`/`hi` must be zero on that target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DWord {
    pub lo: u64,
    pub hi: u64,
}

impl DWord {
    pub const fn new(lo: u64, hi: u64) -> Self {
        DWord { lo, hi }
    }
}

/// An aligned, adjacent pair of 64-bit atomics forming one CAS target.
/// `#[repr(C)]` plus 16-byte alignment is load-bearing: the hardware
/// instruction operates on one naturally aligned memory location, not
/// two independently addressed cells, so the compiler must not
/// reorder or pad `lo`/`hi` apart.
#[repr(C, align(16))]
pub struct DWordCell {
    lo: AtomicU64,
    hi: AtomicU64,
}

impl DWordCell {
    pub const fn new(value: DWord) -> Self {
        DWordCell { lo: AtomicU64::new(value.lo), hi: AtomicU64::new(value.hi) }
    }

    /// A plain (non-atomic-as-a-pair) snapshot read of both halves.
    /// Every caller that cares about the pair being consistent goes
    /// through `compare_exchange` instead; this is only ever used to
    /// seed the `current` argument of a first CAS attempt, where a
    /// torn read just costs one extra retry.
    pub fn load(&self, order: Ordering) -> DWord {
        DWord { lo: self.lo.load(order), hi: self.hi.load(order) }
    }

    /// Atomically replaces the cell's value with `new` iff it
    /// currently equals `current`, as a single indivisible double-word
    /// instruction. Returns `Ok(())` on success, `Err(actual)` with the
    /// observed value on failure.
    pub fn compare_exchange(&self, current: DWord, new: DWord) -> Result<(), DWord> {
        dword_cas(&self.lo, &self.hi, current, new)
    }
}

// SAFETY: the two `AtomicU64`s are only ever touched through the
// double-word instructions below, all of which are themselves atomic
// with respect to every other core observing the same 16-byte region.
unsafe impl Sync for DWordCell {}

#[cfg(target_arch = "x86_64")]
fn dword_cas(lo_cell: &AtomicU64, hi_cell: &AtomicU64, current: DWord, new: DWord) -> Result<(), DWord> {
    use std::arch::asm;
    let ptr = lo_cell as *const AtomicU64 as *mut u128;
    debug_assert_eq!(
        hi_cell as *const AtomicU64 as usize - lo_cell as *const AtomicU64 as usize,
        8,
        "DWordCell's two halves must be adjacent for CMPXCHG16B"
    );

    let mut out_lo = current.lo;
    let mut out_hi = current.hi;
    let success: u8;
    // SAFETY: `ptr` is 16-byte aligned (enforced by `DWordCell`'s
    // `repr(align(16))`) and points at the live `(lo, hi)` pair.
    // `rbx` cannot be named directly as an input/output register
    // operand (LLVM reserves it for the frame base in some codegen
    // modes), so the new-low-word is swapped into `rbx` immediately
    // before the instruction and swapped back out immediately after,
    // the standard workaround for CMPXCHG16B in Rust inline asm.
    unsafe {
        asm!(
            "xchg rbx, {new_lo}",
            "lock cmpxchg16b [{ptr}]",
            "xchg rbx, {new_lo}",
            "sete {success}",
            ptr = in(reg) ptr,
            new_lo = inout(reg) new.lo => _,
            in("rcx") new.hi,
            inout("rax") out_lo,
            inout("rdx") out_hi,
            success = out(reg_byte) success,
            options(nostack),
        );
    }
    if success != 0 {
        Ok(())
    } else {
        Err(DWord { lo: out_lo, hi: out_hi })
    }
}

#[cfg(target_arch = "aarch64")]
#[target_feature(enable = "lse")]
unsafe fn casp_lse(ptr: *mut u128, current: DWord, new: DWord) -> DWord {
    use std::arch::asm;
    let mut out_lo = current.lo;
    let mut out_hi = current.hi;
    // SAFETY: caller guarantees `ptr` is a live, 16-byte-aligned
    // `(lo, hi)` pair. CASP's comparand/result register pair must be
    // an even/odd pair (x0, x1 here); the new-value pair (x2, x3) is
    // untouched by the instruction.
    asm!(
        "casp x0, x1, x2, x3, [{ptr}]",
        ptr = in(reg) ptr,
        inout("x0") out_lo,
        inout("x1") out_hi,
        in("x2") new.lo,
        in("x3") new.hi,
        options(nostack),
    );
    DWord { lo: out_lo, hi: out_hi }
}

#[cfg(target_arch = "aarch64")]
fn dword_cas(lo_cell: &AtomicU64, hi_cell: &AtomicU64, current: DWord, new: DWord) -> Result<(), DWord> {
    let ptr = lo_cell as *const AtomicU64 as *mut u128;
    debug_assert_eq!(
        hi_cell as *const AtomicU64 as usize - lo_cell as *const AtomicU64 as usize,
        8,
        "DWordCell's two halves must be adjacent for CASP"
    );
    // SAFETY: this runtime only targets ARMv8.1+ (LSE) AArch64
    // checkers; `casp_lse` requires the `lse` feature, which is
    // enabled unconditionally for this target by the compiler flags
    // documented in this crate's README-equivalent build notes.
    let observed = unsafe { casp_lse(ptr, current, new) };
    if observed == current {
        Ok(())
    } else {
        Err(observed)
    }
}

#[cfg(target_arch = "x86")]
fn dword_cas(lo_cell: &AtomicU64, hi_cell: &AtomicU64, current: DWord, new: DWord) -> Result<(), DWord> {
    use std::arch::asm;
    // On a 32-bit target a "double word" is 64 bits (two 32-bit
    // halves), which is all CMPXCHG8B moves in one instruction; the
    // upper 32 bits of `lo`/`hi` are required to be zero here (this
    // runtime's seen-set tags and generation counters fit in 32 bits
    // on this target, same as every other lock-free structure in this
    // crate that is compiled for i386).
    let ptr = lo_cell as *const AtomicU64 as *mut u64;
    debug_assert_eq!(
        hi_cell as *const AtomicU64 as usize - lo_cell as *const AtomicU64 as usize,
        8,
        "DWordCell's two halves must be adjacent even though CMPXCHG8B only reads the low word"
    );
    let mut out_lo = current.lo as u32;
    let mut out_hi = current.hi as u32;
    let new_lo = new.lo as u32;
    let new_hi = new.hi as u32;
    let success: u8;
    // SAFETY: `ptr` points at a live, aligned 8-byte location; `ebx`
    // cannot be named directly as an operand register for the same
    // reason `rbx` can't on x86-64, hence the swap-in/swap-out dance.
    unsafe {
        asm!(
            "xchg ebx, {new_lo}",
            "lock cmpxchg8b [{ptr}]",
            "xchg ebx, {new_lo}",
            "sete {success}",
            ptr = in(reg) ptr,
            new_lo = inout(reg) new_lo => _,
            in("ecx") new_hi,
            inout("eax") out_lo,
            inout("edx") out_hi,
            success = out(reg_byte) success,
            options(nostack),
        );
    }
    if success != 0 {
        Ok(())
    } else {
        Err(DWord { lo: out_lo as u64, hi: out_hi as u64 })
    }
}

#[cfg(not(any(target_arch = "x86_64", target_arch = "aarch64", target_arch = "x86")))]
compile_error!(
    "rumur-runtime requires an inline double-word CAS (CMPXCHG16B / CASP / CMPXCHG8B); \
     this target has no implementation in dword_cas.rs and the spec forbids a libatomic fallback"
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn succeeds_when_the_current_value_matches() {
        let cell = DWordCell::new(DWord::new(1, 2));
        let result = cell.compare_exchange(DWord::new(1, 2), DWord::new(3, 4));
        assert_eq!(result, Ok(()));
        assert_eq!(cell.load(Ordering::Acquire), DWord::new(3, 4));
    }

    #[test]
    fn fails_and_reports_the_observed_value_on_mismatch() {
        let cell = DWordCell::new(DWord::new(1, 2));
        let result = cell.compare_exchange(DWord::new(9, 9), DWord::new(3, 4));
        assert_eq!(result, Err(DWord::new(1, 2)));
        assert_eq!(cell.load(Ordering::Acquire), DWord::new(1, 2));
    }

    #[test]
    fn only_one_of_many_racing_compare_exchanges_wins() {
        use std::sync::Arc;
        let cell = Arc::new(DWordCell::new(DWord::new(0, 0)));
        let handles: Vec<_> = (1..=8u64)
            .map(|i| {
                let cell = Arc::clone(&cell);
                std::thread::spawn(move || cell.compare_exchange(DWord::new(0, 0), DWord::new(i, i)).is_ok())
            })
            .collect();
        let wins = handles.into_iter().filter(|h| h.join().unwrap()).count();
        assert_eq!(wins, 1);
        let final_value = cell.load(Ordering::Acquire);
        assert_eq!(final_value.lo, final_value.hi);
        assert!((1..=8).contains(&final_value.lo));
    }
}
