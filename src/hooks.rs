//! Component C, Variant 2: the return-address-based trace-pc hooks used when
//! the target is compiled with a coarser "callback per basic block" mode
//! (§4.C). Variant 1 (the per-edge inline bump) has no runtime-side entry
//! point at all -- see [`crate::bitmap::simulate_edge`] for a runnable
//! reference of that sequence.

use crate::{bitmap, config};
use std::sync::atomic::{AtomicU32, Ordering};

/// `inst_ratio_scaled`: a synthesized `cur_loc` greater than this value is
/// dropped by the density filter. Set once during startup from
/// `AFL_INST_RATIO` (§4.E); read on every hook invocation, so it is an
/// atomic rather than something behind a lock.
static INST_RATIO_SCALED: AtomicU32 = AtomicU32::new(0);

pub(crate) fn init_density_filter(percent: Option<u32>) {
    let scaled = match percent {
        None => config::default_inst_ratio_scaled(),
        Some(pct) => config::default_inst_ratio_scaled() * pct / 100,
    };
    INST_RATIO_SCALED.store(scaled, Ordering::Relaxed);
}

#[cfg(test)]
pub(crate) fn density_filter_value() -> u32 {
    INST_RATIO_SCALED.load(Ordering::Relaxed)
}

/// Walks one frame up the call stack to find the hook's caller, the same
/// role `__builtin_return_address(0)` plays in the original C runtime.
/// Stable Rust has no such builtin; `backtrace` (already part of this
/// crate's dependency stack) gives the same answer at the cost of a real
/// unwind rather than a single register read.
#[inline(never)]
fn caller_pc() -> usize {
    let mut pc = 0usize;
    let mut depth = 0u32;
    backtrace::trace(|frame| {
        depth += 1;
        // depth 1 is this frame, depth 2 is our own caller (__sanitizer_cov_trace_pc*),
        // depth 3 is the instrumented basic block that called into the hook.
        if depth == 3 {
            pc = frame.ip() as usize;
            false
        } else {
            true
        }
    });
    pc
}

/// Masks a raw address down to the low bits used as `cur_loc`: stable under
/// ASLR (the offset within a basic block's enclosing page is fixed at link
/// time) and clamped so it never indexes past the bitmap.
fn synthesize_cur_loc(pc: usize) -> u32 {
    (pc as u32) & config::trace_pc_mask()
}

/// Shared bump logic for both trace-pc hooks: density filter, then bump,
/// then the Variant-2 `prev_loc` update, which differs from Variant 1's
/// whenever `MAP_SIZE_POW2 > 12` (§4.C, §9 Open Questions -- preserved
/// verbatim, not "fixed").
fn trace_with(cur_loc: u32) {
    if cur_loc > INST_RATIO_SCALED.load(Ordering::Relaxed) {
        return;
    }

    let prev = bitmap::prev_loc();
    let idx = ((cur_loc ^ prev) as usize) & (config::MAP_SIZE - 1);

    unsafe {
        let area = bitmap::area_ptr();
        let slot = area.add(idx);
        *slot = (*slot).wrapping_add(1);
    }

    let new_prev = if config::MAP_SIZE_POW2 > 12 {
        cur_loc << (config::MAP_SIZE_POW2 - 12)
    } else {
        cur_loc >> 1
    };
    unsafe { bitmap::set_prev_loc(new_prev) };
}

/// Called on every basic block when the target is compiled in trace-pc
/// mode. Exported under the exact name the compiler pass calls.
#[no_mangle]
pub extern "C" fn __sanitizer_cov_trace_pc() {
    trace_with(synthesize_cur_loc(caller_pc()));
}

/// Same contract, used for indirect-call edges. The compiler distinguishes
/// the two call sites; the runtime behavior is identical (§4.C).
#[no_mangle]
pub extern "C" fn __sanitizer_cov_trace_pc_indir(_callee: *mut std::ffi::c_void) {
    trace_with(synthesize_cur_loc(caller_pc()));
}

/// Weakly-defined absorber for a module-init callback some compiler
/// versions emit. `AFL_INST_RATIO` is parsed once in
/// [`crate::init::auto_init`] instead, so this is a deliberate no-op.
#[no_mangle]
pub extern "C" fn __sanitizer_cov_module_init() {}

#[cfg(test)]
mod test {
    use super::*;

    fn reset() {
        unsafe {
            bitmap::set_prev_loc(0);
        }
        init_density_filter(None);
    }

    #[test]
    fn default_density_matches_clamp() {
        let _g = crate::test_support::guard();
        reset();
        assert_eq!(density_filter_value(), config::default_inst_ratio_scaled());
    }

    #[test]
    fn density_filter_scales_by_percent() {
        let _g = crate::test_support::guard();
        init_density_filter(Some(25));
        // 25% of min(4096, MAP_SIZE) == 1024 for the canonical MAP_SIZE_POW2.
        assert_eq!(density_filter_value(), 1024);
    }

    #[test]
    fn above_ratio_is_dropped() {
        let _g = crate::test_support::guard();
        reset();
        init_density_filter(Some(25));
        let before = bitmap::read_byte(2000 & (config::MAP_SIZE - 1));
        trace_with(2000);
        let after = bitmap::read_byte(2000 & (config::MAP_SIZE - 1));
        assert_eq!(before, after);
    }

    #[test]
    fn prev_loc_update_spreads_for_large_map() {
        let _g = crate::test_support::guard();
        reset();
        init_density_filter(None);
        trace_with(10);
        assert_eq!(bitmap::prev_loc(), 10 << (config::MAP_SIZE_POW2 - 12));
    }
}
