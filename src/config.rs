//! Compile-time constants shared by every module. These values, together with
//! the symbol names in [`crate::bitmap`] and [`crate::forkserver`], make up the
//! ABI contract between this runtime and the compiler instrumentation pass.

/// `log2` of the coverage bitmap size. 16 is the canonical value used by every
/// upstream fuzzer in this family; a target-specific build may override it,
/// but doing so requires rebuilding both this crate and the instrumentation
/// pass in lockstep, so it is not exposed as a runtime knob.
pub const MAP_SIZE_POW2: u32 = 16;

/// Size of the coverage bitmap, in bytes.
pub const MAP_SIZE: usize = 1 << MAP_SIZE_POW2;

/// Fuzzer → runtime control pipe.
pub const FORKSRV_FD_CONTROL: std::os::raw::c_int = 198;

/// Runtime → fuzzer status pipe.
pub const FORKSRV_FD_STATUS: std::os::raw::c_int = FORKSRV_FD_CONTROL + 1;

/// Names an externally allocated SysV shared-memory segment id.
pub const SHM_ENV_VAR: &str = "__AFL_SHM_ID";

/// Non-empty ⇒ the target should not start its forkserver from the startup
/// constructor; it will call [`crate::init::manual_init`] itself.
pub const DEFER_ENV_VAR: &str = "__AFL_DEFER_FORKSRV";

/// Non-empty ⇒ persistent mode is enabled for this run.
pub const PERSIST_ENV_VAR: &str = "__AFL_PERSISTENT";

/// Decimal 1-100, instrumentation density percentage for the trace-pc hooks.
pub const INST_RATIO_ENV_VAR: &str = "AFL_INST_RATIO";

/// Controls the verbosity of this runtime's own diagnostics; independent of
/// the fuzzer wire protocol.
pub const LOG_ENV_VAR: &str = "AFL_RT_LOG";

/// Default `inst_ratio_scaled`: the low 12 bits of a return address, clamped
/// to the bitmap size.
pub const fn default_inst_ratio_scaled() -> u32 {
    const CLAMP: usize = if MAP_SIZE < 4096 { MAP_SIZE } else { 4096 };
    CLAMP as u32
}

/// Mask applied to a synthesized return address before it is used as
/// `cur_loc` in the trace-pc hooks: the low 12 bits, further clamped to the
/// bitmap size so it never indexes out of bounds.
pub const fn trace_pc_mask() -> u32 {
    const CLAMP: usize = if MAP_SIZE - 1 < 4095 { MAP_SIZE - 1 } else { 4095 };
    CLAMP as u32
}
