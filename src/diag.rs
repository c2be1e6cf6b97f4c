//! Diagnostics that fall outside the fuzzer wire protocol. Ordinary log
//! messages go through the `log` facade (§10.1); the handful of messages
//! that existing fuzzer tooling scrapes directly from stderr (the
//! `AFL_INST_RATIO` diagnostic) are written unconditionally so they survive
//! even when the embedding binary hasn't installed a logger.

use std::io::Write;

/// Writes a single line to stderr without going through `log`, and without
/// risking an allocation-heavy panic machinery: this is called from paths
/// that are about to abort the process anyway.
pub(crate) fn eprint_diagnostic(msg: &str) {
    let mut stderr = std::io::stderr();
    let _ = writeln!(stderr, "[-] ERROR: {msg}");
}

/// Exits the process immediately, skipping destructors and `atexit` hooks.
/// Every fatal path in the forkserver loop and shared-memory attach uses
/// this instead of [`std::process::exit`]: once the forkserver parent has
/// taken over the initial thread it must never run arbitrary user code,
/// including `Drop` impls, on its way out.
pub(crate) fn fatal_exit(status: i32) -> ! {
    unsafe { libc::_exit(status) }
}

/// Logs `err` at `error!` level and then exits with status 1, per the
/// fatal-path policy in §7. Centralizes the `Result::Err` → `_exit(1)`
/// conversion that both [`crate::shmem`] and [`crate::forkserver`] need.
pub(crate) fn die(err: &crate::Error) -> ! {
    log::error!("{err}");
    fatal_exit(1);
}
