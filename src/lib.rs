//! Target-side edge-coverage and forkserver runtime for an AFL-style
//! greybox fuzzer.
//!
//! This crate is linked into an instrumented program under test, not into
//! the fuzzer itself. It owns:
//!
//! - the coverage bitmap and previous-location register the compiler pass
//!   bumps on every basic block ([`bitmap`]),
//! - attaching that bitmap to an externally created shared-memory segment
//!   ([`shmem`]),
//! - the coarser return-address-based instrumentation hooks used when only
//!   a per-block callback is available ([`hooks`]),
//! - the forkserver protocol that spawns a fresh child per test case, or
//!   keeps one alive across many inputs in persistent mode ([`forkserver`]),
//! - and the startup ordering that wires all of the above together before
//!   any user code runs ([`init`]).
//!
//! Everything this crate exports under a `__afl_*` or
//! `__sanitizer_cov_*` name is part of the ABI a compiler instrumentation
//! pass relies on; see §6 of the design notes for the full surface. Nothing
//! else in this crate's public API is meant to be depended on directly.
// `__afl_prev_loc` must be a plain, directly addressable thread-local for
// the compiler pass to bump inline (see `bitmap.rs`); that requires the
// unstable `#[thread_local]` attribute, so this crate does not build on
// stable Rust.
#![feature(thread_local)]

cfg_if::cfg_if! {
    if #[cfg(unix)] {
        // fork(), SysV shm, and the SIGSTOP/SIGCONT dance all require a
        // POSIX process model; there is no Windows or wasm equivalent of
        // any of it, so unlike most of the corpus this crate doesn't carry
        // a second platform branch, only a clear compile-time refusal.
    } else {
        compile_error!("afl-rt only supports unix targets (fork, pipes, SysV shared memory)");
    }
}

mod bitmap;
mod config;
mod diag;
mod env;
mod error;
mod forkserver;
mod hooks;
mod init;
mod shmem;

#[cfg(test)]
mod test_support;

pub use error::Error;

// Re-exported so a binary that links this crate directly (rather than via
// `cdylib`/`staticlib`) can still call the two functions a deferred target
// is expected to call itself (§4.E, §4.D).
pub use forkserver::__afl_persistent_loop;
pub use init::__afl_manual_init;
