//! Component E: startup ordering (§4.E). [`auto_init`] runs as the
//! highest-priority startup constructor, before any user constructor that
//! might itself be instrumented; [`manual_init`] is what it (or a deferred
//! target) actually calls to attach the bitmap and start the forkserver.

use crate::{diag, env, forkserver, hooks, shmem};
use std::sync::atomic::{AtomicBool, Ordering};

static PERSISTENT: AtomicBool = AtomicBool::new(false);
static INIT_DONE: AtomicBool = AtomicBool::new(false);

pub(crate) fn is_persistent() -> bool {
    PERSISTENT.load(Ordering::Relaxed)
}

/// Idempotent: attaches the bitmap and starts the forkserver loop at most
/// once per process, no matter how many times it is called (§3 invariants,
/// §8 "`__afl_manual_init` has identical observable effect whether called 1
/// or N times").
///
/// # Safety contract with the compiler pass
/// Every instrumentation hook (Variant 1 or Variant 2) observed after this
/// call returns executes only in whichever process the forkserver decided
/// should run the test case -- the parent never returns from the loop
/// except via a fatal exit.
#[no_mangle]
pub extern "C" fn __afl_manual_init() {
    if INIT_DONE.swap(true, Ordering::AcqRel) {
        return;
    }

    if let Err(e) = shmem::attach() {
        diag::die(&e);
    }

    forkserver::run();
}

/// Registered as the process's highest-priority startup constructor so it
/// runs before any user constructor, including ones emitted by the same
/// instrumentation pass this runtime serves (§4.E, §9 "Constructor
/// priority").
#[ctor::ctor]
fn auto_init() {
    PERSISTENT.store(env::flag_set(crate::config::PERSIST_ENV_VAR), Ordering::Relaxed);

    match env::parse_inst_ratio() {
        Ok(percent) => hooks::init_density_filter(percent),
        Err(e) => {
            diag::eprint_diagnostic(&e.to_string());
            diag::fatal_exit(1);
        }
    }

    if env::flag_set(crate::config::DEFER_ENV_VAR) {
        log::debug!(
            "{} set, deferring forkserver start to an explicit __afl_manual_init call",
            crate::config::DEFER_ENV_VAR
        );
        return;
    }

    log::debug!("starting forkserver immediately from the startup constructor");
    __afl_manual_init();
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn persistent_flag_reflects_env() {
        let _g = crate::test_support::guard();
        // SAFETY: serialized by the guard above.
        unsafe {
            std::env::set_var(crate::config::PERSIST_ENV_VAR, "1");
        }
        PERSISTENT.store(env::flag_set(crate::config::PERSIST_ENV_VAR), Ordering::Relaxed);
        assert!(is_persistent());

        unsafe {
            std::env::remove_var(crate::config::PERSIST_ENV_VAR);
        }
        PERSISTENT.store(env::flag_set(crate::config::PERSIST_ENV_VAR), Ordering::Relaxed);
        assert!(!is_persistent());
    }
}
