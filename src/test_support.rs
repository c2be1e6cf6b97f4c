//! Test-only synchronization for the handful of statics that are
//! deliberately process-global (§9): the default test harness runs each
//! `#[test]` function on its own thread, so anything touching
//! `__afl_area_ptr`, the fallback array behind it, or the density-filter
//! atomic needs to serialize against sibling tests in other modules.

#![cfg(test)]

use std::sync::{Mutex, MutexGuard};

static LOCK: Mutex<()> = Mutex::new(());

pub(crate) fn guard() -> MutexGuard<'static, ()> {
    LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
