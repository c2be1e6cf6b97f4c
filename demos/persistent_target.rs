//! An "instrumented" target using persistent mode: instead of exiting after
//! one test case, it calls [`afl_rt::__afl_persistent_loop`] to ask the
//! forkserver parent to `SIGSTOP` it and resume it in place for the next
//! input, avoiding a fresh `fork` per test case (§4.D "Persistent mode").
//!
//! Requires `__AFL_PERSISTENT` to be set in the environment; standalone
//! (`cargo run --bin persistent_target`) it runs the body exactly once,
//! since the handshake fails and `__afl_persistent_loop`'s first call always
//! returns `true` regardless.

use std::io::Read;

const MAX_ITERATIONS: u32 = 1000;

fn run_one_test_case() {
    let mut input = Vec::new();
    std::io::stdin().read_to_end(&mut input).ok();

    if input.starts_with(b"crash") {
        panic!("simulated crash on attacker-controlled input");
    }
}

fn main() {
    env_logger::init();

    while afl_rt::__afl_persistent_loop(MAX_ITERATIONS) != 0 {
        run_one_test_case();
    }
}
