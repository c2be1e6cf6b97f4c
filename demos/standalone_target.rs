//! A minimal "instrumented" target, standing in for a real program built
//! with a compiler pass that calls into this crate's `__sanitizer_cov_*`
//! hooks on every basic block.
//!
//! Run directly (`cargo run --bin standalone_target`) it just runs the
//! program once and exits; the startup constructor's forkserver handshake
//! fails immediately because nothing is listening on fd 199, so it falls
//! through to normal execution (§4.D "Handshake").
//!
//! Run under a real forkserver-aware fuzzer with `__AFL_SHM_ID` and fds
//! 198/199 set up, this same binary is forked once per test case instead.

use std::io::Read;

fn classify(input: &[u8]) -> &'static str {
    if input.is_empty() {
        "empty"
    } else if input[0] == b'C' {
        "starts-with-C"
    } else if input.len() > 64 {
        "long"
    } else {
        "other"
    }
}

fn main() {
    env_logger::init();

    let mut input = Vec::new();
    std::io::stdin().read_to_end(&mut input).ok();

    println!("classification: {}", classify(&input));
}
