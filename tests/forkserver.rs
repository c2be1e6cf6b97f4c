//! End-to-end exercises of the forkserver protocol (§8), playing the role of
//! the external fuzzer against the two fixture binaries in `demos/`.
//!
//! These spawn real child processes and talk the real wire protocol over
//! real pipes; they are not safe to run concurrently with anything else
//! that forks signal-sensitive children, but are independent of each other
//! (each gets its own shared-memory segment and pipes).

use afl_rt_testkit::{ForkserverHarness, ShmSegment};
use std::path::Path;
use std::time::Duration;

const MAP_SIZE: usize = 1 << 16;

fn wifexited(status: i32) -> bool {
    (status & 0x7f) == 0
}

fn wexitstatus(status: i32) -> i32 {
    (status >> 8) & 0xff
}

fn wifstopped(status: i32) -> bool {
    (status & 0xff) == 0x7f
}

fn spawn(bin_env: &str, extra_env: &[(&str, &str)]) -> (ForkserverHarness, ShmSegment) {
    let shm = ShmSegment::create(MAP_SIZE).expect("create shm segment");
    let shm_id = shm.id().to_string();

    let mut env: Vec<(&str, &str)> = vec![("__AFL_SHM_ID", shm_id.as_str())];
    env.extend_from_slice(extra_env);

    let bin = std::env::var(bin_env).expect("fixture binary was not built");
    let harness = ForkserverHarness::spawn(Path::new(&bin), &env).expect("spawn fixture");
    (harness, shm)
}

#[test]
fn standalone_binary_exits_cleanly_without_a_fuzzer() {
    // No fds wired, no handshake performed: this just checks the fixture
    // itself runs to completion when launched the ordinary way, which the
    // forkserver tests below take for granted.
    let bin = std::env::var("CARGO_BIN_EXE_standalone_target").unwrap();
    let status = std::process::Command::new(bin)
        .status()
        .expect("run standalone_target directly");
    assert!(status.success());
}

#[test]
fn one_fork_per_test_case() {
    let (mut harness, shm) = spawn("CARGO_BIN_EXE_standalone_target", &[]);

    let handshake = harness.read_handshake().expect("handshake");
    assert_eq!(handshake, [0u8; 4], "handshake word must be all-zero");

    // Byte 0 of the bitmap is seeded by `shmem::attach` as soon as the
    // target process attaches the segment, before it runs any test case.
    std::thread::sleep(Duration::from_millis(50));
    assert_eq!(shm.as_slice()[0], 1);

    harness.send_control(0).expect("send control word");
    let pid = harness.read_pid().expect("read child pid");
    assert!(pid > 0);

    let status = harness.read_status().expect("read child status");
    assert!(wifexited(status));
    assert_eq!(wexitstatus(status), 0);
}

#[test]
fn persistent_child_is_reused_across_iterations() {
    let (mut harness, _shm) = spawn(
        "CARGO_BIN_EXE_persistent_target",
        &[("__AFL_PERSISTENT", "1")],
    );

    harness.read_handshake().expect("handshake");

    harness.send_control(0).expect("iteration 1 control");
    let first_pid = harness.read_pid().expect("iteration 1 pid");
    let status = harness.read_status().expect("iteration 1 status");
    assert!(wifstopped(status), "persistent child should self-stop between test cases");

    harness.send_control(0).expect("iteration 2 control");
    let second_pid = harness.read_pid().expect("iteration 2 pid");
    assert_eq!(first_pid, second_pid, "persistent mode must not refork for every test case");
    let status = harness.read_status().expect("iteration 2 status");
    assert!(wifstopped(status));

    harness.child_mut().kill().ok();
}

#[test]
fn killed_persistent_child_is_reaped_and_a_fresh_one_is_forked() {
    let (mut harness, _shm) = spawn(
        "CARGO_BIN_EXE_persistent_target",
        &[("__AFL_PERSISTENT", "1")],
    );

    harness.read_handshake().expect("handshake");

    harness.send_control(0).expect("first iteration control");
    let stopped_pid = harness.read_pid().expect("first iteration pid");
    let status = harness.read_status().expect("first iteration status");
    assert!(wifstopped(status));

    // SAFETY: `stopped_pid` is our own child, currently stopped; killing it
    // here stands in for the fuzzer noticing a timeout and killing the
    // child itself (§8 scenario 6).
    unsafe {
        libc::kill(stopped_pid, libc::SIGKILL);
    }

    harness.send_control(1).expect("was_killed control word");
    let new_pid = harness.read_pid().expect("respawned pid");
    assert_ne!(stopped_pid, new_pid, "a killed persistent child must be replaced, not resumed");

    harness.child_mut().kill().ok();
}
