//! Component D: the forkserver loop (§4.D), the most intricate part of this
//! runtime. Runs entirely on the initial thread of the initial process; the
//! state it tracks (which child, if any, is currently alive or stopped) is
//! purely local to this module's loop, never exposed to the compiler pass.

use crate::{config, diag, init, Error};
use std::os::raw::c_int;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

/// The forkserver parent's view of the single child it manages at a time
/// (§4.D "State machine of the child reference").
enum ChildState {
    None,
    Running(libc::pid_t),
    Stopped(libc::pid_t),
}

/// Linux/glibc wait-status encoding: the low byte is `0x7f` exactly when the
/// process is stopped rather than exited or signaled. `libc` exposes no
/// `WIFSTOPPED` function (it is a C macro, not a symbol), so this mirrors
/// the same bit trick `nix` and glibc itself use internally.
fn wifstopped(status: c_int) -> bool {
    (status & 0xff) == 0x7f
}

fn read_exact(fd: c_int, buf: &mut [u8; 4]) -> Result<(), Error> {
    // SAFETY: `buf` is a valid 4-byte buffer for the duration of the call.
    let n = unsafe { libc::read(fd, buf.as_mut_ptr() as *mut _, buf.len()) };
    if n != buf.len() as isize {
        return Err(Error::ShortRead {
            fd,
            got: n.max(0) as usize,
            want: buf.len(),
        });
    }
    Ok(())
}

fn write_exact(fd: c_int, buf: &[u8; 4]) -> Result<(), Error> {
    // SAFETY: `buf` is a valid 4-byte buffer for the duration of the call.
    let n = unsafe { libc::write(fd, buf.as_ptr() as *const _, buf.len()) };
    if n != buf.len() as isize {
        return Err(Error::ShortWrite {
            fd,
            wrote: n.max(0) as usize,
            want: buf.len(),
        });
    }
    Ok(())
}

/// The handshake: if nobody is listening on the status pipe (the binary was
/// launched standalone, not under the fuzzer) this returns `false` and the
/// caller returns to user code without entering the loop (§4.D
/// "Handshake").
fn handshake() -> bool {
    write_exact(config::FORKSRV_FD_STATUS, &[0u8; 4]).is_ok()
}

fn fork_child() -> Result<libc::pid_t, Error> {
    errno::set_errno(errno::Errno(0));
    // SAFETY: immediately after `fork`, the child only closes two fds and
    // returns; it performs no allocation or other unsafe-to-fork work
    // before handing control back to the caller.
    let pid = unsafe { libc::fork() };
    if pid < 0 {
        return Err(Error::Fork(errno::errno()));
    }
    Ok(pid)
}

fn wait_child(pid: libc::pid_t, persistent: bool) -> Result<c_int, Error> {
    let flags = if persistent { libc::WUNTRACED } else { 0 };
    let mut status: c_int = 0;
    errno::set_errno(errno::Errno(0));
    // SAFETY: `pid` was returned by a `fork` we performed; `status` is a
    // valid out-parameter for the duration of the call.
    let r = unsafe { libc::waitpid(pid, &mut status, flags) };
    if r < 0 {
        return Err(Error::Wait {
            pid,
            errno: errno::errno(),
        });
    }
    Ok(status)
}

/// Closes both forkserver pipe fds. Called only in the child immediately
/// after `fork`, before it returns to user code (§4.D step 3, §9
/// "Forkserver-after-fork hygiene") -- otherwise a user `close(fd)` call
/// could disturb the fuzzer's view of an unrelated descriptor.
fn close_pipes() {
    unsafe {
        libc::close(config::FORKSRV_FD_CONTROL);
        libc::close(config::FORKSRV_FD_STATUS);
    }
}

/// Runs the handshake and, if a fuzzer is listening, the main loop. Returns
/// once the current process is the child that should run the real target
/// (either because it just forked one, or because the handshake failed and
/// we're running standalone). Never returns from within the parent branch
/// of the loop except via a fatal exit.
pub(crate) fn run() {
    if !handshake() {
        log::debug!("forkserver handshake failed; running standalone");
        return;
    }

    let persistent = init::is_persistent();
    let mut state = ChildState::None;

    loop {
        let mut control = [0u8; 4];
        if let Err(e) = read_exact(config::FORKSRV_FD_CONTROL, &mut control) {
            diag::die(&e);
        }
        let was_killed = u32::from_le_bytes(control) != 0;

        if let ChildState::Stopped(pid) = state {
            if was_killed {
                log::debug!("persistent child {pid} was killed externally; reaping");
                if let Err(e) = wait_child(pid, false) {
                    diag::die(&e);
                }
                state = ChildState::None;
            }
        }

        let child_pid = match state {
            ChildState::None => match fork_child() {
                Ok(0) => {
                    close_pipes();
                    return;
                }
                Ok(pid) => {
                    state = ChildState::Running(pid);
                    pid
                }
                Err(e) => diag::die(&e),
            },
            ChildState::Stopped(pid) => {
                log::debug!("resuming stopped persistent child {pid}");
                unsafe {
                    libc::kill(pid, libc::SIGCONT);
                }
                state = ChildState::Running(pid);
                pid
            }
            ChildState::Running(pid) => pid,
        };

        if let Err(e) = write_exact(config::FORKSRV_FD_STATUS, &(child_pid as u32).to_le_bytes()) {
            diag::die(&e);
        }

        let status = match wait_child(child_pid, persistent) {
            Ok(status) => status,
            Err(e) => diag::die(&e),
        };

        state = if persistent && wifstopped(status) {
            ChildState::Stopped(child_pid)
        } else {
            ChildState::None
        };

        if let Err(e) = write_exact(config::FORKSRV_FD_STATUS, &(status as u32).to_le_bytes()) {
            diag::die(&e);
        }
    }
}

static FIRST_PASS: AtomicBool = AtomicBool::new(true);
static CYCLE_CNT: AtomicU32 = AtomicU32::new(0);

/// The persistent-mode iteration gate a target calls from inside its own
/// fuzzing loop (§4.D "Persistent mode entry point"). The first call primes
/// the cycle counter and always returns `true`; later calls stop the
/// process with `SIGSTOP` (so the forkserver parent observes a stop rather
/// than an exit) until the counter is exhausted, at which point the target
/// should exit normally so a fresh child is forked next round.
#[no_mangle]
pub extern "C" fn __afl_persistent_loop(max_cnt: u32) -> c_int {
    if FIRST_PASS.swap(false, Ordering::AcqRel) {
        CYCLE_CNT.store(max_cnt, Ordering::Relaxed);
        return 1;
    }

    if !init::is_persistent() {
        return 0;
    }

    let remaining = CYCLE_CNT.fetch_sub(1, Ordering::Relaxed).wrapping_sub(1);
    if remaining != 0 {
        unsafe {
            libc::raise(libc::SIGSTOP);
        }
        1
    } else {
        0
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn wifstopped_matches_posix_encoding() {
        // A process stopped by a signal encodes as ((sig << 8) | 0x7f).
        let stopped = (libc::SIGSTOP << 8) | 0x7f;
        assert!(wifstopped(stopped));

        // A normal exit with code 0 encodes as 0.
        assert!(!wifstopped(0));
    }
}
