//! Process-lifecycle test harness for `afl-rt`.
//!
//! This crate plays the role the external fuzzer plays in production: it
//! creates a SysV shared-memory segment, wires up the two forkserver pipes
//! at fds 198/199, and spawns the instrumented target binary under test.
//! It exists purely so the crate's integration tests don't need to
//! reimplement this plumbing inline; it is not part of `afl-rt`'s public
//! ABI and is never linked into a real target.

use std::{
    io::{self, Read, Write},
    os::unix::{io::FromRawFd, process::CommandExt},
    path::Path,
    process::{Child, Command, Stdio},
};

#[derive(thiserror::Error, Debug)]
pub enum HarnessError {
    #[error("shmget/shmat failed: {0}")]
    Shm(errno::Errno),
    #[error(transparent)]
    Nix(#[from] nix::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// RAII wrapper around a SysV shared-memory segment, standing in for the
/// one a real fuzzer allocates before exporting `__AFL_SHM_ID`.
pub struct ShmSegment {
    id: i32,
    ptr: *mut u8,
    size: usize,
}

// SAFETY: the segment is only ever read/written through `&self` methods
// that take the same care the fuzzer side of the real protocol takes: the
// target writes, the harness reads only when the target is not running.
unsafe impl Send for ShmSegment {}
unsafe impl Sync for ShmSegment {}

impl ShmSegment {
    pub fn create(size: usize) -> Result<Self, HarnessError> {
        // SAFETY: a fresh, process-private key avoids colliding with any
        // real fuzzer segment; `size` and the create flags are valid.
        let id = unsafe { libc::shmget(libc::IPC_PRIVATE, size, libc::IPC_CREAT | 0o600) };
        if id < 0 {
            return Err(HarnessError::Shm(errno::errno()));
        }

        // SAFETY: `id` was just created above.
        let ptr = unsafe { libc::shmat(id, std::ptr::null(), 0) };
        if ptr as isize == -1 {
            return Err(HarnessError::Shm(errno::errno()));
        }

        Ok(Self {
            id,
            ptr: ptr as *mut u8,
            size,
        })
    }

    pub fn id(&self) -> i32 {
        self.id
    }

    pub fn as_slice(&self) -> &[u8] {
        // SAFETY: `ptr` is valid for `size` bytes for the lifetime of `self`.
        unsafe { std::slice::from_raw_parts(self.ptr, self.size) }
    }

    /// Zeroes the segment the way a real fuzzer does between test cases.
    pub fn zero(&self) {
        // SAFETY: `ptr` is valid for `size` bytes.
        unsafe { std::ptr::write_bytes(self.ptr, 0, self.size) };
    }
}

impl Drop for ShmSegment {
    fn drop(&mut self) {
        unsafe {
            libc::shmdt(self.ptr as *const _);
            libc::shmctl(self.id, libc::IPC_RMID, std::ptr::null_mut());
        }
    }
}

/// Fuzzer-side end of the two forkserver pipes, plus the spawned target
/// process.
pub struct ForkserverHarness {
    child: Child,
    control_write: std::fs::File,
    status_read: std::fs::File,
}

const CONTROL_FD: i32 = 198;
const STATUS_FD: i32 = 199;

impl ForkserverHarness {
    /// Spawns `bin` with `extra_env` set, fds 198/199 wired to fresh pipes.
    pub fn spawn(bin: &Path, extra_env: &[(&str, &str)]) -> Result<Self, HarnessError> {
        let (control_read_fd, control_write_fd) = nix::unistd::pipe()?;
        let (status_read_fd, status_write_fd) = nix::unistd::pipe()?;

        let mut cmd = Command::new(bin);
        cmd.stdin(Stdio::null()).stdout(Stdio::null()).stderr(Stdio::inherit());
        for (k, v) in extra_env {
            cmd.env(k, v);
        }

        let bind_pipes = move || -> io::Result<()> {
            nix::unistd::dup2(control_read_fd, CONTROL_FD).map_err(io_err)?;
            nix::unistd::dup2(status_write_fd, STATUS_FD).map_err(io_err)?;
            nix::unistd::close(control_read_fd).map_err(io_err)?;
            nix::unistd::close(status_write_fd).map_err(io_err)?;
            nix::unistd::close(control_write_fd).map_err(io_err)?;
            nix::unistd::close(status_read_fd).map_err(io_err)?;
            Ok(())
        };
        // SAFETY: `bind_pipes` only calls async-signal-safe `dup2`/`close`
        // between `fork` and `exec`, matching the contract `pre_exec` requires.
        unsafe {
            cmd.pre_exec(bind_pipes);
        }

        let child = cmd.spawn()?;

        // Close our copies of the child's ends; keep ours.
        nix::unistd::close(control_read_fd)?;
        nix::unistd::close(status_write_fd)?;

        Ok(Self {
            child,
            // SAFETY: these fds were just created by `pipe()` above and are
            // owned exclusively by this harness from this point on.
            control_write: unsafe { std::fs::File::from_raw_fd(control_write_fd) },
            status_read: unsafe { std::fs::File::from_raw_fd(status_read_fd) },
        })
    }

    pub fn child_mut(&mut self) -> &mut Child {
        &mut self.child
    }

    /// Reads the 4-byte handshake the target writes on forkserver entry.
    pub fn read_handshake(&mut self) -> io::Result<[u8; 4]> {
        self.read4()
    }

    /// Sends one control-pipe message (`was_killed` flag).
    pub fn send_control(&mut self, was_killed: u32) -> io::Result<()> {
        self.control_write.write_all(&was_killed.to_le_bytes())
    }

    pub fn read_pid(&mut self) -> io::Result<i32> {
        Ok(i32::from_le_bytes(self.read4()?))
    }

    pub fn read_status(&mut self) -> io::Result<i32> {
        Ok(i32::from_le_bytes(self.read4()?))
    }

    fn read4(&mut self) -> io::Result<[u8; 4]> {
        let mut buf = [0u8; 4];
        self.status_read.read_exact(&mut buf)?;
        Ok(buf)
    }
}

fn io_err(e: nix::Error) -> io::Error {
    io::Error::from_raw_os_error(e as i32)
}
