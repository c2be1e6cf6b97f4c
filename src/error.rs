/// Every fallible condition this runtime can encounter, from §7 of the
/// design: shared-memory attach, environment parsing, and the forkserver
/// wire protocol. Internal functions return `Result<_, Error>`; only the
/// outermost init/forkserver entry points convert an `Err` into the
/// fatal-exit primitive ([`crate::diag::fatal_exit`]), so that conversion is a
/// single seam instead of `_exit` calls scattered through the loop body.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("shmat failed for shm id {shm_id}: {errno}")]
    ShmAttach { shm_id: i32, errno: errno::Errno },

    #[error("invalid {0}: must be a decimal integer in 1..=100")]
    InvalidInstRatio(String),

    #[error("short read on the forkserver control pipe (fd {fd}): got {got} of {want} bytes")]
    ShortRead {
        fd: std::os::raw::c_int,
        got: usize,
        want: usize,
    },

    #[error("short write on the forkserver status pipe (fd {fd}): wrote {wrote} of {want} bytes")]
    ShortWrite {
        fd: std::os::raw::c_int,
        wrote: usize,
        want: usize,
    },

    #[error("fork() failed: {0}")]
    Fork(errno::Errno),

    #[error("waitpid() failed for pid {pid}: {errno}")]
    Wait { pid: i32, errno: errno::Errno },
}
