//! Component B: attaching the coverage bitmap to an externally created SysV
//! shared-memory segment (§4.B).

use crate::{bitmap, config, env, Error};

/// Reads `__AFL_SHM_ID` and, if set, attaches the named SysV shared-memory
/// segment in place of the in-binary fallback array. Idempotency is the
/// caller's responsibility ([`crate::init`] only calls this once).
///
/// On success, byte 0 of the bitmap is seeded with `1` so the fuzzer sees
/// activity even under a very low instrumentation density (§4.B).
pub(crate) fn attach() -> Result<(), Error> {
    let Some(id_str) = std::env::var_os(config::SHM_ENV_VAR) else {
        log::debug!("{} not set, using in-binary fallback bitmap", config::SHM_ENV_VAR);
        return Ok(());
    };

    let shm_id = env::parse_shm_id(&id_str.to_string_lossy());
    if shm_id <= 0 {
        log::warn!("{} parsed as {shm_id}, which is not a valid shm id; attach will likely fail", config::SHM_ENV_VAR);
    }

    // SAFETY: `shmat` with a null requested address and no flags is the
    // standard "attach wherever the kernel likes" form; the returned
    // pointer is valid for at least `MAP_SIZE` bytes as long as the fuzzer
    // honored its side of the contract and allocated a segment that big.
    let ptr = unsafe { libc::shmat(shm_id, std::ptr::null(), 0) };

    if ptr as isize == -1 {
        return Err(Error::ShmAttach {
            shm_id,
            errno: errno::errno(),
        });
    }

    log::debug!("attached coverage bitmap to shm id {shm_id}");

    unsafe {
        bitmap::set_area_ptr(ptr as *mut u8);
        *bitmap::area_ptr() = 1;
    }

    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn absent_env_var_is_not_an_error() {
        let _g = crate::test_support::guard();
        // SAFETY: serialized by the guard above against sibling tests.
        unsafe {
            std::env::remove_var(config::SHM_ENV_VAR);
        }
        assert!(attach().is_ok());
    }
}
