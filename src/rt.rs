//! Realtime elevation for the sampler thread.
//!
//! The sampler must observe edge-to-edge gaps down to ~100 µs, so its
//! thread runs under `SCHED_FIFO` at maximum priority with all pages
//! locked (`mlockall`) to rule out scheduling latency and page faults
//! between edges. Requires `CAP_SYS_NICE` / root, as on the Pi where
//! the receiver hardware lives.

use crate::{Error, Result};

/// Switch the calling thread to `SCHED_FIFO` at maximum priority and
/// lock current and future pages into memory. Fatal on failure: a
/// sampler without realtime scheduling misses pulses silently.
pub fn elevate_realtime() -> Result<()> {
    unsafe {
        let max = libc::sched_get_priority_max(libc::SCHED_FIFO);
        if max < 0 {
            return Err(Error::Realtime(std::io::Error::last_os_error()));
        }

        let param = libc::sched_param { sched_priority: max };
        if libc::sched_setscheduler(0, libc::SCHED_FIFO, &param) != 0 {
            return Err(Error::Realtime(std::io::Error::last_os_error()));
        }

        if libc::mlockall(libc::MCL_CURRENT | libc::MCL_FUTURE) != 0 {
            return Err(Error::Realtime(std::io::Error::last_os_error()));
        }
    }
    Ok(())
}
