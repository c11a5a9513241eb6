//! Monotonic microsecond clock and delays.
//!
//! Pulse timing uses a 32-bit microsecond counter read from
//! `CLOCK_MONOTONIC`. The counter wraps every ~71.6 minutes; all
//! arithmetic on it goes through [`micros_since`], whose wrapping
//! subtraction stays correct across the wrap. Transmit timing needs
//! ±10 µs accuracy, which `nanosleep` cannot deliver, so
//! [`delay_micros`] busy-waits on the counter instead.

/// Current monotonic time in microseconds, truncated to 32 bits.
pub fn micros() -> u32 {
    let mut ts = libc::timespec {
        tv_sec: 0,
        tv_nsec: 0,
    };
    // CLOCK_MONOTONIC cannot fail with a valid timespec pointer.
    unsafe {
        libc::clock_gettime(libc::CLOCK_MONOTONIC, &mut ts);
    }
    (ts.tv_sec as u64 * 1_000_000 + ts.tv_nsec as u64 / 1_000) as u32
}

/// Microseconds elapsed since `*last`; updates `*last` to now.
/// Wrap-safe: `(now - last) mod 2^32`.
pub fn micros_since(last: &mut u32) -> u32 {
    let now = micros();
    let delta = now.wrapping_sub(*last);
    *last = now;
    delta
}

/// Current monotonic time in milliseconds (for matrix timestamps).
pub fn millis() -> u64 {
    let mut ts = libc::timespec {
        tv_sec: 0,
        tv_nsec: 0,
    };
    unsafe {
        libc::clock_gettime(libc::CLOCK_MONOTONIC, &mut ts);
    }
    ts.tv_sec as u64 * 1_000 + ts.tv_nsec as u64 / 1_000_000
}

/// Busy-wait for `n` microseconds. Spins on the monotonic counter;
/// under SCHED_FIFO this holds the pulse jitter below 10 µs.
pub fn delay_micros(n: u32) {
    let start = micros();
    while micros().wrapping_sub(start) < n {
        std::hint::spin_loop();
    }
}

/// Yielding sleep in milliseconds (decoder pacing, inter-send pauses).
pub fn msleep(ms: u64) {
    std::thread::sleep(std::time::Duration::from_millis(ms));
}

/// Sleep `ms` milliseconds in ≤ 100 ms chunks, watching `cancel`.
/// Returns false as soon as cancellation is observed.
pub fn msleep_cancellable(ms: u64, cancel: &std::sync::atomic::AtomicBool) -> bool {
    let mut remaining = ms;
    while remaining > 0 {
        if cancel.load(std::sync::atomic::Ordering::Relaxed) {
            return false;
        }
        let chunk = remaining.min(100);
        msleep(chunk);
        remaining -= chunk;
    }
    !cancel.load(std::sync::atomic::Ordering::Relaxed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn micros_since_is_wrap_safe() {
        // last just below the wrap, now just above: delta must be small
        let before_wrap = u32::MAX - 10;
        let after_wrap = 5u32;
        assert_eq!(after_wrap.wrapping_sub(before_wrap), 16);
    }

    #[test]
    fn micros_advances() {
        let mut last = micros();
        msleep(2);
        let delta = micros_since(&mut last);
        assert!(delta >= 1_000);
    }
}
