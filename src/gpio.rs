//! GPIO pin access and both-edge interrupts.
//!
//! The [`Gpio`] trait is the hardware seam: the sampler and the
//! transmitter are written against it, tests substitute scripted or
//! recording fakes. The shipped implementation is [`SysfsGpio`], which
//! drives the kernel's sysfs GPIO interface:
//!
//! 1. export the pin (`/sys/class/gpio/export`),
//! 2. set direction (`in`/`out`) and, for inputs, `edge = both`,
//! 3. block in `poll(2)` with `POLLPRI` on the `value` fd; each
//!    return is one edge, the current level is re-read from `value`.
//!
//! The receiver line idles LOW through the module's pull-down; the
//! input path assumes board-level pull configuration (sysfs exposes
//! none).

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::os::unix::io::AsRawFd;
use std::path::PathBuf;

use crate::{Error, Result};

/// Logical pin level. OOK: HIGH = carrier present, LOW = silence.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Level {
    Low,
    High,
}

impl Level {
    /// The other level; the pulse that ended at an edge had the
    /// inverse of the level read after the edge.
    pub fn inverse(self) -> Level {
        match self {
            Level::Low => Level::High,
            Level::High => Level::Low,
        }
    }
}

/// Pin access contract used by sampler and transmitter.
pub trait Gpio {
    /// Current pin level.
    fn read(&mut self) -> Result<Level>;

    /// Drive the pin (output pins only).
    fn write(&mut self, level: Level) -> Result<()>;

    /// Block until the next edge or until `timeout_ms` elapses.
    /// Returns the level read *after* the edge, or `None` on timeout.
    /// Must not allocate: this runs on the realtime sampler thread.
    fn wait_edge(&mut self, timeout_ms: i32) -> Result<Option<Level>>;
}

/// A pin exported through `/sys/class/gpio`. Unexports on drop.
pub struct SysfsGpio {
    pin: u8,
    value: File,
}

impl SysfsGpio {
    /// Export `pin` as an input with both-edge interrupts.
    pub fn input(pin: u8) -> Result<Self> {
        Self::export(pin)?;
        Self::write_attr(pin, "direction", "in")?;
        Self::write_attr(pin, "edge", "both")?;
        let value = Self::open_value(pin, false)?;
        let mut gpio = Self { pin, value };
        // consume the initial POLLPRI the kernel raises on a fresh fd
        gpio.consume()?;
        Ok(gpio)
    }

    /// Export `pin` as an output, driven LOW.
    pub fn output(pin: u8) -> Result<Self> {
        Self::export(pin)?;
        Self::write_attr(pin, "direction", "out")?;
        let value = Self::open_value(pin, true)?;
        let mut gpio = Self { pin, value };
        gpio.write(Level::Low)?;
        Ok(gpio)
    }

    fn gpio_path(pin: u8, attr: &str) -> PathBuf {
        PathBuf::from(format!("/sys/class/gpio/gpio{pin}/{attr}"))
    }

    fn export(pin: u8) -> Result<()> {
        if Self::gpio_path(pin, "value").exists() {
            return Ok(()); // already exported
        }
        std::fs::write("/sys/class/gpio/export", pin.to_string())
            .map_err(|source| Error::Gpio { pin, source })
    }

    fn write_attr(pin: u8, attr: &str, value: &str) -> Result<()> {
        std::fs::write(Self::gpio_path(pin, attr), value)
            .map_err(|source| Error::Gpio { pin, source })
    }

    fn open_value(pin: u8, writable: bool) -> Result<File> {
        OpenOptions::new()
            .read(true)
            .write(writable)
            .open(Self::gpio_path(pin, "value"))
            .map_err(|source| Error::Gpio { pin, source })
    }

    /// Rewind and read one byte from the value fd, clearing the
    /// pending interrupt and returning the current level.
    fn consume(&mut self) -> Result<Level> {
        let pin = self.pin;
        self.value
            .seek(SeekFrom::Start(0))
            .map_err(|source| Error::Gpio { pin, source })?;
        let mut byte = [0u8; 1];
        self.value
            .read_exact(&mut byte)
            .map_err(|source| Error::Gpio { pin, source })?;
        Ok(if byte[0] == b'1' {
            Level::High
        } else {
            Level::Low
        })
    }
}

impl Gpio for SysfsGpio {
    fn read(&mut self) -> Result<Level> {
        self.consume()
    }

    fn write(&mut self, level: Level) -> Result<()> {
        let pin = self.pin;
        self.value
            .seek(SeekFrom::Start(0))
            .map_err(|source| Error::Gpio { pin, source })?;
        self.value
            .write_all(match level {
                Level::Low => b"0",
                Level::High => b"1",
            })
            .map_err(|source| Error::Gpio { pin, source })
    }

    fn wait_edge(&mut self, timeout_ms: i32) -> Result<Option<Level>> {
        let mut fds = libc::pollfd {
            fd: self.value.as_raw_fd(),
            events: libc::POLLPRI | libc::POLLERR,
            revents: 0,
        };
        let n = unsafe { libc::poll(&mut fds, 1, timeout_ms) };
        if n < 0 {
            let err = std::io::Error::last_os_error();
            if err.kind() == std::io::ErrorKind::Interrupted {
                return Ok(None);
            }
            return Err(Error::Gpio {
                pin: self.pin,
                source: err,
            });
        }
        if n == 0 {
            return Ok(None);
        }
        self.consume().map(Some)
    }
}

impl Drop for SysfsGpio {
    fn drop(&mut self) {
        // release the line on shutdown; nothing to do if this fails
        let _ = std::fs::write("/sys/class/gpio/unexport", self.pin.to_string());
    }
}
