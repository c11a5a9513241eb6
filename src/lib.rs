//! Rfsniffer: a 433 MHz OOK receiver/transmitter written in Rust.
//!
//! ## Modules
//!
//! - **clock** – Monotonic microsecond timer, busy-wait delays
//! - **codec** – Flamingo cipher and frame layouts, NEXUS telemetry, `01`/`10` pairs
//! - **config** – Runtime configuration, known transmitter ids
//! - **decoder** – Symbol alphabets, sync detection, bit reconstruction
//! - **event** – Decoded events, handler slot, stdout/JSON output
//! - **gpio** – Pin access and both-edge interrupts (sysfs)
//! - **matrix** – Ring of received raw codes, repeat coalescing
//! - **sampler** – Edge-triggered pulse capture (stream and realtime)
//! - **sniffer** – Orchestrator: threads, cancellation, shutdown
//! - **transmit** – Per-protocol pulse-bang senders

pub mod clock;
pub mod codec;
pub mod config;
pub mod decoder;
pub mod event;
pub mod fmt;
pub mod gpio;
pub mod matrix;
pub mod rt;
pub mod sampler;
pub mod sniffer;
pub mod transmit;

use thiserror::Error;

/// Crate-wide error type. Hardware and thread setup failures are fatal
/// (the process exits non-zero after cleanup); everything else is
/// recovered locally per the error handling design.
#[derive(Debug, Error)]
pub enum Error {
    #[error("gpio {pin}: {source}")]
    Gpio {
        pin: u8,
        #[source]
        source: std::io::Error,
    },

    #[error("realtime setup: {0}")]
    Realtime(std::io::Error),

    #[error("thread: {0}")]
    Thread(String),

    #[error("config: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, Error>;
