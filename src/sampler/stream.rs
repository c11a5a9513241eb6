//! Stream sampler: fill the ring buffers, one slot per pulse.
//!
//! No filtering happens here - noise rejection is the stream decoder's
//! job, and dropping pulses at capture time would desynchronize the
//! low/high pairing.

use std::sync::atomic::{AtomicBool, Ordering};

use crate::clock;
use crate::config::Config;
use crate::gpio::{Gpio, Level};
use crate::sampler::ring::SampleRing;
use crate::Result;

/// Edge wait timeout; bounds the shutdown latency when no signal is
/// on the air.
const POLL_TIMEOUT_MS: i32 = 250;

/// Sampler thread body. Each edge ends one pulse: the pulse level is
/// the inverse of the level read after the edge. The head advances on
/// the polarity selected by the configuration, so one index holds one
/// low+high pair.
pub fn run<G: Gpio>(
    cfg: &Config,
    gpio: &mut G,
    ring: &SampleRing,
    cancel: &AtomicBool,
) -> Result<()> {
    let mut last = clock::micros();

    while !cancel.load(Ordering::Relaxed) {
        let Some(level) = gpio.wait_edge(POLL_TIMEOUT_MS)? else {
            continue; // timeout: keep the pulse clock running
        };

        let pulse = clock::micros_since(&mut last).min(u16::MAX as u32) as u16;

        match level {
            // line is HIGH now, so a LOW pulse just ended
            Level::High => {
                ring.put_low(pulse);
                if cfg.sample_on.on_low() {
                    ring.advance();
                }
            }
            Level::Low => {
                ring.put_high(pulse);
                if cfg.sample_on.on_high() {
                    ring.advance();
                }
            }
        }
    }
    Ok(())
}
