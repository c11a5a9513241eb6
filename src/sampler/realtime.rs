//! Realtime sampler: decode bits between edges.
//!
//! When the expected protocol's sync pulse is well known there is no
//! need for alphabet learning - a state machine keyed on the sync
//! window decodes each bit as its pulse ends and stores the finished
//! code in the matrix:
//!
//! | Sync (µs, LOW)  | Protocol   | Bits | Divider µs | Sample on |
//! |-----------------|------------|------|------------|-----------|
//! | 3800–4000       | NEXUS      | 36   | 1500       | LOW       |
//! | 4870–5030       | FLAMINGO28 | 28   | 660        | HIGH      |
//! | 10130–10330     | FLAMINGO24 | 24   | 660        | HIGH      |
//! | 2600–2800       | FLAMINGO32 | 64   | 695        | LOW       |
//!
//! (The NEXUS "sync" is really the pause between message repeats, so
//! the first frame of a burst is lost - one reason NEXUS needs ≥ 3
//! identical repeats downstream.)
//!
//! The analyzer states do the same dance with a user-supplied sync
//! window, bit count and divider.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use log::debug;

use crate::clock;
use crate::codec::flamingo::{
    T1X2, T1_SYNC_MAX, T1_SYNC_MIN, T2Y, T2_SYNC_MAX, T2_SYNC_MIN, T4_SYNC_MAX, T4_SYNC_MIN,
};
use crate::config::Config;
use crate::event::Protocol;
use crate::gpio::{Gpio, Level};
use crate::matrix::Matrix;
use crate::Result;

/// Edges without frame completion before the state machine gives up.
/// Max 64 bit code = 128 edges, plus one.
const STATE_RESET: u8 = 129;

/// Pulses above this are a dead line or a receiver gain excursion;
/// they abort the frame in progress.
const FRAME_ABORT_US: u32 = 22_222;

const POLL_TIMEOUT_MS: i32 = 250;

/// Per-polarity histogram of pulse lengths in 10 µs bins. Bins are
/// atomic so the sampler counts lock-free while the decoder dumps.
pub struct PulseCounters {
    l: [AtomicU32; 256],
    h: [AtomicU32; 256],
}

impl PulseCounters {
    pub fn new() -> Self {
        Self {
            l: std::array::from_fn(|_| AtomicU32::new(0)),
            h: std::array::from_fn(|_| AtomicU32::new(0)),
        }
    }

    /// Count one ended pulse. `deci` is the length in 10 µs units.
    fn record(&self, ended: Level, deci: u32) {
        if deci > 255 {
            debug!("SAMPLER pulse counter overflow {deci}");
            return;
        }
        match ended {
            Level::Low => self.l[deci as usize].fetch_add(1, Ordering::Relaxed),
            Level::High => self.h[deci as usize].fetch_add(1, Ordering::Relaxed),
        };
    }

    pub fn low(&self, deci: usize) -> u32 {
        self.l[deci].load(Ordering::Relaxed)
    }

    pub fn high(&self, deci: usize) -> u32 {
        self.h[deci].load(Ordering::Relaxed)
    }

    /// Print occupied bins and the ten most frequent pulse lengths
    /// (noise bins excluded), then reset.
    pub fn dump(&self) {
        let mut l: [u32; 256] = std::array::from_fn(|i| self.l[i].swap(0, Ordering::Relaxed));
        let mut h: [u32; 256] = std::array::from_fn(|i| self.h[i].swap(0, Ordering::Relaxed));

        print!("\nLCOUNTER   ");
        for (i, &c) in l.iter().enumerate() {
            if c > 0 {
                print!("{i}:{c} ");
            }
        }
        print!("\nHCOUNTER   ");
        for (i, &c) in h.iter().enumerate() {
            if c > 0 {
                print!("{i}:{c} ");
            }
        }
        println!();

        // ignore LOW pulses below 200 µs and HIGH pulses below 300 µs
        l[0] = 0;
        l[1] = 0;
        h[0] = 0;
        h[1] = 0;
        h[2] = 0;

        println!("TOP-TEN (without noise)");
        for _ in 0..10 {
            let (li, lc) = max_bin(&l);
            let (hi, hc) = max_bin(&h);
            println!("L{li:03} {lc:04}   H{hi:03} {hc:04}");
            l[li] = 0;
            h[hi] = 0;
        }
    }
}

fn max_bin(bins: &[u32; 256]) -> (usize, u32) {
    let mut max_i = 0;
    let mut max_c = 0;
    for (i, &c) in bins.iter().enumerate() {
        if c > max_c {
            max_c = c;
            max_i = i;
        }
    }
    (max_i, max_c)
}

impl Default for PulseCounters {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum State {
    /// Waiting for a known sync pulse.
    Idle,
    /// Sampling bits carried by LOW pulses.
    SampleLow,
    /// Sampling bits carried by HIGH pulses.
    SampleHigh,
    /// Analyzer: waiting for the configured sync window.
    AnalyzerSync,
    /// Analyzer: sampling the configured number of bits.
    AnalyzerSample,
}

/// The edge-fed decoding state machine. Pure logic - the thread loop
/// wires it to the GPIO and the matrix, tests feed it synthetic edges.
pub struct RealtimeSampler {
    cfg: Arc<Config>,
    counters: Arc<PulseCounters>,
    state: State,
    code: u64,
    bits: u8,
    protocol: Protocol,
    divider: u32,
    state_reset: u8,
}

impl RealtimeSampler {
    pub fn new(cfg: Arc<Config>, counters: Arc<PulseCounters>) -> Self {
        let state = if cfg.analyzer_mode {
            State::AnalyzerSync
        } else {
            State::Idle
        };
        Self {
            cfg,
            counters,
            state,
            code: 0,
            bits: 0,
            protocol: Protocol::Analyze,
            divider: 0,
            state_reset: STATE_RESET,
        }
    }

    fn idle_state(&self) -> State {
        if self.cfg.analyzer_mode {
            State::AnalyzerSync
        } else {
            State::Idle
        }
    }

    /// Process one edge: `level` was read after the edge, `pulse_us` is
    /// the length of the pulse that just ended (whose level is the
    /// inverse). Returns a finished code when a frame completes.
    pub fn feed(&mut self, level: Level, pulse_us: u32) -> Option<(Protocol, u64)> {
        // ignore noise & crap
        if pulse_us < self.cfg.noise_threshold_us as u32 {
            return None;
        }
        if pulse_us > FRAME_ABORT_US {
            self.state = self.idle_state();
            return None;
        }

        let ended = level.inverse();
        // pulse length in 10 µs units, round to nearest
        let deci = (pulse_us + 5) / 10;

        if self.cfg.analyzer_mode || self.cfg.pulse_counter_active {
            self.counters.record(ended, deci);
        } else {
            // error detection: a frame must complete within STATE_RESET edges
            self.state_reset = self.state_reset.wrapping_sub(1);
            if self.state_reset == 0 {
                debug!("SAMPLER sampling on protocol {:?} aborted", self.protocol);
                self.state = self.idle_state();
                return None;
            }
        }

        match self.state {
            State::Idle => {
                self.code = 0;
                self.state_reset = STATE_RESET;

                if ended == Level::Low {
                    // LOW sync pulses
                    if (3_800..4_000).contains(&pulse_us) {
                        // not a real sync - the pause between repeats
                        self.arm(Protocol::Nexus, 36, State::SampleLow, 1_500);
                    } else if (T1_SYNC_MIN..T1_SYNC_MAX).contains(&pulse_us) {
                        self.arm(Protocol::Flamingo28, 28, State::SampleHigh, T1X2);
                    } else if (T4_SYNC_MIN..T4_SYNC_MAX).contains(&pulse_us) {
                        self.arm(Protocol::Flamingo24, 24, State::SampleHigh, T1X2);
                    } else if (T2_SYNC_MIN..T2_SYNC_MAX).contains(&pulse_us) {
                        self.arm(Protocol::Flamingo32, 64, State::SampleLow, T2Y);
                    }
                }
                None
            }

            State::SampleLow => {
                if self.bits > 0 && ended == Level::Low {
                    self.sample_bit(pulse_us)
                } else {
                    None
                }
            }

            State::SampleHigh => {
                if self.bits > 0 && ended == Level::High {
                    self.sample_bit(pulse_us)
                } else {
                    None
                }
            }

            State::AnalyzerSync => {
                self.code = 0;
                self.state_reset = STATE_RESET;

                let selected = match ended {
                    Level::Low => self.cfg.sync_on.on_low(),
                    Level::High => self.cfg.sync_on.on_high(),
                };
                if selected && (self.cfg.sync_min_us..self.cfg.sync_max_us).contains(&pulse_us) {
                    self.protocol = Protocol::Analyze;
                    self.bits = self.cfg.bits_to_sample;
                    self.divider = self.cfg.bit_divider_us;
                    self.state = State::AnalyzerSample;
                    if !self.cfg.quiet {
                        print!("\nSYN ");
                    }
                }
                None
            }

            State::AnalyzerSample => {
                if self.bits == 0 {
                    return None;
                }
                if !self.cfg.quiet {
                    match ended {
                        Level::Low => print!("L{deci:02} "),
                        Level::High => print!("H{deci:02} "),
                    }
                }
                let selected = match ended {
                    Level::Low => self.cfg.sample_on.on_low(),
                    Level::High => self.cfg.sample_on.on_high(),
                };
                if selected {
                    let done = self.sample_bit(pulse_us);
                    if done.is_some() && !self.cfg.quiet {
                        println!();
                    }
                    done
                } else {
                    None
                }
            }
        }
    }

    fn arm(&mut self, protocol: Protocol, bits: u8, state: State, divider: u32) {
        self.protocol = protocol;
        self.bits = bits;
        self.state = state;
        self.divider = divider;
    }

    /// Decode one bit from the pulse length; on the last bit, hand the
    /// finished code out and fall back to the idle state.
    fn sample_bit(&mut self, pulse_us: u32) -> Option<(Protocol, u64)> {
        if pulse_us > self.divider {
            self.code += 1;
        }
        self.bits -= 1;
        if self.bits == 0 {
            let result = (self.protocol, self.code);
            self.state = self.idle_state();
            Some(result)
        } else {
            self.code <<= 1;
            None
        }
    }
}

/// Sampler thread body: feed edges into the state machine and store
/// finished codes in the matrix.
pub fn run<G: Gpio>(
    cfg: &Arc<Config>,
    gpio: &mut G,
    matrix: &Mutex<Matrix>,
    counters: Arc<PulseCounters>,
    cancel: &AtomicBool,
) -> Result<()> {
    let mut machine = RealtimeSampler::new(cfg.clone(), counters);

    if cfg.analyzer_mode && !cfg.quiet {
        println!(
            "SAMPLER sync on {}-{}µs {} pulses, sampling {} {} bits, 0/1 divider pulse length {}µs",
            cfg.sync_min_us,
            cfg.sync_max_us,
            cfg.sync_on,
            cfg.bits_to_sample,
            cfg.sample_on,
            cfg.bit_divider_us
        );
    }

    let mut last = clock::micros();
    while !cancel.load(Ordering::Relaxed) {
        let Some(level) = gpio.wait_edge(POLL_TIMEOUT_MS)? else {
            continue;
        };
        let pulse = clock::micros_since(&mut last);

        if let Some((protocol, code)) = machine.feed(level, pulse) {
            matrix.lock().expect("matrix lock").store(protocol, code);
        }
    }
    Ok(())
}
