//! Runtime configuration for the sniffer and transmitter.
//!
//! One flat struct, populated by the CLI (or a library embedder) and
//! shared read-only by both worker threads. The defaults reproduce the
//! proven receiver setup: RX on pin 2 with pull-down, stream decoder
//! every second, 100 µs noise gate, identical repeats coalesced.

use std::sync::Arc;

use crate::event::Event;

/// Transmitter ids of the known remote control units.
/// White 1, White 2, White 3, Black, SF-500.
pub const REMOTES: [u16; 5] = [0x53cc, 0x835a, 0x31e2, 0x295c, 0x272d];

/// Injected event handler; invoked synchronously on the decoder thread.
pub type Handler = Arc<dyn Fn(&Event) + Send + Sync>;

/// Which pulse polarity the analyzer syncs or samples on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EdgeSelect {
    Low,
    High,
    /// Both polarities.
    Edge,
}

impl EdgeSelect {
    pub fn on_low(self) -> bool {
        matches!(self, EdgeSelect::Low | EdgeSelect::Edge)
    }

    pub fn on_high(self) -> bool {
        matches!(self, EdgeSelect::High | EdgeSelect::Edge)
    }
}

impl std::fmt::Display for EdgeSelect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            EdgeSelect::Low => "LOW",
            EdgeSelect::High => "HIGH",
            EdgeSelect::Edge => "EDGE",
        })
    }
}

/// Sniffer configuration. See the receiver CLI for the knobs exposed
/// to the command line.
#[derive(Clone)]
pub struct Config {
    /// GPIO pin wired to the receiver data line.
    pub rx_pin: u8,
    /// GPIO pin wired to the transmitter data line.
    pub tx_pin: u8,

    /// Learn an unknown signal instead of decoding known protocols.
    pub analyzer_mode: bool,
    /// Decode known sync pulses directly in the sampler interrupt path.
    pub realtime_mode: bool,
    /// Maintain the pulse-length histogram and dump it each decoder pass.
    pub pulse_counter_active: bool,

    /// Pulses shorter than this are noise and never reach the state machine.
    pub noise_threshold_us: u16,
    /// Pause between decoder passes.
    pub decoder_delay_ms: u64,
    /// Analyzer: number of bits to sample after sync (0..=64).
    pub bits_to_sample: u8,
    /// Coalesce identical consecutive codes into one event with a repeat count.
    pub collect_identical_codes: bool,

    /// Analyzer: polarity of the sync pulse.
    pub sync_on: EdgeSelect,
    /// Analyzer/stream: polarity carrying the data bits.
    pub sample_on: EdgeSelect,
    /// Analyzer: sync pulse window, microseconds.
    pub sync_min_us: u32,
    pub sync_max_us: u32,
    /// Analyzer: pulses longer than this decode as `1`.
    pub bit_divider_us: u32,

    /// Dump decoder internals (probe traces, symbol tables, corrections).
    pub verbose: bool,
    /// Suppress decoded-message output on stdout.
    pub quiet: bool,
    /// Emit events as JSON objects instead of text.
    pub json_output: bool,
    /// When set, decoded sensor fields are published as files below this root.
    pub sysfs_root: Option<String>,

    /// Drop frames whose transmitter id is not in [`REMOTES`].
    pub validate_transmitter_ids: bool,

    /// Subscriber slot; a single injected callback.
    pub handler: Option<Handler>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            rx_pin: 2,
            tx_pin: 0,
            analyzer_mode: false,
            realtime_mode: false,
            pulse_counter_active: false,
            noise_threshold_us: 100,
            decoder_delay_ms: 1_000,
            bits_to_sample: 32,
            collect_identical_codes: true,
            sync_on: EdgeSelect::Low,
            sample_on: EdgeSelect::Low,
            sync_min_us: 1_800,
            sync_max_us: 2_000,
            bit_divider_us: 1_500,
            verbose: false,
            quiet: false,
            json_output: false,
            sysfs_root: None,
            validate_transmitter_ids: false,
            handler: None,
        }
    }
}

impl Config {
    /// Reject option combinations the pipeline cannot run with.
    pub fn validate(&self) -> crate::Result<()> {
        if self.bits_to_sample > 64 {
            return Err(crate::Error::Config(format!(
                "bits to sample {} exceeds 64",
                self.bits_to_sample
            )));
        }
        if self.sync_min_us >= self.sync_max_us {
            return Err(crate::Error::Config(format!(
                "empty sync window {}..{}",
                self.sync_min_us, self.sync_max_us
            )));
        }
        // pair-indexed streams advance on exactly one polarity
        if !self.realtime_mode && self.sample_on == EdgeSelect::Edge {
            return Err(crate::Error::Config(
                "stream mode samples on LOW or HIGH, not both".into(),
            ));
        }
        Ok(())
    }

    /// True when `id` may produce events, honoring the validation flag.
    pub fn transmitter_known(&self, id: u16) -> bool {
        !self.validate_transmitter_ids || REMOTES.contains(&id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn oversized_bit_count_is_rejected() {
        let cfg = Config {
            bits_to_sample: 65,
            ..Config::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn edge_sampling_needs_realtime_mode() {
        let cfg = Config {
            sample_on: EdgeSelect::Edge,
            ..Config::default()
        };
        assert!(cfg.validate().is_err());

        let cfg = Config {
            realtime_mode: true,
            sample_on: EdgeSelect::Edge,
            ..Config::default()
        };
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn unknown_transmitter_rejected_only_when_validating() {
        let mut cfg = Config::default();
        assert!(cfg.transmitter_known(0xbeef));
        cfg.validate_transmitter_ids = true;
        assert!(!cfg.transmitter_known(0xbeef));
        assert!(cfg.transmitter_known(0x53cc));
    }
}
