//! Per-protocol pulse-bang senders.
//!
//! Bits go out MSB first; every frame repeats several times with a
//! trailing quiet pause. The [`PulseSink`] seam separates the pulse
//! trains from the hardware: the shipped sink drives the TX pin with
//! busy-wait timing, tests record the trace.
//!
//! Pulse shapes (microseconds, H = carrier, L = silence):
//!
//! - **rc1** (28 bit): sync `H 330, L 4950`; bit 0 = `H 330, L 990`,
//!   bit 1 = `H 990, L 330`; 4 repeats.
//! - **rc4** (24 bit): as rc1 with sync `L 10230`; 5 repeats.
//! - **rc2** (32 bit): sync `H 200, L 2780`; each bit is a clock pulse
//!   plus a data pulse, 0 = short-then-long gap, 1 = long-then-short;
//!   a terminating clock pulse closes each repeat; 3 repeats.
//! - **rc3** (multibit): clock pulse followed by a counted burst of
//!   data pulses per symbol; encoding unknown, the captured "on"
//!   pattern is replayed verbatim.

use log::warn;

use crate::clock;
use crate::codec::flamingo::{
    self, Fa500, Fa500x32, RC3_PATTERN_ON, RC4_CODE, REPEAT_PAUSE_LONG_US, REPEAT_PAUSE_SHORT_US,
    T1, T1X15, T1X3, T1X31, T2H, T2L, T2S, T2X, T3H, T3L, T3S, T3X,
};
use crate::config::REMOTES;
use crate::fmt::{printbits, SPACEMASK_FA500, SPACEMASK_SF500};
use crate::gpio::{Gpio, Level};
use crate::Result;

/// Where pulses go. `emit` is timing-critical (busy-wait); `rest` is a
/// long quiet gap where yielding is fine.
pub trait PulseSink {
    fn emit(&mut self, level: Level, micros: u32);
    fn rest(&mut self, micros: u32);
}

/// The real sink: drives the TX pin, holding each level for the pulse
/// length with the busy-wait clock.
pub struct GpioPulseSink<G: Gpio> {
    gpio: G,
}

impl<G: Gpio> GpioPulseSink<G> {
    pub fn new(gpio: G) -> Self {
        Self { gpio }
    }
}

impl<G: Gpio> PulseSink for GpioPulseSink<G> {
    fn emit(&mut self, level: Level, micros: u32) {
        if let Err(err) = self.gpio.write(level) {
            // a failed write mid-frame garbles the frame either way;
            // keep the timing and let the repeats cover it
            warn!("TX write failed: {err}");
        }
        clock::delay_micros(micros);
    }

    fn rest(&mut self, micros: u32) {
        if let Err(err) = self.gpio.write(Level::Low) {
            warn!("TX write failed: {err}");
        }
        std::thread::sleep(std::time::Duration::from_micros(micros as u64));
    }
}

/// A recorded `(level, µs)` trace instead of hardware, for tests.
#[derive(Default)]
pub struct TracePulseSink {
    pub pulses: Vec<(Level, u32)>,
}

impl PulseSink for TracePulseSink {
    fn emit(&mut self, level: Level, micros: u32) {
        self.pulses.push((level, micros));
    }

    fn rest(&mut self, micros: u32) {
        self.pulses.push((Level::Low, micros));
    }
}

/// rc1 pattern: 28 bit encrypted FA500 frames.
pub fn send28<S: PulseSink>(sink: &mut S, code: u32, repeats: u32) {
    for _ in 0..repeats {
        // sync
        sink.emit(Level::High, T1);
        sink.emit(Level::Low, T1X15);

        let mut mask = 1u32 << 27;
        while mask != 0 {
            if code & mask != 0 {
                sink.emit(Level::High, T1X3);
                sink.emit(Level::Low, T1);
            } else {
                sink.emit(Level::High, T1);
                sink.emit(Level::Low, T1X3);
            }
            mask >>= 1;
        }
    }
    sink.rest(REPEAT_PAUSE_SHORT_US);
}

/// rc4 pattern: 24 bit frames, long sync, no encryption.
pub fn send24<S: PulseSink>(sink: &mut S, code: u32, repeats: u32) {
    for _ in 0..repeats {
        // sync
        sink.emit(Level::High, T1);
        sink.emit(Level::Low, T1X31);

        let mut mask = 1u32 << 23;
        while mask != 0 {
            if code & mask != 0 {
                sink.emit(Level::High, T1X3);
                sink.emit(Level::Low, T1);
            } else {
                sink.emit(Level::High, T1);
                sink.emit(Level::Low, T1X3);
            }
            mask >>= 1;
        }
    }
    sink.rest(REPEAT_PAUSE_LONG_US);
}

/// rc2 pattern: 32 bit frames as clock + data pulse pairs.
pub fn send32<S: PulseSink>(sink: &mut S, message: u32, repeats: u32) {
    for _ in 0..repeats {
        // sync
        sink.emit(Level::High, T2H);
        sink.emit(Level::Low, T2S);

        let mut mask = 1u32 << 31;
        while mask != 0 {
            if message & mask != 0 {
                sink.emit(Level::High, T2H);
                sink.emit(Level::Low, T2X);
                sink.emit(Level::High, T2H);
                sink.emit(Level::Low, T2L);
            } else {
                sink.emit(Level::High, T2H);
                sink.emit(Level::Low, T2L);
                sink.emit(Level::High, T2H);
                sink.emit(Level::Low, T2X);
            }
            mask >>= 1;
        }

        // a clock (parity?) pulse terminates the message
        sink.emit(Level::High, T2H);
        sink.emit(Level::Low, T2L);

        // wait before sending the next sync
        sink.emit(Level::Low, 4 * T2S);
    }
    sink.rest(REPEAT_PAUSE_LONG_US);
}

/// rc3 pattern: clock pulse plus a counted burst of data pulses per
/// symbol. `pattern` is a string of digits (data pulses per clock).
pub fn send32_multibit<S: PulseSink>(sink: &mut S, pattern: &str, repeats: u32) {
    let counts: Vec<u32> = pattern.bytes().map(|b| (b - b'0') as u32).collect();

    for _ in 0..repeats {
        // sync
        sink.emit(Level::High, T3H);
        sink.emit(Level::Low, T3S);

        for &count in &counts {
            // clock bit
            sink.emit(Level::High, T3H);
            sink.emit(Level::Low, T3L);

            // data bits
            for _ in 0..count {
                sink.emit(Level::High, T3H);
                sink.emit(Level::Low, T3L);
            }

            // wait to next clock bit
            sink.emit(Level::Low, T3X);
        }

        // wait before sending the next sync
        sink.emit(Level::Low, 4 * T3S);
    }
    sink.rest(REPEAT_PAUSE_LONG_US);
}

/// Send one FA500 switch command: the encrypted 28 bit frame plus the
/// companion rc2/rc3/rc4 frames the original remote emits. `rolling` =
/// `None` sends all four rolling codes in sequence, 1 s apart.
pub fn send_fa500<S: PulseSink>(
    sink: &mut S,
    remote: usize,
    channel: char,
    command: u8,
    rolling: Option<u8>,
    quiet: bool,
) -> Result<()> {
    if remote < 1 || remote > REMOTES.len() {
        return Err(crate::Error::Config(format!("unknown remote {remote}")));
    }
    if !('A'..='P').contains(&channel) {
        return Err(crate::Error::Config(format!(
            "channel not supported {channel}"
        )));
    }
    if let Some(r) = rolling {
        if r > 3 {
            return Err(crate::Error::Config(format!("rolling index {r} not in 0..=3")));
        }
    }

    let xmitter = REMOTES[remote - 1];
    let chan = channel as u8 - b'A' + 1;

    let rollings: Vec<u8> = match rolling {
        Some(r) => vec![r],
        None => vec![0, 1, 2, 3],
    };
    let sequence = rollings.len() > 1;

    for (i, r) in rollings.iter().enumerate() {
        let m28 = Fa500 {
            xmitter,
            channel: chan,
            command: if command != 0 { 2 } else { 0 },
            payload: 0,
            rolling: *r,
        }
        .encode();
        let m32 = Fa500x32 {
            xmitter,
            channel: chan,
            command,
            payload: 0,
        }
        .encode();
        let c28 = flamingo::encrypt(m28);

        if !quiet {
            println!(
                "FA500 {remote} {channel} {command} {r} => 0x{m28:08x} {} => 0x{c28:08x}",
                printbits(m28, SPACEMASK_FA500)
            );
        }

        send28(sink, c28, 4);
        send32(sink, m32, 3);
        send32_multibit(sink, RC3_PATTERN_ON, 3);
        send24(sink, RC4_CODE, 5);

        if sequence && i + 1 < rollings.len() {
            sink.rest(1_000_000);
        }
    }
    Ok(())
}

/// Send one SF-500 switch command (rc2 pulse shape, SF-500 layout;
/// the cipher is unknown so the message goes out unencrypted).
pub fn send_sf500<S: PulseSink>(
    sink: &mut S,
    remote: usize,
    channel: char,
    command: u8,
    quiet: bool,
) -> Result<()> {
    if remote < 1 || remote > REMOTES.len() {
        return Err(crate::Error::Config(format!("unknown remote {remote}")));
    }

    let xmitter = REMOTES[remote - 1];
    let chan = channel as u8 - b'A' + 1;
    let message = ((xmitter as u32) << 16) | ((command as u32 & 0x0f) << 4) | (chan as u32 & 0x0f);

    if !quiet {
        println!(
            "SF500 {remote} {channel} {command} => 0x{message:08x} {}",
            printbits(message, SPACEMASK_SF500)
        );
    }

    send32(sink, message, 5);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fa500_burst_starts_with_the_rc1_sync() {
        let mut sink = TracePulseSink::default();
        send_fa500(&mut sink, 1, 'A', 1, Some(0), true).unwrap();

        // sync: HIGH 330 then LOW 4950
        assert_eq!(sink.pulses[0], (Level::High, 330));
        assert_eq!(sink.pulses[1], (Level::Low, 4_950));

        // then 28 bit pairs of (330 H, 990 L) or (990 H, 330 L)
        for pair in sink.pulses[2..2 + 56].chunks(2) {
            let (hl, hd) = pair[0];
            let (ll, ld) = pair[1];
            assert_eq!(hl, Level::High);
            assert_eq!(ll, Level::Low);
            assert!(
                (hd == 330 && ld == 990) || (hd == 990 && ld == 330),
                "unexpected bit pair {pair:?}"
            );
        }
    }

    #[test]
    fn rc1_frame_encodes_the_code_msb_first() {
        let mut sink = TracePulseSink::default();
        let code = flamingo::encrypt(
            Fa500 {
                xmitter: REMOTES[0],
                channel: 1,
                command: 2,
                payload: 0,
                rolling: 0,
            }
            .encode(),
        );
        send28(&mut sink, code, 1);

        // skip sync, read the HIGH pulse of every bit pair
        let mut decoded = 0u32;
        for bit in 0..28 {
            let (level, micros) = sink.pulses[2 + bit * 2];
            assert_eq!(level, Level::High);
            decoded <<= 1;
            if micros == 990 {
                decoded |= 1;
            }
        }
        assert_eq!(decoded, code);
    }

    #[test]
    fn rc1_repeats_and_pauses() {
        let mut sink = TracePulseSink::default();
        send28(&mut sink, 0x0e5afff5, 4);
        // 4 repeats × (2 sync + 56 bit pulses) + 1 trailing pause
        assert_eq!(sink.pulses.len(), 4 * 58 + 1);
        assert_eq!(*sink.pulses.last().unwrap(), (Level::Low, 5_555));
    }

    #[test]
    fn rc4_sync_is_31_t1() {
        let mut sink = TracePulseSink::default();
        send24(&mut sink, RC4_CODE, 1);
        assert_eq!(sink.pulses[0], (Level::High, 330));
        assert_eq!(sink.pulses[1], (Level::Low, 10_230));
        assert_eq!(*sink.pulses.last().unwrap(), (Level::Low, 9_999));
    }

    #[test]
    fn rc2_bits_are_clock_data_pairs_with_terminator() {
        let mut sink = TracePulseSink::default();
        send32(&mut sink, 0x8000_0001, 1);

        // sync
        assert_eq!(sink.pulses[0], (Level::High, 200));
        assert_eq!(sink.pulses[1], (Level::Low, 2_780));

        // first bit (1): clock, long gap, data, short gap
        assert_eq!(sink.pulses[2], (Level::High, 200));
        assert_eq!(sink.pulses[3], (Level::Low, 1_390));
        assert_eq!(sink.pulses[4], (Level::High, 200));
        assert_eq!(sink.pulses[5], (Level::Low, 330));

        // second bit (0): short gap before the data pulse
        assert_eq!(sink.pulses[7], (Level::Low, 330));
        assert_eq!(sink.pulses[9], (Level::Low, 1_390));

        // terminator closes the repetition before the inter-sync gap
        // and the trailing quiet pause
        let n = sink.pulses.len();
        assert_eq!(sink.pulses[n - 4], (Level::High, 200));
        assert_eq!(sink.pulses[n - 3], (Level::Low, 330));
        assert_eq!(sink.pulses[n - 2], (Level::Low, 4 * 2_780));
        assert_eq!(sink.pulses[n - 1], (Level::Low, 9_999));
    }

    #[test]
    fn send_fa500_rejects_bad_arguments() {
        let mut sink = TracePulseSink::default();
        assert!(send_fa500(&mut sink, 0, 'A', 1, Some(0), true).is_err());
        assert!(send_fa500(&mut sink, 9, 'A', 1, Some(0), true).is_err());
        assert!(send_fa500(&mut sink, 1, 'x', 1, Some(0), true).is_err());
        assert!(send_fa500(&mut sink, 1, 'A', 1, Some(7), true).is_err());
        assert!(sink.pulses.is_empty());
    }

    #[test]
    fn missing_rolling_sends_all_four_in_sequence() {
        let mut sink = TracePulseSink::default();
        send_fa500(&mut sink, 2, 'B', 0, None, true).unwrap();
        // three 1 s gaps separate the four rolling-code bursts
        let gaps = sink
            .pulses
            .iter()
            .filter(|&&(_, d)| d == 1_000_000)
            .count();
        assert_eq!(gaps, 3);
    }
}
