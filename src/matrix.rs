//! Ring of received raw codes pending dispatch.
//!
//! Remotes and sensors repeat every frame several times per burst. The
//! sampler stores each reconstructed code here; the decoder drains the
//! ring once the line has been quiet, coalescing identical consecutive
//! `(protocol, code)` entries into a single dispatch that carries the
//! repeat count. Old entries die when the ring wraps.

use crate::clock;
use crate::event::Protocol;

/// Ring capacity. A burst is ≤ 10 repeats per protocol, so 256 entries
/// hold many seconds of traffic between decoder passes.
const CAPACITY: usize = 256;

/// Quiescence required before the ring is drained: a burst still in
/// progress must coalesce into one event, not two.
pub const DISPATCH_AGE_MS: u64 = 500;

#[derive(Clone, Copy)]
struct Entry {
    protocol: Protocol,
    code: u64,
    timestamp_ms: u64,
}

/// Fixed-capacity ring of `(protocol, code, timestamp)` entries.
pub struct Matrix {
    entries: [Option<Entry>; CAPACITY],
    head: u8,
    tail: u8,
}

impl Matrix {
    pub fn new() -> Self {
        Self {
            entries: [None; CAPACITY],
            head: 0,
            tail: 0,
        }
    }

    /// Store one reconstructed code at the head.
    pub fn store(&mut self, protocol: Protocol, code: u64) {
        self.entries[self.head as usize] = Some(Entry {
            protocol,
            code,
            timestamp_ms: clock::millis(),
        });
        self.head = self.head.wrapping_add(1);
        // ring full: oldest pending entry is overwritten, move the tail past it
        if self.head == self.tail {
            self.tail = self.tail.wrapping_add(1);
        }
    }

    /// True when no entries await dispatch.
    pub fn is_empty(&self) -> bool {
        self.head == self.tail
    }

    /// Milliseconds since the most recent store (u64::MAX when empty).
    pub fn age_ms(&self) -> u64 {
        let newest = self.entries[self.head.wrapping_sub(1) as usize];
        match newest {
            Some(entry) if !self.is_empty() => {
                clock::millis().saturating_sub(entry.timestamp_ms)
            }
            _ => u64::MAX,
        }
    }

    /// Drain all pending entries into `dispatch(protocol, code, repeat)`.
    ///
    /// With `collect` set, identical consecutive entries merge into one
    /// call with `repeat` = run length; otherwise every entry dispatches
    /// with `repeat` = 0. The caller is responsible for the quiescence
    /// gate ([`DISPATCH_AGE_MS`]).
    pub fn decode<F: FnMut(Protocol, u64, u8)>(&mut self, collect: bool, mut dispatch: F) {
        let mut current: Option<(Protocol, u64)> = None;
        let mut repeat: u8 = 0;

        while self.tail != self.head {
            let entry = self.entries[self.tail as usize].take();
            self.tail = self.tail.wrapping_add(1);
            let Some(entry) = entry else { continue };

            if !collect {
                dispatch(entry.protocol, entry.code, 0);
                continue;
            }

            match current {
                Some((p, c)) if p == entry.protocol && c == entry.code => {
                    repeat = repeat.saturating_add(1);
                }
                Some((p, c)) => {
                    dispatch(p, c, repeat);
                    current = Some((entry.protocol, entry.code));
                    repeat = 1;
                }
                None => {
                    current = Some((entry.protocol, entry.code));
                    repeat = 1;
                }
            }
        }

        if let Some((p, c)) = current {
            dispatch(p, c, repeat);
        }
    }
}

impl Default for Matrix {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain(matrix: &mut Matrix, collect: bool) -> Vec<(Protocol, u64, u8)> {
        let mut out = Vec::new();
        matrix.decode(collect, |p, c, r| out.push((p, c, r)));
        out
    }

    #[test]
    fn identical_codes_coalesce_into_one_event() {
        let mut m = Matrix::new();
        for _ in 0..7 {
            m.store(Protocol::Nexus, 0xE700FCF64);
        }
        let events = drain(&mut m, true);
        assert_eq!(events, vec![(Protocol::Nexus, 0xE700FCF64, 7)]);
        assert!(m.is_empty());
    }

    #[test]
    fn distinct_codes_dispatch_separately() {
        let mut m = Matrix::new();
        m.store(Protocol::Flamingo28, 0x0e5afff5);
        m.store(Protocol::Flamingo28, 0x0e5afff5);
        m.store(Protocol::Nexus, 0xE700FCF64);
        let events = drain(&mut m, true);
        assert_eq!(
            events,
            vec![
                (Protocol::Flamingo28, 0x0e5afff5, 2),
                (Protocol::Nexus, 0xE700FCF64, 1),
            ]
        );
    }

    #[test]
    fn collect_disabled_dispatches_every_entry() {
        let mut m = Matrix::new();
        for _ in 0..3 {
            m.store(Protocol::Flamingo32, 0x1234);
        }
        let events = drain(&mut m, false);
        assert_eq!(events.len(), 3);
        assert!(events.iter().all(|&(_, _, r)| r == 0));
    }

    #[test]
    fn fresh_matrix_reports_infinite_age() {
        let m = Matrix::new();
        assert_eq!(m.age_ms(), u64::MAX);
    }

    #[test]
    fn stored_entry_is_young() {
        let mut m = Matrix::new();
        m.store(Protocol::Analyze, 1);
        assert!(m.age_ms() < DISPATCH_AGE_MS);
    }

    #[test]
    fn ring_wrap_drops_oldest_entries() {
        let mut m = Matrix::new();
        for i in 0..300u64 {
            m.store(Protocol::Analyze, i);
        }
        let events = drain(&mut m, false);
        // capacity is 256; the overwritten head entries are gone
        assert_eq!(events.len(), 255);
        assert_eq!(events.first().unwrap().1, 45);
        assert_eq!(events.last().unwrap().1, 299);
    }
}
