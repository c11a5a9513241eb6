//! Shared pulse ring buffers.
//!
//! Single producer (sampler thread), single consumer (decoder thread).
//! Two parallel rings of 65 536 pulse lengths - one per polarity - plus
//! a shared head index. In pair-indexed (stream) mode the low and high
//! slot at one index describe one low+high pulse pair; the head
//! advances once per pair, on the polarity selected by the
//! configuration.
//!
//! The producer stores the slot first, then publishes the head with
//! release ordering; the consumer loads the head with acquire ordering
//! before reading slots. Indices are `u16` and wrap with the ring.

use std::sync::atomic::{AtomicU16, Ordering};

/// Ring size; matches the `u16` index space so positions wrap for free.
pub const RING: usize = 1 << 16;

/// Lock-free pulse sample storage shared between the worker threads.
pub struct SampleRing {
    lsamples: Vec<AtomicU16>,
    hsamples: Vec<AtomicU16>,
    head: AtomicU16,
}

impl SampleRing {
    pub fn new() -> Self {
        let mut lsamples = Vec::with_capacity(RING);
        let mut hsamples = Vec::with_capacity(RING);
        lsamples.resize_with(RING, || AtomicU16::new(0));
        hsamples.resize_with(RING, || AtomicU16::new(0));
        Self {
            lsamples,
            hsamples,
            head: AtomicU16::new(0),
        }
    }

    /// Producer: record a LOW pulse length at the head position.
    pub fn put_low(&self, pulse: u16) {
        let head = self.head.load(Ordering::Relaxed);
        self.lsamples[head as usize].store(pulse, Ordering::Relaxed);
    }

    /// Producer: record a HIGH pulse length at the head position.
    pub fn put_high(&self, pulse: u16) {
        let head = self.head.load(Ordering::Relaxed);
        self.hsamples[head as usize].store(pulse, Ordering::Relaxed);
    }

    /// Producer: publish the current position and move to the next.
    pub fn advance(&self) {
        let head = self.head.load(Ordering::Relaxed);
        self.head.store(head.wrapping_add(1), Ordering::Release);
    }

    /// Consumer: first position not yet published.
    pub fn head(&self) -> u16 {
        self.head.load(Ordering::Acquire)
    }

    pub fn low(&self, pos: u16) -> u16 {
        self.lsamples[pos as usize].load(Ordering::Relaxed)
    }

    pub fn high(&self, pos: u16) -> u16 {
        self.hsamples[pos as usize].load(Ordering::Relaxed)
    }
}

impl Default for SampleRing {
    fn default() -> Self {
        Self::new()
    }
}
