//! Stream decoding: alphabet learning, sync detection, bit reconstruction.
//!
//! - **alphabet**: per-polarity symbol tables with occurrence counts,
//!   directional learning rules and the merge-based alignment that
//!   collapses jitter-split symbols.
//! - **decoder**: the pass pipeline - scale, sniff, probe, curate,
//!   melt, tune, iron, hammer, sync detection, bit reconstruction.

pub mod alphabet;
pub mod decoder;

#[cfg(test)]
mod tests;
