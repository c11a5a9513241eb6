//! The stream decoder: learns an unknown signal's pulse alphabet and
//! reconstructs its frames.
//!
//! Runs on the relaxed thread once per decoder delay and processes the
//! sample window `[start, head)` accumulated by the sampler:
//!
//! 1.  **scale** raw µs samples to 100 µs symbols (clamped to 255),
//! 2.  **sniff** for coarse 4-symbol repetition patterns,
//! 3.  **probe** the candidate region outward, learning symbols and
//!     tracking a floating error counter until the signal dies,
//! 4.  **curate** the alphabets (sort / condense / align),
//! 5.  **melt** sub-symbol spikes into their successor,
//! 6.  **tune** the window edges against the learned alphabet,
//! 7.  **iron** soft errors by rising tolerance,
//! 8.  **hammer** the remaining invalid symbols to their best match,
//! 9.  **find the sync symbol** (≥ 3 equal spacings of ≥ 8 bits),
//! 10. **reconstruct bits** around every sync and lift the codes into
//!     the matrix.
//!
//! Consumed stream positions are cleared so a frame is never decoded
//! twice.

use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};

use ansi_term::Colour::{Green, Red};
use log::debug;

use crate::clock;
use crate::codec;
use crate::config::Config;
use crate::decoder::alphabet::{Direction, Polarity, Tables, SYMBOLS};
use crate::event::Protocol;
use crate::fmt::{printbits64, SPACEMASK_NEXUS};
use crate::matrix::Matrix;
use crate::sampler::ring::{SampleRing, RING};

/// Samples scale down by this much; one symbol step is 100 µs.
const SCALE_US: u16 = 100;

/// Error counter level treated as end of transmission while probing right.
const EOT_ERROR: i32 = u8::MAX as i32 - 10;

/// Probe windows outside this size are noise or runaway.
const WINDOW_MIN: u16 = 16;
const WINDOW_MAX: u16 = 2048;

/// Edge-tuning distance tolerance.
const TUNE_TOLERANCE: u8 = 3;

/// Ring distance from `start` to `stop`, inclusive at the stop end.
fn distance(start: u16, stop: u16) -> u16 {
    if stop < start {
        stop.wrapping_sub(start)
    } else {
        stop.wrapping_sub(start).wrapping_add(1)
    }
}

pub struct StreamDecoder {
    cfg: Arc<Config>,
    ring: Arc<SampleRing>,
    matrix: Arc<Mutex<Matrix>>,
    lstream: Vec<u8>,
    hstream: Vec<u8>,
    tables: Tables,
    /// First stream position not yet consumed.
    start: u16,
    receiving_ticks: u32,
}

impl StreamDecoder {
    pub fn new(cfg: Arc<Config>, ring: Arc<SampleRing>, matrix: Arc<Mutex<Matrix>>) -> Self {
        Self {
            cfg,
            ring,
            matrix,
            lstream: vec![0; RING],
            hstream: vec![0; RING],
            tables: Tables::new(),
            start: 0,
            receiving_ticks: 0,
        }
    }

    /// Thread body: pace, defer while reception is in progress, then
    /// run one decoding pass and drain the matrix.
    pub fn run(&mut self, cancel: &AtomicBool) {
        if !self.cfg.quiet {
            println!(
                "DECODER run every {} ms, noise level {} µs, {}",
                self.cfg.decoder_delay_ms,
                self.cfg.noise_threshold_us,
                if self.cfg.collect_identical_codes {
                    "collect identical codes"
                } else {
                    "process each code separately"
                }
            );
        }

        while clock::msleep_cancellable(self.cfg.decoder_delay_ms, cancel) {
            while self.receiving() {
                if !clock::msleep_cancellable(100, cancel) {
                    return;
                }
            }
            self.pass();
            self.dispatch();
        }
    }

    /// Drain the matrix into the protocol dispatcher.
    fn dispatch(&self) {
        let mut matrix = self.matrix.lock().expect("matrix lock");
        let cfg = &self.cfg;
        matrix.decode(cfg.collect_identical_codes, |protocol, code, repeat| {
            codec::decode(cfg, protocol, code, repeat);
        });
    }

    // -----------------------------------------------------------------
    // Stream access. The "x" stream is the one carrying the data bits,
    // selected by the sampling polarity.
    // -----------------------------------------------------------------

    fn l(&self, p: u16) -> u8 {
        self.lstream[p as usize]
    }

    fn h(&self, p: u16) -> u8 {
        self.hstream[p as usize]
    }

    fn xsym(&self, p: u16) -> u8 {
        if self.cfg.sample_on.on_low() {
            self.l(p)
        } else {
            self.h(p)
        }
    }

    fn clear_streams(&mut self, mut start: u16, stop: u16) {
        while start != stop {
            self.lstream[start as usize] = 0;
            self.hstream[start as usize] = 0;
            start = start.wrapping_add(1);
        }
    }

    // -----------------------------------------------------------------
    // Step 1 - scale
    // -----------------------------------------------------------------

    /// Round pulse lengths to multiples of 100 µs and divide by 100,
    /// clamping at 255 (receiver sensitivity overridden by a stronger
    /// signal shows up as overlong pulses).
    fn scale(&mut self, mut start: u16, stop: u16) {
        let smax = u8::MAX as u16 * SCALE_US;
        while start != stop {
            let sl = self.ring.low(start).min(smax);
            let sh = self.ring.high(start).min(smax);

            let l = if sl % SCALE_US < SCALE_US / 2 {
                sl / SCALE_US
            } else {
                sl / SCALE_US + 1
            };
            let h = if sh % SCALE_US < SCALE_US / 2 {
                sh / SCALE_US
            } else {
                sh / SCALE_US + 1
            };

            self.lstream[start as usize] = l as u8;
            self.hstream[start as usize] = h as u8;
            start = start.wrapping_add(1);
        }
    }

    // -----------------------------------------------------------------
    // Step 2 - coarse 4-block pattern sniffing
    // -----------------------------------------------------------------

    /// Dumb 4-block symbol pattern match; returns the smallest matching
    /// symbol, 0 when the block does not look like signal.
    fn sniff(&self, start: u16) -> u8 {
        let p0 = self.xsym(start);
        let p1 = self.xsym(start.wrapping_add(1));
        let p2 = self.xsym(start.wrapping_add(2));
        let p3 = self.xsym(start.wrapping_add(3));

        // contains zeros
        if p0 == 0 || p1 == 0 || p2 == 0 || p3 == 0 {
            return 0;
        }

        // [3 3 3 3] full identical
        if p0 == p1 && p1 == p2 && p2 == p3 {
            return p0;
        }

        // [9 9 19 19] [9 19 19 9] symmetric identical values
        if p0 == p1 && p2 == p3 {
            return p0.min(p2);
        }
        if p0 == p3 && p1 == p2 {
            return p0;
        }

        // [5 10 5 10] alternating identical values
        if p0 == p2 && p1 == p3 {
            return p0;
        }

        // [19 19 19 9] 3 identical values
        if p0 == p1 && p1 == p2 {
            return p0;
        }
        if p0 == p1 && p1 == p3 {
            return p0;
        }
        if p0 == p2 && p2 == p3 {
            return p0;
        }
        if p1 == p2 && p2 == p3 {
            return p1;
        }

        0
    }

    // -----------------------------------------------------------------
    // Step 3 - probe
    // -----------------------------------------------------------------

    /// Expand right from `start`, learning symbols. The floating error
    /// counter sinks on every table hit and rises on every miss; when
    /// it saturates the transmission has ended.
    fn probe_right(&mut self, mut start: u16) -> u16 {
        let verbose = self.cfg.verbose;
        if verbose {
            println!(
                "DECODER probe        ►  {{{:2},{:2}}} L      {{{:2},{:2}}} H",
                self.tables.l.symbol(0),
                self.tables.l.symbol(1),
                self.tables.h.symbol(0),
                self.tables.h.symbol(1)
            );
        }

        let mut e: i32 = 0;
        let stop = self.ring.head();
        while start != stop {
            let l = self.l(start);
            let h = self.h(start);

            if l == 0 && h == 0 {
                break; // dead stream
            }

            let lv = self.tables.l.valid(l);
            let hv = self.tables.h.valid(h);

            if lv != 0 {
                e -= l as i32;
            } else {
                self.tables.learn(Polarity::Low, l, Direction::Right);
                e += l.max(self.tables.l.symbol(0)) as i32;
            }

            if hv != 0 {
                e -= h as i32;
            } else {
                self.tables.learn(Polarity::High, h, Direction::Right);
                e += h.max(self.tables.h.symbol(0)) as i32;
            }

            if e < 0 {
                e = 0;
            }

            // reached EOT
            if e >= EOT_ERROR {
                if verbose {
                    println!(
                        "DECODER probe   {start:05}►| {l:3}({lv:2}) L      {h:3}({hv:2}) H   {e:3} E"
                    );
                }
                break;
            }

            if verbose {
                println!(
                    "DECODER probe   {start:05}►  {l:3}({lv:2}) L      {h:3}({hv:2}) H   {e:3} E"
                );
            }

            start = start.wrapping_add(1);
        }
        start
    }

    /// Expand left from `start`; the signal comes out of the noise on
    /// this side, so the error budget derives from the symbols already
    /// collected to the right.
    fn probe_left(&mut self, mut start: u16) -> u16 {
        let verbose = self.cfg.verbose;
        let lmin = self.tables.l.smallest();
        let hmin = self.tables.h.smallest();
        let lmax = self.tables.l.biggest();
        let hmax = self.tables.h.biggest();
        let ex = 5 * (lmin as i32 + hmin as i32);

        if verbose {
            println!(
                "DECODER probe  ◄        {{{lmin:2},{lmax:2}}} L      {{{hmin:2},{hmax:2}}} H   {ex:3} Ex"
            );
        }

        let mut e: i32 = 0;
        let stop = self.ring.head();
        while start != stop {
            let l = self.l(start);
            let h = self.h(start);

            if l == 0 && h == 0 {
                break; // dead stream
            }

            // biggest on the left might be a sync, but bigger is not allowed
            if l > lmax.saturating_add(hmax) || h > lmax.saturating_add(hmax) {
                if verbose {
                    println!("DECODER probe |◄{start:05}   {l:3} L      {h:3} H   {e:3} E");
                }
                break;
            }

            let lv = self.tables.l.valid(l);
            let hv = self.tables.h.valid(h);

            if lv != 0 {
                e -= l as i32;
            } else {
                self.tables.learn(Polarity::Low, l, Direction::Left);
                e += l.max(lmin) as i32;
            }

            if hv != 0 {
                e -= h as i32;
            } else {
                self.tables.learn(Polarity::High, h, Direction::Left);
                e += h.max(hmin) as i32;
            }

            if e < 0 {
                e = 0;
            }

            // tolerate sampling errors, but too much -> jump out
            if e > ex {
                if verbose {
                    println!("DECODER probe |◄{start:05}   {l:3}({lv:2}) L      {h:3}({hv:2}) H   {e:3} E");
                }
                break;
            }

            if verbose {
                println!("DECODER probe  ◄{start:05}   {l:3}({lv:2}) L      {h:3}({hv:2}) H   {e:3} E");
            }

            start = start.wrapping_sub(1);
        }
        start
    }

    // -----------------------------------------------------------------
    // Step 5 - melt
    // -----------------------------------------------------------------

    /// Fold sub-symbol spikes (shorter than the two dominant low
    /// symbols) plus their high companion into the next low slot.
    fn melt(&mut self, mut start: u16, stop: u16) {
        let s0 = self.tables.l.symbol(0);
        let s1 = self.tables.l.symbol(1);
        let dmin = s0.min(s1);

        while start != stop {
            let d = self.l(start).saturating_add(self.h(start));
            if d < dmin {
                let next = start.wrapping_add(1) as usize;
                self.lstream[next] = self.lstream[next].saturating_add(d);
                self.lstream[start as usize] = 0;
                self.hstream[start as usize] = 0;
            }
            start = start.wrapping_add(1);
        }
    }

    /// Move the stream right over the gaps melting left behind.
    fn melt_condense(&mut self, start: u16, mut stop: u16) {
        while stop != start {
            let mut available = distance(start, stop);
            while available > 0 && self.l(stop) == 0 && self.h(stop) == 0 {
                available -= 1;
                let mut p = stop;
                while p != start {
                    let prev = p.wrapping_sub(1);
                    self.lstream[p as usize] = self.lstream[prev as usize];
                    self.hstream[p as usize] = self.hstream[prev as usize];
                    p = prev;
                }
                self.lstream[start as usize] = 0;
                self.hstream[start as usize] = 0;
            }
            stop = stop.wrapping_sub(1);
        }
    }

    // -----------------------------------------------------------------
    // Step 6 - fine tune
    // -----------------------------------------------------------------

    /// True while the symbols at `pos` still look like signal within
    /// the given distance tolerance.
    fn tune(&mut self, pos: u16, tolerance: u8, direction: Direction) -> bool {
        let l = self.l(pos);
        let h = self.h(pos);
        let lmax = self.tables.l.biggest();
        let hmax = self.tables.h.biggest();

        let mut e = 0i32;

        if l == 0 && h == 0 {
            e = -1; // error or dead stream
        }

        // bigger than biggest is not allowed
        if l > lmax.saturating_add(tolerance) || h > hmax.saturating_add(tolerance) {
            e = u8::MAX as i32;
        }

        // allow more distance to be fault tolerant on a single position
        let ll = self.tables.l.best_match(l, tolerance);
        let hl = self.tables.h.best_match(l, tolerance);
        let lh = self.tables.l.best_match(h, tolerance);
        let hh = self.tables.h.best_match(h, tolerance);

        // l resp. h valid in neither table
        if ll == 0 && hl == 0 {
            e = 1;
        }
        if lh == 0 && hh == 0 {
            e = 2;
        }

        if self.cfg.verbose {
            let arrow = match direction {
                Direction::Left => format!("◄{pos:05}  "),
                Direction::Right => format!(" {pos:05}► "),
            };
            println!(
                "DECODER tune {arrow}{l:3}({ll:2},{hl:2}) L   {h:3}({lh:2},{hh:2}) H   {e:3} E"
            );
        }

        e == 0
    }

    // -----------------------------------------------------------------
    // Step 7 - iron (soft correction)
    // -----------------------------------------------------------------

    /// For rising tolerances up to the minimum symbol distance, replace
    /// every symbol by its closest alphabet match.
    fn iron(&mut self, pol: Polarity, start: u16, stop: u16) {
        let dmin = match pol {
            Polarity::Low => self.tables.l.min_distance(),
            Polarity::High => self.tables.h.min_distance(),
        };

        for tolerance in 0..=dmin {
            let mut fixed = 0;
            let mut p = start;
            while p != stop {
                let s = match pol {
                    Polarity::Low => self.l(p),
                    Polarity::High => self.h(p),
                };
                let m = self.tables.table(pol).best_match(s, tolerance);
                if s != 0 && m != 0 && s != m {
                    if self.cfg.verbose {
                        print!("{s}->{m} ");
                    }
                    match pol {
                        Polarity::Low => self.lstream[p as usize] = m,
                        Polarity::High => self.hstream[p as usize] = m,
                    }
                    fixed += 1;
                }
                p = p.wrapping_add(1);
            }
            if self.cfg.verbose && fixed > 0 {
                println!(
                    " <- DECODER {} ironing d={tolerance}",
                    if pol == Polarity::Low { "L" } else { "H" }
                );
            }
        }
    }

    // -----------------------------------------------------------------
    // Step 8 - hammer (hard correction)
    // -----------------------------------------------------------------

    /// Replace symbols that still fail validation with their best
    /// match, whatever the distance; returns the corrected positions.
    fn hammer(&mut self, start: u16, stop: u16) -> Vec<u16> {
        // leave the left flank alone (unknown whether it belongs to the
        // signal) and the final position (it marks the EOT)
        let mut p = start.wrapping_add(8);
        let stop = stop.wrapping_sub(1);

        let mut corrected = Vec::new();
        while p != stop {
            let l = self.l(p);
            let h = self.h(p);

            if self.tables.l.valid(l) == 0 {
                let m = self.tables.l.best_match(l, u8::MAX);
                if self.cfg.verbose {
                    print!("{} ", Red.paint(format!("L{l}[{p}]")));
                }
                if l != 0 && m != 0 {
                    self.lstream[p as usize] = m;
                }
                corrected.push(p);
            }

            if self.tables.h.valid(h) == 0 {
                let m = self.tables.h.best_match(h, u8::MAX);
                if self.cfg.verbose {
                    print!("{} ", Red.paint(format!("H{h}[{p}]")));
                }
                if h != 0 && m != 0 {
                    self.hstream[p as usize] = m;
                }
                corrected.push(p);
            }

            p = p.wrapping_add(1);
        }

        if self.cfg.verbose && !corrected.is_empty() {
            println!(" <- DECODER hammered symbols");
        }
        corrected
    }

    // -----------------------------------------------------------------
    // Step 9 - sync detection
    // -----------------------------------------------------------------

    fn find_l(&self, mut start: u16, stop: u16, s: u8) -> u16 {
        while start != stop && self.l(start) != s {
            start = start.wrapping_add(1);
        }
        start
    }

    /// Search the low alphabet for a symbol that repeats with at least
    /// three identical spacings of ≥ 8 bits; that symbol delimits the
    /// frames and the spacing is the frame bit length.
    fn find_sync(&self, start: u16, stop: u16) -> Option<(u8, u8)> {
        for i in 0..SYMBOLS {
            let s = self.tables.l.symbol(i);
            if s == 0 {
                break;
            }

            let mut positions = [0u16; SYMBOLS];
            let mut j = 0;
            let mut p = start;
            loop {
                p = self.find_l(p, stop, s);
                positions[j] = p;
                j += 1;
                let done = p == stop;
                p = p.wrapping_add(1);
                if done || j >= SYMBOLS {
                    break;
                }
            }

            // convert positions into code bit lengths
            for x in 1..SYMBOLS {
                if positions[x] != 0 {
                    positions[x - 1] = distance(positions[x - 1], positions[x]).wrapping_sub(2);
                }
            }

            if positions[0] < 8 || positions[1] < 8 || positions[2] < 8 {
                continue;
            }

            if self.cfg.verbose {
                let dists: Vec<String> = positions
                    .iter()
                    .filter(|&&d| d != 0)
                    .map(|d| d.to_string())
                    .collect();
                println!(
                    "DECODER possible L{s} SYNC symbol with distances {}",
                    dists.join(" ")
                );
            }

            // need at least 3 identical distances
            for x in 0..SYMBOLS {
                if positions[x] == 0 {
                    break;
                }
                let identical = ((x + 1)..SYMBOLS)
                    .filter(|&y| positions[y] == positions[x])
                    .count();
                if identical >= 3 && positions[x] <= 64 {
                    return Some((s, positions[x] as u8));
                }
            }
        }
        None
    }

    // -----------------------------------------------------------------
    // Step 10 - bit reconstruction
    // -----------------------------------------------------------------

    /// Read `bits` symbols from the sampling stream starting at `pos`:
    /// longer than the smaller of the two dominant symbols ⇒ 1.
    fn decode_bits(&self, mut pos: u16, bits: u8) -> u64 {
        let (s0, s1) = if self.cfg.sample_on.on_low() {
            (self.tables.l.symbol(0), self.tables.l.symbol(1))
        } else {
            (self.tables.h.symbol(0), self.tables.h.symbol(1))
        };
        let threshold = s0.min(s1);

        let mut code = 0u64;
        for _ in 0..bits {
            code <<= 1;
            let s = self.xsym(pos);
            if s != u8::MAX && s > threshold {
                code |= 1;
            }
            pos = pos.wrapping_add(1);
        }
        code
    }

    /// Protocol tag for a learned frame: a LOW-sampled 36 bit frame is
    /// NEXUS telemetry, everything else stays an analyzer capture.
    fn tag(&self, bits: u8) -> Protocol {
        if bits == 36 && self.cfg.sample_on.on_low() {
            Protocol::Nexus
        } else {
            Protocol::Analyze
        }
    }

    /// Consume the tuned window: extract the frame before the first
    /// sync and the frame after every sync, lift them into the matrix.
    fn eat(&mut self, mut start: u16, stop: u16) {
        if self.cfg.verbose {
            self.dump(start, stop);
        }

        let Some((sync, dist)) = self.find_sync(start, stop) else {
            return;
        };

        if self.cfg.verbose {
            println!("DECODER found SYNC L{sync:2} code length {dist:2} bits");
        }

        let protocol = self.tag(dist);
        let mut count = 0;
        loop {
            start = self.find_l(start, stop, sync);
            if start == stop {
                break;
            }

            // the code before the first sync
            if count == 0 {
                let code = self.decode_bits(start.wrapping_sub(dist as u16), dist);
                if self.cfg.verbose {
                    println!("{}", printbits64(code, SPACEMASK_NEXUS));
                }
                self.matrix.lock().expect("matrix lock").store(protocol, code);
            }
            count += 1;

            // the code after the sync
            let code = self.decode_bits(start.wrapping_add(1), dist);
            if self.cfg.verbose {
                println!("{}", printbits64(code, SPACEMASK_NEXUS));
            }
            self.matrix.lock().expect("matrix lock").store(protocol, code);

            start = start.wrapping_add(1);
        }
    }

    // -----------------------------------------------------------------
    // Probe driver
    // -----------------------------------------------------------------

    /// Detailed symbol analysis of a sniffed candidate region; returns
    /// the position where scanning should resume.
    fn probe(&mut self, p1: u16, p2: u16) -> u16 {
        let dist = distance(p1, p2);
        if !(WINDOW_MIN..=WINDOW_MAX).contains(&dist) {
            return p1;
        }

        if self.cfg.verbose {
            println!("DECODER probing [{p1:05}:{p2:05}] {dist} samples");
        }

        // clear tables before learning new symbols
        self.tables.clear();

        // expand right first - more reliable; the signal comes out of
        // the noise on the left side
        let mut estop = self.probe_right(p1.wrapping_add(4));
        let mut estart = self.probe_left(p1.wrapping_add(4));

        let dist = distance(estart, estop);
        if !(WINDOW_MIN..=WINDOW_MAX).contains(&dist) {
            return p2;
        }

        if self.cfg.verbose {
            println!("DECODER probe window  [{estart:05}:{estop:05}] {dist} samples");
            println!(
                "DECODER symbol tables L({}) = {}   H({}) = {}",
                self.tables.l.size(),
                self.tables.l.dump(),
                self.tables.h.size(),
                self.tables.h.dump()
            );
        }

        // filter, sort and align symbol tables
        let (lmerged, hmerged) = self.tables.filter();
        if self.cfg.verbose {
            for (survivor, gone) in lmerged.iter().chain(hmerged.iter()) {
                print!("{survivor}<-{gone} ");
            }
            println!(
                " <- DECODER after align  L({}) = {}   H({}) = {}",
                self.tables.l.size(),
                self.tables.l.dump(),
                self.tables.h.size(),
                self.tables.h.dump()
            );
        }

        // melt small L+H spikes into the next L
        self.melt(estart, estop);
        self.melt_condense(estart, estop);
        while self.l(estart) == 0 && self.h(estart) == 0 && estart != estop {
            estart = estart.wrapping_add(1);
        }

        let dist = distance(estart, estop);
        if !(WINDOW_MIN..=WINDOW_MAX).contains(&dist) {
            return p2;
        }

        // fine tune the right, then the left edge of the window
        estop = estop.wrapping_sub(8);
        while self.tune(estop, TUNE_TOLERANCE, Direction::Right) {
            estop = estop.wrapping_add(1);
        }
        estop = estop.wrapping_sub(1);

        estart = estart.wrapping_add(16);
        while self.tune(estart, TUNE_TOLERANCE, Direction::Left) {
            estart = estart.wrapping_sub(1);
        }
        estart = estart.wrapping_add(1);

        let dist = distance(estart, estop);
        if !(WINDOW_MIN..=WINDOW_MAX).contains(&dist) {
            return p2;
        }

        // EOT: the receiver adjusts its sensitivity back to the noise
        // level; estimate signal strength from the gap after the window
        if self.cfg.verbose {
            let after = estop.wrapping_add(1);
            let lsn = self.ring.low(after) as u32;
            let hsn = self.ring.high(after) as u32;
            let strength = (lsn + hsn) * 100 / (u16::MAX as u32 * 2);
            println!(
                "DECODER tuned  [{estart:05}:{estop:05}] {dist} samples, signal {strength}% estimated from L+1 {}({lsn:05}) H+1 {}({hsn:05}) after EOT",
                self.l(after),
                self.h(after)
            );
        }

        // symbol soft error correction
        self.iron(Polarity::Low, estart, estop);
        self.iron(Polarity::High, estart, estop);

        // symbol hard error correction
        self.hammer(estart, estop);

        // consume this stream window
        self.eat(estart, estop);

        // avoid re-catching this code
        self.clear_streams(estart, estop);

        estop
    }

    /// One decoding pass over everything sampled since the last one.
    pub fn pass(&mut self) {
        let stop = self.ring.head();
        let mut start = self.start;

        if start == stop {
            return; // nothing received
        }

        debug!(
            "DECODER analyzing [{start:05}:{stop:05}] {} samples",
            distance(start, stop)
        );

        // shrink samples to max 256 symbols
        self.scale(start, stop);

        // pattern sniffer loop: jump 4-block-wise to a match, expand to
        // the end of the matching region, then probe in detail
        let mut ok = distance(start, stop) > 8;
        while ok {
            while ok && self.sniff(start) == 0 {
                start = start.wrapping_add(4);
                ok = distance(start, stop) > 8;
            }
            if !ok {
                break;
            }
            let p1 = start;

            while ok && self.sniff(start) != 0 {
                start = start.wrapping_add(4);
                ok = distance(start, stop) > 8;
            }
            if !ok {
                break;
            }
            let p2 = start;

            start = self.probe(p1, p2);
            start = start.wrapping_add(4);
            ok = distance(start, stop) > 8;
        }

        // resume just short of the head next pass; a burst still in
        // flight at the window edge is picked up whole
        self.start = start;
    }

    // -----------------------------------------------------------------
    // Receiving heuristic
    // -----------------------------------------------------------------

    /// True while reception looks to be in progress: at least 12 of the
    /// 16 pulse lengths in the last 8 sample pairs sit within the
    /// 200–5000 µs signal band.
    pub fn receiving(&mut self) -> bool {
        let mut ptr = self.ring.head().wrapping_sub(10);

        let mut valid = 0;
        for _ in 0..8 {
            let l = self.ring.low(ptr);
            let h = self.ring.high(ptr);
            if (200..5000).contains(&l) {
                valid += 1;
            }
            if (200..5000).contains(&h) {
                valid += 1;
            }
            ptr = ptr.wrapping_add(1);
        }

        if valid < 12 {
            if self.cfg.verbose && self.receiving_ticks > 0 {
                println!();
            }
            self.receiving_ticks = 0;
            return false;
        }

        if self.cfg.verbose {
            if self.receiving_ticks == 0 {
                print!("DECODER receiving .");
            } else {
                print!(".");
            }
        }
        self.receiving_ticks += 1;
        true
    }

    // -----------------------------------------------------------------
    // Verbose dumps
    // -----------------------------------------------------------------

    /// Print both streams of the window, active span in green.
    fn dump(&self, start: u16, stop: u16) {
        println!(
            "DECODER dump [{start:05}:{stop:05}] {} samples",
            distance(start, stop)
        );
        self.dump_stream(Polarity::High, start, stop);
        self.dump_stream(Polarity::Low, start, stop);
    }

    fn dump_stream(&self, pol: Polarity, start: u16, stop: u16) {
        const OVERHEAD: u16 = 16;
        const PLACES: u16 = 24;

        let xstart = start.wrapping_sub(OVERHEAD);
        let xstop = stop.wrapping_add(OVERHEAD).wrapping_add(1);
        let tagged = |p: u16| {
            let s = match pol {
                Polarity::Low => self.l(p),
                Polarity::High => self.h(p),
            };
            let text = format!("{s:3}");
            if distance(start, p) <= distance(start, stop) {
                Green.paint(text).to_string()
            } else {
                text
            }
        };

        print!("{} ", if pol == Polarity::Low { 'L' } else { 'H' });
        if distance(xstart, xstop) > 2 * PLACES {
            // window too wide - skip the middle
            let skip1 = xstart.wrapping_add(PLACES);
            let skip2 = xstop.wrapping_sub(PLACES);
            let mut p = xstart;
            while p != skip1 {
                print!("{}", tagged(p));
                p = p.wrapping_add(1);
            }
            print!("  ...");
            let mut p = skip2;
            while p != xstop {
                print!("{}", tagged(p));
                p = p.wrapping_add(1);
            }
        } else {
            let mut p = xstart;
            while p != xstop {
                print!("{}", tagged(p));
                p = p.wrapping_add(1);
            }
        }
        println!();
    }
}
