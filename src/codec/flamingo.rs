//! ELRO Flamingo message coding.
//!
//! Tested against FA500R/FA500S remotes and switch units; SF-500R/P
//! are partially understood (layout known, cipher unknown).
//!
//! FA500R 28 bit message pattern:
//!
//! ```text
//! 0000 0000000000000000 0000 XXXX  channel
//! 0000 0000000000000000 00XX 0000  command (0=OFF, 2=ON)
//! 0000 0000000000000000 XX00 0000  rolling code index
//! 0000 XXXXXXXXXXXXXXXX 0000 0000  transmitter id
//! XXXX 0000000000000000 0000 0000  payload
//! ```
//!
//! The 32 bit variant widens command to 4 bits and payload to 8 bits
//! and drops the rolling index; on the wire each bit travels as a
//! two-symbol group (`01` = 0, `10` = 1) over 64 transmitted symbols.
//!
//! SF-500R 32 bit message pattern (guessed - transmitter id moved left):
//!
//! ```text
//! 0000000000000000 00000000 0000 XXXX  channel
//! 0000000000000000 00000000 XXXX 0000  command
//! 0000000000000000 XXXXXXXX 0000 0000  payload
//! XXXXXXXXXXXXXXXX 00000000 0000 0000  transmitter id
//! ```

// ---------------------------------------------------------------------------
// Pulse timings, microseconds. T1 carries the 28 bit (rc1) and 24 bit
// (rc4) patterns; T2 the 32 bit rc2 pattern; T3 the rc3 multibit
// pattern whose encoding is still unknown.
// ---------------------------------------------------------------------------

/// Base pulse of the rc1/rc4 patterns. 330 µs is closest to the
/// original remote (tested range 180–350).
pub const T1: u32 = 330;
pub const T1X2: u32 = T1 * 2;
pub const T1X3: u32 = T1 * 3;
/// rc1 sync LOW.
pub const T1X15: u32 = T1 * 15;
/// rc4 sync LOW.
pub const T1X31: u32 = T1 * 31;
pub const T1_SYNC_MIN: u32 = T1X15 - 80;
pub const T1_SYNC_MAX: u32 = T1X15 + 80;
pub const T4_SYNC_MIN: u32 = T1X31 - 100;
pub const T4_SYNC_MAX: u32 = T1X31 + 100;

/// rc2 carrier pulse.
pub const T2H: u32 = 200;
/// rc2 short LOW.
pub const T2L: u32 = 330;
/// rc2 long LOW: delay to the next clock for a low data bit.
pub const T2X: u32 = (T2H + T2L) * 2 + T2L;
/// Decides 0 / 1 on receive.
pub const T2Y: u32 = T2X / 2;
/// rc2 sync LOW (FA500R).
pub const T2S: u32 = T2X * 2;
/// rc2 receive sync window; wide enough for the SF-500R sync (2640 µs).
pub const T2_SYNC_MIN: u32 = 2_600;
pub const T2_SYNC_MAX: u32 = 2_800;

/// rc3 multibit pattern.
pub const T3H: u32 = 220;
pub const T3L: u32 = 330;
/// Delay to the next clock pulse.
pub const T3X: u32 = T3H + T3L + T3L;
/// Decides clock pulse vs data pulse.
pub const T3Y: u32 = T3H + T3L;
/// Measured, not derivable from the bit timings.
pub const T3S: u32 = 9_250;

/// Quiet pause after a 28 bit burst.
pub const REPEAT_PAUSE_SHORT_US: u32 = 5_555;
/// Quiet pause after 24/32 bit bursts.
pub const REPEAT_PAUSE_LONG_US: u32 = 9_999;

/// Known rc3 "on" pattern: data-pulse counts per clock.
pub const RC3_PATTERN_ON: &str = "00300030001011200111104002100210";

/// Fixed rc4 frame sent with FA500 bursts until its payload semantics
/// are confirmed.
pub const RC4_CODE: u32 = 0x0014_4114;

// ---------------------------------------------------------------------------
// Cipher
// ---------------------------------------------------------------------------

/// Encryption S-box.
const CKEY: [u8; 16] = [9, 6, 3, 8, 10, 0, 2, 12, 4, 14, 7, 5, 1, 15, 11, 13];

/// Decryption S-box (inverse of CKEY - exchanged index and value).
const DKEY: [u8; 16] = [5, 12, 6, 2, 8, 11, 1, 10, 3, 0, 4, 14, 7, 15, 9, 13];

/// Encrypt a 28 bit plaintext message into the on-air code.
///
/// Two rounds of nibble-chained substitution over nibbles 0..=5 (each
/// nibble XORed with its encrypted predecessor before the S-box), the
/// top nibble only XORed with 9, then the whole word rotated right by
/// two within its low 28 bits.
pub fn encrypt(message: u32) -> u32 {
    let mut n = [0u8; 7];
    for (i, nibble) in n.iter_mut().enumerate() {
        *nibble = (message >> (4 * i) & 0x0f) as u8;
    }

    for r in 0..=1u8 {
        n[0] = CKEY[(n[0].wrapping_sub(r).wrapping_add(1) & 0x0f) as usize];
        for i in 1..=5 {
            let idx = (n[i] ^ n[i - 1]).wrapping_sub(r).wrapping_add(1) & 0x0f;
            n[i] = CKEY[idx as usize]; // chained with predecessor & key
        }
    }
    n[6] ^= 9; // no substitution on the payload nibble

    let code = (n[6] as u32) << 24
        | (n[5] as u32) << 20
        | (n[4] as u32) << 16
        | (n[3] as u32) << 12
        | (n[2] as u32) << 8
        | (n[1] as u32) << 4
        | n[0] as u32;

    // rotate right by 2 within 28 bits: low 2 bits of n[0] become bits 27/26
    (code >> 2) | ((code & 3) << 26)
}

/// Decrypt an on-air code back into the 28 bit plaintext message.
pub fn decrypt(code: u32) -> u32 {
    // undo the rotation: shift left by 2, bits 27/26 back to bits 1/0
    let code = ((code << 2) & 0x0fff_ffff) | ((code & 0x0c00_0000) >> 26);

    let mut n = [0u8; 7];
    for (i, nibble) in n.iter_mut().enumerate() {
        *nibble = (code >> (4 * i) & 0x0f) as u8;
    }

    n[6] ^= 9;
    for r in 0..=1u8 {
        for i in (1..=5).rev() {
            n[i] = (DKEY[n[i] as usize].wrapping_sub(r) & 0x0f) ^ n[i - 1];
        }
        n[0] = DKEY[n[0] as usize].wrapping_sub(r) & 0x0f;
    }

    let mut message = 0u32;
    for i in (0..7).rev() {
        message |= n[i] as u32;
        if i > 0 {
            message <<= 4;
        }
    }
    message
}

// ---------------------------------------------------------------------------
// Frame layouts
// ---------------------------------------------------------------------------

/// Decoded FA500 28 bit plaintext.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Fa500 {
    pub xmitter: u16,
    pub channel: u8,
    /// 2 bit command: 0 = OFF, 2 = ON.
    pub command: u8,
    pub payload: u8,
    /// Rolling code index 0..=3.
    pub rolling: u8,
}

impl Fa500 {
    /// Pack the fields into the 28 bit plaintext message.
    pub fn encode(&self) -> u32 {
        ((self.payload as u32 & 0x0f) << 24)
            | ((self.xmitter as u32) << 8)
            | (((self.rolling as u32) << 6) & 0xc0)
            | ((self.command as u32 & 0x03) << 4)
            | (self.channel as u32 & 0x0f)
    }

    /// Extract the fields from a 28 bit plaintext message.
    pub fn decode(message: u32) -> Self {
        Self {
            payload: (message >> 24 & 0x0f) as u8,
            xmitter: (message >> 8 & 0xffff) as u16,
            rolling: (message >> 6 & 0x03) as u8,
            command: (message >> 4 & 0x03) as u8,
            channel: (message & 0x0f) as u8,
        }
    }
}

/// Decoded FA500 32 bit plaintext (rc2 pattern).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Fa500x32 {
    pub xmitter: u16,
    pub channel: u8,
    /// 4 bit command: 0 = OFF, 1 = ON.
    pub command: u8,
    pub payload: u8,
}

impl Fa500x32 {
    pub fn encode(&self) -> u32 {
        ((self.payload as u32) << 24)
            | ((self.xmitter as u32) << 8)
            | ((self.command as u32 & 0x0f) << 4)
            | (self.channel as u32 & 0x0f)
    }

    pub fn decode(message: u32) -> Self {
        Self {
            payload: (message >> 24 & 0xff) as u8,
            xmitter: (message >> 8 & 0xffff) as u16,
            command: (message >> 4 & 0x0f) as u8,
            channel: (message & 0x0f) as u8,
        }
    }
}

/// SF-500R 32 bit layout. The cipher (if any) is unknown; only the
/// field positions are, so this stays a plain layout codec.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Sf500 {
    pub xmitter: u16,
    pub channel: u8,
    pub command: u8,
    pub payload: u8,
}

impl Sf500 {
    pub fn decode(message: u32) -> Self {
        Self {
            xmitter: (message >> 16 & 0xffff) as u16,
            payload: (message >> 8 & 0xff) as u8,
            command: (message >> 4 & 0x0f) as u8,
            channel: (message & 0x0f) as u8,
        }
    }
}

// ---------------------------------------------------------------------------
// 01/10 pair coding (rc2 wire format)
// ---------------------------------------------------------------------------

/// Decode a captured 64 symbol word into 32 bits, MSB first:
/// `01` = 0, `10` = 1, anything else rejects the frame.
pub fn decode_0110(mut word: u64) -> Option<u32> {
    let mut out = 0u32;
    for _ in 0..32 {
        out <<= 1;
        match (word >> 62) & 0b11 {
            0b01 => {}
            0b10 => out |= 1,
            _ => return None,
        }
        word <<= 2;
    }
    Some(out)
}

/// Expand 32 bits into the 64 symbol wire word, MSB first.
pub fn encode_0110(message: u32) -> u64 {
    let mut out = 0u64;
    for i in (0..32).rev() {
        out <<= 2;
        out |= if message >> i & 1 != 0 { 0b10 } else { 0b01 };
    }
    out
}
