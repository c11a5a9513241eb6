//! NEXUS 36 bit weather sensor telemetry.
//!
//! Frame layout, 9 nibbles: `[id0] [id1] [flags] [temp0] [temp1]
//! [temp2] [const] [humi0] [humi1]`
//!
//! ```text
//! bits 35..28  transmitter id (8)
//! bit  27      battery: 1 = OK, 0 = LOW
//! bits 26..24  channel (3)
//! bits 23..12  temperature, signed 12 bit, tenths of °C
//! bits 11..8   constant 0b1111, used for frame verification
//! bits  7..0   humidity (%)
//! ```
//!
//! Field order follows the rtl_433 nexus decoder.

/// True when the constant nibble carries the expected 0b1111.
pub fn valid(raw: u64) -> bool {
    raw & 0x0f00 == 0x0f00
}

/// Decoded NEXUS frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Frame {
    pub id: u8,
    pub battery_ok: bool,
    pub channel: u8,
    /// Raw 12 bit two's-complement temperature in tenths of °C.
    pub temp_raw: u16,
    pub humidity: u8,
}

impl Frame {
    /// Extract all fields from a 36 bit raw code. Total for any input;
    /// callers check [`valid`] first.
    pub fn decode(raw: u64) -> Self {
        let mut code = raw;
        let humidity = (code & 0xff) as u8;
        code >>= 8;
        code >>= 4; // constant nibble
        let temp_raw = (code & 0x0fff) as u16;
        code >>= 12;
        let channel = (code & 0x07) as u8;
        code >>= 3;
        let battery_ok = code & 0x01 != 0;
        code >>= 1;
        let id = (code & 0xff) as u8;

        Self {
            id,
            battery_ok,
            channel,
            temp_raw,
            humidity,
        }
    }

    /// Temperature in °C; bit 11 set means negative (two's complement
    /// via the 0x800 test).
    pub fn temperature(&self) -> f32 {
        if self.temp_raw & 0x0800 != 0 {
            -0.1 * (0x0fff - self.temp_raw) as f32
        } else {
            0.1 * self.temp_raw as f32
        }
    }

    /// Pack the fields back into a 36 bit raw code (test support and
    /// frame synthesis).
    pub fn encode(&self) -> u64 {
        ((self.id as u64) << 28)
            | ((self.battery_ok as u64) << 27)
            | ((self.channel as u64 & 0x07) << 24)
            | ((self.temp_raw as u64 & 0x0fff) << 12)
            | 0x0f00
            | self.humidity as u64
    }
}
