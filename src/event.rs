//! Decoded events and their delivery.
//!
//! A decoded frame becomes one [`Event`]: protocol tag, device address,
//! a small set of keyed values, and a preformatted message line. The
//! bus owns a single subscriber slot (injected through
//! [`crate::config::Config::handler`]); delivery is synchronous on the
//! decoder thread, so a handler must not spin the transmitter without
//! yielding first.

use std::path::Path;

use serde::Serialize;

/// Protocol family of a received code; also the matrix store key tag.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum Protocol {
    Nexus,
    Flamingo28,
    Flamingo24,
    Flamingo32,
    /// Unknown signal captured by the analyzer.
    Analyze,
}

impl std::fmt::Display for Protocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Protocol::Nexus => "NEXUS",
            Protocol::Flamingo28 => "FLAMINGO28",
            Protocol::Flamingo24 => "FLAMINGO24",
            Protocol::Flamingo32 => "FLAMINGO32",
            Protocol::Analyze => "ANALYZE",
        })
    }
}

/// Tags for the keyed values an event carries.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum EventKey {
    Payload,
    Button,
    Rolling,
    Temperature,
    Humidity,
    Battery,
}

/// One decoded frame, fully valued. Owned by the event bus for the
/// duration of a single handler invocation.
#[derive(Clone, Debug, Serialize)]
pub struct Event {
    pub protocol: Protocol,
    /// The reconstructed frame bits, zero-padded to 64.
    pub raw: u64,
    /// Transmitter / sensor id.
    pub device: u32,
    pub channel: u8,
    /// Number of identical frames coalesced into this event
    /// (0 when coalescing is disabled).
    pub repeat: u8,

    /// Primary keyed value (e.g. `Button` = command).
    pub key: EventKey,
    pub value: i32,
    /// Up to two secondary integer values.
    pub ivalue1: Option<(EventKey, i32)>,
    pub ivalue2: Option<(EventKey, i32)>,
    /// Optional float value (e.g. `Temperature` in °C).
    pub fvalue1: Option<(EventKey, f32)>,

    /// Human-readable one-liner, same text the stdout output prints.
    pub message: String,
}

/// Ready-made handler: print each event's message line.
pub fn stdout_handler(event: &Event) {
    println!("{}", event.message.trim_end());
}

/// Publish one decoded sensor field as a file:
/// `<root>/<TYPE>/<id>/<channel>/<field>`, e.g. `/tmp/NEXUS/231/0/temp`.
pub fn create_sysfslike(
    root: &str,
    protocol: Protocol,
    device: u32,
    channel: u8,
    field: &str,
    value: &str,
) -> std::io::Result<()> {
    let dir = Path::new(root)
        .join(protocol.to_string())
        .join(device.to_string())
        .join(channel.to_string());
    std::fs::create_dir_all(&dir)?;
    std::fs::write(dir.join(field), value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sysfslike_writes_field_files() {
        let root = std::env::temp_dir().join("rfsniffer-sysfslike-test");
        let _ = std::fs::remove_dir_all(&root);
        let root_str = root.to_str().unwrap();

        create_sysfslike(root_str, Protocol::Nexus, 231, 0, "temp", "25.2").unwrap();
        create_sysfslike(root_str, Protocol::Nexus, 231, 0, "humi", "100").unwrap();

        let temp = std::fs::read_to_string(root.join("NEXUS/231/0/temp")).unwrap();
        assert_eq!(temp, "25.2");
        let humi = std::fs::read_to_string(root.join("NEXUS/231/0/humi")).unwrap();
        assert_eq!(humi, "100");

        let _ = std::fs::remove_dir_all(&root);
    }
}
