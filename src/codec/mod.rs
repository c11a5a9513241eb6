//! Protocol codecs and event dispatch.
//!
//! - **flamingo**: the FA500 two-round nibble-chained XOR cipher,
//!   28/32-bit frame layouts, `01`/`10` pair coding, SF-500 layout,
//!   and the shared pulse timing constants.
//! - **nexus**: 36-bit weather sensor telemetry.
//!
//! [`decode`] is the dispatcher the matrix drains into: it turns a
//! `(protocol, raw code, repeat)` triple into stdout/JSON output, the
//! optional sysfs-like files, and an [`Event`] for the injected
//! handler.

pub mod flamingo;
pub mod nexus;

#[cfg(test)]
mod tests;

use log::debug;

use crate::config::Config;
use crate::event::{create_sysfslike, Event, EventKey, Protocol};
use crate::fmt::{printbits, printbits64, SPACEMASK_BYTES, SPACEMASK_FA500, SPACEMASK_NEXUS};

/// Decode one raw code and deliver it. Invalid frames are dropped here;
/// every drop is visible with verbose logging enabled.
pub fn decode(cfg: &Config, protocol: Protocol, raw: u64, repeat: u8) {
    if raw == 0 {
        debug!("DECODE received empty message");
        return;
    }

    match protocol {
        Protocol::Nexus => decode_nexus(cfg, raw, repeat),
        Protocol::Flamingo28 => decode_flamingo28(cfg, raw, repeat),
        Protocol::Flamingo24 => decode_flamingo24(cfg, raw, repeat),
        Protocol::Flamingo32 => decode_flamingo32(cfg, raw, repeat),
        Protocol::Analyze => decode_analyzer(cfg, raw, repeat),
    }
}

fn deliver(cfg: &Config, event: Event) {
    if let Some(handler) = &cfg.handler {
        handler(&event);
    }
}

fn decode_nexus(cfg: &Config, raw: u64, repeat: u8) {
    // the sensor sends 10 frames per burst and the first captured one
    // is unreliable (sampler still locking on): require 3 identical
    if (1..3).contains(&repeat) {
        debug!(
            "NEXUS {{{repeat}}} too few repeats, discard message 0x{raw:08x} = {}",
            printbits64(raw, SPACEMASK_NEXUS)
        );
        return;
    }

    if !nexus::valid(raw) {
        debug!(
            "NEXUS message verification failed 0x{raw:08x} = {}",
            printbits64(raw, SPACEMASK_NEXUS)
        );
        return;
    }

    let frame = nexus::Frame::decode(raw);
    let temp = frame.temperature();
    let message = format!(
        "NEXUS {{{repeat}}} 0x{raw:08x} id={}, channel={}, battery={}, temp={temp:.1}C, hum={}%",
        frame.id,
        frame.channel,
        if frame.battery_ok { "OK" } else { "LOW" },
        frame.humidity
    );

    if !cfg.quiet {
        println!("{message}");
    }

    if cfg.json_output {
        let json = serde_json::json!({
            "type": "NEXUS",
            "raw": format!("0x{raw:08x}"),
            "repeat": repeat,
            "id": frame.id,
            "channel": frame.channel,
            "battery": frame.battery_ok as u8,
            "temp": format!("{temp:.1}"),
            "humi": frame.humidity,
        });
        println!("{json}");
    }

    if let Some(root) = &cfg.sysfs_root {
        // e.g. /tmp/NEXUS/231/0/temp
        let fields = [
            ("temp", format!("{temp:.1}")),
            ("humi", frame.humidity.to_string()),
            ("batt", (frame.battery_ok as u8).to_string()),
        ];
        for (name, value) in fields {
            if let Err(err) =
                create_sysfslike(root, Protocol::Nexus, frame.id as u32, frame.channel, name, &value)
            {
                debug!("NEXUS sysfslike {name}: {err}");
            }
        }
    }

    deliver(
        cfg,
        Event {
            protocol: Protocol::Nexus,
            raw,
            device: frame.id as u32,
            channel: frame.channel,
            repeat,
            key: EventKey::Battery,
            value: frame.battery_ok as i32,
            ivalue1: Some((EventKey::Humidity, frame.humidity as i32)),
            ivalue2: None,
            fvalue1: Some((EventKey::Temperature, temp)),
            message,
        },
    );
}

fn decode_flamingo28(cfg: &Config, raw: u64, repeat: u8) {
    let code = raw as u32;
    let message = flamingo::decrypt(code);
    let frame = flamingo::Fa500::decode(message);

    if cfg.verbose {
        println!(
            "F28 {:04x} {:02} {} {} {} <= 0x{message:08x} <= 0x{code:08x}",
            frame.xmitter,
            frame.channel,
            frame.command,
            frame.rolling,
            printbits(message, SPACEMASK_FA500)
        );
    }

    if !cfg.transmitter_known(frame.xmitter) {
        debug!(
            "FLAMINGO28 discard message, unknown transmitter id 0x{:04x}",
            frame.xmitter
        );
        return;
    }

    let text = format!(
        "FLAMINGO28 {{{repeat}}} 0x{message:08x} id={:04x}, chan={:02}, cmd={}, pay=0x{:02x}, roll={}",
        frame.xmitter, frame.channel, frame.command, frame.payload, frame.rolling
    );

    if !cfg.quiet {
        println!("{text}");
    }

    if cfg.json_output {
        let json = serde_json::json!({
            "type": "FLAMINGO28",
            "raw": format!("0x{raw:08x}"),
            "repeat": repeat,
            "id": format!("0x{:04x}", frame.xmitter),
            "channel": frame.channel,
            "command": frame.command,
            "payload": frame.payload,
            "rolling": frame.rolling,
        });
        println!("{json}");
    }

    deliver(
        cfg,
        Event {
            protocol: Protocol::Flamingo28,
            raw,
            device: frame.xmitter as u32,
            channel: frame.channel,
            repeat,
            key: EventKey::Button,
            value: frame.command as i32,
            ivalue1: Some((EventKey::Payload, frame.payload as i32)),
            ivalue2: Some((EventKey::Rolling, frame.rolling as i32)),
            fvalue1: None,
            message: text,
        },
    );
}

fn decode_flamingo24(cfg: &Config, raw: u64, repeat: u8) {
    // payload semantics unknown; expose the raw 24 bit code
    let text = format!(
        "FLAMINGO24 {{{repeat}}} 0x{raw:08x} {}",
        printbits(raw as u32, 0x0101_0101)
    );

    if !cfg.quiet {
        println!("{text}");
    }

    if cfg.json_output {
        let json = serde_json::json!({
            "type": "FLAMINGO24",
            "raw": format!("0x{raw:08x}"),
            "repeat": repeat,
        });
        println!("{json}");
    }

    deliver(
        cfg,
        Event {
            protocol: Protocol::Flamingo24,
            raw,
            device: 0,
            channel: 0,
            repeat,
            key: EventKey::Payload,
            value: raw as i32,
            ivalue1: None,
            ivalue2: None,
            fvalue1: None,
            message: text,
        },
    );
}

fn decode_flamingo32(cfg: &Config, raw: u64, repeat: u8) {
    let Some(message) = flamingo::decode_0110(raw) else {
        debug!(
            "0110 decode error {}",
            printbits64(raw, 0x0001_0001_0001_0001)
        );
        return;
    };
    let frame = flamingo::Fa500x32::decode(message);

    if cfg.verbose {
        println!(
            "F32 {:04x} {:02} {} {} <= 0x{message:08x}",
            frame.xmitter,
            frame.channel,
            frame.command,
            printbits(message, SPACEMASK_FA500)
        );
    }

    if !cfg.transmitter_known(frame.xmitter) {
        debug!(
            "FLAMINGO32 discard message, unknown transmitter id 0x{:04x}",
            frame.xmitter
        );
        return;
    }

    let text = format!(
        "FLAMINGO32 {{{repeat}}} 0x{message:08x} id={:04x}, chan={:02}, cmd={}, pay=0x{:02x}",
        frame.xmitter, frame.channel, frame.command, frame.payload
    );

    if !cfg.quiet {
        println!("{text}");
    }

    if cfg.json_output {
        let json = serde_json::json!({
            "type": "FLAMINGO32",
            "raw": format!("0x{message:08x}"),
            "repeat": repeat,
            "id": format!("0x{:04x}", frame.xmitter),
            "channel": frame.channel,
            "command": frame.command,
            "payload": frame.payload,
        });
        println!("{json}");
    }

    deliver(
        cfg,
        Event {
            protocol: Protocol::Flamingo32,
            raw,
            device: frame.xmitter as u32,
            channel: frame.channel,
            repeat,
            key: EventKey::Button,
            value: frame.command as i32,
            ivalue1: Some((EventKey::Payload, frame.payload as i32)),
            ivalue2: None,
            fvalue1: None,
            message: text,
        },
    );
}

fn decode_analyzer(cfg: &Config, raw: u64, _repeat: u8) {
    if !cfg.quiet {
        println!("ANALYZER 0x{raw:08x} {}", printbits64(raw, SPACEMASK_BYTES));
    }
}
