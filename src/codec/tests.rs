use std::sync::{Arc, Mutex};

use crate::codec::{decode, flamingo, nexus};
use crate::config::{Config, REMOTES};
use crate::event::{Event, EventKey, Protocol};

// ---------------------------------------------------------------------------
// Cipher
// ---------------------------------------------------------------------------

#[test]
fn decrypt_known_black_remote_code() {
    // 0x0e5afff5 is an OFF frame of the "Black" remote (id 0x295c)
    let message = flamingo::decrypt(0x0e5afff5);
    assert_eq!(message, 0x0295c83);

    let frame = flamingo::Fa500::decode(message);
    assert_eq!(frame.xmitter, 0x295c);
    assert_eq!(frame.channel, 3);
    assert_eq!(frame.command, 0);
    assert_eq!(frame.payload, 0);
    assert_eq!(frame.rolling, 2);
}

#[test]
fn encrypt_then_decrypt_returns_the_message() {
    let frame = flamingo::Fa500 {
        xmitter: REMOTES[0],
        channel: 2,
        command: 1,
        payload: 0x05,
        rolling: 0,
    };
    let message = frame.encode();
    let code = flamingo::encrypt(message);
    assert_ne!(code, message);
    assert_eq!(flamingo::decrypt(code), message);
    assert_eq!(flamingo::Fa500::decode(flamingo::decrypt(code)), frame);
}

#[test]
fn cipher_roundtrip_over_field_ranges() {
    for channel in 1..=15u8 {
        for command in 0..=3u8 {
            for payload in 0..=15u8 {
                for rolling in 0..=3u8 {
                    let frame = flamingo::Fa500 {
                        xmitter: REMOTES[0],
                        channel,
                        command,
                        payload,
                        rolling,
                    };
                    let code = flamingo::encrypt(frame.encode());
                    let back = flamingo::Fa500::decode(flamingo::decrypt(code));
                    assert_eq!(back, frame);
                }
            }
        }
    }
}

#[test]
fn decrypt_then_encrypt_is_identity_on_28bit_codes() {
    // the cipher is a bijection on 28 bits; sample the space with a
    // coprime stride
    let mut code = 0u32;
    while code < 0x0fff_ffff {
        assert_eq!(flamingo::encrypt(flamingo::decrypt(code)), code);
        code = code.wrapping_add(0x0004_d2b3);
    }
}

#[test]
fn brute_force_white1_on_ciphertexts() {
    // captured "White 1" frames all decrypt to transmitter 0x53cc
    let captured = [0x0e6bd68du32, 0x0e7be29d, 0x0e70a7f5, 0x0e763e15];
    for code in captured {
        let frame = flamingo::Fa500::decode(flamingo::decrypt(code));
        assert_eq!(frame.xmitter, 0x53cc, "code 0x{code:08x}");
    }

    // and the brute-force search over payload × low byte finds each one
    let mut found = 0;
    for y in 0..0x10u32 {
        for x in 0..0x100u32 {
            let message = y << 24 | (REMOTES[0] as u32) << 8 | x;
            if captured.contains(&flamingo::encrypt(message)) {
                found += 1;
            }
        }
    }
    assert_eq!(found, captured.len());
}

#[test]
fn decrypt_is_total_on_arbitrary_codes() {
    // dead/beef/affe are not remote frames but must decode without fuss
    for code in [0x0000deadu32, 0x000beef0, 0x0affe000] {
        let message = flamingo::decrypt(code);
        let frame = flamingo::Fa500::decode(message);
        let back = flamingo::encrypt(flamingo::Fa500::encode(&frame));
        assert_eq!(back, code);
    }
}

// ---------------------------------------------------------------------------
// 01/10 pairs
// ---------------------------------------------------------------------------

#[test]
fn pair_coding_roundtrip() {
    for message in [0u32, 1, 0x8000_0000, 0xdead_beef, u32::MAX] {
        let word = flamingo::encode_0110(message);
        assert_eq!(flamingo::decode_0110(word), Some(message));
    }
}

#[test]
fn pair_decoding_rejects_invalid_pairs() {
    // all-zero pairs and all-one pairs are both invalid
    assert_eq!(flamingo::decode_0110(0), None);
    assert_eq!(flamingo::decode_0110(u64::MAX), None);
    // one broken pair in an otherwise valid word: flipping a single
    // bit of a pair turns 01/10 into 00/11
    let word = flamingo::encode_0110(0x1234_5678);
    assert_eq!(flamingo::decode_0110(word ^ 0b01), None);
}

#[test]
fn pair_decoding_msb_first() {
    // a word whose first pair is 10 must set bit 31
    let word = flamingo::encode_0110(0x8000_0000);
    assert_eq!(word >> 62, 0b10);
    assert_eq!(flamingo::decode_0110(word), Some(0x8000_0000));
}

// ---------------------------------------------------------------------------
// Frame layouts
// ---------------------------------------------------------------------------

#[test]
fn fa500x32_layout_roundtrip() {
    let frame = flamingo::Fa500x32 {
        xmitter: 0x835a,
        channel: 1,
        command: 1,
        payload: 0xa5,
    };
    assert_eq!(flamingo::Fa500x32::decode(frame.encode()), frame);
}

#[test]
fn sf500_layout_moves_transmitter_left() {
    let frame = flamingo::Sf500::decode(0x272d_1534);
    assert_eq!(frame.xmitter, 0x272d);
    assert_eq!(frame.payload, 0x15);
    assert_eq!(frame.command, 3);
    assert_eq!(frame.channel, 4);
}

// ---------------------------------------------------------------------------
// NEXUS
// ---------------------------------------------------------------------------

#[test]
fn nexus_decodes_reference_frame() {
    // id 0xE7, battery LOW, channel 0, temp 0x0FC (25.2 °C), humidity 100
    let raw = 0xE700FCF64u64;
    assert!(nexus::valid(raw));

    let frame = nexus::Frame::decode(raw);
    assert_eq!(frame.id, 231);
    assert_eq!(frame.channel, 0);
    assert!(!frame.battery_ok);
    assert_eq!(frame.temp_raw, 0x0fc);
    assert_eq!(frame.humidity, 100);
    assert!((frame.temperature() - 25.2).abs() < 0.01);
}

#[test]
fn nexus_negative_temperature() {
    let frame = nexus::Frame {
        id: 42,
        battery_ok: true,
        channel: 2,
        temp_raw: 0xf38,
        humidity: 65,
    };
    // bit 11 set: -0.1 * (0xfff - 0xf38) = -19.9
    assert!((frame.temperature() + 19.9).abs() < 0.01);

    let decoded = nexus::Frame::decode(frame.encode());
    assert_eq!(decoded, frame);
}

#[test]
fn nexus_rejects_broken_constant_nibble() {
    assert!(!nexus::valid(0xE700FC064));
    assert!(!nexus::valid(0));
}

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

fn capture_config() -> (Config, Arc<Mutex<Vec<Event>>>) {
    let events: Arc<Mutex<Vec<Event>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = events.clone();
    let cfg = Config {
        quiet: true,
        handler: Some(Arc::new(move |e: &Event| sink.lock().unwrap().push(e.clone()))),
        ..Config::default()
    };
    (cfg, events)
}

#[test]
fn dispatch_flamingo28_event_fields() {
    let (cfg, events) = capture_config();
    let frame = flamingo::Fa500 {
        xmitter: REMOTES[1],
        channel: 2,
        command: 2,
        payload: 0,
        rolling: 1,
    };
    let code = flamingo::encrypt(frame.encode());

    decode(&cfg, Protocol::Flamingo28, code as u64, 4);

    let events = events.lock().unwrap();
    assert_eq!(events.len(), 1);
    let e = &events[0];
    assert_eq!(e.protocol, Protocol::Flamingo28);
    assert_eq!(e.device, REMOTES[1] as u32);
    assert_eq!(e.channel, 2);
    assert_eq!(e.repeat, 4);
    assert_eq!(e.key, EventKey::Button);
    assert_eq!(e.value, 2);
    assert_eq!(e.ivalue1, Some((EventKey::Payload, 0)));
    assert_eq!(e.ivalue2, Some((EventKey::Rolling, 1)));
}

#[test]
fn dispatch_drops_unknown_transmitters_when_validating() {
    let (mut cfg, events) = capture_config();
    cfg.validate_transmitter_ids = true;

    let stranger = flamingo::Fa500 {
        xmitter: 0xbeef,
        channel: 1,
        command: 0,
        payload: 0,
        rolling: 0,
    };
    decode(
        &cfg,
        Protocol::Flamingo28,
        flamingo::encrypt(stranger.encode()) as u64,
        1,
    );
    assert!(events.lock().unwrap().is_empty());

    let known = flamingo::Fa500 {
        xmitter: REMOTES[3],
        ..stranger
    };
    decode(
        &cfg,
        Protocol::Flamingo28,
        flamingo::encrypt(known.encode()) as u64,
        1,
    );
    assert_eq!(events.lock().unwrap().len(), 1);
}

#[test]
fn dispatch_suppresses_underrepeated_nexus_frames() {
    let (cfg, events) = capture_config();
    let raw = 0xE700FCF64u64;

    decode(&cfg, Protocol::Nexus, raw, 1);
    decode(&cfg, Protocol::Nexus, raw, 2);
    assert!(events.lock().unwrap().is_empty());

    decode(&cfg, Protocol::Nexus, raw, 3);
    // repeat 0 means coalescing is off: single frames pass
    decode(&cfg, Protocol::Nexus, raw, 0);

    let events = events.lock().unwrap();
    assert_eq!(events.len(), 2);
    let e = &events[0];
    assert_eq!(e.device, 231);
    assert_eq!(e.key, EventKey::Battery);
    assert_eq!(e.value, 0);
    assert_eq!(e.ivalue1, Some((EventKey::Humidity, 100)));
    let (fkey, temp) = e.fvalue1.unwrap();
    assert_eq!(fkey, EventKey::Temperature);
    assert!((temp - 25.2).abs() < 0.01);
}

#[test]
fn dispatch_flamingo32_rejects_broken_pair_words() {
    let (cfg, events) = capture_config();
    decode(&cfg, Protocol::Flamingo32, u64::MAX, 1);
    assert!(events.lock().unwrap().is_empty());

    let frame = flamingo::Fa500x32 {
        xmitter: REMOTES[0],
        channel: 1,
        command: 1,
        payload: 0,
    };
    let word = flamingo::encode_0110(frame.encode());
    decode(&cfg, Protocol::Flamingo32, word, 1);

    let events = events.lock().unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].device, REMOTES[0] as u32);
    assert_eq!(events[0].value, 1);
}

#[test]
fn dispatch_ignores_empty_codes() {
    let (cfg, events) = capture_config();
    decode(&cfg, Protocol::Flamingo28, 0, 1);
    assert!(events.lock().unwrap().is_empty());
}
