#![allow(dead_code)]

use log::LevelFilter;
use std::sync::Once;

static LOGGER: Once = Once::new();

pub fn enable_logging() {
    LOGGER.call_once(|| {
        env_logger::Builder::new().filter(None, LevelFilter::Trace).is_test(true).init();
    });
}

pub fn vlq(mut value: u32) -> Vec<u8> {
    let mut stack = vec![(value & 0x7F) as u8];
    value >>= 7;
    while value > 0 {
        stack.push((value & 0x7F) as u8 | 0x80);
        value >>= 7;
    }
    stack.reverse();
    stack
}

/// Builds a minimal, valid single-track SMF around `track_body` (the bytes
/// following the `MTrk` length word), e.g. delta-time/status/data triples
/// ending in an End-of-Track meta event.
pub fn smf_bytes(format: u16, division: u16, track_body: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(b"MThd");
    out.extend_from_slice(&6u32.to_be_bytes());
    out.extend_from_slice(&format.to_be_bytes());
    out.extend_from_slice(&1u16.to_be_bytes());
    out.extend_from_slice(&division.to_be_bytes());
    out.extend_from_slice(b"MTrk");
    out.extend_from_slice(&(track_body.len() as u32).to_be_bytes());
    out.extend_from_slice(track_body);
    out
}

/// A real on-disk path, for decoders whose recognizer needs a file
/// extension (RCP's CM6/GSD siblings, the `debug_tst` fixed sequence).
pub fn named_temp_file(suffix: &str, contents: &[u8]) -> tempfile::TempPath {
    use std::io::Write;
    let mut file = tempfile::Builder::new().suffix(suffix).tempfile().expect("create temp file");
    file.write_all(contents).expect("write temp file");
    file.into_temp_path()
}

fn v2_cmd(kind: u8, p0: u8, p1: u8, p2: u8) -> [u8; 4] {
    [kind, p0, p1, p2]
}

/// A minimal single-track RCP v2 file wrapping `track_body` (a run of
/// 4-byte v2 commands, including its own `0xFE` track-end command).
pub fn minimal_rcp_v2(track_body: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(b"RCM-PC98V2.0(C)COME ON MUSIC\r\n");
    out.extend_from_slice(&[0u8; 36]); // title
    out.extend_from_slice(&[0u8; 80]); // comment
    out.extend_from_slice(&1u16.to_le_bytes()); // track count
    out.extend_from_slice(&0u16.to_le_bytes()); // rhythm tracks
    out.extend_from_slice(&0u16.to_le_bytes()); // command count
    out.extend_from_slice(&7680u16.to_le_bytes()); // base tempo -> 120bpm
    out.extend_from_slice(&96u16.to_le_bytes()); // ticks per quarter
    out.push(0x44); // beats/measure 4, beat unit 4
    out.push(0); // key
    out.push(0); // play bias
    out.extend_from_slice(&[0u8; 18]); // reserved

    let track_header_and_body_len = 2 + 0x2A + track_body.len();
    out.extend_from_slice(&(track_header_and_body_len as u16).to_le_bytes());
    out.push(1); // track id
    out.push(0); // rhythm mode
    out.push(0x00); // dest channel 0, src channel 0
    out.push(0); // transposition
    out.push(0); // start tick
    out.push(0); // mute
    out.extend_from_slice(&[0u8; 0x24]); // track name
    out.extend_from_slice(track_body);
    out
}

pub fn rcp_note(note: u8, step: u8, duration: u8, velocity: u8) -> [u8; 4] {
    v2_cmd(note, step, duration, velocity)
}

pub fn rcp_loop_begin() -> [u8; 4] {
    v2_cmd(0xF9, 0, 0, 0)
}

pub fn rcp_loop_end_infinite() -> [u8; 4] {
    v2_cmd(0xF8, 0, 0, 0)
}

pub fn rcp_track_end() -> [u8; 4] {
    v2_cmd(0xFE, 0, 0, 0)
}
