mod utils;

use midi_seq::{DecodeOptions, EventKind, Format};

/// Scenario 1: a minimal SMF with no voice events at all.
#[test]
fn minimal_smf() {
    let bytes = [
        0x4D, 0x54, 0x68, 0x64, 0x00, 0x00, 0x00, 0x06, 0x00, 0x00, 0x00, 0x01, 0x00, 0x60, 0x4D, 0x54, 0x72, 0x6B,
        0x00, 0x00, 0x00, 0x0B, 0x00, 0xFF, 0x51, 0x03, 0x07, 0xA1, 0x20, 0x00, 0xFF, 0x2F, 0x00,
    ];
    let container = midi_seq::decode(&bytes, Some("song.mid"), &DecodeOptions::default()).unwrap();
    assert_eq!(Format::Zero, container.format());
    assert_eq!(1, container.track_count());
    assert_eq!(96, container.time_division());
    assert_eq!(0, container.end_timestamp_ticks(0));
    assert_eq!(0, container.duration_ms(0));
}

/// Scenario 2: running status collapses the NoteOff-as-NoteOn-velocity-0
/// convention down to a single implied status byte.
#[test]
fn single_note_with_running_status() {
    let body = [0x00u8, 0x90, 0x3C, 0x64, 0x60, 0x3C, 0x00, 0x00, 0xFF, 0x2F, 0x00];
    let bytes = utils::smf_bytes(1, 96, &body);
    let container = midi_seq::decode(&bytes, None, &DecodeOptions::default()).unwrap();

    let events = container.tracks()[0].events();
    assert_eq!(3, events.len());
    assert_eq!(EventKind::NoteOn, events[0].kind);
    assert_eq!(0, events[0].tick);
    assert_eq!(EventKind::NoteOn, events[1].kind);
    assert_eq!(0, events[1].data[1]); // velocity 0 == NoteOff-equivalent
    assert_eq!(96, events[1].tick);
    assert!(events[2].is_end_of_track());
    assert_eq!(96, events[2].tick);
}

/// Scenario 3: an RCP loop unrolls into literal repeated events, with a
/// CC 111 loop-iteration marker bracketing each pass.
#[test]
fn rcp_loop_unrolls_with_loop_markers() {
    let mut body = Vec::new();
    body.extend_from_slice(&utils::rcp_note(60, 0x30, 0x18, 100));
    body.extend_from_slice(&utils::rcp_loop_begin());
    body.extend_from_slice(&utils::rcp_note(62, 0x30, 0x18, 100));
    body.extend_from_slice(&[0xF8, 2, 0, 0]); // loop end, repeat twice total
    body.extend_from_slice(&utils::rcp_track_end());
    let bytes = utils::minimal_rcp_v2(&body);

    let container = midi_seq::decode(&bytes, None, &DecodeOptions::default()).unwrap();

    let events = container.tracks().last().unwrap().events();
    let note_ons: Vec<_> = events.iter().filter(|e| e.kind == EventKind::NoteOn).collect();
    assert_eq!(1, note_ons.iter().filter(|e| e.data[0] == 60).count());
    assert_eq!(2, note_ons.iter().filter(|e| e.data[0] == 62).count());

    let note_offs: Vec<_> = events.iter().filter(|e| e.kind == EventKind::NoteOff).collect();
    assert_eq!(1, note_offs.iter().filter(|e| e.data[0] == 60).count());
    assert_eq!(2, note_offs.iter().filter(|e| e.data[0] == 62).count());

    let markers: Vec<u8> = events
        .iter()
        .filter(|e| e.kind == EventKind::ControlChange && e.data[0] == 111)
        .map(|e| e.data[1])
        .collect();
    assert_eq!(vec![0, 1], markers);
}

/// Scenario 4: identical SysEx payloads on the same port collapse to one
/// dedup table entry.
#[test]
fn sysex_dedup_collapses_identical_payloads() {
    let mut body = Vec::new();
    body.push(0x00);
    body.extend_from_slice(&[0xF0, 0x0A, 0x41, 0x10, 0x42, 0x12, 0x40, 0x00, 0x7F, 0x00, 0x41, 0xF7]);
    body.push(0x00);
    body.extend_from_slice(&[0xF0, 0x0A, 0x41, 0x10, 0x42, 0x12, 0x40, 0x00, 0x7F, 0x00, 0x41, 0xF7]);
    body.push(0x00);
    body.extend_from_slice(&[0xFF, 0x2F, 0x00]);
    let bytes = utils::smf_bytes(0, 96, &body);

    let container = midi_seq::decode(&bytes, None, &DecodeOptions::default()).unwrap();
    let stream = midi_seq::serialize_as_stream(&container, 0);
    let sysex_records = stream.events.iter().filter(|e| e.packed & 0xFF00_0000 == 0xFF00_0000).count();
    assert_eq!(2, sysex_records);
    assert_eq!(1, stream.sysex_table.len());
}

/// Scenario 5: a later nonzero CC 2 value clears an earlier Touhou loop
/// candidate for the whole subsong.
#[test]
fn touhou_loop_cleared_by_later_nonzero_value() {
    let mut body = Vec::new();
    body.push(0x00);
    body.extend_from_slice(&[0xB0, 0x02, 0x00]); // CC 2 = 0 (candidate loop start)
    body.push(0x64);
    body.extend_from_slice(&[0xB0, 0x02, 0x05]); // CC 2 = 5 (aborts detection)
    body.push(0x00);
    body.extend_from_slice(&[0xFF, 0x2F, 0x00]);
    let bytes = utils::smf_bytes(0, 96, &body);

    let container = midi_seq::decode(&bytes, None, &DecodeOptions::default()).unwrap();
    assert!(!container.loop_range(0).has_loop());
}

/// Scenario 6: repeated MIDI Port meta events canonicalize to a stable,
/// first-sight-ordered port table.
#[test]
fn port_canonicalization_is_first_sight_stable() {
    let mut body = Vec::new();
    body.push(0x00);
    body.extend_from_slice(&[0xFF, 0x21, 0x01, 0x05]); // port 5
    body.push(0x00);
    body.extend_from_slice(&[0x90, 0x3C, 0x64]); // note on, stays on port 5
    body.push(0x00);
    body.extend_from_slice(&[0xFF, 0x21, 0x01, 0x03]); // port 3
    body.push(0x00);
    body.extend_from_slice(&[0x90, 0x3E, 0x64]); // note on, port 3
    body.push(0x00);
    body.extend_from_slice(&[0xFF, 0x21, 0x01, 0x05]); // port 5 again
    body.push(0x00);
    body.extend_from_slice(&[0xFF, 0x2F, 0x00]);
    let bytes = utils::smf_bytes(0, 96, &body);

    let container = midi_seq::decode(&bytes, None, &DecodeOptions::default()).unwrap();
    assert_eq!(&[5, 3], container.port_table());

    let stream = midi_seq::serialize_as_stream(&container, 0);
    let note_on_ports: Vec<u8> = stream
        .events
        .iter()
        .filter(|e| (e.packed >> 24) & 0xF0 == 0x90)
        .map(|e| (e.packed & 0xFF) as u8)
        .collect();
    assert_eq!(vec![0, 1], note_on_ports);
}

#[cfg(feature = "debug_tst")]
#[test]
fn tst_extension_dispatches_regardless_of_content() {
    let path = utils::named_temp_file(".tst", &[0xDE, 0xAD, 0xBE, 0xEF]);
    let container = midi_seq::decode(&[0xDE, 0xAD, 0xBE, 0xEF], path.to_str(), &DecodeOptions::default()).unwrap();
    assert_eq!(Format::One, container.format());
}

#[test]
fn unrecognized_buffer_is_an_unsupported_error_not_a_panic() {
    utils::enable_logging();
    let err = midi_seq::decode(&[0x01, 0x02, 0x03, 0x04], None, &DecodeOptions::default()).unwrap_err();
    assert!(!err.is_insufficient_input());
}
