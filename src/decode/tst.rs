/*!

Debug test sequence: gated purely by the `.tst` file extension (the
input bytes are never inspected), this always emits the same fixed
event sequence. Grounded in
`examples/original_source/MIDIProcessorTST.cpp`; only built when the
`debug_tst` feature is enabled.

!*/

use crate::container::{track::Track, Container, Format};
use crate::error::LibResult;
use crate::event::{Event, EventKind};
use crate::options::DecodeOptions;

const XG_SYSTEM_ON: &[u8] = &[0x43, 0x10, 0x4C, 0x00, 0x00, 0x7E, 0x00, 0xF7];
const XG_SET_DRUM_CHANNEL: &[u8] = &[0x43, 0x10, 0x4C, 0x08, 0x0E, 0x01, 0x02, 0xF7];

const TEST_CHANNEL: u8 = 14;
const TEST_NOTE: u8 = 0x3E;
const TEST_VELOCITY: u8 = 0x7F;

pub(crate) fn is_tst(file_name: Option<&str>) -> bool {
    file_name.map(|name| name.to_lowercase().ends_with(".tst")).unwrap_or(false)
}

pub(crate) fn decode(_data: &[u8], _options: &DecodeOptions) -> LibResult<Container> {
    let mut container = Container::new(Format::One, 500);
    let mut track = Track::new();

    track.add_event(Event::sysex(0, XG_SYSTEM_ON));
    track.add_event(Event::sysex(0, XG_SET_DRUM_CHANNEL));
    track.add_event(Event::voice(0, EventKind::ProgramChange, TEST_CHANNEL, 0x2A, 0));

    for &(on, off) in &[(0u32, 50u32), (500, 550), (1000, 1050), (1500, 1550)] {
        track.add_event(Event::voice(on, EventKind::NoteOn, TEST_CHANNEL, TEST_NOTE, TEST_VELOCITY));
        track.add_event(Event::voice(off, EventKind::NoteOff, TEST_CHANNEL, TEST_NOTE, TEST_VELOCITY));
    }

    track.add_event(Event::end_of_track(2000));
    container.add_track(track);

    Ok(container)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_gates_regardless_of_content() {
        assert!(is_tst(Some("song.tst")));
        assert!(is_tst(Some("SONG.TST")));
        assert!(!is_tst(Some("song.mid")));
        assert!(!is_tst(None));
    }

    #[test]
    fn ignores_content_and_emits_fixed_sequence() {
        let container = decode(&[0x00, 0x01, 0x02], &DecodeOptions::default()).unwrap();
        assert_eq!(Format::One, container.format());
        assert_eq!(500, container.time_division());
        assert_eq!(1, container.track_count());

        let events = container.tracks()[0].events();
        assert!(events[0].is_sysex());
        assert!(events[1].is_sysex());
        assert_eq!(EventKind::ProgramChange, events[2].kind);
        assert_eq!(0x2A, events[2].data[0]);

        assert!(events.last().unwrap().is_end_of_track());
        assert_eq!(2000, events.last().unwrap().tick);

        let note_on_count = events.iter().filter(|e| e.kind == EventKind::NoteOn).count();
        let note_off_count = events.iter().filter(|e| e.kind == EventKind::NoteOff).count();
        assert_eq!(4, note_on_count);
        assert_eq!(4, note_off_count);
    }
}
