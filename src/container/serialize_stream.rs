/*!

`SerializeAsStream`: flattens one subsong into a single timestamped event
stream, merging all of its tracks by smallest-next-tick and converting
ticks to milliseconds via the subsong's tempo map. Grounded in
`examples/original_source/MIDIContainer.cpp`'s
`midi_container_t::SerializeAsStream`, which produces the same kind of
packed-dword event list for realtime playback rather than file output.

!*/

use super::{sysex_table::SysExTable, Container};
use crate::constants::meta;
use crate::event::EventKind;

/// One flattened event: an absolute millisecond timestamp plus a packed
/// 32-bit message. For voice messages, byte 0 is the status+channel byte,
/// byte 1 and 2 are the data bytes (0 if unused), and byte 3 is the
/// canonical port. Extended (SysEx) messages are packed as `0xFF_00_xxxx`,
/// where the low 24 bits index `sysex_table`.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct StreamEvent {
    pub timestamp_ms: u32,
    pub packed: u32,
}

/// Bits set in a subsong's "clean" flags, indicating which legacy
/// controller conventions appear anywhere in its stream — downstream
/// consumers that don't want XMI/EMIDI loop controllers or explicit bank
/// selects forwarded to the device use this to decide whether to filter.
pub const CLEAN_FLAG_EMIDI: u8 = 1 << 0;
pub const CLEAN_FLAG_INSTRUMENTS: u8 = 1 << 1;
pub const CLEAN_FLAG_BANKS: u8 = 1 << 2;

/// The result of flattening one subsong.
#[derive(Clone, Debug, Default)]
pub struct Stream {
    pub events: Vec<StreamEvent>,
    pub sysex_table: SysExTable,
    pub clean_flags: u8,
    pub loop_start_index: Option<usize>,
    pub loop_end_index: Option<usize>,
}

struct Cursor<'a> {
    events: std::slice::Iter<'a, crate::event::Event>,
    next: Option<&'a crate::event::Event>,
    port: u8,
}

impl<'a> Cursor<'a> {
    fn new(track: &'a super::track::Track) -> Self {
        let mut events = track.events().iter();
        let next = events.next();
        Self { events, next, port: 0 }
    }

    fn advance(&mut self) {
        self.next = self.events.next();
    }
}

/// Merges every track belonging to `subsong` into a single ascending
/// stream, picking at each step the track whose next event has the
/// smallest tick (ties broken by track order), translating ticks to
/// milliseconds as it goes.
pub fn serialize_as_stream(container: &Container, subsong: usize) -> Stream {
    let track_indices: Vec<usize> = if container.format() == super::Format::Two {
        vec![subsong]
    } else {
        (0..container.track_count()).collect()
    };

    let mut cursors: Vec<Cursor> =
        track_indices.iter().map(|&i| Cursor::new(&container.tracks()[i])).collect();

    let tempo_map = container.tempo_map(subsong);
    let ticks_per_quarter = container.time_division() as u32;
    let loop_range = container.loop_range(subsong);
    let end_of_song = container.end_timestamp_ticks(subsong);

    let mut stream = Stream::default();
    let mut loop_start_tick = loop_range.begin_tick();
    let mut loop_end_tick = loop_range.end_tick(end_of_song);

    loop {
        let pick = cursors
            .iter()
            .enumerate()
            .filter_map(|(i, c)| c.next.map(|e| (i, e.tick)))
            .min_by_key(|&(_, tick)| tick);

        let (cursor_index, tick) = match pick {
            Some(v) => v,
            None => break,
        };

        let event = cursors[cursor_index].next.unwrap();

        if event.is_port_assignment() {
            if let Some(&raw) = event.meta_payload().and_then(|p| p.first()) {
                cursors[cursor_index].port = raw;
            }
            cursors[cursor_index].advance();
            continue;
        }

        let canonical_port = container.canonical_port_lookup(cursors[cursor_index].port);
        if let Some(packed) = pack_event(event, canonical_port, &mut stream.sysex_table) {
            let timestamp_ms = tempo_map.tick_to_ms(tick, ticks_per_quarter) as u32;
            update_clean_flags(&mut stream.clean_flags, event);

            if stream.loop_start_index.is_none() {
                if let Some(begin) = loop_start_tick {
                    if tick >= begin {
                        stream.loop_start_index = Some(stream.events.len());
                        loop_start_tick = None;
                    }
                }
            }
            if stream.loop_end_index.is_none() {
                if let Some(end) = loop_end_tick {
                    if tick >= end {
                        stream.loop_end_index = Some(stream.events.len());
                        loop_end_tick = None;
                    }
                }
            }

            stream.events.push(StreamEvent { timestamp_ms, packed });
        }

        cursors[cursor_index].advance();
    }

    stream
}

fn update_clean_flags(flags: &mut u8, event: &crate::event::Event) {
    if let EventKind::ControlChange = event.kind {
        if let Some(&cc) = event.data.first() {
            if (110..=119).contains(&cc) {
                *flags |= CLEAN_FLAG_EMIDI;
            }
            if cc == crate::constants::cc::BANK_SELECT_MSB || cc == crate::constants::cc::BANK_SELECT_LSB {
                *flags |= CLEAN_FLAG_BANKS;
            }
        }
    }
    if event.kind == EventKind::ProgramChange {
        *flags |= CLEAN_FLAG_INSTRUMENTS;
    }
}

/// Packs a single event into the stream's 32-bit wire format, or returns
/// `None` for events with no playback meaning (most Meta events, which
/// only drive the tempo map and are dropped once ticks are converted to
/// milliseconds).
fn pack_event(
    event: &crate::event::Event,
    port: u8,
    sysex_table: &mut SysExTable,
) -> Option<u32> {
    match event.kind {
        EventKind::Extended => {
            if event.is_sysex() {
                let index = sysex_table.add(port, &event.data[1..]) as u32;
                Some(0xFF00_0000 | (index & 0x00FF_FFFF))
            } else if event.meta_type() == Some(meta::END_OF_TRACK)
                || event.meta_type() == Some(meta::SET_TEMPO)
            {
                None
            } else {
                None
            }
        }
        _ => {
            let status = event.status_byte();
            let d0 = *event.data.first().unwrap_or(&0);
            let d1 = *event.data.get(1).unwrap_or(&0);
            Some(u32::from_be_bytes([status, d0, d1, port]))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::{track::Track, Format};
    use crate::event::Event;

    #[test]
    fn merges_two_tracks_by_ascending_tick() {
        let mut c = Container::new(Format::One, 96);
        let mut t0 = Track::new();
        t0.push_raw(Event::voice(0, EventKind::NoteOn, 0, 60, 100));
        t0.push_raw(Event::end_of_track(200));
        let mut t1 = Track::new();
        t1.push_raw(Event::voice(50, EventKind::NoteOn, 1, 62, 100));
        t1.push_raw(Event::end_of_track(200));
        c.add_track(t0);
        c.add_track(t1);
        let stream = serialize_as_stream(&c, 0);
        assert_eq!(2, stream.events.len());
        assert!(stream.events[0].timestamp_ms <= stream.events[1].timestamp_ms);
    }

    #[test]
    fn sysex_packed_as_table_index() {
        let mut c = Container::new(Format::One, 96);
        let mut t = Track::new();
        t.push_raw(Event::sysex(0, &[0x41, 0x10, 0xF7]));
        t.push_raw(Event::end_of_track(10));
        c.add_track(t);
        let stream = serialize_as_stream(&c, 0);
        assert_eq!(1, stream.events.len());
        assert_eq!(0xFF00_0000, stream.events[0].packed & 0xFF00_0000);
        assert_eq!(1, stream.sysex_table.len());
    }

    #[test]
    fn program_change_sets_instruments_clean_flag() {
        let mut c = Container::new(Format::One, 96);
        let mut t = Track::new();
        t.push_raw(Event::voice(0, EventKind::ProgramChange, 0, 5, 0));
        t.push_raw(Event::end_of_track(10));
        c.add_track(t);
        let stream = serialize_as_stream(&c, 0);
        assert_ne!(0, stream.clean_flags & CLEAN_FLAG_INSTRUMENTS);
    }
}
