/*!

The id Software MUS format (Doom and its contemporaries): a single
heavily-channel-remapped track with DMX's own controller-number and
pitch-bend conventions. Grounded in
`examples/original_source/MIDIProcessorMUS.cpp`.

!*/

use crate::byte_iter::ByteCursor;
use crate::constants::meta;
use crate::container::{track::Track, Container, Format};
use crate::error::{LibError, LibResult};
use crate::event::{Event, EventKind};

const MAGIC: &[u8] = b"MUS\x1A";
const DEFAULT_TEMPO: [u8; 3] = [0x09, 0xA3, 0x1A];

/// DMX's fixed controller remap table, indexed by the low nibble of a
/// "system event" or "controller change" command byte.
const MUS_CONTROLLERS: [u8; 15] = [0, 0, 1, 7, 10, 11, 91, 93, 64, 67, 120, 123, 126, 127, 121];

pub(crate) fn is_mus(data: &[u8]) -> bool {
    if data.len() < 0x20 || &data[0..4] != MAGIC {
        return false;
    }
    let length = u16::from_le_bytes([data[4], data[5]]) as usize;
    let offset = u16::from_le_bytes([data[6], data[7]]) as usize;
    let instrument_count = u16::from_le_bytes([data[12], data[13]]) as usize;
    offset >= 16 + instrument_count * 2 && offset < 16 + instrument_count * 4 && offset + length <= data.len()
}

fn remap_channel(raw: u8) -> u8 {
    let channel = raw & 0x0F;
    if channel == 0x0F {
        9
    } else if channel >= 9 {
        channel + 1
    } else {
        channel
    }
}

pub(crate) fn decode(data: &[u8]) -> LibResult<Container> {
    let length = u16::from_le_bytes([data[4], data[5]]) as usize;
    let offset = u16::from_le_bytes([data[6], data[7]]) as usize;

    let mut container = Container::new(Format::Zero, 0x59);

    let mut conductor = Track::new();
    conductor.push_raw(Event::meta(0, meta::SET_TEMPO, &DEFAULT_TEMPO));
    conductor.add_event(Event::end_of_track(0));
    container.add_track(conductor);

    let mut track = Track::new();
    let mut tick: u32 = 0;
    let mut velocity_levels = [0u8; 16];

    let body = &data[offset..offset + length];
    let mut cursor = ByteCursor::new(body);

    'outer: while !cursor.is_end() {
        let status = cursor.read_or_die().map_err(cursor_err)?;

        if status == 0x60 {
            break;
        }

        let channel = remap_channel(status);

        let event = match status & 0x70 {
            0x00 => {
                let note = cursor.read_or_die().map_err(cursor_err)?;
                Some(Event::voice(tick, EventKind::NoteOff, channel, note, 0))
            }
            0x10 => {
                let mut note = cursor.read_or_die().map_err(cursor_err)?;
                let velocity = if note & 0x80 != 0 {
                    let v = cursor.read_or_die().map_err(cursor_err)?;
                    velocity_levels[channel as usize] = v;
                    note &= 0x7F;
                    v
                } else {
                    velocity_levels[channel as usize]
                };
                Some(Event::voice(tick, EventKind::NoteOn, channel, note, velocity))
            }
            0x20 => {
                let raw = cursor.read_or_die().map_err(cursor_err)?;
                let lsb = raw.wrapping_shl(7);
                let msb = raw >> 1;
                Some(Event::voice(tick, EventKind::PitchBendChange, channel, lsb, msb))
            }
            0x30 => {
                let system = cursor.read_or_die().map_err(cursor_err)?;
                if (10..=14).contains(&system) {
                    Some(Event::voice(tick, EventKind::ControlChange, channel, MUS_CONTROLLERS[system as usize], 1))
                } else {
                    break 'outer;
                }
            }
            0x40 => {
                let controller = cursor.read_or_die().map_err(cursor_err)?;
                if controller == 0 {
                    let program = cursor.read_or_die().map_err(cursor_err)?;
                    Some(Event::voice(tick, EventKind::ProgramChange, channel, program, 0))
                } else if controller < 10 {
                    let value = cursor.read_or_die().map_err(cursor_err)?;
                    Some(Event::voice(tick, EventKind::ControlChange, channel, MUS_CONTROLLERS[controller as usize], value))
                } else {
                    break 'outer;
                }
            }
            _ => break 'outer,
        };

        if let Some(event) = event {
            track.add_event(event);
        }

        if status & 0x80 != 0 {
            let delta = cursor.read_vlq_u32().map_err(cursor_err)?;
            tick += delta;
        }
    }

    track.add_event(Event::end_of_track(tick));
    container.add_track(track);

    Ok(container)
}

fn cursor_err(source: crate::byte_iter::ByteError) -> LibError {
    LibError::Cursor { site: format!("{}:{}", file!(), line!()), source }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_mus(body: &[u8]) -> Vec<u8> {
        let mut out = vec![b'M', b'U', b'S', 0x1A];
        let length = body.len() as u16;
        let offset = 18u16; // 16 + instrument_count(1) * 2
        out.extend_from_slice(&length.to_le_bytes());
        out.extend_from_slice(&offset.to_le_bytes());
        out.extend_from_slice(&[0u8; 4]); // primary/secondary channel counts
        out.extend_from_slice(&1u16.to_le_bytes()); // instrument count
        out.extend_from_slice(&[0u8; 2]); // reserved, pads header to 16 bytes
        out.extend_from_slice(&[0u8; 2]); // one instrument patch entry
        out.extend_from_slice(body);
        out
    }

    #[test]
    fn recognizes_mus_magic_and_bounds() {
        let bytes = minimal_mus(&[0x60]);
        assert!(is_mus(&bytes));
    }

    #[test]
    fn channel_fifteen_remaps_to_percussion_nine() {
        let body = [0x1F, 60, 0x60];
        let bytes = minimal_mus(&body);
        let container = decode(&bytes).unwrap();
        let note_on = &container.tracks()[1].events()[0];
        assert_eq!(9, note_on.channel);
    }

    #[test]
    fn delta_time_flag_advances_tick() {
        let body = [0x90, 60, 10, 0x60]; // note-on + delta flag, note 60, delta VLQ 10, finish
        let bytes = minimal_mus(&body);
        let container = decode(&bytes).unwrap();
        let eot = container.tracks()[1].events().last().unwrap();
        assert_eq!(10, eot.tick);
    }
}
