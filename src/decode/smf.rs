/*!

The Standard MIDI File decoder. Grounded in
`examples/original_source/MIDIProcessorSMF.cpp`'s `IsSMF`/`ProcessSMF`/
`ProcessSMFTrack`: running status, split SysEx joining via an accumulator,
Meta event parsing, and the channel-16-drum-kit SysEx insertion heuristic.

!*/

use crate::byte_iter::ByteCursor;
use crate::constants::{self, meta, status_channel, status_type};
use crate::container::{track::Track, Container, Format};
use crate::error::LibResult;
use crate::event::{Event, EventKind};
use crate::options::DecodeOptions;
use log::{debug, trace, warn};

/// The GS SysEx the source inserts ahead of the first voice event on
/// channel 16 (0-indexed channel 15) once a track/instrument name
/// containing "drum" has been seen, so that playback devices treat that
/// channel as a second rhythm part.
const SYSEX_USE_FOR_RHYTHM_PART_CH16: &[u8] =
    &[0x41, 0x10, 0x42, 0x12, 0x40, 0x1F, 0x15, 0x02, 0x0A, 0xF7];

/// True if `data` begins with the `MThd` magic and a plausible header.
pub(crate) fn is_smf(data: &[u8]) -> bool {
    data.len() >= 14 && &data[0..4] == b"MThd"
}

pub(crate) fn decode(data: &[u8], options: &DecodeOptions) -> LibResult<Container> {
    let mut cursor = ByteCursor::new(data);
    cursor.expect_tag("MThd").map_err(cursor_err)?;
    let header_length = cursor.read_u32_be().map_err(cursor_err)?;
    cursor.push_limit(header_length as usize);
    let format_word = cursor.read_u16_be().map_err(cursor_err)?;
    let num_tracks = cursor.read_u16_be().map_err(cursor_err)?;
    let division = cursor.read_u16_be().map_err(cursor_err)?;
    cursor.pop_limit();

    let format = Format::from_u16(format_word).ok_or_else(|| crate::error::LibError::Unsupported {
        site: format!("{}:{}", file!(), line!()),
        description: format!("unsupported SMF format word {}", format_word),
    })?;

    debug!("SMF header: format {:?}, {} tracks, division {:#06x}", format, num_tracks, division);

    let mut container = Container::new(format, division);
    for track_index in 0..num_tracks {
        cursor.expect_tag("MTrk").map_err(cursor_err)?;
        let track_length = cursor.read_u32_be().map_err(cursor_err)?;
        cursor.push_limit(track_length as usize);
        let track = decode_track(&mut cursor, options)?;
        cursor.pop_limit();
        trace!("decoded SMF track {} with {} events", track_index, track.len());
        container.add_track(track);
    }

    Ok(container)
}

fn cursor_err(source: crate::byte_iter::ByteError) -> crate::error::LibError {
    crate::error::LibError::Cursor {
        site: format!("{}:{}", file!(), line!()),
        source,
    }
}

struct SysExAccumulator {
    bytes: Vec<u8>,
    tick: u32,
}

pub(super) fn decode_track(cursor: &mut ByteCursor, options: &DecodeOptions) -> LibResult<Track> {
    let mut track = Track::new();
    let mut tick = 0u32;
    let mut running_status: Option<u8> = None;
    let mut sysex_in_progress: Option<SysExAccumulator> = None;
    let mut detected_percussion_text = false;
    let mut inserted_rhythm_sysex = false;
    let mut saw_end_of_track = false;

    while !cursor.is_end() {
        let delta = cursor.read_vlq_u32().map_err(cursor_err)?;
        tick += delta;

        let peeked = cursor.peek_or_die().map_err(cursor_err)?;
        let status = if peeked & 0x80 != 0 {
            cursor.read_or_die().map_err(cursor_err)?
        } else {
            running_status.ok_or_else(|| crate::error::LibError::Malformed {
                site: format!("{}:{}", file!(), line!()),
                description: "running status byte used before any status byte seen".into(),
            })?
        };

        match status {
            constants::STATUS_SYSEX | constants::STATUS_SYSEX_CONTINUE => {
                running_status = None;
                let len = cursor.read_vlq_u32().map_err(cursor_err)? as usize;
                let bytes = cursor.read_n(len).map_err(cursor_err)?;

                if status == constants::STATUS_SYSEX_CONTINUE && sysex_in_progress.is_some() {
                    let mut acc = sysex_in_progress.take().unwrap();
                    acc.bytes.extend_from_slice(bytes);
                    finish_or_continue_sysex(&mut track, &mut sysex_in_progress, acc);
                } else {
                    let acc = SysExAccumulator { bytes: bytes.to_vec(), tick };
                    finish_or_continue_sysex(&mut track, &mut sysex_in_progress, acc);
                }
            }
            constants::STATUS_META => {
                running_status = None;
                let meta_type = cursor.read_or_die().map_err(cursor_err)?;
                let len = cursor.read_vlq_u32().map_err(cursor_err)? as usize;
                let payload = cursor.read_n(len).map_err(cursor_err)?;

                if matches!(meta_type, meta::TRACK_NAME | meta::INSTRUMENT_NAME) {
                    let name = String::from_utf8_lossy(payload).to_lowercase();
                    if name.contains("drum") || name.contains("percussion") {
                        detected_percussion_text = true;
                    }
                }
                if meta_type == meta::END_OF_TRACK {
                    saw_end_of_track = true;
                }

                track.add_event(Event::meta(tick, meta_type, payload));
            }
            0xF1..=0xF6 | 0xF8..=0xFE => {
                running_status = None;
                track.add_event(Event::extended(tick, vec![status]));
            }
            _ => {
                let kind = EventKind::from_status_nibble(status).ok_or_else(|| {
                    crate::error::LibError::Malformed {
                        site: format!("{}:{}", file!(), line!()),
                        description: format!("unrecognized status byte {:#04x}", status),
                    }
                })?;
                running_status = Some(status);
                let channel = status_channel(status);

                if detected_percussion_text
                    && !inserted_rhythm_sysex
                    && channel == 15
                    && matches!(kind, EventKind::NoteOn | EventKind::NoteOff)
                {
                    track.add_event(Event::sysex(tick, SYSEX_USE_FOR_RHYTHM_PART_CH16));
                    inserted_rhythm_sysex = true;
                }

                let d0 = cursor.read_or_die().map_err(cursor_err)?;
                let d1 = if kind.data_len() == 2 {
                    cursor.read_or_die().map_err(cursor_err)?
                } else {
                    0
                };
                track.add_event(Event::voice(tick, kind, channel, d0, d1));
            }
        }
        let _ = status_type(status);
    }

    if !saw_end_of_track {
        if options.smf_require_end_of_track {
            warn!("SMF track missing End-of-Track meta event; synthesizing one");
        }
        track.add_event(Event::end_of_track(tick));
    }

    Ok(track)
}

/// A SysEx event is complete once its accumulated bytes end with 0xF7 (the
/// usual case for a lone 0xF0 event, or the final chunk of a split one).
/// Otherwise it is stashed to be joined with the next 0xF7-status chunk.
fn finish_or_continue_sysex(
    track: &mut Track,
    in_progress: &mut Option<SysExAccumulator>,
    acc: SysExAccumulator,
) {
    if acc.bytes.last() == Some(&constants::STATUS_SYSEX_CONTINUE) {
        track.add_event(Event::sysex(acc.tick, &acc.bytes));
    } else {
        *in_progress = Some(acc);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_vlq(out: &mut Vec<u8>, mut value: u32) {
        let mut stack = vec![(value & 0x7F) as u8];
        value >>= 7;
        while value > 0 {
            stack.push((value & 0x7F) as u8 | 0x80);
            value >>= 7;
        }
        stack.reverse();
        out.extend_from_slice(&stack);
    }

    fn minimal_smf(track_body: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(b"MThd");
        out.extend_from_slice(&6u32.to_be_bytes());
        out.extend_from_slice(&0u16.to_be_bytes());
        out.extend_from_slice(&1u16.to_be_bytes());
        out.extend_from_slice(&96u16.to_be_bytes());
        out.extend_from_slice(b"MTrk");
        out.extend_from_slice(&(track_body.len() as u32).to_be_bytes());
        out.extend_from_slice(track_body);
        out
    }

    #[test]
    fn decodes_single_note_with_running_status() {
        let mut body = Vec::new();
        write_vlq(&mut body, 0);
        body.extend_from_slice(&[0x90, 60, 100]);
        write_vlq(&mut body, 10);
        body.extend_from_slice(&[64, 100]); // running status, implicit 0x90
        write_vlq(&mut body, 10);
        body.extend_from_slice(&[0xFF, 0x2F, 0x00]);

        let bytes = minimal_smf(&body);
        let container = decode(&bytes, &DecodeOptions::default()).unwrap();
        assert_eq!(1, container.track_count());
        assert_eq!(3, container.tracks()[0].len());
    }

    #[test]
    fn joins_split_sysex_across_f0_and_f7() {
        let mut body = Vec::new();
        write_vlq(&mut body, 0);
        body.push(0xF0);
        write_vlq(&mut body, 3);
        body.extend_from_slice(&[0x41, 0x10, 0x42]); // not yet terminated
        write_vlq(&mut body, 0);
        body.push(0xF7);
        write_vlq(&mut body, 2);
        body.extend_from_slice(&[0x00, 0xF7]);
        write_vlq(&mut body, 0);
        body.extend_from_slice(&[0xFF, 0x2F, 0x00]);

        let bytes = minimal_smf(&body);
        let container = decode(&bytes, &DecodeOptions::default()).unwrap();
        let sysex = &container.tracks()[0].events()[0];
        assert!(sysex.is_sysex());
        assert_eq!(6, sysex.data.len()); // status + 5 joined bytes
    }

    #[test]
    fn missing_end_of_track_is_synthesized() {
        let mut body = Vec::new();
        write_vlq(&mut body, 0);
        body.extend_from_slice(&[0x90, 60, 100]);
        let bytes = minimal_smf(&body);
        let container = decode(&bytes, &DecodeOptions::default()).unwrap();
        assert!(container.tracks()[0].events().last().unwrap().is_end_of_track());
    }
}
