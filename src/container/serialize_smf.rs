/*!

`SerializeAsSMF`: re-emits the container as Standard MIDI File bytes.
Grounded in `examples/original_source/MIDIContainer.cpp`'s
`midi_container_t::SerializeAsSMF`, which this mirrors chunk-for-chunk
(`MThd`, then one `MTrk` per track, delta-times as VLQs, running status on
voice events, SysEx split at 0xF0/0xF7 exactly as stored).

!*/

use super::Container;
use crate::event::EventKind;
use crate::scribe::Scribe;

const MTHD: &[u8; 4] = b"MThd";
const MTRK: &[u8; 4] = b"MTrk";

/// Serializes `container` as a complete SMF byte stream: one `MThd` chunk
/// followed by one `MTrk` chunk per track, in track order. Never fails —
/// any malformed in-memory state (e.g. a track missing an End-of-Track
/// event) is papered over by appending one, matching the "serialization
/// cannot fail" contract.
pub fn serialize_as_smf(container: &Container) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(MTHD);
    out.extend_from_slice(&6u32.to_be_bytes());
    out.extend_from_slice(&container.format().as_u16().to_be_bytes());
    out.extend_from_slice(&(container.track_count() as u16).to_be_bytes());
    out.extend_from_slice(&container.time_division().to_be_bytes());

    for track in container.tracks() {
        let body = serialize_track(track);
        out.extend_from_slice(MTRK);
        out.extend_from_slice(&(body.len() as u32).to_be_bytes());
        out.extend_from_slice(&body);
    }
    out
}

fn serialize_track(track: &super::track::Track) -> Vec<u8> {
    let mut scribe = Scribe::new();
    let mut last_tick = 0u32;
    let mut wrote_eot = false;

    for event in track.events() {
        let delta = event.tick.saturating_sub(last_tick);
        last_tick = event.tick;
        scribe.write_vlq(delta);

        match event.kind {
            EventKind::Extended => {
                scribe.reset_running_status();
                serialize_extended(&mut scribe, event);
                if event.is_end_of_track() {
                    wrote_eot = true;
                }
            }
            _ => {
                scribe.write_voice_status(event.status_byte());
                scribe.write_bytes(&event.data);
            }
        }
    }

    if !wrote_eot {
        scribe.write_vlq(0);
        scribe.reset_running_status();
        scribe.write_u8(crate::constants::STATUS_META);
        scribe.write_u8(crate::constants::meta::END_OF_TRACK);
        scribe.write_u8(0);
    }

    scribe.into_bytes()
}

fn serialize_extended(scribe: &mut Scribe, event: &crate::event::Event) {
    let status = event.data[0];
    scribe.write_u8(status);
    match status {
        crate::constants::STATUS_META => {
            let meta_type = event.data[1];
            let payload = &event.data[2..];
            scribe.write_u8(meta_type);
            scribe.write_vlq(payload.len() as u32);
            scribe.write_bytes(payload);
        }
        crate::constants::STATUS_SYSEX | crate::constants::STATUS_SYSEX_CONTINUE => {
            let payload = &event.data[1..];
            scribe.write_vlq(payload.len() as u32);
            scribe.write_bytes(payload);
        }
        _ => {
            // Single-byte realtime status (0xF1-0xF6, 0xF8-0xFE): no payload.
        }
    }
}
