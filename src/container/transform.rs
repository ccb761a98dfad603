/*!

The container-level transforms spec.md §4.2 names alongside `Initialize`/
`AddTrack`: `PromoteToType1`, `TrimStart`, `SplitByInstrumentChanges`, and
`ApplyHack`. Grounded in `examples/original_source/MIDIContainer.cpp`'s
`ConvertTrackTypeToOne`, `TrimStartOfTrack`/silence trimming, and the
ad hoc per-hack branches in `MIDIProcessor.cpp`'s `PostprocessMIDI`.

!*/

use super::{Container, Format};
use crate::event::{Event, EventKind};

/// Splits a format-0 single track into one conductor track (meta/tempo
/// events, channel-less) plus one track per channel that carries voice
/// events, and switches the container to format 1. A no-op if the
/// container is not format 0 or has more than one track already.
pub fn promote_to_type1(container: &mut Container) {
    if container.format() != Format::Zero || container.track_count() != 1 {
        return;
    }

    let source = container.tracks()[0].clone();
    let mut conductor = super::track::Track::new();
    let mut channel_tracks: Vec<Option<super::track::Track>> = vec![None; 16];

    for event in source.events() {
        if event.is_end_of_track() {
            continue;
        }
        match event.kind {
            EventKind::Extended if !event.is_sysex() => conductor.push_raw(event.clone()),
            _ => {
                let slot = channel_tracks[event.channel as usize]
                    .get_or_insert_with(super::track::Track::new);
                slot.push_raw(event.clone());
            }
        }
    }

    let end_tick = source.last_tick();
    conductor.add_event(Event::end_of_track(end_tick));

    let mut rebuilt = Container::new(Format::One, container.time_division());
    rebuilt.add_track(conductor);
    for maybe_track in channel_tracks.into_iter().flatten() {
        let mut track = maybe_track;
        track.add_event(Event::end_of_track(end_tick));
        rebuilt.add_track(track);
    }
    *container = rebuilt;
}

/// Shifts every event in every track earlier by the number of ticks all
/// tracks agree is silent at the start (the minimum first-event tick across
/// tracks that contain at least one voice event), and shifts loop ranges by
/// the same amount. A no-op if no track has a voice event, or the common
/// leading silence is zero.
pub fn trim_start(container: &mut Container) {
    let shift = container
        .tracks()
        .iter()
        .filter_map(|t| t.events().iter().find(|e| is_voice_kind(e.kind)).map(|e| e.tick))
        .min();

    let shift = match shift {
        Some(s) if s > 0 => s,
        _ => return,
    };

    for track in container.tracks_mut().iter_mut() {
        let shifted: Vec<Event> = track
            .events()
            .iter()
            .cloned()
            .map(|mut e| {
                e.tick = e.tick.saturating_sub(shift);
                e
            })
            .collect();
        *track = super::track::Track::new();
        for event in shifted {
            track.push_raw(event);
        }
    }

    for subsong in 0..container.subsong_count() {
        let range = container.loop_range_mut(subsong);
        if let Some(begin) = range.begin_tick() {
            range.set_begin(begin.saturating_sub(shift));
        }
    }
}

fn is_voice_kind(kind: EventKind) -> bool {
    !matches!(kind, EventKind::Extended)
}

/// Splits every track that carries more than one distinct Program Change
/// value on a single channel into one track per (channel, instrument) run,
/// so that downstream consumers that assume "one instrument per track" see
/// a consistent view. Tracks with a single instrument throughout are left
/// untouched.
pub fn split_by_instrument_changes(container: &mut Container) {
    let old_tracks = std::mem::take(container.tracks_mut());
    let mut new_tracks = Vec::new();

    for track in old_tracks {
        let program_changes = track
            .events()
            .iter()
            .filter(|e| e.kind == EventKind::ProgramChange)
            .count();
        if program_changes <= 1 {
            new_tracks.push(track);
            continue;
        }

        let mut current: Option<super::track::Track> = None;
        let mut programs_seen: [Option<u8>; 16] = [None; 16];
        for event in track.events() {
            if event.kind == EventKind::ProgramChange {
                let program = event.data[0];
                if programs_seen[event.channel as usize] != Some(program) {
                    if let Some(finished) = current.take() {
                        new_tracks.push(finished);
                    }
                    programs_seen[event.channel as usize] = Some(program);
                }
            }
            current.get_or_insert_with(super::track::Track::new).push_raw(event.clone());
        }
        if let Some(finished) = current.take() {
            new_tracks.push(finished);
        }
    }

    *container.tracks_mut() = new_tracks;
}

/// Named hack identifiers applied after the main decode pass, each
/// addressing a device-quirk the source works around with a one-off
/// branch rather than a general rule.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Hack {
    /// Hack 0: after a GS Reset SysEx, reassert any MT-32 patch-change
    /// SysEx that preceded it, since some GS modules otherwise leave the
    /// MT-32 voice mapping in its post-reset (GS) state — see the Open
    /// Question on MT-32/GS-Reset dominance recorded in the design notes.
    Mt32DominanceAfterGsReset,
    /// Hack 1: for Wolfteam RCP loop mode, emit an explicit RPG-Maker-style
    /// CC 111 loop-start marker on every track that ends with a 0xF9
    /// "loop point" opcode but never emitted one itself.
    WolfteamLoopMarkerBackfill,
}

const GS_RESET_SYSEX: &[u8] = &[0x41, 0x10, 0x42, 0x12, 0x40, 0x00, 0x7F, 0x00, 0x41, 0xF7];

/// Applies `hack` to every track in the container. Unknown/inapplicable
/// situations are silently no-ops, matching the source's posture that
/// these are best-effort device-compatibility patches, not correctness
/// fixes.
pub fn apply_hack(container: &mut Container, hack: Hack) {
    match hack {
        Hack::Mt32DominanceAfterGsReset => apply_mt32_dominance(container),
        Hack::WolfteamLoopMarkerBackfill => apply_wolfteam_backfill(container),
    }
}

fn apply_mt32_dominance(container: &mut Container) {
    for track in container.tracks_mut().iter_mut() {
        let mt32_patches: Vec<Event> = track
            .events()
            .iter()
            .filter(|e| e.is_sysex() && e.data.get(1) == Some(&0x41) && e.data.get(2) == Some(&0x16))
            .cloned()
            .collect();
        if mt32_patches.is_empty() {
            continue;
        }
        let reset_ticks: Vec<u32> = track
            .events()
            .iter()
            .filter(|e| e.is_sysex() && e.data[1..].starts_with(GS_RESET_SYSEX))
            .map(|e| e.tick)
            .collect();
        for tick in reset_ticks {
            for patch in &mt32_patches {
                let mut reasserted = patch.clone();
                reasserted.tick = tick;
                track.add_event(reasserted);
            }
        }
    }
}

fn apply_wolfteam_backfill(container: &mut Container) {
    for track in container.tracks_mut().iter_mut() {
        let has_explicit_marker = track
            .events()
            .iter()
            .any(|e| e.is_control_change(crate::constants::cc::RCP_LOOP_MARKER).is_some());
        if has_explicit_marker || track.is_empty() {
            continue;
        }
        let first_tick = track.events().first().map(|e| e.tick).unwrap_or(0);
        track.add_event_to_start(Event::voice(
            first_tick,
            EventKind::ControlChange,
            0,
            crate::constants::cc::RCP_LOOP_MARKER,
            0,
        ));
    }
}
