/*!

The five loop-detection heuristics named in spec.md §4.3, grounded in
`examples/original_source/MIDIProcessor.cpp`'s
`DetectLoops`/`DetectXMILoops`/`DetectMarkerLoops`/`DetectRPGMakerLoops`/
`DetectTouhouLoops`/`DetectLeapFrogLoops`. Each heuristic walks a single
subsong's already-decoded events and writes into its `LoopRange`; none of
them mutate event data.

!*/

use super::{Container, Format};
use crate::event::EventKind;

/// Which heuristic found (or was asked to look for) a loop.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum LoopHeuristic {
    XmiEmidi,
    Marker,
    RpgMaker,
    Touhou,
    LeapFrog,
}

const CC_XMI_LOOP_BEGIN: u8 = 116;
const CC_XMI_LOOP_END: u8 = 117;
const CC_EMIDI_LOOP_BEGIN: u8 = 118;
const CC_EMIDI_LOOP_END: u8 = 119;

const CC_RPG_MAKER_LOOP: u8 = 111;
const CC_EMIDI_CLEAR_LOW: u8 = 110;
const CC_EMIDI_CLEAR_HIGH: u8 = 119;

const CC_LEAPFROG_BEGIN: u8 = 110;
const CC_LEAPFROG_END: u8 = 111;
const CC_LEAPFROG_CLEAR_LOW: u8 = 112;
const CC_LEAPFROG_CLEAR_HIGH: u8 = 119;

const CC_TOUHOU_A: u8 = 2;
const CC_TOUHOU_B: u8 = 4;

/// Runs every heuristic against every subsong in turn, stopping at the
/// first one that finds a loop for that subsong (the detectors are tried
/// in the order the source tries them: XMI/EMIDI, marker, RPG Maker,
/// Touhou, LeapFrog), then finalizes each subsong's `LoopRange` against its
/// end-of-song tick.
pub fn detect_loops(container: &mut Container) {
    for subsong in 0..container.subsong_count() {
        if let Some(found) = detect_xmi_emidi(container, subsong)
            .or_else(|| detect_marker(container, subsong))
            .or_else(|| detect_rpg_maker(container, subsong))
            .or_else(|| {
                if container.format() == Format::Zero {
                    detect_touhou(container, subsong)
                } else {
                    None
                }
            })
            .or_else(|| detect_leapfrog(container, subsong))
        {
            let _ = found;
        }
        let end = container.end_timestamp_ticks(subsong);
        container.loop_range_mut(subsong).finalize(end);
    }
}

fn track_range_for_subsong(container: &Container, subsong: usize) -> std::ops::Range<usize> {
    if container.format() == Format::Two {
        subsong..subsong + 1
    } else {
        0..container.track_count()
    }
}

/// XMI (CC 116/117) and EMIDI (CC 118/119) loop-point controllers: begin on
/// the first `begin` CC seen, end on the matching `end` CC.
fn detect_xmi_emidi(container: &mut Container, subsong: usize) -> Option<LoopHeuristic> {
    let mut begin = None;
    let mut end = None;
    for track_index in track_range_for_subsong(container, subsong) {
        for event in container.tracks()[track_index].events() {
            if let Some(v) = event.is_control_change(CC_XMI_LOOP_BEGIN) {
                let _ = v;
                begin.get_or_insert(event.tick);
            } else if event.is_control_change(CC_XMI_LOOP_END).is_some() {
                end = Some(event.tick);
            } else if event.is_control_change(CC_EMIDI_LOOP_BEGIN).is_some() {
                begin.get_or_insert(event.tick);
            } else if event.is_control_change(CC_EMIDI_LOOP_END).is_some() {
                end = Some(event.tick);
            }
        }
    }
    let begin = begin?;
    let range = container.loop_range_mut(subsong);
    range.set_begin(begin);
    if let Some(end) = end {
        range.set_end(end);
    }
    Some(LoopHeuristic::XmiEmidi)
}

/// Text markers named `loopStart`/`loopEnd` (case-insensitive), the
/// convention popularized by Final Fantasy soundtracks.
fn detect_marker(container: &mut Container, subsong: usize) -> Option<LoopHeuristic> {
    let mut begin = None;
    let mut end = None;
    for track_index in track_range_for_subsong(container, subsong) {
        for event in container.tracks()[track_index].events() {
            if !event.is_marker() {
                continue;
            }
            let text = String::from_utf8_lossy(event.meta_payload().unwrap_or(&[])).to_lowercase();
            if text.contains("loopstart") {
                begin.get_or_insert(event.tick);
            } else if text.contains("loopend") {
                end = Some(event.tick);
            }
        }
    }
    let begin = begin?;
    let range = container.loop_range_mut(subsong);
    range.set_begin(begin);
    if let Some(end) = end {
        range.set_end(end);
    }
    Some(LoopHeuristic::Marker)
}

/// RPG Maker's convention: CC 111 marks the loop start; the loop always
/// ends at end-of-song. An EMIDI controller in 110..=119 before the CC 111
/// clears any loop-start candidate seen so far (the two conventions are
/// mutually exclusive within one track).
fn detect_rpg_maker(container: &mut Container, subsong: usize) -> Option<LoopHeuristic> {
    let mut begin = None;
    for track_index in track_range_for_subsong(container, subsong) {
        for event in container.tracks()[track_index].events() {
            if event.is_control_change(CC_RPG_MAKER_LOOP).is_some() {
                begin.get_or_insert(event.tick);
            } else if let EventKind::ControlChange = event.kind {
                if let Some(&cc) = event.data.first() {
                    if (CC_EMIDI_CLEAR_LOW..=CC_EMIDI_CLEAR_HIGH).contains(&cc) {
                        begin = None;
                    }
                }
            }
        }
    }
    let begin = begin?;
    container.loop_range_mut(subsong).set_begin(begin);
    Some(LoopHeuristic::RpgMaker)
}

/// Touhou's format-0-only convention: CC 2 or CC 4 with value 0 marks the
/// loop start; any later occurrence of either with a nonzero value aborts
/// detection for the whole subsong (the convention does not define an
/// explicit end, so the loop runs to end-of-song).
fn detect_touhou(container: &mut Container, subsong: usize) -> Option<LoopHeuristic> {
    let mut begin = None;
    for track_index in track_range_for_subsong(container, subsong) {
        for event in container.tracks()[track_index].events() {
            let value = event
                .is_control_change(CC_TOUHOU_A)
                .or_else(|| event.is_control_change(CC_TOUHOU_B));
            match value {
                Some(0) => {
                    begin.get_or_insert(event.tick);
                }
                Some(_) => return None,
                None => {}
            }
        }
    }
    let begin = begin?;
    container.loop_range_mut(subsong).set_begin(begin);
    Some(LoopHeuristic::Touhou)
}

/// LeapFrog's convention: CC 110 begins, CC 111 ends, any of CC 112..=119
/// clears a pending begin before it is matched with an end.
fn detect_leapfrog(container: &mut Container, subsong: usize) -> Option<LoopHeuristic> {
    let mut begin = None;
    let mut end = None;
    for track_index in track_range_for_subsong(container, subsong) {
        for event in container.tracks()[track_index].events() {
            if event.is_control_change(CC_LEAPFROG_BEGIN).is_some() {
                begin = Some(event.tick);
            } else if event.is_control_change(CC_LEAPFROG_END).is_some() {
                if begin.is_some() {
                    end = Some(event.tick);
                }
            } else if let EventKind::ControlChange = event.kind {
                if let Some(&cc) = event.data.first() {
                    if (CC_LEAPFROG_CLEAR_LOW..=CC_LEAPFROG_CLEAR_HIGH).contains(&cc) {
                        begin = None;
                    }
                }
            }
        }
    }
    let begin = begin?;
    let range = container.loop_range_mut(subsong);
    range.set_begin(begin);
    if let Some(end) = end {
        range.set_end(end);
    }
    Some(LoopHeuristic::LeapFrog)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::track::Track;
    use crate::event::Event;

    fn cc(tick: u32, channel: u8, num: u8, val: u8) -> Event {
        Event::voice(tick, EventKind::ControlChange, channel, num, val)
    }

    #[test]
    fn xmi_loop_begin_and_end() {
        let mut c = Container::new(Format::One, 96);
        let mut t = Track::new();
        t.add_event(cc(0, 0, CC_XMI_LOOP_BEGIN, 0));
        t.add_event(cc(200, 0, CC_XMI_LOOP_END, 0));
        t.add_event(Event::end_of_track(400));
        c.add_track(t);
        detect_loops(&mut c);
        assert_eq!(Some(0), c.loop_range(0).begin_tick());
        assert_eq!(Some(200), c.loop_range(0).end_tick(400));
    }

    #[test]
    fn rpg_maker_loop_runs_to_end_of_song() {
        let mut c = Container::new(Format::One, 96);
        let mut t = Track::new();
        t.add_event(cc(50, 0, CC_RPG_MAKER_LOOP, 0));
        t.add_event(Event::end_of_track(400));
        c.add_track(t);
        detect_loops(&mut c);
        assert_eq!(Some(50), c.loop_range(0).begin_tick());
        assert_eq!(Some(400), c.loop_range(0).end_tick(400));
    }

    #[test]
    fn touhou_aborts_on_nonzero_value() {
        let mut c = Container::new(Format::Zero, 96);
        let mut t = Track::new();
        t.add_event(cc(0, 0, CC_TOUHOU_A, 0));
        t.add_event(cc(100, 0, CC_TOUHOU_A, 5));
        t.add_event(Event::end_of_track(400));
        c.add_track(t);
        detect_loops(&mut c);
        assert!(!c.loop_range(0).has_loop());
    }

    #[test]
    fn touhou_skipped_for_non_format0() {
        let mut c = Container::new(Format::One, 96);
        let mut t = Track::new();
        t.add_event(cc(0, 0, CC_TOUHOU_A, 0));
        t.add_event(Event::end_of_track(400));
        c.add_track(t);
        detect_loops(&mut c);
        assert!(!c.loop_range(0).has_loop());
    }
}
