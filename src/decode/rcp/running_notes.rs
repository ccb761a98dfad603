/*!

The running-notes ledger: tracks currently-sounding notes so that Note-Off
events can be synthesized at the correct tick when an RCP "gate time"
expires, without the source file ever spelling out an explicit Note-Off.
Grounded directly in `examples/original_source/rcpdump/240511-01/
RunningNotes.cpp`'s `running_notes_t::Add`/`Check`/`Flush`.

!*/

use crate::event::{Event, EventKind};

struct RunningNote {
    channel: u8,
    note: u8,
    remaining: u32,
}

/// Fixed capacity of the running-notes ledger; beyond this a new note is
/// dropped with a warning rather than displacing one already sounding.
const CAPACITY: usize = 32;

#[derive(Default)]
pub(super) struct RunningNotes {
    notes: Vec<RunningNote>,
}

impl RunningNotes {
    pub(super) fn new() -> Self {
        Self::default()
    }

    /// Registers a note that will need an automatic Note-Off after
    /// `duration` ticks. If `channel`+`note` already has a running entry,
    /// its remaining duration is extended instead of starting a second
    /// one — returns `false` in that case so the caller knows not to emit
    /// a second Note-On.
    pub(super) fn add(&mut self, channel: u8, note: u8, duration: u32) -> bool {
        if let Some(existing) = self.notes.iter_mut().find(|n| n.channel == channel && n.note == note) {
            existing.remaining += duration;
            return false;
        }
        if self.notes.len() >= CAPACITY {
            log::warn!("running-notes ledger full; dropping note {} on channel {}", note, channel);
            return false;
        }
        self.notes.push(RunningNote { channel, note, remaining: duration });
        true
    }

    /// Advances every running note by `advance` ticks (ending at `tick`),
    /// emitting a Note-Off at the exact offset each note's duration expires.
    /// Mirrors the source's loop: repeatedly find the minimum remaining
    /// duration, decrement every note by that amount, flush whichever hit
    /// zero, and keep going until the whole `advance` budget is consumed.
    pub(super) fn check(&mut self, tick: u32, advance: u32, out: &mut Vec<Event>) {
        if advance == 0 || self.notes.is_empty() {
            return;
        }
        let start_tick = tick - advance;
        let mut elapsed = 0u32;
        loop {
            let min_remaining = match self.notes.iter().map(|n| n.remaining).min() {
                Some(m) => m,
                None => break,
            };
            let budget_left = advance - elapsed;
            if min_remaining > budget_left {
                for note in &mut self.notes {
                    note.remaining -= budget_left;
                }
                break;
            }
            for note in &mut self.notes {
                note.remaining -= min_remaining;
            }
            elapsed += min_remaining;
            self.flush_expired_at(start_tick + elapsed, out);
            if self.notes.is_empty() {
                break;
            }
        }
    }

    fn flush_expired_at(&mut self, tick: u32, out: &mut Vec<Event>) {
        let mut i = 0;
        while i < self.notes.len() {
            if self.notes[i].remaining == 0 {
                let note = self.notes.remove(i);
                out.push(Event::voice(tick, EventKind::NoteOff, note.channel, note.note, 0));
            } else {
                i += 1;
            }
        }
    }

    /// Emits a Note-Off for every still-running note, for end-of-track
    /// cleanup.
    pub(super) fn flush(&mut self, tick: u32, out: &mut Vec<Event>) {
        for note in self.notes.drain(..) {
            out.push(Event::voice(tick, EventKind::NoteOff, note.channel, note.note, 0));
        }
    }
}
