/*!

An ordered list of `(tick, microseconds-per-quarter-note)` pairs, answering
tick→millisecond queries. Grounded in `MIDIContainer.cpp`'s `tempo_map_t`.

!*/

pub(crate) const DEFAULT_TEMPO_USPQ: u32 = 500_000; // 120 BPM

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) struct TempoEntry {
    pub(crate) tick: u32,
    pub(crate) uspq: u32,
}

#[derive(Clone, Debug, Default)]
pub struct TempoMap {
    entries: Vec<TempoEntry>,
}

impl TempoMap {
    pub fn new() -> Self {
        Self { entries: Vec::new() }
    }

    /// Inserts a tempo change, keeping the list sorted by tick. A pair at an
    /// existing tick replaces the prior tempo at that tick.
    pub(crate) fn add(&mut self, tick: u32, uspq: u32) {
        match self.entries.binary_search_by_key(&tick, |e| e.tick) {
            Ok(idx) => self.entries[idx].uspq = uspq,
            Err(idx) => self.entries.insert(idx, TempoEntry { tick, uspq }),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn entries(&self) -> &[TempoEntry] {
        &self.entries
    }

    /// Converts a tick to milliseconds, walking the tempo map and using the
    /// default tempo (500 000 µs/qn) for any span before the first entry.
    pub fn tick_to_ms(&self, tick: u32, ticks_per_quarter: u32) -> u64 {
        if ticks_per_quarter == 0 {
            return 0;
        }
        let mut ms = 0u64;
        let mut last_tick = 0u32;
        let mut uspq = DEFAULT_TEMPO_USPQ;

        for entry in &self.entries {
            if entry.tick >= tick {
                break;
            }
            let span = (entry.tick - last_tick) as u64;
            ms += span * uspq as u64 / (ticks_per_quarter as u64 * 1000);
            last_tick = entry.tick;
            uspq = entry.uspq;
        }

        let span = (tick - last_tick) as u64;
        ms += span * uspq as u64 / (ticks_per_quarter as u64 * 1000);
        ms
    }
}
