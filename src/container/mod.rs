/*!

The in-memory model every decoder in this crate populates and every
serializer reads from. Grounded in `examples/original_source/
MIDIContainer.h`/`.cpp` (`midi_container_t`), generalized from its manual
C++ field layout into the Rust module split below.

!*/

pub mod loop_detect;
pub mod loop_range;
pub mod metadata;
pub mod serialize_smf;
pub mod serialize_stream;
pub mod sysex_table;
pub mod tempo_map;
pub mod track;
pub mod transform;

use crate::event::EventKind;
use loop_range::LoopRange;
use metadata::MetadataTable;
use tempo_map::TempoMap;
use track::Track;

/// SMF format: 0 (single track), 1 (multi-track, one tempo map), or 2
/// (independent subsongs, one tempo map each).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Format {
    Zero,
    One,
    Two,
}

impl Format {
    pub(crate) fn from_u16(value: u16) -> Option<Self> {
        match value {
            0 => Some(Format::Zero),
            1 => Some(Format::One),
            2 => Some(Format::Two),
            _ => None,
        }
    }

    pub(crate) fn as_u16(self) -> u16 {
        match self {
            Format::Zero => 0,
            Format::One => 1,
            Format::Two => 2,
        }
    }

    fn is_per_subsong(self) -> bool {
        self == Format::Two
    }
}

/// Holds everything the spec's data model names: tracks, per-subsong
/// tempo maps / channel masks / end-timestamps / loop ranges, the SysEx
/// dedup table, the port-number canonicalization table, metadata, and the
/// handful of optional side payloads (embedded SoundFont, bank offset,
/// extra percussion channel) the ancillary decoders populate.
#[derive(Clone, Debug)]
pub struct Container {
    format: Format,
    time_division: u16,
    tracks: Vec<Track>,
    channel_masks: Vec<u64>,
    tempo_maps: Vec<TempoMap>,
    end_timestamps: Vec<u32>,
    loop_ranges: Vec<LoopRange>,
    port_table: Vec<u8>,
    metadata: MetadataTable,
    soundfont: Option<Vec<u8>>,
    bank_offset: i32,
    extra_percussion_channel: Option<u8>,
}

impl Container {
    /// Resets channel masks, tempo maps, end-timestamps, and loop ranges to
    /// length 1 for format 0/1 (format 2 grows these per `add_track`).
    /// Never fails.
    pub fn new(format: Format, time_division: u16) -> Self {
        let initial_len = if format.is_per_subsong() { 0 } else { 1 };
        Self {
            format,
            time_division,
            tracks: Vec::new(),
            channel_masks: vec![0u64; initial_len],
            tempo_maps: vec![TempoMap::new(); initial_len],
            end_timestamps: vec![0u32; initial_len],
            loop_ranges: vec![LoopRange::none(); initial_len],
            port_table: Vec::new(),
            metadata: MetadataTable::new(),
            soundfont: None,
            bank_offset: 0,
            extra_percussion_channel: None,
        }
    }

    pub fn format(&self) -> Format {
        self.format
    }

    pub fn time_division(&self) -> u16 {
        self.time_division
    }

    pub fn track_count(&self) -> usize {
        self.tracks.len()
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn tracks_mut(&mut self) -> &mut Vec<Track> {
        &mut self.tracks
    }

    /// For format 0/1 there is exactly one subsong; for format 2, one per
    /// track.
    pub fn subsong_count(&self) -> usize {
        if self.format.is_per_subsong() {
            self.tracks.len()
        } else {
            1
        }
    }

    fn subsong_slot(&self, subsong: usize) -> usize {
        if self.format.is_per_subsong() {
            subsong
        } else {
            0
        }
    }

    pub fn channel_mask(&self, subsong: usize) -> u64 {
        self.channel_masks[self.subsong_slot(subsong)]
    }

    pub fn tempo_map(&self, subsong: usize) -> &TempoMap {
        &self.tempo_maps[self.subsong_slot(subsong)]
    }

    pub fn end_timestamp_ticks(&self, subsong: usize) -> u32 {
        self.end_timestamps[self.subsong_slot(subsong)]
    }

    pub fn duration_ms(&self, subsong: usize) -> u64 {
        let ticks = self.end_timestamp_ticks(subsong);
        self.tempo_map(subsong).tick_to_ms(ticks, self.time_division as u32)
    }

    pub fn loop_range(&self, subsong: usize) -> &LoopRange {
        &self.loop_ranges[self.subsong_slot(subsong)]
    }

    pub fn loop_range_mut(&mut self, subsong: usize) -> &mut LoopRange {
        let slot = self.subsong_slot(subsong);
        &mut self.loop_ranges[slot]
    }

    pub fn metadata(&self) -> &MetadataTable {
        &self.metadata
    }

    pub fn metadata_mut(&mut self) -> &mut MetadataTable {
        &mut self.metadata
    }

    pub fn set_soundfont(&mut self, bytes: Vec<u8>) {
        self.soundfont = Some(bytes);
    }

    pub fn soundfont(&self) -> Option<&[u8]> {
        self.soundfont.as_deref()
    }

    pub fn set_bank_offset(&mut self, offset: i32) {
        self.bank_offset = offset;
    }

    pub fn bank_offset(&self) -> i32 {
        self.bank_offset
    }

    pub fn set_extra_percussion_channel(&mut self, channel: u8) {
        self.extra_percussion_channel = Some(channel);
    }

    pub fn extra_percussion_channel(&self) -> Option<u8> {
        self.extra_percussion_channel
    }

    /// Maps a raw port number to its canonical id, inserting a new entry on
    /// first sight. Monotone and stable: the i-th raw port encountered maps
    /// to canonical id i.
    pub(crate) fn canonical_port(&mut self, raw_port: u8) -> u8 {
        if let Some(idx) = self.port_table.iter().position(|&p| p == raw_port) {
            idx as u8
        } else {
            self.port_table.push(raw_port);
            (self.port_table.len() - 1) as u8
        }
    }

    pub fn port_table(&self) -> &[u8] {
        &self.port_table
    }

    /// Appends `track`, growing the per-subsong vectors for format 2 or
    /// updating the single global slot for format 0/1, and folds in the
    /// side effects (channel mask, tempo map, end timestamp) that
    /// `add_event_to_track` also applies incrementally.
    pub fn add_track(&mut self, track: Track) {
        let index = self.tracks.len();
        if self.format.is_per_subsong() {
            self.channel_masks.push(0);
            self.tempo_maps.push(TempoMap::new());
            self.end_timestamps.push(0);
            self.loop_ranges.push(LoopRange::none());
        }
        self.tracks.push(track);
        self.recompute_side_effects_for_track(index);
    }

    /// Inserts `event` into `track_index` per the track insertion policy and
    /// mirrors the same side effects `add_track` applies.
    pub fn add_event_to_track(&mut self, track_index: usize, event: crate::event::Event) {
        self.tracks[track_index].add_event(event);
        self.recompute_side_effects_for_track(track_index);
    }

    fn recompute_side_effects_for_track(&mut self, track_index: usize) {
        let slot = if self.format.is_per_subsong() { track_index } else { 0 };
        let mut mask = if self.format.is_per_subsong() { 0 } else { self.channel_masks[slot] };
        let mut last_tick = 0u32;
        let mut port: u8 = 0;

        // Collect tempo changes first (immutable borrow of the track), then
        // apply them to the tempo map to avoid borrowing `self` twice.
        let mut tempo_changes = Vec::new();
        let mut raw_ports_sighted = Vec::new();
        {
            let track = &self.tracks[track_index];
            for event in track.events() {
                last_tick = last_tick.max(event.tick);
                match event.kind {
                    EventKind::NoteOn | EventKind::NoteOff => {
                        let bit = port as u64 * 16 + event.channel as u64;
                        if bit < 64 {
                            mask |= 1 << bit;
                        }
                    }
                    _ => {}
                }
                if let Some(uspq) = event.tempo_value() {
                    tempo_changes.push((event.tick, uspq));
                }
                if event.is_port_assignment() {
                    if let Some(payload) = event.meta_payload() {
                        if let Some(&raw) = payload.first() {
                            port = raw;
                            raw_ports_sighted.push(raw);
                        }
                    }
                }
            }
        }

        if self.format.is_per_subsong() {
            self.channel_masks[slot] = mask;
        } else {
            self.channel_masks[slot] |= mask;
        }
        self.end_timestamps[slot] = self.end_timestamps[slot].max(last_tick);
        for (tick, uspq) in tempo_changes {
            self.tempo_maps[slot].add(tick, uspq);
        }
        for raw in raw_ports_sighted {
            self.canonical_port(raw);
        }
    }

    /// Read-only counterpart to [`Container::canonical_port`] for callers
    /// (like `serialize_as_stream`) that only have a shared reference.
    /// Every raw port reaching here was already registered by
    /// `recompute_side_effects_for_track` during decode, so an unknown
    /// value (which should not occur) falls back to the raw byte itself.
    pub(crate) fn canonical_port_lookup(&self, raw_port: u8) -> u8 {
        self.port_table.iter().position(|&p| p == raw_port).map(|i| i as u8).unwrap_or(raw_port)
    }
}
