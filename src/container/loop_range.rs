/*!

A subsong's loop range: optional begin/end ticks. Grounded in
`MIDIContainer.h`'s loop-timestamp fields and
`GetLoopBeginTimestamp`/`GetLoopEndTimestamp`.

!*/

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct LoopRange {
    begin: Option<u32>,
    end: Option<u32>,
}

impl LoopRange {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn set_begin(&mut self, tick: u32) {
        self.begin = Some(tick);
    }

    pub fn set_end(&mut self, tick: u32) {
        self.end = Some(tick);
    }

    pub fn clear(&mut self) {
        self.begin = None;
        self.end = None;
    }

    pub fn has_loop(&self) -> bool {
        self.begin.is_some()
    }

    pub fn begin_tick(&self) -> Option<u32> {
        self.begin
    }

    /// "Begin only" means "end = end of song" at query time.
    pub fn end_tick(&self, end_of_song_tick: u32) -> Option<u32> {
        self.begin?;
        Some(self.end.unwrap_or(end_of_song_tick))
    }

    /// Applies the post-pass from spec.md §4.2: if begin is set but end is
    /// not, default end to end-of-song; if begin equals end-of-song, clear
    /// the whole loop.
    pub(crate) fn finalize(&mut self, end_of_song_tick: u32) {
        if let Some(begin) = self.begin {
            if self.end.is_none() {
                self.end = Some(end_of_song_tick);
            }
            if begin == end_of_song_tick {
                self.clear();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn begin_only_resolves_to_end_of_song() {
        let mut r = LoopRange::none();
        r.set_begin(10);
        assert_eq!(Some(100), r.end_tick(100));
    }

    #[test]
    fn finalize_clears_when_begin_equals_end_of_song() {
        let mut r = LoopRange::none();
        r.set_begin(100);
        r.finalize(100);
        assert!(!r.has_loop());
    }

    #[test]
    fn no_loop_without_begin() {
        let r = LoopRange::none();
        assert_eq!(None, r.end_tick(100));
    }
}
