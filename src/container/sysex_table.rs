/*!

A content-addressed SysEx dedup table, keyed by `(port, bytes)`. Grounded
in `MIDIContainer.cpp`'s `sysex_table_t::AddItem`.

!*/

use std::collections::HashMap;

#[derive(Clone, Debug, Default)]
pub struct SysExTable {
    entries: Vec<(u8, Vec<u8>)>,
    index: HashMap<(u8, Vec<u8>), usize>,
}

impl SysExTable {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Adds a SysEx payload on `port`, returning its (possibly pre-existing)
    /// table index.
    pub fn add(&mut self, port: u8, bytes: &[u8]) -> usize {
        let key = (port, bytes.to_vec());
        if let Some(&idx) = self.index.get(&key) {
            return idx;
        }
        let idx = self.entries.len();
        self.entries.push((port, bytes.to_vec()));
        self.index.insert(key, idx);
        idx
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<(u8, &[u8])> {
        self.entries.get(index).map(|(port, bytes)| (*port, bytes.as_slice()))
    }
}
