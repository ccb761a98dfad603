/*!

The metadata table: an ordered list of `(timestamp-ms, name, value)`
triples, plus an optional cover-art blob. Grounded in `MIDIContainer.h`'s
`midi_metadata_item_t`/`midi_metadata_table_t`.

!*/

use crate::text::Text;

#[derive(Clone, Debug)]
pub struct MetadataItem {
    pub timestamp_ms: u32,
    pub name: String,
    pub value: Text,
}

#[derive(Clone, Debug, Default)]
pub struct MetadataTable {
    items: Vec<MetadataItem>,
    cover_art: Option<Vec<u8>>,
}

impl MetadataTable {
    pub fn new() -> Self {
        Self {
            items: Vec::new(),
            cover_art: None,
        }
    }

    pub fn add<N: Into<String>, V: Into<Text>>(&mut self, timestamp_ms: u32, name: N, value: V) {
        self.items.push(MetadataItem {
            timestamp_ms,
            name: name.into(),
            value: value.into(),
        });
    }

    pub fn items(&self) -> &[MetadataItem] {
        &self.items
    }

    pub fn get(&self, name: &str) -> Option<&Text> {
        self.items.iter().find(|i| i.name == name).map(|i| &i.value)
    }

    pub fn set_cover_art(&mut self, bytes: Vec<u8>) {
        self.cover_art = Some(bytes);
    }

    pub fn cover_art(&self) -> Option<&[u8]> {
        self.cover_art.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_and_get_by_name() {
        let mut m = MetadataTable::new();
        m.add(0, "artist", "Komuro");
        assert_eq!("Komuro", m.get("artist").unwrap().as_str());
        assert!(m.get("album").is_none());
    }
}
