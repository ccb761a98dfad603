/*!

Raw System Exclusive: a catenation of one or more `F0 ... F7` messages with
no timing information of its own, each stored as an Extended event at
tick 0. Grounded in `examples/original_source/MIDIProcessor.cpp`'s
`IsSYX`/`ProcessSYX`.

!*/

use crate::constants::{STATUS_SYSEX, STATUS_SYSEX_CONTINUE};
use crate::container::{track::Track, Container, Format};
use crate::error::{LibError, LibResult};
use crate::event::Event;

pub(crate) fn is_syx(data: &[u8]) -> bool {
    data.len() >= 2 && data[0] == STATUS_SYSEX && data[data.len() - 1] == STATUS_SYSEX_CONTINUE
}

pub(crate) fn decode(data: &[u8]) -> LibResult<Container> {
    let mut container = Container::new(Format::Zero, 1);
    let mut track = Track::new();

    let mut index = 0usize;
    while index < data.len() {
        if data[index] != STATUS_SYSEX {
            return Err(malformed("SYX stream byte was not a SysEx start"));
        }

        let mut length = 1usize;
        loop {
            let b = *data
                .get(index + length)
                .ok_or_else(|| insufficient("SYX message ran past end of file without F7"))?;
            length += 1;
            if b == STATUS_SYSEX_CONTINUE {
                break;
            }
        }

        track.add_event(Event::extended(0, data[index..index + length].to_vec()));
        index += length;
    }

    container.add_track(track);
    Ok(container)
}

fn insufficient(description: &str) -> LibError {
    LibError::InsufficientInput { site: format!("{}:{}", file!(), line!()), description: description.into() }
}

fn malformed(description: &str) -> LibError {
    LibError::Malformed { site: format!("{}:{}", file!(), line!()), description: description.into() }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognizes_sysex_bracket() {
        assert!(is_syx(&[0xF0, 0x41, 0x10, 0xF7]));
        assert!(!is_syx(&[0xF0, 0x41]));
    }

    #[test]
    fn decodes_two_concatenated_messages() {
        let bytes = [0xF0, 0x41, 0xF7, 0xF0, 0x42, 0x43, 0xF7];
        let container = decode(&bytes).unwrap();
        assert_eq!(1, container.track_count());
        let events = container.tracks()[0].events();
        assert_eq!(2, events.len());
        assert_eq!(vec![0xF0, 0x41, 0xF7], events[0].data);
        assert_eq!(vec![0xF0, 0x42, 0x43, 0xF7], events[1].data);
    }
}
