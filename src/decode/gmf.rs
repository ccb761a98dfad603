/*!

Game Music Format: a 7-byte header carrying a 16-bit tempo, a synthesized
director track (Set Tempo plus an MT-32 all-parameters-reset SysEx), and
an SMF track for the remainder of the file. Grounded in
`examples/original_source/MIDIProcessorGMF.cpp`.

!*/

use crate::byte_iter::ByteCursor;
use crate::constants::meta;
use crate::container::{track::Track, Container, Format};
use crate::error::LibResult;
use crate::event::Event;
use crate::options::DecodeOptions;

const MT32_RESET_SYSEX: &[u8] = &[0x41, 0x10, 0x16, 0x12, 0x7F, 0x00, 0x00, 0x01, 0xF7];

pub(crate) fn is_gmf(data: &[u8]) -> bool {
    data.len() >= 32 && &data[0..3] == b"GMF" && data[3] == 1
}

pub(crate) fn decode(data: &[u8], options: &DecodeOptions) -> LibResult<Container> {
    let tempo = u16::from_be_bytes([data[4], data[5]]);
    let scaled_tempo = tempo as u32 * 100_000;

    let mut container = Container::new(Format::Zero, 0xC0);

    let mut director = Track::new();
    let tempo_bytes = scaled_tempo.to_be_bytes();
    director.push_raw(Event::meta(0, meta::SET_TEMPO, &tempo_bytes[1..]));
    director.push_raw(Event::sysex(0, MT32_RESET_SYSEX));
    director.add_event(Event::end_of_track(0));
    container.add_track(director);

    let mut cursor = ByteCursor::new(&data[7..]);
    let track = super::smf::decode_track(&mut cursor, options)?;
    container.add_track(track);

    Ok(container)
}
