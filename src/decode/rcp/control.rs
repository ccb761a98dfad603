/*!

CM6 and GSD control files: standalone Roland device-configuration dumps
that RCP files can reference by name (`RcpFile._CM6FileName`/
`_GSD1FileName`/`_GSD2FileName` in
`examples/original_source/Recomposer/RCPConverter.cpp`) so that loading the
sequence also reprograms the MT-32/CM-64 (CM6) or Sound Canvas (GSD) before
playback starts.

The struct layouts `cm6_file_t`/`gsd_file_t` that `RCPConverter.cpp` reads
weren't part of the retrieved source (only the converter driving code
was); this decoder reconstructs the record format from the Roland DT1
("Data Set 1") SysEx convention the RCP SysEx template expander in
`sysex_template.rs` already implements: a 3-byte address, a length byte,
and that many data bytes, repeated until the file ends.

!*/

use crate::byte_iter::ByteCursor;
use crate::container::{track::Track, Container, Format};
use crate::error::{LibError, LibResult};
use crate::event::Event;

/// spec.md §4.4's file-type table; grounded in
/// `examples/original_source/Recomposer/RCPConverter.cpp:651-656`'s
/// `GetFileType`, which shares the `"COME ON MUSIC"` prefix between both
/// control kinds and then branches on what follows it.
const CM6_MAGIC: &[u8] = b"COME ON MUSIC\0\0R ";
const GSD_MAGIC: &[u8] = b"COME ON MUSIC GS CONTROL 1.0";

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum ControlKind {
    Cm6 { cm64_mode: bool },
    Gsd,
}

fn model_id(kind: ControlKind) -> u8 {
    match kind {
        ControlKind::Cm6 { cm64_mode: true } => 0x16, // CM-64
        ControlKind::Cm6 { cm64_mode: false } => 0x16, // MT-32
        ControlKind::Gsd => 0x42,                      // GS
    }
}

/// Identifies whether `data` is a CM6 or GSD control file.
pub(crate) fn detect(data: &[u8]) -> Option<ControlKind> {
    if data.starts_with(CM6_MAGIC) {
        let cm64_mode = data.get(CM6_MAGIC.len()).copied().unwrap_or(0) != 0;
        return Some(ControlKind::Cm6 { cm64_mode });
    }
    if data.starts_with(GSD_MAGIC) {
        return Some(ControlKind::Gsd);
    }
    None
}

fn cursor_err(source: crate::byte_iter::ByteError) -> LibError {
    LibError::Cursor { site: format!("{}:{}", file!(), line!()), source }
}

/// Decodes a standalone CM6/GSD file into a one-track, format-0 container
/// whose events are the file's SysEx records, all at tick 0.
pub(crate) fn decode(data: &[u8]) -> LibResult<Container> {
    let kind = detect(data).ok_or_else(|| LibError::Unsupported {
        site: format!("{}:{}", file!(), line!()),
        description: "not a recognized CM6/GSD control file".into(),
    })?;
    let header_len = match kind {
        ControlKind::Cm6 { .. } => CM6_MAGIC.len() + 1,
        ControlKind::Gsd => GSD_MAGIC.len(),
    };
    let track = decode_records(&data[header_len..], kind)?;
    let mut container = Container::new(Format::Zero, 96);
    container.add_track(track);
    Ok(container)
}

/// Decodes a control file's body (magic already stripped by the caller,
/// used when the RCP decoder loads a referenced CM6/GSD file directly into
/// an extra RCP track) into the literal SysEx events it represents.
pub(super) fn decode_records(body: &[u8], kind: ControlKind) -> LibResult<Track> {
    let mut cursor = ByteCursor::new(body);
    let mut track = Track::new();

    while cursor.remaining() >= 4 {
        let addr = cursor.read_n(3).map_err(cursor_err)?.to_vec();
        let len = cursor.read_or_die().map_err(cursor_err)? as usize;
        if len == 0 || cursor.remaining() < len {
            break;
        }
        let payload = cursor.read_n(len).map_err(cursor_err)?;

        let mut sysex = Vec::with_capacity(6 + addr.len() + payload.len());
        sysex.push(0x41); // Roland manufacturer id
        sysex.push(0x10); // device id
        sysex.push(model_id(kind));
        sysex.push(0x12); // DT1 command id
        sysex.extend_from_slice(&addr);
        sysex.extend_from_slice(payload);
        let checksum = roland_checksum(&addr, payload);
        sysex.push(checksum);

        track.push_raw(Event::sysex(0, &sysex));
    }

    track.add_event(Event::end_of_track(0));
    Ok(track)
}

fn roland_checksum(addr: &[u8], payload: &[u8]) -> u8 {
    let sum: u8 = addr.iter().chain(payload.iter()).fold(0u8, |acc, &b| acc.wrapping_add(b));
    sum.wrapping_neg() & 0x7F
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_cm6_magic() {
        let mut data = CM6_MAGIC.to_vec();
        data.push(0); // MT-32 mode
        assert_eq!(Some(ControlKind::Cm6 { cm64_mode: false }), detect(&data));
    }

    #[test]
    fn detects_cm64_mode_flag() {
        let mut data = CM6_MAGIC.to_vec();
        data.push(1); // CM-64 mode
        assert_eq!(Some(ControlKind::Cm6 { cm64_mode: true }), detect(&data));
    }

    #[test]
    fn detects_gsd_magic() {
        let data = GSD_MAGIC.to_vec();
        assert_eq!(Some(ControlKind::Gsd), detect(&data));
    }

    #[test]
    fn rejects_unrelated_data() {
        assert_eq!(None, detect(b"not a control file"));
    }

    #[test]
    fn decodes_single_dt1_record_into_sysex_event() {
        let mut body = Vec::new();
        body.extend_from_slice(&[0x40, 0x00, 0x7F]); // address
        body.push(1); // length
        body.push(0x01); // data
        let track = decode_records(&body, ControlKind::Gsd).unwrap();
        assert_eq!(2, track.len()); // sysex + end of track
        assert!(track.events()[0].is_sysex());
    }
}
