/*!

RCP v2/v3 file header parsing: magic/version detection, the Shift-JIS
title and comment block, base tempo, time signature, and per-track byte
offsets. Grounded in
`examples/original_source/rcpdump/240511-01/RCP.cpp`'s header reads and
`examples/original_source/Recomposer/Support.cpp`'s `BPM2Ticks`.

!*/

use crate::byte_iter::ByteCursor;
use crate::encoding::decode_shift_jis;
use crate::error::{LibError, LibResult};
use crate::text::Text;

/// `examples/original_source/Recomposer/RCPConverter.cpp:645`.
const MAGIC_V2: &[u8] = b"RCM-PC98V2.0(C)COME ON MUSIC\r\n";
/// `examples/original_source/Recomposer/RCPConverter.cpp:648`.
const MAGIC_V3: &[u8] = b"COME ON MUSIC RECOMPOSER RCP3.0";

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(super) enum Version {
    V2,
    V3,
}

pub(super) struct Header {
    pub(super) version: Version,
    pub(super) title: Text,
    pub(super) comment: Text,
    /// Ticks per quarter note, read from the header; RCP files that store 0
    /// here fall back to 96, matching the bar-length encoding `RCP.cpp`
    /// assumes when a file omits it.
    pub(super) ticks_per_quarter: u16,
    /// Base tempo, in the file's internal "BPM * 64 shifted" units; see
    /// `bpm_to_uspq` for the conversion this crate actually stores.
    pub(super) base_tempo_raw: u16,
    pub(super) beats_per_measure: u8,
    pub(super) beat_unit: u8,
    pub(super) track_count: u16,
    pub(super) rhythm_track_count: u16,
    pub(super) track_base_offset: u32,
}

fn cursor_err(source: crate::byte_iter::ByteError) -> LibError {
    LibError::Cursor { site: format!("{}:{}", file!(), line!()), source }
}

/// Detects the magic at the cursor's current position without consuming it,
/// since `MAGIC_V2` and `MAGIC_V3` are different lengths (30 vs 31 bytes).
/// Matches by prefix, as `MIDIProcessorRCP.cpp::IsRCP`'s `strncmp` calls do,
/// rather than requiring an exact-length match against trailing padding.
fn detect_version(cursor: &ByteCursor) -> Option<(Version, usize)> {
    if let Some(window) = cursor.peek_n(MAGIC_V2.len()) {
        if window == MAGIC_V2 {
            return Some((Version::V2, MAGIC_V2.len()));
        }
    }
    if let Some(window) = cursor.peek_n(MAGIC_V3.len()) {
        if window == MAGIC_V3 {
            return Some((Version::V3, MAGIC_V3.len()));
        }
    }
    None
}

pub(super) fn parse(cursor: &mut ByteCursor) -> LibResult<Header> {
    let (version, magic_len) = detect_version(cursor).ok_or_else(|| LibError::Unsupported {
        site: format!("{}:{}", file!(), line!()),
        description: "not an RCP v2/v3 file (magic mismatch)".into(),
    })?;
    cursor.read_n(magic_len).map_err(cursor_err)?;

    let title_bytes = cursor.read_n(36).map_err(cursor_err)?;
    let comment_bytes = cursor.read_n(buffer_len_for(version)).map_err(cursor_err)?;

    let title = decode_shift_jis(trim_nul(title_bytes));
    let comment = decode_shift_jis(trim_nul(comment_bytes));

    let track_count = cursor.read_u16_le().map_err(cursor_err)?;
    let rhythm_track_count = cursor.read_u16_le().map_err(cursor_err)?;
    let _command_count = cursor.read_u16_le().map_err(cursor_err)?;
    let base_tempo_raw = cursor.read_u16_le().map_err(cursor_err)?;
    let ticks_per_quarter_raw = cursor.read_u16_le().map_err(cursor_err)?;
    let ticks_per_quarter = if ticks_per_quarter_raw == 0 { 96 } else { ticks_per_quarter_raw };
    let beat_byte = cursor.read_or_die().map_err(cursor_err)?;
    let beats_per_measure = (beat_byte >> 4).max(1);
    let beat_unit = (beat_byte & 0x0F).max(1);
    let _key = cursor.read_or_die().map_err(cursor_err)?;
    let _play_bias = cursor.read_or_die().map_err(cursor_err)?;
    cursor.read_n(reserved_len_for(version)).map_err(cursor_err)?;
    let track_base_offset = cursor.position() as u32;

    Ok(Header {
        version,
        title,
        comment,
        ticks_per_quarter,
        base_tempo_raw,
        beats_per_measure,
        beat_unit,
        track_count,
        rhythm_track_count,
        track_base_offset,
    })
}

fn buffer_len_for(version: Version) -> usize {
    match version {
        Version::V2 => 80,
        Version::V3 => 480,
    }
}

fn reserved_len_for(version: Version) -> usize {
    match version {
        Version::V2 => 18,
        Version::V3 => 18,
    }
}

fn trim_nul(bytes: &[u8]) -> &[u8] {
    match bytes.iter().position(|&b| b == 0) {
        Some(idx) => &bytes[..idx],
        None => bytes,
    }
}

/// `examples/original_source/Recomposer/Support.cpp`'s `BPM2Ticks`:
/// `(60 000 000 * 64) / (bpm * scale)`, inverted here to recover
/// microseconds-per-quarter-note from the stored raw tempo value at the
/// default scale of 1.
pub(super) fn base_tempo_uspq(base_tempo_raw: u16) -> u32 {
    if base_tempo_raw == 0 {
        return crate::container::tempo_map::DEFAULT_TEMPO_USPQ;
    }
    (60_000_000u64 * 64 / base_tempo_raw as u64) as u32
}
