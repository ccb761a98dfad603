/*!

Text decoding for formats that predate Unicode: Recomposer (RCP) text is
Shift-JIS, and RIFF/RMID `LIST INFO` chunks declare an `IENC` code page that
is sometimes Shift-JIS and sometimes DOS code page 437. Grounded in
`examples/original_source/MIDIProcessorRCP.cpp`'s Shift-JIS handling and
`MIDIProcessorRIFF.cpp`'s `IENC` code-page switch; `encoding_rs` is the
crate the pack reaches for this concern (`MikuroXina-bms-rs`'s manifest).

!*/

use crate::text::Text;

/// Decodes Shift-JIS bytes, falling back to a lossy UTF-8 reinterpretation
/// (via `Text::Other`) only if the bytes contain characters
/// `encoding_rs` can't map, matching the source's "never fail on bad text"
/// posture.
pub(crate) fn decode_shift_jis(bytes: &[u8]) -> Text {
    let (decoded, _, had_errors) = encoding_rs::SHIFT_JIS.decode(bytes);
    if had_errors {
        Text::Other(bytes.to_vec())
    } else {
        Text::Utf8(decoded.into_owned())
    }
}

/// DOS code page 437's upper half (0x80-0xFF); the lower half is ASCII.
/// `encoding_rs` has no CP437 codec, so this is a small static table
/// covering the box-drawing and accented-Latin glyphs RIFF `IENC=437`
/// files actually use.
const CP437_HIGH: [char; 128] = [
    'Ç', 'ü', 'é', 'â', 'ä', 'à', 'å', 'ç', 'ê', 'ë', 'è', 'ï', 'î', 'ì', 'Ä', 'Å', 'É', 'æ', 'Æ',
    'ô', 'ö', 'ò', 'û', 'ù', 'ÿ', 'Ö', 'Ü', '¢', '£', '¥', '₧', 'ƒ', 'á', 'í', 'ó', 'ú', 'ñ', 'Ñ',
    'ª', 'º', '¿', '⌐', '¬', '½', '¼', '¡', '«', '»', '░', '▒', '▓', '│', '┤', '╡', '╢', '╖', '╕',
    '╣', '║', '╗', '╝', '╜', '╛', '┐', '└', '┴', '┬', '├', '─', '┼', '╞', '╟', '╚', '╔', '╩', '╦',
    '╠', '═', '╬', '╧', '╨', '╤', '╥', '╙', '╘', '╒', '╓', '╫', '╪', '┘', '┌', '█', '▄', '▌', '▐',
    '▀', 'α', 'ß', 'Γ', 'π', 'Σ', 'σ', 'µ', 'τ', 'Φ', 'Θ', 'Ω', 'δ', '∞', 'φ', 'ε', '∩', '≡', '±',
    '≥', '≤', '⌠', '⌡', '÷', '≈', '°', '∙', '·', '√', 'ⁿ', '²', '■', '\u{00a0}',
];

pub(crate) fn decode_cp437(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|&b| if b < 0x80 { b as char } else { CP437_HIGH[(b - 0x80) as usize] })
        .collect()
}

/// Decodes a RIFF `LIST INFO` text value per its declared `IENC` code page,
/// defaulting to Shift-JIS (the only code page the source ever sets
/// `IENC` to besides 437) when no code page was declared.
pub(crate) fn decode_riff_text(bytes: &[u8], code_page: Option<u32>) -> Text {
    match code_page {
        Some(437) => Text::Utf8(decode_cp437(bytes)),
        _ => decode_shift_jis(bytes),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shift_jis_ascii_round_trips() {
        let text = decode_shift_jis(b"Komuro");
        assert_eq!("Komuro", text.as_str());
    }

    #[test]
    fn cp437_high_byte_maps_to_accented_latin() {
        assert_eq!("é", decode_cp437(&[0x82]));
    }
}
