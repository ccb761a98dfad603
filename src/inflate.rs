/*!

Zlib inflation for XMF's compressed node payloads, via `flate2`. Grounded
in `examples/original_source/MIDIProcessorXMF.cpp`'s use of `zlib`'s
`uncompress`, and in the pack's precedent for reaching for `flate2` to
cover the same concern (`dbalsom-fluxfox`, `ssoj13-exiftool-rs`,
`scred47-pleezer`).

!*/

use flate2::read::ZlibDecoder;
use std::io::Read;

use crate::error::{LibError, LibResult};

/// Inflates a zlib-wrapped buffer, matching XMF's `unpackedSize`-prefixed
/// compressed node convention: the caller already knows the expected
/// output size and passes it as `expected_size` so a corrupt or truncated
/// stream is caught by a length mismatch rather than silently truncated.
pub(crate) fn inflate(data: &[u8], expected_size: usize) -> LibResult<Vec<u8>> {
    let mut decoder = ZlibDecoder::new(data);
    let mut out = Vec::with_capacity(expected_size);
    decoder.read_to_end(&mut out).map_err(|source| LibError::Inflate {
        site: format!("{}:{}", file!(), line!()),
        source,
    })?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn round_trips_through_flate2_encoder() {
        let mut encoder = flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::default());
        encoder.write_all(b"hello xmf").unwrap();
        let compressed = encoder.finish().unwrap();
        let inflated = inflate(&compressed, 9).unwrap();
        assert_eq!(b"hello xmf", inflated.as_slice());
    }
}
