#![allow(dead_code)]

#[macro_use]
mod error;
#[macro_use]
mod clamp;

mod byte_iter;
mod constants;
mod decode;
mod encoding;
mod event;
mod inflate;
mod scribe;
mod text;
mod vlq;

pub mod container;
pub mod options;

pub use container::serialize_smf::serialize_as_smf;
pub use container::serialize_stream::{serialize_as_stream, Stream, StreamEvent};
pub use container::{Container, Format};
pub use error::{Error, Result};
pub use event::{Event, EventKind};
pub use options::DecodeOptions;

use error::LibError;

/// Reads one of the dozen supported historical sequence formats and
/// normalizes it into a [`Container`]. `file_name` only matters to the
/// handful of decoders that are extension-gated (RCP's CM6/GSD siblings,
/// and the `debug_tst` feature's fixed test sequence); pass `None` when no
/// name is available. Returns `Err` if a recognized file is structurally
/// broken or uses an unsupported variant of its format — an unrecognized
/// buffer is not an error, so this returns `Ok` with an `Unsupported`
/// error only once a decoder has committed to the format and then failed.
pub fn decode(bytes: &[u8], file_name: Option<&str>, options: &DecodeOptions) -> Result<Container> {
    let mut container = decode::dispatch(bytes, file_name, options)
        .and_then(|found| found.ok_or_else(unrecognized_format))
        .map_err(Error::from)?;
    container::loop_detect::detect_loops(&mut container);
    Ok(container)
}

fn unrecognized_format() -> LibError {
    LibError::Unsupported {
        site: format!("{}:{}", file!(), line!()),
        description: "no decoder recognized this file".into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn smf_bytes() -> Vec<u8> {
        let mut body = Vec::new();
        body.push(0x00);
        body.extend_from_slice(&[0xFF, 0x2F, 0x00]);
        let mut out = Vec::new();
        out.extend_from_slice(b"MThd");
        out.extend_from_slice(&6u32.to_be_bytes());
        out.extend_from_slice(&0u16.to_be_bytes());
        out.extend_from_slice(&1u16.to_be_bytes());
        out.extend_from_slice(&96u16.to_be_bytes());
        out.extend_from_slice(b"MTrk");
        out.extend_from_slice(&(body.len() as u32).to_be_bytes());
        out.extend_from_slice(&body);
        out
    }

    #[test]
    fn decodes_a_minimal_smf() {
        let container = decode(&smf_bytes(), Some("song.mid"), &DecodeOptions::default()).unwrap();
        assert_eq!(Format::One, container.format());
        assert_eq!(1, container.track_count());
    }

    #[test]
    fn unrecognized_bytes_return_an_error() {
        let err = decode(&[0x00, 0x01, 0x02], None, &DecodeOptions::default()).unwrap_err();
        assert!(!err.is_insufficient_input());
    }

    #[test]
    fn round_trips_through_smf_serialization() {
        let container = decode(&smf_bytes(), None, &DecodeOptions::default()).unwrap();
        let bytes = serialize_as_smf(&container);
        let reparsed = decode(&bytes, None, &DecodeOptions::default()).unwrap();
        assert_eq!(container.track_count(), reparsed.track_count());
    }
}
