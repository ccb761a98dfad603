/*!

Format detection and dispatch. Grounded in
`examples/original_source/MIDIProcessor.cpp`'s `processor_t::Process`:
a fixed, ordered sequence of magic-byte (and, for a few formats,
file-extension) sniffs, first match wins.

XMI, MDS, HMP, HMI and LDS occupy slots in that source's dispatch order
but have no corresponding decoder module in this crate — they carry no
share of the component budget this library targets and are treated the
same as the out-of-scope command-line drivers: named here for fidelity
to the documented order, never reached.

!*/

pub(crate) mod gmf;
pub(crate) mod mmf;
pub(crate) mod mus;
pub(crate) mod rcp;
pub(crate) mod riff;
pub(crate) mod smf;
#[cfg(feature = "debug_tst")]
pub(crate) mod tst;
pub(crate) mod xmf;
pub(crate) mod syx;

use crate::container::Container;
use crate::error::LibResult;
use crate::options::DecodeOptions;

/// Tries every known decoder in the source's documented order and returns
/// the first one that recognizes `data`. `file_name` is consulted only by
/// the handful of decoders whose recognizer needs an extension rather
/// than (or in addition to) magic bytes. Returns `Ok(None)` rather than an
/// error when nothing recognizes the buffer.
pub(crate) fn dispatch(
    data: &[u8],
    file_name: Option<&str>,
    options: &DecodeOptions,
) -> LibResult<Option<Container>> {
    if smf::is_smf(data) {
        return Ok(Some(smf::decode(data, options)?));
    }
    if riff::is_riff(data) {
        return Ok(Some(riff::decode(data, options)?));
    }
    if mus::is_mus(data) {
        return Ok(Some(mus::decode(data)?));
    }
    if gmf::is_gmf(data) {
        return Ok(Some(gmf::decode(data, options)?));
    }
    if rcp::is_rcp(data) {
        return Ok(Some(rcp::decode(data, options)?));
    }
    if xmf::is_xmf(data) {
        return Ok(Some(xmf::decode(data, options)?));
    }
    if mmf::is_mmf(data) {
        return Ok(Some(mmf::decode(data, options)?));
    }
    #[cfg(feature = "debug_tst")]
    if tst::is_tst(file_name) {
        return Ok(Some(tst::decode(data, options)?));
    }
    #[cfg(not(feature = "debug_tst"))]
    let _ = file_name;
    if syx::is_syx(data) {
        return Ok(Some(syx::decode(data)?));
    }

    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unrecognized_buffer_is_not_an_error() {
        let result = dispatch(&[0x00, 0x01, 0x02, 0x03], None, &DecodeOptions::default()).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn smf_takes_priority_at_the_head_of_the_chain() {
        let mut body = Vec::new();
        body.push(0x00);
        body.extend_from_slice(&[0xFF, 0x2F, 0x00]);
        let mut bytes = Vec::new();
        bytes.extend_from_slice(b"MThd");
        bytes.extend_from_slice(&6u32.to_be_bytes());
        bytes.extend_from_slice(&0u16.to_be_bytes());
        bytes.extend_from_slice(&1u16.to_be_bytes());
        bytes.extend_from_slice(&96u16.to_be_bytes());
        bytes.extend_from_slice(b"MTrk");
        bytes.extend_from_slice(&(body.len() as u32).to_be_bytes());
        bytes.extend_from_slice(&body);

        let container = dispatch(&bytes, Some("song.mid"), &DecodeOptions::default()).unwrap().unwrap();
        assert_eq!(1, container.track_count());
    }

    #[cfg(feature = "debug_tst")]
    #[test]
    fn tst_extension_is_reached_when_nothing_else_matches() {
        let container = dispatch(&[0x00], Some("song.tst"), &DecodeOptions::default()).unwrap().unwrap();
        assert_eq!(1, container.track_count());
    }
}
