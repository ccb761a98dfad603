/*!

Extensible Music Format: a VLQ-framed tree of file and folder nodes
rooted at a byte offset named in the file header, each file node
carrying a Standard MIDI File or a Downloadable Sounds resource,
optionally zlib-packed. Grounded in
`examples/original_source/src/MIDIProcessorXMF.cpp`.

!*/

use crate::container::Container;
use crate::error::{LibError, LibResult};
use crate::options::DecodeOptions;

pub(crate) fn is_xmf(data: &[u8]) -> bool {
    data.len() >= 4 && &data[0..4] == b"XMF_"
}

/// Standard resource format IDs this decoder recognizes (RP-030 5.3.1);
/// every other value is read past but otherwise ignored.
#[derive(Clone, Copy, PartialEq, Eq)]
enum StandardResourceFormat {
    SmfType0,
    SmfType1,
    Dls1,
    Dls2,
    Dls2_1,
    MobileDls,
    Other,
}

impl StandardResourceFormat {
    fn from_u32(id: u32) -> Self {
        match id {
            0 => Self::SmfType0,
            1 => Self::SmfType1,
            2 => Self::Dls1,
            3 => Self::Dls2,
            4 => Self::Dls2_1,
            5 => Self::MobileDls,
            _ => Self::Other,
        }
    }

    fn is_smf(self) -> bool {
        matches!(self, Self::SmfType0 | Self::SmfType1)
    }

    fn is_dls(self) -> bool {
        matches!(self, Self::Dls1 | Self::Dls2 | Self::Dls2_1 | Self::MobileDls)
    }
}

/// One entry from a node's Unpackers section: only the standard Zlib
/// unpacker is supported for decompression, matching the source.
#[derive(Clone, Copy, Default)]
struct Unpacker {
    is_zlib: bool,
    unpacked_size: usize,
}

fn read_vlq(data: &[u8], pos: &mut usize) -> LibResult<u32> {
    let mut value: u32 = 0;
    loop {
        let b = *data.get(*pos).ok_or_else(|| insufficient("XMF VLQ ran past end of file"))?;
        *pos += 1;
        value = (value << 7) | (b & 0x7F) as u32;
        if b & 0x80 == 0 {
            return Ok(value);
        }
    }
}

fn read_bytes<'a>(data: &'a [u8], pos: &mut usize, len: usize) -> LibResult<&'a [u8]> {
    let end = pos.checked_add(len).ok_or_else(|| insufficient("XMF node length overflowed"))?;
    let slice = data.get(*pos..end).ok_or_else(|| insufficient("XMF node body ran past end of file"))?;
    *pos = end;
    Ok(slice)
}

fn insufficient(description: &str) -> LibError {
    LibError::InsufficientInput { site: format!("{}:{}", file!(), line!()), description: description.into() }
}

fn malformed(description: impl Into<String>) -> LibError {
    LibError::Malformed { site: format!("{}:{}", file!(), line!()), description: description.into() }
}

fn unsupported(description: impl Into<String>) -> LibError {
    LibError::Unsupported { site: format!("{}:{}", file!(), line!()), description: description.into() }
}

pub(crate) fn decode(data: &[u8], options: &DecodeOptions) -> LibResult<Container> {
    let mut pos = 4usize; // past "XMF_"
    let version_bytes = read_bytes(data, &mut pos, 4)?;
    let version = String::from_utf8_lossy(version_bytes).to_string();
    let version_number: f64 = version.trim_end_matches('\0').parse().unwrap_or(0.0);

    if version_number >= 2.0 {
        read_bytes(data, &mut pos, 8)?; // XMFFileTypeID + XMFFileTypeRevisionID
    }

    let _file_size = read_vlq(data, &mut pos)?;
    let metadata_types_table_size = read_vlq(data, &mut pos)?;
    if metadata_types_table_size != 0 {
        return Err(unsupported("XMF MetadataTypesTable is not yet supported"));
    }

    let tree_start = read_vlq(data, &mut pos)? as usize;

    let mut state = NodeState { container: None };
    let mut cursor = tree_start;
    process_node(data, &mut cursor, &mut state, options)?;

    let mut container = state.container.ok_or_else(|| malformed("XMF tree contained no SMF resource"))?;
    container.metadata_mut().add(0, "xmf_meta_file_version", version);
    Ok(container)
}

struct NodeState {
    container: Option<Container>,
}

/// Walks one node (file or folder) starting at `*pos`, advancing `*pos`
/// past it so a caller iterating a folder's children can call this
/// repeatedly.
fn process_node(data: &[u8], pos: &mut usize, state: &mut NodeState, options: &DecodeOptions) -> LibResult<()> {
    let header_head = *pos;

    let node_size = read_vlq(data, pos)? as usize;
    let item_count = read_vlq(data, pos)? as usize;
    let header_size = read_vlq(data, pos)? as usize;

    let mut standard_resource_format = StandardResourceFormat::Other;
    let mut unpackers: Vec<Unpacker> = Vec::new();

    // Metadata section: a list of field-specifier/contents pairs. Only the
    // ResourceFormat field affects decoding; everything else is consumed
    // to keep the cursor aligned and otherwise discarded.
    {
        let metadata_size = read_vlq(data, pos)? as usize;
        let metadata_tail = *pos + metadata_size;

        while *pos < metadata_tail {
            let field_name_size = read_vlq(data, pos)? as usize;
            let field_id = if field_name_size == 0 {
                Some(read_vlq(data, pos)?)
            } else {
                read_bytes(data, pos, field_name_size)?;
                None
            };

            let field_contents_count = read_vlq(data, pos)? as usize;
            if field_contents_count == 0 {
                let size = read_vlq(data, pos)? as usize;
                if size > 0 {
                    let format = read_vlq(data, pos)?;
                    let _ = format;
                    let contents = read_bytes(data, pos, size - 1)?;

                    // FieldSpecifierID::ResourceFormat == 3
                    if field_id == Some(3) && contents.len() >= 1 {
                        let mut p = 0usize;
                        let kind = read_vlq(contents, &mut p)?;
                        // ResourceFormatID::Standard == 0
                        if kind == 0 && p < contents.len() {
                            let std_id = read_vlq(contents, &mut p)?;
                            standard_resource_format = StandardResourceFormat::from_u32(std_id);
                        }
                    }
                }
            } else {
                for _ in 0..field_contents_count {
                    let _meta_data_type_id = read_vlq(data, pos)?;
                    let size = read_vlq(data, pos)? as usize;
                    read_bytes(data, pos, size)?;
                }
            }
        }
    }

    // Unpackers section.
    {
        let unpackers_length = read_vlq(data, pos)? as usize;
        let unpackers_tail = *pos + unpackers_length;

        while *pos < unpackers_tail {
            let id = read_vlq(data, pos)?;
            let mut unpacker = Unpacker::default();

            match id {
                0 => {
                    let standard_id = read_vlq(data, pos)?;
                    unpacker.is_zlib = standard_id == 1;
                }
                1 => {
                    let mut manufacturer_id = read_bytes(data, pos, 1)?[0] as u32;
                    if manufacturer_id == 0 {
                        let rest = read_bytes(data, pos, 2)?;
                        manufacturer_id = (manufacturer_id << 16) | ((rest[0] as u32) << 8) | rest[1] as u32;
                    }
                    let _internal_id = read_vlq(data, pos)?;
                }
                _ => return Err(unsupported("unsupported XMF compression algorithm")),
            }

            unpacker.unpacked_size = read_vlq(data, pos)? as usize;
            unpackers.push(unpacker);
        }
    }

    // Reference type: only an in-line resource (the common case for every
    // XMF file this crate has seen) is supported.
    *pos = header_head + header_size;
    let reference_type = read_vlq(data, pos)?;
    if reference_type != 1 {
        return Err(unsupported("unsupported XMF reference type"));
    }
    let resource_offset = *pos;

    if item_count == 0 {
        // File node: its body runs to the end of the node.
        let size = node_size
            .checked_sub(header_size)
            .and_then(|v| v.checked_sub(1))
            .ok_or_else(|| malformed("XMF file node size underflowed its header size"))?;
        let raw = read_bytes(data, pos, size)?;
        let payload = unpack(raw, unpackers.first().copied())?;

        if standard_resource_format.is_smf() && state.container.is_none() {
            state.container = Some(super::smf::decode(&payload, options)?);
        } else if standard_resource_format.is_dls() {
            if let Some(container) = state.container.as_mut() {
                if container.soundfont().is_none() {
                    container.set_soundfont(payload);
                }
            }
        }
    } else {
        // Folder node: walk `item_count` children starting at the
        // in-line resource offset recorded above.
        let mut child_pos = resource_offset;
        for _ in 0..item_count {
            process_node(data, &mut child_pos, state, options)?;
        }
        *pos = header_head + node_size;
    }

    Ok(())
}

fn unpack(data: &[u8], unpacker: Option<Unpacker>) -> LibResult<Vec<u8>> {
    match unpacker {
        Some(u) if u.is_zlib => crate::inflate::inflate(data, u.unpacked_size),
        _ => Ok(data.to_vec()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vlq(mut value: u32) -> Vec<u8> {
        let mut stack = vec![(value & 0x7F) as u8];
        value >>= 7;
        while value > 0 {
            stack.push((value & 0x7F) as u8 | 0x80);
            value >>= 7;
        }
        stack.reverse();
        stack
    }

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
    fn recognizes_magic() {
        assert!(is_xmf(b"XMF_2.00"));
        assert!(!is_xmf(b"XMF"));
    }

    #[test]
    fn decodes_inline_smf_resource() {
        // Build the tree bytes first so TreeStart can point at an exact offset.
        let smf = smf_bytes();

        let mut resource_format_contents = Vec::new();
        resource_format_contents.extend(vlq(0));
        resource_format_contents.extend(vlq(0));

        let mut metadata = Vec::new();
        metadata.extend(vlq(0));
        metadata.extend(vlq(3));
        metadata.extend(vlq(0));
        metadata.extend(vlq((resource_format_contents.len() + 1) as u32));
        metadata.extend(vlq(0));
        metadata.extend(resource_format_contents);

        let mut header = Vec::new();
        header.extend(vlq(metadata.len() as u32));
        header.extend(metadata);
        header.extend(vlq(0)); // empty unpackers section
        // HeaderSize is relative to the node's own start, so it must also
        // account for the three leading header VLQs (node_size, item_count,
        // and header_size itself) — each 1 byte here since every value is
        // small.
        let header_size = 3 + header.len();

        let mut node = Vec::new();
        node.extend(header);
        node.extend(vlq(1)); // in-line reference
        node.extend_from_slice(&smf);
        // NodeSize is also relative to the node's own start: the three
        // leading header VLQs plus everything in `node`.
        let node_size = 3 + node.len();

        let mut tree = Vec::new();
        tree.extend(vlq(node_size as u32));
        tree.extend(vlq(0));
        tree.extend(vlq(header_size as u32));
        tree.extend(node);

        let mut prefix = Vec::new();
        prefix.extend_from_slice(b"XMF_");
        prefix.extend_from_slice(b"1.00");
        prefix.extend(vlq(0)); // File.Size
        prefix.extend(vlq(0)); // MetadataTypesTable size

        let tree_start = prefix.len() + 1; // +1 for the TreeStart VLQ byte itself
        prefix.extend(vlq(tree_start as u32));

        let mut bytes = prefix;
        bytes.extend(tree);

        let container = decode(&bytes, &DecodeOptions::default()).unwrap();
        assert_eq!(1, container.track_count());
    }
}
