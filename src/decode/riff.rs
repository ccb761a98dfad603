/*!

RIFF/RMID: a `data` chunk holding an embedded SMF, `DISP` for a display
name, `LIST INFO` for tagged metadata (code page declared by an `IENC`
sub-chunk), and nested `RIFF sfbk`/`RIFF DLS ` chunks captured as an
embedded SoundFont. Grounded in
`examples/original_source/MIDIProcessorRIFF.cpp`.

!*/

use crate::byte_iter::ByteCursor;
use crate::constants::cc;
use crate::container::Container;
use crate::encoding::decode_riff_text;
use crate::error::{LibError, LibResult};
use crate::options::DecodeOptions;

/// Maps a RIFF `LIST INFO` tag to the canonical metadata name this crate
/// stores it under.
fn canonical_tag(id: &str) -> &str {
    match id {
        "IALB" => "album",
        "IARL" => "archival_location",
        "IART" => "artist",
        "ITRK" => "tracknumber",
        "ICMS" => "commissioned",
        "ICMP" => "composer",
        "ICMT" => "comment",
        "ICOP" => "copyright",
        "ICRD" => "creation_date",
        "IENC" => "encoding",
        "IENG" => "engineer",
        "IGNR" => "genre",
        "IKEY" => "keywords",
        "IMED" => "medium",
        "INAM" => "title",
        "IPRD" => "product",
        "ISBJ" => "subject",
        "ISFT" => "software",
        "ISRC" => "source",
        "ISRF" => "source_form",
        "ITCH" => "technician",
        other => other,
    }
}

pub(crate) fn is_riff(data: &[u8]) -> bool {
    if data.len() < 20 || &data[0..4] != b"RIFF" {
        return false;
    }
    let size = u32::from_le_bytes([data[4], data[5], data[6], data[7]]) as usize;
    if size < 12 || data.len() < size + 8 {
        return false;
    }
    if &data[8..12] != b"RMID" || &data[12..16] != b"data" {
        return false;
    }
    let data_size = u32::from_le_bytes([data[16], data[17], data[18], data[19]]) as usize;
    if data_size < 18 || data.len() < data_size + 20 || size < data_size + 12 {
        return false;
    }
    super::smf::is_smf(&data[20..(20 + 18).min(data.len())])
}

pub(crate) fn decode(data: &[u8], options: &DecodeOptions) -> LibResult<Container> {
    let size = u32::from_le_bytes([data[4], data[5], data[6], data[7]]) as usize;
    let tail = (8 + size).min(data.len());

    let mut container: Option<Container> = None;
    let mut found_info = false;
    let mut cursor = ByteCursor::new(&data[..tail]);
    // Skip the outer `RIFF`/size/`RMID` header; the chunk loop below starts
    // at the first real sub-chunk.
    cursor.read_n(12).map_err(cursor_err)?;

    while !cursor.is_end() {
        if cursor.remaining() < 8 {
            return Err(malformed("RIFF chunk header truncated"));
        }
        let chunk_id = std::str::from_utf8(cursor.read_n(4).map_err(cursor_err)?)
            .map_err(|_| malformed("non-UTF8 RIFF chunk id"))?
            .to_string();
        let chunk_size = cursor.read_u32_le().map_err(cursor_err)? as usize;
        if cursor.remaining() < chunk_size {
            return Err(malformed("RIFF chunk body runs past its container"));
        }

        match chunk_id.as_str() {
            "data" => {
                if container.is_some() {
                    return Err(malformed("multiple RIFF data chunks"));
                }
                let body = cursor.read_n(chunk_size).map_err(cursor_err)?;
                container = Some(super::smf::decode(body, options)?);
            }
            "DISP" => {
                let body = cursor.read_n(chunk_size).map_err(cursor_err)?;
                if body.len() >= 4 {
                    let cf_type = u32::from_le_bytes([body[0], body[1], body[2], body[3]]);
                    const CF_TEXT: u32 = 1;
                    if cf_type == CF_TEXT {
                        if let Some(container) = container.as_mut() {
                            let name = String::from_utf8_lossy(&body[4..]).trim_end_matches('\0').to_string();
                            container.metadata_mut().add(0, "display_name", name);
                        }
                    }
                }
            }
            "LIST" => {
                let body = cursor.read_n(chunk_size).map_err(cursor_err)?;
                if body.len() < 4 || &body[0..4] != b"INFO" {
                    return Err(malformed("unsupported RIFF LIST sub-type"));
                }
                if found_info {
                    return Err(malformed("multiple RIFF LIST INFO chunks"));
                }
                found_info = true;
                decode_info_list(&body[4..], container.as_mut());
            }
            "RIFF" => {
                let body = cursor.read_n(chunk_size).map_err(cursor_err)?;
                if body.len() >= 4 && (&body[0..4] == b"sfbk" || &body[0..4] == b"DLS ") {
                    if let Some(container) = container.as_mut() {
                        let mut blob = Vec::with_capacity(8 + chunk_size);
                        blob.extend_from_slice(b"RIFF");
                        blob.extend_from_slice(&(chunk_size as u32).to_le_bytes());
                        blob.extend_from_slice(body);
                        container.set_soundfont(blob);
                        if &body[0..4] == b"DLS " {
                            apply_dls_bank_offset(container);
                        }
                    }
                }
            }
            _ => {
                cursor.read_n(chunk_size).map_err(cursor_err)?;
            }
        }

        if chunk_size % 2 == 1 && cursor.position() < tail {
            cursor.read_or_die().map_err(cursor_err)?;
        }
    }

    container.ok_or_else(|| LibError::Malformed {
        site: format!("{}:{}", file!(), line!()),
        description: "RIFF file had no data chunk".into(),
    })
}

/// A DLS sound font defaults the bank offset to 0, raised to 1 only if
/// any Bank-Select MSB observed in the sequence is non-zero and not 127
/// (the GM-2 "use default bank" sentinel).
fn apply_dls_bank_offset(container: &mut Container) {
    let nonstandard_bank_seen = container.tracks().iter().any(|t| {
        t.events()
            .iter()
            .any(|e| matches!(e.is_control_change(cc::BANK_SELECT_MSB), Some(v) if v != 0 && v != 127))
    });
    if nonstandard_bank_seen {
        container.set_bank_offset(1);
    }
}

fn decode_info_list(body: &[u8], mut container: Option<&mut Container>) {
    let code_page = find_code_page(body);
    let mut product_name: Option<String> = None;
    let mut found_ialb = false;

    let mut offset = 0usize;
    while offset + 8 <= body.len() {
        let id = match std::str::from_utf8(&body[offset..offset + 4]) {
            Ok(s) => s,
            Err(_) => break,
        };
        let value_size = u32::from_le_bytes([body[offset + 4], body[offset + 5], body[offset + 6], body[offset + 7]]) as usize;
        if offset + 8 + value_size > body.len() {
            break;
        }
        let value_bytes = &body[offset + 8..offset + 8 + value_size];

        match id {
            "IENC" => {}
            "IPIC" => {
                if let Some(container) = container.as_deref_mut() {
                    container.metadata_mut().set_cover_art(value_bytes.to_vec());
                }
            }
            "DBNK" if value_size == 2 => {
                if let Some(container) = container.as_deref_mut() {
                    container.set_bank_offset(u16::from_le_bytes([value_bytes[0], value_bytes[1]]) as i32);
                }
            }
            _ => {
                if id == "IALB" {
                    found_ialb = true;
                }
                let text = decode_riff_text(value_bytes, code_page).as_str().to_string();
                if id == "IPRD" {
                    product_name = Some(text.clone());
                }
                if let Some(container) = container.as_deref_mut() {
                    container.metadata_mut().add(0, canonical_tag(id), text);
                }
            }
        }

        offset += 8 + value_size;
        if value_size % 2 == 1 {
            offset += 1;
        }
    }

    if !found_ialb {
        if let (Some(name), Some(container)) = (product_name, container.as_deref_mut()) {
            if !name.is_empty() {
                container.metadata_mut().add(0, "album", name);
            }
        }
    }
}

fn find_code_page(body: &[u8]) -> Option<u32> {
    let mut offset = 0usize;
    while offset + 8 <= body.len() {
        let id = std::str::from_utf8(&body[offset..offset + 4]).ok()?;
        let value_size = u32::from_le_bytes([body[offset + 4], body[offset + 5], body[offset + 6], body[offset + 7]]) as usize;
        if offset + 8 + value_size > body.len() {
            return None;
        }
        if id == "IENC" {
            let text = String::from_utf8_lossy(&body[offset + 8..offset + 8 + value_size]).to_lowercase();
            return code_page_from_encoding_name(&text);
        }
        offset += 8 + value_size;
        if value_size % 2 == 1 {
            offset += 1;
        }
    }
    None
}

fn code_page_from_encoding_name(name: &str) -> Option<u32> {
    if name.contains("437") {
        Some(437)
    } else if name.contains("sjis") || name.contains("shift") {
        Some(932)
    } else {
        None
    }
}

fn cursor_err(source: crate::byte_iter::ByteError) -> LibError {
    LibError::Cursor { site: format!("{}:{}", file!(), line!()), source }
}

fn malformed(description: &str) -> LibError {
    LibError::Malformed { site: format!("{}:{}", file!(), line!()), description: description.into() }
}
