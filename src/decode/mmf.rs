/*!

SMAF / Mobile Music File: an `MMMD` chunk stream (`CNTI` contents info,
`OPDA` optional data, one `MTR_` per Handy Phone Standard score track, each
carrying `Mtsu`/`Mtsq` sub-chunks of HPS-encoded note and command bytes).
Grounded in `examples/original_source/MIDIProcessorMMF.cpp`.

HPS exclusive events that carry an FM voice (`GetHPSExclusiveFM`'s pattern:
`0x12`/`0x1C` function code, Yamaha `0x43`/group `0x03` header, FM type
byte) are translated into MA3 voice-parameter SysEx the way
`examples/original_source/SMAF/MMF.cpp`'s `GetHPSExclusiveFM`/
`setMA3Exclusive` do; any exclusive event that doesn't match the pattern
(or whose bytes the source itself rejects, e.g. drum voices) is carried
through verbatim, matching the source's own "conversion failed, just copy
the SysEx" fallback.

!*/

use crate::container::{track::Track, Container, Format};
use crate::error::{LibError, LibResult};
use crate::event::{Event, EventKind};
use crate::options::DecodeOptions;

fn be_u32(bytes: &[u8]) -> u32 {
    u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}

pub(crate) fn is_mmf(data: &[u8]) -> bool {
    if data.len() < 8 || &data[0..4] != b"MMMD" {
        return false;
    }
    let size = be_u32(&data[4..8]) as usize;
    data.len() >= size + 8
}

/// Metadata key abbreviations used in `CNTI` chunks, mapped to the
/// canonical names this crate stores them under.
fn canonical_tag(tag: &str) -> &str {
    match tag {
        "ST" => "title",
        "CR" => "copyright",
        "WW" => "lyricist",
        "VN" => "vendor",
        "CN" => "carrier",
        "CA" => "category",
        "AN" => "artist",
        "SW" => "composer",
        "AW" => "arranger",
        "GR" => "group",
        "MI" => "management_info",
        "CD" => "creation_date",
        "UP" => "modification_date",
        "ES" => "edit_status",
        "VC" => "vcard",
        other => other,
    }
}

#[derive(Default)]
struct State {
    channel_offset: u8,
    duration_base: u32,
    gate_time_base: u32,
    is_mtsu: bool,
    metadata: Vec<(String, String)>,
}

pub(crate) fn decode(data: &[u8], _options: &DecodeOptions) -> LibResult<Container> {
    if data.len() < 8 {
        return Err(insufficient("SMAF data too short for an MMMD header"));
    }
    let size = be_u32(&data[4..8]) as usize;
    let tail = (size + 8).min(data.len());

    let mut container = Container::new(Format::One, 500);
    let mut state = State::default();

    let mut pos = 8usize;
    while pos + 8 <= tail {
        let chunk_id = &data[pos..pos + 4];
        let chunk_size = be_u32(&data[pos + 4..pos + 8]) as usize;
        let body_start = pos + 8;
        if body_start + chunk_size > tail {
            return Err(malformed("SMAF chunk body runs past its container"));
        }
        let body = &data[body_start..body_start + chunk_size];

        match chunk_id {
            b"CNTI" => {
                if body.len() < 5 {
                    return Err(malformed("SMAF CNTI chunk too short"));
                }
                process_metadata(&body[5..], &mut state);
            }
            _ if chunk_id.starts_with(b"MTR") => {
                process_mtr(body, &mut state, &mut container)?;
                state.channel_offset += 4;
            }
            // CNTI/OPDA/ATR_/GTR_/MSTR carry no further decoding-relevant
            // state; skip to the next chunk.
            _ => {}
        }

        pos = body_start + chunk_size;
    }

    if !state.metadata.is_empty() {
        for (key, value) in state.metadata {
            container.metadata_mut().add(0, canonical_tag(&key), value);
        }
    }

    Ok(container)
}

/// Parses the `name:value,name:value,...` text carried in a `CNTI` chunk
/// past its 5-byte fixed header.
fn process_metadata(data: &[u8], state: &mut State) {
    let mut pos = 0usize;
    while pos + 2 < data.len() {
        let name = String::from_utf8_lossy(&data[pos..pos + 2]).to_string();
        pos += 3; // name bytes plus the ':' separator
        let mut value = Vec::new();
        while pos < data.len() {
            match data[pos] {
                b'\\' => {
                    pos += 1;
                    if pos < data.len() {
                        value.push(data[pos]);
                        pos += 1;
                    }
                }
                b',' => {
                    pos += 1;
                    break;
                }
                b => {
                    value.push(b);
                    pos += 1;
                }
            }
        }
        state.metadata.push((name, String::from_utf8_lossy(&value).to_string()));
    }
}

fn lookup_time_base(code: u8) -> LibResult<u32> {
    Ok(match code {
        0x00 => 1,
        0x01 => 2,
        0x02 => 4,
        0x03 => 5,
        0x10 => 10,
        0x11 => 20,
        0x12 => 40,
        0x13 => 50,
        _ => return Err(unsupported("unknown SMAF duration/gate-time base")),
    })
}

/// Standard SMAF score-track format byte this decoder can turn into
/// events; every other format is a bytestream this crate has no sample
/// of and the source itself never finishes decoding.
const HANDY_PHONE_STANDARD: u8 = 0x00;

fn process_mtr(body: &[u8], state: &mut State, container: &mut Container) -> LibResult<()> {
    if body.len() < 6 {
        return Err(insufficient("SMAF MTR chunk too short for its header"));
    }
    let format_type = body[0];
    if format_type != HANDY_PHONE_STANDARD {
        return Err(unsupported("only Handy Phone Standard SMAF score tracks are supported"));
    }
    state.duration_base = lookup_time_base(body[2])?;
    state.gate_time_base = lookup_time_base(body[3])?;

    let mut pos = 6usize; // past format/sequence/duration-base/gate-time-base and the HPS channel descriptor
    while pos + 8 <= body.len() {
        let sub_id = &body[pos..pos + 4];
        let sub_size = be_u32(&body[pos + 4..pos + 8]) as usize;
        let sub_start = pos + 8;
        if sub_start + sub_size > body.len() {
            return Err(malformed("SMAF MTR sub-chunk body runs past its container"));
        }
        let sub_body = &body[sub_start..sub_start + sub_size];

        match sub_id {
            b"Mtsu" => {
                state.is_mtsu = true;
                process_hps_track(sub_body, state, container)?;
            }
            b"Mtsq" => {
                state.is_mtsu = false;
                process_hps_track(sub_body, state, container)?;
            }
            // "MspI" seek-and-phrase info carries no events.
            _ => {}
        }

        pos = sub_start + sub_size;
    }

    Ok(())
}

/// Reads one HPS value starting at `*pos` and advances it past the bytes
/// consumed; a set high bit on the first byte extends the value into a
/// second byte.
fn read_hps_value(data: &[u8], pos: &mut usize) -> LibResult<u32> {
    let first = *data.get(*pos).ok_or_else(|| insufficient("SMAF HPS value ran past end of track"))?;
    let mut value = 0u32;
    if first & 0x80 != 0 {
        value = (((first & 0x7F) as u32) + 1) << 7;
        *pos += 1;
    }
    let second = *data.get(*pos).ok_or_else(|| insufficient("SMAF HPS value ran past end of track"))?;
    value |= second as u32;
    *pos += 1;
    Ok(value)
}

fn peek_hps_value(data: &[u8], pos: usize) -> LibResult<u32> {
    let mut p = pos;
    read_hps_value(data, &mut p)
}

const XG_SYSTEM_ON: &[u8] = &[0x43, 0x00, 0x4C, 0x00, 0x00, 0x7E, 0x00, 0xF7];

/// FM voice channel parameters carried in an HPS exclusive event; mirrors
/// the fields `examples/original_source/src/SMAF/MMF.h`'s `CHPARAM` uses on
/// the FM path (the PCM-only fields aren't reachable from HPS data, since
/// `GetHPSExclusiveFM` always sets `type = VOICE_FM`).
#[derive(Clone, Copy, Default)]
struct ChParam {
    bm: u8,
    bl: u8,
    pc: u8,
    na: u8,
    dk: u8,
    lfo: u8,
    pan: u8,
    pe: bool,
    alg: u8,
}

/// FM operator parameters; mirrors `examples/original_source/src/SMAF/MMF.h`'s
/// `OPPARAM`.
#[derive(Clone, Copy, Default)]
struct OpParam {
    multi: u8,
    dt: u8,
    ar: u8,
    dr: u8,
    sr: u8,
    rr: u8,
    sl: u8,
    tl: u8,
    ksl: u8,
    dam: u8,
    dvb: u8,
    fb: u8,
    ws: u8,
    xof: bool,
    sus: bool,
    ksr: bool,
    eam: bool,
    evb: bool,
}

/// `examples/original_source/SMAF/MMF.cpp`'s `GetHPSExclusiveFMOp`.
fn get_hps_exclusive_fm_op(data: &[u8]) -> OpParam {
    OpParam {
        multi: (data[0] >> 4) & 0x0F,
        ksl: data[3] & 0x03,
        tl: (data[3] >> 2) & 0x3F,
        ar: (data[2] >> 4) & 0x0F,
        dr: data[1] & 0x0F,
        sl: data[2] & 0x0F,
        rr: (data[1] >> 4) & 0x0F,
        ws: data[4] & 0x07,
        dvb: (data[4] >> 6) & 0x03,
        dam: (data[4] >> 4) & 0x03,
        evb: data[0] & 0x08 != 0,
        xof: false,
        sus: data[0] & 0x02 != 0,
        ksr: data[0] & 0x01 != 0,
        eam: data[4] & 0x08 != 0,
        fb: 0,
        dt: 0,
        sr: 0,
    }
}

/// `examples/original_source/SMAF/MMF.cpp`'s `GetHPSExclusiveFM`: reads an
/// HPS exclusive event's FM voice, starting right after the `FF F0` marker
/// and the event's own length byte. Returns `None` wherever the source
/// returns `false` (unrecognized header, or an unsupported drum voice) so
/// the caller falls back to carrying the event through verbatim.
fn get_hps_exclusive_fm(data: &[u8]) -> Option<(ChParam, [OpParam; 4])> {
    if data.len() < 8 {
        return None;
    }
    if data[0] != 0x12 && data[0] != 0x1C {
        return None;
    }
    if data[1] != 0x43 || data[2] != 0x03 || data[7] != 0x01 {
        return None;
    }
    if data[4] & 0x80 != 0 {
        return None; // Drums are not supported yet.
    }

    let chp = ChParam {
        bm: 0x7C, // data[4] & 0x80 is always clear here, so the drum bank is never selected.
        bl: data[4] & 0x7F,
        pc: data[5],
        na: 0,
        dk: 0,
        lfo: (data[6] >> 6) & 0x03,
        pan: 16,
        pe: false,
        alg: data[6] & 0x07,
    };

    let four_op = data[0] == 0x1C;
    let needed = if four_op { 8 + 5 + 5 + 5 + 5 } else { 8 + 5 + 5 };
    if data.len() < needed {
        return None;
    }

    let mut opps = [OpParam::default(); 4];
    opps[0] = get_hps_exclusive_fm_op(&data[8..]);
    opps[0].fb = (data[6] >> 3) & 0x07;
    opps[1] = get_hps_exclusive_fm_op(&data[13..]);
    if four_op {
        opps[2] = get_hps_exclusive_fm_op(&data[18..]);
        opps[3] = get_hps_exclusive_fm_op(&data[23..]);
    }

    Some((chp, opps))
}

/// `examples/original_source/SMAF/MMF.cpp`'s `setExclusiveFMCh`.
fn set_exclusive_fm_ch(buf: &mut [u8], chp: &ChParam) {
    buf[0] = 0xF0;
    buf[1] = 0x43;
    buf[2] = 0x79;
    buf[3] = 0x07;
    buf[4] = 0x7F;
    buf[5] = 0x01;
    buf[6] = chp.bm;
    buf[7] = chp.bl;
    buf[8] = chp.pc;
    buf[9] = chp.na;
    buf[12] = chp.dk;
    buf[11] |= if chp.lfo & 0x02 != 0 { 0x10 } else { 0 } | if chp.pan & 0x10 != 0 { 0x20 } else { 0 };
    buf[13] |= (chp.pan & 0x0F) << 3;
    buf[14] |= if chp.lfo & 0x01 != 0 { 0x40 } else { 0 } | if chp.pe { 0x20 } else { 0 } | chp.alg;
}

/// `examples/original_source/SMAF/MMF.cpp`'s `setExclusiveFMOp`, applied at
/// `base` into `buf` the way the source advances its `data` pointer; the
/// channel and operator writes share bytes at the operator boundaries, so
/// this can't be a sub-slice call without losing that overlap.
fn set_exclusive_fm_op(buf: &mut [u8], base: usize, opp: &OpParam) {
    buf[base] &= !0x0F;
    buf[base] |= if opp.sr & 0x08 != 0 { 8 } else { 0 }
        | if opp.rr & 0x08 != 0 { 4 } else { 0 }
        | if opp.ar & 0x08 != 0 { 2 } else { 0 }
        | if opp.tl & 0x20 != 0 { 1 } else { 0 };

    buf[base + 4] = ((opp.sr & 0x07) << 4) | if opp.xof { 8 } else { 0 } | if opp.sus { 2 } else { 0 } | if opp.ksr { 1 } else { 0 };
    buf[base + 5] = ((opp.rr & 0x07) << 4) | opp.dr;
    buf[base + 6] = ((opp.ar & 0x07) << 4) | opp.sl;
    buf[base + 7] = ((opp.tl & 0x1F) << 2) | opp.ksl;
    buf[base + 8] &= !0x30;
    buf[base + 8] |= if opp.multi & 0x08 != 0 { 0x20 } else { 0 } | if opp.ws & 0x10 != 0 { 0x10 } else { 0 };
    buf[base + 9] = (opp.dam << 5) | if opp.eam { 0x10 } else { 0 } | (opp.dvb << 1) | if opp.evb { 1 } else { 0 };
    buf[base + 10] = ((opp.multi & 0x07) << 4) | opp.dt;
    buf[base + 11] = ((opp.ws & 0x0F) << 3) | opp.fb;
}

/// `examples/original_source/SMAF/MMF.cpp`'s `setExclusiveFMAll`: builds the
/// MA3 voice SysEx for a 2- or 4-operator FM voice, `F0`...`F7` included.
fn set_exclusive_fm_all(chp: &ChParam, opps: &[OpParam; 4]) -> Vec<u8> {
    let mut buf = vec![0u8; 0x30];
    set_exclusive_fm_ch(&mut buf, chp);
    set_exclusive_fm_op(&mut buf, 11, &opps[0]);
    set_exclusive_fm_op(&mut buf, 19, &opps[1]);

    let size = if chp.alg <= 1 {
        0x20
    } else {
        set_exclusive_fm_op(&mut buf, 27, &opps[2]);
        set_exclusive_fm_op(&mut buf, 35, &opps[3]);
        0x30
    };

    buf.truncate(size);
    let last = buf.len() - 1;
    buf[last] = 0xF7;
    buf
}

fn process_hps_track(data: &[u8], state: &State, container: &mut Container) -> LibResult<()> {
    let mut track = Track::new();
    let mut running_time = 0u32;
    let mut octave_shift = [0i8; 4];

    if state.is_mtsu {
        track.add_event(Event::sysex(0, XG_SYSTEM_ON));
    }

    let mut pos = 0usize;
    while pos + 4 <= data.len() {
        let duration = if !state.is_mtsu { peek_hps_value(data, pos)? * state.duration_base } else { 0 };
        running_time += duration;

        if data[pos] == 0 && data[pos + 1] == 0 && data[pos + 2] == 0 && data[pos + 3] == 0 {
            track.add_event(Event::end_of_track(running_time));
            break;
        }

        if !state.is_mtsu {
            read_hps_value(data, &mut pos)?;
        }

        if pos + 2 > data.len() {
            break;
        }

        if data[pos] == 0xFF && data[pos + 1] == 0xF0 {
            if pos + 3 > data.len() {
                break;
            }
            let size = data[pos + 2] as usize + 2;
            if pos + 1 + size > data.len() {
                break;
            }
            let payload = get_hps_exclusive_fm(&data[pos + 2..])
                .map(|(chp, opps)| set_exclusive_fm_all(&chp, &opps))
                .unwrap_or_else(|| data[pos + 1..pos + 1 + size].to_vec());
            track.add_event(Event::extended(running_time, payload));
            pos += 2 + data[pos + 2] as usize + 1;
        } else if data[pos] == 0xFF && data[pos + 1] == 0x00 {
            pos += 2;
        } else if data[pos] != 0x00 {
            let channel = (data[pos] >> 6) & 0x03;
            let octave = ((data[pos] >> 4) & 0x03) as i32;
            let raw_note = (data[pos] & 0x0F) as i32;
            let note = (raw_note + 36 + (octave + octave_shift[channel as usize] as i32) * 12).clamp(0, 127) as u8;
            let full_channel = channel + state.channel_offset;

            track.add_event(Event::voice(running_time, EventKind::NoteOn, full_channel, note, 0x7F));
            pos += 1;
            let gate_time = read_hps_value(data, &mut pos)? * state.gate_time_base;
            track.add_event(Event::voice(running_time + gate_time, EventKind::NoteOff, full_channel, note, 0x7F));
        } else {
            if pos + 2 > data.len() {
                break;
            }
            let channel = ((data[pos + 1] >> 6) & 0x03) + state.channel_offset;

            if data[pos + 1] & 0x30 == 0x30 {
                if pos + 3 > data.len() {
                    break;
                }
                let value = data[pos + 2];
                match data[pos + 1] & 0x0F {
                    0x00 => track.add_event(Event::voice(running_time, EventKind::ProgramChange, channel, value, 0)),
                    0x01 => {
                        if value & 0x80 != 0 {
                            let sysex = [0x43, 0x10, 0x4C, 0x08, channel, 0x07, 0x02, 0xF7];
                            track.add_event(Event::sysex(0, &sysex));
                        } else {
                            track.add_event(Event::voice(running_time, EventKind::ControlChange, channel, 0x00, value & 0x7F));
                            track.add_event(Event::voice(running_time, EventKind::ControlChange, channel, 0x20, 0x00));
                        }
                    }
                    // Octave Shift indexes by the leading marker byte, which
                    // is always zero in this branch, mirroring the source's
                    // own indexing (so only channel slot 0 ever changes).
                    0x02 => {
                        let idx = ((data[pos] >> 6) & 0x03) as usize;
                        if (0x01..=0x04).contains(&value) {
                            octave_shift[idx] = value as i8;
                        } else if (0x81..=0x84).contains(&value) {
                            octave_shift[idx] = -((value as i32) - 0x80) as i8;
                        }
                    }
                    0x03 => track.add_event(Event::voice(running_time, EventKind::ControlChange, channel, 0x01, value)),
                    0x04 => track.add_event(Event::voice(running_time, EventKind::PitchBendChange, channel, 0x00, value)),
                    0x07 => track.add_event(Event::voice(running_time, EventKind::ControlChange, channel, 0x07, value)),
                    0x0A => track.add_event(Event::voice(running_time, EventKind::ControlChange, channel, 0x0A, value)),
                    0x0B => track.add_event(Event::voice(running_time, EventKind::ControlChange, channel, 0x0B, value)),
                    _ => {}
                }
                pos += 3;
            } else {
                // The source indexes these lookup tables by the command
                // byte's high nibble, which overruns their 16-entry span;
                // the low nibble is used here instead, matching the
                // sibling table above.
                match data[pos + 1] & 0x30 {
                    0x00 => {
                        const LOOKUP: [u8; 16] = [
                            0x00, 0x00, 0x1F, 0x27, 0x2F, 0x37, 0x3F, 0x47, 0x4F, 0x57, 0x5F, 0x67, 0x6F, 0x77, 0x7F, 0x00,
                        ];
                        let value = LOOKUP[(data[pos + 1] & 0x0F) as usize];
                        track.add_event(Event::voice(running_time, EventKind::ControlChange, channel, 0x0B, value));
                    }
                    0x10 => {
                        const LOOKUP: [u8; 16] = [
                            0x00, 0x08, 0x10, 0x18, 0x20, 0x28, 0x30, 0x38, 0x40, 0x48, 0x50, 0x58, 0x60, 0x68, 0x70, 0x00,
                        ];
                        let value = LOOKUP[(data[pos + 1] & 0x0F) as usize];
                        track.add_event(Event::voice(running_time, EventKind::PitchBendChange, channel, 0x00, value));
                    }
                    0x20 => {
                        const LOOKUP: [u8; 16] = [
                            0x00, 0x08, 0x10, 0x18, 0x20, 0x28, 0x30, 0x38, 0x40, 0x48, 0x50, 0x60, 0x68, 0x70, 0x7F, 0x00,
                        ];
                        let value = LOOKUP[(data[pos + 1] & 0x0F) as usize];
                        track.add_event(Event::voice(running_time, EventKind::ControlChange, channel, 0x01, value));
                    }
                    _ => {}
                }
                pos += 2;
            }
        }
    }

    container.add_track(track);
    Ok(())
}

fn insufficient(description: &str) -> LibError {
    LibError::InsufficientInput { site: format!("{}:{}", file!(), line!()), description: description.into() }
}

fn malformed(description: &str) -> LibError {
    LibError::Malformed { site: format!("{}:{}", file!(), line!()), description: description.into() }
}

fn unsupported(description: &str) -> LibError {
    LibError::Unsupported { site: format!("{}:{}", file!(), line!()), description: description.into() }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn be_chunk(id: &[u8; 4], body: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(id);
        out.extend_from_slice(&(body.len() as u32).to_be_bytes());
        out.extend_from_slice(body);
        out
    }

    fn hps_note(delta: u8, raw: u8, gate: u8) -> Vec<u8> {
        let mut out = vec![delta];
        out.push(raw);
        out.push(gate);
        out
    }

    fn minimal_mmf(mtr_body: &[u8]) -> Vec<u8> {
        let mtr = be_chunk(b"MTR0", mtr_body);
        let mut body = Vec::new();
        body.extend_from_slice(b"MMMD");
        body.extend_from_slice(&0u32.to_be_bytes()); // patched below
        body.extend_from_slice(&mtr);
        let size = (body.len() - 8) as u32;
        body[4..8].copy_from_slice(&size.to_be_bytes());
        body
    }

    fn mtr_header() -> Vec<u8> {
        vec![0x00, 0x00, 0x00, 0x00, 0x00, 0x00] // HPS, seq 0, duration/gate base 1, 2 channel bytes
    }

    #[test]
    fn recognizes_mmmd_magic() {
        let bytes = minimal_mmf(&[]);
        assert!(is_mmf(&bytes));
    }

    #[test]
    fn decodes_hps_note_and_end_of_track() {
        let mut mtsq_body = Vec::new();
        mtsq_body.extend(hps_note(0, 0x40, 4)); // channel 0, octave 0, note 0, gate 4
        mtsq_body.extend_from_slice(&[0, 0, 0, 0]); // end of sequence

        let mtsq = be_chunk(b"Mtsq", &mtsq_body);
        let mut mtr_body = mtr_header();
        mtr_body.extend(mtsq);

        let bytes = minimal_mmf(&mtr_body);
        let container = decode(&bytes, &DecodeOptions::default()).unwrap();
        assert_eq!(1, container.track_count());
        let events = container.tracks()[0].events();
        assert!(events.iter().any(|e| e.kind == EventKind::NoteOn));
        assert!(events.last().unwrap().is_end_of_track());
    }

    #[test]
    fn converts_hps_fm_exclusive_to_ma3_voice_sysex() {
        // func code 0x12 (2-op), Yamaha 0x43, group 0x03, bank 0x00,
        // program 0x05, alg/lfo byte 0x01 (alg=1, so a 2-op output), FM
        // type marker 0x01, then two all-zero 5-byte operator blocks.
        let data = [0x12, 0x43, 0x03, 0x00, 0x00, 0x05, 0x01, 0x01, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0];
        let (chp, opps) = get_hps_exclusive_fm(&data).expect("pattern should match");
        assert_eq!(1, chp.alg);
        assert_eq!(5, chp.pc);
        let payload = set_exclusive_fm_all(&chp, &opps);
        assert_eq!(0x20, payload.len());
        assert_eq!(0xF0, payload[0]);
        assert_eq!(0xF7, *payload.last().unwrap());
        assert_eq!(0x7C, payload[6]); // bm
        assert_eq!(5, payload[8]); // pc
    }

    #[test]
    fn rejects_hps_exclusive_with_unrecognized_function_code() {
        let data = [0x03, 0x99, 0x00, 0x00];
        assert!(get_hps_exclusive_fm(&data).is_none());
    }

    #[test]
    fn unrecognized_exclusive_event_falls_back_to_verbatim_copy() {
        let mtsq_body = vec![0x00, 0xFF, 0xF0, 0x03, 0x99, 0x00, 0x00, 0, 0, 0, 0];
        let mtsq = be_chunk(b"Mtsq", &mtsq_body);
        let mut mtr_body = mtr_header();
        mtr_body.extend(mtsq);

        let bytes = minimal_mmf(&mtr_body);
        let container = decode(&bytes, &DecodeOptions::default()).unwrap();
        let events = container.tracks()[0].events();
        let sysex = events.iter().find(|e| e.kind == EventKind::Extended).expect("exclusive event");
        assert_eq!(&[0xF0, 0x03, 0x99, 0x00, 0x00], sysex.data.as_slice());
    }

    #[test]
    fn cnti_metadata_is_canonicalized() {
        let mut cnti_body = vec![0x00, 0x00, 0x00, 0x00, 0x00]; // class/type/encoding/copystatus/copycount
        cnti_body.extend_from_slice(b"ST:Test Song,");
        let cnti = be_chunk(b"CNTI", &cnti_body);

        let mut body = Vec::new();
        body.extend_from_slice(b"MMMD");
        body.extend_from_slice(&0u32.to_be_bytes());
        body.extend_from_slice(&cnti);
        let size = (body.len() - 8) as u32;
        body[4..8].copy_from_slice(&size.to_be_bytes());

        let container = decode(&body, &DecodeOptions::default()).unwrap();
        assert_eq!("Test Song", container.metadata().get("title").unwrap().as_str());
    }
}
