/*!

Expansion of RCP's parameterized user SysEx templates (opcodes in the
`0xA0..=0xBF` range that reference one of the file's stored command
templates) into literal SysEx bytes. Grounded in
`examples/original_source/rcpdump/240511-01/RCP.cpp`'s
`ProcessRCPSysEx`: the template bytes are copied through verbatim except
for a handful of escape codes that pull in the command's two parameter
bytes, the current channel, or a running checksum.

!*/

const ESCAPE_PARAM1: u8 = 0x80;
const ESCAPE_PARAM2: u8 = 0x81;
const ESCAPE_CHANNEL: u8 = 0x82;
const ESCAPE_CHECKSUM_RESET: u8 = 0x83;
const ESCAPE_CHECKSUM_EMIT: u8 = 0x84;
const ESCAPE_TERMINATE: u8 = 0xF7;

/// Expands `template_bytes` (a command template as stored in the RCP
/// file's SysEx template table) against `param1`/`param2`/`channel`,
/// returning the literal SysEx payload (not including the leading 0xF0,
/// which the caller supplies).
pub(super) fn expand(template_bytes: &[u8], param1: u8, param2: u8, channel: u8) -> Vec<u8> {
    let mut out = Vec::with_capacity(template_bytes.len());
    let mut checksum: u8 = 0;
    let mut checksum_active = false;

    for &b in template_bytes {
        let literal = match b {
            ESCAPE_PARAM1 => Some(param1),
            ESCAPE_PARAM2 => Some(param2),
            ESCAPE_CHANNEL => Some(channel),
            ESCAPE_CHECKSUM_RESET => {
                checksum = 0;
                checksum_active = true;
                None
            }
            ESCAPE_CHECKSUM_EMIT => {
                // Roland checksum: two's complement of the sum of bytes
                // since the last reset, masked to 7 bits.
                let value = checksum.wrapping_neg() & 0x7F;
                checksum_active = false;
                Some(value)
            }
            ESCAPE_TERMINATE => break,
            literal => Some(literal),
        };

        if let Some(byte) = literal {
            if checksum_active {
                checksum = checksum.wrapping_add(byte);
            }
            out.push(byte);
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn substitutes_params_and_channel() {
        let template = [0x41, ESCAPE_CHANNEL, ESCAPE_PARAM1, ESCAPE_PARAM2];
        let expanded = expand(&template, 0x10, 0x20, 3);
        assert_eq!(vec![0x41, 3, 0x10, 0x20], expanded);
    }

    #[test]
    fn checksum_is_two_s_complement_of_sum_since_reset() {
        // GS-style DT1: addr 40 00 7F, data 00 -> checksum = 128 - (0x40+0x00+0x7F+0x00) % 128
        let template = [
            ESCAPE_CHECKSUM_RESET,
            0x40,
            0x00,
            0x7F,
            0x00,
            ESCAPE_CHECKSUM_EMIT,
            ESCAPE_TERMINATE,
        ];
        let expanded = expand(&template, 0, 0, 0);
        let sum: u8 = 0x40u8.wrapping_add(0x00).wrapping_add(0x7F).wrapping_add(0x00);
        let expected_checksum = sum.wrapping_neg() & 0x7F;
        assert_eq!(vec![0x40, 0x00, 0x7F, 0x00, expected_checksum], expanded);
    }

    #[test]
    fn terminate_stops_expansion() {
        let template = [0x41, ESCAPE_TERMINATE, 0x99];
        assert_eq!(vec![0x41], expand(&template, 0, 0, 0));
    }
}
