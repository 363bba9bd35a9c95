//! Variable-width LZW with least-significant-bit-first codes.
//!
//! Codes start at 9 bits and widen up to 12. Code `0x100` resets the
//! dictionary and `0x101` ends the stream. Dictionary entries are stored
//! as (offset, length) references into the output already written.

use super::{
    DecompressionError, Result,
    bits::{BitReader, LsbBitReader},
};

const RESET: u32 = 0x100;
const TERMINATOR: u32 = 0x101;
const FIRST_TOKEN: u16 = 0x102;
const INITIAL_END_TOKEN: u16 = 0x1FF;
const MAX_BITS: u32 = 12;

#[derive(Debug, Clone, Copy, Default)]
struct Token {
    offset: usize,
    length: usize,
}

pub(super) fn unpack(packed: &[u8], unpacked_size: usize) -> Result<Vec<u8>> {
    let mut reader = LsbBitReader::new(packed);
    let mut output = super::output_buffer(unpacked_size);
    let mut tokens = vec![Token::default(); 4096];

    let mut num_bits = 9;
    let mut cur_token = FIRST_TOKEN;
    let mut end_token = INITIAL_END_TOKEN;

    while !(output.len() == unpacked_size && reader.is_drained()) {
        let code = match reader.read_bits(num_bits) {
            Ok(code) => code,
            // Trailing padding after complete output.
            Err(_) if output.len() == unpacked_size => break,
            Err(err) => return Err(err),
        };

        if code == TERMINATOR {
            break;
        }
        if code == RESET {
            num_bits = 9;
            end_token = INITIAL_END_TOKEN;
            cur_token = FIRST_TOKEN;
            continue;
        }

        let token_length = if code > 0xFF {
            let code = u16::try_from(code).unwrap_or(u16::MAX);
            if code >= cur_token {
                return Err(DecompressionError::BadToken {
                    token: code,
                    next: cur_token,
                });
            }
            let token = tokens[usize::from(code)];
            let length = token.length + 1;
            // Copies that run past the declared size are truncated.
            for i in 0..length {
                if output.len() == unpacked_size {
                    break;
                }
                let byte = *output.get(token.offset + i).ok_or(
                    DecompressionError::BadBackReference {
                        distance: token.offset + i,
                        written: output.len(),
                    },
                )?;
                output.push(byte);
            }
            length
        } else {
            if output.len() < unpacked_size {
                output.push(code.to_le_bytes()[0]);
            } else {
                log::debug!("Dropping literal past the end of a {unpacked_size} byte buffer");
            }
            1
        };

        if cur_token > end_token && num_bits < MAX_BITS {
            num_bits += 1;
            end_token = (end_token << 1) + 1;
        }
        if cur_token <= end_token {
            tokens[usize::from(cur_token)] = Token {
                offset: output.len().saturating_sub(token_length),
                length: token_length,
            };
            cur_token += 1;
        }
    }

    if output.len() != unpacked_size {
        return Err(DecompressionError::LengthMismatch {
            expected: unpacked_size,
            actual: output.len(),
        });
    }
    Ok(output)
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    const TOBEORNOT_PACKED: [u8; 20] = [
        0x54, 0x9E, 0x08, 0x29, 0xF2, 0x44, 0x8A, 0x93, 0x27, 0x54, 0x04, 0x12, 0x34, 0xB8, 0xB0,
        0xE0, 0xC1, 0x84, 0x01, 0x01,
    ];

    #[test]
    fn decodes_dictionary_references() {
        let out = unpack(&TOBEORNOT_PACKED, 24).unwrap();
        assert_eq!(out, b"TOBEORNOTTOBEORTOBEORNOT");
    }

    #[test]
    fn decodes_self_referencing_token() {
        let packed = [0x61, 0x04, 0x0E, 0x24, 0x58, 0xD0, 0x60, 0x98, 0x80];
        let out = unpack(&packed, 22).unwrap();
        assert_eq!(out, [b'a'; 22]);
    }

    #[test]
    fn reset_then_terminator_yields_nothing() {
        // 0x100 then 0x101 as 9-bit little-endian codes.
        let packed = [0x00, 0x03, 0x02];
        assert_eq!(unpack(&packed, 0).unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn undefined_token_is_rejected() {
        // 'A' followed by 0x110, which has not been defined yet.
        let packed = [0x41, 0x20, 0x02];
        let err = unpack(&packed, 4).unwrap_err();
        assert!(matches!(err, DecompressionError::BadToken { token: 0x110, next: 0x103 }));
    }

    #[test]
    fn short_output_is_a_length_mismatch() {
        let err = unpack(&TOBEORNOT_PACKED, 30).unwrap_err();
        assert!(matches!(
            err,
            DecompressionError::LengthMismatch { expected: 30, actual: 24 }
        ));
    }

    #[test]
    fn truncates_to_declared_size() {
        // Output stops at the declared size; the remaining codes still decode.
        let out = unpack(&TOBEORNOT_PACKED, 10).unwrap();
        assert_eq!(out, b"TOBEORNOTT");
    }

    proptest! {
        #[test]
        fn arbitrary_input_never_panics(data in proptest::collection::vec(any::<u8>(), 0..256), size in 0usize..512) {
            if let Ok(out) = unpack(&data, size) {
                prop_assert_eq!(out.len(), size);
            }
        }
    }
}
