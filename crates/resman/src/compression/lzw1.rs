//! LZW with most-significant-bit-first codes and linked dictionary entries.
//!
//! Each dictionary entry stores its last byte and the code of its prefix;
//! strings are rebuilt backwards on a bounded stack. The first code after
//! a reset is always a literal.

use super::{
    DecompressionError, Result,
    bits::{BitReader, MsbBitReader},
};

const RESET: u32 = 0x100;
const TERMINATOR: u32 = 0x101;
const FIRST_TOKEN: u32 = 0x102;
const INITIAL_END_TOKEN: u32 = 0x1FF;
const TABLE_SIZE: usize = 0x1004;
const STACK_LIMIT: usize = 0x1014;
const MAX_BITS: u32 = 12;

#[derive(Debug, Clone, Copy, Default)]
struct Link {
    last: u8,
    prefix: u32,
}

struct Stack(Vec<u8>);

impl Stack {
    fn push(&mut self, byte: u8) -> Result<()> {
        if self.0.len() >= STACK_LIMIT {
            return Err(DecompressionError::Inconsistent(
                "LZW1 string exceeds the decode stack".into(),
            ));
        }
        self.0.push(byte);
        Ok(())
    }
}

pub(super) fn unpack(packed: &[u8], unpacked_size: usize) -> Result<Vec<u8>> {
    let mut reader = MsbBitReader::new(packed);
    let mut output = super::output_buffer(unpacked_size);
    let mut table = vec![Link::default(); TABLE_SIZE];
    let mut stack = Stack(Vec::with_capacity(STACK_LIMIT));

    let mut num_bits = 9;
    let mut cur_token = FIRST_TOKEN;
    let mut end_token = INITIAL_END_TOKEN;
    let mut last_char = 0u8;
    let mut last_code = 0u32;
    let mut started = false;

    while !(output.len() == unpacked_size && reader.is_drained()) {
        let code = match reader.read_bits(num_bits) {
            Ok(code) => code,
            Err(_) if output.len() == unpacked_size => break,
            Err(err) => return Err(err),
        };
        if code == TERMINATOR {
            break;
        }

        if !started {
            if output.len() == unpacked_size {
                return Err(DecompressionError::OutputOverrun {
                    size: unpacked_size,
                });
            }
            last_char = code.to_le_bytes()[0];
            last_code = code;
            output.push(last_char);
            started = true;
            continue;
        }

        if code == RESET {
            num_bits = 9;
            cur_token = FIRST_TOKEN;
            end_token = INITIAL_END_TOKEN;
            started = false;
            continue;
        }

        let mut token = code;
        if token >= cur_token {
            // The code being defined by this very step.
            token = last_code;
            stack.push(last_char)?;
        }
        while token > 0xFF && (token as usize) < TABLE_SIZE {
            let link = table[token as usize];
            stack.push(link.last)?;
            token = link.prefix;
        }
        last_char = token.to_le_bytes()[0];
        stack.push(last_char)?;

        while let Some(byte) = stack.0.pop() {
            if output.len() == unpacked_size {
                return Ok(output);
            }
            output.push(byte);
        }
        if output.len() == unpacked_size {
            return Ok(output);
        }

        if cur_token <= end_token {
            table[cur_token as usize] = Link {
                last: last_char,
                prefix: last_code,
            };
            cur_token += 1;
            if cur_token == end_token && num_bits < MAX_BITS {
                num_bits += 1;
                end_token = (end_token << 1) + 1;
            }
        }
        last_code = code;
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

    #[test]
    fn decodes_linked_strings() {
        let packed = [
            0x2A, 0x13, 0xC8, 0x44, 0x52, 0x79, 0x48, 0x9C, 0x4F, 0x2A, 0x40, 0xA0, 0x90, 0x68,
            0x5C, 0x16, 0x0F, 0x09, 0x80, 0x80,
        ];
        assert_eq!(unpack(&packed, 24).unwrap(), b"TOBEORNOTTOBEORTOBEORNOT");
    }

    #[test]
    fn decodes_code_defined_by_current_step() {
        let packed = [0x30, 0xC0, 0xA0, 0x70, 0x48, 0x2C, 0x18, 0xC3, 0x01];
        assert_eq!(unpack(&packed, 22).unwrap(), [b'a'; 22]);
    }

    #[test]
    fn stops_when_output_is_full() {
        let packed = [0x30, 0xC0, 0xA0, 0x70, 0x48, 0x2C, 0x18, 0xC3, 0x01];
        assert_eq!(unpack(&packed, 5).unwrap(), [b'a'; 5]);
    }

    #[test]
    fn early_terminator_is_a_length_mismatch() {
        // 'a' then the terminator, as 9-bit big-endian codes.
        let packed = [0x30, 0xC0, 0x40];
        assert!(matches!(
            unpack(&packed, 3),
            Err(DecompressionError::LengthMismatch { expected: 3, actual: 1 })
        ));
    }

    proptest! {
        #[test]
        fn arbitrary_input_never_panics(data in prop::collection::vec(any::<u8>(), 0..256), size in 0usize..512) {
            if let Ok(out) = unpack(&data, size) {
                prop_assert_eq!(out.len(), size);
            }
        }
    }
}
