//! STAC LZS decompression.
//!
//! Most-significant-bit-first flags select between an 8-bit literal and a
//! back-reference with a 7-bit or 11-bit offset. A 7-bit offset of zero
//! ends the stream.

use super::{
    DecompressionError, Result,
    bits::{BitReader, MsbBitReader},
};

fn read_copy_length(reader: &mut MsbBitReader<'_>) -> Result<usize> {
    let code = reader.read_bits(2)?;
    if code < 3 {
        return Ok(code as usize + 2);
    }
    let code = reader.read_bits(2)?;
    if code < 3 {
        return Ok(code as usize + 5);
    }
    let mut length = 8usize;
    loop {
        let nibble = reader.read_bits(4)?;
        length = length.saturating_add(nibble as usize);
        if nibble != 0x0F {
            return Ok(length);
        }
    }
}

pub(super) fn unpack(packed: &[u8], unpacked_size: usize) -> Result<Vec<u8>> {
    let mut reader = MsbBitReader::new(packed);
    let mut output = super::output_buffer(unpacked_size);

    while !(output.len() == unpacked_size && reader.is_drained()) {
        let is_copy = match reader.read_bit() {
            Ok(bit) => bit,
            Err(_) if output.len() == unpacked_size => break,
            Err(err) => return Err(err),
        };

        if is_copy {
            let offset = if reader.read_bit()? {
                let offset = reader.read_bits(7)? as usize;
                if offset == 0 {
                    break;
                }
                offset
            } else {
                reader.read_bits(11)? as usize
            };
            let length = read_copy_length(&mut reader)?;

            if offset == 0 || offset > output.len() {
                return Err(DecompressionError::BadBackReference {
                    distance: offset,
                    written: output.len(),
                });
            }
            if output.len() + length > unpacked_size {
                return Err(DecompressionError::OutputOverrun {
                    size: unpacked_size,
                });
            }
            let start = output.len() - offset;
            for i in 0..length {
                output.push(output[start + i]);
            }
        } else {
            let byte = reader.read_u8()?;
            if output.len() == unpacked_size {
                return Err(DecompressionError::OutputOverrun {
                    size: unpacked_size,
                });
            }
            output.push(byte);
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

    #[test]
    fn decodes_literals_and_copies() {
        let packed = [0x30, 0x98, 0x8C, 0x78, 0x3F, 0x42, 0xC6, 0x00];
        assert_eq!(unpack(&packed, 16).unwrap(), b"abcabcabcabcabcX");
    }

    #[test]
    fn end_marker_alone_is_empty() {
        // Copy flag, short offset flag, zero offset.
        assert_eq!(unpack(&[0xC0, 0x00], 0).unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn copy_before_any_output_is_rejected() {
        // Copy flag, short offset 1, length 2.
        let packed = [0xC0, 0x80, 0x00];
        assert!(matches!(
            unpack(&packed, 2),
            Err(DecompressionError::BadBackReference { distance: 1, written: 0 })
        ));
    }

    #[test]
    fn copy_past_declared_size_is_rejected() {
        let packed = [0x30, 0x98, 0x8C, 0x78, 0x3F, 0x42, 0xC6, 0x00];
        assert!(matches!(
            unpack(&packed, 8),
            Err(DecompressionError::OutputOverrun { size: 8 })
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
