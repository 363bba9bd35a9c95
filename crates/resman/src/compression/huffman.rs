//! Table-driven Huffman decoding.
//!
//! The packed data starts with a node count, a terminator byte, and
//! `2 * count` bytes of node table. A node whose second byte is zero is a
//! leaf holding its first byte. Otherwise the high and low nibbles of the
//! second byte are relative offsets (in nodes) to the children taken on a
//! 0 or 1 bit. A 1 bit at a node whose low nibble is zero escapes to a raw
//! 8-bit literal. The stream ends with the escaped terminator byte.

use super::{
    DecompressionError, Result,
    bits::{BitReader, MsbBitReader},
};

const ESCAPE_FLAG: u16 = 0x100;

fn next_symbol(nodes: &[u8], reader: &mut MsbBitReader<'_>) -> Result<u16> {
    let mut index = 0usize;
    loop {
        let node = nodes
            .get(index..index + 2)
            .ok_or_else(|| DecompressionError::Inconsistent("Huffman node out of range".into()))?;
        if node[1] == 0 {
            return Ok(u16::from(node[0]));
        }
        let step = if reader.read_bit()? {
            let step = node[1] & 0x0F;
            if step == 0 {
                return Ok(u16::from(reader.read_u8()?) | ESCAPE_FLAG);
            }
            step
        } else {
            node[1] >> 4
        };
        index += usize::from(step) * 2;
    }
}

pub(super) fn unpack(packed: &[u8], unpacked_size: usize) -> Result<Vec<u8>> {
    let [node_count, terminator, rest @ ..] = packed else {
        return Err(DecompressionError::UnexpectedEnd);
    };
    let terminator = u16::from(*terminator) | ESCAPE_FLAG;
    let table_len = usize::from(*node_count) * 2;
    if rest.len() < table_len {
        return Err(DecompressionError::UnexpectedEnd);
    }
    let (nodes, stream) = rest.split_at(table_len);

    let mut reader = MsbBitReader::new(stream);
    let mut output = super::output_buffer(unpacked_size);
    while output.len() < unpacked_size {
        let symbol = next_symbol(nodes, &mut reader)?;
        if symbol == terminator {
            break;
        }
        output.push(symbol.to_le_bytes()[0]);
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

    // Codes: A = 0, B = 10, R = 110, escape = 111.
    const ABRACADABRA_PACKED: [u8; 20] = [
        0x06, 0x00, 0x00, 0x12, 0x41, 0x00, 0x00, 0x12, 0x42, 0x00, 0x00, 0x10, 0x52, 0x00, 0x59,
        0xD0, 0xDD, 0x11, 0x67, 0x00,
    ];

    #[test]
    fn decodes_leaves_and_escapes() {
        assert_eq!(unpack(&ABRACADABRA_PACKED, 11).unwrap(), b"ABRACADABRA");
    }

    #[test]
    fn stops_at_declared_size() {
        assert_eq!(unpack(&ABRACADABRA_PACKED, 4).unwrap(), b"ABRA");
    }

    #[test]
    fn early_terminator_is_a_length_mismatch() {
        assert!(matches!(
            unpack(&ABRACADABRA_PACKED, 12),
            Err(DecompressionError::LengthMismatch { expected: 12, actual: 11 })
        ));
    }

    #[test]
    fn truncated_table_is_rejected() {
        assert!(matches!(unpack(&[0x04, 0x00, 0x00], 1), Err(DecompressionError::UnexpectedEnd)));
        assert!(matches!(unpack(&[0x00], 1), Err(DecompressionError::UnexpectedEnd)));
    }

    #[test]
    fn node_offsets_are_bounds_checked() {
        // One interior node pointing past the table.
        let packed = [0x01, 0x00, 0x00, 0x11, 0x00];
        assert!(matches!(unpack(&packed, 1), Err(DecompressionError::Inconsistent(_))));
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
