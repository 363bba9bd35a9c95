//! PKWARE DCL "implode" decompression.
//!
//! The stream starts with a mode byte (0 = literals stored as raw bytes,
//! 1 = literals Huffman coded) and a dictionary size byte (4, 5 or 6 for
//! 1024, 2048 or 4096 byte windows). Each token is a flag bit followed by
//! either a literal or a length/distance pair. Length 519 ends the stream.

use std::sync::LazyLock;

use bitter::BitReader as _;

use super::{DecompressionError, Result};

const MAX_CODE_BITS: usize = 13;
const END_OF_STREAM_LENGTH: usize = 519;

/// Code lengths for the 256 literal symbols, run-length packed: each byte
/// holds `repeat - 1` in the high nibble and a code length in the low one.
const LITERAL_CODE_LENGTHS: [u8; 98] = [
    11, 124, 8, 7, 28, 7, 188, 13, 76, 4, 10, 8, 12, 10, 12, 10, 8, 23, 8, 9, 7, 6, 7, 8, 7, 6,
    55, 8, 23, 24, 12, 11, 7, 9, 11, 12, 6, 7, 22, 5, 7, 24, 6, 11, 9, 6, 7, 22, 7, 11, 38, 7, 9,
    8, 25, 11, 8, 11, 9, 12, 8, 12, 5, 38, 5, 38, 5, 11, 7, 5, 6, 21, 6, 10, 53, 8, 7, 24, 10, 27,
    44, 253, 253, 253, 252, 252, 252, 13, 12, 45, 12, 45, 12, 61, 12, 45, 44, 173,
];
const LENGTH_CODE_LENGTHS: [u8; 6] = [2, 35, 36, 53, 38, 23];
const DISTANCE_CODE_LENGTHS: [u8; 7] = [2, 20, 53, 230, 247, 151, 248];

/// Base match length and extra bit count for each length symbol.
const LENGTH_BASE: [u16; 16] = [3, 2, 4, 5, 6, 7, 8, 9, 10, 12, 16, 24, 40, 72, 136, 264];
const LENGTH_EXTRA_BITS: [u8; 16] = [0, 0, 0, 0, 0, 0, 0, 0, 1, 2, 3, 4, 5, 6, 7, 8];

/// A canonical Huffman decoding table.
struct CanonicalCode {
    counts: [u16; MAX_CODE_BITS + 1],
    symbols: Vec<u16>,
}

impl CanonicalCode {
    fn from_packed_lengths(packed: &[u8]) -> Self {
        let lengths: Vec<usize> = packed
            .iter()
            .flat_map(|&b| std::iter::repeat_n(usize::from(b & 0x0F), usize::from(b >> 4) + 1))
            .collect();

        let mut counts = [0u16; MAX_CODE_BITS + 1];
        for &len in &lengths {
            counts[len] += 1;
        }

        let mut offsets = [0usize; MAX_CODE_BITS + 2];
        for len in 1..=MAX_CODE_BITS {
            offsets[len + 1] = offsets[len] + usize::from(counts[len]);
        }

        let mut symbols = vec![0u16; lengths.len()];
        for (symbol, &len) in lengths.iter().enumerate() {
            symbols[offsets[len]] = u16::try_from(symbol).unwrap_or(u16::MAX);
            offsets[len] += 1;
        }
        CanonicalCode { counts, symbols }
    }

    /// Decodes one symbol. Code bits are stored inverted in the stream.
    fn decode(&self, reader: &mut bitter::LittleEndianReader<'_>) -> Result<u16> {
        let mut code = 0usize;
        let mut first = 0usize;
        let mut index = 0usize;
        for len in 1..=MAX_CODE_BITS {
            let bit = reader.read_bit().ok_or(DecompressionError::UnexpectedEnd)?;
            code |= usize::from(!bit);
            let count = usize::from(self.counts[len]);
            if code < first + count {
                let offset = code.checked_sub(first).ok_or_else(|| {
                    DecompressionError::Inconsistent("malformed DCL code".into())
                })?;
                return Ok(self.symbols[index + offset]);
            }
            index += count;
            first = (first + count) << 1;
            code <<= 1;
        }
        Err(DecompressionError::Inconsistent("invalid DCL code".into()))
    }
}

static LITERAL_CODE: LazyLock<CanonicalCode> =
    LazyLock::new(|| CanonicalCode::from_packed_lengths(&LITERAL_CODE_LENGTHS));
static LENGTH_CODE: LazyLock<CanonicalCode> =
    LazyLock::new(|| CanonicalCode::from_packed_lengths(&LENGTH_CODE_LENGTHS));
static DISTANCE_CODE: LazyLock<CanonicalCode> =
    LazyLock::new(|| CanonicalCode::from_packed_lengths(&DISTANCE_CODE_LENGTHS));

fn read_bits(reader: &mut bitter::LittleEndianReader<'_>, count: u8) -> Result<usize> {
    if count == 0 {
        return Ok(0);
    }
    let value = reader
        .read_bits(u32::from(count))
        .ok_or(DecompressionError::UnexpectedEnd)?;
    usize::try_from(value).map_err(|_| DecompressionError::Inconsistent("bit value overflow".into()))
}

pub(super) fn unpack(packed: &[u8], unpacked_size: usize) -> Result<Vec<u8>> {
    let mut reader = bitter::LittleEndianReader::new(packed);
    let mut output = super::output_buffer(unpacked_size);

    let Some(mode) = reader.read_u8() else {
        return Err(DecompressionError::BadHeader("missing DCL mode".into()));
    };
    let Some(dict_type) = reader.read_u8() else {
        return Err(DecompressionError::BadHeader(
            "missing DCL dictionary type".into(),
        ));
    };
    if mode != 0 && mode != 1 {
        return Err(DecompressionError::BadHeader(format!(
            "unsupported DCL mode: {mode}"
        )));
    }
    if !(4..=6).contains(&dict_type) {
        return Err(DecompressionError::BadHeader(format!(
            "unsupported DCL dictionary type: {dict_type}"
        )));
    }

    loop {
        let is_match = reader.read_bit().ok_or(DecompressionError::UnexpectedEnd)?;
        if is_match {
            let length_symbol = usize::from(LENGTH_CODE.decode(&mut reader)?);
            let length = usize::from(LENGTH_BASE[length_symbol])
                + read_bits(&mut reader, LENGTH_EXTRA_BITS[length_symbol])?;
            if length == END_OF_STREAM_LENGTH {
                break;
            }

            let distance_symbol = usize::from(DISTANCE_CODE.decode(&mut reader)?);
            let low_bits = if length == 2 { 2 } else { dict_type };
            let distance = (distance_symbol << low_bits) + read_bits(&mut reader, low_bits)? + 1;

            if distance > output.len() {
                return Err(DecompressionError::BadBackReference {
                    distance,
                    written: output.len(),
                });
            }
            if output.len() + length > unpacked_size {
                return Err(DecompressionError::OutputOverrun {
                    size: unpacked_size,
                });
            }
            let start = output.len() - distance;
            for i in 0..length {
                output.push(output[start + i]);
            }
        } else {
            let value = if mode == 1 {
                LITERAL_CODE.decode(&mut reader)?.to_le_bytes()[0]
            } else {
                reader.read_u8().ok_or(DecompressionError::UnexpectedEnd)?
            };
            if output.len() == unpacked_size {
                return Err(DecompressionError::OutputOverrun {
                    size: unpacked_size,
                });
            }
            output.push(value);
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
    fn code_tables_are_complete() {
        assert_eq!(LITERAL_CODE.symbols.len(), 256);
        assert_eq!(LENGTH_CODE.symbols.len(), 16);
        assert_eq!(DISTANCE_CODE.symbols.len(), 64);
    }

    #[test]
    fn single_literal() {
        let packed = [0x00, 0x04, 0x82, 0x02, 0xFE, 0x01];
        assert_eq!(unpack(&packed, 1).unwrap(), b"A");
    }

    #[test]
    fn binary_mode_with_matches() {
        let packed = [
            0x00, 0x04, 0xC2, 0x88, 0x91, 0x13, 0x66, 0x4C, 0x18, 0xB2, 0xD9, 0x80, 0x24, 0xDF,
            0x80, 0x7F,
        ];
        assert_eq!(unpack(&packed, 23).unwrap(), b"abracadabra abracadabra");
    }

    #[test]
    fn ascii_mode_with_overlapping_match() {
        let packed = [0x01, 0x04, 0x62, 0xD4, 0x7C, 0x04, 0xFC, 0x03];
        assert_eq!(unpack(&packed, 10).unwrap(), b"ABABABABAB");
    }

    #[test]
    fn declared_size_is_enforced() {
        let packed = [0x00, 0x04, 0x82, 0x02, 0xFE, 0x01];
        assert!(matches!(
            unpack(&packed, 2),
            Err(DecompressionError::LengthMismatch { expected: 2, actual: 1 })
        ));
        assert!(matches!(
            unpack(&packed, 0),
            Err(DecompressionError::OutputOverrun { size: 0 })
        ));
    }

    #[test]
    fn bad_headers_are_rejected() {
        assert!(matches!(unpack(&[], 0), Err(DecompressionError::BadHeader(_))));
        assert!(matches!(unpack(&[2, 4], 0), Err(DecompressionError::BadHeader(_))));
        assert!(matches!(unpack(&[0, 7], 0), Err(DecompressionError::BadHeader(_))));
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
