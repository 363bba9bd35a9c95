//! Bit readers over packed data, built on `bitter`.
//!
//! Consuming more bits than the input holds is an error.

use super::{DecompressionError, Result};

pub(super) trait BitReader {
    /// Reads `count` bits, `1 <= count <= 24`.
    fn read_bits(&mut self, count: u32) -> Result<u32>;

    /// True once every input byte has been loaded into the bit buffer.
    fn is_drained(&self) -> bool;

    fn read_bit(&mut self) -> Result<bool> {
        Ok(self.read_bits(1)? != 0)
    }

    fn read_u8(&mut self) -> Result<u8> {
        let value = self.read_bits(8)?;
        Ok(value.to_le_bytes()[0])
    }
}

/// A `bitter` reader that also tracks how many input bytes a 32-bit
/// refill buffer would have fetched so far. Codecs use that count to
/// decide when the stream is exhausted.
pub(super) struct RefillReader<R> {
    bits: R,
    len: usize,
    fetched: usize,
    buffered: u32,
}

/// Reads bits from the most significant bit of each byte first.
pub(super) type MsbBitReader<'a> = RefillReader<bitter::BigEndianReader<'a>>;

/// Reads bits from the least significant bit of each byte first.
pub(super) type LsbBitReader<'a> = RefillReader<bitter::LittleEndianReader<'a>>;

impl<'a> RefillReader<bitter::BigEndianReader<'a>> {
    pub(super) fn new(input: &'a [u8]) -> Self {
        RefillReader::wrap(bitter::BigEndianReader::new(input), input.len())
    }
}

impl<'a> RefillReader<bitter::LittleEndianReader<'a>> {
    pub(super) fn new(input: &'a [u8]) -> Self {
        RefillReader::wrap(bitter::LittleEndianReader::new(input), input.len())
    }
}

impl<R> RefillReader<R> {
    fn wrap(bits: R, len: usize) -> Self {
        RefillReader {
            bits,
            len,
            fetched: 0,
            buffered: 0,
        }
    }
}

impl<R: bitter::BitReader> BitReader for RefillReader<R> {
    fn read_bits(&mut self, count: u32) -> Result<u32> {
        debug_assert!((1..=24).contains(&count));
        if self.buffered < count {
            while self.buffered <= 24 {
                self.fetched += 1;
                self.buffered += 8;
            }
        }
        let value = self
            .bits
            .read_bits(count)
            .ok_or(DecompressionError::UnexpectedEnd)?;
        self.buffered -= count;
        u32::try_from(value).map_err(|_| DecompressionError::Inconsistent("bit value overflow".into()))
    }

    fn is_drained(&self) -> bool {
        self.fetched >= self.len
    }
}
