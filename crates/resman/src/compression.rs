//! Decompression of packed resource data.
//!
//! Every codec decodes into a buffer of exactly the declared unpacked size
//! and reports malformed input as a [`DecompressionError`] instead of
//! reading or writing out of bounds.

mod bits;
mod dcl;
mod huffman;
mod lzs;
mod lzw;
mod lzw1;
mod reorder;

use crate::version::CompressionEra;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompressionMethod {
    None,
    Lzw,
    Huffman,
    Lzw1,
    /// LZW1 followed by the view reordering pass.
    Lzw1View,
    /// LZW1 followed by the picture reordering pass.
    Lzw1Pic,
    Dcl,
    Stac,
}

impl CompressionMethod {
    /// Maps the compression field of a volume entry header to a method.
    /// Codes 1 and 2 depend on the archive's compression era.
    #[must_use]
    pub fn from_code(code: u16, era: CompressionEra) -> Option<Self> {
        let method = match (code, era) {
            (0, _) => CompressionMethod::None,
            (1, CompressionEra::Early) => CompressionMethod::Lzw,
            (1, CompressionEra::Late) | (2, CompressionEra::Early) => CompressionMethod::Huffman,
            (2, CompressionEra::Late) => CompressionMethod::Lzw1,
            (3, _) => CompressionMethod::Lzw1View,
            (4, _) => CompressionMethod::Lzw1Pic,
            (8 | 18..=20, _) => CompressionMethod::Dcl,
            (32, _) => CompressionMethod::Stac,
            _ => return None,
        };
        Some(method)
    }

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            CompressionMethod::None => "none",
            CompressionMethod::Lzw => "LZW",
            CompressionMethod::Huffman => "Huffman",
            CompressionMethod::Lzw1 => "LZW1",
            CompressionMethod::Lzw1View => "LZW1 (view)",
            CompressionMethod::Lzw1Pic => "LZW1 (pic)",
            CompressionMethod::Dcl => "DCL implode",
            CompressionMethod::Stac => "STACpack",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DecompressionError {
    #[error("Packed data ended unexpectedly")]
    UnexpectedEnd,
    #[error("Invalid header: {0}")]
    BadHeader(String),
    #[error("Token {token:#05x} is not yet defined (next token is {next:#05x})")]
    BadToken { token: u16, next: u16 },
    #[error("Back-reference distance {distance} exceeds the {written} bytes written")]
    BadBackReference { distance: usize, written: usize },
    #[error("Decoded data overruns the declared size of {size} bytes")]
    OutputOverrun { size: usize },
    #[error("Decoded {actual} bytes, expected {expected}")]
    LengthMismatch { expected: usize, actual: usize },
    #[error("Inconsistent packed data: {0}")]
    Inconsistent(String),
    #[error("Unknown compression method {0}")]
    UnknownMethod(u16),
}

pub type Result<T> = std::result::Result<T, DecompressionError>;

impl From<crate::utils::mem_reader::NotEnoughData> for DecompressionError {
    fn from(_: crate::utils::mem_reader::NotEnoughData) -> Self {
        DecompressionError::UnexpectedEnd
    }
}

/// The most output space reserved before decoding starts. Declared sizes
/// come from untrusted headers, so larger outputs grow as they are written.
const MAX_RESERVED_OUTPUT: usize = 0x10_0000;

/// An empty output buffer for a codec decoding `unpacked_size` bytes.
pub(crate) fn output_buffer(unpacked_size: usize) -> Vec<u8> {
    Vec::with_capacity(unpacked_size.min(MAX_RESERVED_OUTPUT))
}

/// Decodes `packed` into exactly `unpacked_size` bytes.
pub fn unpack(method: CompressionMethod, packed: &[u8], unpacked_size: usize) -> Result<Vec<u8>> {
    match method {
        CompressionMethod::None => copy(packed, unpacked_size),
        CompressionMethod::Lzw => lzw::unpack(packed, unpacked_size),
        CompressionMethod::Huffman => huffman::unpack(packed, unpacked_size),
        CompressionMethod::Lzw1 => lzw1::unpack(packed, unpacked_size),
        CompressionMethod::Lzw1View => {
            let scrambled = lzw1::unpack(packed, unpacked_size)?;
            reorder::reorder_view(&scrambled)
        }
        CompressionMethod::Lzw1Pic => {
            let scrambled = lzw1::unpack(packed, unpacked_size)?;
            reorder::reorder_pic(&scrambled)
        }
        CompressionMethod::Dcl => dcl::unpack(packed, unpacked_size),
        CompressionMethod::Stac => lzs::unpack(packed, unpacked_size),
    }
}

/// The block size used when copying stored data.
const COPY_BLOCK_SIZE: usize = 1024;

fn copy(packed: &[u8], unpacked_size: usize) -> Result<Vec<u8>> {
    let source = packed
        .get(..unpacked_size)
        .ok_or(DecompressionError::UnexpectedEnd)?;
    let mut output = output_buffer(unpacked_size);
    for block in source.chunks(COPY_BLOCK_SIZE) {
        output.extend_from_slice(block);
    }
    Ok(output)
}
