//! Resources stored in Macintosh resource forks.
//!
//! A fork starts with a 16-byte header locating a data area and a map. The
//! map lists four-character resource types, and for each type, references
//! giving an ID and the offset of a length-prefixed payload in the data
//! area. All fields are big-endian.

use crate::{
    compression::{self, DecompressionError},
    ids::ResourceType,
    utils::mem_reader::{MemReader, NotEnoughData, SliceReader},
};

pub(crate) const FORK_HEADER_LEN: usize = 16;

/// Number given to the `Patches` fork, which overrides the data forks.
pub(crate) const PATCHES_FORK: u32 = 100;

#[derive(Debug, thiserror::Error)]
pub(crate) enum MacForkError {
    #[error("Resource fork is truncated")]
    Truncated(#[from] NotEnoughData),
    #[error("Resource fork header is inconsistent: {0}")]
    BadHeader(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ForkHeader {
    pub(crate) data_offset: u32,
    pub(crate) map_offset: u32,
    pub(crate) data_len: u32,
    pub(crate) map_len: u32,
}

impl ForkHeader {
    pub(crate) fn parse(data: &[u8]) -> Result<Self, MacForkError> {
        let mut reader = SliceReader::new(data);
        let header = ForkHeader {
            data_offset: reader.read_u32_be()?,
            map_offset: reader.read_u32_be()?,
            data_len: reader.read_u32_be()?,
            map_len: reader.read_u32_be()?,
        };
        if header.map_len < 30 {
            return Err(MacForkError::BadHeader(format!(
                "map of {} bytes is too small",
                header.map_len
            )));
        }
        Ok(header)
    }
}

/// One reference from the fork map.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ForkEntry {
    pub(crate) tag: [u8; 4],
    pub(crate) id: u16,
    /// Absolute file offset of the payload's length prefix.
    pub(crate) offset: u32,
}

/// Reads the references from a fork map.
pub(crate) fn parse_map(map: &[u8], header: &ForkHeader) -> Result<Vec<ForkEntry>, MacForkError> {
    let mut reader = SliceReader::new(map);
    reader.seek_to(24)?;
    let type_list = usize::from(reader.read_u16_be()?);

    reader.seek_to(type_list)?;
    let type_count = usize::from(reader.read_u16_be()?.wrapping_add(1));
    let mut entries = Vec::new();
    for type_index in 0..type_count {
        reader.seek_to(type_list + 2 + type_index * 8)?;
        let mut tag = [0; 4];
        reader.read_exact(&mut tag)?;
        let count = usize::from(reader.read_u16_be()?) + 1;
        let references = type_list + usize::from(reader.read_u16_be()?);

        for index in 0..count {
            reader.seek_to(references + index * 12)?;
            let id = reader.read_u16_be()?;
            let _name_offset = reader.read_u16_be()?;
            let data_offset = reader.read_u32_be()? & 0x00FF_FFFF;
            entries.push(ForkEntry {
                tag,
                id,
                offset: header.data_offset + data_offset,
            });
        }
    }
    Ok(entries)
}

/// The category stored under a fork resource tag.
pub(crate) fn tag_type(tag: [u8; 4]) -> Option<ResourceType> {
    let res_type = match &tag {
        b"V56 " => ResourceType::View,
        b"P56 " => ResourceType::Pic,
        b"SCR " => ResourceType::Script,
        b"TEX " => ResourceType::Text,
        b"SND " => ResourceType::Sound,
        b"VOC " => ResourceType::Vocab,
        b"FON " => ResourceType::Font,
        b"CURS" | b"crsr" => ResourceType::Cursor,
        b"Pat " => ResourceType::Patch,
        b"PAL " => ResourceType::Palette,
        b"snd " => ResourceType::Audio,
        b"MSG " => ResourceType::Message,
        b"HEP " => ResourceType::Heap,
        b"IBIN" => ResourceType::MacIconBarPictN,
        b"IBIS" => ResourceType::MacIconBarPictS,
        b"PICT" => ResourceType::MacPict,
        b"SYN " => ResourceType::Sync,
        _ => return None,
    };
    Some(res_type)
}

/// Decodes a fork payload. When `may_compress` is set, the payload ends in a
/// big-endian decoded size; zero there marks stored data.
pub(crate) fn decode_payload(raw: &[u8], may_compress: bool) -> compression::Result<Vec<u8>> {
    if !may_compress {
        return Ok(raw.to_vec());
    }
    let Some(split) = raw.len().checked_sub(4) else {
        return Ok(Vec::new());
    };
    let (body, trailer) = raw.split_at(split);
    let size = u32::from_be_bytes([trailer[0], trailer[1], trailer[2], trailer[3]]);
    if size == 0 || split == 0 {
        return Ok(body.to_vec());
    }
    decompress(body, size as usize)
}

struct Output {
    data: Vec<u8>,
    size: usize,
}

impl Output {
    fn literal(&mut self, input: &mut SliceReader<'_>, len: usize) -> compression::Result<()> {
        let bytes = input.read_slice(len)?;
        if self.data.len() + len > self.size {
            return Err(DecompressionError::OutputOverrun { size: self.size });
        }
        self.data.extend_from_slice(bytes);
        Ok(())
    }

    fn back_reference(&mut self, distance: usize, len: usize) -> compression::Result<()> {
        let written = self.data.len();
        if distance > written {
            return Err(DecompressionError::BadBackReference { distance, written });
        }
        if written + len > self.size {
            return Err(DecompressionError::OutputOverrun { size: self.size });
        }
        let start = written - distance;
        for index in start..start + len {
            let value = self.data[index];
            self.data.push(value);
        }
        Ok(())
    }
}

/// Expands the fork compression scheme: a run of literal and copy commands
/// ending at `0xFF`.
pub(crate) fn decompress(input: &[u8], size: usize) -> compression::Result<Vec<u8>> {
    let mut input = SliceReader::new(input);
    let mut output = Output {
        data: compression::output_buffer(size),
        size,
    };

    while !input.is_empty() {
        let code = input.read_u8()?;
        if code == 0xFF {
            break;
        }
        match code & 0xC0 {
            0x80 => {
                let extra1 = usize::from(input.read_u8()?);
                let extra2 = usize::from(input.read_u8()?);
                output.literal(&mut input, extra2 & 3)?;
                let distance =
                    (usize::from(code & 0x3F) | ((extra1 & 0xE0) << 1) | ((extra2 & 0xFC) << 7))
                        + 1;
                output.back_reference(distance, (extra1 & 0x1F) + 3)?;
            }
            0xC0 => {
                let len = if code >= 0xD0 {
                    if code == 0xD0 || code > 0xD3 {
                        return Err(DecompressionError::Inconsistent(format!(
                            "reserved command {code:#04x}"
                        )));
                    }
                    usize::from(code & 3)
                } else {
                    usize::from(code & 0x0F) * 4 + 4
                };
                output.literal(&mut input, len)?;
            }
            _ => {
                let extra = usize::from(input.read_u8()?);
                output.literal(&mut input, (extra >> 3) & 3)?;
                let distance = (usize::from(code) | ((extra & 0xE0) << 1)) + 1;
                output.back_reference(distance, (extra & 7) + 3)?;
            }
        }
    }

    if output.data.len() != size {
        return Err(DecompressionError::LengthMismatch {
            expected: size,
            actual: output.data.len(),
        });
    }
    Ok(output.data)
}
