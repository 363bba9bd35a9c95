//! Entry headers stored in front of each resource inside a volume file.

use crate::{
    compression::{CompressionMethod, DecompressionError},
    ids::{ResourceId, ResourceType},
    utils::mem_reader::{self, MemReader},
    version::{ArchiveVersion, ResourceVersion},
};

#[derive(Debug, thiserror::Error)]
pub enum VolumeError {
    #[error("Entry header is truncated")]
    Truncated(#[from] mem_reader::NotEnoughData),
    #[error("Volume layout {} has no entry headers", .0.description())]
    UnsupportedLayout(ResourceVersion),
    #[error("Packed size field {0} is smaller than the header fields it covers")]
    BadPackedSize(u32),
    #[error("Entry ends at {end:#x}, past the end of its {file_size}-byte volume")]
    PastEnd { end: u64, file_size: u64 },
}

/// Size in bytes of the entry header for a volume layout.
#[must_use]
pub(crate) fn header_size(volume: ResourceVersion) -> Option<usize> {
    match volume {
        ResourceVersion::Sci0Sci1Early | ResourceVersion::Sci1Middle => Some(8),
        ResourceVersion::Kq5Fmt | ResourceVersion::Sci1Late | ResourceVersion::Sci11 => Some(9),
        ResourceVersion::Sci2 | ResourceVersion::Sci3 => Some(13),
        ResourceVersion::Unknown | ResourceVersion::Sci11Mac => None,
    }
}

/// A decoded entry header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct EntryHeader {
    id: ResourceId,
    packed_size: u32,
    unpacked_size: u32,
    code: u16,
    method: Option<CompressionMethod>,
}

impl EntryHeader {
    /// Reads the header at the reader's position using the layout of
    /// `version.volume()`. Type codes are interpreted per the map layout.
    pub(crate) fn parse<M: MemReader>(
        reader: &mut M,
        version: &ArchiveVersion,
        legacy_codes: bool,
    ) -> Result<Self, VolumeError> {
        let type_code = |code: u8| ResourceType::from_type_code(code, version.map(), legacy_codes);
        let (res_type, number, packed_size, unpacked_size, code) = match version.volume() {
            ResourceVersion::Sci0Sci1Early | ResourceVersion::Sci1Middle => {
                let word = reader.read_u16_le()?;
                let packed = reader.read_u16_le()?;
                let unpacked = reader.read_u16_le()?;
                let code = reader.read_u16_le()?;
                #[expect(clippy::cast_possible_truncation, reason = "five bits remain")]
                let res_type = type_code((word >> 11) as u8);
                (
                    res_type,
                    word & 0x7FF,
                    strip_field_sizes(packed)?,
                    u32::from(unpacked),
                    code,
                )
            }
            ResourceVersion::Kq5Fmt | ResourceVersion::Sci1Late => {
                let res_type = type_code(reader.read_u8()?);
                let number = reader.read_u16_le()?;
                let packed = reader.read_u16_le()?;
                let unpacked = reader.read_u16_le()?;
                let code = reader.read_u16_le()?;
                (
                    res_type,
                    number,
                    strip_field_sizes(packed)?,
                    u32::from(unpacked),
                    code,
                )
            }
            ResourceVersion::Sci11 => {
                let res_type = type_code(reader.read_u8()?);
                let number = reader.read_u16_le()?;
                let packed = reader.read_u16_le()?;
                let unpacked = reader.read_u16_le()?;
                let code = reader.read_u16_le()?;
                (
                    res_type,
                    number,
                    u32::from(packed),
                    u32::from(unpacked),
                    code,
                )
            }
            ResourceVersion::Sci2 | ResourceVersion::Sci3 => {
                let res_type = type_code(reader.read_u8()?);
                let number = reader.read_u16_le()?;
                let packed = reader.read_u32_le()?;
                let unpacked = reader.read_u32_le()?;
                let mut code = reader.read_u16_le()?;
                if version.volume() == ResourceVersion::Sci3 {
                    code = if packed == unpacked { 0 } else { 32 };
                }
                (res_type, number, packed, unpacked, code)
            }
            other @ (ResourceVersion::Unknown | ResourceVersion::Sci11Mac) => {
                return Err(VolumeError::UnsupportedLayout(other));
            }
        };
        Ok(EntryHeader {
            id: ResourceId::new(res_type, number),
            packed_size,
            unpacked_size,
            code,
            method: CompressionMethod::from_code(code, version.era()),
        })
    }

    #[must_use]
    pub(crate) fn id(&self) -> ResourceId {
        self.id
    }

    #[must_use]
    pub(crate) fn packed_size(&self) -> u32 {
        self.packed_size
    }

    #[must_use]
    pub(crate) fn unpacked_size(&self) -> u32 {
        self.unpacked_size
    }

    /// The entry's compression method. An unknown method code fails only
    /// this entry's decoding, so it is reported as a decompression error.
    pub(crate) fn method(&self) -> Result<CompressionMethod, DecompressionError> {
        self.method.ok_or(DecompressionError::UnknownMethod(self.code))
    }
}

/// Early layouts count the unpacked-size and method fields in the packed
/// size.
fn strip_field_sizes(packed: u16) -> Result<u32, VolumeError> {
    u32::from(packed)
        .checked_sub(4)
        .ok_or(VolumeError::BadPackedSize(u32::from(packed)))
}
