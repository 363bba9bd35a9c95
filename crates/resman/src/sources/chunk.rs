//! Resources embedded in a chunk resource.
//!
//! A chunk starts with a table of 11-byte records (type, number, offset,
//! length). The table has no terminator; it ends where the first embedded
//! resource begins.

use crate::{
    ids::{ResourceId, ResourceType},
    utils::mem_reader::{MemReader, NotEnoughData, SliceReader},
    version::ResourceVersion,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ChunkEntry {
    pub(crate) id: ResourceId,
    pub(crate) offset: u32,
    pub(crate) length: u32,
}

pub(crate) fn parse_table(
    data: &[u8],
    map_version: ResourceVersion,
    legacy_codes: bool,
) -> Result<Vec<ChunkEntry>, NotEnoughData> {
    let mut reader = SliceReader::new(data);
    let mut entries = Vec::new();
    let mut first_offset = None;
    while !reader.is_empty() {
        let res_type = ResourceType::from_type_code(reader.read_u8()?, map_version, legacy_codes);
        let number = reader.read_u16_le()?;
        let offset = reader.read_u32_le()?;
        let length = reader.read_u32_le()?;
        if res_type == ResourceType::Invalid {
            log::debug!("Chunk table ends at an unknown type before {:#x}", reader.tell());
            break;
        }
        entries.push(ChunkEntry {
            id: ResourceId::new(res_type, number),
            offset,
            length,
        });
        let first = *first_offset.get_or_insert(offset as usize);
        if reader.tell() >= first {
            break;
        }
    }
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use datalit::datalit;

    use super::*;

    #[test]
    fn table_ends_at_the_first_payload() {
        let data = datalit! {
            @endian = le,
            0x00, 5u16, 22u32, 3u32,
            0x02, 9u16, 25u32, 2u32,
            b"abc", b"de",
        };
        let entries = parse_table(&data, ResourceVersion::Sci2, false).unwrap();
        assert_eq!(
            entries,
            vec![
                ChunkEntry {
                    id: ResourceId::new(ResourceType::View, 5),
                    offset: 22,
                    length: 3,
                },
                ChunkEntry {
                    id: ResourceId::new(ResourceType::Script, 9),
                    offset: 25,
                    length: 2,
                },
            ]
        );
    }

    #[test]
    fn unknown_type_ends_the_table() {
        let data = datalit! {
            @endian = le,
            0x00, 5u16, 33u32, 1u32,
            0x0C, 0u16, 0u32, 0u32,
            0x02, 9u16, 34u32, 1u32,
            b"xy",
        };
        let entries = parse_table(&data, ResourceVersion::Sci2, false).unwrap();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn truncated_table_is_an_error() {
        let data = datalit! {
            @endian = le,
            0x00, 5u16, 100u32,
        };
        assert!(parse_table(&data, ResourceVersion::Sci2, false).is_err());
    }
}
