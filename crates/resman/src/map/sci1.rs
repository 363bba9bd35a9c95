//! Type-bucketed indexes: a directory of `(type, offset)` triples followed
//! by per-type record arrays.

use itertools::Itertools as _;

use crate::{
    ids::{ResourceId, ResourceType},
    utils::mem_reader::{MemReader, SliceReader},
    version::ResourceVersion,
};

use super::{MapEntry, MapError};

const DIRECTORY_END: u8 = 0x1F;

fn record_size(version: ResourceVersion) -> usize {
    if version == ResourceVersion::Sci11 { 5 } else { 6 }
}

/// Parses a type-bucketed index. `base_volume` is the number of the index
/// file itself, added to every record's volume number.
pub(crate) fn parse(
    data: &[u8],
    version: ResourceVersion,
    legacy_codes: bool,
    base_volume: u32,
) -> Result<Vec<MapEntry>, MapError> {
    if version < ResourceVersion::Sci1Late || version == ResourceVersion::Sci11Mac {
        return Err(MapError::UnsupportedLayout(version));
    }
    let mut reader = SliceReader::new(data);
    let mut directory = Vec::new();
    loop {
        let type_code = reader.read_u8()? & 0x1F;
        let offset = usize::from(reader.read_u16_le()?);
        directory.push((type_code, offset));
        if type_code == DIRECTORY_END {
            break;
        }
    }

    let record_size = record_size(version);
    let mut entries = Vec::new();
    for (&(type_code, start), &(_, end)) in directory.iter().tuple_windows() {
        let span = end.checked_sub(start).ok_or_else(|| {
            MapError::BadDirectory(format!(
                "records for type {type_code:#04x} end at {end:#x} before they start at {start:#x}"
            ))
        })?;
        let count = span / record_size;
        let res_type = ResourceType::from_type_code(type_code, version, legacy_codes);
        if res_type == ResourceType::Invalid {
            log::debug!("Skipping {count} records of unknown type {type_code:#04x}");
            continue;
        }

        let mut records = reader.sub_reader(start, count * record_size)?;
        for _ in 0..count {
            let number = records.read_u16_le()?;
            let (volume, offset) = match version {
                ResourceVersion::Sci11 => (0, records.read_u24_le()? << 1),
                ResourceVersion::Sci2 | ResourceVersion::Sci3 => (0, records.read_u32_le()?),
                _ => {
                    let raw = records.read_u32_le()?;
                    (raw >> 28, raw & 0x0FFF_FFFF)
                }
            };
            entries.push(MapEntry::new(
                ResourceId::new(res_type, number),
                base_volume + volume,
                offset,
            ));
        }
    }
    Ok(entries)
}
