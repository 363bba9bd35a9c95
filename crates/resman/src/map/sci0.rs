//! Flat six-byte (seven for the FM-Towns layout) index records.

use crate::{
    ids::{ResourceId, ResourceType},
    utils::mem_reader::{MemReader, SliceReader},
    version::ResourceVersion,
};

use super::{MapEntry, MapError};

const END_OF_MAP: u32 = 0xFFFF_FFFF;

/// The entries of a flat index and the layout they were finally read with.
#[derive(Debug)]
pub(crate) struct FlatMap {
    pub(crate) entries: Vec<MapEntry>,
    pub(crate) version: ResourceVersion,
}

fn volume_shift(version: ResourceVersion) -> u32 {
    if version >= ResourceVersion::Sci1Middle {
        28
    } else {
        26
    }
}

/// Parses a flat index. If a record names a volume `volume_exists` rejects,
/// and the volume layout differs from the index layout, the rest of the
/// index is read as the volume layout instead.
pub(crate) fn parse<F>(
    data: &[u8],
    map_version: ResourceVersion,
    volume_version: ResourceVersion,
    legacy_codes: bool,
    volume_exists: F,
) -> Result<FlatMap, MapError>
where
    F: Fn(u32) -> bool,
{
    let mut version = map_version;
    let mut reader = SliceReader::new(data);
    let mut entries = Vec::new();

    while !reader.is_empty() {
        let type_byte = if version == ResourceVersion::Kq5Fmt {
            Some(reader.read_u8()?)
        } else {
            None
        };
        let word = reader.read_u16_le()?;
        let location = reader.read_u32_le()?;
        if location == END_OF_MAP {
            break;
        }

        let id = match type_byte {
            Some(code) => ResourceId::new(
                ResourceType::from_type_code(code, version, legacy_codes),
                word,
            ),
            None => {
                #[expect(clippy::cast_possible_truncation, reason = "five bits remain")]
                let code = (word >> 11) as u8;
                ResourceId::new(
                    ResourceType::from_type_code(code, version, legacy_codes),
                    word & 0x7FF,
                )
            }
        };

        let mut volume = location >> volume_shift(version);
        if !volume_exists(volume) {
            if version == volume_version {
                return Err(MapError::MissingVolume { id, volume });
            }
            log::warn!(
                "Volume {volume} for {id} not found, retrying with the {} layout",
                volume_version.description()
            );
            version = volume_version;
            volume = location >> volume_shift(version);
            if !volume_exists(volume) {
                return Err(MapError::MissingVolume { id, volume });
            }
        }
        let offset = location & ((1 << volume_shift(version)) - 1);
        entries.push(MapEntry::new(id, volume, offset));
    }

    Ok(FlatMap { entries, version })
}
