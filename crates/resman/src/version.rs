//! Archive layout generations and the heuristics that detect them.

use serde::{Deserialize, Serialize};

use crate::utils::mem_reader::{self, MemReader, SliceReader};

/// A layout generation of index or volume files. Generations are ordered
/// oldest to newest so that range comparisons read naturally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ResourceVersion {
    Unknown,
    Sci0Sci1Early,
    Sci1Middle,
    Kq5Fmt,
    Sci1Late,
    Sci11,
    Sci11Mac,
    Sci2,
    Sci3,
}

impl ResourceVersion {
    #[must_use]
    pub fn description(self) -> &'static str {
        match self {
            ResourceVersion::Unknown => "Unknown",
            ResourceVersion::Sci0Sci1Early => "SCI0 / Early SCI1",
            ResourceVersion::Sci1Middle => "Middle SCI1",
            ResourceVersion::Kq5Fmt => "KQ5 FM Towns",
            ResourceVersion::Sci1Late => "Late SCI1",
            ResourceVersion::Sci11 => "SCI1.1",
            ResourceVersion::Sci11Mac => "Mac SCI1.1+",
            ResourceVersion::Sci2 => "SCI2/2.1",
            ResourceVersion::Sci3 => "SCI3",
        }
    }
}

/// Which assignment of compression codes 1 and 2 an archive uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompressionEra {
    /// Code 1 is LZW and code 2 is Huffman.
    Early,
    /// Code 1 is Huffman and code 2 is LZW1.
    #[default]
    Late,
}

/// The reconciled layout of an archive: the generation of its index files,
/// the generation of its volume files, and its compression era.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ArchiveVersion {
    map: ResourceVersion,
    volume: ResourceVersion,
    era: CompressionEra,
}

impl ArchiveVersion {
    #[must_use]
    pub fn new(map: ResourceVersion, volume: ResourceVersion, era: CompressionEra) -> Self {
        ArchiveVersion { map, volume, era }
    }

    /// Combines the two detector results. A generation that could not be
    /// detected is taken from the other. Returns `None` when neither was
    /// detected.
    #[must_use]
    pub fn reconcile(map: ResourceVersion, volume: ResourceVersion) -> Option<Self> {
        let (map, volume) = match (map, volume) {
            (ResourceVersion::Unknown, ResourceVersion::Unknown) => return None,
            (ResourceVersion::Unknown, v) => (v, v),
            (m, ResourceVersion::Unknown) => (m, m),
            (m, v) => (m, v),
        };
        if map != volume {
            log::warn!(
                "Map version {} differs from volume version {}",
                map.description(),
                volume.description()
            );
        }
        Some(ArchiveVersion {
            map,
            volume,
            era: CompressionEra::Late,
        })
    }

    #[must_use]
    pub fn with_era(self, era: CompressionEra) -> Self {
        ArchiveVersion { era, ..self }
    }

    #[must_use]
    pub fn with_volume(self, volume: ResourceVersion) -> Self {
        ArchiveVersion { volume, ..self }
    }

    #[must_use]
    pub fn with_map(self, map: ResourceVersion) -> Self {
        ArchiveVersion { map, ..self }
    }

    #[must_use]
    pub fn map(&self) -> ResourceVersion {
        self.map
    }

    #[must_use]
    pub fn volume(&self) -> ResourceVersion {
        self.volume
    }

    #[must_use]
    pub fn era(&self) -> CompressionEra {
        self.era
    }
}

/// Classifies an index file from its contents. `volume_exists` answers
/// whether a volume with the given number is present, which separates
/// the two early layouts that share a record format.
#[must_use]
pub fn detect_map_version<F>(data: &[u8], volume_exists: F) -> ResourceVersion
where
    F: Fn(u32) -> bool,
{
    let len = data.len();
    if len >= 4 && data[len - 4..] == [0xFF; 4] {
        if len >= 7 && data[len - 7..len - 4] == [0xFF; 3] {
            return ResourceVersion::Kq5Fmt;
        }
        for record in data.chunks_exact(6) {
            if record[..3] == [0xFF; 3] {
                break;
            }
            let volume = u32::from(record[5] & 0xFC) >> 2;
            if !volume_exists(volume) {
                return ResourceVersion::Sci1Middle;
            }
        }
        return ResourceVersion::Sci0Sci1Early;
    }

    // Later layouts start with a directory of (type, offset) pairs ending in
    // a 0xFF entry that points at the end of the file.
    let mut reader = SliceReader::new(data);
    let mut detected = ResourceVersion::Unknown;
    let mut last_offset = 0u16;
    loop {
        let (Ok(dir_type), Ok(dir_offset)) = (reader.read_u8(), reader.read_u16_le()) else {
            break;
        };
        if dir_type < 0x80
            && matches!(detected, ResourceVersion::Unknown | ResourceVersion::Sci2)
        {
            detected = ResourceVersion::Sci2;
        } else if dir_type < 0x80 || ((dir_type & 0x7F) > 0x20 && dir_type != 0xFF) {
            break;
        }

        if usize::from(dir_offset) > len {
            break;
        }

        if last_offset != 0 && detected == ResourceVersion::Unknown {
            let size = dir_offset.wrapping_sub(last_offset);
            if size % 5 != 0 && size % 6 == 0 {
                detected = ResourceVersion::Sci1Late;
            }
            if size % 5 == 0 && size % 6 != 0 {
                detected = ResourceVersion::Sci11;
            }
        }

        if dir_type == 0xFF {
            if usize::from(dir_offset) != len {
                break;
            }
            return if detected == ResourceVersion::Unknown {
                ResourceVersion::Sci1Late
            } else {
                detected
            };
        }
        last_offset = dir_offset;
    }
    ResourceVersion::Unknown
}

/// The volume probe stops scanning once it passes this offset.
pub const VOLUME_PROBE_LIMIT: usize = 0x10_0000;

/// How much of a volume file [`detect_volume_version`] may need.
pub const VOLUME_PROBE_WINDOW: usize = VOLUME_PROBE_LIMIT + 16;

struct ProbeRecord {
    packed: u32,
    unpacked: u32,
    compression: u16,
}

fn read_probe_record(
    reader: &mut SliceReader<'_>,
    version: ResourceVersion,
) -> mem_reader::Result<ProbeRecord> {
    if version > ResourceVersion::Sci0Sci1Early {
        reader.read_u8()?;
    }
    reader.read_u16_le()?;
    let (packed, unpacked) = if version < ResourceVersion::Sci2 {
        (
            u32::from(reader.read_u16_le()?),
            u32::from(reader.read_u16_le()?),
        )
    } else {
        (reader.read_u32_le()?, reader.read_u32_le()?)
    };
    let compression = reader.read_u16_le()?;
    Ok(ProbeRecord {
        packed,
        unpacked,
        compression,
    })
}

/// Classifies a volume file by walking its entry headers, escalating
/// through header layouts until one yields a consistent walk. `data` only
/// needs to hold the first [`VOLUME_PROBE_WINDOW`] bytes.
#[must_use]
pub fn detect_volume_version(data: &[u8]) -> ResourceVersion {
    let mut version = ResourceVersion::Sci0Sci1Early;
    let mut sci11_aligned = false;
    let mut reader = SliceReader::new(data);

    while reader.tell() < VOLUME_PROBE_LIMIT {
        let Ok(record) = read_probe_record(&mut reader, version) else {
            return version;
        };

        let max_compression = match version {
            ResourceVersion::Sci0Sci1Early => 4,
            v if v < ResourceVersion::Sci2 => 20,
            _ => 32,
        };
        // Uncompressed early entries count the compression field and
        // unpacked size as part of the packed size.
        let size_adjust = if version < ResourceVersion::Sci11 { 4 } else { 0 };

        let inconsistent = (version < ResourceVersion::Sci2
            && record.compression > max_compression)
            || (version == ResourceVersion::Sci2
                && record.compression != 0
                && record.compression != 32)
            || (record.compression == 0
                && record.packed != record.unpacked.wrapping_add(size_adjust))
            || record.unpacked < record.packed.wrapping_sub(size_adjust);

        if inconsistent {
            version = match version {
                ResourceVersion::Sci0Sci1Early => ResourceVersion::Sci1Late,
                ResourceVersion::Sci1Late => ResourceVersion::Sci11,
                ResourceVersion::Sci11 if !sci11_aligned => {
                    sci11_aligned = true;
                    ResourceVersion::Sci11
                }
                ResourceVersion::Sci11 => ResourceVersion::Sci2,
                ResourceVersion::Sci2 => ResourceVersion::Sci3,
                _ => return ResourceVersion::Unknown,
            };
            reader = SliceReader::new(data);
            continue;
        }

        let skip = if version < ResourceVersion::Sci11 {
            record.packed.saturating_sub(4)
        } else if version == ResourceVersion::Sci11 && sci11_aligned && (9 + record.packed) % 2 == 1
        {
            record.packed + 1
        } else {
            record.packed
        };
        let Ok(skip) = usize::try_from(skip) else {
            return version;
        };
        if reader.skip(skip).is_err() {
            return version;
        }
    }
    version
}
