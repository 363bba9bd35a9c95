//! Audio maps: the external SCI1 audio index and the SCI1.1+ audio maps
//! stored as `Map` resources.

use std::io;

use crate::{
    ids::{ResourceId, ResourceType},
    utils::mem_reader::{MemReader, SliceReader},
    version::ResourceVersion,
};

use super::{MapEntry, MapError};

/// Number of the map resource that indexes sound effects.
pub(crate) const SFX_MAP: u16 = 65535;

/// Type code old-style external audio maps store in the top bits of each
/// number.
const OLD_AUDIO_TYPE: u16 = 13;

const SYNC_FLAG: u32 = 0x80;
const RAVE_FLAG: u32 = 0x40;
const TUPLE_MASK: u32 = 0xFFFF_FF3F;

/// Parses an external SCI1 audio map (`audioNNN.map`). Volume numbers in
/// the entries are relative to the map.
pub(crate) fn parse_external(data: &[u8]) -> Result<Vec<MapEntry>, MapError> {
    let mut reader = SliceReader::new(data);
    let old_format = reader.clone().read_u16_le()? >> 11 == OLD_AUDIO_TYPE;
    let mut entries = Vec::new();
    loop {
        let number = reader.read_u16_le()?;
        if number == 0xFFFF {
            break;
        }
        let location = reader.read_u32_le()?;
        let size = reader.read_u32_le()?;
        let (number, volume, offset) = if old_format {
            (number & 0x7FF, location >> 25, location & 0x01FF_FFFF)
        } else {
            (number, location >> 28, location & 0x0FFF_FFFF)
        };
        entries.push(
            MapEntry::new(ResourceId::new(ResourceType::Audio, number), volume, offset)
                .with_size(size),
        );
    }
    Ok(entries)
}

/// Parses a SCI1.1+ audio map resource. All entries refer to the single
/// audio volume paired with the map. `read_volume` fills a buffer from
/// the audio volume at an absolute offset; only the floppy layout, which
/// does not record sizes, uses it.
pub(crate) fn parse_internal<R>(
    data: &[u8],
    map_number: u16,
    volume_version: ResourceVersion,
    rave_lip_sync: bool,
    read_volume: R,
) -> Result<Vec<MapEntry>, MapError>
where
    R: FnMut(u64, &mut [u8]) -> io::Result<()>,
{
    let entry_size = if volume_version >= ResourceVersion::Sci2 {
        11
    } else {
        data.iter().rev().take_while(|&&b| b == 0xFF).count()
    };
    let reader = SliceReader::new(data);

    if map_number == SFX_MAP {
        parse_sfx(reader, entry_size)
    } else if map_number == 0 && entry_size == 10 && data.get(3) == Some(&0) {
        parse_demo(reader)
    } else if map_number == 0 && entry_size == 8 && data.get(2..4) == Some(&[0xFF, 0xFF][..]) {
        parse_floppy(reader, read_volume)
    } else {
        parse_tuples(reader, map_number, entry_size, rave_lip_sync)
    }
}

fn parse_sfx(mut reader: SliceReader<'_>, entry_size: usize) -> Result<Vec<MapEntry>, MapError> {
    let mut entries = Vec::new();
    let mut offset = 0u32;
    while !reader.is_empty() {
        let number = reader.read_u16_le()?;
        if number == 0xFFFF {
            break;
        }
        offset = if entry_size == 6 {
            reader.read_u32_le()?
        } else {
            offset.wrapping_add(reader.read_u24_le()?)
        };
        entries.push(MapEntry::new(
            ResourceId::new(ResourceType::Audio, number),
            0,
            offset,
        ));
    }
    Ok(entries)
}

fn parse_demo(mut reader: SliceReader<'_>) -> Result<Vec<MapEntry>, MapError> {
    let mut entries = Vec::new();
    while !reader.is_empty() {
        let number = reader.read_u16_be()?;
        if number == 0xFFFF {
            break;
        }
        let offset = reader.read_u32_le()?;
        let size = reader.read_u32_le()?;
        entries.push(
            MapEntry::new(ResourceId::new(ResourceType::Audio, number), 0, offset)
                .with_size(size),
        );
    }
    Ok(entries)
}

fn parse_floppy<R>(mut reader: SliceReader<'_>, mut read_volume: R) -> Result<Vec<MapEntry>, MapError>
where
    R: FnMut(u64, &mut [u8]) -> io::Result<()>,
{
    let mut entries = Vec::new();
    while !reader.is_empty() {
        let number = reader.read_u16_le()?;
        reader.skip(2)?;
        if number == 0xFFFF {
            break;
        }
        let offset = reader.read_u32_le()?;

        let mut header = [0u8; 13];
        read_volume(u64::from(offset), &mut header)?;
        let header_size = header[1];
        if header_size != 11 && header_size != 12 {
            return Err(MapError::BadAudioHeader {
                number,
                size: header_size,
            });
        }
        let sample_size = u32::from_le_bytes([header[9], header[10], header[11], header[12]]);
        let size = sample_size
            .saturating_add(u32::from(header_size))
            .saturating_add(2);
        entries.push(
            MapEntry::new(ResourceId::new(ResourceType::Audio, number), 0, offset)
                .with_size(size),
        );
    }
    Ok(entries)
}

fn parse_tuples(
    mut reader: SliceReader<'_>,
    map_number: u16,
    entry_size: usize,
    rave_lip_sync: bool,
) -> Result<Vec<MapEntry>, MapError> {
    let is_early = entry_size != 11;
    let mut entries = Vec::new();
    let mut offset = if is_early { 0 } else { reader.read_u32_le()? };

    while !reader.is_empty() {
        let key = reader.read_u32_be()?;
        if key & 0xFF == 0xFF {
            if reader.remaining() >= entry_size {
                log::warn!(
                    "Audio map {map_number} has {} bytes after its end marker",
                    reader.remaining()
                );
            }
            break;
        }
        offset = if is_early {
            reader.read_u32_le()?
        } else {
            offset.wrapping_add(reader.read_u24_le()?)
        };
        let tuple = key & TUPLE_MASK;
        let id = |res_type| ResourceId::with_tuple(res_type, map_number, tuple);

        let mut sync_size = 0u32;
        if is_early || key & SYNC_FLAG != 0 {
            sync_size = u32::from(reader.read_u16_le()?);
            if sync_size > 0 {
                entries
                    .push(MapEntry::new(id(ResourceType::Sync36), 0, offset).with_size(sync_size));
            }
        }
        if rave_lip_sync && key & RAVE_FLAG != 0 {
            let lip_size = u32::from(reader.read_u16_le()?);
            if lip_size > 0 {
                entries.push(
                    MapEntry::new(id(ResourceType::Rave), 0, offset.wrapping_add(sync_size))
                        .with_size(lip_size),
                );
                sync_size += lip_size;
            }
        }
        entries.push(MapEntry::new(
            id(ResourceType::Audio36),
            0,
            offset.wrapping_add(sync_size),
        ));
    }
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use datalit::datalit;

    use super::*;

    fn no_volume(_: u64, _: &mut [u8]) -> io::Result<()> {
        panic!("volume should not be read")
    }

    fn audio(number: u16) -> ResourceId {
        ResourceId::new(ResourceType::Audio, number)
    }

    #[test]
    fn external_old_format_uses_seven_volume_bits() {
        let data = datalit! {
            @endian = le,
            26649u16, 0x0400_1234u32, 500u32,
            0xFFFF,
        };
        let entries = parse_external(&data).unwrap();
        assert_eq!(entries, vec![MapEntry::new(audio(25), 2, 0x1234).with_size(500)]);
    }

    #[test]
    fn external_new_format_uses_four_volume_bits() {
        let data = datalit! {
            @endian = le,
            25u16, 0x1000_0040u32, 64u32,
            26u16, 0x0000_0080u32, 32u32,
            0xFFFF, 0x0000_0000, 0x0000_0000,
        };
        let entries = parse_external(&data).unwrap();
        assert_eq!(
            entries,
            vec![
                MapEntry::new(audio(25), 1, 0x40).with_size(64),
                MapEntry::new(audio(26), 0, 0x80).with_size(32),
            ]
        );
    }

    #[test]
    fn sfx_map_with_delta_offsets() {
        let data = datalit! {
            @endian = le,
            1u16, 0x000100,
            2u16, 0x500000,
            0xFFFF_FFFF_FF,
        };
        let entries =
            parse_internal(&data, SFX_MAP, ResourceVersion::Sci11, false, no_volume).unwrap();
        assert_eq!(
            entries,
            vec![
                MapEntry::new(audio(1), 0, 0x100),
                MapEntry::new(audio(2), 0, 0x150),
            ]
        );
    }

    #[test]
    fn sfx_map_with_absolute_offsets() {
        let data = datalit! {
            @endian = le,
            1u16, 0x0000_1000u32,
            0xFFFF_FFFF_FFFF,
        };
        let entries =
            parse_internal(&data, SFX_MAP, ResourceVersion::Sci11, false, no_volume).unwrap();
        assert_eq!(entries, vec![MapEntry::new(audio(1), 0, 0x1000)]);
    }

    #[test]
    fn demo_map_has_big_endian_numbers_and_sizes() {
        let data = datalit! {
            @endian = le,
            5u16be, 0x10u32, 0x30u32,
            0xFFFF_FFFF_FFFF_FFFF_FFFF,
        };
        let entries = parse_internal(&data, 0, ResourceVersion::Sci11, false, no_volume).unwrap();
        assert_eq!(entries, vec![MapEntry::new(audio(5), 0, 0x10).with_size(0x30)]);
    }

    #[test]
    fn floppy_map_reads_sizes_from_the_volume() {
        let data = datalit! {
            @endian = le,
            3u16, 0xFFFF, 0x40u32,
            0xFFFF_FFFF_FFFF_FFFF,
        };
        let header = datalit! {
            @endian = le,
            0x8D, 12u8, b"SOL\0", 22050u16, 0x00, 0x1000u32,
        };
        let entries = parse_internal(&data, 0, ResourceVersion::Sci11, false, |offset, buf| {
            assert_eq!(offset, 0x40);
            buf.copy_from_slice(&header[..buf.len()]);
            Ok(())
        })
        .unwrap();
        assert_eq!(
            entries,
            vec![MapEntry::new(audio(3), 0, 0x40).with_size(0x1000 + 14)]
        );
    }

    #[test]
    fn floppy_map_rejects_unknown_header_sizes() {
        let data = datalit! {
            @endian = le,
            3u16, 0xFFFF, 0x40u32,
            0xFFFF_FFFF_FFFF_FFFF,
        };
        let result = parse_internal(&data, 0, ResourceVersion::Sci11, false, |_, buf| {
            buf.fill(0);
            buf[1] = 7;
            Ok(())
        });
        assert!(matches!(
            result,
            Err(MapError::BadAudioHeader { number: 3, size: 7 })
        ));
    }

    #[test]
    fn early_tuple_map_always_has_a_sync_size() {
        let data = datalit! {
            @endian = le,
            0x01020304, 0x1000u32, 0x20u16,
            0xFFFF_FFFF_FFFF_FFFF_FFFF,
        };
        let entries =
            parse_internal(&data, 100, ResourceVersion::Sci11, false, no_volume).unwrap();
        let tuple = 0x0102_0304;
        assert_eq!(
            entries,
            vec![
                MapEntry::new(ResourceId::with_tuple(ResourceType::Sync36, 100, tuple), 0, 0x1000)
                    .with_size(0x20),
                MapEntry::new(
                    ResourceId::with_tuple(ResourceType::Audio36, 100, tuple),
                    0,
                    0x1020
                ),
            ]
        );
    }

    #[test]
    fn late_tuple_map_uses_flags_and_running_offsets() {
        let data = datalit! {
            @endian = le,
            0x2000u32,
            0x050607C1, 0x100000, 8u16, 4u16,
            0x00000102, 0x000100,
            0xFFFF_FFFF_FFFF_FFFF_FFFF_FF,
        };
        let entries =
            parse_internal(&data, 200, ResourceVersion::Sci11, true, no_volume).unwrap();
        let first = 0x0506_0701;
        assert_eq!(
            entries,
            vec![
                MapEntry::new(ResourceId::with_tuple(ResourceType::Sync36, 200, first), 0, 0x2010)
                    .with_size(8),
                MapEntry::new(ResourceId::with_tuple(ResourceType::Rave, 200, first), 0, 0x2018)
                    .with_size(4),
                MapEntry::new(
                    ResourceId::with_tuple(ResourceType::Audio36, 200, first),
                    0,
                    0x201C
                ),
                MapEntry::new(
                    ResourceId::with_tuple(ResourceType::Audio36, 200, 0x0000_0102),
                    0,
                    0x2110
                ),
            ]
        );
    }
}
