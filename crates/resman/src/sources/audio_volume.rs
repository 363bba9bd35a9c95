//! Audio volumes: raw or compressed containers of digital audio and
//! lip-sync data located through an audio index.

use std::collections::HashMap;

use crate::{
    ids::{ResourceId, ResourceType},
    utils::{
        errors::{OtherError, bail_other, ensure_other},
        mem_reader::{MemReader, SliceReader},
    },
    version::ResourceVersion,
};

/// Bytes read from an entry to locate its payload.
pub(crate) const AUDIO_HEAD_LEN: usize = 13;

/// The codec of a recompressed audio volume.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioCodec {
    Mp3,
    Ogg,
    Flac,
}

impl AudioCodec {
    pub(crate) fn from_tag(tag: &[u8]) -> Option<Self> {
        match tag {
            b"MP3 " => Some(AudioCodec::Mp3),
            b"OGG " => Some(AudioCodec::Ogg),
            b"FLAC" => Some(AudioCodec::Flac),
            _ => None,
        }
    }
}

/// Where a relocated entry lives in a recompressed volume.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Relocation {
    pub(crate) offset: u32,
    pub(crate) size: u32,
}

/// The relocation table of a recompressed audio volume, mapping offsets
/// from the original volume to offsets in the recompressed one.
#[derive(Debug, Clone)]
pub struct CompressedAudio {
    codec: AudioCodec,
    relocations: HashMap<u32, Relocation>,
}

impl CompressedAudio {
    /// Parses the table following the codec tag: a count, then pairs of
    /// original and recompressed offsets. Each entry runs to the next one,
    /// the last to the end of the file.
    pub(crate) fn parse(
        codec: AudioCodec,
        table: &[u8],
        file_size: u64,
    ) -> Result<Self, OtherError> {
        let mut reader = SliceReader::new(table);
        let count = reader
            .read_u32_le()
            .map_err(|_| OtherError::from_msg("Relocation table has no count"))?;
        ensure_other!(count > 0, "Relocation table is empty");

        let mut pairs = Vec::new();
        for _ in 0..count {
            let original = reader.read_u32_le();
            let compressed = reader.read_u32_le();
            let (Ok(original), Ok(compressed)) = (original, compressed) else {
                bail_other!("Relocation table is shorter than its {} entries", count);
            };
            pairs.push((original, compressed));
        }

        let file_end = u32::try_from(file_size).unwrap_or(u32::MAX);
        let mut relocations = HashMap::with_capacity(pairs.len());
        for (index, &(original, compressed)) in pairs.iter().enumerate() {
            let end = pairs.get(index + 1).map_or(file_end, |&(_, next)| next);
            relocations.insert(
                original,
                Relocation {
                    offset: compressed,
                    size: end.saturating_sub(compressed),
                },
            );
        }
        Ok(CompressedAudio { codec, relocations })
    }

    /// Byte length of the table for `count` entries, after the tag.
    pub(crate) fn table_len(count: u32) -> usize {
        4 + count as usize * 8
    }

    #[must_use]
    pub fn codec(&self) -> AudioCodec {
        self.codec
    }

    pub(crate) fn relocate(&self, offset: u32) -> Option<Relocation> {
        self.relocations.get(&offset).copied()
    }
}

/// The part of an entry that forms the resource, relative to the entry's
/// offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Payload {
    pub(crate) start: u32,
    pub(crate) size: u32,
}

/// Locates the payload of an entry in an uncompressed SCI1.1-or-later
/// audio volume from its first [`AUDIO_HEAD_LEN`] bytes. `indexed_size` is
/// the size the audio index recorded.
pub(crate) fn locate_payload(
    id: ResourceId,
    head: &[u8],
    indexed_size: u32,
    map_version: ResourceVersion,
) -> Result<Payload, OtherError> {
    if head.starts_with(b"RIFF") {
        let Some(length) = head.get(4..8) else {
            bail_other!("RIFF header of {} is truncated", id);
        };
        let length = u32::from_le_bytes([length[0], length[1], length[2], length[3]]);
        return Ok(Payload {
            start: 0,
            size: length.saturating_add(8),
        });
    }
    if id.res_type() == ResourceType::Rave {
        return Ok(Payload {
            start: 0,
            size: indexed_size,
        });
    }

    let mut reader = SliceReader::new(head);
    let type_code = reader.read_u8();
    let header_size = reader.read_u8();
    let (Ok(type_code), Ok(header_size)) = (type_code, header_size) else {
        bail_other!("Audio entry for {} is truncated", id);
    };
    let found = ResourceType::from_type_code(type_code, map_version, false);
    let expected = match id.res_type() {
        ResourceType::Audio | ResourceType::Audio36 => ResourceType::Audio,
        ResourceType::Sync | ResourceType::Sync36 => ResourceType::Sync,
        other => other,
    };
    if found != expected {
        bail_other!("Audio volume entry for {} has type {}", id, found);
    }

    if expected != ResourceType::Audio {
        return Ok(Payload {
            start: 2,
            size: indexed_size,
        });
    }
    match header_size {
        7 => Ok(Payload {
            start: 0,
            size: indexed_size,
        }),
        11 | 12 => {
            reader
                .seek_to(9)
                .and_then(|()| reader.read_u32_le())
                .map(|length| Payload {
                    start: 0,
                    size: length.saturating_add(u32::from(header_size) + 2),
                })
                .map_err(|_| OtherError::from_msg(format!("SOL header of {id} is truncated")))
        }
        other => bail_other!("Audio {} has unsupported header size {}", id, other),
    }
}
