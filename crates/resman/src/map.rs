//! Index tables that locate resources inside volume files.

use std::io;

use crate::{ids::ResourceId, utils::mem_reader::NotEnoughData, version::ResourceVersion};

pub(crate) mod audio;
pub(crate) mod sci0;
pub(crate) mod sci1;

/// One resource location read from an index. `volume` is the volume number
/// the index refers to; `size` is zero when the index does not record it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct MapEntry {
    pub(crate) id: ResourceId,
    pub(crate) volume: u32,
    pub(crate) offset: u32,
    pub(crate) size: u32,
}

impl MapEntry {
    pub(crate) fn new(id: ResourceId, volume: u32, offset: u32) -> Self {
        MapEntry {
            id,
            volume,
            offset,
            size: 0,
        }
    }

    #[must_use]
    pub(crate) fn with_size(self, size: u32) -> Self {
        MapEntry { size, ..self }
    }
}

#[derive(Debug, thiserror::Error)]
pub(crate) enum MapError {
    #[error("Index ended in the middle of a record")]
    Truncated(#[from] NotEnoughData),
    #[error("Malformed type directory: {0}")]
    BadDirectory(String),
    #[error("Volume {volume} referenced by {id} does not exist")]
    MissingVolume { id: ResourceId, volume: u32 },
    #[error("Index layout {} cannot be read by this parser", .0.description())]
    UnsupportedLayout(ResourceVersion),
    #[error("Audio resource {number} has unexpected header size {size}")]
    BadAudioHeader { number: u16, size: u8 },
    #[error(transparent)]
    Io(#[from] io::Error),
}
