//! The files and embedded blobs resources are read from.

use std::{fmt, sync::Arc};

pub(crate) mod audio_volume;
pub(crate) mod chunk;
pub(crate) mod file_pool;
pub(crate) mod mac_fork;
pub(crate) mod patch;

pub use audio_volume::{AudioCodec, CompressedAudio};

/// Identifies a source within a [`SourceRegistry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SourceId(usize);

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// What a source is, and how its resources are read.
#[derive(Debug, Clone)]
pub enum SourceKind {
    /// The game directory, scanned for loose patch and audio files.
    Directory,
    /// A loose file holding one resource behind a small header.
    Patch,
    /// A volume holding resources behind entry headers.
    Volume { map: SourceId, number: u32 },
    /// An index file locating resources in the volumes linked to it.
    ExternalIndex { volume_number: u32 },
    /// An audio index stored as a map resource.
    InternalIndex { map_number: u16 },
    /// A volume of digital audio, possibly recompressed.
    AudioVolume {
        map: SourceId,
        number: u32,
        compression: Option<Arc<CompressedAudio>>,
    },
    /// An audio index file for the volumes linked to it.
    ExternalAudioIndex { volume_number: u32 },
    /// A loose RIFF or AIFF file used as an audio resource.
    WaveFile,
    /// A Macintosh resource fork.
    PlatformResourceFork { number: u32 },
    /// A chunk resource holding other resources.
    EmbeddedChunk { number: u16 },
}

impl SourceKind {
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            SourceKind::Directory => "directory",
            SourceKind::Patch => "patch",
            SourceKind::Volume { .. } => "volume",
            SourceKind::ExternalIndex { .. } => "index",
            SourceKind::InternalIndex { .. } => "audio map",
            SourceKind::AudioVolume { .. } => "audio volume",
            SourceKind::ExternalAudioIndex { .. } => "audio index",
            SourceKind::WaveFile => "wave file",
            SourceKind::PlatformResourceFork { .. } => "resource fork",
            SourceKind::EmbeddedChunk { .. } => "chunk",
        }
    }

    /// The volume number of a volume-like source, used to pair it with the
    /// entries of its index.
    fn volume_number(&self) -> Option<(SourceId, u32)> {
        match self {
            SourceKind::Volume { map, number } | SourceKind::AudioVolume { map, number, .. } => {
                Some((*map, *number))
            }
            _ => None,
        }
    }
}

/// How an entry from a source competes with an existing entry for the same
/// resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    /// Replaces entries from other volumes, but not overlays.
    Volume,
    /// Replaces any existing entry.
    Overlay,
}

#[derive(Debug, Clone)]
pub struct Source {
    location: String,
    kind: SourceKind,
    scanned: bool,
}

impl Source {
    /// The file name, or a description for sources that are not files.
    #[must_use]
    pub fn location(&self) -> &str {
        &self.location
    }

    #[must_use]
    pub fn kind(&self) -> &SourceKind {
        &self.kind
    }

    #[must_use]
    pub fn is_scanned(&self) -> bool {
        self.scanned
    }

    #[must_use]
    pub fn placement(&self) -> Placement {
        match self.kind {
            SourceKind::Patch | SourceKind::WaveFile | SourceKind::EmbeddedChunk { .. } => {
                Placement::Overlay
            }
            SourceKind::PlatformResourceFork { number } if number == mac_fork::PATCHES_FORK => {
                Placement::Overlay
            }
            _ => Placement::Volume,
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind.name(), self.location)
    }
}

/// Every source discovered for an archive, in discovery order.
#[derive(Debug, Clone, Default)]
pub struct SourceRegistry {
    sources: Vec<Source>,
}

impl SourceRegistry {
    pub(crate) fn add(&mut self, location: impl Into<String>, kind: SourceKind) -> SourceId {
        let location = location.into();
        log::debug!("Adding {} source {location}", kind.name());
        self.sources.push(Source {
            location,
            kind,
            scanned: false,
        });
        SourceId(self.sources.len() - 1)
    }

    /// The source for `id`. IDs are only handed out by this registry, so
    /// the source always exists.
    #[must_use]
    pub fn get(&self, id: SourceId) -> &Source {
        &self.sources[id.0]
    }

    pub fn iter(&self) -> impl Iterator<Item = (SourceId, &Source)> {
        self.sources
            .iter()
            .enumerate()
            .map(|(index, source)| (SourceId(index), source))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.sources.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// The volume linked to index `map` with the given number. When several
    /// match, the last one added wins.
    #[must_use]
    pub fn find_volume(&self, map: SourceId, number: u32) -> Option<SourceId> {
        self.sources
            .iter()
            .rposition(|source| source.kind.volume_number() == Some((map, number)))
            .map(SourceId)
    }

    /// The first source matching `predicate`.
    pub fn find(&self, predicate: impl Fn(&SourceKind) -> bool) -> Option<SourceId> {
        self.iter()
            .find(|(_, source)| predicate(&source.kind))
            .map(|(id, _)| id)
    }

    /// Marks the earliest unscanned source as scanned and returns it.
    pub(crate) fn next_unscanned(&mut self) -> Option<SourceId> {
        let index = self.sources.iter().position(|source| !source.scanned)?;
        self.sources[index].scanned = true;
        Some(SourceId(index))
    }
}
