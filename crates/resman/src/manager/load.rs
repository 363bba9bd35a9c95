//! Reading and decoding one resource from the source that supplies it.

use bytes::Bytes;

use crate::{
    catalog::Location,
    compression::{self, DecompressionError},
    errors::ArchiveError,
    ids::{ResourceId, ResourceType},
    sources::{
        SourceKind,
        audio_volume::{self, AUDIO_HEAD_LEN},
        mac_fork,
    },
    utils::{
        errors::{bail_other, ensure_other, prelude::*},
        mem_reader::SliceReader,
    },
    version::ResourceVersion,
    volume::{self, EntryHeader, VolumeError},
};

use super::ResourceManager;

impl ResourceManager {
    /// Decodes the bytes of a cataloged resource without touching its
    /// residency.
    pub(super) fn load(&mut self, id: ResourceId) -> Result<Bytes, ArchiveError> {
        let location = *self
            .catalog
            .get(&id)
            .ok_or_else_other(|| format!("{id} is not cataloged"))?
            .location();
        let source = self.sources.get(location.source());
        let name = source.location().to_string();
        log::trace!("Loading {id} from {source}");

        match source.kind().clone() {
            SourceKind::Volume { .. } => self.load_from_volume(id, &name, location),
            SourceKind::Patch | SourceKind::WaveFile => {
                Ok(self.read_range(&name, location.offset(), location.size())?)
            }
            SourceKind::AudioVolume { compression, .. } => {
                self.load_audio(id, &name, location, compression.is_some())
            }
            SourceKind::PlatformResourceFork { .. } => self.load_from_fork(id, &name, location),
            SourceKind::EmbeddedChunk { number } => self.load_from_chunk(id, number, location),
            kind @ (SourceKind::Directory
            | SourceKind::ExternalIndex { .. }
            | SourceKind::InternalIndex { .. }
            | SourceKind::ExternalAudioIndex { .. }) => {
                bail_other!("A {} cannot supply {}", kind.name(), id)
            }
        }
    }

    fn read_range(&mut self, name: &str, offset: u32, size: u32) -> std::io::Result<Bytes> {
        let data = self
            .files
            .read_vec(&*self.fs, name, u64::from(offset), size as usize)?;
        Ok(Bytes::from(data))
    }

    fn load_from_volume(
        &mut self,
        id: ResourceId,
        name: &str,
        location: Location,
    ) -> Result<Bytes, ArchiveError> {
        let Some(header_len) = volume::header_size(self.version.volume()) else {
            return Err(ArchiveError::InvalidEntry {
                id,
                source: VolumeError::UnsupportedLayout(self.version.volume()),
            });
        };
        let offset = u64::from(location.offset());
        let head = self
            .files
            .read_up_to(&*self.fs, name, offset, header_len)?;
        let header = EntryHeader::parse(
            &mut SliceReader::new(&head),
            &self.version,
            self.config.profile().legacy_type_codes(),
        )
        .map_err(|source| ArchiveError::InvalidEntry { id, source })?;
        if header.id() != id {
            log::warn!(
                "Entry at {offset:#x} in {name} holds {}, expected {id}",
                header.id()
            );
        }
        let method = header
            .method()
            .map_err(|source| ArchiveError::Decompression { id, source })?;

        let start = offset + header_len as u64;
        let end = start + u64::from(header.packed_size());
        let file_size = self.source_size(location.source())?;
        if end > file_size {
            return Err(ArchiveError::InvalidEntry {
                id,
                source: VolumeError::PastEnd { end, file_size },
            });
        }

        let packed = self
            .files
            .read_vec(&*self.fs, name, start, header.packed_size() as usize)?;
        let data = compression::unpack(method, &packed, header.unpacked_size() as usize)
            .map_err(|source| ArchiveError::Decompression { id, source })?;
        Ok(Bytes::from(data))
    }

    fn load_audio(
        &mut self,
        id: ResourceId,
        name: &str,
        location: Location,
        recompressed: bool,
    ) -> Result<Bytes, ArchiveError> {
        let raw = (recompressed
            && matches!(id.res_type(), ResourceType::Audio | ResourceType::Audio36))
            || self.version.map() < ResourceVersion::Sci11;
        if raw {
            return Ok(self.read_range(name, location.offset(), location.size())?);
        }

        let head = self.files.read_up_to(
            &*self.fs,
            name,
            u64::from(location.offset()),
            AUDIO_HEAD_LEN,
        )?;
        let payload =
            audio_volume::locate_payload(id, &head, location.size(), self.version.map())?;
        Ok(self.read_range(
            name,
            location.offset().saturating_add(payload.start),
            payload.size,
        )?)
    }

    fn load_from_fork(
        &mut self,
        id: ResourceId,
        name: &str,
        location: Location,
    ) -> Result<Bytes, ArchiveError> {
        let offset = u64::from(location.offset());
        let mut prefix = [0; 4];
        self.files.read_at(&*self.fs, name, offset, &mut prefix)?;
        let length = u32::from_be_bytes(prefix);
        if offset + 4 + u64::from(length) > self.source_size(location.source())? {
            return Err(ArchiveError::Decompression {
                id,
                source: DecompressionError::UnexpectedEnd,
            });
        }
        let raw = self
            .files
            .read_vec(&*self.fs, name, offset + 4, length as usize)?;
        let data = mac_fork::decode_payload(&raw, self.config.profile().fork_may_compress(id))
            .map_err(|source| ArchiveError::Decompression { id, source })?;
        Ok(Bytes::from(data))
    }

    fn load_from_chunk(
        &mut self,
        id: ResourceId,
        number: u16,
        location: Location,
    ) -> Result<Bytes, ArchiveError> {
        let chunk_id = ResourceId::new(ResourceType::Chunk, number);
        let chunk = self
            .resolve(chunk_id, false)?
            .ok_or_else_other(|| format!("{chunk_id} holding {id} is missing"))?;
        let start = location.offset() as usize;
        let end = start.saturating_add(location.size() as usize);
        ensure_other!(
            end <= chunk.len(),
            "{} runs past the end of {}",
            id,
            chunk_id
        );
        Ok(chunk.slice(start..end))
    }
}
