//! Source discovery, layout detection, and cataloging of each source.

use std::{io, sync::Arc};

use crate::{
    catalog::Location,
    errors::ArchiveError,
    fs::{read_file, read_head},
    ids::{ALL_RESOURCE_TYPES, ResourceId, ResourceType},
    map::{self, audio::SFX_MAP},
    sources::{
        Placement, SourceId, SourceKind,
        audio_volume::{AudioCodec, CompressedAudio},
        chunk,
        mac_fork::{self, FORK_HEADER_LEN, ForkHeader, PATCHES_FORK},
        patch::{self, Audio36Kind, PATCH_HEAD_LEN, PatchLayout},
    },
    utils::errors::{bail_other, ensure_other, prelude::*},
    version::{
        ArchiveVersion, CompressionEra, ResourceVersion, VOLUME_PROBE_WINDOW, detect_map_version,
        detect_volume_version,
    },
};

use super::ResourceManager;

/// The number in an all-digit file extension.
fn extension_number(name: &str) -> Option<u32> {
    let (_, extension) = name.rsplit_once('.')?;
    if extension.is_empty() || !extension.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    extension.parse().ok()
}

/// The number of a resource fork named `Data<n>` or `Patches`, with an
/// optional `.rsrc` extension.
fn fork_number(name: &str) -> Option<u32> {
    let lower = name.to_ascii_lowercase();
    let stem = lower.strip_suffix(".rsrc").unwrap_or(&lower);
    if stem == "patches" {
        return Some(PATCHES_FORK);
    }
    let digits = stem.strip_prefix("data")?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// The number of an external audio map named `audioNNN.map`.
fn audio_map_number(name: &str) -> Option<u16> {
    name.get(5..8)?.parse().ok()
}

impl ResourceManager {
    fn location_of(&self, source: SourceId) -> String {
        self.sources.get(source).location().to_string()
    }

    /// Registers the index and volume files, the game directory, and the
    /// message and alternate resource pairs.
    pub(super) fn add_primary_sources(&mut self) -> Result<(), ArchiveError> {
        if let Some(map_name) = self.listing.find("resource.map").map(str::to_string) {
            let map = self
                .sources
                .add(map_name, SourceKind::ExternalIndex { volume_number: 0 });
            for name in self.listing.matching(&["resource.[0-9][0-9][0-9]"]) {
                if let Some(number) = extension_number(&name) {
                    self.sources.add(name, SourceKind::Volume { map, number });
                }
            }
        } else if !self.add_fork_sources() && !self.add_split_sources() {
            return Err(ArchiveError::SourceNotFound {
                name: "resource.map".to_string(),
            });
        }

        self.sources.add(self.fs.describe(), SourceKind::Directory);
        self.add_pair("message.map", "resource.msg");
        self.add_pair("altres.map", "altres.000");
        Ok(())
    }

    fn add_fork_sources(&mut self) -> bool {
        let forks: Vec<(String, u32)> = self
            .listing
            .names()
            .filter_map(|name| fork_number(name).map(|number| (name.to_string(), number)))
            .collect();
        let found = !forks.is_empty();
        for (name, number) in forks {
            self.sources
                .add(name, SourceKind::PlatformResourceFork { number });
        }
        found
    }

    /// Registers `resmap.NNN`/`ressci.NNN` pairs, numbered by extension.
    fn add_split_sources(&mut self) -> bool {
        let mut found = false;
        for map_name in self
            .listing
            .matching(&["resmap.[0-9][0-9][0-9]", "resmap.pat"])
        {
            let Some((_, extension)) = map_name.rsplit_once('.') else {
                continue;
            };
            let number = extension_number(&map_name).unwrap_or(PATCHES_FORK);
            let Some(volume_name) = self
                .listing
                .find(&format!("ressci.{extension}"))
                .map(str::to_string)
            else {
                log::warn!("Index {map_name} has no matching volume");
                continue;
            };
            let map = self.sources.add(
                map_name,
                SourceKind::ExternalIndex {
                    volume_number: number,
                },
            );
            self.sources.add(volume_name, SourceKind::Volume { map, number });
            found = true;
        }
        found
    }

    fn add_pair(&mut self, map_name: &str, volume_name: &str) {
        let (Some(map_name), Some(volume_name)) =
            (self.listing.find(map_name), self.listing.find(volume_name))
        else {
            return;
        };
        let (map_name, volume_name) = (map_name.to_string(), volume_name.to_string());
        let map = self
            .sources
            .add(map_name, SourceKind::ExternalIndex { volume_number: 0 });
        self.sources
            .add(volume_name, SourceKind::Volume { map, number: 0 });
    }

    /// Detects the index and volume layouts from the first index and volume.
    pub(super) fn detect_version(&mut self) -> Result<(), ArchiveError> {
        if self
            .sources
            .find(|kind| matches!(kind, SourceKind::PlatformResourceFork { .. }))
            .is_some()
        {
            self.version = ArchiveVersion::new(
                ResourceVersion::Sci11Mac,
                ResourceVersion::Sci11Mac,
                CompressionEra::Late,
            );
            return Ok(());
        }

        let map_version = match self
            .sources
            .find(|kind| matches!(kind, SourceKind::ExternalIndex { .. }))
        {
            Some(index) => {
                let data = read_file(&*self.fs, self.sources.get(index).location())?;
                detect_map_version(&data, |number| {
                    self.sources.find_volume(index, number).is_some()
                })
            }
            None => ResourceVersion::Unknown,
        };
        let volume_version = match self
            .sources
            .find(|kind| matches!(kind, SourceKind::Volume { .. }))
        {
            Some(volume) => {
                let data = self.files.read_up_to(
                    &*self.fs,
                    self.sources.get(volume).location(),
                    0,
                    VOLUME_PROBE_WINDOW,
                )?;
                detect_volume_version(&data)
            }
            None => ResourceVersion::Unknown,
        };
        log::debug!(
            "Detected index layout {} and volume layout {}",
            map_version.description(),
            volume_version.description()
        );

        let mut version =
            ArchiveVersion::reconcile(map_version, volume_version).ok_or(ArchiveError::UnknownFormat)?;
        if version.volume() == ResourceVersion::Sci3 && version.map() < ResourceVersion::Sci2 {
            log::warn!("Treating the index as SCI3 to match its volumes");
            version = version.with_map(ResourceVersion::Sci3);
        }
        if version.map() == ResourceVersion::Sci3 && version.volume() == ResourceVersion::Sci2 {
            version = version.with_volume(ResourceVersion::Sci3);
        }
        self.version = version;
        Ok(())
    }

    /// Scans every source that has not been scanned yet, including sources
    /// added while scanning. A failing source is skipped.
    pub(super) fn scan_pending(&mut self) {
        while let Some(source) = self.sources.next_unscanned() {
            if let Err(err) = self.scan_source(source) {
                log::warn!("Skipping {}: {err}", self.sources.get(source));
            }
        }
    }

    fn scan_source(&mut self, source: SourceId) -> Result<(), ArchiveError> {
        match self.sources.get(source).kind().clone() {
            SourceKind::Directory => {
                self.scan_directory();
                Ok(())
            }
            SourceKind::ExternalIndex { volume_number } => self.scan_index(source, volume_number),
            SourceKind::InternalIndex { map_number } => {
                self.scan_internal_audio_index(source, map_number)
            }
            SourceKind::ExternalAudioIndex { .. } => self.scan_external_audio_index(source),
            SourceKind::PlatformResourceFork { .. } => self.scan_fork(source),
            SourceKind::EmbeddedChunk { number } => self.scan_chunk(source, number),
            SourceKind::Patch
            | SourceKind::Volume { .. }
            | SourceKind::AudioVolume { .. }
            | SourceKind::WaveFile => Ok(()),
        }
    }

    pub(super) fn source_size(&mut self, source: SourceId) -> io::Result<u64> {
        if let Some(&size) = self.file_sizes.get(&source) {
            return Ok(size);
        }
        let size = self.fs.file_size(self.sources.get(source).location())?;
        self.file_sizes.insert(source, size);
        Ok(size)
    }

    /// Catalogs one index entry, translating offsets of recompressed audio
    /// and dropping entries that lie outside their volume.
    fn add_entry(&mut self, id: ResourceId, source: SourceId, offset: u32, size: u32) {
        let (mut offset, mut size) = (offset, size);
        let kind = self.sources.get(source).kind();
        if let SourceKind::AudioVolume {
            compression: Some(compression),
            ..
        } = kind
        {
            let Some(relocation) = compression.relocate(offset) else {
                log::warn!(
                    "{id} at {offset:#x} is missing from the relocation table of {}",
                    self.sources.get(source)
                );
                return;
            };
            offset = relocation.offset;
            size = relocation.size;
        }

        if matches!(
            kind,
            SourceKind::Volume { .. } | SourceKind::AudioVolume { .. }
        ) {
            match self.source_size(source) {
                Ok(file_size) if u64::from(offset) + u64::from(size) > file_size
                    || u64::from(offset) >= file_size =>
                {
                    log::warn!(
                        "{id} at {offset:#x} lies outside {} ({file_size} bytes)",
                        self.sources.get(source)
                    );
                    return;
                }
                Ok(_) => {}
                Err(err) => {
                    log::warn!("Unable to size {}: {err}", self.sources.get(source));
                    return;
                }
            }
        }

        let placement = self.sources.get(source).placement();
        self.catalog
            .insert(id, Location::new(source, offset, size, placement));
    }

    fn scan_index(&mut self, source: SourceId, base_volume: u32) -> Result<(), ArchiveError> {
        let name = self.location_of(source);
        let data = read_file(&*self.fs, &name)?;
        let legacy = self.config.profile().legacy_type_codes();
        let map_version = self.version.map();

        let entries = if map_version < ResourceVersion::Sci1Late {
            let flat = map::sci0::parse(&data, map_version, self.version.volume(), legacy, |number| {
                self.sources.find_volume(source, number).is_some()
            })
            .map_err(|err| ArchiveError::malformed(&name, err))?;
            if flat.version != map_version {
                log::warn!(
                    "Index {name} was read with the {} layout",
                    flat.version.description()
                );
                self.version = self.version.with_map(flat.version);
            }
            flat.entries
        } else {
            map::sci1::parse(&data, map_version, legacy, base_volume)
                .map_err(|err| ArchiveError::malformed(&name, err))?
        };

        for entry in entries {
            let Some(volume) = self.sources.find_volume(source, entry.volume) else {
                log::warn!(
                    "Volume {} for {} in {name} not found",
                    entry.volume,
                    entry.id
                );
                continue;
            };
            self.add_entry(entry.id, volume, entry.offset, entry.size);
        }
        Ok(())
    }

    fn scan_internal_audio_index(
        &mut self,
        source: SourceId,
        map_number: u16,
    ) -> Result<(), ArchiveError> {
        let map_id = ResourceId::new(ResourceType::Map, map_number);
        let data = self.load(map_id)?;
        let Some(volume) = self.sources.find_volume(source, 0) else {
            return Err(ArchiveError::SourceNotFound {
                name: format!("audio volume for {map_id}"),
            });
        };
        let volume_name = self.location_of(volume);
        let volume_version = self.version.volume();
        let rave_lip_sync = self.config.profile().rave_lip_sync();

        let files = &mut self.files;
        let fs = &*self.fs;
        let entries = map::audio::parse_internal(
            &data,
            map_number,
            volume_version,
            rave_lip_sync,
            |offset, buf| files.read_at(fs, &volume_name, offset, buf),
        )
        .map_err(|err| ArchiveError::malformed(&map_id.to_string(), err))?;

        for entry in entries {
            self.add_entry(entry.id, volume, entry.offset, entry.size);
        }
        Ok(())
    }

    fn scan_external_audio_index(&mut self, source: SourceId) -> Result<(), ArchiveError> {
        let name = self.location_of(source);
        let data = read_file(&*self.fs, &name)?;
        let entries =
            map::audio::parse_external(&data).map_err(|err| ArchiveError::malformed(&name, err))?;
        for entry in entries {
            let Some(volume) = self.sources.find_volume(source, entry.volume) else {
                return Err(ArchiveError::malformed(
                    &name,
                    format!("volume {} for {} does not exist", entry.volume, entry.id),
                ));
            };
            self.add_entry(entry.id, volume, entry.offset, entry.size);
        }
        Ok(())
    }

    /// Registers every loose patch, base-36 patch and wave file in the game
    /// directory.
    fn scan_directory(&mut self) {
        for res_type in ALL_RESOURCE_TYPES {
            if res_type >= ResourceType::Robot && res_type != ResourceType::Chunk {
                continue;
            }
            let Some(suffix) = res_type.patch_suffix() else {
                continue;
            };
            let mut patterns = vec![
                format!("{}.[0-9][0-9][0-9]", res_type.name()),
                format!("*.{suffix}"),
            ];
            patterns.extend(
                res_type
                    .extra_patch_suffixes()
                    .iter()
                    .map(|extra| format!("*.{extra}")),
            );
            for name in self.listing.matching(&patterns) {
                if let Some(number) = patch::patch_number(&name, res_type) {
                    self.add_patch(ResourceId::new(res_type, number), name);
                }
            }
        }

        if self.version.volume() >= ResourceVersion::Sci11 {
            self.scan_base36_patches();
        }

        for name in self.listing.matching(&["*.wav"]) {
            if let Some(id) = patch::wave_patch_id(&name) {
                self.add_wave(id, name);
            }
        }
    }

    fn scan_base36_patches(&mut self) {
        let candidates: Vec<(ResourceId, String)> = self
            .listing
            .names()
            .filter_map(|name| {
                ResourceId::parse_base36_patch_name(name).map(|id| (id, name.to_string()))
            })
            .collect();
        for (id, name) in candidates {
            if id.res_type() == ResourceType::Audio36 {
                let head = match read_head(&*self.fs, &name, PATCH_HEAD_LEN) {
                    Ok(head) => head,
                    Err(err) => {
                        log::warn!("Ignoring patch {name}: {err}");
                        continue;
                    }
                };
                match patch::classify_audio36(&head) {
                    Audio36Kind::Wave => {
                        self.add_wave(id, name);
                        continue;
                    }
                    Audio36Kind::Sol => {}
                    Audio36Kind::Unrecognized => {
                        log::debug!("Ignoring {name}: not a recognized audio file");
                        continue;
                    }
                }
            }
            self.add_patch(id, name);
        }
    }

    fn check_patch(&self, id: ResourceId, name: &str) -> Result<PatchLayout, ArchiveError> {
        let head = read_head(&*self.fs, name, PATCH_HEAD_LEN)?;
        let file_size = self.fs.file_size(name)?;
        let layout = patch::validate(
            id.res_type(),
            &head,
            file_size,
            self.version.map(),
            self.config.profile().legacy_type_codes(),
        )
        .with_other_err()?;
        Ok(layout)
    }

    fn add_patch(&mut self, id: ResourceId, name: String) {
        match self.check_patch(id, &name) {
            Ok(layout) => {
                let source = self.sources.add(name, SourceKind::Patch);
                self.catalog.insert(
                    id,
                    Location::new(source, layout.offset, layout.size, Placement::Overlay),
                );
            }
            Err(err) => log::warn!("Ignoring patch {name} for {id}: {err}"),
        }
    }

    /// Registers a loose audio file used whole as `id`.
    fn add_wave(&mut self, id: ResourceId, name: String) {
        let size = match self.fs.file_size(&name) {
            Ok(size) => size,
            Err(err) => {
                log::warn!("Ignoring audio file {name}: {err}");
                return;
            }
        };
        let Ok(size) = u32::try_from(size) else {
            log::warn!("Ignoring audio file {name}: too large ({size} bytes)");
            return;
        };
        let source = self.sources.add(name, SourceKind::WaveFile);
        self.catalog
            .insert(id, Location::new(source, 0, size, Placement::Overlay));
    }

    fn scan_fork(&mut self, source: SourceId) -> Result<(), ArchiveError> {
        let name = self.location_of(source);
        let head = self.files.read_vec(&*self.fs, &name, 0, FORK_HEADER_LEN)?;
        let header = ForkHeader::parse(&head).map_err(|err| ArchiveError::malformed(&name, err))?;
        let map = self.files.read_vec(
            &*self.fs,
            &name,
            u64::from(header.map_offset),
            header.map_len as usize,
        )?;
        let entries =
            mac_fork::parse_map(&map, &header).map_err(|err| ArchiveError::malformed(&name, err))?;
        for entry in entries {
            let Some(res_type) = mac_fork::tag_type(entry.tag) else {
                log::debug!(
                    "Skipping {name} resource {} with tag {:?}",
                    entry.id,
                    String::from_utf8_lossy(&entry.tag)
                );
                continue;
            };
            self.add_entry(ResourceId::new(res_type, entry.id), source, entry.offset, 0);
        }
        Ok(())
    }

    fn scan_chunk(&mut self, source: SourceId, number: u16) -> Result<(), ArchiveError> {
        let chunk_id = ResourceId::new(ResourceType::Chunk, number);
        let data = self.load(chunk_id)?;
        let entries = chunk::parse_table(
            &data,
            self.version.map(),
            self.config.profile().legacy_type_codes(),
        )
        .map_err(|err| ArchiveError::malformed(&chunk_id.to_string(), err))?;
        for entry in entries {
            if entry.id == chunk_id {
                log::warn!("{chunk_id} lists itself; skipping the entry");
                continue;
            }
            self.catalog.insert(
                entry.id,
                Location::new(source, entry.offset, entry.length, Placement::Overlay),
            );
        }
        Ok(())
    }

    /// Settles the meaning of compression methods 1 and 2 once the main
    /// index has been read.
    pub(super) fn settle_compression_era(&mut self) {
        let era = self.config.compression_era().unwrap_or_else(|| {
            let vocab = ResourceId::new(ResourceType::Vocab, 0);
            if self.version.map() == ResourceVersion::Sci0Sci1Early && self.catalog.contains(&vocab)
            {
                CompressionEra::Early
            } else {
                CompressionEra::Late
            }
        });
        log::debug!("Using the {era:?} compression methods");
        self.version = self.version.with_era(era);
    }

    fn audio_volume_name(&self) -> Option<&str> {
        self.config
            .language()
            .and_then(|language| self.listing.find(&format!("resource_{language}.aud")))
            .or_else(|| self.listing.find("resource.aud"))
    }

    /// Reads the relocation table of a recompressed audio volume. Returns
    /// `None` for a plain volume.
    fn read_audio_compression(
        &mut self,
        name: &str,
    ) -> Result<Option<CompressedAudio>, ArchiveError> {
        let head = self.files.read_up_to(&*self.fs, name, 0, 8)?;
        let Some(codec) = head.get(..4).and_then(AudioCodec::from_tag) else {
            return Ok(None);
        };
        let Some(&[a, b, c, d]) = head.get(4..8) else {
            bail_other!("{} has no relocation count", name);
        };
        let count = u32::from_le_bytes([a, b, c, d]);
        let table_len = CompressedAudio::table_len(count);
        let file_size = self.files.size(&*self.fs, name)?;
        ensure_other!(
            (table_len as u64) <= file_size,
            "Relocation table of {} claims {} entries",
            name,
            count
        );
        let table = self.files.read_vec(&*self.fs, name, 4, table_len)?;
        Ok(Some(CompressedAudio::parse(codec, &table, file_size)?))
    }

    /// Registers an audio index and volume for every map resource, then the
    /// external audio map, if any.
    pub(super) fn add_audio_sources(&mut self) {
        for map_id in self.list_resources(ResourceType::Map, None) {
            let number = map_id.number();
            let volume_name = if number == SFX_MAP {
                self.listing.find("resource.sfx")
            } else {
                self.audio_volume_name()
            };
            let Some(volume_name) = volume_name.map(str::to_string) else {
                log::debug!("No audio volume for {map_id}");
                continue;
            };
            let compression = match self.read_audio_compression(&volume_name) {
                Ok(compression) => compression.map(Arc::new),
                Err(err) => {
                    log::warn!("Skipping audio volume {volume_name}: {err}");
                    continue;
                }
            };
            let index = self.sources.add(
                map_id.to_string(),
                SourceKind::InternalIndex { map_number: number },
            );
            self.sources.add(
                volume_name,
                SourceKind::AudioVolume {
                    map: index,
                    number: 0,
                    compression,
                },
            );
        }
        self.add_external_audio_sources();
    }

    fn add_external_audio_sources(&mut self) {
        let maps = self.listing.matching(&["audio[0-9][0-9][0-9].map"]);
        let chosen = match self.config.audio_language() {
            Some(language) => {
                let found = maps
                    .iter()
                    .find(|name| audio_map_number(name) == Some(language));
                if found.is_none() && !maps.is_empty() {
                    log::warn!("No audio map for language {language}");
                }
                found
            }
            None => maps.first(),
        };
        let Some(map_name) = chosen.cloned() else {
            return;
        };
        let Some((stem, _)) = map_name.rsplit_once('.') else {
            return;
        };
        let volumes = self.listing.matching(&[format!("{stem}.[0-9][0-9][0-9]")]);
        let number = audio_map_number(&map_name).map_or(0, u32::from);
        let index = self.sources.add(
            map_name,
            SourceKind::ExternalAudioIndex {
                volume_number: number,
            },
        );
        for name in volumes {
            if let Some(number) = extension_number(&name) {
                self.sources.add(
                    name,
                    SourceKind::AudioVolume {
                        map: index,
                        number,
                        compression: None,
                    },
                );
            }
        }
    }

    /// Opens chunk 0 as a source in script-less SCI2+ archives.
    pub(super) fn add_chunk_sources(&mut self) {
        let chunk = ResourceId::new(ResourceType::Chunk, 0);
        if self.version.map() >= ResourceVersion::Sci2
            && self.catalog.contains(&chunk)
            && self.list_resources(ResourceType::Script, None).is_empty()
        {
            self.sources
                .add(chunk.to_string(), SourceKind::EmbeddedChunk { number: 0 });
        }
    }
}
