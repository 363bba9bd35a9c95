//! The resource manager: discovers an archive's sources, catalogs the
//! resources they hold, and hands out decoded bytes through a bounded
//! cache.

use std::{
    collections::{BTreeSet, HashMap},
    path::PathBuf,
};

use bytes::Bytes;

use crate::{
    catalog::{Catalog, CatalogEntry, ResidencyState},
    config::ResourceManagerConfig,
    errors::ArchiveError,
    fs::{ArchiveFs, DirFs, FileListing},
    ids::{ResourceId, ResourceType},
    sources::{SourceId, SourceRegistry, file_pool::FilePool},
    version::{ArchiveVersion, CompressionEra, ResourceVersion},
};

mod load;
mod probe;
mod scan;

pub use probe::ViewColorDepth;

pub struct ResourceManager {
    fs: Box<dyn ArchiveFs>,
    listing: FileListing,
    config: ResourceManagerConfig,
    sources: SourceRegistry,
    catalog: Catalog,
    files: FilePool,
    file_sizes: HashMap<SourceId, u64>,
    version: ArchiveVersion,
    view_color_depth: Option<ViewColorDepth>,
    extended_font: Option<bool>,
}

impl ResourceManager {
    /// Opens the archive in `fs`: discovers its sources, detects its
    /// layout, and catalogs every resource.
    pub fn open<F>(fs: F, config: ResourceManagerConfig) -> Result<Self, ArchiveError>
    where
        F: ArchiveFs + 'static,
    {
        let listing = FileListing::read(&fs)?;
        let mut manager = ResourceManager {
            fs: Box::new(fs),
            listing,
            files: FilePool::new(config.open_volume_limit()),
            catalog: Catalog::new(config.cache_ceiling_bytes()),
            config,
            sources: SourceRegistry::default(),
            file_sizes: HashMap::new(),
            version: ArchiveVersion::new(
                ResourceVersion::Unknown,
                ResourceVersion::Unknown,
                CompressionEra::Late,
            ),
            view_color_depth: None,
            extended_font: None,
        };

        manager.add_primary_sources()?;
        manager.detect_version()?;
        manager.scan_pending();
        manager.settle_compression_era();
        manager.add_audio_sources();
        manager.scan_pending();
        manager.add_chunk_sources();
        manager.scan_pending();

        log::debug!(
            "Cataloged {} resources from {} sources in {}",
            manager.catalog.len(),
            manager.sources.len(),
            manager.fs.describe()
        );
        Ok(manager)
    }

    /// Opens the archive in a game directory.
    pub fn open_dir(
        path: impl Into<PathBuf>,
        config: ResourceManagerConfig,
    ) -> Result<Self, ArchiveError> {
        Self::open(DirFs::new(path), config)
    }

    #[must_use]
    pub fn detected_version(&self) -> ArchiveVersion {
        self.version
    }

    #[must_use]
    pub fn config(&self) -> &ResourceManagerConfig {
        &self.config
    }

    #[must_use]
    pub fn sources(&self) -> &SourceRegistry {
        &self.sources
    }

    #[must_use]
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    #[must_use]
    pub fn lookup(&self, id: ResourceId) -> Option<&CatalogEntry> {
        self.catalog.get(&id)
    }

    /// Returns the decoded bytes of `id`, loading them on first use.
    /// Returns `Ok(None)` if the resource is not cataloged. With `lock`
    /// set, the resource stays resident until a matching
    /// [`release`](Self::release).
    ///
    /// A load failure leaves the entry unloaded; a later call retries.
    pub fn resolve(&mut self, id: ResourceId, lock: bool) -> Result<Option<Bytes>, ArchiveError> {
        let Some(entry) = self.catalog.get(&id) else {
            return Ok(None);
        };
        if entry.state() == ResidencyState::Unloaded {
            let data = self
                .load(id)
                .inspect_err(|err| log::warn!("Failed to load {id}: {err}"))?;
            self.catalog.store(id, data);
        }
        Ok(self.catalog.acquire(id, lock))
    }

    /// Drops one lock taken by [`resolve`](Self::resolve). Returns whether
    /// the resource was locked.
    pub fn release(&mut self, id: ResourceId) -> bool {
        self.catalog.release(id)
    }

    /// The cataloged resources of one category, optionally restricted to
    /// a single resource number.
    #[must_use]
    pub fn list_resources(
        &self,
        res_type: ResourceType,
        number: Option<u16>,
    ) -> BTreeSet<ResourceId> {
        self.catalog
            .ids()
            .filter(|id| id.res_type() == res_type)
            .filter(|id| number.is_none_or(|number| id.number() == number))
            .copied()
            .collect()
    }
}

#[cfg(test)]
mod tests;
