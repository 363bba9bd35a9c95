//! Reads the resource archives of SCI games.
//!
//! A [`ResourceManager`] discovers the index, volume, patch and audio files
//! of a game, detects which generation of the archive layout they use, and
//! catalogs every resource they hold. Resources are decoded on demand and
//! kept in a bounded least-recently-used cache; callers can lock resources
//! to keep them resident.

pub mod catalog;
pub mod compression;
pub mod config;
pub mod errors;
pub mod fs;
pub mod ids;
mod manager;
pub(crate) mod map;
pub mod sources;
pub mod utils;
pub mod version;
mod volume;

pub use config::{ConfigError, GameProfile, Platform, ResourceManagerConfig};
pub use errors::ArchiveError;
pub use ids::{ResourceId, ResourceType};
pub use manager::{ResourceManager, ViewColorDepth};
pub use version::{ArchiveVersion, CompressionEra, ResourceVersion};
pub use volume::VolumeError;
