//! Runtime configuration for opening an archive.

use std::{io, path::Path};

use serde::{Deserialize, Serialize};

use crate::{
    ids::{ResourceId, ResourceType},
    version::CompressionEra,
};

fn default_cache_ceiling() -> usize {
    256 * 1024
}

fn default_open_volume_limit() -> usize {
    5
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] io::Error),
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// The platform a game release targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Platform {
    #[default]
    Dos,
    Windows,
    Amiga,
    Macintosh,
    FmTowns,
}

/// Per-release quirks that cannot be detected from the files alone.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct GameProfile {
    #[serde(default)]
    platform: Platform,

    /// Lip-sync data follows the sync data of tuple-keyed sync entries.
    #[serde(default)]
    rave_lip_sync: bool,

    /// No resource in the platform resource forks is compressed.
    #[serde(default)]
    uncompressed_mac_fork: bool,

    /// Pictures stored uncompressed in otherwise compressed resource forks.
    #[serde(default)]
    uncompressed_mac_pics: Vec<u16>,

    /// Interpret type codes with the pre-SCI2.1 table even in late indexes.
    #[serde(default)]
    legacy_type_codes: bool,
}

impl GameProfile {
    #[must_use]
    pub fn platform(&self) -> Platform {
        self.platform
    }

    #[must_use]
    pub fn rave_lip_sync(&self) -> bool {
        self.rave_lip_sync
    }

    #[must_use]
    pub fn legacy_type_codes(&self) -> bool {
        self.legacy_type_codes
    }

    /// Whether a resource in a platform resource fork may carry a
    /// compressed payload.
    #[must_use]
    pub fn fork_may_compress(&self, id: ResourceId) -> bool {
        if self.uncompressed_mac_fork {
            return false;
        }
        if id.res_type() == ResourceType::Pic && self.uncompressed_mac_pics.contains(&id.number())
        {
            return false;
        }
        !matches!(
            id.res_type(),
            ResourceType::MacPict
                | ResourceType::Audio
                | ResourceType::MacIconBarPictN
                | ResourceType::MacIconBarPictS
                | ResourceType::Audio36
                | ResourceType::Sync
                | ResourceType::Sync36
                | ResourceType::Cursor
        )
    }

    #[must_use]
    pub fn with_platform(mut self, platform: Platform) -> Self {
        self.platform = platform;
        self
    }

    #[must_use]
    pub fn with_rave_lip_sync(mut self, enabled: bool) -> Self {
        self.rave_lip_sync = enabled;
        self
    }

    #[must_use]
    pub fn with_uncompressed_mac_fork(mut self, enabled: bool) -> Self {
        self.uncompressed_mac_fork = enabled;
        self
    }

    #[must_use]
    pub fn with_uncompressed_mac_pics(mut self, pics: Vec<u16>) -> Self {
        self.uncompressed_mac_pics = pics;
        self
    }

    #[must_use]
    pub fn with_legacy_type_codes(mut self, enabled: bool) -> Self {
        self.legacy_type_codes = enabled;
        self
    }
}

/// Settings for [`crate::ResourceManager::open`]. Readable from TOML:
///
/// ```toml
/// cache-ceiling-bytes = 524288
/// language = "fr"
///
/// [profile]
/// platform = "amiga"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct ResourceManagerConfig {
    /// Bytes of unlocked, decoded resources kept in memory.
    #[serde(default = "default_cache_ceiling")]
    cache_ceiling_bytes: usize,

    /// Volume files kept open at once.
    #[serde(default = "default_open_volume_limit")]
    open_volume_limit: usize,

    /// Selects `resource_<language>.aud` as the audio volume when present.
    #[serde(default)]
    language: Option<String>,

    /// Selects `audio<N>.map` among several external audio indexes.
    #[serde(default)]
    audio_language: Option<u16>,

    /// Overrides the detected compression era.
    #[serde(default)]
    compression_era: Option<CompressionEra>,

    #[serde(default)]
    profile: GameProfile,
}

impl Default for ResourceManagerConfig {
    fn default() -> Self {
        ResourceManagerConfig {
            cache_ceiling_bytes: default_cache_ceiling(),
            open_volume_limit: default_open_volume_limit(),
            language: None,
            audio_language: None,
            compression_era: None,
            profile: GameProfile::default(),
        }
    }
}

impl ResourceManagerConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    #[must_use]
    pub fn cache_ceiling_bytes(&self) -> usize {
        self.cache_ceiling_bytes
    }

    #[must_use]
    pub fn open_volume_limit(&self) -> usize {
        self.open_volume_limit
    }

    #[must_use]
    pub fn language(&self) -> Option<&str> {
        self.language.as_deref()
    }

    #[must_use]
    pub fn audio_language(&self) -> Option<u16> {
        self.audio_language
    }

    #[must_use]
    pub fn compression_era(&self) -> Option<CompressionEra> {
        self.compression_era
    }

    #[must_use]
    pub fn profile(&self) -> &GameProfile {
        &self.profile
    }

    #[must_use]
    pub fn with_cache_ceiling_bytes(mut self, bytes: usize) -> Self {
        self.cache_ceiling_bytes = bytes;
        self
    }

    #[must_use]
    pub fn with_open_volume_limit(mut self, limit: usize) -> Self {
        self.open_volume_limit = limit;
        self
    }

    #[must_use]
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    #[must_use]
    pub fn with_audio_language(mut self, number: u16) -> Self {
        self.audio_language = Some(number);
        self
    }

    #[must_use]
    pub fn with_compression_era(mut self, era: CompressionEra) -> Self {
        self.compression_era = Some(era);
        self
    }

    #[must_use]
    pub fn with_profile(mut self, profile: GameProfile) -> Self {
        self.profile = profile;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = ResourceManagerConfig::from_toml_str("").unwrap();
        assert_eq!(config, ResourceManagerConfig::default());
        assert_eq!(config.cache_ceiling_bytes(), 262_144);
        assert_eq!(config.open_volume_limit(), 5);
        assert_eq!(config.profile().platform(), Platform::Dos);
    }

    #[test]
    fn reads_every_field() {
        let config = ResourceManagerConfig::from_toml_str(
            r#"
            cache-ceiling-bytes = 1024
            open-volume-limit = 2
            language = "de"
            audio-language = 1
            compression-era = "early"

            [profile]
            platform = "fm-towns"
            rave-lip-sync = true
            uncompressed-mac-fork = false
            uncompressed-mac-pics = [2315]
            legacy-type-codes = true
            "#,
        )
        .unwrap();
        assert_eq!(config.cache_ceiling_bytes(), 1024);
        assert_eq!(config.open_volume_limit(), 2);
        assert_eq!(config.language(), Some("de"));
        assert_eq!(config.audio_language(), Some(1));
        assert_eq!(config.compression_era(), Some(CompressionEra::Early));
        let profile = config.profile();
        assert_eq!(profile.platform(), Platform::FmTowns);
        assert!(profile.rave_lip_sync());
        assert!(profile.legacy_type_codes());
        assert!(!profile.fork_may_compress(ResourceId::new(ResourceType::Pic, 2315)));
        assert!(profile.fork_may_compress(ResourceId::new(ResourceType::Pic, 2316)));
    }

    #[test]
    fn rejects_unknown_keys() {
        assert!(matches!(
            ResourceManagerConfig::from_toml_str("cache-size = 3"),
            Err(ConfigError::Parse(_))
        ));
        assert!(matches!(
            ResourceManagerConfig::from_toml_str("[profile]\nplatform = \"c64\""),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn fork_compression_rules() {
        let profile = GameProfile::default();
        assert!(profile.fork_may_compress(ResourceId::new(ResourceType::View, 1)));
        assert!(!profile.fork_may_compress(ResourceId::new(ResourceType::Audio, 1)));
        assert!(!profile.fork_may_compress(ResourceId::new(ResourceType::Cursor, 1)));
        let uncompressed = profile.with_uncompressed_mac_fork(true);
        assert!(!uncompressed.fork_may_compress(ResourceId::new(ResourceType::View, 1)));
    }

    #[test]
    fn reads_from_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("resman.toml");
        std::fs::write(&path, "language = \"fr\"\n").unwrap();
        let config = ResourceManagerConfig::from_toml_file(&path).unwrap();
        assert_eq!(config.language(), Some("fr"));
        assert!(matches!(
            ResourceManagerConfig::from_toml_file(dir.path().join("missing.toml")),
            Err(ConfigError::Io(_))
        ));
    }
}
