//! Facts about the game derived by probing well-known resources.

use crate::{
    config::Platform,
    ids::{ResourceId, ResourceType},
    sources::SourceKind,
    version::ResourceVersion,
};

use super::ResourceManager;

/// The color depth the game's views are drawn in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ViewColorDepth {
    Unknown,
    Ega,
    /// 32-color Amiga views.
    Amiga,
    /// 64-color Amiga views.
    Amiga64,
    Vga,
}

impl ResourceManager {
    /// Whether the archive is the Macintosh release of its game.
    #[must_use]
    pub fn is_platform_variant(&self) -> bool {
        self.version.map() == ResourceVersion::Sci11Mac
    }

    /// The color depth of the views, from the first view not supplied by a
    /// patch.
    pub fn view_color_depth(&mut self) -> ViewColorDepth {
        if let Some(depth) = self.view_color_depth {
            return depth;
        }
        let depth = self.probe_view_color_depth();
        self.view_color_depth = Some(depth);
        depth
    }

    fn probe_view_color_depth(&mut self) -> ViewColorDepth {
        let amiga = self.config.profile().platform() == Platform::Amiga;
        for number in 0..1000 {
            let id = ResourceId::new(ResourceType::View, number);
            let Some(entry) = self.catalog.get(&id) else {
                continue;
            };
            if matches!(
                self.sources.get(entry.location().source()).kind(),
                SourceKind::Patch
            ) {
                continue;
            }
            let Ok(Some(data)) = self.resolve(id, false) else {
                continue;
            };
            return match data.get(1) {
                Some(0x80) if amiga => ViewColorDepth::Amiga64,
                Some(0x80) => ViewColorDepth::Vga,
                Some(0) if amiga && data.get(6..8) == Some(&[0, 0][..]) => ViewColorDepth::Amiga,
                Some(0) => ViewColorDepth::Ega,
                _ => ViewColorDepth::Unknown,
            };
        }
        ViewColorDepth::Unknown
    }

    /// Whether font 0 has more than 128 characters.
    pub fn has_extended_font(&mut self) -> bool {
        if let Some(extended) = self.extended_font {
            return extended;
        }
        let font = ResourceId::new(ResourceType::Font, 0);
        let extended = matches!(
            self.resolve(font, false),
            Ok(Some(data)) if data.len() >= 4 && u16::from_le_bytes([data[2], data[3]]) > 0x80
        );
        self.extended_font = Some(extended);
        extended
    }
}
