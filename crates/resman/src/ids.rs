//! Resource categories and identifiers.

use std::{fmt, str::FromStr};

use crate::version::ResourceVersion;

/// The category of a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ResourceType {
    View,
    Pic,
    Script,
    Text,
    Sound,
    Memory,
    Vocab,
    Font,
    Cursor,
    Patch,
    Bitmap,
    Palette,
    CdAudio,
    Audio,
    Sync,
    Message,
    Map,
    Heap,
    Audio36,
    Sync36,
    Translation,
    Robot,
    Vmd,
    Chunk,
    Animation,
    Etc,
    Duck,
    Clut,
    Tga,
    Zzz,
    MacIconBarPictN,
    MacIconBarPictS,
    MacPict,
    Rave,
    Invalid,
}

/// All valid categories, in declaration order.
pub const ALL_RESOURCE_TYPES: [ResourceType; 34] = {
    use ResourceType::{
        Animation, Audio, Audio36, Bitmap, CdAudio, Chunk, Clut, Cursor, Duck, Etc, Font, Heap,
        MacIconBarPictN, MacIconBarPictS, MacPict, Map, Memory, Message, Palette, Patch, Pic,
        Rave, Robot, Script, Sound, Sync, Sync36, Text, Tga, Translation, View, Vmd, Vocab, Zzz,
    };
    [
        View, Pic, Script, Text, Sound, Memory, Vocab, Font, Cursor, Patch, Bitmap, Palette,
        CdAudio, Audio, Sync, Message, Map, Heap, Audio36, Sync36, Translation, Robot, Vmd, Chunk,
        Animation, Etc, Duck, Clut, Tga, Zzz, MacIconBarPictN, MacIconBarPictS, MacPict, Rave,
    ]
};

/// Type codes used by indexes and volume headers up to the SCI2 map layout.
const EARLY_TYPE_CODES: [ResourceType; 22] = {
    use ResourceType::{
        Audio, Audio36, Bitmap, CdAudio, Cursor, Font, Heap, Map, Memory, Message, Palette,
        Patch, Pic, Rave, Script, Sound, Sync, Sync36, Text, Translation, View, Vocab,
    };
    [
        View, Pic, Script, Text, Sound, Memory, Vocab, Font, Cursor, Patch, Bitmap, Palette,
        CdAudio, Audio, Sync, Message, Map, Heap, Audio36, Sync36, Translation, Rave,
    ]
};

/// Type codes used by SCI2.1 and later maps.
const LATE_TYPE_CODES: [ResourceType; 28] = {
    use ResourceType::{
        Animation, Audio, Audio36, Bitmap, Chunk, Clut, Cursor, Duck, Etc, Font, Heap, Invalid,
        Map, Message, Palette, Patch, Pic, Robot, Script, Sound, Sync, Sync36, Tga, Translation,
        View, Vmd, Vocab, Zzz,
    };
    [
        View, Pic, Script, Animation, Sound, Etc, Vocab, Font, Cursor, Patch, Bitmap, Palette,
        Invalid, Audio, Sync, Message, Map, Heap, Chunk, Audio36, Sync36, Translation, Robot, Vmd,
        Duck, Clut, Tga, Zzz,
    ]
};

impl ResourceType {
    /// Maps a raw type code to a category. The high bit of the code is
    /// ignored. Codes outside the table for the given map layout yield
    /// [`ResourceType::Invalid`].
    #[must_use]
    pub fn from_type_code(code: u8, map_version: ResourceVersion, legacy_codes: bool) -> Self {
        let code = usize::from(code & 0x7F);
        let table: &[ResourceType] = if map_version < ResourceVersion::Sci2 || legacy_codes {
            &EARLY_TYPE_CODES
        } else {
            &LATE_TYPE_CODES
        };
        table.get(code).copied().unwrap_or(ResourceType::Invalid)
    }

    /// The lowercase name, which is also the stem of patch filenames.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            ResourceType::View => "view",
            ResourceType::Pic => "pic",
            ResourceType::Script => "script",
            ResourceType::Text => "text",
            ResourceType::Sound => "sound",
            ResourceType::Memory => "memory",
            ResourceType::Vocab => "vocab",
            ResourceType::Font => "font",
            ResourceType::Cursor => "cursor",
            ResourceType::Patch => "patch",
            ResourceType::Bitmap => "bitmap",
            ResourceType::Palette => "palette",
            ResourceType::CdAudio => "cdaudio",
            ResourceType::Audio => "audio",
            ResourceType::Sync => "sync",
            ResourceType::Message => "message",
            ResourceType::Map => "map",
            ResourceType::Heap => "heap",
            ResourceType::Audio36 => "audio36",
            ResourceType::Sync36 => "sync36",
            ResourceType::Translation => "xlate",
            ResourceType::Robot => "robot",
            ResourceType::Vmd => "vmd",
            ResourceType::Chunk => "chunk",
            ResourceType::Animation => "animation",
            ResourceType::Etc => "etc",
            ResourceType::Duck => "duck",
            ResourceType::Clut => "clut",
            ResourceType::Tga => "tga",
            ResourceType::Zzz => "zzz",
            ResourceType::MacIconBarPictN => "macibin",
            ResourceType::MacIconBarPictS => "macibis",
            ResourceType::MacPict => "macpict",
            ResourceType::Rave => "rave",
            ResourceType::Invalid => "invalid",
        }
    }

    /// The filename suffix used by patch files named `<number>.<suffix>`,
    /// if the category has one.
    #[must_use]
    pub fn patch_suffix(self) -> Option<&'static str> {
        let suffix = match self {
            ResourceType::View => "v56",
            ResourceType::Pic => "p56",
            ResourceType::Script => "scr",
            ResourceType::Text => "tex",
            ResourceType::Sound => "snd",
            ResourceType::Vocab => "voc",
            ResourceType::Font => "fon",
            ResourceType::Cursor => "cur",
            ResourceType::Patch => "pat",
            ResourceType::Bitmap => "bit",
            ResourceType::Palette => "pal",
            ResourceType::CdAudio => "cda",
            ResourceType::Audio => "aud",
            ResourceType::Sync => "syn",
            ResourceType::Message => "msg",
            ResourceType::Map => "map",
            ResourceType::Heap => "hep",
            ResourceType::Translation => "trn",
            ResourceType::Robot => "rbt",
            ResourceType::Vmd => "vmd",
            ResourceType::Chunk => "chk",
            ResourceType::Etc => "etc",
            ResourceType::Duck => "duk",
            ResourceType::Clut => "clu",
            ResourceType::Tga => "tga",
            ResourceType::Zzz => "zzz",
            _ => return None,
        };
        Some(suffix)
    }

    /// Extra suffixes some releases use for patches of this category.
    #[must_use]
    pub fn extra_patch_suffixes(self) -> &'static [&'static str] {
        match self {
            ResourceType::View => &["v16", "v32", "v64"],
            ResourceType::Pic => &["p16", "p32", "p64"],
            ResourceType::Script => &["csc"],
            _ => &[],
        }
    }

    /// Categories keyed by the four-part message tuple as well as a number.
    /// Lip-sync data shares the key of the sync entry it is appended to.
    #[must_use]
    pub fn is_tuple_keyed(self) -> bool {
        matches!(
            self,
            ResourceType::Audio36 | ResourceType::Sync36 | ResourceType::Rave
        )
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, thiserror::Error)]
#[error("Unknown resource type name: {0:?}")]
pub struct UnknownTypeName(String);

impl FromStr for ResourceType {
    type Err = UnknownTypeName;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ALL_RESOURCE_TYPES
            .iter()
            .copied()
            .find(|t| t.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| UnknownTypeName(s.to_string()))
    }
}

/// Identifies a resource by category, number, and (for tuple-keyed
/// categories) a packed noun/verb/condition/sequence tuple.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ResourceId {
    res_type: ResourceType,
    number: u16,
    tuple: u32,
}

impl ResourceId {
    #[must_use]
    pub fn new(res_type: ResourceType, number: u16) -> Self {
        Self::with_tuple(res_type, number, 0)
    }

    /// Creates an identifier with a packed tuple. The tuple is dropped for
    /// categories that are not tuple-keyed.
    #[must_use]
    pub fn with_tuple(res_type: ResourceType, number: u16, tuple: u32) -> Self {
        let tuple = if res_type.is_tuple_keyed() { tuple } else { 0 };
        ResourceId {
            res_type,
            number,
            tuple,
        }
    }

    #[must_use]
    pub fn from_message_key(
        res_type: ResourceType,
        number: u16,
        noun: u8,
        verb: u8,
        cond: u8,
        seq: u8,
    ) -> Self {
        let tuple = u32::from_be_bytes([noun, verb, cond, seq]);
        Self::with_tuple(res_type, number, tuple)
    }

    #[must_use]
    pub fn res_type(&self) -> ResourceType {
        self.res_type
    }

    #[must_use]
    pub fn number(&self) -> u16 {
        self.number
    }

    #[must_use]
    pub fn tuple(&self) -> u32 {
        self.tuple
    }

    /// The tuple as `(noun, verb, cond, seq)`.
    #[must_use]
    pub fn message_key(&self) -> (u8, u8, u8, u8) {
        let [noun, verb, cond, seq] = self.tuple.to_be_bytes();
        (noun, verb, cond, seq)
    }

    /// The base36 patch filename for a tuple-keyed resource, e.g.
    /// `@0RS0C02.0Z1`.
    #[must_use]
    pub fn base36_patch_name(&self) -> Option<String> {
        let marker = match self.res_type {
            ResourceType::Audio36 => '@',
            ResourceType::Sync36 => '#',
            _ => return None,
        };
        let (noun, verb, cond, seq) = self.message_key();
        Some(format!(
            "{marker}{}{}{}.{}{}",
            to_base36(u32::from(self.number), 3),
            to_base36(u32::from(noun), 2),
            to_base36(u32::from(verb), 2),
            to_base36(u32::from(cond), 2),
            to_base36(u32::from(seq), 1),
        ))
    }

    /// Parses a base36 patch filename such as `@0RS0A01.001` into an
    /// identifier. The leading marker selects the category: `@`, `A` and `B`
    /// are audio, `#`, `S` and `T` are sync data.
    #[must_use]
    pub fn parse_base36_patch_name(name: &str) -> Option<Self> {
        let bytes = name.as_bytes();
        if !name.is_ascii() || bytes.len() != 12 || bytes[8] != b'.' {
            return None;
        }
        let res_type = match bytes[0].to_ascii_uppercase() {
            b'@' | b'A' | b'B' => ResourceType::Audio36,
            b'#' | b'S' | b'T' => ResourceType::Sync36,
            _ => return None,
        };
        let digits: String = name[1..8].chars().chain(name[9..].chars()).collect();
        let map = from_base36(&digits[0..3])?;
        let noun = from_base36(&digits[3..5])?;
        let verb = from_base36(&digits[5..7])?;
        let cond = from_base36(&digits[7..9])?;
        let seq = from_base36(&digits[9..10])?;
        let key = |v: u32| u8::try_from(v).ok();
        Some(Self::from_message_key(
            res_type,
            u16::try_from(map).ok()?,
            key(noun)?,
            key(verb)?,
            key(cond)?,
            key(seq)?,
        ))
    }
}

impl fmt::Debug for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}:{}", self.res_type, self.number)?;
        if self.res_type.is_tuple_keyed() {
            let (noun, verb, cond, seq) = self.message_key();
            write!(f, "({noun},{verb},{cond},{seq})")?;
        }
        Ok(())
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.res_type, self.number)?;
        if self.res_type.is_tuple_keyed() {
            let (noun, verb, cond, seq) = self.message_key();
            write!(f, " ({noun}, {verb}, {cond}, {seq})")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, thiserror::Error)]
#[error("Invalid resource id {0:?}: expected <type>.<number>")]
pub struct InvalidResourceId(String);

impl FromStr for ResourceId {
    type Err = InvalidResourceId;

    /// Parses `<type>.<number>`, e.g. `view.100`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || InvalidResourceId(s.to_string());
        let (type_name, number) = s.split_once('.').ok_or_else(err)?;
        let res_type = type_name.parse().map_err(|_| err())?;
        let number = number.parse().map_err(|_| err())?;
        Ok(ResourceId::new(res_type, number))
    }
}

/// Renders `value` as exactly `width` uppercase base36 digits, dropping
/// higher digits.
#[must_use]
pub fn to_base36(mut value: u32, width: usize) -> String {
    let mut digits = vec![b'0'; width];
    for digit in digits.iter_mut().rev() {
        let d = u8::try_from(value % 36).unwrap_or(0);
        *digit = if d < 10 { b'0' + d } else { b'A' + d - 10 };
        value /= 36;
    }
    digits.into_iter().map(char::from).collect()
}

/// Parses case-insensitive base36 digits.
#[must_use]
pub fn from_base36(digits: &str) -> Option<u32> {
    if digits.is_empty() {
        return None;
    }
    u32::from_str_radix(digits, 36).ok()
}
