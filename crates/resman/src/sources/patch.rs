//! Loose patch files that override resources stored in volumes.

use crate::{
    ids::{ResourceId, ResourceType},
    version::ResourceVersion,
};

/// Bytes that must be read from the start of a patch to validate it.
pub(crate) const PATCH_HEAD_LEN: usize = 6;

#[derive(Debug, thiserror::Error)]
pub(crate) enum PatchError {
    #[error("File is only {0} bytes long")]
    TooSmall(u64),
    #[error("File is too large ({0} bytes)")]
    TooLarge(u64),
    #[error("File holds a {found} resource, not a {expected}")]
    TypeMismatch {
        expected: ResourceType,
        found: ResourceType,
    },
    #[error("Unsupported patch header descriptor {0:#04x}")]
    UnsupportedHeader(u8),
    #[error("Header of {header} bytes leaves no payload")]
    NoPayload { header: u32 },
}

/// Where a patch file's payload lies within the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct PatchLayout {
    pub(crate) offset: u32,
    pub(crate) size: u32,
}

/// The resource number encoded in a patch file name, either
/// `<number>.<suffix>` or `<typename>.<number>`.
pub(crate) fn patch_number(name: &str, res_type: ResourceType) -> Option<u16> {
    if name.starts_with(|c: char| c.is_ascii_digit()) {
        let digits_end = name
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(name.len());
        if !name[digits_end..].starts_with('.') {
            return None;
        }
        return name[..digits_end].parse().ok();
    }

    let type_name = res_type.name();
    let prefix = name.get(..type_name.len())?;
    if !prefix.eq_ignore_ascii_case(type_name) {
        return None;
    }
    let mut rest = name[type_name.len()..].chars();
    rest.next();
    if rest.clone().next().is_some_and(|c| c.is_ascii_alphabetic()) {
        return None;
    }
    leading_number(rest.as_str())
}

/// The number made of the leading digits of `text`, zero if there are none.
pub(crate) fn leading_number(text: &str) -> Option<u16> {
    let digits_end = text
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(text.len());
    if digits_end == 0 {
        return Some(0);
    }
    text[..digits_end].parse().ok()
}

/// Checks that a patch file holds a resource of the expected type and
/// locates its payload. `head` holds at least the first
/// [`PATCH_HEAD_LEN`] bytes of the file, or the whole file if shorter.
pub(crate) fn validate(
    expected: ResourceType,
    head: &[u8],
    file_size: u64,
    map_version: ResourceVersion,
    legacy_codes: bool,
) -> Result<PatchLayout, PatchError> {
    if file_size < 3 || head.len() < 2 {
        return Err(PatchError::TooSmall(file_size));
    }
    let size = u32::try_from(file_size).map_err(|_| PatchError::TooLarge(file_size))?;

    let expected = match expected {
        ResourceType::Audio36 => ResourceType::Audio,
        ResourceType::Sync36 => ResourceType::Sync,
        other => other,
    };
    let found = if head.starts_with(b"RIFF") {
        ResourceType::Audio
    } else {
        ResourceType::from_type_code(head[0], map_version, legacy_codes)
    };
    if found != expected {
        return Err(PatchError::TypeMismatch { expected, found });
    }
    if head.starts_with(b"RIFF") {
        return Ok(PatchLayout { offset: 0, size });
    }

    let header = match head[1] {
        descriptor if descriptor & 0x80 != 0 => match descriptor & 0x7F {
            0 => 24,
            1 => 2,
            4 => 8,
            _ => return Err(PatchError::UnsupportedHeader(descriptor)),
        },
        descriptor => u32::from(descriptor),
    };
    if header + 2 >= size {
        return Err(PatchError::NoPayload { header });
    }
    Ok(PatchLayout {
        offset: header + 2,
        size: size - header - 2,
    })
}

/// How an audio file named with the base-36 scheme should be treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Audio36Kind {
    /// A complete RIFF or AIFF file, used whole.
    Wave,
    /// A SOL stream behind a regular patch header.
    Sol,
    Unrecognized,
}

pub(crate) fn classify_audio36(head: &[u8]) -> Audio36Kind {
    if head.starts_with(b"RIFF") || head.starts_with(b"FORM") {
        Audio36Kind::Wave
    } else if head.get(2..6) == Some(&b"SOL\0"[..]) {
        Audio36Kind::Sol
    } else {
        Audio36Kind::Unrecognized
    }
}

/// The audio resource a loose `<number>.wav` file stands for.
pub(crate) fn wave_patch_id(name: &str) -> Option<ResourceId> {
    if !name.starts_with(|c: char| c.is_ascii_digit()) {
        return None;
    }
    leading_number(name).map(|number| ResourceId::new(ResourceType::Audio, number))
}
