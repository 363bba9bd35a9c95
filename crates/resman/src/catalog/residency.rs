//! The in-memory state of a cataloged resource.

use std::num::NonZeroU32;

use bytes::Bytes;

/// Whether, and how, a resource's decoded bytes are held in memory.
#[derive(Debug, Clone, Default)]
pub enum Residency {
    /// Not loaded.
    #[default]
    Unloaded,
    /// Decoded, but not yet handed out.
    Allocated(Bytes),
    /// Decoded and unlocked; may be evicted.
    Enqueued(Bytes),
    /// Decoded and pinned by at least one holder.
    Locked { data: Bytes, lockers: NonZeroU32 },
}

/// The tag of a [`Residency`], without the data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResidencyState {
    Unloaded,
    Allocated,
    Enqueued,
    Locked,
}

impl Residency {
    #[must_use]
    pub fn state(&self) -> ResidencyState {
        match self {
            Residency::Unloaded => ResidencyState::Unloaded,
            Residency::Allocated(_) => ResidencyState::Allocated,
            Residency::Enqueued(_) => ResidencyState::Enqueued,
            Residency::Locked { .. } => ResidencyState::Locked,
        }
    }

    #[must_use]
    pub fn data(&self) -> Option<&Bytes> {
        match self {
            Residency::Unloaded => None,
            Residency::Allocated(data)
            | Residency::Enqueued(data)
            | Residency::Locked { data, .. } => Some(data),
        }
    }

    /// Number of outstanding locks.
    #[must_use]
    pub fn lockers(&self) -> u32 {
        match self {
            Residency::Locked { lockers, .. } => lockers.get(),
            _ => 0,
        }
    }

    /// Bytes held in memory.
    #[must_use]
    pub fn resident_bytes(&self) -> usize {
        self.data().map_or(0, Bytes::len)
    }
}
