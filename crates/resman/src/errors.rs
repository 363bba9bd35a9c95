//! The error taxonomy surfaced by the resource manager.

use crate::{
    compression::DecompressionError, ids::ResourceId, utils::errors::OtherError,
    volume::VolumeError,
};

#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    /// An expected index or volume file is absent.
    #[error("Resource file not found: {name}")]
    SourceNotFound { name: String },

    /// A table could not be parsed. Cataloging stopped for that source only.
    #[error("Malformed index {source_name}: {reason}")]
    MalformedIndex { source_name: String, reason: String },

    /// The entry header in front of a resource's bytes is unusable.
    #[error("Invalid volume entry for {id}")]
    InvalidEntry {
        id: ResourceId,
        #[source]
        source: VolumeError,
    },

    /// The resource's packed bytes are corrupt.
    #[error("Failed to decompress {id}")]
    Decompression {
        id: ResourceId,
        #[source]
        source: DecompressionError,
    },

    /// Neither the index nor the volume layout could be detected.
    #[error("Unable to detect the archive layout")]
    UnknownFormat,

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] OtherError),
}

impl ArchiveError {
    pub(crate) fn malformed(source_name: &str, reason: impl ToString) -> Self {
        ArchiveError::MalformedIndex {
            source_name: source_name.to_string(),
            reason: reason.to_string(),
        }
    }
}
