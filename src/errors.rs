use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::orchestrator::QueryState;
use crate::types::{RegionAbbr, Year};

/// Error type for partition access, query lifecycle, and export failures.
#[derive(Debug, Error)]
pub enum TallyError {
    /// Partition path is absent or holds no shard files.
    #[error("partition for year {year} not found at {}", path.display())]
    PartitionNotFound {
        /// Requested year.
        year: Year,
        /// Path that was looked up.
        path: PathBuf,
    },
    /// Partition exists but a file in it could not be listed or decoded.
    #[error("partition file {} could not be read: {reason}", path.display())]
    PartitionRead {
        /// Partition or shard path that failed.
        path: PathBuf,
        /// Underlying error text.
        reason: String,
    },
    /// Region abbreviation rejected under the strict policy.
    #[error("unrecognized region abbreviation '{0}'")]
    InvalidRegion(RegionAbbr),
    /// Cancellation was requested before the query finished.
    #[error("query cancelled")]
    Cancelled,
    /// Background worker exited without sending a result.
    #[error("query worker stopped without producing a result")]
    WorkerStopped,
    /// Lifecycle transition that the query state machine forbids.
    #[error("invalid query state transition {from:?} -> {to:?}")]
    InvalidTransition {
        /// State the query was in.
        from: QueryState,
        /// State it was asked to enter.
        to: QueryState,
    },
    /// Invalid profile or CLI configuration.
    #[error("configuration error: {0}")]
    Configuration(String),
    /// Filesystem failure outside partition reading.
    #[error(transparent)]
    Io(#[from] io::Error),
    /// JSON encoding or decoding failure.
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl TallyError {
    /// True for errors the orchestrator absorbs by skipping the partition.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, TallyError::PartitionNotFound { .. })
    }

    pub(crate) fn read(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        TallyError::PartitionRead {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}
