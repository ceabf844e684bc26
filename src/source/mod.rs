//! Partition reading interfaces.
//!
//! Ownership model:
//! - `PartitionRef` names one physical partition (a file or a directory of files).
//! - `PartitionReader` turns a partition into a lazy stream of `RecordBatch`es.
//! - Each batch owns its rows; nothing is retained once the caller drops it.

use serde_json::{Map, Value};
use std::path::PathBuf;
use std::sync::Arc;

use crate::errors::TallyError;
use crate::types::{ColumnName, Year};

/// In-memory reader for tests and small datasets.
pub mod memory;
/// Parquet-backed reader for local partitions.
pub mod parquet_file;

pub use memory::InMemoryPartitionReader;
pub use parquet_file::ParquetPartitionReader;

/// One row as read from storage: column name to loosely typed value.
pub type RawRecord = Map<String, Value>;

/// Lazy, finite sequence of batches for one partition.
pub type BatchStream<'a> = Box<dyn Iterator<Item = Result<RecordBatch, TallyError>> + 'a>;

/// One physical source of rows for a given year.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct PartitionRef {
    /// Year the partition covers.
    pub year: Year,
    /// File or directory holding the partition.
    pub path: PathBuf,
}

impl PartitionRef {
    /// Create a partition reference.
    pub fn new(year: Year, path: impl Into<PathBuf>) -> Self {
        Self {
            year,
            path: path.into(),
        }
    }
}

/// Rows read from one file of a partition.
#[derive(Clone, Debug)]
pub struct RecordBatch {
    /// File the rows came from.
    pub source: PathBuf,
    /// Every column the file declares, not only the projected ones.
    pub columns: Arc<Vec<ColumnName>>,
    /// Projected rows. Columns absent from the file are absent from each row.
    pub rows: Vec<RawRecord>,
}

impl RecordBatch {
    /// Number of rows in the batch.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// True when the batch carries no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Storage backend seam used by the orchestrator.
///
/// Implementations must be lazy: at most one batch should be materialized at a
/// time. A missing partition is reported as `PartitionNotFound`; a partition
/// that exists but cannot be decoded is reported as `PartitionRead`, either
/// from `read` itself or from the stream.
pub trait PartitionReader: Send + Sync {
    /// Open `partition`, projecting `columns` where the file has them.
    fn read<'a>(
        &'a self,
        partition: &PartitionRef,
        columns: &[ColumnName],
    ) -> Result<BatchStream<'a>, TallyError>;
}

/// Keep only the requested columns of `row`.
pub(crate) fn project_row(row: &RawRecord, columns: &[ColumnName]) -> RawRecord {
    columns
        .iter()
        .filter_map(|column| {
            row.get(column)
                .map(|value| (column.clone(), value.clone()))
        })
        .collect()
}
