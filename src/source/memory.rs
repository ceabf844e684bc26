use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use crate::errors::TallyError;
use crate::types::ColumnName;

use super::{BatchStream, PartitionReader, PartitionRef, RawRecord, RecordBatch, project_row};

const DEFAULT_BATCH_SIZE: usize = 1024;

#[derive(Clone, Debug)]
enum StoredPartition {
    Rows {
        columns: Arc<Vec<ColumnName>>,
        rows: Vec<RawRecord>,
    },
    Unreadable(String),
}

/// Partition reader over rows held in memory, keyed by partition path.
///
/// Paths that were never registered behave like missing files.
#[derive(Clone, Debug)]
pub struct InMemoryPartitionReader {
    partitions: HashMap<PathBuf, StoredPartition>,
    batch_size: usize,
}

impl Default for InMemoryPartitionReader {
    fn default() -> Self {
        Self {
            partitions: HashMap::new(),
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

impl InMemoryPartitionReader {
    /// Empty reader.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register rows under `path`. `columns` is the partition's full schema.
    pub fn with_partition(
        mut self,
        path: impl Into<PathBuf>,
        columns: Vec<ColumnName>,
        rows: Vec<RawRecord>,
    ) -> Self {
        self.partitions.insert(
            path.into(),
            StoredPartition::Rows {
                columns: Arc::new(columns),
                rows,
            },
        );
        self
    }

    /// Register a partition that exists but fails to decode.
    pub fn with_unreadable_partition(
        mut self,
        path: impl Into<PathBuf>,
        reason: impl Into<String>,
    ) -> Self {
        self.partitions
            .insert(path.into(), StoredPartition::Unreadable(reason.into()));
        self
    }

    /// Rows per emitted batch (minimum 1).
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }
}

impl PartitionReader for InMemoryPartitionReader {
    fn read<'a>(
        &'a self,
        partition: &PartitionRef,
        columns: &[ColumnName],
    ) -> Result<BatchStream<'a>, TallyError> {
        let stored =
            self.partitions
                .get(&partition.path)
                .ok_or_else(|| TallyError::PartitionNotFound {
                    year: partition.year,
                    path: partition.path.clone(),
                })?;
        let (schema, rows) = match stored {
            StoredPartition::Rows { columns, rows } => (columns, rows),
            StoredPartition::Unreadable(reason) => {
                return Err(TallyError::read(&partition.path, reason));
            }
        };
        let projection: Vec<ColumnName> = columns
            .iter()
            .filter(|column| schema.contains(column))
            .cloned()
            .collect();
        let source = partition.path.clone();
        let schema = Arc::clone(schema);
        let batches = rows.chunks(self.batch_size).map(move |chunk| {
            Ok(RecordBatch {
                source: source.clone(),
                columns: Arc::clone(&schema),
                rows: chunk.iter().map(|row| project_row(row, &projection)).collect(),
            })
        });
        Ok(Box::new(batches))
    }
}
