use parquet::file::reader::{FileReader, SerializedFileReader};
use parquet::record::reader::RowIter;
use parquet::schema::types::{Type, TypePtr};
use std::collections::VecDeque;
use std::fs::File;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

use crate::constants::partitions::PARQUET_EXTENSION;
use crate::errors::TallyError;
use crate::transport::PartitionFiles;
use crate::types::ColumnName;

use super::{BatchStream, PartitionReader, PartitionRef, RawRecord, RecordBatch};

/// Reads partitions stored as Parquet files or directories of Parquet shards.
///
/// Each row group becomes one batch. Only the requested columns that a file
/// actually declares are decoded.
#[derive(Clone, Debug)]
pub struct ParquetPartitionReader {
    extension: String,
}

impl Default for ParquetPartitionReader {
    fn default() -> Self {
        Self {
            extension: PARQUET_EXTENSION.to_string(),
        }
    }
}

impl ParquetPartitionReader {
    /// Reader accepting `*.parquet` shards inside directory partitions.
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the shard extension used when walking directories.
    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into();
        self
    }
}

impl PartitionReader for ParquetPartitionReader {
    fn read<'a>(
        &'a self,
        partition: &PartitionRef,
        columns: &[ColumnName],
    ) -> Result<BatchStream<'a>, TallyError> {
        let files = PartitionFiles::new(self.extension.clone()).resolve(partition)?;
        debug!(
            year = partition.year,
            path = %partition.path.display(),
            files = files.len(),
            "resolved partition files"
        );
        Ok(Box::new(ParquetBatches {
            pending: files.into(),
            columns: columns.to_vec(),
            current: None,
        }))
    }
}

struct OpenShard {
    path: PathBuf,
    reader: SerializedFileReader<File>,
    schema: Arc<Vec<ColumnName>>,
    projection: Option<Type>,
    next_group: usize,
}

impl OpenShard {
    fn open(path: PathBuf, columns: &[ColumnName]) -> Result<Self, TallyError> {
        let file = File::open(&path).map_err(|err| {
            TallyError::read(&path, format!("failed opening parquet shard: {err}"))
        })?;
        let reader = SerializedFileReader::new(file).map_err(|err| {
            TallyError::read(&path, format!("failed reading parquet metadata: {err}"))
        })?;
        let root = reader.metadata().file_metadata().schema();
        let schema: Vec<ColumnName> = root
            .get_fields()
            .iter()
            .map(|field| field.name().to_string())
            .collect();
        let selected: Vec<TypePtr> = root
            .get_fields()
            .iter()
            .filter(|field| columns.iter().any(|column| column == field.name()))
            .cloned()
            .collect();
        let projection = if selected.is_empty() {
            None
        } else {
            let projection = Type::group_type_builder(root.name())
                .with_fields(selected)
                .build()
                .map_err(|err| {
                    TallyError::read(&path, format!("failed building projection: {err}"))
                })?;
            Some(projection)
        };
        debug!(
            path = %path.display(),
            row_groups = reader.num_row_groups(),
            "opened parquet shard"
        );
        Ok(Self {
            path,
            reader,
            schema: Arc::new(schema),
            projection,
            next_group: 0,
        })
    }

    fn next_batch(&mut self) -> Option<Result<RecordBatch, TallyError>> {
        while self.next_group < self.reader.num_row_groups() {
            let group = self.next_group;
            self.next_group += 1;
            let rows = match self.read_group(group) {
                Ok(rows) => rows,
                Err(err) => return Some(Err(err)),
            };
            if rows.is_empty() {
                continue;
            }
            return Some(Ok(RecordBatch {
                source: self.path.clone(),
                columns: Arc::clone(&self.schema),
                rows,
            }));
        }
        None
    }

    fn read_group(&self, group: usize) -> Result<Vec<RawRecord>, TallyError> {
        let path = self.path.as_path();
        let Some(projection) = self.projection.clone() else {
            // Nothing requested exists in this file; emit bare rows so they are still scanned.
            let num_rows = self.reader.metadata().row_group(group).num_rows();
            let num_rows = usize::try_from(num_rows).map_err(|_| {
                TallyError::read(path, format!("row group {group} size overflow"))
            })?;
            return Ok(vec![RawRecord::new(); num_rows]);
        };
        let row_group = self.reader.get_row_group(group).map_err(|err| {
            TallyError::read(path, format!("failed opening row group {group}: {err}"))
        })?;
        let iter = RowIter::from_row_group(Some(projection), row_group.as_ref()).map_err(|err| {
            TallyError::read(path, format!("failed iterating row group {group}: {err}"))
        })?;
        iter.map(|row| -> Result<RawRecord, TallyError> {
            let row = row.map_err(|err| {
                TallyError::read(path, format!("failed decoding row in group {group}: {err}"))
            })?;
            Ok(row
                .get_column_iter()
                .map(|(name, field)| (name.clone(), field.to_json_value()))
                .collect())
        })
        .collect()
    }
}

/// Lazy iterator over every row group of every shard in a partition.
struct ParquetBatches {
    pending: VecDeque<PathBuf>,
    columns: Vec<ColumnName>,
    current: Option<OpenShard>,
}

impl ParquetBatches {
    fn advance(&mut self) -> Option<Result<RecordBatch, TallyError>> {
        loop {
            if let Some(shard) = self.current.as_mut() {
                if let Some(batch) = shard.next_batch() {
                    return Some(batch);
                }
                self.current = None;
            }
            let path = self.pending.pop_front()?;
            match OpenShard::open(path, &self.columns) {
                Ok(shard) => self.current = Some(shard),
                Err(err) => return Some(Err(err)),
            }
        }
    }
}

impl Iterator for ParquetBatches {
    type Item = Result<RecordBatch, TallyError>;

    fn next(&mut self) -> Option<Self::Item> {
        let next = self.advance();
        if matches!(next, Some(Err(_))) {
            self.pending.clear();
            self.current = None;
        }
        next
    }
}
