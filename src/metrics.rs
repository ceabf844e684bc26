use serde::Serialize;

use crate::normalize::RowRejection;

/// Scan counters for one query (or one partition of it).
///
/// Every scanned row lands in exactly one of `rows_counted`,
/// `rows_invalid_code`, `rows_missing_column`, or `rows_out_of_region`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanStats {
    /// Partitions opened successfully.
    pub partitions_read: usize,
    /// Requested years or partitions that were not found.
    pub partitions_missing: usize,
    /// Shard files that produced at least one batch.
    pub files: usize,
    /// Batches streamed.
    pub batches: usize,
    /// Rows handed to the normalizer.
    pub rows_scanned: u64,
    /// Rows whose municipality code was missing or malformed.
    pub rows_invalid_code: u64,
    /// Rows from files without any municipality column.
    pub rows_missing_column: u64,
    /// Rows rejected by the region filter.
    pub rows_out_of_region: u64,
    /// Rows that reached the aggregator.
    pub rows_counted: u64,
}

impl ScanStats {
    /// Record a row dropped by the normalizer.
    pub fn record_rejection(&mut self, rejection: RowRejection) {
        match rejection {
            RowRejection::InvalidGeographicCode => self.rows_invalid_code += 1,
            RowRejection::MissingMunicipalityColumn => self.rows_missing_column += 1,
        }
    }

    /// Rows that did not reach the aggregator.
    pub fn rows_dropped(&self) -> u64 {
        self.rows_invalid_code + self.rows_missing_column + self.rows_out_of_region
    }

    /// Sum two sets of counters.
    pub fn merge(&mut self, other: &ScanStats) {
        self.partitions_read += other.partitions_read;
        self.partitions_missing += other.partitions_missing;
        self.files += other.files;
        self.batches += other.batches;
        self.rows_scanned += other.rows_scanned;
        self.rows_invalid_code += other.rows_invalid_code;
        self.rows_missing_column += other.rows_missing_column;
        self.rows_out_of_region += other.rows_out_of_region;
        self.rows_counted += other.rows_counted;
    }
}
