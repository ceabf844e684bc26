#![doc = include_str!("../README.md")]
#![warn(missing_docs)]

/// Count accumulation and merging.
pub mod aggregate;
/// Command-line runner shared by the demo binary.
pub mod app;
/// Dataset profiles and query settings.
pub mod config;
/// Centralized constants for columns, buckets, partitions, and export.
pub mod constants;
/// Summary export documents.
pub mod export;
/// Geographic codes, state table, and region filtering.
pub mod geography;
/// Partition discovery for local download layouts.
pub mod locator;
/// Scan statistics.
pub mod metrics;
/// Raw field canonicalization.
pub mod normalize;
/// Query lifecycle and execution.
pub mod orchestrator;
/// Per-capita rates over summaries.
pub mod rates;
/// Partition reader trait and built-in readers.
pub mod source;
/// Query results.
pub mod summary;
/// Filesystem layout of partitions.
pub mod transport;
/// Shared type aliases.
pub mod types;

mod errors;

pub use aggregate::{AggregationKey, Aggregator, RunningCounters};
pub use config::{DatasetProfile, QueryConfig, RegionPolicy};
pub use errors::TallyError;
pub use export::{RegionScope, SummaryDocument};
pub use geography::{GeographicCode, RegionFilterSet};
pub use locator::{LocalDirectoryLocator, PartitionLocator, PartitionScope};
pub use metrics::ScanStats;
pub use normalize::{AgeBucket, RowNormalizer, RowRejection};
pub use orchestrator::{
    CancellationToken, Orchestrator, QueryHandle, QueryLifecycle, QueryReport, QueryRequest,
    QueryState,
};
pub use rates::{MunicipalityRate, PopulationTable, compute_rates};
pub use source::{
    InMemoryPartitionReader, ParquetPartitionReader, PartitionReader, PartitionRef, RawRecord,
    RecordBatch,
};
pub use summary::{MunicipalitySummary, Summary, SummaryOutcome};
pub use types::{ColumnName, GroupCode, Population, RegionAbbr, SexCode, SystemName, Year};
