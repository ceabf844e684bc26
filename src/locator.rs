//! Mapping from `(group, year, regions)` to partition paths.
//!
//! The orchestrator never discovers partitions on its own; callers resolve
//! them first. `LocalDirectoryLocator` covers the layout produced by the
//! DATASUS download tooling:
//!
//! - per-state partitions, `<GROUP><UF><YYYY>.parquet` (e.g. `DOPE2022.parquet`)
//! - nationwide partitions, `<GROUP>BR<YY>.parquet` (e.g. `DENGBR22.parquet`)
//!
//! Each name may be a single file or a directory of shards.

use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::constants::partitions::{NATIONWIDE_SCOPE, PARQUET_EXTENSION};
use crate::errors::TallyError;
use crate::geography::{state_abbreviations, state_prefix};
use crate::source::PartitionRef;
use crate::types::{RegionAbbr, Year};

/// Resolves the partitions holding a dataset group for a year.
pub trait PartitionLocator {
    /// Partitions for one year. An empty result means the year has no data.
    fn locate(
        &self,
        group_code: &str,
        year: Year,
        regions: Option<&[RegionAbbr]>,
    ) -> Result<Vec<PartitionRef>, TallyError>;

    /// Partitions for every year, in year order.
    fn locate_all(
        &self,
        group_code: &str,
        years: &[Year],
        regions: Option<&[RegionAbbr]>,
    ) -> Result<Vec<PartitionRef>, TallyError> {
        let mut partitions = Vec::new();
        for year in years {
            partitions.extend(self.locate(group_code, *year, regions)?);
        }
        Ok(partitions)
    }
}

/// How partitions are split geographically.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PartitionScope {
    /// One partition per state and year, four-digit years.
    PerState,
    /// One partition per year for the whole country, two-digit years.
    Nationwide,
}

/// Locator over a local download directory.
#[derive(Clone, Debug)]
pub struct LocalDirectoryLocator {
    root: PathBuf,
    scope: PartitionScope,
    extension: String,
}

impl LocalDirectoryLocator {
    /// Locator for `<GROUP><UF><YYYY>` partitions under `root`.
    pub fn per_state(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            scope: PartitionScope::PerState,
            extension: PARQUET_EXTENSION.to_string(),
        }
    }

    /// Locator for `<GROUP>BR<YY>` partitions under `root`.
    pub fn nationwide(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            scope: PartitionScope::Nationwide,
            extension: PARQUET_EXTENSION.to_string(),
        }
    }

    /// Override the partition extension.
    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into();
        self
    }

    /// Root directory searched.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Scope of the partitions this locator produces.
    pub fn scope(&self) -> PartitionScope {
        self.scope
    }

    /// Partition base name, e.g. `DOPE2022` or `DENGBR22`.
    pub fn partition_name(&self, group_code: &str, scope_tag: &str, year: Year) -> String {
        let group = group_code.trim().to_ascii_uppercase();
        match self.scope {
            PartitionScope::PerState => format!("{group}{scope_tag}{year:04}"),
            PartitionScope::Nationwide => {
                format!("{group}{scope_tag}{:02}", year.rem_euclid(100))
            }
        }
    }

    fn partition_path(&self, name: &str) -> PathBuf {
        self.root.join(format!("{name}.{}", self.extension))
    }

    fn states(regions: Option<&[RegionAbbr]>) -> Vec<String> {
        match regions {
            None => state_abbreviations().map(str::to_string).collect(),
            Some(regions) => regions
                .iter()
                .filter_map(|region| {
                    let abbr = region.trim().to_ascii_uppercase();
                    if state_prefix(&abbr).is_some() {
                        Some(abbr)
                    } else {
                        warn!(region = %region, "no partitions for unrecognized region");
                        None
                    }
                })
                .collect(),
        }
    }
}

impl PartitionLocator for LocalDirectoryLocator {
    fn locate(
        &self,
        group_code: &str,
        year: Year,
        regions: Option<&[RegionAbbr]>,
    ) -> Result<Vec<PartitionRef>, TallyError> {
        if group_code.trim().is_empty() {
            return Err(TallyError::Configuration(
                "group code must not be empty".to_string(),
            ));
        }
        let partitions = match self.scope {
            PartitionScope::Nationwide => {
                let name = self.partition_name(group_code, NATIONWIDE_SCOPE, year);
                vec![PartitionRef::new(year, self.partition_path(&name))]
            }
            PartitionScope::PerState => Self::states(regions)
                .iter()
                .map(|state| {
                    let name = self.partition_name(group_code, state, year);
                    PartitionRef::new(year, self.partition_path(&name))
                })
                .filter(|partition| partition.path.exists())
                .collect(),
        };
        debug!(
            group = group_code,
            year,
            partitions = partitions.len(),
            root = %self.root.display(),
            "located partitions"
        );
        Ok(partitions)
    }
}
