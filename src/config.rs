use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::constants::columns;
use crate::constants::partitions::PARQUET_EXTENSION;
use crate::errors::TallyError;
use crate::types::{ColumnName, SystemName};

/// Declarative description of one registry's partition layout.
///
/// The aggregation engine is the same for every registry; profiles only say
/// which columns carry the municipality and the optional secondary dimensions.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetProfile {
    /// Information system name, e.g. `SIM`.
    pub system: SystemName,
    /// Municipality columns in priority order; the first one present in a file wins.
    pub municipality_columns: Vec<ColumnName>,
    /// Optional column carrying the sex code.
    #[serde(default)]
    pub sex_column: Option<ColumnName>,
    /// Optional column carrying the mother's age in years.
    #[serde(default)]
    pub mother_age_column: Option<ColumnName>,
    /// File extension accepted when a partition is a directory.
    #[serde(default = "default_extension")]
    pub partition_extension: String,
}

fn default_extension() -> String {
    PARQUET_EXTENSION.to_string()
}

impl DatasetProfile {
    /// Single-dimension profile counting rows per municipality.
    pub fn new(system: impl Into<SystemName>, municipality_column: impl Into<ColumnName>) -> Self {
        Self {
            system: system.into(),
            municipality_columns: vec![municipality_column.into()],
            sex_column: None,
            mother_age_column: None,
            partition_extension: default_extension(),
        }
    }

    /// Mortality records, counted by municipality of occurrence.
    pub fn sim() -> Self {
        Self::new("SIM", columns::SIM_MUNICIPALITY)
    }

    /// Notifiable-disease records, counted by municipality of residence with
    /// notification-site fallbacks.
    pub fn sinan() -> Self {
        Self::new("SINAN", columns::SINAN_RESIDENCE).with_fallback_municipality_columns([
            columns::SINAN_MUNICIPALITY,
            columns::SINAN_NOTIFICATION,
        ])
    }

    /// Live-birth records, broken down by sex and mother's age group.
    pub fn sinasc() -> Self {
        Self::new("SINASC", columns::SINASC_MUNICIPALITY)
            .with_sex_column(columns::SINASC_SEX)
            .with_mother_age_column(columns::SINASC_MOTHER_AGE)
    }

    /// Resolve a built-in profile by system name (case-insensitive).
    pub fn builtin(system: &str) -> Option<Self> {
        match system.trim().to_ascii_uppercase().as_str() {
            "SIM" => Some(Self::sim()),
            "SINAN" => Some(Self::sinan()),
            "SINASC" => Some(Self::sinasc()),
            _ => None,
        }
    }

    /// Load a profile from a JSON document.
    pub fn from_json_file(path: &Path) -> Result<Self, TallyError> {
        let body = fs::read_to_string(path)?;
        let profile: DatasetProfile = serde_json::from_str(&body)?;
        profile.validate()?;
        Ok(profile)
    }

    /// Append lower-priority municipality columns.
    pub fn with_fallback_municipality_columns<I, S>(mut self, fallbacks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<ColumnName>,
    {
        self.municipality_columns
            .extend(fallbacks.into_iter().map(Into::into));
        self
    }

    /// Break counts down by a sex column.
    pub fn with_sex_column(mut self, column: impl Into<ColumnName>) -> Self {
        self.sex_column = Some(column.into());
        self
    }

    /// Break counts down by mother's age group.
    pub fn with_mother_age_column(mut self, column: impl Into<ColumnName>) -> Self {
        self.mother_age_column = Some(column.into());
        self
    }

    /// Override the extension used when walking partition directories.
    pub fn with_partition_extension(mut self, extension: impl Into<String>) -> Self {
        self.partition_extension = extension.into();
        self
    }

    /// True when the summary carries per-sex or per-age breakdowns.
    pub fn is_multi_dimensional(&self) -> bool {
        self.sex_column.is_some() || self.mother_age_column.is_some()
    }

    /// Every column the reader must project, without duplicates.
    pub fn required_columns(&self) -> Vec<ColumnName> {
        let mut required: Vec<ColumnName> = Vec::new();
        let secondary = self.sex_column.iter().chain(self.mother_age_column.iter());
        for column in self.municipality_columns.iter().chain(secondary) {
            if !required.contains(column) {
                required.push(column.clone());
            }
        }
        required
    }

    /// Reject profiles that cannot produce any aggregation key.
    pub fn validate(&self) -> Result<(), TallyError> {
        if self.municipality_columns.is_empty() {
            return Err(TallyError::Configuration(format!(
                "profile '{}' must name at least one municipality column",
                self.system
            )));
        }
        if self
            .municipality_columns
            .iter()
            .any(|column| column.trim().is_empty())
        {
            return Err(TallyError::Configuration(format!(
                "profile '{}' has an empty municipality column name",
                self.system
            )));
        }
        if self.partition_extension.trim().is_empty() {
            return Err(TallyError::Configuration(format!(
                "profile '{}' has an empty partition extension",
                self.system
            )));
        }
        Ok(())
    }
}

/// How unrecognized region abbreviations are treated.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RegionPolicy {
    /// Drop unknown abbreviations and log a warning.
    #[default]
    Lenient,
    /// Fail the query on the first unknown abbreviation.
    Strict,
}

/// Runtime knobs for a query.
#[derive(Clone, Debug, Default)]
pub struct QueryConfig {
    /// Aggregate partitions on the rayon pool and merge afterwards.
    pub parallel_partitions: bool,
    /// Treatment of unrecognized region abbreviations.
    pub region_policy: RegionPolicy,
}

impl QueryConfig {
    /// Enable or disable parallel partition aggregation.
    pub fn with_parallel_partitions(mut self, parallel: bool) -> Self {
        self.parallel_partitions = parallel;
        self
    }

    /// Override the region policy.
    pub fn with_region_policy(mut self, policy: RegionPolicy) -> Self {
        self.region_policy = policy;
        self
    }
}
