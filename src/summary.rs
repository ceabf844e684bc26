//! Immutable, serializable query results.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::aggregate::RunningCounters;
use crate::config::DatasetProfile;
use crate::geography::GeographicCode;
use crate::normalize::AgeBucket;
use crate::types::{ColumnName, SexCode};

/// Counts for one municipality.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MunicipalitySummary {
    municipality_code: GeographicCode,
    total: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    by_sex: Option<BTreeMap<SexCode, u64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    by_age_group: Option<BTreeMap<AgeBucket, u64>>,
}

impl MunicipalitySummary {
    /// Municipality code.
    pub fn municipality_code(&self) -> &GeographicCode {
        &self.municipality_code
    }

    /// Records counted for this municipality.
    pub fn total(&self) -> u64 {
        self.total
    }

    /// Per-sex breakdown, present for datasets with a sex dimension.
    pub fn by_sex(&self) -> Option<&BTreeMap<SexCode, u64>> {
        self.by_sex.as_ref()
    }

    /// Per-age-group breakdown, present for datasets with a mother's-age dimension.
    pub fn by_age_group(&self) -> Option<&BTreeMap<AgeBucket, u64>> {
        self.by_age_group.as_ref()
    }

    /// True when every present breakdown sums to `total`.
    pub fn is_consistent(&self) -> bool {
        let sex_ok = self
            .by_sex
            .as_ref()
            .is_none_or(|map| map.values().sum::<u64>() == self.total);
        let age_ok = self
            .by_age_group
            .as_ref()
            .is_none_or(|map| map.values().sum::<u64>() == self.total);
        sex_ok && age_ok
    }
}

/// Final grouped-count result of one query.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    total_records: u64,
    columns: Vec<ColumnName>,
    summary_by_municipality: Vec<MunicipalitySummary>,
}

impl Summary {
    /// Summary with no rows, carrying whatever schema was observed.
    pub fn empty(columns: Vec<ColumnName>) -> Self {
        Self {
            total_records: 0,
            columns,
            summary_by_municipality: Vec::new(),
        }
    }

    /// Records counted across all municipalities.
    pub fn total_records(&self) -> u64 {
        self.total_records
    }

    /// Column names of the first non-empty batch read by the query.
    pub fn columns(&self) -> &[ColumnName] {
        &self.columns
    }

    /// Per-municipality entries, sorted by code.
    pub fn municipalities(&self) -> &[MunicipalitySummary] {
        &self.summary_by_municipality
    }

    /// Entry for a municipality code.
    pub fn municipality(&self, code: &str) -> Option<&MunicipalitySummary> {
        self.summary_by_municipality
            .binary_search_by(|entry| entry.municipality_code.as_str().cmp(code))
            .ok()
            .map(|idx| &self.summary_by_municipality[idx])
    }

    /// True when no municipality has counts.
    pub fn is_empty(&self) -> bool {
        self.summary_by_municipality.is_empty()
    }
}

/// Result of a query that did not fail.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SummaryOutcome {
    /// At least one row was counted.
    Complete(Summary),
    /// The query ran to completion but nothing matched.
    Empty(Summary),
}

impl SummaryOutcome {
    /// Classify a finished summary.
    pub fn from_summary(summary: Summary) -> Self {
        if summary.is_empty() {
            SummaryOutcome::Empty(summary)
        } else {
            SummaryOutcome::Complete(summary)
        }
    }

    /// Borrow the summary regardless of variant.
    pub fn summary(&self) -> &Summary {
        match self {
            SummaryOutcome::Complete(summary) | SummaryOutcome::Empty(summary) => summary,
        }
    }

    /// Take the summary regardless of variant.
    pub fn into_summary(self) -> Summary {
        match self {
            SummaryOutcome::Complete(summary) | SummaryOutcome::Empty(summary) => summary,
        }
    }

    /// True for `Empty`.
    pub fn is_empty(&self) -> bool {
        matches!(self, SummaryOutcome::Empty(_))
    }
}

/// Converts final counters into a `Summary`.
#[derive(Clone, Copy, Debug, Default)]
pub struct SummaryBuilder {
    by_sex: bool,
    by_age_group: bool,
}

impl SummaryBuilder {
    /// Builder emitting the breakdowns the profile defines.
    pub fn for_profile(profile: &DatasetProfile) -> Self {
        Self {
            by_sex: profile.sex_column.is_some(),
            by_age_group: profile.mother_age_column.is_some(),
        }
    }

    /// Fold counters into per-municipality entries.
    pub fn build(&self, counters: RunningCounters, columns: Vec<ColumnName>) -> Summary {
        let mut grouped: BTreeMap<GeographicCode, MunicipalitySummary> = BTreeMap::new();
        let mut total_records = 0u64;
        for (key, count) in counters {
            total_records = total_records.saturating_add(count);
            let entry = grouped
                .entry(key.municipality.clone())
                .or_insert_with(|| MunicipalitySummary {
                    municipality_code: key.municipality.clone(),
                    total: 0,
                    by_sex: self.by_sex.then(BTreeMap::new),
                    by_age_group: self.by_age_group.then(BTreeMap::new),
                });
            entry.total = entry.total.saturating_add(count);
            if let (Some(by_sex), Some(sex)) = (entry.by_sex.as_mut(), key.sex) {
                *by_sex.entry(sex).or_insert(0) += count;
            }
            if let (Some(by_age), Some(age)) = (entry.by_age_group.as_mut(), key.age_group) {
                *by_age.entry(age).or_insert(0) += count;
            }
        }
        Summary {
            total_records,
            columns,
            summary_by_municipality: grouped.into_values().collect(),
        }
    }
}
