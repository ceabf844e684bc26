//! Per-capita rates from a summary and a population table.
//!
//! Population tables usually come from IBGE with seven-digit codes; registry
//! summaries use six digits. Codes are normalized to six digits on load.
//! Joins are driven by the population side so every municipality appears,
//! with a zero count when the summary has no entry for it.

use serde::Serialize;
use std::collections::BTreeMap;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

use crate::errors::TallyError;
use crate::geography::GeographicCode;
use crate::normalize::AgeBucket;
use crate::summary::Summary;
use crate::types::Population;

/// Residents per municipality, keyed by six-digit code.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PopulationTable {
    by_code: BTreeMap<GeographicCode, Population>,
}

impl PopulationTable {
    /// Empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add residents for a code; six- and seven-digit codes are accepted.
    pub fn insert(&mut self, code: &GeographicCode, population: Population) {
        let slot = self.by_code.entry(code.six_digit()).or_insert(0);
        *slot = slot.saturating_add(population);
    }

    /// Load a JSON object mapping municipality code to population.
    pub fn from_json_file(path: &Path) -> Result<Self, TallyError> {
        let body = fs::read_to_string(path)?;
        let raw: HashMap<String, Population> = serde_json::from_str(&body)?;
        let mut table = PopulationTable::new();
        for (code, population) in raw {
            let parsed = GeographicCode::parse(&code).ok_or_else(|| {
                TallyError::Configuration(format!(
                    "invalid municipality code '{code}' in {}",
                    path.display()
                ))
            })?;
            table.insert(&parsed, population);
        }
        Ok(table)
    }

    /// Population for a six-digit code.
    pub fn get(&self, code: &GeographicCode) -> Option<Population> {
        self.by_code.get(&code.six_digit()).copied()
    }

    /// Number of municipalities.
    pub fn len(&self) -> usize {
        self.by_code.len()
    }

    /// True when the table is empty.
    pub fn is_empty(&self) -> bool {
        self.by_code.is_empty()
    }

    /// Entries in code order.
    pub fn iter(&self) -> impl Iterator<Item = (&GeographicCode, Population)> {
        self.by_code.iter().map(|(code, population)| (code, *population))
    }
}

impl<'a> FromIterator<(&'a GeographicCode, Population)> for PopulationTable {
    fn from_iter<T: IntoIterator<Item = (&'a GeographicCode, Population)>>(iter: T) -> Self {
        let mut table = PopulationTable::new();
        for (code, population) in iter {
            table.insert(code, population);
        }
        table
    }
}

/// Count and rate for one municipality.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MunicipalityRate {
    /// Six-digit municipality code from the population table.
    pub municipality_code: GeographicCode,
    /// Resident population.
    pub population: Population,
    /// Summary total for the municipality, zero when absent.
    pub count: u64,
    /// Count per `multiplier` residents.
    pub rate: f64,
}

/// `count / population * multiplier`, or zero for an empty population.
pub fn rate(count: u64, population: Population, multiplier: f64) -> f64 {
    if population == 0 {
        return 0.0;
    }
    count as f64 / population as f64 * multiplier
}

/// Join summary totals onto the population table.
pub fn compute_rates(
    summary: &Summary,
    population: &PopulationTable,
    multiplier: f64,
) -> Vec<MunicipalityRate> {
    let counts = six_digit_totals(summary);
    population
        .iter()
        .map(|(code, residents)| {
            let count = counts.get(code).copied().unwrap_or(0);
            MunicipalityRate {
                municipality_code: code.clone(),
                population: residents,
                count,
                rate: rate(count, residents, multiplier),
            }
        })
        .collect()
}

fn six_digit_totals(summary: &Summary) -> HashMap<GeographicCode, u64> {
    let mut totals = HashMap::new();
    for entry in summary.municipalities() {
        *totals
            .entry(entry.municipality_code().six_digit())
            .or_insert(0u64) += entry.total();
    }
    totals
}

/// Per-age-group birth counts for one municipality, flattened for tabular output.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AgeGroupCounts {
    /// Municipality code as summarized.
    pub municipality_code: GeographicCode,
    /// Births in the municipality.
    pub total: u64,
    /// Births per mother's-age bucket, every bucket present.
    pub by_age_group: BTreeMap<AgeBucket, u64>,
}

/// Flatten age breakdowns, filling every bucket (zero when absent).
///
/// Entries without an age breakdown are skipped.
pub fn age_group_counts(summary: &Summary) -> Vec<AgeGroupCounts> {
    const ALL_BUCKETS: [AgeBucket; 5] = [
        AgeBucket::Under20,
        AgeBucket::From20To29,
        AgeBucket::From30To39,
        AgeBucket::From40,
        AgeBucket::Unknown,
    ];
    summary
        .municipalities()
        .iter()
        .filter_map(|entry| {
            let breakdown = entry.by_age_group()?;
            let by_age_group = ALL_BUCKETS
                .iter()
                .map(|bucket| (*bucket, breakdown.get(bucket).copied().unwrap_or(0)))
                .collect();
            Some(AgeGroupCounts {
                municipality_code: entry.municipality_code().clone(),
                total: entry.total(),
                by_age_group,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::{AggregationKey, RunningCounters};
    use crate::config::DatasetProfile;
    use crate::constants::export::{BIRTH_RATE_MULTIPLIER, PREVALENCE_MULTIPLIER};
    use crate::summary::SummaryBuilder;

    fn code(raw: &str) -> GeographicCode {
        GeographicCode::parse(raw).unwrap()
    }

    fn sim_summary(entries: &[(&str, u64)]) -> Summary {
        let mut counters = RunningCounters::new();
        for (raw, count) in entries {
            counters.add(AggregationKey::municipality(code(raw)), *count);
        }
        SummaryBuilder::for_profile(&DatasetProfile::sim()).build(counters, Vec::new())
    }

    #[test]
    fn rates_left_join_from_population() {
        let summary = sim_summary(&[("261160", 50), ("999999", 3)]);
        let population: PopulationTable = [
            (&code("2611606"), 1_000_000),
            (&code("2600054"), 0),
            (&code("2600104"), 20_000),
        ]
        .into_iter()
        .collect();

        let rates = compute_rates(&summary, &population, PREVALENCE_MULTIPLIER);
        let codes: Vec<_> = rates
            .iter()
            .map(|rate| rate.municipality_code.as_str())
            .collect();
        assert_eq!(codes, vec!["260005", "260010", "261160"]);
        assert_eq!(rates[0].rate, 0.0);
        assert_eq!(rates[1].count, 0);
        assert_eq!(rates[1].rate, 0.0);
        assert_eq!(rates[2].count, 50);
        assert!((rates[2].rate - 5.0).abs() < 1e-9);
    }

    #[test]
    fn birth_rate_uses_per_thousand_multiplier() {
        assert!((rate(30, 2_000, BIRTH_RATE_MULTIPLIER) - 15.0).abs() < 1e-9);
        assert_eq!(rate(30, 0, BIRTH_RATE_MULTIPLIER), 0.0);
    }

    #[test]
    fn age_groups_are_filled_with_zeros() {
        let mut counters = RunningCounters::new();
        counters.add(
            AggregationKey {
                municipality: code("260010"),
                sex: Some("1".into()),
                age_group: Some(AgeBucket::From20To29),
            },
            4,
        );
        let summary =
            SummaryBuilder::for_profile(&DatasetProfile::sinasc()).build(counters, Vec::new());
        let flattened = age_group_counts(&summary);
        assert_eq!(flattened.len(), 1);
        assert_eq!(flattened[0].by_age_group.len(), 5);
        assert_eq!(flattened[0].by_age_group[&AgeBucket::From20To29], 4);
        assert_eq!(flattened[0].by_age_group[&AgeBucket::Under20], 0);

        assert!(age_group_counts(&sim_summary(&[("260010", 1)])).is_empty());
    }

    #[test]
    fn population_loads_from_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("population.json");
        fs::write(&path, r#"{"2611606": 1488920, "260010": 9000}"#).unwrap();
        let table = PopulationTable::from_json_file(&path).unwrap();
        assert_eq!(table.get(&code("261160")), Some(1_488_920));
        assert_eq!(table.get(&code("2600104")), Some(9000));

        fs::write(&path, r#"{"abc": 1}"#).unwrap();
        assert!(matches!(
            PopulationTable::from_json_file(&path),
            Err(TallyError::Configuration(_))
        ));
    }
}
