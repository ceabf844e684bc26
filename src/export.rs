use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::constants::export::{ALL_REGIONS, JSON_EXTENSION};
use crate::errors::TallyError;
use crate::summary::Summary;
use crate::types::{GroupCode, RegionAbbr, SystemName, Year};

/// Region scope recorded in an exported document.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RegionScope {
    /// No region filter; serialized as `"all"`.
    All(String),
    /// Explicit state abbreviations.
    States(Vec<RegionAbbr>),
}

impl RegionScope {
    /// Scope for an optional region list.
    pub fn from_regions(regions: Option<&[RegionAbbr]>) -> Self {
        match regions {
            Some(regions) if !regions.is_empty() => RegionScope::States(
                regions
                    .iter()
                    .map(|region| region.trim().to_ascii_uppercase())
                    .collect(),
            ),
            _ => RegionScope::All(ALL_REGIONS.to_string()),
        }
    }
}

/// Summary plus the metadata needed to interpret it offline.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryDocument {
    /// Information system, e.g. `SINAN`.
    pub information_system: SystemName,
    /// Dataset group, e.g. `DENG`.
    pub group_code: GroupCode,
    /// Years the query covered.
    pub years: Vec<Year>,
    /// Regions the query was restricted to.
    pub regions: RegionScope,
    /// When the document was produced.
    pub generated_at: DateTime<Utc>,
    /// The query result.
    pub summary: Summary,
}

impl SummaryDocument {
    /// Wrap a summary, stamping the current time.
    pub fn new(
        information_system: impl Into<SystemName>,
        group_code: impl Into<GroupCode>,
        years: &[Year],
        regions: Option<&[RegionAbbr]>,
        summary: Summary,
    ) -> Self {
        Self {
            information_system: information_system.into(),
            group_code: group_code.into(),
            years: years.to_vec(),
            regions: RegionScope::from_regions(regions),
            generated_at: Utc::now(),
            summary,
        }
    }

    /// Conventional file name, `<system>_<group>_<years joined by _>.json`.
    pub fn file_name(&self) -> String {
        let mut parts = vec![
            self.information_system.to_ascii_lowercase(),
            self.group_code.to_ascii_lowercase(),
        ];
        parts.extend(self.years.iter().map(ToString::to_string));
        format!("{}.{JSON_EXTENSION}", parts.join("_"))
    }

    /// Write pretty JSON into `dir` under `file_name()`, returning the path.
    pub fn write_to_dir(&self, dir: &Path) -> Result<PathBuf, TallyError> {
        fs::create_dir_all(dir)?;
        let path = dir.join(self.file_name());
        self.write_json(&path)?;
        Ok(path)
    }

    /// Write pretty JSON to `path`.
    pub fn write_json(&self, path: &Path) -> Result<(), TallyError> {
        let body = serde_json::to_string_pretty(self)?;
        fs::write(path, body)?;
        info!(
            path = %path.display(),
            total_records = self.summary.total_records(),
            "summary exported"
        );
        Ok(())
    }

    /// Load a previously exported document.
    pub fn read_json(path: &Path) -> Result<Self, TallyError> {
        let body = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&body)?)
    }
}
