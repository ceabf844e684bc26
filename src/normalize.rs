//! Canonicalization of loosely-typed registry fields.
//!
//! Registries serialize the same field as an integer, a float (`260010.0`), a
//! string, or null depending on year and export tool. Everything downstream
//! of this module sees only canonical values.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::aggregate::AggregationKey;
use crate::config::DatasetProfile;
use crate::constants::buckets;
use crate::geography::{GeographicCode, strip_float_artifact};
use crate::source::RawRecord;
use crate::types::{ColumnName, SexCode};

/// Mother's age band. Bands are closed, disjoint, and ordered.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum AgeBucket {
    /// Younger than 20.
    #[serde(rename = "<20")]
    Under20,
    /// 20 through 29.
    #[serde(rename = "20-29")]
    From20To29,
    /// 30 through 39.
    #[serde(rename = "30-39")]
    From30To39,
    /// 40 or older.
    #[serde(rename = "40+")]
    From40,
    /// Missing, non-numeric, negative, or fractional age.
    #[serde(rename = "unknown")]
    Unknown,
}

impl AgeBucket {
    /// Bucket for an age in whole years.
    pub fn from_years(age: i64) -> Self {
        match age {
            i64::MIN..=-1 => AgeBucket::Unknown,
            0..=19 => AgeBucket::Under20,
            20..=29 => AgeBucket::From20To29,
            30..=39 => AgeBucket::From30To39,
            _ => AgeBucket::From40,
        }
    }

    /// Stable label used as a summary key.
    pub fn label(self) -> &'static str {
        match self {
            AgeBucket::Under20 => buckets::AGE_UNDER_20,
            AgeBucket::From20To29 => buckets::AGE_20_29,
            AgeBucket::From30To39 => buckets::AGE_30_39,
            AgeBucket::From40 => buckets::AGE_40_PLUS,
            AgeBucket::Unknown => buckets::UNKNOWN,
        }
    }
}

impl fmt::Display for AgeBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Why a row was left out of aggregation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RowRejection {
    /// Municipality value is null, empty, or not a digit string.
    InvalidGeographicCode,
    /// The file carries none of the profile's municipality columns.
    MissingMunicipalityColumn,
}

/// Render a scalar JSON value as trimmed text; null, empty, and nested values yield `None`.
fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => {
            let text = text.trim();
            (!text.is_empty()).then(|| text.to_string())
        }
        Value::Number(number) => Some(number.to_string()),
        Value::Null | Value::Bool(_) | Value::Array(_) | Value::Object(_) => None,
    }
}

/// Canonicalize a raw municipality value.
pub fn normalize_geographic_code(value: &Value) -> Option<GeographicCode> {
    scalar_text(value).and_then(|text| GeographicCode::parse(&text))
}

/// Canonicalize a raw sex value; missing values become `unknown`.
pub fn normalize_sex(value: Option<&Value>) -> SexCode {
    value
        .and_then(scalar_text)
        .map(|text| strip_float_artifact(&text).to_string())
        .filter(|text| !text.is_empty())
        .unwrap_or_else(|| buckets::UNKNOWN.to_string())
}

/// Bucket a raw mother's-age value.
pub fn bucket_mother_age(value: Option<&Value>) -> AgeBucket {
    let years = match value {
        Some(Value::Number(number)) => number.as_i64().or_else(|| {
            number
                .as_f64()
                .filter(|age| age.is_finite() && age.fract() == 0.0)
                .map(|age| age as i64)
        }),
        Some(Value::String(text)) => strip_float_artifact(text.trim()).parse::<i64>().ok(),
        _ => None,
    };
    years.map(AgeBucket::from_years).unwrap_or(AgeBucket::Unknown)
}

/// Per-file row normalizer bound to the columns that file actually carries.
#[derive(Clone, Debug)]
pub struct RowNormalizer {
    municipality_column: Option<ColumnName>,
    sex_column: Option<ColumnName>,
    mother_age_column: Option<ColumnName>,
}

impl RowNormalizer {
    /// Resolve the profile's columns against a file schema.
    ///
    /// The municipality column is the first profile candidate present in
    /// `available`. Secondary dimensions stay enabled even when the file lacks
    /// the column so their breakdowns still sum to the municipality total.
    pub fn for_columns(profile: &DatasetProfile, available: &[ColumnName]) -> Self {
        let municipality_column = profile
            .municipality_columns
            .iter()
            .find(|candidate| available.contains(candidate))
            .cloned();
        Self {
            municipality_column,
            sex_column: profile.sex_column.clone(),
            mother_age_column: profile.mother_age_column.clone(),
        }
    }

    /// Column used for the municipality code, if the file has one.
    pub fn municipality_column(&self) -> Option<&str> {
        self.municipality_column.as_deref()
    }

    /// Turn one raw record into its aggregation key.
    pub fn normalize(&self, record: &RawRecord) -> Result<AggregationKey, RowRejection> {
        let column = self
            .municipality_column
            .as_ref()
            .ok_or(RowRejection::MissingMunicipalityColumn)?;
        let municipality = record
            .get(column)
            .and_then(normalize_geographic_code)
            .ok_or(RowRejection::InvalidGeographicCode)?;
        let sex = self
            .sex_column
            .as_ref()
            .map(|column| normalize_sex(record.get(column)));
        let age_group = self
            .mother_age_column
            .as_ref()
            .map(|column| bucket_mother_age(record.get(column)));
        Ok(AggregationKey {
            municipality,
            sex,
            age_group,
        })
    }
}
