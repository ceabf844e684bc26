/// Column names used by the built-in dataset profiles.
pub mod columns {
    /// SIM: municipality where the death occurred.
    pub const SIM_MUNICIPALITY: &str = "CODMUNOCOR";
    /// SINASC: municipality of birth.
    pub const SINASC_MUNICIPALITY: &str = "CODMUNNASC";
    /// SINASC: newborn sex.
    pub const SINASC_SEX: &str = "SEXO";
    /// SINASC: mother's age in years.
    pub const SINASC_MOTHER_AGE: &str = "IDADEMAE";
    /// SINAN: municipality of residence (preferred).
    pub const SINAN_RESIDENCE: &str = "ID_MN_RESI";
    /// SINAN: municipality of notification unit.
    pub const SINAN_MUNICIPALITY: &str = "ID_MUNICIP";
    /// SINAN: municipality of notification (fallback).
    pub const SINAN_NOTIFICATION: &str = "ID_MN_NOT";
}

/// Labels emitted by the row normalizer.
pub mod buckets {
    /// Mother younger than 20.
    pub const AGE_UNDER_20: &str = "<20";
    /// Mother aged 20 through 29.
    pub const AGE_20_29: &str = "20-29";
    /// Mother aged 30 through 39.
    pub const AGE_30_39: &str = "30-39";
    /// Mother aged 40 or more.
    pub const AGE_40_PLUS: &str = "40+";
    /// Missing or unparseable value for any secondary dimension.
    pub const UNKNOWN: &str = "unknown";
}

/// Constants used by the partition reader and locator.
pub mod partitions {
    /// Extension of columnar partition files.
    pub const PARQUET_EXTENSION: &str = "parquet";
    /// Length of the state prefix at the start of a municipality code.
    pub const STATE_PREFIX_LEN: usize = 2;
    /// Scope tag used by nationwide partitions (e.g. `DENGBR22`).
    pub const NATIONWIDE_SCOPE: &str = "BR";
}

/// Constants used by summary export and rate computation.
pub mod export {
    /// Placeholder written when no region filter was requested.
    pub const ALL_REGIONS: &str = "all";
    /// Extension used for exported summary documents.
    pub const JSON_EXTENSION: &str = "json";
    /// Multiplier for disease prevalence (cases per 100k residents).
    pub const PREVALENCE_MULTIPLIER: f64 = 100_000.0;
    /// Multiplier for birth rates (births per 1k residents).
    pub const BIRTH_RATE_MULTIPLIER: f64 = 1_000.0;
}
