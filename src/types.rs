/// Dataset variant selector passed through to partition resolution.
/// Examples: `DO` (SIM deaths), `DN` (SINASC births), `DENG` (SINAN dengue)
pub type GroupCode = String;
/// Calendar year of a partition.
/// Examples: `2021`, `2022`
pub type Year = i32;
/// State abbreviation supplied by callers.
/// Examples: `PE`, `SP`, `rs`
pub type RegionAbbr = String;
/// Two-digit IBGE state prefix.
/// Examples: `26`, `35`
pub type StatePrefix = &'static str;
/// Column name in a partition file.
/// Examples: `CODMUNOCOR`, `CODMUNNASC`, `ID_MN_RESI`
pub type ColumnName = String;
/// Canonical sex code as stored by the registry.
/// Examples: `1`, `2`, `unknown`
pub type SexCode = String;
/// Name of an information system, used in exports.
/// Examples: `SIM`, `SINAN`, `SINASC`
pub type SystemName = String;
/// Number of residents of a municipality.
pub type Population = u64;
