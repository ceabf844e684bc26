use crate::types::StatePrefix;

/// State abbreviation to IBGE prefix, ordered by prefix.
const STATE_PREFIXES: [(&str, StatePrefix); 27] = [
    ("RO", "11"),
    ("AC", "12"),
    ("AM", "13"),
    ("RR", "14"),
    ("PA", "15"),
    ("AP", "16"),
    ("TO", "17"),
    ("MA", "21"),
    ("PI", "22"),
    ("CE", "23"),
    ("RN", "24"),
    ("PB", "25"),
    ("PE", "26"),
    ("AL", "27"),
    ("SE", "28"),
    ("BA", "29"),
    ("MG", "31"),
    ("ES", "32"),
    ("RJ", "33"),
    ("SP", "35"),
    ("PR", "41"),
    ("SC", "42"),
    ("RS", "43"),
    ("MS", "50"),
    ("MT", "51"),
    ("GO", "52"),
    ("DF", "53"),
];

/// Look up the two-digit IBGE prefix for a state abbreviation.
///
/// Matching ignores case and surrounding whitespace.
pub fn state_prefix(abbr: &str) -> Option<StatePrefix> {
    let abbr = abbr.trim();
    STATE_PREFIXES
        .iter()
        .find(|(candidate, _)| candidate.eq_ignore_ascii_case(abbr))
        .map(|(_, prefix)| *prefix)
}

/// Reverse lookup: the abbreviation owning a two-digit prefix.
pub fn state_abbreviation(prefix: &str) -> Option<&'static str> {
    STATE_PREFIXES
        .iter()
        .find(|(_, candidate)| *candidate == prefix)
        .map(|(abbr, _)| *abbr)
}

/// All known abbreviations, in prefix order.
pub fn state_abbreviations() -> impl Iterator<Item = &'static str> {
    STATE_PREFIXES.iter().map(|(abbr, _)| *abbr)
}
