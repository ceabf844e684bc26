use std::collections::BTreeSet;

use tracing::warn;

use super::GeographicCode;
use super::table::state_prefix;
use crate::config::RegionPolicy;
use crate::constants::partitions::STATE_PREFIX_LEN;
use crate::errors::TallyError;
use crate::types::StatePrefix;

/// Set of state prefixes a query is restricted to.
///
/// A filter built from no regions accepts every code. A filter built from
/// regions that all failed to resolve accepts nothing.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RegionFilterSet {
    prefixes: BTreeSet<StatePrefix>,
    restricted: bool,
}

impl RegionFilterSet {
    /// Filter that accepts every code.
    pub fn all() -> Self {
        Self::default()
    }

    /// Translate caller-supplied abbreviations into a prefix set.
    ///
    /// Under `RegionPolicy::Lenient` unknown abbreviations are dropped with a
    /// warning; under `RegionPolicy::Strict` the first unknown one is an error.
    pub fn from_abbreviations<S: AsRef<str>>(
        regions: Option<&[S]>,
        policy: RegionPolicy,
    ) -> Result<Self, TallyError> {
        let mut prefixes = BTreeSet::new();
        let Some(regions) = regions.filter(|regions| !regions.is_empty()) else {
            return Ok(Self::all());
        };
        let mut dropped = 0usize;
        for region in regions {
            let region = region.as_ref();
            match state_prefix(region) {
                Some(prefix) => {
                    prefixes.insert(prefix);
                }
                None => match policy {
                    RegionPolicy::Strict => {
                        return Err(TallyError::InvalidRegion(region.trim().to_string()));
                    }
                    RegionPolicy::Lenient => {
                        dropped += 1;
                        warn!(region = %region, "dropping unrecognized region abbreviation");
                    }
                },
            }
        }
        if prefixes.is_empty() && dropped > 0 {
            warn!(
                dropped,
                "no recognized region abbreviations; no municipality will match"
            );
        }
        Ok(Self {
            prefixes,
            restricted: true,
        })
    }

    /// True when no filtering was requested.
    pub fn is_empty(&self) -> bool {
        !self.restricted
    }

    /// Prefixes in ascending order.
    pub fn prefixes(&self) -> impl Iterator<Item = StatePrefix> + '_ {
        self.prefixes.iter().copied()
    }

    /// Prefix-membership test for a normalized code.
    pub fn accepts(&self, code: &GeographicCode) -> bool {
        if !self.restricted {
            return true;
        }
        code.as_str()
            .get(..STATE_PREFIX_LEN)
            .is_some_and(|prefix| self.prefixes.contains(prefix))
    }
}
