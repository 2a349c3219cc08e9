use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::topology_error::TopologyError;

/// One tag predicate: a server matches when its tags are a superset of the
/// set's key/value pairs.
pub type TagSet = HashMap<String, String>;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum ReadPreferenceMode {
    Primary,
    PrimaryPreferred,
    Secondary,
    SecondaryPreferred,
    Nearest,
}

impl fmt::Display for ReadPreferenceMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ReadPreferenceMode::Primary => "primary",
            ReadPreferenceMode::PrimaryPreferred => "primaryPreferred",
            ReadPreferenceMode::Secondary => "secondary",
            ReadPreferenceMode::SecondaryPreferred => "secondaryPreferred",
            ReadPreferenceMode::Nearest => "nearest",
        };
        f.write_str(s)
    }
}

impl FromStr for ReadPreferenceMode {
    type Err = TopologyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "primary" => Ok(ReadPreferenceMode::Primary),
            "primaryPreferred" => Ok(ReadPreferenceMode::PrimaryPreferred),
            "secondary" => Ok(ReadPreferenceMode::Secondary),
            "secondaryPreferred" => Ok(ReadPreferenceMode::SecondaryPreferred),
            "nearest" => Ok(ReadPreferenceMode::Nearest),
            other => Err(TopologyError::InvalidReadPreference(format!(
                "unknown mode `{other}`"
            ))),
        }
    }
}

/// A caller's read policy: which roles are acceptable, optionally narrowed
/// by ordered tag sets and a staleness bound.
///
/// Contradictory combinations are rejected at construction time, so a
/// `ReadPreference` value is always internally consistent.
#[derive(Clone, Debug, PartialEq)]
pub struct ReadPreference {
    mode: ReadPreferenceMode,
    tag_sets: Vec<TagSet>,
    max_staleness: Option<Duration>,
}

impl ReadPreference {
    pub fn new(
        mode: ReadPreferenceMode,
        tag_sets: Vec<TagSet>,
        max_staleness: Option<Duration>,
    ) -> Result<Self, TopologyError> {
        if mode == ReadPreferenceMode::Primary {
            if !tag_sets.is_empty() {
                return Err(TopologyError::InvalidReadPreference(
                    "primary mode cannot be combined with tag sets".to_string(),
                ));
            }
            if max_staleness.is_some() {
                return Err(TopologyError::InvalidReadPreference(
                    "primary mode cannot be combined with maxStalenessSeconds".to_string(),
                ));
            }
        }

        Ok(Self {
            mode,
            tag_sets,
            max_staleness,
        })
    }

    pub fn primary() -> Self {
        Self {
            mode: ReadPreferenceMode::Primary,
            tag_sets: Vec::new(),
            max_staleness: None,
        }
    }

    pub fn primary_preferred() -> Self {
        Self::plain(ReadPreferenceMode::PrimaryPreferred)
    }

    pub fn secondary() -> Self {
        Self::plain(ReadPreferenceMode::Secondary)
    }

    pub fn secondary_preferred() -> Self {
        Self::plain(ReadPreferenceMode::SecondaryPreferred)
    }

    pub fn nearest() -> Self {
        Self::plain(ReadPreferenceMode::Nearest)
    }

    fn plain(mode: ReadPreferenceMode) -> Self {
        Self {
            mode,
            tag_sets: Vec::new(),
            max_staleness: None,
        }
    }

    pub fn mode(&self) -> ReadPreferenceMode {
        self.mode
    }

    pub fn tag_sets(&self) -> &[TagSet] {
        &self.tag_sets
    }

    pub fn max_staleness(&self) -> Option<Duration> {
        self.max_staleness
    }
}

impl fmt::Display for ReadPreference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.mode)?;
        if !self.tag_sets.is_empty() {
            write!(f, " with {} tag set(s)", self.tag_sets.len())?;
        }
        if let Some(max_staleness) = self.max_staleness {
            write!(f, ", max staleness {max_staleness:?}")?;
        }
        Ok(())
    }
}
