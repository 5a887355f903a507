//! Semantic (not lexical) device software version comparison.
//!
//! PIX behavior forks at version boundaries (6.3 and 7.0 for the commands
//! this compiler emits), so "10.0" must compare greater than "6.3". A
//! version string that fails to parse fails the compilation rather than
//! silently choosing a branch.

use std::cmp::Ordering;
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error for a version string this comparator cannot interpret.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("unparseable version string '{0}'")]
pub struct VersionError(pub String);

/// A dotted-numeric software version such as "6.3" or "7.2(1)".
///
/// Interim-release parentheses are treated as one more dotted component,
/// so "6.3(4)" parses like "6.3.4". Missing components compare as zero:
/// "7" == "7.0".
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Version {
    components: Vec<u32>,
    raw: String,
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Version {}

impl Version {
    /// Compare against a threshold given as a literal like "6.3".
    /// Thresholds are compiled-in constants, so a bad literal is a bug.
    pub fn at_least(&self, threshold: &str) -> bool {
        let threshold: Version = threshold.parse().unwrap_or_else(|_| {
            unreachable!("version thresholds are compiled-in literals")
        });
        *self >= threshold
    }
}

impl FromStr for Version {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let cleaned = s.trim().replace('(', ".").replace(')', "");
        if cleaned.is_empty() {
            return Err(VersionError(s.to_string()));
        }
        let components = cleaned
            .split('.')
            .map(|part| part.parse::<u32>().map_err(|_| VersionError(s.to_string())))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Version { components, raw: s.trim().to_string() })
    }
}

impl TryFrom<String> for Version {
    type Error = VersionError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Version> for String {
    fn from(value: Version) -> Self {
        value.raw
    }
}

impl Display for Version {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        let len = self.components.len().max(other.components.len());
        for i in 0..len {
            let a = self.components.get(i).copied().unwrap_or(0);
            let b = other.components.get(i).copied().unwrap_or(0);
            match a.cmp(&b) {
                Ordering::Equal => continue,
                unequal => return unequal,
            }
        }
        Ordering::Equal
    }
}
