use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;

/// Leading `major.minor.patch`; anything after it (pre-release, build) is ignored
static VERSION_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+)\.(\d+)\.(\d+)").expect("version prefix regex is valid"));

/// Error type for version parsing
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VersionError {
    #[error("Invalid version format: {0}")]
    InvalidFormat(String),
}

/// The `(major, minor, patch)` triple used for range comparisons
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VersionTriple {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
}

impl VersionTriple {
    pub fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self { major, minor, patch }
    }

    /// Parses the leading `X.Y.Z` of a version string like "1.2.3" or "1.2.3-beta.1"
    pub fn parse_prefix(version: &str) -> Result<Self, VersionError> {
        let caps = VERSION_PREFIX
            .captures(version.trim())
            .ok_or_else(|| VersionError::InvalidFormat(version.to_string()))?;

        let part = |i: usize| -> Result<u64, VersionError> {
            caps[i]
                .parse::<u64>()
                .map_err(|_| VersionError::InvalidFormat(version.to_string()))
        };

        Ok(Self::new(part(1)?, part(2)?, part(3)?))
    }
}

impl FromStr for VersionTriple {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        VersionTriple::parse_prefix(s)
    }
}

impl fmt::Display for VersionTriple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// True if `version` is a complete semantic version (with optional pre-release and build metadata)
pub fn is_valid_semver(version: &str) -> bool {
    semver::Version::parse(version).is_ok()
}

/// A single `>=`, `>`, `<=` or `<` clause
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparator {
    GreaterOrEqual(VersionTriple),
    Greater(VersionTriple),
    LessOrEqual(VersionTriple),
    Less(VersionTriple),
}

impl Comparator {
    fn parse(clause: &str) -> Option<Self> {
        // Two-character operators must be tried first
        let (ctor, operand): (fn(VersionTriple) -> Comparator, &str) =
            if let Some(rest) = clause.strip_prefix(">=") {
                (Comparator::GreaterOrEqual, rest)
            } else if let Some(rest) = clause.strip_prefix("<=") {
                (Comparator::LessOrEqual, rest)
            } else if let Some(rest) = clause.strip_prefix('>') {
                (Comparator::Greater, rest)
            } else if let Some(rest) = clause.strip_prefix('<') {
                (Comparator::Less, rest)
            } else {
                return None;
            };

        VersionTriple::parse_prefix(operand).ok().map(ctor)
    }

    fn matches(&self, candidate: VersionTriple) -> bool {
        match self {
            Comparator::GreaterOrEqual(v) => candidate.cmp(v) != Ordering::Less,
            Comparator::Greater(v) => candidate.cmp(v) == Ordering::Greater,
            Comparator::LessOrEqual(v) => candidate.cmp(v) != Ordering::Greater,
            Comparator::Less(v) => candidate.cmp(v) == Ordering::Less,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum RangeKind {
    /// No operator characters: literal string equality
    Exact(String),
    /// `^X.Y.Z`: same major, `(minor, patch) >= (Y, Z)`
    Caret(VersionTriple),
    /// `~X.Y.Z`: same major and minor, `patch >= Z`
    Tilde(VersionTriple),
    /// Space-separated clauses, all of which must hold
    Comparators(Vec<Comparator>),
    /// Anything else never matches
    Unsupported,
}

/// Represents a dependency version requirement such as `^1.2.0` or `>=1.0.0 <2.0.0`.
///
/// Parsing never fails: unrecognized syntax yields a range that matches nothing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionRange {
    /// The original constraint string
    constraint: String,
    kind: RangeKind,
}

impl VersionRange {
    /// Creates a new version range from a constraint string.
    pub fn from_constraint(constraint: &str) -> Self {
        let trimmed = constraint.trim();
        let kind = if !trimmed.contains(['^', '~', '>', '<']) {
            RangeKind::Exact(trimmed.to_string())
        } else if let Some(rest) = trimmed.strip_prefix('^') {
            Self::single_operand(rest).map_or(RangeKind::Unsupported, RangeKind::Caret)
        } else if let Some(rest) = trimmed.strip_prefix('~') {
            Self::single_operand(rest).map_or(RangeKind::Unsupported, RangeKind::Tilde)
        } else {
            trimmed
                .split_whitespace()
                .map(Comparator::parse)
                .collect::<Option<Vec<_>>>()
                .filter(|clauses| !clauses.is_empty())
                .map_or(RangeKind::Unsupported, RangeKind::Comparators)
        };

        Self {
            constraint: constraint.to_string(),
            kind,
        }
    }

    fn single_operand(operand: &str) -> Option<VersionTriple> {
        if operand.contains(char::is_whitespace) {
            return None;
        }
        VersionTriple::parse_prefix(operand).ok()
    }

    /// Checks if a version string satisfies this range.
    pub fn matches(&self, version: &str) -> bool {
        if let RangeKind::Exact(expected) = &self.kind {
            return version.trim() == expected;
        }

        let Ok(candidate) = VersionTriple::parse_prefix(version) else {
            return false;
        };

        match &self.kind {
            RangeKind::Exact(_) | RangeKind::Unsupported => false,
            RangeKind::Caret(min) => {
                candidate.major == min.major && (candidate.minor, candidate.patch) >= (min.minor, min.patch)
            }
            RangeKind::Tilde(min) => {
                candidate.major == min.major && candidate.minor == min.minor && candidate.patch >= min.patch
            }
            RangeKind::Comparators(clauses) => clauses.iter().all(|clause| clause.matches(candidate)),
        }
    }

    /// False when the constraint uses syntax this grammar does not understand
    pub fn is_supported(&self) -> bool {
        self.kind != RangeKind::Unsupported
    }

    /// Returns the original constraint string.
    pub fn constraint_string(&self) -> &str {
        &self.constraint
    }
}

/// Implement Display to show the original constraint string.
impl fmt::Display for VersionRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.constraint)
    }
}

/// Allow parsing directly from a string slice.
impl FromStr for VersionRange {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(VersionRange::from_constraint(s))
    }
}

/// Check whether `version` satisfies `range`
pub fn satisfies_version(version: &str, range: &str) -> bool {
    VersionRange::from_constraint(range).matches(version)
}
