// SPDX-License-Identifier: MPL-2.0

//! Semantic version triples and the range algebra built on top of them.
//!
//! This replaces the `pubgrub::version::SemanticVersion` /
//! `pubgrub::range::Range` pair the teacher crate leaned on. We need our own
//! representation because the solver internals in [`crate::pgsolver`] and
//! the range algebra tested in `§8` of the spec must be owned directly by
//! this crate rather than deferred to an external solver implementation.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// A semantic version, restricted to the `major.minor.patch` triple that
/// elm.json files use (no pre-release or build metadata).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Version {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

/// Error parsing a [`Version`] from its canonical `"M.N.P"` string form.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VersionParseError {
    #[error("version `{0}` must have the shape \"major.minor.patch\"")]
    WrongShape(String),
    #[error("component `{component}` of version `{full}` is not a non-negative integer")]
    NotANumber { full: String, component: String },
}

impl Version {
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Version { major, minor, patch }
    }

    pub const fn zero() -> Self {
        Version::new(0, 0, 0)
    }

    /// The bump used by `"v1 <= v"` constraint halves: the smallest version
    /// strictly greater than `self`.
    pub fn bump_patch(self) -> Self {
        Version::new(self.major, self.minor, self.patch + 1)
    }

    pub fn bump_minor(self) -> Self {
        Version::new(self.major, self.minor + 1, 0)
    }

    pub fn bump_major(self) -> Self {
        Version::new(self.major + 1, 0, 0)
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.major, self.minor, self.patch).cmp(&(other.major, other.minor, other.patch))
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

impl FromStr for Version {
    type Err = VersionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split('.').collect();
        let [major, minor, patch]: [&str; 3] = parts
            .as_slice()
            .try_into()
            .map_err(|_| VersionParseError::WrongShape(s.to_string()))?;
        let parse_component = |component: &str| {
            component
                .parse::<u32>()
                .map_err(|_| VersionParseError::NotANumber {
                    full: s.to_string(),
                    component: component.to_string(),
                })
        };
        Ok(Version::new(
            parse_component(major)?,
            parse_component(minor)?,
            parse_component(patch)?,
        ))
    }
}

impl Serialize for Version {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Version {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// One side of a [`VersionRange`]: either unbounded, or a version with an
/// inclusive/exclusive flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VersionBound {
    pub v: Version,
    pub inclusive: bool,
    pub unbounded: bool,
}

impl VersionBound {
    pub const fn unbounded() -> Self {
        VersionBound {
            v: Version::zero(),
            inclusive: false,
            unbounded: true,
        }
    }

    pub const fn inclusive(v: Version) -> Self {
        VersionBound {
            v,
            inclusive: true,
            unbounded: false,
        }
    }

    pub const fn exclusive(v: Version) -> Self {
        VersionBound {
            v,
            inclusive: false,
            unbounded: false,
        }
    }
}

/// A (possibly empty, possibly unbounded) set of versions, represented as a
/// contiguous interval. This is the only shape of constraint the elm
/// ecosystem ever produces (`"M.N.P <= v < M'.N'.P'"`), so unlike general
/// purpose semver crates we do not need unions of ranges.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionRange {
    pub lower: VersionBound,
    pub upper: VersionBound,
    pub is_empty: bool,
}

impl VersionRange {
    /// The range containing every version.
    pub fn any() -> Self {
        VersionRange {
            lower: VersionBound::unbounded(),
            upper: VersionBound::unbounded(),
            is_empty: false,
        }
    }

    /// The range containing nothing.
    pub fn none() -> Self {
        VersionRange {
            lower: VersionBound::unbounded(),
            upper: VersionBound::unbounded(),
            is_empty: true,
        }
    }

    /// The range containing exactly one version.
    pub fn exact(v: Version) -> Self {
        VersionRange {
            lower: VersionBound::inclusive(v),
            upper: VersionBound::inclusive(v),
            is_empty: false,
        }
    }

    /// `[v, v.major.(v.minor+1).0)`
    pub fn until_next_minor(v: Version) -> Self {
        VersionRange {
            lower: VersionBound::inclusive(v),
            upper: VersionBound::exclusive(v.bump_minor()),
            is_empty: false,
        }
    }

    /// `[v, (v.major+1).0.0)`
    pub fn until_next_major(v: Version) -> Self {
        VersionRange {
            lower: VersionBound::inclusive(v),
            upper: VersionBound::exclusive(v.bump_major()),
            is_empty: false,
        }
    }

    /// Every version greater than (or equal to, if `inclusive`) `v`.
    pub fn higher_than(v: Version, inclusive: bool) -> Self {
        let lower = if inclusive {
            VersionBound::inclusive(v)
        } else {
            VersionBound::exclusive(v)
        };
        VersionRange {
            lower,
            upper: VersionBound::unbounded(),
            is_empty: false,
        }
    }

    /// Every version lower than (or equal to, if `inclusive`) `v`.
    pub fn lower_than(v: Version, inclusive: bool) -> Self {
        let upper = if inclusive {
            VersionBound::inclusive(v)
        } else {
            VersionBound::exclusive(v)
        };
        VersionRange {
            lower: VersionBound::unbounded(),
            upper,
            is_empty: false,
        }
    }

    pub fn contains(&self, v: Version) -> bool {
        if self.is_empty {
            return false;
        }
        let above_lower = self.lower.unbounded
            || (self.lower.inclusive && v >= self.lower.v)
            || (!self.lower.inclusive && v > self.lower.v);
        let below_upper = self.upper.unbounded
            || (self.upper.inclusive && v <= self.upper.v)
            || (!self.upper.inclusive && v < self.upper.v);
        above_lower && below_upper
    }

    /// Whether `self` and `other` contain exactly the same versions as an
    /// unbounded range, i.e. `self` is `any()`.
    pub fn is_any(&self) -> bool {
        !self.is_empty && self.lower.unbounded && self.upper.unbounded
    }

    /// The tighter of two lower bounds (the one that excludes more).
    fn tighter_lower(a: VersionBound, b: VersionBound) -> VersionBound {
        if a.unbounded {
            return b;
        }
        if b.unbounded {
            return a;
        }
        match a.v.cmp(&b.v) {
            Ordering::Greater => a,
            Ordering::Less => b,
            Ordering::Equal => {
                if a.inclusive && b.inclusive {
                    a
                } else {
                    VersionBound::exclusive(a.v)
                }
            }
        }
    }

    /// The tighter of two upper bounds (the one that excludes more).
    fn tighter_upper(a: VersionBound, b: VersionBound) -> VersionBound {
        if a.unbounded {
            return b;
        }
        if b.unbounded {
            return a;
        }
        match a.v.cmp(&b.v) {
            Ordering::Less => a,
            Ordering::Greater => b,
            Ordering::Equal => {
                if a.inclusive && b.inclusive {
                    a
                } else {
                    VersionBound::exclusive(a.v)
                }
            }
        }
    }

    /// Intersection: the tighter of both bounds, `is_empty` set when the
    /// result cannot be satisfied by any version. Commutative and
    /// idempotent, per §8's "Range algebra" testable property.
    pub fn intersection(&self, other: &Self) -> Self {
        if self.is_empty || other.is_empty {
            return VersionRange::none();
        }
        let lower = Self::tighter_lower(self.lower, other.lower);
        let upper = Self::tighter_upper(self.upper, other.upper);
        let is_empty = match (lower.unbounded, upper.unbounded) {
            (false, false) => {
                if lower.v > upper.v {
                    true
                } else if lower.v == upper.v {
                    !(lower.inclusive && upper.inclusive)
                } else {
                    false
                }
            }
            _ => false,
        };
        VersionRange {
            lower,
            upper,
            is_empty,
        }
    }

    /// The negation of this range, as far as is representable by a single
    /// interval extended to `VersionRange::any()` on both tails. Used by
    /// the solver when deriving the negation of an unsatisfied term; it is
    /// only ever called with a range that already has at least one finite
    /// bound in practice (exact versions, or half-open dependency ranges).
    pub fn complement_contains(&self, v: Version) -> bool {
        !self.contains(v)
    }
}

impl fmt::Display for VersionRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty {
            return write!(f, "∅");
        }
        if self.is_any() {
            return write!(f, "*");
        }
        if self.lower.v == self.upper.v && !self.lower.unbounded && !self.upper.unbounded
            && self.lower.inclusive && self.upper.inclusive
        {
            return write!(f, "{}", self.lower.v);
        }
        match (self.lower.unbounded, self.upper.unbounded) {
            (false, true) => {
                let op = if self.lower.inclusive { ">=" } else { ">" };
                write!(f, "{}{}", op, self.lower.v)
            }
            (true, false) => {
                let op = if self.upper.inclusive { "<=" } else { "<" };
                write!(f, "{}{}", op, self.upper.v)
            }
            (false, false) => {
                let lop = if self.lower.inclusive { ">=" } else { ">" };
                let uop = if self.upper.inclusive { "<=" } else { "<" };
                write!(f, "{}{} {}{}", lop, self.lower.v, uop, self.upper.v)
            }
            (true, true) => write!(f, "*"),
        }
    }
}
