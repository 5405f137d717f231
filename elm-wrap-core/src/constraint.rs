// SPDX-License-Identifier: MPL-2.0

//! Module helping with serialization and deserialization of version
//! constraints. Grounded directly on the teacher's `constraint.rs`; the
//! only change is the target type, which is our own [`VersionRange`]
//! instead of `pubgrub::range::Range<SemanticVersion>`.

use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

use crate::version::{Version, VersionParseError, VersionRange};

/// A constraint is a simple newtype for [`VersionRange`], parsed from the
/// `"M.N.P <= v < M.N.P"` format used throughout `elm.json` files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Constraint(pub VersionRange);

/// Error creating [`Constraint`] from a `&str`.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConstraintParseError {
    #[error(
        "invalid format \"{full_constraint}\": constraint must have the shape \"v1 <= v < v2\""
    )]
    InvalidFormat { full_constraint: String },
    #[error("invalid separators \"{full_constraint}\": the only separators allowed are \"<=\" and \"<\"")]
    InvalidSeparator { full_constraint: String },
    #[error("invalid version in constraint: {0}")]
    InvalidVersion(VersionParseError),
}

impl FromStr for Constraint {
    type Err = ConstraintParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split_whitespace().collect();
        match *parts.as_slice() {
            [low, sep1, _marker, sep2, high] => {
                let v1: Version = low.parse().map_err(Self::Err::InvalidVersion)?;
                let v2: Version = high.parse().map_err(Self::Err::InvalidVersion)?;
                if sep1 != "<=" && sep1 != "<" {
                    return Err(Self::Err::InvalidSeparator {
                        full_constraint: s.to_string(),
                    });
                }
                if sep2 != "<=" && sep2 != "<" {
                    return Err(Self::Err::InvalidSeparator {
                        full_constraint: s.to_string(),
                    });
                }
                let lower = VersionRange::higher_than(v1, sep1 == "<=");
                let upper = VersionRange::lower_than(v2, sep2 != "<");
                Ok(Self(lower.intersection(&upper)))
            }
            _ => Err(Self::Err::InvalidFormat {
                full_constraint: s.to_string(),
            }),
        }
    }
}

impl Constraint {
    /// Render back into the `"v1 <= v < v2"` shape. Only defined for
    /// constraints that have both bounds finite, which is the only shape
    /// the elm ecosystem ever writes to disk.
    pub fn to_elm_string(&self) -> String {
        let r = &self.0;
        if r.is_empty {
            return "<empty>".to_string();
        }
        let lo_op = if r.lower.inclusive { "<=" } else { "<" };
        let hi_op = if r.upper.inclusive { "<=" } else { "<" };
        format!("{} {} v {} {}", r.lower.v, lo_op, hi_op, r.upper.v)
    }
}

impl Serialize for Constraint {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_elm_string())
    }
}

impl<'de> Deserialize<'de> for Constraint {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        FromStr::from_str(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_the_elm_json_shape() {
        let c: Constraint = "1.0.2 <= v < 2.0.0".parse().unwrap();
        assert!(c.0.contains(Version::new(1, 0, 2)));
        assert!(c.0.contains(Version::new(1, 9, 9)));
        assert!(!c.0.contains(Version::new(2, 0, 0)));
    }

    #[test]
    fn lower_strict_separator_bumps_the_patch() {
        let c: Constraint = "1.0.0 < v < 2.0.0".parse().unwrap();
        assert!(!c.0.contains(Version::new(1, 0, 0)));
        assert!(c.0.contains(Version::new(1, 0, 1)));
    }

    #[test]
    fn upper_inclusive_separator_includes_the_bound() {
        let c: Constraint = "1.0.0 <= v <= 2.0.0".parse().unwrap();
        assert!(c.0.contains(Version::new(2, 0, 0)));
        assert!(!c.0.contains(Version::new(2, 0, 1)));
    }

    #[test]
    fn rejects_wrong_separators() {
        assert!("1.0.0 = v < 2.0.0".parse::<Constraint>().is_err());
    }

    #[test]
    fn rejects_malformed_shape() {
        assert!("1.0.0 <= 2.0.0".parse::<Constraint>().is_err());
    }

    #[test]
    fn round_trips_through_display() {
        let c: Constraint = "1.0.2 <= v < 2.0.0".parse().unwrap();
        let s = c.to_elm_string();
        let c2: Constraint = s.parse().unwrap();
        assert_eq!(c, c2);
    }
}
