// SPDX-License-Identifier: MPL-2.0

//! General-purpose, possibly-disjoint version sets.
//!
//! The public [`crate::version::VersionRange`] is a single interval because
//! that is the only shape `elm.json` constraints ever take. The solver
//! internals need more than that: a [`crate::pgsolver::types::Term`]'s
//! negation, and the running intersection of everything derived about a
//! package, can both end up as a union of disjoint intervals (for example
//! "not in `[1.0.0, 2.0.0)`" is `(-inf, 1.0.0) ∪ [2.0.0, +inf)`).
//!
//! This mirrors the `Range` type the vendored from-scratch PubGrub
//! implementations in the reference pack use internally (`astral-sh/uv`'s
//! vendored `pubgrub` crate, and the general shape `libretto`'s own
//! resolver reaches for via `version_ranges::Ranges`) — a sorted list of
//! disjoint segments — reimplemented here against our own [`Version`]
//! type instead of importing either crate.

use std::cmp::Ordering;

use crate::version::{Version, VersionBound, VersionRange};

type Lower = Option<(Version, bool)>;
type Upper = Option<(Version, bool)>;

/// A set of versions represented as a sorted list of disjoint, non-adjacent
/// segments. An empty `segments` vector is the empty set; a single
/// `(None, None)` segment is the universal set.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Ranges {
    segments: Vec<(Lower, Upper)>,
}

fn lower_of(b: VersionBound) -> Lower {
    if b.unbounded {
        None
    } else {
        Some((b.v, b.inclusive))
    }
}

fn upper_of(b: VersionBound) -> Upper {
    if b.unbounded {
        None
    } else {
        Some((b.v, b.inclusive))
    }
}

/// Lower-bound ordering: unbounded (`-inf`) sorts first; at equal version,
/// an inclusive bound sorts before an exclusive one (it admits more).
fn lower_cmp(a: Lower, b: Lower) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some((v1, i1)), Some((v2, i2))) => v1.cmp(&v2).then((!i1).cmp(&!i2)),
    }
}

/// Upper-bound ordering: unbounded (`+inf`) sorts last; at equal version,
/// an inclusive bound sorts after an exclusive one.
fn upper_cmp(a: Upper, b: Upper) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Greater,
        (Some(_), None) => Ordering::Less,
        (Some((v1, i1)), Some((v2, i2))) => v1.cmp(&v2).then(i1.cmp(&i2)),
    }
}

/// Whether `upper` (end of one segment) and `lower` (start of the next)
/// overlap or touch closely enough that the segments should be merged.
/// Exact single-version gaps between an exclusive upper and an exclusive
/// lower at the same version are treated as contiguous; this is the one
/// documented approximation (see DESIGN.md) and never affects the
/// half-open ranges produced by `elm.json` constraints.
fn touches(upper: Upper, lower: Lower) -> bool {
    match (upper, lower) {
        (None, _) | (_, None) => true,
        (Some((uv, _)), Some((lv, _))) => uv >= lv,
    }
}

impl Ranges {
    pub fn empty() -> Self {
        Ranges { segments: Vec::new() }
    }

    pub fn any() -> Self {
        Ranges {
            segments: vec![(None, None)],
        }
    }

    /// Convert a single-interval [`VersionRange`] into a [`Ranges`].
    pub fn from_range(r: &VersionRange) -> Self {
        if r.is_empty {
            return Ranges::empty();
        }
        Ranges {
            segments: vec![(lower_of(r.lower), upper_of(r.upper))],
        }
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn contains(&self, v: Version) -> bool {
        self.segments.iter().any(|(lo, hi)| {
            let above_lower = match lo {
                None => true,
                Some((lv, incl)) => {
                    if *incl {
                        v >= *lv
                    } else {
                        v > *lv
                    }
                }
            };
            let below_upper = match hi {
                None => true,
                Some((hv, incl)) => {
                    if *incl {
                        v <= *hv
                    } else {
                        v < *hv
                    }
                }
            };
            above_lower && below_upper
        })
    }

    /// Union of `self` and `other`, merging overlapping/adjacent segments.
    pub fn union(&self, other: &Self) -> Self {
        let mut all: Vec<(Lower, Upper)> = self
            .segments
            .iter()
            .chain(other.segments.iter())
            .cloned()
            .collect();
        all.sort_by(|a, b| lower_cmp(a.0, b.0));

        let mut merged: Vec<(Lower, Upper)> = Vec::new();
        for seg in all {
            match merged.last_mut() {
                Some(last) if touches(last.1, seg.0) => {
                    if upper_cmp(seg.1, last.1) == Ordering::Greater {
                        last.1 = seg.1;
                    }
                }
                _ => merged.push(seg),
            }
        }
        Ranges { segments: merged }
    }

    /// Intersection of `self` and `other`.
    pub fn intersect(&self, other: &Self) -> Self {
        let mut result = Vec::new();
        for &(lo1, hi1) in &self.segments {
            for &(lo2, hi2) in &other.segments {
                let lo = if lower_cmp(lo1, lo2) == Ordering::Greater { lo1 } else { lo2 };
                let hi = if upper_cmp(hi1, hi2) == Ordering::Less { hi1 } else { hi2 };
                if is_valid_segment(lo, hi) {
                    result.push((lo, hi));
                }
            }
        }
        result.sort_by(|a, b| lower_cmp(a.0, b.0));
        Ranges { segments: result }
    }

    /// Set complement within the universal set.
    pub fn negate(&self) -> Self {
        if self.segments.is_empty() {
            return Ranges::any();
        }
        let mut result = Vec::new();
        let mut cursor: Lower = None;
        for &(lo, hi) in &self.segments {
            if lower_cmp(cursor, lo) != Ordering::Equal || cursor.is_some() {
                let gap_upper = flip_lower_to_upper(lo);
                if is_valid_segment(cursor, gap_upper) {
                    result.push((cursor, gap_upper));
                }
            } else if cursor.is_none() && lower_of_is_unbounded(lo) {
                // self starts at -inf: no gap before the first segment.
            }
            cursor = flip_upper_to_lower(hi);
        }
        if cursor.is_some() || self.segments.last().map(|s| s.1).unwrap_or(None).is_some() {
            result.push((cursor, None));
        }
        Ranges { segments: result }
    }

    /// `self` is a subset of `other`, i.e. every version in `self` is also
    /// in `other`.
    pub fn is_subset(&self, other: &Self) -> bool {
        self.intersect(&other.negate()).is_empty()
    }
}

impl std::fmt::Display for Ranges {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.segments.is_empty() {
            return write!(f, "no versions");
        }
        if self.segments == [(None, None)] {
            return write!(f, "*");
        }
        let parts: Vec<String> = self
            .segments
            .iter()
            .map(|(lo, hi)| match (lo, hi) {
                (None, None) => "*".to_string(),
                (Some((v, true)), None) => format!(">={}", v),
                (Some((v, false)), None) => format!(">{}", v),
                (None, Some((v, true))) => format!("<={}", v),
                (None, Some((v, false))) => format!("<{}", v),
                (Some((lv, linc)), Some((hv, hinc))) => {
                    let lo_op = if *linc { ">=" } else { ">" };
                    let hi_op = if *hinc { "<=" } else { "<" };
                    format!("{}{} {}{}", lo_op, lv, hi_op, hv)
                }
            })
            .collect();
        write!(f, "{}", parts.join(" or "))
    }
}

fn lower_of_is_unbounded(lo: Lower) -> bool {
    lo.is_none()
}

fn flip_lower_to_upper(lo: Lower) -> Upper {
    lo.map(|(v, incl)| (v, !incl))
}

fn flip_upper_to_lower(hi: Upper) -> Lower {
    hi.map(|(v, incl)| (v, !incl))
}

fn is_valid_segment(lo: Lower, hi: Upper) -> bool {
    match (lo, hi) {
        (None, _) | (_, None) => true,
        (Some((lv, linc)), Some((hv, hinc))) => match lv.cmp(&hv) {
            Ordering::Less => true,
            Ordering::Equal => linc && hinc,
            Ordering::Greater => false,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(s: &str) -> Version {
        s.parse().unwrap()
    }

    #[test]
    fn from_range_contains_matches_version_range() {
        let r = VersionRange::until_next_major(v("1.0.0"));
        let ranges = Ranges::from_range(&r);
        assert!(ranges.contains(v("1.5.0")));
        assert!(!ranges.contains(v("2.0.0")));
    }

    #[test]
    fn negate_excludes_exactly_the_original_range() {
        let r = VersionRange::until_next_major(v("1.0.0"));
        let ranges = Ranges::from_range(&r);
        let negated = ranges.negate();
        assert!(!negated.contains(v("1.5.0")));
        assert!(negated.contains(v("0.9.0")));
        assert!(negated.contains(v("2.0.0")));
    }

    #[test]
    fn double_negation_is_identity_on_containment() {
        let r = VersionRange::until_next_minor(v("1.2.0"));
        let ranges = Ranges::from_range(&r);
        let double_negated = ranges.negate().negate();
        for candidate in [v("1.1.9"), v("1.2.0"), v("1.2.5"), v("1.3.0")] {
            assert_eq!(ranges.contains(candidate), double_negated.contains(candidate));
        }
    }

    #[test]
    fn intersect_of_disjoint_is_empty() {
        let a = Ranges::from_range(&VersionRange::lower_than(v("1.0.0"), false));
        let b = Ranges::from_range(&VersionRange::higher_than(v("2.0.0"), true));
        assert!(a.intersect(&b).is_empty());
    }

    #[test]
    fn union_merges_overlapping_segments() {
        let a = Ranges::from_range(&VersionRange::until_next_minor(v("1.0.0")));
        let b = Ranges::from_range(&VersionRange::until_next_minor(v("1.1.0")));
        let merged = a.union(&b);
        assert!(merged.contains(v("1.0.5")));
        assert!(merged.contains(v("1.1.5")));
        assert!(!merged.contains(v("1.2.0")));
    }

    #[test]
    fn is_subset_detects_containment() {
        let wide = Ranges::from_range(&VersionRange::any());
        let narrow = Ranges::from_range(&VersionRange::exact(v("1.0.0")));
        assert!(narrow.is_subset(&wide));
        assert!(!wide.is_subset(&narrow));
    }

    #[test]
    fn negated_range_union_excludes_only_the_hole() {
        // "not in [1.0.0, 2.0.0)" should contain everything except that band.
        let hole = Ranges::from_range(&VersionRange::higher_than(v("1.0.0"), true))
            .intersect(&Ranges::from_range(&VersionRange::lower_than(v("2.0.0"), false)));
        let not_hole = hole.negate();
        assert!(not_hole.contains(v("0.5.0")));
        assert!(!not_hole.contains(v("1.5.0")));
        assert!(not_hole.contains(v("2.0.0")));
    }
}
