// SPDX-License-Identifier: MPL-2.0

//! Semver arithmetic for "is there something newer I could move to"
//! questions: the ambient "Upgrade / constraint analysis" component
//! spec.md's component table allocates ~7% of the core to but never
//! details beyond that one line (§2). Grounded on the version-strategy
//! split in the teacher's `solver::VersionStrategy`
//! (`--online-newest`/`--online-oldest`), generalized from "which order
//! to try versions in" to "which versions count as a minor vs. major
//! upgrade from here".

use crate::version::{Version, VersionRange};

/// The newest version in `available` still accepted by `range` — a
/// "safe" upgrade that doesn't require touching the declared constraint
/// at all. `available` need not be sorted.
pub fn compatible_upgrade(range: &VersionRange, available: &[Version]) -> Option<Version> {
    available.iter().copied().filter(|v| range.contains(*v)).max()
}

/// The newest version in `available` that shares `current`'s major
/// component and is strictly newer than it.
pub fn minor_upgrade(current: Version, available: &[Version]) -> Option<Version> {
    available
        .iter()
        .copied()
        .filter(|v| v.major == current.major && *v > current)
        .max()
}

/// The newest version in `available` with a greater major component than
/// `current` — an upgrade that may require source changes.
pub fn major_upgrade(current: Version, available: &[Version]) -> Option<Version> {
    available.iter().copied().filter(|v| v.major > current.major).max()
}

/// The smallest [`VersionRange`] that accepts every version `range`
/// already accepts, plus `target`. Used when a caller wants a version
/// outside the current constraint: rather than discard the existing
/// lower bound, widen the upper bound just enough to admit `target`.
///
/// If `target` already satisfies `range`, returns `range` unchanged. If
/// `range` is empty, the result is `VersionRange::exact(target)`: there
/// was nothing to preserve.
pub fn widen_constraint(range: &VersionRange, target: Version) -> VersionRange {
    if range.contains(target) {
        return range.clone();
    }
    if range.is_empty {
        return VersionRange::exact(target);
    }
    let widened = if target.major == range.lower.v.major {
        VersionRange::until_next_major(range.lower.v)
    } else {
        VersionRange::until_next_major(target.min(range.lower.v))
    };
    widened
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(s: &str) -> Version {
        s.parse().unwrap()
    }

    #[test]
    fn compatible_upgrade_picks_the_newest_within_range() {
        let range: VersionRange = "1.0.0 <= v < 2.0.0".parse::<crate::constraint::Constraint>().unwrap().0;
        let available = vec![v("1.0.0"), v("1.5.0"), v("2.0.0"), v("0.9.0")];
        assert_eq!(compatible_upgrade(&range, &available), Some(v("1.5.0")));
    }

    #[test]
    fn minor_upgrade_stays_within_the_current_major() {
        let available = vec![v("1.1.0"), v("1.2.0"), v("2.0.0")];
        assert_eq!(minor_upgrade(v("1.0.0"), &available), Some(v("1.2.0")));
    }

    #[test]
    fn major_upgrade_requires_a_newer_major() {
        let available = vec![v("1.1.0"), v("2.0.0"), v("2.5.0")];
        assert_eq!(major_upgrade(v("1.0.0"), &available), Some(v("2.5.0")));
    }

    #[test]
    fn major_upgrade_is_none_when_nothing_newer_exists() {
        let available = vec![v("1.0.0"), v("0.9.0")];
        assert_eq!(major_upgrade(v("1.0.0"), &available), None);
    }

    #[test]
    fn widen_constraint_is_a_no_op_when_target_already_satisfies() {
        let range: VersionRange = "1.0.0 <= v < 2.0.0".parse::<crate::constraint::Constraint>().unwrap().0;
        let widened = widen_constraint(&range, v("1.5.0"));
        assert_eq!(widened, range);
    }

    #[test]
    fn widen_constraint_extends_past_the_current_major() {
        let range: VersionRange = "1.0.0 <= v < 2.0.0".parse::<crate::constraint::Constraint>().unwrap().0;
        let widened = widen_constraint(&range, v("2.0.0"));
        assert!(widened.contains(v("1.0.0")));
        assert!(widened.contains(v("2.0.0")));
    }
}
