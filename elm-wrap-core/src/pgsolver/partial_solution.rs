// SPDX-License-Identifier: MPL-2.0

//! The partial solution: the chronological log of every decision and
//! derivation made so far, plus the per-package running intersection of
//! terms it implies. This is where unit propagation reads from and
//! writes to, and where conflict resolution replays history to find a
//! 1-UIP (unique implication point) cut.
//!
//! Grounded on the `PartialSolution`/backtracking logic of uv's vendored
//! from-scratch `pubgrub` (`other_examples/61ba23b8_...solver.rs.rs`),
//! rewritten against this crate's [`PackageId`]/[`Ranges`]/[`Term`] types
//! and without the generic package/version type parameters the vendored
//! crate carries for its own multi-ecosystem use.

use rustc_hash::FxHashMap;

use crate::pgsolver::incompatibility::Store;
use crate::pgsolver::ranges::Ranges;
use crate::pgsolver::types::{Assignment, DecisionLevel, Incompatibility, IncompatibilityId, Term};
use crate::pkg::PackageId;
use crate::version::{Version, VersionRange};

/// The chronological assignment log and the derived running state it
/// implies.
#[derive(Debug, Default)]
pub struct PartialSolution {
    assignments: Vec<Assignment>,
    current_level: DecisionLevel,
    /// Running intersection of every term assigned so far, per package.
    accumulated: FxHashMap<PackageId, Ranges>,
    decisions: FxHashMap<PackageId, Version>,
}

impl PartialSolution {
    pub fn new() -> Self {
        PartialSolution::default()
    }

    pub fn current_level(&self) -> DecisionLevel {
        self.current_level
    }

    pub fn decision(&self, package: PackageId) -> Option<Version> {
        self.decisions.get(&package).copied()
    }

    /// The accumulated term for a package, if anything has been learned
    /// about it yet. Doubles as the closure [`Store::relation`] expects.
    pub fn term(&self, package: PackageId) -> Option<Ranges> {
        self.accumulated.get(&package).cloned()
    }

    fn merge(&mut self, package: PackageId, newly_allowed: Ranges) {
        let merged = match self.accumulated.get(&package) {
            Some(existing) => existing.intersect(&newly_allowed),
            None => newly_allowed,
        };
        self.accumulated.insert(package, merged);
    }

    /// Record a concrete version decision for `package`, opening a new
    /// decision level.
    pub fn decide(&mut self, package: PackageId, version: Version) {
        self.current_level = self.current_level.next();
        self.merge(
            package,
            Ranges::from_range(&VersionRange::exact(version)),
        );
        self.decisions.insert(package, version);
        self.assignments.push(Assignment::Decision {
            package,
            version,
            level: self.current_level,
        });
    }

    /// Record a term learned via unit propagation from `cause`, at the
    /// current decision level.
    pub fn derive(&mut self, package: PackageId, term: Term, cause: IncompatibilityId) {
        self.merge(package, term.accepted_versions());
        self.assignments.push(Assignment::Derivation {
            package,
            term,
            cause,
            level: self.current_level,
        });
    }

    /// Packages that have an accumulated term but no decided version yet,
    /// i.e. candidates for the next decision.
    pub fn undecided_packages(&self) -> impl Iterator<Item = PackageId> + '_ {
        self.accumulated
            .keys()
            .copied()
            .filter(move |p| !self.decisions.contains_key(p))
    }

    /// Replay the assignment log to find the earliest point at which
    /// `incompat` becomes satisfied, per the PubGrub backtracking
    /// algorithm. Returns the package whose assignment was the last one
    /// needed (the "satisfier"/pivot), its decision level (the
    /// "satisfier level"), and the decision level of the second most
    /// recent contributing term ("previous satisfier level", `ROOT` if
    /// there is no second term). Together these tell
    /// [`crate::pgsolver::solve`] how far to backjump and at which level
    /// to place the newly derived incompatibility.
    pub fn satisfier(&self, incompat: &Incompatibility) -> (PackageId, DecisionLevel, DecisionLevel) {
        let mut running: FxHashMap<PackageId, Ranges> = FxHashMap::default();
        let mut satisfied_at: Vec<(PackageId, DecisionLevel)> = Vec::new();
        let mut seen: FxHashMap<PackageId, DecisionLevel> = FxHashMap::default();

        for assignment in &self.assignments {
            let package = assignment.package();
            if incompat.get(package).is_none() {
                continue;
            }
            let existing = running.get(&package).cloned();
            let newly = assignment.as_term().accepted_versions();
            let merged = match existing {
                Some(e) => e.intersect(&newly),
                None => newly,
            };
            running.insert(package, merged.clone());

            if let Some(term) = incompat.get(package) {
                if term.is_satisfied_by(&merged) && !seen.contains_key(&package) {
                    seen.insert(package, assignment.level());
                    satisfied_at.push((package, assignment.level()));
                }
            }

            if incompat.packages().all(|p| seen.contains_key(&p)) {
                satisfied_at.sort_by_key(|(_, l)| *l);
                let (pivot, satisfier_level) = *satisfied_at.last().expect("non-empty");
                let previous_level = satisfied_at
                    .iter()
                    .rev()
                    .nth(1)
                    .map(|(_, l)| *l)
                    .unwrap_or(DecisionLevel::ROOT);
                return (pivot, satisfier_level, previous_level);
            }
        }

        // Every term of a satisfied incompatibility must have a
        // satisfier by construction once unit propagation calls this; if
        // we fall through (should not happen), blame the whole log.
        let pivot = incompat.packages().next().unwrap_or(PackageId::ROOT);
        (pivot, self.current_level, DecisionLevel::ROOT)
    }

    /// The most recent assignment for `package` at exactly `level`, used
    /// by conflict resolution to find the cause of a derivation it needs
    /// to merge away.
    pub fn last_assignment(&self, package: PackageId, level: DecisionLevel) -> Option<&Assignment> {
        self.assignments
            .iter()
            .rev()
            .find(|a| a.package() == package && a.level() == level)
    }

    /// Read-only view of the assignment log, oldest first.
    pub fn assignments(&self) -> &[Assignment] {
        &self.assignments
    }

    /// Drop every assignment whose decision level is greater than
    /// `level`, and rebuild the derived state from what remains.
    pub fn backtrack_to(&mut self, level: DecisionLevel, store: &Store) {
        self.assignments.retain(|a| a.level() <= level);
        self.current_level = level;
        self.accumulated.clear();
        self.decisions.clear();
        // Re-derive by replaying the surviving log; needed since
        // `merge` is order-dependent only in the commutative-intersection
        // sense, but decisions must be rebuilt explicitly.
        let surviving = std::mem::take(&mut self.assignments);
        for assignment in &surviving {
            match assignment {
                Assignment::Decision { package, version, .. } => {
                    self.merge(*package, Ranges::from_range(&VersionRange::exact(*version)));
                    self.decisions.insert(*package, *version);
                }
                Assignment::Derivation { package, term, .. } => {
                    self.merge(*package, term.accepted_versions());
                }
            }
        }
        self.assignments = surviving;
        let _ = store;
    }

    /// Once the root package has been decided, produce the final
    /// `package -> version` map (excluding the synthetic root itself).
    pub fn extract_solution(&self) -> FxHashMap<PackageId, Version> {
        self.decisions
            .iter()
            .filter(|(p, _)| **p != PackageId::ROOT)
            .map(|(p, v)| (*p, *v))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pgsolver::types::{Reason, Term};

    #[test]
    fn deciding_bumps_the_level_and_records_the_version() {
        let mut sol = PartialSolution::new();
        let pkg = PackageId(1);
        sol.decide(pkg, Version::new(1, 0, 0));
        assert_eq!(sol.current_level(), DecisionLevel(1));
        assert_eq!(sol.decision(pkg), Some(Version::new(1, 0, 0)));
    }

    #[test]
    fn deriving_narrows_the_accumulated_term() {
        let mut sol = PartialSolution::new();
        let pkg = PackageId(1);
        let store = Store::new();
        let wide = Term::positive(Ranges::from_range(&VersionRange::any()));
        sol.derive(pkg, wide, IncompatibilityId(0));
        assert!(sol.term(pkg).unwrap().contains(Version::new(9, 9, 9)));

        let narrow = Term::positive(Ranges::from_range(&VersionRange::until_next_major(
            Version::new(1, 0, 0),
        )));
        sol.derive(pkg, narrow, IncompatibilityId(0));
        assert!(!sol.term(pkg).unwrap().contains(Version::new(2, 0, 0)));
        let _ = store;
    }

    #[test]
    fn backtrack_drops_assignments_above_the_target_level() {
        let mut sol = PartialSolution::new();
        let store = Store::new();
        let a = PackageId(1);
        let b = PackageId(2);
        sol.decide(a, Version::new(1, 0, 0));
        sol.decide(b, Version::new(2, 0, 0));
        assert_eq!(sol.current_level(), DecisionLevel(2));
        sol.backtrack_to(DecisionLevel(1), &store);
        assert_eq!(sol.current_level(), DecisionLevel(1));
        assert_eq!(sol.decision(a), Some(Version::new(1, 0, 0)));
        assert_eq!(sol.decision(b), None);
    }

    #[test]
    fn satisfier_finds_the_level_where_all_terms_hold() {
        let mut sol = PartialSolution::new();
        let root = PackageId::ROOT;
        sol.decide(root, Version::new(1, 0, 0));
        let incompat = Incompatibility::new(
            vec![(
                root,
                Term::negative(Ranges::from_range(&VersionRange::exact(Version::new(
                    1, 0, 0,
                )))),
            )],
            Reason::Root,
        );
        let (pivot, satisfier_level, _) = sol.satisfier(&incompat);
        assert_eq!(pivot, root);
        assert_eq!(satisfier_level, DecisionLevel(1));
    }
}
