// SPDX-License-Identifier: MPL-2.0

//! Append-only arena of [`Incompatibility`] values, plus the constructors
//! for the three ways a new one ever comes into being: the root
//! assertion, a dependency requirement, and a "no versions left" dead
//! end. Derived incompatibilities (conflict resolution) are pushed by
//! [`crate::pgsolver::solve`] directly since they need the partial
//! solution to compute.
//!
//! Grounded on the incompatibility bookkeeping in uv's vendored solver
//! (`other_examples/61ba23b8_...solver.rs.rs`), reshaped into an arena
//! indexed by [`IncompatibilityId`] instead of an `Rc`-keyed map, since
//! this crate's terms are not generic over a version-set type and do not
//! need the extra indirection.

use rustc_hash::FxHashMap;

use crate::pgsolver::ranges::Ranges;
use crate::pgsolver::types::{Incompatibility, IncompatibilityId, Reason, Relation, Term};
use crate::pkg::PackageId;

/// Owns every incompatibility ever derived during a solve, plus a
/// reverse index from package to the incompatibilities that mention it
/// (used by unit propagation to avoid scanning the whole arena).
#[derive(Debug, Default)]
pub struct Store {
    arena: Vec<Incompatibility>,
    by_package: FxHashMap<PackageId, Vec<IncompatibilityId>>,
}

impl Store {
    pub fn new() -> Self {
        Store::default()
    }

    fn push(&mut self, incompat: Incompatibility) -> IncompatibilityId {
        let id = IncompatibilityId(self.arena.len() as u32);
        for package in incompat.packages() {
            self.by_package.entry(package).or_default().push(id);
        }
        self.arena.push(incompat);
        id
    }

    pub fn get(&self, id: IncompatibilityId) -> &Incompatibility {
        &self.arena[id.0 as usize]
    }

    pub fn for_package(&self, package: PackageId) -> &[IncompatibilityId] {
        self.by_package
            .get(&package)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.arena.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arena.is_empty()
    }

    /// `{root: not exact(root_version)}`. Because this is the only
    /// incompatibility mentioning the root package as a negative term, a
    /// solve only terminates once the root's positive decision
    /// contradicts it, i.e. once the root has been decided at all.
    pub fn add_root(&mut self, root_version: crate::version::Version) -> IncompatibilityId {
        let term = Term::negative(Ranges::from_range(&crate::version::VersionRange::exact(
            root_version,
        )));
        self.push(Incompatibility::new(
            vec![(PackageId::ROOT, term)],
            Reason::Root,
        ))
    }

    /// `{package: package_term, dependency: not range}` — asserts that if
    /// `package` is within `package_term`, then `dependency` must be
    /// within `range`.
    pub fn add_dependency(
        &mut self,
        package: PackageId,
        package_term: Term,
        dependency: PackageId,
        range: Ranges,
    ) -> IncompatibilityId {
        let dep_term = Term::negative(range.clone());
        self.push(Incompatibility::new(
            vec![(package, package_term.clone()), (dependency, dep_term)],
            Reason::Dependency {
                package,
                package_term,
                dependency,
                range,
            },
        ))
    }

    /// `{package: term}` — asserts no version of `package` satisfying
    /// `term` exists among the ones the provider could offer.
    pub fn add_no_versions(&mut self, package: PackageId, term: Term) -> IncompatibilityId {
        self.push(Incompatibility::new(
            vec![(package, term.clone())],
            Reason::NoVersions { package, term },
        ))
    }

    /// Push an already-built incompatibility (used for ones derived via
    /// resolution during conflict-driven backtracking).
    pub fn add_derived(
        &mut self,
        terms: Vec<(PackageId, Term)>,
        left: IncompatibilityId,
        right: IncompatibilityId,
    ) -> IncompatibilityId {
        self.push(Incompatibility::new(terms, Reason::Derived { left, right }))
    }

    /// Classify an incompatibility against the partial solution's running
    /// per-package terms, to decide whether unit propagation has
    /// anything to learn from it.
    pub fn relation(
        &self,
        id: IncompatibilityId,
        assigned: &dyn Fn(PackageId) -> Option<Ranges>,
    ) -> Relation {
        let incompat = self.get(id);
        let mut unsatisfied: Option<PackageId> = None;
        for (package, term) in incompat.terms.iter() {
            match assigned(*package) {
                None => {
                    // No assignment yet at all: treat as "everything" allowed.
                    if unsatisfied.is_some() {
                        return Relation::Inconclusive;
                    }
                    unsatisfied = Some(*package);
                }
                Some(known) => {
                    if term.is_contradicted_by(&known) {
                        return Relation::Inconclusive;
                    }
                    if !term.is_satisfied_by(&known) {
                        if unsatisfied.is_some() {
                            return Relation::Inconclusive;
                        }
                        unsatisfied = Some(*package);
                    }
                }
            }
        }
        match unsatisfied {
            None => Relation::Satisfied,
            Some(package) => Relation::AlmostSatisfied(package),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::version::{Version, VersionRange};

    fn r(v: Version) -> Ranges {
        Ranges::from_range(&VersionRange::exact(v))
    }

    #[test]
    fn root_incompatibility_is_contradicted_by_the_root_decision() {
        let mut store = Store::new();
        let root_version = Version::new(1, 0, 0);
        let id = store.add_root(root_version);
        let known = r(root_version);
        let assigned = |p: PackageId| if p == PackageId::ROOT { Some(known.clone()) } else { None };
        assert_eq!(store.relation(id, &assigned), Relation::Inconclusive);
    }

    #[test]
    fn dependency_incompatibility_tracks_both_packages() {
        let mut store = Store::new();
        let pkg = PackageId(1);
        let dep = PackageId(2);
        let id = store.add_dependency(
            pkg,
            Term::positive(r(Version::new(1, 0, 0))),
            dep,
            Ranges::from_range(&VersionRange::until_next_major(Version::new(1, 0, 0))),
        );
        assert!(store.for_package(pkg).contains(&id));
        assert!(store.for_package(dep).contains(&id));
    }
}
