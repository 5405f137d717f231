// SPDX-License-Identifier: MPL-2.0

//! Core vocabulary of the solver: terms, incompatibilities, and the
//! decision levels that index the partial solution.
//!
//! Grounded on `astral-sh/uv`'s vendored from-scratch `pubgrub` solver
//! (`other_examples/61ba23b8_...solver.rs.rs`), adapted to use
//! [`crate::pkg::PackageId`] instead of a generic package type parameter
//! and [`Ranges`] instead of a generic version-set type parameter, since
//! this crate only ever solves for elm's own package identities.

use std::fmt;
use std::rc::Rc;

use crate::pgsolver::ranges::Ranges;
use crate::pkg::PackageId;
use crate::version::Version;

/// A term is a positive or negative assertion about which versions of a
/// package are acceptable. Positive: "package must be in this range".
/// Negative: "package must NOT be in this range" (derived from negating a
/// dependency's requirement during conflict resolution).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Term {
    Positive(Ranges),
    Negative(Ranges),
}

impl Term {
    pub fn positive(r: Ranges) -> Self {
        Term::Positive(r)
    }

    pub fn negative(r: Ranges) -> Self {
        Term::Negative(r)
    }

    /// Negating a term flips its polarity without touching the ranges.
    pub fn negate(&self) -> Self {
        match self {
            Term::Positive(r) => Term::Negative(r.clone()),
            Term::Negative(r) => Term::Positive(r.clone()),
        }
    }

    /// The set of versions this term is satisfied by.
    pub fn accepted_versions(&self) -> Ranges {
        match self {
            Term::Positive(r) => r.clone(),
            Term::Negative(r) => r.negate(),
        }
    }

    pub fn contains(&self, v: Version) -> bool {
        match self {
            Term::Positive(r) => r.contains(v),
            Term::Negative(r) => !r.contains(v),
        }
    }

    pub fn is_positive(&self) -> bool {
        matches!(self, Term::Positive(_))
    }

    /// Intersection of two terms about the same package, expressed as the
    /// accepted-versions set of the conjunction.
    pub fn intersection(&self, other: &Term) -> Ranges {
        self.accepted_versions().intersect(&other.accepted_versions())
    }

    /// Whether `self` is satisfied (made moot) by the accumulated
    /// knowledge `assigned`: every version allowed by `assigned` is also
    /// allowed by `self`.
    pub fn is_satisfied_by(&self, assigned: &Ranges) -> bool {
        assigned.is_subset(&self.accepted_versions())
    }

    /// Whether `self` can never be satisfied given `assigned`: there is no
    /// overlap left at all.
    pub fn is_contradicted_by(&self, assigned: &Ranges) -> bool {
        assigned.intersect(&self.accepted_versions()).is_empty()
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Term::Positive(r) => write!(f, "{}", r),
            Term::Negative(r) => write!(f, "not {}", r),
        }
    }
}

/// The reason an incompatibility was introduced, kept for error reporting.
#[derive(Debug, Clone)]
pub enum Reason {
    /// The synthetic incompatibility asserting the root package is
    /// selected: `{root: not exact(root_version)}`.
    Root,
    /// "No versions of `package` satisfy `term`" — built when a package
    /// runs out of candidates to try during decision-making.
    NoVersions { package: PackageId, term: Term },
    /// `package` depends on `dependency` with range `range`, so any
    /// version of `package` in `package_term` requires a version of
    /// `dependency` in `range`.
    Dependency {
        package: PackageId,
        package_term: Term,
        dependency: PackageId,
        range: Ranges,
    },
    /// Derived via resolution (conflict-driven clause learning) from two
    /// prior incompatibilities during backtracking.
    Derived {
        left: IncompatibilityId,
        right: IncompatibilityId,
    },
}

/// Index into the incompatibility arena in [`crate::pgsolver::incompatibility::Store`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct IncompatibilityId(pub u32);

/// An incompatibility is a set of terms, at most one of which can hold at
/// any time: `{p1: term1, p2: term2, ...}` reads "not (p1 satisfies term1
/// AND p2 satisfies term2 AND ...)".
#[derive(Debug, Clone)]
pub struct Incompatibility {
    /// Kept as a `Vec` rather than a map: incompatibilities rarely have
    /// more than a handful of terms, and insertion order matters for
    /// reporting (the root cause should print first).
    pub terms: Rc<Vec<(PackageId, Term)>>,
    pub reason: Reason,
}

impl Incompatibility {
    pub fn new(terms: Vec<(PackageId, Term)>, reason: Reason) -> Self {
        Incompatibility {
            terms: Rc::new(terms),
            reason,
        }
    }

    pub fn get(&self, package: PackageId) -> Option<&Term> {
        self.terms.iter().find(|(p, _)| *p == package).map(|(_, t)| t)
    }

    pub fn packages(&self) -> impl Iterator<Item = PackageId> + '_ {
        self.terms.iter().map(|(p, _)| *p)
    }
}

/// The outcome of comparing an incompatibility's terms against the
/// current partial solution, used to drive unit propagation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relation {
    /// Every term is satisfied: the incompatibility itself is violated,
    /// triggering conflict resolution.
    Satisfied,
    /// Exactly one term is not yet satisfied and not yet contradicted:
    /// propagate its negation as a new derivation.
    AlmostSatisfied(PackageId),
    /// Two or more terms are neither satisfied nor contradicted, or at
    /// least one is already contradicted: nothing to learn yet.
    Inconclusive,
}

/// A decision level: 0 is "before any decision", and increases by one
/// each time the solver picks a concrete version for a package.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct DecisionLevel(pub u32);

impl DecisionLevel {
    pub const ROOT: DecisionLevel = DecisionLevel(0);

    pub fn next(self) -> Self {
        DecisionLevel(self.0 + 1)
    }
}

/// One entry of the partial solution's assignment log: either a decision
/// (a concrete version picked for a package) or a derivation (a term
/// learned via unit propagation from some incompatibility).
#[derive(Debug, Clone)]
pub enum Assignment {
    Decision {
        package: PackageId,
        version: Version,
        level: DecisionLevel,
    },
    Derivation {
        package: PackageId,
        term: Term,
        cause: IncompatibilityId,
        level: DecisionLevel,
    },
}

impl Assignment {
    pub fn package(&self) -> PackageId {
        match self {
            Assignment::Decision { package, .. } => *package,
            Assignment::Derivation { package, .. } => *package,
        }
    }

    pub fn level(&self) -> DecisionLevel {
        match self {
            Assignment::Decision { level, .. } => *level,
            Assignment::Derivation { level, .. } => *level,
        }
    }

    /// The term this assignment contributes to the running intersection
    /// for its package.
    pub fn as_term(&self) -> Term {
        match self {
            Assignment::Decision { version, .. } => {
                Term::positive(Ranges::from_range(&crate::version::VersionRange::exact(*version)))
            }
            Assignment::Derivation { term, .. } => term.clone(),
        }
    }
}
