// SPDX-License-Identifier: MPL-2.0

//! The main solve loop: unit propagation, decision-making, and
//! conflict-driven backjumping tied together into the fixed point that
//! produces either a full solution or a proof of unsatisfiability.
//!
//! Grounded on the propagate/decide/conflict-resolution loop of uv's
//! vendored from-scratch `pubgrub` solver
//! (`other_examples/61ba23b8_...solver.rs.rs`), rebuilt against this
//! crate's arena-indexed [`Store`] and [`PartialSolution`] rather than
//! that crate's `Rc`-keyed incompatibility map.

use rustc_hash::FxHashMap;
use thiserror::Error;

use crate::pgsolver::incompatibility::Store;
use crate::pgsolver::partial_solution::PartialSolution;
use crate::pgsolver::provider::{Dependencies, DependencyProvider};
use crate::pgsolver::ranges::Ranges;
use crate::pgsolver::types::{Assignment, DecisionLevel, IncompatibilityId, Relation, Term};
use crate::pkg::PackageId;
use crate::version::{Version, VersionRange};

/// A solve failed because no assignment of versions satisfies every
/// dependency. `root` indexes an incompatibility in `store` with an empty
/// term list: the proof of unsatisfiability, suitable for
/// [`crate::pgsolver::report`].
#[derive(Debug, Error)]
#[error("dependency resolution is impossible")]
pub struct SolveError {
    pub store: Store,
    pub root: IncompatibilityId,
}

/// Counters exposed for tests and diagnostics: how often the
/// per-`(package, version)` dependency cache saved a provider round trip.
#[derive(Debug, Clone, Copy, Default)]
pub struct SolveStats {
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub decisions: u64,
}

fn exact(v: Version) -> Ranges {
    Ranges::from_range(&VersionRange::exact(v))
}

/// Run the solver to completion against `provider`, starting from
/// `root`/`root_version` (the provider is expected to report exactly one
/// version for `root`, and `root`'s dependencies via the normal
/// [`DependencyProvider::dependencies`] call — see
/// `crate::dependency_provider_adapter::ProjectAdapter` for how the root
/// project's own elm.json gets spliced in as that single version).
pub fn resolve<P: DependencyProvider>(
    provider: &P,
    root: PackageId,
    root_version: Version,
) -> Result<(FxHashMap<PackageId, Version>, SolveStats), SolveError> {
    let mut store = Store::new();
    let mut partial = PartialSolution::new();
    let mut memo: FxHashMap<(PackageId, Version), Dependencies> = FxHashMap::default();
    let mut stats = SolveStats::default();

    store.add_root(root_version);
    let mut changed = vec![root];

    loop {
        if let Err(first_conflict) = propagate(&store, &mut partial, &mut changed) {
            // Conflict-driven backjumping (spec.md §4.1 "Conflict
            // resolution"): repeatedly learn from the satisfied
            // incompatibility and backjump until re-propagation finds no
            // further conflict, then hand control back to the decision
            // loop below. Only the true empty-terms incompatibility (no
            // assignment can ever satisfy it) ends the solve.
            let mut conflict = first_conflict;
            loop {
                match conflict_resolve(&mut store, &mut partial, conflict) {
                    Ok(package) => {
                        changed = vec![package];
                        match propagate(&store, &mut partial, &mut changed) {
                            Ok(()) => break,
                            Err(next) => conflict = next,
                        }
                    }
                    Err(root) => return Err(SolveError { store, root }),
                }
            }
        }

        let mut undecided: Vec<(PackageId, Ranges)> = partial
            .undecided_packages()
            .map(|p| (p, partial.term(p).expect("undecided implies a term")))
            .collect();
        if undecided.is_empty() {
            break;
        }
        // spec.md §4.1 "Ordering and tie-breaks": ties among equally
        // eligible packages break by interning order, not hashmap order.
        undecided.sort_by_key(|(p, _)| *p);

        let idx = provider
            .choose_package(&undecided)
            .unwrap_or(0)
            .min(undecided.len() - 1);
        let (package, range) = undecided[idx].clone();

        let already_excluded = |v: Version| {
            store.for_package(package).iter().any(|&id| {
                let incompat = store.get(id);
                incompat.terms.len() == 1
                    && matches!(incompat.get(package), Some(Term::Positive(r)) if *r == exact(v))
            })
        };

        let candidate = provider
            .versions(package)
            .into_iter()
            .find(|v| range.contains(*v) && !already_excluded(*v));

        match candidate {
            None => {
                let incompat_id = store.add_no_versions(package, Term::positive(range));
                let _ = incompat_id;
                changed = vec![package];
            }
            Some(version) => {
                let key = (package, version);
                let deps = match memo.get(&key) {
                    Some(d) => {
                        stats.cache_hits += 1;
                        d.clone()
                    }
                    None => {
                        stats.cache_misses += 1;
                        let d = provider.dependencies(package, version);
                        memo.insert(key, d.clone());
                        d
                    }
                };

                match deps {
                    Dependencies::Unknown => {
                        store.add_no_versions(package, Term::positive(exact(version)));
                        changed = vec![package];
                    }
                    Dependencies::Known(requirements) => {
                        let package_term = Term::positive(exact(version));
                        for (dependency, dep_range) in requirements {
                            store.add_dependency(package, package_term.clone(), dependency, dep_range);
                        }
                        partial.decide(package, version);
                        stats.decisions += 1;
                        changed = vec![package];
                    }
                }
            }
        }
    }

    Ok((partial.extract_solution(), stats))
}

/// Process every package in `changed` (and whatever it adds along the
/// way) until a fixed point, or return the incompatibility that proved
/// unsatisfiable so the caller can run conflict resolution on it.
fn propagate(
    store: &Store,
    partial: &mut PartialSolution,
    changed: &mut Vec<PackageId>,
) -> Result<(), IncompatibilityId> {
    while let Some(package) = changed.pop() {
        let ids = store.for_package(package).to_vec();
        for id in ids {
            let assigned = |p: PackageId| partial.term(p);
            match store.relation(id, &assigned) {
                Relation::Satisfied => return Err(id),
                Relation::AlmostSatisfied(p) => {
                    let incompat = store.get(id);
                    let unsatisfied_term = incompat.get(p).expect("almost-satisfied names a term").negate();
                    partial.derive(p, unsatisfied_term, id);
                    if !changed.contains(&p) {
                        changed.push(p);
                    }
                }
                Relation::Inconclusive => {}
            }
        }
    }
    Ok(())
}

/// Walk backwards via conflict-driven clause learning (1-UIP) from
/// `conflicting`, merging derivations into it until exactly one term
/// remains at the decision level it was learned at, then backjump and
/// derive that term's negation there. Returns the package to re-seed unit
/// propagation with, or an error once the learned incompatibility's term
/// list collapses to empty (proof of unsatisfiability).
fn conflict_resolve(
    store: &mut Store,
    partial: &mut PartialSolution,
    conflicting: IncompatibilityId,
) -> Result<PackageId, IncompatibilityId> {
    let mut current_id = conflicting;
    loop {
        let incompat = store.get(current_id).clone();
        if incompat.terms.is_empty() {
            return Err(current_id);
        }

        let (pivot, satisfier_level, previous_level) = partial.satisfier(&incompat);
        let pivot_is_decision = matches!(
            partial.last_assignment(pivot, satisfier_level),
            Some(Assignment::Decision { .. })
        );

        if pivot_is_decision || satisfier_level != previous_level {
            partial.backtrack_to(previous_level, store);
            let pivot_term = incompat
                .get(pivot)
                .expect("satisfier names a term of this incompatibility")
                .negate();
            partial.derive(pivot, pivot_term, current_id);
            return Ok(pivot);
        }

        let cause_id = match partial.last_assignment(pivot, satisfier_level) {
            Some(Assignment::Derivation { cause, .. }) => *cause,
            _ => unreachable!("a non-decision satisfier is always a derivation"),
        };
        let cause_incompat = store.get(cause_id).clone();

        let mut merged: Vec<(PackageId, Term)> = Vec::new();
        for (p, t) in incompat.terms.iter().chain(cause_incompat.terms.iter()) {
            if *p == pivot {
                continue;
            }
            merge_term(&mut merged, *p, t.clone());
        }
        current_id = store.add_derived(merged, current_id, cause_id);
    }
}

fn merge_term(acc: &mut Vec<(PackageId, Term)>, package: PackageId, term: Term) {
    if let Some(existing) = acc.iter_mut().find(|(p, _)| *p == package) {
        let combined = existing.1.accepted_versions().intersect(&term.accepted_versions());
        existing.1 = Term::positive(combined);
    } else {
        acc.push((package, term));
    }
}
