// SPDX-License-Identifier: MPL-2.0

//! The seam between the solver and everything that knows about actual
//! packages: available versions, and a package's dependencies at a given
//! version. Grounded on uv's vendored `DependencyProvider` trait
//! (`other_examples/61ba23b8_...solver.rs.rs`) and on the teacher's own
//! `OfflineDependencyProvider`/`registry-backed provider split
//! (`dependency_provider.rs`), combined into one trait parameterized
//! only by what the solver core itself needs — no I/O, no file formats.

use crate::pgsolver::ranges::Ranges;
use crate::pkg::PackageId;
use crate::version::Version;

/// What a package depends on at a specific version: either a concrete
/// list of `(package, range)` pairs, or "this version doesn't exist /
/// can't be inspected", which the solver treats as if no versions of the
/// package satisfied the term that led here.
#[derive(Debug, Clone)]
pub enum Dependencies {
    Known(Vec<(PackageId, Ranges)>),
    Unknown,
}

/// Supplies the solver with everything it needs to know about the
/// package universe. Implementations are expected to be cheap to query
/// repeatedly; [`crate::dependency_provider_adapter`] is the
/// cache/registry-backed implementation used in production, while tests
/// use a simple in-memory map.
pub trait DependencyProvider {
    /// All known versions of `package`, most-preferred first (the solver
    /// tries them in the order given, so providers should sort newest or
    /// oldest first according to their own upgrade policy).
    fn versions(&self, package: PackageId) -> Vec<Version>;

    /// The dependencies of `package` at `version`.
    fn dependencies(&self, package: PackageId, version: Version) -> Dependencies;

    /// Choose which of the undecided `packages` to branch on next. The
    /// default mirrors PubGrub's reference heuristic: prefer the package
    /// with the fewest remaining candidate versions, since it fails
    /// fastest if it is going to fail at all.
    fn choose_package(&self, packages: &[(PackageId, Ranges)]) -> Option<usize> {
        packages
            .iter()
            .enumerate()
            .map(|(i, (package, range))| {
                let count = self
                    .versions(*package)
                    .into_iter()
                    .filter(|v| range.contains(*v))
                    .count();
                (i, count)
            })
            .min_by_key(|(_, count)| *count)
            .map(|(i, _)| i)
    }
}

/// A simple in-memory provider over a fixed package universe, used by
/// the solver's own unit tests and by higher layers' tests that want a
/// deterministic dependency graph without touching the registry.
#[derive(Debug, Default)]
pub struct OfflineProvider {
    packages: rustc_hash::FxHashMap<PackageId, Vec<(Version, Vec<(PackageId, Ranges)>)>>,
}

impl OfflineProvider {
    pub fn new() -> Self {
        OfflineProvider::default()
    }

    pub fn add(
        &mut self,
        package: PackageId,
        version: Version,
        dependencies: Vec<(PackageId, Ranges)>,
    ) {
        self.packages
            .entry(package)
            .or_default()
            .push((version, dependencies));
    }
}

impl DependencyProvider for OfflineProvider {
    fn versions(&self, package: PackageId) -> Vec<Version> {
        let mut versions: Vec<Version> = self
            .packages
            .get(&package)
            .map(|entries| entries.iter().map(|(v, _)| *v).collect())
            .unwrap_or_default();
        versions.sort_by(|a, b| b.cmp(a));
        versions
    }

    fn dependencies(&self, package: PackageId, version: Version) -> Dependencies {
        match self.packages.get(&package) {
            None => Dependencies::Unknown,
            Some(entries) => entries
                .iter()
                .find(|(v, _)| *v == version)
                .map(|(_, deps)| Dependencies::Known(deps.clone()))
                .unwrap_or(Dependencies::Unknown),
        }
    }
}
