// SPDX-License-Identifier: MPL-2.0

//! Wires [`crate::pgsolver::provider::DependencyProvider`] to the two
//! things that actually know about packages: the [`crate::registry`]
//! catalogue for "what versions exist", and the [`crate::cache`] for
//! "what does this version depend on" (read straight out of its cached
//! `elm.json`). [`ProjectAdapter`] then splices the root project's own
//! manifest in as package id 0's single version, the way the solver
//! expects (see [`crate::pgsolver::solve::resolve`]).
//!
//! Grounded on the teacher's `dependency_provider::ProjectAdapter`,
//! which performs the identical splice against `pubgrub`'s
//! `DependencyProvider` trait; only the trait and the backing stores
//! (registry/cache instead of a bare `Cache` of elm.json files) change.

use std::cell::RefCell;

use tracing::warn;

use crate::cache::Cache;
use crate::pgsolver::provider::{Dependencies, DependencyProvider};
use crate::pgsolver::ranges::Ranges;
use crate::pkg::{AuthorName, Interner, PackageId};
use crate::project_config::{ApplicationConfig, PackageConfig};
use crate::registry::{Registry, Status};
use crate::version::{Version, VersionRange};

/// A [`DependencyProvider`] backed by an on-disk registry and cache.
/// Interning is interior-mutable since the trait's methods all take
/// `&self`: every package a solve touches gets assigned a [`PackageId`]
/// on first mention, root included.
pub struct RegistryProvider<'a> {
    cache: &'a Cache,
    registry: &'a Registry,
    interner: RefCell<Interner>,
}

impl<'a> RegistryProvider<'a> {
    pub fn new(cache: &'a Cache, registry: &'a Registry) -> Self {
        RegistryProvider {
            cache,
            registry,
            interner: RefCell::new(Interner::new()),
        }
    }

    /// Intern `name`, returning its [`PackageId`] (assigning a fresh one
    /// on first mention).
    pub fn intern(&self, name: AuthorName) -> PackageId {
        self.interner.borrow_mut().intern(name)
    }

    /// Resolve a previously-interned id back to its `author/name` pair.
    /// Used when rendering a solution or an install plan.
    pub fn resolve(&self, id: PackageId) -> AuthorName {
        self.interner.borrow().resolve(id).clone()
    }

    /// A full `PackageId -> "author/name"` snapshot of everything interned
    /// so far, for callers (e.g. [`crate::solver`]) that need package
    /// names after the provider itself may have been dropped.
    pub fn snapshot_names(&self) -> std::collections::HashMap<PackageId, String> {
        self.interner
            .borrow()
            .iter()
            .map(|(id, name)| (id, name.to_string()))
            .collect()
    }

    fn dependencies_of_config(&self, config: &PackageConfig) -> Vec<(PackageId, Ranges)> {
        config
            .dependencies_iter()
            .map(|(name, range)| (self.intern(name.clone()), Ranges::from_range(range)))
            .collect()
    }
}

impl<'a> DependencyProvider for RegistryProvider<'a> {
    fn versions(&self, package: PackageId) -> Vec<Version> {
        let name = self.resolve(package);
        if name.is_root() {
            return Vec::new();
        }
        self.registry
            .versions_of(&name)
            .iter()
            .copied()
            .filter(|v| !matches!(self.registry.status_of(&name, *v), Status::Withdrawn))
            .collect()
    }

    fn dependencies(&self, package: PackageId, version: Version) -> Dependencies {
        let name = self.resolve(package);
        if name.is_root() {
            return Dependencies::Unknown;
        }
        if !self.cache.cache_package_exists(&name, version) {
            warn!("{}@{} is not in the cache, treating it as having no known versions", name, version);
            return Dependencies::Unknown;
        }
        match self.cache.read_elm_json(&name, version) {
            Ok(config) => Dependencies::Known(self.dependencies_of_config(&config)),
            Err(e) => {
                warn!("failed to read the cached elm.json for {}@{}: {}", name, version, e);
                Dependencies::Unknown
            }
        }
    }
}

/// Splices the project under solve in as [`crate::pkg::PackageId::ROOT`]:
/// its one "version" is a synthetic marker, and its "dependencies" are
/// whichever of the project's own constraint maps the caller selected
/// (normal dependencies, optionally unioned with test dependencies via
/// `--test`, matching the teacher's CLI flag of the same name).
pub struct ProjectAdapter<'a> {
    inner: RegistryProvider<'a>,
    root_version: Version,
    root_dependencies: Vec<(PackageId, Ranges)>,
}

/// The synthetic version assigned to the root package (spec.md §3
/// "PackageId"); it never appears in any registry and exists only so
/// [`crate::pgsolver::solve::resolve`] has something to pass back as
/// `root`'s chosen version.
pub const ROOT_VERSION: Version = Version::new(1, 0, 0);

impl<'a> ProjectAdapter<'a> {
    /// Build an adapter whose root dependencies come from `config`'s
    /// `dependencies` map, plus `test_dependencies` too when
    /// `include_test_dependencies` is set.
    pub fn new(cache: &'a Cache, registry: &'a Registry, config: &PackageConfig, include_test_dependencies: bool) -> Self {
        let inner = RegistryProvider::new(cache, registry);
        let mut root_dependencies = inner.dependencies_of_config_as_package(config, false);
        if include_test_dependencies {
            root_dependencies.extend(inner.dependencies_of_config_as_package(config, true));
        }
        ProjectAdapter {
            inner,
            root_version: ROOT_VERSION,
            root_dependencies,
        }
    }

    /// Same, but for an application manifest: every already-pinned
    /// dependency becomes an exact-version constraint on the root, the
    /// way `elm.json` applications pin their whole dependency set.
    pub fn new_for_application(cache: &'a Cache, registry: &'a Registry, config: &ApplicationConfig, include_test_dependencies: bool) -> Self {
        let inner = RegistryProvider::new(cache, registry);
        let mut maps = vec![&config.dependencies.direct, &config.dependencies.indirect];
        if include_test_dependencies {
            maps.push(&config.test_dependencies.direct);
            maps.push(&config.test_dependencies.indirect);
        }
        let root_dependencies = maps
            .into_iter()
            .flat_map(|map| map.iter())
            .map(|(name, version)| (inner.intern(name.clone()), Ranges::from_range(&VersionRange::exact(*version))))
            .collect();
        ProjectAdapter {
            inner,
            root_version: ROOT_VERSION,
            root_dependencies,
        }
    }

    pub fn intern(&self, name: AuthorName) -> PackageId {
        self.inner.intern(name)
    }

    pub fn resolve(&self, id: PackageId) -> AuthorName {
        self.inner.resolve(id)
    }

    pub fn root_version(&self) -> Version {
        self.root_version
    }

    /// See [`RegistryProvider::snapshot_names`].
    pub fn snapshot_names(&self) -> std::collections::HashMap<PackageId, String> {
        self.inner.snapshot_names()
    }

    /// Append one more requirement to the root's dependency set, beyond
    /// whatever its manifest declared. Used by
    /// [`crate::local_dev::refresh_dependents`] to solve "what would
    /// satisfy the consumer plus this one new dependency" without
    /// mutating the consumer's manifest first.
    pub fn with_extra_root_dependency(mut self, name: AuthorName, range: Ranges) -> Self {
        let id = self.intern(name);
        self.root_dependencies.push((id, range));
        self
    }
}

impl<'a> RegistryProvider<'a> {
    fn dependencies_of_config_as_package(&self, config: &PackageConfig, tests: bool) -> Vec<(PackageId, Ranges)> {
        let map = if tests { &config.test_dependencies } else { &config.dependencies };
        map.iter()
            .map(|(name, constraint)| (self.intern(name.clone()), Ranges::from_range(&constraint.0)))
            .collect()
    }
}

impl<'a> DependencyProvider for ProjectAdapter<'a> {
    fn versions(&self, package: PackageId) -> Vec<Version> {
        if package == PackageId::ROOT {
            return vec![self.root_version];
        }
        self.inner.versions(package)
    }

    fn dependencies(&self, package: PackageId, version: Version) -> Dependencies {
        if package == PackageId::ROOT {
            return Dependencies::Known(self.root_dependencies.clone());
        }
        self.inner.dependencies(package, version)
    }

    fn choose_package(&self, packages: &[(PackageId, Ranges)]) -> Option<usize> {
        self.inner.choose_package(packages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::project_config::{AppDependencies, ExposedModules};
    use std::collections::BTreeMap;

    fn name(s: &str) -> AuthorName {
        s.parse().unwrap()
    }

    #[test]
    fn root_versions_is_the_synthetic_marker_only() {
        let dir = tempfile::tempdir().unwrap();
        let cache = Cache::new(dir.path());
        let registry = Registry::new();
        let config = PackageConfig {
            name: name("author/project"),
            summary: "test".to_string(),
            license: "BSD-3-Clause".to_string(),
            version: Version::new(1, 0, 0),
            elm_version: "0.19.0 <= v < 0.20.0".parse().unwrap(),
            exposed_modules: ExposedModules::NoCategory(vec![]),
            dependencies: BTreeMap::new(),
            test_dependencies: BTreeMap::new(),
        };
        let adapter = ProjectAdapter::new(&cache, &registry, &config, false);
        assert_eq!(adapter.versions(PackageId::ROOT), vec![ROOT_VERSION]);
    }

    #[test]
    fn application_root_dependencies_are_exact_version_constraints() {
        let dir = tempfile::tempdir().unwrap();
        let cache = Cache::new(dir.path());
        let registry = Registry::new();
        let mut direct = BTreeMap::new();
        direct.insert(name("elm/core"), Version::new(1, 0, 5));
        let config = ApplicationConfig {
            source_directories: vec!["src".to_string()],
            elm_version: Version::new(0, 19, 1),
            dependencies: AppDependencies { direct, indirect: BTreeMap::new() },
            test_dependencies: AppDependencies::default(),
        };
        let adapter = ProjectAdapter::new_for_application(&cache, &registry, &config, false);
        match adapter.dependencies(PackageId::ROOT, ROOT_VERSION) {
            Dependencies::Known(deps) => {
                assert_eq!(deps.len(), 1);
                let (pkg, range) = &deps[0];
                assert_eq!(adapter.resolve(*pkg), name("elm/core"));
                assert!(range.contains(Version::new(1, 0, 5)));
                assert!(!range.contains(Version::new(1, 0, 6)));
            }
            Dependencies::Unknown => panic!("expected known dependencies"),
        }
    }
}
