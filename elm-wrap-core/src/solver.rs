// SPDX-License-Identifier: MPL-2.0

//! High-level solve entry points. Mirrors the teacher's `Offline`/`Online`
//! pair and `solve_deps_with` free function, now built on
//! [`crate::install_env::InstallEnv`], [`crate::dependency_provider_adapter`]
//! and the in-tree [`crate::pgsolver`] instead of an external `pubgrub`
//! crate plus bespoke `ELM_HOME` scanning.
//!
//! [`Offline`] never touches the network: it solves against whatever is
//! already in `ELM_HOME`. [`Online`] refreshes the registry against the
//! remote server once at construction (the teacher's "when initialized,
//! it starts by updating its database of known packages"), then behaves
//! identically to [`Offline`] for the actual solve.

use std::collections::HashMap;
use std::fmt;

use crate::dependency_provider_adapter::ProjectAdapter;
use crate::install_env::{InstallEnv, InstallEnvError};
use crate::pgsolver::provider::{Dependencies, DependencyProvider};
use crate::pgsolver::ranges::Ranges;
use crate::pgsolver::report::{report, Report};
use crate::pgsolver::solve::resolve;
use crate::pkg::{AuthorName, PackageId};
use crate::project_config::{AppDependencies, ApplicationConfig, ExactVersionMap, PackageConfig, ProjectConfig};
use crate::version::{Version, VersionRange};

/// Which end of a package's compatible range the solver should prefer.
/// The default (and the only option the teacher's offline solver had) is
/// [`VersionStrategy::Newest`]; [`VersionStrategy::Oldest`] is the
/// teacher's `--online-oldest` flag generalized to also apply offline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VersionStrategy {
    #[default]
    Newest,
    Oldest,
}

/// A solve that found no solution. Carries an owned snapshot of the
/// proof (no borrowed state survives the failed [`resolve`] call) so a
/// caller can defer rendering, log it, or both.
pub struct SolveFailure {
    inner: crate::pgsolver::solve::SolveError,
    names: HashMap<PackageId, String>,
}

impl SolveFailure {
    /// Render the human-readable explanation (spec.md §4.2), truncating
    /// the output at `buffer_cap` bytes.
    pub fn report(&self, buffer_cap: usize) -> Report {
        let names = &self.names;
        let name_of = |id: PackageId| {
            if id == PackageId::ROOT {
                "this project".to_string()
            } else {
                names.get(&id).cloned().unwrap_or_else(|| id.to_string())
            }
        };
        report(&self.inner.store, self.inner.root, &name_of, buffer_cap)
    }
}

impl fmt::Debug for SolveFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SolveFailure").finish_non_exhaustive()
    }
}

impl fmt::Display for SolveFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "dependency resolution is impossible")
    }
}

impl std::error::Error for SolveFailure {}

/// Wraps a [`ProjectAdapter`] to apply a [`VersionStrategy`]: the solver
/// always takes the first candidate [`DependencyProvider::versions`]
/// offers, so "prefer oldest" is just "report the list reversed".
struct StrategyProvider<'a> {
    inner: ProjectAdapter<'a>,
    strategy: VersionStrategy,
}

impl<'a> DependencyProvider for StrategyProvider<'a> {
    fn versions(&self, package: PackageId) -> Vec<Version> {
        let mut versions = self.inner.versions(package);
        if self.strategy == VersionStrategy::Oldest {
            versions.reverse();
        }
        versions
    }

    fn dependencies(&self, package: PackageId, version: Version) -> Dependencies {
        self.inner.dependencies(package, version)
    }

    fn choose_package(&self, packages: &[(PackageId, Ranges)]) -> Option<usize> {
        self.inner.choose_package(packages)
    }
}

fn run_solve(adapter: ProjectAdapter<'_>, strategy: VersionStrategy, direct_names: &[AuthorName]) -> Result<AppDependencies, SolveFailure> {
    let root_version = adapter.root_version();
    let wrapped = StrategyProvider { inner: adapter, strategy };

    match resolve(&wrapped, PackageId::ROOT, root_version) {
        Ok((solution, _stats)) => {
            let mut direct = ExactVersionMap::new();
            let mut indirect = ExactVersionMap::new();
            for (id, version) in solution {
                if id == PackageId::ROOT {
                    continue;
                }
                let name = wrapped.inner.resolve(id);
                if direct_names.contains(&name) {
                    direct.insert(name, version);
                } else {
                    indirect.insert(name, version);
                }
            }
            Ok(AppDependencies { direct, indirect })
        }
        Err(inner) => {
            let names = wrapped.inner.snapshot_names();
            Err(SolveFailure { inner, names })
        }
    }
}

/// Solve `project_elm_json` against whatever `env` currently knows about
/// (spec.md §4.3). `additional_constraints` lets a caller require extra
/// packages beyond what the manifest declares, the way the teacher's
/// `--extra` CLI flag does, without mutating the manifest first.
pub fn solve_deps_with(
    env: &InstallEnv,
    project_elm_json: &ProjectConfig,
    use_test: bool,
    additional_constraints: &[(AuthorName, VersionRange)],
    strategy: VersionStrategy,
) -> Result<AppDependencies, SolveFailure> {
    match project_elm_json {
        ProjectConfig::Application(app) => solve_application(env, app, use_test, additional_constraints, strategy),
        ProjectConfig::Package(pkg) => solve_package(env, pkg, use_test, additional_constraints, strategy),
    }
}

fn solve_application(
    env: &InstallEnv,
    app: &ApplicationConfig,
    use_test: bool,
    additional_constraints: &[(AuthorName, VersionRange)],
    strategy: VersionStrategy,
) -> Result<AppDependencies, SolveFailure> {
    let mut adapter = ProjectAdapter::new_for_application(env.cache(), env.registry(), app, use_test);
    for (name, range) in additional_constraints {
        adapter = adapter.with_extra_root_dependency(name.clone(), Ranges::from_range(range));
    }
    let mut direct_names: Vec<AuthorName> = app.dependencies.direct.keys().cloned().collect();
    if use_test {
        direct_names.extend(app.test_dependencies.direct.keys().cloned());
    }
    run_solve(adapter, strategy, &direct_names)
}

fn solve_package(
    env: &InstallEnv,
    pkg: &PackageConfig,
    use_test: bool,
    additional_constraints: &[(AuthorName, VersionRange)],
    strategy: VersionStrategy,
) -> Result<AppDependencies, SolveFailure> {
    let mut adapter = ProjectAdapter::new(env.cache(), env.registry(), pkg, use_test);
    for (name, range) in additional_constraints {
        adapter = adapter.with_extra_root_dependency(name.clone(), Ranges::from_range(range));
    }
    let mut direct_names: Vec<AuthorName> = pkg.dependencies.keys().cloned().collect();
    if use_test {
        direct_names.extend(pkg.test_dependencies.keys().cloned());
    }
    run_solve(adapter, strategy, &direct_names)
}

/// A solver that never touches the network: it only ever sees packages
/// already present in `ELM_HOME` (including local-dev overlays, since
/// those are ordinary symlinked cache entries to [`crate::cache::Cache`]).
pub struct Offline {
    env: InstallEnv,
}

impl Offline {
    /// Wrap an already-initialized, offline-mode [`InstallEnv`]. Callers
    /// are expected to have called [`InstallEnv::init`] themselves (with
    /// `offline: true`) before constructing this.
    pub fn new(env: InstallEnv) -> Self {
        Offline { env }
    }

    pub fn env(&self) -> &InstallEnv {
        &self.env
    }

    pub fn env_mut(&mut self) -> &mut InstallEnv {
        &mut self.env
    }

    /// Run the dependency solver on a given project config, obtained from
    /// an `elm.json`. Set `use_test` to also take test dependencies into
    /// account.
    pub fn solve_deps(
        &self,
        project_elm_json: &ProjectConfig,
        use_test: bool,
        additional_constraints: &[(AuthorName, VersionRange)],
    ) -> Result<AppDependencies, SolveFailure> {
        solve_deps_with(&self.env, project_elm_json, use_test, additional_constraints, VersionStrategy::Newest)
    }
}

/// Online variant of the dependency solver: refreshes its registry
/// against the remote server once at construction, then solves
/// identically to [`Offline`] but sees whatever that refresh turned up
/// too.
pub struct Online {
    env: InstallEnv,
    strategy: VersionStrategy,
}

impl Online {
    /// Initialize `env` (fetching or incrementally refreshing its
    /// registry, per [`InstallEnv::init`]/[`InstallEnv::refresh`]) and
    /// wrap it for solving with the given version-preference strategy.
    pub fn new(mut env: InstallEnv, strategy: VersionStrategy) -> Result<Self, InstallEnvError> {
        env.init()?;
        env.refresh()?;
        Ok(Online { env, strategy })
    }

    pub fn env(&self) -> &InstallEnv {
        &self.env
    }

    pub fn env_mut(&mut self) -> &mut InstallEnv {
        &mut self.env
    }

    /// See [`Offline::solve_deps`].
    pub fn solve_deps(
        &self,
        project_elm_json: &ProjectConfig,
        use_test: bool,
        additional_constraints: &[(AuthorName, VersionRange)],
    ) -> Result<AppDependencies, SolveFailure> {
        solve_deps_with(&self.env, project_elm_json, use_test, additional_constraints, self.strategy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{Downloader, Extractor};
    use crate::install_env::{HttpResponse, HttpSession, Protocol, SinceResponse};
    use crate::project_config::{AppDependencies as AppDeps, ExposedModules};
    use std::collections::BTreeMap;
    use std::path::Path;
    use tempfile::tempdir;

    struct NoHttp;
    impl HttpSession for NoHttp {
        fn get(&self, _url: &str, _etag: Option<&str>) -> Result<HttpResponse, String> {
            Err("offline test".to_string())
        }
        fn since(&self, _base_url: &str, _since_count: u64) -> Result<SinceResponse, String> {
            Ok(SinceResponse::Delta(Vec::new()))
        }
    }

    struct StaticDownloader;
    impl Downloader for StaticDownloader {
        fn download(&self, _url: &str) -> Result<Vec<u8>, String> {
            Ok(b"fake-archive".to_vec())
        }
    }

    struct ManifestOnlyExtractor<'a> {
        manifest: &'a str,
    }
    impl<'a> Extractor for ManifestOnlyExtractor<'a> {
        fn extract(&self, _archive: &[u8], destination: &Path) -> Result<(), String> {
            std::fs::write(destination.join("elm.json"), self.manifest).map_err(|e| e.to_string())
        }
    }

    fn name(s: &str) -> AuthorName {
        s.parse().unwrap()
    }

    fn fresh_offline_env(elm_home: &Path) -> InstallEnv {
        let mut env = InstallEnv::new(
            elm_home.to_path_buf(),
            Protocol::V1 { registry_url: "https://example.com/registry".to_string() },
            Box::new(NoHttp),
            true,
            false,
        );
        env.init().unwrap();
        env
    }

    fn install_package(env: &mut InstallEnv, author_name: &AuthorName, version: Version, manifest: &str) {
        env.cache()
            .download(author_name, version, "https://example.com/archive.zip", &StaticDownloader, &ManifestOnlyExtractor { manifest }, true)
            .unwrap();
        env.registry_mut().add_version(author_name, version, false);
    }

    #[test]
    fn offline_solve_picks_the_newest_compatible_version_by_default() {
        let elm_home = tempdir().unwrap();
        let mut env = fresh_offline_env(elm_home.path());
        let core = name("elm/core");
        install_package(&mut env, &core, Version::new(1, 0, 0), r#"{"type":"package","name":"elm/core","summary":"","license":"BSD-3-Clause","version":"1.0.0","elm-version":"0.19.0 <= v < 0.20.0","exposed-modules":[],"dependencies":{},"test-dependencies":{}}"#);
        install_package(&mut env, &core, Version::new(1, 1, 0), r#"{"type":"package","name":"elm/core","summary":"","license":"BSD-3-Clause","version":"1.1.0","elm-version":"0.19.0 <= v < 0.20.0","exposed-modules":[],"dependencies":{},"test-dependencies":{}}"#);

        let mut deps = BTreeMap::new();
        deps.insert(core.clone(), "1.0.0 <= v < 2.0.0".parse().unwrap());
        let pkg_config = PackageConfig {
            name: name("author/project"),
            summary: "test".to_string(),
            license: "BSD-3-Clause".to_string(),
            version: Version::new(1, 0, 0),
            elm_version: "0.19.0 <= v < 0.20.0".parse().unwrap(),
            exposed_modules: ExposedModules::NoCategory(vec![]),
            dependencies: deps,
            test_dependencies: BTreeMap::new(),
        };

        let offline = Offline::new(env);
        let solution = offline.solve_deps(&ProjectConfig::Package(pkg_config), false, &[]).unwrap();
        assert_eq!(solution.direct.get(&core), Some(&Version::new(1, 1, 0)));
        assert!(solution.indirect.is_empty());
    }

    #[test]
    fn oldest_strategy_picks_the_oldest_compatible_version() {
        let elm_home = tempdir().unwrap();
        let mut env = fresh_offline_env(elm_home.path());
        let core = name("elm/core");
        install_package(&mut env, &core, Version::new(1, 0, 0), r#"{"type":"package","name":"elm/core","summary":"","license":"BSD-3-Clause","version":"1.0.0","elm-version":"0.19.0 <= v < 0.20.0","exposed-modules":[],"dependencies":{},"test-dependencies":{}}"#);
        install_package(&mut env, &core, Version::new(1, 1, 0), r#"{"type":"package","name":"elm/core","summary":"","license":"BSD-3-Clause","version":"1.1.0","elm-version":"0.19.0 <= v < 0.20.0","exposed-modules":[],"dependencies":{},"test-dependencies":{}}"#);

        let mut direct = BTreeMap::new();
        direct.insert(core.clone(), Version::new(1, 1, 0));
        let app = ApplicationConfig {
            source_directories: vec!["src".to_string()],
            elm_version: Version::new(0, 19, 1),
            dependencies: AppDeps { direct, indirect: BTreeMap::new() },
            test_dependencies: AppDeps::default(),
        };

        let solution = solve_deps_with(&env, &ProjectConfig::Application(app), false, &[], VersionStrategy::Oldest).unwrap();
        assert_eq!(solution.direct.get(&core), Some(&Version::new(1, 1, 0)));
    }

    #[test]
    fn unsatisfiable_project_reports_a_non_empty_explanation() {
        let elm_home = tempdir().unwrap();
        let env = fresh_offline_env(elm_home.path());

        let mut deps = BTreeMap::new();
        deps.insert(name("elm/core"), "1.0.0 <= v < 2.0.0".parse().unwrap());
        let pkg_config = PackageConfig {
            name: name("author/project"),
            summary: "test".to_string(),
            license: "BSD-3-Clause".to_string(),
            version: Version::new(1, 0, 0),
            elm_version: "0.19.0 <= v < 0.20.0".parse().unwrap(),
            exposed_modules: ExposedModules::NoCategory(vec![]),
            dependencies: deps,
            test_dependencies: BTreeMap::new(),
        };

        let offline = Offline::new(env);
        let err = offline.solve_deps(&ProjectConfig::Package(pkg_config), false, &[]).unwrap_err();
        let report = err.report(8192);
        assert!(!report.text.is_empty());
    }
}
