// SPDX-License-Identifier: MPL-2.0

//! Transitive dependency propagation and orphan pruning across every
//! consumer of a local-dev package (spec.md §4.7 "Transitive refresh",
//! "Orphan pruning"). Both walk the tracking directory, touch each
//! consumer's manifest independently, and aggregate per-consumer
//! failures into a single success/failure verdict (spec.md §7
//! "Propagation policy").

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use tracing::debug;

use crate::atomic_file::write_atomic;
use crate::dependency_provider_adapter::ProjectAdapter;
use crate::install_env::InstallEnv;
use crate::local_dev::{tracking, LocalDevError};
use crate::pgsolver::ranges::Ranges;
use crate::pgsolver::solve::resolve as solve_resolve;
use crate::pkg::{AuthorName, PackageId};
use crate::project_config::{ExactVersionMap, ProjectConfig};
use crate::version::{Version, VersionRange};

/// How many consumers a transitive operation touched and how many of
/// them failed. A non-zero `failed` count always means the caller also
/// received [`LocalDevError::ConsumersFailed`], since spec.md §7 treats
/// any per-consumer failure as an overall failure.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RefreshOutcome {
    pub succeeded: usize,
    pub failed: usize,
}

fn finish(outcome: RefreshOutcome) -> Result<RefreshOutcome, LocalDevError> {
    if outcome.failed > 0 {
        Err(LocalDevError::ConsumersFailed { failed: outcome.failed, total: outcome.succeeded + outcome.failed })
    } else {
        Ok(outcome)
    }
}

fn read_application(path: &Path) -> Result<crate::project_config::ApplicationConfig, LocalDevError> {
    let text = fs::read_to_string(path)?;
    let config: ProjectConfig = serde_json::from_str(&text).map_err(|_| LocalDevError::MalformedManifest { path: path.display().to_string() })?;
    match config {
        ProjectConfig::Application(app) => Ok(app),
        ProjectConfig::Package(_) => Err(LocalDevError::NotAnApplicationManifest { path: path.display().to_string() }),
    }
}

fn write_application(path: &Path, app: &crate::project_config::ApplicationConfig) -> Result<(), LocalDevError> {
    let config = ProjectConfig::Application(app.clone());
    let text = serde_json::to_string_pretty(&config).expect("ApplicationConfig always serializes");
    write_atomic(path, text.as_bytes())?;
    Ok(())
}

/// After a dependency is added inside the tracked package at
/// `(package_author_name, package_version)`, bring every consumer's
/// manifest up to date: for each of the package's dependencies the
/// consumer doesn't already declare, solve for it and record the
/// decision as an *indirect* entry. Direct entries are never touched.
pub fn refresh_dependents(
    env: &InstallEnv,
    tracking_root: &Path,
    package_author_name: &AuthorName,
    package_version: Version,
) -> Result<RefreshOutcome, LocalDevError> {
    let package_config = env.cache().read_elm_json(package_author_name, package_version)?;
    let new_dependencies: Vec<(AuthorName, VersionRange)> = package_config
        .dependencies_iter()
        .map(|(name, range)| (name.clone(), range.clone()))
        .collect();

    let consumers = tracking::consumers_of(tracking_root, package_author_name, package_version)?;
    let mut outcome = RefreshOutcome::default();
    for consumer_path in consumers {
        match refresh_one_consumer(env, &consumer_path, &new_dependencies) {
            Ok(()) => outcome.succeeded += 1,
            Err(e) => {
                debug!("refresh_dependents: consumer {} skipped: {}", consumer_path.display(), e);
                outcome.failed += 1;
            }
        }
    }
    finish(outcome)
}

fn refresh_one_consumer(env: &InstallEnv, consumer_path: &Path, new_dependencies: &[(AuthorName, VersionRange)]) -> Result<(), LocalDevError> {
    let mut app = read_application(consumer_path)?;
    let mut changed = false;

    for (dep_name, dep_range) in new_dependencies {
        if app.dependencies.direct.contains_key(dep_name) || app.dependencies.indirect.contains_key(dep_name) {
            continue;
        }

        let adapter = ProjectAdapter::new_for_application(env.cache(), env.registry(), &app, false)
            .with_extra_root_dependency(dep_name.clone(), Ranges::from_range(dep_range));
        let root_version = adapter.root_version();
        let (solution, _) = solve_resolve(&adapter, PackageId::ROOT, root_version)?;

        for (pkg_id, version) in &solution {
            if *pkg_id == PackageId::ROOT {
                continue;
            }
            let name = adapter.resolve(*pkg_id);
            if app.dependencies.direct.contains_key(&name) {
                continue;
            }
            app.dependencies.indirect.insert(name, *version);
        }
        changed = true;
    }

    if changed {
        write_application(consumer_path, &app)?;
    }
    Ok(())
}

/// After a dependency is removed inside the tracked package, drop any
/// indirect entry of each consumer that's no longer reachable from its
/// direct entries.
pub fn prune_dependents(
    env: &InstallEnv,
    tracking_root: &Path,
    package_author_name: &AuthorName,
    package_version: Version,
) -> Result<RefreshOutcome, LocalDevError> {
    let consumers = tracking::consumers_of(tracking_root, package_author_name, package_version)?;
    let mut outcome = RefreshOutcome::default();
    for consumer_path in consumers {
        match prune_one_consumer(env, &consumer_path) {
            Ok(()) => outcome.succeeded += 1,
            Err(e) => {
                debug!("prune_dependents: consumer {} skipped: {}", consumer_path.display(), e);
                outcome.failed += 1;
            }
        }
    }
    finish(outcome)
}

fn prune_one_consumer(env: &InstallEnv, consumer_path: &Path) -> Result<(), LocalDevError> {
    let mut app = read_application(consumer_path)?;

    let mut combined: ExactVersionMap = app.dependencies.direct.clone();
    combined.extend(app.dependencies.indirect.clone());

    let reachable = reachable_closure(env, &combined, &app.dependencies.direct);

    let before = app.dependencies.indirect.len();
    app.dependencies.indirect.retain(|name, _| reachable.contains(name));
    let changed = app.dependencies.indirect.len() != before;

    if changed {
        write_application(consumer_path, &app)?;
    }
    Ok(())
}

fn reachable_closure(env: &InstallEnv, combined: &ExactVersionMap, direct: &ExactVersionMap) -> HashSet<AuthorName> {
    let mut reachable = HashSet::new();
    let mut stack: Vec<AuthorName> = direct.keys().cloned().collect();
    while let Some(name) = stack.pop() {
        if !reachable.insert(name.clone()) {
            continue;
        }
        let Some(&version) = combined.get(&name) else { continue };
        if let Ok(config) = env.cache().read_elm_json(&name, version) {
            for (dep_name, _) in config.dependencies_iter() {
                if !reachable.contains(dep_name) {
                    stack.push(dep_name.clone());
                }
            }
        }
    }
    reachable
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{Downloader, Extractor};
    use crate::install_env::{HttpResponse, HttpSession, Protocol, SinceResponse};
    use crate::project_config::{AppDependencies, ApplicationConfig};
    use std::collections::BTreeMap;
    use std::path::PathBuf;
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
            fs::write(destination.join("elm.json"), self.manifest).map_err(|e| e.to_string())
        }
    }

    fn name(s: &str) -> AuthorName {
        s.parse().unwrap()
    }

    fn fresh_env(elm_home: &Path) -> InstallEnv {
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

    fn install_package(env: &mut InstallEnv, author: &str, pkg_name: &str, version: Version, manifest: &str) {
        let author_name = name(&format!("{}/{}", author, pkg_name));
        env.cache()
            .download(&author_name, version, "https://example.com/archive.zip", &StaticDownloader, &ManifestOnlyExtractor { manifest }, true)
            .unwrap();
        env.registry_mut().add_version(&author_name, version, false);
    }

    #[test]
    fn refresh_dependents_adds_a_new_indirect_dependency() {
        let elm_home = tempdir().unwrap();
        let tracking_root = tempdir().unwrap();
        let consumer_dir = tempdir().unwrap();
        let consumer_path = consumer_dir.path().join("elm.json");

        let mut env = fresh_env(elm_home.path());

        let json_manifest = r#"{"type":"package","name":"elm/json","summary":"","license":"BSD-3-Clause","version":"1.0.0","elm-version":"0.19.0 <= v < 0.20.0","exposed-modules":[],"dependencies":{},"test-dependencies":{}}"#;
        install_package(&mut env, "elm", "json", Version::new(1, 0, 0), json_manifest);

        let lib_manifest = r#"{"type":"package","name":"acme/lib","summary":"","license":"BSD-3-Clause","version":"1.0.0","elm-version":"0.19.0 <= v < 0.20.0","exposed-modules":[],"dependencies":{"elm/json":"1.0.0 <= v < 2.0.0"},"test-dependencies":{}}"#;
        install_package(&mut env, "acme", "lib", Version::new(1, 0, 0), lib_manifest);

        let mut direct = BTreeMap::new();
        direct.insert(name("acme/lib"), Version::new(1, 0, 0));
        let app = ApplicationConfig {
            source_directories: vec!["src".to_string()],
            elm_version: Version::new(0, 19, 1),
            dependencies: AppDependencies { direct, indirect: BTreeMap::new() },
            test_dependencies: AppDependencies::default(),
        };
        write_application(&consumer_path, &app).unwrap();
        tracking::register_consumer(tracking_root.path(), &name("acme/lib"), Version::new(1, 0, 0), &consumer_path).unwrap();

        let outcome = refresh_dependents(&env, tracking_root.path(), &name("acme/lib"), Version::new(1, 0, 0)).unwrap();
        assert_eq!(outcome, RefreshOutcome { succeeded: 1, failed: 0 });

        let reloaded = read_application(&consumer_path).unwrap();
        assert!(reloaded.dependencies.indirect.contains_key(&name("elm/json")));
        assert!(reloaded.dependencies.direct.contains_key(&name("acme/lib")));
    }

    #[test]
    fn prune_dependents_drops_unreachable_indirect_entries() {
        let elm_home = tempdir().unwrap();
        let consumer_dir = tempdir().unwrap();
        let consumer_path = consumer_dir.path().join("elm.json");
        let env = fresh_env(elm_home.path());

        let mut direct = BTreeMap::new();
        direct.insert(name("acme/lib"), Version::new(1, 0, 0));
        let mut indirect = BTreeMap::new();
        indirect.insert(name("elm/json"), Version::new(1, 0, 0));
        let app = ApplicationConfig {
            source_directories: vec!["src".to_string()],
            elm_version: Version::new(0, 19, 1),
            dependencies: AppDependencies { direct, indirect },
            test_dependencies: AppDependencies::default(),
        };
        write_application(&consumer_path, &app).unwrap();

        // `acme/lib` is not in the cache, so its dependency set reads as
        // empty and `elm/json` is unreachable from it.
        let _ = PathBuf::new();
        prune_one_consumer(&env, &consumer_path).unwrap();
        let reloaded = read_application(&consumer_path).unwrap();
        assert!(!reloaded.dependencies.indirect.contains_key(&name("elm/json")));
    }
}
