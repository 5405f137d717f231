// SPDX-License-Identifier: MPL-2.0

//! Module dealing with project configuration related to the `elm.json`
//! file, and with deriving an install plan from the result of a solve.
//!
//! Grounded on the teacher's `project_config.rs`: the `ProjectConfig`
//! tagged union, `ApplicationConfig`/`PackageConfig` shapes and
//! `ExposedModules` carry over unchanged in spirit. What changes: `Pkg`
//! becomes [`crate::pkg::AuthorName`], `SemanticVersion`/`Range` become
//! our own [`Version`]/[`VersionRange`], and this module gains the
//! install-plan diffing that spec.md §3 describes but the teacher never
//! needed (the teacher only ever printed the raw solver assignment).

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::constraint::Constraint;
use crate::pkg::AuthorName;
use crate::version::Version;

/// Ordered mapping from a package identity to an exact version. Used on
/// the application side of a manifest, where every dependency is pinned.
pub type ExactVersionMap = BTreeMap<AuthorName, Version>;

/// Ordered mapping from a package identity to a range constraint. Used on
/// the package side of a manifest, where dependencies are ranges.
pub type ConstraintMap = BTreeMap<AuthorName, Constraint>;

/// Project configuration corresponding to an `elm.json` file: either a
/// package or an application. Both have different sets of fields.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ProjectConfig {
    Application(ApplicationConfig),
    Package(PackageConfig),
}

/// Struct representing the `elm.json` of an application.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ApplicationConfig {
    pub source_directories: Vec<String>,
    pub elm_version: Version,
    pub dependencies: AppDependencies,
    pub test_dependencies: AppDependencies,
}

/// The four disjoint [`ExactVersionMap`]s of an elm application: direct,
/// indirect, test-direct (nested under `test_dependencies.direct`) and
/// test-indirect (`test_dependencies.indirect`). A package name must
/// appear in at most one of the four across an `ApplicationConfig`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppDependencies {
    pub direct: ExactVersionMap,
    pub indirect: ExactVersionMap,
}

/// Struct representing the `elm.json` of a package.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct PackageConfig {
    pub name: AuthorName,
    pub summary: String,
    pub license: String,
    pub version: Version,
    pub elm_version: Constraint,
    pub exposed_modules: ExposedModules,
    pub dependencies: ConstraintMap,
    pub test_dependencies: ConstraintMap,
}

/// Exposed modules, potentially regrouped by categories.
#[derive(Debug, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ExposedModules {
    NoCategory(Vec<String>),
    WithCategories(BTreeMap<String, Vec<String>>),
}

impl PackageConfig {
    /// Iterate over a package's dependencies as `(package, range)` pairs.
    pub fn dependencies_iter(&self) -> impl Iterator<Item = (&AuthorName, &crate::version::VersionRange)> {
        self.dependencies.iter().map(|(p, c)| (p, &c.0))
    }
}

impl ApplicationConfig {
    /// Every name declared across the four dependency maps, used to check
    /// the "a name appears in at most one" invariant from spec.md §3.
    pub fn duplicate_names(&self) -> Vec<AuthorName> {
        let mut seen: BTreeMap<&AuthorName, u32> = BTreeMap::new();
        for map in [
            &self.dependencies.direct,
            &self.dependencies.indirect,
            &self.test_dependencies.direct,
            &self.test_dependencies.indirect,
        ] {
            for name in map.keys() {
                *seen.entry(name).or_insert(0) += 1;
            }
        }
        seen.into_iter()
            .filter(|(_, count)| *count > 1)
            .map(|(name, _)| name.clone())
            .collect()
    }
}

/// A single entry of an install plan: a package whose pinned version is
/// changing (or being newly added/removed).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageChange {
    pub author: String,
    pub name: String,
    pub old_version: Option<Version>,
    pub new_version: Option<Version>,
}

impl fmt::Display for PackageChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.old_version, self.new_version) {
            (None, Some(new)) => write!(f, "+ {}/{} {}", self.author, self.name, new),
            (Some(old), None) => write!(f, "- {}/{} {}", self.author, self.name, old),
            (Some(old), Some(new)) if old != new => {
                write!(f, "~ {}/{} {} -> {}", self.author, self.name, old, new)
            }
            (Some(_), Some(new)) => write!(f, "= {}/{} {}", self.author, self.name, new),
            (None, None) => write!(f, "? {}/{} (no version)", self.author, self.name),
        }
    }
}

/// An ordered install plan: the delta from `old` to `new`.
pub type InstallPlan = Vec<PackageChange>;

/// Diff two exact-version maps into an ordered install plan. Packages only
/// in `old` become removals; packages only in `new` become additions;
/// packages in both with a different version become updates. Ordered by
/// `(author, name)`, matching the registry's own sort invariant.
pub fn diff_install_plan(old: &ExactVersionMap, new: &ExactVersionMap) -> InstallPlan {
    let mut names: Vec<&AuthorName> = old.keys().chain(new.keys()).collect();
    names.sort();
    names.dedup();

    names
        .into_iter()
        .filter_map(|name| {
            let old_version = old.get(name).copied();
            let new_version = new.get(name).copied();
            if old_version == new_version {
                return None;
            }
            Some(PackageChange {
                author: name.author.clone(),
                name: name.name.clone(),
                old_version,
                new_version,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(s: &str) -> Version {
        s.parse().unwrap()
    }

    fn name(s: &str) -> AuthorName {
        s.parse().unwrap()
    }

    #[test]
    fn diff_reports_additions_removals_and_updates() {
        let mut old = ExactVersionMap::new();
        old.insert(name("elm/core"), v("1.0.0"));
        old.insert(name("elm/json"), v("1.0.0"));

        let mut new = ExactVersionMap::new();
        new.insert(name("elm/core"), v("1.0.5"));
        new.insert(name("elm/html"), v("1.0.0"));

        let plan = diff_install_plan(&old, &new);
        assert_eq!(plan.len(), 3);
        assert!(plan.iter().any(|c| c.name == "core" && c.old_version == Some(v("1.0.0")) && c.new_version == Some(v("1.0.5"))));
        assert!(plan.iter().any(|c| c.name == "json" && c.new_version.is_none()));
        assert!(plan.iter().any(|c| c.name == "html" && c.old_version.is_none()));
    }

    #[test]
    fn diff_is_empty_for_identical_maps() {
        let mut map = ExactVersionMap::new();
        map.insert(name("elm/core"), v("1.0.0"));
        assert!(diff_install_plan(&map, &map).is_empty());
    }

    #[test]
    fn duplicate_names_detects_cross_map_collisions() {
        let mut direct = ExactVersionMap::new();
        direct.insert(name("elm/core"), v("1.0.0"));
        let mut indirect = ExactVersionMap::new();
        indirect.insert(name("elm/core"), v("1.0.0"));

        let app = ApplicationConfig {
            source_directories: vec!["src".to_string()],
            elm_version: v("0.19.1"),
            dependencies: AppDependencies { direct, indirect },
            test_dependencies: AppDependencies::default(),
        };
        assert_eq!(app.duplicate_names(), vec![name("elm/core")]);
    }
}
