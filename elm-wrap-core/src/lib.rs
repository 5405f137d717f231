// SPDX-License-Identifier: MPL-2.0

//! # Dependency solving and package management for the elm ecosystem
//!
//! This crate provides a PubGrub-style dependency solver together with
//! the registry, cache, and local-development machinery an Elm-compatible
//! package manager needs around it:
//!
//! - [`version`] / [`constraint`]: the `major.minor.patch` version type and
//!   the `"v1 <= v < v2"` constraint string format used throughout
//!   `elm.json`.
//! - [`pkg`]: package identity (`author/name`) and the dense
//!   [`pkg::PackageId`] interning the solver uses internally.
//! - [`project_config`]: serialization of application and package
//!   `elm.json` manifests, plus install-plan diffing.
//! - [`pgsolver`]: the solver itself — incompatibilities, partial
//!   solution, conflict resolution, and human-readable failure reports.
//! - [`dependency_provider_adapter`]: wires [`pgsolver::provider::DependencyProvider`]
//!   to an on-disk [`registry::Registry`] and [`cache::Cache`], splicing
//!   the project under solve in as the synthetic root package.
//! - [`registry`]: the V1 binary and V2 text package-index formats.
//! - [`cache`] / [`mirror_manifest`]: the on-disk package cache and its
//!   content-addressed dedup index.
//! - [`install_env`]: ties cache, registry, and an injected HTTP session
//!   together into one environment a solve or install runs against.
//! - [`local_dev`]: the local-development overlay — symlinking a live
//!   source tree in as a package version and keeping its consumers'
//!   manifests in sync.
//! - [`upgrade`]: semver arithmetic for "what's newer" questions.
//! - [`config`]: environment-variable configuration (`ELM_HOME`,
//!   `WRAP_HOME`, and friends).
//!
//! ## Solving a project's dependencies
//!
//! ```no_run
//! use elm_wrap_core::install_env::{InstallEnv, Protocol};
//! use elm_wrap_core::project_config::ProjectConfig;
//! use elm_wrap_core::solver::{self, VersionStrategy};
//!
//! # struct NoHttp;
//! # impl elm_wrap_core::install_env::HttpSession for NoHttp {
//! #     fn get(&self, _: &str, _: Option<&str>) -> Result<elm_wrap_core::install_env::HttpResponse, String> { unimplemented!() }
//! #     fn since(&self, _: &str, _: u64) -> Result<elm_wrap_core::install_env::SinceResponse, String> { unimplemented!() }
//! # }
//! let mut env = InstallEnv::new(
//!     dirs::home_dir().unwrap().join(".elm"),
//!     Protocol::V1 { registry_url: "https://package.elm-lang.org".to_string() },
//!     Box::new(NoHttp),
//!     true,
//!     false,
//! );
//! env.init().expect("failed to set up the install environment");
//!
//! let elm_json = std::fs::read_to_string("elm.json").expect("not an elm project");
//! let project: ProjectConfig = serde_json::from_str(&elm_json).expect("malformed elm.json");
//!
//! let solution = solver::solve_deps_with(&env, &project, false, &[], VersionStrategy::Newest)
//!     .unwrap_or_else(|failure| panic!("{}", failure.report(8192).text));
//! println!("{}", serde_json::to_string_pretty(&solution).unwrap());
//! ```

pub mod atomic_file;
pub mod cache;
pub mod config;
pub mod constraint;
pub mod dependency_provider_adapter;
pub mod install_env;
pub mod local_dev;
pub mod mirror_manifest;
pub mod pgsolver;
pub mod pkg;
pub mod project_config;
pub mod registry;
pub mod solver;
pub mod upgrade;
pub mod version;
