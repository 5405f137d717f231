// SPDX-License-Identifier: MPL-2.0

//! The install environment (spec.md §4.6): the one long-lived object a
//! driver creates once and hands to everything else. It owns the cache,
//! the active registry, and the HTTP session, and knows how to bring the
//! registry up to date without ever leaving a half-written file behind.
//!
//! Grounded on the teacher's `main.rs`, which inlines this exact
//! create/init/use sequence (resolve `ELM_HOME`, load or fetch the
//! registry, solve) directly in `main`; this module pulls that sequence
//! out into something a driver calls instead of re-implementing.

use std::path::PathBuf;

use thiserror::Error;
use tracing::{info, warn};

use crate::cache::Cache;
use crate::registry::{v1, v2, Registry, RegistryError};

/// One HTTP round trip's outcome, as seen by [`InstallEnv`]. Injected so
/// the core never links an HTTP client directly; production wiring uses
/// `ureq`.
pub trait HttpSession {
    /// Fetch `url`, sending `etag` as `If-None-Match` when present.
    fn get(&self, url: &str, etag: Option<&str>) -> Result<HttpResponse, String>;

    /// Send the `/since?n=<count>` request for the V1 incremental sync.
    fn since(&self, base_url: &str, since_count: u64) -> Result<SinceResponse, String>;
}

#[derive(Debug, Clone)]
pub enum HttpResponse {
    NotModified,
    Ok { body: Vec<u8>, etag: Option<String> },
}

#[derive(Debug, Clone)]
pub enum SinceResponse {
    /// New entries since the requested count, as `"author/name@version"`.
    Delta(Vec<String>),
    /// The server's state no longer lines up with `since_count` (e.g. it
    /// was rebuilt); callers must clear local state and redownload.
    Reset,
}

/// Which registry wire format is in play, and the URLs needed to fetch
/// it. V1 is the upstream elm package server's own registry; V2 is a
/// third-party repository's zip-packaged text index.
#[derive(Debug, Clone)]
pub enum Protocol {
    V1 { registry_url: String },
    V2 { index_url: String, compiler: String, compiler_version: String },
}

#[derive(Debug, Error)]
pub enum InstallEnvError {
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error("i/o error setting up the install environment")]
    Io(#[from] std::io::Error),
    #[error("failed to fetch {url}: {reason}")]
    Fetch { url: String, reason: String },
}

/// Aggregates everything a solve or an install needs to touch disk or
/// network: the package cache, the active registry, and the session used
/// to refresh it. Lifecycle: `new` → `init` → (solve/install calls) →
/// dropped at process exit, matching spec.md §5's "process-wide arena"
/// resource model — there is no explicit `close`.
pub struct InstallEnv {
    elm_home: PathBuf,
    registry_path: PathBuf,
    protocol: Protocol,
    http: Box<dyn HttpSession>,
    offline: bool,
    ignore_hash: bool,
    cache: Cache,
    registry: Registry,
    known_version_count: u64,
}

impl InstallEnv {
    pub fn new(elm_home: PathBuf, protocol: Protocol, http: Box<dyn HttpSession>, offline: bool, ignore_hash: bool) -> Self {
        let registry_path = match &protocol {
            Protocol::V1 { .. } => elm_home.join("registry.dat"),
            Protocol::V2 { compiler, compiler_version, .. } => elm_home
                .join("repo")
                .join(compiler)
                .join(compiler_version)
                .join("index.dat"),
        };
        InstallEnv {
            cache: Cache::new(elm_home.clone()),
            elm_home,
            registry_path,
            protocol,
            http,
            offline,
            ignore_hash,
            registry: Registry::new(),
            known_version_count: 0,
        }
    }

    pub fn elm_home(&self) -> &std::path::Path {
        &self.elm_home
    }

    pub fn cache(&self) -> &Cache {
        &self.cache
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut Registry {
        &mut self.registry
    }

    /// Persist the in-memory registry back to its wire-format file.
    /// Used by [`crate::local_dev`] after registering/unregistering an
    /// override, since that mutates the V1 registry in place rather than
    /// going through [`InstallEnv::refresh`].
    pub fn write_registry(&self) -> Result<(), InstallEnvError> {
        match &self.protocol {
            Protocol::V1 { .. } => v1::write(&self.registry, &self.registry_path)?,
            Protocol::V2 { compiler, compiler_version, .. } => {
                v2::write(&self.registry, &self.registry_path, compiler, compiler_version)?
            }
        }
        Ok(())
    }

    pub fn offline(&self) -> bool {
        self.offline
    }

    pub fn ignore_hash(&self) -> bool {
        self.ignore_hash
    }

    pub fn known_version_count(&self) -> u64 {
        self.known_version_count
    }

    /// Idempotent setup: create the cache tree, load or fetch the
    /// registry, and (if online) run the ETag-gated refresh described in
    /// spec.md §4.6. Safe to call more than once; later calls just redo
    /// the refresh against whatever is already on disk.
    pub fn init(&mut self) -> Result<(), InstallEnvError> {
        std::fs::create_dir_all(self.cache.packages_dir())?;

        let exists = self.registry_path.exists();
        if !exists {
            if self.offline {
                info!("no local registry and offline mode is set; continuing with an empty registry");
                self.registry = Registry::new();
            } else {
                self.download_full_registry()?;
            }
        } else {
            self.load_local_registry()?;
            if !self.offline {
                self.etag_refresh();
            }
        }

        self.known_version_count = self.registry.since_count;
        Ok(())
    }

    fn load_local_registry(&mut self) -> Result<(), InstallEnvError> {
        self.registry = match &self.protocol {
            Protocol::V1 { .. } => v1::load(&self.registry_path)?,
            Protocol::V2 { .. } => v2::load(&self.registry_path)?.0,
        };
        Ok(())
    }

    fn download_full_registry(&mut self) -> Result<(), InstallEnvError> {
        let url = self.fetch_url();
        let response = self.http.get(&url, None).map_err(|reason| InstallEnvError::Fetch { url: url.clone(), reason })?;
        match response {
            HttpResponse::NotModified => unreachable!("a fetch with no etag never yields 304"),
            HttpResponse::Ok { body, etag } => {
                self.install_fetched_registry(body, etag)?;
            }
        }
        Ok(())
    }

    /// Send the stored ETag; `304` is a no-op, `200` atomically replaces
    /// the local copy and its ETag, and a transport error leaves the
    /// environment on its local copy with a single warning (spec.md §7
    /// "Network errors: non-fatal if an acceptable local registry
    /// exists").
    fn etag_refresh(&mut self) {
        let url = self.fetch_url();
        let etag = v1::read_etag(&self.registry_path);
        match self.http.get(&url, etag.as_deref()) {
            Ok(HttpResponse::NotModified) => {}
            Ok(HttpResponse::Ok { body, etag }) => {
                if let Err(e) = self.install_fetched_registry(body, etag) {
                    warn!("failed to install a refreshed registry, keeping the local copy: {}", e);
                }
            }
            Err(reason) => {
                warn!("registry refresh against {} failed, staying offline for this operation: {}", url, reason);
                self.offline = true;
            }
        }
    }

    fn install_fetched_registry(&mut self, body: Vec<u8>, etag: Option<String>) -> Result<(), InstallEnvError> {
        match &self.protocol {
            Protocol::V1 { .. } => {
                let mut registry = v1::decode_bytes(&body, &self.registry_path.display().to_string())?;
                registry.sort_entries();
                v1::write(&registry, &self.registry_path)?;
                if let Some(etag) = etag {
                    v1::write_etag(&self.registry_path, &etag)?;
                }
                self.registry = registry;
            }
            Protocol::V2 { compiler, compiler_version, .. } => {
                let text = String::from_utf8_lossy(&body).into_owned();
                let (mut registry, _, _) = v2::parse(&text, &self.registry_path.display().to_string())?;
                registry.sort_entries();
                if let Some(parent) = self.registry_path.parent() {
                    std::fs::create_dir_all(parent)?;
                }
                v2::write(&registry, &self.registry_path, compiler, compiler_version)?;
                self.registry = registry;
            }
        }
        Ok(())
    }

    fn fetch_url(&self) -> String {
        match &self.protocol {
            Protocol::V1 { registry_url } => registry_url.clone(),
            Protocol::V2 { index_url, .. } => index_url.clone(),
        }
    }

    /// Apply a `/since` incremental sync (V1 only, per spec.md §6's wire
    /// protocol list). On `Reset`, clears local state and redownloads in
    /// full rather than trying to apply a delta against stale state.
    pub fn refresh(&mut self) -> Result<(), InstallEnvError> {
        if self.offline {
            return Ok(());
        }
        let Protocol::V1 { registry_url } = &self.protocol else {
            warn!("/since incremental sync is only defined for the V1 protocol; skipping");
            return Ok(());
        };
        let url = registry_url.clone();
        match self.http.since(&url, self.registry.since_count) {
            Ok(SinceResponse::Delta(entries)) => {
                self.registry.incremental_apply(&entries)?;
                v1::write(&self.registry, &self.registry_path)?;
                self.known_version_count = self.registry.since_count;
            }
            Ok(SinceResponse::Reset) => {
                info!("registry server reported a reset; clearing local state and redownloading");
                self.registry = Registry::new();
                self.download_full_registry()?;
            }
            Err(reason) => {
                warn!("/since refresh against {} failed, staying with current state: {}", url, reason);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::collections::VecDeque;
    use tempfile::tempdir;

    struct ScriptedHttp {
        responses: RefCell<VecDeque<Result<HttpResponse, String>>>,
    }

    impl HttpSession for ScriptedHttp {
        fn get(&self, _url: &str, _etag: Option<&str>) -> Result<HttpResponse, String> {
            self.responses.borrow_mut().pop_front().expect("no more scripted responses")
        }

        fn since(&self, _base_url: &str, _since_count: u64) -> Result<SinceResponse, String> {
            Ok(SinceResponse::Delta(Vec::new()))
        }
    }

    fn empty_v1_bytes(scratch: &std::path::Path) -> Vec<u8> {
        let registry = Registry::new();
        let path = scratch.join("scratch-registry.dat");
        crate::registry::v1::write(&registry, &path).unwrap();
        std::fs::read(&path).unwrap()
    }

    #[test]
    fn offline_init_with_no_local_registry_yields_an_empty_registry() {
        let dir = tempdir().unwrap();
        let http = Box::new(ScriptedHttp { responses: RefCell::new(VecDeque::new()) });
        let mut env = InstallEnv::new(
            dir.path().to_path_buf(),
            Protocol::V1 { registry_url: "https://example.com/registry".to_string() },
            http,
            true,
            false,
        );
        env.init().unwrap();
        assert!(env.registry().versions_of(&"elm/core".parse().unwrap()).is_empty());
    }

    #[test]
    fn online_init_downloads_when_no_local_registry_exists() {
        let dir = tempdir().unwrap();
        let scratch = tempdir().unwrap();
        let bytes = empty_v1_bytes(scratch.path());
        let http = Box::new(ScriptedHttp {
            responses: RefCell::new(VecDeque::from(vec![Ok(HttpResponse::Ok { body: bytes, etag: Some("\"v1\"".to_string()) })])),
        });
        let mut env = InstallEnv::new(
            dir.path().to_path_buf(),
            Protocol::V1 { registry_url: "https://example.com/registry".to_string() },
            http,
            false,
            false,
        );
        env.init().unwrap();
        assert!(dir.path().join("registry.dat").exists());
        assert_eq!(v1::read_etag(&dir.path().join("registry.dat")).as_deref(), Some("\"v1\""));
    }

    #[test]
    fn network_error_during_refresh_keeps_the_local_copy_and_goes_offline() {
        let dir = tempdir().unwrap();
        let registry = Registry::new();
        v1::write(&registry, &dir.path().join("registry.dat")).unwrap();

        let http = Box::new(ScriptedHttp {
            responses: RefCell::new(VecDeque::from(vec![Err("connection refused".to_string())])),
        });
        let mut env = InstallEnv::new(
            dir.path().to_path_buf(),
            Protocol::V1 { registry_url: "https://example.com/registry".to_string() },
            http,
            false,
            false,
        );
        env.init().unwrap();
        assert!(env.offline());
    }
}
