// SPDX-License-Identifier: MPL-2.0

//! The local package cache (spec.md §4.5): `ELM_HOME/packages/<author>/
//! <name>/<version>/` holding extracted package trees, plus the
//! download-verify-extract pipeline that fills it in.
//!
//! Grounded on the teacher's `pkg_version::PkgVersion` (`fetch_config`/
//! `load_config`/`config_path`), generalized from "fetch one elm.json"
//! to "fetch and extract one whole package archive", since the teacher
//! never implemented package installation, only dependency-graph
//! resolution against already-installed packages. ZIP extraction and
//! HTTP transport are out of core scope (spec.md §1); both are injected
//! as traits, the way the teacher injects `http_fetch` as a closure
//! parameter throughout `pkg_version.rs`.

use std::fs;
use std::path::{Path, PathBuf};

use sha1::{Digest, Sha1};
use thiserror::Error;
use tracing::debug;

use crate::mirror_manifest::{ArchiveRecord, MirrorManifest, MirrorManifestError};
use crate::pkg::AuthorName;
use crate::project_config::PackageConfig;
use crate::version::Version;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("i/o error reading or writing the cache")]
    Io(#[from] std::io::Error),
    #[error("failed to parse/convert JSON")]
    Json(#[from] serde_json::Error),
    #[error("failed to fetch {url}: {reason}")]
    Fetch { url: String, reason: String },
    #[error("downloaded archive for {author_name}@{version} has hash {actual}, expected {expected}")]
    HashMismatch {
        author_name: String,
        version: Version,
        expected: String,
        actual: String,
    },
    #[error("failed to extract archive for {author_name}@{version}: {reason}")]
    Extraction { author_name: String, version: Version, reason: String },
    #[error(transparent)]
    MirrorManifest(#[from] MirrorManifestError),
}

/// Fetches a package archive's bytes from the network. Injected so the
/// core never links an HTTP client directly; production wiring uses
/// `ureq` behind this trait (see [`crate::install_env::HttpSession`]).
pub trait Downloader {
    fn download(&self, url: &str) -> Result<Vec<u8>, String>;
}

/// Extracts a downloaded archive's bytes into a directory. Injected
/// because ZIP handling is out of core scope (spec.md §1); production
/// wiring supplies a `zip`-crate-backed implementation.
pub trait Extractor {
    fn extract(&self, archive: &[u8], destination: &Path) -> Result<(), String>;
}

/// `ELM_HOME/packages/<author>/<name>/<version>/`, plus the mirror
/// manifest that tracks which archive hash backs each installed triple.
pub struct Cache {
    elm_home: PathBuf,
    mirror_manifest_path: PathBuf,
}

impl Cache {
    pub fn new(elm_home: impl Into<PathBuf>) -> Self {
        let elm_home = elm_home.into();
        let mirror_manifest_path = elm_home.join("mirror-manifest.json");
        Cache { elm_home, mirror_manifest_path }
    }

    pub fn packages_dir(&self) -> PathBuf {
        AuthorName::packages_dir(&self.elm_home)
    }

    pub fn package_version_dir(&self, author_name: &AuthorName, version: Version) -> PathBuf {
        author_name.cache_dir(&self.elm_home).join(version.to_string())
    }

    /// The single source of truth for "is this package version on disk".
    /// A symlink (local-dev overlay, spec.md §4.7) counts as present:
    /// `exists()` follows symlinks.
    pub fn cache_package_exists(&self, author_name: &AuthorName, version: Version) -> bool {
        self.package_version_dir(author_name, version).join("elm.json").exists()
    }

    pub fn load_mirror_manifest(&self) -> Result<MirrorManifest, CacheError> {
        Ok(MirrorManifest::load(&self.mirror_manifest_path)?)
    }

    pub fn read_elm_json(&self, author_name: &AuthorName, version: Version) -> Result<PackageConfig, CacheError> {
        let path = self.package_version_dir(author_name, version).join("elm.json");
        let text = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Download, verify, and extract `(author_name, version)` into the
    /// cache. `archive_url` is the archive URL already constructed by
    /// the caller (V1 uses the upstream elm package host, V2 the
    /// repository's index — constructing it is a registry-protocol
    /// concern, not this module's).
    ///
    /// Extraction happens into a sibling temp directory and is only
    /// renamed into place once fully written, so a crash mid-extraction
    /// never leaves a partial package tree visible
    /// (`cache_package_exists` transitions false -> true exactly once).
    pub fn download(
        &self,
        author_name: &AuthorName,
        version: Version,
        archive_url: &str,
        downloader: &dyn Downloader,
        extractor: &dyn Extractor,
        ignore_hash: bool,
    ) -> Result<(), CacheError> {
        let bytes = downloader.download(archive_url).map_err(|reason| CacheError::Fetch {
            url: archive_url.to_string(),
            reason,
        })?;

        let mut hasher = Sha1::new();
        hasher.update(&bytes);
        let digest = hasher.finalize();
        let actual_hash = hex::encode(digest);

        let mut manifest = self.load_mirror_manifest()?;
        if !ignore_hash {
            if let Some(expected) = manifest.hash_of(author_name, version) {
                if expected != actual_hash {
                    return Err(CacheError::HashMismatch {
                        author_name: author_name.to_string(),
                        version,
                        expected: expected.to_string(),
                        actual: actual_hash,
                    });
                }
            }
        } else {
            debug!(
                "ignoring the mirror-manifest hash check for {}@{} (--from-url escape hatch)",
                author_name, version
            );
        }

        let final_dir = self.package_version_dir(author_name, version);
        let parent = final_dir.parent().expect("package_version_dir always has a parent");
        fs::create_dir_all(parent)?;
        let tmp_dir = parent.join(format!(".{}.tmp-extract", version));
        if tmp_dir.exists() {
            fs::remove_dir_all(&tmp_dir)?;
        }
        fs::create_dir_all(&tmp_dir)?;

        if let Err(reason) = extractor.extract(&bytes, &tmp_dir) {
            let _ = fs::remove_dir_all(&tmp_dir);
            return Err(CacheError::Extraction {
                author_name: author_name.to_string(),
                version,
                reason,
            });
        }

        if final_dir.exists() {
            fs::remove_dir_all(&final_dir)?;
        }
        fs::rename(&tmp_dir, &final_dir)?;

        manifest.add(
            author_name,
            version,
            ArchiveRecord { hash: actual_hash, url: archive_url.to_string() },
        );
        manifest.write_json(&self.mirror_manifest_path)?;
        Ok(())
    }
}

/// Minimal hex-encoding helper so this module doesn't need to pull in a
/// separate `hex` dependency just for 20-byte digests.
mod hex {
    pub fn encode(bytes: impl AsRef<[u8]>) -> String {
        const TABLE: &[u8; 16] = b"0123456789abcdef";
        let mut out = String::with_capacity(bytes.as_ref().len() * 2);
        for b in bytes.as_ref() {
            out.push(TABLE[(b >> 4) as usize] as char);
            out.push(TABLE[(b & 0x0f) as usize] as char);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    struct FakeDownloader(Vec<u8>);
    impl Downloader for FakeDownloader {
        fn download(&self, _url: &str) -> Result<Vec<u8>, String> {
            Ok(self.0.clone())
        }
    }

    struct FakeExtractor;
    impl Extractor for FakeExtractor {
        fn extract(&self, _archive: &[u8], destination: &Path) -> Result<(), String> {
            fs::write(destination.join("elm.json"), b"{}").map_err(|e| e.to_string())
        }
    }

    struct FailingExtractor;
    impl Extractor for FailingExtractor {
        fn extract(&self, _archive: &[u8], _destination: &Path) -> Result<(), String> {
            Err("boom".to_string())
        }
    }

    fn pkg(s: &str) -> AuthorName {
        s.parse().unwrap()
    }

    #[test]
    fn successful_download_makes_cache_package_exists_true() {
        let dir = tempdir().unwrap();
        let cache = Cache::new(dir.path());
        let author_name = pkg("elm/core");
        let version = Version::new(1, 0, 0);
        assert!(!cache.cache_package_exists(&author_name, version));

        cache
            .download(&author_name, version, "https://example.com/core.zip", &FakeDownloader(b"zip-bytes".to_vec()), &FakeExtractor, false)
            .unwrap();

        assert!(cache.cache_package_exists(&author_name, version));
        let manifest = cache.load_mirror_manifest().unwrap();
        assert!(manifest.hash_of(&author_name, version).is_some());
    }

    #[test]
    fn failed_extraction_leaves_no_partial_directory() {
        let dir = tempdir().unwrap();
        let cache = Cache::new(dir.path());
        let author_name = pkg("elm/core");
        let version = Version::new(1, 0, 0);

        let err = cache
            .download(&author_name, version, "https://example.com/core.zip", &FakeDownloader(b"zip-bytes".to_vec()), &FailingExtractor, false)
            .unwrap_err();
        assert!(matches!(err, CacheError::Extraction { .. }));
        assert!(!cache.cache_package_exists(&author_name, version));
        assert!(!cache.package_version_dir(&author_name, version).exists());
    }

    #[test]
    fn hash_mismatch_against_the_mirror_manifest_is_rejected() {
        let dir = tempdir().unwrap();
        let cache = Cache::new(dir.path());
        let author_name = pkg("elm/core");
        let version = Version::new(1, 0, 0);

        let mut manifest = MirrorManifest::new();
        manifest.add(&author_name, version, ArchiveRecord { hash: "0000000000000000000000000000000000000000".to_string(), url: "x".to_string() });
        manifest.write_json(&dir.path().join("mirror-manifest.json")).unwrap();

        let err = cache
            .download(&author_name, version, "https://example.com/core.zip", &FakeDownloader(b"zip-bytes".to_vec()), &FakeExtractor, false)
            .unwrap_err();
        assert!(matches!(err, CacheError::HashMismatch { .. }));
    }

    #[test]
    fn ignore_hash_bypasses_the_mirror_manifest_check() {
        let dir = tempdir().unwrap();
        let cache = Cache::new(dir.path());
        let author_name = pkg("elm/core");
        let version = Version::new(1, 0, 0);

        let mut manifest = MirrorManifest::new();
        manifest.add(&author_name, version, ArchiveRecord { hash: "0000000000000000000000000000000000000000".to_string(), url: "x".to_string() });
        manifest.write_json(&dir.path().join("mirror-manifest.json")).unwrap();

        cache
            .download(&author_name, version, "https://example.com/core.zip", &FakeDownloader(b"zip-bytes".to_vec()), &FakeExtractor, true)
            .unwrap();
        assert!(cache.cache_package_exists(&author_name, version));
    }
}
