// SPDX-License-Identifier: MPL-2.0

//! Content-addressed dedup index for downloaded package archives
//! (spec.md §3 "Mirror manifest", §4.5). One archive can legitimately
//! back several `(author, name, version)` triples (a republish under a
//! new version number with identical contents, a fork republished under
//! another name); the manifest's job is to let [`crate::cache`] look
//! either direction up: "what hash do I expect for this triple" and
//! "have I already got anything on disk with this hash".
//!
//! Grounded on the teacher's `pkg_version::Cache`, which is the closest
//! thing the teacher has to a persisted JSON index keyed by package
//! identity; generalized to the hash-keyed shape spec.md actually
//! describes. JSON via `serde_json`, same as every other on-disk
//! document in this crate.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::atomic_file::write_atomic;
use crate::pkg::AuthorName;
use crate::version::Version;

/// One archive's provenance: where it was fetched from and the hash
/// used to verify it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ArchiveRecord {
    pub hash: String,
    pub url: String,
}

/// `"author/name" -> { version -> ArchiveRecord }`, serialized as JSON.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MirrorManifest {
    entries: BTreeMap<String, BTreeMap<Version, ArchiveRecord>>,
}

#[derive(Debug, Error)]
pub enum MirrorManifestError {
    #[error("i/o error reading or writing the mirror manifest")]
    Io(#[from] std::io::Error),
    #[error("failed to parse/convert JSON")]
    Json(#[from] serde_json::Error),
}

impl MirrorManifest {
    pub fn new() -> Self {
        MirrorManifest::default()
    }

    pub fn load(path: &Path) -> Result<Self, MirrorManifestError> {
        if !path.exists() {
            return Ok(MirrorManifest::new());
        }
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    pub fn write_json(&self, path: &Path) -> Result<(), MirrorManifestError> {
        let text = serde_json::to_string_pretty(self)?;
        write_atomic(path, text.as_bytes())?;
        Ok(())
    }

    /// Upsert the record for `(author_name, version)`.
    pub fn add(&mut self, author_name: &AuthorName, version: Version, record: ArchiveRecord) {
        self.entries
            .entry(author_name.to_string())
            .or_default()
            .insert(version, record);
    }

    /// The expected hash for a specific package version, if known.
    pub fn hash_of(&self, author_name: &AuthorName, version: Version) -> Option<&str> {
        self.entries
            .get(&author_name.to_string())
            .and_then(|versions| versions.get(&version))
            .map(|record| record.hash.as_str())
    }

    /// Whether any entry in the manifest already references `hash`,
    /// i.e. whether a freshly downloaded archive with this hash is
    /// already accounted for under some other package identity.
    pub fn contains_hash(&self, hash: &str) -> bool {
        self.entries
            .values()
            .any(|versions| versions.values().any(|record| record.hash == hash))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn pkg(s: &str) -> AuthorName {
        s.parse().unwrap()
    }

    #[test]
    fn add_then_lookup_round_trips() {
        let mut manifest = MirrorManifest::new();
        manifest.add(
            &pkg("elm/core"),
            Version::new(1, 0, 0),
            ArchiveRecord {
                hash: "abc123".to_string(),
                url: "https://example.com/core-1.0.0.zip".to_string(),
            },
        );
        assert_eq!(manifest.hash_of(&pkg("elm/core"), Version::new(1, 0, 0)), Some("abc123"));
        assert!(manifest.contains_hash("abc123"));
        assert!(!manifest.contains_hash("does-not-exist"));
    }

    #[test]
    fn write_then_load_round_trips_through_disk() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("mirror.json");
        let mut manifest = MirrorManifest::new();
        manifest.add(
            &pkg("elm/json"),
            Version::new(1, 1, 0),
            ArchiveRecord {
                hash: "deadbeef".to_string(),
                url: "https://example.com/json-1.1.0.zip".to_string(),
            },
        );
        manifest.write_json(&path).unwrap();
        let loaded = MirrorManifest::load(&path).unwrap();
        assert_eq!(loaded.hash_of(&pkg("elm/json"), Version::new(1, 1, 0)), Some("deadbeef"));
    }

    #[test]
    fn loading_a_missing_file_yields_an_empty_manifest() {
        let dir = tempdir().unwrap();
        let loaded = MirrorManifest::load(&dir.path().join("missing.json")).unwrap();
        assert!(loaded.hash_of(&pkg("elm/core"), Version::new(1, 0, 0)).is_none());
    }
}
