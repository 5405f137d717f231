// SPDX-License-Identifier: MPL-2.0

//! The package registry: the catalogue of every known `(author, name,
//! version)` triple, kept in one of two on-disk wire formats (spec.md
//! §4.4). [`Registry`] and its mutating operations are shared between
//! both; [`v1`] and [`v2`] only differ in how they read/write bytes.
//!
//! Grounded on the teacher's `pkg_version::Cache` (a `BTreeMap<Pkg,
//! BTreeSet<SemVer>>` persisted as JSON), generalized into the two wire
//! formats the spec actually names and given the explicit mutation
//! contract (§4.4 "Operations"/"Invariants") the teacher's `Cache::update`
//! only implements ad hoc.

pub mod v1;
pub mod v2;

use rustc_hash::FxHashMap;
use thiserror::Error;

use crate::constraint::Constraint;
use crate::pkg::AuthorName;
use crate::version::Version;

/// The publication status of a single package version, as carried by the
/// V2 text registry. V1 has no concept of status; V1-sourced entries
/// always behave as [`Status::Valid`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Valid,
    Deprecated,
    Withdrawn,
}

/// Per-version metadata only the V2 format carries. Absent for
/// V1-sourced registries.
#[derive(Debug, Clone)]
pub struct VersionMetadata {
    pub status: Status,
    pub license: Option<String>,
    pub dependencies: Vec<(AuthorName, Constraint)>,
}

/// Every known version of one `author/name` package, newest first and
/// deduplicated.
#[derive(Debug, Clone)]
pub struct RegistryEntry {
    pub author_name: AuthorName,
    pub versions: Vec<Version>,
}

/// The catalogue of known packages plus the bookkeeping needed to sync it
/// incrementally against a remote server.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    pub entries: Vec<RegistryEntry>,
    pub since_count: u64,
    pub metadata: FxHashMap<(AuthorName, Version), VersionMetadata>,
}

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("malformed registry at {path}: {reason}")]
    Malformed { path: String, reason: String },
    #[error("i/o error reading or writing the registry")]
    Io(#[from] std::io::Error),
    #[error("since_count would overflow")]
    SinceCountOverflow,
    #[error("malformed \"author/name@version\" entry: {0}")]
    BadSinceEntry(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    Inserted,
    AlreadyPresent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoveOutcome {
    Removed,
    NotPresent,
}

impl Registry {
    pub fn new() -> Self {
        Registry::default()
    }

    fn entry_index(&self, author_name: &AuthorName) -> Option<usize> {
        self.entries.iter().position(|e| &e.author_name == author_name)
    }

    pub fn versions_of(&self, author_name: &AuthorName) -> &[Version] {
        self.entry_index(author_name)
            .map(|i| self.entries[i].versions.as_slice())
            .unwrap_or(&[])
    }

    /// Status of a version, defaulting to [`Status::Valid`] when the
    /// registry carries no V2 metadata for it (V1 registries, or any
    /// version the V2 feed never annotated).
    pub fn status_of(&self, author_name: &AuthorName, version: Version) -> Status {
        self.metadata
            .get(&(author_name.clone(), version))
            .map(|m| m.status)
            .unwrap_or(Status::Valid)
    }

    /// Insert `version` into `author_name`'s entry, creating the entry if
    /// absent. Returns [`AddOutcome::AlreadyPresent`] without mutating
    /// anything if the version is already known. `bump_since` controls
    /// whether this counts towards `since_count` (set for versions
    /// learned from a `/since` push, unset for a full reload).
    pub fn add_version(&mut self, author_name: &AuthorName, version: Version, bump_since: bool) -> AddOutcome {
        let idx = match self.entry_index(author_name) {
            Some(i) => i,
            None => {
                self.entries.push(RegistryEntry {
                    author_name: author_name.clone(),
                    versions: Vec::new(),
                });
                self.entries.len() - 1
            }
        };
        let entry = &mut self.entries[idx];
        if entry.versions.contains(&version) {
            return AddOutcome::AlreadyPresent;
        }
        let pos = entry.versions.partition_point(|v| *v > version);
        entry.versions.insert(pos, version);
        if bump_since {
            self.since_count = self.since_count.saturating_add(1);
        }
        AddOutcome::Inserted
    }

    /// Remove `version` from `author_name`'s entry. If it was the last
    /// version present and `drop_empty_entry` is set, the entry itself is
    /// removed too.
    pub fn remove_version(&mut self, author_name: &AuthorName, version: Version, drop_empty_entry: bool) -> RemoveOutcome {
        let idx = match self.entry_index(author_name) {
            Some(i) => i,
            None => return RemoveOutcome::NotPresent,
        };
        let entry = &mut self.entries[idx];
        let before = entry.versions.len();
        entry.versions.retain(|v| *v != version);
        if entry.versions.len() == before {
            return RemoveOutcome::NotPresent;
        }
        self.metadata.remove(&(author_name.clone(), version));
        if entry.versions.is_empty() && drop_empty_entry {
            self.entries.remove(idx);
        }
        RemoveOutcome::Removed
    }

    /// Enforce the total order on entries: lexicographic by
    /// `(author, name)`. Versions within an entry are already kept
    /// newest-first by [`Registry::add_version`].
    pub fn sort_entries(&mut self) {
        self.entries
            .sort_by(|a, b| (&a.author_name.author, &a.author_name.name).cmp(&(&b.author_name.author, &b.author_name.name)));
    }

    /// Apply a `/since` response: a list of `"author/name@version"`
    /// strings, inserted idempotently. `since_count` grows by the length
    /// of the list itself (see spec.md §9 "Open questions": this counts
    /// *received* entries, not newly inserted ones — a deliberate
    /// preservation of the reference server's contract, not a bug).
    pub fn incremental_apply(&mut self, received: &[String]) -> Result<(), RegistryError> {
        let new_since_count = self
            .since_count
            .checked_add(received.len() as u64)
            .ok_or(RegistryError::SinceCountOverflow)?;
        for item in received {
            let at = item.find('@').ok_or_else(|| RegistryError::BadSinceEntry(item.clone()))?;
            let author_name: AuthorName = item[..at]
                .parse()
                .map_err(|_| RegistryError::BadSinceEntry(item.clone()))?;
            let version: Version = item[at + 1..]
                .parse()
                .map_err(|_| RegistryError::BadSinceEntry(item.clone()))?;
            self.add_version(&author_name, version, false);
        }
        self.since_count = new_since_count;
        self.sort_entries();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pkg(s: &str) -> AuthorName {
        s.parse().unwrap()
    }

    #[test]
    fn add_version_is_idempotent_and_keeps_newest_first() {
        let mut reg = Registry::new();
        let p = pkg("elm/core");
        assert_eq!(reg.add_version(&p, Version::new(1, 0, 0), false), AddOutcome::Inserted);
        assert_eq!(reg.add_version(&p, Version::new(2, 0, 0), false), AddOutcome::Inserted);
        assert_eq!(reg.add_version(&p, Version::new(1, 0, 0), false), AddOutcome::AlreadyPresent);
        assert_eq!(reg.versions_of(&p), &[Version::new(2, 0, 0), Version::new(1, 0, 0)]);
    }

    #[test]
    fn remove_version_can_drop_the_whole_entry() {
        let mut reg = Registry::new();
        let p = pkg("elm/core");
        reg.add_version(&p, Version::new(1, 0, 0), false);
        assert_eq!(reg.remove_version(&p, Version::new(1, 0, 0), true), RemoveOutcome::Removed);
        assert_eq!(reg.versions_of(&p), &[] as &[Version]);
        assert!(reg.entry_index(&p).is_none());
    }

    #[test]
    fn incremental_apply_bumps_since_count_by_list_length_not_insert_count() {
        let mut reg = Registry::new();
        reg.incremental_apply(&["elm/core@1.0.0".to_string(), "elm/html@1.0.0".to_string()])
            .unwrap();
        assert_eq!(reg.since_count, 2);
        reg.incremental_apply(&["elm/core@1.0.0".to_string(), "elm/html@1.0.0".to_string()])
            .unwrap();
        assert_eq!(reg.since_count, 4);
        assert_eq!(reg.versions_of(&pkg("elm/core")), &[Version::new(1, 0, 0)]);
    }

    #[test]
    fn since_count_overflow_is_an_error() {
        let mut reg = Registry::new();
        reg.since_count = u64::MAX;
        let err = reg.incremental_apply(&["elm/core@1.0.0".to_string()]).unwrap_err();
        assert!(matches!(err, RegistryError::SinceCountOverflow));
    }
}
