// SPDX-License-Identifier: MPL-2.0

//! Package identity: the human-readable `author/name` pair used at the
//! edges (elm.json, the registries, the cache layout) and the dense
//! [`PackageId`] the solver uses internally.
//!
//! Grounded on the teacher's `project_config::Pkg`, which used the
//! `(author, name)` string pair directly as the solver's package type. The
//! spec's data model (§3 "PackageId") asks for a dense interned integer
//! instead, with id `0` reserved for the synthetic root, so we split the
//! teacher's `Pkg` into this human-facing `AuthorName` plus an
//! [`Interner`] producing [`PackageId`]s.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use rustc_hash::FxHashMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Dense, zero-based package identifier. `PackageId(0)` is always the
/// synthetic root package representing the project being solved for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PackageId(pub u32);

impl PackageId {
    pub const ROOT: PackageId = PackageId(0);
}

impl fmt::Display for PackageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A package identifier as it appears in elm.json and the registries:
/// the author name and the package name.
#[derive(Debug, Clone, Ord, PartialOrd, Eq, PartialEq, Hash)]
pub struct AuthorName {
    pub author: String,
    pub name: String,
}

/// Error type for parsing errors of `author/name` package identifiers.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PkgParseError {
    #[error("no author/name separation found in `{0}`")]
    NoAuthorSeparator(String),
}

impl AuthorName {
    pub fn new<S1: ToString, S2: ToString>(author: S1, name: S2) -> Self {
        AuthorName {
            author: author.to_string(),
            name: name.to_string(),
        }
    }

    /// The synthetic root package identity, matching the `PackageId::ROOT`
    /// reservation.
    pub fn root() -> Self {
        AuthorName::new("root", "")
    }

    pub fn is_root(&self) -> bool {
        self.author == "root" && self.name.is_empty()
    }

    /// `ELM_HOME/packages/<author>/<name>`
    ///
    /// The teacher nests this one level deeper, under an `<elm_version>`
    /// directory (`ELM_HOME/<elm_version>/packages/...`), since one
    /// `ELM_HOME` can serve several compiler versions whose package sets
    /// might otherwise collide. This crate follows the layout actually
    /// specified instead — no `elm_version` component — so a stray
    /// compiler-version mismatch is out of scope here; see DESIGN.md.
    pub fn packages_dir<P: AsRef<Path>>(elm_home: P) -> PathBuf {
        elm_home.as_ref().join("packages")
    }

    pub fn cache_dir<P: AsRef<Path>>(&self, elm_home: P) -> PathBuf {
        Self::packages_dir(elm_home).join(&self.author).join(&self.name)
    }

    /// `https://<remote>/packages/<author>/<name>`
    pub fn to_url(&self, remote_base_url: &str) -> String {
        format!("{}/packages/{}/{}", remote_base_url, self.author, self.name)
    }
}

impl fmt::Display for AuthorName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.author, self.name)
    }
}

impl FromStr for AuthorName {
    type Err = PkgParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let sep = s
            .find('/')
            .ok_or_else(|| PkgParseError::NoAuthorSeparator(s.to_string()))?;
        Ok(AuthorName {
            author: s[..sep].to_string(),
            name: s[sep + 1..].to_string(),
        })
    }
}

impl Serialize for AuthorName {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for AuthorName {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Insertion-ordered `(author, name) -> PackageId` dictionary. Id `0` is
/// always the synthetic root package, inserted eagerly by [`Interner::new`].
#[derive(Debug, Clone)]
pub struct Interner {
    by_name: FxHashMap<AuthorName, PackageId>,
    by_id: Vec<AuthorName>,
}

impl Interner {
    pub fn new() -> Self {
        let mut interner = Interner {
            by_name: FxHashMap::default(),
            by_id: Vec::new(),
        };
        let root_id = interner.intern(AuthorName::root());
        debug_assert_eq!(root_id, PackageId::ROOT);
        interner
    }

    /// Get or create the id for `name`.
    pub fn intern(&mut self, name: AuthorName) -> PackageId {
        if let Some(&id) = self.by_name.get(&name) {
            return id;
        }
        let id = PackageId(self.by_id.len() as u32);
        self.by_id.push(name.clone());
        self.by_name.insert(name, id);
        id
    }

    /// Look up the id for a name if it has already been interned.
    pub fn lookup(&self, name: &AuthorName) -> Option<PackageId> {
        self.by_name.get(name).copied()
    }

    /// Reverse lookup: the author/name pair for an id.
    pub fn resolve(&self, id: PackageId) -> &AuthorName {
        &self.by_id[id.0 as usize]
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    /// Every id/name pair interned so far, in assignment order (id 0
    /// first). Used to build a full `PackageId -> "author/name"` table
    /// once a solve is done, e.g. for rendering a failure report.
    pub fn iter(&self) -> impl Iterator<Item = (PackageId, &AuthorName)> {
        self.by_id.iter().enumerate().map(|(i, name)| (PackageId(i as u32), name))
    }
}

impl Default for Interner {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_is_always_id_zero() {
        let interner = Interner::new();
        assert_eq!(interner.resolve(PackageId::ROOT), &AuthorName::root());
    }

    #[test]
    fn interning_is_idempotent() {
        let mut interner = Interner::new();
        let a = interner.intern(AuthorName::new("elm", "core"));
        let b = interner.intern(AuthorName::new("elm", "core"));
        assert_eq!(a, b);
        assert_ne!(a, PackageId::ROOT);
    }

    #[test]
    fn resolve_round_trips_through_intern() {
        let mut interner = Interner::new();
        let name = AuthorName::new("elm", "json");
        let id = interner.intern(name.clone());
        assert_eq!(interner.resolve(id), &name);
        assert_eq!(interner.lookup(&name), Some(id));
    }

    #[test]
    fn parses_author_slash_name() {
        let pkg: AuthorName = "elm/core".parse().unwrap();
        assert_eq!(pkg, AuthorName::new("elm", "core"));
        assert!("elmcore".parse::<AuthorName>().is_err());
    }
}
