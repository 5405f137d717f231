// SPDX-License-Identifier: MPL-2.0

//! The bidirectional tracking directory (spec.md §3 "Tracking
//! directory", §4.7 "Consumer tracking"): `WRAP_HOME/local-dev/<author>/
//! <name>/<version>/<hash_of_app_path>`, one empty-ish file per consumer
//! whose contents are the consumer's own absolute manifest path.
//!
//! Grounded on the teacher's filesystem conventions (`AuthorName::cache_dir`'s
//! `<author>/<name>` nesting), extended one level deeper per package
//! version and widened with a reverse scan the teacher never needed,
//! since the teacher has no local-dev overlay at all.

use std::fs;
use std::path::{Path, PathBuf};

use sha1::{Digest, Sha1};

use crate::pkg::AuthorName;
use crate::version::Version;

fn hash_of_path(path: &Path) -> String {
    let mut hasher = Sha1::new();
    hasher.update(path.to_string_lossy().as_bytes());
    let digest = hasher.finalize();
    digest.iter().map(|b| format!("{:02x}", b)).collect()
}

pub fn package_tracking_dir(tracking_root: &Path, author_name: &AuthorName, version: Version) -> PathBuf {
    tracking_root
        .join("local-dev")
        .join(&author_name.author)
        .join(&author_name.name)
        .join(version.to_string())
}

/// Record `consumer_manifest_path` as a consumer of `(author_name,
/// version)`. Idempotent: writing the same consumer path twice produces
/// the same single file.
pub fn register_consumer(tracking_root: &Path, author_name: &AuthorName, version: Version, consumer_manifest_path: &Path) -> std::io::Result<()> {
    let dir = package_tracking_dir(tracking_root, author_name, version);
    fs::create_dir_all(&dir)?;
    let file = dir.join(hash_of_path(consumer_manifest_path));
    fs::write(file, consumer_manifest_path.to_string_lossy().as_bytes())
}

/// Remove the tracking entry for `consumer_manifest_path` under
/// `(author_name, version)`. A missing entry is not an error.
pub fn unregister_consumer(tracking_root: &Path, author_name: &AuthorName, version: Version, consumer_manifest_path: &Path) -> std::io::Result<()> {
    let file = package_tracking_dir(tracking_root, author_name, version).join(hash_of_path(consumer_manifest_path));
    match fs::remove_file(file) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

/// Remove the whole tracking subtree for `(author_name, version)`, used
/// by unregistration.
pub fn remove_package_tracking(tracking_root: &Path, author_name: &AuthorName, version: Version) -> std::io::Result<()> {
    let dir = package_tracking_dir(tracking_root, author_name, version);
    match fs::remove_dir_all(dir) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

/// Every consumer's absolute manifest path currently tracked under
/// `(author_name, version)`.
pub fn consumers_of(tracking_root: &Path, author_name: &AuthorName, version: Version) -> std::io::Result<Vec<PathBuf>> {
    let dir = package_tracking_dir(tracking_root, author_name, version);
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let mut out = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_type()?.is_file() {
            let contents = fs::read_to_string(entry.path())?;
            out.push(PathBuf::from(contents));
        }
    }
    Ok(out)
}

/// The inverse scan: every `(author, name, version)` that `consumer_manifest_path`
/// is registered as a consumer of. Walks the entire tracking tree since
/// there is no reverse index; local-dev trees are expected to be small.
pub fn packages_tracked_by(tracking_root: &Path, consumer_manifest_path: &Path) -> std::io::Result<Vec<(AuthorName, Version)>> {
    let root = tracking_root.join("local-dev");
    if !root.exists() {
        return Ok(Vec::new());
    }
    let target_hash = hash_of_path(consumer_manifest_path);
    let mut out = Vec::new();
    for author_entry in fs::read_dir(&root)? {
        let author_entry = author_entry?;
        if !author_entry.file_type()?.is_dir() {
            continue;
        }
        let author = author_entry.file_name().to_string_lossy().into_owned();
        for name_entry in fs::read_dir(author_entry.path())? {
            let name_entry = name_entry?;
            if !name_entry.file_type()?.is_dir() {
                continue;
            }
            let name = name_entry.file_name().to_string_lossy().into_owned();
            for version_entry in fs::read_dir(name_entry.path())? {
                let version_entry = version_entry?;
                if !version_entry.file_type()?.is_dir() {
                    continue;
                }
                let version_str = version_entry.file_name().to_string_lossy().into_owned();
                let Ok(version) = version_str.parse::<Version>() else { continue };
                let candidate = version_entry.path().join(&target_hash);
                if candidate.exists() {
                    out.push((AuthorName::new(&author, &name), version));
                }
            }
        }
    }
    Ok(out)
}
