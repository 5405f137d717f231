// SPDX-License-Identifier: MPL-2.0

//! The V1 binary registry: a length-prefixed sequence of entries in
//! `registry.dat`, with `since_count` and the last-seen ETag kept in
//! sibling sidecar files (`.since`, `.etag`) so they can be rewritten
//! independently of the (much larger) catalogue itself.

use std::fs;
use std::path::Path;

use crate::atomic_file::write_atomic;
use crate::pkg::AuthorName;
use crate::registry::{Registry, RegistryError};
use crate::version::Version;

const FORMAT_VERSION: u8 = 1;

fn sidecar(path: &Path, extension: &str) -> std::path::PathBuf {
    let mut s = path.as_os_str().to_owned();
    s.push(".");
    s.push(extension);
    std::path::PathBuf::from(s)
}

/// Load a V1 registry from `path`. A missing file is not an error at this
/// layer — callers distinguish "absent" via [`std::path::Path::exists`]
/// before calling, matching spec.md §4.6's init sequence.
pub fn load(path: &Path) -> Result<Registry, RegistryError> {
    let bytes = fs::read(path)?;
    let mut registry = decode_bytes(&bytes, &path.display().to_string())?;
    registry.since_count = fs::read_to_string(sidecar(path, "since"))
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(0);
    Ok(registry)
}

/// Decode a freshly-fetched V1 registry body (e.g. straight off the
/// network, with no sidecar files to consult yet). `since_count` starts
/// at zero, matching a brand new `/since` bookkeeping baseline.
pub fn decode_bytes(bytes: &[u8], path_for_errors: &str) -> Result<Registry, RegistryError> {
    decode(bytes).map_err(|reason| RegistryError::Malformed {
        path: path_for_errors.to_string(),
        reason,
    })
}

/// Atomically write `registry` to `path` (and its `.since` sidecar). The
/// `.etag` sidecar is managed separately by
/// [`crate::install_env`] since it tracks the HTTP response, not the
/// registry contents.
pub fn write(registry: &Registry, path: &Path) -> Result<(), RegistryError> {
    let bytes = encode(registry);
    write_atomic(path, &bytes)?;
    write_atomic(sidecar(path, "since").as_path(), registry.since_count.to_string().as_bytes())?;
    Ok(())
}

pub fn read_etag(path: &Path) -> Option<String> {
    fs::read_to_string(sidecar(path, "etag")).ok().map(|s| s.trim().to_string())
}

pub fn write_etag(path: &Path, etag: &str) -> std::io::Result<()> {
    write_atomic(sidecar(path, "etag").as_path(), etag.as_bytes())
}

fn encode(registry: &Registry) -> Vec<u8> {
    let mut out = Vec::new();
    out.push(FORMAT_VERSION);
    out.extend_from_slice(&(registry.entries.len() as u32).to_be_bytes());
    for entry in &registry.entries {
        let author = entry.author_name.author.as_bytes();
        let name = entry.author_name.name.as_bytes();
        out.push(author.len() as u8);
        out.extend_from_slice(author);
        out.push(name.len() as u8);
        out.extend_from_slice(name);
        out.extend_from_slice(&(entry.versions.len() as u16).to_be_bytes());
        for v in &entry.versions {
            out.extend_from_slice(&(v.major as u16).to_be_bytes());
            out.extend_from_slice(&(v.minor as u16).to_be_bytes());
            out.extend_from_slice(&(v.patch as u16).to_be_bytes());
        }
    }
    out
}

fn decode(bytes: &[u8]) -> Result<Registry, String> {
    let mut cursor = 0usize;
    let mut take = |n: usize| -> Result<&[u8], String> {
        if cursor + n > bytes.len() {
            return Err("unexpected end of file".to_string());
        }
        let slice = &bytes[cursor..cursor + n];
        cursor += n;
        Ok(slice)
    };

    let format_version = *take(1)?.first().unwrap();
    if format_version != FORMAT_VERSION {
        return Err(format!("unsupported format version {}", format_version));
    }
    let entry_count = u32::from_be_bytes(take(4)?.try_into().unwrap()) as usize;

    let mut registry = Registry::new();
    for _ in 0..entry_count {
        let author_len = *take(1)?.first().unwrap() as usize;
        let author = String::from_utf8(take(author_len)?.to_vec()).map_err(|e| e.to_string())?;
        let name_len = *take(1)?.first().unwrap() as usize;
        let name = String::from_utf8(take(name_len)?.to_vec()).map_err(|e| e.to_string())?;
        let author_name = AuthorName::new(author, name);

        let version_count = u16::from_be_bytes(take(2)?.try_into().unwrap()) as usize;
        for _ in 0..version_count {
            let major = u16::from_be_bytes(take(2)?.try_into().unwrap()) as u32;
            let minor = u16::from_be_bytes(take(2)?.try_into().unwrap()) as u32;
            let patch = u16::from_be_bytes(take(2)?.try_into().unwrap()) as u32;
            registry.add_version(&author_name, Version::new(major, minor, patch), false);
        }
    }
    registry.sort_entries();
    Ok(registry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn writing_then_loading_round_trips_byte_identically_when_unmutated() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("registry.dat");

        let mut registry = Registry::new();
        let pkg: AuthorName = "elm/core".parse().unwrap();
        registry.add_version(&pkg, Version::new(1, 0, 0), false);
        registry.add_version(&pkg, Version::new(2, 0, 0), false);
        registry.since_count = 7;
        registry.sort_entries();

        write(&registry, &path).unwrap();
        let bytes_first = fs::read(&path).unwrap();
        let loaded = load(&path).unwrap();
        write(&loaded, &path).unwrap();
        let bytes_second = fs::read(&path).unwrap();

        assert_eq!(bytes_first, bytes_second);
        assert_eq!(loaded.since_count, 7);
        assert_eq!(loaded.versions_of(&pkg), &[Version::new(2, 0, 0), Version::new(1, 0, 0)]);
    }

    #[test]
    fn rejects_a_bad_format_tag_without_partial_mutation() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("registry.dat");
        fs::write(&path, [99u8, 0, 0, 0, 0]).unwrap();
        assert!(load(&path).is_err());
    }

    #[test]
    fn etag_sidecar_round_trips() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("registry.dat");
        write_etag(&path, "\"abc123\"").unwrap();
        assert_eq!(read_etag(&path).as_deref(), Some("\"abc123\""));
    }
}
