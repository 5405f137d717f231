// SPDX-License-Identifier: MPL-2.0

//! Write-temp-then-rename helper shared by every on-disk store in this
//! crate (registry, cache, mirror manifest, local-dev tracking). Spec.md
//! §5 is explicit that atomic rename is the *only* mutation-safety
//! mechanism needed here — no separate lock file, since the core assumes
//! one process per `ELM_HOME` at a time.

use std::fs;
use std::io;
use std::path::Path;

/// Write `contents` to `path` by first writing to a sibling temp file in
/// the same directory (so the final rename is same-filesystem and
/// therefore atomic), then renaming it into place. Readers of `path`
/// never observe a partially-written file.
pub fn write_atomic(path: &Path, contents: &[u8]) -> io::Result<()> {
    let dir = path.parent().ok_or_else(|| {
        io::Error::new(io::ErrorKind::InvalidInput, "path has no parent directory")
    })?;
    fs::create_dir_all(dir)?;
    let tmp_path = dir.join(format!(
        ".{}.tmp",
        path.file_name().and_then(|n| n.to_str()).unwrap_or("atomic")
    ));
    fs::write(&tmp_path, contents)?;
    fs::rename(&tmp_path, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn writes_and_replaces_the_target_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("sub").join("file.txt");
        write_atomic(&path, b"first").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "first");
        write_atomic(&path, b"second").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "second");
        assert!(!dir.path().join("sub").join(".file.txt.tmp").exists());
    }
}
