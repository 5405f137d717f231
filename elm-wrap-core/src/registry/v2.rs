// SPDX-License-Identifier: MPL-2.0

//! The V2 text registry: a line-based format served as a zip-packaged
//! `index.dat` by the newer repository protocol (spec.md §4.4). Unlike
//! V1's packed binary layout this format carries per-version `status`
//! and `license`, and is meant to be read by more than one
//! implementation over time, so readers tolerate attribute reordering
//! within a block and ignore attributes they don't recognize.
//!
//! ```text
//! format 2
//! elm 0.19.1
//!
//! package: author/name
//!     version: 1.0.0
//!     status: valid
//!     license: BSD-3-Clause
//!     dependencies:
//!         author/other  1.0.0 <= v < 2.0.0
//! ```

use std::fmt::Write as _;

use crate::atomic_file::write_atomic;
use crate::constraint::Constraint;
use crate::pkg::AuthorName;
use crate::registry::{Registry, RegistryError, Status, VersionMetadata};
use crate::version::Version;

const HEADER_TAG: &str = "format 2";

/// Parse a V2 text registry. `compiler`/`compiler_version` from the
/// header are returned alongside the registry since callers (the install
/// environment) use them to validate compatibility before accepting a
/// refreshed index.
pub fn parse(text: &str, path_for_errors: &str) -> Result<(Registry, String, String), RegistryError> {
    let malformed = |reason: String| RegistryError::Malformed {
        path: path_for_errors.to_string(),
        reason,
    };

    let mut lines = text.lines();
    let tag = lines.next().ok_or_else(|| malformed("empty file".to_string()))?;
    if tag.trim() != HEADER_TAG {
        return Err(malformed(format!("unexpected header tag `{}`", tag)));
    }
    let compiler_line = lines
        .next()
        .ok_or_else(|| malformed("missing compiler line".to_string()))?;
    let mut compiler_parts = compiler_line.split_whitespace();
    let compiler = compiler_parts
        .next()
        .ok_or_else(|| malformed("missing compiler name".to_string()))?
        .to_string();
    let compiler_version = compiler_parts
        .next()
        .ok_or_else(|| malformed("missing compiler version".to_string()))?
        .to_string();

    let mut registry = Registry::new();
    let mut current: Option<(AuthorName, Option<Version>, Status, Option<String>, Vec<(AuthorName, Constraint)>)> = None;
    let mut in_dependencies = false;

    let flush = |registry: &mut Registry,
                 current: &mut Option<(AuthorName, Option<Version>, Status, Option<String>, Vec<(AuthorName, Constraint)>)>|
     -> Result<(), RegistryError> {
        if let Some((author_name, version, status, license, dependencies)) = current.take() {
            let version = version.ok_or_else(|| {
                RegistryError::Malformed {
                    path: path_for_errors.to_string(),
                    reason: format!("package block for {} has no version", author_name),
                }
            })?;
            registry.add_version(&author_name, version, false);
            registry.metadata.insert(
                (author_name, version),
                VersionMetadata {
                    status,
                    license,
                    dependencies,
                },
            );
        }
        Ok(())
    };

    for raw_line in lines {
        let line = raw_line.trim_end();
        if line.trim().is_empty() {
            flush(&mut registry, &mut current)?;
            in_dependencies = false;
            continue;
        }
        let indent = line.len() - line.trim_start().len();
        let trimmed = line.trim_start();

        if indent == 0 {
            flush(&mut registry, &mut current)?;
            in_dependencies = false;
            let rest = trimmed
                .strip_prefix("package:")
                .ok_or_else(|| malformed(format!("expected a `package:` block start, found `{}`", trimmed)))?;
            let author_name: AuthorName = rest
                .trim()
                .parse()
                .map_err(|_| malformed(format!("invalid package identifier `{}`", rest.trim())))?;
            current = Some((author_name, None, Status::Valid, None, Vec::new()));
            continue;
        }

        let (_, _, status, license, dependencies) = current
            .as_mut()
            .ok_or_else(|| malformed("attribute line outside any package block".to_string()))?;

        if in_dependencies {
            if let Some((name, constraint)) = trimmed.split_once(char::is_whitespace) {
                if let (Ok(author_name), Ok(constraint)) =
                    (name.trim().parse::<AuthorName>(), constraint.trim().parse::<Constraint>())
                {
                    dependencies.push((author_name, constraint));
                    continue;
                }
            }
            // Malformed dependency line: tolerate and skip, per the
            // "ignore unknown attributes" forward-compatibility rule.
            continue;
        }

        if let Some(rest) = trimmed.strip_prefix("version:") {
            let version: Version = rest
                .trim()
                .parse()
                .map_err(|_| malformed(format!("invalid version `{}`", rest.trim())))?;
            current.as_mut().unwrap().1 = Some(version);
        } else if let Some(rest) = trimmed.strip_prefix("status:") {
            *status = match rest.trim() {
                "valid" => Status::Valid,
                "deprecated" => Status::Deprecated,
                "withdrawn" => Status::Withdrawn,
                other => return Err(malformed(format!("unknown status `{}`", other))),
            };
        } else if let Some(rest) = trimmed.strip_prefix("license:") {
            *license = Some(rest.trim().to_string());
        } else if trimmed.starts_with("dependencies:") {
            in_dependencies = true;
        }
        // Any other attribute is unknown and silently ignored, per the
        // format's forward-compatibility contract.
    }
    flush(&mut registry, &mut current)?;
    registry.sort_entries();
    Ok((registry, compiler, compiler_version))
}

/// Render `registry` back to the V2 text format. Attribute ordering
/// within a block is not guaranteed to match whatever produced the
/// registry originally (spec.md §8 "Registry round-trip": only V1 is
/// byte-identical on an unmutated round-trip).
pub fn render(registry: &Registry, compiler: &str, compiler_version: &str) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", HEADER_TAG);
    let _ = writeln!(out, "{} {}", compiler, compiler_version);
    for entry in &registry.entries {
        for version in &entry.versions {
            let _ = writeln!(out);
            let _ = writeln!(out, "package: {}", entry.author_name);
            let _ = writeln!(out, "    version: {}", version);
            let status = registry.status_of(&entry.author_name, *version);
            let status_str = match status {
                Status::Valid => "valid",
                Status::Deprecated => "deprecated",
                Status::Withdrawn => "withdrawn",
            };
            let _ = writeln!(out, "    status: {}", status_str);
            if let Some(meta) = registry.metadata.get(&(entry.author_name.clone(), *version)) {
                if let Some(license) = &meta.license {
                    let _ = writeln!(out, "    license: {}", license);
                }
                if !meta.dependencies.is_empty() {
                    let _ = writeln!(out, "    dependencies:");
                    for (dep, constraint) in &meta.dependencies {
                        let _ = writeln!(out, "        {}  {}", dep, constraint.to_elm_string());
                    }
                }
            }
        }
    }
    out
}

pub fn write(registry: &Registry, path: &std::path::Path, compiler: &str, compiler_version: &str) -> Result<(), RegistryError> {
    let text = render(registry, compiler, compiler_version);
    write_atomic(path, text.as_bytes())?;
    Ok(())
}

pub fn load(path: &std::path::Path) -> Result<(Registry, String, String), RegistryError> {
    let text = std::fs::read_to_string(path)?;
    parse(&text, &path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_minimal_two_package_index() {
        let text = "format 2\nelm 0.19.1\n\npackage: elm/core\n    version: 1.0.0\n    status: valid\n    license: BSD-3-Clause\n    dependencies:\n        elm/json  1.0.0 <= v < 2.0.0\n\npackage: elm/json\n    version: 1.0.0\n    status: deprecated\n";
        let (registry, compiler, version) = parse(text, "test").unwrap();
        assert_eq!(compiler, "elm");
        assert_eq!(version, "0.19.1");
        assert_eq!(registry.versions_of(&"elm/core".parse().unwrap()), &[Version::new(1, 0, 0)]);
        assert_eq!(
            registry.status_of(&"elm/json".parse().unwrap(), Version::new(1, 0, 0)),
            Status::Deprecated
        );
        let meta = registry
            .metadata
            .get(&("elm/core".parse().unwrap(), Version::new(1, 0, 0)))
            .unwrap();
        assert_eq!(meta.dependencies.len(), 1);
    }

    #[test]
    fn tolerates_attribute_reordering_and_unknown_attributes() {
        let text = "format 2\nelm 0.19.1\n\npackage: elm/core\n    status: valid\n    future-attribute: whatever\n    version: 1.0.0\n";
        let (registry, _, _) = parse(text, "test").unwrap();
        assert_eq!(registry.versions_of(&"elm/core".parse().unwrap()), &[Version::new(1, 0, 0)]);
    }

    #[test]
    fn rejects_a_block_missing_its_version() {
        let text = "format 2\nelm 0.19.1\n\npackage: elm/core\n    status: valid\n";
        assert!(parse(text, "test").is_err());
    }

    #[test]
    fn render_then_parse_round_trips_semantically() {
        let mut registry = Registry::new();
        let pkg: AuthorName = "elm/core".parse().unwrap();
        registry.add_version(&pkg, Version::new(1, 0, 0), false);
        registry.metadata.insert(
            (pkg.clone(), Version::new(1, 0, 0)),
            VersionMetadata {
                status: Status::Valid,
                license: Some("BSD-3-Clause".to_string()),
                dependencies: vec![],
            },
        );
        let text = render(&registry, "elm", "0.19.1");
        let (reloaded, _, _) = parse(&text, "test").unwrap();
        assert_eq!(reloaded.versions_of(&pkg), registry.versions_of(&pkg));
    }
}
