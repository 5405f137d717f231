// SPDX-License-Identifier: MPL-2.0

//! Environment-variable configuration (spec.md §6 "Environment"). The
//! teacher's `main.rs` reads `ELM_HOME` inline with a platform-specific
//! fallback; this module generalizes that one variable into the full set
//! the spec names, still following the teacher's "env var, else platform
//! default" pattern via the `dirs` crate.

use std::path::PathBuf;

/// The subset of spec.md §6's environment variables the core itself
/// consumes. `WRAP_ELM_COMPILER_PATH` and the `https_proxy`-forcing
/// behavior belong to the compiler-wrapper collaborator (out of core
/// scope, §1); they are read here only so a driver binary has one place
/// to look them up.
#[derive(Debug, Clone)]
pub struct Config {
    pub elm_home: PathBuf,
    pub wrap_home: PathBuf,
    pub offline: bool,
    pub skip_registry_update: bool,
    pub allow_elm_online: bool,
    pub elm_compiler_path: Option<PathBuf>,
    pub repository_local_path: Option<PathBuf>,
}

impl Config {
    /// Read configuration from the process environment, falling back to
    /// platform-specific defaults the way the teacher's `main.rs` does
    /// for `ELM_HOME`.
    pub fn from_env() -> Self {
        Config {
            elm_home: std::env::var_os("ELM_HOME").map(PathBuf::from).unwrap_or_else(default_elm_home),
            wrap_home: std::env::var_os("WRAP_HOME").map(PathBuf::from).unwrap_or_else(default_wrap_home),
            offline: env_flag("WRAP_OFFLINE_MODE"),
            skip_registry_update: env_flag("WRAP_SKIP_REGISTRY_UPDATE"),
            allow_elm_online: env_flag("WRAP_ALLOW_ELM_ONLINE"),
            elm_compiler_path: std::env::var_os("WRAP_ELM_COMPILER_PATH").map(PathBuf::from),
            repository_local_path: std::env::var_os("WRAP_REPOSITORY_LOCAL_PATH").map(PathBuf::from),
        }
    }
}

fn env_flag(name: &str) -> bool {
    std::env::var_os(name).is_some_and(|v| !v.is_empty() && v != "0")
}

#[cfg(target_family = "unix")]
fn default_elm_home() -> PathBuf {
    dirs::home_dir().expect("unknown home directory").join(".elm")
}

#[cfg(target_family = "windows")]
fn default_elm_home() -> PathBuf {
    dirs::data_dir().expect("unknown data directory").join("elm")
}

fn default_wrap_home() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("elm-wrap")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_flag_treats_zero_and_unset_as_false() {
        std::env::remove_var("ELM_WRAP_TEST_FLAG");
        assert!(!env_flag("ELM_WRAP_TEST_FLAG"));
        std::env::set_var("ELM_WRAP_TEST_FLAG", "0");
        assert!(!env_flag("ELM_WRAP_TEST_FLAG"));
        std::env::set_var("ELM_WRAP_TEST_FLAG", "1");
        assert!(env_flag("ELM_WRAP_TEST_FLAG"));
        std::env::remove_var("ELM_WRAP_TEST_FLAG");
    }
}
