//! Locates the `sip-lint.toml` that applies to a run.
//!
//! `--config` wins outright. Otherwise the working directory and its
//! ancestors are searched for `sip-lint.toml` (then `.sip-lint.toml`), and
//! `$SIP_LINT_CONFIG_DIR/config.toml` or `~/.sip-lint/config.toml` is the
//! last resort before built-in defaults.

use anyhow::{Context, Result};
use sip_lint_core::Config;
use std::path::{Path, PathBuf};

const FILE_NAMES: [&str; 2] = ["sip-lint.toml", ".sip-lint.toml"];

/// Resolved configuration location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    Explicit(PathBuf),
    /// Nearest `sip-lint.toml` at or above the working directory.
    Project(PathBuf),
    Global(PathBuf),
    Default,
}

impl ConfigSource {
    /// Reads the configuration; [`ConfigSource::Default`] yields
    /// [`Config::default`].
    pub fn load(&self) -> Result<Config> {
        let path = match self {
            Self::Explicit(p) | Self::Project(p) => p,
            Self::Global(p) => {
                tracing::info!("Using global config: {}", p.display());
                p
            }
            Self::Default => return Ok(Config::default()),
        };
        Config::from_file(path)
            .with_context(|| format!("Failed to load config: {}", path.display()))
    }
}

/// Resolves the configuration for a run started in `cwd`.
#[must_use]
pub fn resolve(cwd: &Path, explicit: Option<&Path>) -> ConfigSource {
    let global = std::env::var_os("SIP_LINT_CONFIG_DIR")
        .map(PathBuf::from)
        .or_else(|| home::home_dir().map(|h| h.join(".sip-lint")));
    Lookup { global }.resolve(cwd, explicit)
}

struct Lookup {
    global: Option<PathBuf>,
}

impl Lookup {
    fn resolve(&self, cwd: &Path, explicit: Option<&Path>) -> ConfigSource {
        if let Some(p) = explicit {
            return ConfigSource::Explicit(p.to_path_buf());
        }

        let start = cwd.canonicalize().unwrap_or_else(|_| cwd.to_path_buf());
        let nearest = start.ancestors().find_map(|dir| {
            FILE_NAMES
                .iter()
                .map(|name| dir.join(name))
                .find(|p| p.is_file())
        });
        if let Some(found) = nearest {
            tracing::debug!("Found project config: {}", found.display());
            return ConfigSource::Project(found);
        }

        self.global
            .as_ref()
            .map(|dir| dir.join("config.toml"))
            .filter(|p| p.is_file())
            .map_or(ConfigSource::Default, ConfigSource::Global)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn lookup(global: Option<&TempDir>) -> Lookup {
        Lookup {
            global: global.map(|g| g.path().to_path_buf()),
        }
    }

    #[test]
    fn nearest_ancestor_config_wins_over_global() {
        let tmp = TempDir::new().unwrap();
        let global = TempDir::new().unwrap();
        fs::write(global.path().join("config.toml"), "").unwrap();
        fs::write(tmp.path().join(".sip-lint.toml"), "").unwrap();
        let drafts = tmp.path().join("sips").join("drafts");
        fs::create_dir_all(&drafts).unwrap();

        let expected = tmp.path().canonicalize().unwrap().join(".sip-lint.toml");
        assert_eq!(
            lookup(Some(&global)).resolve(&drafts, None),
            ConfigSource::Project(expected)
        );
    }

    #[test]
    fn explicit_path_is_taken_as_given() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("sip-lint.toml"), "").unwrap();
        let explicit = Path::new("/nonexistent/custom.toml");

        assert_eq!(
            lookup(None).resolve(tmp.path(), Some(explicit)),
            ConfigSource::Explicit(explicit.to_path_buf())
        );
    }

    #[test]
    fn global_config_then_defaults() {
        let project = TempDir::new().unwrap();
        let global = TempDir::new().unwrap();
        assert_eq!(
            lookup(Some(&global)).resolve(project.path(), None),
            ConfigSource::Default
        );

        fs::write(global.path().join("config.toml"), "").unwrap();
        assert_eq!(
            lookup(Some(&global)).resolve(project.path(), None),
            ConfigSource::Global(global.path().join("config.toml"))
        );
    }

    #[test]
    fn load_reads_preset_or_reports_missing_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("sip-lint.toml");
        fs::write(&path, "preset = \"minimal\"\n").unwrap();

        let config = ConfigSource::Project(path).load().unwrap();
        assert_eq!(config.preset.as_deref(), Some("minimal"));
        assert!(ConfigSource::Default.load().unwrap().preset.is_none());

        let err = ConfigSource::Explicit(PathBuf::from("/nonexistent/sip-lint.toml"))
            .load()
            .unwrap_err();
        assert!(err.to_string().contains("Failed to load config"));
    }
}
