//! Layered configuration.
//!
//! Values are resolved in order, later layers winning:
//!
//! 1. Built-in defaults.
//! 2. A config file: either the one passed explicitly, or `stash.toml`,
//!    `stash.yaml`, `stash.yml` or `stash.json` in the platform config
//!    directory (the first that exists).
//! 3. Environment variables prefixed with `STASH_`. Nested keys are separated
//!    by a double underscore, so `STASH_FILESTORE__ENABLED=false` switches the
//!    filestore off.

pub mod error;

use crate::error::{ErrorKind, Result};
use directories::ProjectDirs;
use exn::ResultExt;
use figment::Figment;
use figment::providers::{Env, Format, Json, Serialized, Toml, Yaml};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable prefix.
pub const ENV_PREFIX: &str = "STASH_";
/// Stem of config files looked for in the config directory.
pub const FILE_STEM: &str = "stash";
const EXTENSIONS: [&str; 4] = ["toml", "yaml", "yml", "json"];

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Repository directory holding the filestore index and block store.
    pub repo: PathBuf,
    pub filestore: FilestoreConfig,
    /// Draw progress bars for large payloads. Turning this off hides the bar
    /// but otherwise changes nothing about how output is copied.
    pub progress: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilestoreConfig {
    pub enabled: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            repo: project_dirs().map(|dirs| dirs.data_dir().to_path_buf()).unwrap_or_default(),
            filestore: FilestoreConfig::default(),
            progress: true,
        }
    }
}

impl Default for FilestoreConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("", "", FILE_STEM)
}

impl Config {
    /// Load configuration from every layer.
    ///
    /// An explicitly named `file` must exist. Without one, the config
    /// directory is searched and having no file there is fine.
    pub fn load(file: Option<&Path>) -> Result<Self> {
        let file = match file {
            Some(file) if !file.is_file() => exn::bail!(ErrorKind::NotFound(file.to_path_buf())),
            Some(file) => Some(file.to_path_buf()),
            None => project_dirs().and_then(|dirs| discover(dirs.config_dir())),
        };
        Self::from_figment(Self::figment(file.as_deref())?)
    }

    /// The layered figment, before extraction. Defaults, then `file` (if
    /// any), then the environment.
    pub fn figment(file: Option<&Path>) -> Result<Figment> {
        let mut figment = Figment::from(Serialized::defaults(Config::default()));
        if let Some(file) = file {
            tracing::debug!(path = %file.display(), "Loading config file");
            figment = match file.extension().and_then(|ext| ext.to_str()) {
                Some("toml") => figment.merge(Toml::file_exact(file)),
                Some("yaml" | "yml") => figment.merge(Yaml::file_exact(file)),
                Some("json") => figment.merge(Json::file_exact(file)),
                _ => exn::bail!(ErrorKind::UnsupportedFormat(file.to_path_buf())),
            };
        }
        Ok(figment.merge(Env::prefixed(ENV_PREFIX).split("__")))
    }

    /// Extract and validate.
    pub fn from_figment(figment: Figment) -> Result<Self> {
        let config: Config = figment.extract().or_raise(|| ErrorKind::Invalid)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.repo.as_os_str().is_empty() {
            exn::bail!(ErrorKind::NoRepository);
        }
        if !self.repo.is_absolute() {
            exn::bail!(ErrorKind::RelativeRepository(self.repo.clone()));
        }
        Ok(())
    }
}

/// The first config file found in `dir`.
fn discover(dir: &Path) -> Option<PathBuf> {
    EXTENSIONS
        .iter()
        .map(|ext| dir.join(format!("{FILE_STEM}.{ext}")))
        .find(|candidate| candidate.is_file())
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;
    use rstest::rstest;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert!(config.filestore.enabled);
        assert!(config.progress);
    }

    // Every test that reads the environment runs inside a `Jail`, which
    // serializes them and restores the environment afterwards.
    fn load_jailed(name: &str, contents: &str) -> Result<Config> {
        let mut loaded = None;
        Jail::expect_with(|jail| {
            jail.clear_env();
            jail.create_file(name, contents)?;
            loaded = Some(Config::figment(Some(Path::new(name))).and_then(Config::from_figment));
            Ok(())
        });
        loaded.unwrap()
    }

    #[rstest]
    #[case("stash.toml", "repo = \"/srv/stash\"\nprogress = false\n[filestore]\nenabled = false\n")]
    #[case("stash.yaml", "repo: /srv/stash\nprogress: false\nfilestore:\n  enabled: false\n")]
    #[case("stash.json", r#"{"repo": "/srv/stash", "progress": false, "filestore": {"enabled": false}}"#)]
    fn test_file_formats(#[case] name: &str, #[case] contents: &str) {
        let config = load_jailed(name, contents).unwrap();
        assert_eq!(config.repo, PathBuf::from("/srv/stash"));
        assert!(!config.progress);
        assert!(!config.filestore.enabled);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config = load_jailed("stash.toml", "repo = \"/srv/stash\"\n").unwrap();
        assert!(config.filestore.enabled);
        assert!(config.progress);
    }

    #[test]
    fn test_environment_overrides_file() {
        Jail::expect_with(|jail| {
            jail.clear_env();
            jail.create_file("stash.toml", "repo = \"/srv/stash\"\n[filestore]\nenabled = true\n")?;
            jail.set_env("STASH_FILESTORE__ENABLED", "false");
            jail.set_env("STASH_REPO", "/var/lib/stash");

            let config = Config::load(Some(Path::new("stash.toml"))).unwrap();
            assert_eq!(config.repo, PathBuf::from("/var/lib/stash"));
            assert!(!config.filestore.enabled);
            Ok(())
        });
    }

    #[test]
    fn test_relative_repository_is_rejected() {
        let err = load_jailed("stash.toml", "repo = \"relative/stash\"\n").unwrap_err();
        assert!(matches!(&*err, ErrorKind::RelativeRepository(_)));
    }

    #[test]
    fn test_explicit_file_must_exist() {
        let err = Config::load(Some(Path::new("/definitely/not/here.toml"))).unwrap_err();
        assert!(matches!(&*err, ErrorKind::NotFound(_)));
    }

    #[test]
    fn test_unsupported_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stash.ini");
        std::fs::write(&path, "repo=/srv").unwrap();
        let err = Config::figment(Some(&path)).unwrap_err();
        assert!(matches!(&*err, ErrorKind::UnsupportedFormat(_)));
    }

    #[test]
    fn test_wrong_type_is_invalid() {
        let err = load_jailed("stash.toml", "repo = \"/srv\"\nprogress = \"sometimes\"\n").unwrap_err();
        assert!(matches!(&*err, ErrorKind::Invalid));
    }

    #[test]
    fn test_discover_prefers_toml() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(discover(dir.path()), None);
        std::fs::write(dir.path().join("stash.json"), "{}").unwrap();
        std::fs::write(dir.path().join("stash.toml"), "").unwrap();
        assert_eq!(discover(dir.path()), Some(dir.path().join("stash.toml")));
    }
}
