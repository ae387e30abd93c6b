//! Process-wide settings for the engine itself.
//!
//! Every field has a compiled default and can be overridden through a
//! `STRATAFIG_*` environment variable, or through a TOML settings file loaded
//! with [`Settings::from_file`].

use std::path::Path;
use std::time::Duration;

use confique::Config;

use crate::error::Result;

#[derive(Config, Debug, Clone, PartialEq)]
pub struct Settings {
    /// Format used by file and directory sources that declare none.
    #[config(env = "STRATAFIG_DEFAULT_FILE_FORMAT", default = "yaml")]
    pub default_file_format: String,

    /// Format used by remote sources that declare none.
    #[config(env = "STRATAFIG_DEFAULT_REST_FORMAT", default = "json")]
    pub default_rest_format: String,

    /// Separator between path segments.
    #[config(env = "STRATAFIG_PATH_SEPARATOR", default = ".")]
    pub path_separator: String,

    /// Registration id of the bootstrap file source.
    #[config(env = "STRATAFIG_BOOTSTRAP_ID", default = "_bootstrap")]
    pub bootstrap_id: String,

    /// Location of the bootstrap file.
    #[config(env = "STRATAFIG_BOOTSTRAP_PATH", default = "config/config.yaml")]
    pub bootstrap_path: String,

    /// Format of the bootstrap file.
    #[config(env = "STRATAFIG_BOOTSTRAP_FORMAT", default = "yaml")]
    pub bootstrap_format: String,

    /// Path, inside the aggregated config, of the list of extra sources.
    /// Written with [`path_separator`](Self::path_separator), so changing
    /// the separator means changing this too.
    #[config(env = "STRATAFIG_SOURCE_LIST_PATH", default = "stratafig.sources")]
    pub source_list_path: String,

    /// Poll period for observable sources in milliseconds. `0` disables polling.
    #[config(env = "STRATAFIG_OBSERVE_PERIOD_MS", default = 0)]
    pub observe_period_ms: u64,

    /// Whether building an engine runs the bootstrap loader.
    #[config(env = "STRATAFIG_LOADER_ACTIVE", default = true)]
    pub loader_active: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            default_file_format: "yaml".into(),
            default_rest_format: "json".into(),
            path_separator: ".".into(),
            bootstrap_id: "_bootstrap".into(),
            bootstrap_path: "config/config.yaml".into(),
            bootstrap_format: "yaml".into(),
            source_list_path: "stratafig.sources".into(),
            observe_period_ms: 0,
            loader_active: true,
        }
    }
}

impl Settings {
    /// Environment variables over compiled defaults.
    pub fn from_env() -> Result<Self> {
        Ok(Self::builder().env().load()?)
    }

    /// Environment variables over a TOML settings file over compiled defaults.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self::builder().env().file(path.as_ref()).load()?)
    }

    /// The poll period, or `None` when polling is disabled.
    pub fn observe_period(&self) -> Option<Duration> {
        (self.observe_period_ms > 0).then(|| Duration::from_millis(self.observe_period_ms))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn compiled_defaults_match_default_impl() {
        let loaded = Settings::builder().load().unwrap();
        assert_eq!(loaded, Settings::default());
    }

    #[test]
    fn polling_disabled_by_default() {
        assert_eq!(Settings::default().observe_period(), None);
    }

    #[test]
    fn observe_period_converts_millis() {
        let settings = Settings {
            observe_period_ms: 250,
            ..Settings::default()
        };
        assert_eq!(settings.observe_period(), Some(Duration::from_millis(250)));
    }

    #[test]
    fn file_overrides_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("stratafig.toml");
        fs::write(
            &path,
            "path_separator = \"/\"\nobserve_period_ms = 1000\nloader_active = false\n",
        )
        .unwrap();

        let settings = Settings::builder().file(&path).load().unwrap();
        assert_eq!(settings.path_separator, "/");
        assert_eq!(settings.observe_period_ms, 1000);
        assert!(!settings.loader_active);
        assert_eq!(settings.default_file_format, "yaml");
    }
}
