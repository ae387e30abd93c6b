//! Bootstrapping a manager from a single entry file.
//!
//! The loader registers the bootstrap file, then reads the list of extra
//! source descriptions found at [`Settings::source_list_path`] inside the
//! aggregated config and registers each entry:
//!
//! ```yaml
//! stratafig:
//!   sources:
//!     - id: defaults
//!       type: dir
//!       path: config/defaults
//!     - id: env
//!       priority: 20
//!       type: senv
//!       mappings:
//!         APP_PORT: server.port
//! ```
//!
//! A missing list, or a value there that is not a list, means there is
//! nothing more to load. Any bad entry aborts the whole load.

use std::sync::Arc;

use tracing::{debug, info};

use crate::error::{ConfigError, Result};
use crate::manager::Manager;
use crate::partial::ConfigRead;
use crate::settings::Settings;
use crate::source::SourceFactory;
use crate::types::kind;
use crate::value::Value;

pub struct Loader {
    manager: Arc<Manager>,
    sources: Arc<SourceFactory>,
    settings: Settings,
}

impl Loader {
    pub fn new(manager: Arc<Manager>, sources: Arc<SourceFactory>, settings: Settings) -> Self {
        Self {
            manager,
            sources,
            settings,
        }
    }

    pub fn load(&self) -> Result<()> {
        let settings = &self.settings;
        let bootstrap = self.sources.create(
            kind::FILE,
            &[
                Value::from(settings.bootstrap_path.as_str()),
                Value::from(settings.bootstrap_format.as_str()),
            ],
        )?;
        self.manager
            .add_source(&settings.bootstrap_id, 0, bootstrap)?;
        info!(
            id = %settings.bootstrap_id,
            path = %settings.bootstrap_path,
            "bootstrap source loaded"
        );

        let entries = match self.manager.get(&settings.source_list_path) {
            Ok(Value::List(entries)) => entries,
            _ => {
                debug!(
                    path = %settings.source_list_path,
                    separator = %self.manager.separator(),
                    "no source list declared"
                );
                return Ok(());
            }
        };

        for (index, entry) in entries.into_iter().enumerate() {
            let description = match entry {
                Value::Partial(description) => description,
                other => {
                    return Err(ConfigError::InvalidSourcePartial(format!(
                        "{}[{index}]: {other}",
                        settings.source_list_path
                    )));
                }
            };
            let id = description.string("id")?;
            let priority = description.int_or("priority", 0)?;
            let source = self.sources.create_from_config(&description)?;
            self.manager.add_source(&id, priority, source)?;
        }
        info!(count = self.manager.source_ids().len(), "sources loaded");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::DecoderFactory;
    use crate::source::SourceContext;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    fn loader(dir: &Path, bootstrap: &str) -> (Arc<Manager>, Loader) {
        let path = dir.join("config.yaml");
        fs::write(&path, bootstrap).unwrap();
        let settings = Settings {
            bootstrap_path: path.to_string_lossy().into_owned(),
            ..Settings::default()
        };
        let context = SourceContext::new(&settings, Arc::new(DecoderFactory::with_defaults()));
        let factory = Arc::new(SourceFactory::with_defaults(Arc::new(context)));
        let manager = Arc::new(Manager::new());
        let loader = Loader::new(manager.clone(), factory, settings);
        (manager, loader)
    }

    #[test]
    fn bootstrap_without_list_loads_only_bootstrap() {
        let dir = TempDir::new().unwrap();
        let (manager, loader) = loader(dir.path(), "app:\n  name: demo\n");
        loader.load().unwrap();
        assert_eq!(manager.source_ids(), vec!["_bootstrap"]);
        assert_eq!(manager.string("app.name").unwrap(), "demo");
    }

    #[test]
    fn non_list_value_is_ignored() {
        let dir = TempDir::new().unwrap();
        let (manager, loader) = loader(dir.path(), "stratafig:\n  sources: nope\n");
        loader.load().unwrap();
        assert_eq!(manager.source_ids().len(), 1);
    }

    #[test]
    fn declared_sources_are_registered_by_priority() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("low.yaml"), "level: low\nonly_low: 1\n").unwrap();
        fs::write(dir.path().join("high.json"), r#"{"level": "high"}"#).unwrap();
        let bootstrap = [
            "level: bootstrap".to_string(),
            "stratafig:".to_string(),
            "  sources:".to_string(),
            "    - id: high".to_string(),
            "      priority: 20".to_string(),
            "      type: file".to_string(),
            "      format: json".to_string(),
            format!("      path: {}", dir.path().join("high.json").display()),
            "    - id: low".to_string(),
            "      priority: 10".to_string(),
            "      type: file".to_string(),
            format!("      path: {}", dir.path().join("low.yaml").display()),
        ]
        .join("\n");
        let (manager, loader) = loader(dir.path(), &bootstrap);
        loader.load().unwrap();

        assert_eq!(manager.source_ids(), vec!["_bootstrap", "low", "high"]);
        assert_eq!(manager.string("level").unwrap(), "high");
        assert_eq!(manager.int("only_low").unwrap(), 1);
    }

    #[test]
    fn missing_bootstrap_file_fails() {
        let dir = TempDir::new().unwrap();
        let settings = Settings {
            bootstrap_path: dir.path().join("absent.yaml").to_string_lossy().into_owned(),
            ..Settings::default()
        };
        let context = SourceContext::new(&settings, Arc::new(DecoderFactory::with_defaults()));
        let factory = Arc::new(SourceFactory::with_defaults(Arc::new(context)));
        let manager = Arc::new(Manager::new());
        let err = Loader::new(manager.clone(), factory, settings)
            .load()
            .unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
        assert!(manager.source_ids().is_empty());
    }

    #[test]
    fn entry_without_id_aborts() {
        let dir = TempDir::new().unwrap();
        let (_, loader) = loader(
            dir.path(),
            "stratafig:\n  sources:\n    - type: container\n",
        );
        assert!(matches!(
            loader.load(),
            Err(ConfigError::PathNotFound(_))
        ));
    }

    #[test]
    fn duplicate_ids_abort() {
        let dir = TempDir::new().unwrap();
        let (manager, loader) = loader(
            dir.path(),
            "stratafig:\n  sources:\n    - id: c\n      type: container\n    - id: c\n      type: container\n",
        );
        assert!(matches!(
            loader.load(),
            Err(ConfigError::DuplicateSource(ref id)) if id == "c"
        ));
        assert!(manager.has_source("c"));
    }

    #[test]
    fn unknown_type_aborts() {
        let dir = TempDir::new().unwrap();
        let (_, loader) = loader(
            dir.path(),
            "stratafig:\n  sources:\n    - id: x\n      type: ldap\n",
        );
        assert!(matches!(
            loader.load(),
            Err(ConfigError::InvalidSourcePartial(_))
        ));
    }

    #[test]
    fn priority_defaults_to_zero() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("plain.yaml"), "level: plain\n").unwrap();
        fs::write(dir.path().join("low.yaml"), "level: low\nonly_low: 1\n").unwrap();
        let bootstrap = [
            "level: bootstrap".to_string(),
            "stratafig:".to_string(),
            "  sources:".to_string(),
            "    - id: plain".to_string(),
            "      type: file".to_string(),
            format!("      path: {}", dir.path().join("plain.yaml").display()),
            "    - id: low".to_string(),
            "      priority: -1".to_string(),
            "      type: file".to_string(),
            format!("      path: {}", dir.path().join("low.yaml").display()),
        ]
        .join("\n");
        let (manager, loader) = loader(dir.path(), &bootstrap);
        loader.load().unwrap();

        assert_eq!(manager.source_ids(), vec!["low", "_bootstrap", "plain"]);
        assert_eq!(manager.string("level").unwrap(), "plain");
        assert_eq!(manager.int("only_low").unwrap(), 1);
    }

    #[test]
    fn source_list_path_follows_separator() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.yaml");
        fs::write(
            &path,
            "stratafig:\n  sources:\n    - id: app\n      type: container\n",
        )
        .unwrap();
        let settings = Settings {
            bootstrap_path: path.to_string_lossy().into_owned(),
            path_separator: "/".into(),
            source_list_path: "stratafig/sources".into(),
            ..Settings::default()
        };
        let context = SourceContext::new(&settings, Arc::new(DecoderFactory::with_defaults()));
        let factory = Arc::new(SourceFactory::with_defaults(Arc::new(context)));
        let manager = Arc::new(Manager::with_separator("/"));
        Loader::new(manager.clone(), factory, settings)
            .load()
            .unwrap();
        assert_eq!(manager.source_ids(), vec!["_bootstrap", "app"]);
    }

    #[test]
    fn scalar_entry_aborts() {
        let dir = TempDir::new().unwrap();
        let (_, loader) = loader(dir.path(), "stratafig:\n  sources:\n    - just-a-string\n");
        assert!(matches!(
            loader.load(),
            Err(ConfigError::InvalidSourcePartial(ref d)) if d.contains("just-a-string")
        ));
    }
}
