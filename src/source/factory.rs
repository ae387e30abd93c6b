//! Strategy-based source construction.
//!
//! Sources can be built in code from positional arguments
//! ([`SourceFactory::create`]) or from a declarative description found in
//! configuration ([`SourceFactory::create_from_config`]):
//!
//! ```yaml
//! - id: overrides
//!   priority: 10
//!   type: observable-file
//!   path: /etc/app/overrides.yaml
//!   format: yaml
//! ```
//!
//! Strategies are checked in registration order; the first one accepting the
//! kind (or the description's `type` field) builds the source.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::decoder::DecoderFactory;
use crate::error::{ConfigError, Result};
use crate::partial::{ConfigRead, DEFAULT_SEPARATOR, Partial};
use crate::settings::Settings;
use crate::value::Value;

use super::container::{ContainerStrategy, PartialProvider};
use super::dir::DirStrategy;
use super::env::EnvStrategy;
use super::file::{FileStrategy, ObservableFileStrategy};
use super::rest::{Fetcher, ObservableRestStrategy, RestStrategy};
use super::Source;

/// Builds sources of the kinds it accepts.
pub trait SourceStrategy: Send + Sync {
    fn accepts(&self, kind: &str) -> bool;

    /// Whether this strategy handles a declarative description, judged by
    /// its `type` field.
    fn accepts_config(&self, config: &Partial) -> bool {
        config.string("type").is_ok_and(|kind| self.accepts(&kind))
    }

    fn create(&self, args: &[Value]) -> Result<Arc<dyn Source>>;

    fn create_from_config(&self, config: &Partial) -> Result<Arc<dyn Source>>;
}

/// Everything the built-in strategies need besides their own arguments.
pub struct SourceContext {
    pub decoders: Arc<DecoderFactory>,
    pub fetcher: Option<Arc<dyn Fetcher>>,
    pub providers: Vec<Arc<dyn PartialProvider>>,
    pub file_format: String,
    pub rest_format: String,
    pub separator: String,
}

impl SourceContext {
    pub fn new(settings: &Settings, decoders: Arc<DecoderFactory>) -> Self {
        Self {
            decoders,
            fetcher: None,
            providers: Vec::new(),
            file_format: settings.default_file_format.clone(),
            rest_format: settings.default_rest_format.clone(),
            separator: settings.path_separator.clone(),
        }
    }

    pub fn with_fetcher(mut self, fetcher: Arc<dyn Fetcher>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    pub fn with_provider(mut self, provider: Arc<dyn PartialProvider>) -> Self {
        self.providers.push(provider);
        self
    }

    pub(crate) fn fetcher(&self) -> Result<&Arc<dyn Fetcher>> {
        self.fetcher
            .as_ref()
            .ok_or(ConfigError::MissingCollaborator("remote fetcher"))
    }
}

#[derive(Default)]
pub struct SourceFactory {
    strategies: Vec<Box<dyn SourceStrategy>>,
}

impl SourceFactory {
    /// A factory with no strategies registered.
    pub fn new() -> Self {
        Self::default()
    }

    /// A factory with every built-in strategy registered.
    pub fn with_defaults(context: Arc<SourceContext>) -> Self {
        let mut factory = Self::new();
        factory.register_defaults(context);
        factory
    }

    /// Append the built-in strategies after whatever is already registered.
    pub fn register_defaults(&mut self, context: Arc<SourceContext>) {
        self.register(FileStrategy::new(context.clone()));
        self.register(ObservableFileStrategy::new(context.clone()));
        self.register(DirStrategy::new(context.clone()));
        self.register(RestStrategy::new(context.clone()));
        self.register(ObservableRestStrategy::new(context.clone()));
        self.register(EnvStrategy::new(context.clone()));
        self.register(ContainerStrategy::new(context));
    }

    pub fn register(&mut self, strategy: impl SourceStrategy + 'static) {
        self.strategies.push(Box::new(strategy));
    }

    pub fn create(&self, kind: &str, args: &[Value]) -> Result<Arc<dyn Source>> {
        self.strategies
            .iter()
            .find(|s| s.accepts(kind))
            .ok_or_else(|| ConfigError::InvalidSourceType(kind.to_string()))?
            .create(args)
    }

    pub fn create_from_config(&self, config: &Partial) -> Result<Arc<dyn Source>> {
        self.strategies
            .iter()
            .find(|s| s.accepts_config(config))
            .ok_or_else(|| {
                ConfigError::InvalidSourcePartial(Value::Partial(config.clone()).to_string())
            })?
            .create_from_config(config)
    }
}

// -- Argument helpers shared by the built-in strategies ----------------------

/// Positional arguments of [`SourceFactory::create`].
pub(crate) struct Args<'a> {
    pub kind: &'static str,
    pub values: &'a [Value],
}

impl<'a> Args<'a> {
    pub fn new(kind: &'static str, values: &'a [Value]) -> Self {
        Self { kind, values }
    }

    fn missing(&self, name: &'static str) -> ConfigError {
        ConfigError::MissingArgument {
            kind: self.kind.to_string(),
            name,
        }
    }

    fn at(&self, index: usize) -> Option<&Value> {
        self.values.get(index).filter(|v| **v != Value::Null)
    }

    pub fn string(&self, index: usize, name: &'static str) -> Result<String> {
        let value = self.at(index).ok_or_else(|| self.missing(name))?;
        crate::partial::to_string(name, value.clone())
    }

    pub fn string_or(&self, index: usize, name: &'static str, default: &str) -> Result<String> {
        match self.at(index) {
            Some(value) => crate::partial::to_string(name, value.clone()),
            None => Ok(default.to_string()),
        }
    }

    pub fn bool_or(&self, index: usize, name: &'static str, default: bool) -> Result<bool> {
        match self.at(index) {
            Some(value) => crate::partial::to_bool(name, value.clone()),
            None => Ok(default),
        }
    }

    pub fn partial(&self, index: usize, name: &'static str) -> Result<Partial> {
        let value = self.at(index).ok_or_else(|| self.missing(name))?;
        crate::partial::to_partial(name, value.clone())
    }
}

/// Field access on a declarative description.
pub(crate) struct Description<'a> {
    pub kind: &'static str,
    pub config: &'a Partial,
}

impl<'a> Description<'a> {
    pub fn new(kind: &'static str, config: &'a Partial) -> Self {
        Self { kind, config }
    }

    fn field(&self, name: &'static str) -> Option<&Value> {
        self.config
            .get_value(name)
            .filter(|v| **v != Value::Null)
    }

    fn missing(&self, name: &'static str) -> ConfigError {
        ConfigError::MissingArgument {
            kind: self.kind.to_string(),
            name,
        }
    }

    pub fn string(&self, name: &'static str) -> Result<String> {
        let value = self.field(name).ok_or_else(|| self.missing(name))?;
        crate::partial::to_string(name, value.clone())
    }

    pub fn string_or(&self, name: &'static str, default: &str) -> Result<String> {
        match self.field(name) {
            Some(value) => crate::partial::to_string(name, value.clone()),
            None => Ok(default.to_string()),
        }
    }

    pub fn bool_or(&self, name: &'static str, default: bool) -> Result<bool> {
        match self.field(name) {
            Some(value) => crate::partial::to_bool(name, value.clone()),
            None => Ok(default),
        }
    }

    pub fn partial(&self, name: &'static str) -> Result<Partial> {
        let value = self.field(name).ok_or_else(|| self.missing(name))?;
        crate::partial::to_partial(name, value.clone())
    }
}

/// Read a `{VAR: path}` tree into a flat mapping. Nested trees are flattened
/// with the default separator, so `{APP: {PORT: server.port}}` maps
/// `APP.PORT`; keep variable names at the top level.
pub(crate) fn mappings(partial: &Partial) -> Result<BTreeMap<String, String>> {
    partial
        .flatten(DEFAULT_SEPARATOR)
        .into_iter()
        .map(|(var, path)| {
            let path = crate::partial::to_string(&var, path)?;
            Ok((var, path))
        })
        .collect()
}
