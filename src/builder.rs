use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::decoder::{DecoderFactory, DecoderStrategy};
use crate::error::Result;
use crate::loader::Loader;
use crate::manager::Manager;
use crate::settings::Settings;
use crate::source::{Fetcher, PartialProvider, SourceContext, SourceFactory, SourceStrategy};
use crate::value::Value;

/// A wired engine: the manager, the factory that builds its sources, and the
/// settings both were built from.
pub struct Stratafig {
    manager: Arc<Manager>,
    sources: Arc<SourceFactory>,
    settings: Settings,
}

impl Stratafig {
    pub fn builder() -> StratafigBuilder {
        StratafigBuilder::new()
    }

    pub fn manager(&self) -> &Arc<Manager> {
        &self.manager
    }

    pub fn sources(&self) -> &Arc<SourceFactory> {
        &self.sources
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Build a source of `kind` from positional arguments and register it.
    pub fn add_source(&self, id: &str, priority: i64, kind: &str, args: &[Value]) -> Result<()> {
        let source = self.sources.create(kind, args)?;
        self.manager.add_source(id, priority, source)
    }

    pub fn close(&self) -> Result<()> {
        self.manager.close()
    }
}

/// Builder for a [`Stratafig`] engine.
///
/// Settings come, in order of preference, from [`settings()`](Self::settings),
/// from [`settings_file()`](Self::settings_file), or from the environment.
/// [`loader()`](Self::loader) and [`observe_period()`](Self::observe_period)
/// override the matching fields afterwards.
///
/// Decoder and source strategies added here are consulted before the
/// built-in ones, so they can shadow a built-in format or kind.
pub struct StratafigBuilder {
    settings: Option<Settings>,
    settings_file: Option<PathBuf>,
    loader: Option<bool>,
    observe_period: Option<Duration>,
    decoders: DecoderFactory,
    sources: SourceFactory,
    fetcher: Option<Arc<dyn Fetcher>>,
    providers: Vec<Arc<dyn PartialProvider>>,
}

impl StratafigBuilder {
    fn new() -> Self {
        Self {
            settings: None,
            settings_file: None,
            loader: None,
            observe_period: None,
            decoders: DecoderFactory::new(),
            sources: SourceFactory::new(),
            fetcher: None,
            providers: Vec::new(),
        }
    }

    /// Use these settings as-is instead of reading the environment.
    pub fn settings(mut self, settings: Settings) -> Self {
        self.settings = Some(settings);
        self
    }

    /// Read settings from a TOML file, under environment overrides.
    pub fn settings_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.settings_file = Some(path.into());
        self
    }

    /// Enable or disable the bootstrap loader.
    pub fn loader(mut self, active: bool) -> Self {
        self.loader = Some(active);
        self
    }

    /// Poll observable sources at this period. A zero period disables polling.
    pub fn observe_period(mut self, period: Duration) -> Self {
        self.observe_period = Some(period);
        self
    }

    pub fn decoder(mut self, strategy: impl DecoderStrategy + 'static) -> Self {
        self.decoders.register(strategy);
        self
    }

    pub fn source_strategy(mut self, strategy: impl SourceStrategy + 'static) -> Self {
        self.sources.register(strategy);
        self
    }

    /// Transport for the `rest` kinds. Defaults to an
    /// [`HttpFetcher`](crate::source::HttpFetcher) when the `http` feature is on.
    pub fn fetcher(mut self, fetcher: Arc<dyn Fetcher>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    /// Export a tree through the `container` kind.
    pub fn provider(mut self, provider: Arc<dyn PartialProvider>) -> Self {
        self.providers.push(provider);
        self
    }

    /// Resolve the effective settings.
    fn effective_settings(&self) -> Result<Settings> {
        let mut settings = match (&self.settings, &self.settings_file) {
            (Some(settings), _) => settings.clone(),
            (None, Some(path)) => Settings::from_file(path)?,
            (None, None) => Settings::from_env()?,
        };
        if let Some(active) = self.loader {
            settings.loader_active = active;
        }
        if let Some(period) = self.observe_period {
            settings.observe_period_ms = period.as_millis() as u64;
        }
        Ok(settings)
    }

    /// Resolve the effective fetcher, if any.
    fn effective_fetcher(&self) -> Result<Option<Arc<dyn Fetcher>>> {
        match &self.fetcher {
            Some(fetcher) => Ok(Some(fetcher.clone())),
            None => default_fetcher(),
        }
    }

    /// Wire everything together, run the loader when active and start the
    /// poller when a period is set.
    pub fn build(self) -> Result<Stratafig> {
        let settings = self.effective_settings()?;
        let fetcher = self.effective_fetcher()?;

        let Self {
            mut decoders,
            mut sources,
            providers,
            ..
        } = self;

        decoders.register_defaults();
        let mut context = SourceContext::new(&settings, Arc::new(decoders));
        context.fetcher = fetcher;
        context.providers = providers;
        sources.register_defaults(Arc::new(context));

        let manager = Arc::new(Manager::with_separator(&settings.path_separator));
        let sources = Arc::new(sources);

        if settings.loader_active {
            Loader::new(manager.clone(), sources.clone(), settings.clone()).load()?;
        }
        if let Some(period) = settings.observe_period() {
            manager.start_polling(period);
        }
        info!(
            sources = manager.source_ids().len(),
            polling = manager.is_polling(),
            "engine ready"
        );

        Ok(Stratafig {
            manager,
            sources,
            settings,
        })
    }
}

#[cfg(feature = "http")]
fn default_fetcher() -> Result<Option<Arc<dyn Fetcher>>> {
    Ok(Some(Arc::new(crate::source::HttpFetcher::new()?)))
}

#[cfg(not(feature = "http"))]
fn default_fetcher() -> Result<Option<Arc<dyn Fetcher>>> {
    Ok(None)
}
