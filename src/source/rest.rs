//! Remote sources.
//!
//! A [`RestSource`] GETs a URI, decodes the body and keeps only the sub-tree
//! at its configured path; the response may wrap the configuration in an
//! envelope, e.g. `{"status": "ok", "data": {"config": {...}}}` with the
//! path `data.config`. The path must resolve to a tree, otherwise loading
//! fails with [`ConfigError::RemotePathNotFound`].
//!
//! An [`ObservableRestSource`] additionally reads an RFC3339 timestamp from
//! the response and only replaces its tree when that timestamp is strictly
//! later than the last one seen. The first reload compares against the Unix
//! epoch.

use std::io::Read;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tracing::debug;

use crate::decoder::DecoderFactory;
use crate::error::{ConfigError, Result};
use crate::partial::{self, Partial};
use crate::types::kind;
use crate::value::Value;

use super::factory::{Args, Description, SourceContext, SourceStrategy};
use super::{ObservableSource, Source, SourceTree};

/// Performs a GET and hands back the response body.
pub trait Fetcher: Send + Sync {
    fn fetch(&self, uri: &str) -> Result<Box<dyn Read + Send>>;
}

/// [`Fetcher`] backed by a blocking `reqwest` client. Non-2xx responses are
/// errors.
#[cfg(feature = "http")]
pub struct HttpFetcher {
    client: reqwest::blocking::Client,
}

#[cfg(feature = "http")]
impl HttpFetcher {
    pub fn new() -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .build()
            .map_err(|e| ConfigError::Http {
                uri: String::new(),
                reason: e.to_string(),
            })?;
        Ok(Self { client })
    }

    pub fn with_client(client: reqwest::blocking::Client) -> Self {
        Self { client }
    }
}

#[cfg(feature = "http")]
impl Fetcher for HttpFetcher {
    fn fetch(&self, uri: &str) -> Result<Box<dyn Read + Send>> {
        let http_error = |e: reqwest::Error| ConfigError::Http {
            uri: uri.to_string(),
            reason: e.to_string(),
        };
        let response = self
            .client
            .get(uri)
            .send()
            .map_err(http_error)?
            .error_for_status()
            .map_err(http_error)?;
        Ok(Box::new(response))
    }
}

fn request(
    fetcher: &dyn Fetcher,
    decoders: &DecoderFactory,
    uri: &str,
    format: &str,
) -> Result<Partial> {
    let body = fetcher.fetch(uri)?;
    let partial = decoders.decode(format, body)?;
    debug!(uri, format, "decoded remote response");
    Ok(partial)
}

fn extract(response: &Partial, config_path: &str, separator: &str) -> Result<Partial> {
    match response.resolve(config_path, separator) {
        Ok(value) => match value.into_owned() {
            Value::Partial(p) => Ok(p),
            _ => Err(ConfigError::RemotePathNotFound(config_path.to_string())),
        },
        Err(_) => Err(ConfigError::RemotePathNotFound(config_path.to_string())),
    }
}

fn timestamp(response: &Partial, path: &str, separator: &str) -> Result<DateTime<Utc>> {
    let value = response
        .resolve(path, separator)
        .map_err(|_| ConfigError::RemotePathNotFound(path.to_string()))?
        .into_owned();
    let raw = partial::to_string(path, value)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| ConfigError::InvalidTimestamp {
            value: raw.clone(),
            reason: e.to_string(),
        })
}

pub struct RestSource {
    uri: String,
    tree: SourceTree,
}

impl RestSource {
    pub fn new(
        fetcher: &dyn Fetcher,
        decoders: &DecoderFactory,
        uri: &str,
        format: &str,
        config_path: &str,
        separator: &str,
    ) -> Result<Self> {
        let response = request(fetcher, decoders, uri, format)?;
        let partial = extract(&response, config_path, separator)?;
        Ok(Self {
            uri: uri.to_string(),
            tree: SourceTree::new(partial, separator),
        })
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }
}

impl Source for RestSource {
    fn tree(&self) -> &SourceTree {
        &self.tree
    }
}

pub struct ObservableRestSource {
    fetcher: Arc<dyn Fetcher>,
    decoders: Arc<DecoderFactory>,
    uri: String,
    format: String,
    config_path: String,
    timestamp_path: String,
    last_timestamp: Mutex<DateTime<Utc>>,
    tree: SourceTree,
}

impl ObservableRestSource {
    pub fn new(
        fetcher: Arc<dyn Fetcher>,
        decoders: Arc<DecoderFactory>,
        uri: &str,
        format: &str,
        config_path: &str,
        timestamp_path: &str,
        separator: &str,
    ) -> Result<Self> {
        let source = Self {
            fetcher,
            decoders,
            uri: uri.to_string(),
            format: format.to_string(),
            config_path: config_path.to_string(),
            timestamp_path: timestamp_path.to_string(),
            last_timestamp: Mutex::new(DateTime::<Utc>::UNIX_EPOCH),
            tree: SourceTree::new(Partial::new(), separator),
        };
        source.reload()?;
        Ok(source)
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// Timestamp of the content currently held.
    pub fn last_timestamp(&self) -> DateTime<Utc> {
        *self.last_timestamp.lock()
    }
}

impl Source for ObservableRestSource {
    fn tree(&self) -> &SourceTree {
        &self.tree
    }

    fn as_observable(&self) -> Option<&dyn ObservableSource> {
        Some(self)
    }
}

impl ObservableSource for ObservableRestSource {
    fn reload(&self) -> Result<bool> {
        let mut last = self.last_timestamp.lock();
        let separator = self.tree.separator();
        let response = request(
            self.fetcher.as_ref(),
            &self.decoders,
            &self.uri,
            &self.format,
        )?;

        let stamp = timestamp(&response, &self.timestamp_path, separator)?;
        if stamp <= *last {
            return Ok(false);
        }

        let partial = extract(&response, &self.config_path, separator)?;
        self.tree.replace(partial);
        *last = stamp;
        Ok(true)
    }
}

// -- Strategies --------------------------------------------------------------

/// `rest`: positional `[uri, configPath, format?]`; description fields
/// `uri`, `configPath`, `format`.
pub struct RestStrategy {
    context: Arc<SourceContext>,
}

impl RestStrategy {
    pub fn new(context: Arc<SourceContext>) -> Self {
        Self { context }
    }

    fn build(&self, uri: String, config_path: String, format: String) -> Result<Arc<dyn Source>> {
        let fetcher = self.context.fetcher()?;
        let source = RestSource::new(
            fetcher.as_ref(),
            &self.context.decoders,
            &uri,
            &format,
            &config_path,
            &self.context.separator,
        )?;
        Ok(Arc::new(source))
    }
}

impl SourceStrategy for RestStrategy {
    fn accepts(&self, name: &str) -> bool {
        name == kind::REST
    }

    fn create(&self, args: &[Value]) -> Result<Arc<dyn Source>> {
        let args = Args::new(kind::REST, args);
        self.build(
            args.string(0, "uri")?,
            args.string(1, "configPath")?,
            args.string_or(2, "format", &self.context.rest_format)?,
        )
    }

    fn create_from_config(&self, config: &Partial) -> Result<Arc<dyn Source>> {
        let desc = Description::new(kind::REST, config);
        self.build(
            desc.string("uri")?,
            desc.string("configPath")?,
            desc.string_or("format", &self.context.rest_format)?,
        )
    }
}

/// `observable-rest`: positional `[uri, configPath, timestampPath, format?]`;
/// description fields `uri`, `configPath`, `timestampPath`, `format`.
pub struct ObservableRestStrategy {
    context: Arc<SourceContext>,
}

impl ObservableRestStrategy {
    pub fn new(context: Arc<SourceContext>) -> Self {
        Self { context }
    }

    fn build(
        &self,
        uri: String,
        config_path: String,
        timestamp_path: String,
        format: String,
    ) -> Result<Arc<dyn Source>> {
        let fetcher = self.context.fetcher()?.clone();
        let source = ObservableRestSource::new(
            fetcher,
            self.context.decoders.clone(),
            &uri,
            &format,
            &config_path,
            &timestamp_path,
            &self.context.separator,
        )?;
        Ok(Arc::new(source))
    }
}

impl SourceStrategy for ObservableRestStrategy {
    fn accepts(&self, name: &str) -> bool {
        name == kind::OBSERVABLE_REST
    }

    fn create(&self, args: &[Value]) -> Result<Arc<dyn Source>> {
        let args = Args::new(kind::OBSERVABLE_REST, args);
        self.build(
            args.string(0, "uri")?,
            args.string(1, "configPath")?,
            args.string(2, "timestampPath")?,
            args.string_or(3, "format", &self.context.rest_format)?,
        )
    }

    fn create_from_config(&self, config: &Partial) -> Result<Arc<dyn Source>> {
        let desc = Description::new(kind::OBSERVABLE_REST, config);
        self.build(
            desc.string("uri")?,
            desc.string("configPath")?,
            desc.string("timestampPath")?,
            desc.string_or("format", &self.context.rest_format)?,
        )
    }
}
