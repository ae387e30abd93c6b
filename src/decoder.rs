//! Byte stream to [`Partial`] decoding.
//!
//! A [`DecoderFactory`] holds an ordered list of [`DecoderStrategy`]s. Asking
//! it for a decoder scans the list in registration order and hands the
//! stream to the first strategy that accepts the format name.

use std::io::Read;

use crate::error::{ConfigError, Result};
use crate::partial::Partial;
use crate::types::Format;

/// A one-shot decoder owning its input stream.
///
/// `close` releases the stream. Closing twice is a no-op. Dropping the
/// decoder closes it as well.
pub trait Decoder: Send {
    fn decode(&mut self) -> Result<Partial>;

    fn close(&mut self);
}

/// Builds decoders for the format names it accepts.
pub trait DecoderStrategy: Send + Sync {
    fn accepts(&self, format: &str) -> bool;

    fn create(&self, reader: Box<dyn Read + Send>) -> Result<Box<dyn Decoder>>;
}

/// Decoder for one of the built-in [`Format`]s.
pub struct StreamDecoder {
    format: Format,
    reader: Option<Box<dyn Read + Send>>,
}

impl StreamDecoder {
    pub fn new(format: Format, reader: Box<dyn Read + Send>) -> Self {
        Self {
            format,
            reader: Some(reader),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.reader.is_none()
    }
}

impl Decoder for StreamDecoder {
    fn decode(&mut self) -> Result<Partial> {
        let reader = self.reader.as_mut().ok_or(ConfigError::DecoderClosed)?;
        let mut bytes = Vec::new();
        reader
            .read_to_end(&mut bytes)
            .map_err(|e| ConfigError::decode(self.format.name(), e))?;
        self.format.parse(&bytes)
    }

    fn close(&mut self) {
        self.reader = None;
    }
}

/// Strategy accepting the names of a single built-in [`Format`].
pub struct FormatStrategy(pub Format);

impl DecoderStrategy for FormatStrategy {
    fn accepts(&self, format: &str) -> bool {
        self.0.matches(format)
    }

    fn create(&self, reader: Box<dyn Read + Send>) -> Result<Box<dyn Decoder>> {
        Ok(Box::new(StreamDecoder::new(self.0, reader)))
    }
}

#[derive(Default)]
pub struct DecoderFactory {
    strategies: Vec<Box<dyn DecoderStrategy>>,
}

impl DecoderFactory {
    /// A factory with no strategies registered.
    pub fn new() -> Self {
        Self::default()
    }

    /// A factory with the YAML, JSON and TOML strategies, in that order.
    pub fn with_defaults() -> Self {
        let mut factory = Self::new();
        factory.register_defaults();
        factory
    }

    /// Append the built-in format strategies after whatever is registered.
    pub fn register_defaults(&mut self) {
        for format in Format::ALL {
            self.register(FormatStrategy(format));
        }
    }

    pub fn register(&mut self, strategy: impl DecoderStrategy + 'static) {
        self.strategies.push(Box::new(strategy));
    }

    pub fn create(&self, format: &str, reader: Box<dyn Read + Send>) -> Result<Box<dyn Decoder>> {
        self.strategies
            .iter()
            .find(|s| s.accepts(format))
            .ok_or_else(|| ConfigError::InvalidDecoderFormat(format.to_string()))?
            .create(reader)
    }

    /// Decode a whole stream and release it, whatever the outcome.
    pub fn decode(&self, format: &str, reader: Box<dyn Read + Send>) -> Result<Partial> {
        let mut decoder = self.create(format, reader)?;
        let result = decoder.decode();
        decoder.close();
        result
    }
}
