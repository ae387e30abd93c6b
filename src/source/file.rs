//! Single-file sources.
//!
//! [`FileSource`] decodes its file once, at construction.
//! [`ObservableFileSource`] records the file's modification time and only
//! decodes again once that time has strictly advanced. The recorded time
//! starts at the Unix epoch, so the first check always loads.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use parking_lot::Mutex;
use tracing::debug;

use crate::decoder::DecoderFactory;
use crate::error::{ConfigError, Result};
use crate::partial::Partial;
use crate::types::kind;
use crate::value::Value;

use super::factory::{Args, Description, SourceContext, SourceStrategy};
use super::{ObservableSource, Source, SourceTree};

/// Open `path` and decode it completely with the decoder for `format`.
pub(crate) fn load_file(path: &Path, format: &str, decoders: &DecoderFactory) -> Result<Partial> {
    let file = File::open(path).map_err(|e| ConfigError::io(path, e))?;
    let partial = decoders.decode(format, Box::new(file))?;
    debug!(path = %path.display(), format, "decoded file");
    Ok(partial)
}

fn modified(path: &Path) -> Result<SystemTime> {
    std::fs::metadata(path)
        .and_then(|meta| meta.modified())
        .map_err(|e| ConfigError::io(path, e))
}

pub struct FileSource {
    path: PathBuf,
    tree: SourceTree,
}

impl FileSource {
    pub fn new(
        path: impl Into<PathBuf>,
        format: &str,
        decoders: &DecoderFactory,
        separator: &str,
    ) -> Result<Self> {
        let path = path.into();
        let partial = load_file(&path, format, decoders)?;
        Ok(Self {
            tree: SourceTree::new(partial, separator),
            path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Source for FileSource {
    fn tree(&self) -> &SourceTree {
        &self.tree
    }
}

pub struct ObservableFileSource {
    path: PathBuf,
    format: String,
    decoders: Arc<DecoderFactory>,
    last_modified: Mutex<SystemTime>,
    tree: SourceTree,
}

impl ObservableFileSource {
    pub fn new(
        path: impl Into<PathBuf>,
        format: &str,
        decoders: Arc<DecoderFactory>,
        separator: &str,
    ) -> Result<Self> {
        let source = Self {
            path: path.into(),
            format: format.to_string(),
            decoders,
            last_modified: Mutex::new(SystemTime::UNIX_EPOCH),
            tree: SourceTree::new(Partial::new(), separator),
        };
        source.reload()?;
        Ok(source)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Source for ObservableFileSource {
    fn tree(&self) -> &SourceTree {
        &self.tree
    }

    fn as_observable(&self) -> Option<&dyn ObservableSource> {
        Some(self)
    }
}

impl ObservableSource for ObservableFileSource {
    fn reload(&self) -> Result<bool> {
        let mut last = self.last_modified.lock();
        let current = modified(&self.path)?;
        if current <= *last {
            return Ok(false);
        }

        let partial = load_file(&self.path, &self.format, &self.decoders)?;
        self.tree.replace(partial);
        *last = current;
        Ok(true)
    }
}

// -- Strategies --------------------------------------------------------------

/// `file`: positional `[path, format?]`; description fields `path`, `format`.
pub struct FileStrategy {
    context: Arc<SourceContext>,
}

impl FileStrategy {
    pub fn new(context: Arc<SourceContext>) -> Self {
        Self { context }
    }

    fn build(&self, path: String, format: String) -> Result<Arc<dyn Source>> {
        let source = FileSource::new(
            path,
            &format,
            &self.context.decoders,
            &self.context.separator,
        )?;
        Ok(Arc::new(source))
    }
}

impl SourceStrategy for FileStrategy {
    fn accepts(&self, name: &str) -> bool {
        name == kind::FILE
    }

    fn create(&self, args: &[Value]) -> Result<Arc<dyn Source>> {
        let args = Args::new(kind::FILE, args);
        self.build(
            args.string(0, "path")?,
            args.string_or(1, "format", &self.context.file_format)?,
        )
    }

    fn create_from_config(&self, config: &Partial) -> Result<Arc<dyn Source>> {
        let desc = Description::new(kind::FILE, config);
        self.build(
            desc.string("path")?,
            desc.string_or("format", &self.context.file_format)?,
        )
    }
}

/// `observable-file`: same arguments as `file`.
pub struct ObservableFileStrategy {
    context: Arc<SourceContext>,
}

impl ObservableFileStrategy {
    pub fn new(context: Arc<SourceContext>) -> Self {
        Self { context }
    }

    fn build(&self, path: String, format: String) -> Result<Arc<dyn Source>> {
        let source = ObservableFileSource::new(
            path,
            &format,
            self.context.decoders.clone(),
            &self.context.separator,
        )?;
        Ok(Arc::new(source))
    }
}

impl SourceStrategy for ObservableFileStrategy {
    fn accepts(&self, name: &str) -> bool {
        name == kind::OBSERVABLE_FILE
    }

    fn create(&self, args: &[Value]) -> Result<Arc<dyn Source>> {
        let args = Args::new(kind::OBSERVABLE_FILE, args);
        self.build(
            args.string(0, "path")?,
            args.string_or(1, "format", &self.context.file_format)?,
        )
    }

    fn create_from_config(&self, config: &Partial) -> Result<Arc<dyn Source>> {
        let desc = Description::new(kind::OBSERVABLE_FILE, config);
        self.build(
            desc.string("path")?,
            desc.string_or("format", &self.context.file_format)?,
        )
    }
}
