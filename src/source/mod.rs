//! Configuration sources.
//!
//! A [`Source`] owns one [`Partial`] loaded from some origin. The tree sits
//! behind the source's own lock ([`SourceTree`]) so an
//! [`ObservableSource`] can be reloaded by the background poller while
//! foreground readers keep calling `has`/`get`.
//!
//! | Kind | Type | Origin |
//! |------|------|--------|
//! | `file` | [`FileSource`] | a single file |
//! | `observable-file` | [`ObservableFileSource`] | a single file, reloaded when its mtime advances |
//! | `dir` | [`DirSource`] | every file in a directory, merged |
//! | `rest` | [`RestSource`] | a sub-tree of an HTTP response |
//! | `observable-rest` | [`ObservableRestSource`] | same, reloaded when a response timestamp advances |
//! | `senv` | [`EnvSource`] | environment variables mapped to paths |
//! | `container` | [`ContainerSource`] | the merged exports of [`PartialProvider`]s |

use std::borrow::Cow;

use parking_lot::Mutex;

use crate::error::Result;
use crate::partial::Partial;
use crate::value::Value;

mod container;
mod dir;
mod env;
mod factory;
mod file;
mod rest;

pub use container::{ContainerSource, ContainerStrategy, PartialProvider};
pub use dir::{DirSource, DirStrategy};
pub use env::{EnvSource, EnvStrategy};
pub use factory::{SourceContext, SourceFactory, SourceStrategy};
pub use file::{FileSource, FileStrategy, ObservableFileSource, ObservableFileStrategy};
#[cfg(feature = "http")]
pub use rest::HttpFetcher;
pub use rest::{Fetcher, ObservableRestSource, ObservableRestStrategy, RestSource, RestStrategy};

/// A read-only, lazily loaded configuration tree.
pub trait Source: Send + Sync {
    /// The locked tree backing this source.
    fn tree(&self) -> &SourceTree;

    fn has(&self, path: &str) -> bool {
        self.tree().has(path)
    }

    fn get(&self, path: &str) -> Result<Value> {
        self.tree().get(path)
    }

    /// A deep copy of the whole tree.
    fn partial(&self) -> Partial {
        self.tree().snapshot()
    }

    /// Downcast hook used by the manager's poller.
    fn as_observable(&self) -> Option<&dyn ObservableSource> {
        None
    }

    /// Release whatever the source holds. Sources without resources keep the
    /// default no-op.
    fn close(&self) -> Result<()> {
        Ok(())
    }
}

/// A source that can re-fetch its origin on demand.
pub trait ObservableSource: Source {
    /// Re-check the origin, replacing the tree if it changed. Returns whether
    /// a reload actually happened.
    fn reload(&self) -> Result<bool>;
}

/// A [`Partial`] behind a lock, plus the separator used to resolve paths in it.
#[derive(Debug)]
pub struct SourceTree {
    separator: String,
    partial: Mutex<Partial>,
}

impl SourceTree {
    pub fn new(partial: Partial, separator: &str) -> Self {
        Self {
            separator: separator.to_string(),
            partial: Mutex::new(partial),
        }
    }

    pub fn separator(&self) -> &str {
        &self.separator
    }

    pub fn has(&self, path: &str) -> bool {
        self.partial.lock().resolve(path, &self.separator).is_ok()
    }

    pub fn get(&self, path: &str) -> Result<Value> {
        self.partial
            .lock()
            .resolve(path, &self.separator)
            .map(Cow::into_owned)
    }

    pub fn snapshot(&self) -> Partial {
        self.partial.lock().clone()
    }

    pub fn replace(&self, partial: Partial) {
        *self.partial.lock() = partial;
    }
}
