//! Runtime configuration aggregated from many sources, merged by priority,
//! and observable while the process runs.
//!
//! Stratafig loads configuration trees from files, directories, HTTP
//! endpoints, environment variables and in-process providers, merges them
//! into one tree, and lets the rest of the application read typed values by
//! dotted path or subscribe to changes.
//!
//! ```ignore
//! use stratafig::{ConfigRead, Stratafig};
//!
//! let engine = Stratafig::builder().build()?;
//! let port = engine.manager().int_or("server.port", 8080)?;
//! engine.manager().add_observer("log.level", |old, new| {
//!     println!("log level {old} -> {new}");
//! })?;
//! ```
//!
//! With default settings, `build()` reads `config/config.yaml`, registers
//! every source listed under `stratafig.sources` in it, and hands back the
//! aggregated view.
//!
//! # The tree
//!
//! A [`Partial`] maps string keys to [`Value`]s; a value may itself be a
//! nested `Partial`. Paths join keys with a separator, `.` by default:
//! `database.url` is the `url` leaf inside `database`, and the empty path is
//! the whole tree. Empty segments are skipped, so `a..b` and `.a.b.` both
//! mean `a.b`.
//!
//! Typed reads ([`ConfigRead`]) work the same on a raw `Partial` and on the
//! [`Manager`]. Every accessor has an `_or` variant that returns a default
//! only when the path is missing; a value of the wrong type is always a
//! [`ConfigError::Conversion`].
//!
//! # Merging
//!
//! Merging is recursive. When both sides hold a tree at the same key the
//! trees are merged; in every other case the overlay value replaces the base
//! value, lists included.
//!
//! # Sources and priorities
//!
//! A [`Source`] owns one tree. The [`Manager`] keeps sources sorted by
//! ascending priority and exports the merge of all of them in that order:
//!
//! ```text
//! priority 0     _bootstrap    config/config.yaml
//!        ↑ overridden by
//! priority 10    defaults      dir config/defaults
//!        ↑ overridden by
//! priority 20    env           senv { APP_PORT: server.port }
//! ```
//!
//! Removing a source, or lowering its priority, makes the values it shadowed
//! visible again on the next rebuild, which happens on every registration
//! change.
//!
//! The built-in kinds (see [`source`]) are `file`, `observable-file`, `dir`,
//! `rest`, `observable-rest`, `senv` and `container`. They are built by the
//! [`SourceFactory`], either from positional arguments or from a declarative
//! description such as:
//!
//! ```yaml
//! id: overrides
//! priority: 10
//! type: observable-file
//! path: /etc/app/overrides.yaml
//! format: yaml
//! ```
//!
//! # Observing changes
//!
//! [`Manager::add_observer`] records the current value at a path; after each
//! rebuild the callback fires with `(old, new)` if the value differs.
//! Callbacks run once the manager's lock has been released, so they may read
//! from the manager. A path that stops resolving silences its observer until
//! it resolves again.
//!
//! Observable sources (`observable-file`, `observable-rest`) only change when
//! reloaded. Set a poll period (`STRATAFIG_OBSERVE_PERIOD_MS`, or
//! [`StratafigBuilder::observe_period`]) and a background thread reloads
//! them and rebuilds once per tick in which anything changed.
//!
//! # Formats
//!
//! Decoding goes through the [`DecoderFactory`]; YAML (`yaml`/`yml`), JSON
//! and TOML are built in and format names are case-insensitive. Register a
//! [`DecoderStrategy`] to add another.
//!
//! # Settings
//!
//! The engine's own knobs live in [`Settings`], each with a compiled default
//! and a `STRATAFIG_*` environment override. See the [`settings`] module.
//!
//! # Error handling
//!
//! Every fallible operation returns [`ConfigError`]. Messages name the path,
//! id, format or URI involved. See the [`error`] module for the full set.

pub mod decoder;
pub mod error;
pub mod settings;
pub mod source;
pub mod types;

mod builder;
mod loader;
mod manager;
pub(crate) mod merge;
mod partial;
mod value;

#[cfg(test)]
mod fixtures;

pub use builder::{Stratafig, StratafigBuilder};
pub use decoder::{Decoder, DecoderFactory, DecoderStrategy};
pub use error::{ConfigError, Result};
pub use loader::Loader;
pub use manager::Manager;
pub use partial::{ConfigRead, DEFAULT_SEPARATOR, Partial};
pub use settings::Settings;
pub use source::{ObservableSource, PartialProvider, Source, SourceFactory, SourceStrategy};
pub use types::Format;
pub use value::Value;
