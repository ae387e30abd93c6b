//! Priority-ordered aggregation of sources into one queryable snapshot.
//!
//! The [`Manager`] keeps its registered sources sorted by ascending priority
//! and always exports the sequential merge of their trees in that order, so
//! a higher priority is merged later and wins on conflicting leaves. Every
//! change to the registration list rebuilds the snapshot from scratch and
//! then diffs each observed path against its recorded baseline.
//!
//! # Locking
//!
//! One mutex guards the source list, the observers and the snapshot. It is
//! held for the whole of a registration change and its rebuild, but observer
//! callbacks are collected and invoked only after it has been released, so a
//! callback may call back into the manager.
//!
//! # Polling
//!
//! With [`start_polling`](Manager::start_polling), a background thread calls
//! [`ObservableSource::reload`](crate::source::ObservableSource::reload) on
//! every observable source once per period and rebuilds once if any of them
//! reported a change. Reload errors are logged and otherwise ignored.

use std::borrow::Cow;
use std::mem;
use std::sync::Arc;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::error::{ConfigError, Result};
use crate::partial::{ConfigRead, DEFAULT_SEPARATOR, Partial};
use crate::source::{PartialProvider, Source};
use crate::value::Value;

type Callback = Arc<dyn Fn(&Value, &Value) + Send + Sync>;

struct Registration {
    id: String,
    priority: i64,
    source: Arc<dyn Source>,
}

struct Observer {
    path: String,
    value: Value,
    callback: Callback,
}

/// A change to report once the lock is released.
struct Notification {
    callback: Callback,
    old: Value,
    new: Value,
}

impl Notification {
    fn fire(self) {
        (self.callback)(&self.old, &self.new);
    }
}

#[derive(Default)]
struct State {
    sources: Vec<Registration>,
    observers: Vec<Observer>,
    partial: Partial,
}

struct Inner {
    separator: String,
    state: Mutex<State>,
}

impl Inner {
    /// Merge every source from scratch, then diff the observers.
    fn rebuild(&self, state: &mut State) -> Vec<Notification> {
        let mut partial = Partial::new();
        for registration in &state.sources {
            partial.merge(registration.source.partial());
        }
        state.partial = partial;
        debug!(sources = state.sources.len(), "rebuilt snapshot");

        let mut pending = Vec::new();
        for observer in &mut state.observers {
            let Ok(current) = state.partial.resolve(&observer.path, &self.separator) else {
                continue;
            };
            if *current != observer.value {
                let new = current.into_owned();
                let old = mem::replace(&mut observer.value, new.clone());
                pending.push(Notification {
                    callback: observer.callback.clone(),
                    old,
                    new,
                });
            }
        }
        pending
    }

    /// Run `change` and the rebuild under the lock, then notify outside it.
    fn mutate<T>(&self, change: impl FnOnce(&mut State) -> Result<T>) -> Result<T> {
        let (result, pending) = {
            let mut state = self.state.lock();
            let result = change(&mut state)?;
            let pending = self.rebuild(&mut state);
            (result, pending)
        };
        for notification in pending {
            notification.fire();
        }
        Ok(result)
    }

    /// One polling round. Sources reload outside the manager lock; each one
    /// guards its own tree.
    fn poll(&self) -> bool {
        let sources: Vec<(String, Arc<dyn Source>)> = self
            .state
            .lock()
            .sources
            .iter()
            .map(|r| (r.id.clone(), r.source.clone()))
            .collect();

        let mut changed = false;
        for (id, source) in &sources {
            let Some(observable) = source.as_observable() else {
                continue;
            };
            match observable.reload() {
                Ok(true) => {
                    debug!(id = %id, "source reloaded");
                    changed = true;
                }
                Ok(false) => {}
                Err(e) => warn!(id = %id, error = %e, "source reload failed"),
            }
        }

        if changed {
            let pending = {
                let mut state = self.state.lock();
                self.rebuild(&mut state)
            };
            for notification in pending {
                notification.fire();
            }
        }
        changed
    }
}

struct Poller {
    stop: mpsc::Sender<()>,
    handle: JoinHandle<()>,
}

impl Poller {
    fn start(inner: Arc<Inner>, period: Duration) -> Self {
        let (stop, ticks) = mpsc::channel();
        let handle = thread::spawn(move || {
            loop {
                match ticks.recv_timeout(period) {
                    Err(RecvTimeoutError::Timeout) => {
                        inner.poll();
                    }
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }
            }
        });
        Self { stop, handle }
    }

    fn stop(self) {
        let _ = self.stop.send(());
        // a callback running on the poller thread may be the one closing us
        if self.handle.thread().id() != thread::current().id() {
            let _ = self.handle.join();
        }
    }
}

pub struct Manager {
    inner: Arc<Inner>,
    poller: Mutex<Option<Poller>>,
}

impl Default for Manager {
    fn default() -> Self {
        Self::new()
    }
}

impl Manager {
    pub fn new() -> Self {
        Self::with_separator(DEFAULT_SEPARATOR)
    }

    pub fn with_separator(separator: &str) -> Self {
        Self {
            inner: Arc::new(Inner {
                separator: separator.to_string(),
                state: Mutex::new(State::default()),
            }),
            poller: Mutex::new(None),
        }
    }

    pub fn separator(&self) -> &str {
        &self.inner.separator
    }

    // -- Sources -------------------------------------------------------------

    /// Register `source` under a unique `id`.
    ///
    /// Sources are kept in ascending priority order; among equal priorities
    /// the earlier registration is merged first.
    pub fn add_source(&self, id: &str, priority: i64, source: Arc<dyn Source>) -> Result<()> {
        self.inner.mutate(|state| {
            if state.sources.iter().any(|r| r.id == id) {
                return Err(ConfigError::DuplicateSource(id.to_string()));
            }
            state.sources.push(Registration {
                id: id.to_string(),
                priority,
                source,
            });
            state.sources.sort_by_key(|r| r.priority);
            info!(id, priority, "source registered");
            Ok(())
        })
    }

    /// Unregister and close the source with this id. Unknown ids are a no-op.
    ///
    /// The snapshot is rebuilt even when closing fails; the close error is
    /// then returned.
    pub fn remove_source(&self, id: &str) -> Result<()> {
        self.inner.mutate(|state| {
            let Some(index) = state.sources.iter().position(|r| r.id == id) else {
                return Ok(Ok(()));
            };
            let removed = state.sources.remove(index);
            info!(id, "source removed");
            Ok(removed.source.close())
        })?
    }

    /// Unregister and close every source. All sources are closed; the first
    /// close error, if any, is returned.
    pub fn remove_all_sources(&self) -> Result<()> {
        self.inner.mutate(|state| {
            let removed = mem::take(&mut state.sources);
            info!(count = removed.len(), "all sources removed");
            let mut outcome = Ok(());
            for registration in removed {
                let closed = registration.source.close();
                if outcome.is_ok() {
                    outcome = closed;
                }
            }
            Ok(outcome)
        })?
    }

    /// Change the priority of a registered source.
    pub fn source_priority(&self, id: &str, priority: i64) -> Result<()> {
        self.inner.mutate(|state| {
            let registration = state
                .sources
                .iter_mut()
                .find(|r| r.id == id)
                .ok_or_else(|| ConfigError::SourceNotFound(id.to_string()))?;
            registration.priority = priority;
            state.sources.sort_by_key(|r| r.priority);
            info!(id, priority, "source priority changed");
            Ok(())
        })
    }

    pub fn has_source(&self, id: &str) -> bool {
        self.inner.state.lock().sources.iter().any(|r| r.id == id)
    }

    pub fn source(&self, id: &str) -> Result<Arc<dyn Source>> {
        self.inner
            .state
            .lock()
            .sources
            .iter()
            .find(|r| r.id == id)
            .map(|r| r.source.clone())
            .ok_or_else(|| ConfigError::SourceNotFound(id.to_string()))
    }

    /// Registered ids, lowest priority first.
    pub fn source_ids(&self) -> Vec<String> {
        self.inner
            .state
            .lock()
            .sources
            .iter()
            .map(|r| r.id.clone())
            .collect()
    }

    // -- Observers -----------------------------------------------------------

    /// Call `callback(old, new)` whenever the value at `path` changes.
    ///
    /// The path must resolve now. While a later snapshot doesn't contain the
    /// path the observer stays registered but silent.
    pub fn add_observer<F>(&self, path: &str, callback: F) -> Result<()>
    where
        F: Fn(&Value, &Value) + Send + Sync + 'static,
    {
        let mut state = self.inner.state.lock();
        let value = state
            .partial
            .resolve(path, &self.inner.separator)?
            .into_owned();
        state.observers.push(Observer {
            path: path.to_string(),
            value,
            callback: Arc::new(callback),
        });
        debug!(path, "observer added");
        Ok(())
    }

    /// Drop the first observer registered at exactly `path`, if any.
    pub fn remove_observer(&self, path: &str) {
        let mut state = self.inner.state.lock();
        if let Some(index) = state.observers.iter().position(|o| o.path == path) {
            state.observers.remove(index);
        }
    }

    // -- Snapshot ------------------------------------------------------------

    /// A deep copy of the current merged tree.
    pub fn snapshot(&self) -> Partial {
        self.inner.state.lock().partial.clone()
    }

    /// Run one polling round now. Returns whether any source reported a change.
    pub fn reload(&self) -> bool {
        self.inner.poll()
    }

    // -- Lifecycle -----------------------------------------------------------

    /// Start the background poller, replacing any running one.
    pub fn start_polling(&self, period: Duration) {
        let mut poller = self.poller.lock();
        if let Some(previous) = poller.take() {
            previous.stop();
        }
        *poller = Some(Poller::start(self.inner.clone(), period));
        info!(period_ms = period.as_millis() as u64, "polling started");
    }

    pub fn stop_polling(&self) {
        if let Some(poller) = self.poller.lock().take() {
            poller.stop();
            info!("polling stopped");
        }
    }

    pub fn is_polling(&self) -> bool {
        self.poller.lock().is_some()
    }

    /// Stop polling and close every source. The first close error aborts the
    /// remaining closes.
    pub fn close(&self) -> Result<()> {
        self.stop_polling();
        let state = self.inner.state.lock();
        for registration in &state.sources {
            registration.source.close()?;
        }
        Ok(())
    }
}

impl Drop for Manager {
    fn drop(&mut self) {
        self.stop_polling();
    }
}

impl ConfigRead for Manager {
    fn get(&self, path: &str) -> Result<Value> {
        self.inner
            .state
            .lock()
            .partial
            .resolve(path, &self.inner.separator)
            .map(Cow::into_owned)
    }
}

impl PartialProvider for Manager {
    fn export(&self) -> Partial {
        self.snapshot()
    }
}
