#[cfg(test)]
pub mod test {
    use std::collections::HashMap;
    use std::io::{Cursor, Read};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    use parking_lot::Mutex;

    use crate::error::{ConfigError, Result};
    use crate::partial::Partial;
    use crate::source::{Fetcher, ObservableSource, Source, SourceTree};

    /// Build a flat tree from string pairs; keys may be dotted paths.
    pub fn partial(pairs: &[(&str, &str)]) -> Partial {
        let mut p = Partial::new();
        for (path, value) in pairs {
            p.set(path, ".", *value);
        }
        p
    }

    pub fn static_source(pairs: &[(&str, &str)]) -> Arc<dyn Source> {
        Arc::new(StaticSource::new(partial(pairs)))
    }

    // -- In-memory source --------------------------------------------------------

    /// A fixed tree that counts how often it was closed and can be told to
    /// fail when closing.
    pub struct StaticSource {
        tree: SourceTree,
        closes: AtomicUsize,
        fail_close: AtomicBool,
    }

    impl StaticSource {
        pub fn new(partial: Partial) -> Self {
            Self {
                tree: SourceTree::new(partial, "."),
                closes: AtomicUsize::new(0),
                fail_close: AtomicBool::new(false),
            }
        }

        pub fn failing_close(partial: Partial) -> Self {
            let source = Self::new(partial);
            source.fail_close.store(true, Ordering::SeqCst);
            source
        }

        pub fn closes(&self) -> usize {
            self.closes.load(Ordering::SeqCst)
        }
    }

    impl Source for StaticSource {
        fn tree(&self) -> &SourceTree {
            &self.tree
        }

        fn close(&self) -> Result<()> {
            self.closes.fetch_add(1, Ordering::SeqCst);
            if self.fail_close.load(Ordering::SeqCst) {
                return Err(ConfigError::io(
                    "static",
                    std::io::Error::other("close failed"),
                ));
            }
            Ok(())
        }
    }

    // -- Observable source driven by the test ---------------------------------

    /// Reports a change on the next reload after [`stage`](Self::stage) was
    /// called, swapping in the staged tree.
    pub struct StagedSource {
        tree: SourceTree,
        staged: Mutex<Option<Partial>>,
        fail: AtomicBool,
        reloads: AtomicUsize,
    }

    impl StagedSource {
        pub fn new(partial: Partial) -> Self {
            Self {
                tree: SourceTree::new(partial, "."),
                staged: Mutex::new(None),
                fail: AtomicBool::new(false),
                reloads: AtomicUsize::new(0),
            }
        }

        pub fn stage(&self, partial: Partial) {
            *self.staged.lock() = Some(partial);
        }

        pub fn set_failing(&self, fail: bool) {
            self.fail.store(fail, Ordering::SeqCst);
        }

        pub fn reloads(&self) -> usize {
            self.reloads.load(Ordering::SeqCst)
        }
    }

    impl Source for StagedSource {
        fn tree(&self) -> &SourceTree {
            &self.tree
        }

        fn as_observable(&self) -> Option<&dyn ObservableSource> {
            Some(self)
        }
    }

    impl ObservableSource for StagedSource {
        fn reload(&self) -> Result<bool> {
            self.reloads.fetch_add(1, Ordering::SeqCst);
            if self.fail.load(Ordering::SeqCst) {
                return Err(ConfigError::decode("staged", "reload failed"));
            }
            match self.staged.lock().take() {
                Some(partial) => {
                    self.tree.replace(partial);
                    Ok(true)
                }
                None => Ok(false),
            }
        }
    }

    // -- Fetcher ----------------------------------------------------------------

    /// Serves canned bodies per URI; unknown URIs fail like a 404.
    #[derive(Default)]
    pub struct FakeFetcher {
        bodies: Mutex<HashMap<String, String>>,
    }

    impl FakeFetcher {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn respond(&self, uri: &str, body: &str) {
            self.bodies.lock().insert(uri.to_string(), body.to_string());
        }
    }

    impl Fetcher for FakeFetcher {
        fn fetch(&self, uri: &str) -> Result<Box<dyn Read + Send>> {
            match self.bodies.lock().get(uri) {
                Some(body) => Ok(Box::new(Cursor::new(body.clone().into_bytes()))),
                None => Err(ConfigError::Http {
                    uri: uri.to_string(),
                    reason: "404 Not Found".into(),
                }),
            }
        }
    }

    #[test]
    fn partial_helper_expands_paths() {
        use crate::partial::ConfigRead;
        let p = partial(&[("a.b", "1"), ("c", "2")]);
        assert_eq!(p.string("a.b").unwrap(), "1");
        assert_eq!(p.string("c").unwrap(), "2");
    }

    #[test]
    fn staged_source_reports_once() {
        let source = StagedSource::new(Partial::new());
        assert!(!source.reload().unwrap());
        source.stage(partial(&[("k", "v")]));
        assert!(source.reload().unwrap());
        assert!(!source.reload().unwrap());
        assert_eq!(source.reloads(), 3);
    }
}
