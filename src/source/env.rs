use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::Result;
use crate::partial::Partial;
use crate::types::kind;
use crate::value::Value;

use super::factory::{Args, Description, SourceContext, SourceStrategy, mappings};
use super::{Source, SourceTree};

/// Build a tree from environment variables mapped to config paths.
///
/// Each `(variable, path)` mapping whose variable is set to a non-empty value
/// writes that value, as a string, at `path`. Intermediate trees are created
/// as needed and a non-tree value in the way is replaced. Mappings are
/// applied in variable-name order, so when two variables target the same
/// path the later name wins.
///
/// Takes a lookup function so tests can pass synthetic data instead of the
/// process environment.
pub fn env_to_partial(
    mappings: &BTreeMap<String, String>,
    lookup: impl Fn(&str) -> Option<String>,
    separator: &str,
) -> Partial {
    let mut partial = Partial::new();
    for (var, path) in mappings {
        match lookup(var) {
            Some(value) if !value.is_empty() => partial.set(path, separator, value),
            _ => continue,
        }
    }
    partial
}

pub struct EnvSource {
    tree: SourceTree,
}

impl EnvSource {
    /// Read the mapped variables from the process environment.
    pub fn new(mappings: &BTreeMap<String, String>, separator: &str) -> Self {
        Self::from_lookup(mappings, |var| std::env::var(var).ok(), separator)
    }

    pub fn from_lookup(
        mappings: &BTreeMap<String, String>,
        lookup: impl Fn(&str) -> Option<String>,
        separator: &str,
    ) -> Self {
        Self {
            tree: SourceTree::new(env_to_partial(mappings, lookup, separator), separator),
        }
    }
}

impl Source for EnvSource {
    fn tree(&self) -> &SourceTree {
        &self.tree
    }
}

/// `senv`: positional `[mappings]`; description field `mappings`, a tree of
/// `VARIABLE: config.path` pairs.
pub struct EnvStrategy {
    context: Arc<SourceContext>,
}

impl EnvStrategy {
    pub fn new(context: Arc<SourceContext>) -> Self {
        Self { context }
    }

    fn build(&self, tree: Partial) -> Result<Arc<dyn Source>> {
        let mappings = mappings(&tree)?;
        Ok(Arc::new(EnvSource::new(&mappings, &self.context.separator)))
    }
}

impl SourceStrategy for EnvStrategy {
    fn accepts(&self, name: &str) -> bool {
        name == kind::ENV
    }

    fn create(&self, args: &[Value]) -> Result<Arc<dyn Source>> {
        self.build(Args::new(kind::ENV, args).partial(0, "mappings")?)
    }

    fn create_from_config(&self, config: &Partial) -> Result<Arc<dyn Source>> {
        self.build(Description::new(kind::ENV, config).partial("mappings")?)
    }
}
