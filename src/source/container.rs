use std::sync::Arc;

use tracing::debug;

use crate::error::Result;
use crate::partial::Partial;
use crate::types::kind;
use crate::value::Value;

use super::factory::{SourceContext, SourceStrategy};
use super::{Source, SourceTree};

/// Anything that can export an already-loaded configuration tree.
pub trait PartialProvider: Send + Sync {
    fn export(&self) -> Partial;
}

impl PartialProvider for Partial {
    fn export(&self) -> Partial {
        self.clone()
    }
}

/// The merged exports of a list of providers, in list order.
pub struct ContainerSource {
    tree: SourceTree,
}

impl ContainerSource {
    pub fn new(providers: &[Arc<dyn PartialProvider>], separator: &str) -> Self {
        let mut merged = Partial::new();
        for provider in providers {
            merged.merge(provider.export());
        }
        debug!(providers = providers.len(), "merged container providers");
        Self {
            tree: SourceTree::new(merged, separator),
        }
    }
}

impl Source for ContainerSource {
    fn tree(&self) -> &SourceTree {
        &self.tree
    }
}

/// `container`: takes no arguments; merges every provider registered on the
/// [`SourceContext`].
pub struct ContainerStrategy {
    context: Arc<SourceContext>,
}

impl ContainerStrategy {
    pub fn new(context: Arc<SourceContext>) -> Self {
        Self { context }
    }

    fn build(&self) -> Result<Arc<dyn Source>> {
        Ok(Arc::new(ContainerSource::new(
            &self.context.providers,
            &self.context.separator,
        )))
    }
}

impl SourceStrategy for ContainerStrategy {
    fn accepts(&self, name: &str) -> bool {
        name == kind::CONTAINER
    }

    fn create(&self, _args: &[Value]) -> Result<Arc<dyn Source>> {
        self.build()
    }

    fn create_from_config(&self, _config: &Partial) -> Result<Arc<dyn Source>> {
        self.build()
    }
}
