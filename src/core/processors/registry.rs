//! Processor registry
//!
//! Maps configured system names to processor factories. Systems can be
//! listed in configuration before a processor exists for them; resolving
//! such a name yields `None` and the pipeline skips it.

use crate::core::processors::bookkeeper::{BookkeeperProcessor, BOOKKEEPER};
use crate::core::processors::traits::{Processor, ProcessorContext};
use crate::core::processors::tripica::{TripicaProcessor, TRIPICA};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Builds a processor from the pipeline context
pub type ProcessorFactory = Arc<dyn Fn(ProcessorContext) -> Box<dyn Processor> + Send + Sync>;

/// Name → factory dispatch table
#[derive(Clone, Default)]
pub struct ProcessorRegistry {
    factories: BTreeMap<String, ProcessorFactory>,
}

impl ProcessorRegistry {
    /// An empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the Tripica and Bookkeeper processors
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(TRIPICA, |context| -> Box<dyn Processor> {
            Box::new(TripicaProcessor::new(context))
        });
        registry.register(BOOKKEEPER, |context| -> Box<dyn Processor> {
            Box::new(BookkeeperProcessor::new(context))
        });
        registry
    }

    /// Register (or replace) the factory for `name`
    pub fn register<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn(ProcessorContext) -> Box<dyn Processor> + Send + Sync + 'static,
    {
        self.factories.insert(name.into(), Arc::new(factory));
    }

    /// Build the processor for `name`, if one is registered
    pub fn resolve(&self, name: &str, context: &ProcessorContext) -> Option<Box<dyn Processor>> {
        self.factories
            .get(name)
            .map(|factory| factory(context.clone()))
    }

    /// Whether a processor is registered for `name`
    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Registered names in order
    pub fn names(&self) -> Vec<&str> {
        self.factories.keys().map(String::as_str).collect()
    }
}

impl std::fmt::Debug for ProcessorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessorRegistry")
            .field("names", &self.names())
            .finish()
    }
}
