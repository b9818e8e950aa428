//! Name to handler tables, one per document domain

use std::collections::HashMap;
use std::fmt;

use tracing::debug;

use super::{OperationDescriptor, OperationHandler};
use crate::document::DomainDocument;
use crate::error::{Error, Result};

/// Registered handlers for documents of type `D`
pub struct HandlerRegistry<D: DomainDocument> {
    handlers: HashMap<&'static str, Box<dyn OperationHandler<D>>>,
}

impl<D: DomainDocument> HandlerRegistry<D> {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Register a handler under its operation name
    pub fn register(&mut self, handler: impl OperationHandler<D> + 'static) -> Result<()> {
        let name = handler.operation();
        if self.handlers.contains_key(name) {
            return Err(Error::DuplicateOperation {
                domain: D::KIND.to_string(),
                operation: name.to_string(),
            });
        }

        debug!(domain = %D::KIND, operation = name, "Registered operation handler");
        self.handlers.insert(name, Box::new(handler));
        Ok(())
    }

    /// Builder form of [`HandlerRegistry::register`]
    pub fn with(mut self, handler: impl OperationHandler<D> + 'static) -> Result<Self> {
        self.register(handler)?;
        Ok(self)
    }

    /// Look up the handler for `operation`
    pub fn resolve(&self, operation: &str) -> Result<&dyn OperationHandler<D>> {
        self.handlers
            .get(operation)
            .map(|handler| &**handler)
            .ok_or_else(|| Error::UnsupportedOperation {
                domain: D::KIND.to_string(),
                operation: operation.to_string(),
                available: self.names().into_iter().map(String::from).collect(),
            })
    }

    pub fn contains(&self, operation: &str) -> bool {
        self.handlers.contains_key(operation)
    }

    /// Registered operation names, sorted
    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<&'static str> = self.handlers.keys().copied().collect();
        names.sort_unstable();
        names
    }

    /// Descriptors of all registered operations, sorted by name
    pub fn operations(&self) -> Vec<OperationDescriptor> {
        let mut descriptors: Vec<OperationDescriptor> =
            self.handlers.values().map(|h| h.descriptor()).collect();
        descriptors.sort_by_key(|d| d.operation);
        descriptors
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl<D: DomainDocument> Default for HandlerRegistry<D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D: DomainDocument> fmt::Debug for HandlerRegistry<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("domain", &D::KIND)
            .field("operations", &self.names())
            .finish()
    }
}
