//! Action-name routing table for request-mode services.

use std::collections::HashMap;
use std::fmt;

use futures::future::BoxFuture;
use tracing::debug;

use crate::connection::Connection;
use crate::error::RegistryError;

/// An endpoint handler.
///
/// Receives the connection the request arrived on and the decoded request
/// body. The returned future is awaited to completion before the
/// connection reads its next message.
pub type Handler<B> =
    Box<dyn for<'a> Fn(&'a mut Connection, B) -> BoxFuture<'a, ()> + Send + Sync>;

/// Maps action names to handlers.
pub struct HandlerRegistry<B> {
    handlers: HashMap<String, Handler<B>>,
}

impl<B> HandlerRegistry<B> {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Binds a handler to an action.
    ///
    /// Returns [`RegistryError::DuplicateAction`] if the action is already
    /// bound; the existing handler stays active.
    pub fn register<F>(&mut self, action: impl Into<String>, handler: F) -> Result<(), RegistryError>
    where
        F: for<'a> Fn(&'a mut Connection, B) -> BoxFuture<'a, ()> + Send + Sync + 'static,
    {
        let action = action.into();
        if self.handlers.contains_key(&action) {
            return Err(RegistryError::DuplicateAction(action));
        }

        debug!(action = %action, "Registered endpoint");
        self.handlers.insert(action, Box::new(handler));
        Ok(())
    }

    /// Looks up the handler bound to an action.
    pub fn get(&self, action: &str) -> Option<&Handler<B>> {
        self.handlers.get(action)
    }

    /// Returns `true` if the action is bound.
    pub fn contains(&self, action: &str) -> bool {
        self.handlers.contains_key(action)
    }

    /// Number of bound actions.
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Returns `true` if no action is bound.
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Bound action names, sorted.
    pub fn actions(&self) -> Vec<&str> {
        let mut actions: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        actions.sort_unstable();
        actions
    }
}

impl<B> Default for HandlerRegistry<B> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B> fmt::Debug for HandlerRegistry<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("actions", &self.actions())
            .finish()
    }
}
