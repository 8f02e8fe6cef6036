//! Named broadcasts handled on the dispatch loop.

use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::context::Context;

/// A named notification with an optional payload and string tags.
#[derive(Clone)]
pub struct Message {
    name: String,
    value: Option<Arc<dyn Any + Send + Sync>>,
    tags: BTreeMap<String, String>,
}

impl Message {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: None,
            tags: BTreeMap::new(),
        }
    }

    pub fn with_value<T: Any + Send + Sync>(mut self, value: T) -> Self {
        self.value = Some(Arc::new(value));
        self
    }

    pub fn with_tag(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.tags.insert(key.into(), value.to_string());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The payload, if there is one and it has type `T`.
    pub fn value<T: Any>(&self) -> Option<&T> {
        self.value.as_deref().and_then(|value| value.downcast_ref())
    }

    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags.get(key).map(String::as_str)
    }

    pub fn tags(&self) -> &BTreeMap<String, String> {
        &self.tags
    }
}

impl fmt::Debug for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Message")
            .field("name", &self.name)
            .field("value", &self.value.is_some())
            .field("tags", &self.tags)
            .finish()
    }
}

pub type MessageHandler = Rc<dyn Fn(&mut Context<'_>, &Message)>;

#[derive(Default)]
pub(crate) struct MessageRegistry {
    handlers: IndexMap<String, Vec<MessageHandler>>,
}

impl MessageRegistry {
    pub(crate) fn register(&mut self, name: impl Into<String>, handler: MessageHandler) {
        self.handlers.entry(name.into()).or_default().push(handler);
    }

    /// Handlers for `name` in registration order. Cloned so they can run
    /// while the registry is reachable through the context.
    pub(crate) fn handlers_for(&self, name: &str) -> Vec<MessageHandler> {
        self.handlers.get(name).cloned().unwrap_or_default()
    }

    pub(crate) fn names(&self) -> impl Iterator<Item = &str> {
        self.handlers.keys().map(String::as_str)
    }
}
