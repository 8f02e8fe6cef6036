use std::any::type_name;

use crate::composer::{Composer, ComposerId, Depth};
use crate::engine::EngineCore;
use crate::error::{DispatchError, EngineError, TreeError};
use crate::messages::Message;
use crate::queue::EngineHandle;
use crate::storage::Storage;
use crate::tree::ComponentTree;

/// What a handler, a render or a deferred function gets to work with.
///
/// A context is built fresh for every execution and only lives for its
/// duration. It borrows the engine mutably, so anything done through it is
/// already on the single writer.
pub struct Context<'a> {
    source: Option<ComposerId>,
    core: &'a mut EngineCore,
}

impl<'a> Context<'a> {
    pub(crate) fn new(source: Option<ComposerId>, core: &'a mut EngineCore) -> Self {
        Self { source, core }
    }

    /// The component this execution runs on behalf of.
    pub fn source(&self) -> Option<ComposerId> {
        self.source
    }

    pub fn handle(&self) -> EngineHandle {
        self.core.handle.clone()
    }

    /// Queues `function` for the source component. It runs in the next
    /// consume cycle.
    pub fn dispatch(
        &self,
        function: impl FnOnce(&mut Context<'_>) + Send + 'static,
    ) -> Result<(), DispatchError> {
        self.core.handle.dispatch(self.source, function)
    }

    pub fn dispatch_to(
        &self,
        target: impl Into<Option<ComposerId>>,
        function: impl FnOnce(&mut Context<'_>) + Send + 'static,
    ) -> Result<(), DispatchError> {
        self.core.handle.dispatch(target, function)
    }

    pub fn defer(
        &self,
        function: impl FnOnce(&mut Context<'_>) + Send + 'static,
    ) -> Result<(), DispatchError> {
        self.core.handle.defer(self.source, function)
    }

    /// Applies `function` now and schedules the source for a re-render.
    pub fn emit(&mut self, function: impl FnOnce(&mut Context<'_>)) {
        function(&mut *self);
        self.update();
    }

    /// Schedules the source for a re-render. Returns `false` when there is
    /// no mounted source.
    pub fn update(&mut self) -> bool {
        match self.source {
            Some(source) => self.core.schedule_component_update(source),
            None => false,
        }
    }

    pub fn schedule_update(&mut self, id: ComposerId) -> bool {
        self.core.schedule_component_update(id)
    }

    /// Mounts `component` under the source, or as a root when there is none.
    pub fn mount_child<C: Composer>(&mut self, component: C) -> Result<ComposerId, EngineError> {
        self.core
            .mount(self.source, Box::new(component), type_name::<C>())
    }

    pub fn mount_root<C: Composer>(&mut self, component: C) -> Result<ComposerId, EngineError> {
        self.core.mount(None, Box::new(component), type_name::<C>())
    }

    pub fn dismount(&mut self, id: ComposerId) -> bool {
        self.core.dismount(id)
    }

    pub fn with_component<T: Composer, R>(
        &mut self,
        id: ComposerId,
        f: impl FnOnce(&mut T) -> R,
    ) -> Result<R, TreeError> {
        self.core.tree.with_component(id, f)
    }

    pub fn tree(&self) -> &ComponentTree {
        &self.core.tree
    }

    pub fn depth(&self, id: ComposerId) -> Option<Depth> {
        self.core.tree.depth(id)
    }

    pub fn is_mounted(&self, id: ComposerId) -> bool {
        self.core.tree.is_mounted(id)
    }

    pub fn children(&self, id: ComposerId) -> &[ComposerId] {
        self.core.tree.children(id)
    }

    pub fn local_storage(&self) -> &dyn Storage {
        self.core.storages.local.as_ref()
    }

    pub fn session_storage(&self) -> &dyn Storage {
        self.core.storages.session.as_ref()
    }

    /// Replaces the current page with the component routed at `location`.
    pub fn navigate(&mut self, location: &str) -> Result<ComposerId, EngineError> {
        self.core.navigate(location)
    }

    pub fn post_message(&self, message: Message) -> Result<(), DispatchError> {
        self.core.handle.post_message(message)
    }

    /// Runs every handler registered for the message's name. Returns how
    /// many ran.
    pub(crate) fn deliver(&mut self, message: &Message) -> usize {
        let handlers = self.core.messages.handlers_for(message.name());
        if handlers.is_empty() {
            log::debug!("no handler for message {:?}", message.name());
        }
        for handler in &handlers {
            handler(&mut *self, message);
        }
        handlers.len()
    }
}
