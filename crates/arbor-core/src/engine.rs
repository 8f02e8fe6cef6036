//! The dispatch loop.
//!
//! [`Engine`] is the single consumer of the event queue and the only writer of
//! the component tree, the update manager and the deferred list. A consume
//! cycle runs in three steps: execute the queued actions, render the dirty
//! components shallowest first, then run the deferred work in submission
//! order.

use std::any::type_name;
use std::rc::Rc;
use std::sync::Arc;
use std::time::Duration;

use url::Url;

use crate::composer::{Composer, ComposerId};
use crate::config::EngineConfig;
use crate::context::Context;
use crate::deferred::{Deferred, DeferredList};
use crate::error::{DispatchError, EngineError, TreeError};
use crate::messages::{Message, MessageRegistry};
use crate::platform::{DefaultScheduler, EngineScheduler};
use crate::queue::{Action, ActionFn, EngineHandle, EventQueue};
use crate::routing::Routes;
use crate::storage::Storages;
use crate::tree::ComponentTree;
use crate::update_manager::UpdateManager;

/// What one consume cycle did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub actions: usize,
    pub renders: usize,
    pub deferred: usize,
}

/// Everything the loop mutates. Contexts borrow it for the duration of one
/// execution.
pub(crate) struct EngineCore {
    pub(crate) tree: ComponentTree,
    pub(crate) updates: UpdateManager,
    pub(crate) defers: DeferredList,
    pub(crate) handle: EngineHandle,
    pub(crate) storages: Storages,
    pub(crate) routes: Routes,
    pub(crate) messages: MessageRegistry,
    pub(crate) origin: Url,
    pub(crate) page: Option<ComposerId>,
}

impl EngineCore {
    /// Queues `id` in the update manager. Unmounted components are ignored.
    pub(crate) fn schedule_component_update(&mut self, id: ComposerId) -> bool {
        match self.tree.depth(id) {
            Some(depth) => {
                self.updates.add(id, depth);
                true
            }
            None => false,
        }
    }

    pub(crate) fn mount(
        &mut self,
        parent: Option<ComposerId>,
        component: Box<dyn Composer>,
        name: &'static str,
    ) -> Result<ComposerId, EngineError> {
        let id = self.tree.insert(parent, component, name)?;
        log::debug!("mounted {name} as {id} under {parent:?}");
        self.with_lent(id, |component, ctx| component.on_mount(ctx))?;
        self.schedule_component_update(id);
        Ok(id)
    }

    pub(crate) fn dismount(&mut self, id: ComposerId) -> bool {
        if !self.tree.is_mounted(id) {
            return false;
        }
        let removed = self.tree.remove(id);
        log::debug!("dismounted {id} and {} resident components", removed.len());
        for mut component in removed {
            component.on_dismount();
        }
        if self.page == Some(id) {
            self.page = None;
        }
        true
    }

    /// Takes the component out of the tree so it can run with a context that
    /// borrows the rest of the engine.
    fn with_lent<R>(
        &mut self,
        id: ComposerId,
        f: impl FnOnce(&mut dyn Composer, &mut Context<'_>) -> R,
    ) -> Result<R, TreeError> {
        let mut component = self.tree.take(id)?;
        let result = {
            let mut ctx = Context::new(Some(id), self);
            f(&mut *component, &mut ctx)
        };
        if let Err(mut orphan) = self.tree.restore(id, component) {
            // Dismounted itself (or an ancestor) while lent out.
            orphan.on_dismount();
        }
        Ok(result)
    }

    fn render(&mut self, id: ComposerId) -> Result<(), EngineError> {
        self.with_lent(id, |component, ctx| component.render(ctx))?
            .map_err(|source| EngineError::Render { id, source })
    }

    /// Runs one action. Stale actions are dropped without a trace outside the
    /// logs.
    pub(crate) fn exec_action(&mut self, action: Action) {
        log::trace!("exec {action:?}");
        let (source, function, deferable) = action.into_parts();
        match function {
            None => {
                if let Some(source) = source {
                    if !self.schedule_component_update(source) {
                        log::trace!("dropped update for unmounted {source}");
                    }
                }
            }
            Some(function) if deferable => self.defers.push(Deferred { source, function }),
            Some(function) => {
                self.run(source, function);
            }
        }
    }

    fn run(&mut self, source: Option<ComposerId>, function: ActionFn) -> bool {
        if let Some(source) = source {
            if !self.tree.is_mounted(source) {
                log::trace!("dropped action for unmounted {source}");
                return false;
            }
        }
        let mut ctx = Context::new(source, self);
        function(&mut ctx);
        true
    }

    /// Renders every pending component, one depth at a time from the root
    /// down. Returns how many renders ran.
    pub(crate) fn update_components(&mut self) -> Result<usize, EngineError> {
        let mut rendered = 0;
        let mut from = 0;
        while let Some(depth) = self.updates.next_depth(from) {
            for id in self.updates.pending_at(depth) {
                if !self.tree.is_mounted(id) {
                    self.updates.forget(id, depth);
                    log::trace!("purged pending update for unmounted {id}");
                    continue;
                }
                self.render(id)?;
                self.updates.done(id, depth);
                rendered += 1;
            }
            from = depth + 1;
        }
        Ok(rendered)
    }

    /// Runs and clears the deferred list. Returns how many functions ran.
    pub(crate) fn exec_deferred(&mut self) -> usize {
        let mut executed = 0;
        for Deferred { source, function } in self.defers.take() {
            if self.run(source, function) {
                executed += 1;
            }
        }
        executed
    }

    pub(crate) fn navigate(&mut self, location: &str) -> Result<ComposerId, EngineError> {
        let path = self.routes.resolve(&self.origin, location)?;
        let (component, name) = self
            .routes
            .build(&path)
            .ok_or_else(|| EngineError::NotFound { path: path.clone() })?;
        if let Some(page) = self.page.take() {
            self.dismount(page);
        }
        let id = self.mount(None, component, name)?;
        self.page = Some(id);
        log::debug!("navigated to {path}: {name} as {id}");
        Ok(id)
    }
}

pub struct Engine {
    core: EngineCore,
    queue: EventQueue,
    config: EngineConfig,
}

impl Engine {
    pub fn new(config: EngineConfig) -> Result<Self, EngineError> {
        Self::with_scheduler(config, Arc::new(DefaultScheduler))
    }

    /// Builds an engine whose handles wake `scheduler` on every enqueue.
    pub fn with_scheduler(
        config: EngineConfig,
        scheduler: Arc<dyn EngineScheduler>,
    ) -> Result<Self, EngineError> {
        let origin = config.origin_url()?;
        let (handle, queue) = EventQueue::new(config.queue_capacity, scheduler);
        log::debug!(
            "engine started (queue capacity {:?}, {} fps)",
            config.queue_capacity,
            config.update_rate
        );
        Ok(Self {
            core: EngineCore {
                tree: ComponentTree::new(),
                updates: UpdateManager::new(),
                defers: DeferredList::new(),
                handle,
                storages: Storages::default(),
                routes: Routes::new(),
                messages: MessageRegistry::default(),
                origin,
                page: None,
            },
            queue,
            config,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// A producer handle for this engine.
    pub fn handle(&self) -> EngineHandle {
        self.core.handle.clone()
    }

    pub fn tree(&self) -> &ComponentTree {
        &self.core.tree
    }

    pub fn updates(&self) -> &UpdateManager {
        &self.core.updates
    }

    pub fn pending_actions(&self) -> usize {
        self.queue.len()
    }

    pub fn pending_deferred(&self) -> usize {
        self.core.defers.len()
    }

    /// The component mounted by the last successful navigation.
    pub fn page(&self) -> Option<ComposerId> {
        self.core.page
    }

    pub fn routes_mut(&mut self) -> &mut Routes {
        &mut self.core.routes
    }

    pub fn storages(&self) -> &Storages {
        &self.core.storages
    }

    pub fn set_storages(&mut self, storages: Storages) {
        self.core.storages = storages;
    }

    /// Registers `handler` for messages named `name`. Handlers run on the
    /// loop in registration order.
    pub fn handle_message(
        &mut self,
        name: impl Into<String>,
        handler: impl Fn(&mut Context<'_>, &Message) + 'static,
    ) {
        self.core.messages.register(name, Rc::new(handler));
    }

    /// Message names with at least one handler, in registration order.
    pub fn message_names(&self) -> Vec<&str> {
        self.core.messages.names().collect()
    }

    pub fn dispatch(
        &self,
        source: impl Into<Option<ComposerId>>,
        function: impl FnOnce(&mut Context<'_>) + Send + 'static,
    ) -> Result<(), DispatchError> {
        self.core.handle.dispatch(source, function)
    }

    pub fn defer(
        &self,
        source: impl Into<Option<ComposerId>>,
        function: impl FnOnce(&mut Context<'_>) + Send + 'static,
    ) -> Result<(), DispatchError> {
        self.core.handle.defer(source, function)
    }

    /// Runs `function` synchronously, then schedules `source` for a
    /// re-render if it is mounted.
    pub fn emit(
        &mut self,
        source: impl Into<Option<ComposerId>>,
        function: impl FnOnce(&mut Context<'_>),
    ) {
        Context::new(source.into(), &mut self.core).emit(function);
    }

    /// Mounts `component` as a new root at depth 0.
    pub fn mount<C: Composer>(&mut self, component: C) -> Result<ComposerId, EngineError> {
        self.core.mount(None, Box::new(component), type_name::<C>())
    }

    pub fn mount_child<C: Composer>(
        &mut self,
        parent: ComposerId,
        component: C,
    ) -> Result<ComposerId, EngineError> {
        self.core
            .mount(Some(parent), Box::new(component), type_name::<C>())
    }

    /// Detaches `id` and its subtree. Actions still queued for them become
    /// no-ops. Returns `false` when `id` was not mounted.
    pub fn dismount(&mut self, id: ComposerId) -> bool {
        self.core.dismount(id)
    }

    pub fn schedule_update(&mut self, id: ComposerId) -> bool {
        self.core.schedule_component_update(id)
    }

    pub fn with_component<T: Composer, R>(
        &mut self,
        id: ComposerId,
        f: impl FnOnce(&mut T) -> R,
    ) -> Result<R, TreeError> {
        self.core.tree.with_component(id, f)
    }

    /// Replaces the current page with the component routed at `location`.
    pub fn navigate(&mut self, location: &str) -> Result<ComposerId, EngineError> {
        self.core.navigate(location)
    }

    /// Runs one cycle over the actions queued right now.
    ///
    /// Actions enqueued while the cycle runs wait for the next one. A render
    /// failure aborts the update pass; deferred work then stays queued.
    pub fn consume(&mut self) -> Result<CycleReport, EngineError> {
        let mut report = CycleReport::default();
        for _ in 0..self.queue.len() {
            let Some(action) = self.queue.try_next() else {
                break;
            };
            self.core.exec_action(action);
            report.actions += 1;
        }
        report.renders = self.core.update_components()?;
        report.deferred = self.core.exec_deferred();
        log::debug!(
            "cycle: {} actions, {} renders, {} deferred",
            report.actions,
            report.renders,
            report.deferred
        );
        Ok(report)
    }

    /// Consumes until there is no queued action, pending update or deferred
    /// work left. Returns the number of cycles it took.
    pub fn consume_all(&mut self) -> Result<usize, EngineError> {
        let mut cycles = 0;
        while !self.is_idle() {
            if cycles == self.config.max_settle_cycles {
                log::warn!("engine still busy after {cycles} cycles");
                return Err(EngineError::Unsettled { cycles });
            }
            self.consume()?;
            cycles += 1;
        }
        Ok(cycles)
    }

    pub fn is_idle(&self) -> bool {
        self.queue.is_empty() && self.core.updates.is_empty() && self.core.defers.is_empty()
    }

    /// Blocks until an action is queued or `timeout` elapses, without
    /// consuming anything.
    pub fn wait_for_action(&mut self, timeout: Duration) -> bool {
        self.queue.wait(timeout)
    }

    /// Tears the engine down. Queued and deferred work is dropped, every
    /// mounted component is dismounted and outstanding handles start
    /// reporting [`DispatchError::Closed`].
    pub fn close(self) {
        drop(self);
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        let dropped = self.queue.discard();
        self.core.defers.clear();
        self.core.updates.clear();
        let roots = self.core.tree.roots().to_vec();
        for root in roots {
            self.core.dismount(root);
        }
        log::debug!("engine closed, {dropped} queued actions dropped");
    }
}

#[cfg(test)]
#[path = "tests/engine_tests.rs"]
mod tests;
