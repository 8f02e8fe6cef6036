//! The event queue: many producers, one consumer.
//!
//! Producers hold an [`EngineHandle`] and may live on any thread. The engine
//! owns the receiving end and is the only place actions are executed.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use flume::{Receiver, RecvTimeoutError, Sender, TrySendError};

use crate::composer::ComposerId;
use crate::context::Context;
use crate::error::DispatchError;
use crate::messages::Message;
use crate::platform::EngineScheduler;

/// Work executed by the dispatch loop with a fresh [`Context`].
pub type ActionFn = Box<dyn FnOnce(&mut Context<'_>) + Send + 'static>;

/// A unit of queued work aimed at a component.
///
/// An action without a function only marks its source dirty.
pub struct Action {
    source: Option<ComposerId>,
    function: Option<ActionFn>,
    deferable: bool,
}

impl Action {
    pub fn immediate(
        source: Option<ComposerId>,
        function: impl FnOnce(&mut Context<'_>) + Send + 'static,
    ) -> Self {
        Self {
            source,
            function: Some(Box::new(function)),
            deferable: false,
        }
    }

    pub fn deferred(
        source: Option<ComposerId>,
        function: impl FnOnce(&mut Context<'_>) + Send + 'static,
    ) -> Self {
        Self {
            source,
            function: Some(Box::new(function)),
            deferable: true,
        }
    }

    pub fn notify(source: ComposerId) -> Self {
        Self {
            source: Some(source),
            function: None,
            deferable: false,
        }
    }

    pub fn source(&self) -> Option<ComposerId> {
        self.source
    }

    pub fn is_deferable(&self) -> bool {
        self.deferable
    }

    pub fn has_function(&self) -> bool {
        self.function.is_some()
    }

    pub(crate) fn into_parts(self) -> (Option<ComposerId>, Option<ActionFn>, bool) {
        (self.source, self.function, self.deferable)
    }
}

impl fmt::Debug for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Action")
            .field("source", &self.source)
            .field("function", &self.function.is_some())
            .field("deferable", &self.deferable)
            .finish()
    }
}

/// Producer side of the event queue. Cheap to clone, safe to send anywhere.
#[derive(Clone)]
pub struct EngineHandle {
    sender: Sender<Action>,
    capacity: Option<usize>,
    scheduler: Arc<dyn EngineScheduler>,
}

impl EngineHandle {
    /// Queues `function` to run on the loop, provided `source` is still
    /// mounted (or absent) when the action is consumed.
    pub fn dispatch(
        &self,
        source: impl Into<Option<ComposerId>>,
        function: impl FnOnce(&mut Context<'_>) + Send + 'static,
    ) -> Result<(), DispatchError> {
        self.send(Action::immediate(source.into(), function))
    }

    /// Queues `function` to run after the update pass of the cycle that
    /// consumes it.
    pub fn defer(
        &self,
        source: impl Into<Option<ComposerId>>,
        function: impl FnOnce(&mut Context<'_>) + Send + 'static,
    ) -> Result<(), DispatchError> {
        self.send(Action::deferred(source.into(), function))
    }

    /// Runs `function` right away on the calling thread, then queues a
    /// re-render of `source`.
    pub fn emit(&self, source: ComposerId, function: impl FnOnce()) -> Result<(), DispatchError> {
        function();
        self.update(source)
    }

    /// Queues a re-render of `target`.
    pub fn update(&self, target: ComposerId) -> Result<(), DispatchError> {
        self.send(Action::notify(target))
    }

    /// Queues delivery of `message` to every handler registered for its name.
    pub fn post_message(&self, message: Message) -> Result<(), DispatchError> {
        self.dispatch(None, move |ctx| {
            ctx.deliver(&message);
        })
    }

    pub fn send(&self, action: Action) -> Result<(), DispatchError> {
        log::trace!("enqueue {action:?}");
        match self.sender.try_send(action) {
            Ok(()) => {
                self.scheduler.schedule_consume();
                Ok(())
            }
            Err(TrySendError::Full(action)) => {
                let capacity = self.capacity.unwrap_or_default();
                log::warn!("event queue full ({capacity}); rejected {action:?}");
                Err(DispatchError::QueueFull { capacity })
            }
            Err(TrySendError::Disconnected(_)) => Err(DispatchError::Closed),
        }
    }

    /// Number of actions waiting to be consumed.
    pub fn pending(&self) -> usize {
        self.sender.len()
    }

    pub fn is_closed(&self) -> bool {
        self.sender.is_disconnected()
    }
}

impl fmt::Debug for EngineHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineHandle")
            .field("pending", &self.sender.len())
            .field("capacity", &self.capacity)
            .field("closed", &self.sender.is_disconnected())
            .finish()
    }
}

/// Consumer side, owned by the engine.
pub(crate) struct EventQueue {
    receiver: Receiver<Action>,
    // Action pulled by a blocking wait, consumed before anything else.
    stash: Option<Action>,
}

impl EventQueue {
    pub(crate) fn new(
        capacity: Option<usize>,
        scheduler: Arc<dyn EngineScheduler>,
    ) -> (EngineHandle, Self) {
        let (sender, receiver) = match capacity {
            Some(capacity) => flume::bounded(capacity),
            None => flume::unbounded(),
        };
        let handle = EngineHandle {
            sender,
            capacity,
            scheduler,
        };
        let queue = Self {
            receiver,
            stash: None,
        };
        (handle, queue)
    }

    pub(crate) fn len(&self) -> usize {
        self.receiver.len() + usize::from(self.stash.is_some())
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub(crate) fn try_next(&mut self) -> Option<Action> {
        self.stash
            .take()
            .or_else(|| self.receiver.try_recv().ok())
    }

    /// Blocks until an action is available or `timeout` elapses. The action
    /// stays queued.
    pub(crate) fn wait(&mut self, timeout: Duration) -> bool {
        if !self.is_empty() {
            return true;
        }
        match self.receiver.recv_timeout(timeout) {
            Ok(action) => {
                self.stash = Some(action);
                true
            }
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => false,
        }
    }

    /// Throws away everything queued. Returns how many actions were dropped.
    pub(crate) fn discard(&mut self) -> usize {
        let mut dropped = usize::from(self.stash.take().is_some());
        dropped += self.receiver.drain().count();
        dropped
    }
}
