use std::sync::{Arc, Mutex, PoisonError};

use arbor_core::{
    Composer, ComposerId, Context, CycleReport, DispatchError, Engine, EngineConfig, EngineError,
    EngineHandle, RenderError,
};

/// Shared, thread-safe record of what components and actions did.
///
/// Entries are plain strings such as `"render header"`; compare them against
/// slices of `&str` in assertions.
#[derive(Clone, Default)]
pub struct RenderLog {
    entries: Arc<Mutex<Vec<String>>>,
}

impl RenderLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, entry: impl Into<String>) {
        self.lock().push(entry.into());
    }

    /// Copy of the entries recorded so far.
    pub fn entries(&self) -> Vec<String> {
        self.lock().clone()
    }

    /// Returns the entries and starts over.
    pub fn take(&self) -> Vec<String> {
        std::mem::take(&mut *self.lock())
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// How many entries equal `entry`.
    pub fn count(&self, entry: &str) -> usize {
        self.lock().iter().filter(|seen| seen.as_str() == entry).count()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<String>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Component that records its lifecycle in a [`RenderLog`].
///
/// Logs `"mount {label}"`, `"render {label}"` and `"dismount {label}"`.
pub struct Probe {
    label: String,
    log: RenderLog,
    renders: usize,
}

impl Probe {
    pub fn new(label: impl Into<String>, log: &RenderLog) -> Self {
        Self {
            label: label.into(),
            log: log.clone(),
            renders: 0,
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn renders(&self) -> usize {
        self.renders
    }
}

impl Composer for Probe {
    fn render(&mut self, _ctx: &mut Context<'_>) -> Result<(), RenderError> {
        self.renders += 1;
        self.log.push(format!("render {}", self.label));
        Ok(())
    }

    fn on_mount(&mut self, _ctx: &mut Context<'_>) {
        self.log.push(format!("mount {}", self.label));
    }

    fn on_dismount(&mut self) {
        self.log.push(format!("dismount {}", self.label));
    }
}

/// Component whose render always fails with `message`.
pub struct Failing {
    message: String,
}

impl Failing {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl Composer for Failing {
    fn render(&mut self, _ctx: &mut Context<'_>) -> Result<(), RenderError> {
        Err(RenderError::new(self.message.clone()))
    }
}

/// Component holding a number that actions bump through
/// [`Engine::with_component`] or [`Context::with_component`].
#[derive(Debug, Default)]
pub struct Counter {
    pub value: i64,
    /// Value seen by the latest render.
    pub rendered: Option<i64>,
}

impl Counter {
    pub fn new(value: i64) -> Self {
        Self {
            value,
            rendered: None,
        }
    }

    /// Dispatches an increment of the counter at `id` followed by a
    /// re-render.
    pub fn increment(handle: &EngineHandle, id: ComposerId) -> Result<(), DispatchError> {
        handle.dispatch(id, move |ctx| {
            if ctx
                .with_component(id, |counter: &mut Counter| counter.value += 1)
                .is_ok()
            {
                ctx.update();
            }
        })
    }
}

impl Composer for Counter {
    fn render(&mut self, _ctx: &mut Context<'_>) -> Result<(), RenderError> {
        self.rendered = Some(self.value);
        Ok(())
    }
}

/// Headless harness for driving an engine in tests.
///
/// Owns the engine plus a [`RenderLog`] that [`EngineHarness::probe`] hands to
/// every probe it mounts.
pub struct EngineHarness {
    engine: Engine,
    log: RenderLog,
}

impl EngineHarness {
    pub fn new() -> Result<Self, EngineError> {
        Self::with_config(EngineConfig::default())
    }

    pub fn with_config(config: EngineConfig) -> Result<Self, EngineError> {
        Ok(Self {
            engine: Engine::new(config)?,
            log: RenderLog::new(),
        })
    }

    pub fn engine(&mut self) -> &mut Engine {
        &mut self.engine
    }

    pub fn handle(&self) -> EngineHandle {
        self.engine.handle()
    }

    pub fn log(&self) -> &RenderLog {
        &self.log
    }

    /// Mounts a [`Probe`] labelled `label`, as a root or under `parent`.
    pub fn probe(
        &mut self,
        label: &str,
        parent: impl Into<Option<ComposerId>>,
    ) -> Result<ComposerId, EngineError> {
        let probe = Probe::new(label, &self.log);
        match parent.into() {
            Some(parent) => self.engine.mount_child(parent, probe),
            None => self.engine.mount(probe),
        }
    }

    pub fn consume(&mut self) -> Result<CycleReport, EngineError> {
        self.engine.consume()
    }

    pub fn settle(&mut self) -> Result<usize, EngineError> {
        self.engine.consume_all()
    }

    /// Settles the engine, then clears the log so later assertions only see
    /// what follows.
    pub fn settle_quietly(&mut self) -> Result<usize, EngineError> {
        let cycles = self.engine.consume_all()?;
        self.log.take();
        Ok(cycles)
    }

    pub fn into_engine(self) -> Engine {
        self.engine
    }
}

/// Convenience helper for tests that only need temporary access to an
/// [`EngineHarness`] with the default configuration.
pub fn run_test_engine<R>(f: impl FnOnce(&mut EngineHarness) -> R) -> Result<R, EngineError> {
    let mut harness = EngineHarness::new()?;
    Ok(f(&mut harness))
}
