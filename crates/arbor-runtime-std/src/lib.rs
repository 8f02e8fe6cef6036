//! Standard runtime services backed by Rust's `std` library.
//!
//! This crate provides concrete implementations of the host hooks defined in
//! `arbor-core`. Applications construct a [`StdRuntime`] to drive an engine
//! with a blocking frame loop, and an [`AutoUpdate`] to re-render a component
//! on a timer.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use arbor_core::{
    ComposerId, CycleReport, Engine, EngineConfig, EngineError, EngineHandle, EngineScheduler,
};
use flume::{RecvTimeoutError, Sender};

type Waker = Arc<dyn Fn() + Send + Sync + 'static>;

/// Scheduler that records consume requests and pokes an optional waker.
pub struct StdScheduler {
    consume_requested: AtomicBool,
    waker: RwLock<Option<Waker>>,
}

impl StdScheduler {
    pub fn new() -> Self {
        Self {
            consume_requested: AtomicBool::new(false),
            waker: RwLock::new(None),
        }
    }

    /// Returns whether a consume has been requested since the last call.
    pub fn take_consume_request(&self) -> bool {
        self.consume_requested.swap(false, Ordering::SeqCst)
    }

    /// Registers a waker that will be invoked whenever work is enqueued.
    pub fn set_waker(&self, waker: impl Fn() + Send + Sync + 'static) {
        *self.waker.write().unwrap_or_else(PoisonError::into_inner) = Some(Arc::new(waker));
    }

    /// Clears any registered waker.
    pub fn clear_waker(&self) {
        *self.waker.write().unwrap_or_else(PoisonError::into_inner) = None;
    }

    fn wake(&self) {
        let waker = self
            .waker
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        if let Some(waker) = waker {
            waker();
        }
    }
}

impl Default for StdScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for StdScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StdScheduler")
            .field(
                "consume_requested",
                &self.consume_requested.load(Ordering::SeqCst),
            )
            .finish()
    }
}

impl EngineScheduler for StdScheduler {
    fn schedule_consume(&self) {
        self.consume_requested.store(true, Ordering::SeqCst);
        self.wake();
    }
}

/// An engine wired to a [`StdScheduler`], plus the loop that drives it.
pub struct StdRuntime {
    scheduler: Arc<StdScheduler>,
    engine: Engine,
}

impl StdRuntime {
    pub fn new(config: EngineConfig) -> Result<Self, EngineError> {
        let scheduler = Arc::new(StdScheduler::default());
        let engine = Engine::with_scheduler(config, scheduler.clone())?;
        Ok(Self { scheduler, engine })
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut Engine {
        &mut self.engine
    }

    /// Returns a producer handle for the engine.
    pub fn handle(&self) -> EngineHandle {
        self.engine.handle()
    }

    /// Returns the scheduler implementation.
    pub fn scheduler(&self) -> Arc<StdScheduler> {
        Arc::clone(&self.scheduler)
    }

    /// Returns whether work arrived since the last poll, or is still pending
    /// from an earlier cycle.
    pub fn should_consume(&self) -> bool {
        let requested = self.scheduler.take_consume_request();
        requested || !self.engine.is_idle()
    }

    /// Runs a single consume cycle.
    pub fn run_frame(&mut self) -> Result<CycleReport, EngineError> {
        self.engine.consume()
    }

    /// Drives the engine until `stop` is set or a cycle fails.
    ///
    /// Queued actions are consumed as soon as they arrive. Updates and
    /// deferred work left behind by a cycle wait for the next frame boundary,
    /// so a component that keeps rescheduling itself renders at most once per
    /// frame.
    pub fn run(&mut self, stop: &AtomicBool) -> Result<(), EngineError> {
        let interval = self.engine.config().frame_interval();
        log::debug!("frame loop started ({interval:?} per frame)");
        let mut next_frame = Instant::now();
        while !stop.load(Ordering::SeqCst) {
            if self.engine.pending_actions() == 0 {
                let wait = if self.engine.is_idle() {
                    interval
                } else {
                    next_frame.saturating_duration_since(Instant::now())
                };
                if !wait.is_zero() && !self.engine.wait_for_action(wait) {
                    continue;
                }
            }
            next_frame = Instant::now() + interval;
            self.scheduler.take_consume_request();
            if let Err(err) = self.engine.consume() {
                log::error!("frame loop stopped: {err}");
                return Err(err);
            }
        }
        log::debug!("frame loop stopped");
        Ok(())
    }
}

impl fmt::Debug for StdRuntime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StdRuntime")
            .field("scheduler", &self.scheduler)
            .field("idle", &self.engine.is_idle())
            .finish()
    }
}

/// Background producer that marks a component dirty at a fixed interval.
///
/// Stops when dropped, when [`AutoUpdate::stop`] is called, or once the
/// engine has closed.
pub struct AutoUpdate {
    stop: Option<Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl AutoUpdate {
    pub fn spawn(handle: EngineHandle, target: ComposerId, interval: Duration) -> Self {
        let (stop, stopped) = flume::bounded::<()>(1);
        let thread = thread::spawn(move || loop {
            match stopped.recv_timeout(interval) {
                Err(RecvTimeoutError::Timeout) => {
                    if let Err(err) = handle.update(target) {
                        log::debug!("auto update of {target} ended: {err}");
                        break;
                    }
                }
                Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
            }
        });
        Self {
            stop: Some(stop),
            thread: Some(thread),
        }
    }

    pub fn is_running(&self) -> bool {
        self.thread
            .as_ref()
            .is_some_and(|thread| !thread.is_finished())
    }

    /// Stops the timer thread and waits for it to exit.
    pub fn stop(&mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.try_send(());
        }
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                log::warn!("auto update thread panicked");
            }
        }
    }
}

impl Drop for AutoUpdate {
    fn drop(&mut self) {
        self.stop();
    }
}

impl fmt::Debug for AutoUpdate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AutoUpdate")
            .field("running", &self.is_running())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    use arbor_core::{Composer, Context, RenderError};

    struct Ticker {
        renders: Arc<AtomicUsize>,
    }

    impl Composer for Ticker {
        fn render(&mut self, _ctx: &mut Context<'_>) -> Result<(), RenderError> {
            self.renders.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[test]
    fn std_runtime_requests_consume_on_enqueue() {
        let mut runtime = StdRuntime::new(EngineConfig::default()).expect("runtime");
        assert!(!runtime.should_consume());

        let woken = Arc::new(AtomicBool::new(false));
        {
            let woken = woken.clone();
            runtime
                .scheduler()
                .set_waker(move || woken.store(true, Ordering::SeqCst));
        }

        runtime.handle().dispatch(None, |_| {}).expect("dispatch");

        assert!(woken.load(Ordering::SeqCst));
        assert!(runtime.should_consume());
        assert_eq!(runtime.run_frame().expect("frame").actions, 1);
        assert!(!runtime.should_consume());

        runtime.scheduler().clear_waker();
    }

    #[test]
    fn should_consume_while_updates_are_pending() {
        let mut runtime = StdRuntime::new(EngineConfig::default()).expect("runtime");
        let renders = Arc::new(AtomicUsize::new(0));
        runtime
            .engine_mut()
            .mount(Ticker {
                renders: renders.clone(),
            })
            .expect("mount");

        assert!(runtime.should_consume());
        runtime.run_frame().expect("frame");
        assert_eq!(renders.load(Ordering::SeqCst), 1);
        assert!(!runtime.should_consume());
    }

    #[test]
    fn run_consumes_until_stopped() {
        let mut runtime =
            StdRuntime::new(EngineConfig::default().with_update_rate(200)).expect("runtime");
        let stop = Arc::new(AtomicBool::new(false));
        let handle = runtime.handle();
        {
            let stop = stop.clone();
            handle
                .dispatch(None, move |ctx| {
                    ctx.defer(move |_| stop.store(true, Ordering::SeqCst))
                        .expect("defer");
                })
                .expect("dispatch");
        }

        runtime.run(&stop).expect("run");

        assert!(runtime.engine().is_idle());
    }

    #[test]
    fn self_rescheduling_components_render_once_per_frame() {
        struct Restless {
            renders: Arc<AtomicUsize>,
        }

        impl Composer for Restless {
            fn render(&mut self, ctx: &mut Context<'_>) -> Result<(), RenderError> {
                self.renders.fetch_add(1, Ordering::SeqCst);
                ctx.update();
                Ok(())
            }
        }

        let mut runtime =
            StdRuntime::new(EngineConfig::default().with_update_rate(20)).expect("runtime");
        let renders = Arc::new(AtomicUsize::new(0));
        runtime
            .engine_mut()
            .mount(Restless {
                renders: renders.clone(),
            })
            .expect("mount");
        let stop = Arc::new(AtomicBool::new(false));
        let stopper = {
            let stop = stop.clone();
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(250));
                stop.store(true, Ordering::SeqCst);
            })
        };

        runtime.run(&stop).expect("run");
        stopper.join().expect("stopper");

        // 250ms at 50ms per frame, with slack for a slow scheduler.
        let rendered = renders.load(Ordering::SeqCst);
        assert!((1..=8).contains(&rendered), "rendered {rendered} times");
    }

    #[test]
    fn queued_actions_do_not_wait_for_the_frame() {
        let mut runtime =
            StdRuntime::new(EngineConfig::default().with_update_rate(1)).expect("runtime");
        let stop = Arc::new(AtomicBool::new(false));
        let handle = runtime.handle();
        let producer = {
            let stop = stop.clone();
            thread::spawn(move || {
                for _ in 0..5 {
                    thread::sleep(Duration::from_millis(5));
                    handle.dispatch(None, |_| {}).expect("dispatch");
                }
                handle
                    .dispatch(None, move |_| stop.store(true, Ordering::SeqCst))
                    .expect("dispatch");
            })
        };

        let started = Instant::now();
        runtime.run(&stop).expect("run");
        producer.join().expect("producer");

        assert!(started.elapsed() < Duration::from_millis(900));
    }

    #[test]
    fn run_returns_the_failing_cycle() {
        struct Broken;

        impl Composer for Broken {
            fn render(&mut self, _ctx: &mut Context<'_>) -> Result<(), RenderError> {
                Err(RenderError::new("broken"))
            }
        }

        let mut runtime = StdRuntime::new(EngineConfig::default()).expect("runtime");
        runtime.engine_mut().mount(Broken).expect("mount");

        let err = runtime
            .run(&AtomicBool::new(false))
            .expect_err("render fails");
        assert!(matches!(err, EngineError::Render { .. }));
    }

    #[test]
    fn auto_update_marks_target_dirty_until_stopped() {
        let mut runtime = StdRuntime::new(EngineConfig::default()).expect("runtime");
        let renders = Arc::new(AtomicUsize::new(0));
        let id = runtime
            .engine_mut()
            .mount(Ticker {
                renders: renders.clone(),
            })
            .expect("mount");
        runtime.engine_mut().consume_all().expect("settle");

        let mut ticker = AutoUpdate::spawn(runtime.handle(), id, Duration::from_millis(1));
        assert!(runtime
            .engine_mut()
            .wait_for_action(Duration::from_secs(5)));
        ticker.stop();
        assert!(!ticker.is_running());

        runtime.engine_mut().consume_all().expect("settle");
        assert!(renders.load(Ordering::SeqCst) >= 2);
    }

    #[test]
    fn auto_update_ends_when_the_engine_closes() {
        let mut runtime = StdRuntime::new(EngineConfig::default()).expect("runtime");
        let target = runtime
            .engine_mut()
            .mount(Ticker {
                renders: Arc::new(AtomicUsize::new(0)),
            })
            .expect("mount");
        let handle = runtime.handle();
        drop(runtime);

        let ticker = AutoUpdate::spawn(handle, target, Duration::from_millis(1));
        for _ in 0..500 {
            if !ticker.is_running() {
                break;
            }
            thread::sleep(Duration::from_millis(2));
        }
        assert!(!ticker.is_running());
    }
}
