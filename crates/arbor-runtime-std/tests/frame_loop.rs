use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use arbor_core::EngineConfig;
use arbor_runtime_std::{AutoUpdate, StdRuntime};
use arbor_testing::{Counter, Probe, RenderLog};

#[test]
fn frame_loop_serves_producers_on_other_threads() {
    let mut runtime =
        StdRuntime::new(EngineConfig::default().with_update_rate(240)).expect("runtime");
    let id = runtime
        .engine_mut()
        .mount(Counter::new(0))
        .expect("counter");
    let stop = Arc::new(AtomicBool::new(false));

    let producers: Vec<_> = (0..4)
        .map(|_| {
            let handle = runtime.handle();
            thread::spawn(move || {
                for _ in 0..25 {
                    Counter::increment(&handle, id).expect("increment");
                    thread::sleep(Duration::from_micros(200));
                }
            })
        })
        .collect();
    let closer = {
        let handle = runtime.handle();
        let stop = stop.clone();
        thread::spawn(move || {
            for producer in producers {
                producer.join().expect("producer");
            }
            // Queued behind every increment, so it runs once they have.
            handle
                .defer(None, move |_| stop.store(true, Ordering::SeqCst))
                .expect("defer");
        })
    };

    runtime.run(&stop).expect("frame loop");
    closer.join().expect("closer");
    runtime.engine_mut().consume_all().expect("settle");

    let value = runtime
        .engine_mut()
        .with_component(id, |counter: &mut Counter| counter.value)
        .expect("counter");
    assert_eq!(value, 100);
}

#[test]
fn auto_update_keeps_re_rendering_a_probe() {
    let log = RenderLog::new();
    let mut runtime = StdRuntime::new(EngineConfig::default()).expect("runtime");
    let id = runtime
        .engine_mut()
        .mount(Probe::new("clock", &log))
        .expect("probe");
    runtime.engine_mut().consume_all().expect("settle");

    let ticker = AutoUpdate::spawn(runtime.handle(), id, Duration::from_millis(1));
    while log.count("render clock") < 4 {
        if runtime
            .engine_mut()
            .wait_for_action(Duration::from_secs(5))
        {
            runtime.run_frame().expect("frame");
        } else {
            panic!("auto update stopped ticking");
        }
    }
    drop(ticker);

    assert!(log.count("render clock") >= 4);
}
