use arbor_core::{Composer, ComposerId, Context, Engine, EngineConfig, RenderError, UpdateManager};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

const DEPTH: usize = 6;
const FAN_OUT_SAMPLES: &[usize] = &[2, 3, 4];

struct Leaf {
    renders: u64,
}

impl Composer for Leaf {
    fn render(&mut self, _ctx: &mut Context<'_>) -> Result<(), RenderError> {
        self.renders = black_box(self.renders + 1);
        Ok(())
    }
}

struct TreeFixture {
    engine: Engine,
    ids: Vec<ComposerId>,
}

impl TreeFixture {
    fn new(depth: usize, fan_out: usize) -> Self {
        let mut engine = Engine::new(EngineConfig::default()).expect("engine");
        let root = engine.mount(Leaf { renders: 0 }).expect("root");
        let mut ids = vec![root];
        let mut level = vec![root];
        for _ in 1..depth {
            let mut next = Vec::with_capacity(level.len() * fan_out);
            for parent in &level {
                for _ in 0..fan_out {
                    let child = engine
                        .mount_child(*parent, Leaf { renders: 0 })
                        .expect("child");
                    next.push(child);
                }
            }
            ids.extend_from_slice(&next);
            level = next;
        }
        engine.consume_all().expect("initial pass");
        Self { engine, ids }
    }

    fn dirty_everything(&mut self) {
        // Deepest first so the pass has to reorder.
        for id in self.ids.iter().rev() {
            self.engine.schedule_update(*id);
        }
    }
}

fn component_count(depth: usize, fan_out: usize) -> usize {
    (0..depth).map(|level| fan_out.pow(level as u32)).sum()
}

fn bench_update_pass(c: &mut Criterion) {
    let mut group = c.benchmark_group("update_pass");
    for &fan_out in FAN_OUT_SAMPLES {
        group.bench_with_input(
            BenchmarkId::new("components", component_count(DEPTH, fan_out)),
            &fan_out,
            |b, &fan_out| {
                let mut fixture = TreeFixture::new(DEPTH, fan_out);
                b.iter(|| {
                    fixture.dirty_everything();
                    let report = fixture.engine.consume().expect("consume");
                    black_box(report);
                });
            },
        );
    }
    group.finish();
}

fn bench_dispatch_cycle(c: &mut Criterion) {
    let mut fixture = TreeFixture::new(DEPTH, 3);
    let handle = fixture.engine.handle();
    let targets: Vec<_> = fixture.ids.iter().step_by(7).copied().collect();

    c.bench_function("dispatch_cycle", |b| {
        b.iter(|| {
            for id in &targets {
                handle
                    .dispatch(*id, |ctx| {
                        ctx.update();
                    })
                    .expect("dispatch");
            }
            let report = fixture.engine.consume().expect("consume");
            black_box(report);
        });
    });
}

fn bench_update_manager(c: &mut Criterion) {
    c.bench_function("update_manager_add_done", |b| {
        b.iter(|| {
            let mut updates = UpdateManager::<usize>::new();
            for key in 0..1024usize {
                updates.add(key, key % 16);
            }
            let mut visited = 0;
            updates.for_each(|_, _| visited += 1);
            for key in 0..1024usize {
                updates.done(key, key % 16);
            }
            black_box((visited, updates.is_empty()));
        });
    });
}

criterion_group!(
    update_pass,
    bench_update_pass,
    bench_dispatch_cycle,
    bench_update_manager
);
criterion_main!(update_pass);
