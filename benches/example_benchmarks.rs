use codspeed_criterion_compat::{criterion_group, criterion_main, Criterion};
use tablesynth::Task;

const BENCHMARKS: &[&str] = &["grouped_bars", "spread_wide", "running_total"];

fn run_task(task: &Task) {
    task.run().unwrap();
}

pub fn criterion_benchmark(c: &mut Criterion) {
    for name in BENCHMARKS {
        let filename = format!("tests/tasks/{}.json", name);
        let task = Task::load(filename.as_ref()).unwrap();
        c.bench_function(name, |b| b.iter(|| run_task(&task)));
    }
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
