//! Criterion benchmarks comparing the GPU ping-pong loop with the CPU
//! reference.
//!
//! To run the benchmarks use `cargo bench`.  The GPU bench includes the
//! blocking read-back after every iteration, which makes it representative
//! of the loop's real per-iteration latency rather than raw kernel
//! throughput.

use criterion::{criterion_group, criterion_main, Criterion};

use pingpong_compute::reference::{seeded_points, simulate};
use pingpong_compute::{GpuContext, IterationDriver, Program, SimParams};

const ITERATIONS: usize = 10;

fn pingpong_benchmark(c: &mut Criterion) {
    // Establish a single GPU context and program up front so that device
    // and pipeline creation is not included in the benchmark.
    let context = GpuContext::new_blocking().expect("failed to initialise GPU context");
    let program = Program::integrate(&context).expect("failed to build integration kernel");
    let params = SimParams::default();

    for n in [256usize, 2048] {
        let initial = seeded_points(n, 42);
        c.bench_function(&format!("gpu pingpong n={n}"), |bencher| {
            bencher.iter(|| {
                let mut driver = IterationDriver::new(&context, &program, &initial, params)
                    .expect("failed to create driver");
                driver.run(ITERATIONS, |_, _| {}).expect("loop failed");
            });
        });
        c.bench_function(&format!("cpu reference n={n}"), |bencher| {
            bencher.iter(|| simulate(&initial, &params, ITERATIONS));
        });
    }
}

criterion_group!(benches, pingpong_benchmark);
criterion_main!(benches);
