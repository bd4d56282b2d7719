use std::hint::black_box;
use std::time::Duration;

use criterion::{Criterion, criterion_group, criterion_main};
use zilog_z80::{EventKinds, ProgramImage, SystemConfig, Z80System};

fn criterion_config() -> Criterion {
    match std::env::var("Z80_BENCH_PROFILE").as_deref() {
        Ok("ci") => Criterion::default()
            .warm_up_time(Duration::from_millis(150))
            .measurement_time(Duration::from_millis(400))
            .sample_size(20),
        _ => Criterion::default()
            .warm_up_time(Duration::from_secs(1))
            .measurement_time(Duration::from_secs(2))
            .sample_size(50),
    }
}

/// LD HL,0; INC HL; LD A,(HL); ADD A,B; DJNZ back to INC HL; JR to start.
const LOOP: &[u8] = &[
    0x21, 0x00, 0x00, 0x23, 0x7E, 0x80, 0x10, 0xFB, 0x18, 0xF6,
];

fn system() -> Z80System {
    let mut system = Z80System::new(&SystemConfig::default()).expect("default config");
    system
        .load(&ProgramImage::new(0, LOOP.to_vec()))
        .expect("program fits");
    system
}

fn bench_ticks(c: &mut Criterion) {
    let mut group = c.benchmark_group("z80");

    let mut bare = system();
    group.bench_function("tick_10k", |b| {
        b.iter(|| {
            for _ in 0..10_000 {
                let _ = black_box(bare.tick());
            }
        });
    });

    let mut observed = system();
    let mut cycles = 0u64;
    observed.observe(
        EventKinds::CYCLE_END,
        Box::new(move |state, _| cycles = cycles.wrapping_add(u64::from(state.cycle_t_states))),
    );
    group.bench_function("tick_10k_observed", |b| {
        b.iter(|| {
            for _ in 0..10_000 {
                let _ = black_box(observed.tick());
            }
        });
    });

    let mut stepped = system();
    group.bench_function("step_1k_instructions", |b| {
        b.iter(|| black_box(stepped.step_instructions(1_000)));
    });

    group.finish();
}

criterion_group! {
    name = benches;
    config = criterion_config();
    targets = bench_ticks
}
criterion_main!(benches);
