use criterion::{BatchSize, Criterion, black_box, criterion_group, criterion_main};
use espresso_core::modes::NINE_BAR;
use espresso_core::{
    ControlOutput, LinkTiming, MachineInterface, MachineShared, Mode, ModeParams, ModeRegistry,
    ModeSpec, ShotParams, Supervisor,
};
use espresso_hardware::{PlantParams, SimulatedMachine};
use espresso_traits::MachineState;
use std::time::Duration;

fn hot(t: f64, pressure: f32, weight: f32) -> MachineState {
    MachineState {
        sample_time: t,
        pressure,
        weight,
        water_temp: 93.0,
        group_temp: 93.0,
        ..MachineState::default()
    }
}

// One logic tick of the sequencer with pre-built states.
fn bench_sequencer_tick(c: &mut Criterion) {
    let states: Vec<MachineState> = (0..1_000)
        .map(|i| {
            let t = f64::from(i) * 0.01;
            hot(t, (t as f32 * 0.9).min(9.0), (t as f32 * 1.8 - 5.0).max(0.0))
        })
        .collect();
    c.bench_function("shot_sequencer_1k_ticks", |b| {
        b.iter_batched(
            || ModeSpec::Shot(ShotParams::default()).instantiate(),
            |mut mode| {
                let mut out = ControlOutput::default();
                mode.start();
                for s in &states {
                    mode.run(black_box(s), &mut out);
                }
                black_box(out)
            },
            BatchSize::SmallInput,
        );
    });
}

// Full interleaved I/O + logic tick against the unpaced simulator.
fn bench_full_tick(c: &mut Criterion) {
    c.bench_function("io_plus_logic_tick", |b| {
        b.iter_batched(
            || {
                let sim =
                    SimulatedMachine::new(PlantParams::default(), 9, Duration::from_millis(10));
                let shared = MachineShared::new();
                let machine = MachineInterface::new(sim, shared.clone(), LinkTiming::default());
                let registry = ModeRegistry::builder()
                    .with_standard_modes(&ModeParams::default())
                    .build()
                    .unwrap();
                let mut sup = Supervisor::new(registry, NINE_BAR).unwrap();
                sup.start();
                (machine, sup, shared)
            },
            |(mut machine, mut sup, shared)| {
                for _ in 0..100 {
                    machine.tick();
                    let state = shared.state();
                    shared.with_output(|out| sup.tick(&state, out));
                }
                black_box(shared.output())
            },
            BatchSize::SmallInput,
        );
    });
}

criterion_group!(benches, bench_sequencer_tick, bench_full_tick);
criterion_main!(benches);
