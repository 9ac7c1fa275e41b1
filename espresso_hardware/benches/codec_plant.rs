use criterion::{BatchSize, Criterion, black_box, criterion_group, criterion_main};
use espresso_hardware::codec::{
    ChannelSet, FrameSync, TelemetryFrame, TelemetryLayout, decode_telemetry, encode_telemetry,
};
use espresso_hardware::sim::{Plant, PlantParams};
use espresso_traits::{FlowDirection, MachineCommand, MachineState, PumpMode};

fn bench_decode(c: &mut Criterion) {
    let mut g = c.benchmark_group("telemetry");
    for n in [10usize, 50] {
        let layout = TelemetryLayout::new(n, ChannelSet::Weighted);
        let values = (0..layout.floats()).map(|i| i as f32 * 0.5).collect();
        let Some(frame) = TelemetryFrame::new(layout, values) else {
            continue;
        };
        let bytes = encode_telemetry(&frame);

        g.bench_function(format!("decode_n{n}"), |b| {
            b.iter(|| black_box(decode_telemetry(black_box(&bytes), &layout)));
        });

        // Stream with a few junk bytes in front of every third packet.
        let mut stream = Vec::new();
        for i in 0..64 {
            if i % 3 == 0 {
                stream.extend_from_slice(&[0x00, 0x7f, 0x13]);
            }
            stream.extend_from_slice(&bytes);
        }
        g.bench_function(format!("sync_n{n}"), |b| {
            b.iter_batched(
                || FrameSync::new(layout),
                |mut sync| {
                    for chunk in stream.chunks(64) {
                        sync.push(chunk);
                        while let Some(f) = sync.next_frame() {
                            black_box(f.is_ok());
                        }
                    }
                },
                BatchSize::SmallInput,
            )
        });
    }
    g.finish();
}

fn bench_plant(c: &mut Criterion) {
    let cmd = MachineCommand {
        pump_cmd: 9.0,
        water_temp_cmd: 93.0,
        group_temp_cmd: 93.0,
        pump_mode: PumpMode::Pressure,
        flow_direction: FlowDirection::Group,
        ..MachineCommand::default()
    };
    c.bench_function("plant_step_1000", |b| {
        b.iter_batched(
            || Plant::new(PlantParams::default(), 0xC0FFEE),
            |mut plant| {
                let mut s = MachineState::default();
                for _ in 0..1000 {
                    s = plant.step(&s, &cmd, 0.01);
                }
                black_box(s)
            },
            BatchSize::SmallInput,
        )
    });
}

criterion_group!(codec_plant, bench_decode, bench_plant);
criterion_main!(codec_plant);
