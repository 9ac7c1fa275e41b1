#![no_main]
use espresso_hardware::codec::{ChannelSet, FrameSync, TelemetryLayout};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|input: (u8, u8, Vec<Vec<u8>>)| {
    let (n, set, chunks) = input;
    let channels = match set % 3 {
        0 => ChannelSet::Basic,
        1 => ChannelSet::DualTemp,
        _ => ChannelSet::Weighted,
    };
    let layout = TelemetryLayout::new(usize::from(n % 16) + 1, channels);
    let mut sync = FrameSync::new(layout);
    for chunk in &chunks {
        sync.push(chunk);
        while let Some(frame) = sync.next_frame() {
            if let Ok(frame) = frame {
                assert_eq!(frame.values().len(), layout.floats());
            }
        }
        // Once drained, only a partial packet can remain.
        assert!(sync.buffered() < layout.packet_size());
    }
});
