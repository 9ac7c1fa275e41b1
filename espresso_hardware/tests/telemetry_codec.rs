use espresso_hardware::FramingError;
use espresso_hardware::codec::{
    ChannelSet, FrameSync, MAGIC, TelemetryFrame, TelemetryLayout, decode_telemetry,
    encode_telemetry,
};
use proptest::prelude::*;
use rstest::rstest;

fn layout_strategy() -> impl Strategy<Value = TelemetryLayout> {
    (
        prop_oneof![Just(1usize), Just(10), Just(50), 2usize..8],
        prop_oneof![
            Just(ChannelSet::Basic),
            Just(ChannelSet::DualTemp),
            Just(ChannelSet::Weighted)
        ],
    )
        .prop_map(|(n, ch)| TelemetryLayout::new(n, ch))
}

prop_compose! {
    // Arbitrary bit patterns, NaNs and infinities included.
    fn frame_strategy()(layout in layout_strategy())
        (values in proptest::collection::vec(any::<u32>().prop_map(f32::from_bits), layout.floats()),
         layout in Just(layout)) -> TelemetryFrame {
        TelemetryFrame::new(layout, values).unwrap()
    }
}

fn bits(f: &TelemetryFrame) -> Vec<u32> {
    f.values().iter().map(|v| v.to_bits()).collect()
}

proptest! {
    #[test]
    fn decode_inverts_encode_bit_exact(frame in frame_strategy()) {
        let bytes = encode_telemetry(&frame);
        prop_assert_eq!(bytes.len(), frame.layout().packet_size());
        let back = decode_telemetry(&bytes, &frame.layout()).unwrap();
        prop_assert_eq!(bits(&back), bits(&frame));
    }

    #[test]
    fn wrong_length_is_framing_error_and_next_packet_decodes(
        frame in frame_strategy(),
        delta in prop_oneof![-200isize..-1, 1isize..200],
    ) {
        let layout = frame.layout();
        let good = encode_telemetry(&frame);
        let len = (good.len() as isize + delta).max(0) as usize;
        let mut bad = good.clone();
        bad.resize(len, 0xAB);
        let err = decode_telemetry(&bad, &layout).unwrap_err();
        prop_assert_eq!(err, FramingError::Length { expected: good.len(), actual: len });
        let back = decode_telemetry(&good, &layout).unwrap();
        prop_assert_eq!(bits(&back), bits(&frame));
    }

    #[test]
    fn stream_resyncs_after_garbage(
        frame in frame_strategy(),
        garbage in proptest::collection::vec(any::<u8>().prop_filter("no header byte", |b| *b != b'E'), 1..64),
    ) {
        let layout = frame.layout();
        let mut sync = FrameSync::new(layout);
        sync.push(&garbage);
        sync.push(&encode_telemetry(&frame));

        let mut errors = 0;
        let mut decoded = None;
        while let Some(next) = sync.next_frame() {
            match next {
                Ok(f) => decoded = Some(f),
                Err(FramingError::Magic { .. }) => errors += 1,
                Err(e) => prop_assert!(false, "unexpected {e:?}"),
            }
        }
        prop_assert_eq!(errors, 1);
        let decoded = decoded.unwrap();
        prop_assert_eq!(bits(&decoded), bits(&frame));
    }
}

#[rstest]
#[case(*b"XS")]
#[case(*b"SE")]
#[case(*b"es")]
fn bad_magic_is_rejected(#[case] header: [u8; 2]) {
    let layout = TelemetryLayout::new(1, ChannelSet::DualTemp);
    let mut bytes = encode_telemetry(&TelemetryFrame::new(layout, vec![1.0; 4]).unwrap());
    bytes[..2].copy_from_slice(&header);
    assert_eq!(
        decode_telemetry(&bytes, &layout),
        Err(FramingError::Magic { found: header })
    );
}

#[test]
fn truncated_packet_then_valid_packet() {
    let layout = TelemetryLayout::new(10, ChannelSet::Weighted);
    let frame = TelemetryFrame::new(layout, (0..50).map(|i| i as f32).collect()).unwrap();
    let good = encode_telemetry(&frame);

    assert!(matches!(
        decode_telemetry(&good[..good.len() - 3], &layout),
        Err(FramingError::Length { .. })
    ));
    assert_eq!(decode_telemetry(&good, &layout), Ok(frame));
}

#[test]
fn back_to_back_packets_split_cleanly() {
    let layout = TelemetryLayout::new(2, ChannelSet::Basic);
    let a = TelemetryFrame::new(layout, vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]).unwrap();
    let b = TelemetryFrame::new(layout, vec![7.0, 8.0, 9.0, 10.0, 11.0, 12.0]).unwrap();
    let mut stream = encode_telemetry(&a);
    stream.extend(encode_telemetry(&b));
    assert_eq!(&stream[..2], &MAGIC);

    let mut sync = FrameSync::new(layout);
    for chunk in stream.chunks(5) {
        sync.push(chunk);
    }
    assert_eq!(sync.next_frame(), Some(Ok(a)));
    assert_eq!(sync.next_frame(), Some(Ok(b)));
    assert_eq!(sync.next_frame(), None);
}
