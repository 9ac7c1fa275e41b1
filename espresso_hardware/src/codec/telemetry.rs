//! Fixed-size telemetry packets.
//!
//! Wire format:
//! ```text
//! ┌──────────┬──────────────────────────────────────────┐
//! │ "ES" (2B)│ N samples × K channels × f32 LE (N·K·4 B) │
//! └──────────┴──────────────────────────────────────────┘
//! ```
//!
//! The device pushes packets continuously. [`FrameSync`] accumulates raw
//! bytes from the port and cuts them into packets, realigning on the magic
//! tag whenever a header does not match.

use espresso_traits::MachineState;

use crate::error::FramingError;
use crate::util::{get_f32s_le, put_f32s_le};

/// Packet header.
pub const MAGIC: [u8; 2] = *b"ES";

/// One telemetry channel as carried on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    Pressure,
    Flow,
    Weight,
    WaterTemp,
    GroupTemp,
    /// Single boiler probe; reported as both water and heater temperature.
    Temp,
}

/// Channel tuple of one deployment, in wire order.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelSet {
    /// pressure, flow, temp
    Basic,
    /// pressure, flow, water temp, group temp
    DualTemp,
    /// pressure, flow, weight, water temp, group temp
    #[default]
    Weighted,
}

impl ChannelSet {
    pub fn channels(self) -> &'static [Channel] {
        use Channel::*;
        match self {
            Self::Basic => &[Pressure, Flow, Temp],
            Self::DualTemp => &[Pressure, Flow, WaterTemp, GroupTemp],
            Self::Weighted => &[Pressure, Flow, Weight, WaterTemp, GroupTemp],
        }
    }

    /// Floats per sample (K).
    #[inline]
    pub fn width(self) -> usize {
        self.channels().len()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TelemetryLayout {
    /// Samples per packet (N), at least 1.
    pub samples_per_packet: usize,
    pub channels: ChannelSet,
}

impl Default for TelemetryLayout {
    fn default() -> Self {
        Self {
            samples_per_packet: 10,
            channels: ChannelSet::Weighted,
        }
    }
}

impl TelemetryLayout {
    pub fn new(samples_per_packet: usize, channels: ChannelSet) -> Self {
        Self {
            samples_per_packet: samples_per_packet.max(1),
            channels,
        }
    }

    /// Floats per packet (N·K).
    #[inline]
    pub fn floats(&self) -> usize {
        self.samples_per_packet * self.channels.width()
    }

    /// Bytes per packet: `2 + N·K·4`.
    #[inline]
    pub fn packet_size(&self) -> usize {
        MAGIC.len() + self.floats() * 4
    }
}

/// Decoded packet: `samples_per_packet` rows of `channels.width()` floats.
#[derive(Debug, Clone, PartialEq)]
pub struct TelemetryFrame {
    layout: TelemetryLayout,
    values: Vec<f32>,
}

impl TelemetryFrame {
    /// Build a frame from a flat value vector; `None` if the length does not
    /// match the layout.
    pub fn new(layout: TelemetryLayout, values: Vec<f32>) -> Option<Self> {
        (values.len() == layout.floats()).then_some(Self { layout, values })
    }

    pub fn layout(&self) -> TelemetryLayout {
        self.layout
    }

    pub fn values(&self) -> &[f32] {
        &self.values
    }

    pub fn samples(&self) -> impl Iterator<Item = &[f32]> {
        self.values.chunks_exact(self.layout.channels.width())
    }

    /// Most recent sample in the packet.
    pub fn latest(&self) -> Option<&[f32]> {
        self.samples().last()
    }

    /// Build a whole new state from the latest sample. Channels the layout
    /// does not carry keep their value from `prev`.
    pub fn fold_into(&self, prev: &MachineState, sample_time: f64) -> MachineState {
        let mut next = *prev;
        next.sample_time = sample_time;
        let Some(sample) = self.latest() else {
            return next;
        };
        for (ch, v) in self.layout.channels.channels().iter().zip(sample) {
            match ch {
                Channel::Pressure => next.pressure = *v,
                Channel::Flow => next.flow = *v,
                Channel::Weight => next.weight = *v,
                Channel::WaterTemp => next.water_temp = *v,
                Channel::GroupTemp => next.group_temp = *v,
                Channel::Temp => {
                    next.water_temp = *v;
                    next.heater_temp = *v;
                }
            }
        }
        next
    }
}

/// Decode one complete packet.
pub fn decode_telemetry(
    buf: &[u8],
    layout: &TelemetryLayout,
) -> Result<TelemetryFrame, FramingError> {
    let expected = layout.packet_size();
    if buf.len() != expected {
        return Err(FramingError::Length {
            expected,
            actual: buf.len(),
        });
    }
    if buf[..2] != MAGIC {
        return Err(FramingError::Magic {
            found: [buf[0], buf[1]],
        });
    }
    Ok(TelemetryFrame {
        layout: *layout,
        values: get_f32s_le(&buf[2..]),
    })
}

/// Encode a frame as the device would send it.
pub fn encode_telemetry(frame: &TelemetryFrame) -> Vec<u8> {
    let mut out = Vec::with_capacity(frame.layout.packet_size());
    out.extend_from_slice(&MAGIC);
    put_f32s_le(&mut out, &frame.values);
    out
}

/// Streaming packet splitter with header resynchronisation.
#[derive(Debug)]
pub struct FrameSync {
    layout: TelemetryLayout,
    buf: Vec<u8>,
}

impl FrameSync {
    pub fn new(layout: TelemetryLayout) -> Self {
        Self {
            layout,
            buf: Vec::with_capacity(layout.packet_size() * 2),
        }
    }

    pub fn layout(&self) -> TelemetryLayout {
        self.layout
    }

    /// Bytes held that do not yet form a packet.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    pub fn push(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Drop everything buffered (e.g. after a reconnect).
    pub fn reset(&mut self) {
        self.buf.clear();
    }

    /// Next packet, if one is complete.
    ///
    /// A header mismatch discards bytes up to the next `ES` candidate and is
    /// reported once as `Some(Err(..))`; calling again continues from the
    /// realigned position. Partial packets stay buffered.
    pub fn next_frame(&mut self) -> Option<Result<TelemetryFrame, FramingError>> {
        if self.buf.len() < MAGIC.len() {
            return None;
        }
        if self.buf[..2] != MAGIC {
            let found = [self.buf[0], self.buf[1]];
            let skip = self.next_candidate();
            self.buf.drain(..skip);
            tracing::trace!(skipped = skip, "telemetry resync");
            return Some(Err(FramingError::Magic { found }));
        }
        let size = self.layout.packet_size();
        if self.buf.len() < size {
            return None;
        }
        let frame = decode_telemetry(&self.buf[..size], &self.layout);
        self.buf.drain(..size);
        Some(frame)
    }

    // Offset of the next byte that could start a header. A lone trailing 'E'
    // is kept since its 'S' may still be in flight.
    fn next_candidate(&self) -> usize {
        let n = self.buf.len();
        (1..n)
            .find(|&i| self.buf[i] == MAGIC[0] && (i + 1 == n || self.buf[i + 1] == MAGIC[1]))
            .unwrap_or(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(layout: TelemetryLayout, base: f32) -> TelemetryFrame {
        let values = (0..layout.floats()).map(|i| base + i as f32).collect();
        TelemetryFrame::new(layout, values).unwrap()
    }

    #[test]
    fn packet_sizes_match_layouts() {
        assert_eq!(TelemetryLayout::new(10, ChannelSet::Weighted).packet_size(), 202);
        assert_eq!(TelemetryLayout::new(50, ChannelSet::DualTemp).packet_size(), 802);
        assert_eq!(TelemetryLayout::new(10, ChannelSet::Basic).packet_size(), 122);
        assert_eq!(TelemetryLayout::new(0, ChannelSet::Basic).samples_per_packet, 1);
    }

    #[test]
    fn fold_keeps_untransmitted_channels() {
        let layout = TelemetryLayout::new(2, ChannelSet::DualTemp);
        let f = TelemetryFrame::new(layout, vec![1.0, 2.0, 3.0, 4.0, 9.0, 1.5, 93.0, 88.0]).unwrap();
        let prev = MachineState {
            weight: 12.0,
            heater_temp: 95.0,
            ..MachineState::default()
        };
        let s = f.fold_into(&prev, 3.5);
        assert_eq!(s.sample_time, 3.5);
        assert_eq!((s.pressure, s.flow, s.water_temp, s.group_temp), (9.0, 1.5, 93.0, 88.0));
        assert_eq!((s.weight, s.heater_temp), (12.0, 95.0));
    }

    #[test]
    fn basic_temp_feeds_water_and_heater() {
        let layout = TelemetryLayout::new(1, ChannelSet::Basic);
        let f = TelemetryFrame::new(layout, vec![2.0, 0.5, 91.0]).unwrap();
        let s = f.fold_into(&MachineState::default(), 0.0);
        assert_eq!((s.water_temp, s.heater_temp, s.group_temp), (91.0, 91.0, 0.0));
    }

    #[test]
    fn sync_handles_split_packets() {
        let layout = TelemetryLayout::new(2, ChannelSet::Weighted);
        let bytes = encode_telemetry(&frame(layout, 1.0));
        let mut sync = FrameSync::new(layout);
        sync.push(&bytes[..7]);
        assert!(sync.next_frame().is_none());
        sync.push(&bytes[7..]);
        assert_eq!(sync.next_frame(), Some(Ok(frame(layout, 1.0))));
        assert!(sync.next_frame().is_none());
        assert_eq!(sync.buffered(), 0);
    }

    #[test]
    fn sync_keeps_trailing_header_byte() {
        let layout = TelemetryLayout::new(1, ChannelSet::Basic);
        let mut sync = FrameSync::new(layout);
        sync.push(b"xxE");
        assert!(matches!(sync.next_frame(), Some(Err(FramingError::Magic { .. }))));
        assert_eq!(sync.buffered(), 1);
    }
}
