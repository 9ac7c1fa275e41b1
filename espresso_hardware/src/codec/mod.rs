//! Telemetry framing and command encoding for the machine link.

pub mod command;
pub mod telemetry;

pub use command::{
    AsciiEncoder, AsciiToken, CommandEncoder, PACKED_COMMAND_SIZE, PackedEncoder, decode_command,
    encode_command, parse_ascii_token,
};
pub use telemetry::{
    Channel, ChannelSet, FrameSync, MAGIC, TelemetryFrame, TelemetryLayout, decode_telemetry,
    encode_telemetry,
};

/// Which command encoder a link speaks.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum CommandCodec {
    #[default]
    Ascii,
    Packed,
}

impl CommandCodec {
    pub fn encoder(self) -> Box<dyn CommandEncoder> {
        match self {
            Self::Ascii => Box::new(AsciiEncoder::new()),
            Self::Packed => Box::new(PackedEncoder),
        }
    }
}
