use espresso_traits::PumpMode;
use thiserror::Error;

/// Telemetry packet rejected by the decoder. Always recoverable: the packet
/// is dropped and the stream resynchronises on the next header.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FramingError {
    #[error("packet is {actual} bytes, expected {expected}")]
    Length { expected: usize, actual: usize },
    #[error("bad magic {found:02x?}, expected \"ES\"")]
    Magic { found: [u8; 2] },
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum CodecError {
    #[error("pump mode {0:?} cannot be expressed as an ascii command")]
    Unsupported(PumpMode),
    #[error("unknown command token: {0:?}")]
    UnknownToken(String),
    #[error("malformed value in {0:?}")]
    BadValue(String),
}

#[derive(Debug, Error)]
pub enum HwError {
    #[error("device not connected")]
    NotConnected,
    #[error("short read: got {got} of {expected} bytes")]
    ShortRead { expected: usize, got: usize },
    #[error("telemetry read timeout")]
    Timeout,
    #[error("framing error: {0}")]
    Framing(#[from] FramingError),
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, HwError>;
