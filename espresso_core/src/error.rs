use thiserror::Error;

/// Typed view of a failed link call.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LinkFault {
    /// Bad packet dropped; the stream is resynchronising.
    #[error("framing error: {0}")]
    Framing(String),
    #[error("telemetry timeout")]
    Timeout,
    #[error("device not connected")]
    Disconnected,
    /// The device cannot express the requested command.
    #[error("command rejected: {0}")]
    Rejected(String),
    #[error("io error: {0}")]
    Io(String),
}

#[derive(Debug, Error, Clone)]
pub enum BrewError {
    #[error("configuration error: {0}")]
    Config(String),
    #[error("link error: {0}")]
    Link(LinkFault),
    #[error("io error: {0}")]
    Io(String),
    #[error("invalid state: {0}")]
    State(String),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BuildError {
    #[error("duplicate mode title: {0:?}")]
    DuplicateMode(String),
    #[error("initial mode {0:?} is not registered")]
    UnknownInitialMode(String),
    #[error("invalid profile {name:?}: {reason}")]
    InvalidProfile { name: String, reason: String },
}

pub type Result<T> = eyre::Result<T>;
pub use eyre::Report;
