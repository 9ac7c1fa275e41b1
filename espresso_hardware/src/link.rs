//! Machine link over a byte stream (TCP bridge, serial adapter, simulator).
//!
//! `StreamLink` owns the port, a [`FrameSync`] for inbound telemetry and a
//! [`CommandEncoder`] for outbound commands. A link may be built without a
//! port; every I/O call then fails with [`HwError::NotConnected`] until one
//! is attached.

use std::io::{ErrorKind, Read, Write};
use std::net::TcpStream;
use std::time::{Duration, Instant};

use espresso_traits::{Clock, LinkError, MachineCommand, MachineLink, MachineState, MonotonicClock};

use crate::codec::{CommandCodec, CommandEncoder, FrameSync, TelemetryLayout};
use crate::error::{HwError, Result};

/// Byte port a link can drive.
pub trait Port: Read + Write + Send {
    fn set_read_timeout(&mut self, timeout: Option<Duration>) -> std::io::Result<()>;
}

impl Port for TcpStream {
    fn set_read_timeout(&mut self, timeout: Option<Duration>) -> std::io::Result<()> {
        // A zero timeout is rejected by the OS; clamp to the smallest slice.
        TcpStream::set_read_timeout(self, timeout.map(|t| t.max(Duration::from_millis(1))))
    }
}

pub struct StreamLink<P: Port> {
    port: Option<P>,
    sync: FrameSync,
    encoder: Box<dyn CommandEncoder>,
    clock: Box<dyn Clock + Send>,
    epoch: Instant,
    last: MachineState,
    scratch: Vec<u8>,
}

impl<P: Port> StreamLink<P> {
    /// Link with no device behind it.
    pub fn disconnected(layout: TelemetryLayout, codec: CommandCodec) -> Self {
        let clock = MonotonicClock::new();
        Self {
            port: None,
            sync: FrameSync::new(layout),
            encoder: codec.encoder(),
            epoch: clock.now(),
            clock: Box::new(clock),
            last: MachineState::default(),
            scratch: vec![0; layout.packet_size().max(64)],
        }
    }

    /// Connect to `port` and send the encoder's opening handshake.
    pub fn open(port: P, layout: TelemetryLayout, codec: CommandCodec) -> Result<Self> {
        let mut link = Self::disconnected(layout, codec);
        link.attach(port)?;
        Ok(link)
    }

    /// Timestamp samples with `clock` instead of the wall clock.
    pub fn with_clock(mut self, clock: impl Clock + Send + 'static) -> Self {
        self.epoch = clock.now();
        self.clock = Box::new(clock);
        self
    }

    pub fn attach(&mut self, mut port: P) -> Result<()> {
        let hello = self.encoder.open();
        if !hello.is_empty() {
            port.write_all(&hello)?;
            port.flush()?;
        }
        self.sync.reset();
        self.port = Some(port);
        tracing::info!("machine link attached");
        Ok(())
    }

    pub fn detach(&mut self) -> Option<P> {
        self.sync.reset();
        self.port.take()
    }

    pub fn is_connected(&self) -> bool {
        self.port.is_some()
    }

    pub fn port(&self) -> Option<&P> {
        self.port.as_ref()
    }

    fn stalled(&self) -> HwError {
        match self.sync.buffered() {
            0 => HwError::Timeout,
            got => HwError::ShortRead {
                expected: self.sync.layout().packet_size(),
                got,
            },
        }
    }

    /// Read until at least one packet is complete and fold the newest one
    /// into the state. Older packets in the same burst are skipped.
    pub fn read_state(&mut self, timeout: Duration) -> Result<MachineState> {
        let deadline = self.clock.now() + timeout;
        loop {
            let mut latest = None;
            while let Some(next) = self.sync.next_frame() {
                match next {
                    Ok(frame) => latest = Some(frame),
                    Err(e) if latest.is_none() => return Err(HwError::Framing(e)),
                    Err(e) => {
                        tracing::debug!(error = %e, "telemetry resync after good packet");
                        break;
                    }
                }
            }
            if let Some(frame) = latest {
                let t = self.clock.secs_since(self.epoch);
                self.last = frame.fold_into(&self.last, t);
                return Ok(self.last);
            }

            let now = self.clock.now();
            if now >= deadline {
                return Err(self.stalled());
            }
            let Some(port) = self.port.as_mut() else {
                return Err(HwError::NotConnected);
            };
            port.set_read_timeout(Some(deadline - now))?;
            match port.read(&mut self.scratch) {
                Ok(0) => {
                    tracing::warn!("machine link closed by peer");
                    self.detach();
                    return Err(HwError::NotConnected);
                }
                Ok(n) => self.sync.push(&self.scratch[..n]),
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {
                    return Err(self.stalled());
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    pub fn write_command(&mut self, cmd: &MachineCommand) -> Result<()> {
        let Some(port) = self.port.as_mut() else {
            return Err(HwError::NotConnected);
        };
        let bytes = self.encoder.encode(cmd)?;
        if bytes.is_empty() {
            return Ok(());
        }
        let res = port.write_all(&bytes).and_then(|()| port.flush());
        if let Err(e) = res {
            // The encoder already counts these bytes as sent; force a full
            // resend after reconnecting.
            self.detach();
            return Err(e.into());
        }
        Ok(())
    }

    /// Send the closing handshake and drop the port.
    pub fn shutdown(&mut self) -> Result<()> {
        let bye = self.encoder.close();
        if let Some(mut port) = self.detach() {
            if !bye.is_empty() {
                port.write_all(&bye)?;
                port.flush()?;
            }
        }
        Ok(())
    }
}

impl<P: Port> MachineLink for StreamLink<P> {
    fn sample(&mut self, timeout: Duration) -> std::result::Result<MachineState, LinkError> {
        self.read_state(timeout).map_err(Into::into)
    }

    fn send(&mut self, cmd: &MachineCommand) -> std::result::Result<(), LinkError> {
        self.write_command(cmd).map_err(Into::into)
    }

    fn close(&mut self) -> std::result::Result<(), LinkError> {
        self.shutdown().map_err(Into::into)
    }
}
