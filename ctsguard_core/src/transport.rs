//! Interface to the device channel.
//!
//! Opening ports, baud negotiation and reconnects belong to the host. The
//! engine only pulls lines through [`TelemetrySource`] and pushes commands
//! through [`CommandSink`].

use crate::telemetry::DeviceCommand;
use crate::{Error, Result};
use std::io::{BufRead, ErrorKind, Write};

/// Result of asking the channel for a line
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SourcePoll {
    /// A complete line, without its terminator
    Line(String),
    /// Nothing arrived within the read timeout
    NoData,
    /// The channel reached end of stream
    Closed,
}

/// Pull-based supplier of raw telemetry lines
pub trait TelemetrySource {
    fn poll_line(&mut self) -> Result<SourcePoll>;
}

/// Receiver of outbound device commands
pub trait CommandSink {
    fn send(&mut self, command: DeviceCommand) -> Result<()>;
}

/// Telemetry source over any buffered reader (file, pipe, serial handle)
pub struct ReaderSource<R> {
    reader: R,
    buffer: String,
}

impl<R: BufRead> ReaderSource<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            buffer: String::new(),
        }
    }
}

impl<R: BufRead> ReaderSource<R> {
    fn take_line(&mut self) -> SourcePoll {
        let line = self.buffer.trim_end_matches(['\n', '\r']).to_string();
        self.buffer.clear();
        SourcePoll::Line(line)
    }
}

impl<R: BufRead> TelemetrySource for ReaderSource<R> {
    fn poll_line(&mut self) -> Result<SourcePoll> {
        // A partial line left by a timed-out read stays buffered until its
        // terminator arrives
        match self.reader.read_line(&mut self.buffer) {
            Ok(0) if self.buffer.is_empty() => Ok(SourcePoll::Closed),
            Ok(_) => Ok(self.take_line()),
            // Read timeouts are the normal "no sample yet" case
            Err(e) if matches!(e.kind(), ErrorKind::TimedOut | ErrorKind::WouldBlock) => {
                Ok(SourcePoll::NoData)
            }
            Err(e) if e.kind() == ErrorKind::InvalidData => {
                tracing::warn!("Dropping non-UTF-8 telemetry: {}", e);
                self.buffer.clear();
                Ok(SourcePoll::NoData)
            }
            Err(e) => Err(Error::TransportUnavailable(e.to_string())),
        }
    }
}

/// Command sink writing newline-terminated tokens to any writer
pub struct WriterCommandSink<W> {
    writer: W,
}

impl<W: Write> WriterCommandSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> CommandSink for WriterCommandSink<W> {
    fn send(&mut self, command: DeviceCommand) -> Result<()> {
        self.writer
            .write_all(command.encode().as_bytes())
            .and_then(|_| self.writer.flush())
            .map_err(|e| Error::TransportUnavailable(e.to_string()))?;
        tracing::debug!("Sent {} to device", command);
        Ok(())
    }
}
