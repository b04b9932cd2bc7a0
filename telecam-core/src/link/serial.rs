//! Serial link: sentinel-delimited hex frames in, command bytes out.
//!
//! `serialport` is blocking, so the receiver runs on Tokio's blocking
//! pool. Reads use a short timeout and the cancellation token is checked
//! between reads, which bounds how long `Link::close` waits for it.

use std::io::{self, Read, Write};
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{info, trace};

use crate::command::BlockingWriterSink;
use crate::controller::StreamConfig;
use crate::error::LinkError;
use crate::frame::FrameStore;
use crate::framer::{Extracted, SentinelFramer};
use crate::link::{Link, LinkEndpoint, LinkRuntime};

pub const DEFAULT_BAUD_RATE: u32 = 115_200;
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_millis(50);

const READ_CHUNK: usize = 4096;

#[derive(Debug, Clone)]
pub struct SerialLinkConfig {
    /// Port name, e.g. `/dev/ttyUSB0` or `COM3`.
    pub port: String,
    pub baud_rate: u32,
    /// Upper bound on how long a read blocks before the cancellation
    /// token is checked again.
    pub read_timeout: Duration,
    pub stream: StreamConfig,
}

impl SerialLinkConfig {
    pub fn new(port: impl Into<String>, baud_rate: u32) -> Self {
        Self {
            port: port.into(),
            baud_rate,
            read_timeout: DEFAULT_READ_TIMEOUT,
            stream: StreamConfig::default(),
        }
    }
}

pub struct SerialLink;

impl SerialLink {
    /// Open the port and start the link tasks.
    pub async fn open(config: SerialLinkConfig) -> Result<Link, LinkError> {
        if config.read_timeout.is_zero() {
            return Err(LinkError::InvalidConfig(
                "serial read timeout must be non-zero".into(),
            ));
        }
        let port = serialport::new(&config.port, config.baud_rate)
            .timeout(config.read_timeout)
            .open()?;
        let writer = port.try_clone()?;
        info!(port = %config.port, baud_rate = config.baud_rate, "serial port open");

        let endpoint = LinkEndpoint::Serial {
            port: config.port,
            baud_rate: config.baud_rate,
        };
        Ok(Self::from_io(endpoint, port, writer, &config.stream))
    }

    /// Run a link over any pair of blocking byte streams.
    ///
    /// `reader` should return `TimedOut` or `WouldBlock` periodically
    /// when idle so cancellation is noticed.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    pub fn from_io<R, W>(endpoint: LinkEndpoint, reader: R, writer: W, stream: &StreamConfig) -> Link
    where
        R: Read + Send + 'static,
        W: Write + Send + 'static,
    {
        let store = FrameStore::new(stream.buffer_mode);
        let mut runtime = LinkRuntime::new(endpoint, stream, store.ready_frames());
        let mut framer = SentinelFramer::new(store, runtime.counters());
        let cancel = runtime.cancel_token();

        runtime.spawn_sender(BlockingWriterSink::new(writer));
        runtime.spawn_blocking_receiver(move || pump_serial(reader, &mut framer, &cancel));
        runtime.establish()
    }
}

/// Blocking read loop. Returns `Ok` on cancellation and an error when
/// the stream ends or fails.
pub fn pump_serial<R: Read>(
    mut reader: R,
    framer: &mut SentinelFramer,
    cancel: &CancellationToken,
) -> Result<(), LinkError> {
    let mut buf = vec![0u8; READ_CHUNK];
    while !cancel.is_cancelled() {
        match reader.read(&mut buf) {
            Ok(0) => {
                return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "serial port closed").into());
            }
            Ok(n) => {
                for extracted in framer.feed(&buf[..n]) {
                    if let Extracted::Frame(sequence) = extracted {
                        trace!(sequence, "frame assembled");
                    }
                }
            }
            Err(e)
                if matches!(
                    e.kind(),
                    io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted
                ) => {}
            Err(e) => return Err(e.into()),
        }
    }
    info!(
        completed = framer.store().frames_completed(),
        "serial receiver stopped"
    );
    Ok(())
}
