//! Transports a command can be written to.

use std::io::Write;
use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::net::UdpSocket;

use crate::codec::encode_command;
use crate::command::types::Command;
use crate::error::CommandError;

/// Outbound half of a link.
#[async_trait]
pub trait CommandSink: Send {
    /// Write one command. Must not retry.
    async fn send_command(&mut self, cmd: Command) -> Result<(), CommandError>;
}

// ── UDP ──────────────────────────────────────────────────────────

/// Sends each command as its own datagram.
///
/// Shares the socket with the slice receiver, which is what the camera
/// expects: it replies to whichever address last sent it a command.
pub struct UdpCommandSink {
    socket: Arc<UdpSocket>,
    remote: SocketAddr,
}

impl UdpCommandSink {
    pub fn new(socket: Arc<UdpSocket>, remote: SocketAddr) -> Self {
        Self { socket, remote }
    }

    pub fn remote(&self) -> SocketAddr {
        self.remote
    }
}

#[async_trait]
impl CommandSink for UdpCommandSink {
    async fn send_command(&mut self, cmd: Command) -> Result<(), CommandError> {
        let buf = encode_command(cmd);
        self.socket.send_to(&buf, self.remote).await?;
        Ok(())
    }
}

// ── Blocking writers (serial) ────────────────────────────────────

/// Writes commands to a blocking `std::io::Write`, such as a cloned
/// serial port handle, on the blocking thread pool.
pub struct BlockingWriterSink<W> {
    writer: Option<W>,
}

impl<W> BlockingWriterSink<W>
where
    W: Write + Send + 'static,
{
    pub fn new(writer: W) -> Self {
        Self {
            writer: Some(writer),
        }
    }
}

#[async_trait]
impl<W> CommandSink for BlockingWriterSink<W>
where
    W: Write + Send + 'static,
{
    async fn send_command(&mut self, cmd: Command) -> Result<(), CommandError> {
        let Some(mut writer) = self.writer.take() else {
            return Err(CommandError::Send(std::io::Error::new(
                std::io::ErrorKind::NotConnected,
                "writer lost after an earlier failure",
            )));
        };
        let buf = encode_command(cmd);
        let (writer, result) = tokio::task::spawn_blocking(move || {
            let result = writer.write_all(&buf).and_then(|_| writer.flush());
            (writer, result)
        })
        .await
        .map_err(std::io::Error::other)?;
        self.writer = Some(writer);
        result?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::types::Opcode;
    use std::sync::Mutex;

    #[derive(Clone, Default)]
    struct SharedBuf(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    struct BrokenWriter;

    impl Write for BrokenWriter {
        fn write(&mut self, _: &[u8]) -> std::io::Result<usize> {
            Err(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "unplugged"))
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn blocking_sink_writes_opcode_bytes() {
        let buf = SharedBuf::default();
        let mut sink = BlockingWriterSink::new(buf.clone());
        sink.send_command(Command::new(Opcode::Advance)).await.unwrap();
        sink.send_command(Command::with_param(Opcode::TurnRight, 9))
            .await
            .unwrap();
        assert_eq!(*buf.0.lock().unwrap(), vec![0x0A, 0x0D, 9]);
    }

    #[tokio::test]
    async fn blocking_sink_reports_failure_and_stays_usable() {
        let mut sink = BlockingWriterSink::new(BrokenWriter);
        let err = sink.send_command(Command::new(Opcode::Halt)).await;
        assert!(matches!(err, Err(CommandError::Send(_))));
        // The writer is handed back even when the write fails.
        let err = sink.send_command(Command::new(Opcode::Halt)).await.unwrap_err();
        assert!(err.to_string().contains("unplugged"));
    }

    #[tokio::test]
    async fn udp_sink_sends_one_datagram_per_command() {
        let peer = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let local = Arc::new(UdpSocket::bind("127.0.0.1:0").await.unwrap());
        let mut sink = UdpCommandSink::new(local, peer.local_addr().unwrap());

        sink.send_command(Command::stop_stream()).await.unwrap();
        let mut buf = [0u8; 8];
        let (n, _) = peer.recv_from(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], &[0x08]);
    }
}
