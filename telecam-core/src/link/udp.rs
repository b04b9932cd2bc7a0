//! UDP link: counted slices in, single-byte commands out, one socket.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use futures::StreamExt;
use tokio::net::UdpSocket;
use tokio_util::sync::CancellationToken;
use tokio_util::udp::UdpFramed;
use tracing::{info, trace, warn};

use crate::codec::SliceCodec;
use crate::command::UdpCommandSink;
use crate::controller::StreamConfig;
use crate::error::LinkError;
use crate::frame::FrameStore;
use crate::framer::{CountedSliceFramer, SlicePolicy};
use crate::link::{Link, LinkEndpoint, LinkRuntime};

/// Slice size used by the reference camera sketch (240 slices per frame).
pub const DEFAULT_SLICE_SIZE: usize = 640;
/// Port the camera firmware sends slices to.
pub const DEFAULT_LOCAL_PORT: u16 = 5000;
/// Factory address of the camera's Ethernet module.
pub const DEFAULT_CAMERA_ADDR: &str = "192.168.1.88:8088";

#[derive(Debug, Clone)]
pub struct UdpLinkConfig {
    /// Local address the socket binds to.
    pub bind: SocketAddr,
    /// Camera address commands are sent to.
    pub remote: SocketAddr,
    pub slice_size: usize,
    pub slice_policy: SlicePolicy,
    pub stream: StreamConfig,
}

impl UdpLinkConfig {
    pub fn new(bind: SocketAddr, remote: SocketAddr) -> Self {
        Self {
            bind,
            remote,
            slice_size: DEFAULT_SLICE_SIZE,
            slice_policy: SlicePolicy::default(),
            stream: StreamConfig::default(),
        }
    }
}

pub struct UdpLink;

impl UdpLink {
    /// Bind the socket and start the link tasks.
    pub async fn open(config: UdpLinkConfig) -> Result<Link, LinkError> {
        let store = FrameStore::new(config.stream.buffer_mode);
        let frames = store.ready_frames();

        let socket = UdpSocket::bind(config.bind)
            .await
            .map_err(|source| LinkError::Bind {
                addr: config.bind,
                source,
            })?;
        let local = socket.local_addr()?;
        let socket = Arc::new(socket);
        info!(%local, remote = %config.remote, slice_size = config.slice_size, "udp socket bound");

        let endpoint = LinkEndpoint::Udp {
            local,
            remote: config.remote,
        };
        let mut runtime = LinkRuntime::new(endpoint, &config.stream, frames);
        let framer = CountedSliceFramer::new(
            store,
            config.slice_size,
            config.slice_policy,
            runtime.counters(),
        )?;

        let cancel = runtime.cancel_token();
        runtime.spawn_sender(UdpCommandSink::new(socket.clone(), config.remote));
        runtime.spawn_receiver(receive_slices(socket, framer, cancel));

        Ok(runtime.establish())
    }
}

async fn receive_slices(
    socket: Arc<UdpSocket>,
    mut framer: CountedSliceFramer,
    cancel: CancellationToken,
) -> Result<(), LinkError> {
    let mut framed = UdpFramed::new(socket, SliceCodec::new(framer.slice_size()));
    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            next = framed.next() => next,
        };
        match next {
            Some(Ok((datagram, peer))) => {
                trace!(%peer, "datagram");
                if let Some(sequence) = framer.accept(datagram)? {
                    trace!(sequence, "frame assembled");
                }
            }
            // An ICMP port-unreachable for an earlier command surfaces on
            // the next receive on some platforms. It says nothing about
            // the inbound stream.
            Some(Err(e)) if e.kind() == io::ErrorKind::ConnectionReset => {
                warn!(error = %e, "ignoring connection reset on udp socket");
            }
            Some(Err(e)) => return Err(e.into()),
            None => return Err(LinkError::ChannelClosed),
        }
    }
    info!(
        completed = framer.store().frames_completed(),
        "udp receiver stopped"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link::LinkEvent;
    use std::time::Duration;

    fn loopback() -> SocketAddr {
        "127.0.0.1:0".parse().unwrap()
    }

    #[tokio::test]
    async fn bind_failure_is_reported() {
        let taken = UdpSocket::bind(loopback()).await.unwrap();
        let addr = taken.local_addr().unwrap();
        let err = UdpLink::open(UdpLinkConfig::new(addr, addr)).await;
        assert!(matches!(err, Err(LinkError::Bind { addr: a, .. }) if a == addr));
    }

    #[tokio::test]
    async fn bad_slice_size_is_rejected_before_spawning() {
        let mut config = UdpLinkConfig::new(loopback(), loopback());
        config.slice_size = 1000;
        assert!(matches!(
            UdpLink::open(config).await,
            Err(LinkError::InvalidConfig(_))
        ));
    }

    #[tokio::test]
    async fn wrong_size_datagram_fails_strict_link() {
        let camera = UdpSocket::bind(loopback()).await.unwrap();
        let config = UdpLinkConfig::new(loopback(), camera.local_addr().unwrap());
        let mut link = UdpLink::open(config).await.unwrap();
        let mut events = link.events().unwrap();
        let LinkEndpoint::Udp { local, .. } = link.endpoint().clone() else {
            unreachable!()
        };

        camera.send_to(&[0u8; 100], local).await.unwrap();
        tokio::time::timeout(Duration::from_secs(2), link.closing())
            .await
            .unwrap();

        let mut saw_failed = false;
        while let Ok(event) = events.try_recv() {
            saw_failed |= matches!(event, LinkEvent::Failed { task: "receiver", .. });
        }
        assert!(saw_failed);
        assert!(matches!(
            link.close().await,
            Err(LinkError::SliceSize {
                expected: 640,
                actual: 100
            })
        ));
    }
}
