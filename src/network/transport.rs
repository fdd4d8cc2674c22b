//! The two send-side transports.
//!
//! A transport sends one byte payload to one address and knows nothing
//! about routing. Both are best-effort: resolution and I/O errors bubble
//! up to the unicast sender, which logs and drops — the next heartbeat or
//! event self-corrects any stale state.

use async_trait::async_trait;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpStream, UdpSocket};
use tokio::sync::Mutex;

use super::wire;
use super::PeerAddr;
use crate::error::RelayError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportKind {
    Udp,
    Reliable,
}

impl TransportKind {
    pub const ALL: [TransportKind; 2] = [TransportKind::Udp, TransportKind::Reliable];

    pub fn label(&self) -> &'static str {
        match self {
            TransportKind::Udp => "UDP",
            TransportKind::Reliable => "TCP",
        }
    }
}

#[async_trait]
pub trait Transport: Send + Sync {
    fn kind(&self) -> TransportKind;

    /// Best-effort send of one payload to one peer.
    async fn send(&self, payload: &[u8], peer: &PeerAddr) -> Result<(), RelayError>;

    /// Release the underlying resource. Idempotent; later sends fail with
    /// [`RelayError::TransportClosed`].
    async fn disable(&self);
}

/// Unreliable datagram transport: one unconnected socket on an ephemeral
/// local port carries every outgoing datagram.
pub struct UdpTransport {
    socket: Mutex<Option<UdpSocket>>,
}

impl UdpTransport {
    pub async fn new() -> Result<UdpTransport, RelayError> {
        let socket = UdpSocket::bind(("0.0.0.0", 0)).await?;
        Ok(UdpTransport {
            socket: Mutex::new(Some(socket)),
        })
    }
}

#[async_trait]
impl Transport for UdpTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Udp
    }

    async fn send(&self, payload: &[u8], peer: &PeerAddr) -> Result<(), RelayError> {
        let guard = self.socket.lock().await;
        let socket = guard.as_ref().ok_or(RelayError::TransportClosed)?;
        socket
            .send_to(payload, (peer.host.as_str(), peer.port))
            .await?;
        Ok(())
    }

    async fn disable(&self) {
        self.socket.lock().await.take();
    }
}

/// Reliable message-oriented transport: one framed TCP stream per peer
/// address (the "association"), dialed on first use. A write failure drops
/// the association so the next send redials; per-association ordering is
/// all this transport promises.
pub struct ReliableTransport {
    associations: Mutex<Option<HashMap<PeerAddr, TcpStream>>>,
}

impl ReliableTransport {
    pub fn new() -> ReliableTransport {
        ReliableTransport {
            associations: Mutex::new(Some(HashMap::new())),
        }
    }
}

impl Default for ReliableTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for ReliableTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Reliable
    }

    async fn send(&self, payload: &[u8], peer: &PeerAddr) -> Result<(), RelayError> {
        let mut guard = self.associations.lock().await;
        let associations = guard.as_mut().ok_or(RelayError::TransportClosed)?;

        let stream = match associations.entry(peer.clone()) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                let stream = TcpStream::connect((peer.host.as_str(), peer.port)).await?;
                tracing::debug!("🔌 Opened association to {}", peer);
                entry.insert(stream)
            }
        };

        let result = wire::write_frame(stream, payload).await;
        if result.is_err() {
            associations.remove(peer);
        }
        result
    }

    async fn disable(&self) {
        if let Some(associations) = self.associations.lock().await.take() {
            for (peer, mut stream) in associations {
                if let Err(e) = stream.shutdown().await {
                    tracing::debug!("🔌 Association to {} closed uncleanly: {}", peer, e);
                }
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Recording transport double shared by the sender, membership, and
    //! decoder tests.

    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[derive(Default)]
    pub(crate) struct MockState {
        pub sent: parking_lot::Mutex<Vec<(Vec<u8>, PeerAddr)>>,
        pub fail_hosts: parking_lot::Mutex<Vec<String>>,
        busy: AtomicBool,
        pub overlapped: AtomicBool,
        pub disabled: AtomicBool,
    }

    impl MockState {
        pub fn sent_peers(&self) -> Vec<PeerAddr> {
            self.sent.lock().iter().map(|(_, p)| p.clone()).collect()
        }
    }

    pub(crate) struct MockTransport {
        kind: TransportKind,
        state: Arc<MockState>,
    }

    pub(crate) fn mock(kind: TransportKind) -> (MockTransport, Arc<MockState>) {
        let state = Arc::new(MockState::default());
        (
            MockTransport {
                kind,
                state: state.clone(),
            },
            state,
        )
    }

    #[async_trait]
    impl Transport for MockTransport {
        fn kind(&self) -> TransportKind {
            self.kind
        }

        async fn send(&self, payload: &[u8], peer: &PeerAddr) -> Result<(), RelayError> {
            // Detect overlapping sends: a correctly serialized caller never
            // enters here while another send is in flight.
            if self.state.busy.swap(true, Ordering::SeqCst) {
                self.state.overlapped.store(true, Ordering::SeqCst);
            }
            tokio::time::sleep(Duration::from_millis(1)).await;
            self.state.busy.store(false, Ordering::SeqCst);

            if self.state.fail_hosts.lock().contains(&peer.host) {
                return Err(RelayError::Resolve(peer.host.clone()));
            }
            self.state.sent.lock().push((payload.to_vec(), peer.clone()));
            Ok(())
        }

        async fn disable(&self) {
            self.state.disabled.store(true, Ordering::SeqCst);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn udp_send_after_disable_fails() {
        let transport = UdpTransport::new().await.unwrap();
        transport.disable().await;
        transport.disable().await; // idempotent

        let err = transport
            .send(b"x", &PeerAddr::new("127.0.0.1", 9))
            .await
            .unwrap_err();
        assert!(matches!(err, RelayError::TransportClosed));
    }

    #[tokio::test]
    async fn udp_send_reaches_local_socket() {
        let receiver = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let port = receiver.local_addr().unwrap().port();

        let transport = UdpTransport::new().await.unwrap();
        transport
            .send(b"datagram", &PeerAddr::new("127.0.0.1", port))
            .await
            .unwrap();

        let mut buf = [0u8; 64];
        let (n, _) = receiver.recv_from(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"datagram");
    }

    #[tokio::test]
    async fn reliable_send_frames_and_reuses_association() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let accept = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let first = wire::read_frame(&mut stream).await.unwrap().unwrap();
            let second = wire::read_frame(&mut stream).await.unwrap().unwrap();
            (first, second)
        });

        let transport = ReliableTransport::new();
        let peer = PeerAddr::new("127.0.0.1", port);
        transport.send(b"one", &peer).await.unwrap();
        transport.send(b"two", &peer).await.unwrap();

        // Both frames arrive on the single accepted stream.
        let (first, second) = accept.await.unwrap();
        assert_eq!(first, b"one");
        assert_eq!(second, b"two");

        transport.disable().await;
        let err = transport.send(b"three", &peer).await.unwrap_err();
        assert!(matches!(err, RelayError::TransportClosed));
    }

    #[tokio::test]
    async fn reliable_connect_failure_is_an_error() {
        let transport = ReliableTransport::new();
        // Port 1 on localhost: nothing listens there.
        let result = transport.send(b"x", &PeerAddr::new("127.0.0.1", 1)).await;
        assert!(result.is_err());
    }
}
