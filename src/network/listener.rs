//! Receive loops, one per transport.
//!
//! Each loop binds the shared listen port once (retrying on a fixed delay,
//! since a restarting prior instance may hold it briefly), then blocks on
//! receive until cancelled. Transient receive or decode errors are logged
//! and the loop continues; cancellation is a clean-shutdown signal, not a
//! fault.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream, UdpSocket};
use tokio_util::sync::CancellationToken;

use super::decoder::Decoder;
use super::wire;
use crate::config::Config;

/// Delay between bind attempts while the listen port is still held.
pub const BIND_RETRY_DELAY: Duration = Duration::from_secs(30);

/// Largest datagram the UDP loop accepts.
const UDP_BUFFER_SIZE: usize = 4096;

/// Consecutive accept failures tolerated before the TCP loop gives up.
const MAX_ACCEPT_ERRORS: u32 = 10;

pub async fn run_udp(config: Arc<Config>, decoder: Arc<Decoder>, cancel: CancellationToken) {
    let port = config.network.listen_port;
    let socket = loop {
        match UdpSocket::bind(("0.0.0.0", port)).await {
            Ok(socket) => break socket,
            Err(e) => {
                tracing::warn!(
                    "👂 UDP bind on {} failed ({}), retrying in {:?}",
                    port,
                    e,
                    BIND_RETRY_DELAY
                );
                tokio::select! {
                    _ = cancel.cancelled() => return,
                    _ = tokio::time::sleep(BIND_RETRY_DELAY) => {}
                }
            }
        }
    };
    tracing::info!("👂 UDP listener on port {}", port);

    let mut buf = vec![0u8; UDP_BUFFER_SIZE];
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            result = socket.recv_from(&mut buf) => match result {
                Ok((n, _from)) => decoder.on_bytes("UDP", &buf[..n]),
                Err(e) => tracing::warn!("👂 UDP receive error: {}", e),
            }
        }
    }
    tracing::info!("👂 UDP listener stopped");
}

pub async fn run_reliable(config: Arc<Config>, decoder: Arc<Decoder>, cancel: CancellationToken) {
    let port = config.network.listen_port;
    let listener = loop {
        match TcpListener::bind(("0.0.0.0", port)).await {
            Ok(listener) => break listener,
            Err(e) => {
                tracing::warn!(
                    "👂 TCP bind on {} failed ({}), retrying in {:?}",
                    port,
                    e,
                    BIND_RETRY_DELAY
                );
                tokio::select! {
                    _ = cancel.cancelled() => return,
                    _ = tokio::time::sleep(BIND_RETRY_DELAY) => {}
                }
            }
        }
    };
    tracing::info!("👂 TCP listener on port {}", port);

    let mut accept_errors = 0u32;
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            result = listener.accept() => match result {
                Ok((stream, addr)) => {
                    accept_errors = 0;
                    let decoder = decoder.clone();
                    let cancel = cancel.clone();
                    tokio::spawn(serve_association(stream, addr, decoder, cancel));
                }
                Err(e) => {
                    accept_errors += 1;
                    tracing::warn!(
                        "👂 TCP accept error ({}/{}): {}",
                        accept_errors,
                        MAX_ACCEPT_ERRORS,
                        e
                    );
                    if accept_errors >= MAX_ACCEPT_ERRORS {
                        break;
                    }
                }
            }
        }
    }
    tracing::info!("👂 TCP listener stopped");
}

/// Read frames off one inbound association until EOF or cancellation.
async fn serve_association(
    stream: TcpStream,
    addr: SocketAddr,
    decoder: Arc<Decoder>,
    cancel: CancellationToken,
) {
    let mut stream = stream;
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            result = wire::read_frame(&mut stream) => match result {
                Ok(Some(frame)) => decoder.on_bytes("TCP", &frame),
                Ok(None) => break,
                Err(e) => {
                    tracing::warn!("👂 Frame read error from {}: {}", addr, e);
                    break;
                }
            }
        }
    }
    tracing::debug!("👂 Association from {} closed", addr);
}
