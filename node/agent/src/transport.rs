use std::net::SocketAddr;

use tokio::net::UdpSocket;

/// Messages larger than this are rejected rather than risk silent truncation
/// by the underlying datagram socket (§4.1).
pub const MAX_MESSAGE_BYTES: usize = 1024;

/// Unreliable, unordered, connectionless send/receive of short textual
/// messages (§4.1). No ordering, no delivery guarantee; the gossip layer
/// compensates via retransmission on its next heartbeat.
pub struct DatagramTransport {
    socket: UdpSocket,
}

impl DatagramTransport {
    pub async fn bind(addr: SocketAddr) -> std::io::Result<Self> {
        let socket = UdpSocket::bind(addr).await?;
        Ok(Self { socket })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Sends `payload` to `to`. Failures are logged and swallowed: the
    /// gossip layer's next heartbeat will retry.
    pub async fn send(&self, to: SocketAddr, payload: &[u8]) {
        if payload.len() > MAX_MESSAGE_BYTES {
            tracing::warn!(len = payload.len(), %to, "gossip message exceeds size budget, dropping");
            return;
        }
        if let Err(e) = self.socket.send_to(payload, to).await {
            tracing::warn!(%to, error = %e, "datagram send failed, relying on next heartbeat");
        }
    }

    /// Receives the next datagram. Returns the sender address and the bytes
    /// received, truncated to the socket's read buffer.
    pub async fn recv(&self, buf: &mut [u8]) -> std::io::Result<(usize, SocketAddr)> {
        self.socket.recv_from(buf).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn round_trips_a_short_message() {
        let a = DatagramTransport::bind("127.0.0.1:0".parse().unwrap()).await.unwrap();
        let b = DatagramTransport::bind("127.0.0.1:0".parse().unwrap()).await.unwrap();
        let b_addr = b.local_addr().unwrap();

        a.send(b_addr, b"hello").await;

        let mut buf = [0u8; MAX_MESSAGE_BYTES];
        let (n, _from) = b.recv(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"hello");
    }

    #[tokio::test]
    async fn oversized_message_is_dropped_not_sent() {
        let a = DatagramTransport::bind("127.0.0.1:0".parse().unwrap()).await.unwrap();
        let b = DatagramTransport::bind("127.0.0.1:0".parse().unwrap()).await.unwrap();
        let b_addr = b.local_addr().unwrap();

        let oversized = vec![0u8; MAX_MESSAGE_BYTES + 1];
        a.send(b_addr, &oversized).await;

        let mut buf = [0u8; MAX_MESSAGE_BYTES];
        let recv = tokio::time::timeout(std::time::Duration::from_millis(100), b.recv(&mut buf)).await;
        assert!(recv.is_err(), "no datagram should have arrived");
    }
}
