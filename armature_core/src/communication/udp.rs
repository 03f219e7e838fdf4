//! Point-to-point datagram transport.
//!
//! One bincode-encoded message per datagram. The link is blocking and owned
//! by a single thread; receives use socket read timeouts instead of a
//! background reader.
use crate::communication::hub::{AtomicHubMetrics, HubMetrics};
use crate::error::{ArmatureError, ArmatureResult};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io::ErrorKind;
use std::marker::PhantomData;
use std::net::{IpAddr, Ipv4Addr, SocketAddr, UdpSocket};
use std::sync::atomic::Ordering;
use std::time::Duration;

/// Largest datagram accepted or produced (64KB, max UDP payload)
pub const MAX_DATAGRAM_SIZE: usize = 65507;
const UDP_BUFFER_SIZE: usize = 65536;

pub struct UdpLink<T> {
    socket: UdpSocket,
    remote_addr: Option<SocketAddr>,
    metrics: AtomicHubMetrics,
    _phantom: PhantomData<fn() -> T>,
}

impl<T> UdpLink<T>
where
    T: Serialize + DeserializeOwned,
{
    /// Bind a listening endpoint (no default peer).
    pub fn bind(local: SocketAddr) -> ArmatureResult<Self> {
        let socket = UdpSocket::bind(local).map_err(|e| {
            ArmatureError::Communication(format!("Failed to bind UDP socket {}: {}", local, e))
        })?;
        Ok(Self {
            socket,
            remote_addr: None,
            metrics: AtomicHubMetrics::default(),
            _phantom: PhantomData,
        })
    }

    /// Bind an ephemeral port and fix `remote` as the only peer.
    pub fn connect(remote: SocketAddr) -> ArmatureResult<Self> {
        let local_ip: IpAddr = if remote.ip().is_loopback() {
            Ipv4Addr::LOCALHOST.into()
        } else {
            Ipv4Addr::UNSPECIFIED.into()
        };
        let socket = UdpSocket::bind(SocketAddr::new(local_ip, 0)).map_err(|e| {
            ArmatureError::Communication(format!("Failed to bind UDP socket: {}", e))
        })?;
        socket.connect(remote).map_err(|e| {
            ArmatureError::Communication(format!("Failed to connect UDP socket to {}: {}", remote, e))
        })?;
        Ok(Self {
            socket,
            remote_addr: Some(remote),
            metrics: AtomicHubMetrics::default(),
            _phantom: PhantomData,
        })
    }

    /// Send to the connected peer.
    pub fn send(&self, msg: &T) -> ArmatureResult<()> {
        let bytes = self.encode(msg)?;
        let result = self.socket.send(&bytes);
        self.record_send(result.map(|_| ()))
    }

    /// Send to an explicit address (listener side).
    pub fn send_to(&self, msg: &T, addr: SocketAddr) -> ArmatureResult<()> {
        let bytes = self.encode(msg)?;
        let result = self.socket.send_to(&bytes, addr);
        self.record_send(result.map(|_| ()))
    }

    /// Wait up to `timeout` for one message. `Ok(None)` on timeout or when
    /// the connected peer is not listening.
    pub fn recv_timeout(&self, timeout: Duration) -> ArmatureResult<Option<(T, SocketAddr)>> {
        self.socket
            .set_read_timeout(Some(timeout.max(Duration::from_millis(1))))?;

        let mut buffer = vec![0u8; UDP_BUFFER_SIZE];
        match self.socket.recv_from(&mut buffer) {
            Ok((size, src)) => {
                let msg = bincode::deserialize::<T>(&buffer[..size])?;
                self.metrics
                    .messages_delivered
                    .fetch_add(1, Ordering::Relaxed);
                Ok(Some((msg, src)))
            }
            Err(e)
                if matches!(
                    e.kind(),
                    ErrorKind::WouldBlock | ErrorKind::TimedOut | ErrorKind::ConnectionRefused
                ) =>
            {
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    pub fn local_addr(&self) -> ArmatureResult<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    pub fn remote_addr(&self) -> Option<SocketAddr> {
        self.remote_addr
    }

    pub fn get_metrics(&self) -> HubMetrics {
        self.metrics.snapshot()
    }

    fn encode(&self, msg: &T) -> ArmatureResult<Vec<u8>> {
        let bytes = bincode::serialize(msg)?;
        if bytes.len() > MAX_DATAGRAM_SIZE {
            self.metrics.send_failures.fetch_add(1, Ordering::Relaxed);
            return Err(ArmatureError::Communication(format!(
                "message of {} bytes exceeds datagram limit of {}",
                bytes.len(),
                MAX_DATAGRAM_SIZE
            )));
        }
        Ok(bytes)
    }

    fn record_send(&self, result: std::io::Result<()>) -> ArmatureResult<()> {
        match result {
            Ok(()) => {
                self.metrics.messages_sent.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }
            Err(e) => {
                self.metrics.send_failures.fetch_add(1, Ordering::Relaxed);
                Err(ArmatureError::Communication(format!("UDP send failed: {}", e)))
            }
        }
    }
}

impl<T> std::fmt::Debug for UdpLink<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UdpLink")
            .field("local_addr", &self.socket.local_addr().ok())
            .field("remote_addr", &self.remote_addr)
            .finish()
    }
}
