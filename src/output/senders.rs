use async_trait::async_trait;
use log::{error, info, warn};
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::time::timeout;

use crate::utils::error::ModbusError;

#[async_trait]
pub trait DataSender: Send {
    async fn send(&mut self, data: &str) -> Result<(), ModbusError>;
    /// Releases the destination. Calling it again is a no-op.
    async fn close(&mut self);
    fn sender_type(&self) -> &str;
    fn destination(&self) -> &str;
}

pub struct ConsoleSender;

#[async_trait]
impl DataSender for ConsoleSender {
    async fn send(&mut self, data: &str) -> Result<(), ModbusError> {
        println!("{}", data);
        Ok(())
    }

    async fn close(&mut self) {}

    fn sender_type(&self) -> &str {
        "console"
    }

    fn destination(&self) -> &str {
        "stdout"
    }
}

/// One persistent outbound TCP connection. Payloads are written as-is with
/// no framing; a failed send is reported and the socket is not reopened.
pub struct TcpSender {
    stream: Option<TcpStream>,
    peer: String,
}

impl TcpSender {
    pub async fn connect(
        addr: Ipv4Addr,
        port: u16,
        connect_timeout: Duration,
    ) -> Result<Self, ModbusError> {
        let peer = SocketAddr::V4(SocketAddrV4::new(addr, port));
        info!("🔗 Connecting to peer {}", peer);

        let stream = timeout(connect_timeout, TcpStream::connect(peer))
            .await
            .map_err(|_| {
                error!("❌ Connection to {} timed out after {:?}", peer, connect_timeout);
                ModbusError::ConnectionError(format!("connect to {} timed out", peer))
            })?
            .map_err(|e| {
                error!("❌ Failed to connect to {}: {}", peer, e);
                ModbusError::ConnectionError(format!("connect to {} failed: {}", peer, e))
            })?;

        if let Err(e) = stream.set_nodelay(true) {
            warn!("⚠️ Could not disable Nagle on {}: {}", peer, e);
        }

        info!("✅ Connected to peer {}", peer);
        Ok(Self {
            stream: Some(stream),
            peer: peer.to_string(),
        })
    }

    pub fn is_open(&self) -> bool {
        self.stream.is_some()
    }
}

#[async_trait]
impl DataSender for TcpSender {
    async fn send(&mut self, data: &str) -> Result<(), ModbusError> {
        let stream = self
            .stream
            .as_mut()
            .ok_or_else(|| ModbusError::SendError(format!("connection to {} is closed", self.peer)))?;

        stream
            .write_all(data.as_bytes())
            .await
            .map_err(|e| ModbusError::SendError(format!("send to {} failed: {}", self.peer, e)))?;
        stream
            .flush()
            .await
            .map_err(|e| ModbusError::SendError(format!("flush to {} failed: {}", self.peer, e)))?;
        Ok(())
    }

    async fn close(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            if let Err(e) = stream.shutdown().await {
                warn!("⚠️ Shutdown of connection to {} failed: {}", self.peer, e);
            }
            info!("✅ Connection to {} closed", self.peer);
        }
    }

    fn sender_type(&self) -> &str {
        "tcp"
    }

    fn destination(&self) -> &str {
        &self.peer
    }
}
