use super::codec::EchoCodec;
use crate::pool::{ConnectionPool, Factory};
use crate::unit::Unit;
use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use rand::RngCore;
use std::net::SocketAddr;
use tokio::net::TcpStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

/// Opens client connections to an echo server.
#[derive(Debug, Clone)]
pub struct TcpFactory {
    addr: SocketAddr,
}

impl TcpFactory {
    pub fn new(addr: SocketAddr) -> Self {
        Self { addr }
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }
}

#[async_trait]
impl Factory<TcpStream> for TcpFactory {
    async fn create(&self) -> Option<TcpStream> {
        match TcpStream::connect(self.addr).await {
            Ok(stream) => {
                if let Err(e) = socket2::SockRef::from(&stream).set_nodelay(true) {
                    debug!("Failed to set TCP_NODELAY: {}", e);
                }
                trace!("Opened connection to {}", self.addr);
                Some(stream)
            }
            Err(e) => {
                debug!("Failed to connect to {}: {}", self.addr, e);
                None
            }
        }
    }

    fn destroy(&self, stream: TcpStream) {
        drop(stream);
    }
}

/// Round-trips one frame per call through pooled TCP connections.
///
/// `run` sends `body_size` random bytes; every other lifecycle method sends
/// an empty frame, which is enough to open and check a connection.
pub struct EchoUnit {
    pool: ConnectionPool<TcpStream, TcpFactory>,
    codec: EchoCodec,
    body_size: usize,
}

impl EchoUnit {
    pub fn new(addr: SocketAddr, pool_size: usize, body_size: usize) -> Self {
        Self {
            pool: ConnectionPool::new(TcpFactory::new(addr), pool_size),
            codec: EchoCodec::default(),
            body_size,
        }
    }

    pub fn pool(&self) -> &ConnectionPool<TcpStream, TcpFactory> {
        &self.pool
    }

    /// Borrow a connection, echo `body` over it and hand it back.
    ///
    /// A connection that saw any error is destroyed rather than reused.
    async fn round_trip(&self, body: &[u8], cancel: &CancellationToken) -> Result<()> {
        let mut stream = self
            .pool
            .get()
            .await
            .ok_or_else(|| anyhow!("no connection"))?;

        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(anyhow!("cancelled")),
            result = self.exchange(&mut stream, body) => result,
        };
        self.pool.release(stream, result.as_ref().err());
        result
    }

    async fn exchange(&self, stream: &mut TcpStream, body: &[u8]) -> Result<()> {
        self.codec.write_frame(stream, body).await?;
        match self.codec.read_frame(stream).await? {
            Some(echoed) if echoed == body => Ok(()),
            Some(echoed) => bail!(
                "echo mismatch: sent {} bytes, got {} bytes back",
                body.len(),
                echoed.len()
            ),
            None => bail!("connection closed by server"),
        }
    }

    fn random_body(&self) -> Vec<u8> {
        let mut body = vec![0u8; self.body_size];
        rand::thread_rng().fill_bytes(&mut body);
        body
    }
}

impl std::fmt::Debug for EchoUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EchoUnit")
            .field("addr", &self.pool.factory().addr())
            .field("body_size", &self.body_size)
            .field("idle", &self.pool.idle())
            .finish()
    }
}

#[async_trait]
impl Unit for EchoUnit {
    async fn warm_up(&self, cancel: CancellationToken) -> Result<()> {
        self.round_trip(&[], &cancel).await
    }

    async fn begin(&self) -> Result<()> {
        self.round_trip(&[], &CancellationToken::new()).await
    }

    async fn run(&self, cancel: CancellationToken) -> Result<()> {
        let body = self.random_body();
        self.round_trip(&body, &cancel).await
    }

    async fn end(&self) -> Result<()> {
        self.round_trip(&[], &CancellationToken::new()).await
    }
}
