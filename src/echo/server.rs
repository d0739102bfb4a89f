use super::codec::{CodecError, EchoCodec};
use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// TCP server that sends every frame straight back to its sender.
#[derive(Debug)]
pub struct EchoServer {
    listener: TcpListener,
    codec: EchoCodec,
    next_connection_id: Arc<AtomicU64>,
}

impl EchoServer {
    pub async fn bind(addr: SocketAddr) -> Result<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("Failed to bind echo server to {}", addr))?;
        debug!("Echo server listening on: {}", listener.local_addr()?);
        Ok(Self {
            listener,
            codec: EchoCodec::default(),
            next_connection_id: Arc::new(AtomicU64::new(1)),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept connections until `shutdown` fires or the listener fails.
    ///
    /// Connections already accepted keep running until their peer closes.
    pub async fn serve_until(self, shutdown: CancellationToken) -> Result<()> {
        info!("Echo server ready on {}", self.local_addr()?);
        loop {
            let accepted = tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("Echo server shutting down");
                    return Ok(());
                }
                accepted = self.listener.accept() => accepted,
            };

            match accepted {
                Ok((stream, peer)) => {
                    let connection_id = self.next_connection_id.fetch_add(1, Ordering::Relaxed);
                    debug!("Accepted TCP connection {} from: {}", connection_id, peer);
                    if let Err(e) = socket2::SockRef::from(&stream).set_nodelay(true) {
                        warn!("Failed to set TCP_NODELAY on connection {}: {}", connection_id, e);
                    }
                    tokio::spawn(handle_connection(connection_id, stream, self.codec));
                }
                Err(e) => {
                    error!("Failed to accept TCP connection: {}", e);
                    return Err(e).context("Echo server accept loop failed");
                }
            }
        }
    }
}

async fn handle_connection(connection_id: u64, mut stream: TcpStream, codec: EchoCodec) {
    let mut echoed = 0u64;
    let outcome: Result<(), CodecError> = async {
        while let Some(frame) = codec.read_frame(&mut stream).await? {
            codec.write_frame(&mut stream, &frame).await?;
            echoed += 1;
        }
        Ok(())
    }
    .await;

    match outcome {
        Ok(()) => debug!(
            "Connection {} closed after {} frames",
            connection_id, echoed
        ),
        Err(e) => debug!(
            "Connection {} dropped after {} frames: {}",
            connection_id, echoed, e
        ),
    }
}
