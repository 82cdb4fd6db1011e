//! Handshake plugins
//!
//! Bootstraps a peer-to-peer control channel before bulk data movement: the
//! daemon side accepts inbound attempts and answers with its own endpoint
//! attributes, the client side connects and exchanges attribute documents.
//! No object bytes ever travel through this channel.
//!
//! Wire format of the reference TCP implementation: a 4-byte big-endian
//! length prefix followed by a JSON-encoded attribute document, one frame in
//! each direction. The daemon's reply wraps the document in
//! `{"status": N, "attributes": ...}`; a non-zero status is a rejection.

use crate::common::{AttributeDocument, Error, Result};
use crate::plugin::split_descriptor;
use async_trait::async_trait;
use bytes::{BufMut, BytesMut};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Largest accepted handshake frame. Attribute documents are small; anything
/// bigger is a broken or hostile peer.
const MAX_FRAME: u32 = 4 * 1024 * 1024;

/// Inspects the peer's attributes and produces the local ones, or a non-zero
/// status code to reject the connection.
pub type OnReceive =
    Arc<dyn Fn(AttributeDocument) -> std::result::Result<AttributeDocument, u32> + Send + Sync>;

#[derive(Debug, Serialize, Deserialize)]
struct HandshakeReply {
    status: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    attributes: Option<AttributeDocument>,
}

#[async_trait]
pub trait Handshake: Send + Sync {
    /// Bind `listen_port` and serve inbound handshakes until the returned
    /// handle is shut down. Each connection runs on its own task.
    async fn start_daemon(&self, on_receive: OnReceive, listen_port: u16) -> Result<DaemonHandle>;

    /// Connect to a peer daemon, send `local`, and wait for the peer's
    /// attributes. Fails with `Timeout` when the peer does not answer within
    /// the configured bound.
    async fn connect(
        &self,
        host: &str,
        port: u16,
        local: AttributeDocument,
    ) -> Result<AttributeDocument>;
}

/// Select a handshake implementation by `scheme://` descriptor.
pub fn handshake_plugin(descriptor: &str, timeout: Duration) -> Result<Arc<dyn Handshake>> {
    let (scheme, _) = split_descriptor(descriptor)?;
    match scheme {
        "tcp" => Ok(Arc::new(TcpHandshake::new(timeout))),
        other => Err(Error::InvalidConfig(format!(
            "unknown handshake scheme: {other}"
        ))),
    }
}

/// Stops the daemon's accept loop.
pub struct DaemonHandle {
    port: u16,
    stop: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl DaemonHandle {
    /// Port actually bound; useful when the daemon was started on port 0.
    pub fn port(&self) -> u16 {
        self.port
    }

    pub async fn shutdown(self) {
        let _ = self.stop.send(true);
        let _ = self.task.await;
    }
}

/// Reference TCP implementation
pub struct TcpHandshake {
    timeout: Duration,
}

impl TcpHandshake {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl Handshake for TcpHandshake {
    async fn start_daemon(&self, on_receive: OnReceive, listen_port: u16) -> Result<DaemonHandle> {
        let listener = TcpListener::bind(("0.0.0.0", listen_port)).await?;
        let port = listener.local_addr()?.port();
        let (stop, mut stopped) = watch::channel(false);
        let timeout = self.timeout;

        let task = tokio::spawn(async move {
            tracing::info!(port, "handshake daemon listening");
            loop {
                tokio::select! {
                    accepted = listener.accept() => {
                        match accepted {
                            Ok((stream, peer)) => {
                                let cb = on_receive.clone();
                                tokio::spawn(async move {
                                    let served = tokio::time::timeout(
                                        timeout,
                                        serve_connection(stream, cb),
                                    )
                                    .await;
                                    match served {
                                        Ok(Ok(())) => {}
                                        Ok(Err(e)) => {
                                            tracing::warn!(%peer, error = %e, "handshake failed");
                                        }
                                        Err(_) => {
                                            tracing::warn!(%peer, "handshake timed out");
                                        }
                                    }
                                });
                            }
                            Err(e) => tracing::warn!(error = %e, "accept failed"),
                        }
                    }
                    _ = stopped.changed() => {
                        tracing::info!(port, "handshake daemon stopped");
                        break;
                    }
                }
            }
        });

        Ok(DaemonHandle { port, stop, task })
    }

    async fn connect(
        &self,
        host: &str,
        port: u16,
        local: AttributeDocument,
    ) -> Result<AttributeDocument> {
        let exchange = async {
            let mut stream = TcpStream::connect((host, port))
                .await
                .map_err(|e| Error::HandshakeFailed(format!("connect {host}:{port}: {e}")))?;
            write_frame(&mut stream, &local).await?;
            let reply: HandshakeReply = read_frame(&mut stream).await?;
            if reply.status != 0 {
                return Err(Error::HandshakeRejected(reply.status));
            }
            reply
                .attributes
                .ok_or_else(|| Error::HandshakeFailed("peer sent no attributes".into()))
        };

        tokio::time::timeout(self.timeout, exchange)
            .await
            .map_err(|_| Error::Timeout(format!("handshake with {host}:{port}")))?
    }
}

async fn serve_connection(mut stream: TcpStream, on_receive: OnReceive) -> Result<()> {
    let peer_attrs: AttributeDocument = read_frame(&mut stream).await?;
    let reply = match on_receive(peer_attrs) {
        Ok(local_attrs) => HandshakeReply {
            status: 0,
            attributes: Some(local_attrs),
        },
        Err(status) => HandshakeReply {
            status: status.max(1),
            attributes: None,
        },
    };
    write_frame(&mut stream, &reply).await?;
    stream.shutdown().await?;
    Ok(())
}

async fn write_frame<T: Serialize>(stream: &mut TcpStream, value: &T) -> Result<()> {
    let payload = serde_json::to_vec(value)
        .map_err(|e| Error::HandshakeFailed(format!("encode: {e}")))?;
    if payload.len() as u32 > MAX_FRAME {
        return Err(Error::HandshakeFailed("frame too large".into()));
    }
    let mut frame = BytesMut::with_capacity(4 + payload.len());
    frame.put_u32(payload.len() as u32);
    frame.put_slice(&payload);
    stream
        .write_all(&frame)
        .await
        .map_err(|e| Error::HandshakeFailed(format!("send: {e}")))?;
    Ok(())
}

async fn read_frame<T: for<'de> Deserialize<'de>>(stream: &mut TcpStream) -> Result<T> {
    let len = stream
        .read_u32()
        .await
        .map_err(|e| Error::HandshakeFailed(format!("recv length: {e}")))?;
    if len > MAX_FRAME {
        return Err(Error::HandshakeFailed(format!("frame too large: {len}")));
    }
    let mut payload = vec![0u8; len as usize];
    stream
        .read_exact(&mut payload)
        .await
        .map_err(|e| Error::HandshakeFailed(format!("recv payload: {e}")))?;
    serde_json::from_slice(&payload).map_err(|e| Error::HandshakeFailed(format!("decode: {e}")))
}
