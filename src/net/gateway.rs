//! Gateway - accepts client connections and spawns session tasks.

use crate::net::session::{SessionRegistry, SessionState};
use bytes::{Bytes, BytesMut};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, instrument, warn};

/// Listens for clients and wires each socket to a session.
pub struct Gateway {
    listener: TcpListener,
    registry: Arc<SessionRegistry>,
    inbound_capacity: usize,
    shutdown: broadcast::Sender<()>,
}

impl Gateway {
    /// Bind the client listener.
    pub async fn bind(
        addr: SocketAddr,
        registry: Arc<SessionRegistry>,
        inbound_capacity: usize,
        shutdown: broadcast::Sender<()>,
    ) -> anyhow::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        info!(addr = %addr, "Gateway listening");
        Ok(Self {
            listener,
            registry,
            inbound_capacity,
            shutdown,
        })
    }

    /// Accept loop; returns when the shutdown signal fires.
    pub async fn run(self) -> anyhow::Result<()> {
        let mut shutdown_rx = self.shutdown.subscribe();
        loop {
            tokio::select! {
                accepted = self.listener.accept() => {
                    match accepted {
                        Ok((stream, addr)) => {
                            self.spawn_session(stream, addr);
                        }
                        Err(e) => {
                            warn!(error = %e, "Accept failed");
                        }
                    }
                }
                _ = shutdown_rx.recv() => {
                    info!("Gateway stopping");
                    return Ok(());
                }
            }
        }
    }

    fn spawn_session(&self, stream: TcpStream, addr: SocketAddr) {
        let (session, inbound_tx, outbound_rx) = self.registry.create(addr, self.inbound_capacity);
        // The auth/char-select collaborator upgrades the session once the
        // account is proven; this build trusts the framer's handshake and
        // promotes immediately.
        session.set_state(SessionState::Authenticated);

        info!(session = %session.id, addr = %addr, "Client connected");

        let (read_half, write_half) = stream.into_split();
        tokio::spawn(reader_task(session.clone(), read_half, inbound_tx));
        tokio::spawn(writer_task(session.id, write_half, outbound_rx));
    }
}

/// Reads frames off the socket and forwards payloads into the session's
/// bounded inbound queue. Never blocks the socket on a full queue - the
/// sender is dropped instead, per the overflow policy.
#[instrument(skip_all, fields(session = %session.id), name = "reader")]
async fn reader_task(
    session: Arc<crate::net::Session>,
    mut read_half: tokio::net::tcp::OwnedReadHalf,
    inbound_tx: mpsc::Sender<Bytes>,
) {
    let mut buf = BytesMut::with_capacity(4096);
    loop {
        match runegate_proto::frame::split_frame(&mut buf) {
            Ok(Some(payload)) => {
                match inbound_tx.try_send(payload) {
                    Ok(()) => continue,
                    Err(mpsc::error::TrySendError::Full(_)) => {
                        warn!("Inbound queue full, dropping session");
                        crate::metrics::SESSION_QUEUE_FULL.inc();
                        session.mark_closing();
                        return;
                    }
                    Err(mpsc::error::TrySendError::Closed(_)) => return,
                }
            }
            Ok(None) => {}
            Err(e) => {
                debug!(error = %e, "Frame error, dropping session");
                session.mark_closing();
                return;
            }
        }

        match read_half.read_buf(&mut buf).await {
            Ok(0) => {
                debug!("Client EOF");
                session.mark_closing();
                return;
            }
            Ok(_) => {}
            Err(e) => {
                debug!(error = %e, "Read error");
                session.mark_closing();
                return;
            }
        }
    }
}

/// Writes coalesced flush buffers to the socket. Ends when the session is
/// removed from the registry (sender dropped) or the socket fails.
async fn writer_task(
    session_id: u64,
    mut write_half: tokio::net::tcp::OwnedWriteHalf,
    mut outbound_rx: mpsc::UnboundedReceiver<Bytes>,
) {
    while let Some(chunk) = outbound_rx.recv().await {
        if let Err(e) = write_half.write_all(&chunk).await {
            debug!(session = %session_id, error = %e, "Write error");
            return;
        }
    }
    let _ = write_half.shutdown().await;
}
