//! Session state shared between network tasks and the tick thread.

use bytes::{Bytes, BytesMut};
use dashmap::DashMap;
use parking_lot::Mutex;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Registry state machine for packet dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SessionState {
    /// TCP accepted, nothing proven yet.
    Connected = 0,
    /// The external auth collaborator vouched for the account.
    Authenticated = 1,
    /// A character is loaded and simulated.
    InWorld = 2,
}

impl SessionState {
    fn from_u8(v: u8) -> Self {
        match v {
            2 => Self::InWorld,
            1 => Self::Authenticated,
            _ => Self::Connected,
        }
    }
}

/// One client connection.
///
/// Inbound: reader task -> bounded mpsc -> tick thread (`try_recv`, never
/// blocking). Outbound: tick thread appends framed bytes to the flush
/// buffer; the output phase hands the whole buffer to the writer task as
/// one `Bytes`, so all producers within a tick coalesce.
pub struct Session {
    pub id: u64,
    pub addr: SocketAddr,
    state: AtomicU8,
    account: Mutex<Option<String>>,
    inbound_rx: Mutex<mpsc::Receiver<Bytes>>,
    outbound_tx: mpsc::UnboundedSender<Bytes>,
    flush_buf: Mutex<BytesMut>,
    closing: AtomicBool,
}

impl Session {
    /// State as last set by the tick thread.
    pub fn state(&self) -> SessionState {
        SessionState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn set_state(&self, s: SessionState) {
        self.state.store(s as u8, Ordering::Release);
    }

    /// Account name once authenticated.
    pub fn account(&self) -> Option<String> {
        self.account.lock().clone()
    }

    pub fn set_account(&self, account: String) {
        *self.account.lock() = Some(account);
    }

    /// Non-blocking inbound pop; tick-thread only.
    pub fn try_recv(&self) -> Option<Bytes> {
        self.inbound_rx.lock().try_recv().ok()
    }

    /// Queue one payload for this session, framed into the flush buffer.
    pub fn send(&self, payload: &Bytes) {
        let mut buf = self.flush_buf.lock();
        runegate_proto::frame::join_frame(payload, &mut buf);
    }

    /// Hand the coalesced buffer to the writer task. No-op when empty.
    pub fn flush(&self) {
        let mut buf = self.flush_buf.lock();
        if buf.is_empty() {
            return;
        }
        let out = buf.split().freeze();
        let _ = self.outbound_tx.send(out);
    }

    /// Marked by the reader on EOF/error or by dispatch on protocol
    /// failure; the input phase reaps after one final drain.
    pub fn mark_closing(&self) {
        self.closing.store(true, Ordering::Release);
    }

    pub fn is_closing(&self) -> bool {
        self.closing.load(Ordering::Acquire)
    }
}

/// All live sessions, shared by the gateway and the tick thread.
pub struct SessionRegistry {
    sessions: DashMap<u64, Arc<Session>>,
    next_id: AtomicU64,
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self {
            sessions: DashMap::new(),
            next_id: AtomicU64::new(1),
        }
    }

    /// Create a session and its channel ends. Returns the session plus the
    /// reader-side sender and writer-side receiver for the spawned tasks.
    pub fn create(
        &self,
        addr: SocketAddr,
        inbound_capacity: usize,
    ) -> (
        Arc<Session>,
        mpsc::Sender<Bytes>,
        mpsc::UnboundedReceiver<Bytes>,
    ) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (inbound_tx, inbound_rx) = mpsc::channel(inbound_capacity);
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let session = Arc::new(Session {
            id,
            addr,
            state: AtomicU8::new(SessionState::Connected as u8),
            account: Mutex::new(None),
            inbound_rx: Mutex::new(inbound_rx),
            outbound_tx,
            flush_buf: Mutex::new(BytesMut::new()),
            closing: AtomicBool::new(false),
        });
        self.sessions.insert(id, session.clone());
        crate::metrics::CONNECTED_SESSIONS.set(self.sessions.len() as i64);
        (session, inbound_tx, outbound_rx)
    }

    pub fn get(&self, id: u64) -> Option<Arc<Session>> {
        self.sessions.get(&id).map(|s| s.value().clone())
    }

    /// Remove a reaped session; dropping the last Arc closes the writer
    /// channel and ends its task.
    pub fn remove(&self, id: u64) {
        self.sessions.remove(&id);
        crate::metrics::CONNECTED_SESSIONS.set(self.sessions.len() as i64);
    }

    /// Snapshot of live session ids, in id order for deterministic drains.
    pub fn ids(&self) -> Vec<u64> {
        let mut ids: Vec<u64> = self.sessions.iter().map(|e| *e.key()).collect();
        ids.sort_unstable();
        ids
    }

    /// Frame and queue a payload for one session.
    pub fn send_to(&self, id: u64, payload: &Bytes) {
        if let Some(s) = self.sessions.get(&id) {
            s.send(payload);
        }
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr() -> SocketAddr {
        "127.0.0.1:0".parse().unwrap()
    }

    #[tokio::test]
    async fn inbound_is_bounded_and_nonblocking() {
        let reg = SessionRegistry::new();
        let (session, tx, _rx) = reg.create(addr(), 2);
        assert!(tx.try_send(Bytes::from_static(b"a")).is_ok());
        assert!(tx.try_send(Bytes::from_static(b"b")).is_ok());
        assert!(tx.try_send(Bytes::from_static(b"c")).is_err(), "bounded");

        assert_eq!(session.try_recv().unwrap(), Bytes::from_static(b"a"));
        assert_eq!(session.try_recv().unwrap(), Bytes::from_static(b"b"));
        assert!(session.try_recv().is_none());
    }

    #[tokio::test]
    async fn flush_coalesces_sends() {
        let reg = SessionRegistry::new();
        let (session, _tx, mut out_rx) = reg.create(addr(), 8);
        session.send(&Bytes::from_static(b"aa"));
        session.send(&Bytes::from_static(b"bbb"));
        session.flush();
        let framed = out_rx.try_recv().unwrap();
        // Two frames in one write: 2+2 + 2+3 bytes.
        assert_eq!(framed.len(), 9);
        session.flush();
        assert!(out_rx.try_recv().is_err(), "empty flush sends nothing");
    }

    #[tokio::test]
    async fn state_round_trips() {
        let reg = SessionRegistry::new();
        let (session, _tx, _rx) = reg.create(addr(), 8);
        assert_eq!(session.state(), SessionState::Connected);
        session.set_state(SessionState::InWorld);
        assert_eq!(session.state(), SessionState::InWorld);
    }
}
