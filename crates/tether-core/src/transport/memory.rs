//! In-process session pair for tests and embedding.
//!
//! [`pair`] returns a [`MemorySession`] to hand to a service and the
//! [`MemoryPeer`] that plays the remote side.
//!
//! # Example
//!
//! ```ignore
//! use tether_core::codec::Frame;
//! use tether_core::transport::{HandshakeRequest, Session, memory};
//!
//! let (mut session, mut peer) = memory::pair(HandshakeRequest::new("/ws"));
//! peer.send(Frame::text("hi"))?;
//! assert_eq!(session.read().await?, Frame::text("hi"));
//! ```

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::{HandshakeRequest, Session};
use crate::codec::Frame;
use crate::error::{TransportError, TransportResult};

/// I/O counters shared by both ends of a pair.
#[derive(Debug, Default)]
pub struct SessionStats {
    reads: AtomicUsize,
    writes: AtomicUsize,
    closes: AtomicUsize,
}

impl SessionStats {
    /// Frames read by the session.
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    /// Frames written by the session.
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Times the session was actually shut down.
    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

/// Server side of an in-memory pair.
pub struct MemorySession {
    inbound: mpsc::UnboundedReceiver<Frame>,
    outbound: Option<mpsc::UnboundedSender<Frame>>,
    request: HandshakeRequest,
    stats: Arc<SessionStats>,
}

/// Remote side of an in-memory pair.
pub struct MemoryPeer {
    outbound: Option<mpsc::UnboundedSender<Frame>>,
    inbound: mpsc::UnboundedReceiver<Frame>,
    stats: Arc<SessionStats>,
}

/// Creates a connected session/peer pair.
pub fn pair(request: HandshakeRequest) -> (MemorySession, MemoryPeer) {
    let (to_session, session_rx) = mpsc::unbounded_channel();
    let (to_peer, peer_rx) = mpsc::unbounded_channel();
    let stats = Arc::new(SessionStats::default());

    let session = MemorySession {
        inbound: session_rx,
        outbound: Some(to_peer),
        request,
        stats: stats.clone(),
    };
    let peer = MemoryPeer {
        outbound: Some(to_session),
        inbound: peer_rx,
        stats,
    };
    (session, peer)
}

#[async_trait]
impl Session for MemorySession {
    async fn read(&mut self) -> TransportResult<Frame> {
        if self.outbound.is_none() {
            return Err(TransportError::closed("session closed"));
        }
        let frame = self
            .inbound
            .recv()
            .await
            .ok_or_else(|| TransportError::closed("peer hung up"))?;
        self.stats.reads.fetch_add(1, Ordering::SeqCst);
        Ok(frame)
    }

    async fn write(&mut self, frame: Frame) -> TransportResult<()> {
        let tx = self
            .outbound
            .as_ref()
            .ok_or_else(|| TransportError::closed("session closed"))?;
        tx.send(frame)
            .map_err(|_| TransportError::closed("peer hung up"))?;
        self.stats.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn close(&mut self) -> TransportResult<()> {
        if self.outbound.take().is_some() {
            self.inbound.close();
            self.stats.closes.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }

    fn remote_addr(&self) -> Option<SocketAddr> {
        self.request.remote_addr
    }

    fn local_addr(&self) -> Option<SocketAddr> {
        None
    }

    fn request(&self) -> &HandshakeRequest {
        &self.request
    }
}

impl MemoryPeer {
    /// Sends a frame to the session.
    pub fn send(&self, frame: Frame) -> TransportResult<()> {
        let tx = self
            .outbound
            .as_ref()
            .ok_or_else(|| TransportError::closed("peer closed"))?;
        tx.send(frame)
            .map_err(|_| TransportError::closed("session closed"))
    }

    /// Receives the next frame written by the session.
    ///
    /// Returns `None` once the session is closed and every frame written
    /// before the close has been drained.
    pub async fn recv(&mut self) -> Option<Frame> {
        self.inbound.recv().await
    }

    /// Hangs up; a pending session read fails.
    pub fn close(&mut self) {
        self.outbound = None;
    }

    /// I/O counters of the session side.
    pub fn stats(&self) -> &SessionStats {
        &self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_frames_flow_both_ways() {
        let (mut session, mut peer) = pair(HandshakeRequest::new("/"));

        peer.send(Frame::binary(vec![1, 2])).unwrap();
        assert_eq!(session.read().await.unwrap(), Frame::binary(vec![1, 2]));

        session.write(Frame::text("pong")).await.unwrap();
        assert_eq!(peer.recv().await, Some(Frame::text("pong")));

        assert_eq!(peer.stats().reads(), 1);
        assert_eq!(peer.stats().writes(), 1);
    }

    #[tokio::test]
    async fn test_peer_hangup_fails_pending_read() {
        let (mut session, mut peer) = pair(HandshakeRequest::new("/"));
        peer.close();
        assert!(matches!(
            session.read().await,
            Err(TransportError::ConnectionClosed { .. })
        ));
    }

    #[tokio::test]
    async fn test_session_close_is_counted_once() {
        let (mut session, mut peer) = pair(HandshakeRequest::new("/"));
        session.close().await.unwrap();
        session.close().await.unwrap();

        assert_eq!(peer.stats().closes(), 1);
        assert_eq!(peer.recv().await, None);
        assert!(session.write(Frame::text("late")).await.is_err());
    }
}
