//! In-memory session handle for tests and in-process bridges
//!
//! Frames written to a [`MemoryHandle`] land on a Tokio channel instead of a
//! socket, so the peer side can be inspected directly.

use super::{SessionHandle, TransportError};
use bytes::Bytes;
use rosbridge_protocol::SessionId;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Session handle that forwards frames to an unbounded channel
///
/// # Example
///
/// ```
/// use bytes::Bytes;
/// use rosbridge_client::transport::memory::MemoryHandle;
/// use rosbridge_client::transport::SessionHandle;
///
/// let (handle, mut peer) = MemoryHandle::pair();
/// handle.send_bytes(Bytes::from_static(b"{}")).unwrap();
/// assert_eq!(peer.try_recv().unwrap(), Bytes::from_static(b"{}"));
/// ```
#[derive(Debug)]
pub struct MemoryHandle {
    session_id: SessionId,
    to_peer: mpsc::UnboundedSender<Bytes>,
    closed: AtomicBool,
}

impl MemoryHandle {
    /// Creates a handle writing into `to_peer`
    pub fn new(to_peer: mpsc::UnboundedSender<Bytes>) -> Self {
        Self {
            session_id: SessionId::new_v4(),
            to_peer,
            closed: AtomicBool::new(false),
        }
    }

    /// Creates a handle together with the receiver the peer reads from
    pub fn pair() -> (Arc<Self>, mpsc::UnboundedReceiver<Bytes>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Arc::new(Self::new(tx)), rx)
    }

    /// Marks the session closed; later sends fail with [`TransportError::Closed`]
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire) || self.to_peer.is_closed()
    }
}

impl SessionHandle for MemoryHandle {
    fn session_id(&self) -> SessionId {
        self.session_id
    }

    fn send_bytes(&self, frame: Bytes) -> Result<(), TransportError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(TransportError::Closed);
        }
        self.to_peer.send(frame).map_err(|_| TransportError::Closed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pair_delivers_in_order() {
        let (handle, mut peer) = MemoryHandle::pair();

        handle.send_bytes(Bytes::from_static(b"one")).unwrap();
        handle.send_bytes(Bytes::from_static(b"two")).unwrap();

        assert_eq!(peer.try_recv().unwrap(), Bytes::from_static(b"one"));
        assert_eq!(peer.try_recv().unwrap(), Bytes::from_static(b"two"));
    }

    #[test]
    fn test_send_after_close_fails() {
        let (handle, _peer) = MemoryHandle::pair();
        handle.close();

        assert!(handle.is_closed());
        assert_eq!(
            handle.send_bytes(Bytes::from_static(b"x")),
            Err(TransportError::Closed)
        );
    }

    #[test]
    fn test_send_after_peer_dropped_fails() {
        let (handle, peer) = MemoryHandle::pair();
        drop(peer);

        assert!(handle.is_closed());
        assert_eq!(
            handle.send_bytes(Bytes::from_static(b"x")),
            Err(TransportError::Closed)
        );
    }

    #[test]
    fn test_session_ids_are_unique() {
        let (a, _) = MemoryHandle::pair();
        let (b, _) = MemoryHandle::pair();
        assert_ne!(a.session_id(), b.session_id());
    }
}
