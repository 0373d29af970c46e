use std::collections::HashMap;
use std::net::SocketAddr;

use tokio::sync::mpsc::UnboundedSender;

/// Tracks currently connected controllers so the server can push
/// out-of-band events to them.
///
/// Entries are inserted when a connection is accepted and removed when it
/// closes, regardless of why. A peer address no longer present is simply
/// "not currently connected" — the registry tolerates address reuse across
/// connections since each insert overwrites whatever (already-dead) entry
/// might still be at that key.
#[derive(Default)]
pub struct ConnectionRegistry {
    sessions: HashMap<SocketAddr, UnboundedSender<bytes::Bytes>>,
}

impl ConnectionRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a newly accepted connection's outbound channel.
    pub fn register(&mut self, peer: SocketAddr, sender: UnboundedSender<bytes::Bytes>) {
        self.sessions.insert(peer, sender);
    }

    /// Remove a connection, typically on close. No-op if already absent.
    pub fn unregister(&mut self, peer: &SocketAddr) {
        self.sessions.remove(peer);
    }

    /// Whether `peer` is currently registered.
    #[must_use]
    pub fn has_session(&self, peer: &SocketAddr) -> bool {
        self.sessions.contains_key(peer)
    }

    /// Number of currently registered connections.
    #[must_use]
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Queue an out-of-band event body for `peer`'s connection task, which
    /// frames and encrypts it itself so the result reflects that
    /// connection's own crypto phase. Returns `true` if a registered
    /// connection accepted the body onto its outbound queue, `false` if
    /// `peer` is not currently connected.
    #[must_use]
    pub fn push_event(&self, peer: &SocketAddr, body: bytes::Bytes) -> bool {
        match self.sessions.get(peer) {
            Some(sender) => sender.send(body).is_ok(),
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    fn addr(port: u16) -> SocketAddr {
        format!("127.0.0.1:{port}").parse().unwrap()
    }

    #[test]
    fn register_and_has_session() {
        let mut registry = ConnectionRegistry::new();
        let (tx, _rx) = mpsc::unbounded_channel();
        let peer = addr(1);
        assert!(!registry.has_session(&peer));
        registry.register(peer, tx);
        assert!(registry.has_session(&peer));
    }

    #[test]
    fn unregister_removes_session() {
        let mut registry = ConnectionRegistry::new();
        let (tx, _rx) = mpsc::unbounded_channel();
        let peer = addr(2);
        registry.register(peer, tx);
        registry.unregister(&peer);
        assert!(!registry.has_session(&peer));
    }

    #[test]
    fn push_event_to_unknown_peer_returns_false() {
        let registry = ConnectionRegistry::new();
        assert!(!registry.push_event(&addr(3), bytes::Bytes::from_static(b"data")));
    }

    #[test]
    fn push_event_to_known_peer_returns_true_and_delivers() {
        let mut registry = ConnectionRegistry::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let peer = addr(4);
        registry.register(peer, tx);

        assert!(registry.push_event(&peer, bytes::Bytes::from_static(b"data")));
        assert_eq!(rx.try_recv().unwrap(), bytes::Bytes::from_static(b"data"));
    }

    #[test]
    fn session_count_tracks_registrations() {
        let mut registry = ConnectionRegistry::new();
        let (tx1, _rx1) = mpsc::unbounded_channel();
        let (tx2, _rx2) = mpsc::unbounded_channel();
        registry.register(addr(5), tx1);
        registry.register(addr(6), tx2);
        assert_eq!(registry.session_count(), 2);
        registry.unregister(&addr(5));
        assert_eq!(registry.session_count(), 1);
    }

    #[test]
    fn re_registering_same_address_replaces_entry() {
        let mut registry = ConnectionRegistry::new();
        let (tx1, rx1) = mpsc::unbounded_channel();
        let (tx2, mut rx2) = mpsc::unbounded_channel();
        let peer = addr(7);

        registry.register(peer, tx1);
        registry.register(peer, tx2);
        drop(rx1);

        assert!(registry.push_event(&peer, bytes::Bytes::from_static(b"x")));
        assert_eq!(rx2.try_recv().unwrap(), bytes::Bytes::from_static(b"x"));
    }
}
