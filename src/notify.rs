//! Event delivery: string tokens over UDP.
//!
//! Fire-and-forget by design.  The consumer is a local process on the
//! same box; a dropped datagram costs one stale UI update, while blocking
//! the camera loop on delivery would cost every frame behind it.

use std::net::UdpSocket;

use anyhow::Context;
use tracing::{debug, warn};

/// Sink for confirmed pipeline events.
pub trait Notifier {
    fn notify(&mut self, token: &str);
}

// ── UDP ────────────────────────────────────────────────────

/// Sends each token as one UDP datagram to a fixed endpoint.
pub struct UdpNotifier {
    socket: UdpSocket,
    endpoint: String,
}

impl UdpNotifier {
    pub fn new(endpoint: &str) -> anyhow::Result<Self> {
        let socket = UdpSocket::bind("0.0.0.0:0")
            .context("binding UDP notifier socket")?;
        socket
            .connect(endpoint)
            .with_context(|| format!("connecting UDP notifier to {endpoint}"))?;
        socket
            .set_nonblocking(true)
            .context("setting UDP notifier nonblocking")?;
        Ok(Self {
            socket,
            endpoint: endpoint.to_string(),
        })
    }
}

impl Notifier for UdpNotifier {
    fn notify(&mut self, token: &str) {
        match self.socket.send(token.as_bytes()) {
            Ok(_) => debug!(token, endpoint = %self.endpoint, "sent"),
            // Delivery is best-effort; the pipeline must keep running.
            Err(err) => warn!(token, endpoint = %self.endpoint, %err, "UDP send failed"),
        }
    }
}

// ── Test sink ──────────────────────────────────────────────

/// Records tokens in memory instead of sending them.
#[cfg(test)]
#[derive(Debug, Default)]
pub struct MemoryNotifier {
    pub tokens: Vec<String>,
}

#[cfg(test)]
impl Notifier for MemoryNotifier {
    fn notify(&mut self, token: &str) {
        self.tokens.push(token.to_string());
    }
}

// ── Tests ──────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_memory_notifier_records_in_order() {
        let mut n = MemoryNotifier::default();
        n.notify("gesture/five");
        n.notify("area/menu/2");
        assert_eq!(n.tokens, vec!["gesture/five", "area/menu/2"]);
    }

    #[test]
    fn test_udp_notifier_delivers_datagram() {
        let receiver = UdpSocket::bind("127.0.0.1:0").unwrap();
        receiver
            .set_read_timeout(Some(Duration::from_secs(2)))
            .unwrap();
        let endpoint = receiver.local_addr().unwrap().to_string();

        let mut n = UdpNotifier::new(&endpoint).unwrap();
        n.notify("Swipe");

        let mut buf = [0u8; 64];
        let (len, _) = receiver.recv_from(&mut buf).unwrap();
        assert_eq!(&buf[..len], b"Swipe");
    }

    #[test]
    fn test_udp_notifier_survives_unreachable_endpoint() {
        // Nothing listens here; notify must not panic or error out.
        let mut n = UdpNotifier::new("127.0.0.1:9").unwrap();
        n.notify("gesture/zero");
        n.notify("gesture/zero");
    }
}
