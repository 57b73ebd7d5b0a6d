use std::net::{SocketAddr, ToSocketAddrs};
use std::time::Duration;

// Upper bound for a connect, a read or a write on the cable.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(1);

#[derive(Clone, Debug)]
pub struct LinkConfig {
    pub enabled: bool,
    pub local: Option<SocketAddr>,
    pub peer: Option<SocketAddr>,
    pub timeout: Duration,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self { enabled: true, local: None, peer: None, timeout: DEFAULT_TIMEOUT }
    }
}

impl LinkConfig {
    // Addresses are resolved once. A pair that does not resolve leaves the port unplugged.
    pub fn resolve(local_host: &str, local_port: u16, peer_host: &str, peer_port: u16) -> Self {
        Self { local: lookup(local_host, local_port), peer: lookup(peer_host, peer_port), ..Self::default() }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn is_plugged(&self) -> bool {
        self.local.is_some() && self.peer.is_some()
    }
}

// An empty host means nothing is plugged on that side.
fn lookup(host: &str, port: u16) -> Option<SocketAddr> {
    if host.is_empty() {
        return None;
    }
    match (host, port).to_socket_addrs() {
        Ok(mut addrs) => addrs.next(),
        Err(e) => {
            rog::debugln!("Cannot resolve {}:{}: {}", host, port, e);
            None
        }
    }
}
