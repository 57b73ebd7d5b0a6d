use std::io;
use std::net::SocketAddr;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LinkError {
    #[error("link port is disabled")]
    Disabled,
    #[error("link port has no local or peer address")]
    Unconfigured,
    #[error("cannot connect to {peer}: {source}")]
    Connect {
        peer: SocketAddr,
        #[source]
        source: io::Error,
    },
    #[error("exchange aborted: {0}")]
    Io(#[from] io::Error),
    #[error("peer echoed tag {echoed:#04x}, sent {sent:#04x}")]
    TagMismatch { sent: u8, echoed: u8 },
}

pub type Result<T> = std::result::Result<T, LinkError>;
