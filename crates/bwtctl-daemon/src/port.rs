//! Ephemeral port allocation for the daemon's Electrum RPC listener

use std::net::{Ipv4Addr, SocketAddr, TcpListener};

use bwtctl_core::prelude::*;

/// Loopback address the daemon binds its RPC server to
pub const LOCAL_HOST: Ipv4Addr = Ipv4Addr::LOCALHOST;

/// Ask the OS for a currently unused TCP port on the loopback interface.
///
/// The probe socket is closed before returning, so the port is only known to
/// be free at allocation time; the daemon binds it shortly afterwards.
pub fn allocate_ephemeral_port() -> Result<u16> {
    let listener = TcpListener::bind(SocketAddr::from((LOCAL_HOST, 0))).map_err(|e| {
        Error::PortAllocation {
            reason: e.to_string(),
        }
    })?;
    let port = listener
        .local_addr()
        .map_err(|e| Error::PortAllocation {
            reason: e.to_string(),
        })?
        .port();
    debug!("Allocated ephemeral port {}", port);
    Ok(port)
}

/// `127.0.0.1:<port>`
pub fn local_rpc_addr(port: u16) -> SocketAddr {
    SocketAddr::from((LOCAL_HOST, port))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocated_port_is_nonzero_and_bindable() {
        let port = allocate_ephemeral_port().unwrap();
        assert_ne!(port, 0);
        // the probe socket was released
        let listener = TcpListener::bind(local_rpc_addr(port));
        assert!(listener.is_ok(), "port {} should be free again", port);
    }

    #[test]
    fn test_local_rpc_addr_format() {
        assert_eq!(local_rpc_addr(50001).to_string(), "127.0.0.1:50001");
    }
}
