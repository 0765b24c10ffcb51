//! UDP socket construction
//!
//! Sockets are built through socket2 so the kernel buffers can be sized for
//! sustained packet rates before conversion into tokio.

use socket2::{Domain, Protocol, Socket, Type};
use std::net::SocketAddr;
use tokio::net::UdpSocket;

use crate::error::{NetworkError, Result};

/// Kernel buffer size for high packet rates
const SOCKET_BUFFER_SIZE: usize = 1 << 20;

/// Bind a tuned, nonblocking UDP socket
///
/// Must be called from within a tokio runtime.
pub fn bind_socket(addr: SocketAddr) -> Result<UdpSocket> {
    let socket = Socket::new(Domain::for_address(addr), Type::DGRAM, Some(Protocol::UDP))
        .map_err(|e| NetworkError::BindFailed(e.to_string()))?;

    socket
        .set_reuse_address(true)
        .map_err(|e| NetworkError::BindFailed(e.to_string()))?;
    socket
        .set_recv_buffer_size(SOCKET_BUFFER_SIZE)
        .map_err(|e| NetworkError::BindFailed(e.to_string()))?;
    socket
        .set_send_buffer_size(SOCKET_BUFFER_SIZE)
        .map_err(|e| NetworkError::BindFailed(e.to_string()))?;
    socket
        .set_nonblocking(true)
        .map_err(|e| NetworkError::BindFailed(e.to_string()))?;
    socket
        .bind(&addr.into())
        .map_err(|e| NetworkError::BindFailed(e.to_string()))?;

    let socket = UdpSocket::from_std(socket.into())
        .map_err(|e| NetworkError::BindFailed(e.to_string()))?;
    Ok(socket)
}

/// Wildcard local address in the same family as the target
pub fn unspecified_local(target: &SocketAddr) -> SocketAddr {
    match target {
        SocketAddr::V4(_) => SocketAddr::from(([0, 0, 0, 0], 0)),
        SocketAddr::V6(_) => SocketAddr::from(([0u16; 8], 0)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_bind_ephemeral() {
        let socket = bind_socket("127.0.0.1:0".parse().unwrap()).unwrap();
        let addr = socket.local_addr().unwrap();
        assert_ne!(addr.port(), 0);
    }

    #[test]
    fn test_unspecified_local_matches_family() {
        let v4: SocketAddr = "192.168.1.10:5000".parse().unwrap();
        assert!(unspecified_local(&v4).is_ipv4());

        let v6: SocketAddr = "[2001:db8::1]:5000".parse().unwrap();
        assert!(unspecified_local(&v6).is_ipv6());
    }
}
