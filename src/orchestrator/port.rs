use anyhow::{Context, Result};
use std::net::{Ipv4Addr, TcpListener};

/// Ask the OS for an unused loopback port.
///
/// The placeholder listener is dropped before returning, so another process
/// may grab the port before the app binds it; that race is accepted.
pub(crate) fn allocate_free_port() -> Result<u16> {
    let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0))
        .context("failed to bind a placeholder socket")?;
    let port = listener
        .local_addr()
        .context("placeholder socket has no local address")?
        .port();
    drop(listener);
    Ok(port)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocated_port_can_be_bound() {
        let port = allocate_free_port().unwrap();
        assert_ne!(port, 0);
        let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, port)).unwrap();
        assert_eq!(listener.local_addr().unwrap().port(), port);
    }
}
