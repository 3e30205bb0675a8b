//! Free port discovery for the referee broadcast and CI channels.
//!
//! Ports are probed by binding a TCP listener on all interfaces. A
//! [`PortReservation`] keeps that listener open so a second allocator running
//! in the same host cannot hand out the same port until the reservation is
//! released.

use std::net::{Ipv4Addr, SocketAddrV4, TcpListener};

use rand::Rng;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PortError {
    #[error("no free port in {start}..={max}")]
    NoFreePort { start: u16, max: u16 },
    #[error("port {0} is already bound")]
    ReservedPortInUse(u16),
}

/// Port held open until dropped or [`released`](PortReservation::release).
#[derive(Debug)]
pub struct PortReservation {
    port: u16,
    _listener: TcpListener,
}

impl PortReservation {
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Close the held socket so another process can bind the port.
    pub fn release(self) -> u16 {
        self.port
    }
}

fn bind_any(port: u16) -> std::io::Result<TcpListener> {
    TcpListener::bind(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, port))
}

/// Whether `port` can currently be bound. The probe socket is closed before
/// returning.
pub fn is_bindable(port: u16) -> bool {
    bind_any(port).is_ok()
}

/// First bindable port in `start..=max`.
pub fn next_free_port(start: u16, max: u16) -> Result<u16, PortError> {
    reserve_free_port(start, max).map(PortReservation::release)
}

/// Like [`next_free_port`] but keeps the port bound.
pub fn reserve_free_port(start: u16, max: u16) -> Result<PortReservation, PortError> {
    // port 0 asks the OS for an ephemeral port, which is not what callers want
    for port in start.max(1)..=max {
        if let Ok(listener) = bind_any(port) {
            tracing::debug!(target: "gc_bridge::ports", port, "port.reserved");
            return Ok(PortReservation {
                port,
                _listener: listener,
            });
        }
    }
    Err(PortError::NoFreePort { start, max })
}

/// Reserve the first free port at or after a random starting point in
/// `min..=max`.
pub fn reserve_random_port(min: u16, max: u16) -> Result<PortReservation, PortError> {
    let start = rand::thread_rng().gen_range(min..=max);
    reserve_free_port(start, max)
}

/// Reserve exactly `port`, failing if something else already holds it.
pub fn reserve_exact_port(port: u16) -> Result<PortReservation, PortError> {
    bind_any(port)
        .map(|listener| PortReservation {
            port,
            _listener: listener,
        })
        .map_err(|_| PortError::ReservedPortInUse(port))
}
