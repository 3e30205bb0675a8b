//! Background listener for the controller's referee broadcast.
//!
//! The listener thread owns its UDP socket. For every datagram that decodes
//! as a `Referee` message it runs the registered handler to completion and
//! then republishes the unmodified message to each consumer. Handler errors
//! and socket failures stop the thread; the error is returned to whoever
//! shuts the listener down.

use std::io;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4, UdpSocket};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::Sender;
use gc_proto::ssl_gc::Referee;
use gc_proto::Message;
use thiserror::Error;

const MAX_DATAGRAM_SIZE: usize = 65_536;

#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("simulator world state sink disconnected")]
    SimulatorDisconnected,
}

#[derive(Debug, Error)]
pub enum ListenerError {
    #[error("failed to bind referee socket on {addr}: {source}")]
    Bind {
        addr: SocketAddrV4,
        #[source]
        source: io::Error,
    },
    #[error("failed to join multicast group {group} on {interface}: {source}")]
    JoinGroup {
        group: Ipv4Addr,
        interface: Ipv4Addr,
        #[source]
        source: io::Error,
    },
    #[error("referee socket receive failed: {0}")]
    Receive(#[source] io::Error),
    #[error("referee handler failed: {0}")]
    Handler(#[from] HandlerError),
    #[error("referee listener thread panicked: {0}")]
    Panicked(String),
}

/// Callback run on the listener thread for every decoded referee message.
pub trait RefereeHandler: Send {
    fn handle(&mut self, referee: &Referee) -> Result<(), HandlerError>;
}

impl<F> RefereeHandler for F
where
    F: FnMut(&Referee) -> Result<(), HandlerError> + Send,
{
    fn handle(&mut self, referee: &Referee) -> Result<(), HandlerError> {
        self(referee)
    }
}

/// Downstream receiver of forwarded referee messages.
pub trait RefereeSink: Send {
    fn publish(&self, referee: &Referee);
}

impl RefereeSink for Sender<Referee> {
    fn publish(&self, referee: &Referee) {
        if self.send(referee.clone()).is_err() {
            tracing::warn!(target: "gc_bridge::referee", "referee.forward_dropped=disconnected");
        }
    }
}

#[derive(Debug, Clone)]
pub struct ListenerConfig {
    /// Multicast group to join, or a unicast address to bind directly.
    pub address: Ipv4Addr,
    pub port: u16,
    pub interface: Ipv4Addr,
    /// Upper bound on how long shutdown waits for a blocked receive.
    pub poll_interval: Duration,
}

pub struct RefereeListener {
    local_addr: SocketAddr,
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<Result<(), ListenerError>>>,
}

impl RefereeListener {
    pub fn spawn<H>(
        config: &ListenerConfig,
        handler: H,
        consumers: Vec<Box<dyn RefereeSink>>,
    ) -> Result<Self, ListenerError>
    where
        H: RefereeHandler + 'static,
    {
        let socket = bind_socket(config)?;
        let local_addr = socket.local_addr().map_err(ListenerError::Receive)?;
        socket
            .set_read_timeout(Some(config.poll_interval))
            .map_err(ListenerError::Receive)?;

        let stop = Arc::new(AtomicBool::new(false));
        let thread_stop = Arc::clone(&stop);
        let thread = thread::Builder::new()
            .name("referee-listener".to_string())
            .spawn(move || run_listener(socket, thread_stop, handler, consumers))
            .map_err(ListenerError::Receive)?;

        tracing::info!(
            target: "gc_bridge::referee",
            address = %config.address,
            %local_addr,
            "referee.listener_started"
        );

        Ok(Self {
            local_addr,
            stop,
            thread: Some(thread),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Whether the listener thread has exited, normally or with an error.
    pub fn is_finished(&self) -> bool {
        self.thread
            .as_ref()
            .map_or(true, |thread| thread.is_finished())
    }

    /// Stop the thread, wait for it, and return how it ended.
    pub fn shutdown(mut self) -> Result<(), ListenerError> {
        self.stop_and_join()
    }

    fn stop_and_join(&mut self) -> Result<(), ListenerError> {
        self.stop.store(true, Ordering::Release);
        let Some(thread) = self.thread.take() else {
            return Ok(());
        };
        match thread.join() {
            Ok(result) => result,
            Err(payload) => Err(ListenerError::Panicked(panic_message(payload.as_ref()))),
        }
    }
}

impl Drop for RefereeListener {
    fn drop(&mut self) {
        if let Err(err) = self.stop_and_join() {
            tracing::error!(target: "gc_bridge::referee", error = %err, "referee.listener_failed");
        }
    }
}

fn bind_socket(config: &ListenerConfig) -> Result<UdpSocket, ListenerError> {
    let bind_ip = if config.address.is_multicast() {
        Ipv4Addr::UNSPECIFIED
    } else {
        config.address
    };
    let addr = SocketAddrV4::new(bind_ip, config.port);
    let socket = UdpSocket::bind(addr).map_err(|source| ListenerError::Bind { addr, source })?;

    if config.address.is_multicast() {
        socket
            .join_multicast_v4(&config.address, &config.interface)
            .map_err(|source| ListenerError::JoinGroup {
                group: config.address,
                interface: config.interface,
                source,
            })?;
    }
    Ok(socket)
}

fn run_listener<H: RefereeHandler>(
    socket: UdpSocket,
    stop: Arc<AtomicBool>,
    mut handler: H,
    consumers: Vec<Box<dyn RefereeSink>>,
) -> Result<(), ListenerError> {
    let mut buffer = vec![0u8; MAX_DATAGRAM_SIZE];

    while !stop.load(Ordering::Acquire) {
        let len = match socket.recv(&mut buffer) {
            Ok(len) => len,
            Err(ref err)
                if matches!(
                    err.kind(),
                    io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut | io::ErrorKind::Interrupted
                ) =>
            {
                continue;
            }
            Err(err) => {
                tracing::error!(target: "gc_bridge::referee", error = %err, "referee.receive_failed");
                return Err(ListenerError::Receive(err));
            }
        };

        let referee = match Referee::decode(&buffer[..len]) {
            Ok(referee) => referee,
            Err(err) => {
                tracing::warn!(
                    target: "gc_bridge::referee",
                    bytes = len,
                    error = %err,
                    "referee.decode_failed"
                );
                continue;
            }
        };

        if let Err(err) = handler.handle(&referee) {
            tracing::error!(target: "gc_bridge::referee", error = %err, "referee.handler_failed");
            return Err(err.into());
        }
        for consumer in &consumers {
            consumer.publish(&referee);
        }
    }

    tracing::info!(target: "gc_bridge::referee", "referee.listener_stopped");
    Ok(())
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
