//! Event loop and dispatch.
//!
//! [`Server`] owns the listening socket, the poller, and the table of live
//! connections. Everything is driven from [`Server::run`]: one readiness
//! event per turn, dispatched to the owning connection's handler. The loop
//! is single-threaded and cooperative; no handler blocks except the
//! bounded, accepted synchronous file open at resolution time.

mod conn;
mod transfer;

pub mod resource;

use crate::config::ServerConfig;
use crate::poll::{Event, Interest, Poller};
use crate::sys::{
    Fd, sys_accept, sys_bind, sys_domain, sys_listen, sys_set_reuseaddr, sys_socket, sys_sockname,
};
use crate::utils::Slab;

use conn::{Connection, Verdict};
use std::io;
use std::net::SocketAddr;
use tracing::{debug, info, warn};

/// Token reserved for the listening socket.
///
/// Slab indices can never collide with it.
const LISTENER_TOKEN: u64 = u64::MAX;

/// High bit marking a token as an AIO completion eventfd.
const COMPLETION_BIT: u64 = 1 << 63;

/// Completion token for the connection registered under `socket_token`.
pub(crate) fn completion_token(socket_token: u64) -> u64 {
    socket_token | COMPLETION_BIT
}

/// A single-threaded, readiness-driven HTTP file server.
///
/// Each instance is fully self-contained: its own listener, poller, and
/// connection table. Several servers can run side by side in one process.
pub struct Server {
    config: ServerConfig,
    listener: Fd,
    poller: Poller,
    conns: Slab<Connection>,
}

impl Server {
    /// Creates the listening socket and the poller.
    ///
    /// Any failure here is fatal and returned before any connection state
    /// exists; nothing is left half-registered.
    pub fn bind(config: ServerConfig) -> io::Result<Self> {
        let listener = sys_socket(sys_domain(&config.listen_addr))?;
        sys_set_reuseaddr(listener.raw())?;
        sys_bind(listener.raw(), &config.listen_addr)?;
        sys_listen(listener.raw(), config.backlog)?;

        let poller = Poller::new()?;
        poller.register(
            listener.raw(),
            LISTENER_TOKEN,
            Interest {
                read: true,
                write: false,
            },
        )?;

        Ok(Self {
            config,
            listener,
            poller,
            conns: Slab::with_capacity(64),
        })
    }

    /// Actual address of the listening socket.
    ///
    /// Useful when binding port 0.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        sys_sockname(self.listener.raw())
    }

    /// Runs the event loop.
    ///
    /// Only a poller failure returns; per-connection errors tear down that
    /// connection and the loop keeps serving the rest.
    pub fn run(mut self) -> io::Result<()> {
        info!(addr = %self.local_addr()?, root = %self.config.document_root.display(), "serving");

        loop {
            let event = self.poller.wait()?;
            self.dispatch(event);
        }
    }

    fn dispatch(&mut self, event: Event) {
        if event.token == LISTENER_TOKEN {
            if event.readable {
                self.accept_ready();
            }
            return;
        }

        if event.token & COMPLETION_BIT != 0 {
            let socket_token = event.token & !COMPLETION_BIT;
            let index = socket_token as usize;

            let Some(conn) = self.conns.get_mut(index) else {
                return;
            };
            if let Verdict::Close = conn.on_completion(&self.poller, socket_token) {
                self.close(index);
            }
            return;
        }

        let index = event.token as usize;

        if event.readable {
            let Some(conn) = self.conns.get_mut(index) else {
                return;
            };
            if let Verdict::Close = conn.on_readable(&self.poller, &self.config, event.token) {
                self.close(index);
                return;
            }
        }

        if event.writable {
            let Some(conn) = self.conns.get_mut(index) else {
                return;
            };
            if let Verdict::Close = conn.on_writable(&self.poller, &self.config, event.token) {
                self.close(index);
            }
        }
    }

    /// Accepts one connection and registers it for read interest.
    ///
    /// Accept failures are logged and the loop moves on; they never abort
    /// the server.
    fn accept_ready(&mut self) {
        match sys_accept(self.listener.raw()) {
            Ok((sock, peer)) => {
                debug!(%peer, live = self.conns.len() + 1, "accepted connection");

                let raw = sock.raw();
                let index = self.conns.insert(Connection::new(sock, peer));

                let interest = Interest {
                    read: true,
                    write: false,
                };
                if let Err(err) = self.poller.register(raw, index as u64, interest) {
                    warn!(%peer, %err, "failed to register connection");
                    self.conns.remove(index);
                }
            }

            Err(err) => {
                if err.kind() != io::ErrorKind::WouldBlock {
                    warn!(%err, "accept failed");
                }
            }
        }
    }

    /// Removes a connection, releasing its descriptors exactly once.
    fn close(&mut self, index: usize) {
        if let Some(mut conn) = self.conns.remove(index) {
            conn.release(&self.poller);
        }
    }
}
