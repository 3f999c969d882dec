//! Per-connection state machine.
//!
//! A [`Connection`] owns one accepted socket and everything serving it:
//! the growing receive buffer, the staged response header, and whichever
//! body transfer its resource kind selected. It is mutated only by the
//! event loop's readiness dispatch; there is no background actor.
//!
//! Phases move monotonically:
//!
//! ```text
//! Receiving -> HeaderReady -> SendingHeader -> SendingBody -> Sent -> Closed
//!                          \-> Sending404 ----------------/
//! ```
//!
//! Any socket error other than `WouldBlock`, and any AIO failure, short-
//! circuits to `Closed`; the connection's resources are released exactly
//! once, by the event loop, right after the verdict.

use crate::config::ServerConfig;
use crate::http::{request, response};
use crate::poll::{Interest, Poller};
use crate::server::completion_token;
use crate::server::resource::{self, ResourceKind};
use crate::server::transfer::{CompletionStep, DynamicTransfer, StaticTransfer};
use crate::sys::{Fd, sys_file_size, sys_open_readonly, sys_read, sys_write};

use std::io;
use std::net::SocketAddr;
use tracing::{debug, warn};

/// Phase of the connection lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum State {
    /// Accumulating request bytes until the header terminator appears.
    Receiving,

    /// Terminator seen; path resolved and file opened synchronously.
    HeaderReady,

    /// Flushing a 200 header.
    SendingHeader,

    /// Flushing a bodiless error header (404 or 413).
    Sending404,

    /// Streaming the file body via the resource's transfer mechanism.
    SendingBody,

    /// Everything owed to the peer has been handed to the kernel.
    Sent,

    /// Terminal. Reached exactly once.
    Closed,
}

/// Resource attached to the connection, tagged by transfer capability.
///
/// Each variant carries only the fields its phase actually uses, so an
/// async context cannot exist for a static resource and an open file
/// cannot exist for an unresolved one.
enum Body {
    /// No usable resource; a bodiless error header is all the peer gets.
    Unresolved,

    /// Resolved and opened, body transfer not yet started.
    Resolved {
        kind: ResourceKind,
        file: Fd,
        size: u64,
    },

    /// Static body transfer in progress.
    Static(StaticTransfer),

    /// Dynamic body transfer in progress.
    Dynamic(DynamicTransfer),

    /// Body fully delivered; backing resources already released.
    Finished,
}

/// What the event loop should do with the connection after a dispatch.
pub(crate) enum Verdict {
    Continue,
    Close,
}

/// One accepted client connection.
pub(crate) struct Connection {
    /// Owned socket, closed exactly once on drop.
    sock: Fd,

    /// Peer address, kept for logging.
    peer: SocketAddr,

    state: State,

    /// Request bytes received so far; grows until the terminator or the
    /// configured cap.
    recv: Vec<u8>,

    /// Staged response header bytes not yet accepted by the socket.
    send: Vec<u8>,

    body: Body,
}

impl Connection {
    pub(crate) fn new(sock: Fd, peer: SocketAddr) -> Self {
        Self {
            sock,
            peer,
            state: State::Receiving,
            recv: Vec::with_capacity(1024),
            send: Vec::new(),
            body: Body::Unresolved,
        }
    }

    /// Handles read readiness on the socket.
    pub(crate) fn on_readable(
        &mut self,
        poller: &Poller,
        config: &ServerConfig,
        token: u64,
    ) -> Verdict {
        match self.state {
            State::Receiving => match self.receive(poller, config, token) {
                Ok(verdict) => verdict,
                Err(err) => self.fail("receive", err),
            },

            State::Closed => Verdict::Close,

            // Readiness outside the receive phase is a hangup or stray
            // data; probe the socket so a dead peer tears down promptly.
            _ => {
                let mut probe = [0u8; 1];
                let n = sys_read(self.sock.raw(), &mut probe);

                if n == 0 {
                    debug!(peer = %self.peer, "peer closed mid-response");
                    return Verdict::Close;
                }
                if n < 0 && io::Error::last_os_error().kind() != io::ErrorKind::WouldBlock {
                    return Verdict::Close;
                }

                Verdict::Continue
            }
        }
    }

    /// Handles write readiness on the socket.
    pub(crate) fn on_writable(
        &mut self,
        poller: &Poller,
        config: &ServerConfig,
        token: u64,
    ) -> Verdict {
        match self.state {
            State::SendingHeader | State::Sending404 => {
                match self.flush_header(poller, config, token) {
                    Ok(verdict) => verdict,
                    Err(err) => self.fail("send header", err),
                }
            }

            State::SendingBody => match &mut self.body {
                Body::Static(transfer) => {
                    match transfer.send_chunk(self.sock.raw(), config.chunk_bytes) {
                        Ok(true) => {
                            self.body = Body::Finished;
                            self.state = State::Sent;
                            Verdict::Continue
                        }
                        Ok(false) => Verdict::Continue,
                        Err(err) => self.fail("static transfer", err),
                    }
                }

                // Dynamic bodies are driven by completion events; socket
                // readiness is requested only while a write is parked on a
                // full send buffer.
                Body::Dynamic(transfer) => {
                    if !transfer.stalled() {
                        return Verdict::Continue;
                    }

                    match transfer.resume_write(self.sock.raw()) {
                        Ok(()) => {
                            // Completions drive the phase again; quiesce
                            // socket readiness until the next stall.
                            let quiet = Interest {
                                read: false,
                                write: false,
                            };
                            match poller.reregister(self.sock.raw(), token, quiet) {
                                Ok(()) => Verdict::Continue,
                                Err(err) => self.fail("quiesce socket", err),
                            }
                        }
                        Err(err) => self.fail("dynamic transfer", err),
                    }
                }

                _ => Verdict::Continue,
            },

            State::Sent | State::Closed => Verdict::Close,

            _ => Verdict::Continue,
        }
    }

    /// Handles readiness of the AIO completion eventfd.
    pub(crate) fn on_completion(&mut self, poller: &Poller, token: u64) -> Verdict {
        let Body::Dynamic(transfer) = &mut self.body else {
            return Verdict::Continue;
        };

        match transfer.on_completion(self.sock.raw()) {
            Ok(CompletionStep::Done) => {
                let _ = poller.deregister(transfer.completion_fd());
                self.body = Body::Finished;
                self.state = State::Sent;
                debug!(peer = %self.peer, "dynamic body delivered");

                // Rearm the socket so the next writable turn closes us.
                let interest = Interest {
                    read: false,
                    write: true,
                };
                match poller.reregister(self.sock.raw(), token, interest) {
                    Ok(()) => Verdict::Continue,
                    Err(err) => self.fail("rearm socket", err),
                }
            }

            Ok(CompletionStep::InFlight) => Verdict::Continue,

            // Wait for the peer to drain the socket; the next writable turn
            // resumes the parked write.
            Ok(CompletionStep::SocketFull) => {
                let interest = Interest {
                    read: false,
                    write: true,
                };
                match poller.reregister(self.sock.raw(), token, interest) {
                    Ok(()) => Verdict::Continue,
                    Err(err) => self.fail("rearm socket", err),
                }
            }

            Err(err) => self.fail("dynamic transfer", err),
        }
    }

    /// Deregisters every descriptor this connection holds.
    ///
    /// Runs exactly once, just before the connection is dropped; dropping
    /// then closes the socket and whatever the body variant still owns.
    pub(crate) fn release(&mut self, poller: &Poller) {
        if let Body::Dynamic(transfer) = &self.body {
            let _ = poller.deregister(transfer.completion_fd());
        }
        let _ = poller.deregister(self.sock.raw());

        self.state = State::Closed;
        debug!(peer = %self.peer, "connection closed");
    }

    fn receive(
        &mut self,
        poller: &Poller,
        config: &ServerConfig,
        token: u64,
    ) -> io::Result<Verdict> {
        let mut temp = [0u8; 1024];

        let n = sys_read(self.sock.raw(), &mut temp);

        if n == 0 {
            debug!(peer = %self.peer, "peer closed before request completed");
            return Ok(Verdict::Close);
        }
        if n < 0 {
            let err = io::Error::last_os_error();
            if err.kind() == io::ErrorKind::WouldBlock {
                return Ok(Verdict::Continue);
            }
            return Err(err);
        }

        self.recv.extend_from_slice(&temp[..n as usize]);

        if let Some(header_end) = request::find_header_end(&self.recv) {
            self.state = State::HeaderReady;
            self.resolve_and_stage(poller, config, token, header_end)?;
        } else if self.recv.len() >= config.max_request_bytes {
            debug!(peer = %self.peer, bytes = self.recv.len(), "request too large");
            self.send = response::too_large_header();
            self.state = State::Sending404;
            self.switch_to_write(poller, token)?;
        }

        Ok(Verdict::Continue)
    }

    /// Resolves the request, opens the backing file, and stages the header.
    ///
    /// Runs synchronously the moment the terminator is seen; the open and
    /// size lookup may stall the loop for their duration, an accepted cost.
    fn resolve_and_stage(
        &mut self,
        poller: &Poller,
        config: &ServerConfig,
        token: u64,
        header_end: usize,
    ) -> io::Result<()> {
        self.body = self.open_resource(config, header_end);

        match &self.body {
            Body::Resolved { size, .. } => {
                self.send = response::ok_header(*size);
                self.state = State::SendingHeader;
            }
            _ => {
                self.send = response::not_found_header();
                self.state = State::Sending404;
            }
        }

        self.switch_to_write(poller, token)
    }

    fn open_resource(&self, config: &ServerConfig, header_end: usize) -> Body {
        let Some(raw_path) = request::request_path(&self.recv[..header_end]) else {
            debug!(peer = %self.peer, "malformed request line");
            return Body::Unresolved;
        };

        let Some((path, kind)) = resource::resolve(&config.document_root, raw_path) else {
            debug!(peer = %self.peer, path = raw_path, "unresolved path");
            return Body::Unresolved;
        };

        let opened = sys_open_readonly(&path).and_then(|file| {
            let size = sys_file_size(file.raw())?;
            Ok((file, size))
        });

        match opened {
            Ok((file, size)) => {
                debug!(peer = %self.peer, path = %path.display(), size, ?kind, "resolved");
                Body::Resolved { kind, file, size }
            }
            Err(err) => {
                debug!(peer = %self.peer, path = %path.display(), %err, "open failed");
                Body::Unresolved
            }
        }
    }

    /// Flushes as much of the staged header as the socket accepts.
    ///
    /// A partial write keeps the unsent remainder at the buffer start and
    /// stays in the same state; the next writable turn continues.
    fn flush_header(
        &mut self,
        poller: &Poller,
        config: &ServerConfig,
        token: u64,
    ) -> io::Result<Verdict> {
        let n = sys_write(self.sock.raw(), &self.send);

        if n < 0 {
            let err = io::Error::last_os_error();
            if err.kind() == io::ErrorKind::WouldBlock {
                return Ok(Verdict::Continue);
            }
            return Err(err);
        }

        self.send.drain(..n as usize);
        if !self.send.is_empty() {
            return Ok(Verdict::Continue);
        }

        if self.state == State::Sending404 {
            self.state = State::Sent;
            return Ok(Verdict::Continue);
        }

        self.start_body(poller, config, token)?;

        Ok(Verdict::Continue)
    }

    /// Initiates the body transfer matching the resource kind.
    fn start_body(&mut self, poller: &Poller, config: &ServerConfig, token: u64) -> io::Result<()> {
        let Body::Resolved { kind, file, size } =
            std::mem::replace(&mut self.body, Body::Unresolved)
        else {
            // SendingHeader is only ever entered with a resolved body.
            self.state = State::Sent;
            return Ok(());
        };

        if size == 0 {
            self.body = Body::Finished;
            self.state = State::Sent;
            return Ok(());
        }

        match kind {
            ResourceKind::Static => {
                self.body = Body::Static(StaticTransfer::new(file, size));
                self.state = State::SendingBody;
            }

            ResourceKind::Dynamic => {
                let transfer = DynamicTransfer::start(file, size, config.chunk_bytes)?;

                let interest = Interest {
                    read: true,
                    write: false,
                };
                poller.register(transfer.completion_fd(), completion_token(token), interest)?;

                // Completions drive this phase; quiesce socket readiness so
                // the always-writable socket does not spin the loop.
                let quiet = Interest {
                    read: false,
                    write: false,
                };
                poller.reregister(self.sock.raw(), token, quiet)?;

                self.body = Body::Dynamic(transfer);
                self.state = State::SendingBody;
            }
        }

        Ok(())
    }

    fn switch_to_write(&self, poller: &Poller, token: u64) -> io::Result<()> {
        let interest = Interest {
            read: false,
            write: true,
        };
        poller.reregister(self.sock.raw(), token, interest)
    }

    fn fail(&mut self, phase: &str, err: io::Error) -> Verdict {
        warn!(peer = %self.peer, phase, %err, "connection error");
        self.state = State::Closed;
        Verdict::Close
    }
}
