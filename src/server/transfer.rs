//! Body-transfer mechanisms.
//!
//! [`StaticTransfer`] copies file bytes to the socket with bounded
//! `sendfile(2)` chunks, one per writable turn, so a large file never
//! monopolizes the loop.
//!
//! [`DynamicTransfer`] is the asynchronous I/O bridge: it overlaps one
//! outstanding kernel-AIO disk read with one outstanding socket write,
//! surfacing completions through an eventfd that the event loop polls like
//! any other descriptor. At most one operation is in flight at a time;
//! throughput is bounded by that strict alternation by design.

use crate::sys::aio::AioRing;
use crate::sys::{Fd, sys_eventfd, sys_eventfd_drain, sys_sendfile};

use libc::off_t;
use std::io;
use std::os::fd::RawFd;

/// Kernel-assisted file-to-socket transfer for static resources.
pub(crate) struct StaticTransfer {
    /// Open backing file, closed when the transfer is dropped.
    file: Fd,

    /// Total file length recorded at resolution time.
    size: u64,

    /// File offset, advanced by the kernel on each `sendfile` call.
    offset: off_t,
}

impl StaticTransfer {
    pub(crate) fn new(file: Fd, size: u64) -> Self {
        Self {
            file,
            size,
            offset: 0,
        }
    }

    /// Copies one bounded chunk to the socket.
    ///
    /// Returns `true` once the whole file has been handed to the socket.
    /// `WouldBlock` leaves the transfer untouched; the next writable turn
    /// retries from the same offset.
    pub(crate) fn send_chunk(&mut self, sock: RawFd, chunk: usize) -> io::Result<bool> {
        let n = sys_sendfile(sock, self.file.raw(), &mut self.offset, chunk);

        if n < 0 {
            let err = io::Error::last_os_error();
            if err.kind() == io::ErrorKind::WouldBlock {
                return Ok(false);
            }
            return Err(err);
        }

        if n == 0 && (self.offset as u64) < self.size {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "file shrank during transfer",
            ));
        }

        Ok(self.offset as u64 >= self.size)
    }
}

/// Which AIO operation is currently outstanding.
enum Pending {
    /// A disk read into the chunk buffer.
    Read,

    /// A socket write out of the chunk buffer.
    Write,

    /// Nothing in flight: the socket refused the chunk and the remainder
    /// is parked until the peer drains its receive buffer.
    Stalled,
}

/// Outcome of draining one AIO completion.
pub(crate) enum CompletionStep {
    /// The next operation was submitted; more completions will follow.
    InFlight,

    /// The socket's send buffer is full. The caller must re-enable write
    /// interest and call [`DynamicTransfer::resume_write`] on the next
    /// writable turn.
    SocketFull,

    /// The whole file has been delivered.
    Done,
}

/// AIO-backed file-to-socket transfer for dynamic resources.
///
/// Owns the full completion plumbing for one connection: the submission
/// ring, the notification eventfd, and the chunk buffer. Dropping the
/// transfer releases all three exactly once.
pub(crate) struct DynamicTransfer {
    /// Open backing file, closed when the transfer is dropped.
    file: Fd,

    /// Total file length recorded at resolution time.
    size: u64,

    /// AIO submission context.
    ring: AioRing,

    /// Completion-notification eventfd registered with the poller.
    event: Fd,

    /// Chunk buffer shared by reads and writes.
    ///
    /// Never reallocated while an operation is in flight; the kernel holds
    /// a raw pointer into it.
    buf: Vec<u8>,

    /// Valid bytes in the chunk buffer after the last read.
    chunk_len: usize,

    /// Bytes of the current chunk already written to the socket.
    chunk_sent: usize,

    /// Bytes read from disk so far.
    read_off: u64,

    /// Bytes delivered to the socket so far.
    sent_off: u64,

    pending: Pending,
}

impl DynamicTransfer {
    /// Sets up the bridge and submits the first disk read.
    ///
    /// The caller must register [`completion_fd`](Self::completion_fd) with
    /// the poller for read interest before returning to the event loop.
    pub(crate) fn start(file: Fd, size: u64, chunk: usize) -> io::Result<Self> {
        let event = sys_eventfd()?;
        let mut ring = AioRing::new()?;
        let mut buf = vec![0u8; chunk];

        ring.submit_read(file.raw(), &mut buf, 0, event.raw())?;

        Ok(Self {
            file,
            size,
            ring,
            event,
            buf,
            chunk_len: 0,
            chunk_sent: 0,
            read_off: 0,
            sent_off: 0,
            pending: Pending::Read,
        })
    }

    /// The eventfd the poller watches for completions.
    pub(crate) fn completion_fd(&self) -> RawFd {
        self.event.raw()
    }

    /// Whether the transfer is parked waiting for the socket to drain.
    pub(crate) fn stalled(&self) -> bool {
        matches!(self.pending, Pending::Stalled)
    }

    /// Resubmits the parked chunk remainder once the socket is writable.
    ///
    /// Only valid while [`stalled`](Self::stalled) is `true`; completions
    /// drive the transfer again afterwards.
    pub(crate) fn resume_write(&mut self, sock: RawFd) -> io::Result<()> {
        self.ring.submit_write(
            sock,
            &self.buf[self.chunk_sent..self.chunk_len],
            self.event.raw(),
        )?;
        self.pending = Pending::Write;

        Ok(())
    }

    /// Drains one completion and submits the next operation.
    ///
    /// Called when the completion eventfd turns readable. A write refused by
    /// a full socket send buffer is not a failure: the chunk remainder is
    /// parked and the caller waits for the socket's next writable turn.
    pub(crate) fn on_completion(&mut self, sock: RawFd) -> io::Result<CompletionStep> {
        if self.stalled() {
            // Nothing is in flight while parked; ignore spurious wakeups.
            return Ok(CompletionStep::SocketFull);
        }

        sys_eventfd_drain(self.event.raw());

        let res = self.ring.next_completion()?;

        match self.pending {
            Pending::Read => {
                if res < 0 {
                    return Err(io::Error::from_raw_os_error(-res as i32));
                }
                let n = res as usize;
                if n == 0 {
                    return Err(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        "file shrank during transfer",
                    ));
                }

                self.chunk_len = n;
                self.chunk_sent = 0;
                self.read_off += n as u64;

                self.ring
                    .submit_write(sock, &self.buf[..self.chunk_len], self.event.raw())?;
                self.pending = Pending::Write;

                Ok(CompletionStep::InFlight)
            }

            Pending::Write => {
                // A write to the non-blocking socket runs synchronously at
                // submit time, so a full send buffer surfaces here as an
                // EAGAIN completion (or a zero-byte one). The peer is slow,
                // not gone; park the chunk until the socket drains.
                if res < 0 {
                    let err = io::Error::from_raw_os_error(-res as i32);
                    if err.kind() == io::ErrorKind::WouldBlock {
                        self.pending = Pending::Stalled;
                        return Ok(CompletionStep::SocketFull);
                    }
                    return Err(err);
                }
                let n = res as usize;
                if n == 0 {
                    self.pending = Pending::Stalled;
                    return Ok(CompletionStep::SocketFull);
                }

                self.chunk_sent += n;
                self.sent_off += n as u64;

                if self.chunk_sent < self.chunk_len {
                    // Short socket write: finish this chunk before reading more.
                    self.ring.submit_write(
                        sock,
                        &self.buf[self.chunk_sent..self.chunk_len],
                        self.event.raw(),
                    )?;
                    Ok(CompletionStep::InFlight)
                } else if self.sent_off >= self.size {
                    Ok(CompletionStep::Done)
                } else {
                    self.ring.submit_read(
                        self.file.raw(),
                        &mut self.buf,
                        self.read_off as i64,
                        self.event.raw(),
                    )?;
                    self.pending = Pending::Read;

                    Ok(CompletionStep::InFlight)
                }
            }

            // Guarded above; kept for exhaustiveness.
            Pending::Stalled => Ok(CompletionStep::SocketFull),
        }
    }
}
