//! Level-triggered `epoll` readiness multiplexer.
//!
//! The poller is the only blocking point in the server: [`Poller::wait`]
//! parks until some registered descriptor is ready and reports exactly one
//! readiness event per turn. Level-triggered semantics mean a descriptor
//! that stays ready is reported again on the next turn, so a handler may
//! consume less than everything without losing the wakeup.
//!
//! Tokens are opaque `u64` values chosen by the caller; the server uses
//! slab indices plus reserved sentinel bits.

use libc::{
    EPOLL_CLOEXEC, EPOLL_CTL_ADD, EPOLL_CTL_DEL, EPOLL_CTL_MOD, EPOLLERR, EPOLLHUP, EPOLLIN,
    EPOLLOUT, epoll_create1, epoll_ctl, epoll_event, epoll_wait,
};
use std::io;
use std::os::unix::io::RawFd;

/// Readiness interests for a registered descriptor.
#[derive(Clone, Copy)]
pub(crate) struct Interest {
    pub(crate) read: bool,
    pub(crate) write: bool,
}

/// An I/O event reported by the poller.
///
/// The event indicates whether the registered file descriptor is readable,
/// writable, or both. Error and hangup conditions are folded into
/// `readable` so the owning handler observes them on its next read.
pub(crate) struct Event {
    /// Token the descriptor was registered under.
    pub(crate) token: u64,

    /// Indicates that the file descriptor is readable.
    pub(crate) readable: bool,

    /// Indicates that the file descriptor is writable.
    pub(crate) writable: bool,
}

/// Linux `epoll` poller.
pub(crate) struct Poller {
    /// Epoll file descriptor.
    epoll: RawFd,
}

impl Poller {
    /// Creates a new `Poller`.
    pub(crate) fn new() -> io::Result<Self> {
        let epoll = unsafe { epoll_create1(EPOLL_CLOEXEC) };
        if epoll < 0 {
            return Err(io::Error::last_os_error());
        }

        Ok(Self { epoll })
    }

    /// Registers a file descriptor with the poller.
    pub(crate) fn register(&self, fd: RawFd, token: u64, interest: Interest) -> io::Result<()> {
        self.ctl(EPOLL_CTL_ADD, fd, token, interest)
    }

    /// Updates interest flags for an already registered descriptor.
    pub(crate) fn reregister(&self, fd: RawFd, token: u64, interest: Interest) -> io::Result<()> {
        self.ctl(EPOLL_CTL_MOD, fd, token, interest)
    }

    /// Removes a file descriptor from the poller.
    ///
    /// Must run before the descriptor's owner is destroyed, otherwise a
    /// queued readiness report would dispatch against a dead token.
    pub(crate) fn deregister(&self, fd: RawFd) -> io::Result<()> {
        let rc = unsafe { epoll_ctl(self.epoll, EPOLL_CTL_DEL, fd, std::ptr::null_mut()) };
        if rc < 0 {
            Err(io::Error::last_os_error())
        } else {
            Ok(())
        }
    }

    /// Blocks until a registered descriptor is ready and returns one event.
    ///
    /// Interrupted waits are retried transparently.
    pub(crate) fn wait(&self) -> io::Result<Event> {
        loop {
            let mut ev = epoll_event { events: 0, u64: 0 };

            let n = unsafe { epoll_wait(self.epoll, &mut ev, 1, -1) };

            if n < 0 {
                let err = io::Error::last_os_error();
                if err.kind() == io::ErrorKind::Interrupted {
                    continue;
                }
                return Err(err);
            }

            if n == 0 {
                continue;
            }

            let readable = ev.events & ((EPOLLIN | EPOLLERR | EPOLLHUP) as u32) != 0;
            let writable = ev.events & (EPOLLOUT as u32) != 0;

            return Ok(Event {
                token: ev.u64,
                readable,
                writable,
            });
        }
    }

    fn ctl(&self, op: i32, fd: RawFd, token: u64, interest: Interest) -> io::Result<()> {
        let mut flags = 0;

        if interest.read {
            flags |= EPOLLIN;
        }
        if interest.write {
            flags |= EPOLLOUT;
        }

        let mut event = epoll_event {
            events: flags as u32,
            u64: token,
        };

        let rc = unsafe { epoll_ctl(self.epoll, op, fd, &mut event) };
        if rc < 0 {
            Err(io::Error::last_os_error())
        } else {
            Ok(())
        }
    }
}

impl Drop for Poller {
    /// Closes the epoll descriptor.
    fn drop(&mut self) {
        unsafe { libc::close(self.epoll) };
    }
}
