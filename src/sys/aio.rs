//! Raw Linux kernel AIO bindings.
//!
//! libc exposes the `SYS_io_*` syscall numbers but not the control-block
//! layout, so the `linux/aio_abi.h` structures are declared here and driven
//! through `libc::syscall`.
//!
//! [`AioRing`] wraps one submission context with a single reusable control
//! block; the server never has more than one operation in flight per ring.

use libc::{SYS_io_destroy, SYS_io_getevents, SYS_io_setup, SYS_io_submit, c_long, c_ulong};
use std::io;
use std::os::fd::RawFd;
use std::ptr;

type AioContext = c_ulong;

const IOCB_CMD_PREAD: u16 = 0;
const IOCB_CMD_PWRITE: u16 = 1;

/// Completion of this control block signals the eventfd in `aio_resfd`.
const IOCB_FLAG_RESFD: u32 = 1;

/// `struct iocb` from `linux/aio_abi.h`.
///
/// Field order of `aio_key`/`aio_rw_flags` is the little-endian layout.
#[repr(C)]
#[derive(Clone, Copy)]
#[allow(dead_code)]
struct Iocb {
    aio_data: u64,
    aio_key: u32,
    aio_rw_flags: u32,
    aio_lio_opcode: u16,
    aio_reqprio: i16,
    aio_fildes: u32,
    aio_buf: u64,
    aio_nbytes: u64,
    aio_offset: i64,
    aio_reserved2: u64,
    aio_flags: u32,
    aio_resfd: u32,
}

/// `struct io_event` from `linux/aio_abi.h`.
#[repr(C)]
#[derive(Clone, Copy)]
#[allow(dead_code)]
struct IoEvent {
    data: u64,
    obj: u64,
    res: i64,
    res2: i64,
}

/// One kernel AIO submission context with a single in-flight slot.
///
/// The control block is boxed so its address stays stable while an
/// operation is outstanding, even if the owning connection moves.
pub(crate) struct AioRing {
    ctx: AioContext,
    iocb: Box<Iocb>,
}

impl AioRing {
    /// Creates the submission context via `io_setup(2)`.
    pub(crate) fn new() -> io::Result<Self> {
        let mut ctx: AioContext = 0;

        let rc = unsafe { libc::syscall(SYS_io_setup, 1 as c_long, &mut ctx as *mut AioContext) };
        if rc < 0 {
            return Err(io::Error::last_os_error());
        }

        Ok(Self {
            ctx,
            iocb: Box::new(unsafe { std::mem::zeroed() }),
        })
    }

    /// Submits one read of `buf.len()` bytes from `file` at `offset`.
    ///
    /// `buf` must stay alive and in place until the completion is drained.
    pub(crate) fn submit_read(
        &mut self,
        file: RawFd,
        buf: &mut [u8],
        offset: i64,
        resfd: RawFd,
    ) -> io::Result<()> {
        self.submit(
            IOCB_CMD_PREAD,
            file,
            buf.as_mut_ptr() as u64,
            buf.len(),
            offset,
            resfd,
        )
    }

    /// Submits one write of `buf` to `sock`.
    ///
    /// `buf` must stay alive and in place until the completion is drained.
    pub(crate) fn submit_write(&mut self, sock: RawFd, buf: &[u8], resfd: RawFd) -> io::Result<()> {
        self.submit(
            IOCB_CMD_PWRITE,
            sock,
            buf.as_ptr() as u64,
            buf.len(),
            0,
            resfd,
        )
    }

    fn submit(
        &mut self,
        opcode: u16,
        fd: RawFd,
        buf: u64,
        len: usize,
        offset: i64,
        resfd: RawFd,
    ) -> io::Result<()> {
        *self.iocb = unsafe { std::mem::zeroed() };
        self.iocb.aio_lio_opcode = opcode;
        self.iocb.aio_fildes = fd as u32;
        self.iocb.aio_buf = buf;
        self.iocb.aio_nbytes = len as u64;
        self.iocb.aio_offset = offset;
        self.iocb.aio_flags = IOCB_FLAG_RESFD;
        self.iocb.aio_resfd = resfd as u32;

        let mut iocbp: *mut Iocb = &mut *self.iocb;

        let rc = unsafe {
            libc::syscall(
                SYS_io_submit,
                self.ctx,
                1 as c_long,
                &mut iocbp as *mut *mut Iocb,
            )
        };

        if rc < 0 {
            Err(io::Error::last_os_error())
        } else if rc != 1 {
            Err(io::Error::new(
                io::ErrorKind::Other,
                "io_submit accepted no control block",
            ))
        } else {
            Ok(())
        }
    }

    /// Drains exactly one completion and returns its result code.
    ///
    /// A negative result carries the negated errno of the failed operation.
    pub(crate) fn next_completion(&mut self) -> io::Result<i64> {
        let mut event: IoEvent = unsafe { std::mem::zeroed() };

        let rc = unsafe {
            libc::syscall(
                SYS_io_getevents,
                self.ctx,
                1 as c_long,
                1 as c_long,
                &mut event as *mut IoEvent,
                ptr::null_mut::<libc::timespec>(),
            )
        };

        if rc < 0 {
            Err(io::Error::last_os_error())
        } else if rc == 0 {
            Err(io::Error::new(
                io::ErrorKind::WouldBlock,
                "no completion available",
            ))
        } else {
            Ok(event.res)
        }
    }
}

impl Drop for AioRing {
    /// Destroys the submission context.
    fn drop(&mut self) {
        unsafe { libc::syscall(SYS_io_destroy, self.ctx) };
    }
}
