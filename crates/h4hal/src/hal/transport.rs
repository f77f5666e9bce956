//! Readiness multiplexing for the reader thread
//!
//! The reader blocks in select(2) over the controller socket and a wakeup
//! pipe. `close()` writes one byte to the pipe, which unblocks the reader
//! promptly even when no controller data ever arrives. Closing the socket
//! out from under a blocked reader is never relied upon.

use std::io;
use std::os::unix::io::RawFd;

/// Which descriptor select() reported as ready.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readable {
    /// Controller data is waiting on the socket.
    Data,
    /// The wakeup pipe was signalled; the reader must stop.
    Shutdown,
}

/// A pipe(2) pair used to interrupt the reader's blocking wait.
///
/// Both ends stay open until drop, so a wakeup written after the reader
/// has already exited lands in the pipe buffer instead of faulting.
#[derive(Debug)]
pub struct WakePipe {
    read_fd: RawFd,
    write_fd: RawFd,
}

impl WakePipe {
    pub fn new() -> io::Result<WakePipe> {
        let mut fds = [0 as libc::c_int; 2];
        let result = unsafe { libc::pipe(fds.as_mut_ptr()) };
        if result < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(WakePipe {
            read_fd: fds[0],
            write_fd: fds[1],
        })
    }

    /// The end the reader watches alongside the socket.
    pub fn read_fd(&self) -> RawFd {
        self.read_fd
    }

    /// Signal the reader to stop. Idempotent; the pipe is never drained,
    /// so repeated wakeups are harmless.
    pub fn wake(&self) {
        let buf = [1u8];
        unsafe {
            libc::write(self.write_fd, buf.as_ptr() as *const libc::c_void, 1);
        }
    }
}

impl Drop for WakePipe {
    fn drop(&mut self) {
        unsafe {
            libc::close(self.read_fd);
            libc::close(self.write_fd);
        }
    }
}

/// Block until the socket has data or the wakeup pipe is signalled.
///
/// The wakeup side wins when both are ready, so a close request is never
/// delayed behind queued controller traffic. A wait interrupted by a
/// signal is retried.
pub fn wait_readable(data_fd: RawFd, wake_fd: RawFd) -> io::Result<Readable> {
    loop {
        let mut read_fds: libc::fd_set = unsafe { std::mem::zeroed() };
        unsafe {
            libc::FD_ZERO(&mut read_fds);
            libc::FD_SET(data_fd, &mut read_fds);
            libc::FD_SET(wake_fd, &mut read_fds);
        }

        let nfds = data_fd.max(wake_fd) + 1;
        let result = unsafe {
            libc::select(
                nfds,
                &mut read_fds,
                std::ptr::null_mut(),
                std::ptr::null_mut(),
                std::ptr::null_mut(),
            )
        };

        if result < 0 {
            let err = io::Error::last_os_error();
            if err.kind() == io::ErrorKind::Interrupted {
                continue;
            }
            return Err(err);
        }

        if unsafe { libc::FD_ISSET(wake_fd, &mut read_fds) } {
            return Ok(Readable::Shutdown);
        }
        if unsafe { libc::FD_ISSET(data_fd, &mut read_fds) } {
            return Ok(Readable::Data);
        }
    }
}
