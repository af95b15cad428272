use std::os::fd::{AsFd, AsRawFd, BorrowedFd, FromRawFd, OwnedFd, RawFd};

use nix::errno::Errno;
use nix::fcntl::{fcntl, FcntlArg};

use crate::error::ExecError;
use crate::trace;

/// Lowest descriptor an endpoint may occupy. Anything below would alias a
/// standard stream slot and be clobbered by the child's own dup2.
const FIRST_SAFE_FD: RawFd = 3;

/// All pipe endpoints of one pipeline run.
///
/// Pipe `k` connects stage `k` to stage `k + 1`. Its read end sits at
/// position `2k` and its write end at `2k + 1`. Every endpoint is
/// close-on-exec and is closed when the set is dropped, whichever way the
/// run ends.
#[derive(Debug)]
pub struct PipeEndpointSet {
    fds: Vec<OwnedFd>,
}

impl PipeEndpointSet {
    /// Create the `stages - 1` pipes a pipeline of `stages` commands needs.
    ///
    /// Either every pipe exists on return or none does: on failure the
    /// endpoints created so far are released before the error comes back.
    pub fn build(stages: usize) -> Result<Self, ExecError> {
        Self::build_with(stages, make_pipe)
    }

    /// Like `build`, with each pipe coming from `make`.
    pub fn build_with<F>(stages: usize, mut make: F) -> Result<Self, ExecError>
    where
        F: FnMut() -> Result<(OwnedFd, OwnedFd), Errno>,
    {
        let count = stages.saturating_sub(1);
        let mut fds = Vec::with_capacity(2 * count);
        for index in 0..count {
            let (read, write) = make().map_err(|source| ExecError::Pipe { index, source })?;
            trace!(
                pipe,
                "pipe {index}: read fd {} write fd {}",
                read.as_raw_fd(),
                write.as_raw_fd()
            );
            fds.push(read);
            fds.push(write);
        }
        Ok(Self { fds })
    }

    pub fn pipe_count(&self) -> usize {
        self.fds.len() / 2
    }

    /// Number of open endpoints, always twice the pipe count.
    pub fn len(&self) -> usize {
        self.fds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fds.is_empty()
    }

    /// Panics if `pipe` is out of range.
    pub fn read_end_of(&self, pipe: usize) -> BorrowedFd<'_> {
        self.fds[2 * pipe].as_fd()
    }

    /// Panics if `pipe` is out of range.
    pub fn write_end_of(&self, pipe: usize) -> BorrowedFd<'_> {
        self.fds[2 * pipe + 1].as_fd()
    }

    /// Every endpoint in position order: the list a child sweeps closed
    /// before exec.
    pub fn raw_fds(&self) -> Vec<RawFd> {
        self.fds.iter().map(AsRawFd::as_raw_fd).collect()
    }

    /// Close every endpoint in this process.
    pub fn close_all(self) {
        trace!(pipe, "closing {} endpoints", self.fds.len());
        drop(self);
    }
}

/// One close-on-exec pipe with both ends at or above fd 3.
pub fn make_pipe() -> Result<(OwnedFd, OwnedFd), Errno> {
    let (read, write) = open_cloexec_pipe()?;
    Ok((lift_fd(read)?, lift_fd(write)?))
}

#[cfg(any(
    target_os = "linux",
    target_os = "android",
    target_os = "freebsd",
    target_os = "netbsd",
    target_os = "openbsd",
    target_os = "dragonfly"
))]
fn open_cloexec_pipe() -> Result<(OwnedFd, OwnedFd), Errno> {
    nix::unistd::pipe2(nix::fcntl::OFlag::O_CLOEXEC)
}

#[cfg(not(any(
    target_os = "linux",
    target_os = "android",
    target_os = "freebsd",
    target_os = "netbsd",
    target_os = "openbsd",
    target_os = "dragonfly"
)))]
fn open_cloexec_pipe() -> Result<(OwnedFd, OwnedFd), Errno> {
    use nix::fcntl::FdFlag;

    let (read, write) = nix::unistd::pipe()?;
    fcntl(&read, FcntlArg::F_SETFD(FdFlag::FD_CLOEXEC))?;
    fcntl(&write, FcntlArg::F_SETFD(FdFlag::FD_CLOEXEC))?;
    Ok((read, write))
}

/// Move `fd` out of the standard stream range if it landed there, which
/// happens when the shell itself was started with a closed std stream.
fn lift_fd(fd: OwnedFd) -> Result<OwnedFd, Errno> {
    if fd.as_raw_fd() >= FIRST_SAFE_FD {
        return Ok(fd);
    }
    let newfd = fcntl(&fd, FcntlArg::F_DUPFD_CLOEXEC(FIRST_SAFE_FD))?;
    Ok(unsafe { OwnedFd::from_raw_fd(newfd) })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use serial_test::serial;
    use std::fs::File;
    use std::io::{Read, Write};

    /// Descriptors currently open in this process.
    pub(crate) fn open_fd_count() -> usize {
        std::fs::read_dir("/dev/fd").unwrap().count()
    }

    fn is_open(fd: RawFd) -> bool {
        fcntl(unsafe { BorrowedFd::borrow_raw(fd) }, FcntlArg::F_GETFD).is_ok()
    }

    #[test]
    #[serial]
    fn single_stage_needs_no_pipes() {
        let set = PipeEndpointSet::build(1).unwrap();
        assert_eq!(set.pipe_count(), 0);
        assert!(set.is_empty());
        assert!(set.raw_fds().is_empty());
    }

    #[test]
    #[serial]
    fn builds_one_pipe_per_gap() {
        let set = PipeEndpointSet::build(4).unwrap();
        assert_eq!(set.pipe_count(), 3);
        assert_eq!(set.len(), 6);

        let fds = set.raw_fds();
        for k in 0..3 {
            assert_eq!(fds[2 * k], set.read_end_of(k).as_raw_fd());
            assert_eq!(fds[2 * k + 1], set.write_end_of(k).as_raw_fd());
        }
        let mut sorted = fds.clone();
        sorted.sort_unstable();
        sorted.dedup();
        assert_eq!(sorted.len(), 6);
        assert!(fds.iter().all(|&fd| fd >= FIRST_SAFE_FD));
    }

    #[test]
    #[serial]
    fn endpoints_are_close_on_exec() {
        use nix::fcntl::FdFlag;

        let set = PipeEndpointSet::build(2).unwrap();
        for fd in set.raw_fds() {
            let flags = fcntl(unsafe { BorrowedFd::borrow_raw(fd) }, FcntlArg::F_GETFD).unwrap();
            assert!(FdFlag::from_bits_truncate(flags).contains(FdFlag::FD_CLOEXEC));
        }
    }

    #[test]
    #[serial]
    fn write_end_feeds_read_end() {
        let set = PipeEndpointSet::build(2).unwrap();
        let mut writer = File::from(set.write_end_of(0).try_clone_to_owned().unwrap());
        let mut reader = File::from(set.read_end_of(0).try_clone_to_owned().unwrap());
        writer.write_all(b"x\ny\n").unwrap();
        drop(writer);
        set.close_all();

        let mut got = String::new();
        reader.read_to_string(&mut got).unwrap();
        assert_eq!(got, "x\ny\n");
    }

    #[test]
    #[serial]
    fn close_all_releases_every_endpoint() {
        let baseline = open_fd_count();
        let set = PipeEndpointSet::build(5).unwrap();
        let fds = set.raw_fds();
        assert_eq!(open_fd_count(), baseline + 8);
        assert!(fds.iter().all(|&fd| is_open(fd)));

        set.close_all();
        assert_eq!(open_fd_count(), baseline);
        assert!(fds.iter().all(|&fd| !is_open(fd)));
    }

    #[test]
    #[serial]
    fn failed_build_releases_earlier_pipes() {
        let baseline = open_fd_count();
        let mut made = 0;
        let result = PipeEndpointSet::build_with(5, || {
            if made == 2 {
                return Err(Errno::EMFILE);
            }
            made += 1;
            make_pipe()
        });
        match result {
            Err(ExecError::Pipe { index, source }) => {
                assert_eq!(index, 2);
                assert_eq!(source, Errno::EMFILE);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(open_fd_count(), baseline);
    }

    #[test]
    #[serial]
    fn drop_releases_endpoints_too() {
        let baseline = open_fd_count();
        {
            let _set = PipeEndpointSet::build(3).unwrap();
        }
        assert_eq!(open_fd_count(), baseline);
    }
}
