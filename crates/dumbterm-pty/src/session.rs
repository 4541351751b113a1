//! Shell session on a PTY
//!
//! A [`PtySession`] owns the device pair and the forked shell. Reads never
//! block, writes block until every byte has been accepted, and dropping the
//! session hangs up and reaps the shell before the descriptors are closed.

use crate::{
    child::{exec_child, ChildSpec},
    pty::PtyPair,
    PtyError,
};
use nix::errno::Errno;
use nix::poll::{poll, PollFd, PollFlags, PollTimeout};
use nix::sys::signal::{kill, killpg, Signal};
use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
use nix::unistd::{fork, ForkResult, Pid};
use std::ffi::OsString;
use std::fs::File;
use std::io::{self, Read, Write};
use std::os::unix::io::{AsFd, OwnedFd};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Upper bound on the bytes returned by a single [`PtySession::read`]
pub const READ_CHUNK: usize = 1024;

const DEFAULT_SHELL: &str = "/bin/sh";
const DEFAULT_TERM: &str = "dumb";
const DEFAULT_TEARDOWN_GRACE: Duration = Duration::from_millis(500);
const REAP_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Result of a non-blocking read
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadOutcome {
    /// Nothing to read right now; the shell is still running
    NoData,

    /// Bytes produced by the shell, at most [`READ_CHUNK`] of them
    Data(Vec<u8>),

    /// The shell has exited and its output has been drained
    EndOfStream,
}

/// How the shell terminated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitStatus {
    Exited(i32),
    Signaled(Signal),
}

impl ExitStatus {
    /// Shell-style exit code (128 + signal number for signals)
    pub fn code(&self) -> i32 {
        match self {
            ExitStatus::Exited(code) => *code,
            ExitStatus::Signaled(signal) => 128 + *signal as i32,
        }
    }

    fn from_wait(status: WaitStatus) -> Option<Self> {
        match status {
            WaitStatus::Exited(_, code) => Some(ExitStatus::Exited(code)),
            WaitStatus::Signaled(_, signal, _) => Some(ExitStatus::Signaled(signal)),
            _ => None,
        }
    }
}

/// A shell process attached to a PTY
pub struct PtySession {
    /// Controller side, used for all I/O
    controller: File,

    /// Peripheral side. Never read or written here; holding it keeps the
    /// device allocated for the lifetime of the session.
    _peripheral: OwnedFd,

    peripheral_path: PathBuf,

    child: Pid,

    /// Set once the child has been reaped
    status: Option<ExitStatus>,

    teardown_grace: Duration,
}

impl PtySession {
    /// Spawn `/bin/sh` on a new PTY with a `TERM=dumb` environment
    pub fn spawn() -> Result<Self, PtyError> {
        SessionBuilder::new().spawn()
    }

    fn fork_onto(
        pair: PtyPair,
        spec: &ChildSpec,
        teardown_grace: Duration,
    ) -> Result<Self, PtyError> {
        // SAFETY: the child branch only runs exec_child, which sticks to
        // async-signal-safe calls and never returns.
        match unsafe { fork() }.map_err(PtyError::Fork)? {
            ForkResult::Child => exec_child(spec, pair.controller_fd(), pair.peripheral_fd()),
            ForkResult::Parent { child } => {
                let (controller, peripheral, peripheral_path) = pair.into_parts();
                info!(
                    "Spawned shell pid {} on {}",
                    child,
                    peripheral_path.display()
                );
                Ok(Self {
                    controller,
                    _peripheral: peripheral,
                    peripheral_path,
                    child,
                    status: None,
                    teardown_grace,
                })
            }
        }
    }

    /// Get the shell's process ID
    pub fn pid(&self) -> Pid {
        self.child
    }

    /// Device path of the shell's terminal
    pub fn peripheral_path(&self) -> &Path {
        &self.peripheral_path
    }

    /// Read whatever the shell has produced, without blocking.
    ///
    /// Returns [`ReadOutcome::NoData`] when the shell is idle and
    /// [`ReadOutcome::EndOfStream`] once it has exited and nothing is left
    /// to read.
    pub fn read(&mut self) -> Result<ReadOutcome, PtyError> {
        let mut revents = self.poll_readable()?;
        if revents.is_empty() {
            if self.try_wait()?.is_none() {
                return Ok(ReadOutcome::NoData);
            }
            // Output written just before exit may have landed after the poll.
            revents = self.poll_readable()?;
            if revents.is_empty() {
                debug!("PTY drained after shell exit");
                return Ok(ReadOutcome::EndOfStream);
            }
        }

        if revents.contains(PollFlags::POLLNVAL) {
            return Err(PtyError::Poll(io::Error::from_raw_os_error(libc::EBADF)));
        }
        if !revents.intersects(PollFlags::POLLIN | PollFlags::POLLPRI) {
            debug!("PTY hung up");
            return Ok(ReadOutcome::EndOfStream);
        }

        let mut buffer = [0u8; READ_CHUNK];
        match self.controller.read(&mut buffer) {
            Ok(0) => {
                debug!("PTY closed");
                Ok(ReadOutcome::EndOfStream)
            }
            Ok(n) => {
                debug!("Read {} bytes from PTY", n);
                Ok(ReadOutcome::Data(buffer[..n].to_vec()))
            }
            Err(e)
                if matches!(
                    e.kind(),
                    io::ErrorKind::Interrupted | io::ErrorKind::WouldBlock
                ) =>
            {
                Ok(ReadOutcome::NoData)
            }
            // Linux reports a hung-up peripheral as EIO rather than EOF.
            Err(e) if e.raw_os_error() == Some(libc::EIO) => {
                debug!("PTY closed (EIO)");
                Ok(ReadOutcome::EndOfStream)
            }
            Err(e) => Err(PtyError::Read(e)),
        }
    }

    /// Zero-timeout poll of the controller; returns the reported events
    fn poll_readable(&self) -> Result<PollFlags, PtyError> {
        let mut fds = [PollFd::new(
            self.controller.as_fd(),
            PollFlags::POLLIN | PollFlags::POLLPRI,
        )];
        match poll(&mut fds, PollTimeout::ZERO) {
            Ok(0) | Err(Errno::EINTR) => Ok(PollFlags::empty()),
            Ok(_) => Ok(fds[0].revents().unwrap_or_else(PollFlags::empty)),
            Err(e) => Err(PtyError::Poll(io::Error::from(e))),
        }
    }

    /// Write all of `data` to the shell, blocking until the kernel has
    /// accepted every byte.
    pub fn write(&mut self, data: &[u8]) -> Result<(), PtyError> {
        let mut written = 0;
        while written < data.len() {
            match self.controller.write(&data[written..]) {
                Ok(0) => {
                    return Err(PtyError::Write(io::Error::from(io::ErrorKind::WriteZero)));
                }
                Ok(n) => written += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(PtyError::Write(e)),
            }
        }
        if written > 0 {
            debug!("Wrote {} bytes to PTY", written);
        }
        Ok(())
    }

    /// Check whether the shell has exited, reaping it if so
    pub fn try_wait(&mut self) -> Result<Option<ExitStatus>, PtyError> {
        if self.status.is_some() {
            return Ok(self.status);
        }
        match waitpid(self.child, Some(WaitPidFlag::WNOHANG)) {
            Ok(status) => {
                self.status = ExitStatus::from_wait(status);
                if let Some(status) = self.status {
                    info!("Shell pid {} exited: {:?}", self.child, status);
                }
                Ok(self.status)
            }
            Err(Errno::EINTR) => Ok(None),
            Err(e) => Err(PtyError::Wait(e)),
        }
    }

    /// Hang up the shell, wait for it and release the PTY
    pub fn shutdown(mut self) -> Result<ExitStatus, PtyError> {
        self.terminate()
    }

    /// SIGHUP the shell's process group, give it the grace period to exit,
    /// then SIGKILL and wait.
    fn terminate(&mut self) -> Result<ExitStatus, PtyError> {
        if let Some(status) = self.try_wait()? {
            return Ok(status);
        }

        self.signal(Signal::SIGHUP)?;
        let deadline = Instant::now() + self.teardown_grace;
        while Instant::now() < deadline {
            if let Some(status) = self.try_wait()? {
                return Ok(status);
            }
            std::thread::sleep(REAP_POLL_INTERVAL);
        }

        warn!(
            "Shell pid {} still running after {:?}, sending SIGKILL",
            self.child, self.teardown_grace
        );
        self.signal(Signal::SIGKILL)?;
        loop {
            match waitpid(self.child, None) {
                Ok(status) => {
                    if let Some(status) = ExitStatus::from_wait(status) {
                        info!("Shell pid {} killed: {:?}", self.child, status);
                        self.status = Some(status);
                        return Ok(status);
                    }
                }
                Err(Errno::EINTR) => continue,
                Err(e) => return Err(PtyError::Wait(e)),
            }
        }
    }

    /// Signal the shell's process group, or the shell alone if it has not
    /// become a session leader yet.
    fn signal(&self, signal: Signal) -> Result<(), PtyError> {
        match killpg(self.child, signal) {
            Ok(()) => Ok(()),
            Err(Errno::ESRCH) => match kill(self.child, signal) {
                Ok(()) | Err(Errno::ESRCH) => Ok(()),
                Err(e) => Err(PtyError::Signal(e)),
            },
            Err(e) => Err(PtyError::Signal(e)),
        }
    }
}

impl Drop for PtySession {
    fn drop(&mut self) {
        if let Err(e) = self.terminate() {
            warn!("Failed to reap shell pid {}: {}", self.child, e);
        }
    }
}

/// Builder for shell sessions
#[derive(Debug, Clone)]
pub struct SessionBuilder {
    shell: OsString,
    args: Vec<OsString>,
    term: String,
    inherit_env: bool,
    env_vars: Vec<(OsString, OsString)>,
    unset_vars: Vec<OsString>,
    teardown_grace: Duration,
}

impl SessionBuilder {
    /// Create a new session builder for `/bin/sh` with `TERM=dumb`
    pub fn new() -> Self {
        Self {
            shell: DEFAULT_SHELL.into(),
            args: Vec::new(),
            term: DEFAULT_TERM.to_string(),
            inherit_env: true,
            env_vars: Vec::new(),
            unset_vars: Vec::new(),
            teardown_grace: DEFAULT_TEARDOWN_GRACE,
        }
    }

    /// Set the program to run instead of `/bin/sh`
    pub fn shell(mut self, shell: impl Into<OsString>) -> Self {
        self.shell = shell.into();
        self
    }

    /// Append an argument
    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append several arguments
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Terminal type advertised through `TERM`
    pub fn term(mut self, term: impl Into<String>) -> Self {
        self.term = term.into();
        self
    }

    /// Whether the shell starts from this process's environment
    pub fn inherit_env(mut self, inherit: bool) -> Self {
        self.inherit_env = inherit;
        self
    }

    /// Add an environment variable
    pub fn env(mut self, key: impl Into<OsString>, value: impl Into<OsString>) -> Self {
        self.env_vars.push((key.into(), value.into()));
        self
    }

    /// Remove an inherited environment variable
    pub fn unset_env(mut self, key: impl Into<OsString>) -> Self {
        self.unset_vars.push(key.into());
        self
    }

    /// How long teardown waits after SIGHUP before sending SIGKILL
    pub fn teardown_grace(mut self, grace: Duration) -> Self {
        self.teardown_grace = grace;
        self
    }

    /// The environment the shell will see.
    ///
    /// Inherited variables come first, minus unset keys and `TERM`; then
    /// `TERM`, then explicit variables (later ones replace earlier ones).
    pub fn environment(&self) -> Vec<(OsString, OsString)> {
        let mut env: Vec<(OsString, OsString)> = if self.inherit_env {
            std::env::vars_os().collect()
        } else {
            Vec::new()
        };
        env.retain(|(key, _)| key != "TERM" && !self.unset_vars.contains(key));
        env.push(("TERM".into(), self.term.clone().into()));

        for (key, value) in &self.env_vars {
            match env.iter_mut().find(|(k, _)| k == key) {
                Some(entry) => entry.1 = value.clone(),
                None => env.push((key.clone(), value.clone())),
            }
        }
        env
    }

    /// Allocate a PTY and fork the shell onto it
    pub fn spawn(self) -> Result<PtySession, PtyError> {
        let spec = ChildSpec::new(&self.shell, &self.args, &self.environment())?;
        let pair = PtyPair::open()?;
        PtySession::fork_onto(pair, &spec, self.teardown_grace)
    }
}

impl Default for SessionBuilder {
    fn default() -> Self {
        Self::new()
    }
}
