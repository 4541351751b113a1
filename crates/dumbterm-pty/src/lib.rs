//! PTY (Pseudo-Terminal) handling for dumbterm
//!
//! Allocates a controller/peripheral device pair, forks a shell onto the
//! peripheral side and exposes non-blocking reads and complete writes on the
//! controller side.

mod child;
pub mod pty;
pub mod session;

pub use pty::PtyPair;
pub use session::{ExitStatus, PtySession, ReadOutcome, SessionBuilder, READ_CHUNK};

use nix::errno::Errno;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PtyError {
    #[error("Failed to open PTY controller: {0}")]
    Open(#[source] Errno),

    #[error("Failed to grant access to PTY peripheral: {0}")]
    Grant(#[source] Errno),

    #[error("Failed to unlock PTY peripheral: {0}")]
    Unlock(#[source] Errno),

    #[error("Failed to resolve PTY peripheral name: {0}")]
    PeripheralName(#[source] Errno),

    #[error("Failed to configure PTY line discipline: {0}")]
    Termios(#[source] Errno),

    #[error("Failed to open PTY peripheral {path}: {source}")]
    PeripheralOpen {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to fork shell process: {0}")]
    Fork(#[source] Errno),

    #[error("Failed to poll PTY controller: {0}")]
    Poll(#[source] std::io::Error),

    #[error("PTY read failed: {0}")]
    Read(#[source] std::io::Error),

    #[error("PTY write failed: {0}")]
    Write(#[source] std::io::Error),

    #[error("Failed to wait for shell process: {0}")]
    Wait(#[source] Errno),

    #[error("Failed to signal shell process: {0}")]
    Signal(#[source] Errno),

    #[error("Invalid argument for shell process: {0}")]
    InvalidArgument(String),
}
