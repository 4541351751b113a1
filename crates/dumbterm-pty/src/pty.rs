//! Low-level PTY allocation
//!
//! Acquires a controller/peripheral pair the POSIX way: open the
//! multiplexer, grant and unlock the peripheral, then open it by name.

use crate::PtyError;
use nix::fcntl::{fcntl, FcntlArg, FdFlag, OFlag};
use nix::pty::{grantpt, posix_openpt, unlockpt, PtyMaster};
use nix::sys::termios::{tcgetattr, tcsetattr, OutputFlags, SetArg, SpecialCharacterIndices};
use std::fs::{File, OpenOptions};
use std::os::unix::fs::OpenOptionsExt;
use std::os::unix::io::{AsRawFd, FromRawFd, IntoRawFd, OwnedFd, RawFd};
use std::path::{Path, PathBuf};
use tracing::debug;

/// A freshly allocated pseudo-terminal pair
pub struct PtyPair {
    /// Controller side, used by the emulator for I/O
    controller: OwnedFd,

    /// Peripheral side, handed to the shell as its terminal
    peripheral: OwnedFd,

    peripheral_path: PathBuf,
}

impl PtyPair {
    /// Allocate a new PTY pair.
    ///
    /// Each acquisition step fails with its own [`PtyError`] variant carrying
    /// the errno reported by the OS.
    pub fn open() -> Result<Self, PtyError> {
        let master = posix_openpt(OFlag::O_RDWR | OFlag::O_NOCTTY).map_err(PtyError::Open)?;
        grantpt(&master).map_err(PtyError::Grant)?;
        unlockpt(&master).map_err(PtyError::Unlock)?;

        let name = peripheral_name(&master)?;
        let peripheral = OpenOptions::new()
            .read(true)
            .write(true)
            .custom_flags(libc::O_NOCTTY)
            .open(&name)
            .map_err(|source| PtyError::PeripheralOpen {
                path: name.clone(),
                source,
            })?;

        configure_line_discipline(&peripheral)?;

        // SAFETY: into_raw_fd gives up ownership, so the OwnedFd is the only owner.
        let controller = unsafe { OwnedFd::from_raw_fd(master.into_raw_fd()) };

        // The shell must not inherit the controller across exec.
        fcntl(controller.as_raw_fd(), FcntlArg::F_SETFD(FdFlag::FD_CLOEXEC))
            .map_err(PtyError::Open)?;

        debug!(
            "Allocated PTY pair: controller fd {}, peripheral {}",
            controller.as_raw_fd(),
            name
        );

        Ok(Self {
            controller,
            peripheral: OwnedFd::from(peripheral),
            peripheral_path: PathBuf::from(name),
        })
    }

    /// Device path of the peripheral side (e.g. `/dev/pts/3`)
    pub fn peripheral_path(&self) -> &Path {
        &self.peripheral_path
    }

    /// Raw descriptor of the controller side
    pub fn controller_fd(&self) -> RawFd {
        self.controller.as_raw_fd()
    }

    /// Raw descriptor of the peripheral side
    pub fn peripheral_fd(&self) -> RawFd {
        self.peripheral.as_raw_fd()
    }

    /// Split into the controller as a `File` and the peripheral handle
    pub(crate) fn into_parts(self) -> (File, OwnedFd, PathBuf) {
        (
            File::from(self.controller),
            self.peripheral,
            self.peripheral_path,
        )
    }
}

/// Line discipline for a terminal that interprets nothing: plain `\n` line
/// endings on output and backspace (0x08) as the erase character.
fn configure_line_discipline(peripheral: &File) -> Result<(), PtyError> {
    let mut termios = tcgetattr(peripheral).map_err(PtyError::Termios)?;
    termios.output_flags.remove(OutputFlags::ONLCR);
    termios.control_chars[SpecialCharacterIndices::VERASE as usize] = 0x08;
    tcsetattr(peripheral, SetArg::TCSANOW, &termios).map_err(PtyError::Termios)
}

#[cfg(any(target_os = "linux", target_os = "android"))]
fn peripheral_name(master: &PtyMaster) -> Result<String, PtyError> {
    nix::pty::ptsname_r(master).map_err(PtyError::PeripheralName)
}

#[cfg(not(any(target_os = "linux", target_os = "android")))]
fn peripheral_name(master: &PtyMaster) -> Result<String, PtyError> {
    // SAFETY: ptsname returns a pointer into a static buffer that is copied
    // into an owned String before any other PTY is allocated on this thread.
    unsafe { nix::pty::ptsname(master) }.map_err(PtyError::PeripheralName)
}
