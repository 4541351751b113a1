//! Child side of the fork
//!
//! Everything the child needs is built into a [`ChildSpec`] before `fork`,
//! down to the null-terminated pointer arrays handed to `execve(2)`, so the
//! code running between `fork` and `execve` never allocates.

use crate::PtyError;
use libc::c_char;
use nix::errno::Errno;
use nix::sys::signal::{self, SigHandler, SigSet, SigmaskHow, Signal};
use nix::unistd::{close, dup2, setsid};
use std::ffi::{CString, OsStr, OsString};
use std::os::unix::ffi::OsStrExt;
use std::os::unix::io::RawFd;

/// Program image, argv and environment for the shell, as C strings
#[derive(Debug)]
pub(crate) struct ChildSpec {
    program: CString,

    // Owners of the strings behind `argv_ptrs` and `envp_ptrs`
    #[allow(dead_code)]
    argv: Vec<CString>,
    #[allow(dead_code)]
    envp: Vec<CString>,

    /// Pointers into `argv` and `envp`, each followed by a null pointer.
    /// The strings live on the heap, so moving the spec keeps them valid.
    argv_ptrs: Vec<*const c_char>,
    envp_ptrs: Vec<*const c_char>,
}

impl ChildSpec {
    pub(crate) fn new(
        program: &OsStr,
        args: &[OsString],
        env: &[(OsString, OsString)],
    ) -> Result<Self, PtyError> {
        let program = c_string(program)?;

        let mut argv = Vec::with_capacity(args.len() + 1);
        argv.push(program.clone());
        for arg in args {
            argv.push(c_string(arg)?);
        }

        let mut envp = Vec::with_capacity(env.len());
        for (key, value) in env {
            if key.is_empty() || key.as_bytes().contains(&b'=') {
                return Err(PtyError::InvalidArgument(format!(
                    "environment key {key:?}"
                )));
            }
            let mut entry = key.as_bytes().to_vec();
            entry.push(b'=');
            entry.extend_from_slice(value.as_bytes());
            envp.push(
                CString::new(entry)
                    .map_err(|_| PtyError::InvalidArgument(format!("environment entry {key:?}")))?,
            );
        }

        let argv_ptrs = null_terminated(&argv);
        let envp_ptrs = null_terminated(&envp);
        Ok(Self {
            program,
            argv,
            envp,
            argv_ptrs,
            envp_ptrs,
        })
    }

    #[cfg(test)]
    fn env_entries(&self) -> Vec<String> {
        self.envp
            .iter()
            .map(|e| e.to_string_lossy().into_owned())
            .collect()
    }
}

fn null_terminated(strings: &[CString]) -> Vec<*const c_char> {
    strings
        .iter()
        .map(|s| s.as_ptr())
        .chain(std::iter::once(std::ptr::null()))
        .collect()
}

fn c_string(value: &OsStr) -> Result<CString, PtyError> {
    CString::new(value.as_bytes())
        .map_err(|_| PtyError::InvalidArgument(format!("{value:?} contains a NUL byte")))
}

/// Turn the forked process into the shell.
///
/// Becomes a session leader, takes the peripheral as controlling terminal,
/// wires it to stdin/stdout/stderr and execs. Never returns: any failure is
/// reported on stderr and the process exits with status 127.
pub(crate) fn exec_child(spec: &ChildSpec, controller: RawFd, peripheral: RawFd) -> ! {
    let _ = close(controller);

    if let Err(e) = setsid() {
        fail(b"setsid", e);
    }

    // SAFETY: TIOCSCTTY takes an integer argument and touches no memory.
    if unsafe { libc::ioctl(peripheral, libc::TIOCSCTTY as _, 0) } == -1 {
        fail(b"TIOCSCTTY", Errno::last());
    }

    for target in 0..=2 {
        if let Err(e) = dup2(peripheral, target) {
            fail(b"dup2", e);
        }
    }
    if peripheral > 2 {
        let _ = close(peripheral);
    }

    // The emulator ignores SIGPIPE; ignored dispositions survive exec.
    // SAFETY: restoring the default disposition installs no handler.
    let _ = unsafe { signal::signal(Signal::SIGPIPE, SigHandler::SigDfl) };
    let _ = signal::sigprocmask(SigmaskHow::SIG_SETMASK, Some(&SigSet::empty()), None);

    // SAFETY: every pointer refers to a NUL-terminated string owned by
    // `spec`, and both arrays end with a null pointer.
    unsafe {
        libc::execve(
            spec.program.as_ptr(),
            spec.argv_ptrs.as_ptr(),
            spec.envp_ptrs.as_ptr(),
        );
    }
    fail(b"execve", Errno::last())
}

fn fail(stage: &[u8], errno: Errno) -> ! {
    let parts: [&[u8]; 5] = [
        b"dumbterm: ",
        stage,
        b" failed: ",
        errno.desc().as_bytes(),
        b"\n",
    ];
    for part in parts {
        // SAFETY: write(2) is async-signal-safe and the buffer outlives the call.
        unsafe {
            libc::write(libc::STDERR_FILENO, part.as_ptr().cast(), part.len());
        }
    }
    // SAFETY: _exit skips the parent's atexit handlers, which must not run twice.
    unsafe { libc::_exit(127) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::CStr;

    #[test]
    fn test_argv_starts_with_program() {
        let spec = ChildSpec::new(OsStr::new("/bin/sh"), &[OsString::from("-i")], &[]).unwrap();
        assert_eq!(spec.argv.len(), 2);
        assert_eq!(spec.argv[0].to_str().unwrap(), "/bin/sh");
        assert_eq!(spec.argv[1].to_str().unwrap(), "-i");
    }

    #[test]
    fn test_env_entries_are_key_value() {
        let env: Vec<(OsString, OsString)> = vec![
            ("TERM".into(), "dumb".into()),
            ("EMPTY".into(), "".into()),
        ];
        let spec = ChildSpec::new(OsStr::new("/bin/sh"), &[], &env).unwrap();
        assert_eq!(spec.env_entries(), vec!["TERM=dumb", "EMPTY="]);
    }

    #[test]
    fn test_exec_arrays_are_null_terminated() {
        let env: Vec<(OsString, OsString)> = vec![("TERM".into(), "dumb".into())];
        let spec =
            ChildSpec::new(OsStr::new("/bin/sh"), &[OsString::from("-c")], &env).unwrap();

        assert_eq!(spec.argv_ptrs.len(), 3);
        assert!(spec.argv_ptrs[2].is_null());
        assert_eq!(spec.envp_ptrs.len(), 2);
        assert!(spec.envp_ptrs[1].is_null());

        // Pointers still refer to the owned strings after the spec moves
        let moved = spec;
        let arg = unsafe { CStr::from_ptr(moved.argv_ptrs[1]) };
        assert_eq!(arg.to_str().unwrap(), "-c");
        let entry = unsafe { CStr::from_ptr(moved.envp_ptrs[0]) };
        assert_eq!(entry.to_str().unwrap(), "TERM=dumb");
    }

    #[test]
    fn test_nul_in_program_rejected() {
        let result = ChildSpec::new(OsStr::new("/bin/s\0h"), &[], &[]);
        assert!(matches!(result, Err(PtyError::InvalidArgument(_))));
    }

    #[test]
    fn test_bad_env_key_rejected() {
        let env: Vec<(OsString, OsString)> = vec![("A=B".into(), "c".into())];
        let result = ChildSpec::new(OsStr::new("/bin/sh"), &[], &env);
        assert!(matches!(result, Err(PtyError::InvalidArgument(_))));

        let env: Vec<(OsString, OsString)> = vec![("".into(), "c".into())];
        let result = ChildSpec::new(OsStr::new("/bin/sh"), &[], &env);
        assert!(matches!(result, Err(PtyError::InvalidArgument(_))));
    }
}
