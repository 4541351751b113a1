//! Process lifecycle tests: exit status, teardown and reaping

#[cfg(unix)]
mod unix_tests {
    use dumbterm_pty::{ExitStatus, PtySession, SessionBuilder};
    use dumbterm_test_utils::{init_test_logging, wait_for_end, wait_for_output, SHELL_TIMEOUT};
    use nix::errno::Errno;
    use nix::sys::signal::{kill, Signal};
    use serial_test::serial;
    use std::time::Duration;

    fn is_gone(pid: nix::unistd::Pid) -> bool {
        kill(pid, None) == Err(Errno::ESRCH)
    }

    #[test]
    #[serial]
    fn test_exit_status_reported() {
        init_test_logging();
        let mut session = SessionBuilder::new()
            .args(["-c", "exit 3"])
            .spawn()
            .expect("spawn");
        wait_for_end(&mut session, SHELL_TIMEOUT).expect("end of stream");
        assert_eq!(session.try_wait().expect("wait"), Some(ExitStatus::Exited(3)));
        assert_eq!(session.shutdown().expect("shutdown"), ExitStatus::Exited(3));
    }

    #[test]
    #[serial]
    fn test_running_shell_reports_no_status() {
        init_test_logging();
        let mut session = PtySession::spawn().expect("spawn");
        assert_eq!(session.try_wait().expect("wait"), None);
    }

    #[test]
    #[serial]
    fn test_drop_reaps_shell() {
        init_test_logging();
        let session = PtySession::spawn().expect("spawn");
        let pid = session.pid();
        assert!(!is_gone(pid));

        drop(session);
        assert!(is_gone(pid), "shell {pid} should be reaped on drop");
    }

    #[test]
    #[serial]
    fn test_shutdown_hangs_up_shell() {
        init_test_logging();
        let mut session = SessionBuilder::new()
            .args(["-c", "echo ready; sleep 30"])
            .spawn()
            .expect("spawn");
        wait_for_output(&mut session, "ready", SHELL_TIMEOUT).expect("ready");
        let pid = session.pid();

        let status = session.shutdown().expect("shutdown");
        assert_eq!(status, ExitStatus::Signaled(Signal::SIGHUP));
        assert!(is_gone(pid));
    }

    #[test]
    #[serial]
    fn test_shutdown_kills_shell_ignoring_hangup() {
        init_test_logging();
        let mut session = SessionBuilder::new()
            .args(["-c", "trap '' HUP; echo ready; sleep 30"])
            .teardown_grace(Duration::from_millis(100))
            .spawn()
            .expect("spawn");
        wait_for_output(&mut session, "ready", SHELL_TIMEOUT).expect("ready");

        let status = session.shutdown().expect("shutdown");
        assert_eq!(status, ExitStatus::Signaled(Signal::SIGKILL));
        assert_eq!(status.code(), 137);
    }

    #[test]
    #[serial]
    fn test_immediate_shutdown_after_spawn() {
        init_test_logging();
        for _ in 0..5 {
            let session = PtySession::spawn().expect("spawn");
            let pid = session.pid();
            session.shutdown().expect("shutdown");
            assert!(is_gone(pid));
        }
    }

    #[test]
    #[serial]
    fn test_descriptors_released_on_drop() {
        init_test_logging();
        let session = PtySession::spawn().expect("spawn");
        let path = session.peripheral_path().to_path_buf();
        drop(session);
        // The pts node disappears once every handle to it is closed
        let deadline = std::time::Instant::now() + SHELL_TIMEOUT;
        while path.exists() && std::time::Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(10));
        }
        assert!(!path.exists(), "{} still allocated", path.display());
    }
}
