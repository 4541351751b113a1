//! Error handling tests for dumbterm-pty

#[cfg(unix)]
mod unix_tests {
    use dumbterm_pty::{ExitStatus, PtyError, SessionBuilder};
    use dumbterm_test_utils::{init_test_logging, wait_for_end, SHELL_TIMEOUT};
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_missing_shell_fails_in_child_only() {
        init_test_logging();
        // Spawning succeeds: the exec failure belongs to the child
        let mut session = SessionBuilder::new()
            .shell("/nonexistent/command/that/should/not/exist")
            .spawn()
            .expect("fork should still succeed");

        let capture = wait_for_end(&mut session, SHELL_TIMEOUT).expect("child exits");
        assert!(
            capture.text().contains("dumbterm: execve failed"),
            "{}",
            capture.text()
        );
        assert_eq!(session.try_wait().expect("wait"), Some(ExitStatus::Exited(127)));
    }

    #[test]
    fn test_nul_in_shell_path_rejected() {
        let result = SessionBuilder::new().shell("/bin/s\0h").spawn();
        assert!(matches!(result, Err(PtyError::InvalidArgument(_))));
    }

    #[test]
    fn test_nul_in_argument_rejected() {
        let result = SessionBuilder::new().arg("-c\0").spawn();
        assert!(matches!(result, Err(PtyError::InvalidArgument(_))));
    }

    #[test]
    fn test_bad_env_key_rejected() {
        let result = SessionBuilder::new().env("BAD=KEY", "value").spawn();
        assert!(matches!(result, Err(PtyError::InvalidArgument(_))));
    }

    #[test]
    fn test_error_messages_name_the_stage() {
        let err = PtyError::Open(nix::errno::Errno::EMFILE);
        assert!(err.to_string().starts_with("Failed to open PTY controller"));

        let err = PtyError::PeripheralOpen {
            path: "/dev/pts/99".into(),
            source: std::io::Error::from_raw_os_error(libc::ENOENT),
        };
        assert!(err.to_string().contains("/dev/pts/99"));
    }
}
