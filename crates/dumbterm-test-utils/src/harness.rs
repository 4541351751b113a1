use anyhow::{Context, Result};
use dumbterm_pty::{PtySession, ReadOutcome};
use std::time::{Duration, Instant};

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Output collected from a session while polling it
#[derive(Debug, Default)]
pub struct Capture {
    raw_output: Vec<u8>,
    pub reached_end: bool,
}

impl Capture {
    pub fn raw_output(&self) -> &[u8] {
        &self.raw_output
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.raw_output).into_owned()
    }
}

/// Poll `session` until the collected output contains `pattern`.
///
/// Fails if the shell exits or the timeout elapses first.
pub fn wait_for_output(
    session: &mut PtySession,
    pattern: &str,
    timeout: Duration,
) -> Result<Capture> {
    let capture = poll_session(session, timeout, |text| text.contains(pattern))?;
    if capture.text().contains(pattern) {
        return Ok(capture);
    }
    anyhow::bail!(
        "Pattern {:?} not seen within {:?} (end of stream: {}). Output:\n{}",
        pattern,
        timeout,
        capture.reached_end,
        capture.text()
    )
}

/// Poll `session` until it reports end of stream.
pub fn wait_for_end(session: &mut PtySession, timeout: Duration) -> Result<Capture> {
    let capture = poll_session(session, timeout, |_| false)?;
    if capture.reached_end {
        return Ok(capture);
    }
    anyhow::bail!(
        "Session still open after {:?}. Output:\n{}",
        timeout,
        capture.text()
    )
}

/// Poll `session` until `done` accepts the output so far, the stream ends,
/// or the timeout elapses.
pub fn poll_session(
    session: &mut PtySession,
    timeout: Duration,
    mut done: impl FnMut(&str) -> bool,
) -> Result<Capture> {
    let start = Instant::now();
    let mut capture = Capture::default();

    while start.elapsed() < timeout {
        match session.read().context("Failed to read from session")? {
            ReadOutcome::Data(bytes) => {
                capture.raw_output.extend_from_slice(&bytes);
                if done(&capture.text()) {
                    return Ok(capture);
                }
            }
            ReadOutcome::NoData => std::thread::sleep(POLL_INTERVAL),
            ReadOutcome::EndOfStream => {
                capture.reached_end = true;
                return Ok(capture);
            }
        }
    }
    Ok(capture)
}

/// Read and discard output until the shell has been quiet for `quiet`.
pub fn drain(session: &mut PtySession, quiet: Duration, timeout: Duration) -> Result<Capture> {
    let start = Instant::now();
    let mut last_data = Instant::now();
    let mut capture = Capture::default();

    while start.elapsed() < timeout && last_data.elapsed() < quiet {
        match session.read().context("Failed to read from session")? {
            ReadOutcome::Data(bytes) => {
                capture.raw_output.extend_from_slice(&bytes);
                last_data = Instant::now();
            }
            ReadOutcome::NoData => std::thread::sleep(POLL_INTERVAL),
            ReadOutcome::EndOfStream => {
                capture.reached_end = true;
                break;
            }
        }
    }
    Ok(capture)
}
