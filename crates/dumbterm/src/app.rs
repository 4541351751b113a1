//! The session loop
//!
//! Every frame interval: handle pending input events, read the shell once,
//! send the collected input, redraw if anything changed.

use crate::config::Config;
use crate::input::{map_event, InputAction};
use crate::surface::CrosstermSurface;
use anyhow::{Context, Result};
use crossterm::event::{self, Event};
use dumbterm_buffer::{RenderSurface, TextBuffer};
use dumbterm_pty::{ExitStatus, PtySession, ReadOutcome};
use std::time::Duration;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, info};

/// What the loop should do next
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    /// The user asked to quit
    Quit,
    /// The shell closed its terminal
    Ended,
}

/// A shell, its output buffer and the surface showing it
pub struct Session<S: RenderSurface> {
    pty: PtySession,
    buffer: TextBuffer,
    surface: S,
    pending_input: Vec<u8>,
}

impl<S: RenderSurface> Session<S> {
    pub fn new(pty: PtySession, buffer: TextBuffer, surface: S) -> Self {
        Self {
            pty,
            buffer,
            surface,
            pending_input: Vec::new(),
        }
    }

    /// Apply one input event
    pub fn handle_event(&mut self, event: &Event) -> Flow {
        match map_event(event, self.surface.rows()) {
            Some(action) => self.apply(action),
            None => Flow::Continue,
        }
    }

    pub fn apply(&mut self, action: InputAction) -> Flow {
        match action {
            InputAction::Send(bytes) => self.pending_input.extend_from_slice(&bytes),
            InputAction::ScrollUp(lines) => {
                for _ in 0..lines {
                    if !self.buffer.scroll_up() {
                        break;
                    }
                }
            }
            InputAction::ScrollDown(lines) => {
                for _ in 0..lines {
                    if !self.buffer.scroll_down() {
                        break;
                    }
                }
            }
            InputAction::Resize(columns, rows) => {
                debug!("Surface resized to {}x{}", columns, rows);
                self.surface.resize(usize::from(columns), usize::from(rows));
                self.buffer.request_redraw();
            }
            InputAction::Quit => return Flow::Quit,
        }
        Flow::Continue
    }

    /// Read the shell once, send pending input and redraw if needed
    pub fn tick(&mut self) -> Result<Flow> {
        match self.pty.read().context("Failed to read shell output")? {
            ReadOutcome::Data(bytes) => {
                let rows = self.surface.rows();
                self.buffer.set_width(self.surface.columns());
                let follow = self.buffer.is_at_end(rows);
                self.buffer.append(&bytes);
                if follow {
                    self.buffer.scroll_to_end(rows);
                }
            }
            ReadOutcome::EndOfStream => {
                info!("Shell closed its terminal");
                if self.buffer.flush_pending() {
                    self.buffer
                        .redraw(&mut self.surface)
                        .context("Failed to draw frame")?;
                }
                return Ok(Flow::Ended);
            }
            ReadOutcome::NoData => {}
        }

        if !self.pending_input.is_empty() {
            let input = std::mem::take(&mut self.pending_input);
            self.pty
                .write(&input)
                .context("Failed to send input to shell")?;
        }

        if self.buffer.needs_redraw() {
            self.buffer
                .redraw(&mut self.surface)
                .context("Failed to draw frame")?;
        }
        Ok(Flow::Continue)
    }

    pub fn buffer(&self) -> &TextBuffer {
        &self.buffer
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn pty(&self) -> &PtySession {
        &self.pty
    }

    /// Tear the shell down and hand back the surface
    pub fn finish(self) -> Result<(ExitStatus, S)> {
        let status = self.pty.shutdown().context("Failed to stop shell")?;
        info!("Shell finished with {:?}", status);
        Ok((status, self.surface))
    }
}

/// Drive `session` at a fixed cadence until the shell exits or the user quits
pub async fn drive<S: RenderSurface>(
    mut session: Session<S>,
    frame_interval: Duration,
    mut next_event: impl FnMut() -> Result<Option<Event>>,
) -> Result<(ExitStatus, S)> {
    let mut ticker = time::interval(frame_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;

        let mut flow = Flow::Continue;
        while flow == Flow::Continue {
            match next_event()? {
                Some(event) => flow = session.handle_event(&event),
                None => break,
            }
        }
        if flow == Flow::Quit {
            info!("Quit requested");
            break;
        }

        if session.tick()? == Flow::Ended {
            break;
        }
    }
    session.finish()
}

/// Next crossterm event, if one is already waiting
pub fn poll_crossterm_event() -> Result<Option<Event>> {
    if event::poll(Duration::ZERO).context("Failed to poll terminal events")? {
        Ok(Some(event::read().context("Failed to read terminal event")?))
    } else {
        Ok(None)
    }
}

/// Run dumbterm in the hosting terminal with `config`
pub async fn run(config: Config) -> Result<ExitStatus> {
    let surface = CrosstermSurface::stdout().context("Failed to set up the terminal")?;
    let pty = config
        .session_builder()
        .spawn()
        .with_context(|| format!("Failed to start {}", config.shell.display()))?;
    info!("Started {} as pid {}", config.shell.display(), pty.pid());

    let buffer = TextBuffer::new(surface.columns())
        .with_scrollback_limit(config.scrollback)
        .with_cursor(config.cursor);
    let session = Session::new(pty, buffer, surface);

    let (status, mut surface) = drive(session, config.frame_interval, poll_crossterm_event).await?;
    surface.restore().context("Failed to restore the terminal")?;
    Ok(status)
}
