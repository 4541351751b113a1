//! RAII guard for the hosting terminal while dumbterm draws on it

use crossterm::{
    cursor,
    event::{DisableBracketedPaste, DisableMouseCapture, EnableBracketedPaste, EnableMouseCapture},
    execute, terminal,
};
use std::io;

/// RAII guard that owns the hosting terminal: raw mode, the alternate
/// screen, bracketed paste and mouse reporting are enabled on acquire and
/// restored when dropped.
pub struct TerminalGuard {
    active: bool,
    // Marker to ensure this type is !Send and !Sync
    _marker: std::marker::PhantomData<*const ()>,
}

impl TerminalGuard {
    /// Take over the terminal attached to stdout
    pub fn acquire() -> io::Result<Self> {
        terminal::enable_raw_mode()?;
        let guard = Self {
            active: true,
            _marker: std::marker::PhantomData,
        };
        // On failure the guard is dropped here, which undoes raw mode
        execute!(
            io::stdout(),
            terminal::EnterAlternateScreen,
            EnableBracketedPaste,
            EnableMouseCapture,
            cursor::Hide,
        )?;
        Ok(guard)
    }

    /// Give the terminal back. Safe to call more than once.
    pub fn release(&mut self) -> io::Result<()> {
        if !self.active {
            return Ok(());
        }
        self.active = false;
        execute!(
            io::stdout(),
            cursor::Show,
            DisableMouseCapture,
            DisableBracketedPaste,
            terminal::LeaveAlternateScreen,
        )?;
        terminal::disable_raw_mode()
    }

    pub fn is_active(&self) -> bool {
        self.active
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        // Always try to restore terminal state
        let _ = self.release();
    }
}
