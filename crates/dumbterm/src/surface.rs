//! Render surface backed by the hosting terminal
//!
//! Each display line is drawn on its own row. Stored text is never written
//! raw: control characters are replaced by their Unicode control pictures
//! so shell output cannot move the host cursor or change colors.

use crate::terminal_guard::TerminalGuard;
use crossterm::{cursor::MoveTo, queue, style::Print, terminal};
use dumbterm_buffer::{Frame, RenderError, RenderSurface};
use std::io::{self, Stdout, Write};
use tracing::trace;

/// Frame positioned on a grid of character cells
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    /// Printable text of each row, top to bottom
    pub rows: Vec<String>,

    /// Column and row of the cursor marker
    pub cursor: (usize, usize),
}

/// Lay `frame` out on a grid `columns` wide.
///
/// The cursor goes right after the last line's text, or to the start of the
/// next row when that line ends with a line-feed or fills the whole width.
pub fn layout(frame: &Frame, columns: usize) -> Layout {
    let columns = columns.max(1);
    let rows: Vec<String> = frame
        .lines
        .iter()
        .map(|line| {
            line.strip_suffix('\n')
                .unwrap_or(line)
                .chars()
                .map(control_picture)
                .collect()
        })
        .collect();

    let cursor = match frame.lines.last() {
        None => (0, 0),
        Some(last) => {
            let row = frame.lines.len() - 1;
            let col = rows[row].chars().count();
            if last.ends_with('\n') || col >= columns {
                (0, row + 1)
            } else {
                (col, row)
            }
        }
    };
    Layout { rows, cursor }
}

/// Printable stand-in for a control character
pub fn control_picture(c: char) -> char {
    match c {
        '\0'..='\x1f' => char::from_u32(0x2400 + c as u32).unwrap_or(c),
        '\x7f' => '\u{2421}',
        _ => c,
    }
}

/// Draws frames into a crossterm-controlled terminal
pub struct CrosstermSurface<W: Write = Stdout> {
    out: W,
    columns: u16,
    rows: u16,
    guard: Option<TerminalGuard>,
}

impl CrosstermSurface<Stdout> {
    /// Take over the terminal on stdout (raw mode, alternate screen)
    pub fn stdout() -> Result<Self, RenderError> {
        let guard = TerminalGuard::acquire()?;
        let (columns, rows) = terminal::size()?;
        let mut surface = Self::with_writer(io::stdout(), columns, rows);
        surface.guard = Some(guard);
        Ok(surface)
    }

    /// Restore the terminal before the surface is dropped
    pub fn restore(&mut self) -> Result<(), RenderError> {
        if let Some(mut guard) = self.guard.take() {
            guard.release()?;
        }
        Ok(())
    }
}

impl<W: Write> CrosstermSurface<W> {
    /// Draw into `out`, assuming a terminal of the given size
    pub fn with_writer(out: W, columns: u16, rows: u16) -> Self {
        Self {
            out,
            columns,
            rows,
            guard: None,
        }
    }

    pub fn writer(&self) -> &W {
        &self.out
    }
}

impl<W: Write> RenderSurface for CrosstermSurface<W> {
    fn columns(&self) -> usize {
        usize::from(self.columns).max(1)
    }

    /// One row short of the terminal, leaving room for the cursor marker
    /// after a final line-feed.
    fn rows(&self) -> usize {
        usize::from(self.rows).saturating_sub(1).max(1)
    }

    fn draw(&mut self, frame: &Frame) -> Result<(), RenderError> {
        let layout = layout(frame, self.columns());
        queue!(self.out, terminal::Clear(terminal::ClearType::All))?;
        for (y, row) in layout.rows.iter().enumerate() {
            queue!(self.out, MoveTo(0, cell(y)), Print(row))?;
        }
        let (x, y) = layout.cursor;
        if y < usize::from(self.rows) {
            queue!(self.out, MoveTo(cell(x), cell(y)), Print(frame.cursor))?;
        }
        self.out.flush()?;
        trace!("Drew {} rows", layout.rows.len());
        Ok(())
    }

    fn resize(&mut self, columns: usize, rows: usize) {
        self.columns = u16::try_from(columns).unwrap_or(u16::MAX);
        self.rows = u16::try_from(rows).unwrap_or(u16::MAX);
    }
}

fn cell(n: usize) -> u16 {
    u16::try_from(n).unwrap_or(u16::MAX)
}
