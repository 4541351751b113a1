//! Render surface contract
//!
//! The buffer knows nothing about glyphs or windows: it asks the surface how
//! many columns and rows are visible and hands it a [`Frame`] to draw.

use crate::RenderError;

/// Glyph drawn after the last character of the visible text
pub const DEFAULT_CURSOR: char = '|';

/// The visible slice of the wrap cache, plus the cursor marker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Display lines, top to bottom. A line may end with a line-feed.
    pub lines: Vec<String>,

    pub cursor: char,
}

impl Frame {
    /// The frame as one string: lines concatenated in order, cursor last
    pub fn to_text(&self) -> String {
        let mut text = String::with_capacity(self.lines.iter().map(String::len).sum::<usize>() + 4);
        for line in &self.lines {
            text.push_str(line);
        }
        text.push(self.cursor);
        text
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

/// Something that can display frames
#[cfg_attr(test, mockall::automock)]
pub trait RenderSurface {
    /// Visible width in characters (at least 1)
    fn columns(&self) -> usize;

    /// Visible height in text rows (at least 1)
    fn rows(&self) -> usize;

    /// Present a frame
    fn draw(&mut self, frame: &Frame) -> Result<(), RenderError>;

    /// The window behind the surface changed size
    fn resize(&mut self, _columns: usize, _rows: usize) {}
}
