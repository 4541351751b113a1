//! Logical line store with wrap cache and scrollback
//!
//! Output is kept as logical lines, each ending at an explicit line-feed.
//! Display lines are derived from them for the current surface width and
//! rebuilt from scratch whenever the lines or the width change.

use crate::{
    surface::{Frame, RenderSurface, DEFAULT_CURSOR},
    wrap::{wrap_line, wrap_lines},
    RenderError,
};
use tracing::{debug, trace};

/// Scrollback text buffer
#[derive(Debug, Clone)]
pub struct TextBuffer {
    /// Logical lines. Every line but the last ends with its only line-feed.
    lines: Vec<String>,

    /// Whether the last line is finished, so the next character starts a
    /// new line
    line_complete: bool,

    /// `lines` wrapped to `width`
    wrap_cache: Vec<String>,

    /// Width the wrap cache was built for
    width: usize,

    /// First visible display line
    scroll_offset: usize,

    redraw_requested: bool,

    /// Incomplete UTF-8 sequence left over from the previous append
    pending: Vec<u8>,

    /// Maximum number of logical lines kept, if any
    scrollback_limit: Option<usize>,

    cursor: char,
}

impl TextBuffer {
    /// Create an empty buffer wrapping at `width` characters
    pub fn new(width: usize) -> Self {
        Self {
            lines: Vec::new(),
            line_complete: true,
            wrap_cache: Vec::new(),
            width: width.max(1),
            scroll_offset: 0,
            redraw_requested: false,
            pending: Vec::new(),
            scrollback_limit: None,
            cursor: DEFAULT_CURSOR,
        }
    }

    /// Keep at most `limit` logical lines, dropping the oldest
    pub fn with_scrollback_limit(mut self, limit: Option<usize>) -> Self {
        self.scrollback_limit = limit.map(|l| l.max(1));
        self
    }

    /// Use `cursor` as the cursor marker glyph
    pub fn with_cursor(mut self, cursor: char) -> Self {
        self.cursor = cursor;
        self
    }

    /// Append raw shell output.
    ///
    /// Bytes are decoded as UTF-8; an incomplete sequence at the end is kept
    /// until the next call and invalid bytes become U+FFFD. A line-feed ends
    /// the current line; every other character, control characters included,
    /// is stored as is.
    pub fn append(&mut self, bytes: &[u8]) {
        let text = self.decode(bytes);
        for c in text.chars() {
            self.push_char(c);
        }
        self.enforce_scrollback_limit();
        self.rebuild();
        trace!(
            "Appended {} bytes: {} lines, {} display lines",
            bytes.len(),
            self.lines.len(),
            self.wrap_cache.len()
        );
    }

    /// Store an incomplete UTF-8 sequence held back by `append` as U+FFFD.
    ///
    /// Called once no more output will follow. Returns whether anything was
    /// pending.
    pub fn flush_pending(&mut self) -> bool {
        if self.pending.is_empty() {
            return false;
        }
        let pending = std::mem::take(&mut self.pending);
        debug!("Flushing {} bytes of incomplete UTF-8", pending.len());
        for c in String::from_utf8_lossy(&pending).chars() {
            self.push_char(c);
        }
        self.enforce_scrollback_limit();
        self.rebuild();
        true
    }

    fn decode(&mut self, bytes: &[u8]) -> String {
        let mut input = std::mem::take(&mut self.pending);
        input.extend_from_slice(bytes);

        let mut text = String::with_capacity(input.len());
        let mut rest = &input[..];
        loop {
            match std::str::from_utf8(rest) {
                Ok(valid) => {
                    text.push_str(valid);
                    break;
                }
                Err(e) => {
                    let (valid, after) = rest.split_at(e.valid_up_to());
                    text.push_str(&String::from_utf8_lossy(valid));
                    match e.error_len() {
                        Some(len) => {
                            text.push(char::REPLACEMENT_CHARACTER);
                            rest = &after[len..];
                        }
                        None => {
                            self.pending = after.to_vec();
                            break;
                        }
                    }
                }
            }
        }
        text
    }

    // A line-feed after a completed line is a blank line of its own, so
    // "a\n\nb" is stored as ["a\n", "\n", "b"].
    fn push_char(&mut self, c: char) {
        match self.lines.last_mut() {
            Some(last) if !self.line_complete => last.push(c),
            _ => self.lines.push(String::from(c)),
        }
        self.line_complete = c == '\n';
    }

    fn enforce_scrollback_limit(&mut self) {
        let Some(limit) = self.scrollback_limit else {
            return;
        };
        if self.lines.len() <= limit {
            return;
        }
        let excess = self.lines.len() - limit;
        let dropped_rows: usize = self.lines[..excess]
            .iter()
            .map(|line| wrap_line(line, self.width).len())
            .sum();
        self.lines.drain(..excess);
        self.scroll_offset = self.scroll_offset.saturating_sub(dropped_rows);
        debug!("Dropped {} lines beyond scrollback limit {}", excess, limit);
    }

    /// Recompute the wrap cache from the logical lines
    fn rebuild(&mut self) {
        self.wrap_cache = wrap_lines(&self.lines, self.width);
        self.scroll_offset = self.scroll_offset.min(self.wrap_cache.len());
        self.redraw_requested = true;
    }

    /// Rewrap for a new surface width. Does nothing if the width is unchanged.
    pub fn set_width(&mut self, width: usize) {
        let width = width.max(1);
        if width != self.width {
            debug!("Rewrapping from {} to {} columns", self.width, width);
            self.width = width;
            self.rebuild();
        }
    }

    /// Move the view up one display line. Returns false at the top.
    pub fn scroll_up(&mut self) -> bool {
        if self.scroll_offset == 0 {
            return false;
        }
        self.scroll_offset -= 1;
        self.redraw_requested = true;
        true
    }

    /// Move the view down one display line. Returns false once the offset
    /// has reached the number of display lines.
    pub fn scroll_down(&mut self) -> bool {
        if self.scroll_offset + 1 > self.wrap_cache.len() {
            return false;
        }
        self.scroll_offset += 1;
        self.redraw_requested = true;
        true
    }

    /// Whether a view of `rows` rows shows the last display line
    pub fn is_at_end(&self, rows: usize) -> bool {
        self.scroll_offset + rows.max(1) >= self.wrap_cache.len()
    }

    /// Scroll so that the last `rows` display lines are visible
    pub fn scroll_to_end(&mut self, rows: usize) {
        let offset = self.wrap_cache.len().saturating_sub(rows.max(1));
        if offset != self.scroll_offset {
            self.scroll_offset = offset;
            self.redraw_requested = true;
        }
    }

    /// The display lines visible in a view of `rows` rows, with the cursor
    pub fn visible_frame(&self, rows: usize) -> Frame {
        let start = self.scroll_offset;
        let end = (start + rows).min(self.wrap_cache.len());
        Frame {
            lines: self.wrap_cache[start..end].to_vec(),
            cursor: self.cursor,
        }
    }

    /// Draw the visible range on `surface`, rewrapping first if its width
    /// changed.
    ///
    /// Returns `Ok(false)` without drawing when the buffer is empty.
    pub fn redraw(&mut self, surface: &mut dyn RenderSurface) -> Result<bool, RenderError> {
        self.set_width(surface.columns());
        if self.lines.is_empty() {
            self.redraw_requested = false;
            return Ok(false);
        }
        let frame = self.visible_frame(surface.rows().max(1));
        surface.draw(&frame)?;
        self.redraw_requested = false;
        Ok(true)
    }

    /// Ask for a redraw on the next loop iteration (e.g. after a resize)
    pub fn request_redraw(&mut self) {
        self.redraw_requested = true;
    }

    pub fn needs_redraw(&self) -> bool {
        self.redraw_requested
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn display_lines(&self) -> &[String] {
        &self.wrap_cache
    }

    pub fn scroll_offset(&self) -> usize {
        self.scroll_offset
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}
