use dumbterm_buffer::{Frame, RenderError, RenderSurface};

/// A render surface of fixed size that keeps every frame it is asked to draw
#[derive(Debug, Clone)]
pub struct RecordingSurface {
    pub columns: usize,
    pub rows: usize,
    pub frames: Vec<Frame>,
    fail_with: Option<String>,
}

impl RecordingSurface {
    pub fn new(columns: usize, rows: usize) -> Self {
        Self {
            columns,
            rows,
            frames: Vec::new(),
            fail_with: None,
        }
    }

    /// Make every following draw fail with a rasterization error
    pub fn failing(mut self, message: impl Into<String>) -> Self {
        self.fail_with = Some(message.into());
        self
    }

    pub fn last_frame(&self) -> Option<&Frame> {
        self.frames.last()
    }

    /// Text of the last frame, cursor included
    pub fn last_text(&self) -> Option<String> {
        self.last_frame().map(Frame::to_text)
    }
}

impl RenderSurface for RecordingSurface {
    fn columns(&self) -> usize {
        self.columns
    }

    fn rows(&self) -> usize {
        self.rows
    }

    fn draw(&mut self, frame: &Frame) -> Result<(), RenderError> {
        if let Some(message) = &self.fail_with {
            return Err(RenderError::Rasterize(message.clone()));
        }
        self.frames.push(frame.clone());
        Ok(())
    }

    fn resize(&mut self, columns: usize, rows: usize) {
        self.columns = columns;
        self.rows = rows;
    }
}
