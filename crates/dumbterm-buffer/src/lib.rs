//! Text buffer for dumbterm
//!
//! Accumulates shell output into logical lines, wraps them to the width of
//! the render surface and tracks the scrollback position. Control sequences
//! are stored verbatim, never interpreted.

pub mod buffer;
pub mod surface;
pub mod wrap;

pub use buffer::TextBuffer;
pub use surface::{Frame, RenderSurface, DEFAULT_CURSOR};
pub use wrap::{wrap_line, wrap_lines};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("Render backend I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to rasterize frame: {0}")]
    Rasterize(String),
}
