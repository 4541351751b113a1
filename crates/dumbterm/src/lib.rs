//! dumbterm: a terminal emulator for a terminal that interprets nothing
//!
//! Glues a [`dumbterm_pty::PtySession`] to a [`dumbterm_buffer::TextBuffer`]
//! and draws the result into the hosting terminal with crossterm.

pub mod app;
pub mod config;
pub mod input;
pub mod logging;
pub mod surface;
pub mod terminal_guard;

pub use app::{Flow, Session};
pub use config::{Args, Config, ConfigError, LogLevel};
pub use input::InputAction;
pub use surface::CrosstermSurface;
