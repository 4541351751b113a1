//! Keyboard, mouse and paste events to shell input or view actions

use crossterm::event::{
    Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers, MouseEvent, MouseEventKind,
};

/// Display lines scrolled per mouse wheel notch
pub const WHEEL_LINES: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputAction {
    /// Bytes for the shell
    Send(Vec<u8>),
    ScrollUp(usize),
    ScrollDown(usize),
    /// The hosting terminal now has this many columns and rows
    Resize(u16, u16),
    Quit,
}

/// Map one event. `page` is the number of visible rows, used for
/// page-wise scrolling.
pub fn map_event(event: &Event, page: usize) -> Option<InputAction> {
    match event {
        Event::Key(key) => key_to_action(*key, page),
        Event::Paste(text) if !text.is_empty() => {
            Some(InputAction::Send(text.clone().into_bytes()))
        }
        Event::Mouse(mouse) => mouse_to_action(mouse),
        Event::Resize(columns, rows) => Some(InputAction::Resize(*columns, *rows)),
        _ => None,
    }
}

/// Convert a key event to an action. Releases are ignored.
pub fn key_to_action(key: KeyEvent, page: usize) -> Option<InputAction> {
    if key.kind == KeyEventKind::Release {
        return None;
    }
    let page = page.max(1);
    let shift = key.modifiers.contains(KeyModifiers::SHIFT);

    match key.code {
        KeyCode::Char(c) if key.modifiers.contains(KeyModifiers::CONTROL) => {
            control_char(c).map(|byte| InputAction::Send(vec![byte])).or_else(|| {
                matches!(c, 'q' | 'Q').then_some(InputAction::Quit)
            })
        }
        KeyCode::Char(c) => Some(InputAction::Send(c.to_string().into_bytes())),
        KeyCode::Enter => Some(InputAction::Send(vec![b'\n'])),
        KeyCode::Backspace => Some(InputAction::Send(vec![0x08])),
        KeyCode::Tab => Some(InputAction::Send(vec![b'\t'])),
        KeyCode::Up if shift => Some(InputAction::ScrollUp(1)),
        KeyCode::Down if shift => Some(InputAction::ScrollDown(1)),
        KeyCode::PageUp => Some(InputAction::ScrollUp(page)),
        KeyCode::PageDown => Some(InputAction::ScrollDown(page)),
        _ => None,
    }
}

/// Control code for Ctrl+`c`. Ctrl+Q is kept for quitting.
fn control_char(c: char) -> Option<u8> {
    match c.to_ascii_lowercase() {
        'q' => None,
        c @ 'a'..='z' => Some(c as u8 - b'a' + 1),
        '[' => Some(0x1B),
        '\\' => Some(0x1C),
        ']' => Some(0x1D),
        '^' => Some(0x1E),
        '_' => Some(0x1F),
        _ => None,
    }
}

fn mouse_to_action(mouse: &MouseEvent) -> Option<InputAction> {
    match mouse.kind {
        MouseEventKind::ScrollUp => Some(InputAction::ScrollUp(WHEEL_LINES)),
        MouseEventKind::ScrollDown => Some(InputAction::ScrollDown(WHEEL_LINES)),
        _ => None,
    }
}
