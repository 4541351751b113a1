//! Redraw and scrollback behaviour against a recording surface

use dumbterm_buffer::TextBuffer;
use dumbterm_test_utils::RecordingSurface;
use pretty_assertions::assert_eq;

fn numbered_lines(count: usize) -> Vec<u8> {
    (1..=count)
        .map(|n| format!("line {n}\n"))
        .collect::<String>()
        .into_bytes()
}

#[test]
fn test_frame_is_offset_window() {
    let mut buffer = TextBuffer::new(80);
    buffer.append(&numbered_lines(10));
    let mut surface = RecordingSurface::new(80, 3);

    buffer.redraw(&mut surface).unwrap();
    assert_eq!(
        surface.last_text().unwrap(),
        "line 1\nline 2\nline 3\n|"
    );

    for _ in 0..4 {
        assert!(buffer.scroll_down());
    }
    buffer.redraw(&mut surface).unwrap();
    assert_eq!(
        surface.last_frame().unwrap().lines,
        ["line 5\n", "line 6\n", "line 7\n"]
    );
}

#[test]
fn test_window_truncated_at_end() {
    let mut buffer = TextBuffer::new(80);
    buffer.append(&numbered_lines(4));
    for _ in 0..3 {
        buffer.scroll_down();
    }
    let mut surface = RecordingSurface::new(80, 10);
    buffer.redraw(&mut surface).unwrap();
    assert_eq!(surface.last_frame().unwrap().lines, ["line 4\n"]);
}

#[test]
fn test_resize_rewraps_lazily() {
    let mut buffer = TextBuffer::new(80);
    buffer.append(b"0123456789\n");
    assert_eq!(buffer.display_lines(), ["0123456789\n"]);

    let mut narrow = RecordingSurface::new(4, 10);
    buffer.redraw(&mut narrow).unwrap();
    assert_eq!(buffer.display_lines(), ["0123", "4567", "89\n"]);
    assert_eq!(narrow.last_text().unwrap(), "0123456789\n|");

    let mut wide = RecordingSurface::new(20, 10);
    buffer.redraw(&mut wide).unwrap();
    assert_eq!(buffer.display_lines(), ["0123456789\n"]);
}

#[test]
fn test_follow_tail_while_streaming() {
    let mut buffer = TextBuffer::new(80);
    let mut surface = RecordingSurface::new(80, 2);

    for n in 1..=5 {
        let following = buffer.is_at_end(surface.rows);
        buffer.append(format!("out {n}\n").as_bytes());
        if following {
            buffer.scroll_to_end(surface.rows);
        }
        buffer.redraw(&mut surface).unwrap();
    }
    assert_eq!(
        surface.last_frame().unwrap().lines,
        ["out 4\n", "out 5\n"]
    );
}

#[test]
fn test_scrolled_back_view_stays_put() {
    let mut buffer = TextBuffer::new(80);
    buffer.append(&numbered_lines(6));
    buffer.scroll_to_end(2);
    assert!(buffer.scroll_up());
    assert!(buffer.scroll_up());
    let offset = buffer.scroll_offset();

    assert!(!buffer.is_at_end(2));
    buffer.append(b"more\n");
    assert_eq!(buffer.scroll_offset(), offset);
}
