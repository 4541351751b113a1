//! Line wrapping
//!
//! Splits logical lines into display lines no wider than the surface.
//! Widths count characters; the surface is assumed to be monospace.

/// Split one logical line into display lines of at most `width` characters.
///
/// A trailing line-feed does not count towards the width and stays on the
/// last chunk, so every chunk has at most `width + 1` characters and the
/// chunks concatenate back to `line`. A `width` of 0 is treated as 1.
pub fn wrap_line(line: &str, width: usize) -> Vec<&str> {
    let width = width.max(1);
    let body = line.strip_suffix('\n').unwrap_or(line);
    if body.chars().count() <= width {
        return vec![line];
    }

    let mut chunks = Vec::new();
    let mut start = 0;
    let mut count = 0;
    for (idx, _) in body.char_indices() {
        if count == width {
            chunks.push(&line[start..idx]);
            start = idx;
            count = 0;
        }
        count += 1;
    }
    chunks.push(&line[start..]);
    chunks
}

/// Wrap every logical line, in order
pub fn wrap_lines<S: AsRef<str>>(lines: &[S], width: usize) -> Vec<String> {
    lines
        .iter()
        .flat_map(|line| wrap_line(line.as_ref(), width))
        .map(str::to_owned)
        .collect()
}
