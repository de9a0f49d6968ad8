use font8x8::legacy::BASIC_LEGACY;

use crate::display::{Frame, MATRIX_SIZE, Rgb};

/// Row bitmaps of `c`, least significant bit leftmost. Characters outside
/// ASCII render as `?`.
pub fn glyph(c: char) -> [u8; 8] {
    let index = if c.is_ascii() { c as usize } else { '?' as usize };
    BASIC_LEGACY[index]
}

pub fn render_glyph(c: char, foreground: Rgb, background: Rgb) -> Frame {
    let rows = glyph(c);
    let mut frame = [background; MATRIX_SIZE * MATRIX_SIZE];

    for (y, row) in rows.iter().enumerate() {
        for x in 0..MATRIX_SIZE {
            if row & (1 << x) != 0 {
                frame[y * MATRIX_SIZE + x] = foreground;
            }
        }
    }

    frame
}

/// One bitmask per column (bit `y` lit = row `y`), padded with a blank
/// screen on both sides so the text scrolls in and out.
pub fn text_columns(text: &str) -> Vec<u8> {
    let mut columns = vec![0u8; MATRIX_SIZE];

    for c in text.chars() {
        let rows = glyph(c);
        for x in 0..MATRIX_SIZE {
            let column = rows
                .iter()
                .enumerate()
                .filter(|(_, row)| *row & (1 << x) != 0)
                .fold(0u8, |acc, (y, _)| acc | (1 << y));
            columns.push(column);
        }
    }

    columns.extend([0u8; MATRIX_SIZE]);
    columns
}

/// Frames of `text` scrolling right to left, one column per frame.
pub fn scroll_frames(text: &str, foreground: Rgb, background: Rgb) -> Vec<Frame> {
    let columns = text_columns(text);

    columns
        .windows(MATRIX_SIZE)
        .map(|window| {
            let mut frame = [background; MATRIX_SIZE * MATRIX_SIZE];
            for (x, column) in window.iter().enumerate() {
                for y in 0..MATRIX_SIZE {
                    if column & (1 << y) != 0 {
                        frame[y * MATRIX_SIZE + x] = foreground;
                    }
                }
            }
            frame
        })
        .collect()
}
