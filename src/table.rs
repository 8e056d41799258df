//! Terminal rendering of [`Row`]s.
//!
//! Columns are the union of row keys in first-seen order. Numeric cells are
//! right-aligned, everything else left-aligned; null and absent cells print
//! blank. Line breaks and tabs inside a cell become spaces so every row stays
//! on one line.

use std::fmt::Write as _;

use itertools::Itertools;

use crate::data::{Row, Value};

const COLUMN_GAP: &str = "  ";

fn cell_text(value: &Value) -> String {
    if value.is_null() {
        return String::new();
    }
    value
        .as_display()
        .chars()
        .map(|ch| if matches!(ch, '\n' | '\r' | '\t') { ' ' } else { ch })
        .collect()
}

fn pad(text: &str, width: usize, right_align: bool) -> String {
    let fill = " ".repeat(width.saturating_sub(text.chars().count()));
    if right_align {
        format!("{fill}{text}")
    } else {
        format!("{text}{fill}")
    }
}

fn write_line(output: &mut String, cells: impl Iterator<Item = String>) {
    let line = cells.collect::<Vec<_>>().join(COLUMN_GAP);
    let _ = writeln!(output, "{}", line.trim_end());
}

pub fn render_rows(rows: &[Row]) -> String {
    let headers = rows
        .iter()
        .flat_map(|row| row.columns())
        .unique()
        .collect::<Vec<_>>();
    let cells = rows
        .iter()
        .map(|row| {
            headers
                .iter()
                .map(|header| {
                    let value = row.value(header);
                    (cell_text(value), value.is_numeric())
                })
                .collect::<Vec<_>>()
        })
        .collect::<Vec<_>>();
    let widths = headers
        .iter()
        .enumerate()
        .map(|(idx, header)| {
            cells
                .iter()
                .map(|row| row[idx].0.chars().count())
                .fold(header.chars().count(), usize::max)
        })
        .collect::<Vec<_>>();

    let mut output = String::new();
    write_line(
        &mut output,
        headers
            .iter()
            .zip(&widths)
            .map(|(header, width)| pad(header, *width, false)),
    );
    write_line(&mut output, widths.iter().map(|width| "-".repeat(*width)));
    for row in &cells {
        write_line(
            &mut output,
            row.iter()
                .zip(&widths)
                .map(|((text, numeric), width)| pad(text, *width, *numeric)),
        );
    }
    output
}

pub fn print_rows(rows: &[Row]) {
    print!("{}", render_rows(rows));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_renders_header_lines_only() {
        assert_eq!(render_rows(&[]), "\n\n");
    }

    #[test]
    fn padding_counts_characters_not_bytes() {
        assert_eq!(pad("café", 6, false), "café  ");
        assert_eq!(pad("7", 3, true), "  7");
    }
}
