//! Terminal-width-aware tables.
//!
//! Columns are as wide as their widest cell. When the table does not fit,
//! columns named in the truncation priority shrink in that order, each no
//! narrower than `max(5, header width)`. Widths are measured in chars.

use std::io::{self, Write};

/// Spaces between adjacent columns. The last column has no trailing gap.
pub const COLUMN_GAP: usize = 2;

/// Narrowest a truncated column may become (unless its header is wider).
pub const MIN_TRUNCATED_WIDTH: usize = 5;

const ELLIPSIS: &str = "...";

#[derive(Debug, Clone, Default)]
pub struct Table {
    headers: Vec<String>,
    widths: Vec<usize>,
    rows: Vec<Vec<String>>,
    truncation_priority: Vec<usize>,
}

impl Table {
    pub fn new<I, S>(headers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let headers: Vec<String> = headers.into_iter().map(Into::into).collect();
        let widths = headers.iter().map(|h| display_width(h)).collect();
        Self {
            headers,
            widths,
            rows: Vec::new(),
            truncation_priority: Vec::new(),
        }
    }

    /// Column indices in the order they give up width. Unlisted columns are
    /// never truncated; out-of-range indices are ignored.
    pub fn with_truncation_priority(mut self, order: impl IntoIterator<Item = usize>) -> Self {
        self.truncation_priority = order.into_iter().collect();
        self
    }

    /// Add a row. Short rows are padded with empty cells; extra cells are
    /// dropped so every row has exactly one cell per header.
    pub fn add_row<I, S>(&mut self, cells: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut cells = cells.into_iter().map(Into::into);
        let row: Vec<String> = (0..self.headers.len())
            .map(|_| cells.next().unwrap_or_default())
            .collect();
        for (width, cell) in self.widths.iter_mut().zip(&row) {
            *width = (*width).max(display_width(cell));
        }
        self.rows.push(row);
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Natural column widths shrunk to fit `term_width` where possible.
    pub fn column_widths(&self, term_width: usize) -> Vec<usize> {
        let mut widths = self.widths.clone();
        let columns = widths.len();
        if columns == 0 {
            return widths;
        }
        let gaps = COLUMN_GAP * (columns - 1);
        let total = |widths: &[usize]| widths.iter().sum::<usize>() + gaps;

        for &col in &self.truncation_priority {
            let excess = total(&widths).saturating_sub(term_width);
            if excess == 0 {
                break;
            }
            if col >= columns {
                continue;
            }
            let min = display_width(&self.headers[col]).max(MIN_TRUNCATED_WIDTH);
            let shrinkable = widths[col].saturating_sub(min);
            widths[col] -= excess.min(shrinkable);
        }

        widths
    }

    /// Write the header line and all rows.
    pub fn render<W: Write>(&self, out: &mut W, term_width: usize) -> io::Result<()> {
        let widths = self.column_widths(term_width);
        self.render_line(out, &self.headers, &widths)?;
        for row in &self.rows {
            self.render_line(out, row, &widths)?;
        }
        Ok(())
    }

    fn render_line<W: Write>(
        &self,
        out: &mut W,
        cells: &[String],
        widths: &[usize],
    ) -> io::Result<()> {
        let last = widths.len().saturating_sub(1);
        for (i, (cell, &width)) in cells.iter().zip(widths).enumerate() {
            let cell = truncate_cell(cell, width);
            if i < last {
                write!(out, "{:<pad$}", cell, pad = width + COLUMN_GAP)?;
            } else {
                write!(out, "{cell}")?;
            }
        }
        writeln!(out)
    }
}

/// Fit `s` into `max` chars, ending with `...` when cut. At `max <= 3` the
/// cut is hard, without an ellipsis.
pub fn truncate_cell(s: &str, max: usize) -> String {
    if display_width(s) <= max {
        return s.to_string();
    }
    if max <= ELLIPSIS.len() {
        return s.chars().take(max).collect();
    }
    let mut cut: String = s.chars().take(max - ELLIPSIS.len()).collect();
    cut.push_str(ELLIPSIS);
    cut
}

fn display_width(s: &str) -> usize {
    s.chars().count()
}
