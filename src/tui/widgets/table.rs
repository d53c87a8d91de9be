//! Result table widget for the TUI.
//!
//! Draws a [`DisplayTable`] with box borders, styled NULLs and a scrollable
//! body. Layout decisions (widths, footer) come from the renderer; this
//! widget only squeezes columns when the pane is narrower than the table.

use db_lookout::render::{truncate, DisplayCell, DisplayTable, MIN_COLUMN_WIDTH};
use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::Widget,
};

/// Widget for rendering a result table.
pub struct ResultTable<'a> {
    table: &'a DisplayTable,
    /// First body row drawn.
    scroll: usize,
}

impl<'a> ResultTable<'a> {
    pub fn new(table: &'a DisplayTable, scroll: usize) -> Self {
        Self { table, scroll }
    }

    /// Scales column widths down to fit `available_width`.
    fn fit_widths(&self, available_width: usize) -> Vec<usize> {
        let widths = &self.table.widths;
        // Borders and padding
        let total: usize = widths.iter().sum::<usize>() + widths.len() * 3 + 1;
        let scale = if total > available_width && available_width > 0 {
            available_width as f64 / total as f64
        } else {
            1.0
        };
        widths
            .iter()
            .map(|&w| ((w as f64 * scale) as usize).max(MIN_COLUMN_WIDTH))
            .collect()
    }

    /// Renders the table into lines, showing at most `body_rows` data rows.
    pub fn render_to_lines(&self, available_width: usize, body_rows: usize) -> Vec<Line<'a>> {
        let dim = Style::default().fg(Color::DarkGray);

        if self.table.is_empty() {
            return vec![
                Line::from(Span::styled("(empty result)", dim)),
                Line::from(Span::styled(self.table.footer.clone(), dim)),
            ];
        }

        let widths = self.fit_widths(available_width);
        let mut lines = vec![
            border(&widths, '┌', '┬', '┐'),
            self.header_row(&widths),
            border(&widths, '├', '┼', '┤'),
        ];

        let start = self.scroll.min(self.table.rows.len().saturating_sub(1));
        for row in self.table.rows.iter().skip(start).take(body_rows) {
            lines.push(data_row(row, &widths));
        }
        lines.push(border(&widths, '└', '┴', '┘'));

        let shown_to = (start + body_rows).min(self.table.rows.len());
        let position = if self.table.rows.len() > body_rows {
            format!("  rows {}-{} (PgUp/PgDn)", start + 1, shown_to)
        } else {
            String::new()
        };
        lines.push(Line::from(Span::styled(
            format!("{}{}", self.table.footer, position),
            dim,
        )));
        if let Some(warning) = &self.table.warning {
            lines.push(Line::from(Span::styled(
                warning.clone(),
                Style::default().fg(Color::Yellow),
            )));
        }

        lines
    }

    fn header_row(&self, widths: &[usize]) -> Line<'a> {
        let mut spans = vec![Span::styled("│", Style::default().fg(Color::DarkGray))];
        for (name, &width) in self.table.headers.iter().zip(widths) {
            spans.push(Span::styled(
                format!(" {:width$} ", truncate(name, width), width = width),
                Style::default()
                    .fg(Color::Cyan)
                    .add_modifier(Modifier::BOLD),
            ));
            spans.push(Span::styled("│", Style::default().fg(Color::DarkGray)));
        }
        Line::from(spans)
    }
}

fn border<'a>(widths: &[usize], left: char, mid: char, right: char) -> Line<'a> {
    let segments: Vec<String> = widths.iter().map(|w| "─".repeat(w + 2)).collect();
    Line::from(Span::styled(
        format!("{}{}{}", left, segments.join(&mid.to_string()), right),
        Style::default().fg(Color::DarkGray),
    ))
}

fn data_row<'a>(row: &[DisplayCell], widths: &[usize]) -> Line<'a> {
    let mut spans = vec![Span::styled("│", Style::default().fg(Color::DarkGray))];
    for (cell, &width) in row.iter().zip(widths) {
        let style = if cell.is_null {
            Style::default()
                .fg(Color::DarkGray)
                .add_modifier(Modifier::ITALIC)
        } else {
            Style::default()
        };
        spans.push(Span::styled(
            format!(" {:width$} ", truncate(&cell.text, width), width = width),
            style,
        ));
        spans.push(Span::styled("│", Style::default().fg(Color::DarkGray)));
    }
    Line::from(spans)
}

impl Widget for ResultTable<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        // Borders, header and footer take six lines
        let body_rows = (area.height as usize).saturating_sub(6).max(1);
        let lines = self.render_to_lines(area.width as usize, body_rows);

        for (i, line) in lines.iter().enumerate() {
            if i >= area.height as usize {
                break;
            }
            let y = area.y + i as u16;
            buf.set_line(area.x, y, line, area.width);
        }
    }
}
