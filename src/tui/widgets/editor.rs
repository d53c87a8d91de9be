//! Query editor widget.
//!
//! A bordered multi-line text area that scrolls to keep the cursor visible.

use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Style},
    text::Line,
    widgets::{Block, Borders, Paragraph, Widget},
};

/// Calculates the scroll offset needed to keep `cursor` within `visible`
/// slots. Works for both lines and columns.
pub fn calculate_scroll_offset(cursor: usize, visible: usize) -> usize {
    if visible == 0 {
        cursor
    } else if cursor < visible {
        0
    } else {
        cursor + 1 - visible
    }
}

/// Multi-line query editor.
pub struct QueryEditor<'a> {
    text: &'a str,
    /// Cursor as (line, column).
    cursor: (usize, usize),
}

impl<'a> QueryEditor<'a> {
    pub fn new(text: &'a str, cursor: (usize, usize)) -> Self {
        Self { text, cursor }
    }

    /// Screen position of the cursor inside `area`.
    pub fn cursor_position(&self, area: Rect) -> (u16, u16) {
        let inner_width = area.width.saturating_sub(2) as usize;
        let inner_height = area.height.saturating_sub(2) as usize;
        let (line, col) = self.cursor;
        let row = line - calculate_scroll_offset(line, inner_height);
        let column = col - calculate_scroll_offset(col, inner_width);
        (area.x + 1 + column as u16, area.y + 1 + row as u16)
    }
}

impl Widget for QueryEditor<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Cyan))
            .title(" Query (F5 run, F6 explore, F1 help) ");

        let inner_width = area.width.saturating_sub(2) as usize;
        let inner_height = area.height.saturating_sub(2) as usize;
        let (line, col) = self.cursor;
        let row_offset = calculate_scroll_offset(line, inner_height);
        let col_offset = calculate_scroll_offset(col, inner_width);

        let lines: Vec<Line> = self
            .text
            .split('\n')
            .skip(row_offset)
            .take(inner_height.max(1))
            .map(|l| Line::from(l.chars().skip(col_offset).collect::<String>()))
            .collect();

        Paragraph::new(lines).block(block).render(area, buf);
    }
}
