//! Help overlay widget for the TUI.
//!
//! Displays keyboard shortcuts.

use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Widget},
};

/// Help overlay widget showing keyboard shortcuts.
pub struct HelpOverlay;

impl HelpOverlay {
    pub fn new() -> Self {
        Self
    }

    /// Calculates the centered area for the help overlay.
    pub fn area(parent: Rect) -> Rect {
        let width = 50.min(parent.width.saturating_sub(4));
        let height = 20.min(parent.height.saturating_sub(4));
        let x = parent.x + (parent.width.saturating_sub(width)) / 2;
        let y = parent.y + (parent.height.saturating_sub(height)) / 2;
        Rect::new(x, y, width, height)
    }

    fn content() -> Vec<Line<'static>> {
        let key_style = Style::default()
            .fg(Color::Cyan)
            .add_modifier(Modifier::BOLD);
        let desc_style = Style::default().fg(Color::White);
        let section_style = Style::default()
            .fg(Color::Yellow)
            .add_modifier(Modifier::BOLD);

        vec![
            Line::from(Span::styled("Query", section_style)),
            Self::shortcut_line("F5 / Ctrl+R", "Run the query", key_style, desc_style),
            Self::shortcut_line("Enter", "New line", key_style, desc_style),
            Self::shortcut_line("Ctrl+U", "Clear the editor", key_style, desc_style),
            Line::from(""),
            Line::from(Span::styled("Results", section_style)),
            Self::shortcut_line("PgUp/PgDn", "Scroll rows", key_style, desc_style),
            Self::shortcut_line("F6 / Ctrl+V", "Open the visual explorer", key_style, desc_style),
            Self::shortcut_line("Esc", "Close the explorer", key_style, desc_style),
            Line::from(""),
            Line::from(Span::styled("General", section_style)),
            Self::shortcut_line("F1", "Toggle this help", key_style, desc_style),
            Self::shortcut_line("F2", "Toggle the reference diagram", key_style, desc_style),
            Self::shortcut_line("Ctrl+C/Q", "Quit", key_style, desc_style),
        ]
    }

    fn shortcut_line(
        key: &'static str,
        desc: &'static str,
        key_style: Style,
        desc_style: Style,
    ) -> Line<'static> {
        Line::from(vec![
            Span::raw("  "),
            Span::styled(format!("{:14}", key), key_style),
            Span::styled(desc, desc_style),
        ])
    }
}

impl Default for HelpOverlay {
    fn default() -> Self {
        Self::new()
    }
}

impl Widget for HelpOverlay {
    fn render(self, area: Rect, buf: &mut Buffer) {
        Clear.render(area, buf);

        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Cyan))
            .title(" Help (F1 to close) ")
            .title_style(
                Style::default()
                    .fg(Color::Cyan)
                    .add_modifier(Modifier::BOLD),
            );

        Paragraph::new(Self::content()).block(block).render(area, buf);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_help_area() {
        let parent = Rect::new(0, 0, 100, 50);
        let area = HelpOverlay::area(parent);
        assert!(area.width <= 50);
        assert!(area.height <= 20);
        assert!(area.x > 0);
        assert!(area.y > 0);
    }

    #[test]
    fn test_help_lists_run_key() {
        let content = HelpOverlay::content();
        assert!(content.iter().any(|l| l.to_string().contains("F5 / Ctrl+R")));
    }
}
