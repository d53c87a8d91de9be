//! Reference panel showing the configured schema diagram.
//!
//! Terminals cannot draw images, so text diagrams are shown inline and any
//! other file is shown by path for an external viewer.

use db_lookout::config::ReferenceConfig;
use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Widget, Wrap},
};
use std::path::Path;

/// Extensions shown inline.
const TEXT_EXTENSIONS: &[&str] = &["txt", "md", "mmd", "dot"];

/// Overlay with the reference diagram, caption and attribution.
pub struct ReferencePanel<'a> {
    config: &'a ReferenceConfig,
}

impl<'a> ReferencePanel<'a> {
    pub fn new(config: &'a ReferenceConfig) -> Self {
        Self { config }
    }

    /// Calculates the centered area for the panel.
    pub fn area(parent: Rect) -> Rect {
        let width = parent.width.saturating_sub(8).max(20).min(parent.width);
        let height = parent.height.saturating_sub(4).max(5).min(parent.height);
        let x = parent.x + (parent.width.saturating_sub(width)) / 2;
        let y = parent.y + (parent.height.saturating_sub(height)) / 2;
        Rect::new(x, y, width, height)
    }

    fn is_text(path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .map(|e| TEXT_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
            .unwrap_or(false)
    }

    fn content(&self) -> Vec<Line<'static>> {
        let dim = Style::default().fg(Color::DarkGray);
        let mut lines = vec![
            Line::from(Span::styled(
                self.config.caption.clone(),
                Style::default()
                    .fg(Color::Yellow)
                    .add_modifier(Modifier::BOLD),
            )),
            Line::from(""),
        ];

        match &self.config.diagram {
            None => lines.push(Line::from(Span::styled(
                "No diagram configured. Set [reference] diagram in the config file.",
                dim,
            ))),
            Some(path) if Self::is_text(path) => match std::fs::read_to_string(path) {
                Ok(text) => lines.extend(text.lines().map(|l| Line::from(l.to_string()))),
                Err(e) => lines.push(Line::from(Span::styled(
                    format!("Cannot read {}: {}", path.display(), e),
                    Style::default().fg(Color::Red),
                ))),
            },
            Some(path) => lines.push(Line::from(format!(
                "Diagram: {} (open in an image viewer)",
                path.display()
            ))),
        }

        if let Some(attribution) = &self.config.attribution {
            lines.push(Line::from(""));
            lines.push(Line::from(Span::styled(attribution.clone(), dim)));
        }
        lines
    }
}

impl Widget for ReferencePanel<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        Clear.render(area, buf);

        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Cyan))
            .title(" Reference (F2 to close) ");

        Paragraph::new(self.content())
            .block(block)
            .wrap(Wrap { trim: false })
            .render(area, buf);
    }
}
