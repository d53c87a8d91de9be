//! Header widget for the TUI.
//!
//! Displays the application name, interaction state and the data target.

use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Modifier, Style},
    text::Span,
    widgets::Widget,
};

/// Header bar widget.
pub struct Header<'a> {
    target: &'a str,
    policy: &'a str,
    state: &'a str,
    busy: bool,
}

impl<'a> Header<'a> {
    pub fn new(target: &'a str, policy: &'a str, state: &'a str, busy: bool) -> Self {
        Self {
            target,
            policy,
            state,
            busy,
        }
    }

    fn state_text(&self) -> String {
        if self.busy {
            " Running... ".to_string()
        } else {
            format!(" {} ", self.state)
        }
    }
}

impl Widget for Header<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let style = Style::default()
            .bg(Color::Blue)
            .fg(Color::White)
            .add_modifier(Modifier::BOLD);

        for x in area.left()..area.right() {
            buf[(x, area.y)].set_style(style);
        }

        let left_text = format!(" Lookout v{}", env!("CARGO_PKG_VERSION"));
        let left_span = Span::styled(left_text, style);
        buf.set_span(area.x, area.y, &left_span, area.width);

        // Center: interaction state
        let state_text = self.state_text();
        let state_style = Style::default()
            .bg(Color::Blue)
            .fg(if self.busy { Color::Yellow } else { Color::Cyan })
            .add_modifier(Modifier::BOLD);
        let state_width = state_text.chars().count() as u16;
        let state_x = area.x + area.width.saturating_sub(state_width) / 2;
        buf.set_string(state_x, area.y, &state_text, state_style);

        // Right: data target and policy
        let right_text = format!(" [data: {}] [{}] ", self.target, self.policy);
        let right_width = right_text.chars().count() as u16;
        if state_x + state_width + right_width < area.right() {
            let right_x = area.right().saturating_sub(right_width);
            buf.set_string(right_x, area.y, &right_text, style);
        }
    }
}
