//! UI rendering for the TUI.
//!
//! Layout, top to bottom: header, query editor, result pane, notices.

use super::app::{App, Overlay};
use super::widgets::{editor, header, help, reference, table};
use db_lookout::config::ReferenceConfig;
use db_lookout::console::SessionView;
use db_lookout::render::ResultRenderer;
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Wrap},
    Frame,
};

/// Renders the entire UI.
pub fn render(frame: &mut Frame, app: &App, renderer: &ResultRenderer, reference: &ReferenceConfig) {
    let area = frame.area();
    let view = app.session.view(renderer);

    let main_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1), // Header
            Constraint::Length(8), // Editor
            Constraint::Min(5),    // Results
            Constraint::Length(4), // Notices
        ])
        .split(area);

    render_header(frame, main_layout[0], app, &view);
    render_editor(frame, main_layout[1], app);
    render_results(frame, main_layout[2], app, &view);
    render_notices(frame, main_layout[3], &view);

    match app.overlay {
        Overlay::Help => frame.render_widget(help::HelpOverlay::new(), help::HelpOverlay::area(area)),
        Overlay::Reference => frame.render_widget(
            reference::ReferencePanel::new(reference),
            reference::ReferencePanel::area(area),
        ),
        Overlay::None => {}
    }
}

fn render_header(frame: &mut Frame, area: Rect, app: &App, view: &SessionView) {
    let widget = header::Header::new(&app.target, &app.policy, view.state, app.busy);
    frame.render_widget(widget, area);
}

fn render_editor(frame: &mut Frame, area: Rect, app: &App) {
    let widget = editor::QueryEditor::new(&app.editor.text, app.editor.position());
    let cursor = widget.cursor_position(area);
    frame.render_widget(widget, area);

    if app.overlay == Overlay::None {
        frame.set_cursor_position(cursor);
    }
}

fn render_results(frame: &mut Frame, area: Rect, app: &App, view: &SessionView) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray))
        .title(" Result ");
    let inner = block.inner(area);
    frame.render_widget(block, area);

    match &view.table {
        Some(display) => {
            frame.render_widget(table::ResultTable::new(display, app.result_scroll), inner);
        }
        None => {
            let hint = if app.busy {
                "Running..."
            } else {
                "Type a query and press F5 to run it."
            };
            frame.render_widget(
                Paragraph::new(Span::styled(hint, Style::default().fg(Color::DarkGray))),
                inner,
            );
        }
    }
}

fn render_notices(frame: &mut Frame, area: Rect, view: &SessionView) {
    let mut lines: Vec<Line> = view
        .notices
        .iter()
        .map(|n| Line::from(Span::styled(n.clone(), Style::default().fg(Color::Red))))
        .collect();

    if let Some(handle) = &view.explorer {
        lines.push(Line::from(Span::styled(
            format!(
                "Explorer opened: {} ({} fields, {} records). Esc to close.",
                handle.location.display(),
                handle.field_count,
                handle.record_count
            ),
            Style::default().fg(Color::Green),
        )));
    }

    let block = Block::default()
        .borders(Borders::TOP)
        .border_style(Style::default().fg(Color::DarkGray));
    frame.render_widget(
        Paragraph::new(lines).block(block).wrap(Wrap { trim: true }),
        area,
    );
}
