//! Terminal User Interface for Lookout.
//!
//! Provides the main TUI loop using ratatui and crossterm. Each console
//! operation is awaited before the next key is read, so a session never has
//! more than one query in flight.

pub mod app;
mod events;
mod ui;
pub mod widgets;

pub use app::App;
pub use events::{Event, EventHandler};

use app::Action;
use crossterm::{
    event::{DisableMouseCapture, EnableMouseCapture},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use db_lookout::config::ReferenceConfig;
use db_lookout::console::Console;
use db_lookout::error::{LookoutError, Result};
use ratatui::{backend::CrosstermBackend, Terminal};
use std::io::{self, Stdout};
use std::panic;
use tracing::{debug, info};

/// The main TUI application runner.
pub struct Tui {
    terminal: Terminal<CrosstermBackend<Stdout>>,
    event_handler: EventHandler,
}

impl Tui {
    /// Creates a new TUI instance, initializing the terminal.
    pub fn new() -> Result<Self> {
        let terminal = Self::setup_terminal()?;
        Ok(Self {
            terminal,
            event_handler: EventHandler::new(),
        })
    }

    fn setup_terminal() -> Result<Terminal<CrosstermBackend<Stdout>>> {
        enable_raw_mode()
            .map_err(|e| LookoutError::internal(format!("Failed to enable raw mode: {e}")))?;

        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen, EnableMouseCapture).map_err(|e| {
            LookoutError::internal(format!("Failed to enter alternate screen: {e}"))
        })?;

        Terminal::new(CrosstermBackend::new(stdout))
            .map_err(|e| LookoutError::internal(format!("Failed to create terminal: {e}")))
    }

    fn restore_terminal(&mut self) -> Result<()> {
        disable_raw_mode()
            .map_err(|e| LookoutError::internal(format!("Failed to disable raw mode: {e}")))?;

        execute!(
            self.terminal.backend_mut(),
            LeaveAlternateScreen,
            DisableMouseCapture
        )
        .map_err(|e| LookoutError::internal(format!("Failed to leave alternate screen: {e}")))?;

        self.terminal
            .show_cursor()
            .map_err(|e| LookoutError::internal(format!("Failed to show cursor: {e}")))?;

        Ok(())
    }

    fn draw(&mut self, app: &App, console: &Console, reference: &ReferenceConfig) -> Result<()> {
        self.terminal
            .draw(|frame| ui::render(frame, app, console.renderer(), reference))
            .map_err(|e| LookoutError::internal(format!("Failed to draw: {e}")))?;
        Ok(())
    }

    /// Runs the event loop until the user quits.
    pub async fn run(
        &mut self,
        console: &Console,
        mut app: App,
        reference: &ReferenceConfig,
    ) -> Result<()> {
        // Restore the terminal even if something panics
        let original_hook = panic::take_hook();
        panic::set_hook(Box::new(move |panic_info| {
            let _ = disable_raw_mode();
            let _ = execute!(io::stdout(), LeaveAlternateScreen, DisableMouseCapture);
            original_hook(panic_info);
        }));

        while app.running {
            self.draw(&app, console, reference)?;

            let key = match self.event_handler.next_async().await? {
                Event::Key(key) => key,
                Event::Resize(_, _) | Event::Tick => continue,
            };

            match app.handle_key(key) {
                Action::Submit(text) => {
                    app.busy = true;
                    self.draw(&app, console, reference)?;
                    console.submit(&mut app.session, text).await;
                    app.busy = false;
                    debug!("Session is now {}", app.session.state());
                }
                Action::OpenVisualizer => console.open_visualizer(&mut app.session),
                Action::CloseVisualizer => console.close_visualizer(&mut app.session),
                Action::Quit => info!("Quit requested"),
                Action::None => {}
            }
        }

        let _ = panic::take_hook();
        Ok(())
    }
}

impl Drop for Tui {
    fn drop(&mut self) {
        let _ = self.restore_terminal();
    }
}

/// Runs the TUI against `console` until the user quits.
pub async fn run(console: &Console, app: App, reference: &ReferenceConfig) -> Result<()> {
    let mut tui = Tui::new()?;
    tui.run(console, app, reference).await
}
