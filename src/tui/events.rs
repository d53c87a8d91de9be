//! Event handling for the TUI.
//!
//! Processes keyboard and terminal events using crossterm.

use crossterm::event::{self, Event as CrosstermEvent, KeyEvent, KeyEventKind};
use db_lookout::error::{LookoutError, Result};
use std::time::Duration;

/// Application events.
#[derive(Debug)]
pub enum Event {
    /// A key was pressed.
    Key(KeyEvent),
    /// The terminal was resized.
    Resize(u16, u16),
    /// Nothing happened within the tick rate.
    Tick,
}

/// Polls terminal events. Cheap to copy into a blocking task.
#[derive(Debug, Clone, Copy)]
pub struct EventHandler {
    tick_rate: Duration,
}

impl EventHandler {
    /// Creates a new event handler with default tick rate.
    pub fn new() -> Self {
        Self {
            tick_rate: Duration::from_millis(100),
        }
    }

    /// Polls for the next event, waiting at most one tick.
    pub fn next(&self) -> Result<Event> {
        if !event::poll(self.tick_rate)
            .map_err(|e| LookoutError::internal(format!("Failed to poll events: {e}")))?
        {
            return Ok(Event::Tick);
        }

        let event = event::read()
            .map_err(|e| LookoutError::internal(format!("Failed to read event: {e}")))?;

        Ok(match event {
            // Windows reports releases too
            CrosstermEvent::Key(key) if key.kind == KeyEventKind::Press => Event::Key(key),
            CrosstermEvent::Resize(width, height) => Event::Resize(width, height),
            _ => Event::Tick,
        })
    }

    /// Polls on the blocking thread pool so the runtime stays responsive.
    pub async fn next_async(&self) -> Result<Event> {
        let handler = *self;
        tokio::task::spawn_blocking(move || handler.next())
            .await
            .map_err(|e| LookoutError::internal(format!("Event task failed: {e}")))?
    }
}

impl Default for EventHandler {
    fn default() -> Self {
        Self::new()
    }
}
