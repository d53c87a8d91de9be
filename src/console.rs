//! The query console: one gateway, one audit logger, many sessions.
//!
//! [`Console`] wires the pieces together and drives a [`Session`] through
//! the interaction cycle. It holds no per-user state; everything a user sees
//! lives in their `Session`.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::audit::AuditLogger;
use crate::config::Config;
use crate::db::{
    AuditProfile, ConnectionScope, Connector, DataProfile, MockEngine, PgConnector,
    PgConnectorOptions, Profile,
};
use crate::error::Result;
use crate::query::QueryGateway;
use crate::render::{DisplayTable, ExplorerHandle, JsonFileExplorer, ResultRenderer, VisualExplorer};
use crate::session::{Effect, Event, InteractionState, Notice, SessionStateMachine};

/// Per-user interaction state.
#[derive(Debug, Clone, Default)]
pub struct Session {
    state: InteractionState,
    input: String,
    explorer: Option<ExplorerHandle>,
    message: Option<String>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &InteractionState {
        &self.state
    }

    /// The query box contents, kept across submissions.
    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn set_input(&mut self, input: impl Into<String>) {
        self.input = input.into();
    }

    pub fn explorer(&self) -> Option<&ExplorerHandle> {
        self.explorer.as_ref()
    }

    /// A transient message, such as a refused visualize request.
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    fn apply(&mut self, machine: &SessionStateMachine, event: Event) -> Effect {
        let transition = machine.step(std::mem::take(&mut self.state), event);
        self.state = transition.state;
        transition.effect
    }

    /// What the UI should display for this session.
    pub fn view(&self, renderer: &ResultRenderer) -> SessionView {
        let mut notices = Vec::new();
        match self.state.notice() {
            Some(Notice::Validation(e)) => notices.push(e.to_string()),
            Some(Notice::Execution { error, audit }) => {
                notices.push(error.to_string());
                if let Err(e) = audit {
                    notices.push(format!("Failure was not recorded: {}", e));
                }
            }
            None => {}
        }
        if let Some(message) = &self.message {
            notices.push(message.clone());
        }

        SessionView {
            state: self.state.label(),
            query: self.state.query().map(|q| q.as_str().to_string()),
            table: self.state.result().map(|r| renderer.to_table(r)),
            notices,
            explorer: self.explorer.clone(),
        }
    }
}

/// Snapshot of a session for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionView {
    pub state: &'static str,
    pub query: Option<String>,
    pub table: Option<DisplayTable>,
    /// Errors first, then any transient message.
    pub notices: Vec<String>,
    pub explorer: Option<ExplorerHandle>,
}

/// Shared services for all sessions.
pub struct Console {
    gateway: QueryGateway,
    audit: AuditLogger,
    machine: SessionStateMachine,
    renderer: ResultRenderer,
    explorer: Arc<dyn VisualExplorer>,
}

impl Console {
    pub fn new(
        gateway: QueryGateway,
        audit: AuditLogger,
        machine: SessionStateMachine,
        renderer: ResultRenderer,
        explorer: Arc<dyn VisualExplorer>,
    ) -> Self {
        Self {
            gateway,
            audit,
            machine,
            renderer,
            explorer,
        }
    }

    /// Builds a console from one connector per profile.
    ///
    /// Fails if either connector is bound to the wrong profile.
    pub fn from_connectors(
        config: &Config,
        data: Arc<dyn Connector>,
        audit: Arc<dyn Connector>,
        explorer: Arc<dyn VisualExplorer>,
    ) -> Result<Self> {
        let data_scope = ConnectionScope::<DataProfile>::new(data)?;
        let audit_scope = ConnectionScope::<AuditProfile>::new(audit)?;

        Ok(Self::new(
            QueryGateway::from_config(data_scope, &config.console),
            AuditLogger::from_config(audit_scope, &config.audit),
            SessionStateMachine::new(config.console.statement_policy),
            ResultRenderer::new(),
            explorer,
        ))
    }

    /// Builds a console backed by PostgreSQL, one pool per profile.
    pub fn connect(config: &Config) -> Result<Self> {
        config.require_profiles()?;

        let data = PgConnector::new(
            Profile::Data,
            &config.profiles.data,
            PgConnectorOptions {
                statement_timeout: config.console.query_timeout(),
                read_only: config.console.statement_policy.is_read_only(),
            },
        )?;
        let audit = PgConnector::new(
            Profile::Audit,
            &config.profiles.audit,
            PgConnectorOptions {
                statement_timeout: config.audit.timeout(),
                read_only: false,
            },
        )?;

        info!(
            "Console ready ({} statement policy)",
            config.console.statement_policy
        );
        Self::from_connectors(
            config,
            Arc::new(data),
            Arc::new(audit),
            Arc::new(JsonFileExplorer::new(config.explorer.output_dir())),
        )
    }

    /// Builds a console backed by an in-memory engine.
    pub fn with_mock(config: &Config, engine: &MockEngine) -> Result<Self> {
        Self::from_connectors(
            config,
            engine.connector(Profile::Data),
            engine.connector(Profile::Audit),
            Arc::new(JsonFileExplorer::new(config.explorer.output_dir())),
        )
    }

    pub fn renderer(&self) -> &ResultRenderer {
        &self.renderer
    }

    pub fn audit_logger(&self) -> &AuditLogger {
        &self.audit
    }

    pub fn machine(&self) -> &SessionStateMachine {
        &self.machine
    }

    /// Submits `text` and runs it to completion.
    ///
    /// On failure the audit write finishes before the session returns to
    /// `Idle`, so the view always knows whether the failure was recorded.
    pub async fn submit(&self, session: &mut Session, text: impl Into<String>) {
        let text = text.into();
        session.input = text.clone();
        session.explorer = None;
        session.message = None;

        let query = match session.apply(&self.machine, Event::Submit(text)) {
            Effect::Execute(query) => query,
            Effect::Rejected(e) => {
                debug!("Submission rejected: {}", e);
                return;
            }
            _ => return,
        };

        let event = match self.gateway.execute(&query).await {
            Ok(result) => Event::ExecutionSucceeded(result),
            Err(error) => {
                let audit = self.audit.record(&query, &error.to_string()).await;
                Event::ExecutionFailed { error, audit }
            }
        };
        session.apply(&self.machine, event);
    }

    /// Opens the explorer on the result already held by the session.
    pub fn open_visualizer(&self, session: &mut Session) {
        session.message = None;

        match session.apply(&self.machine, Event::OpenVisualizer) {
            Effect::OpenExplorer(result) => {
                let payload = self.renderer.to_explorer_input(&result);
                match self.explorer.open(&payload) {
                    Ok(handle) => session.explorer = Some(handle),
                    Err(e) => {
                        warn!("Explorer failed to open: {}", e);
                        session.apply(&self.machine, Event::CloseVisualizer);
                        session.message = Some(e.to_string());
                    }
                }
            }
            Effect::Refused(reason) => session.message = Some(reason.to_string()),
            _ => {}
        }
    }

    pub fn close_visualizer(&self, session: &mut Session) {
        session.apply(&self.machine, Event::CloseVisualizer);
        session.explorer = None;
    }
}
