//! End-to-end tests of the interaction cycle against the in-memory engine.

use db_lookout::audit::AuditLogger;
use db_lookout::config::Config;
use db_lookout::console::{Console, Session};
use db_lookout::db::{
    AuditProfile, ColumnInfo, ConnectionScope, DataProfile, MockEngine, MockOp,
    Profile, TabularResult, Value,
};
use db_lookout::error::{EngineError, LookoutError, Result};
use db_lookout::query::QueryGateway;
use db_lookout::render::{ExplorerHandle, ExplorerPayload, ResultRenderer, VisualExplorer};
use db_lookout::safety::StatementPolicy;
use db_lookout::session::{InteractionState, Notice, SessionStateMachine};
use pretty_assertions::assert_eq;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_test::{assert_err, assert_ok};

#[derive(Default)]
struct CapturingExplorer {
    payloads: Mutex<Vec<ExplorerPayload>>,
}

impl CapturingExplorer {
    fn payloads(&self) -> Vec<ExplorerPayload> {
        self.payloads.lock().unwrap().clone()
    }
}

impl VisualExplorer for CapturingExplorer {
    fn open(&self, payload: &ExplorerPayload) -> Result<ExplorerHandle> {
        let mut payloads = self.payloads.lock().unwrap();
        payloads.push(payload.clone());
        Ok(ExplorerHandle {
            location: format!("capture://{}", payloads.len()).into(),
            field_count: payload.fields.len(),
            record_count: payload.records.len(),
        })
    }
}

struct Harness {
    engine: MockEngine,
    explorer: Arc<CapturingExplorer>,
    console: Console,
}

impl Harness {
    fn new() -> Self {
        Self::with_config(&Config::default())
    }

    fn with_config(config: &Config) -> Self {
        let engine = MockEngine::new();
        let explorer = Arc::new(CapturingExplorer::default());
        let console = Console::from_connectors(
            config,
            engine.connector(Profile::Data),
            engine.connector(Profile::Audit),
            Arc::clone(&explorer) as Arc<dyn VisualExplorer>,
        )
        .unwrap();
        Self {
            engine,
            explorer,
            console,
        }
    }

    fn profiles_for(&self, op: MockOp) -> Vec<Profile> {
        self.engine
            .calls()
            .into_iter()
            .filter(|c| c.op == op)
            .map(|c| c.profile)
            .collect()
    }
}

#[tokio::test]
async fn test_successful_select_shows_result() {
    let h = Harness::new();
    let mut session = Session::new();

    h.console.submit(&mut session, "SELECT 1 AS x").await;

    assert_eq!(session.state().label(), "ResultShown");
    let result = session.state().result().unwrap();
    assert_eq!(result.columns(), &[ColumnInfo::new("x", "INT4")]);
    assert_eq!(result.rows(), &[vec![Value::Int(1)]]);
    assert!(h.engine.committed().is_empty());

    let view = session.view(h.console.renderer());
    assert!(view.notices.is_empty());
    assert_eq!(view.table.unwrap().headers, vec!["x".to_string()]);
}

#[tokio::test]
async fn test_empty_submission_opens_no_connection() {
    let h = Harness::new();
    let mut session = Session::new();

    for text in ["", "   ", "\n\t  \n"] {
        h.console.submit(&mut session, text).await;

        assert!(session.state().is_idle());
        assert!(matches!(
            session.state().notice(),
            Some(Notice::Validation(_))
        ));
    }

    assert!(h.engine.calls().is_empty());
    assert_eq!(h.engine.acquired(), 0);
    let view = session.view(h.console.renderer());
    assert_eq!(view.notices, vec!["The SQL query is empty".to_string()]);
}

#[tokio::test]
async fn test_malformed_query_is_recorded() {
    let h = Harness::new();
    let mut session = Session::new();

    h.console.submit(&mut session, "SELEKT 1").await;

    assert!(session.state().is_idle());
    assert_eq!(session.input(), "SELEKT 1");

    let Some(Notice::Execution { error, audit }) = session.state().notice() else {
        panic!("expected an execution notice, got {:?}", session.state());
    };
    assert_eq!(error.kind.to_string(), "Syntax");
    assert_ok!(audit);

    let committed = h.engine.committed();
    assert_eq!(committed.len(), 1);
    assert_eq!(committed[0].profile, Profile::Audit);
    assert_eq!(
        committed[0].params,
        vec!["SELEKT 1".to_string(), error.to_string()]
    );
}

#[tokio::test]
async fn test_visualize_reuses_result() {
    let h = Harness::new();
    let mut session = Session::new();

    h.console.submit(&mut session, "SELECT 1 AS x").await;
    let shown = Arc::clone(session.state().result().unwrap());
    h.console.open_visualizer(&mut session);

    assert_eq!(session.state().label(), "VisualizerOpen");
    assert_eq!(h.engine.fetch_count(), 1);
    assert!(Arc::ptr_eq(&shown, session.state().result().unwrap()));

    let payloads = h.explorer.payloads();
    assert_eq!(payloads.len(), 1);
    assert_eq!(
        payloads[0],
        ResultRenderer::new().to_explorer_input(&shown)
    );
    assert_eq!(payloads[0].field_names(), vec!["x"]);
    assert_eq!(payloads[0].records[0]["x"], serde_json::json!(1));

    // Opening twice still does not re-execute
    h.console.open_visualizer(&mut session);
    assert_eq!(h.engine.fetch_count(), 1);
}

#[tokio::test]
async fn test_new_submission_clears_previous_failure() {
    let h = Harness::new();
    let mut session = Session::new();

    h.console.submit(&mut session, "SELEKT 1").await;
    assert!(session.state().notice().is_some());

    h.console.submit(&mut session, "SELECT 1").await;

    assert_eq!(session.state().label(), "ResultShown");
    assert!(session.state().notice().is_none());
    assert!(session.view(h.console.renderer()).notices.is_empty());
    // The audit record outlives the session view
    assert_eq!(h.engine.committed().len(), 1);
}

#[tokio::test]
async fn test_new_submission_discards_previous_result() {
    let h = Harness::new();
    let mut session = Session::new();

    h.console.submit(&mut session, "SELECT 1 AS x").await;
    h.console.open_visualizer(&mut session);
    h.console.submit(&mut session, "SELECT * FROM missing").await;

    assert!(session.state().is_idle());
    assert!(session.state().result().is_none());
    assert!(session.explorer().is_none());
    let view = session.view(h.console.renderer());
    assert!(view.table.is_none());
    assert_eq!(
        view.notices,
        vec!["Syntax error: relation \"missing\" does not exist".to_string()]
    );
}

#[tokio::test]
async fn test_profiles_never_interchanged() {
    let h = Harness::new();
    let mut session = Session::new();

    h.console.submit(&mut session, "SELECT 1 AS x").await;
    h.console.submit(&mut session, "SELEKT 1").await;
    h.console.submit(&mut session, "SELECT 'a' AS y").await;
    h.console.submit(&mut session, "SELECT * FROM t").await;

    assert_eq!(h.profiles_for(MockOp::Fetch), vec![Profile::Data; 4]);
    assert_eq!(h.profiles_for(MockOp::ExecuteAtomic), vec![Profile::Audit; 2]);
    assert_eq!(
        h.profiles_for(MockOp::Connect),
        vec![
            Profile::Data,
            Profile::Data,
            Profile::Audit,
            Profile::Data,
            Profile::Data,
            Profile::Audit,
        ]
    );
}

#[tokio::test]
async fn test_connections_released_on_every_path() {
    let h = Harness::new();
    let mut session = Session::new();

    h.console.submit(&mut session, "SELECT 1 AS x").await;
    h.console.submit(&mut session, "SELEKT 1").await;
    h.engine.fail_writes(EngineError::database("23502", "null value"));
    h.console.submit(&mut session, "SELEKT 2").await;

    assert_eq!(h.engine.acquired(), 5);
    assert_eq!(h.engine.released(), 5);
}

#[tokio::test]
async fn test_audit_failure_keeps_execution_error() {
    let h = Harness::new();
    h.engine.set_unreachable(Profile::Audit);
    let mut session = Session::new();

    h.console.submit(&mut session, "SELEKT 1").await;

    assert!(session.state().is_idle());
    let Some(Notice::Execution { error, audit }) = session.state().notice() else {
        panic!("expected an execution notice");
    };
    let log_error = assert_err!(audit);
    assert!(log_error.to_string().starts_with("Audit store unreachable"));

    let view = session.view(h.console.renderer());
    assert_eq!(view.notices.len(), 2);
    assert_eq!(view.notices[0], error.to_string());
    assert!(view.notices[1].starts_with("Failure was not recorded: Audit store unreachable"));

    // The session still accepts new queries
    h.console.submit(&mut session, "SELECT 1 AS x").await;
    assert_eq!(session.state().label(), "ResultShown");
}

#[tokio::test]
async fn test_rolled_back_audit_write_is_reported() {
    let h = Harness::new();
    h.engine
        .fail_writes(EngineError::database("42501", "permission denied for table failed_queries"));
    let mut session = Session::new();

    h.console.submit(&mut session, "SELEKT 1").await;

    let view = session.view(h.console.renderer());
    assert_eq!(
        view.notices[1],
        "Failure was not recorded: Audit write failed: permission denied for table failed_queries"
    );
    assert!(h.engine.committed().is_empty());
}

#[tokio::test]
async fn test_permission_error_is_classified_and_recorded() {
    let h = Harness::new();
    h.engine.respond(
        "SELECT * FROM salaries",
        Err(EngineError::database(
            "42501",
            "permission denied for table salaries",
        )),
    );
    let mut session = Session::new();

    h.console.submit(&mut session, "SELECT * FROM salaries").await;

    let view = session.view(h.console.renderer());
    assert_eq!(
        view.notices,
        vec!["Permission error: permission denied for table salaries".to_string()]
    );
    assert_eq!(h.engine.committed()[0].params[0], "SELECT * FROM salaries");
}

#[tokio::test]
async fn test_unreachable_data_store_is_recorded() {
    let h = Harness::new();
    h.engine.set_unreachable(Profile::Data);
    let mut session = Session::new();

    h.console.submit(&mut session, "SELECT 1 AS x").await;

    let Some(Notice::Execution { error, audit }) = session.state().notice() else {
        panic!("expected an execution notice");
    };
    assert_eq!(error.kind.to_string(), "Connectivity");
    assert_ok!(audit);
    assert_eq!(h.engine.committed().len(), 1);
}

#[tokio::test]
async fn test_deadline_failure_is_recorded() {
    let engine = MockEngine::new();
    engine.set_latency(Duration::from_millis(300));
    let data = ConnectionScope::<DataProfile>::new(engine.connector(Profile::Data)).unwrap();
    let audit = ConnectionScope::<AuditProfile>::new(engine.connector(Profile::Audit)).unwrap();
    let console = Console::new(
        QueryGateway::new(data, Duration::from_millis(50), 100),
        AuditLogger::new(audit, "failed_queries", Duration::from_secs(5)),
        SessionStateMachine::new(StatementPolicy::Unrestricted),
        ResultRenderer::new(),
        Arc::new(CapturingExplorer::default()),
    );
    let mut session = Session::new();

    console.submit(&mut session, "SELECT 1 AS x").await;

    let view = session.view(console.renderer());
    assert_eq!(
        view.notices,
        vec!["Connectivity error: Query timed out after 50ms".to_string()]
    );
    assert_eq!(engine.committed().len(), 1);
    assert_eq!(engine.acquired(), engine.released());
}

#[tokio::test]
async fn test_read_only_policy_rejects_before_connecting() {
    let mut config = Config::default();
    config.console.statement_policy = StatementPolicy::ReadOnly;
    let h = Harness::with_config(&config);
    let mut session = Session::new();

    h.console.submit(&mut session, "DELETE FROM customer").await;

    assert!(session.state().is_idle());
    assert!(h.engine.calls().is_empty());
    assert_eq!(
        session.view(h.console.renderer()).notices,
        vec!["DELETE statements are not allowed: this console is read-only".to_string()]
    );

    // Unparseable text is still forwarded and recorded
    h.console.submit(&mut session, "SELEKT 1").await;
    assert_eq!(h.engine.fetch_count(), 1);
    assert_eq!(h.engine.committed().len(), 1);
}

#[tokio::test]
async fn test_visualize_before_any_result_is_refused() {
    let h = Harness::new();
    let mut session = Session::new();

    h.console.open_visualizer(&mut session);
    assert!(matches!(session.state(), InteractionState::Idle { .. }));
    assert!(h.explorer.payloads().is_empty());

    h.console.submit(&mut session, "SELEKT 1").await;
    h.console.open_visualizer(&mut session);
    assert!(session.state().is_idle());
    assert!(h.explorer.payloads().is_empty());
    assert_eq!(h.engine.fetch_count(), 1);
}

#[tokio::test]
async fn test_truncated_result_carries_warning() {
    let mut config = Config::default();
    config.console.max_rows = 2;
    let h = Harness::with_config(&config);
    h.engine.respond(
        "SELECT n FROM numbers",
        Ok(TabularResult::new(
            vec![ColumnInfo::new("n", "INT4")],
            (1..=5).map(|n| vec![Value::Int(n)]).collect(),
        )),
    );
    let mut session = Session::new();

    h.console.submit(&mut session, "SELECT n FROM numbers").await;

    let result = session.state().result().unwrap();
    assert_eq!(result.row_count(), 2);
    assert_eq!(result.total_rows(), 5);
    let table = session.view(h.console.renderer()).table.unwrap();
    assert!(table.warning.is_some());
}

#[tokio::test]
async fn test_sessions_are_isolated() {
    let h = Harness::new();
    let mut alice = Session::new();
    let mut bob = Session::new();

    h.console.submit(&mut alice, "SELECT 1 AS x").await;
    h.console.submit(&mut bob, "SELEKT 1").await;

    assert_eq!(alice.state().label(), "ResultShown");
    assert!(bob.state().is_idle());
    assert!(alice.view(h.console.renderer()).notices.is_empty());
}

#[test]
fn test_console_refuses_swapped_credentials() {
    let engine = MockEngine::new();
    let result = Console::from_connectors(
        &Config::default(),
        engine.connector(Profile::Audit),
        engine.connector(Profile::Data),
        Arc::new(CapturingExplorer::default()),
    );
    assert!(matches!(result, Err(LookoutError::Config(_))));
}
