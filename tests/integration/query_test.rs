//! Query gateway integration tests.

use super::get_test_connector;
use db_lookout::db::{ConnectionScope, DataProfile, Profile, Value};
use db_lookout::error::ExecutionErrorKind;
use db_lookout::query::{Query, QueryGateway};
use db_lookout::render::{ResultRenderer, SemanticType};
use std::sync::Arc;
use std::time::Duration;

fn gateway(read_only: bool, timeout: Duration) -> Option<QueryGateway> {
    let connector = get_test_connector(Profile::Data, read_only)?;
    let scope = ConnectionScope::<DataProfile>::new(Arc::new(connector)).ok()?;
    Some(QueryGateway::new(scope, timeout, 100))
}

#[tokio::test]
async fn test_execute_simple_select() {
    let Some(gateway) = gateway(false, Duration::from_secs(5)) else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };

    let query = Query::new("SELECT 1 AS x, 'hello' AS greeting, NULL::int AS nothing").unwrap();
    let result = gateway.execute(&query).await.unwrap();

    assert_eq!(result.columns().len(), 3);
    assert_eq!(result.get(0, "x"), Some(&Value::Int(1)));
    assert_eq!(result.get(0, "greeting"), Some(&Value::String("hello".into())));
    assert_eq!(result.get(0, "nothing"), Some(&Value::Null));
}

#[tokio::test]
async fn test_row_cap_counts_total() {
    let Some(gateway) = gateway(false, Duration::from_secs(5)) else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };

    let query = Query::new("SELECT generate_series(1, 250) AS n").unwrap();
    let result = gateway.execute(&query).await.unwrap();

    assert_eq!(result.row_count(), 100);
    assert_eq!(result.total_rows(), 250);
    assert!(result.was_truncated());
}

#[tokio::test]
async fn test_syntax_error_is_classified() {
    let Some(gateway) = gateway(false, Duration::from_secs(5)) else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };

    let err = gateway
        .execute(&Query::new("SELEKT 1").unwrap())
        .await
        .unwrap_err();
    assert_eq!(err.kind, ExecutionErrorKind::Syntax);
    assert_eq!(err.query, "SELEKT 1");
}

#[tokio::test]
async fn test_slow_query_hits_deadline() {
    let Some(gateway) = gateway(false, Duration::from_secs(1)) else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };

    let err = gateway
        .execute(&Query::new("SELECT pg_sleep(5)").unwrap())
        .await
        .unwrap_err();
    assert_eq!(err.kind, ExecutionErrorKind::Connectivity);
}

#[tokio::test]
async fn test_read_only_session_rejects_writes() {
    let Some(gateway) = gateway(true, Duration::from_secs(5)) else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };

    // The gateway does not apply the statement policy; the session does
    let query = Query::new("CREATE TEMP TABLE lookout_ro_probe (id int)").unwrap();
    let err = gateway.execute(&query).await.unwrap_err();
    assert_eq!(err.kind, ExecutionErrorKind::Permission);
}

#[tokio::test]
async fn test_analytical_types_are_decoded() {
    let Some(gateway) = gateway(false, Duration::from_secs(5)) else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };

    let query = Query::new(
        "SELECT 12.50::numeric AS amount, \
                DATE '2024-01-02' AS day, \
                TIMESTAMP '2024-01-02 03:04:05' AS at, \
                TIMESTAMPTZ '2024-01-02 03:04:05+00' AS ts, \
                '{\"a\": 1}'::jsonb AS doc, \
                'a0eebc99-9c0b-4ef8-bb6d-6bb9bd380a11'::uuid AS id, \
                NULL::numeric AS missing",
    )
    .unwrap();
    let result = gateway.execute(&query).await.unwrap();

    assert_eq!(result.get(0, "amount"), Some(&Value::Float(12.5)));
    assert_eq!(result.get(0, "day"), Some(&Value::String("2024-01-02".into())));
    assert_eq!(
        result.get(0, "at"),
        Some(&Value::String("2024-01-02 03:04:05".into()))
    );
    assert_eq!(
        result.get(0, "ts"),
        Some(&Value::String("2024-01-02T03:04:05+00:00".into()))
    );
    assert_eq!(result.get(0, "doc"), Some(&Value::String("{\"a\":1}".into())));
    assert_eq!(
        result.get(0, "id"),
        Some(&Value::String("a0eebc99-9c0b-4ef8-bb6d-6bb9bd380a11".into()))
    );
    assert_eq!(result.get(0, "missing"), Some(&Value::Null));
}

#[tokio::test]
async fn test_analytical_types_reach_the_explorer() {
    let Some(gateway) = gateway(false, Duration::from_secs(5)) else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };

    let query = Query::new("SELECT now() AS ts, 3.25::numeric AS total").unwrap();
    let result = gateway.execute(&query).await.unwrap();
    let payload = ResultRenderer::new().to_explorer_input(&result);

    assert_eq!(payload.fields[0].semantic, SemanticType::Temporal);
    assert_eq!(payload.fields[1].semantic, SemanticType::Quantitative);
    assert!(payload.records[0]["ts"].is_string());
    assert_eq!(payload.records[0]["total"], serde_json::json!(3.25));
}
