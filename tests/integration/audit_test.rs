//! Audit logger integration tests.

use super::{get_test_connector, unique_table};
use db_lookout::audit::AuditLogger;
use db_lookout::db::{AuditProfile, ConnectionScope, DataProfile, Profile, Value};
use db_lookout::query::{Query, QueryGateway};
use std::sync::Arc;
use std::time::Duration;

struct Fixture {
    audit: AuditLogger,
    reader: QueryGateway,
}

async fn fixture() -> Option<Fixture> {
    let audit_scope =
        ConnectionScope::<AuditProfile>::new(Arc::new(get_test_connector(Profile::Audit, false)?))
            .ok()?;
    let data_scope =
        ConnectionScope::<DataProfile>::new(Arc::new(get_test_connector(Profile::Data, false)?))
            .ok()?;

    let audit = AuditLogger::new(audit_scope, unique_table("lookout_audit"), Duration::from_secs(5));
    audit.ensure_table().await.ok()?;
    Some(Fixture {
        audit,
        reader: QueryGateway::new(data_scope, Duration::from_secs(5), 100),
    })
}

async fn drop_table(fixture: &Fixture) {
    let sql = format!("DROP TABLE IF EXISTS {}", fixture.audit.table());
    let _ = fixture.reader.execute(&Query::new(sql).unwrap()).await;
}

#[tokio::test]
async fn test_record_persists_failure() {
    let Some(fixture) = fixture().await else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };

    let query = Query::new("SELEKT 1").unwrap();
    fixture
        .audit
        .record(&query, "Syntax error: syntax error at or near \"SELEKT\"")
        .await
        .unwrap();

    let sql = format!(
        "SELECT query_text, error_message, created_at IS NOT NULL AS stamped FROM {}",
        fixture.audit.table()
    );
    let rows = fixture
        .reader
        .execute(&Query::new(sql).unwrap())
        .await
        .unwrap();

    assert_eq!(rows.row_count(), 1);
    assert_eq!(rows.get(0, "query_text"), Some(&Value::String("SELEKT 1".into())));
    assert_eq!(rows.get(0, "stamped"), Some(&Value::Bool(true)));

    drop_table(&fixture).await;
}

#[tokio::test]
async fn test_record_into_missing_table_is_write_error() {
    let Some(connector) = get_test_connector(Profile::Audit, false) else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };
    let scope = ConnectionScope::<AuditProfile>::new(Arc::new(connector)).unwrap();
    let audit = AuditLogger::new(scope, unique_table("lookout_missing"), Duration::from_secs(5));

    let err = audit
        .record(&Query::new("SELEKT 1").unwrap(), "Syntax error")
        .await
        .unwrap_err();
    assert!(err.to_string().starts_with("Audit write failed"));
}
