//! Integration tests for Lookout.
//!
//! These tests require a running PostgreSQL database.
//! Set DATABASE_URL environment variable to run them. Both credential
//! profiles point at that database; the audit tests use their own table.

pub mod audit_test;
pub mod query_test;

use db_lookout::config::ConnectionConfig;
use db_lookout::db::{PgConnector, PgConnectorOptions, Profile};
use std::time::Duration;

/// Helper to get test database URL from environment.
pub fn get_test_database_url() -> Option<String> {
    std::env::var("DATABASE_URL").ok()
}

/// Helper to create a connector for `profile` against the test database.
pub fn get_test_connector(profile: Profile, read_only: bool) -> Option<PgConnector> {
    let url = get_test_database_url()?;
    let config = ConnectionConfig::from_connection_string(&url).ok()?;
    PgConnector::new(
        profile,
        &config,
        PgConnectorOptions {
            statement_timeout: Duration::from_secs(2),
            read_only,
        },
    )
    .ok()
}

/// A table name no other test run uses.
pub fn unique_table(prefix: &str) -> String {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    format!("{prefix}_{}_{}", std::process::id(), nanos % 1_000_000_000)
}
