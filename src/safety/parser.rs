//! SQL parsing and read/write classification.
//!
//! Uses sqlparser-rs with the PostgreSQL dialect. Text the parser does not
//! accept is classified as [`Access::Unknown`]; the engine has the final word
//! on it.

use sqlparser::ast::{Query, Select, SetExpr, Statement, TableFactor, TableWithJoins};
use sqlparser::dialect::PostgreSqlDialect;
use sqlparser::parser::Parser;

use crate::error::{LookoutError, Result};

use super::{Access, Classification, StatementType};

/// SQL classifier that parses and classifies SQL queries.
#[derive(Debug)]
pub struct SqlClassifier {
    dialect: PostgreSqlDialect,
}

impl Default for SqlClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl SqlClassifier {
    pub fn new() -> Self {
        Self {
            dialect: PostgreSqlDialect {},
        }
    }

    /// Classifies a SQL string.
    pub fn classify(&self, sql: &str) -> Classification {
        self.parse_and_classify(sql)
            .unwrap_or_else(|_| Classification::new(Access::Unknown, StatementType::Unknown))
    }

    fn parse_and_classify(&self, sql: &str) -> Result<Classification> {
        let statements = Parser::parse_sql(&self.dialect, sql)
            .map_err(|e| LookoutError::query(format!("SQL parse error: {}", e)))?;

        match statements.as_slice() {
            [] => Ok(Classification::new(Access::Unknown, StatementType::Unknown)),
            [single] => {
                let (access, stmt_type) = classify_statement(single);
                Ok(Classification::new(access, stmt_type))
            }
            many => {
                let (access, stmt_type) = many
                    .iter()
                    .map(classify_statement)
                    .fold((Access::Read, StatementType::Unknown), pick_stronger);
                Ok(Classification::new(
                    access,
                    StatementType::Multiple(Box::new(stmt_type)),
                ))
            }
        }
    }
}

/// Classifies SQL without keeping a classifier instance around.
pub fn classify_sql(sql: &str) -> Classification {
    SqlClassifier::new().classify(sql)
}

fn priority(access: Access) -> u8 {
    match access {
        Access::Read => 0,
        Access::Unknown => 1,
        Access::Write => 2,
    }
}

/// Keeps the classification that modifies more, preferring the first on ties.
fn pick_stronger(
    current: (Access, StatementType),
    next: (Access, StatementType),
) -> (Access, StatementType) {
    if priority(next.0) > priority(current.0) {
        next
    } else {
        current
    }
}

fn classify_statement(statement: &Statement) -> (Access, StatementType) {
    match statement {
        // May contain data-modifying CTEs
        Statement::Query(query) => classify_query(query),
        Statement::Explain {
            analyze, statement, ..
        } => {
            if *analyze {
                // EXPLAIN ANALYZE runs the inner statement
                let (inner, _) = classify_statement(statement);
                (inner, StatementType::Explain)
            } else {
                (Access::Read, StatementType::Explain)
            }
        }
        Statement::ShowVariable { .. }
        | Statement::ShowTables { .. }
        | Statement::ShowColumns { .. }
        | Statement::ShowCreate { .. }
        | Statement::ShowFunctions { .. }
        | Statement::ShowStatus { .. }
        | Statement::ShowCollation { .. } => (Access::Read, StatementType::Show),

        Statement::Insert(_) => (Access::Write, StatementType::Insert),
        Statement::Update { .. } => (Access::Write, StatementType::Update),
        Statement::Merge { .. } => (Access::Write, StatementType::Merge),
        Statement::Delete(_) => (Access::Write, StatementType::Delete),
        Statement::Drop { .. } => (Access::Write, StatementType::Drop),
        Statement::Truncate { .. } => (Access::Write, StatementType::Truncate),
        Statement::Copy { .. } => (Access::Write, StatementType::Copy),
        Statement::AlterTable { .. }
        | Statement::AlterIndex { .. }
        | Statement::AlterView { .. }
        | Statement::AlterRole { .. } => (Access::Write, StatementType::Alter),
        Statement::CreateTable { .. }
        | Statement::CreateIndex { .. }
        | Statement::CreateView { .. }
        | Statement::CreateSchema { .. }
        | Statement::CreateDatabase { .. }
        | Statement::CreateFunction { .. }
        | Statement::CreateProcedure { .. }
        | Statement::CreateRole { .. }
        | Statement::CreateSequence { .. }
        | Statement::CreateType { .. } => (Access::Write, StatementType::Create),
        Statement::Grant { .. } => (Access::Write, StatementType::Grant),
        Statement::Revoke { .. } => (Access::Write, StatementType::Revoke),

        // Anything else that parses may change session or server state
        _ => (Access::Write, StatementType::Unknown),
    }
}

/// Walks a query for data-modifying CTEs and derived tables.
fn classify_query(query: &Query) -> (Access, StatementType) {
    let ctes = query
        .with
        .iter()
        .flat_map(|with| with.cte_tables.iter())
        .map(|cte| classify_query(&cte.query));

    ctes.chain(std::iter::once(classify_set_expr(&query.body)))
        .fold((Access::Read, StatementType::Select), pick_stronger)
}

fn classify_set_expr(set_expr: &SetExpr) -> (Access, StatementType) {
    match set_expr {
        SetExpr::Update(stmt) | SetExpr::Insert(stmt) => classify_statement(stmt),
        SetExpr::Query(query) => classify_query(query),
        SetExpr::Select(select) => classify_select(select),
        SetExpr::SetOperation { left, right, .. } => {
            pick_stronger(classify_set_expr(left), classify_set_expr(right))
        }
        SetExpr::Values(_) | SetExpr::Table(_) => (Access::Read, StatementType::Select),
    }
}

fn classify_select(select: &Select) -> (Access, StatementType) {
    select
        .from
        .iter()
        .map(classify_table_with_joins)
        .fold((Access::Read, StatementType::Select), pick_stronger)
}

fn classify_table_with_joins(twj: &TableWithJoins) -> (Access, StatementType) {
    std::iter::once(&twj.relation)
        .chain(twj.joins.iter().map(|join| &join.relation))
        .map(classify_table_factor)
        .fold((Access::Read, StatementType::Select), pick_stronger)
}

fn classify_table_factor(factor: &TableFactor) -> (Access, StatementType) {
    match factor {
        TableFactor::Derived { subquery, .. } => classify_query(subquery),
        TableFactor::NestedJoin {
            table_with_joins, ..
        } => classify_table_with_joins(table_with_joins),
        _ => (Access::Read, StatementType::Select),
    }
}
