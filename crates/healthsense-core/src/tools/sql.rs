//! SQL toolkit: lets the model inspect and query a SQLite database

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

use super::{ToolHandler, json_schema, required_str};
use crate::store::SqlDatabase;

/// The three SQL tools bound to one database
pub fn sql_tools(db: Arc<SqlDatabase>) -> Vec<Arc<dyn ToolHandler>> {
    vec![
        Arc::new(ListTablesTool::new(db.clone())),
        Arc::new(SchemaTool::new(db.clone())),
        Arc::new(QueryTool::new(db)),
    ]
}

pub struct ListTablesTool {
    db: Arc<SqlDatabase>,
}

impl ListTablesTool {
    pub fn new(db: Arc<SqlDatabase>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ToolHandler for ListTablesTool {
    fn name(&self) -> &str {
        "sql_db_list_tables"
    }

    fn description(&self) -> &str {
        "List the tables in the database. Call this first to see what data is available."
    }

    fn input_schema(&self) -> Value {
        json_schema(serde_json::json!({}), vec![])
    }

    async fn execute(&self, _input: Value) -> Result<String> {
        let tables = self.db.list_tables().await?;
        if tables.is_empty() {
            return Ok("The database has no tables.".to_string());
        }
        Ok(tables.join(", "))
    }
}

pub struct SchemaTool {
    db: Arc<SqlDatabase>,
}

impl SchemaTool {
    pub fn new(db: Arc<SqlDatabase>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ToolHandler for SchemaTool {
    fn name(&self) -> &str {
        "sql_db_schema"
    }

    fn description(&self) -> &str {
        "Get the schema and sample rows for the given tables. Be sure the tables exist \
         by calling sql_db_list_tables first."
    }

    fn input_schema(&self) -> Value {
        json_schema(
            serde_json::json!({
                "table_names": {
                    "type": "string",
                    "description": "Comma-separated list of tables, e.g. 'doctors, slots'"
                }
            }),
            vec!["table_names"],
        )
    }

    async fn execute(&self, input: Value) -> Result<String> {
        let tables: Vec<String> = required_str(&input, "table_names")?
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(String::from)
            .collect();
        if tables.is_empty() {
            return Err(anyhow!("No table names given"));
        }
        debug!("Describing tables: {:?}", tables);
        self.db.table_info(tables).await
    }
}

pub struct QueryTool {
    db: Arc<SqlDatabase>,
}

impl QueryTool {
    pub fn new(db: Arc<SqlDatabase>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ToolHandler for QueryTool {
    fn name(&self) -> &str {
        "sql_db_query"
    }

    fn description(&self) -> &str {
        "Execute a single SQLite statement and get the result. SELECT returns at most \
         100 rows; other statements report how many rows they changed. If the statement \
         fails, fix it and try again. Check column names with sql_db_schema first."
    }

    fn input_schema(&self) -> Value {
        json_schema(
            serde_json::json!({
                "query": {
                    "type": "string",
                    "description": "A single valid SQLite statement"
                }
            }),
            vec!["query"],
        )
    }

    async fn execute(&self, input: Value) -> Result<String> {
        let query = required_str(&input, "query")?;
        debug!("Running SQL: {}", query);
        self.db.run_sql(query.to_string()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::{ToolExecutor, ToolRegistry};

    fn registry() -> ToolRegistry {
        let db = SqlDatabase::open_in_memory().unwrap();
        db.execute_batch(
            "CREATE TABLE doctors (id INTEGER, name TEXT, specialization TEXT, contact TEXT);
             INSERT INTO doctors VALUES (1, 'Elizabeth Moore', 'Cardiology', '555-0101');
             INSERT INTO doctors VALUES (2, 'Raj Patel', 'Neurology', '555-0102');
             CREATE TABLE slots (id INTEGER, doctor_id INTEGER, datetime TEXT, is_available INTEGER);
             INSERT INTO slots VALUES (1, 1, '2024-08-01 15:00', 1);",
        )
        .unwrap();

        let mut registry = ToolRegistry::new();
        registry.register_all(sql_tools(Arc::new(db)));
        registry
    }

    #[test]
    fn test_tool_names() {
        let names: Vec<_> = registry().list_tools().into_iter().map(|d| d.name).collect();
        assert_eq!(
            names,
            vec!["sql_db_list_tables", "sql_db_query", "sql_db_schema"]
        );
    }

    #[tokio::test]
    async fn test_list_tables() {
        let out = registry()
            .execute("sql_db_list_tables", serde_json::json!({}))
            .await
            .unwrap();
        assert_eq!(out, "doctors, slots");
    }

    #[tokio::test]
    async fn test_schema_accepts_comma_list() {
        let out = registry()
            .execute(
                "sql_db_schema",
                serde_json::json!({"table_names": "doctors , slots"}),
            )
            .await
            .unwrap();
        assert!(out.contains("CREATE TABLE doctors"));
        assert!(out.contains("CREATE TABLE slots"));
        assert!(out.contains("Elizabeth Moore"));
    }

    #[tokio::test]
    async fn test_schema_requires_tables() {
        let err = registry()
            .execute("sql_db_schema", serde_json::json!({"table_names": " , "}))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "No table names given");
    }

    #[tokio::test]
    async fn test_query_like_lowercase() {
        let out = registry()
            .execute(
                "sql_db_query",
                serde_json::json!({
                    "query": "SELECT name, contact FROM doctors WHERE lower(name) LIKE '%moore%'"
                }),
            )
            .await
            .unwrap();
        assert_eq!(out, "[('Elizabeth Moore', '555-0101')]");
    }

    #[tokio::test]
    async fn test_booking_deletes_slot() {
        let registry = registry();
        let out = registry
            .execute(
                "sql_db_query",
                serde_json::json!({"query": "DELETE FROM slots WHERE doctor_id = 1"}),
            )
            .await
            .unwrap();
        assert_eq!(out, "Statement executed. 1 row(s) affected.");

        let out = registry
            .execute(
                "sql_db_query",
                serde_json::json!({"query": "SELECT COUNT(*) FROM slots"}),
            )
            .await
            .unwrap();
        assert_eq!(out, "[(0)]");
    }

    #[tokio::test]
    async fn test_query_runs_one_statement_only() {
        let registry = registry();
        let err = registry
            .execute(
                "sql_db_query",
                serde_json::json!({
                    "query": "DELETE FROM slots WHERE id = 1; DELETE FROM doctors WHERE id = 1"
                }),
            )
            .await
            .unwrap_err();
        assert!(err.to_string().contains("one statement at a time"));

        let out = registry
            .execute(
                "sql_db_query",
                serde_json::json!({"query": "SELECT COUNT(*) FROM slots"}),
            )
            .await
            .unwrap();
        assert_eq!(out, "[(1)]");
    }

    #[tokio::test]
    async fn test_query_error_propagates() {
        let err = registry()
            .execute(
                "sql_db_query",
                serde_json::json!({"query": "SELECT * FROM appointments"}),
            )
            .await
            .unwrap_err();
        assert!(err.to_string().contains("no such table"));
    }
}
