//! Dataframe toolkit: read-only operations over one in-memory table

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

use super::{ToolHandler, json_schema, limit_arg, required_str};
use crate::store::DataFrame;

const DEFAULT_ROWS: usize = 20;
const MAX_ROWS: usize = 100;

/// Every dataframe tool bound to one frame
pub fn dataframe_tools(frame: Arc<DataFrame>) -> Vec<Arc<dyn ToolHandler>> {
    vec![
        Arc::new(InfoTool {
            frame: frame.clone(),
        }),
        Arc::new(FilterTool {
            frame: frame.clone(),
        }),
        Arc::new(SortTool {
            frame: frame.clone(),
        }),
        Arc::new(UniqueTool { frame }),
    ]
}

fn render_limited(frame: &DataFrame, limit: usize) -> String {
    if frame.is_empty() {
        return "No matching rows.".to_string();
    }
    let mut out = frame.head(limit).render();
    if frame.len() > limit {
        out.push_str(&format!("\n[{} of {} rows shown]", limit, frame.len()));
    }
    out
}

fn limit_property() -> Value {
    serde_json::json!({
        "type": "integer",
        "description": format!("Maximum rows to return (default {}, max {})", DEFAULT_ROWS, MAX_ROWS)
    })
}

pub struct InfoTool {
    frame: Arc<DataFrame>,
}

#[async_trait]
impl ToolHandler for InfoTool {
    fn name(&self) -> &str {
        "dataframe_info"
    }

    fn description(&self) -> &str {
        "Describe the table: row count, column names with types, and the first rows. \
         Look at each column name carefully before answering."
    }

    fn input_schema(&self) -> Value {
        json_schema(serde_json::json!({}), vec![])
    }

    async fn execute(&self, _input: Value) -> Result<String> {
        Ok(format!(
            "{}\nFirst rows:\n{}",
            self.frame.describe(),
            self.frame.head(5).render()
        ))
    }
}

pub struct FilterTool {
    frame: Arc<DataFrame>,
}

#[async_trait]
impl ToolHandler for FilterTool {
    fn name(&self) -> &str {
        "dataframe_filter"
    }

    fn description(&self) -> &str {
        "Return rows where a column contains the given text (case-insensitive)."
    }

    fn input_schema(&self) -> Value {
        json_schema(
            serde_json::json!({
                "column": {"type": "string", "description": "Column to search"},
                "contains": {"type": "string", "description": "Text the cell must contain"},
                "limit": limit_property(),
            }),
            vec!["column", "contains"],
        )
    }

    async fn execute(&self, input: Value) -> Result<String> {
        let column = required_str(&input, "column")?;
        let needle = required_str(&input, "contains")?;
        let limit = limit_arg(&input, DEFAULT_ROWS, MAX_ROWS);
        let matched = self.frame.filter_contains(column, needle)?;
        Ok(render_limited(&matched, limit))
    }
}

pub struct SortTool {
    frame: Arc<DataFrame>,
}

#[async_trait]
impl ToolHandler for SortTool {
    fn name(&self) -> &str {
        "dataframe_sort"
    }

    fn description(&self) -> &str {
        "Return rows sorted by a column. Numeric columns sort by value, so this finds \
         the cheapest or highest-rated entries."
    }

    fn input_schema(&self) -> Value {
        json_schema(
            serde_json::json!({
                "column": {"type": "string", "description": "Column to sort by"},
                "descending": {"type": "boolean", "description": "Sort high to low (default false)"},
                "limit": limit_property(),
            }),
            vec!["column"],
        )
    }

    async fn execute(&self, input: Value) -> Result<String> {
        let column = required_str(&input, "column")?;
        let descending = input
            .get("descending")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        let limit = limit_arg(&input, DEFAULT_ROWS, MAX_ROWS);
        let sorted = self.frame.sort_by(column, descending)?;
        Ok(render_limited(&sorted, limit))
    }
}

pub struct UniqueTool {
    frame: Arc<DataFrame>,
}

#[async_trait]
impl ToolHandler for UniqueTool {
    fn name(&self) -> &str {
        "dataframe_unique"
    }

    fn description(&self) -> &str {
        "List the distinct values of a column."
    }

    fn input_schema(&self) -> Value {
        json_schema(
            serde_json::json!({
                "column": {"type": "string", "description": "Column name"}
            }),
            vec!["column"],
        )
    }

    async fn execute(&self, input: Value) -> Result<String> {
        let column = required_str(&input, "column")?;
        let values = self.frame.unique(column)?;
        if values.is_empty() {
            return Ok(format!("Column '{}' has no values.", column));
        }
        Ok(format!("{} distinct values: {}", values.len(), values.join(", ")))
    }
}
