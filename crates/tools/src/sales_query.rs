use ar_domain::tool::ToolDefinition;
use async_trait::async_trait;
use serde_json::{json, Value};

use crate::error::ToolError;
use crate::registry::ToolHandler;
use crate::sales_data::SalesData;

pub const SALES_QUERY_TOOL: &str = "fetch_sales_data_using_sqlite_query";

/// Returned instead of an empty table so the agent rephrases.
pub const NO_RESULTS: &str = "The query returned no results. Try a different question.";

/// Answers questions about sales data by running a read-only SQLite query.
pub struct SalesQueryTool {
    data: SalesData,
    def: ToolDefinition,
}

impl SalesQueryTool {
    pub fn new(data: SalesData) -> Self {
        let def = ToolDefinition {
            name: SALES_QUERY_TOOL.into(),
            description: "Answer user questions about Contoso sales data by executing a \
                          SQLite query against the database. Returns the result as a JSON \
                          object with `columns` and `rows`."
                .into(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "sqlite_query": {
                        "type": "string",
                        "description": "A single well-formed SQLite SELECT query that extracts the information needed to answer the user's question."
                    }
                },
                "required": ["sqlite_query"],
                "additionalProperties": false
            }),
        };
        Self { data, def }
    }
}

#[async_trait]
impl ToolHandler for SalesQueryTool {
    fn definition(&self) -> &ToolDefinition {
        &self.def
    }

    async fn call(&self, args: Value) -> Result<Value, ToolError> {
        let sql = args
            .get("sqlite_query")
            .and_then(Value::as_str)
            .unwrap_or_default();
        tracing::info!(tool = SALES_QUERY_TOOL, sql = %sql, "running sales query");

        let result = self
            .data
            .query(sql)
            .await
            .map_err(|e| ToolError::execution(SALES_QUERY_TOOL, format!("{e} (query: {sql})")))?;

        if result.is_empty() {
            return Ok(Value::String(NO_RESULTS.into()));
        }
        serde_json::to_value(result).map_err(|e| ToolError::execution(SALES_QUERY_TOOL, e.to_string()))
    }
}
