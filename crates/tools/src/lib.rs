//! Local tools the remote agent can call back into.
//!
//! - [`ToolRegistry`]: name → handler table with JSON-schema argument checks
//! - [`SalesData`]: read-only access to the sales SQLite database
//! - [`SalesQueryTool`]: the `fetch_sales_data_using_sqlite_query` function

pub mod error;
pub mod instructions;
pub mod registry;
pub mod sales_data;
pub mod sales_query;

pub use error::ToolError;
pub use instructions::{load_instructions, render_instructions};
pub use registry::{ToolHandler, ToolRegistry};
pub use sales_data::{QueryResult, SalesData};
pub use sales_query::SalesQueryTool;
