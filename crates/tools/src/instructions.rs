use std::path::Path;

use ar_domain::error::{Error, Result};

/// Placeholder in instruction templates replaced by the database description.
pub const SCHEMA_PLACEHOLDER: &str = "{database_schema_string}";

/// Substitute the database description into an instruction template.
pub fn render_instructions(template: &str, schema: &str) -> String {
    template.replace(SCHEMA_PLACEHOLDER, schema)
}

pub async fn load_instructions(path: &Path) -> Result<String> {
    tokio::fs::read_to_string(path)
        .await
        .map_err(|e| Error::Config(format!("cannot read instructions {}: {e}", path.display())))
}
