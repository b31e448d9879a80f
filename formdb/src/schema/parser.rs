use crate::error::Result;
use super::types::FormSchema;
use std::path::Path;

/// Parse a schema file (YAML or JSON) into a checked FormSchema
pub fn parse_schema(path: &Path) -> Result<FormSchema> {
    let content = std::fs::read_to_string(path)?;
    parse_schema_str(&content)
}

/// Parse a schema string into a checked FormSchema
pub fn parse_schema_str(content: &str) -> Result<FormSchema> {
    let schema: FormSchema = serde_yaml::from_str(content)?;
    schema.check()?;
    Ok(schema)
}
