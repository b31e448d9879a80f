mod parser;
mod types;

pub use parser::{parse_schema, parse_schema_str};
pub use types::*;

use crate::error::{FormDbError, Result};
use crate::value::parse_calendar_date;
use std::collections::HashSet;

impl FormSchema {
    /// Look up a field descriptor by id
    pub fn field(&self, id: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.id == id)
    }

    /// Check the structural invariants of the schema: unique non-empty ids,
    /// option lists on select fields, compilable patterns, parseable date
    /// bounds, and ordered min/max pairs.
    pub fn check(&self) -> Result<()> {
        let mut seen = HashSet::new();

        for field in &self.fields {
            if field.id.is_empty() {
                return Err(FormDbError::Schema(format!(
                    "Field '{}' has an empty id",
                    field.label
                )));
            }
            if !seen.insert(field.id.as_str()) {
                return Err(FormDbError::Schema(format!(
                    "Duplicate field id '{}'",
                    field.id
                )));
            }

            if field.field_type.has_options()
                && field.options.as_ref().map_or(true, |o| o.is_empty())
            {
                return Err(FormDbError::Schema(format!(
                    "Field '{}' of type {} requires a non-empty options list",
                    field.id, field.field_type
                )));
            }

            if let Some(rules) = &field.validation {
                check_rules(&field.id, rules)?;
            }
        }

        Ok(())
    }
}

fn check_rules(field_id: &str, rules: &ValidationRules) -> Result<()> {
    if let Some(pattern) = &rules.pattern {
        regex::Regex::new(pattern).map_err(|e| {
            FormDbError::Schema(format!("Field '{field_id}' has an invalid pattern: {e}"))
        })?;
    }

    if let Some(min_date) = &rules.min_date {
        if parse_calendar_date(min_date).is_none() {
            return Err(FormDbError::Schema(format!(
                "Field '{field_id}' has an unparseable minDate '{min_date}'"
            )));
        }
    }

    if let (Some(lo), Some(hi)) = (rules.min_length, rules.max_length) {
        if lo > hi {
            return Err(bounds_error(field_id, "minLength", "maxLength"));
        }
    }
    if let (Some(lo), Some(hi)) = (rules.min, rules.max) {
        if lo > hi {
            return Err(bounds_error(field_id, "min", "max"));
        }
    }
    if let (Some(lo), Some(hi)) = (rules.min_selected, rules.max_selected) {
        if lo > hi {
            return Err(bounds_error(field_id, "minSelected", "maxSelected"));
        }
    }

    Ok(())
}

fn bounds_error(field_id: &str, lo: &str, hi: &str) -> FormDbError {
    FormDbError::Schema(format!("Field '{field_id}' has {lo} greater than {hi}"))
}
