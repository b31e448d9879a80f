use crate::error::{FormDbError, Result};
use crate::record::Payload;
use crate::schema::{FieldDescriptor, FieldType, FormSchema};
use crate::value::{format_number, parse_calendar_date, FieldValue};
use chrono::NaiveDate;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

/// Per-field error messages. Empty means the record is acceptable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ValidationErrors(BTreeMap<String, String>);

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_ok(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, field_id: &str) -> Option<&str> {
        self.0.get(field_id).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn insert(&mut self, field_id: impl Into<String>, message: impl Into<String>) {
        self.0.insert(field_id.into(), message.into());
    }

    /// `Ok(())` when empty, otherwise a `FormDbError::Validation`
    pub fn into_result(self) -> Result<()> {
        if self.is_ok() {
            Ok(())
        } else {
            Err(FormDbError::Validation(self))
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (field, message)) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{field}: {message}")?;
        }
        Ok(())
    }
}

/// How several failing rules on one field are reported
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorMode {
    /// The last failing rule overwrites earlier ones
    #[default]
    LastWins,
    /// The first failing rule is kept
    FirstWins,
    /// Every failing rule is reported, joined with "; "
    CollectAll,
}

impl std::str::FromStr for ErrorMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "last" | "last_wins" => Ok(ErrorMode::LastWins),
            "first" | "first_wins" => Ok(ErrorMode::FirstWins),
            "all" | "collect_all" => Ok(ErrorMode::CollectAll),
            other => Err(format!("Unknown error mode '{other}' (expected last, first or all)")),
        }
    }
}

/// Rules that need preparation before they can be applied
#[derive(Debug, Default)]
struct CompiledRules {
    pattern: Option<Regex>,
    min_date: Option<NaiveDate>,
}

/// Validates records against a form schema. Patterns and date bounds are
/// compiled once at construction; `validate` itself is pure.
#[derive(Debug)]
pub struct Validator {
    schema: Arc<FormSchema>,
    compiled: HashMap<String, CompiledRules>,
    mode: ErrorMode,
}

impl Validator {
    pub fn new(schema: impl Into<Arc<FormSchema>>) -> Result<Self> {
        let schema = schema.into();
        let mut compiled = HashMap::new();

        for field in &schema.fields {
            let Some(rules) = field.rules() else { continue };
            let mut prepared = CompiledRules::default();

            if let Some(pattern) = &rules.pattern {
                let re = Regex::new(pattern).map_err(|e| {
                    FormDbError::Schema(format!(
                        "Field '{}' has an invalid pattern: {e}",
                        field.id
                    ))
                })?;
                prepared.pattern = Some(re);
            }

            if let Some(min_date) = &rules.min_date {
                let date = parse_calendar_date(min_date).ok_or_else(|| {
                    FormDbError::Schema(format!(
                        "Field '{}' has an unparseable minDate '{min_date}'",
                        field.id
                    ))
                })?;
                prepared.min_date = Some(date);
            }

            compiled.insert(field.id.clone(), prepared);
        }

        Ok(Validator {
            schema,
            compiled,
            mode: ErrorMode::default(),
        })
    }

    pub fn with_mode(mut self, mode: ErrorMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn mode(&self) -> ErrorMode {
        self.mode
    }

    pub fn schema(&self) -> &Arc<FormSchema> {
        &self.schema
    }

    /// Validate a record's payload, returning one message per failing field
    pub fn validate(&self, data: &Payload) -> ValidationErrors {
        let mut errors = ValidationErrors::new();

        for field in &self.schema.fields {
            let value = data.get(&field.id);

            if field.is_required() && value.map_or(true, FieldValue::is_empty) {
                errors.insert(field.id.clone(), "Required");
                continue;
            }

            let Some(value) = value.filter(|v| !v.is_blank()) else {
                continue;
            };

            let messages = self.check_value(field, value);
            if let Some(message) = self.report(messages) {
                errors.insert(field.id.clone(), message);
            }
        }

        errors
    }

    /// Validate and convert a failure into `FormDbError::Validation`
    pub fn check(&self, data: &Payload) -> Result<()> {
        self.validate(data).into_result()
    }

    /// Messages for every failing type-specific rule, in evaluation order
    fn check_value(&self, field: &FieldDescriptor, value: &FieldValue) -> Vec<String> {
        let mut messages = Vec::new();
        let Some(rules) = field.rules() else {
            return messages;
        };
        let compiled = self.compiled.get(&field.id);

        match field.field_type {
            FieldType::Text | FieldType::Textarea => {
                let text = value.to_string();
                let length = text.chars().count() as u64;

                if let Some(min) = rules.min_length {
                    if length < min {
                        messages.push(format!("Min length is {min}"));
                    }
                }
                if let Some(max) = rules.max_length {
                    if length > max {
                        messages.push(format!("Max length is {max}"));
                    }
                }
                if let Some(re) = compiled.and_then(|c| c.pattern.as_ref()) {
                    if !re.is_match(&text) {
                        messages.push("Invalid format".to_string());
                    }
                }
            }
            FieldType::Number => {
                // Values that do not coerce to a number never satisfy a
                // comparison, so no bound can fail for them.
                if let Some(n) = value.to_number() {
                    if let Some(min) = rules.min {
                        if n < min {
                            messages.push(format!("Min value is {}", format_number(min)));
                        }
                    }
                    if let Some(max) = rules.max {
                        if n > max {
                            messages.push(format!("Max value is {}", format_number(max)));
                        }
                    }
                }
            }
            FieldType::Date => {
                let bound = compiled.and_then(|c| c.min_date);
                if let (Some(bound), Some(date)) = (bound, value.to_date()) {
                    if date < bound {
                        let shown = rules.min_date.as_deref().unwrap_or_default();
                        messages.push(format!("Date must be after {shown}"));
                    }
                }
            }
            FieldType::MultiSelect => {
                if let Some(items) = value.as_list() {
                    let count = items.len() as u64;
                    if let Some(min) = rules.min_selected {
                        if count < min {
                            messages.push(format!("Select at least {min}"));
                        }
                    }
                    if let Some(max) = rules.max_selected {
                        if count > max {
                            messages.push(format!("Select at most {max}"));
                        }
                    }
                }
            }
            FieldType::Select | FieldType::Switch => {}
        }

        messages
    }

    fn report(&self, mut messages: Vec<String>) -> Option<String> {
        if messages.is_empty() {
            return None;
        }
        match self.mode {
            ErrorMode::LastWins => messages.pop(),
            ErrorMode::FirstWins => Some(messages.swap_remove(0)),
            ErrorMode::CollectAll => Some(messages.join("; ")),
        }
    }
}

/// Validate a record against a schema in one call.
/// Fails only if the schema itself carries an uncompilable rule.
pub fn validate(schema: &FormSchema, data: &Payload) -> Result<ValidationErrors> {
    Ok(Validator::new(schema.clone())?.validate(data))
}
