use thiserror::Error;

use crate::validation::ValidationErrors;

#[derive(Error, Debug)]
pub enum FormDbError {
    #[error("Schema error: {0}")]
    Schema(String),

    #[error("Validation failed: {0}")]
    Validation(ValidationErrors),

    #[error("Record not found: {id}")]
    NotFound { id: String },

    #[error("Invalid payload: {0}")]
    Payload(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl FormDbError {
    pub(crate) fn not_found(id: &str) -> Self {
        FormDbError::NotFound { id: id.to_string() }
    }
}

pub type Result<T> = std::result::Result<T, FormDbError>;
