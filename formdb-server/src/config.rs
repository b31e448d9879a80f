use formdb::record::IdStrategy;
use formdb::{ErrorMode, FormSchema};

/// Schema served when `FORMDB_SCHEMA` is not set
pub const DEFAULT_SCHEMA: &str = include_str!("../schema.yaml");

/// Server settings read from `FORMDB_*` environment variables
#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    pub schema_path: Option<String>,
    pub host: String,
    pub port: u16,
    pub id_strategy: IdStrategy,
    pub error_mode: ErrorMode,
    pub revalidate_updates: bool,
    /// Allowed browser origin; `None` or `*` allows any origin
    pub cors_origin: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            schema_path: None,
            host: "127.0.0.1".to_string(),
            port: 5000,
            id_strategy: IdStrategy::default(),
            error_mode: ErrorMode::default(),
            revalidate_updates: false,
            cors_origin: None,
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable source. Unparseable values are
    /// logged and fall back to their defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = ServerConfig::default();

        ServerConfig {
            schema_path: lookup("FORMDB_SCHEMA").filter(|p| !p.is_empty()),
            host: lookup("FORMDB_HOST").unwrap_or(defaults.host),
            port: parse_or("FORMDB_PORT", lookup("FORMDB_PORT"), defaults.port),
            id_strategy: parse_or(
                "FORMDB_ID_STRATEGY",
                lookup("FORMDB_ID_STRATEGY"),
                defaults.id_strategy,
            ),
            error_mode: parse_or(
                "FORMDB_ERROR_MODE",
                lookup("FORMDB_ERROR_MODE"),
                defaults.error_mode,
            ),
            revalidate_updates: parse_or(
                "FORMDB_REVALIDATE_UPDATES",
                lookup("FORMDB_REVALIDATE_UPDATES"),
                defaults.revalidate_updates,
            ),
            cors_origin: lookup("FORMDB_CORS_ORIGIN").filter(|o| !o.trim().is_empty()),
        }
    }

    /// Load the configured schema file, or the bundled one
    pub fn load_schema(&self) -> formdb::Result<FormSchema> {
        match &self.schema_path {
            Some(path) => formdb::schema::parse_schema(std::path::Path::new(path)),
            None => formdb::schema::parse_schema_str(DEFAULT_SCHEMA),
        }
    }
}

fn parse_or<T>(key: &str, raw: Option<String>, default: T) -> T
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match raw {
        None => default,
        Some(raw) => raw.trim().parse().unwrap_or_else(|e| {
            log::warn!("Ignoring {key}={raw}: {e}");
            default
        }),
    }
}
