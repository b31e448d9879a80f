use clap::{Parser, Subcommand, ValueEnum};
use formdb::record::payload_from_json;
use formdb::schema::parse_schema;
use formdb::{ErrorMode, FormSchema, RawQueryParams, Record, RecordStore, StoreConfig, Validator};
use std::path::{Path, PathBuf};
use std::process;

/// FormDB CLI: check form schemas, validate records and query exported submissions
#[derive(Parser)]
#[command(name = "formdb", version, about)]
struct Cli {
    /// Output format
    #[arg(long, default_value = "json")]
    format: OutputFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    Yaml,
    Json,
}

#[derive(Subcommand)]
enum Command {
    /// Parse a schema file and check its structure
    Check {
        /// Schema file (YAML or JSON)
        #[arg(long)]
        schema: PathBuf,
    },

    /// Validate a record, or a JSON array of records, against a schema
    Validate {
        /// Schema file (YAML or JSON)
        #[arg(long)]
        schema: PathBuf,
        /// Record file, or "-" to read stdin
        record: PathBuf,
        /// How several failing rules on one field are reported (last, first, all)
        #[arg(long, default_value = "last")]
        error_mode: ErrorMode,
    },

    /// Search, sort and paginate a JSON array of exported records
    Query {
        /// Records file, or "-" to read stdin
        #[arg(long)]
        records: PathBuf,
        #[arg(long)]
        page: Option<String>,
        #[arg(long)]
        limit: Option<String>,
        /// Sort key: id, createdAt or any payload field
        #[arg(long)]
        sort_by: Option<String>,
        /// asc or desc
        #[arg(long)]
        sort_order: Option<String>,
        /// Case-insensitive text to look for in payload values
        #[arg(long)]
        search: Option<String>,
    },
}

fn main() {
    let cli = Cli::parse();

    match run(cli) {
        Ok(true) => {}
        Ok(false) => process::exit(1),
        Err(e) => {
            eprintln!("ERROR:{e}");
            process::exit(1);
        }
    }
}

/// Returns whether every checked input was acceptable
fn run(cli: Cli) -> Result<bool, Box<dyn std::error::Error>> {
    match cli.command {
        Command::Check { schema } => {
            let schema = parse_schema(&schema)?;
            print_output(&schema_summary(&schema), &cli.format)?;
            Ok(true)
        }

        Command::Validate {
            schema,
            record,
            error_mode,
        } => {
            let schema = parse_schema(&schema)?;
            let input = read_json(&record)?;
            let (report, all_valid) = validate_input(&schema, input, error_mode)?;
            print_output(&report, &cli.format)?;
            Ok(all_valid)
        }

        Command::Query {
            records,
            page,
            limit,
            sort_by,
            sort_order,
            search,
        } => {
            let records: Vec<Record> = serde_json::from_value(read_json(&records)?)?;
            let store = RecordStore::load(StoreConfig::default(), records)?;
            let params = RawQueryParams {
                page,
                limit,
                sort_by,
                sort_order,
                search,
            }
            .normalize();
            let result = store.query(&params);
            print_output(&serde_json::to_value(result)?, &cli.format)?;
            Ok(true)
        }
    }
}

fn schema_summary(schema: &FormSchema) -> serde_json::Value {
    let fields: Vec<_> = schema
        .fields
        .iter()
        .map(|f| {
            serde_json::json!({
                "id": f.id,
                "type": f.field_type.as_str(),
                "required": f.is_required(),
            })
        })
        .collect();

    serde_json::json!({
        "ok": true,
        "title": schema.title,
        "fields": fields,
    })
}

/// Validate a single record object or an array of them. Returns the report
/// and whether every record passed.
fn validate_input(
    schema: &FormSchema,
    input: serde_json::Value,
    mode: ErrorMode,
) -> formdb::Result<(serde_json::Value, bool)> {
    let validator = Validator::new(schema.clone())?.with_mode(mode);

    let check = |value: serde_json::Value| -> formdb::Result<serde_json::Value> {
        let errors = validator.validate(&payload_from_json(value)?);
        Ok(serde_json::json!({ "valid": errors.is_ok(), "errors": errors }))
    };

    match input {
        serde_json::Value::Array(items) => {
            let mut reports = Vec::with_capacity(items.len());
            let mut all_valid = true;
            for (index, item) in items.into_iter().enumerate() {
                let mut report = check(item)?;
                all_valid &= report["valid"] == true;
                report["index"] = index.into();
                reports.push(report);
            }
            Ok((serde_json::Value::Array(reports), all_valid))
        }
        single => {
            let report = check(single)?;
            let valid = report["valid"] == true;
            Ok((report, valid))
        }
    }
}

fn read_json(path: &Path) -> Result<serde_json::Value, Box<dyn std::error::Error>> {
    let content = if path == Path::new("-") {
        use std::io::Read;
        let mut content = String::new();
        std::io::stdin().read_to_string(&mut content)?;
        content
    } else {
        std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read '{}': {e}", path.display()))?
    };
    Ok(serde_json::from_str(&content)?)
}

fn print_output(
    value: &serde_json::Value,
    format: &OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(value)?),
        OutputFormat::Yaml => print!("{}", serde_yaml::to_string(value)?),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use formdb::schema::parse_schema_str;
    use serde_json::json;

    fn schema() -> FormSchema {
        parse_schema_str(
            r#"
title: Signup
fields:
  - id: handle
    type: text
    label: Handle
    validation: { required: true, minLength: 5, pattern: "^[a-z]+$" }
  - id: age
    type: number
    label: Age
    validation: { min: 18 }
"#,
        )
        .unwrap()
    }

    #[test]
    fn test_validate_single_record() {
        let (report, valid) =
            validate_input(&schema(), json!({ "handle": "alice", "age": 30 }), ErrorMode::LastWins)
                .unwrap();
        assert!(valid);
        assert_eq!(report, json!({ "valid": true, "errors": {} }));
    }

    #[test]
    fn test_validate_array_of_records() {
        let input = json!([
            { "handle": "alice" },
            { "handle": "Al", "age": 12 },
            {}
        ]);
        let (report, valid) = validate_input(&schema(), input, ErrorMode::CollectAll).unwrap();
        assert!(!valid);
        assert_eq!(report[0]["valid"], true);
        assert_eq!(report[1]["index"], 1);
        assert_eq!(
            report[1]["errors"],
            json!({ "handle": "Min length is 5; Invalid format", "age": "Min value is 18" })
        );
        assert_eq!(report[2]["errors"], json!({ "handle": "Required" }));
    }

    #[test]
    fn test_validate_rejects_non_object_record() {
        let err = validate_input(&schema(), json!("alice"), ErrorMode::LastWins).unwrap_err();
        assert!(err.to_string().contains("expected a JSON object"));
    }

    #[test]
    fn test_read_json_file() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("records.json");
        std::fs::write(
            &path,
            r#"[{ "id": "a", "createdAt": "2024-01-01T00:00:00.000Z", "data": { "n": 1 } }]"#,
        )
        .unwrap();

        let value = read_json(&path).unwrap();
        let records: Vec<Record> = serde_json::from_value(value).unwrap();
        assert_eq!(records[0].id, "a");

        let missing = read_json(&tmp.path().join("nope.json")).unwrap_err();
        assert!(missing.to_string().starts_with("Failed to read"));
    }

    #[test]
    fn test_schema_summary() {
        let summary = schema_summary(&schema());
        assert_eq!(summary["title"], "Signup");
        assert_eq!(summary["fields"][0], json!({ "id": "handle", "type": "text", "required": true }));
        assert_eq!(summary["fields"][1]["required"], false);
    }

    #[test]
    fn test_cli_parses() {
        let cli = Cli::try_parse_from([
            "formdb", "--format", "yaml", "query", "--records", "r.json", "--sort-by", "age",
            "--sort-order", "asc",
        ])
        .unwrap();
        assert!(matches!(cli.format, OutputFormat::Yaml));
        match cli.command {
            Command::Query { sort_by, sort_order, page, .. } => {
                assert_eq!(sort_by.as_deref(), Some("age"));
                assert_eq!(sort_order.as_deref(), Some("asc"));
                assert!(page.is_none());
            }
            _ => panic!("expected query command"),
        }

        let cli = Cli::try_parse_from([
            "formdb", "validate", "--schema", "s.yaml", "rec.json", "--error-mode", "first",
        ])
        .unwrap();
        match cli.command {
            Command::Validate { error_mode, .. } => assert_eq!(error_mode, ErrorMode::FirstWins),
            _ => panic!("expected validate command"),
        }
    }
}
