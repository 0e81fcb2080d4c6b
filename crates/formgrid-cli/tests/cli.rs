use clap::Parser;
use formgrid_cli::commands::{form, schemas, table, validate};
use formgrid_cli::{Cli, CliConfig, CliError};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn demos() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("../../demos")
}

fn write(dir: &TempDir, name: &str, body: &str) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, body).unwrap();
    path
}

fn parse(stdout: &str) -> Value {
    serde_json::from_str(stdout).unwrap()
}

fn table_args(config: PathBuf, rows: PathBuf) -> table::TableArgs {
    table::TableArgs {
        config,
        rows,
        search: None,
        sort: Vec::new(),
        filter: Vec::new(),
        hide: Vec::new(),
        page: None,
        page_size: None,
        select: Vec::new(),
        export: false,
        delimiter: None,
    }
}

#[test]
fn test_validate_builtin_schema() {
    let args = validate::ValidateArgs {
        schema: "schema:contact-form".to_string(),
        name: None,
        record: demos().join("records/contact.json"),
    };

    let output = validate::run(args, &CliConfig::default()).unwrap();
    assert!(output.success);
    let report = parse(&output.stdout);
    assert_eq!(report["valid"], json!(true));
    assert_eq!(report["schema"], json!("contact-form"));
    assert_eq!(report["record"]["consent"], json!(true));
    assert!(report.get("errors").is_none());
}

#[test]
fn test_validate_reports_field_errors() {
    let dir = TempDir::new().unwrap();
    let record = write(&dir, "login.json", r#"{ "email": "not-an-email", "password": "" }"#);
    let args = validate::ValidateArgs {
        schema: "login".to_string(),
        name: None,
        record,
    };

    let output = validate::run(args, &CliConfig::default()).unwrap();
    assert!(!output.success);
    let report = parse(&output.stdout);
    assert_eq!(report["valid"], json!(false));
    let paths: Vec<&str> = report["errors"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["path"].as_str().unwrap())
        .collect();
    assert_eq!(paths, vec!["email", "password"]);
    assert_eq!(report["errors"][1]["message"], json!("Password is required"));
}

#[test]
fn test_validate_against_schema_document() {
    let dir = TempDir::new().unwrap();
    let document = write(
        &dir,
        "pets.yaml",
        r#"
schema_version: "1.0"
schemas:
  - name: cat
    fields:
      - name: name
        kind: text
        required: true
  - name: dog
    fields:
      - name: name
        kind: text
        required: true
      - name: good
        kind: boolean
        required: true
"#,
    );
    let record = write(&dir, "rex.json", r#"{ "name": "Rex" }"#);

    let ambiguous = validate::ValidateArgs {
        schema: document.display().to_string(),
        name: None,
        record: record.clone(),
    };
    let err = validate::run(ambiguous, &CliConfig::default()).unwrap_err();
    assert!(matches!(err, CliError::InvalidArgument(_)));

    let picked = validate::ValidateArgs {
        schema: document.display().to_string(),
        name: Some("dog".to_string()),
        record,
    };
    let output = validate::run(picked, &CliConfig::default()).unwrap();
    assert!(!output.success);
    assert_eq!(parse(&output.stdout)["errors"][0]["path"], json!("good"));
}

#[test]
fn test_missing_record_is_io_error() {
    let args = validate::ValidateArgs {
        schema: "login".to_string(),
        name: None,
        record: PathBuf::from("/definitely/not/here.json"),
    };
    let err = validate::run(args, &CliConfig::default()).unwrap_err();
    assert_eq!(err.error_code(), "ERR_CLI_IO");
}

#[test]
fn test_schemas_lists_builtins_and_schema_dir() {
    let config = CliConfig {
        schema_dir: Some(demos().join("schemas")),
        ..CliConfig::default()
    };

    let output = schemas::run(&config).unwrap();
    let lines: Vec<&str> = output.stdout.lines().collect();
    assert!(lines.contains(&"schema:contact-form\tContact form with consent and optional phone number"));
    assert!(lines
        .iter()
        .any(|l| l.starts_with("schema:profile\t")));

    let mut sorted = lines.clone();
    sorted.sort();
    assert_eq!(lines, sorted);
}

#[tokio::test]
async fn test_form_replays_profile_wizard() {
    let config = CliConfig {
        schema_dir: Some(demos().join("schemas")),
        ..CliConfig::default()
    };
    let args = form::FormArgs {
        definition: demos().join("forms/profile.yaml"),
        events: demos().join("forms/profile-events.json"),
        edit: None,
        output: None,
    };

    let output = form::run(args, &config).await.unwrap();
    let report = parse(&output.stdout);
    let outcomes = report["outcomes"].as_array().unwrap();

    // The city is still empty on the first attempt to leave the address step
    let rejected: Vec<&Value> = outcomes.iter().filter(|o| o["ok"] == json!(false)).collect();
    assert_eq!(rejected.len(), 1);
    assert_eq!(rejected[0]["event"], json!({ "type": "next" }));
    assert_eq!(rejected[0]["code"], json!("ERR_FORM_STEP_VALIDATION_FAILED"));
    assert!(!output.success);

    assert_eq!(outcomes.last().unwrap()["ok"], json!(true));
    assert_eq!(report["session"]["state"], json!("completed"));
    assert_eq!(report["submitted"]["address"]["country"], json!("DE"));
    assert_eq!(report["submitted"]["skills"][0]["level"], json!("advanced"));
    assert_eq!(report["submitted"]["preferences"]["theme"], json!("dark"));
}

#[tokio::test]
async fn test_form_writes_submission_to_output() {
    let dir = TempDir::new().unwrap();
    let events = write(
        &dir,
        "events.json",
        r#"[
  { "type": "set", "path": "email", "value": "anna@example.com" },
  { "type": "set", "path": "password", "value": "hunter2" },
  { "type": "submit" }
]"#,
    );
    let definition = write(
        &dir,
        "login.yaml",
        "form_version: \"1.0\"\nform:\n  id: login\n  title: Sign in\n  schema_ref: schema:login\n",
    );
    let target = dir.path().join("submitted.json");
    let args = form::FormArgs {
        definition,
        events,
        edit: None,
        output: Some(target.clone()),
    };

    let output = form::run(args, &CliConfig::default()).await.unwrap();
    assert!(output.success);
    let report = parse(&output.stdout);
    assert!(report.get("submitted").is_none());

    let written: Value = serde_json::from_str(&fs::read_to_string(&target).unwrap()).unwrap();
    assert_eq!(written, json!({ "email": "anna@example.com", "password": "hunter2" }));
}

#[tokio::test]
async fn test_form_edit_and_invalid_submit() {
    let dir = TempDir::new().unwrap();
    let existing = write(&dir, "login.json", r#"{ "email": "anna@example.com", "password": "x" }"#);
    let events = write(
        &dir,
        "events.json",
        r#"[
  { "type": "set", "path": "email", "value": "broken" },
  { "type": "submit" },
  { "type": "set", "path": "nickname", "value": "anna" }
]"#,
    );
    let definition = write(
        &dir,
        "login.yaml",
        "form_version: \"1.0\"\nform:\n  id: login\n  title: Sign in\n  schema_ref: login\n",
    );
    let args = form::FormArgs {
        definition,
        events,
        edit: Some(existing),
        output: None,
    };

    let output = form::run(args, &CliConfig::default()).await.unwrap();
    assert!(!output.success);
    let report = parse(&output.stdout);
    let codes: Vec<Value> = report["outcomes"]
        .as_array()
        .unwrap()
        .iter()
        .map(|o| o["code"].clone())
        .collect();
    assert_eq!(
        codes,
        vec![
            Value::Null,
            json!("ERR_FORM_VALIDATION_FAILED"),
            json!("ERR_FORM_INVALID_PATH"),
        ]
    );
    assert_eq!(report["session"]["state"], json!("editing"));
    assert_eq!(report["session"]["record"]["password"], json!("x"));
    assert_eq!(report["session"]["errors"][0]["path"], json!("email"));
    assert!(report.get("submitted").is_none());
}

#[test]
fn test_table_renders_first_page() {
    let args = table_args(demos().join("tables/users.yaml"), demos().join("tables/users.json"));

    let output = table::run(args, &CliConfig::default()).unwrap();
    assert!(output.success);
    let view = parse(&output.stdout);
    assert_eq!(view["table"], json!("users"));
    assert_eq!(view["rows"].as_array().unwrap().len(), 5);
    assert_eq!(view["page"]["page_count"], json!(2));
    assert_eq!(view["page"]["has_next"], json!(true));
}

#[test]
fn test_table_search_sort_and_page() {
    let mut args = table_args(demos().join("tables/users.yaml"), demos().join("tables/users.json"));
    args.search = Some("anna".to_string());
    args.sort = vec!["name:desc".to_string()];
    args.page = Some(4);
    args.hide = vec!["email".to_string()];

    let output = table::run(args, &CliConfig::default()).unwrap();
    let view = parse(&output.stdout);
    let names: Vec<&str> = view["rows"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["Anna Müller", "Anna Fischer"]);
    assert_eq!(view["page"]["page_index"], json!(0));
    assert!(!view["columns"].as_array().unwrap().contains(&json!("email")));
}

#[test]
fn test_table_export_filtered_rows() {
    let mut args = table_args(demos().join("tables/users.yaml"), demos().join("tables/users.json"));
    args.filter = vec!["role=admin".to_string()];
    args.sort = vec!["name".to_string()];
    args.export = true;

    let output = table::run(args, &CliConfig::default()).unwrap();
    assert_eq!(
        output.stdout,
        "Name,Email,Role,Department,Status,Last login\n\
         Max Mustermann,user1@example.com,admin,Engineering,active,2024-05-02\n\
         Peter Klein,user5@example.com,admin,Finance,inactive,2024-05-11\n"
    );
}

#[test]
fn test_table_export_selected_rows_with_delimiter() {
    let mut args = table_args(demos().join("tables/users.yaml"), demos().join("tables/users.json"));
    args.select = vec!["7".to_string(), "2".to_string()];
    args.hide = vec!["email".to_string(), "lastLogin".to_string()];
    args.export = true;
    args.delimiter = Some(";".to_string());

    let output = table::run(args, &CliConfig::default()).unwrap();
    assert_eq!(
        output.stdout,
        "Name;Role;Department;Status\n\
         Maria Schmidt;user;Marketing;inactive\n\
         Thomas Becker;editor;Engineering;active\n"
    );
}

#[test]
fn test_table_rejects_bad_arguments() {
    let mut bad_filter = table_args(demos().join("tables/users.yaml"), demos().join("tables/users.json"));
    bad_filter.filter = vec!["role".to_string()];
    assert!(matches!(
        table::run(bad_filter, &CliConfig::default()),
        Err(CliError::InvalidArgument(_))
    ));

    let mut unknown_column = table_args(demos().join("tables/users.yaml"), demos().join("tables/users.json"));
    unknown_column.sort = vec!["salary".to_string()];
    let err = table::run(unknown_column, &CliConfig::default()).unwrap_err();
    assert_eq!(err.error_code(), "ERR_TABLE_UNKNOWN_COLUMN");

    let mut fixed_column = table_args(demos().join("tables/users.yaml"), demos().join("tables/users.json"));
    fixed_column.hide = vec!["actions".to_string()];
    let err = table::run(fixed_column, &CliConfig::default()).unwrap_err();
    assert_eq!(err.error_code(), "ERR_TABLE_COLUMN_NOT_CAPABLE");
}

#[test]
fn test_table_flags_override_environment_before_validation() {
    let env = |key: &str| match key {
        "FORMGRID_PAGE_SIZE" => Some("0".to_string()),
        "FORMGRID_JSON_LOGS" => Some("sometimes".to_string()),
        _ => None,
    };

    let mut config = CliConfig::from_lookup(env).unwrap();
    assert_eq!(config.warnings, vec!["Invalid FORMGRID_JSON_LOGS value: sometimes".to_string()]);
    let cli = Cli::try_parse_from(["formgrid", "schemas"]).unwrap();
    cli.apply_to(&mut config).unwrap();
    assert!(matches!(config.validate(), Err(CliError::Config(_))));

    let mut config = CliConfig::from_lookup(env).unwrap();
    let cli = Cli::try_parse_from([
        "formgrid",
        "table",
        "--config",
        "users.yaml",
        "users.json",
        "--page-size",
        "5",
        "--delimiter",
        "tab",
    ])
    .unwrap();
    cli.apply_to(&mut config).unwrap();
    assert!(config.validate().is_ok());
    assert_eq!(config.page_size, 5);
    assert_eq!(config.csv_delimiter, '\t');
}
