use async_trait::async_trait;
use clap::Args;
use formgrid_core::form::{parse_form_definition, FormSession, FormSnapshot, SubmitError, SubmitHandler};
use formgrid_core::CoreError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

use crate::commands::{load_registry, read_file, read_json, to_pretty_json, CommandOutput};
use crate::config::CliConfig;
use crate::error::CliResult;

#[derive(Args, Debug)]
pub struct FormArgs {
    /// Form definition (YAML)
    #[arg(long)]
    pub definition: PathBuf,

    /// JSON array of events to replay
    #[arg(long)]
    pub events: PathBuf,

    /// Existing record to edit instead of starting empty
    #[arg(long)]
    pub edit: Option<PathBuf>,

    /// Where a successful submission writes the record (default: included in stdout)
    #[arg(long)]
    pub output: Option<PathBuf>,
}

/// One replayed user interaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FormCommand {
    Set { path: String, value: Value },
    Next,
    Prev,
    Add { path: String },
    Remove { path: String, index: usize },
    Reset,
    Submit,
    Cancel,
}

#[derive(Debug, Serialize)]
struct Outcome {
    event: FormCommand,
    ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    code: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
}

#[derive(Debug, Serialize)]
struct Report {
    outcomes: Vec<Outcome>,
    session: FormSnapshot,
    #[serde(skip_serializing_if = "Option::is_none")]
    submitted: Option<Value>,
}

/// Submit handler that keeps the record and optionally writes it to a file
#[derive(Debug, Default)]
pub struct RecordSink {
    output: Option<PathBuf>,
    submitted: Mutex<Option<Value>>,
}

impl RecordSink {
    pub fn new(output: Option<PathBuf>) -> Self {
        RecordSink {
            output,
            submitted: Mutex::new(None),
        }
    }

    /// The last record received
    pub fn submitted(&self) -> Option<Value> {
        self.submitted.lock().ok().and_then(|s| s.clone())
    }
}

#[async_trait]
impl SubmitHandler for RecordSink {
    async fn submit(&self, record: &Value) -> Result<(), SubmitError> {
        if let Some(path) = &self.output {
            let body = serde_json::to_string_pretty(record).map_err(|e| SubmitError::Other(e.to_string()))?;
            tokio::fs::write(path, body)
                .await
                .map_err(|e| SubmitError::Other(format!("{}: {}", path.display(), e)))?;
            info!(path = %path.display(), "Wrote submitted record");
        }
        if let Ok(mut slot) = self.submitted.lock() {
            *slot = Some(record.clone());
        }
        Ok(())
    }
}

/// Replay the events and print the outcome of each plus the final session
pub async fn run(args: FormArgs, config: &CliConfig) -> CliResult<CommandOutput> {
    let registry = load_registry(config)?;
    let definition = Arc::new(parse_form_definition(&read_file(&args.definition)?, &registry)?);
    let events: Vec<FormCommand> = read_json(&args.events)?;

    let mut session = match &args.edit {
        Some(path) => FormSession::edit(Arc::clone(&definition), &read_json::<Value>(path)?),
        None => FormSession::new(Arc::clone(&definition)),
    };
    let sink = RecordSink::new(args.output.clone());

    let mut outcomes = Vec::with_capacity(events.len());
    for event in events {
        let result = apply(&mut session, &event, &sink).await;
        outcomes.push(match result {
            Ok(()) => Outcome {
                event,
                ok: true,
                code: None,
                message: None,
            },
            Err(err) => {
                warn!(error = %err, "Event rejected");
                Outcome {
                    event,
                    ok: false,
                    code: Some(err.error_code()),
                    message: Some(err.to_string()),
                }
            }
        });
    }

    let success = outcomes.iter().all(|o| o.ok);
    for event in session.take_events() {
        debug!(event = event.event.event_type(), at = %event.timestamp, "Session event");
    }
    let report = Report {
        outcomes,
        session: session.snapshot(),
        submitted: if args.output.is_none() { sink.submitted() } else { None },
    };

    let out = to_pretty_json(&report)? + "\n";
    Ok(if success {
        CommandOutput::ok(out)
    } else {
        CommandOutput::failed(out)
    })
}

async fn apply(session: &mut FormSession, event: &FormCommand, sink: &RecordSink) -> Result<(), CoreError> {
    match event {
        FormCommand::Set { path, value } => session.set_field(path, value.clone()),
        FormCommand::Next => session.next_step().map(|_| ()),
        FormCommand::Prev => session.previous_step().map(|_| ()),
        FormCommand::Add { path } => session.add_entry(path).map(|_| ()),
        FormCommand::Remove { path, index } => session.remove_entry(path, *index).map(|_| ()),
        FormCommand::Reset => session.reset(),
        FormCommand::Submit => session.submit(sink).await,
        FormCommand::Cancel => {
            session.cancel();
            Ok(())
        }
    }
}
