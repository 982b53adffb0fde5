//! MediAssist: disease risk prediction with feature attribution.
//!
//! Command line boundary. Reads a JSON object of clinical fields and prints
//! the assessment response.
//!
//! ```bash
//! mediassist diabetes input.json
//! echo '{"age": 63, ...}' | mediassist heart_disease -
//! mediassist --status
//! mediassist --schema parkinsons
//! ```

use std::io::Read;
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use serde_json::Value;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use mediassist::adapters::sanitize::SanitizingMakeWriter;
use mediassist::application::{init_global, AssessmentService};
use mediassist::config::EngineConfig;
use mediassist::domain::{AssessmentResponse, ErrorPayload};

const LOG_MODE_ENV: &str = "MEDIASSIST_LOG_MODE";
const LOG_FILE_ENV: &str = "MEDIASSIST_LOG_FILE";

fn usage() -> &'static str {
    concat!(
        "Usage: mediassist <disease> [<input.json> | -]",
        " | mediassist --status | mediassist --schema <disease>"
    )
}

enum Command {
    Status,
    Schema { disease: String },
    Assess { disease: String, input: Option<String> },
}

fn parse_args() -> Result<Command> {
    let mut args = std::env::args().skip(1);
    match args.next().as_deref() {
        Some("--status") => Ok(Command::Status),
        Some("--schema") => match (args.next(), args.next()) {
            (Some(disease), None) => Ok(Command::Schema { disease }),
            _ => bail!(usage()),
        },
        Some("-h" | "--help") | None => bail!(usage()),
        Some(disease) => {
            let disease = disease.to_string();
            let input = args.next();
            if args.next().is_some() {
                bail!(usage());
            }
            Ok(Command::Assess { disease, input })
        }
    }
}

fn read_input(path: Option<&str>) -> Result<serde_json::Map<String, Value>> {
    let text = match path {
        None | Some("-") => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("Failed reading input from stdin")?;
            buf
        }
        Some(path) => {
            std::fs::read_to_string(path).with_context(|| format!("Failed reading {path}"))?
        }
    };

    match serde_json::from_str(&text).context("Input is not valid JSON")? {
        Value::Object(map) => Ok(map),
        _ => bail!("Input must be a JSON object of field names to values"),
    }
}

fn main() -> Result<ExitCode> {
    // stdout carries the JSON response, so logs go to stderr or a file.
    let log_mode = std::env::var(LOG_MODE_ENV).unwrap_or_else(|_| "stderr".to_string());
    let (writer, _guard) = if log_mode == "file" {
        let log_file =
            std::env::var(LOG_FILE_ENV).unwrap_or_else(|_| "mediassist.log".to_string());
        if let Some(parent) = std::path::Path::new(&log_file).parent() {
            // Best-effort: a missing directory surfaces as an open error below.
            let _ = std::fs::create_dir_all(parent);
        }
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_file)
            .with_context(|| format!("Failed to open log file {log_file}"))?;
        tracing_appender::non_blocking(file)
    } else {
        tracing_appender::non_blocking(std::io::stderr())
    };

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(SanitizingMakeWriter::new(writer)),
        )
        .init();

    let command = parse_args()?;
    let config = EngineConfig::from_env()?;
    let registry = init_global(&config);

    let response = match command {
        Command::Status => {
            let status = registry.status();
            println!("{}", serde_json::to_string_pretty(&status)?);
            let all_ready = status.iter().all(|s| s.ready);
            return Ok(if all_ready {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            });
        }
        Command::Schema { disease } => {
            // Fields in model order, with their valid domains and descriptions.
            let profile = registry.get(&disease)?;
            println!("{}", serde_json::to_string_pretty(profile.schema().fields())?);
            return Ok(ExitCode::SUCCESS);
        }
        Command::Assess { disease, input } => match read_input(input.as_deref()) {
            Ok(raw) => AssessmentService::new(registry).respond(&disease, &raw),
            Err(e) => {
                tracing::warn!(error = %e, "Unreadable input");
                AssessmentResponse::failure(
                    disease,
                    ErrorPayload {
                        kind: "invalid_input",
                        message: format!("{e:#}"),
                        fields: Vec::new(),
                    },
                )
            }
        },
    };

    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(if response.success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
