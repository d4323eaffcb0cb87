//! riskcase-runner: headless driver for the detection core.
//!
//! Reads one JSON command per line from stdin (or `--input`), answers one
//! JSON line per command on stdout.
//!
//! Usage:
//!   riskcase-runner --db cases.db --config-dir ./config < feed.jsonl
//!   riskcase-runner --input feed.jsonl

use anyhow::{Context, Result};
use riskcase_core::{
    clock::EngineClock,
    config::EngineConfig,
    domain::{CaseLabel, CaseStatus, Priority, Transaction},
    engine::DetectionEngine,
    store::SqliteStore,
};
use serde_json::{json, Value};
use std::env;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};
use std::path::Path;

#[derive(serde::Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum RunnerCommand {
    Score {
        transaction: Transaction,
    },
    Close {
        case_id: String,
    },
    Escalate {
        case_id: String,
        #[serde(default)]
        label: Option<CaseLabel>,
        #[serde(default)]
        priority: Option<Priority>,
    },
    Note {
        case_id: String,
        author: String,
        message: String,
    },
    Seal {
        case_id: String,
        sealed_by: String,
        #[serde(default)]
        reason: Option<String>,
    },
    Verify {
        case_id: String,
    },
    GetCase {
        case_id: String,
    },
    Timeline {
        case_id: String,
    },
    Quit,
}

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let db = arg_value(&args, "--db").unwrap_or(":memory:");
    let config_dir = arg_value(&args, "--config-dir").unwrap_or("./config");
    let input = arg_value(&args, "--input");

    let config = EngineConfig::load(Path::new(config_dir))
        .with_context(|| format!("loading configuration from {config_dir}"))?;

    let store = SqliteStore::open(db)?;
    store.migrate()?;

    let mut engine = DetectionEngine::build(config, &store, EngineClock::System)?;

    let reader: Box<dyn BufRead> = match input {
        Some(path) => Box::new(BufReader::new(
            File::open(path).with_context(|| format!("opening {path}"))?,
        )),
        None => Box::new(BufReader::new(io::stdin())),
    };

    run_loop(&mut engine, reader, &mut io::stdout())?;
    print_summary(&engine)
}

fn run_loop<R: BufRead, W: Write>(
    engine: &mut DetectionEngine<'_, SqliteStore>,
    mut reader: R,
    out: &mut W,
) -> Result<()> {
    let mut buffer = String::new();

    loop {
        buffer.clear();
        let bytes_read = reader.read_line(&mut buffer)?;
        if bytes_read == 0 {
            break; // EOF
        }
        if buffer.trim().is_empty() {
            continue;
        }

        let response = match serde_json::from_str::<RunnerCommand>(&buffer) {
            Ok(RunnerCommand::Quit) => break,
            Ok(cmd) => handle(engine, cmd).unwrap_or_else(|e| {
                log::warn!("Command failed: {e}");
                json!({ "error": e.to_string() })
            }),
            Err(e) => json!({ "error": e.to_string() }),
        };
        writeln!(out, "{response}")?;
        out.flush()?;
    }
    Ok(())
}

fn handle(engine: &mut DetectionEngine<'_, SqliteStore>, cmd: RunnerCommand) -> Result<Value> {
    let response = match cmd {
        // Handled by the read loop.
        RunnerCommand::Quit => Value::Null,
        RunnerCommand::Score { transaction } => {
            serde_json::to_value(engine.process_transaction(&transaction)?)?
        }
        RunnerCommand::Close { case_id } => {
            json!({ "case_id": case_id, "ok": engine.close_case(&case_id)? })
        }
        RunnerCommand::Escalate {
            case_id,
            label,
            priority,
        } => {
            let ok = engine.escalate_case(&case_id, label, priority)?;
            json!({ "case_id": case_id, "ok": ok })
        }
        RunnerCommand::Note {
            case_id,
            author,
            message,
        } => {
            let ok = engine.add_note(&case_id, &author, &message)?;
            json!({ "case_id": case_id, "ok": ok })
        }
        RunnerCommand::Seal {
            case_id,
            sealed_by,
            reason,
        } => match engine.seal_case(&case_id, &sealed_by, reason.as_deref())? {
            Some(record) => json!({
                "case_id": record.case_id,
                "merkle_root": record.merkle_root,
                "ok": true,
            }),
            None => json!({ "case_id": case_id, "ok": false }),
        },
        RunnerCommand::Verify { case_id } => {
            json!({ "case_id": case_id, "intact": engine.verify_seal(&case_id)? })
        }
        RunnerCommand::GetCase { case_id } => match engine.get_case(&case_id)? {
            Some(case) => serde_json::to_value(case)?,
            None => json!({ "case_id": case_id, "error": "unknown case" }),
        },
        RunnerCommand::Timeline { case_id } => {
            json!({ "case_id": case_id, "events": engine.case_timeline(&case_id)? })
        }
    };
    Ok(response)
}

fn print_summary(engine: &DetectionEngine<'_, SqliteStore>) -> Result<()> {
    let cases = engine.list_cases()?;
    let count = |status: CaseStatus| cases.iter().filter(|c| c.status == status).count();
    log::info!(
        "Run finished: {} cases (open {}, in review {}, escalated {}, closed {})",
        cases.len(),
        count(CaseStatus::Open),
        count(CaseStatus::InReview),
        count(CaseStatus::Escalated),
        count(CaseStatus::Closed),
    );
    Ok(())
}

fn arg_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.windows(2)
        .find(|w| w[0] == flag)
        .map(|w| w[1].as_str())
}
