//! # evtrack CLI
//!
//! Operator tool over a SQLite-backed tracker.
//!
//! ## Usage
//! ```bash
//! # Queue an event (values that parse as JSON keep their type)
//! evtrack --url https://collector.example.com track submission a=b count=3
//!
//! # Properties as one JSON object; key=value pairs override its keys
//! evtrack --url https://collector.example.com track checkout -p '{"cart": [1, 2]}' total=9
//!
//! # Deliver the backlog and flush once
//! evtrack --url https://collector.example.com flush
//!
//! # Show pending count, identity, storage health and delivery stats
//! evtrack --db ./evtrack.db --url http://localhost:8080 status
//! ```
//!
//! Each invocation is its own session, so `flush` always starts a fresh
//! generated identity after delivering the backlog.

use std::env;
use std::path::PathBuf;
use std::sync::Arc;

use evtrack_core::Properties;
use evtrack_db::migrations::migration_status;
use evtrack_db::{Database, DbConfig};
use evtrack_sync::{FlushOutcome, Tracker, TrackerConfig};
use serde_json::Value;
use tracing_subscriber::EnvFilter;

enum Command {
    Track {
        event_type: String,
        properties: Properties,
    },
    Flush,
    Status,
}

fn print_help() {
    println!("evtrack - event tracker CLI");
    println!();
    println!("Usage: evtrack [OPTIONS] <COMMAND>");
    println!();
    println!("Commands:");
    println!("  track <event_type> [key=value ...]   Queue an event");
    println!("  flush                                Deliver backlog and flush once");
    println!("  status                               Print queue and identity status");
    println!();
    println!("Options:");
    println!("  -c, --config <PATH>   Config file (default: platform config dir)");
    println!("  -d, --db <PATH>       Database file path");
    println!("  -u, --url <URL>       Collector base URL");
    println!("  -p, --props <JSON>    Event properties as a JSON object (track)");
    println!("  -h, --help            Show this help message");
}

/// Parses `key=value`; values that are valid JSON keep their JSON type.
fn parse_property(pair: &str) -> Option<(String, Value)> {
    let (key, raw) = pair.split_once('=')?;
    if key.is_empty() {
        return None;
    }
    let value = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
    Some((key.to_string(), value))
}

/// Builds the base property bag from `--props`. Absent or `null` is empty.
fn base_properties(json: Option<&str>) -> Result<Properties, Box<dyn std::error::Error>> {
    let Some(json) = json else {
        return Ok(Properties::new());
    };
    let value: Value = serde_json::from_str(json)?;
    Ok(Properties::from_value(value)?)
}

/// Log filter defaults to `info,evtrack=debug,sqlx=warn`; `RUST_LOG` wins.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,evtrack=debug,sqlx=warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn describe(outcome: &FlushOutcome) -> String {
    match outcome {
        FlushOutcome::Empty => "nothing to send".to_string(),
        FlushOutcome::InFlight => "delivery already in flight".to_string(),
        FlushOutcome::Sent { count } => format!("sent {count} event(s)"),
        FlushOutcome::Failed { count, error } => {
            format!("failed to send {count} event(s): {error}")
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();

    let mut config_path: Option<PathBuf> = None;
    let mut db_path: Option<PathBuf> = None;
    let mut url: Option<String> = None;
    let mut props_json: Option<String> = None;
    let mut positional: Vec<String> = Vec::new();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--config" | "-c" => {
                if i + 1 < args.len() {
                    config_path = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                }
            }
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                }
            }
            "--url" | "-u" => {
                if i + 1 < args.len() {
                    url = Some(args[i + 1].clone());
                    i += 1;
                }
            }
            "--props" | "-p" => {
                if i + 1 < args.len() {
                    props_json = Some(args[i + 1].clone());
                    i += 1;
                }
            }
            "--help" | "-h" => {
                print_help();
                return Ok(());
            }
            other => positional.push(other.to_string()),
        }
        i += 1;
    }

    let command = match positional.first().map(String::as_str) {
        Some("track") => {
            let Some(event_type) = positional.get(1) else {
                eprintln!("track requires an event type");
                print_help();
                std::process::exit(2);
            };

            let mut properties = base_properties(props_json.as_deref())?;
            for pair in &positional[2..] {
                match parse_property(pair) {
                    Some((key, value)) => {
                        properties.insert(key, value);
                    }
                    None => eprintln!("Ignoring malformed property '{pair}' (expected key=value)"),
                }
            }

            Command::Track {
                event_type: event_type.clone(),
                properties,
            }
        }
        Some("flush") => Command::Flush,
        Some("status") => Command::Status,
        _ => {
            print_help();
            std::process::exit(2);
        }
    };

    init_tracing();

    let mut config = TrackerConfig::load_unvalidated(config_path)?;
    if let Some(url) = url {
        config.tracker.url = Some(url);
    }
    if let Some(path) = db_path {
        config.storage.database_path = Some(path);
    }
    config.validate()?;

    let database_path = config
        .database_path()
        .ok_or("No database path available; pass --db")?;
    if let Some(parent) = database_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let db = Arc::new(Database::new(DbConfig::new(&database_path)).await?);
    let tracker = Tracker::builder(config).with_storage(db.clone()).build()?;

    match command {
        Command::Track {
            event_type,
            properties,
        } => {
            tracker.track(&event_type, properties).await;
            println!("Queued '{}' ({} pending)", event_type, tracker.pending_count().await);
        }
        Command::Flush => {
            let backlog = tracker.initialize().await;
            println!("Backlog: {}", describe(&backlog));

            let flushed = tracker.flush().await;
            println!("Flush: {}", describe(&flushed));
        }
        Command::Status => {
            println!("Tracker:  {}", tracker.name());
            println!("Endpoint: {}", tracker.endpoint());
            println!("Database: {}", database_path.display());

            let healthy = db.health_check().await;
            let (total, applied) = migration_status(db.pool()).await?;
            let kv = db.kv();
            let own_keys = kv.keys_with_prefix(&format!("{}::", tracker.name())).await?;
            println!(
                "Storage:  {} (migrations {applied}/{total}, {} of {} keys owned)",
                if healthy { "ok" } else { "unreachable" },
                own_keys.len(),
                kv.count().await?
            );

            match tracker.current_identity().await? {
                Some(identity) if identity.is_identified() => {
                    println!("Identity: {} (identified)", identity.id())
                }
                Some(identity) => println!("Identity: {} (generated)", identity.id()),
                None => println!("Identity: none (not initialized)"),
            }

            let status = tracker.status().await;
            println!("{}", serde_json::to_string_pretty(&status)?);
        }
    }

    db.close().await;
    Ok(())
}
