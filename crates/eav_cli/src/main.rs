//! Command-line front end for an EAV store file.
//!
//! # Responsibility
//! - Map subcommands onto `eav_core` repository calls.
//! - Print entities and attributes as one JSON document per line.
//!
//! # Invariants
//! - Every failure exits with code 1 and a single `error:` line on stderr.

use clap::{Args, Parser, Subcommand};
use eav_core::db::open_db;
use eav_core::{
    default_log_level, init_logging, AttributeRepository, EntityListQuery, EntityOrderColumn,
    EntityRepository, EntityStatus, SortDirection, SqliteEntityRepository,
};
use log::info;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::ExitCode;

type CliResult = Result<(), Box<dyn std::error::Error>>;

#[derive(Debug, Parser)]
#[command(name = "eav", version, about = "Inspect and edit an entity-attribute-value store")]
struct Cli {
    /// SQLite database file; created and migrated when missing.
    #[arg(long, env = "EAV_DB_PATH", default_value = "eav.sqlite3")]
    db: PathBuf,

    /// Absolute directory for rolling log files. Logging is off when unset.
    #[arg(long, env = "EAV_LOG_DIR")]
    log_dir: Option<String>,

    /// One of trace|debug|info|warn|error. Defaults by build profile.
    #[arg(long, env = "EAV_LOG_LEVEL")]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Create an entity, optionally with `key=value` attributes.
    Create {
        kind: String,
        #[arg(value_parser = parse_pair)]
        attributes: Vec<(String, String)>,
    },
    /// Print an entity, or one of its attribute values.
    Get { entity_id: String, key: Option<String> },
    /// Upsert raw `key=value` attributes in one transaction.
    Set {
        entity_id: String,
        #[arg(required = true, value_parser = parse_pair)]
        attributes: Vec<(String, String)>,
    },
    /// Upsert one attribute from a JSON document.
    SetJson {
        entity_id: String,
        key: String,
        json: String,
    },
    /// Print the first entity of a type whose attribute equals a value.
    Find { kind: String, key: String, value: String },
    /// Print every entity of a type whose attribute equals a value.
    ListBy { kind: String, key: String, value: String },
    /// Print one page of entities of a type.
    List(ListArgs),
    /// Print the number of live entities of a type.
    Count { kind: String },
    /// Delete an entity and all of its attributes.
    Delete { entity_id: String },
    /// Switch an entity between `active` and `inactive`.
    Status {
        entity_id: String,
        status: EntityStatus,
    },
}

#[derive(Debug, Args)]
struct ListArgs {
    kind: String,
    #[arg(long, default_value_t = 0)]
    offset: u64,
    /// Rows per page; 0 lists everything.
    #[arg(long, default_value_t = 20)]
    per_page: u64,
    #[arg(long, default_value = "created_at")]
    order_by: EntityOrderColumn,
    #[arg(long, default_value = "asc")]
    sort: SortDirection,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Some(log_dir) = cli.log_dir.as_deref() {
        let level = cli.log_level.as_deref().unwrap_or_else(|| default_log_level());
        if let Err(err) = init_logging(level, log_dir) {
            eprintln!("error: {err}");
            return ExitCode::FAILURE;
        }
    }

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> CliResult {
    let conn = open_db(&cli.db)?;
    let repo = SqliteEntityRepository::try_new(&conn)?;
    info!(
        "event=cli_command module=cli status=start db={}",
        cli.db.display()
    );

    match &cli.command {
        Command::Create { kind, attributes } => {
            let attributes: BTreeMap<String, String> = attributes.iter().cloned().collect();
            let entity = repo.create_with_attributes(kind, &attributes)?;
            print_json(&entity)
        }
        Command::Get { entity_id, key } => {
            let Some(entity) = repo.find_by_id(entity_id)? else {
                return Err(format!("entity not found: {entity_id}").into());
            };
            match key {
                Some(key) => match repo.attributes().find_by_key(&entity.id, key)? {
                    Some(attribute) => print_json(&attribute),
                    None => Err(format!("attribute not set: {key}").into()),
                },
                None => {
                    print_json(&entity)?;
                    for attribute in repo.attributes().list_for_entity(&entity.id)? {
                        print_json(&attribute)?;
                    }
                    Ok(())
                }
            }
        }
        Command::Set {
            entity_id,
            attributes,
        } => {
            let attributes: BTreeMap<String, String> = attributes.iter().cloned().collect();
            repo.attributes().batch_upsert(entity_id, &attributes)?;
            Ok(())
        }
        Command::SetJson {
            entity_id,
            key,
            json,
        } => {
            let value: Value = serde_json::from_str(json)?;
            let attribute = repo.attributes().upsert_json(entity_id, key, &value)?;
            print_json(&attribute)
        }
        Command::Find { kind, key, value } => match repo.find_by_attribute(kind, key, value)? {
            Some(entity) => print_json(&entity),
            None => Err(format!("no {kind} with {key}={value}").into()),
        },
        Command::ListBy { kind, key, value } => {
            for entity in repo.list_by_attribute(kind, key, value)? {
                print_json(&entity)?;
            }
            Ok(())
        }
        Command::List(args) => {
            let query = EntityListQuery {
                kind: args.kind.clone(),
                offset: args.offset,
                per_page: args.per_page,
                search: None,
                order_by: args.order_by,
                direction: args.sort,
            };
            for entity in repo.list(&query)? {
                print_json(&entity)?;
            }
            Ok(())
        }
        Command::Count { kind } => {
            println!("{}", repo.count(kind)?);
            Ok(())
        }
        Command::Delete { entity_id } => {
            repo.delete(entity_id)?;
            Ok(())
        }
        Command::Status { entity_id, status } => {
            repo.set_status(entity_id, *status)?;
            Ok(())
        }
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> CliResult {
    println!("{}", serde_json::to_string(value)?);
    Ok(())
}

fn parse_pair(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected key=value, got `{raw}`")),
    }
}
