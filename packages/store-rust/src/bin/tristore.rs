//! `TriStore` command-line tool
//!
//! Stores JSON documents in one record table of a redb file.
//!
//! # Usage
//!
//! ```bash
//! # Store a document (the body is any JSON value)
//! tristore --path notes.redb put n1 '{"text":"hello"}' --type memo
//!
//! # Fetch it back
//! tristore --path notes.redb get n1
//!
//! # Newest three memos created in a window
//! tristore --path notes.redb query --type memo --created-from 0 \
//!     --created-to 1900000000000 --order-by created --direction desc --limit 3
//!
//! # Select the table through the environment
//! TRISTORE_PATH=notes.redb TRISTORE_TABLE=journal tristore count
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;
use tristore::{
    Column, ConflictPolicy, DatabaseConfig, Direction, EngineConfig, JsonCodec, Record,
    RecordMeta, RecordTable, DEFAULT_DATABASE_NAME,
};

/// `TriStore` command-line tool
#[derive(Parser, Debug)]
#[command(
    name = "tristore",
    version,
    about = "Store and query JSON documents in a TriStore table"
)]
struct Args {
    /// Database file
    #[arg(short = 'p', long, default_value = "tristore.redb", env = "TRISTORE_PATH")]
    path: PathBuf,

    /// Table holding the documents
    #[arg(short = 't', long, default_value = "documents", env = "TRISTORE_TABLE")]
    table: String,

    /// Logical database name
    #[arg(long, default_value = DEFAULT_DATABASE_NAME)]
    database: String,

    /// Schema version; raising it drops and recreates the table
    #[arg(long, default_value_t = 1)]
    schema_version: u32,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Store a document
    Put {
        /// Document id
        id: String,
        /// Document body as JSON
        body: String,
        /// Type discriminator
        #[arg(long = "type")]
        record_type: Option<String>,
        /// Creation time in epoch millis (defaults to now)
        #[arg(long)]
        created: Option<i64>,
        /// What to do when the id already exists
        #[arg(long, value_enum, default_value = "replace")]
        policy: PolicyArg,
    },
    /// Print the document stored under an id
    Get { id: String },
    /// Print every document matching the given constraints
    Query(QueryArgs),
    /// Print the number of stored documents
    Count,
    /// Delete the document stored under an id
    Delete { id: String },
    /// Delete every document
    Clear,
}

#[derive(clap::Args, Debug)]
struct QueryArgs {
    /// Lower id bound (string comparison, needs --id-to)
    #[arg(long)]
    id_from: Option<String>,
    /// Upper id bound (string comparison, needs --id-from)
    #[arg(long)]
    id_to: Option<String>,
    /// Exact type
    #[arg(long = "type")]
    record_type: Option<String>,
    /// Earliest creation time in epoch millis (needs --created-to)
    #[arg(long, allow_negative_numbers = true)]
    created_from: Option<i64>,
    /// Latest creation time in epoch millis (needs --created-from)
    #[arg(long, allow_negative_numbers = true)]
    created_to: Option<i64>,
    /// Column to sort by
    #[arg(long, value_enum)]
    order_by: Option<ColumnArg>,
    /// Sort direction
    #[arg(long, value_enum, default_value = "asc")]
    direction: DirectionArg,
    /// Maximum number of documents
    #[arg(long)]
    limit: Option<usize>,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum ColumnArg {
    Id,
    Type,
    Data,
    Created,
}

impl From<ColumnArg> for Column {
    fn from(arg: ColumnArg) -> Self {
        match arg {
            ColumnArg::Id => Column::Id,
            ColumnArg::Type => Column::Type,
            ColumnArg::Data => Column::Data,
            ColumnArg::Created => Column::Created,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum DirectionArg {
    Asc,
    Desc,
    None,
}

impl From<DirectionArg> for Direction {
    fn from(arg: DirectionArg) -> Self {
        match arg {
            DirectionArg::Asc => Direction::Asc,
            DirectionArg::Desc => Direction::Desc,
            DirectionArg::None => Direction::None,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum PolicyArg {
    Abort,
    Fail,
    Ignore,
    Replace,
    Rollback,
}

impl From<PolicyArg> for ConflictPolicy {
    fn from(arg: PolicyArg) -> Self {
        match arg {
            PolicyArg::Abort => ConflictPolicy::Abort,
            PolicyArg::Fail => ConflictPolicy::Fail,
            PolicyArg::Ignore => ConflictPolicy::Ignore,
            PolicyArg::Replace => ConflictPolicy::Replace,
            PolicyArg::Rollback => ConflictPolicy::Rollback,
        }
    }
}

/// A JSON document with the record header flattened into it.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct Document {
    #[serde(flatten)]
    meta: RecordMeta,
    body: serde_json::Value,
}

impl Record for Document {
    fn meta(&self) -> &RecordMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut RecordMeta {
        &mut self.meta
    }
}

type Documents = RecordTable<Document, JsonCodec>;

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging();

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn run(args: Args) -> Result<()> {
    let config = DatabaseConfig {
        name: args.database,
        version: args.schema_version,
        engine: EngineConfig::Redb {
            path: args.path.clone(),
        },
    };
    let engine = config
        .engine
        .open()
        .with_context(|| format!("failed to open {}", args.path.display()))?;
    let table = Documents::open(engine, &config.table(args.table))?;

    match args.command {
        Command::Put {
            id,
            body,
            record_type,
            created,
            policy,
        } => {
            let body = serde_json::from_str(&body).context("document body is not valid JSON")?;
            let mut meta = RecordMeta::with_id(id);
            meta.set_record_type(record_type);
            if let Some(created) = created {
                meta.set_created_at(created);
            }
            let outcome = table.put_with(&Document { meta, body }, policy.into())?;
            println!("{outcome:?}");
        }
        Command::Get { id } => match table.get(&id)? {
            Some(document) => print_document(&document)?,
            None => anyhow::bail!("no document with id {id}"),
        },
        Command::Query(query) => run_query(&table, query)?,
        Command::Count => println!("{}", table.count()?),
        Command::Delete { id } => {
            let removed = table.delete(&id)?;
            println!("{}", u8::from(removed));
        }
        Command::Clear => println!("{}", table.delete_all()?),
    }
    Ok(())
}

fn run_query(table: &Documents, args: QueryArgs) -> Result<()> {
    let mut builder = table.query();
    if let Some(from) = args.id_from {
        builder.id_from(from);
    }
    if let Some(to) = args.id_to {
        builder.id_to(to);
    }
    if let Some(record_type) = args.record_type {
        builder.record_type(record_type);
    }
    if let Some(from) = args.created_from {
        builder.created_from(from);
    }
    if let Some(to) = args.created_to {
        builder.created_to(to);
    }
    if let Some(column) = args.order_by {
        builder.order(column.into(), args.direction.into());
    }
    if let Some(limit) = args.limit {
        builder.limit(limit);
    }

    let query = builder.build();
    tracing::info!(selection = %query, "query");
    for document in query.query()? {
        print_document(&document)?;
    }
    Ok(())
}

fn print_document(document: &Document) -> Result<()> {
    println!("{}", serde_json::to_string(document)?);
    Ok(())
}
