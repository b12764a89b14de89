//! `tracker-sparql`: run SPARQL queries and updates against the Tracker store
//! from the shell.
//!
//! ```text
//! tracker-sparql query 'SELECT ?s WHERE { ?s a rdfs:Resource } LIMIT 5'
//! tracker-sparql --json stats
//! echo 'INSERT DATA { <urn:x> a rdfs:Resource }' | tracker-sparql update -
//! ```
//!
//! Logging goes to stderr and is controlled with `RUST_LOG` (default `warn`).

use std::io::{self, Read as _, Write};

use clap::{Parser, Subcommand};
use eyre::{Context as _, Result};
use tracing::debug;
use tracing_subscriber::EnvFilter;
use tracker_sparql::config::{
    DEFAULT_LIBRARY, DEFAULT_UPDATE_PRIORITY, LIBRARY_ENV, UPDATE_PRIORITY_ENV,
};
use tracker_sparql::{Binding, Cursor, Tracker, TrackerConfig};

#[derive(Debug, Parser)]
#[command(name = "tracker-sparql")]
#[command(version, about = "Query and update the Tracker RDF store", long_about = None)]
struct Cli {
    /// Library name or path of libtracker-sparql.
    #[arg(long, global = true, env = LIBRARY_ENV, default_value = DEFAULT_LIBRARY)]
    library: String,

    /// Priority passed with updates.
    #[arg(
        long,
        global = true,
        env = UPDATE_PRIORITY_ENV,
        default_value_t = DEFAULT_UPDATE_PRIORITY,
        allow_negative_numbers = true
    )]
    priority: i32,

    /// Print each row as a JSON array of bindings.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run a query and print the result rows
    Query {
        /// SPARQL text, or `-` to read it from stdin
        sparql: String,
    },

    /// Run an `INSERT DATA` / `DELETE DATA` update
    Update {
        /// SPARQL text, or `-` to read it from stdin
        sparql: String,
    },

    /// Print the number of resources per class
    Stats,

    /// Print a fresh `urn:uuid:` IRI
    Uuid,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    run(Cli::parse())
}

fn run(cli: Cli) -> Result<()> {
    let config = TrackerConfig {
        library: cli.library,
        update_priority: cli.priority,
    };
    let tracker = Tracker::init(config).wrap_err("failed to load libtracker-sparql")?;
    let stdout = io::stdout();
    let mut out = stdout.lock();

    match cli.command {
        Command::Uuid => {
            writeln!(out, "{}", tracker.uuid_urn()?)?;
        }
        Command::Update { sparql } => {
            let sparql = read_sparql(&sparql)?;
            let conn = tracker.connect()?;
            conn.update(&sparql).wrap_err("update failed")?;
            conn.close();
        }
        Command::Query { sparql } => {
            let sparql = read_sparql(&sparql)?;
            let conn = tracker.connect()?;
            let cursor = conn.query(&sparql).wrap_err("query failed")?;
            print_rows(cursor, cli.json, &mut out)?;
            conn.close();
        }
        Command::Stats => {
            let conn = tracker.connect()?;
            let cursor = conn.statistics().wrap_err("statistics query failed")?;
            print_rows(cursor, cli.json, &mut out)?;
            conn.close();
        }
    }
    out.flush()?;
    Ok(())
}

fn read_sparql(arg: &str) -> Result<String> {
    if arg != "-" {
        return Ok(arg.to_owned());
    }
    let mut sparql = String::new();
    io::stdin()
        .read_to_string(&mut sparql)
        .wrap_err("failed to read SPARQL from stdin")?;
    Ok(sparql)
}

/// Drains `cursor`, writing a header line before the first row unless `json`.
fn print_rows(mut cursor: Cursor<'_>, json: bool, out: &mut impl Write) -> Result<usize> {
    let mut rows = 0;
    while let Some(row) = cursor.next_row()? {
        if json {
            serde_json::to_writer(&mut *out, &row)?;
            writeln!(out)?;
        } else {
            if rows == 0 {
                writeln!(out, "{}", header_line(&row))?;
            }
            writeln!(out, "{}", row_line(&row))?;
        }
        rows += 1;
    }
    cursor.close();
    debug!(rows, "result printed");
    Ok(rows)
}

fn header_line(row: &[Binding]) -> String {
    row.iter()
        .map(|binding| format!("?{}", binding.name))
        .collect::<Vec<_>>()
        .join("\t")
}

fn row_line(row: &[Binding]) -> String {
    row.iter()
        .map(|binding| escape(&binding.value.to_string()))
        .collect::<Vec<_>>()
        .join("\t")
}

fn escape(cell: &str) -> String {
    cell.replace('\\', "\\\\")
        .replace('\t', "\\t")
        .replace('\n', "\\n")
}
