//! chatgraph CLI
//!
//! Demo front-end for a Dgraph-backed chat graph:
//! - provision the schema (`schema`)
//! - bulk-load the CSV exports (`load`)
//! - run the fixed queries (`groups-by-user`, `messages`, `statuses`, `users`, `search`)
//! - delete statuses up to a date, or everything (`delete-statuses`, `drop-all`)
//! - the numbered interactive menu (`menu`)

use anyhow::{bail, Context, Result};
use chatgraph_dgraph::HttpClient;
use chatgraph_loader::{apply_schema, create_all, drop_all, LoadOptions};
use chatgraph_queries as queries;
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::fs;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod config;
mod menu;
mod print;

use config::ConnectionArgs;
use print::Output;

#[derive(Parser)]
#[command(name = "chatgraph")]
#[command(author, version, about = "chatgraph: a chat/social graph demo on Dgraph")]
struct Cli {
    #[command(flatten)]
    connection: ConnectionArgs,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    /// More logging (-v info, -vv debug); RUST_LOG overrides
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate and apply the schema
    Schema {
        /// Print the rendered schema instead of applying it
        #[arg(long)]
        print: bool,
        /// Write the schema artifact as JSON to this path instead of applying it
        #[arg(long)]
        export: Option<PathBuf>,
    },

    /// Apply the schema, then load users, groups, messages and statuses
    Load {
        /// On failure, delete every entity this run created
        #[arg(long)]
        compensate: bool,
        /// Skip applying the schema first
        #[arg(long)]
        no_schema: bool,
    },

    /// Groups a user (by exact name) belongs to
    GroupsByUser { name: String },

    /// First n messages sent from one phone number to another
    Messages {
        from: i64,
        to: i64,
        #[arg(short = 'n', long, default_value_t = 10)]
        limit: i64,
    },

    /// Statuses ordered by date, one page at a time
    Statuses {
        #[arg(long, default_value_t = 10)]
        first: i64,
        #[arg(long, default_value_t = 0)]
        offset: i64,
    },

    /// Number of users and their information
    Users,

    /// Full-text search over message content
    Search {
        #[arg(required = true)]
        terms: Vec<String>,
    },

    /// Delete statuses posted on or before a date (YYYY-MM-DD or RFC 3339)
    DeleteStatuses { date: String },

    /// Drop every node, edge and predicate
    DropAll {
        /// Required; this cannot be undone
        #[arg(long)]
        yes: bool,
    },

    /// Check that the alpha is reachable
    Health,

    /// The numbered interactive menu
    Menu {
        /// On a failed "Create data", delete what that run created
        #[arg(long)]
        compensate: bool,
        /// Keep the data when choosing "Exit" (by default it is dropped)
        #[arg(long)]
        keep_on_exit: bool,
    },
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    if cli.no_color {
        colored::control::set_override(false);
    }

    if let Err(e) = run(cli) {
        eprintln!("{} {e:#}", "error:".red().bold());
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let out = Output { json: cli.json };
    let conn = &cli.connection;

    // Commands that never talk to the server.
    if let Commands::Schema { print, export } = &cli.command {
        let schema = conn.load_schema()?;
        if *print {
            print!("{}", schema.render()?);
            return Ok(());
        }
        if let Some(path) = export {
            fs::write(path, schema.to_json_pretty()?)
                .with_context(|| format!("failed to write {}", path.display()))?;
            return out.done(&format!("schema written to {}", path.display()));
        }
    }

    let config = conn.client_config();
    let client = HttpClient::new(&config)?;
    tracing::debug!(url = client.base_url(), "dgraph client ready");

    match cli.command {
        Commands::Schema { .. } => {
            let digest = apply_schema(&client, &conn.load_schema()?)?;
            out.done(&format!("schema applied ({digest})"))?;
        }
        Commands::Load {
            compensate,
            no_schema,
        } => {
            if !no_schema {
                apply_schema(&client, &conn.load_schema()?)?;
            }
            let report = create_all(&client, &conn.dataset(), LoadOptions { compensate })?;
            out.report(&report)?;
        }
        Commands::GroupsByUser { name } => {
            let groups = queries::groups_by_user(&client, &name)?;
            out.groups(&name, &groups)?;
        }
        Commands::Messages { from, to, limit } => {
            out.messages(&queries::messages_between(&client, limit, from, to)?)?;
        }
        Commands::Statuses { first, offset } => {
            out.statuses(&queries::statuses_page(&client, first, offset)?)?;
        }
        Commands::Users => out.users(&queries::users_overview(&client)?)?,
        Commands::Search { terms } => {
            out.messages(&queries::search_messages(&client, &terms.join(" "))?)?;
        }
        Commands::DeleteStatuses { date } => {
            out.deleted(&queries::delete_statuses_through(&client, &date)?)?;
        }
        Commands::DropAll { yes } => {
            if !yes {
                bail!("drop-all removes every node; pass --yes to confirm");
            }
            drop_all(&client)?;
            out.done("all data dropped")?;
        }
        Commands::Health => {
            let health = client.health()?;
            if out.json {
                println!("{}", serde_json::to_string_pretty(&health)?);
            } else {
                println!("{} {}", "healthy:".green().bold(), client.base_url());
            }
        }
        Commands::Menu {
            compensate,
            keep_on_exit,
        } => {
            apply_schema(&client, &conn.load_schema()?)?;
            let settings = menu::MenuSettings {
                dataset: conn.dataset(),
                load: LoadOptions { compensate },
                keep_on_exit,
                output: out,
            };
            let mut terminal = menu::Terminal::new()?;
            menu::run_menu(&client, &settings, &mut terminal)?;
        }
    }

    Ok(())
}
