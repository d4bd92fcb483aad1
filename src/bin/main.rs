//! mtgjson CLI - query the MTGJSON dataset from the command line
//!
//! Usage:
//!   mtgjson refresh
//!   mtgjson views
//!   mtgjson shape <view>
//!   mtgjson sql <query> [-p <value>]...
//!   mtgjson export <path>
//!   mtgjson booster <set> [--kind draft] [--packs N] [--seed S]
//!   mtgjson meta
//!
//! Examples:
//!   mtgjson sql "SELECT name FROM cards WHERE setCode = ? LIMIT 5" -p MH3
//!   mtgjson booster MH3 --kind collector --seed 7

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use mtgjson::catalog;
use mtgjson::{ProgressFn, Session, Settings};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rusqlite::types::Value;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "mtgjson")]
#[command(about = "Query the MTGJSON dataset with SQL")]
#[command(version)]
struct Cli {
    /// Serve cached files only; never touch the network
    #[arg(long, global = true)]
    offline: bool,

    /// Cache directory (overrides configuration)
    #[arg(long, global = true)]
    cache_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Download the current dataset if the cache is stale
    Refresh,

    /// List catalog views and which are loaded
    Views,

    /// Show inferred column shapes of a view
    Shape {
        /// View name, e.g. cards
        view: String,
    },

    /// Run a SQL query and print rows as JSON
    Sql {
        query: String,

        /// Positional parameter values, bound in order
        #[arg(short, long = "param")]
        params: Vec<String>,
    },

    /// Materialize every view and write a standalone SQLite file
    Export {
        path: PathBuf,
    },

    /// Open simulated booster packs
    Booster {
        /// Set code, e.g. MH3
        set: String,

        #[arg(short, long, default_value = "draft")]
        kind: String,

        #[arg(short, long, default_value_t = 1)]
        packs: usize,

        /// Seed for reproducible packs
        #[arg(short, long)]
        seed: Option<u64>,
    },

    /// Print the cached version metadata
    Meta,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let session = match open_session(&cli) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let result = match cli.command {
        Commands::Refresh => cmd_refresh(&session),
        Commands::Views => cmd_views(&session),
        Commands::Shape { view } => cmd_shape(&session, &view),
        Commands::Sql { query, params } => cmd_sql(&session, &query, params),
        Commands::Export { path } => cmd_export(&session, &path),
        Commands::Booster {
            set,
            kind,
            packs,
            seed,
        } => cmd_booster(&session, &set, &kind, packs, seed),
        Commands::Meta => cmd_meta(&session),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn open_session(cli: &Cli) -> mtgjson::Result<Session> {
    let mut settings = Settings::load()?;
    if cli.offline {
        settings.cache.offline = true;
    }
    if let Some(dir) = &cli.cache_dir {
        settings.cache.dir = Some(dir.clone());
    }
    settings.validate()?;

    let progress: ProgressFn = Arc::new(|file: &str, done: u64, total: u64| {
        if done == total {
            eprintln!("  {file}: {done} bytes");
        }
    });
    Session::open_with_progress(settings, progress)
}

fn cmd_refresh(session: &Session) -> mtgjson::Result<()> {
    if session.refresh()? {
        println!("Downloaded new dataset version.");
    } else {
        println!("Cache is up to date.");
    }
    if let Some(v) = session.local_version() {
        println!("Version: {} ({})", v.version, v.date.as_deref().unwrap_or("unknown date"));
    }
    Ok(())
}

fn cmd_views(session: &Session) -> mtgjson::Result<()> {
    let loaded = session.views();
    for spec in catalog::VIEWS {
        let marker = if loaded.iter().any(|v| v == spec.name) { "*" } else { " " };
        println!("{} {:<28} {}", marker, spec.name, spec.remote_path);
    }
    Ok(())
}

fn cmd_shape(session: &Session, view: &str) -> mtgjson::Result<()> {
    let rel = session.view(view)?;
    println!("{} ({} rows)", rel.name, rel.row_count);
    for column in &rel.columns {
        match rel.shapes.get(column) {
            Some(shape) => println!(
                "  {:<28} {:?} ({:?})",
                column, shape.inferred_kind, shape.confidence_source
            ),
            None => println!("  {}", column),
        }
    }
    for warning in &rel.warnings {
        println!("warning: {}", warning);
    }
    Ok(())
}

fn cmd_sql(session: &Session, query: &str, params: Vec<String>) -> mtgjson::Result<()> {
    let views = catalog::referenced_views(query);
    debug!(?views, "registering views for query");
    session.ensure_views(&views)?;

    let params: Vec<Value> = params.into_iter().map(parse_param).collect();
    let rows = session.run(query, &params)?;
    println!("{}", serde_json::to_string_pretty(&rows.to_json())?);
    Ok(())
}

/// Integers and floats bind as numbers, everything else as text.
fn parse_param(raw: String) -> Value {
    if let Ok(i) = raw.parse::<i64>() {
        Value::Integer(i)
    } else if let Ok(f) = raw.parse::<f64>() {
        Value::Real(f)
    } else {
        Value::Text(raw)
    }
}

fn cmd_export(session: &Session, path: &Path) -> mtgjson::Result<()> {
    session.export_db(path)?;
    println!("Exported {} views to {}", catalog::VIEWS.len(), path.display());
    Ok(())
}

fn cmd_booster(
    session: &Session,
    set: &str,
    kind: &str,
    packs: usize,
    seed: Option<u64>,
) -> mtgjson::Result<()> {
    let config = session.booster_config(set, kind)?;
    let engine = session.booster_engine();
    let opened = match seed {
        Some(seed) => engine.open_box_with_rng(&config, packs, &mut StdRng::seed_from_u64(seed))?,
        None => engine.open_box(&config, packs)?,
    };

    session.ensure_views(&["cards"])?;
    for (i, pack) in opened.iter().enumerate() {
        println!("Pack {}:", i + 1);
        for uuid in pack {
            let name = session
                .run_scalar(
                    "SELECT name FROM cards WHERE uuid = ?",
                    &[Value::Text(uuid.clone())],
                )?
                .and_then(|v| match v {
                    Value::Text(s) => Some(s),
                    _ => None,
                })
                .unwrap_or_else(|| uuid.clone());
            println!("  - {}", name);
        }
    }
    Ok(())
}

fn cmd_meta(session: &Session) -> mtgjson::Result<()> {
    let meta = session.meta()?;
    println!("{}", serde_json::to_string_pretty(&meta)?);
    Ok(())
}
