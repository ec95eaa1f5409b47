//! # kb-ingest CLI (`kbi`)
//!
//! Batch driver around the ingestion library. It scans inputs, indexes
//! files one at a time, and prints per-file outcomes; it never retries a
//! failed file.
//!
//! ```bash
//! kbi --config ./config/kbi.toml init
//! kbi --config ./config/kbi.toml index ./docs
//! kbi --config ./config/kbi.toml files kb-001
//! kbi --config ./config/kbi.toml run ./docs --out ./json
//! ```

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use kb_ingest::config::{load_config, Config};
use kb_ingest::ingest::Indexer;
use kb_ingest::loader::{FileLoader, Loader, RunOutput};
use kb_ingest::repo::KnowledgeFileRepository;
use kb_ingest::{db, migrate};

/// kb-ingest CLI — ingest documents into a knowledge base and track each
/// file's lifecycle.
#[derive(Parser)]
#[command(name = "kbi", version)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(long, default_value = "config/kbi.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the database and run schema migrations
    Init,
    /// Discover and index every supported file under a path
    Index {
        /// File or directory to ingest
        input: PathBuf,
    },
    /// List lifecycle records for a knowledge base (defaults to the
    /// configured one)
    Files {
        kb_id: Option<String>,
    },
    /// Loader-only pass: load documents without touching the database,
    /// optionally serializing each one to a directory
    Run {
        /// File or directory to load
        input: PathBuf,
        /// Write one JSON file per document into this directory
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli.config)?;

    match cli.command {
        Commands::Init => init(&config).await,
        Commands::Index { input } => index(&config, &input).await,
        Commands::Files { kb_id } => files(&config, kb_id).await,
        Commands::Run { input, out } => run(&config, &input, out.as_deref()),
    }
}

async fn init(config: &Config) -> Result<()> {
    let pool = db::connect(&config.db.path).await?;
    migrate::run_migrations(&pool).await?;
    pool.close().await;
    println!("initialized {}", config.db.path.display());
    Ok(())
}

async fn index(config: &Config, input: &std::path::Path) -> Result<()> {
    let pool = db::connect(&config.db.path).await?;
    migrate::run_migrations(&pool).await?;

    let loader = FileLoader::new(config.loader.text_config());
    let paths = loader.discover_files(input);
    if paths.is_empty() {
        println!("no supported files under {}", input.display());
        return Ok(());
    }

    let repo = KnowledgeFileRepository::new(pool.clone());
    let indexer = Indexer::new(config.knowledge_base.id.clone(), repo, loader);

    let mut indexed = 0usize;
    let mut failed = 0usize;
    for path in &paths {
        match indexer.index_file(path).await {
            Ok(id) => {
                indexed += 1;
                println!("  indexed {} ({})", path.display(), id);
            }
            Err(err) => {
                failed += 1;
                println!("  failed  {} ({})", path.display(), err);
            }
        }
    }

    println!("index {}", input.display());
    println!("  files found: {}", paths.len());
    println!("  indexed: {}", indexed);
    println!("  failed: {}", failed);
    println!("ok");

    pool.close().await;
    Ok(())
}

async fn files(config: &Config, kb_id: Option<String>) -> Result<()> {
    let pool = db::connect(&config.db.path).await?;
    let repo = KnowledgeFileRepository::new(pool.clone());
    let kb_id = kb_id.unwrap_or_else(|| config.knowledge_base.id.clone());

    let records = repo.get_by_kb_id(&kb_id).await?;
    println!("files in {}: {}", kb_id, records.len());
    for rec in &records {
        println!(
            "  {}  {:<10} v{}  {}",
            rec.id, rec.status, rec.version, rec.file_name
        );
    }

    pool.close().await;
    Ok(())
}

fn run(config: &Config, input: &std::path::Path, out: Option<&std::path::Path>) -> Result<()> {
    let loader = FileLoader::new(config.loader.text_config());
    let report = loader.run(input, out, None)?;

    match report.output {
        RunOutput::Docs(docs) => {
            let count = docs.count();
            println!("loaded {} document(s)", count);
        }
        RunOutput::Written(paths) => {
            for path in &paths {
                println!("  wrote {}", path.display());
            }
            println!("wrote {} document(s)", paths.len());
        }
    }
    if !report.skipped.is_empty() {
        println!("skipped {} input(s)", report.skipped.len());
    }
    println!("ok");
    Ok(())
}
