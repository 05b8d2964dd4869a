//! `modex` command-line entry point.
//!
//! Reads `modex.toml` (or the path given with `--config`), opens the SQLite
//! store, and ingests from a proxy-layout directory.
//!
//! ```text
//! modex fetch example.com/m@v1.2.0 example.com/n@v0.3.1
//! modex show example.com/m@v1.2.0
//! modex state example.com/m@v1.2.0
//! ```

use std::{path::PathBuf, sync::Arc};

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use modex_core::{Classify, module::ModuleKey, store::VersionStore};
use modex_store_sqlite::SqliteStore;
use modex_worker::{Extractor, Worker, WorkerConfig, fetch::DirFetcher};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Module version ingestion worker")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "modex.toml")]
  config: PathBuf,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand)]
enum Command {
  /// Fetch and store module versions, given as `<module>@<version>`.
  Fetch {
    #[arg(required = true)]
    keys: Vec<ModuleKey>,
  },
  /// Print a stored module version and its units as JSON.
  Show { key: ModuleKey },
  /// Print the outcome of the last ingestion of a module version as JSON.
  State { key: ModuleKey },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  let cfg = WorkerConfig::load(&cli.config)
    .with_context(|| format!("failed to load config from {:?}", cli.config))?
    .expanded();

  if let Some(parent) = cfg.store_path.parent() {
    tokio::fs::create_dir_all(parent)
      .await
      .with_context(|| format!("failed to create {parent:?}"))?;
  }
  let store = SqliteStore::open(&cfg.store_path)
    .await
    .with_context(|| format!("failed to open store at {:?}", cfg.store_path))?;

  match cli.command {
    Command::Fetch { keys } => {
      let worker = Arc::new(
        Worker::new(DirFetcher::new(&cfg.proxy_dir), store, Extractor::from_config(&cfg))
          .with_timeout(cfg.timeout())
          .with_concurrency(cfg.concurrency),
      );

      let total = keys.len();
      let mut failed = 0;
      for (key, result) in worker.ingest_all(keys).await {
        match result {
          Ok(summary) => println!("{}", serde_json::to_string(&summary)?),
          Err(e) => {
            failed += 1;
            eprintln!("{key}: {} ({})", e, e.kind());
          }
        }
      }
      if failed > 0 {
        anyhow::bail!("{failed} of {total} ingestions failed");
      }
    }

    Command::Show { key } => {
      let module = store
        .get_module(&key)
        .await?
        .with_context(|| format!("{key} is not stored"))?;
      let units = store.list_units(&key).await?;
      let out = serde_json::json!({ "module": module, "units": units });
      println!("{}", serde_json::to_string_pretty(&out)?);
    }

    Command::State { key } => {
      let state = store
        .get_state(&key)
        .await?
        .with_context(|| format!("no ingestion recorded for {key}"))?;
      println!("{}", serde_json::to_string_pretty(&state)?);
    }
  }

  Ok(())
}
