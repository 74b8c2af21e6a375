// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! savewatch reference daemon
//!
//! Opens a set of synthetic documents, edits them at random and saves each
//! one to disk as soon as it changes.
//!
//! # Usage
//!
//! ```bash
//! # Run with defaults until Ctrl+C
//! savewatchd run
//!
//! # Run from a configuration file
//! savewatchd run --config savewatch.toml
//!
//! # Generate / validate a configuration file
//! savewatchd gen-config --output savewatch.toml
//! savewatchd validate --config savewatch.toml
//! ```

mod config;
mod store;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use config::DaemonFile;
use savewatch::logging::LogFacade;
use savewatch::watch::SharedCollection;
use savewatch::{CancellationToken, SaveWorker};
use std::path::PathBuf;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use store::{Document, Editor};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "savewatchd")]
#[command(about = "Saves edited documents as soon as they change")]
#[command(version)]
struct Args {
    /// Log level (trace, debug, info, warn, error) or a full filter directive
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the daemon
    Run {
        /// Configuration file path
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Override the output directory
        #[arg(short, long)]
        out_dir: Option<PathBuf>,

        /// Override the number of documents opened at start
        #[arg(short, long)]
        documents: Option<usize>,

        /// Override the multiplexer chunk size
        #[arg(long)]
        chunk_size: Option<i64>,

        /// Stop after this many seconds
        #[arg(long)]
        run_secs: Option<u64>,
    },

    /// Generate an example configuration file
    GenConfig {
        /// Output file path
        #[arg(short, long, default_value = "savewatch.toml")]
        output: PathBuf,
    },

    /// Validate a configuration file
    Validate {
        /// Configuration file path
        #[arg(short, long)]
        config: PathBuf,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();

    let filter = EnvFilter::try_new(&args.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_names(true)
        .init();

    match args.command {
        Commands::Run {
            config,
            out_dir,
            documents,
            chunk_size,
            run_secs,
        } => {
            let mut file = match config {
                Some(path) => DaemonFile::from_file(&path)
                    .with_context(|| format!("loading {}", path.display()))?,
                None => DaemonFile::default(),
            };
            if let Some(out_dir) = out_dir {
                file.daemon.out_dir = out_dir;
            }
            if let Some(documents) = documents {
                file.daemon.documents = documents;
            }
            if let Some(chunk_size) = chunk_size {
                file.watch.chunk_size = chunk_size;
            }
            if let Some(run_secs) = run_secs {
                file.daemon.run_secs = run_secs;
            }
            file.validate().context("invalid configuration")?;
            cmd_run(file)
        }
        Commands::GenConfig { output } => cmd_gen_config(output),
        Commands::Validate { config } => cmd_validate(config),
    }
}

/// Start and exit hooks around the save worker and the editor thread.
struct Daemon {
    worker: SaveWorker,
    docs: Arc<SharedCollection<Document>>,
    stop: CancellationToken,
    editor: Option<JoinHandle<()>>,
}

impl Daemon {
    fn on_start(file: &DaemonFile) -> Result<Self> {
        std::fs::create_dir_all(&file.daemon.out_dir)
            .with_context(|| format!("creating {}", file.daemon.out_dir.display()))?;

        let docs = Arc::new(SharedCollection::new()?);
        let mut worker = SaveWorker::new(file.watch.clone(), Arc::new(LogFacade::default()))?;
        worker.start(Arc::clone(&docs), docs.notifier().clone())?;

        let editor = Editor::new(
            Arc::clone(&docs),
            file.daemon.out_dir.clone(),
            Duration::from_millis(file.daemon.edit_interval_ms),
            file.daemon.churn,
        );
        editor.open_documents(file.daemon.documents)?;

        let stop = CancellationToken::new()?;
        let editor = {
            let token = stop.clone();
            thread::Builder::new()
                .name("savewatchd-editor".into())
                .spawn(move || editor.run(&token))?
        };

        Ok(Self {
            worker,
            docs,
            stop,
            editor: Some(editor),
        })
    }

    fn on_exit(mut self) -> Result<()> {
        self.stop.cancel();
        if let Some(editor) = self.editor.take() {
            let _ = editor.join();
        }

        let timeout = self.worker.config().shutdown_timeout();
        match self.worker.shutdown(timeout)? {
            Some(report) => tracing::info!(
                state = %report.state,
                iterations = report.iterations,
                saves = report.saves,
                failed = report.failed_saves,
                rebuilds = report.rebuilds,
                "save worker stopped"
            ),
            None => tracing::warn!("save worker was not running"),
        }
        tracing::info!(documents = self.docs.len(), "daemon exited");
        Ok(())
    }
}

fn cmd_run(file: DaemonFile) -> Result<()> {
    println!("savewatchd v{}", env!("CARGO_PKG_VERSION"));
    println!("Saving to {}", file.daemon.out_dir.display());
    println!("Press Ctrl+C to stop...");

    let daemon = Daemon::on_start(&file)?;

    let interrupted = daemon.stop.child()?;
    {
        let handle = interrupted.clone();
        ctrlc::set_handler(move || {
            tracing::info!("Received Ctrl+C, shutting down...");
            handle.cancel();
        })
        .context("installing Ctrl+C handler")?;
    }

    let deadline = (file.daemon.run_secs > 0).then(|| Duration::from_secs(file.daemon.run_secs));
    loop {
        let slice = deadline.unwrap_or(Duration::from_secs(1));
        if interrupted.wait_timeout(slice)? {
            break;
        }
        if deadline.is_some() {
            tracing::info!("run time elapsed");
            break;
        }
        if !daemon.worker.is_running() {
            tracing::error!("save worker terminated on its own");
            break;
        }
    }

    daemon.on_exit()
}

fn cmd_gen_config(output: PathBuf) -> Result<()> {
    let toml_str = toml::to_string_pretty(&DaemonFile::default())?;
    let content = format!(
        r#"# savewatch daemon configuration
# Generated by savewatchd gen-config

{}
"#,
        toml_str
    );

    std::fs::write(&output, content)?;
    println!("Generated configuration file: {}", output.display());
    Ok(())
}

fn cmd_validate(config_path: PathBuf) -> Result<()> {
    let file = DaemonFile::from_file(&config_path)
        .with_context(|| format!("validating {}", config_path.display()))?;

    println!("Configuration valid!");
    println!();
    println!("Chunk size:       {}", file.watch.chunk_size);
    println!("Thread name:      {}", file.watch.thread_name);
    println!("Shutdown timeout: {}ms", file.watch.shutdown_timeout_ms);
    println!("Output directory: {}", file.daemon.out_dir.display());
    println!("Documents:        {}", file.daemon.documents);
    Ok(())
}
