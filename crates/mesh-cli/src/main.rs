// SPDX-License-Identifier: MIT OR Apache-2.0
#![deny(unsafe_code)]
//! The `taskmesh` command-line front end.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use mesh_client::AgentClient;
use mesh_core::{CancellationToken, Stage};
use mesh_pipeline::{DetectorConfig, PipelineConfig, ProgressReporter, run_pipeline};
use mesh_worker::{SpecialistRegistry, WorkerConfig};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "taskmesh", version, about = "Multi-stage project decomposition")]
struct Args {
    /// Enable debug logging.
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the specialist roster until interrupted.
    Serve {
        /// First port of the roster; the four specialists bind
        /// base-port .. base-port+3.
        #[arg(long, default_value_t = 41100)]
        base_port: u16,

        /// Project root the specialists read.
        #[arg(long, default_value = ".")]
        project_root: PathBuf,
    },

    /// Run a stage range of the pipeline.
    Run {
        /// First stage to run (0-4).
        #[arg(long, default_value_t = 0)]
        from: usize,

        /// Last stage to run, inclusive (0-4).
        #[arg(long, default_value_t = 4)]
        to: usize,

        /// Directory for stage documents.
        #[arg(long, default_value = "docs/pipeline")]
        output_dir: PathBuf,

        /// Project root handed to the specialists.
        #[arg(long, default_value = ".")]
        project_root: PathBuf,

        /// First port of the agent probe sweep.
        #[arg(long, default_value_t = 41100)]
        agent_base_port: u16,

        /// Skip agents entirely and emit template documents.
        #[arg(long)]
        single_agent: bool,
    },

    /// Fetch and print an agent's card.
    Card {
        /// Agent base URL.
        url: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let filter = if args.debug {
        EnvFilter::new("mesh=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("mesh=info"))
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match args.command {
        Command::Serve {
            base_port,
            project_root,
        } => serve(base_port, project_root).await,
        Command::Run {
            from,
            to,
            output_dir,
            project_root,
            agent_base_port,
            single_agent,
        } => {
            run(
                from,
                to,
                output_dir,
                project_root,
                agent_base_port,
                single_agent,
            )
            .await
        }
        Command::Card { url } => card(&url).await,
    }
}

async fn serve(base_port: u16, project_root: PathBuf) -> Result<()> {
    let registry = SpecialistRegistry::new(WorkerConfig::new(project_root));
    let roster = registry
        .spawn_all(base_port)
        .await
        .context("start specialist roster")?;
    for (role, addr) in roster.agents() {
        println!("{role} listening on http://{addr}");
    }

    tokio::signal::ctrl_c().await.context("wait for ctrl-c")?;
    info!(target: "mesh.cli", "shutting down roster");
    roster.stop_all().await.context("stop specialist roster")
}

async fn run(
    from: usize,
    to: usize,
    output_dir: PathBuf,
    project_root: PathBuf,
    agent_base_port: u16,
    single_agent: bool,
) -> Result<()> {
    let (Some(from), Some(to)) = (Stage::from_index(from), Stage::from_index(to)) else {
        bail!("stages must be between 0 and 4");
    };
    if to < from {
        bail!("--to must not precede --from");
    }

    let mut cfg = PipelineConfig::new(output_dir, project_root);
    cfg.single_agent = single_agent;
    let detector = DetectorConfig {
        base_port: agent_base_port,
        port_count: 4,
        probe_timeout: Duration::from_millis(400),
        single_agent,
    };

    let (reporter, mut progress) = ProgressReporter::channel();
    let printer = tokio::spawn(async move {
        while let Some(event) = progress.recv().await {
            println!(
                "[{}] {} / {} — {}{}",
                event.stage,
                event.section,
                event.agent,
                event.state,
                event
                    .detail
                    .as_deref()
                    .map(|d| format!(" ({d})"))
                    .unwrap_or_default()
            );
        }
    });

    let cancel = CancellationToken::new();
    let (results, error) =
        run_pipeline(cfg, detector, from, to, reporter, cancel).await;
    let _ = printer.await;

    for result in &results {
        for file in &result.files {
            println!("wrote {}", file.display());
        }
    }
    match error {
        Some(e) => Err(anyhow::Error::new(e).context("pipeline halted")),
        None => Ok(()),
    }
}

async fn card(url: &str) -> Result<()> {
    let client = AgentClient::new(url).with_timeout(Duration::from_secs(5));
    let card = client.discover_agent().await.context("discover agent")?;
    println!("{}", serde_json::to_string_pretty(&card)?);
    Ok(())
}
