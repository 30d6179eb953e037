//! `discussion-orchestrator` — a demo binary that wires the core up over
//! the in-memory storage and bus adapters, runs a scripted three-agent
//! round-robin discussion end-to-end for manual inspection, and then
//! keeps the periodic sweepers running the way `serve` would for a real
//! deployment. CLI shape and config-loading convention are carried
//! straight from the gateway binary's `main.rs`/`cli::load_config`.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use oc_core::{
    CreateDiscussionRequest, InMemoryStore, Orchestrator, ParticipantOrAgentId, ParticipantSpec, StoragePort,
    SystemClock,
};
use oc_domain::{ConfigSeverity, DiscussionSettings, OrchestratorConfig, TurnStrategyConfig};

/// Discussion orchestration core — demo and ops binary.
#[derive(Debug, Parser)]
#[command(name = "discussion-orchestrator", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the scripted demo discussion and keep the sweepers running
    /// (default when no subcommand is given).
    Serve,
    /// Configuration utilities.
    #[command(subcommand)]
    Config(ConfigCommand),
    /// Print version information.
    Version,
}

#[derive(Debug, Subcommand)]
enum ConfigCommand {
    /// Parse the config file and report any errors.
    Validate,
    /// Dump the resolved configuration (with defaults) as TOML.
    Show,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        None | Some(Command::Serve) => {
            init_tracing();
            let (config, _config_path) = load_config()?;
            run_demo(config).await
        }
        Some(Command::Config(ConfigCommand::Validate)) => {
            let (config, config_path) = load_config()?;
            if !validate_config(&config, &config_path) {
                std::process::exit(1);
            }
            Ok(())
        }
        Some(Command::Config(ConfigCommand::Show)) => {
            let (config, _config_path) = load_config()?;
            show_config(&config);
            Ok(())
        }
        Some(Command::Version) => {
            println!("discussion-orchestrator {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,oc_core=debug")))
        .json()
        .init();
}

/// Reads `OC_CONFIG` (default `config.toml`); falls back to
/// `OrchestratorConfig::default()` when the file doesn't exist.
fn load_config() -> anyhow::Result<(OrchestratorConfig, String)> {
    let config_path = std::env::var("OC_CONFIG").unwrap_or_else(|_| "config.toml".into());
    let config = load_config_from_path(std::path::Path::new(&config_path))?;
    Ok((config, config_path))
}

/// The actual file-reading/parsing logic, split out of `load_config` so
/// it's testable against a real file without touching process env vars.
fn load_config_from_path(path: &std::path::Path) -> anyhow::Result<OrchestratorConfig> {
    if !path.exists() {
        return Ok(OrchestratorConfig::default());
    }
    let raw = std::fs::read_to_string(path).map_err(|e| anyhow::anyhow!("reading {}: {e}", path.display()))?;
    toml::from_str(&raw).map_err(|e| anyhow::anyhow!("parsing {}: {e}", path.display()))
}

fn validate_config(config: &OrchestratorConfig, config_path: &str) -> bool {
    let issues = config.validate();
    if issues.is_empty() {
        println!("Config OK ({config_path})");
        return true;
    }

    let error_count = issues.iter().filter(|i| i.severity == ConfigSeverity::Error).count();
    let warning_count = issues.len() - error_count;
    for issue in &issues {
        println!("{issue}");
    }
    println!("\n{error_count} error(s), {warning_count} warning(s) in {config_path}");
    error_count == 0
}

fn show_config(config: &OrchestratorConfig) {
    match toml::to_string_pretty(config) {
        Ok(output) => print!("{output}"),
        Err(e) => {
            eprintln!("failed to serialize config: {e}");
            std::process::exit(1);
        }
    }
}

/// Builds an orchestrator over the in-memory adapters, runs a scripted
/// three-agent round-robin discussion to completion, then leaves the
/// sweepers running until interrupted — the functional equivalent of the
/// gateway binary's interactive chat loop, scaled to what this core
/// alone needs.
async fn run_demo(config: OrchestratorConfig) -> anyhow::Result<()> {
    tracing::info!("discussion orchestration core starting");

    let issues = config.validate();
    for issue in &issues {
        match issue.severity {
            ConfigSeverity::Warning => tracing::warn!("config: {issue}"),
            ConfigSeverity::Error => tracing::error!("config: {issue}"),
        }
    }
    if issues.iter().any(|i| i.severity == ConfigSeverity::Error) {
        anyhow::bail!(
            "config validation failed with {} error(s)",
            issues.iter().filter(|i| i.severity == ConfigSeverity::Error).count()
        );
    }

    let store: Arc<dyn StoragePort> = Arc::new(InMemoryStore::new());
    let bus: Arc<dyn oc_core::runtime::event_bus::EventBus> = Arc::new(oc_core::runtime::event_bus::InMemoryEventBus::new());
    let clock = Arc::new(SystemClock);
    let orchestrator = Arc::new(Orchestrator::new(store, bus, clock, config));
    tracing::info!("orchestrator ready");

    let sweepers = orchestrator.spawn_background_tasks();
    tracing::info!(count = sweepers.len(), "background sweepers started");

    if let Err(err) = run_scripted_discussion(&orchestrator).await {
        tracing::error!(error = %err, "scripted demo discussion failed");
    }

    tracing::info!("demo discussion complete; sweepers remain running, press Ctrl-C to exit");
    tokio::signal::ctrl_c().await.context("waiting for shutdown signal")?;
    orchestrator.shutdown();
    Ok(())
}

async fn run_scripted_discussion(orchestrator: &Arc<Orchestrator>) -> anyhow::Result<()> {
    let created = orchestrator
        .create_discussion(
            CreateDiscussionRequest {
                title: "Rust idioms panel".into(),
                topic: "What makes an API idiomatic?".into(),
                description: "A scripted three-agent round-robin discussion".into(),
                turn_strategy: TurnStrategyConfig::RoundRobin { order_seed: 0 },
                settings: DiscussionSettings::default(),
                initial_participants: vec![
                    ParticipantSpec::agent("agent-alpha", "panelist", "Alpha"),
                    ParticipantSpec::agent("agent-beta", "panelist", "Beta"),
                    ParticipantSpec::agent("agent-gamma", "panelist", "Gamma"),
                ],
            },
            "demo-cli",
        )
        .await?;
    let discussion_id = created.data.id;
    tracing::info!(discussion_id = %discussion_id, "discussion created");

    let started = orchestrator.start_discussion(discussion_id).await?;
    tracing::info!(discussion_id = %discussion_id, "discussion started");

    let lines = [
        "I think an idiomatic API leans on the type system to make invalid states unrepresentable.",
        "Agreed — and it should read naturally with `?` at every fallible call site.",
        "I'd add: idiomatic code favors borrowing over cloning until ownership is actually needed.",
    ];

    let mut current_turn = started.data.runtime.current_turn;
    for line in lines {
        let Some(owner) = current_turn else {
            tracing::warn!("no turn owner; ending demo early");
            break;
        };
        let sent = orchestrator
            .send_message(discussion_id, ParticipantOrAgentId::Participant(owner), line, None, None)
            .await?;
        tracing::info!(participant_id = %owner, content = line, "message sent");
        let _ = sent;

        let advanced = orchestrator.end_turn(discussion_id, owner).await?;
        current_turn = advanced.data.runtime.current_turn;
        tokio::time::sleep(StdDuration::from_millis(50)).await;
    }

    let snapshot = orchestrator.status_snapshot();
    tracing::info!(
        cached_discussions = snapshot.cached_discussions,
        active_timers = snapshot.active_timers,
        tracked_locks = snapshot.tracked_locks,
        "demo status snapshot"
    );

    orchestrator.stop_discussion(discussion_id).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn tmp_workspace() -> TempDir {
        TempDir::new().expect("failed to create temp dir")
    }

    #[test]
    fn missing_config_file_falls_back_to_defaults() {
        let ws = tmp_workspace();
        let config = load_config_from_path(&ws.path().join("does-not-exist.toml")).unwrap();
        assert_eq!(config.cache.ttl_secs, OrchestratorConfig::default().cache.ttl_secs);
    }

    #[test]
    fn partial_config_file_merges_over_defaults() {
        let ws = tmp_workspace();
        let path = ws.path().join("config.toml");
        std::fs::write(&path, "[participation]\nrate_limit_secs = 45\n").unwrap();
        let config = load_config_from_path(&path).unwrap();
        assert_eq!(config.participation.rate_limit_secs, 45);
        assert_eq!(config.cache.ttl_secs, OrchestratorConfig::default().cache.ttl_secs);
    }

    #[test]
    fn malformed_config_file_is_rejected() {
        let ws = tmp_workspace();
        let path = ws.path().join("config.toml");
        std::fs::write(&path, "not valid toml {{{").unwrap();
        assert!(load_config_from_path(&path).is_err());
    }
}
