// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
mod cli;

use std::future::Future;
use std::io::{self, Write};
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::Parser;
use tokio::sync::{mpsc, oneshot};
use tracing::warn;
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

use cli::{Cli, Commands};
use hagent_config::Config;
use hagent_core::{Agent, AgentEvent, StopReason};
use hagent_model::{Message, StreamingChatClient};
use hagent_tools::{SearchTool, ToolRegistry};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let dotenv = dotenvy::dotenv();
    init_logging(cli.verbose);
    if let Err(e) = dotenv {
        if !e.not_found() {
            warn!(error = %e, "could not read .env");
        }
    }

    let mut config = hagent_config::load(cli.config.as_deref()).context("loading configuration")?;
    cli.apply_overrides(&mut config);

    match &cli.command {
        Commands::ShowConfig => {
            let shown = toml::to_string_pretty(&redacted(&config))
                .context("rendering configuration")?;
            println!("{shown}");
            Ok(())
        }
        Commands::Tools => {
            println!("{}", build_registry(&config).render_listing());
            Ok(())
        }
        Commands::Chat { prompt } => chat(&config, prompt).await,
        Commands::Ask { question } => ask(&config, question).await,
    }
}

fn build_registry(config: &Config) -> ToolRegistry {
    let mut tools = ToolRegistry::new();
    tools.register(SearchTool::new(config.search.clone()));
    tools
}

fn build_client(config: &Config) -> anyhow::Result<StreamingChatClient> {
    StreamingChatClient::from_config(&config.endpoint).context("invalid endpoint configuration")
}

/// Stream one completion to stdout.
async fn chat(config: &Config, prompt: &str) -> anyhow::Result<()> {
    let client = build_client(config)?;
    let mut stdout = io::stdout();
    let result = client
        .complete(&[Message::user(prompt)], config.agent.temperature, |chunk| {
            let _ = write!(stdout, "{}", chunk.delta);
            let _ = stdout.flush();
        })
        .await?;
    println!();

    if let Some(e) = result.error {
        bail!("completion ended early after {} bytes: {e}", result.text.len());
    }
    Ok(())
}

/// Run the agent loop.  Reasoning goes to stderr, the answer to stdout.
async fn ask(config: &Config, question: &str) -> anyhow::Result<()> {
    let client = Arc::new(build_client(config)?);
    let agent = Agent::new(
        client,
        Arc::new(build_registry(config)),
        Arc::new(config.agent.clone()),
    );

    let (tx, rx) = mpsc::channel(256);
    let printer = tokio::spawn(print_events(rx));

    let cancel_rx = cancel_on(tokio::signal::ctrl_c());
    let outcome = agent.run_with_cancel(question, tx, cancel_rx).await;
    printer.await.context("event printer failed")?;

    println!("{}", outcome.answer);
    match outcome.stop {
        StopReason::Finished => Ok(()),
        StopReason::MaxRoundsExceeded => {
            bail!("no final answer within {} rounds", outcome.rounds)
        }
        StopReason::ModelError(e) => Err(e).context("model call failed"),
        StopReason::Cancelled => bail!("cancelled"),
    }
}

/// Receiver that fires once `signal` completes.  If the signal cannot be
/// watched the sender is held forever; a dropped sender counts as a cancel.
fn cancel_on<F>(signal: F) -> oneshot::Receiver<()>
where
    F: Future<Output = io::Result<()>> + Send + 'static,
{
    let (cancel_tx, cancel_rx) = oneshot::channel();
    tokio::spawn(async move {
        match signal.await {
            Ok(()) => {
                let _ = cancel_tx.send(());
            }
            Err(e) => {
                warn!(error = %e, "cannot listen for Ctrl-C");
                std::future::pending::<()>().await;
                drop(cancel_tx);
            }
        }
    });
    cancel_rx
}

async fn print_events(mut rx: mpsc::Receiver<AgentEvent>) {
    let mut stderr = io::stderr();
    while let Some(event) = rx.recv().await {
        let _ = match event {
            AgentEvent::TextDelta(t) => write!(stderr, "{t}"),
            AgentEvent::TextComplete(_) => writeln!(stderr),
            AgentEvent::ToolCallStarted { tool, input } => {
                writeln!(stderr, "→ {tool}[{input}]")
            }
            AgentEvent::ToolCallFinished { output, is_error, .. } => {
                let tag = if is_error { "Observation (error)" } else { "Observation" };
                writeln!(stderr, "{tag}: {output}\n")
            }
            AgentEvent::ToolNotFound { tool } => writeln!(stderr, "unknown tool: {tool}\n"),
            AgentEvent::Error(e) => writeln!(stderr, "\nerror: {e}"),
            AgentEvent::Aborted { .. } => writeln!(stderr, "\n[cancelled]"),
            AgentEvent::TurnComplete => Ok(()),
        };
        let _ = stderr.flush();
    }
}

/// Copy of `config` with every secret replaced.
fn redacted(config: &Config) -> Config {
    let mut shown = config.clone();
    let hide = |k: &mut Option<String>| {
        if k.is_some() {
            *k = Some("<redacted>".into());
        }
    };
    hide(&mut shown.endpoint.api_key);
    hide(&mut shown.search.api_key);
    shown
}

fn init_logging(verbosity: u8) {
    let level = match verbosity {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .init();
}
