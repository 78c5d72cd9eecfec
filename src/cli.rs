// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use hagent_config::Config;

/// Model backend selectable from the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ProviderArg {
    /// Any OpenAI-compatible chat completion endpoint
    Openai,
    /// Offline echo model, useful for trying the tool loop without a key
    Mock,
}

impl ProviderArg {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Openai => "openai",
            Self::Mock => "mock",
        }
    }
}

#[derive(Parser, Debug)]
#[command(
    name = "hagent",
    about = "A tool-augmented streaming LLM client with a ReAct agent loop",
    version,
    long_about = None,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to config file (overrides auto-discovery)
    #[arg(long, short = 'c', global = true)]
    pub config: Option<PathBuf>,

    /// Model provider, overrides `endpoint.provider`
    #[arg(long, value_enum, global = true)]
    pub model_provider: Option<ProviderArg>,

    /// Maximum planning rounds per question
    #[arg(long, global = true, value_name = "N")]
    pub max_rounds: Option<u32>,

    /// Sampling temperature (clamped to 0.0-2.0)
    #[arg(long, global = true, value_name = "T")]
    pub temperature: Option<f32>,

    /// Increase verbosity (-v = debug, -vv = trace)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Answer a question with the think/act/observe loop
    Ask {
        #[arg(value_name = "QUESTION")]
        question: String,
    },
    /// Stream a single completion for a prompt, no tools
    Chat {
        #[arg(value_name = "PROMPT")]
        prompt: String,
    },
    /// List the tools available to the agent
    Tools,
    /// Print the effective configuration (keys redacted) and exit
    ShowConfig,
}

impl Cli {
    /// Fold command-line overrides into the loaded configuration.
    pub fn apply_overrides(&self, config: &mut Config) {
        if let Some(p) = self.model_provider {
            config.endpoint.provider = p.as_str().to_string();
        }
        if let Some(n) = self.max_rounds {
            config.agent.max_rounds = n;
        }
        if let Some(t) = self.temperature {
            config.agent.temperature = t;
        }
    }
}
