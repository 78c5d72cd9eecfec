// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT

/// Events emitted by the agent during a single run.
/// Consumers (the CLI, tests) subscribe to these to drive their output.
#[derive(Debug, Clone, PartialEq)]
pub enum AgentEvent {
    /// A text chunk streamed from the model
    TextDelta(String),
    /// A complete planning reply (after streaming finishes)
    TextComplete(String),
    /// A directive named a registered tool and it is about to run
    ToolCallStarted { tool: String, input: String },
    /// A tool call finished
    ToolCallFinished {
        tool: String,
        output: String,
        is_error: bool,
    },
    /// A directive named a tool that is not registered
    ToolNotFound { tool: String },
    /// The model call failed; partial text, if any, was already streamed
    Error(String),
    /// The run was cancelled; carries text streamed in the interrupted round
    Aborted { partial_text: String },
    /// The run has reached a terminal state
    TurnComplete,
}
