// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use hagent_tools::ToolRegistry;

use crate::directive::FINISH;

/// Build the planning system prompt for the given tool set.
pub fn system_prompt(tools: &ToolRegistry) -> String {
    let listing = if tools.is_empty() {
        "(no tools available)".to_string()
    } else {
        tools.render_listing()
    };

    format!(
        "You are a helpful assistant that answers questions by reasoning step by step \
and calling tools when you need outside information.

## Available tools
{listing}

## Reply format
Thought: <your reasoning about what to do next>
Action: <one of the following>
- <ToolName>[<input>] to call one of the tools listed above
- {FINISH}[<final answer>] once you know the answer

Write exactly one Action line per reply and stop after it.  The result of a \
tool call comes back to you as `Observation: <result>`.  If no tool is needed \
you may reply with the final answer directly."
    )
}

/// Observation sent back when a reply's `Action:` line cannot be parsed.
pub fn malformed_directive_feedback(line: &str) -> String {
    format!(
        "Could not parse `{line}`. Use `Action: <ToolName>[<input>]` or \
         `Action: {FINISH}[<final answer>]`."
    )
}

/// Observation sent back when the model names a tool that does not exist.
pub fn unknown_tool_feedback(name: &str, tools: &ToolRegistry) -> String {
    let available = tools.names();
    let available = if available.is_empty() {
        "none".to_string()
    } else {
        available.join(", ")
    };
    format!("Unknown tool '{name}'. Available tools: {available}.")
}
