// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Extraction of the next step from a planning reply.
//!
//! Grammar, one directive per reply:
//!
//! ```text
//! Action: <ToolName>[<input>]
//! Action: Finish[<answer>]
//! ```
//!
//! The first `Action:` line wins.  The input runs to the last `]` on that
//! line, so it may itself contain brackets.  When the line has no closing
//! bracket the input may continue over the following lines, up to the last
//! `]` before the next `Action:` line or the end of the reply.  A tool name
//! is any text without brackets or line breaks.  A reply with no `Action:`
//! line is taken as the final answer verbatim.

use std::sync::OnceLock;

use regex::Regex;

/// Tool name reserved for the final answer.
pub const FINISH: &str = "Finish";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive {
    /// Invoke `tool` with `input`.
    Act { tool: String, input: String },
    /// `Action: Finish[...]`.
    Finish(String),
    /// No `Action:` line; the whole reply is the answer.
    Answer(String),
    /// An `Action:` line that does not follow the grammar.
    Malformed(String),
}

fn action_start() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?m)^[ \t]*Action[ \t]*:").expect("action start pattern"))
}

fn action_call() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?s)^\s*([^\s\[\]][^\[\]\r\n]*?)\s*\[(.*)\]\s*$")
            .expect("action call pattern")
    })
}

pub fn parse_directive(reply: &str) -> Directive {
    let Some(start) = action_start().find(reply) else {
        return Directive::Answer(reply.trim().to_string());
    };
    let body_end = action_start()
        .find_at(reply, start.end())
        .map_or(reply.len(), |next| next.start());
    let body = &reply[start.end()..body_end];
    let line = body.split('\n').next().unwrap_or("");

    let Some(call) = action_call()
        .captures(line)
        .or_else(|| action_call().captures(body))
    else {
        let directive = &reply[start.start()..start.end() + line.len()];
        return Directive::Malformed(directive.trim().to_string());
    };
    let tool = &call[1];
    let input = call[2].trim().to_string();
    if tool == FINISH {
        Directive::Finish(input)
    } else {
        Directive::Act { tool: tool.to_string(), input }
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
