// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
mod conversation;
mod directive;
mod events;
mod agent;
mod prompts;

pub use conversation::Conversation;
pub use directive::{parse_directive, Directive};
pub use events::AgentEvent;
pub use agent::{Agent, AgentOutcome, AgentRun, LoopState, StopReason};
pub use prompts::{malformed_directive_feedback, system_prompt, unknown_tool_feedback};
