// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
mod registry;
mod tool;
mod builtin;

pub use registry::{DuplicateToolWarning, ToolListing, ToolRegistry};
pub use tool::{FnTool, Tool, ToolOutput};
pub use builtin::search::{summarize_results, SearchTool};
