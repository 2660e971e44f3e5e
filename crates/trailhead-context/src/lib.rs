//! Prompt-to-context retrieval over trailer-annotated git history.
//!
//! The pipeline tries a model-enhanced pass, then local heuristics, then
//! plain recency, and renders whichever produces candidates first.

pub mod delegate;
pub mod pipeline;
pub mod render;
pub mod resolve;
pub mod settings;
pub mod signals;

mod dispatch;
mod parse;

pub use dispatch::{hook_entrypoint_from_stdin, HookResult};
pub use pipeline::{assemble_context, retrieve_context, ContextBlock, Pipeline, Stage};
pub use resolve::Candidates;
pub use settings::{ContextSettings, ModeCaps};
pub use signals::extract_heuristic;
