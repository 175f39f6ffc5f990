// Answer-completeness feedback: regex heuristics plus an optional LLM advisor.
// Nothing here gates saving or generation.

pub mod advisor;
pub mod handlers;
pub mod heuristics;
pub mod prompts;
