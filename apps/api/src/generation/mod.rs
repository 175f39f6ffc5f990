// CV generation: one pipeline (generator) reached from the HTTP route and the
// background queue. All LLM calls go through llm_client.

pub mod generator;
pub mod handlers;
pub mod prompts;
pub mod queue;
pub mod retry;
pub mod translate;
