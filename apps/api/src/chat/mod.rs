pub mod handlers;
pub mod interviewer;
pub mod prompts;
