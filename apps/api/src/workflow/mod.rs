// Session/content workflow: template selection -> answer collection ->
// payment -> generation -> delivery. Status changes go through the typed
// state machines in `models::session` and `models::content`.

pub mod analysis;
pub mod answers;
pub mod handlers;
pub mod prompts;
pub mod session;
