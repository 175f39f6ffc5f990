use tracing::warn;

use crate::chat::prompts::{INTERVIEWER_PROMPT_TEMPLATE, INTERVIEWER_SYSTEM};
use crate::errors::AppError;
use crate::llm_client::prompts::language_name;
use crate::llm_client::LlmBackend;
use crate::models::chat::{ChatMessageRow, ChatRole, NewChatMessage};
use crate::store::CvStore;
use crate::workflow::session::load_session;

pub const MAX_MESSAGE_CHARS: usize = 4000;
/// Older turns are dropped from the prompt beyond this many messages.
const TRANSCRIPT_WINDOW: usize = 30;

fn render_transcript(messages: &[ChatMessageRow]) -> String {
    let start = messages.len().saturating_sub(TRANSCRIPT_WINDOW);
    messages[start..]
        .iter()
        .map(|m| {
            let speaker = if m.role == ChatRole::Assistant.as_str() {
                "Interviewer"
            } else {
                "Candidate"
            };
            format!("{speaker}: {}", m.content)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Stores the user's message, asks the model for the next interviewer turn
/// and stores that too. Returns the stored reply.
pub async fn send_message(
    store: &dyn CvStore,
    llm: &dyn LlmBackend,
    session_id: &str,
    message: &str,
    language: &str,
) -> Result<ChatMessageRow, AppError> {
    let message = message.trim();
    if message.is_empty() {
        return Err(AppError::Validation("message cannot be empty".to_string()));
    }
    if message.chars().count() > MAX_MESSAGE_CHARS {
        return Err(AppError::Validation(format!(
            "message exceeds {MAX_MESSAGE_CHARS} characters"
        )));
    }
    let session = load_session(store, session_id).await?;

    store
        .append_chat(NewChatMessage {
            session_id: &session.id,
            role: ChatRole::User,
            content: message,
            language,
        })
        .await?;

    let transcript = store.list_chat(&session.id).await?;
    let prompt = INTERVIEWER_PROMPT_TEMPLATE.replace("{transcript}", &render_transcript(&transcript));
    let system = INTERVIEWER_SYSTEM.replace("{language_name}", language_name(language));

    let reply = llm.complete(&prompt, &system).await.map_err(|e| {
        warn!("Interviewer turn failed for session {}: {e}", session.id);
        AppError::Llm(e.to_string())
    })?;
    let reply = reply.trim();
    if reply.is_empty() {
        return Err(AppError::Llm("interviewer returned an empty reply".to_string()));
    }

    let stored = store
        .append_chat(NewChatMessage {
            session_id: &session.id,
            role: ChatRole::Assistant,
            content: reply,
            language,
        })
        .await?;
    Ok(stored)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::testing::{active_session, ScriptedLlm};

    #[tokio::test]
    async fn test_reply_is_stored_after_user_message() {
        let store = MemoryStore::new();
        active_session(&store, "S1").await;
        let llm = ScriptedLlm::new().respond_to("CV interviewer", "  Where did you work last?  ");

        let reply = send_message(&store, &llm, "S1", "Hi, I'm Dana", "en").await.unwrap();
        assert_eq!(reply.content, "Where did you work last?");

        let transcript = store.list_chat("S1").await.unwrap();
        let roles: Vec<&str> = transcript.iter().map(|m| m.role.as_str()).collect();
        assert_eq!(roles, vec!["user", "assistant"]);
        assert!(llm.last_prompt().unwrap().contains("Candidate: Hi, I'm Dana"));
    }

    #[tokio::test]
    async fn test_transcript_includes_previous_turns() {
        let store = MemoryStore::new();
        active_session(&store, "S1").await;
        let llm = ScriptedLlm::new().respond_to("CV interviewer", "Next question?");

        send_message(&store, &llm, "S1", "first", "he").await.unwrap();
        send_message(&store, &llm, "S1", "second", "he").await.unwrap();

        let prompt = llm.last_prompt().unwrap();
        assert!(prompt.contains("Candidate: first\nInterviewer: Next question?\nCandidate: second"));
    }

    #[tokio::test]
    async fn test_blank_message_is_rejected_without_model_call() {
        let store = MemoryStore::new();
        active_session(&store, "S1").await;
        let llm = ScriptedLlm::new();

        let err = send_message(&store, &llm, "S1", "   ", "en").await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert_eq!(llm.calls(), 0);
    }

    #[tokio::test]
    async fn test_unknown_session_is_not_found() {
        let store = MemoryStore::new();
        let llm = ScriptedLlm::new();
        let err = send_message(&store, &llm, "S404", "hello", "en").await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[test]
    fn test_transcript_window_keeps_latest_messages() {
        let messages: Vec<ChatMessageRow> = (0..40)
            .map(|i| ChatMessageRow {
                id: i,
                session_id: "S1".to_string(),
                role: "user".to_string(),
                content: format!("m{i}"),
                language: "en".to_string(),
                created_at: chrono::Utc::now(),
            })
            .collect();
        let text = render_transcript(&messages);
        assert!(!text.contains("Candidate: m9\n"));
        assert!(text.starts_with("Candidate: m10\n"));
        assert!(text.ends_with("Candidate: m39"));
    }
}
