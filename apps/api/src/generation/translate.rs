use serde::Deserialize;

use crate::generation::prompts::{TRANSLATE_PROMPT_TEMPLATE, TRANSLATE_SYSTEM};
use crate::llm_client::prompts::{language_name, JSON_ONLY_RULES};
use crate::llm_client::{LlmBackend, LlmError};

#[derive(Debug, Deserialize)]
struct TranslateOutput {
    translated: String,
}

/// Translates free text into `target_lang` (an ISO code such as `en` or `he`).
pub async fn translate_text(
    llm: &dyn LlmBackend,
    text: &str,
    target_lang: &str,
) -> Result<String, LlmError> {
    let prompt = TRANSLATE_PROMPT_TEMPLATE
        .replace("{target_language}", language_name(target_lang))
        .replace("{text}", text);
    let system = format!("{TRANSLATE_SYSTEM} {JSON_ONLY_RULES}");

    let output: TranslateOutput = llm.call_json(&prompt, &system).await?;
    let translated = output.translated.trim();
    if translated.is_empty() {
        return Err(LlmError::EmptyContent);
    }
    Ok(translated.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedLlm;

    #[tokio::test]
    async fn test_translate_returns_model_translation() {
        let llm = ScriptedLlm::new().respond_to(
            "professional translator",
            r#"{"translated": "  Backend developer  "}"#,
        );
        let out = translate_text(&llm, "מפתח צד שרת", "en").await.unwrap();
        assert_eq!(out, "Backend developer");
        assert!(llm.last_prompt().unwrap().contains("English"));
    }

    #[tokio::test]
    async fn test_translate_rejects_blank_translation() {
        let llm = ScriptedLlm::new().respond_to("professional translator", r#"{"translated": ""}"#);
        let err = translate_text(&llm, "hello", "he").await.unwrap_err();
        assert!(matches!(err, LlmError::EmptyContent));
    }
}
