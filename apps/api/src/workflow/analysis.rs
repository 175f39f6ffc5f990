//! Advisory LLM analysis of raw answers. Fails open: callers get `None`.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use crate::llm_client::prompts::{language_instruction, JSON_ONLY_RULES};
use crate::llm_client::LlmBackend;
use crate::workflow::prompts::{ANALYSIS_PROMPT_TEMPLATE, ANALYSIS_SYSTEM};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CareerLevel {
    Junior,
    Mid,
    Senior,
    Expert,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CvAnalysis {
    pub level: CareerLevel,
    #[serde(default)]
    pub years_of_experience: Option<f32>,
    #[serde(default)]
    pub profession: Option<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub key_skills: Vec<String>,
    #[serde(default)]
    pub summary: Option<String>,
}

/// Models emit `null` for lists they have nothing for.
fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<String>>::deserialize(deserializer)?.unwrap_or_default())
}

pub async fn analyze_answers(llm: &dyn LlmBackend, answers: &Value, lang: &str) -> Option<CvAnalysis> {
    let answers_json = match serde_json::to_string_pretty(answers) {
        Ok(json) => json,
        Err(e) => {
            warn!("Could not serialize answers for analysis: {e}");
            return None;
        }
    };
    let prompt = ANALYSIS_PROMPT_TEMPLATE
        .replace("{language_instruction}", &language_instruction(lang))
        .replace("{answers_json}", &answers_json);
    let system = format!("{ANALYSIS_SYSTEM} {JSON_ONLY_RULES}");

    match llm.call_json::<CvAnalysis>(&prompt, &system).await {
        Ok(analysis) => {
            info!("Answer analysis: level={:?}", analysis.level);
            Some(analysis)
        }
        Err(e) => {
            warn!("Answer analysis failed, continuing without it: {e}");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedLlm;
    use serde_json::json;

    #[test]
    fn test_level_uses_uppercase_wire_names() {
        let level: CareerLevel = serde_json::from_str(r#""SENIOR""#).unwrap();
        assert_eq!(level, CareerLevel::Senior);
        assert_eq!(serde_json::to_string(&CareerLevel::Mid).unwrap(), r#""MID""#);
        assert!(serde_json::from_str::<CareerLevel>(r#""senior""#).is_err());
    }

    #[test]
    fn test_analysis_tolerates_nulls_and_missing_fields() {
        let analysis: CvAnalysis =
            serde_json::from_str(r#"{"level": "JUNIOR", "yearsOfExperience": null}"#).unwrap();
        assert_eq!(analysis.level, CareerLevel::Junior);
        assert!(analysis.years_of_experience.is_none());
        assert!(analysis.key_skills.is_empty());
    }

    #[tokio::test]
    async fn test_null_key_skills_keeps_the_analysis() {
        let llm = ScriptedLlm::new().respond_to(
            "career analyst",
            r#"{"level": "MID", "keySkills": null, "summary": "Support engineer"}"#,
        );
        let analysis = analyze_answers(&llm, &json!({"a": 1}), "en").await.unwrap();
        assert_eq!(analysis.level, CareerLevel::Mid);
        assert!(analysis.key_skills.is_empty());
        assert_eq!(analysis.summary.as_deref(), Some("Support engineer"));
    }

    #[tokio::test]
    async fn test_analyze_answers_returns_none_on_invalid_level() {
        let llm = ScriptedLlm::new().respond_to("career analyst", r#"{"level": "GURU"}"#);
        assert!(analyze_answers(&llm, &json!({"a": 1}), "en").await.is_none());
    }

    #[tokio::test]
    async fn test_analyze_answers_parses_model_output() {
        let llm = ScriptedLlm::new().respond_to(
            "career analyst",
            r#"{"level": "EXPERT", "yearsOfExperience": 12, "keySkills": ["Leadership"]}"#,
        );
        let analysis = analyze_answers(&llm, &json!({"a": 1}), "en").await.unwrap();
        assert_eq!(analysis.level, CareerLevel::Expert);
        assert_eq!(analysis.years_of_experience, Some(12.0));
    }
}
