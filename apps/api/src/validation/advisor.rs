//! Advisory content review: regex heuristics merged with an optional LLM
//! "what is missing" pass. The LLM pass fails open: any error yields no
//! advisor issues rather than blocking the user.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::llm_client::prompts::{language_instruction, JSON_ONLY_RULES};
use crate::llm_client::LlmBackend;
use crate::validation::heuristics::{self, BasicField};
use crate::validation::prompts::{ADVISOR_PROMPT_TEMPLATE, ADVISOR_SYSTEM};

/// Which checks apply to a piece of content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentField {
    PersonalDetails,
    Experience,
    Education,
    Military,
    Skills,
    #[default]
    General,
}

impl ContentField {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentField::PersonalDetails => "personal_details",
            ContentField::Experience => "experience",
            ContentField::Education => "education",
            ContentField::Military => "military",
            ContentField::Skills => "skills",
            ContentField::General => "general",
        }
    }

    fn checks_basics(&self) -> bool {
        matches!(self, ContentField::PersonalDetails | ContentField::General)
    }

    fn checks_years(&self) -> bool {
        matches!(
            self,
            ContentField::Experience
                | ContentField::Education
                | ContentField::Military
                | ContentField::General
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueSource {
    Heuristic,
    Advisor,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentIssue {
    pub source: IssueSource,
    pub code: String,
    pub message: String,
}

fn heuristic_issue(code: &str, lang: &str) -> ContentIssue {
    let hebrew = lang.eq_ignore_ascii_case("he");
    let message = match (code, hebrew) {
        ("missing_email", false) => "No email address found",
        ("missing_email", true) => "לא נמצאה כתובת אימייל",
        ("missing_phone", false) => "No mobile phone number found (e.g. 050-1234567)",
        ("missing_phone", true) => "לא נמצא מספר טלפון נייד (לדוגמה 050-1234567)",
        ("missing_year", false) => "No years found; add start and end years",
        ("missing_year", true) => "לא נמצאו שנים; הוסיפו שנות התחלה וסיום",
        (_, false) => "Missing information",
        (_, true) => "חסר מידע",
    };
    ContentIssue {
        source: IssueSource::Heuristic,
        code: code.to_string(),
        message: message.to_string(),
    }
}

/// Heuristic-only issues for `content`.
pub fn heuristic_issues(content: &str, field: ContentField, lang: &str) -> Vec<ContentIssue> {
    let mut issues = Vec::new();
    if field.checks_basics() {
        for missing in heuristics::missing_basics(content) {
            issues.push(heuristic_issue(&format!("missing_{}", missing.as_str()), lang));
        }
    }
    if field.checks_years() && !heuristics::has_year(content) {
        issues.push(heuristic_issue("missing_year", lang));
    }
    issues
}

/// Asks the model which elements are missing. Returns `[]` on any failure.
pub async fn advise_missing(
    llm: &dyn LlmBackend,
    content: &str,
    field: ContentField,
    lang: &str,
) -> Vec<String> {
    let prompt = ADVISOR_PROMPT_TEMPLATE
        .replace("{field}", field.as_str())
        .replace("{language_instruction}", &language_instruction(lang))
        .replace("{content}", content);
    let system = format!("{ADVISOR_SYSTEM} {JSON_ONLY_RULES}");

    match llm.call_json::<Vec<String>>(&prompt, &system).await {
        Ok(items) => items
            .into_iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect(),
        Err(e) => {
            warn!("Missing-elements advisor failed, continuing without it: {e}");
            Vec::new()
        }
    }
}

/// Merges heuristic and advisor findings. Advisor items about a basic field
/// the heuristics already confirmed present are dropped, so a text with a
/// valid email and phone never reports them missing whatever the model says.
pub fn merge_issues(
    content: &str,
    field: ContentField,
    lang: &str,
    advisor_items: Vec<String>,
) -> Vec<ContentIssue> {
    let mut issues = heuristic_issues(content, field, lang);

    let confirmed: Vec<BasicField> = [BasicField::Email, BasicField::Phone]
        .into_iter()
        .filter(|f| match f {
            BasicField::Email => heuristics::has_email(content),
            BasicField::Phone => heuristics::has_phone(content),
        })
        .collect();

    for item in advisor_items {
        if confirmed.iter().any(|f| f.is_mentioned_in(&item)) {
            continue;
        }
        if issues.iter().any(|i| i.message == item) {
            continue;
        }
        issues.push(ContentIssue {
            source: IssueSource::Advisor,
            code: "advisor".to_string(),
            message: item,
        });
    }

    issues
}

/// Full review: heuristics plus the fail-open advisor.
pub async fn review_content(
    llm: &dyn LlmBackend,
    content: &str,
    field: ContentField,
    lang: &str,
) -> Vec<ContentIssue> {
    let advisor_items = advise_missing(llm, content, field, lang).await;
    merge_issues(content, field, lang, advisor_items)
}
