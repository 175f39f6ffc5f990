/// System prompt for answer analysis.
pub const ANALYSIS_SYSTEM: &str = "You are a senior recruiter and career analyst. \
    You read a job seeker's raw questionnaire answers and extract structured facts about them.";

/// Analysis prompt. Replace `{language_instruction}` and `{answers_json}`.
pub const ANALYSIS_PROMPT_TEMPLATE: &str = r#"Analyze the questionnaire answers below.

Return a JSON object with this EXACT schema:
{
  "level": "JUNIOR",
  "yearsOfExperience": 3,
  "profession": "Backend developer",
  "keySkills": ["Rust", "PostgreSQL"],
  "summary": "Two sentences describing the candidate."
}

LEVEL (pick exactly one):
- "JUNIOR": up to 2 years of relevant experience, or student/graduate
- "MID": 2-5 years
- "SENIOR": 5-10 years, or leads projects
- "EXPERT": 10+ years, or manages teams / recognized specialist

Rules:
- Use only facts present in the answers. Use null for unknown numbers and strings.
- {language_instruction}

ANSWERS:
{answers_json}"#;
