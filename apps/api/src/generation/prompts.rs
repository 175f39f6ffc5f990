// All LLM prompt constants for the Generation module.
// Reuses cross-cutting fragments from llm_client::prompts.

/// System prompt for CV formatting.
pub const CV_FORMAT_SYSTEM: &str = "You are a professional CV writer. \
    You turn a job seeker's raw questionnaire answers into a polished, recruiter-ready CV. \
    You never invent employers, dates, degrees or numbers that are not in the answers.";

/// CV formatting prompt. Replace `{language_instruction}` and `{answers_json}`.
pub const CV_FORMAT_PROMPT_TEMPLATE: &str = r#"Write a CV from the questionnaire answers below.

Return a JSON object with this schema. Omit any field you have no information for
(do not output null, empty strings or empty arrays):
{
  "personalDetails": {
    "fullName": "Dana Levi",
    "email": "dana@example.com",
    "phone": "052-1234567",
    "city": "Haifa",
    "linkedin": "https://linkedin.com/in/dana"
  },
  "summary": "Three to four sentences positioning the candidate.",
  "experience": [
    {
      "title": "Backend Developer",
      "company": "Acme",
      "location": "Tel Aviv",
      "startDate": "2019",
      "endDate": "2023",
      "achievements": ["Action verb + what + measurable result"]
    }
  ],
  "military": [
    {"role": "Team commander", "unit": "Unit name", "startDate": "2014", "endDate": "2017", "achievements": []}
  ],
  "education": [
    {"degree": "B.Sc. Computer Science", "institution": "Technion", "startDate": "2015", "endDate": "2019", "highlights": []}
  ],
  "skills": {
    "technical": ["Rust"],
    "soft": ["Mentoring"],
    "languages": [{"language": "English", "level": "Fluent"}]
  },
  "certifications": [{"name": "AWS Solutions Architect", "issuer": "Amazon", "year": "2022"}],
  "volunteering": [{"role": "Mentor", "organization": "Code Club", "description": "..."}]
}

Rules:
- Order experience, military and education from newest to oldest.
- Rewrite achievements as concise bullet points starting with a strong verb.
- Keep numbers exactly as the user wrote them.
- {language_instruction}

ANSWERS:
{answers_json}"#;

/// System prompt for translation.
pub const TRANSLATE_SYSTEM: &str = "You are a professional translator specializing in CVs \
    and job-search documents. You translate faithfully and keep formatting.";

/// Translation prompt. Replace `{target_language}` and `{text}`.
pub const TRANSLATE_PROMPT_TEMPLATE: &str = r#"Translate the text below into {target_language}.

Return a JSON object: {"translated": "<the translation>"}
Keep names of people, companies and technologies unchanged. Keep line breaks.

TEXT:
{text}"#;
