/// System prompt for the missing-elements advisor.
pub const ADVISOR_SYSTEM: &str = "You are an experienced CV reviewer helping a job seeker \
    complete one section of their CV. You list only concrete, missing information \
    that a recruiter would expect in that section.";

/// Advisor prompt. Replace `{field}`, `{language_instruction}`, `{content}`.
pub const ADVISOR_PROMPT_TEMPLATE: &str = r#"Review the following answer for the CV section "{field}".

List the important elements that are MISSING from it. Examples of elements:
- personal_details: full name, email, phone, city, LinkedIn
- experience: employer, role title, start/end dates, responsibilities, measurable achievements
- education: institution, degree, field of study, graduation year
- military: unit/role, rank, years of service, responsibilities
- skills: technical skills, languages, tools

Rules:
- Return a JSON array of short strings, one per missing element, e.g. ["graduation year", "degree"].
- Return [] if nothing important is missing.
- Do not comment on style or wording.
- {language_instruction}

ANSWER:
{content}"#;
