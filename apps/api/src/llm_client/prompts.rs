// Shared prompt fragments. Each module that calls the model keeps its own
// prompts.rs alongside it and pulls cross-cutting pieces from here.

/// System prompt suffix that enforces JSON-only output.
pub const JSON_ONLY_RULES: &str = "You MUST respond with valid JSON only. \
    Do NOT include any text outside the JSON value. \
    Do NOT use markdown code fences. \
    Do NOT include explanations or apologies.";

/// Instruction block telling the model which language to write in.
pub fn language_instruction(lang: &str) -> String {
    let name = language_name(lang);
    format!(
        "Write every human-readable value in {name}. \
        Keep JSON keys in English exactly as specified. \
        Preserve proper nouns, company names and technologies as written by the user."
    )
}

/// Human-readable name for the language codes the front end sends.
pub fn language_name(lang: &str) -> &'static str {
    match lang.to_ascii_lowercase().as_str() {
        "he" | "heb" | "hebrew" => "Hebrew",
        "ar" | "arabic" => "Arabic",
        "ru" | "russian" => "Russian",
        "fr" | "french" => "French",
        _ => "English",
    }
}
