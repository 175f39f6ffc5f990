//! Regex heuristics for answer completeness. These are advisory only and
//! never gate saving or generation.

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

lazy_static! {
    static ref EMAIL_RE: Regex =
        Regex::new(r"(?i)[a-z0-9._%+\-]+@[a-z0-9.\-]+\.[a-z]{2,}").expect("valid email regex");
    /// Israeli mobile: `05X-XXXXXXX` (10 digits, optional `-`/space separators)
    /// or the international `+972 5X...` form.
    static ref PHONE_RE: Regex =
        Regex::new(r"(?:^|[^\d+])(?:0|\+972[\-\s]?)5\d(?:[\-\s]?\d){7}(?:$|\D)")
            .expect("valid phone regex");
    static ref YEAR_RE: Regex = Regex::new(r"\b(?:19[5-9]\d|20\d\d)\b").expect("valid year regex");
}

/// Personal-details items the heuristics can confirm on their own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BasicField {
    Email,
    Phone,
}

impl BasicField {
    pub fn as_str(&self) -> &'static str {
        match self {
            BasicField::Email => "email",
            BasicField::Phone => "phone",
        }
    }

    /// Words that identify a free-text issue as being about this field.
    pub fn keywords(&self) -> &'static [&'static str] {
        match self {
            BasicField::Email => &["email", "e-mail", "mail", "אימייל", "מייל", "דוא\"ל", "דואר"],
            BasicField::Phone => &["phone", "mobile", "telephone", "טלפון", "נייד"],
        }
    }

    pub fn is_mentioned_in(&self, text: &str) -> bool {
        let lower = text.to_lowercase();
        self.keywords().iter().any(|k| lower.contains(k))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct HeuristicScan {
    pub has_email: bool,
    pub has_phone: bool,
    pub has_year: bool,
}

pub fn has_email(text: &str) -> bool {
    EMAIL_RE.is_match(text)
}

pub fn has_phone(text: &str) -> bool {
    PHONE_RE.is_match(text)
}

pub fn has_year(text: &str) -> bool {
    YEAR_RE.is_match(text)
}

pub fn scan(text: &str) -> HeuristicScan {
    HeuristicScan {
        has_email: has_email(text),
        has_phone: has_phone(text),
        has_year: has_year(text),
    }
}

/// Personal-details items absent from `text`.
pub fn missing_basics(text: &str) -> Vec<BasicField> {
    let mut missing = Vec::new();
    if !has_email(text) {
        missing.push(BasicField::Email);
    }
    if !has_phone(text) {
        missing.push(BasicField::Phone);
    }
    missing
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_email_detected() {
        assert!(has_email("contact: dana.levi+cv@example.co.il"));
        assert!(!has_email("dana at example dot com"));
    }

    #[test]
    fn test_phone_plain_ten_digits() {
        assert!(has_phone("0521234567"));
    }

    #[test]
    fn test_phone_with_dash_and_spaces() {
        assert!(has_phone("Phone: 052-123-4567"));
        assert!(has_phone("נייד 054 1234567"));
    }

    #[test]
    fn test_phone_international_form() {
        assert!(has_phone("+972-52-1234567"));
        assert!(has_phone("+972 521234567"));
    }

    #[test]
    fn test_phone_rejects_landline_and_short_numbers() {
        assert!(!has_phone("03-1234567"));
        assert!(!has_phone("05212345"));
    }

    #[test]
    fn test_phone_rejects_longer_digit_runs() {
        assert!(!has_phone("id 052123456789"));
    }

    #[test]
    fn test_year_detected_in_range() {
        assert!(has_year("Worked at Acme 2019-2023"));
        assert!(has_year("Graduated 1998"));
        assert!(!has_year("Order #12345"));
        assert!(!has_year("Room 1812"));
    }

    #[test]
    fn test_missing_basics_with_email_and_05_phone_is_empty() {
        let text = "Dana Levi, dana@example.com, 0541234567, Tel Aviv";
        assert!(missing_basics(text).is_empty());
    }

    #[test]
    fn test_missing_basics_reports_both_when_absent() {
        assert_eq!(
            missing_basics("Dana Levi, Tel Aviv"),
            vec![BasicField::Email, BasicField::Phone]
        );
    }

    #[test]
    fn test_basic_field_matches_hebrew_keywords() {
        assert!(BasicField::Phone.is_mentioned_in("חסר מספר טלפון"));
        assert!(BasicField::Email.is_mentioned_in("Missing E-mail address"));
        assert!(!BasicField::Email.is_mentioned_in("Missing LinkedIn profile"));
    }

    #[test]
    fn test_scan_collects_all_flags() {
        let s = scan("dana@example.com 052-1234567 since 2015");
        assert_eq!(
            s,
            HeuristicScan {
                has_email: true,
                has_phone: true,
                has_year: true
            }
        );
    }
}
