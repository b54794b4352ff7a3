//! The minimum-quality contract a model response must meet before it is
//! committed.
//!
//! Everything here is pure: candidates are inspected, never mutated, and no
//! I/O happens. The worker retries a rejected candidate exactly as it
//! retries a transport failure, so these checks are the only line between a
//! plausible-looking hallucination and the store.

use crate::types::QuestionEntry;
use once_cell::sync::Lazy;
use regex::Regex;

/// Entries (question text, options) shorter than this are treated as
/// truncated OCR/model output.
pub const MIN_TEXT_LEN: usize = 5;

/// Minimum number of options an extracted question must carry.
pub const MIN_OPTIONS: usize = 2;

// ── Extraction records ───────────────────────────────────────────────────

/// Check an extracted page against the quality contract.
///
/// Returns `None` when the page passes, or a human-readable rejection
/// reason. The rules, per entry:
///
/// * question text at least [`MIN_TEXT_LEN`] characters;
/// * at least [`MIN_OPTIONS`] options;
/// * at most one option below [`MIN_TEXT_LEN`] — a single short option
///   ("Yes", "No") is legitimate, two or more indicate truncation and
///   reject the whole page.
pub fn questions_rejection(entries: &[QuestionEntry]) -> Option<String> {
    if entries.is_empty() {
        return Some("empty question list".into());
    }

    for entry in entries {
        let n = entry.question_number;
        if entry.question_text.chars().count() < MIN_TEXT_LEN {
            return Some(format!("question {n}: text shorter than {MIN_TEXT_LEN} chars"));
        }
        if entry.options.len() < MIN_OPTIONS {
            return Some(format!(
                "question {n}: only {} option(s)",
                entry.options.len()
            ));
        }
        let short = entry
            .options
            .iter()
            .filter(|opt| !opt.is_empty() && opt.chars().count() < MIN_TEXT_LEN)
            .count();
        if short > 1 {
            return Some(format!("question {n}: {short} suspiciously short options"));
        }
    }

    None
}

/// Convenience predicate over [`questions_rejection`].
pub fn questions_pass(entries: &[QuestionEntry]) -> bool {
    questions_rejection(entries).is_none()
}

// ── Classification labels ────────────────────────────────────────────────

/// Which XML-style tag pair delimits the label in a classifier response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelTag {
    Subject,
    Topic,
}

static RE_SUBJECT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<subject>(.*?)</subject>").unwrap());
static RE_TOPIC: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<topic>(.*?)</topic>").unwrap());

/// Extract the delimited label from a free-text classifier response.
///
/// Returns the trimmed tag content, or `None` when the marker pair is
/// absent. A missing marker is handled by the caller exactly like a model
/// failure: parse-or-reject, then retry.
pub fn parse_label(response: &str, tag: LabelTag) -> Option<String> {
    let re = match tag {
        LabelTag::Subject => &*RE_SUBJECT,
        LabelTag::Topic => &*RE_TOPIC,
    };
    re.captures(response)
        .map(|caps| caps[1].trim().to_string())
}

/// A label passes only as a case-sensitive, exact member of the allowed set.
pub fn label_pass(label: &str, allowed: &[String]) -> bool {
    allowed.iter().any(|a| a == label)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{QuestionType, QuestionEntry};

    fn entry(text: &str, options: &[&str]) -> QuestionEntry {
        QuestionEntry {
            question_number: 1,
            question_text: text.to_string(),
            question_type: QuestionType::Mcq,
            options: options.iter().map(|s| s.to_string()).collect(),
            has_diagram: false,
            numerical_answer: None,
        }
    }

    #[test]
    fn empty_page_is_rejected() {
        assert!(!questions_pass(&[]));
    }

    #[test]
    fn four_char_text_always_fails() {
        // Regardless of how good the options are.
        let e = entry("abcd", &["A) resistance", "B) inductance"]);
        assert!(!questions_pass(&[e]));
    }

    #[test]
    fn five_char_text_is_the_boundary() {
        let e = entry("abcde", &["A) resistance", "B) inductance"]);
        assert!(questions_pass(&[e]));
    }

    #[test]
    fn one_option_is_too_few() {
        let e = entry("What is the time constant?", &["A) 2 seconds"]);
        assert!(!questions_pass(&[e]));
    }

    #[test]
    fn optionless_nat_entry_is_rejected() {
        // The option-count rule applies regardless of question type.
        let mut e = entry("The rms value of the current in amperes is", &[]);
        e.question_type = QuestionType::Nat;
        let reason = questions_rejection(&[e]).unwrap();
        assert!(reason.contains("0 option(s)"), "got: {reason}");
    }

    #[test]
    fn exactly_one_short_option_is_tolerated() {
        // "A) 0" is 4 chars, below the threshold; one such option is fine.
        let e = entry(
            "The number of poles at the origin is",
            &["A) 0", "B) more than one pole"],
        );
        assert!(questions_pass(&[e]));
    }

    #[test]
    fn two_short_options_reject_the_page() {
        let e = entry("The number of poles at the origin is", &["A) 0", "B) 1"]);
        let reason = questions_rejection(&[e]).unwrap();
        assert!(reason.contains("short options"), "got: {reason}");
    }

    #[test]
    fn one_bad_entry_rejects_the_whole_page() {
        let good = entry("What is the time constant?", &["A) 2 s", "B) 4 seconds"]);
        let bad = entry("??", &["A) 2 seconds", "B) 4 seconds"]);
        assert!(!questions_pass(&[good, bad]));
    }

    #[test]
    fn parse_label_extracts_and_trims() {
        let got = parse_label("noise <subject> Power Systems </subject> tail", LabelTag::Subject);
        assert_eq!(got.as_deref(), Some("Power Systems"));
    }

    #[test]
    fn parse_label_spans_newlines() {
        let got = parse_label("<topic>\nLinear Algebra\n</topic>", LabelTag::Topic);
        assert_eq!(got.as_deref(), Some("Linear Algebra"));
    }

    #[test]
    fn parse_label_requires_the_matching_tag() {
        assert_eq!(parse_label("<topic>X</topic>", LabelTag::Subject), None);
        assert_eq!(parse_label("Power Systems", LabelTag::Subject), None);
    }

    #[test]
    fn label_membership_is_case_sensitive() {
        let allowed = vec!["Power Systems".to_string()];
        assert!(label_pass("Power Systems", &allowed));
        assert!(!label_pass("power systems", &allowed));
        assert!(!label_pass("Power System", &allowed));
    }
}
