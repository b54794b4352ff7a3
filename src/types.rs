//! Core data types shared by every pipeline stage.
//!
//! The serde field names on [`QuestionEntry`] are load-bearing: they must
//! match both the JSON schema the vision model is asked to produce and the
//! shape of the persisted results file, so a document written by one run can
//! be read back unchanged by the next.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ── Keys ─────────────────────────────────────────────────────────────────

/// Identifies one scanned page: `(year directory, page number)`.
///
/// Both components are kept as strings because they come from (and index
/// back into) directory and file names; the page component has leading
/// zeros stripped (`"07"` → `"7"`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PageKey {
    pub year: String,
    pub page: String,
}

impl PageKey {
    pub fn new(year: impl Into<String>, page: impl Into<String>) -> Self {
        Self {
            year: year.into(),
            page: page.into(),
        }
    }
}

impl fmt::Display for PageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.year, self.page)
    }
}

/// Identifies one question row in the relational store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct QuestionKey {
    pub year: i64,
    pub page: i64,
    pub question: i64,
}

impl fmt::Display for QuestionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "year={} page={} question={}",
            self.year, self.page, self.question
        )
    }
}

// ── Work units ───────────────────────────────────────────────────────────

/// One item needing a model call and persistence. Immutable once created:
/// built at backlog-assembly time and discarded after dispatch.
#[derive(Debug, Clone)]
pub struct WorkUnit<K, P> {
    pub key: K,
    pub payload: P,
}

impl<K, P> WorkUnit<K, P> {
    pub fn new(key: K, payload: P) -> Self {
        Self { key, payload }
    }
}

// ── Extraction records ───────────────────────────────────────────────────

/// Question category as printed on the paper.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QuestionType {
    /// Multiple-choice question.
    #[serde(rename = "MCQ")]
    Mcq,
    /// Numerical-answer question (no options).
    #[serde(rename = "NAT")]
    Nat,
}

impl QuestionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuestionType::Mcq => "MCQ",
            QuestionType::Nat => "NAT",
        }
    }
}

/// Rounding precision requested for a numerical answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Rounding {
    #[serde(rename = "1_decimal")]
    OneDecimal,
    #[default]
    #[serde(rename = "2_decimal")]
    TwoDecimal,
    #[serde(rename = "3_decimal")]
    ThreeDecimal,
    #[serde(rename = "integer")]
    Integer,
}

/// Precision spec attached to NAT questions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NumericalAnswer {
    #[serde(default)]
    pub rounding: Rounding,
}

/// One question as transcribed from a page image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionEntry {
    pub question_number: i64,
    pub question_text: String,
    pub question_type: QuestionType,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
    pub has_diagram: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub numerical_answer: Option<NumericalAnswer>,
}

// ── Classification rows ──────────────────────────────────────────────────

/// Exam section a question belongs to; selects the allowed-label set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Section {
    #[serde(rename = "EE")]
    Ee,
    #[serde(rename = "GA")]
    Ga,
}

impl Section {
    pub fn as_str(&self) -> &'static str {
        match self {
            Section::Ee => "EE",
            Section::Ga => "GA",
        }
    }
}

impl FromStr for Section {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "EE" => Ok(Section::Ee),
            "GA" => Ok(Section::Ga),
            other => Err(format!("unknown section '{other}' (expected EE or GA)")),
        }
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which nullable column a classification stage fills in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelField {
    Subject,
    Topic,
}

impl LabelField {
    /// Column name in the `questions` table.
    pub fn column(&self) -> &'static str {
        match self {
            LabelField::Subject => "subject",
            LabelField::Topic => "topic",
        }
    }
}

/// Snapshot of one question row, as read from the relational store.
///
/// Carried as the work-unit payload so classification workers never go back
/// to the database except to commit their result.
#[derive(Debug, Clone)]
pub struct QuestionRow {
    pub year: i64,
    pub page: i64,
    pub question: i64,
    pub question_text: String,
    pub question_type: String,
    pub option_a: Option<String>,
    pub option_b: Option<String>,
    pub option_c: Option<String>,
    pub option_d: Option<String>,
    pub has_diagram: bool,
    pub image_description: Option<String>,
    pub section: Section,
    pub subject: Option<String>,
    pub topic: Option<String>,
}

impl QuestionRow {
    pub fn key(&self) -> QuestionKey {
        QuestionKey {
            year: self.year,
            page: self.page,
            question: self.question,
        }
    }
}

// ── Completion tally ─────────────────────────────────────────────────────

/// Per-worker completion counts, merged by summation. Merging is
/// commutative so the aggregate is independent of worker finish order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Tally {
    /// Units whose validated record was written to the store.
    pub committed: usize,
    /// Units that exhausted their attempts but left a flagged best-effort
    /// record behind (extraction only).
    pub salvaged: usize,
    /// Units that produced nothing committable this run.
    pub failed: usize,
}

impl Tally {
    pub fn merge(&mut self, other: Tally) {
        self.committed += other.committed;
        self.salvaged += other.salvaged;
        self.failed += other.failed;
    }

    pub fn total(&self) -> usize {
        self.committed + self.salvaged + self.failed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn question_entry_round_trips_schema_names() {
        let json = r#"{
            "question_number": 7,
            "question_text": "A signal x(t) is sampled at 2 kHz...",
            "question_type": "NAT",
            "has_diagram": false,
            "numerical_answer": { "rounding": "2_decimal" }
        }"#;
        let entry: QuestionEntry = serde_json::from_str(json).unwrap();
        assert_eq!(entry.question_type, QuestionType::Nat);
        assert!(entry.options.is_empty());
        assert_eq!(
            entry.numerical_answer.unwrap().rounding,
            Rounding::TwoDecimal
        );

        let back = serde_json::to_value(&entry).unwrap();
        assert_eq!(back["question_type"], "NAT");
        // Empty options are omitted, matching the stored document shape.
        assert!(back.get("options").is_none());
    }

    #[test]
    fn rounding_defaults_to_two_decimals() {
        let ans: NumericalAnswer = serde_json::from_str("{}").unwrap();
        assert_eq!(ans.rounding, Rounding::TwoDecimal);
    }

    #[test]
    fn tally_merge_is_commutative() {
        let a = Tally {
            committed: 3,
            salvaged: 1,
            failed: 2,
        };
        let b = Tally {
            committed: 5,
            salvaged: 0,
            failed: 1,
        };
        let mut ab = a;
        ab.merge(b);
        let mut ba = b;
        ba.merge(a);
        assert_eq!(ab, ba);
        assert_eq!(ab.total(), 12);
    }

    #[test]
    fn section_parses_exact_codes_only() {
        assert_eq!("EE".parse::<Section>().unwrap(), Section::Ee);
        assert!("ee".parse::<Section>().is_err());
    }
}
