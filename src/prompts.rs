//! Prompt construction for the three stages.
//!
//! All prompt text lives here so it can be tuned without touching retry or
//! validation logic. The classifier prompts demand a single XML-delimited
//! label because that is the one shape [`crate::validate::parse_label`]
//! accepts — loosening the wording here without updating the parser just
//! converts good answers into rejected attempts.

use crate::taxonomy::TopicDef;
use crate::types::QuestionRow;

/// Instruction accompanying each page image on an extraction call.
///
/// The model must answer with a JSON array matching the question schema;
/// the MathJax rules keep formulae machine-readable instead of degrading
/// into Unicode soup.
pub const EXTRACTION_INSTRUCTION: &str = "\
Extract every exam question visible on this page image.

Rules:
1. Output a JSON array only. Each element must have the fields \
`question_number` (integer), `question_text` (string), `question_type` \
(\"MCQ\" or \"NAT\"), `has_diagram` (boolean); MCQ elements also carry \
`options` (array of strings), NAT elements may carry \
`numerical_answer.rounding` (\"1_decimal\", \"2_decimal\", \"3_decimal\" \
or \"integer\").
2. Use standard MathJax for ALL mathematical symbols, units and \
expressions (e.g. \\(90^\\circ\\), \\(V_1\\), \\(\\Omega\\), \
\\(z^{-1}\\)). Never use Unicode characters for math.
3. Format options exactly as 'A) ', 'B) ', 'C) ', 'D) ' and never repeat \
them inside `question_text`.
4. Set `has_diagram` to true when the question references a figure, \
table, or graph.";

/// Build the `(system, user)` messages for a subject-classification call.
///
/// `subjects` is the allowed-label set for the row's section; the same
/// slice must be handed to the validator so prompt and contract cannot
/// drift apart.
pub fn subject_messages(row: &QuestionRow, subjects: &[String]) -> (String, String) {
    let system = format!(
        "You are an extremely precise classifier for exam questions.\n\
         Your task is to determine the single, most appropriate subject from the following list:\n\
         {}\n\
         IMPORTANT:\n\
         1. You MUST choose exactly one subject from the list above.\n\
         2. Your response MUST be ONLY the chosen subject enclosed in XML tags.\n\
         3. The required format is EXACTLY:\n\
         \x20   <subject>Your Chosen Subject</subject>\n\
         No extra whitespace, punctuation, text, explanations, or line breaks are allowed.\n\
         Now, classify the following question:",
        subjects.join(", ")
    );
    (system, question_context(row))
}

/// Build the `(system, user)` messages for a topic-classification call.
///
/// `topics` are the topics of the row's already-assigned subject, each with
/// its scope description.
pub fn topic_messages(row: &QuestionRow, subject: &str, topics: &[TopicDef]) -> (String, String) {
    let names: Vec<&str> = topics.iter().map(|t| t.name.as_str()).collect();
    let described: Vec<String> = topics
        .iter()
        .map(|t| format!("{}: {}", t.name, t.scope))
        .collect();

    let system = format!(
        "You are an extremely precise classifier for exam questions.\n\
         Your task is to determine the single, most appropriate topic for this {subject} question.\n\
         Choose from the following topics:\n\
         {}\n\n\
         Here are descriptions of each topic:\n\
         {}\n\
         IMPORTANT:\n\
         1. You MUST choose exactly one topic from the list above.\n\
         2. Your response MUST be ONLY the chosen topic enclosed in XML tags.\n\
         3. The required format is EXACTLY:\n\
         \x20   <topic>Your Chosen Topic</topic>\n\
         No extra whitespace, punctuation, text, explanations, or line breaks are allowed.\n\
         Now, classify the following question:",
        names.join(", "),
        described.join("\n")
    );
    (system, question_context(row))
}

/// Shared user-message body: the question text, its options when present,
/// and the diagram description when one exists.
fn question_context(row: &QuestionRow) -> String {
    let mut prompt = format!("Question: {}\n", row.question_text);

    if matches!(row.question_type.as_str(), "MCQ" | "MSQ" | "MTA") {
        if let Some(a) = &row.option_a {
            prompt.push_str(&format!("Option A: {a}\n"));
        }
        if let Some(b) = &row.option_b {
            prompt.push_str(&format!("Option B: {b}\n"));
        }
        if let Some(c) = &row.option_c {
            prompt.push_str(&format!("Option C: {c}\n"));
        }
        if let Some(d) = &row.option_d {
            prompt.push_str(&format!("Option D: {d}\n"));
        }
    }

    if row.has_diagram {
        if let Some(desc) = &row.image_description {
            prompt.push_str(&format!("Image Description: {desc}\n"));
        }
    }

    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Section;

    fn row() -> QuestionRow {
        QuestionRow {
            year: 2019,
            page: 4,
            question: 2,
            question_text: "The Thevenin resistance seen from the terminals is".into(),
            question_type: "MCQ".into(),
            option_a: Some("A) \\(5\\,\\Omega\\)".into()),
            option_b: Some("B) \\(10\\,\\Omega\\)".into()),
            option_c: None,
            option_d: None,
            has_diagram: true,
            image_description: Some("A bridge circuit with four resistors".into()),
            section: Section::Ee,
            subject: None,
            topic: None,
        }
    }

    #[test]
    fn subject_system_lists_every_allowed_label() {
        let subjects = vec!["Electric circuits".to_string(), "Power Systems".to_string()];
        let (system, user) = subject_messages(&row(), &subjects);
        assert!(system.contains("Electric circuits, Power Systems"));
        assert!(system.contains("<subject>"));
        assert!(user.starts_with("Question: The Thevenin resistance"));
    }

    #[test]
    fn context_includes_options_and_diagram_description() {
        let (_, user) = subject_messages(&row(), &[]);
        assert!(user.contains("Option A:"));
        assert!(user.contains("Option B:"));
        assert!(!user.contains("Option C:"));
        assert!(user.contains("Image Description: A bridge circuit"));
    }

    #[test]
    fn nat_rows_carry_no_options() {
        let mut r = row();
        r.question_type = "NAT".into();
        let (_, user) = subject_messages(&r, &[]);
        assert!(!user.contains("Option A:"));
    }

    #[test]
    fn topic_system_names_the_subject_and_topics() {
        let topics = vec![
            TopicDef::new("Network Theorems", "Thevenin, Norton, Superposition."),
            TopicDef::new("Resonance", "Resonance in AC networks."),
        ];
        let (system, _) = topic_messages(&row(), "Electric circuits", &topics);
        assert!(system.contains("this Electric circuits question"));
        assert!(system.contains("Network Theorems, Resonance"));
        assert!(system.contains("Resonance: Resonance in AC networks."));
        assert!(system.contains("<topic>"));
    }
}
