//! Classification stages: question row → text model → validated label.
//!
//! Subject and topic classification share one stage type, selected by
//! [`LabelField`]. The two differ only in which prompt they build, which
//! tag pair they parse, and which allowed-label set they validate against;
//! the retry, pool, and commit machinery is identical.

use crate::client::{submit_timed, ModelClient, ModelRequest};
use crate::config::PipelineConfig;
use crate::error::{ExamscribeError, UnitError};
use crate::pipeline::progress::ProgressHook;
use crate::pipeline::run_pool;
use crate::pipeline::worker::{Attempt, Stage};
use crate::prompts::{subject_messages, topic_messages};
use crate::stages::RunReport;
use crate::store::sqlite::QuestionDb;
use crate::taxonomy::Taxonomy;
use crate::types::{LabelField, QuestionKey, QuestionRow, WorkUnit};
use crate::validate::{label_pass, parse_label, LabelTag};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// One question row labeled with a subject or topic.
pub struct ClassifyStage {
    client: Arc<dyn ModelClient>,
    db: Arc<QuestionDb>,
    taxonomy: Arc<Taxonomy>,
    field: LabelField,
    timeout: Duration,
}

impl ClassifyStage {
    pub fn new(
        client: Arc<dyn ModelClient>,
        db: Arc<QuestionDb>,
        taxonomy: Arc<Taxonomy>,
        field: LabelField,
        timeout: Duration,
    ) -> Self {
        Self {
            client,
            db,
            taxonomy,
            field,
            timeout,
        }
    }

    /// The prompt pair and allowed-label set for one row.
    fn plan(&self, row: &QuestionRow) -> Result<((String, String), Vec<String>), UnitError> {
        match self.field {
            LabelField::Subject => {
                let allowed = self.taxonomy.subject_names(row.section);
                Ok((subject_messages(row, &allowed), allowed))
            }
            LabelField::Topic => {
                let subject = row.subject.as_deref().ok_or_else(|| {
                    UnitError::Payload("row has no subject yet".into())
                })?;
                let topics = self
                    .taxonomy
                    .topics_for(row.section, subject)
                    .ok_or_else(|| {
                        UnitError::Payload(format!("subject '{subject}' not in the taxonomy"))
                    })?;
                let allowed: Vec<String> = topics.iter().map(|t| t.name.clone()).collect();
                Ok((topic_messages(row, subject, topics), allowed))
            }
        }
    }

    fn tag(&self) -> LabelTag {
        match self.field {
            LabelField::Subject => LabelTag::Subject,
            LabelField::Topic => LabelTag::Topic,
        }
    }
}

#[async_trait]
impl Stage for ClassifyStage {
    type Key = QuestionKey;
    type Payload = QuestionRow;
    type Record = String;

    fn name(&self) -> &'static str {
        match self.field {
            LabelField::Subject => "classify-subject",
            LabelField::Topic => "classify-topic",
        }
    }

    async fn attempt(
        &self,
        unit: &WorkUnit<QuestionKey, QuestionRow>,
    ) -> Result<Attempt<String>, UnitError> {
        let ((system, user), allowed) = self.plan(&unit.payload)?;
        let request = ModelRequest::Text { system, user };
        let response = submit_timed(self.client.as_ref(), &request, self.timeout).await?;

        let label = parse_label(&response, self.tag()).ok_or_else(|| {
            UnitError::Parse(format!("no <{0}>…</{0}> marker in response", self.field.column()))
        })?;

        if label_pass(&label, &allowed) {
            Ok(Attempt::Valid(label))
        } else {
            Ok(Attempt::Rejected {
                reason: format!("'{label}' is not an allowed {}", self.field.column()),
                candidate: label,
            })
        }
    }

    async fn commit(&self, key: &QuestionKey, record: &String) -> Result<(), UnitError> {
        self.db.update_label(key, self.field, record)
    }

    // No salvage override: an off-list label is never written, the row
    // stays pending for the next run.
}

/// Run one classification stage over every pending row.
///
/// Pending means `subject IS NULL` for the subject stage and
/// `subject IS NOT NULL AND topic IS NULL` for the topic stage, so the
/// stages compose: an interrupted subject run leaves rows the topic run
/// simply does not see yet.
pub async fn run_classification(
    client: Arc<dyn ModelClient>,
    db: Arc<QuestionDb>,
    taxonomy: Arc<Taxonomy>,
    field: LabelField,
    config: &PipelineConfig,
    hook: Arc<dyn ProgressHook>,
) -> Result<RunReport, ExamscribeError> {
    let rows = db.fetch_pending(field)?;

    let mut backlog: Vec<WorkUnit<QuestionKey, QuestionRow>> = Vec::with_capacity(rows.len());
    for row in rows {
        // A row whose subject is off-taxonomy (hand-edited, or from an older
        // label set) would burn its whole attempt budget without a single
        // model call; exclude it up front.
        if field == LabelField::Topic {
            let known = row
                .subject
                .as_deref()
                .is_some_and(|s| taxonomy.topics_for(row.section, s).is_some());
            if !known {
                warn!(
                    "skipping {}: subject {:?} has no topic list",
                    row.key(),
                    row.subject
                );
                continue;
            }
        }
        backlog.push(WorkUnit::new(row.key(), row));
    }

    info!("{}: {} rows pending", match field {
        LabelField::Subject => "classify-subject",
        LabelField::Topic => "classify-topic",
    }, backlog.len());

    let total = backlog.len();
    let stage = Arc::new(ClassifyStage::new(
        client,
        db,
        taxonomy,
        field,
        config.api_timeout(),
    ));
    let tally = run_pool(stage, backlog, config.workers, config.classify_policy(), hook).await;

    Ok(RunReport { total, tally })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Section;

    fn row(section: Section, subject: Option<&str>) -> QuestionRow {
        QuestionRow {
            year: 2019,
            page: 3,
            question: 1,
            question_text: "The transfer function has a pole at the origin.".into(),
            question_type: "MCQ".into(),
            option_a: Some("A) Type 0 system".into()),
            option_b: Some("B) Type 1 system".into()),
            option_c: None,
            option_d: None,
            has_diagram: false,
            image_description: None,
            section,
            subject: subject.map(String::from),
            topic: None,
        }
    }

    fn stage(field: LabelField) -> ClassifyStage {
        struct Unused;
        #[async_trait]
        impl ModelClient for Unused {
            async fn submit(
                &self,
                _request: &crate::client::ModelRequest,
            ) -> Result<String, UnitError> {
                Err(UnitError::Model("not called".into()))
            }
        }
        ClassifyStage::new(
            Arc::new(Unused),
            Arc::new(QuestionDb::open_in_memory().unwrap()),
            Arc::new(Taxonomy::gate()),
            field,
            Duration::from_secs(1),
        )
    }

    #[test]
    fn subject_plan_uses_the_section_subject_list() {
        let s = stage(LabelField::Subject);
        let ((system, _), allowed) = s.plan(&row(Section::Ee, None)).unwrap();
        assert!(allowed.contains(&"Control Systems".to_string()));
        assert!(system.contains("<subject>"));
    }

    #[test]
    fn topic_plan_requires_a_subject() {
        let s = stage(LabelField::Topic);
        let err = s.plan(&row(Section::Ee, None)).unwrap_err();
        assert!(matches!(err, UnitError::Payload(_)));
    }

    #[test]
    fn topic_plan_rejects_an_unknown_subject() {
        let s = stage(LabelField::Topic);
        let err = s.plan(&row(Section::Ee, Some("Astrology"))).unwrap_err();
        assert!(err.to_string().contains("Astrology"));
    }

    #[test]
    fn topic_plan_scopes_to_the_assigned_subject() {
        let s = stage(LabelField::Topic);
        let ((system, _), allowed) = s
            .plan(&row(Section::Ee, Some("Control Systems")))
            .unwrap();
        assert!(system.contains("this Control Systems question"));
        assert!(!allowed.is_empty());
        // Topics from another subject are not allowed.
        assert!(!allowed.contains(&"Network Theorems".to_string()));
    }
}
