//! Extraction stage: page image → vision model → validated question list.

use crate::client::{submit_timed, ModelClient, ModelRequest};
use crate::config::PipelineConfig;
use crate::error::{ExamscribeError, UnitError};
use crate::pages::{self, PageImage};
use crate::pipeline::progress::ProgressHook;
use crate::pipeline::worker::{Attempt, Stage};
use crate::pipeline::{resume, run_pool};
use crate::prompts::EXTRACTION_INSTRUCTION;
use crate::stages::RunReport;
use crate::store::file::FileStore;
use crate::types::{PageKey, QuestionEntry, WorkUnit};
use crate::validate::questions_rejection;
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

static RE_CODE_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```(?:json)?\s*(.*?)\s*```$").unwrap());

/// One page processed end to end: read the image, call the vision model,
/// parse the JSON array, validate, persist.
pub struct ExtractStage {
    client: Arc<dyn ModelClient>,
    store: Arc<FileStore>,
    timeout: Duration,
}

impl ExtractStage {
    pub fn new(client: Arc<dyn ModelClient>, store: Arc<FileStore>, timeout: Duration) -> Self {
        Self {
            client,
            store,
            timeout,
        }
    }
}

#[async_trait]
impl Stage for ExtractStage {
    type Key = PageKey;
    type Payload = PathBuf;
    type Record = Vec<QuestionEntry>;

    fn name(&self) -> &'static str {
        "extract"
    }

    async fn attempt(
        &self,
        unit: &WorkUnit<PageKey, PathBuf>,
    ) -> Result<Attempt<Vec<QuestionEntry>>, UnitError> {
        // The image is re-read on every attempt; a transient read error
        // consumes an attempt like any other failure.
        let image_png = tokio::fs::read(&unit.payload)
            .await
            .map_err(|e| UnitError::Payload(format!("{}: {e}", unit.payload.display())))?;

        let request = ModelRequest::Vision {
            instruction: EXTRACTION_INSTRUCTION.to_string(),
            image_png,
        };
        let response = submit_timed(self.client.as_ref(), &request, self.timeout).await?;

        let entries = parse_question_array(&response)?;
        match questions_rejection(&entries) {
            None => Ok(Attempt::Valid(entries)),
            Some(reason) => Ok(Attempt::Rejected {
                candidate: entries,
                reason,
            }),
        }
    }

    async fn commit(&self, key: &PageKey, record: &Vec<QuestionEntry>) -> Result<(), UnitError> {
        self.store.insert(key, record.clone()).await
    }

    async fn salvage(&self, key: &PageKey, candidate: Vec<QuestionEntry>) -> bool {
        match self.store.mark_needs_verification(key, candidate).await {
            Ok(()) => true,
            Err(e) => {
                error!("extract {key}: could not store flagged record: {e}");
                false
            }
        }
    }
}

/// Parse the model response as a JSON array of questions.
///
/// Tolerates a markdown code fence around the array and prose around it
/// (the first `[` to the last `]` is taken as the payload); anything else
/// is a parse failure and consumes an attempt.
fn parse_question_array(response: &str) -> Result<Vec<QuestionEntry>, UnitError> {
    let trimmed = response.trim();
    let body = match RE_CODE_FENCE.captures(trimmed) {
        Some(caps) => caps[1].to_string(),
        None => trimmed.to_string(),
    };

    match serde_json::from_str(&body) {
        Ok(entries) => Ok(entries),
        Err(first) => {
            let start = body.find('[');
            let end = body.rfind(']');
            if let (Some(start), Some(end)) = (start, end) {
                if start < end {
                    return serde_json::from_str(&body[start..=end])
                        .map_err(|e| UnitError::Parse(format!("question array: {e}")));
                }
            }
            Err(UnitError::Parse(format!("question array: {first}")))
        }
    }
}

/// Run the extraction stage over every pending page under `root`.
///
/// The backlog is assembled in two parts: pages whose stored record was
/// flagged by the resume scan (processed first, in key order), then pages
/// on disk with no stored record. Pages with a healthy stored record are
/// skipped without a model call, which is what makes an interrupted run
/// cheap to re-invoke.
pub async fn run_extraction(
    client: Arc<dyn ModelClient>,
    store: Arc<FileStore>,
    root: &Path,
    year: Option<&str>,
    config: &PipelineConfig,
    hook: Arc<dyn ProgressHook>,
) -> Result<RunReport, ExamscribeError> {
    let scan = resume::scan(&store).await;
    let on_disk = pages::scan_root(root, year)?;

    let mut backlog: Vec<WorkUnit<PageKey, PathBuf>> = Vec::new();

    for key in &scan.flagged {
        // A flagged key outside the requested year stays flagged for a
        // later run.
        if year.is_some_and(|y| y != key.year) {
            continue;
        }
        match pages::find_page_image(root, key) {
            Some(path) => backlog.push(WorkUnit::new(key.clone(), path)),
            None => warn!("flagged page {key} has no image under {}; skipping", root.display()),
        }
    }

    let fresh = on_disk
        .into_iter()
        .filter(|p| !scan.existing.contains(&p.key))
        .map(|PageImage { key, path }| WorkUnit::new(key, path));
    backlog.extend(fresh);

    info!(
        "extract: {} pages pending ({} flagged reruns)",
        backlog.len(),
        scan.flagged.len()
    );

    let total = backlog.len();
    let stage = Arc::new(ExtractStage::new(client, store, config.api_timeout()));
    let tally = run_pool(stage, backlog, config.workers, config.extract_policy(), hook).await;

    Ok(RunReport { total, tally })
}
