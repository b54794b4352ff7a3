//! # examscribe
//!
//! Extract and classify exam questions from scanned papers using vision
//! language models.
//!
//! ## Why this crate?
//!
//! Scanned exam papers defeat conventional OCR: formulae come out as Unicode
//! soup, multiple-choice options merge into the question text, and diagrams
//! are silently dropped. Instead this crate hands each page image to a vision
//! model that reads it as a human would, returning structured questions with
//! MathJax-encoded formulae, then classifies every question by subject and
//! topic with a text model — all resumably, so a run interrupted at page 200
//! of 600 restarts in seconds and only pays for the pages still missing.
//!
//! ## Pipeline Overview
//!
//! ```text
//! page images (pages/<year>/<year>_EE_<page>.png)
//!  │
//!  ├─ 1. Resume    scan the results file, flag suspect records for rerun
//!  ├─ 2. Extract   vision model → JSON question list → validate → results file
//!  ├─ 3. Import    results file → relational store (INSERT OR IGNORE)
//!  ├─ 4. Subject   text model → <subject>…</subject> → validate → store
//!  └─ 5. Topic     text model → <topic>…</topic>     → validate → store
//! ```
//!
//! Every stage runs the same machinery: a sharded worker pool
//! ([`pipeline::run_pool`]) drives a [`pipeline::Stage`] through a bounded
//! retry loop, validates each model response against a hard contract before
//! anything is persisted, and commits incrementally so progress survives
//! interruption.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use examscribe::{run_extraction, FileStore, OpenAiClient, PipelineConfig};
//! use examscribe::pipeline::NoopHook;
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = Arc::new(OpenAiClient::new(
//!         "https://openrouter.ai/api/v1",
//!         &std::env::var("OPENROUTER_API_KEY")?,
//!         "google/gemini-2.0-flash-001",
//!     ));
//!     let store = Arc::new(FileStore::open("results.json").await?);
//!     let config = PipelineConfig::default();
//!
//!     let report = run_extraction(
//!         client,
//!         store,
//!         Path::new("pages"),
//!         Some("2019"),
//!         &config,
//!         Arc::new(NoopHook),
//!     )
//!     .await?;
//!     eprintln!("{} pages committed", report.tally.committed);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `examscribe` binary (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! examscribe = { version = "0.3", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod client;
pub mod config;
pub mod error;
pub mod pages;
pub mod pipeline;
pub mod prompts;
pub mod stages;
pub mod store;
pub mod taxonomy;
pub mod types;
pub mod validate;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use client::{ModelClient, ModelRequest, OpenAiClient};
pub use config::{PipelineConfig, PipelineConfigBuilder, RetryPolicy};
pub use error::{ExamscribeError, UnitError};
pub use stages::{run_classification, run_extraction, RunReport};
pub use store::{FileStore, QuestionDb};
pub use taxonomy::Taxonomy;
pub use types::{LabelField, PageKey, QuestionEntry, QuestionKey, Section, Tally};
