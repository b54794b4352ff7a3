//! Persistence backends.
//!
//! * [`file`] — whole-document JSON store for extraction results
//! * [`sqlite`] — relational store for classification and reporting

pub mod file;
pub mod sqlite;

pub use file::{FileStore, YearPages};
pub use sqlite::{QuestionDb, StoreStats};
