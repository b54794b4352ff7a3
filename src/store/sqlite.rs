//! Relational store for question rows and their classification labels.
//!
//! SQLite with WAL journaling; the connection sits behind a mutex and is
//! shared by handle (`Arc<QuestionDb>`), so classification workers all
//! write through the same connection. Label updates touch one column of
//! one row and are idempotent, which keeps the commit path retryable.

use crate::error::{ExamscribeError, UnitError};
use crate::store::file::YearPages;
use crate::types::{LabelField, QuestionKey, QuestionRow, Section};
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::BTreeMap;
use std::path::Path;
use std::str::FromStr;
use std::sync::Mutex;
use tracing::{debug, info, warn};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS questions (
    year              INTEGER NOT NULL,
    page_number       INTEGER NOT NULL,
    question_number   INTEGER NOT NULL,
    question_text     TEXT NOT NULL,
    question_type     TEXT NOT NULL,
    option_a          TEXT,
    option_b          TEXT,
    option_c          TEXT,
    option_d          TEXT,
    has_diagram       INTEGER NOT NULL DEFAULT 0,
    image_description TEXT,
    section           TEXT NOT NULL DEFAULT 'EE',
    subject           TEXT,
    topic             TEXT,
    PRIMARY KEY (year, page_number, question_number)
)";

/// Row counts used by the status report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreStats {
    pub total: usize,
    pub with_subject: usize,
    pub with_topic: usize,
}

impl StoreStats {
    pub fn pending(&self, field: LabelField) -> usize {
        match field {
            LabelField::Subject => self.total - self.with_subject,
            // Topic classification only considers rows that already have a
            // subject.
            LabelField::Topic => self.with_subject - self.with_topic,
        }
    }
}

/// Shared handle to the questions database.
pub struct QuestionDb {
    conn: Mutex<Connection>,
}

impl QuestionDb {
    /// Open (creating if absent) the database at `path` and ensure the
    /// schema exists.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, ExamscribeError> {
        let conn = Connection::open(path.as_ref())?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        conn.pragma_update(None, "busy_timeout", 5000)?;
        conn.execute(SCHEMA, [])?;
        debug!("question database ready: {}", path.as_ref().display());
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// In-memory database, used by tests.
    pub fn open_in_memory() -> Result<Self, ExamscribeError> {
        let conn = Connection::open_in_memory()?;
        conn.execute(SCHEMA, [])?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Connection> {
        // Poisoning only happens if a holder panicked mid-statement; the
        // connection itself is still usable.
        match self.conn.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Rows still waiting on `field`, in deterministic
    /// `(year, page, question)` order.
    ///
    /// Subject selects rows with no subject; topic selects rows that have a
    /// subject but no topic, so the two stages can run back to back without
    /// racing each other's prerequisites.
    pub fn fetch_pending(&self, field: LabelField) -> Result<Vec<QuestionRow>, ExamscribeError> {
        let filter = match field {
            LabelField::Subject => "subject IS NULL",
            LabelField::Topic => "subject IS NOT NULL AND topic IS NULL",
        };
        let sql = format!(
            "SELECT year, page_number, question_number, question_text, question_type, \
             option_a, option_b, option_c, option_d, has_diagram, image_description, \
             section, subject, topic \
             FROM questions WHERE {filter} \
             ORDER BY year, page_number, question_number"
        );

        let conn = self.lock();
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map([], row_from_sql)?;

        let mut pending = Vec::new();
        for row in rows {
            match row? {
                Ok(parsed) => pending.push(parsed),
                Err(key) => warn!("skipping row {key}: unknown section code"),
            }
        }
        Ok(pending)
    }

    /// Write one label column for one row. Last-write-wins and safe to
    /// retry.
    pub fn update_label(
        &self,
        key: &QuestionKey,
        field: LabelField,
        value: &str,
    ) -> Result<(), UnitError> {
        let sql = format!(
            "UPDATE questions SET {} = ?1 \
             WHERE year = ?2 AND page_number = ?3 AND question_number = ?4",
            field.column()
        );
        let conn = self.lock();
        let changed = conn
            .execute(&sql, params![value, key.year, key.page, key.question])
            .map_err(|e| UnitError::Store(format!("update {} for {key}: {e}", field.column())))?;
        if changed == 0 {
            return Err(UnitError::Store(format!(
                "no row matched {key} when writing {}",
                field.column()
            )));
        }
        Ok(())
    }

    /// Load extraction results into the questions table.
    ///
    /// `INSERT OR IGNORE` keyed on `(year, page, question)`: rows already
    /// imported keep their labels, so the import can be re-run after each
    /// extraction pass. MCQ options map positionally onto `option_a`..`d`;
    /// extras beyond four are dropped with a warning.
    pub fn import_results(
        &self,
        snapshot: &BTreeMap<String, YearPages>,
        section: Section,
    ) -> Result<usize, ExamscribeError> {
        let mut conn = self.lock();
        let tx = conn.transaction()?;
        let mut inserted = 0usize;

        {
            let mut stmt = tx.prepare(
                "INSERT OR IGNORE INTO questions \
                 (year, page_number, question_number, question_text, question_type, \
                  option_a, option_b, option_c, option_d, has_diagram, section) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            )?;

            for (year, year_pages) in snapshot {
                let Ok(year_num) = year.parse::<i64>() else {
                    warn!("skipping year directory '{year}': not numeric");
                    continue;
                };
                for (page, entries) in &year_pages.pages {
                    let Ok(page_num) = page.parse::<i64>() else {
                        warn!("skipping page '{year}/{page}': not numeric");
                        continue;
                    };
                    for entry in entries {
                        if entry.options.len() > 4 {
                            warn!(
                                "{year}/{page} q{}: {} options, keeping first four",
                                entry.question_number,
                                entry.options.len()
                            );
                        }
                        let opt = |i: usize| entry.options.get(i).map(String::as_str);
                        inserted += stmt.execute(params![
                            year_num,
                            page_num,
                            entry.question_number,
                            entry.question_text,
                            entry.question_type.as_str(),
                            opt(0),
                            opt(1),
                            opt(2),
                            opt(3),
                            entry.has_diagram,
                            section.as_str(),
                        ])?;
                    }
                }
            }
        }

        tx.commit()?;
        info!("import complete: {inserted} new rows");
        Ok(inserted)
    }

    /// One row by key, mainly for tests and spot checks.
    pub fn get(&self, key: &QuestionKey) -> Result<Option<QuestionRow>, ExamscribeError> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT year, page_number, question_number, question_text, question_type, \
             option_a, option_b, option_c, option_d, has_diagram, image_description, \
             section, subject, topic \
             FROM questions WHERE year = ?1 AND page_number = ?2 AND question_number = ?3",
        )?;
        let row = stmt
            .query_row(params![key.year, key.page, key.question], row_from_sql)
            .optional()?;
        match row {
            Some(Ok(parsed)) => Ok(Some(parsed)),
            Some(Err(key)) => {
                warn!("row {key} has an unknown section code");
                Ok(None)
            }
            None => Ok(None),
        }
    }

    /// Row counts for the status report.
    pub fn stats(&self) -> Result<StoreStats, ExamscribeError> {
        let conn = self.lock();
        let (total, with_subject, with_topic) = conn.query_row(
            "SELECT COUNT(*), \
             COUNT(subject), \
             COUNT(CASE WHEN subject IS NOT NULL THEN topic END) \
             FROM questions",
            [],
            |r| {
                Ok((
                    r.get::<_, i64>(0)?,
                    r.get::<_, i64>(1)?,
                    r.get::<_, i64>(2)?,
                ))
            },
        )?;
        Ok(StoreStats {
            total: total as usize,
            with_subject: with_subject as usize,
            with_topic: with_topic as usize,
        })
    }
}

/// Map a SELECT row to a [`QuestionRow`]. The inner `Result` reports an
/// unparseable section code without aborting the whole statement.
fn row_from_sql(row: &rusqlite::Row<'_>) -> rusqlite::Result<Result<QuestionRow, QuestionKey>> {
    let key = QuestionKey {
        year: row.get(0)?,
        page: row.get(1)?,
        question: row.get(2)?,
    };
    let section_code: String = row.get(11)?;
    let Ok(section) = Section::from_str(&section_code) else {
        return Ok(Err(key));
    };
    Ok(Ok(QuestionRow {
        year: key.year,
        page: key.page,
        question: key.question,
        question_text: row.get(3)?,
        question_type: row.get(4)?,
        option_a: row.get(5)?,
        option_b: row.get(6)?,
        option_c: row.get(7)?,
        option_d: row.get(8)?,
        has_diagram: row.get(9)?,
        image_description: row.get(10)?,
        section,
        subject: row.get(12)?,
        topic: row.get(13)?,
    }))
}
