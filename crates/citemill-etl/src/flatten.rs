//! Silver stage: flatten every bronze batch into one tabular artifact.
//!
//! All batches present at flatten time are unioned with no batch-level
//! dedup; duplicate work ids flow through and are resolved by the gold
//! stage's work-level dedup. Re-running over an unchanged bronze corpus
//! reproduces the same row set (files are discovered in sorted order and
//! every transform is deterministic).

use std::path::PathBuf;
use tracing::{info, instrument, warn};

use citemill_common::works::{FlatRow, RawWork};
use citemill_common::Result;
use citemill_config::Config;

use crate::tabular;

pub const SILVER_TABLE: &str = "works_flat.parquet";

/// Summary of one flatten pass.
#[derive(Debug, Clone, Default)]
pub struct FlattenReport {
    pub files_read: usize,
    pub files_skipped: usize,
    pub records: usize,
    pub rows: usize,
    pub output: Option<PathBuf>,
}

/// One FlatRow per authorship entry. A record with no usable work id or
/// title contributes nothing; a record with no authorships contributes
/// zero rows (accepted information loss).
pub fn flatten_record(work: &RawWork) -> Vec<FlatRow> {
    let Some(work_id) = work.id.as_deref() else {
        warn!(title = ?work.title, "work record with no id, skipping");
        return Vec::new();
    };
    let title = match work.title.as_deref() {
        Some(t) if !t.trim().is_empty() => t,
        _ => return Vec::new(),
    };

    let publication_year = work.publication_year.unwrap_or(0);
    let cited_by_count = work.cited_by_count.unwrap_or(0);
    let topic = work.topic_name().map(String::from);
    let domain = work.domain_name().map(String::from);
    let field = work.field_name().map(String::from);

    work.authorships
        .iter()
        .map(|authorship| {
            let author = authorship.author.as_ref();
            FlatRow {
                work_id: work_id.to_string(),
                title: title.to_string(),
                publication_year,
                cited_by_count,
                topic: topic.clone(),
                domain: domain.clone(),
                field: field.clone(),
                author_name: author.and_then(|a| a.display_name.clone()),
                author_id: author.and_then(|a| a.id.clone()),
                institution: authorship
                    .institutions
                    .first()
                    .and_then(|i| i.display_name.clone()),
            }
        })
        .collect()
}

/// Read every bronze batch, flatten, clean, and replace the silver table.
///
/// A file that is unreadable, unparseable, or whose top level is not a
/// record list is skipped with a diagnostic; so is an individual record
/// that fails to deserialize. Only storage failures on the output side
/// propagate.
#[instrument(skip(config))]
pub fn run(config: &Config) -> Result<FlattenReport> {
    let mut report = FlattenReport::default();

    let bronze_dir = &config.storage.bronze_dir;
    if !bronze_dir.is_dir() {
        info!(dir = %bronze_dir.display(), "no bronze area, nothing to flatten");
        return Ok(report);
    }

    let mut files: Vec<PathBuf> = std::fs::read_dir(bronze_dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.extension().is_some_and(|ext| ext == "json"))
        .collect();
    files.sort();

    if files.is_empty() {
        info!(dir = %bronze_dir.display(), "no bronze batches found");
        return Ok(report);
    }
    info!(n_files = files.len(), "flattening bronze batches");

    let mut rows: Vec<FlatRow> = Vec::new();
    for path in &files {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "unreadable batch, skipping");
                report.files_skipped += 1;
                continue;
            }
        };
        let value: serde_json::Value = match serde_json::from_str(&text) {
            Ok(value) => value,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "invalid JSON, skipping");
                report.files_skipped += 1;
                continue;
            }
        };
        let Some(items) = value.as_array() else {
            warn!(path = %path.display(), "top-level content is not a work list, skipping");
            report.files_skipped += 1;
            continue;
        };

        report.files_read += 1;
        for item in items {
            match serde_json::from_value::<RawWork>(item.clone()) {
                Ok(work) => {
                    report.records += 1;
                    rows.extend(flatten_record(&work));
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "unreadable work record, skipping");
                }
            }
        }
    }

    if rows.is_empty() {
        info!("no rows extracted, silver table left untouched");
        return Ok(report);
    }

    std::fs::create_dir_all(&config.storage.silver_dir)?;
    let output = config.storage.silver_dir.join(SILVER_TABLE);
    tabular::write_flat_rows(&output, &rows)?;

    report.rows = rows.len();
    info!(
        rows = report.rows,
        records = report.records,
        files = report.files_read,
        skipped = report.files_skipped,
        path = %output.display(),
        "silver table written"
    );
    report.output = Some(output);
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(json: serde_json::Value) -> RawWork {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn test_two_authorships_share_work_fields() {
        let work = record(serde_json::json!({
            "id": "https://openalex.org/W1",
            "title": "A",
            "publication_year": 2023,
            "cited_by_count": 10,
            "authorships": [
                {
                    "author": { "id": "https://openalex.org/A1", "display_name": "First Author" },
                    "institutions": [{ "display_name": "MIT" }]
                },
                {
                    "author": { "id": "https://openalex.org/A2", "display_name": "Second Author" },
                    "institutions": [{ "display_name": "MIT" }]
                }
            ]
        }));

        let rows = flatten_record(&work);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].work_id, rows[1].work_id);
        assert_eq!(rows[0].title, "A");
        assert_eq!(rows[0].publication_year, 2023);
        assert_eq!(rows[0].cited_by_count, 10);
        assert_ne!(rows[0].author_id, rows[1].author_id);
        assert_eq!(rows[0].institution.as_deref(), Some("MIT"));
    }

    #[test]
    fn test_missing_primary_topic_keeps_row() {
        let work = record(serde_json::json!({
            "id": "https://openalex.org/W2",
            "title": "Untagged",
            "authorships": [{ "author": { "display_name": "Solo" } }]
        }));

        let rows = flatten_record(&work);
        assert_eq!(rows.len(), 1);
        assert!(rows[0].topic.is_none());
        assert!(rows[0].domain.is_none());
        assert!(rows[0].field.is_none());
        assert_eq!(rows[0].publication_year, 0);
        assert_eq!(rows[0].cited_by_count, 0);
    }

    #[test]
    fn test_missing_or_blank_title_drops_rows() {
        let untitled = record(serde_json::json!({
            "id": "https://openalex.org/W3",
            "authorships": [{ "author": { "display_name": "Someone" } }]
        }));
        assert!(flatten_record(&untitled).is_empty());

        let blank = record(serde_json::json!({
            "id": "https://openalex.org/W4",
            "title": "   ",
            "authorships": [{ "author": { "display_name": "Someone" } }]
        }));
        assert!(flatten_record(&blank).is_empty());
    }

    #[test]
    fn test_missing_work_id_drops_record() {
        let work = record(serde_json::json!({
            "title": "Orphan",
            "authorships": [{ "author": { "display_name": "Someone" } }]
        }));
        assert!(flatten_record(&work).is_empty());
    }

    #[test]
    fn test_zero_authorships_zero_rows() {
        let work = record(serde_json::json!({
            "id": "https://openalex.org/W5",
            "title": "Authorless"
        }));
        assert!(flatten_record(&work).is_empty());
    }

    #[test]
    fn test_first_institution_only() {
        let work = record(serde_json::json!({
            "id": "https://openalex.org/W6",
            "title": "Affiliations",
            "authorships": [{
                "author": { "display_name": "Busy Author" },
                "institutions": [
                    { "display_name": "First University" },
                    { "display_name": "Second University" }
                ]
            }]
        }));

        let rows = flatten_record(&work);
        assert_eq!(rows[0].institution.as_deref(), Some("First University"));
    }
}
