//! Arrow schemas and Parquet I/O for the silver and gold tables.
//!
//! One schema function plus one writer per table, and a reader for the
//! silver table. Table row structs live here with their schemas; the
//! aggregation logic only ever sees plain Rust structs.

use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use arrow_array::builder::{ListBuilder, StringBuilder};
use arrow_array::{Array, ArrayRef, Int64Array, RecordBatch, StringArray};
use arrow_schema::{DataType, Field, Schema};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;

use citemill_common::works::FlatRow;
use citemill_common::{CitemillError, Result};

/// One row of the yearly_trends gold table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrendRow {
    pub domain: String,
    pub field: String,
    pub topic: String,
    pub publication_year: i64,
    pub total_works: i64,
    pub total_citations: i64,
}

/// One row of the top_authors or top_institutions gold tables; `key` is
/// the author name or institution name depending on the table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RankedGroupRow {
    pub domain: String,
    pub field: String,
    pub topic: String,
    pub key: String,
    pub total_works: i64,
    pub total_citations: i64,
}

/// One row of the top_works gold table: a deduplicated work with the
/// distinct institutions observed across all of its authorships.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopWorkRow {
    pub domain: Option<String>,
    pub field: Option<String>,
    pub topic: String,
    pub title: String,
    pub cited_by_count: i64,
    pub publication_year: i64,
    pub institutions: Vec<String>,
}

fn tabular_err<E: std::fmt::Display>(e: E) -> CitemillError {
    CitemillError::Tabular(e.to_string())
}

// ── Silver table ──────────────────────────────────────────────────────────

pub fn flat_schema() -> Arc<Schema> {
    Arc::new(Schema::new(vec![
        Field::new("work_id", DataType::Utf8, false),
        Field::new("title", DataType::Utf8, false),
        Field::new("publication_year", DataType::Int64, false),
        Field::new("cited_by_count", DataType::Int64, false),
        Field::new("topic", DataType::Utf8, true),
        Field::new("domain", DataType::Utf8, true),
        Field::new("field", DataType::Utf8, true),
        Field::new("author_name", DataType::Utf8, true),
        Field::new("author_id", DataType::Utf8, true),
        Field::new("institution", DataType::Utf8, true),
    ]))
}

pub fn write_flat_rows(path: &Path, rows: &[FlatRow]) -> Result<()> {
    let schema = flat_schema();

    let work_id = StringArray::from(rows.iter().map(|r| r.work_id.as_str()).collect::<Vec<_>>());
    let title = StringArray::from(rows.iter().map(|r| r.title.as_str()).collect::<Vec<_>>());
    let publication_year = Int64Array::from(rows.iter().map(|r| r.publication_year).collect::<Vec<_>>());
    let cited_by_count = Int64Array::from(rows.iter().map(|r| r.cited_by_count).collect::<Vec<_>>());
    let topic = StringArray::from(rows.iter().map(|r| r.topic.as_deref()).collect::<Vec<_>>());
    let domain = StringArray::from(rows.iter().map(|r| r.domain.as_deref()).collect::<Vec<_>>());
    let field = StringArray::from(rows.iter().map(|r| r.field.as_deref()).collect::<Vec<_>>());
    let author_name = StringArray::from(rows.iter().map(|r| r.author_name.as_deref()).collect::<Vec<_>>());
    let author_id = StringArray::from(rows.iter().map(|r| r.author_id.as_deref()).collect::<Vec<_>>());
    let institution = StringArray::from(rows.iter().map(|r| r.institution.as_deref()).collect::<Vec<_>>());

    let batch = RecordBatch::try_new(
        schema.clone(),
        vec![
            Arc::new(work_id) as ArrayRef,
            Arc::new(title),
            Arc::new(publication_year),
            Arc::new(cited_by_count),
            Arc::new(topic),
            Arc::new(domain),
            Arc::new(field),
            Arc::new(author_name),
            Arc::new(author_id),
            Arc::new(institution),
        ],
    )
    .map_err(tabular_err)?;

    write_batch(path, schema, batch)
}

pub fn read_flat_rows(path: &Path) -> Result<Vec<FlatRow>> {
    let mut rows = Vec::new();
    for batch in read_batches(path)? {
        let work_id = string_col(&batch, "work_id")?;
        let title = string_col(&batch, "title")?;
        let publication_year = int_col(&batch, "publication_year")?;
        let cited_by_count = int_col(&batch, "cited_by_count")?;
        let topic = string_col(&batch, "topic")?;
        let domain = string_col(&batch, "domain")?;
        let field = string_col(&batch, "field")?;
        let author_name = string_col(&batch, "author_name")?;
        let author_id = string_col(&batch, "author_id")?;
        let institution = string_col(&batch, "institution")?;

        for i in 0..batch.num_rows() {
            rows.push(FlatRow {
                work_id: work_id.value(i).to_string(),
                title: title.value(i).to_string(),
                publication_year: publication_year.value(i),
                cited_by_count: cited_by_count.value(i),
                topic: opt_value(topic, i),
                domain: opt_value(domain, i),
                field: opt_value(field, i),
                author_name: opt_value(author_name, i),
                author_id: opt_value(author_id, i),
                institution: opt_value(institution, i),
            });
        }
    }
    Ok(rows)
}

// ── Gold tables ───────────────────────────────────────────────────────────

pub fn write_trend_rows(path: &Path, rows: &[TrendRow]) -> Result<()> {
    let schema = Arc::new(Schema::new(vec![
        Field::new("domain", DataType::Utf8, false),
        Field::new("field", DataType::Utf8, false),
        Field::new("topic", DataType::Utf8, false),
        Field::new("publication_year", DataType::Int64, false),
        Field::new("total_works", DataType::Int64, false),
        Field::new("total_citations", DataType::Int64, false),
    ]));

    let batch = RecordBatch::try_new(
        schema.clone(),
        vec![
            Arc::new(StringArray::from(rows.iter().map(|r| r.domain.as_str()).collect::<Vec<_>>())) as ArrayRef,
            Arc::new(StringArray::from(rows.iter().map(|r| r.field.as_str()).collect::<Vec<_>>())),
            Arc::new(StringArray::from(rows.iter().map(|r| r.topic.as_str()).collect::<Vec<_>>())),
            Arc::new(Int64Array::from(rows.iter().map(|r| r.publication_year).collect::<Vec<_>>())),
            Arc::new(Int64Array::from(rows.iter().map(|r| r.total_works).collect::<Vec<_>>())),
            Arc::new(Int64Array::from(rows.iter().map(|r| r.total_citations).collect::<Vec<_>>())),
        ],
    )
    .map_err(tabular_err)?;

    write_batch(path, schema, batch)
}

/// Writer shared by top_authors and top_institutions; `key_column` names
/// the fourth grouping column ("author_name" or "institution").
pub fn write_ranked_rows(path: &Path, key_column: &str, rows: &[RankedGroupRow]) -> Result<()> {
    let schema = Arc::new(Schema::new(vec![
        Field::new("domain", DataType::Utf8, false),
        Field::new("field", DataType::Utf8, false),
        Field::new("topic", DataType::Utf8, false),
        Field::new(key_column, DataType::Utf8, false),
        Field::new("total_works", DataType::Int64, false),
        Field::new("total_citations", DataType::Int64, false),
    ]));

    let batch = RecordBatch::try_new(
        schema.clone(),
        vec![
            Arc::new(StringArray::from(rows.iter().map(|r| r.domain.as_str()).collect::<Vec<_>>())) as ArrayRef,
            Arc::new(StringArray::from(rows.iter().map(|r| r.field.as_str()).collect::<Vec<_>>())),
            Arc::new(StringArray::from(rows.iter().map(|r| r.topic.as_str()).collect::<Vec<_>>())),
            Arc::new(StringArray::from(rows.iter().map(|r| r.key.as_str()).collect::<Vec<_>>())),
            Arc::new(Int64Array::from(rows.iter().map(|r| r.total_works).collect::<Vec<_>>())),
            Arc::new(Int64Array::from(rows.iter().map(|r| r.total_citations).collect::<Vec<_>>())),
        ],
    )
    .map_err(tabular_err)?;

    write_batch(path, schema, batch)
}

pub fn write_top_work_rows(path: &Path, rows: &[TopWorkRow]) -> Result<()> {
    let mut institution_builder = ListBuilder::new(StringBuilder::new());
    for row in rows {
        for inst in &row.institutions {
            institution_builder.values().append_value(inst);
        }
        institution_builder.append(true);
    }
    let institutions = institution_builder.finish();

    let schema = Arc::new(Schema::new(vec![
        Field::new("domain", DataType::Utf8, true),
        Field::new("field", DataType::Utf8, true),
        Field::new("topic", DataType::Utf8, false),
        Field::new("title", DataType::Utf8, false),
        Field::new("cited_by_count", DataType::Int64, false),
        Field::new("publication_year", DataType::Int64, false),
        Field::new("institution", institutions.data_type().clone(), true),
    ]));

    let batch = RecordBatch::try_new(
        schema.clone(),
        vec![
            Arc::new(StringArray::from(rows.iter().map(|r| r.domain.as_deref()).collect::<Vec<_>>())) as ArrayRef,
            Arc::new(StringArray::from(rows.iter().map(|r| r.field.as_deref()).collect::<Vec<_>>())),
            Arc::new(StringArray::from(rows.iter().map(|r| r.topic.as_str()).collect::<Vec<_>>())),
            Arc::new(StringArray::from(rows.iter().map(|r| r.title.as_str()).collect::<Vec<_>>())),
            Arc::new(Int64Array::from(rows.iter().map(|r| r.cited_by_count).collect::<Vec<_>>())),
            Arc::new(Int64Array::from(rows.iter().map(|r| r.publication_year).collect::<Vec<_>>())),
            Arc::new(institutions),
        ],
    )
    .map_err(tabular_err)?;

    write_batch(path, schema, batch)
}

// ── Shared plumbing ───────────────────────────────────────────────────────

pub fn read_batches(path: &Path) -> Result<Vec<RecordBatch>> {
    let file = File::open(path)?;
    let reader = ParquetRecordBatchReaderBuilder::try_new(file)
        .map_err(tabular_err)?
        .build()
        .map_err(tabular_err)?;

    let mut batches = Vec::new();
    for batch in reader {
        batches.push(batch.map_err(tabular_err)?);
    }
    Ok(batches)
}

fn write_batch(path: &Path, schema: Arc<Schema>, batch: RecordBatch) -> Result<()> {
    let file = File::create(path)?;
    let mut writer = ArrowWriter::try_new(file, schema, None).map_err(tabular_err)?;
    writer.write(&batch).map_err(tabular_err)?;
    writer.close().map_err(tabular_err)?;
    Ok(())
}

fn string_col<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray> {
    batch
        .column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref::<StringArray>())
        .ok_or_else(|| CitemillError::Tabular(format!("missing string column {name}")))
}

fn int_col<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a Int64Array> {
    batch
        .column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref::<Int64Array>())
        .ok_or_else(|| CitemillError::Tabular(format!("missing int column {name}")))
}

fn opt_value(array: &StringArray, row: usize) -> Option<String> {
    if array.is_null(row) {
        None
    } else {
        Some(array.value(row).to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_row() -> FlatRow {
        FlatRow {
            work_id: "https://openalex.org/W1".to_string(),
            title: "Sample".to_string(),
            publication_year: 2023,
            cited_by_count: 10,
            topic: Some("Neural Networks".to_string()),
            domain: None,
            field: Some("Computer Science".to_string()),
            author_name: Some("A. Vaswani".to_string()),
            author_id: None,
            institution: Some("Google".to_string()),
        }
    }

    #[test]
    fn test_flat_rows_round_trip_with_nulls() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("works_flat.parquet");
        let rows = vec![
            sample_row(),
            FlatRow {
                work_id: "https://openalex.org/W2".to_string(),
                title: "No metadata at all".to_string(),
                publication_year: 0,
                cited_by_count: 0,
                topic: None,
                domain: None,
                field: None,
                author_name: None,
                author_id: None,
                institution: None,
            },
        ];

        write_flat_rows(&path, &rows).unwrap();
        let back = read_flat_rows(&path).unwrap();
        assert_eq!(back, rows);
    }

    #[test]
    fn test_top_work_rows_list_column() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("top_works.parquet");
        let rows = vec![
            TopWorkRow {
                domain: Some("Physical Sciences".to_string()),
                field: None,
                topic: "Neural Networks".to_string(),
                title: "Sample".to_string(),
                cited_by_count: 10,
                publication_year: 2023,
                institutions: vec!["Google".to_string(), "USC".to_string()],
            },
            TopWorkRow {
                domain: None,
                field: None,
                topic: "Macroeconomics".to_string(),
                title: "Lonely".to_string(),
                cited_by_count: 3,
                publication_year: 2024,
                institutions: vec![],
            },
        ];

        write_top_work_rows(&path, &rows).unwrap();
        let batches = read_batches(&path).unwrap();
        assert_eq!(batches.iter().map(|b| b.num_rows()).sum::<usize>(), 2);

        let batch = &batches[0];
        let topics = string_col(batch, "topic").unwrap();
        assert_eq!(topics.value(0), "Neural Networks");
        let lists = batch
            .column_by_name("institution")
            .unwrap()
            .as_any()
            .downcast_ref::<arrow_array::ListArray>()
            .unwrap();
        assert_eq!(lists.value(0).len(), 2);
        assert_eq!(lists.value(1).len(), 0);
    }

    #[test]
    fn test_missing_file_is_a_storage_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_flat_rows(&dir.path().join("absent.parquet")).unwrap_err();
        assert!(matches!(err, CitemillError::Storage(_)));
    }
}
