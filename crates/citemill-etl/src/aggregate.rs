//! Gold stage: the five derived views over the silver table.
//!
//! Every view is recomputed wholesale from the current row set and
//! overwrites its prior file. Distinct-work metrics count each unique
//! work id once per group no matter how many author/institution rows it
//! produced. A row whose grouping keys are not all present contributes to
//! no group of that view (it still appears in all_works).

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::path::PathBuf;
use tracing::{info, instrument};

use citemill_common::works::FlatRow;
use citemill_common::Result;
use citemill_config::Config;

use crate::flatten::SILVER_TABLE;
use crate::tabular::{self, RankedGroupRow, TopWorkRow, TrendRow};

const TOP_WORKS_PER_TOPIC: usize = 10;

/// Summary of one aggregation pass.
#[derive(Debug, Clone)]
pub struct AggregateReport {
    pub rows_in: usize,
    pub outputs: Vec<PathBuf>,
}

#[derive(Debug, Default)]
struct GroupMetrics {
    work_ids: HashSet<String>,
    citations: i64,
}

impl GroupMetrics {
    fn add(&mut self, row: &FlatRow) {
        self.work_ids.insert(row.work_id.clone());
        self.citations += row.cited_by_count;
    }
}

/// Recompute every gold view from the silver table.
///
/// Returns `Ok(None)` when no silver artifact exists: logged and treated
/// as nothing-to-do, never an error.
#[instrument(skip(config))]
pub fn run(config: &Config) -> Result<Option<AggregateReport>> {
    let input = config.storage.silver_dir.join(SILVER_TABLE);
    if !input.is_file() {
        info!(path = %input.display(), "silver table not found, nothing to aggregate");
        return Ok(None);
    }

    let rows = tabular::read_flat_rows(&input)?;
    info!(rows = rows.len(), "aggregating silver table");

    std::fs::create_dir_all(&config.storage.gold_dir)?;
    let gold = |name: &str| config.storage.gold_dir.join(name);
    let mut outputs = Vec::new();

    let trends = yearly_trends(&rows);
    tabular::write_trend_rows(&gold("yearly_trends.parquet"), &trends)?;
    outputs.push(gold("yearly_trends.parquet"));

    let authors = top_authors(&rows);
    tabular::write_ranked_rows(&gold("top_authors.parquet"), "author_name", &authors)?;
    outputs.push(gold("top_authors.parquet"));

    let institutions = top_institutions(&rows);
    tabular::write_ranked_rows(&gold("top_institutions.parquet"), "institution", &institutions)?;
    outputs.push(gold("top_institutions.parquet"));

    let top = top_works(&rows);
    tabular::write_top_work_rows(&gold("top_works.parquet"), &top)?;
    outputs.push(gold("top_works.parquet"));

    // Master table for ad-hoc slicing by the dashboard
    tabular::write_flat_rows(&gold("all_works.parquet"), &rows)?;
    outputs.push(gold("all_works.parquet"));

    info!(
        trends = trends.len(),
        authors = authors.len(),
        institutions = institutions.len(),
        top_works = top.len(),
        "gold views written"
    );
    Ok(Some(AggregateReport { rows_in: rows.len(), outputs }))
}

/// Distinct works and summed citations per (domain, field, topic, year),
/// ascending by the full key tuple.
pub fn yearly_trends(rows: &[FlatRow]) -> Vec<TrendRow> {
    let mut groups: BTreeMap<(String, String, String, i64), GroupMetrics> = BTreeMap::new();
    for row in rows {
        let (Some(domain), Some(field), Some(topic)) =
            (row.domain.as_ref(), row.field.as_ref(), row.topic.as_ref())
        else {
            continue;
        };
        groups
            .entry((domain.clone(), field.clone(), topic.clone(), row.publication_year))
            .or_default()
            .add(row);
    }

    groups
        .into_iter()
        .map(|((domain, field, topic, publication_year), metrics)| TrendRow {
            domain,
            field,
            topic,
            publication_year,
            total_works: metrics.work_ids.len() as i64,
            total_citations: metrics.citations,
        })
        .collect()
}

/// Same metrics per (domain, field, topic, author), descending by summed
/// citations; ties stay in key order.
pub fn top_authors(rows: &[FlatRow]) -> Vec<RankedGroupRow> {
    let mut ranked = ranked_groups(rows, |row| row.author_name.as_ref());
    ranked.sort_by(|a, b| b.total_citations.cmp(&a.total_citations));
    ranked
}

/// Same metrics per (domain, field, topic, institution), descending by
/// distinct-work count; ties stay in key order.
pub fn top_institutions(rows: &[FlatRow]) -> Vec<RankedGroupRow> {
    let mut ranked = ranked_groups(rows, |row| row.institution.as_ref());
    ranked.sort_by(|a, b| b.total_works.cmp(&a.total_works));
    ranked
}

fn ranked_groups<'a>(
    rows: &'a [FlatRow],
    key_of: impl Fn(&'a FlatRow) -> Option<&'a String>,
) -> Vec<RankedGroupRow> {
    let mut groups: BTreeMap<(String, String, String, String), GroupMetrics> = BTreeMap::new();
    for row in rows {
        let (Some(domain), Some(field), Some(topic), Some(key)) = (
            row.domain.as_ref(),
            row.field.as_ref(),
            row.topic.as_ref(),
            key_of(row),
        ) else {
            continue;
        };
        groups
            .entry((domain.clone(), field.clone(), topic.clone(), key.clone()))
            .or_default()
            .add(row);
    }

    groups
        .into_iter()
        .map(|((domain, field, topic, key), metrics)| RankedGroupRow {
            domain,
            field,
            topic,
            key,
            total_works: metrics.work_ids.len() as i64,
            total_citations: metrics.citations,
        })
        .collect()
}

/// The ten highest-citation works per topic.
///
/// Works are deduplicated by work id first: first-seen title, citations,
/// year, and topic hierarchy win; institutions collect the distinct
/// non-null values across all of the work's rows (sorted). The global
/// ranking is citations descending with work id ascending as the
/// tie-break, then each topic keeps its first ten. Works without a topic
/// appear in no topic's ranking.
pub fn top_works(rows: &[FlatRow]) -> Vec<TopWorkRow> {
    struct WorkSummary {
        title: String,
        cited_by_count: i64,
        publication_year: i64,
        topic: Option<String>,
        domain: Option<String>,
        field: Option<String>,
        institutions: BTreeSet<String>,
    }

    let mut works: BTreeMap<String, WorkSummary> = BTreeMap::new();
    for row in rows {
        let summary = works.entry(row.work_id.clone()).or_insert_with(|| WorkSummary {
            title: row.title.clone(),
            cited_by_count: row.cited_by_count,
            publication_year: row.publication_year,
            topic: row.topic.clone(),
            domain: row.domain.clone(),
            field: row.field.clone(),
            institutions: BTreeSet::new(),
        });
        if let Some(institution) = &row.institution {
            summary.institutions.insert(institution.clone());
        }
    }

    // BTreeMap order is work_id ascending, so a stable sort on citations
    // keeps that as the tie-break.
    let mut ranked: Vec<(String, WorkSummary)> = works.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cited_by_count.cmp(&a.1.cited_by_count));

    let mut per_topic: HashMap<String, usize> = HashMap::new();
    let mut out = Vec::new();
    for (_work_id, summary) in ranked {
        let Some(topic) = summary.topic.clone() else { continue };
        let taken = per_topic.entry(topic.clone()).or_insert(0);
        if *taken >= TOP_WORKS_PER_TOPIC {
            continue;
        }
        *taken += 1;
        out.push(TopWorkRow {
            domain: summary.domain,
            field: summary.field,
            topic,
            title: summary.title,
            cited_by_count: summary.cited_by_count,
            publication_year: summary.publication_year,
            institutions: summary.institutions.into_iter().collect(),
        });
    }
    out
}
