//! Work record models shared by the bronze and silver stages.
//!
//! `RawWork` mirrors the OpenAlex works payload one optional field at a
//! time, so a sparse record degrades to null columns instead of an error.
//! Unknown fields are ignored; year and citation counts accept numbers or
//! numeric strings (anything else counts as absent).

use serde::{Deserialize, Deserializer, Serialize};

/// One raw work record as returned by the source API.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawWork {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "lenient_int")]
    pub publication_year: Option<i64>,
    #[serde(default, deserialize_with = "lenient_int")]
    pub cited_by_count: Option<i64>,
    #[serde(default)]
    pub primary_topic: Option<PrimaryTopic>,
    #[serde(default)]
    pub authorships: Vec<Authorship>,
}

/// The work's primary topic with its field/domain hierarchy.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PrimaryTopic {
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub domain: Option<TopicLevel>,
    #[serde(default)]
    pub field: Option<TopicLevel>,
}

/// One level of the topic hierarchy (domain or field).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TopicLevel {
    #[serde(default)]
    pub display_name: Option<String>,
}

/// One authorship entry: the author plus their institution affiliations.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Authorship {
    #[serde(default)]
    pub author: Option<AuthorRef>,
    #[serde(default)]
    pub institutions: Vec<InstitutionRef>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthorRef {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InstitutionRef {
    #[serde(default)]
    pub display_name: Option<String>,
}

impl RawWork {
    pub fn topic_name(&self) -> Option<&str> {
        self.primary_topic.as_ref()?.display_name.as_deref()
    }

    pub fn domain_name(&self) -> Option<&str> {
        self.primary_topic.as_ref()?.domain.as_ref()?.display_name.as_deref()
    }

    pub fn field_name(&self) -> Option<&str> {
        self.primary_topic.as_ref()?.field.as_ref()?.display_name.as_deref()
    }
}

/// One row of the silver table: one (work, author) pair, institution
/// limited to the first listed affiliation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlatRow {
    pub work_id: String,
    pub title: String,
    pub publication_year: i64,
    pub cited_by_count: i64,
    pub topic: Option<String>,
    pub domain: Option<String>,
    pub field: Option<String>,
    pub author_name: Option<String>,
    pub author_id: Option<String>,
    pub institution: Option<String>,
}

/// Best-effort integer coercion: integers, floats, and numeric strings
/// all count; anything else is treated as absent.
pub fn coerce_int(value: &serde_json::Value) -> Option<i64> {
    match value {
        serde_json::Value::Number(n) => {
            n.as_i64().or_else(|| n.as_f64().map(|f| f as i64))
        }
        serde_json::Value::String(s) => {
            let trimmed = s.trim();
            trimmed
                .parse::<i64>()
                .ok()
                .or_else(|| trimmed.parse::<f64>().ok().map(|f| f as i64))
        }
        _ => None,
    }
}

fn lenient_int<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(coerce_int))
}
