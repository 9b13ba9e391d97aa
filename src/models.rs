//! Typed records flowing through the pipeline.
//!
//! The fetcher produces [`ArticleRecord`]s with raw authors. Classifiers
//! produce [`ClassifiedArticle`]s whose authors all carry an extracted
//! company and email. Both article types share the `pubmed_id` wire name,
//! which is also the shape the LLM is asked to return.

use serde::{Deserialize, Deserializer, Serialize};

/// Placeholder used when a company or email cannot be extracted.
pub const NONE: &str = "none";

/// Date used when an article carries no usable date information.
pub const DEFAULT_DATE: &str = "1900-01-01";

/// Article metadata as returned by the fetcher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArticleRecord {
    #[serde(rename = "pubmed_id")]
    pub id: String,
    pub title: String,
    /// Normalized `YYYY-MM-DD`
    pub publication_date: String,
    pub authors: Vec<RawAuthor>,
}

/// Author as listed in the source record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawAuthor {
    pub name: String,
    /// Free text, possibly empty
    #[serde(default)]
    pub affiliation: String,
}

/// Company and contact extracted for an industry-affiliated author.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Affiliation {
    #[serde(default = "none_string", deserialize_with = "none_if_blank")]
    pub company: String,
    #[serde(default = "none_string", deserialize_with = "none_if_blank")]
    pub email: String,
}

/// Author judged to be industry-affiliated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassifiedAuthor {
    pub name: String,
    pub affiliation: Affiliation,
}

/// Article restricted to its industry-affiliated authors.
///
/// Never constructed with an empty author list by the classifiers; see
/// [`ClassifiedArticle::from_record`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassifiedArticle {
    #[serde(rename = "pubmed_id")]
    pub id: String,
    pub title: String,
    #[serde(default = "default_date")]
    pub publication_date: String,
    pub authors: Vec<ClassifiedAuthor>,
}

impl ClassifiedArticle {
    /// Copy the header of `record` and attach `authors`.
    ///
    /// Returns `None` when `authors` is empty: such an article has no
    /// place in the classified output.
    pub fn from_record(record: &ArticleRecord, authors: Vec<ClassifiedAuthor>) -> Option<Self> {
        if authors.is_empty() {
            return None;
        }
        Some(Self {
            id: record.id.clone(),
            title: record.title.clone(),
            publication_date: record.publication_date.clone(),
            authors,
        })
    }
}

fn default_date() -> String {
    DEFAULT_DATE.to_string()
}

fn none_string() -> String {
    NONE.to_string()
}

fn none_if_blank<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(match value {
        Some(s) if !s.trim().is_empty() => s.trim().to_string(),
        _ => NONE.to_string(),
    })
}
