//! Rendering of classified articles.
//!
//! CSV uses a fixed six-column layout, one row per article. JSON is the
//! classified records as-is. The console listing is for humans only.

use crate::error::Result;
use crate::models::{ClassifiedArticle, NONE};
use serde::Serialize;
use std::fmt::Write as _;
use std::io::Write;

/// CSV column order
pub const CSV_COLUMNS: [&str; 6] = [
    "PubmedID",
    "Title",
    "Publication Date",
    "Non-academic Author(s)",
    "Company Affiliation(s)",
    "Corresponding Author Email",
];

/// One CSV row
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CsvRow {
    pub pubmed_id: String,
    pub title: String,
    pub publication_date: String,
    /// Author names joined with `"; "`
    pub authors: String,
    /// Distinct companies joined with `"; "`
    pub companies: String,
    /// First author email that is not `"none"`
    pub email: String,
}

impl From<&ClassifiedArticle> for CsvRow {
    fn from(article: &ClassifiedArticle) -> Self {
        let authors = article
            .authors
            .iter()
            .map(|a| a.name.as_str())
            .collect::<Vec<_>>()
            .join("; ");

        let mut companies: Vec<&str> = Vec::new();
        for author in &article.authors {
            let company = author.affiliation.company.as_str();
            if company != NONE && !companies.contains(&company) {
                companies.push(company);
            }
        }
        let companies = if companies.is_empty() {
            NONE.to_string()
        } else {
            companies.join("; ")
        };

        let email = article
            .authors
            .iter()
            .map(|a| a.affiliation.email.as_str())
            .find(|e| *e != NONE && !e.is_empty())
            .unwrap_or(NONE)
            .to_string();

        Self {
            pubmed_id: article.id.clone(),
            title: article.title.clone(),
            publication_date: article.publication_date.clone(),
            authors,
            companies,
            email,
        }
    }
}

/// Write a header row plus one row per article
pub fn write_csv<W: Write>(writer: W, articles: &[ClassifiedArticle]) -> Result<()> {
    let mut wtr = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(writer);

    wtr.write_record(CSV_COLUMNS)?;
    for article in articles {
        wtr.serialize(CsvRow::from(article))?;
    }

    wtr.flush()?;
    Ok(())
}

/// Pretty-printed JSON array
pub fn write_json<W: Write>(mut writer: W, articles: &[ClassifiedArticle]) -> Result<()> {
    serde_json::to_writer_pretty(&mut writer, articles)?;
    writeln!(writer)?;
    writer.flush()?;
    Ok(())
}

/// Human-readable listing
pub fn render_console(articles: &[ClassifiedArticle]) -> String {
    if articles.is_empty() {
        return "No matched papers found.\n".to_string();
    }

    let mut out = format!("Matched papers: {}\n", articles.len());
    for article in articles {
        let _ = writeln!(out);
        let _ = writeln!(out, "PubmedID: {}", article.id);
        let _ = writeln!(out, "Title: {}", article.title);
        let _ = writeln!(out, "Publication Date: {}", article.publication_date);
        for author in &article.authors {
            let _ = writeln!(
                out,
                "  - {} | company: {} | email: {}",
                author.name, author.affiliation.company, author.affiliation.email
            );
        }
    }
    out
}
