//! Keyword-based industry affiliation matching.
//!
//! First, cheap classification layer: an author counts as industry-affiliated
//! when the affiliation mentions a corporate/industry keyword and none of
//! the academic or governmental ones. Anything this layer cannot match is
//! handed on unchanged to the LLM layer.

use crate::error::{PapersError, Result};
use crate::models::{Affiliation, ArticleRecord, ClassifiedArticle, ClassifiedAuthor, RawAuthor, NONE};
use regex::Regex;
use tracing::debug;

/// Corporate suffixes and industry indicators
pub const INDUSTRY_KEYWORDS: &[&str] = &[
    // Corporate suffixes
    "inc", "ltd", "llc", "llp", "plc", "pvt", "s.a.", "s.r.l", "gmbh", "co.", "corp",
    "corporation", "incorporated",
    // Industry-specific indicators
    "therapeutics", "pharmaceutical", "pharmaceuticals", "pharma", "biopharmaceutical",
    "biopharmaceuticals", "biopharma", "biotech", "biotherapeutics",
    // CRO / clinical
    "cro", "contract research organization", "clinical trials inc", "clinical research ltd",
    "drug development", "drug discovery",
    // Highly specific
    "rx", "holdings", "ventures", "biosolutions inc", "biosciences ltd", "diagnostics inc",
    "healthtech ltd", "medtech inc", "life sciences inc", "oncology ltd", "vaccines inc",
    "genomics inc",
];

/// Academic, clinical and governmental indicators
pub const ACADEMIC_KEYWORDS: &[&str] = &[
    "university", "universidad", "universidade", "université", "universität", "università",
    "universiteit", "universities", "institute", "institutes", "institut", "instituto",
    "hospital", "hospitals", "hôpital", "college", "center", "centers", "centre", "centres",
    "school", "academy", "faculty", "clinic", "ministry", "government", "national laboratory",
    "foundation", "council",
];

/// `local@domain.tld`
const EMAIL_PATTERN: &str = r"[A-Za-z0-9._%+-]+@[A-Za-z0-9-]+(?:\.[A-Za-z0-9-]+)*\.[A-Za-z]{2,}";

/// Keyword classifier with patterns compiled once at construction
#[derive(Debug, Clone)]
pub struct KeywordClassifier {
    industry: Regex,
    academic: Regex,
    email: Regex,
}

impl KeywordClassifier {
    /// Classifier over the built-in keyword sets
    pub fn new() -> Result<Self> {
        Self::with_keywords(INDUSTRY_KEYWORDS, ACADEMIC_KEYWORDS)
    }

    pub fn with_keywords(industry: &[&str], academic: &[&str]) -> Result<Self> {
        let email = Regex::new(EMAIL_PATTERN)
            .map_err(|e| PapersError::Config(format!("Invalid email pattern: {}", e)))?;
        Ok(Self {
            industry: keyword_pattern(industry)?,
            academic: keyword_pattern(academic)?,
            email,
        })
    }

    /// Split articles into keyword-matched and unmatched.
    ///
    /// Matched articles keep only their industry authors, in original
    /// order. Unmatched articles are returned untouched for the next layer.
    pub fn classify(&self, articles: &[ArticleRecord]) -> (Vec<ClassifiedArticle>, Vec<ArticleRecord>) {
        let mut matched = Vec::new();
        let mut unmatched = Vec::new();

        for article in articles {
            let authors: Vec<ClassifiedAuthor> = article
                .authors
                .iter()
                .filter_map(|a| self.classify_author(a))
                .collect();

            match ClassifiedArticle::from_record(article, authors) {
                Some(classified) => {
                    debug!(
                        id = %article.id,
                        authors = classified.authors.len(),
                        "Keyword match"
                    );
                    matched.push(classified);
                }
                None => unmatched.push(article.clone()),
            }
        }

        (matched, unmatched)
    }

    /// Industry classification of a single author, `None` if not industry
    pub fn classify_author(&self, author: &RawAuthor) -> Option<ClassifiedAuthor> {
        let keyword = self.industry_keyword(&author.affiliation)?;
        Some(ClassifiedAuthor {
            name: author.name.clone(),
            affiliation: Affiliation {
                company: extract_company(&author.affiliation, &keyword),
                email: self.extract_email(&author.affiliation),
            },
        })
    }

    /// Matched industry keyword (lower-cased), unless the affiliation also
    /// carries an academic indicator
    pub fn industry_keyword(&self, affiliation: &str) -> Option<String> {
        let lowered = affiliation.to_lowercase();
        if self.academic.is_match(&lowered) {
            return None;
        }
        self.industry
            .captures(&lowered)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_string())
    }

    /// First email address in the affiliation text, or `"none"`
    pub fn extract_email(&self, affiliation: &str) -> String {
        self.email
            .find(affiliation)
            .map(|m| m.as_str().to_string())
            .unwrap_or_else(|| NONE.to_string())
    }
}

/// Compile keywords into one case-insensitive whole-word alternation.
///
/// The keyword is captured in group 1. Neighbouring characters must be
/// non-word characters (or the text boundary), and a preceding `.` is
/// rejected so that `s.a.` does not fire inside `u.s.a.`.
fn keyword_pattern(keywords: &[&str]) -> Result<Regex> {
    if keywords.is_empty() {
        return Err(PapersError::Config("keyword set is empty".to_string()));
    }
    let alternation = keywords
        .iter()
        .map(|k| regex::escape(&k.to_lowercase()))
        .collect::<Vec<_>>()
        .join("|");
    let pattern = format!(r"(?i)(?:^|[^\w.])({})(?:$|\W)", alternation);
    Regex::new(&pattern).map_err(|e| PapersError::Config(format!("Invalid keyword pattern: {}", e)))
}

/// Comma-delimited segment of the original text that contains the keyword,
/// falling back to the keyword itself
fn extract_company(affiliation: &str, keyword: &str) -> String {
    let company = affiliation
        .split(',')
        .map(str::trim)
        .find(|segment| segment.to_lowercase().contains(keyword))
        .unwrap_or(keyword)
        .trim();

    if company.is_empty() {
        NONE.to_string()
    } else {
        company.to_string()
    }
}
