//! PubMed E-utilities client.
//!
//! Two-step retrieval:
//! - `esearch` resolves a query to an ordered list of PMIDs, paginated by
//!   `retstart`/`retmax` after a zero-result probe for the total count.
//! - `efetch` retrieves full records for batches of PMIDs as XML, which is
//!   converted into [`ArticleRecord`]s.
//!
//! NCBI allows roughly 3 requests per second without an API key, so every
//! request goes through a [`Throttle`]. Failures are contained to the page
//! or batch that caused them.

use crate::error::{OptionExt, PapersError, Result};
use crate::models::{ArticleRecord, RawAuthor, DEFAULT_DATE};
use crate::throttle::Throttle;
use crate::xml::{parse_document, XmlElement};
use chrono::NaiveDate;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

/// E-utilities base URL
const EUTILS_BASE_URL: &str = "https://eutils.ncbi.nlm.nih.gov/entrez/eutils/";

/// Tool name reported to NCBI
const TOOL_NAME: &str = "pubmed-papers";

/// PMIDs requested per esearch page
pub const DEFAULT_PAGE_SIZE: usize = 1000;

/// PMIDs per efetch request
pub const DEFAULT_BATCH_SIZE: usize = 100;

/// Slightly more than 1/3 s keeps us under 3 requests per second
pub const MIN_REQUEST_INTERVAL: Duration = Duration::from_millis(340);

/// esearch refuses `retstart` beyond this window
const ESEARCH_WINDOW: usize = 10_000;

const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Fetcher configuration
#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub base_url: String,
    pub page_size: usize,
    pub batch_size: usize,
    pub request_interval: Duration,
    pub timeout: Duration,
    /// Optional NCBI API key (raises the server-side rate limit)
    pub api_key: Option<String>,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            base_url: EUTILS_BASE_URL.to_string(),
            page_size: DEFAULT_PAGE_SIZE,
            batch_size: DEFAULT_BATCH_SIZE,
            request_interval: MIN_REQUEST_INTERVAL,
            timeout: Duration::from_secs(REQUEST_TIMEOUT_SECS),
            api_key: None,
        }
    }
}

impl FetchConfig {
    /// Pick up `NCBI_API_KEY` from the environment when set
    pub fn with_env_api_key(mut self) -> Self {
        self.api_key = std::env::var("NCBI_API_KEY")
            .ok()
            .filter(|k| !k.trim().is_empty());
        self
    }
}

// === E-utilities Response Types ===

#[derive(Debug, Deserialize)]
struct ESearchResponse {
    esearchresult: ESearchResult,
}

#[derive(Debug, Deserialize)]
struct ESearchResult {
    #[serde(default)]
    count: Option<String>,
    #[serde(default)]
    idlist: Vec<String>,
    #[serde(rename = "ERROR", default)]
    error: Option<String>,
}

/// PubMed metadata fetcher
pub struct PubmedClient {
    client: Client,
    esearch_url: Url,
    efetch_url: Url,
    config: FetchConfig,
    throttle: Throttle,
}

impl PubmedClient {
    pub fn new(config: FetchConfig) -> Result<Self> {
        if config.page_size == 0 || config.batch_size == 0 {
            return Err(PapersError::Config(
                "page size and batch size must be positive".to_string(),
            ));
        }

        let mut base = config.base_url.clone();
        if !base.ends_with('/') {
            base.push('/');
        }
        let base = Url::parse(&base)
            .map_err(|e| PapersError::Config(format!("Invalid E-utilities URL {}: {}", base, e)))?;
        let esearch_url = base
            .join("esearch.fcgi")
            .map_err(|e| PapersError::Config(e.to_string()))?;
        let efetch_url = base
            .join("efetch.fcgi")
            .map_err(|e| PapersError::Config(e.to_string()))?;

        let client = Client::builder()
            .user_agent(format!("{}/{}", TOOL_NAME, env!("CARGO_PKG_VERSION")))
            .timeout(config.timeout)
            .build()
            .map_err(|e| PapersError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            esearch_url,
            efetch_url,
            throttle: Throttle::new(config.request_interval),
            config,
        })
    }

    /// Resolve `query` to PMIDs in result order.
    ///
    /// Only the count probe can fail the call; a failing page is logged and
    /// skipped, so the result may be partial.
    pub async fn search(&self, query: &str) -> Result<Vec<String>> {
        let query = query.trim();
        if query.is_empty() {
            debug!("Empty query, nothing to search");
            return Ok(Vec::new());
        }

        let probe = self.esearch(query, 0, 0).await?;
        let total = probe
            .count
            .as_deref()
            .ok_or_invalid("esearch response has no count")?
            .trim()
            .parse::<usize>()
            .map_err(|e| PapersError::Parse(format!("Invalid esearch count: {}", e)))?;

        info!(query = query, total = total, "PubMed search");
        if total == 0 {
            return Ok(Vec::new());
        }
        if total > ESEARCH_WINDOW {
            warn!(
                total = total,
                window = ESEARCH_WINDOW,
                "Result count exceeds the esearch paging window; collecting the first window only"
            );
        }

        let page_size = self.config.page_size;
        let limit = total.min(ESEARCH_WINDOW);
        let mut ids = Vec::with_capacity(limit);

        for start in (0..limit).step_by(page_size) {
            let max = page_size.min(limit - start);
            debug!(start = start, end = start + max, "Fetching PMID page");
            match self.esearch(query, start, max).await {
                Ok(page) => ids.extend(page.idlist),
                Err(e) => {
                    warn!(start = start, error = %e, "PMID page failed, skipping");
                }
            }
        }

        info!(collected = ids.len(), total = total, "PMID collection complete");
        Ok(ids)
    }

    async fn esearch(&self, query: &str, start: usize, max: usize) -> Result<ESearchResult> {
        let mut params: Vec<(&str, String)> = vec![
            ("db", "pubmed".to_string()),
            ("term", query.to_string()),
            ("retmode", "json".to_string()),
            ("retstart", start.to_string()),
            ("retmax", max.to_string()),
        ];
        self.push_common_params(&mut params);

        self.throttle.wait().await;
        let response = self
            .client
            .get(self.esearch_url.clone())
            .query(&params)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(PapersError::Api {
                code: status.as_u16(),
                message: format!("esearch failed: {}", status),
            });
        }

        let body: ESearchResponse = response
            .json()
            .await
            .map_err(|e| PapersError::Parse(format!("Failed to parse esearch response: {}", e)))?;

        if let Some(error) = body.esearchresult.error {
            return Err(PapersError::Api {
                code: status.as_u16(),
                message: format!("esearch error: {}", error),
            });
        }

        Ok(body.esearchresult)
    }

    /// Retrieve article records for `ids`, batch by batch.
    ///
    /// Failed batches and unparseable articles are logged and left out.
    pub async fn fetch_details(&self, ids: &[String]) -> Vec<ArticleRecord> {
        if ids.is_empty() {
            return Vec::new();
        }

        let batch_size = self.config.batch_size;
        let batch_count = ids.len().div_ceil(batch_size);
        let mut articles = Vec::with_capacity(ids.len());

        info!(
            total = ids.len(),
            batches = batch_count,
            "Fetching PubMed metadata"
        );

        for (batch_idx, chunk) in ids.chunks(batch_size).enumerate() {
            match self.fetch_batch(chunk).await {
                Ok(batch) => {
                    debug!(
                        batch = batch_idx + 1,
                        requested = chunk.len(),
                        parsed = batch.len(),
                        "Batch completed"
                    );
                    articles.extend(batch);
                }
                Err(e) => {
                    warn!(
                        batch = batch_idx + 1,
                        start = batch_idx * batch_size,
                        error = %e,
                        "Metadata batch failed, skipping"
                    );
                }
            }
        }

        info!(fetched = articles.len(), "Metadata retrieval complete");
        articles
    }

    async fn fetch_batch(&self, ids: &[String]) -> Result<Vec<ArticleRecord>> {
        let mut params: Vec<(&str, String)> = vec![
            ("db", "pubmed".to_string()),
            ("id", ids.join(",")),
            ("retmode", "xml".to_string()),
        ];
        self.push_common_params(&mut params);

        self.throttle.wait().await;
        let response = self
            .client
            .get(self.efetch_url.clone())
            .query(&params)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(PapersError::Api {
                code: status.as_u16(),
                message: format!("efetch failed: {} - {}", status, error_text.trim()),
            });
        }

        let body = response.text().await?;
        parse_articles(&body)
    }

    fn push_common_params(&self, params: &mut Vec<(&str, String)>) {
        params.push(("tool", TOOL_NAME.to_string()));
        if let Some(key) = &self.config.api_key {
            params.push(("api_key", key.clone()));
        }
    }
}

/// Convert an efetch `PubmedArticleSet` document into article records.
///
/// Fails only when the document itself is not well-formed XML; articles
/// that cannot be converted are logged and skipped.
pub fn parse_articles(xml: &str) -> Result<Vec<ArticleRecord>> {
    let doc = parse_document(xml)?;
    let mut articles = Vec::new();

    for (idx, node) in doc.descendants_named("PubmedArticle").into_iter().enumerate() {
        match article_from_node(node) {
            Ok(article) => articles.push(article),
            Err(e) => warn!(index = idx, error = %e, "Skipping unparseable article"),
        }
    }

    Ok(articles)
}

fn article_from_node(node: &XmlElement) -> Result<ArticleRecord> {
    let id = node
        .descendant("PMID")
        .map(XmlElement::text)
        .filter(|id| !id.is_empty())
        .ok_or_invalid("article has no PMID")?;

    let title = node
        .descendant("ArticleTitle")
        .or_else(|| node.descendant("VernacularTitle"))
        .map(XmlElement::text)
        .unwrap_or_default();

    let authors = node
        .descendant("AuthorList")
        .map(|list| list.children_named("Author").map(author_from_node).collect())
        .unwrap_or_default();

    Ok(ArticleRecord {
        id,
        title,
        publication_date: parse_date(node),
        authors,
    })
}

fn author_from_node(node: &XmlElement) -> RawAuthor {
    let name = match node.child_text("CollectiveName") {
        Some(collective) => collective,
        None => {
            let first = node.child_text("ForeName").unwrap_or_default();
            let last = node.child_text("LastName").unwrap_or_default();
            format!("{} {}", first, last).trim().to_string()
        }
    };

    let affiliation = node
        .descendant("Affiliation")
        .map(XmlElement::text)
        .unwrap_or_default();

    RawAuthor { name, affiliation }
}

/// Publication date of an article node as `YYYY-MM-DD`.
///
/// `ArticleDate` (electronic publication) wins over the journal issue's
/// `PubDate`; a `PubDate` without `Year` falls back to `MedlineDate`.
pub fn parse_date(article: &XmlElement) -> String {
    if let Some(date) = article.descendant("ArticleDate") {
        return normalize_date(
            date.child_text("Year").as_deref(),
            date.child_text("Month").as_deref(),
            date.child_text("Day").as_deref(),
        );
    }

    let pub_date = article
        .descendant("Journal")
        .and_then(|journal| journal.child_path(&["JournalIssue", "PubDate"]));

    match pub_date {
        Some(date) => {
            let year = date.child_text("Year");
            if year.is_none() {
                if let Some(medline) = date.child_text("MedlineDate") {
                    return parse_medline_date(&medline);
                }
            }
            normalize_date(
                year.as_deref(),
                date.child_text("Month").as_deref(),
                date.child_text("Day").as_deref(),
            )
        }
        None => DEFAULT_DATE.to_string(),
    }
}

/// Free-text MedlineDate such as `"1998 Dec-1999 Jan"` or `"2000 Spring"`
fn parse_medline_date(medline: &str) -> String {
    let mut tokens = medline
        .split(|c: char| c.is_whitespace() || c == '-')
        .filter(|t| !t.is_empty());
    let year = tokens.next();
    let month = tokens.next();
    normalize_date(year, month, None)
}

/// Assemble a calendar date from optional parts, defaulting missing or
/// unusable parts to 1900, January and the first of the month.
pub fn normalize_date(year: Option<&str>, month: Option<&str>, day: Option<&str>) -> String {
    let year = year
        .map(str::trim)
        .filter(|y| y.len() == 4 && y.chars().all(|c| c.is_ascii_digit()))
        .and_then(|y| y.parse::<i32>().ok())
        .filter(|y| *y >= 1000)
        .unwrap_or(1900);
    let month = month.and_then(normalize_month).unwrap_or(1);
    let day = day
        .and_then(|d| d.trim().parse::<u32>().ok())
        .filter(|d| (1..=31).contains(d))
        .unwrap_or(1);

    NaiveDate::from_ymd_opt(year, month, day)
        .or_else(|| NaiveDate::from_ymd_opt(year, month, 1))
        .map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| DEFAULT_DATE.to_string())
}

/// Month number from `"3"`, `"03"`, `"Mar"` or `"March"`
fn normalize_month(raw: &str) -> Option<u32> {
    let raw = raw.trim();
    if !raw.is_empty() && raw.chars().all(|c| c.is_ascii_digit()) {
        return raw.parse::<u32>().ok().filter(|m| (1..=12).contains(m));
    }

    let month = match raw.get(..3)?.to_ascii_lowercase().as_str() {
        "jan" => 1,
        "feb" => 2,
        "mar" => 3,
        "apr" => 4,
        "may" => 5,
        "jun" => 6,
        "jul" => 7,
        "aug" => 8,
        "sep" => 9,
        "oct" => 10,
        "nov" => 11,
        "dec" => 12,
        _ => return None,
    };
    Some(month)
}
