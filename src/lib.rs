//! # pubmed-papers
//!
//! Finds PubMed articles with industry-affiliated authors.
//!
//! ## Modules
//!
//! - [`pubmed`] - E-utilities search and metadata retrieval
//! - [`keymatch`] - Keyword-based affiliation classification
//! - [`llm_match`] - LLM fallback classification
//! - [`classify`] - Two-layer classification orchestration
//! - [`pipeline`] - Query to classified articles
//! - [`output`] - CSV, JSON and console rendering
//! - [`error`] - Custom error types
//!
//! ## Usage
//!
//! ```rust,no_run
//! use pubmed_papers::classify::IndustryClassifier;
//! use pubmed_papers::keymatch::KeywordClassifier;
//! use pubmed_papers::llm_match::LlmClassifier;
//! use pubmed_papers::pipeline::PaperPipeline;
//! use pubmed_papers::pubmed::{FetchConfig, PubmedClient};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let classifier = IndustryClassifier::new(
//!         KeywordClassifier::new()?,
//!         Box::new(LlmClassifier::from_env()?),
//!     );
//!     let pipeline = PaperPipeline::new(PubmedClient::new(FetchConfig::default())?, classifier);
//!     let papers = pipeline.run("crispr off-target").await;
//!     println!("Found {} papers", papers.len());
//!     Ok(())
//! }
//! ```

pub mod classify;
pub mod error;
pub mod keymatch;
pub mod llm_match;
pub mod models;
pub mod output;
pub mod pipeline;
pub mod prompts;
pub mod pubmed;
pub mod throttle;
pub mod xml;

pub use error::{PapersError, Result};
pub use models::{Affiliation, ArticleRecord, ClassifiedArticle, ClassifiedAuthor, RawAuthor};
