//! Two-layer industry classification.
//!
//! The keyword layer runs first over every article. Only the articles it
//! could not match reach the fallback layer (the LLM in production), and the
//! fallback is skipped entirely when nothing is left over. A failing
//! fallback contributes no results; it never fails the run.

use crate::error::Result;
use crate::keymatch::KeywordClassifier;
use crate::models::{ArticleRecord, ClassifiedArticle};
use async_trait::async_trait;
use tracing::{info, warn};

/// Classification layer applied to articles the keyword pass left unmatched
#[async_trait]
pub trait FallbackClassifier: Send + Sync {
    /// Return the subset of `articles` that has industry authors, reduced
    /// to those authors
    async fn classify(&self, articles: &[ArticleRecord]) -> Result<Vec<ClassifiedArticle>>;
}

/// Keyword layer followed by an optional fallback layer
pub struct IndustryClassifier {
    keyword: KeywordClassifier,
    fallback: Option<Box<dyn FallbackClassifier>>,
}

impl IndustryClassifier {
    pub fn new(keyword: KeywordClassifier, fallback: Box<dyn FallbackClassifier>) -> Self {
        Self {
            keyword,
            fallback: Some(fallback),
        }
    }

    /// Keyword layer only; unmatched articles are dropped
    pub fn keyword_only(keyword: KeywordClassifier) -> Self {
        Self {
            keyword,
            fallback: None,
        }
    }

    /// Keyword matches first, then fallback matches, each in input order
    pub async fn classify(&self, articles: &[ArticleRecord]) -> Vec<ClassifiedArticle> {
        let (mut matched, unmatched) = self.keyword.classify(articles);
        info!(
            matched = matched.len(),
            unmatched = unmatched.len(),
            "Keyword layer complete"
        );

        if unmatched.is_empty() {
            return matched;
        }

        let Some(fallback) = &self.fallback else {
            info!(dropped = unmatched.len(), "No fallback layer, unmatched articles dropped");
            return matched;
        };

        match fallback.classify(&unmatched).await {
            Ok(extra) => {
                info!(matched = extra.len(), "Fallback layer complete");
                matched.extend(extra);
            }
            Err(e) => {
                warn!(error = %e, "Fallback layer failed, keeping keyword matches only");
            }
        }

        matched
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PapersError;
    use crate::models::{Affiliation, ClassifiedAuthor, RawAuthor};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Marks every article it sees as industry, records call counts
    struct EchoFallback {
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl FallbackClassifier for EchoFallback {
        async fn classify(&self, articles: &[ArticleRecord]) -> Result<Vec<ClassifiedArticle>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(articles
                .iter()
                .filter_map(|a| {
                    let authors = a
                        .authors
                        .iter()
                        .map(|author| ClassifiedAuthor {
                            name: author.name.clone(),
                            affiliation: Affiliation {
                                company: "none".to_string(),
                                email: "none".to_string(),
                            },
                        })
                        .collect();
                    ClassifiedArticle::from_record(a, authors)
                })
                .collect())
        }
    }

    struct FailingFallback;

    #[async_trait]
    impl FallbackClassifier for FailingFallback {
        async fn classify(&self, _articles: &[ArticleRecord]) -> Result<Vec<ClassifiedArticle>> {
            Err(PapersError::Api {
                code: 503,
                message: "unavailable".to_string(),
            })
        }
    }

    fn article(id: &str, affiliation: &str) -> ArticleRecord {
        ArticleRecord {
            id: id.to_string(),
            title: format!("Article {}", id),
            publication_date: "2020-01-01".to_string(),
            authors: vec![RawAuthor {
                name: format!("Author {}", id),
                affiliation: affiliation.to_string(),
            }],
        }
    }

    fn keyword() -> KeywordClassifier {
        KeywordClassifier::new().expect("keyword patterns compile")
    }

    #[tokio::test]
    async fn test_fallback_skipped_when_all_matched() {
        let calls = Arc::new(AtomicUsize::new(0));
        let classifier = IndustryClassifier::new(
            keyword(),
            Box::new(EchoFallback {
                calls: Arc::clone(&calls),
            }),
        );

        let result = classifier
            .classify(&[article("1", "Acme Inc"), article("2", "Beta Pharma Ltd")])
            .await;

        assert_eq!(result.len(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_keyword_matches_precede_fallback_matches() {
        let calls = Arc::new(AtomicUsize::new(0));
        let classifier = IndustryClassifier::new(
            keyword(),
            Box::new(EchoFallback {
                calls: Arc::clone(&calls),
            }),
        );

        let articles = [
            article("1", "Somewhere Labs"),
            article("2", "Acme Inc"),
            article("3", "Elsewhere Labs"),
            article("4", "Beta Biotech, Oslo"),
        ];
        let ids: Vec<String> = classifier
            .classify(&articles)
            .await
            .into_iter()
            .map(|a| a.id)
            .collect();

        assert_eq!(ids, vec!["2", "4", "1", "3"]);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_fallback_failure_keeps_keyword_matches() {
        let classifier = IndustryClassifier::new(keyword(), Box::new(FailingFallback));
        let result = classifier
            .classify(&[article("1", "Acme Inc"), article("2", "State University")])
            .await;

        assert_eq!(result.len(), 1);
        assert_eq!(result[0].id, "1");
    }

    #[tokio::test]
    async fn test_keyword_only_drops_unmatched() {
        let classifier = IndustryClassifier::keyword_only(keyword());
        let result = classifier
            .classify(&[article("1", "State University"), article("2", "")])
            .await;
        assert!(result.is_empty());
    }

    #[tokio::test]
    async fn test_output_never_has_empty_author_lists() {
        let calls = Arc::new(AtomicUsize::new(0));
        let classifier = IndustryClassifier::new(keyword(), Box::new(EchoFallback { calls }));
        let mut no_authors = article("9", "");
        no_authors.authors.clear();

        let result = classifier
            .classify(&[no_authors, article("1", "Acme Inc")])
            .await;

        assert_eq!(result.len(), 1);
        assert!(result.iter().all(|a| !a.authors.is_empty()));
    }
}
