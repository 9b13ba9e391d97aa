//! Query → fetch → classify.

use crate::classify::IndustryClassifier;
use crate::models::ClassifiedArticle;
use crate::pubmed::PubmedClient;
use tracing::{info, info_span, warn, Instrument};

/// End-to-end pipeline for one or more queries
pub struct PaperPipeline {
    fetcher: PubmedClient,
    classifier: IndustryClassifier,
}

impl PaperPipeline {
    pub fn new(fetcher: PubmedClient, classifier: IndustryClassifier) -> Self {
        Self {
            fetcher,
            classifier,
        }
    }

    /// Articles matching `query` that have at least one industry author.
    ///
    /// Upstream failures degrade the result instead of failing it; a failed
    /// count probe yields an empty result.
    pub async fn run(&self, query: &str) -> Vec<ClassifiedArticle> {
        let span = info_span!("pipeline", query = query);
        async {
            let ids = match self.fetcher.search(query).await {
                Ok(ids) => ids,
                Err(e) => {
                    warn!(error = %e, "PubMed search failed");
                    return Vec::new();
                }
            };
            if ids.is_empty() {
                info!("No PubMed results");
                return Vec::new();
            }

            let articles = self.fetcher.fetch_details(&ids).await;
            if articles.is_empty() {
                return Vec::new();
            }

            let classified = self.classifier.classify(&articles).await;
            info!(
                fetched = articles.len(),
                matched = classified.len(),
                "Pipeline complete"
            );
            classified
        }
        .instrument(span)
        .await
    }
}
