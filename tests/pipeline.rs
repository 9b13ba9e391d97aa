//! HTTP-level tests against mock E-utilities and chat completion servers.

use mockito::{Matcher, Server, ServerGuard};
use pubmed_papers::classify::IndustryClassifier;
use pubmed_papers::keymatch::KeywordClassifier;
use pubmed_papers::llm_match::{LlmClassifier, LlmConfig};
use pubmed_papers::pipeline::PaperPipeline;
use pubmed_papers::pubmed::{FetchConfig, PubmedClient};
use pubmed_papers::PapersError;
use std::time::Duration;

fn fetch_config(server: &ServerGuard, page_size: usize, batch_size: usize) -> FetchConfig {
    FetchConfig {
        base_url: server.url(),
        page_size,
        batch_size,
        request_interval: Duration::ZERO,
        ..FetchConfig::default()
    }
}

fn llm_config(server: &ServerGuard, batch_size: usize) -> LlmConfig {
    LlmConfig {
        base_url: server.url(),
        batch_size,
        request_interval: Duration::ZERO,
        ..LlmConfig::new("test-key")
    }
}

fn keyword() -> KeywordClassifier {
    KeywordClassifier::new().expect("keyword patterns compile")
}

/// `(pmid, title, affiliation)` → efetch document
fn efetch_xml(articles: &[(&str, &str, &str)]) -> String {
    let mut xml = String::from("<?xml version=\"1.0\" ?>\n<PubmedArticleSet>\n");
    for (pmid, title, affiliation) in articles {
        xml.push_str(&format!(
            "<PubmedArticle><MedlineCitation><PMID Version=\"1\">{pmid}</PMID><Article>\
             <Journal><JournalIssue><PubDate><Year>2021</Year><Month>Mar</Month></PubDate></JournalIssue></Journal>\
             <ArticleTitle>{title}</ArticleTitle>\
             <AuthorList><Author><LastName>Author</LastName><ForeName>P{pmid}</ForeName>\
             <AffiliationInfo><Affiliation>{affiliation}</Affiliation></AffiliationInfo></Author></AuthorList>\
             </Article></MedlineCitation></PubmedArticle>\n"
        ));
    }
    xml.push_str("</PubmedArticleSet>");
    xml
}

fn esearch_json(count: usize, ids: &[&str]) -> String {
    serde_json::json!({
        "header": {"type": "esearch", "version": "0.3"},
        "esearchresult": {
            "count": count.to_string(),
            "retmax": ids.len().to_string(),
            "idlist": ids,
        }
    })
    .to_string()
}

fn chat_completion(content: &str) -> String {
    serde_json::json!({
        "id": "chatcmpl-test",
        "object": "chat.completion",
        "choices": [
            {"index": 0, "message": {"role": "assistant", "content": content}, "finish_reason": "stop"}
        ],
        "usage": {"prompt_tokens": 120, "completion_tokens": 40, "total_tokens": 160}
    })
    .to_string()
}

#[tokio::test]
async fn test_search_paginates_and_skips_failed_page() {
    let mut server = Server::new_async().await;

    let probe = server
        .mock("GET", "/esearch.fcgi")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("term".into(), "cancer drug".into()),
            Matcher::UrlEncoded("retmode".into(), "json".into()),
            Matcher::UrlEncoded("retmax".into(), "0".into()),
        ]))
        .with_header("content-type", "application/json")
        .with_body(esearch_json(5, &[]))
        .expect(1)
        .create_async()
        .await;
    let page0 = server
        .mock("GET", "/esearch.fcgi")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("retstart".into(), "0".into()),
            Matcher::UrlEncoded("retmax".into(), "2".into()),
        ]))
        .with_body(esearch_json(5, &["1", "2"]))
        .create_async()
        .await;
    let page1 = server
        .mock("GET", "/esearch.fcgi")
        .match_query(Matcher::UrlEncoded("retstart".into(), "2".into()))
        .with_status(500)
        .create_async()
        .await;
    let page2 = server
        .mock("GET", "/esearch.fcgi")
        .match_query(Matcher::UrlEncoded("retstart".into(), "4".into()))
        .with_body(esearch_json(5, &["5"]))
        .create_async()
        .await;

    let client = PubmedClient::new(fetch_config(&server, 2, 100)).expect("client");
    let ids = client.search("cancer drug").await.expect("search");

    assert_eq!(ids, vec!["1", "2", "5"]);
    probe.assert_async().await;
    page0.assert_async().await;
    page1.assert_async().await;
    page2.assert_async().await;
}

#[tokio::test]
async fn test_search_stops_at_esearch_window() {
    let mut server = Server::new_async().await;

    server
        .mock("GET", "/esearch.fcgi")
        .match_query(Matcher::UrlEncoded("retmax".into(), "0".into()))
        .with_body(esearch_json(50_000, &[]))
        .expect(1)
        .create_async()
        .await;
    // Full pages at retstart 0, 3000 and 6000
    let full_pages = server
        .mock("GET", "/esearch.fcgi")
        .match_query(Matcher::UrlEncoded("retmax".into(), "3000".into()))
        .with_body(esearch_json(50_000, &["1"]))
        .expect(3)
        .create_async()
        .await;
    // Last page is clamped to end at the 10 000 window
    let last_page = server
        .mock("GET", "/esearch.fcgi")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("retstart".into(), "9000".into()),
            Matcher::UrlEncoded("retmax".into(), "1000".into()),
        ]))
        .with_body(esearch_json(50_000, &["2"]))
        .expect(1)
        .create_async()
        .await;

    let client = PubmedClient::new(fetch_config(&server, 3000, 100)).expect("client");
    let ids = client.search("cancer").await.expect("search");

    assert_eq!(ids, vec!["1", "1", "1", "2"]);
    full_pages.assert_async().await;
    last_page.assert_async().await;
}

#[tokio::test]
async fn test_search_zero_results() {
    let mut server = Server::new_async().await;
    let probe = server
        .mock("GET", "/esearch.fcgi")
        .match_query(Matcher::Any)
        .with_body(esearch_json(0, &[]))
        .expect(1)
        .create_async()
        .await;

    let client = PubmedClient::new(fetch_config(&server, 2, 100)).expect("client");
    assert!(client.search("nothing matches this").await.expect("search").is_empty());
    probe.assert_async().await;
}

#[tokio::test]
async fn test_search_probe_failure_is_an_error() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/esearch.fcgi")
        .match_query(Matcher::Any)
        .with_status(503)
        .create_async()
        .await;

    let client = PubmedClient::new(fetch_config(&server, 2, 100)).expect("client");
    let err = client.search("anything").await.expect_err("probe fails");
    assert!(matches!(err, PapersError::Api { code: 503, .. }));
}

#[tokio::test]
async fn test_fetch_details_skips_failed_batch() {
    let mut server = Server::new_async().await;

    server
        .mock("GET", "/efetch.fcgi")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("id".into(), "1,2".into()),
            Matcher::UrlEncoded("retmode".into(), "xml".into()),
        ]))
        .with_body(efetch_xml(&[
            ("1", "One", "Acme Inc, Boston"),
            ("2", "Two", "Harvard University"),
        ]))
        .create_async()
        .await;
    let failing = server
        .mock("GET", "/efetch.fcgi")
        .match_query(Matcher::UrlEncoded("id".into(), "3,4".into()))
        .with_status(500)
        .with_body("Internal Server Error")
        .expect(1)
        .create_async()
        .await;
    server
        .mock("GET", "/efetch.fcgi")
        .match_query(Matcher::UrlEncoded("id".into(), "5".into()))
        .with_body(efetch_xml(&[("5", "Five", "")]))
        .create_async()
        .await;

    let client = PubmedClient::new(fetch_config(&server, 1000, 2)).expect("client");
    let ids: Vec<String> = ["1", "2", "3", "4", "5"].iter().map(|s| s.to_string()).collect();
    let articles = client.fetch_details(&ids).await;

    let fetched: Vec<&str> = articles.iter().map(|a| a.id.as_str()).collect();
    assert_eq!(fetched, vec!["1", "2", "5"]);
    assert_eq!(articles[0].publication_date, "2021-03-01");
    assert_eq!(articles[0].authors[0].name, "P1 Author");
    assert_eq!(articles[0].authors[0].affiliation, "Acme Inc, Boston");
    failing.assert_async().await;
}

#[tokio::test]
async fn test_fetch_details_skips_malformed_batch() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/efetch.fcgi")
        .match_query(Matcher::UrlEncoded("id".into(), "1".into()))
        .with_body("<PubmedArticleSet><PubmedArticle>")
        .create_async()
        .await;
    server
        .mock("GET", "/efetch.fcgi")
        .match_query(Matcher::UrlEncoded("id".into(), "2".into()))
        .with_body(efetch_xml(&[("2", "Two", "")]))
        .create_async()
        .await;

    let client = PubmedClient::new(fetch_config(&server, 1000, 1)).expect("client");
    let articles = client
        .fetch_details(&["1".to_string(), "2".to_string()])
        .await;

    assert_eq!(articles.len(), 1);
    assert_eq!(articles[0].id, "2");
}

#[tokio::test]
async fn test_pipeline_keyword_then_llm() {
    let mut server = Server::new_async().await;

    server
        .mock("GET", "/esearch.fcgi")
        .match_query(Matcher::UrlEncoded("retmax".into(), "0".into()))
        .with_body(esearch_json(3, &[]))
        .create_async()
        .await;
    server
        .mock("GET", "/esearch.fcgi")
        .match_query(Matcher::UrlEncoded("retmax".into(), "1000".into()))
        .with_body(esearch_json(3, &["10", "11", "12"]))
        .create_async()
        .await;
    server
        .mock("GET", "/efetch.fcgi")
        .match_query(Matcher::UrlEncoded("id".into(), "10,11,12".into()))
        .with_body(efetch_xml(&[
            ("10", "Keyword hit", "Dept. of Biology, Acme Therapeutics Inc, contact: j.doe@acme.com"),
            ("11", "Needs a model", "Genentech, South San Francisco"),
            ("12", "Academic only", "Dept. of Biology, State University"),
        ]))
        .create_async()
        .await;

    let llm_reply = r#"Here is the JSON:
[
  {
    "pubmed_id": "11",
    "title": "Needs a model",
    "publication_date": "2021-03-01",
    "authors": [
      {"name": "P11 Author", "affiliation": {"company": "Genentech", "email": "none"}}
    ]
  }
]"#;
    let llm = server
        .mock("POST", "/chat/completions")
        .match_header("authorization", "Bearer test-key")
        .match_body(Matcher::Regex("Needs a model".into()))
        .with_header("content-type", "application/json")
        .with_body(chat_completion(llm_reply))
        .expect(1)
        .create_async()
        .await;

    let classifier = IndustryClassifier::new(
        keyword(),
        Box::new(LlmClassifier::new(llm_config(&server, 10)).expect("llm")),
    );
    let fetcher = PubmedClient::new(fetch_config(&server, 1000, 100)).expect("client");
    let pipeline = PaperPipeline::new(fetcher, classifier);

    let papers = pipeline.run("industry query").await;

    let ids: Vec<&str> = papers.iter().map(|p| p.id.as_str()).collect();
    assert_eq!(ids, vec!["10", "11"]);
    assert_eq!(papers[0].authors[0].affiliation.company, "Acme Therapeutics Inc");
    assert_eq!(papers[0].authors[0].affiliation.email, "j.doe@acme.com");
    assert_eq!(papers[1].authors[0].affiliation.company, "Genentech");
    llm.assert_async().await;
}

#[tokio::test]
async fn test_pipeline_skips_llm_when_everything_matched() {
    let mut server = Server::new_async().await;

    server
        .mock("GET", "/esearch.fcgi")
        .match_query(Matcher::UrlEncoded("retmax".into(), "0".into()))
        .with_body(esearch_json(1, &[]))
        .create_async()
        .await;
    server
        .mock("GET", "/esearch.fcgi")
        .match_query(Matcher::UrlEncoded("retmax".into(), "1000".into()))
        .with_body(esearch_json(1, &["7"]))
        .create_async()
        .await;
    server
        .mock("GET", "/efetch.fcgi")
        .match_query(Matcher::UrlEncoded("id".into(), "7".into()))
        .with_body(efetch_xml(&[("7", "All keyword", "Beta Pharma Ltd, Basel")]))
        .create_async()
        .await;
    let llm = server
        .mock("POST", "/chat/completions")
        .expect(0)
        .create_async()
        .await;

    let classifier = IndustryClassifier::new(
        keyword(),
        Box::new(LlmClassifier::new(llm_config(&server, 10)).expect("llm")),
    );
    let fetcher = PubmedClient::new(fetch_config(&server, 1000, 100)).expect("client");
    let papers = PaperPipeline::new(fetcher, classifier).run("pharma").await;

    assert_eq!(papers.len(), 1);
    llm.assert_async().await;
}

#[tokio::test]
async fn test_pipeline_probe_failure_yields_empty_result() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/esearch.fcgi")
        .match_query(Matcher::Any)
        .with_status(500)
        .create_async()
        .await;
    let efetch = server
        .mock("GET", "/efetch.fcgi")
        .match_query(Matcher::Any)
        .expect(0)
        .create_async()
        .await;

    let fetcher = PubmedClient::new(fetch_config(&server, 1000, 100)).expect("client");
    let pipeline = PaperPipeline::new(fetcher, IndustryClassifier::keyword_only(keyword()));

    assert!(pipeline.run("anything").await.is_empty());
    efetch.assert_async().await;
}

#[tokio::test]
async fn test_llm_malformed_batch_is_skipped() {
    let mut server = Server::new_async().await;

    server
        .mock("POST", "/chat/completions")
        .match_body(Matcher::Regex("TITLE-ALPHA".into()))
        .with_body(chat_completion("Sorry, I cannot produce JSON for this input."))
        .create_async()
        .await;
    server
        .mock("POST", "/chat/completions")
        .match_body(Matcher::Regex("TITLE-BETA".into()))
        .with_body(chat_completion(
            r#"[{"pubmed_id": "21", "title": "TITLE-BETA", "publication_date": "2020-01-01",
                "authors": [{"name": "B", "affiliation": {"company": "Beta Labs", "email": "b@beta.com"}}]},
               {"pubmed_id": "999", "title": "Invented", "publication_date": "2020-01-01",
                "authors": [{"name": "X", "affiliation": {"company": "X Corp", "email": "none"}}]}]"#,
        ))
        .create_async()
        .await;

    let articles = vec![
        pubmed_papers::ArticleRecord {
            id: "20".to_string(),
            title: "TITLE-ALPHA".to_string(),
            publication_date: "2020-01-01".to_string(),
            authors: vec![pubmed_papers::RawAuthor {
                name: "A".to_string(),
                affiliation: "Alpha Labs".to_string(),
            }],
        },
        pubmed_papers::ArticleRecord {
            id: "21".to_string(),
            title: "TITLE-BETA".to_string(),
            publication_date: "2020-01-01".to_string(),
            authors: vec![pubmed_papers::RawAuthor {
                name: "B".to_string(),
                affiliation: "Beta Labs, b@beta.com".to_string(),
            }],
        },
    ];

    let llm = LlmClassifier::new(llm_config(&server, 1)).expect("llm");
    let classified = llm.classify_articles(&articles).await;

    // Only the well-formed batch contributes, and ids outside the batch are ignored
    assert_eq!(classified.len(), 1);
    assert_eq!(classified[0].id, "21");
    assert_eq!(classified[0].authors[0].affiliation.email, "b@beta.com");
}

#[tokio::test]
async fn test_llm_http_error_keeps_keyword_matches() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", "/chat/completions")
        .with_status(500)
        .with_body(r#"{"error": {"message": "internal"}}"#)
        .create_async()
        .await;

    let classifier = IndustryClassifier::new(
        keyword(),
        Box::new(LlmClassifier::new(llm_config(&server, 10)).expect("llm")),
    );
    let articles = vec![
        pubmed_papers::ArticleRecord {
            id: "1".to_string(),
            title: "Keyword".to_string(),
            publication_date: "2020-01-01".to_string(),
            authors: vec![pubmed_papers::RawAuthor {
                name: "A".to_string(),
                affiliation: "Acme Inc".to_string(),
            }],
        },
        pubmed_papers::ArticleRecord {
            id: "2".to_string(),
            title: "Model".to_string(),
            publication_date: "2020-01-01".to_string(),
            authors: vec![pubmed_papers::RawAuthor {
                name: "B".to_string(),
                affiliation: "Somewhere Labs".to_string(),
            }],
        },
    ];

    let classified = classifier.classify(&articles).await;
    assert_eq!(classified.len(), 1);
    assert_eq!(classified[0].id, "1");
}
