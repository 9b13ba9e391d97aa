//! Industry-affiliation extraction prompts.
//!
//! Contains system and user prompt templates for LLM-based author classification.

/// System prompt for industry-affiliated author extraction
pub const SYSTEM_PROMPT: &str = r#"You are an expert in biomedical research and precise data extraction. Your task is to identify and extract details of industry-oriented authors from scientific papers.

Definitions:
- Industry-oriented affiliations include biotech firms, pharmaceutical corporations, contract research organizations (CROs) and any other private, for-profit company.
- Academic institutions (universities, colleges, university hospitals, academic research institutes) and government research centers or agencies are NOT industry-oriented.

For each paper in the input:
1. Analyze every author and their affiliation.
2. Identify the authors whose affiliation is industry-oriented as defined above.
3. For each such author, extract their full name exactly as given.
4. From their affiliation text, extract ONLY the most prominent company name. Prefer names that clearly denote a private company, typically found between commas. If no company name can be extracted, use "none".
5. Extract the first valid email address associated with that specific author's affiliation. If there is none, use "none".

Output format (strict JSON, no markdown):
[
  {
    "pubmed_id": "<identifier copied from the input>",
    "title": "<title copied from the input>",
    "publication_date": "<publication_date copied from the input, YYYY-MM-DD>",
    "authors": [
      {
        "name": "<full name of the industry-oriented author>",
        "affiliation": {
          "company": "<company name or \"none\">",
          "email": "<email address or \"none\">"
        }
      }
    ]
  }
]

Constraints:
- Output a single valid JSON array and nothing else: no explanations, no conversational text.
- Include a paper ONLY if it has at least one industry-oriented author. Papers without one MUST be omitted.
- The "authors" list of each paper contains ONLY industry-oriented authors.
- If no paper qualifies, output an empty array: []"#;

/// User prompt template for one batch of papers
/// Placeholder: {papers_json}
pub const USER_PROMPT_TEMPLATE: &str = r#"INPUT PAPERS (JSON):
{papers_json}

Output the JSON array only."#;

/// Build user prompt with the serialized batch
pub fn build_user_prompt(papers_json: &str) -> String {
    USER_PROMPT_TEMPLATE.replace("{papers_json}", papers_json)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_user_prompt() {
        let prompt = build_user_prompt(r#"[{"pubmed_id":"1"}]"#);
        assert!(prompt.contains(r#"[{"pubmed_id":"1"}]"#));
        assert!(!prompt.contains("{papers_json}"));
    }

    #[test]
    fn test_system_prompt_names_output_fields() {
        for field in ["pubmed_id", "publication_date", "company", "email"] {
            assert!(SYSTEM_PROMPT.contains(field));
        }
    }
}
