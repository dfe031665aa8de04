//! LLM-assisted relevance refinement.
//!
//! Sends batches of scored links to an OpenAI-compatible chat-completions
//! endpoint and overwrites heuristic scores with the judged ones. Every
//! failure mode is non-fatal: a failed batch keeps its heuristic scores, a
//! malformed response line leaves that one link untouched.

use std::sync::LazyLock;

use regex::Regex;
use tracing::{info, warn};

use crate::core::config::RefinerSettings;
use crate::core::error::{ScoutError, ScoutResult};
use crate::core::types::CandidateLink;

/// Matches `Link <n>: <score> - <reason>`, tolerating bracketed scores and a
/// missing reason.
static JUDGMENT_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^Link\s+(\d+):\s*\[?([0-9]*\.?[0-9]+)\]?\s*(?:-\s*(.+))?$")
        .expect("static regex")
});

pub struct RelevanceRefiner {
    http: reqwest::Client,
    settings: RefinerSettings,
}

impl RelevanceRefiner {
    pub fn new(http: reqwest::Client, settings: RefinerSettings) -> Self {
        Self { http, settings }
    }

    /// Refinement only runs when a service credential is configured.
    pub fn is_enabled(&self) -> bool {
        self.settings.api_key.is_some()
    }

    /// Re-score `links` in fixed-size batches. Accepted judgment lines
    /// overwrite the heuristic score and attach the reason; everything else
    /// passes through unchanged.
    pub async fn refine(
        &self,
        links: Vec<CandidateLink>,
        keywords: &[String],
    ) -> Vec<CandidateLink> {
        let Some(api_key) = self.settings.api_key.clone() else {
            return links;
        };
        if links.is_empty() {
            return links;
        }

        let total_batches = links.len().div_ceil(self.settings.batch_size);
        info!(
            "refining {} links in {} batch(es) via {}",
            links.len(),
            total_batches,
            self.settings.model
        );

        let mut refined = Vec::with_capacity(links.len());
        for (index, chunk) in links.chunks(self.settings.batch_size).enumerate() {
            let mut batch: Vec<CandidateLink> = chunk.to_vec();
            match self.judge_batch(&batch, keywords, &api_key).await {
                Ok(content) => apply_judgments(&mut batch, &content),
                Err(e) => {
                    warn!(
                        "relevance service failed for batch {}/{}: {} — keeping heuristic scores",
                        index + 1,
                        total_batches,
                        e
                    );
                }
            }
            refined.extend(batch);
        }
        refined
    }

    async fn judge_batch(
        &self,
        batch: &[CandidateLink],
        keywords: &[String],
        api_key: &str,
    ) -> ScoutResult<String> {
        let prompt = build_judgment_prompt(batch, keywords);
        let endpoint = format!(
            "{}/chat/completions",
            self.settings.base_url.trim_end_matches('/')
        );

        let body = serde_json::json!({
            "model": self.settings.model,
            "temperature": 0.2,
            "max_tokens": 2000,
            "messages": [
                {"role": "system", "content": "You are an AI that evaluates the relevance of links based on specific criteria."},
                {"role": "user", "content": prompt}
            ]
        });

        let builder = self.http.post(endpoint).json(&body);
        // Key-less local endpoints (Ollama / LM Studio) work without auth.
        let builder = if api_key.is_empty() {
            builder
        } else {
            builder.bearer_auth(api_key.trim())
        };

        let response = builder
            .send()
            .await
            .map_err(|e| ScoutError::ServiceUnavailable(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(ScoutError::ServiceUnavailable(format!(
                "status={} body={}",
                status, text
            )));
        }

        let value: serde_json::Value = response
            .json()
            .await
            .map_err(|e| ScoutError::ServiceUnavailable(e.to_string()))?;

        value
            .get("choices")
            .and_then(|v| v.as_array())
            .and_then(|arr| arr.first())
            .and_then(|c| c.get("message"))
            .and_then(|m| m.get("content"))
            .and_then(|c| c.as_str())
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| {
                ScoutError::ServiceUnavailable("empty completion content".to_string())
            })
    }
}

/// Enumerate the batch for the judging service and pin down the response
/// format it must use.
fn build_judgment_prompt(batch: &[CandidateLink], keywords: &[String]) -> String {
    let keyword_list = keywords.join(", ");
    let mut prompt = format!(
        "Evaluate the following links based on their relevance to these keywords: {}.\n\
         Focus on identifying links that are likely to lead to important documents or \
         contact information related to those topics.\n\n\
         For each link, provide a relevance score between 0.0 and 1.0, where:\n\
         - 1.0 = Extremely relevant (direct link to target content)\n\
         - 0.7-0.9 = Highly relevant (likely leads to target content with 1-2 clicks)\n\
         - 0.4-0.6 = Moderately relevant (might lead to target content)\n\
         - 0.0-0.3 = Low relevance (unlikely to lead to target content)\n\n\
         Links to evaluate:\n",
        keyword_list
    );

    for (i, link) in batch.iter().enumerate() {
        prompt.push_str(&format!(
            "\nLink {}:\nURL: {}\nText: {}\nContext: {}\n",
            i + 1,
            link.url,
            link.text,
            link.context
        ));
    }

    prompt.push_str(
        "\nRespond in this format for each link (replace X with the link number):\n\
         Link X: [score] - [brief reason for score]",
    );
    prompt
}

/// Apply response lines to the batch. A line is accepted only when its
/// 1-based index lands inside the batch and its score lies in [0.0, 1.0];
/// anything else is skipped with a warning.
pub fn apply_judgments(batch: &mut [CandidateLink], content: &str) {
    for line in content.lines() {
        let line = line.trim();
        let Some(caps) = JUDGMENT_LINE.captures(line) else {
            if line.starts_with("Link ") {
                warn!("unparseable judgment line: {}", line);
            }
            continue;
        };

        let index: usize = match caps[1].parse() {
            Ok(n) => n,
            Err(_) => {
                warn!("unparseable judgment index in line: {}", line);
                continue;
            }
        };
        let score: f64 = match caps[2].parse() {
            Ok(s) => s,
            Err(_) => {
                warn!("unparseable judgment score in line: {}", line);
                continue;
            }
        };

        if index == 0 || index > batch.len() {
            warn!(
                "judgment references link {} outside a batch of {}",
                index,
                batch.len()
            );
            continue;
        }
        if !(0.0..=1.0).contains(&score) {
            warn!("judgment score {} out of range for link {}", score, index);
            continue;
        }

        let link = &mut batch[index - 1];
        link.relevance_score = score;
        if let Some(reason) = caps.get(3) {
            link.llm_reason = Some(reason.as_str().trim().to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn batch_of(n: usize) -> Vec<CandidateLink> {
        (0..n)
            .map(|i| CandidateLink {
                url: format!("https://example.gov/page-{}", i),
                text: format!("Page {}", i),
                context: String::new(),
                relevance_score: 0.5,
                llm_reason: None,
            })
            .collect()
    }

    #[test]
    fn judgment_updates_score_and_reason() {
        let mut batch = batch_of(1);
        apply_judgments(&mut batch, "Link 1: 0.9 - matches budget keyword");
        assert!((batch[0].relevance_score - 0.9).abs() < 1e-9);
        assert_eq!(batch[0].llm_reason.as_deref(), Some("matches budget keyword"));
    }

    #[test]
    fn out_of_range_index_is_ignored() {
        let mut batch = batch_of(1);
        apply_judgments(&mut batch, "Link 2: 0.9 - not in this batch");
        assert!((batch[0].relevance_score - 0.5).abs() < 1e-9);
        assert!(batch[0].llm_reason.is_none());
    }

    #[test]
    fn out_of_range_score_is_ignored() {
        let mut batch = batch_of(1);
        apply_judgments(&mut batch, "Link 1: 1.7 - overeager");
        assert!((batch[0].relevance_score - 0.5).abs() < 1e-9);
    }

    #[test]
    fn malformed_lines_leave_links_untouched() {
        let mut batch = batch_of(2);
        apply_judgments(
            &mut batch,
            "Here are my evaluations:\nLink one: very relevant\nLink 2: 0.8 - clear match",
        );
        assert!((batch[0].relevance_score - 0.5).abs() < 1e-9);
        assert!((batch[1].relevance_score - 0.8).abs() < 1e-9);
    }

    #[test]
    fn bracketed_scores_are_accepted() {
        let mut batch = batch_of(1);
        apply_judgments(&mut batch, "Link 1: [0.75] - bracketed response style");
        assert!((batch[0].relevance_score - 0.75).abs() < 1e-9);
    }

    #[test]
    fn score_without_reason_is_applied() {
        let mut batch = batch_of(1);
        apply_judgments(&mut batch, "Link 1: 0.3");
        assert!((batch[0].relevance_score - 0.3).abs() < 1e-9);
        assert!(batch[0].llm_reason.is_none());
    }

    #[test]
    fn prompt_enumerates_links_one_based() {
        let batch = batch_of(2);
        let prompt = build_judgment_prompt(&batch, &["Budget".to_string()]);
        assert!(prompt.contains("Link 1:\nURL: https://example.gov/page-0"));
        assert!(prompt.contains("Link 2:\nURL: https://example.gov/page-1"));
        assert!(prompt.contains("Budget"));
    }
}
