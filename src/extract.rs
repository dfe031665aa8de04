//! Link extraction and heuristic relevance scoring.

use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::core::error::ScoutResult;
use crate::core::types::CandidateLink;

static ANCHOR_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a[href]").expect("static selector"));

/// File extensions that usually mean a downloadable document.
static DOC_EXTENSION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\.(pdf|doc|docx|xls|xlsx|csv)$").expect("static regex"));

/// Parses fetched markup into scored candidate links. Keywords are held
/// lower-cased; scoring is deterministic and makes no external calls.
pub struct LinkExtractor {
    keywords: Vec<String>,
}

impl LinkExtractor {
    pub fn new(keywords: &[String]) -> Self {
        Self {
            keywords: keywords.iter().map(|k| k.to_lowercase()).collect(),
        }
    }

    /// Extract every hyperlink with a usable destination, resolve it against
    /// `base_url`, and score it. Fragment-only (`#...`) and script-protocol
    /// (`javascript:...`) destinations are skipped, as is anything that does
    /// not resolve to http/https (mailto:, tel:, data:). Unparseable hrefs
    /// are tolerated by skipping the element.
    ///
    /// The returned list is sorted by descending score, stable on ties.
    pub fn extract(&self, html: &str, base_url: &str) -> ScoutResult<Vec<CandidateLink>> {
        let base = Url::parse(base_url)?;
        let document = Html::parse_document(html);

        let mut candidates = Vec::new();
        for element in document.select(&ANCHOR_SELECTOR) {
            let href = element.value().attr("href").unwrap_or("").trim();
            if href.is_empty()
                || href.starts_with('#')
                || href.to_ascii_lowercase().starts_with("javascript:")
            {
                continue;
            }
            let Ok(resolved) = base.join(href) else {
                continue;
            };
            if resolved.scheme() != "http" && resolved.scheme() != "https" {
                continue;
            }

            let text = collapse_whitespace(&element.text().collect::<String>());
            let context = element
                .parent()
                .and_then(ElementRef::wrap)
                .map(|parent| collapse_whitespace(&parent.text().collect::<String>()))
                .unwrap_or_default();

            let mut candidate = CandidateLink {
                url: resolved.to_string(),
                text,
                context,
                relevance_score: 0.0,
                llm_reason: None,
            };
            candidate.relevance_score = self.score(&candidate);
            candidates.push(candidate);
        }

        candidates.sort_by(|a, b| b.relevance_score.total_cmp(&a.relevance_score));
        Ok(candidates)
    }

    /// Additive heuristic over the lower-cased text+context and URL:
    /// +0.20 per keyword in text/context, +0.15 per keyword in the URL,
    /// +0.25 for a document extension on the URL path, +0.20 for the
    /// literal "contact" in URL or text. Clamped to [0.0, 1.0].
    pub fn score(&self, link: &CandidateLink) -> f64 {
        let haystack = format!("{} {}", link.text, link.context).to_lowercase();
        let url_lower = link.url.to_lowercase();

        let mut score: f64 = 0.0;
        for keyword in &self.keywords {
            if haystack.contains(keyword.as_str()) {
                score += 0.2;
            }
            if url_lower.contains(keyword.as_str()) {
                score += 0.15;
            }
        }

        let path = Url::parse(&link.url)
            .map(|u| u.path().to_lowercase())
            .unwrap_or_default();
        if DOC_EXTENSION.is_match(&path) {
            score += 0.25;
        }

        if url_lower.contains("contact") || haystack.contains("contact") {
            score += 0.2;
        }

        score.clamp(0.0, 1.0)
    }
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extractor(keywords: &[&str]) -> LinkExtractor {
        let owned: Vec<String> = keywords.iter().map(|k| k.to_string()).collect();
        LinkExtractor::new(&owned)
    }

    fn candidate(url: &str, text: &str, context: &str) -> CandidateLink {
        CandidateLink {
            url: url.to_string(),
            text: text.to_string(),
            context: context.to_string(),
            relevance_score: 0.0,
            llm_reason: None,
        }
    }

    #[test]
    fn score_is_always_clamped() {
        // Enough keyword overlap to push the raw sum far past 1.0.
        let ex = extractor(&["budget", "finance", "contact", "report", "annual"]);
        let link = candidate(
            "https://example.gov/budget-finance-contact-annual-report.pdf",
            "Budget Finance Contact Annual Report",
            "Budget Finance Contact Annual Report downloads",
        );
        let score = ex.score(&link);
        assert!((0.0..=1.0).contains(&score));
        assert!((score - 1.0).abs() < f64::EPSILON);

        let dull = candidate("https://example.gov/index.html", "Home", "Home page");
        assert_eq!(ex.score(&dull), 0.0);
    }

    #[test]
    fn scores_a_document_link_against_a_plain_one() {
        let ex = extractor(&["Budget", "Contact"]);

        // Keywords hit text only (0.2 + 0.2), plus the document extension
        // (0.25) and the "contact" substring (0.2).
        let document = candidate(
            "https://example.gov/files/fy2023.pdf",
            "Budget Director Contact",
            "",
        );
        assert!((ex.score(&document) - 0.85).abs() < 1e-9);

        let plain = candidate("https://example.gov/news/index.html", "Latest news", "");
        assert_eq!(ex.score(&plain), 0.0);
    }

    #[test]
    fn extract_skips_fragments_and_script_links() {
        let ex = extractor(&["budget"]);
        let html = r##"
            <html><body>
                <p>Finance office <a href="/budget/2023.pdf">FY 2023 Budget</a></p>
                <p><a href="#section">Jump</a></p>
                <p><a href="javascript:void(0)">Open menu</a></p>
                <p><a href="mailto:clerk@example.gov">Email us</a></p>
                <p><a href="about.html">About</a></p>
            </body></html>
        "##;
        let links = ex.extract(html, "https://example.gov/city/").expect("extract");

        let urls: Vec<&str> = links.iter().map(|l| l.url.as_str()).collect();
        assert_eq!(
            urls,
            vec![
                "https://example.gov/budget/2023.pdf",
                "https://example.gov/city/about.html",
            ]
        );
    }

    #[test]
    fn extract_resolves_relative_urls_and_captures_context() {
        let ex = extractor(&["budget"]);
        let html = r#"<html><body>
            <div>Department of Finance <a href="reports/annual.pdf">Annual report</a></div>
        </body></html>"#;
        let links = ex.extract(html, "https://example.gov/depts/").expect("extract");

        assert_eq!(links.len(), 1);
        assert_eq!(links[0].url, "https://example.gov/depts/reports/annual.pdf");
        assert_eq!(links[0].text, "Annual report");
        assert_eq!(links[0].context, "Department of Finance Annual report");
    }

    #[test]
    fn extract_sorts_by_descending_score() {
        let ex = extractor(&["budget"]);
        let html = r#"<html><body>
            <a href="/a.html">Nothing special</a>
            <a href="/budget.pdf">Budget</a>
            <a href="/b.html">Also nothing</a>
        </body></html>"#;
        let links = ex.extract(html, "https://example.gov/").expect("extract");

        assert_eq!(links[0].url, "https://example.gov/budget.pdf");
        // Stable on ties: the two zero-score links keep extraction order.
        assert_eq!(links[1].url, "https://example.gov/a.html");
        assert_eq!(links[2].url, "https://example.gov/b.html");
    }

    #[test]
    fn document_extension_applies_to_the_path_not_the_query() {
        let ex = extractor(&[]);
        let in_path = candidate("https://example.gov/download/file.xlsx", "", "");
        let in_query = candidate("https://example.gov/download?file=report.pdf", "", "");
        assert!((ex.score(&in_path) - 0.25).abs() < 1e-9);
        assert_eq!(ex.score(&in_query), 0.0);
    }
}
