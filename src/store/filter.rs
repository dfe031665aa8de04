//! Query filter grammar shared by both store backings.
//!
//! A filter is a set of field clauses (exact match or a comparison operator)
//! combined with implicit AND, plus an optional case-insensitive keyword
//! substring match over text/context. The same filter translates to a bson
//! document for the document store and evaluates directly against records on
//! the in-memory path.

use std::cmp::Ordering;

use mongodb::bson::{doc, Bson, Document};

use crate::core::types::LinkRecord;

/// Fields a filter or sort may reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkField {
    Url,
    Text,
    Context,
    RelevanceScore,
    SourceUrl,
    Domain,
    Path,
    Query,
    Timestamp,
}

impl LinkField {
    pub fn as_str(self) -> &'static str {
        match self {
            LinkField::Url => "url",
            LinkField::Text => "text",
            LinkField::Context => "context",
            LinkField::RelevanceScore => "relevance_score",
            LinkField::SourceUrl => "source_url",
            LinkField::Domain => "domain",
            LinkField::Path => "path",
            LinkField::Query => "query",
            LinkField::Timestamp => "timestamp",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "url" => Some(LinkField::Url),
            "text" => Some(LinkField::Text),
            "context" => Some(LinkField::Context),
            "relevance_score" => Some(LinkField::RelevanceScore),
            "source_url" => Some(LinkField::SourceUrl),
            "domain" => Some(LinkField::Domain),
            "path" => Some(LinkField::Path),
            "query" => Some(LinkField::Query),
            "timestamp" => Some(LinkField::Timestamp),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cmp {
    Eq,
    Gt,
    Gte,
    Lt,
    Lte,
}

impl Cmp {
    fn mongo_operator(self) -> &'static str {
        match self {
            Cmp::Eq => "$eq",
            Cmp::Gt => "$gt",
            Cmp::Gte => "$gte",
            Cmp::Lt => "$lt",
            Cmp::Lte => "$lte",
        }
    }

    fn accepts(self, ord: Ordering) -> bool {
        match self {
            Cmp::Eq => ord == Ordering::Equal,
            Cmp::Gt => ord == Ordering::Greater,
            Cmp::Gte => ord != Ordering::Less,
            Cmp::Lt => ord == Ordering::Less,
            Cmp::Lte => ord != Ordering::Greater,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Number(f64),
    Text(String),
}

impl FieldValue {
    fn to_bson(&self) -> Bson {
        match self {
            FieldValue::Number(n) => Bson::Double(*n),
            FieldValue::Text(s) => Bson::String(s.clone()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Clause {
    pub field: LinkField,
    pub cmp: Cmp,
    pub value: FieldValue,
}

#[derive(Debug, Clone, Default)]
pub struct LinkFilter {
    pub clauses: Vec<Clause>,
    /// Case-insensitive substring match against text OR context.
    pub keyword: Option<String>,
}

impl LinkFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eq(mut self, field: LinkField, value: impl Into<String>) -> Self {
        self.clauses.push(Clause {
            field,
            cmp: Cmp::Eq,
            value: FieldValue::Text(value.into()),
        });
        self
    }

    pub fn cmp_number(mut self, field: LinkField, cmp: Cmp, value: f64) -> Self {
        self.clauses.push(Clause {
            field,
            cmp,
            value: FieldValue::Number(value),
        });
        self
    }

    pub fn cmp_text(mut self, field: LinkField, cmp: Cmp, value: impl Into<String>) -> Self {
        self.clauses.push(Clause {
            field,
            cmp,
            value: FieldValue::Text(value.into()),
        });
        self
    }

    pub fn keyword(mut self, keyword: impl Into<String>) -> Self {
        self.keyword = Some(keyword.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty() && self.keyword.is_none()
    }

    /// Translate to a document-store filter.
    pub fn to_document(&self) -> Document {
        let mut filter = Document::new();
        for clause in &self.clauses {
            let key = clause.field.as_str();
            match clause.cmp {
                Cmp::Eq => {
                    filter.insert(key, clause.value.to_bson());
                }
                op => {
                    // Multiple comparisons on one field merge into one
                    // operator document (e.g. gte + lt range).
                    let mut ops = match filter.get(key) {
                        Some(Bson::Document(existing)) => existing.clone(),
                        _ => Document::new(),
                    };
                    ops.insert(op.mongo_operator(), clause.value.to_bson());
                    filter.insert(key, ops);
                }
            }
        }
        if let Some(kw) = &self.keyword {
            let pattern = regex::escape(kw);
            let expr = |p: &str| {
                Bson::RegularExpression(mongodb::bson::Regex {
                    pattern: p.to_string(),
                    options: "i".to_string(),
                })
            };
            filter.insert(
                "$or",
                vec![doc! {"text": expr(&pattern)}, doc! {"context": expr(&pattern)}],
            );
        }
        filter
    }

    /// Evaluate against a record on the in-memory path.
    pub fn matches(&self, record: &LinkRecord) -> bool {
        for clause in &self.clauses {
            let actual = field_value(record, clause.field);
            let Some(ord) = compare(&actual, &clause.value) else {
                return false;
            };
            if !clause.cmp.accepts(ord) {
                return false;
            }
        }
        if let Some(kw) = &self.keyword {
            let needle = kw.to_lowercase();
            let hit = record.text.to_lowercase().contains(&needle)
                || record.context.to_lowercase().contains(&needle);
            if !hit {
                return false;
            }
        }
        true
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    pub fn parse(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "asc" => Some(SortOrder::Asc),
            "desc" => Some(SortOrder::Desc),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SortSpec {
    pub field: LinkField,
    pub order: SortOrder,
}

impl Default for SortSpec {
    fn default() -> Self {
        Self {
            field: LinkField::RelevanceScore,
            order: SortOrder::Desc,
        }
    }
}

impl SortSpec {
    pub fn to_document(&self) -> Document {
        let direction = match self.order {
            SortOrder::Asc => 1,
            SortOrder::Desc => -1,
        };
        let mut sort = Document::new();
        sort.insert(self.field.as_str(), direction);
        sort
    }

    /// In-memory counterpart of the document-store sort.
    pub fn sort_records(&self, records: &mut [LinkRecord]) {
        records.sort_by(|a, b| {
            let ord = compare(&field_value(a, self.field), &field_value(b, self.field))
                .unwrap_or(Ordering::Equal);
            match self.order {
                SortOrder::Asc => ord,
                SortOrder::Desc => ord.reverse(),
            }
        });
    }
}

fn field_value(record: &LinkRecord, field: LinkField) -> FieldValue {
    match field {
        LinkField::Url => FieldValue::Text(record.url.clone()),
        LinkField::Text => FieldValue::Text(record.text.clone()),
        LinkField::Context => FieldValue::Text(record.context.clone()),
        LinkField::RelevanceScore => FieldValue::Number(record.relevance_score),
        LinkField::SourceUrl => FieldValue::Text(record.source_url.clone()),
        LinkField::Domain => FieldValue::Text(record.domain.clone()),
        LinkField::Path => FieldValue::Text(record.path.clone()),
        LinkField::Query => FieldValue::Text(record.query.clone()),
        LinkField::Timestamp => FieldValue::Text(record.timestamp.clone()),
    }
}

fn compare(actual: &FieldValue, expected: &FieldValue) -> Option<Ordering> {
    match (actual, expected) {
        (FieldValue::Number(a), FieldValue::Number(b)) => Some(a.total_cmp(b)),
        (FieldValue::Text(a), FieldValue::Text(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(url: &str, domain: &str, score: f64, text: &str) -> LinkRecord {
        LinkRecord {
            url: url.to_string(),
            text: text.to_string(),
            context: String::new(),
            relevance_score: score,
            llm_reason: None,
            source_url: "https://example.gov/".to_string(),
            domain: domain.to_string(),
            path: "/".to_string(),
            query: String::new(),
            timestamp: "2026-01-01T00:00:00+00:00".to_string(),
        }
    }

    #[test]
    fn clauses_combine_with_implicit_and() {
        let filter = LinkFilter::new()
            .eq(LinkField::Domain, "example.gov")
            .cmp_number(LinkField::RelevanceScore, Cmp::Gte, 0.7);

        assert!(filter.matches(&record("https://example.gov/a", "example.gov", 0.8, "Budget")));
        assert!(!filter.matches(&record("https://example.gov/b", "example.gov", 0.5, "Budget")));
        assert!(!filter.matches(&record("https://other.org/c", "other.org", 0.9, "Budget")));
    }

    #[test]
    fn keyword_matches_text_or_context_case_insensitively() {
        let filter = LinkFilter::new().keyword("budget");
        assert!(filter.matches(&record("https://example.gov/a", "example.gov", 0.1, "FY Budget")));

        let mut in_context = record("https://example.gov/b", "example.gov", 0.1, "Download");
        in_context.context = "Annual BUDGET documents".to_string();
        assert!(filter.matches(&in_context));

        assert!(!filter.matches(&record("https://example.gov/c", "example.gov", 0.1, "News")));
    }

    #[test]
    fn empty_filter_matches_everything() {
        let filter = LinkFilter::new();
        assert!(filter.is_empty());
        assert!(filter.matches(&record("https://example.gov/a", "example.gov", 0.0, "")));
    }

    #[test]
    fn to_document_builds_operator_form() {
        let filter = LinkFilter::new()
            .eq(LinkField::Domain, "example.gov")
            .cmp_number(LinkField::RelevanceScore, Cmp::Gte, 0.5);
        let document = filter.to_document();

        assert_eq!(document.get_str("domain").ok(), Some("example.gov"));
        let score = document.get_document("relevance_score").expect("op doc");
        assert_eq!(score.get_f64("$gte").ok(), Some(0.5));
    }

    #[test]
    fn sort_spec_orders_records() {
        let mut records = vec![
            record("https://example.gov/a", "example.gov", 0.2, ""),
            record("https://example.gov/b", "example.gov", 0.9, ""),
            record("https://example.gov/c", "example.gov", 0.5, ""),
        ];
        SortSpec::default().sort_records(&mut records);
        let scores: Vec<f64> = records.iter().map(|r| r.relevance_score).collect();
        assert_eq!(scores, vec![0.9, 0.5, 0.2]);
    }
}
