use serde::{Deserialize, Serialize};
use std::collections::HashSet;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockRecord {
    pub sequence_no: u32,
    pub code: String,
    pub name: String,
    pub market: String,
    pub price: String,
    pub change_percent: String,
    pub material: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketSnapshot {
    pub date: Option<String>,
    pub stop_highs: Vec<StockRecord>,
    pub soaring: Vec<StockRecord>,
}

impl MarketSnapshot {
    /// Builds a snapshot and drops every rapid-rise record whose code already
    /// appears among the price-limit records.
    pub fn new(date: Option<String>, stop_highs: Vec<StockRecord>, soaring: Vec<StockRecord>) -> Self {
        let soaring = {
            let stop_high_codes: HashSet<&str> =
                stop_highs.iter().map(|s| s.code.as_str()).collect();
            soaring
                .into_iter()
                .filter(|s| !stop_high_codes.contains(s.code.as_str()))
                .collect()
        };

        Self {
            date,
            stop_highs,
            soaring,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceCitation {
    pub title: String,
    pub url: String,
}

impl SourceCitation {
    /// Title for display; the url stands in when the title is blank.
    pub fn label(&self) -> &str {
        if self.title.trim().is_empty() {
            &self.url
        } else {
            &self.title
        }
    }
}

/// Concatenates citation lists, keeping the first entry per url and dropping
/// entries without one.
pub fn merge_citations<I>(lists: I) -> Vec<SourceCitation>
where
    I: IntoIterator,
    I::Item: IntoIterator<Item = SourceCitation>,
{
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for list in lists {
        for citation in list {
            if citation.url.trim().is_empty() {
                continue;
            }
            if seen.insert(citation.url.clone()) {
                out.push(citation);
            }
        }
    }
    out
}
