use crate::domain::market::SourceCitation;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Judgment {
    Buy,
    Neutral,
    Sell,
}

impl Judgment {
    /// Maps the model's label to a judgment. Anything unrecognized is neutral.
    pub fn from_label(label: &str) -> Self {
        let label = label.trim();
        if label == "買い" || label.eq_ignore_ascii_case("buy") {
            Judgment::Buy
        } else if label == "売り" || label.eq_ignore_ascii_case("sell") {
            Judgment::Sell
        } else {
            Judgment::Neutral
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Judgment::Buy => "買い",
            Judgment::Neutral => "中立",
            Judgment::Sell => "売り",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BasicInfo {
    pub name: String,
    pub code: String,
    pub market: String,
    pub price: String,
    pub change: String,
    pub stop_high_reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Performance {
    pub revenue: String,
    pub operating_profit: String,
    pub ordinary_profit: String,
    pub net_profit: String,
    pub growth_rate: String,
    pub operating_margin: String,
    pub comment: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Financial {
    pub equity_ratio: String,
    pub interest_bearing_debt: String,
    pub operating_cf: String,
    pub comment: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Valuation {
    pub per: String,
    pub pbr: String,
    pub roe: String,
    pub dividend_yield: String,
    pub eps: String,
    pub bps: String,
    pub comment: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaterialAssessment {
    pub strength: String,
    /// 0..=100
    pub strength_score: u8,
    pub continuity: String,
    pub heat_level: String,
    pub comment: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verdict {
    pub judgment: Judgment,
    pub reasons: Vec<String>,
    pub short_term: String,
    pub long_term: String,
    pub stop_loss: String,
    pub profit_target: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub basic_info: BasicInfo,
    pub performance: Performance,
    pub financial: Financial,
    pub valuation: Valuation,
    pub material: MaterialAssessment,
    pub risks: Vec<String>,
    pub cautions: Option<String>,
    pub verdict: Verdict,
    pub sources: Vec<SourceCitation>,
    pub data_note: Option<String>,
}

impl AnalysisReport {
    pub fn code(&self) -> &str {
        &self.basic_info.code
    }
}
