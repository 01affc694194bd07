//! Shapes the model is asked to emit, decoded leniently.
//!
//! Models drift between strings and numbers for codes, prices and scores, and
//! omit keys despite being told not to. Every field here is optional and every
//! scalar accepts either a string or a number; conversion into the domain types
//! fills in placeholders.

use crate::domain::market::{MarketSnapshot, SourceCitation, StockRecord};
use crate::domain::report::{
    AnalysisReport, BasicInfo, Financial, Judgment, MaterialAssessment, Performance, Valuation,
    Verdict,
};
use crate::domain::{MATERIAL_UNKNOWN, NOT_AVAILABLE};
use serde::{Deserialize, Deserializer};
use serde_json::Value;

const DEFAULT_STRENGTH_SCORE: u8 = 50;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LlmMarketSnapshot {
    #[serde(default, deserialize_with = "lenient_string")]
    pub date: Option<String>,
    #[serde(default)]
    pub stop_highs: Option<Vec<LlmStockRecord>>,
    #[serde(default)]
    pub soaring: Option<Vec<LlmStockRecord>>,
    /// Single-list schema used before rapid-rise stocks were split out.
    #[serde(default)]
    pub stocks: Option<Vec<LlmStockRecord>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LlmStockRecord {
    #[serde(default, deserialize_with = "lenient_u32")]
    pub no: Option<u32>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub code: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub market: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub price: Option<String>,
    #[serde(default, alias = "changePercent", deserialize_with = "lenient_string")]
    pub change: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub material: Option<String>,
}

impl LlmMarketSnapshot {
    pub fn into_snapshot(self) -> MarketSnapshot {
        let stop_highs = self.stop_highs.or(self.stocks).unwrap_or_default();
        let soaring = self.soaring.unwrap_or_default();
        let date = self.date.map(|d| d.trim().to_string()).filter(|d| !d.is_empty());

        MarketSnapshot::new(date, into_records(stop_highs), into_records(soaring))
    }
}

fn into_records(items: Vec<LlmStockRecord>) -> Vec<StockRecord> {
    items
        .into_iter()
        .enumerate()
        .map(|(idx, item)| item.into_record(idx))
        .collect()
}

impl LlmStockRecord {
    fn into_record(self, idx: usize) -> StockRecord {
        let position = u32::try_from(idx + 1).unwrap_or(u32::MAX);
        StockRecord {
            sequence_no: self.no.unwrap_or(position),
            code: trimmed(self.code),
            name: trimmed(self.name),
            market: trimmed(self.market),
            price: trimmed(self.price),
            change_percent: trimmed(self.change),
            material: or_placeholder(self.material, MATERIAL_UNKNOWN),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LlmAnalysisReport {
    #[serde(default)]
    pub basic_info: Option<LlmBasicInfo>,
    #[serde(default)]
    pub performance: Option<LlmPerformance>,
    #[serde(default)]
    pub financial: Option<LlmFinancial>,
    #[serde(default)]
    pub valuation: Option<LlmValuation>,
    #[serde(default)]
    pub material: Option<LlmMaterial>,
    #[serde(default)]
    pub risks: Option<Vec<Value>>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub cautions: Option<String>,
    #[serde(default)]
    pub verdict: Option<LlmVerdict>,
    #[serde(default)]
    pub sources: Option<Vec<LlmSource>>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub data_note: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LlmBasicInfo {
    #[serde(default, deserialize_with = "lenient_string")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub code: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub market: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub price: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub change: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub stop_high_reason: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LlmPerformance {
    #[serde(default, deserialize_with = "lenient_string")]
    pub revenue: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub operating_profit: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub ordinary_profit: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub net_profit: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub growth_rate: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub operating_margin: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub comment: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LlmFinancial {
    #[serde(default, deserialize_with = "lenient_string")]
    pub equity_ratio: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub interest_bearing_debt: Option<String>,
    #[serde(default, rename = "operatingCF", deserialize_with = "lenient_string")]
    pub operating_cf: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub comment: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LlmValuation {
    #[serde(default, deserialize_with = "lenient_string")]
    pub per: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub pbr: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub roe: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub dividend_yield: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub eps: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub bps: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub comment: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LlmMaterial {
    #[serde(default, deserialize_with = "lenient_string")]
    pub strength: Option<String>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub strength_score: Option<f64>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub continuity: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub heat_level: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub comment: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LlmVerdict {
    #[serde(default, deserialize_with = "lenient_string")]
    pub judgment: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub reason1: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub reason2: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub reason3: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub short_term: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub long_term: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub stop_loss: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub profit_target: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LlmSource {
    #[serde(default, deserialize_with = "lenient_string")]
    pub title: Option<String>,
    #[serde(default, alias = "uri", deserialize_with = "lenient_string")]
    pub url: Option<String>,
}

impl LlmAnalysisReport {
    /// Converts into a report whose sources are `leading` followed by the
    /// model-authored list, deduplicated by url.
    pub fn into_report(self, leading: &[SourceCitation]) -> AnalysisReport {
        let basic = self.basic_info.unwrap_or_default();
        let perf = self.performance.unwrap_or_default();
        let fin = self.financial.unwrap_or_default();
        let val = self.valuation.unwrap_or_default();
        let mat = self.material.unwrap_or_default();
        let verdict = self.verdict.unwrap_or_default();

        let authored = self
            .sources
            .unwrap_or_default()
            .into_iter()
            .map(|s| SourceCitation {
                title: trimmed(s.title),
                url: trimmed(s.url),
            });
        let sources =
            crate::domain::market::merge_citations([leading.to_vec(), authored.collect()]);

        let risks = self
            .risks
            .unwrap_or_default()
            .into_iter()
            .filter_map(value_to_string)
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty())
            .collect();

        let reasons = [verdict.reason1, verdict.reason2, verdict.reason3]
            .into_iter()
            .map(trimmed)
            .filter(|r| !r.is_empty())
            .collect();

        AnalysisReport {
            basic_info: BasicInfo {
                name: trimmed(basic.name),
                code: trimmed(basic.code),
                market: trimmed(basic.market),
                price: trimmed(basic.price),
                change: trimmed(basic.change),
                stop_high_reason: or_placeholder(basic.stop_high_reason, NOT_AVAILABLE),
            },
            performance: Performance {
                revenue: or_placeholder(perf.revenue, NOT_AVAILABLE),
                operating_profit: or_placeholder(perf.operating_profit, NOT_AVAILABLE),
                ordinary_profit: or_placeholder(perf.ordinary_profit, NOT_AVAILABLE),
                net_profit: or_placeholder(perf.net_profit, NOT_AVAILABLE),
                growth_rate: or_placeholder(perf.growth_rate, NOT_AVAILABLE),
                operating_margin: or_placeholder(perf.operating_margin, NOT_AVAILABLE),
                comment: trimmed(perf.comment),
            },
            financial: Financial {
                equity_ratio: or_placeholder(fin.equity_ratio, NOT_AVAILABLE),
                interest_bearing_debt: or_placeholder(fin.interest_bearing_debt, NOT_AVAILABLE),
                operating_cf: or_placeholder(fin.operating_cf, NOT_AVAILABLE),
                comment: trimmed(fin.comment),
            },
            valuation: Valuation {
                per: or_placeholder(val.per, NOT_AVAILABLE),
                pbr: or_placeholder(val.pbr, NOT_AVAILABLE),
                roe: or_placeholder(val.roe, NOT_AVAILABLE),
                dividend_yield: or_placeholder(val.dividend_yield, NOT_AVAILABLE),
                eps: or_placeholder(val.eps, NOT_AVAILABLE),
                bps: or_placeholder(val.bps, NOT_AVAILABLE),
                comment: trimmed(val.comment),
            },
            material: MaterialAssessment {
                strength: or_placeholder(mat.strength, NOT_AVAILABLE),
                strength_score: strength_score(mat.strength_score),
                continuity: or_placeholder(mat.continuity, NOT_AVAILABLE),
                heat_level: or_placeholder(mat.heat_level, NOT_AVAILABLE),
                comment: trimmed(mat.comment),
            },
            risks,
            cautions: non_empty(self.cautions),
            verdict: Verdict {
                judgment: Judgment::from_label(verdict.judgment.as_deref().unwrap_or_default()),
                reasons,
                short_term: or_placeholder(verdict.short_term, NOT_AVAILABLE),
                long_term: or_placeholder(verdict.long_term, NOT_AVAILABLE),
                stop_loss: or_placeholder(verdict.stop_loss, NOT_AVAILABLE),
                profit_target: or_placeholder(verdict.profit_target, NOT_AVAILABLE),
            },
            sources,
            data_note: non_empty(self.data_note),
        }
    }
}

// Zero and missing both fall back to the midpoint, matching how the score is
// displayed when the model leaves it out.
fn strength_score(raw: Option<f64>) -> u8 {
    match raw {
        Some(v) if v.is_finite() && v > 0.0 => {
            let clamped = v.round().clamp(0.0, 100.0);
            u8::try_from(clamped as i64).unwrap_or(DEFAULT_STRENGTH_SCORE)
        }
        _ => DEFAULT_STRENGTH_SCORE,
    }
}

fn trimmed(value: Option<String>) -> String {
    value.map(|s| s.trim().to_string()).unwrap_or_default()
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

fn or_placeholder(value: Option<String>, placeholder: &str) -> String {
    non_empty(value).unwrap_or_else(|| placeholder.to_string())
}

pub(crate) fn value_to_string(value: Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.and_then(value_to_string))
}

fn lenient_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().trim_end_matches('%').trim().parse::<f64>().ok(),
        _ => None,
    })
}

fn lenient_u32<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Number(n)) => n.as_u64().and_then(|v| u32::try_from(v).ok()),
        Some(Value::String(s)) => s.trim().parse::<u32>().ok(),
        _ => None,
    })
}
