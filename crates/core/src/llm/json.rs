use crate::domain::contract::{LlmAnalysisReport, LlmMarketSnapshot};
use crate::domain::market::{MarketSnapshot, SourceCitation};
use crate::domain::report::AnalysisReport;
use crate::llm::error::LlmError;
use serde_json::Value;

pub const MARKET_PARSE_FAILED: &str = "データの解析に失敗しました。";
pub const REPORT_PARSE_FAILED: &str = "分析データの解析に失敗しました。";

type Strategy = fn(&str) -> Option<Value>;

/// Tried in order against fence-stripped text; the first hit wins.
const STRATEGIES: &[(&str, Strategy)] = &[
    ("direct", parse_direct),
    ("brace_scan", parse_brace_scan),
];

/// Removes a leading ```` ```lang ```` line and a trailing ```` ``` ```` if present.
pub fn strip_fences(text: &str) -> &str {
    let mut inner = text.trim();
    if let Some(rest) = inner.strip_prefix("```") {
        // Drop the language tag (or nothing) up to the first newline.
        inner = match rest.split_once('\n') {
            Some((_, body)) => body,
            None => rest.trim_start_matches(|c: char| c.is_ascii_alphanumeric()),
        };
    }
    if let Some(body) = inner.trim_end().strip_suffix("```") {
        inner = body;
    }
    inner.trim()
}

fn parse_direct(text: &str) -> Option<Value> {
    serde_json::from_str::<Value>(text)
        .ok()
        .filter(Value::is_object)
}

/// Greedy outermost object: first `{` through last `}`.
fn parse_brace_scan(text: &str) -> Option<Value> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end <= start {
        return None;
    }
    serde_json::from_str::<Value>(&text[start..=end])
        .ok()
        .filter(Value::is_object)
}

/// Runs the extraction strategies and returns the first JSON object found.
pub fn extract_json(text: &str) -> Option<Value> {
    let body = strip_fences(text);
    if body.is_empty() {
        return None;
    }
    for (name, strategy) in STRATEGIES {
        if let Some(value) = strategy(body) {
            tracing::debug!(strategy = *name, "extracted JSON from generated text");
            return Some(value);
        }
    }
    None
}

pub fn parse_market_snapshot(text: &str) -> Result<MarketSnapshot, LlmError> {
    let value = extract_json(text).ok_or_else(|| parse_error(MARKET_PARSE_FAILED, text))?;
    let parsed = serde_json::from_value::<LlmMarketSnapshot>(value).map_err(|err| {
        tracing::warn!(error = %err, "market snapshot JSON has an unexpected shape");
        LlmError::Parse(MARKET_PARSE_FAILED.to_string())
    })?;
    Ok(parsed.into_snapshot())
}

/// Parses a report and merges `citations` (grounding results) ahead of the
/// report's own `sources`.
pub fn parse_analysis_report(
    text: &str,
    citations: &[SourceCitation],
) -> Result<AnalysisReport, LlmError> {
    let value = extract_json(text).ok_or_else(|| parse_error(REPORT_PARSE_FAILED, text))?;
    let parsed = serde_json::from_value::<LlmAnalysisReport>(value).map_err(|err| {
        tracing::warn!(error = %err, "analysis report JSON has an unexpected shape");
        LlmError::Parse(REPORT_PARSE_FAILED.to_string())
    })?;
    Ok(parsed.into_report(citations))
}

fn parse_error(message: &str, text: &str) -> LlmError {
    tracing::warn!(
        text_len = text.len(),
        head = %text.chars().take(120).collect::<String>(),
        "generated text is not valid JSON"
    );
    LlmError::Parse(message.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::report::Judgment;
    use crate::domain::NOT_AVAILABLE;

    const SCENARIO: &str = "```json\n{\"date\":\"2024-01-10\",\"stopHighs\":[{\"code\":\"1234\",\"name\":\"X\",\"market\":\"プライム\",\"price\":\"500\",\"change\":\"+10.0%\",\"material\":\"材料不明\"}],\"soaring\":[{\"code\":\"1234\",\"name\":\"X\",\"market\":\"プライム\",\"price\":\"500\",\"change\":\"+10.0%\",\"material\":\"材料不明\"}]}\n```";

    fn cite(title: &str, url: &str) -> SourceCitation {
        SourceCitation {
            title: title.to_string(),
            url: url.to_string(),
        }
    }

    #[test]
    fn strip_fences_handles_tagged_and_bare_markers() {
        assert_eq!(strip_fences("```json\n{\"a\":1}\n```\n"), "{\"a\":1}");
        assert_eq!(strip_fences("```\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_fences("  {\"a\":1}  "), "{\"a\":1}");
        assert_eq!(strip_fences("```json {\"a\":1}```"), "{\"a\":1}");
    }

    #[test]
    fn fenced_and_unfenced_text_parse_identically() {
        let body = "{\"date\":\"2024-01-10\",\"stopHighs\":[{\"code\":\"1111\",\"name\":\"A\"}],\"soaring\":[{\"code\":\"2222\"}]}";
        let fenced = format!("```json\n{body}\n```");
        assert_eq!(
            parse_market_snapshot(&fenced).unwrap(),
            parse_market_snapshot(body).unwrap()
        );
    }

    #[test]
    fn brace_scan_recovers_object_inside_prose() {
        let text = "以下が結果です。\n{\"stopHighs\":[{\"code\":\"1111\"}]}\n以上。";
        let snapshot = parse_market_snapshot(text).unwrap();
        assert_eq!(snapshot.stop_highs.len(), 1);
    }

    #[test]
    fn scenario_drops_duplicate_from_soaring() {
        let snapshot = parse_market_snapshot(SCENARIO).unwrap();
        assert_eq!(snapshot.date.as_deref(), Some("2024-01-10"));
        assert_eq!(snapshot.stop_highs.len(), 1);
        assert_eq!(snapshot.stop_highs[0].change_percent, "+10.0%");
        assert!(snapshot.soaring.is_empty());
    }

    #[test]
    fn legacy_stocks_key_maps_to_stop_highs() {
        let text = "{\"stocks\":[{\"code\":\"1111\"},{\"code\":\"2222\"}]}";
        let snapshot = parse_market_snapshot(text).unwrap();
        assert_eq!(snapshot.stop_highs.len(), 2);
        assert!(snapshot.soaring.is_empty());
    }

    #[test]
    fn empty_and_garbage_text_are_parse_errors() {
        assert_eq!(
            parse_market_snapshot("").unwrap_err(),
            LlmError::Parse(MARKET_PARSE_FAILED.to_string())
        );
        assert!(matches!(
            parse_market_snapshot("申し訳ありませんが取得できません"),
            Err(LlmError::Parse(_))
        ));
        assert!(matches!(
            parse_market_snapshot("{ not json }"),
            Err(LlmError::Parse(_))
        ));
    }

    #[test]
    fn non_object_shapes_are_parse_errors() {
        assert!(matches!(parse_market_snapshot("[]"), Err(LlmError::Parse(_))));
        assert!(matches!(
            parse_market_snapshot("\"stopHighs\""),
            Err(LlmError::Parse(_))
        ));
        assert!(matches!(
            parse_market_snapshot("{\"stopHighs\": \"none\"}"),
            Err(LlmError::Parse(_))
        ));
    }

    #[test]
    fn object_wrapped_in_array_is_recovered() {
        let snapshot = parse_market_snapshot("[{\"stopHighs\":[{\"code\":\"1111\"}]}]").unwrap();
        assert_eq!(snapshot.stop_highs[0].code, "1111");
    }

    #[test]
    fn report_merges_grounding_ahead_of_authored_sources() {
        let text = r#"{
            "basicInfo": {"code": "1234", "name": "X"},
            "verdict": {"judgment": "売り"},
            "sources": [
                {"title": "model title", "url": "https://kabutan.jp/stock/?code=1234"},
                {"title": "IR", "url": "https://example.co.jp/ir"},
                {"title": "no url"}
            ]
        }"#;
        let grounding = vec![cite("kabutan.jp", "https://kabutan.jp/stock/?code=1234")];
        let report = parse_analysis_report(text, &grounding).unwrap();

        assert_eq!(report.sources.len(), 2);
        assert_eq!(report.sources[0].title, "kabutan.jp");
        assert_eq!(report.sources[1].title, "IR");
        assert_eq!(report.verdict.judgment, Judgment::Sell);
        assert_eq!(report.valuation.per, NOT_AVAILABLE);
    }

    #[test]
    fn report_parse_failure_uses_report_message() {
        let err = parse_analysis_report("```json\n```", &[]).unwrap_err();
        assert_eq!(err, LlmError::Parse(REPORT_PARSE_FAILED.to_string()));
    }
}
