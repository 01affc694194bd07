//! HTML rendering for the dashboard. Everything here is a pure function of
//! the view state.

pub mod page;
pub mod report;
pub mod tables;

use crate::domain::report::Judgment;

pub fn escape_html(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#039;"),
            _ => out.push(c),
        }
    }
    out
}

/// CSS class for a market segment label. Case-insensitive substring match.
pub fn market_class(market: &str) -> &'static str {
    let m = market.to_lowercase();
    if m.contains("プライム") || m.contains("prime") {
        "market-prime"
    } else if m.contains("グロース") || m.contains("growth") {
        "market-growth"
    } else {
        "market-standard"
    }
}

fn parse_change(raw: &str) -> Option<f64> {
    let cleaned = raw.trim().replace('%', "").replace('+', "");
    cleaned
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
}

/// `"+5.5%"` → `"+5.50%"`. Unparsable input is returned unchanged.
pub fn format_change(raw: &str) -> String {
    // -0.0 compares equal to 0.0; collapse it so no "-0.00%" appears.
    match parse_change(raw).map(|v| if v == 0.0 { 0.0 } else { v }) {
        Some(v) if v > 0.0 => format!("+{v:.2}%"),
        Some(v) => format!("{v:.2}%"),
        None => raw.to_string(),
    }
}

/// Unparsable values get the negative class.
pub fn change_class(raw: &str) -> &'static str {
    match parse_change(raw) {
        Some(v) if v >= 0.0 => "change-positive",
        _ => "change-negative",
    }
}

/// `(css class, icon)` for a verdict.
pub fn verdict_badge(judgment: Judgment) -> (&'static str, &'static str) {
    match judgment {
        Judgment::Buy => ("buy", "✅"),
        Judgment::Neutral => ("neutral", "⚖️"),
        Judgment::Sell => ("sell", "🔴"),
    }
}

pub fn strength_class(score: u8) -> &'static str {
    if score >= 70 {
        "high"
    } else if score >= 40 {
        "medium"
    } else {
        "low"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn change_formatting() {
        assert_eq!(format_change("+5.5%"), "+5.50%");
        assert_eq!(format_change("-3%"), "-3.00%");
        assert_eq!(format_change("12"), "+12.00%");
        assert_eq!(format_change("0"), "0.00%");
        assert_eq!(format_change("-0.0%"), "0.00%");
        assert_eq!(format_change("-0"), "0.00%");
        assert_eq!(format_change("abc"), "abc");
        assert_eq!(format_change(""), "");
    }

    #[test]
    fn change_classes() {
        assert_eq!(change_class("+1%"), "change-positive");
        assert_eq!(change_class("0.0%"), "change-positive");
        assert_eq!(change_class("-0.5%"), "change-negative");
        assert_eq!(change_class("不明"), "change-negative");
    }

    #[test]
    fn market_classification() {
        assert_eq!(market_class("東証プライム"), "market-prime");
        assert_eq!(market_class("PRIME"), "market-prime");
        assert_eq!(market_class("Growth Market"), "market-growth");
        assert_eq!(market_class("東証グロース"), "market-growth");
        assert_eq!(market_class("スタンダード"), "market-standard");
        assert_eq!(market_class(""), "market-standard");
    }

    #[test]
    fn verdict_table_is_fixed() {
        assert_eq!(verdict_badge(Judgment::Buy), ("buy", "✅"));
        assert_eq!(verdict_badge(Judgment::Sell), ("sell", "🔴"));
        assert_eq!(
            verdict_badge(Judgment::from_label("unknown")),
            ("neutral", "⚖️")
        );
    }

    #[test]
    fn escapes_markup() {
        assert_eq!(
            escape_html("<a href=\"x\">'&'</a>"),
            "&lt;a href=&quot;x&quot;&gt;&#039;&amp;&#039;&lt;/a&gt;"
        );
    }

    #[test]
    fn strength_buckets() {
        assert_eq!(strength_class(70), "high");
        assert_eq!(strength_class(69), "medium");
        assert_eq!(strength_class(40), "medium");
        assert_eq!(strength_class(39), "low");
    }
}
