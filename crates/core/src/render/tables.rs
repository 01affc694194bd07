use crate::domain::market::{SourceCitation, StockRecord};
use crate::render::page::routes;
use crate::render::{change_class, escape_html, format_change, market_class};
use std::fmt::Write as _;

pub const MARKET_SOURCE_LIMIT: usize = 5;
pub const REPORT_SOURCE_LIMIT: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableKind {
    StopHigh,
    Soaring,
}

impl TableKind {
    pub fn title(self) -> &'static str {
        match self {
            TableKind::StopHigh => "ストップ高銘柄",
            TableKind::Soaring => "急騰銘柄",
        }
    }

    fn empty_text(self) -> &'static str {
        match self {
            TableKind::StopHigh => "「取得」ボタンでストップ高銘柄を取得します",
            TableKind::Soaring => "急騰銘柄はありません",
        }
    }
}

pub fn render_stock_table(records: &[StockRecord], kind: TableKind) -> String {
    if records.is_empty() {
        return format!(
            "<div class=\"empty-state\"><div class=\"empty-icon\">📭</div><div class=\"empty-text\">{}</div></div>",
            kind.empty_text()
        );
    }

    let mut rows = String::new();
    for (i, s) in records.iter().enumerate() {
        let _ = write!(
            rows,
            "<tr>\
<td class=\"row-no\">{no}</td>\
<td><span class=\"stock-code\">{code}</span></td>\
<td><span class=\"stock-name\">{name}</span></td>\
<td><span class=\"market-badge {market_class}\">{market}</span></td>\
<td><span class=\"price-value\">{price}円</span></td>\
<td><span class=\"{change_class}\">{change}</span></td>\
<td><span class=\"material-text\">{material}</span></td>\
<td>{button}</td>\
</tr>",
            no = i + 1,
            code = escape_html(&s.code),
            name = escape_html(&s.name),
            market_class = market_class(&s.market),
            market = escape_html(&s.market),
            price = escape_html(&s.price),
            change_class = change_class(&s.change_percent),
            change = escape_html(&format_change(&s.change_percent)),
            material = escape_html(&s.material),
            button = analyze_button(s),
        );
    }

    format!(
        "<div class=\"table-container\"><table class=\"stock-table\">\
<thead><tr><th>#</th><th>コード</th><th>銘柄名</th><th>市場</th><th>株価</th><th>前日比</th><th>材料</th><th></th></tr></thead>\
<tbody>{rows}</tbody></table></div>"
    )
}

fn analyze_button(s: &StockRecord) -> String {
    let hidden = [
        ("code", &s.code),
        ("name", &s.name),
        ("market", &s.market),
        ("price", &s.price),
        ("change", &s.change_percent),
        ("material", &s.material),
    ]
    .iter()
    .map(|(k, v)| format!("<input type=\"hidden\" name=\"{k}\" value=\"{}\">", escape_html(v)))
    .collect::<String>();

    format!(
        "<form method=\"post\" action=\"{action}\" class=\"inline-form\">{hidden}<button type=\"submit\" class=\"analyze-btn\">📊 分析</button></form>",
        action = routes::ANALYZE,
    )
}

/// First `limit` citations as links. Empty input renders nothing.
pub fn render_sources(citations: &[SourceCitation], limit: usize) -> String {
    if citations.is_empty() {
        return String::new();
    }
    let links = citations
        .iter()
        .take(limit)
        .map(|c| {
            format!(
                "<a href=\"{url}\" target=\"_blank\" rel=\"noopener\" class=\"source-link\">・{label}</a>",
                url = escape_html(&c.url),
                label = escape_html(c.label()),
            )
        })
        .collect::<String>();

    format!(
        "<div class=\"sources-section\"><div class=\"sources-title\">📎 参照ソース</div><div class=\"sources-list\">{links}</div></div>"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(code: &str, change: &str) -> StockRecord {
        StockRecord {
            sequence_no: 1,
            code: code.to_string(),
            name: "<b>X</b>".to_string(),
            market: "東証グロース".to_string(),
            price: "500".to_string(),
            change_percent: change.to_string(),
            material: "材料不明".to_string(),
        }
    }

    #[test]
    fn rows_are_escaped_and_formatted() {
        let html = render_stock_table(&[record("1234", "+5.5%")], TableKind::StopHigh);
        assert!(html.contains("&lt;b&gt;X&lt;/b&gt;"));
        assert!(html.contains("market-growth"));
        assert!(html.contains("+5.50%"));
        assert!(html.contains("name=\"code\" value=\"1234\""));
        assert!(html.contains("action=\"/analyze\""));
    }

    #[test]
    fn empty_table_shows_placeholder() {
        let html = render_stock_table(&[], TableKind::Soaring);
        assert!(html.contains("急騰銘柄はありません"));
        assert!(!html.contains("<table"));
    }

    #[test]
    fn sources_are_truncated_and_fall_back_to_url() {
        let citations: Vec<_> = (0..7)
            .map(|i| SourceCitation {
                title: if i == 0 { String::new() } else { format!("t{i}") },
                url: format!("https://s{i}.example"),
            })
            .collect();
        let html = render_sources(&citations, MARKET_SOURCE_LIMIT);
        assert_eq!(html.matches("class=\"source-link\"").count(), 5);
        assert!(html.contains("・https://s0.example"));
        assert_eq!(render_sources(&[], 5), "");
    }
}
