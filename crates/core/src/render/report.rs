use crate::domain::report::AnalysisReport;
use crate::render::tables::{render_sources, REPORT_SOURCE_LIMIT};
use crate::render::{
    change_class, escape_html, market_class, strength_class, verdict_badge,
};

const DISCLAIMER: &str = "⚠️ 本レポートは情報提供を目的としており、投資勧誘を目的とするものではありません。\
投資判断はご自身の責任において行ってください。\
AIによる分析であり、実際の投資成果を保証するものではありません。";

const REASON_MARKS: [&str; 3] = ["①", "②", "③"];

fn data_row(label: &str, value: &str) -> String {
    format!(
        "<div class=\"data-row\"><span class=\"data-label\">{}</span><span class=\"data-value\">{}</span></div>",
        escape_html(label),
        escape_html(value)
    )
}

fn card(icon: &str, title: &str, body: &str) -> String {
    format!(
        "<div class=\"report-card\"><div class=\"report-card-title\"><span class=\"card-icon\">{icon}</span>{title}</div>{body}</div>"
    )
}

fn comment(text: &str) -> String {
    if text.is_empty() {
        String::new()
    } else {
        format!("<div class=\"comment-block\">{}</div>", escape_html(text))
    }
}

pub fn render_report(report: &AnalysisReport) -> String {
    let b = &report.basic_info;
    let (verdict_class, verdict_icon) = verdict_badge(report.verdict.judgment);

    let header = format!(
        "<div class=\"report-header-card\"><div class=\"report-stock-info\"><div>\
<div class=\"report-stock-name\">{name}</div>\
<div class=\"report-stock-meta\"><span class=\"report-code\">{code}</span>\
<span class=\"market-badge {market_class}\">{market}</span></div>\
<div class=\"report-reason\">📌 ストップ高理由: {reason}</div></div>\
<div class=\"report-price-block\"><div class=\"report-price\">{price}円</div>\
<div class=\"report-change {change_class}\">{change}</div></div></div></div>",
        name = escape_html(&b.name),
        code = escape_html(&b.code),
        market_class = market_class(&b.market),
        market = escape_html(&b.market),
        reason = escape_html(&b.stop_high_reason),
        price = escape_html(&b.price),
        change_class = change_class(&b.change),
        change = escape_html(&b.change),
    );

    let banner = format!(
        "<div class=\"verdict-banner {verdict_class}\"><div class=\"verdict-label\">📌 総合投資判断</div>\
<div class=\"verdict-text\">{verdict_icon} {}</div></div>",
        report.verdict.judgment.label()
    );

    let p = &report.performance;
    let performance = card(
        "📈",
        "業績分析（決算）",
        &[
            data_row("売上高", &p.revenue),
            data_row("営業利益", &p.operating_profit),
            data_row("経常利益", &p.ordinary_profit),
            data_row("純利益", &p.net_profit),
            data_row("前年比成長率", &p.growth_rate),
            data_row("営業利益率", &p.operating_margin),
            comment(&p.comment),
        ]
        .concat(),
    );

    let f = &report.financial;
    let financial = card(
        "🏦",
        "財務健全性",
        &[
            data_row("自己資本比率", &f.equity_ratio),
            data_row("有利子負債", &f.interest_bearing_debt),
            data_row("営業キャッシュフロー", &f.operating_cf),
            comment(&f.comment),
        ]
        .concat(),
    );

    let v = &report.valuation;
    let valuation = card(
        "💹",
        "株価バリュエーション",
        &[
            data_row("PER", &v.per),
            data_row("PBR", &v.pbr),
            data_row("ROE", &v.roe),
            data_row("EPS", &v.eps),
            data_row("BPS", &v.bps),
            data_row("配当利回り", &v.dividend_yield),
            comment(&v.comment),
        ]
        .concat(),
    );

    let m = &report.material;
    let meter = format!(
        "<div class=\"strength-meter\"><span class=\"meter-label\">強度</span>\
<div class=\"strength-bar\"><div class=\"strength-fill {class}\" style=\"width:{score}%\"></div></div>\
<span class=\"meter-value\">{score}%</span></div>",
        class = strength_class(m.strength_score),
        score = m.strength_score,
    );
    let material = card(
        "🔥",
        "材料の評価",
        &[
            data_row("材料の強さ", &m.strength),
            meter,
            data_row("継続性", &m.continuity),
            data_row("需給（過熱度）", &m.heat_level),
            comment(&m.comment),
        ]
        .concat(),
    );

    let risk_items = report
        .risks
        .iter()
        .map(|r| format!("<li class=\"risk-item\">{}</li>", escape_html(r)))
        .collect::<String>();
    let cautions = report
        .cautions
        .as_deref()
        .map(|c| format!("<div class=\"comment-block\">📌 注意点: {}</div>", escape_html(c)))
        .unwrap_or_default();
    let risks = card(
        "⚠️",
        "リスク要因",
        &format!("<ul class=\"risk-list\">{risk_items}</ul>{cautions}"),
    );

    let reasons = report
        .verdict
        .reasons
        .iter()
        .zip(REASON_MARKS)
        .map(|(r, mark)| {
            format!(
                "<div class=\"reason\"><span class=\"reason-mark\">{mark}</span><span>{}</span></div>",
                escape_html(r)
            )
        })
        .collect::<String>();
    let strategy_item = |label: &str, value: &str, class: &str| {
        format!(
            "<div class=\"strategy-item\"><div class=\"strategy-label\">{label}</div><div class=\"strategy-value {class}\">{}</div></div>",
            escape_html(value)
        )
    };
    let verdict = card(
        "🎯",
        "総合評価・投資戦略",
        &format!(
            "<div class=\"reasons\"><div class=\"reasons-title\">判断理由</div>{reasons}</div>\
<div class=\"strategy-grid\">{}{}{}{}</div>",
            strategy_item("⚡ 短期トレード", &report.verdict.short_term, ""),
            strategy_item("📅 中長期投資", &report.verdict.long_term, ""),
            strategy_item("🛑 損切りライン", &report.verdict.stop_loss, "loss"),
            strategy_item("🎯 利確目標", &report.verdict.profit_target, "gain"),
        ),
    );

    let data_note = report
        .data_note
        .as_deref()
        .map(|n| {
            format!(
                "<div class=\"alert alert-info\"><span class=\"alert-icon\">ℹ️</span><span>{}</span></div>",
                escape_html(n)
            )
        })
        .unwrap_or_default();

    format!(
        "{header}{banner}<div class=\"report-grid\">{performance}{financial}{valuation}{material}</div>\
{risks}{verdict}{data_note}{sources}<div class=\"disclaimer\">{DISCLAIMER}</div>",
        sources = render_sources(&report.sources, REPORT_SOURCE_LIMIT),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::json::parse_analysis_report;

    #[test]
    fn renders_verdict_and_placeholders() {
        let report = parse_analysis_report(
            r#"{"basicInfo": {"code": "1234", "name": "X<script>", "market": "プライム", "change": "+3%"},
                "material": {"strengthScore": 82},
                "verdict": {"judgment": "買い", "reason1": "増収増益"},
                "risks": ["地合い悪化"],
                "dataNote": "ROEは取得できなかった"}"#,
            &[],
        )
        .unwrap();

        let html = render_report(&report);
        assert!(html.contains("verdict-banner buy"));
        assert!(html.contains("✅ 買い"));
        assert!(html.contains("X&lt;script&gt;"));
        assert!(html.contains("market-prime"));
        assert!(html.contains("strength-fill high"));
        assert!(html.contains("①"));
        assert!(!html.contains("②"));
        assert!(html.contains("地合い悪化"));
        assert!(html.contains("alert-info"));
        assert!(html.contains("取得できなかった"));
        assert!(html.contains("disclaimer"));
        assert!(!html.contains("sources-section"));
    }
}
