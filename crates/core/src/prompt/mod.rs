use crate::domain::market::StockRecord;
use crate::domain::{MATERIAL_UNKNOWN, NOT_AVAILABLE};
use crate::time::jp_market::format_ja_long;
use chrono::NaiveDate;

pub const MAX_STOP_HIGHS: usize = 20;
pub const MAX_SOARING: usize = 10;

const PENDING: &str = "取得中";
const SEARCH_MATERIAL: &str = "個別検索による分析";
const SEARCH_CHANGE: &str = "+0.00%";

pub fn build_market_scan_prompt(target_date: NaiveDate) -> String {
    let date = format_ja_long(target_date);
    let record = |reason: &str| {
        [
            "    {".to_string(),
            "      \"no\": 1,".to_string(),
            "      \"code\": \"銘柄コード（4桁）\",".to_string(),
            "      \"name\": \"銘柄名\",".to_string(),
            "      \"market\": \"市場区分\",".to_string(),
            "      \"price\": \"終値（円）\",".to_string(),
            "      \"change\": \"前日比（%）\",".to_string(),
            format!("      \"material\": \"{reason}の理由・材料（30文字以内）\""),
            "    }".to_string(),
        ]
        .join("\n")
    };

    [
        "あなたは日本株の専門アナリストです。".to_string(),
        format!(
            "取得対象日（{date}）の東京証券取引所の「ストップ高銘柄」と「急騰銘柄（前日比+10%以上）」を、Yahoo!ファイナンスや株探などのサイトから取得してください。"
        ),
        String::new(),
        "以下のJSON形式で出力してください。他のテキストは一切含めず、JSONのみを出力してください：".to_string(),
        String::new(),
        "{".to_string(),
        "  \"date\": \"取得日付\",".to_string(),
        "  \"stopHighs\": [".to_string(),
        record("ストップ高"),
        "  ],".to_string(),
        "  \"soaring\": [".to_string(),
        record("急騰"),
        "  ]".to_string(),
        "}".to_string(),
        String::new(),
        "注意事項：".to_string(),
        "- 取得対象日の実際のデータを取得してください".to_string(),
        format!(
            "- ストップ高銘柄は最大{MAX_STOP_HIGHS}件、急騰銘柄は最大{MAX_SOARING}件取得してください"
        ),
        "- ストップ高銘柄に含まれる銘柄は急騰銘柄に含めないでください".to_string(),
        format!("- materialが不明な場合は「{MATERIAL_UNKNOWN}」と記載し、キーを省略しないでください"),
        "- マークダウンのコードブロック記号は使わず、JSONのみを出力してください".to_string(),
    ]
    .join("\n")
}

pub fn build_analysis_prompt(stock: &StockRecord, target_date: NaiveDate) -> String {
    let date = format_ja_long(target_date);
    let StockRecord {
        code,
        name,
        market,
        price,
        change_percent: change,
        material,
        ..
    } = stock;

    let schema = [
        "{".to_string(),
        "  \"basicInfo\": {".to_string(),
        format!("    \"name\": \"{}\",", json_escape(name)),
        format!("    \"code\": \"{}\",", json_escape(code)),
        format!("    \"market\": \"{}\",", json_escape(market)),
        format!("    \"price\": \"{}\",", json_escape(price)),
        format!("    \"change\": \"{}\",", json_escape(change)),
        "    \"stopHighReason\": \"ストップ高の詳細な理由\"".to_string(),
        "  },".to_string(),
        "  \"performance\": {".to_string(),
        "    \"revenue\": \"売上高（最新期）\",".to_string(),
        "    \"operatingProfit\": \"営業利益\",".to_string(),
        "    \"ordinaryProfit\": \"経常利益\",".to_string(),
        "    \"netProfit\": \"純利益\",".to_string(),
        "    \"growthRate\": \"前年比成長率\",".to_string(),
        "    \"operatingMargin\": \"営業利益率\",".to_string(),
        "    \"comment\": \"業績に関するコメント（100文字程度）\"".to_string(),
        "  },".to_string(),
        "  \"financial\": {".to_string(),
        "    \"equityRatio\": \"自己資本比率\",".to_string(),
        "    \"interestBearingDebt\": \"有利子負債\",".to_string(),
        "    \"operatingCF\": \"営業キャッシュフロー\",".to_string(),
        "    \"comment\": \"財務健全性に関するコメント（100文字程度）\"".to_string(),
        "  },".to_string(),
        "  \"valuation\": {".to_string(),
        "    \"per\": \"PER\",".to_string(),
        "    \"pbr\": \"PBR\",".to_string(),
        "    \"roe\": \"ROE\",".to_string(),
        "    \"dividendYield\": \"配当利回り\",".to_string(),
        "    \"eps\": \"EPS\",".to_string(),
        "    \"bps\": \"BPS\",".to_string(),
        "    \"comment\": \"バリュエーションに関するコメント（100文字程度）\"".to_string(),
        "  },".to_string(),
        "  \"material\": {".to_string(),
        "    \"strength\": \"強い/普通/弱い\",".to_string(),
        "    \"strengthScore\": 75,".to_string(),
        "    \"continuity\": \"長期/中期/短期\",".to_string(),
        "    \"heatLevel\": \"過熱/適温/冷静\",".to_string(),
        "    \"comment\": \"材料の評価コメント（100文字程度）\"".to_string(),
        "  },".to_string(),
        "  \"risks\": [\"リスク要因1\", \"リスク要因2\", \"リスク要因3\"],".to_string(),
        "  \"cautions\": \"注意点（50文字程度）\",".to_string(),
        "  \"verdict\": {".to_string(),
        "    \"judgment\": \"買い または 中立 または 売り\",".to_string(),
        "    \"reason1\": \"判断理由1（50文字程度）\",".to_string(),
        "    \"reason2\": \"判断理由2（50文字程度）\",".to_string(),
        "    \"reason3\": \"判断理由3（50文字程度）\",".to_string(),
        "    \"shortTerm\": \"短期トレードの場合の戦略\",".to_string(),
        "    \"longTerm\": \"中長期投資の場合の戦略\",".to_string(),
        "    \"stopLoss\": \"損切りライン目安\",".to_string(),
        "    \"profitTarget\": \"利確目標の考え方\"".to_string(),
        "  },".to_string(),
        "  \"sources\": [{\"title\": \"参照サイト名\", \"url\": \"URL\"}],".to_string(),
        "  \"dataNote\": \"取得できなかったデータがある場合はここに記載\"".to_string(),
        "}".to_string(),
    ]
    .join("\n");

    [
        format!("分析対象日（{date}）における、以下の銘柄を分析してください："),
        format!("- 銘柄コード: {code}"),
        format!("- 銘柄名: {name}"),
        format!("- 市場: {market}"),
        format!("- 現在株価: {price}円"),
        format!("- 前日比: {change}"),
        format!("- ストップ高理由: {material}"),
        format!("- 分析日: {date}"),
        String::new(),
        "Yahoo!ファイナンス、株探、みんかぶ、会社のIRページ、EDINET等から以下の情報を取得して分析してください：".to_string(),
        "1. 最新決算（売上高、営業利益、経常利益、純利益、前年比成長率）".to_string(),
        "2. 財務指標（自己資本比率、有利子負債、営業CF）".to_string(),
        "3. バリュエーション（PER、PBR、ROE、配当利回り）".to_string(),
        "4. 最新ニュース・材料の評価".to_string(),
        "5. リスク要因".to_string(),
        String::new(),
        "以下のJSON形式のみで出力してください（マークダウンのコードブロック記号は使わないでください）：".to_string(),
        String::new(),
        schema,
        String::new(),
        "重要なルール：".to_string(),
        "- 必ず事実ベースで分析すること（推測で断定しない）".to_string(),
        format!("- データが取得できない場合は値に「{NOT_AVAILABLE}」と明記し、キーを省略しないこと"),
        "- judgmentは「買い」「中立」「売り」のいずれかのみとすること".to_string(),
        "- strengthScoreは0〜100の数値とすること".to_string(),
        "- 煽りや過剰な楽観は禁止".to_string(),
        "- 必ずリスクを明示すること".to_string(),
        "- JSONのみを出力し、他のテキストは含めないこと".to_string(),
    ]
    .join("\n")
}

/// Escapes a value for embedding inside a JSON string literal in the prompt.
fn json_escape(value: &str) -> String {
    let quoted = serde_json::Value::String(value.to_string()).to_string();
    quoted[1..quoted.len() - 1].to_string()
}

/// Free-text search box input, resolved into the stock fields an analysis
/// prompt needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StockQuery {
    Code(String),
    Name(String),
}

impl StockQuery {
    /// A 4-digit query is a security code; anything else is a name. Blank
    /// input yields `None`.
    pub fn parse(query: &str) -> Option<Self> {
        let query = query.trim();
        if query.is_empty() {
            return None;
        }
        if query.len() == 4 && query.chars().all(|c| c.is_ascii_digit()) {
            Some(StockQuery::Code(query.to_string()))
        } else {
            Some(StockQuery::Name(query.to_string()))
        }
    }

    pub fn into_record(self) -> StockRecord {
        let (code, name) = match self {
            StockQuery::Code(code) => (code, String::new()),
            StockQuery::Name(name) => (String::new(), name),
        };
        StockRecord {
            sequence_no: 1,
            code,
            name,
            market: PENDING.to_string(),
            price: PENDING.to_string(),
            change_percent: SEARCH_CHANGE.to_string(),
            material: SEARCH_MATERIAL.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 10).unwrap()
    }

    fn stock() -> StockRecord {
        StockRecord {
            sequence_no: 1,
            code: "1234".to_string(),
            name: "テスト\"工業\"".to_string(),
            market: "東証グロース".to_string(),
            price: "500".to_string(),
            change_percent: "+20.0%".to_string(),
            material: "上方修正".to_string(),
        }
    }

    #[test]
    fn market_scan_prompt_is_deterministic_and_dated() {
        let a = build_market_scan_prompt(date());
        let b = build_market_scan_prompt(date());
        assert_eq!(a, b);
        assert!(a.contains("取得対象日（2024年1月10日）"));
        assert!(a.contains("\"stopHighs\": ["));
        assert!(a.contains("\"soaring\": ["));
        assert!(a.contains("最大20件"));
        assert!(a.contains("最大10件"));
        assert!(a.contains("材料不明"));
    }

    #[test]
    fn analysis_prompt_embeds_stock_fields() {
        let p = build_analysis_prompt(&stock(), date());
        assert!(p.contains("- 銘柄コード: 1234"));
        assert!(p.contains("- 前日比: +20.0%"));
        assert!(p.contains("- ストップ高理由: 上方修正"));
        assert!(p.contains("\"name\": \"テスト\\\"工業\\\"\","));
        assert!(p.contains("\"strengthScore\": 75"));
        assert!(p.contains("取得できなかった"));
        assert!(p.contains("分析対象日（2024年1月10日）"));
    }

    #[test]
    fn query_detects_four_digit_codes() {
        assert_eq!(StockQuery::parse(" 7203 "), Some(StockQuery::Code("7203".into())));
        assert_eq!(StockQuery::parse("72030"), Some(StockQuery::Name("72030".into())));
        assert_eq!(StockQuery::parse("トヨタ"), Some(StockQuery::Name("トヨタ".into())));
        assert_eq!(StockQuery::parse("   "), None);
    }

    #[test]
    fn query_record_uses_pending_fields() {
        let rec = StockQuery::Name("ソニー".into()).into_record();
        assert_eq!(rec.code, "");
        assert_eq!(rec.name, "ソニー");
        assert_eq!(rec.market, "取得中");
        assert_eq!(rec.change_percent, "+0.00%");
        assert_eq!(rec.material, "個別検索による分析");
    }
}
