use chrono::{DateTime, Datelike, Duration, NaiveDate, Timelike, TimeZone, Weekday};

// TSE closes at 15:30 local time. Before that, the session's price-limit and
// rapid-rise lists are not final, so the previous calendar day is targeted.
const CLOSE_CUTOFF_HOUR: u32 = 15;
const CLOSE_CUTOFF_MINUTE: u32 = 30;

/// Picks the trading date the prompts ask about.
///
/// The rule is purely calendar based: no weekend or holiday rollback, the
/// model is trusted to report the most recent session for that date.
pub fn resolve_target_date<Tz: TimeZone>(now: &DateTime<Tz>) -> NaiveDate {
    let cutoff_reached = (now.hour(), now.minute()) >= (CLOSE_CUTOFF_HOUR, CLOSE_CUTOFF_MINUTE);
    let today = now.date_naive();
    if cutoff_reached {
        today
    } else {
        today - Duration::days(1)
    }
}

/// `2024年1月10日`
pub fn format_ja_long(date: NaiveDate) -> String {
    format!("{}年{}月{}日", date.year(), date.month(), date.day())
}

/// `2024/01/10(水)`
pub fn format_ja_header(date: NaiveDate) -> String {
    format!(
        "{}({})",
        date.format("%Y/%m/%d"),
        weekday_ja(date.weekday())
    )
}

fn weekday_ja(weekday: Weekday) -> &'static str {
    match weekday {
        Weekday::Mon => "月",
        Weekday::Tue => "火",
        Weekday::Wed => "水",
        Weekday::Thu => "木",
        Weekday::Fri => "金",
        Weekday::Sat => "土",
        Weekday::Sun => "日",
    }
}
