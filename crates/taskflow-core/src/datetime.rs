use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, NaiveTime};

const INPUT_FORMAT: &str = "%Y-%m-%dT%H:%M";

const NAIVE_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// Parses a due date typed by the user: `YYYY-MM-DDTHH:MM[:SS]`, a space
/// instead of `T`, a bare date (midnight), or RFC 3339 (converted to UTC).
pub fn parse_due_input(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.naive_utc());
    }

    NAIVE_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .ok()
                .map(|date| date.and_time(NaiveTime::MIN))
        })
}

/// Wire form the task service accepts for `due_date`.
pub fn format_due_input(value: NaiveDateTime) -> String {
    value.format(INPUT_FORMAT).to_string()
}

/// Reads a timestamp as the service emits it. Offset-carrying values are
/// shown in local time; naive values are shown as-is.
pub fn parse_service_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Local).naive_local());
    }

    NAIVE_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
}

/// `Feb 3, 9:05 AM`. Unparseable input is echoed back unchanged.
pub fn format_task_date(raw: &str) -> String {
    match parse_service_timestamp(raw) {
        Some(value) => value.format("%b %-d, %-I:%M %p").to_string(),
        None => raw.to_string(),
    }
}

/// `Monday, February 3`.
pub fn today_subtitle(date: NaiveDate) -> String {
    date.format("%A, %B %-d").to_string()
}
