//! Logger date and time columns to UTC timestamps.

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, Utc};

/// Parses the logger's date and time-on columns.
///
/// Dates: `YYYYMMDD`, `YYYY/MM/DD`, `YYYY-MM-DD`, `MM/DD/YYYY`, and `MM/DD`.
/// A year-less date takes the year of `reference`, or the year before when
/// that would put it more than a day in the future. The date column may also
/// carry the time (`01/26 21:59`), used when `time` is empty.
pub fn parse_timestamp(date: &str, time: &str, reference: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let mut tokens = date.split_whitespace();
    let date_token = tokens.next()?;
    let time_token = match time.trim() {
        "" => tokens.next()?,
        t => t,
    };

    let date = parse_date(date_token, reference)?;
    let time = parse_time(time_token)?;
    Some(date.and_time(time).and_utc())
}

fn parse_date(token: &str, reference: DateTime<Utc>) -> Option<NaiveDate> {
    if token.len() == 8 && token.bytes().all(|b| b.is_ascii_digit()) {
        return NaiveDate::parse_from_str(token, "%Y%m%d").ok();
    }
    if token.contains('-') {
        return NaiveDate::parse_from_str(token, "%Y-%m-%d").ok();
    }

    let parts: Vec<&str> = token.split('/').collect();
    match parts.as_slice() {
        [y, m, d] if y.len() == 4 => ymd(y.parse().ok()?, m, d),
        [m, d, y] => {
            let year: i32 = y.parse().ok()?;
            let year = if y.len() == 2 { 2000 + year } else { year };
            ymd(year, m, d)
        }
        [m, d] => {
            let this_year = ymd(reference.year(), m, d)?;
            if this_year > reference.date_naive() + Duration::days(1) {
                ymd(reference.year() - 1, m, d)
            } else {
                Some(this_year)
            }
        }
        _ => None,
    }
}

fn ymd(year: i32, month: &str, day: &str) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(year, month.trim().parse().ok()?, day.trim().parse().ok()?)
}

fn parse_time(token: &str) -> Option<NaiveTime> {
    let digits: String = token.chars().filter(|c| *c != ':').collect();
    if !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let num = |s: &str| s.parse::<u32>().ok();
    match digits.len() {
        3 | 4 => {
            let split = digits.len() - 2;
            NaiveTime::from_hms_opt(num(&digits[..split])?, num(&digits[split..])?, 0)
        }
        5 | 6 => {
            let split = digits.len() - 4;
            NaiveTime::from_hms_opt(
                num(&digits[..split])?,
                num(&digits[split..split + 2])?,
                num(&digits[split + 2..])?,
            )
        }
        _ => None,
    }
}
