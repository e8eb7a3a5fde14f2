//! Time utilities: timezone-aware deadlines and spoken time specs ("tomorrow at 3pm").

use anyhow::Result;
use chrono::{DateTime, Days, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use regex::{Captures, Regex};

use crate::planner::local_time_on;

/// Parse a local datetime like "2026-02-20 23:59" in `tz`, returning UTC.
pub fn parse_local_deadline_to_utc(local: &str, tz: Tz) -> Result<DateTime<Utc>> {
    let ndt = NaiveDateTime::parse_from_str(local.trim(), "%Y-%m-%d %H:%M")
        .map_err(|e| anyhow::anyhow!("invalid local datetime '{local}': {e}"))?;

    let local_dt = tz
        .from_local_datetime(&ndt)
        .single()
        .ok_or_else(|| anyhow::anyhow!("ambiguous or invalid local time (DST?): {local} {tz}"))?;

    Ok(local_dt.with_timezone(&Utc))
}

const CLOCK: &str = r"(?:at\s+)?(\d{1,2})(?::(\d{2}))?\s*(am|pm)?";

/// Recognizes "tomorrow" plus a clock token, or a bare clock token. Nothing else.
#[derive(Debug, Clone)]
pub struct TimeSpecParser {
    tomorrow_first: Regex,
    tomorrow_last: Regex,
    bare: Regex,
}

impl TimeSpecParser {
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            tomorrow_first: Regex::new(&format!(r"^tomorrow\s+{CLOCK}$"))?,
            tomorrow_last: Regex::new(&format!(r"^{CLOCK}\s+tomorrow$"))?,
            bare: Regex::new(&format!(r"^{CLOCK}$"))?,
        })
    }

    /// A bare token means today, rolled to tomorrow when that moment has already passed.
    pub fn parse(&self, text: &str, now: DateTime<Utc>, tz: Tz) -> Option<DateTime<Utc>> {
        let text = text.trim().to_lowercase();
        let today = now.with_timezone(&tz).date_naive();

        let caps = self
            .tomorrow_first
            .captures(&text)
            .or_else(|| self.tomorrow_last.captures(&text));
        if let Some(caps) = caps {
            let (hour, minute) = clock(&caps)?;
            return local_time_on(today.checked_add_days(Days::new(1))?, hour, minute, tz);
        }

        let caps = self.bare.captures(&text)?;
        let (hour, minute) = clock(&caps)?;
        let at = local_time_on(today, hour, minute, tz)?;
        if at < now {
            local_time_on(today.checked_add_days(Days::new(1))?, hour, minute, tz)
        } else {
            Some(at)
        }
    }
}

/// 24-hour (hour, minute) from a clock match; `None` when out of range.
fn clock(caps: &Captures<'_>) -> Option<(u32, u32)> {
    let hour: u32 = caps.get(1)?.as_str().parse().ok()?;
    let minute: u32 = match caps.get(2) {
        Some(m) => m.as_str().parse().ok()?,
        None => 0,
    };
    if minute > 59 {
        return None;
    }
    let hour = match caps.get(3).map(|m| m.as_str()) {
        Some(suffix) if !(1..=12).contains(&hour) => {
            tracing::debug!(hour, suffix, "12-hour clock out of range");
            return None;
        }
        Some("am") => hour % 12,
        Some(_) => hour % 12 + 12,
        None if hour > 23 => return None,
        None => hour,
    };
    Some((hour, minute))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
    }

    #[test]
    fn test_parse_chicago_deadline() {
        // Feb is CST (UTC-6)
        let utc = parse_local_deadline_to_utc("2026-02-20 23:59", chrono_tz::America::Chicago).unwrap();
        assert_eq!(utc.to_rfc3339(), "2026-02-21T05:59:00+00:00");
    }

    #[test]
    fn deadline_rejects_garbage() {
        assert!(parse_local_deadline_to_utc("next tuesday", Tz::UTC).is_err());
    }

    #[test]
    fn tomorrow_with_clock() {
        let p = TimeSpecParser::new().unwrap();
        let now = utc(2026, 3, 2, 8, 0);
        assert_eq!(p.parse("tomorrow 3pm", now, Tz::UTC), Some(utc(2026, 3, 3, 15, 0)));
        assert_eq!(p.parse("tomorrow at 9:30am", now, Tz::UTC), Some(utc(2026, 3, 3, 9, 30)));
        assert_eq!(p.parse("at 10 tomorrow", now, Tz::UTC), Some(utc(2026, 3, 3, 10, 0)));
    }

    #[test]
    fn bare_clock_today_or_rolled() {
        let p = TimeSpecParser::new().unwrap();
        let now = utc(2026, 3, 2, 12, 0);
        assert_eq!(p.parse("3pm", now, Tz::UTC), Some(utc(2026, 3, 2, 15, 0)));
        assert_eq!(p.parse("14:45", now, Tz::UTC), Some(utc(2026, 3, 2, 14, 45)));
        // 9am already passed today.
        assert_eq!(p.parse("9am", now, Tz::UTC), Some(utc(2026, 3, 3, 9, 0)));
    }

    #[test]
    fn twelve_oclock_edges() {
        let p = TimeSpecParser::new().unwrap();
        let now = utc(2026, 3, 2, 0, 0);
        assert_eq!(p.parse("12am", now, Tz::UTC), Some(utc(2026, 3, 2, 0, 0)));
        assert_eq!(p.parse("12pm", now, Tz::UTC), Some(utc(2026, 3, 2, 12, 0)));
    }

    #[test]
    fn evaluated_in_local_zone() {
        let p = TimeSpecParser::new().unwrap();
        // 08:00 UTC is 02:00 CST in Chicago.
        let now = utc(2026, 3, 2, 8, 0);
        let at = p.parse("3pm", now, chrono_tz::America::Chicago);
        assert_eq!(at, Some(utc(2026, 3, 2, 21, 0)));
    }

    #[test]
    fn anything_else_is_none() {
        let p = TimeSpecParser::new().unwrap();
        let now = utc(2026, 3, 2, 8, 0);
        for s in ["tomorrow", "next week", "13pm", "25", "10:75", "sometime at 3pm", ""] {
            assert_eq!(p.parse(s, now, Tz::UTC), None, "{s}");
        }
    }
}
