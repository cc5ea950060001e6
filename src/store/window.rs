use chrono::{DateTime, Duration, NaiveDateTime, Utc};

/// Time range for a history query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeWindow {
    /// The last `minutes` minutes, evaluated at query time
    Trailing { minutes: i64 },
    /// Inclusive on both ends
    Between { start: DateTime<Utc>, end: DateTime<Utc> },
}

impl TimeWindow {
    /// Resolve raw query parameters.
    ///
    /// The explicit window wins only when both ends are given and both
    /// parse. Anything else falls back to the trailing form, silently.
    pub fn from_params(minutes: i64, start: Option<&str>, end: Option<&str>) -> Self {
        // TODO: reject a malformed explicit window with a 400 instead of
        // falling back once the dashboard stops sending partial dates.
        match (start.and_then(parse_instant), end.and_then(parse_instant)) {
            (Some(start), Some(end)) => Self::Between { start, end },
            _ => Self::Trailing { minutes },
        }
    }

    /// `(start, end)`; a trailing window has no upper bound.
    pub fn bounds(&self, now: DateTime<Utc>) -> (DateTime<Utc>, Option<DateTime<Utc>>) {
        match *self {
            Self::Trailing { minutes } => {
                let start = Duration::try_minutes(minutes)
                    .and_then(|span| now.checked_sub_signed(span))
                    .unwrap_or(DateTime::<Utc>::MIN_UTC);
                (start, None)
            }
            Self::Between { start, end } => (start, Some(end)),
        }
    }
}

/// ISO-8601 with offset (`Z` included), or a naive date-time taken as UTC.
fn parse_instant(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn explicit_window_needs_both_ends() {
        let w = TimeWindow::from_params(15, Some("2024-01-01T00:00:00Z"), None);
        assert_eq!(w, TimeWindow::Trailing { minutes: 15 });
    }

    #[test]
    fn explicit_window_wins_over_minutes() {
        let w = TimeWindow::from_params(
            15,
            Some("2024-01-01T00:00:00Z"),
            Some("2024-01-01T01:00:00+01:00"),
        );
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(w, TimeWindow::Between { start, end: start });
    }

    #[test]
    fn malformed_explicit_window_falls_back() {
        let w = TimeWindow::from_params(60, Some("yesterday"), Some("2024-01-01T00:00:00Z"));
        assert_eq!(w, TimeWindow::Trailing { minutes: 60 });
    }

    #[test]
    fn naive_timestamps_are_utc() {
        let w = TimeWindow::from_params(60, Some("2024-01-01T08:00:00"), Some("2024-01-01 09:30:00.5"));
        let TimeWindow::Between { start, end } = w else {
            panic!("expected explicit window, got {w:?}");
        };
        assert_eq!(start, Utc.with_ymd_and_hms(2024, 1, 1, 8, 0, 0).unwrap());
        assert_eq!(end.timestamp_millis(), start.timestamp_millis() + 90 * 60_000 + 500);
    }

    #[test]
    fn trailing_bounds() {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        let (start, end) = TimeWindow::Trailing { minutes: 30 }.bounds(now);
        assert_eq!(start, Utc.with_ymd_and_hms(2024, 1, 1, 11, 30, 0).unwrap());
        assert_eq!(end, None);
    }

    #[test]
    fn absurd_minutes_do_not_overflow() {
        let now = Utc::now();
        let (start, _) = TimeWindow::Trailing { minutes: i64::MAX }.bounds(now);
        assert!(start <= now);
    }
}
