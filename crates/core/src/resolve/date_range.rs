use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveTime, SecondsFormat, TimeZone, Utc};

use crate::error::{HarvestError, Result};

/// Dates are entered in Korean local time.
const UTC_OFFSET_SECS: i32 = 9 * 60 * 60;

/// Half-open publish window `[after, before)` built from an inclusive range of
/// calendar dates.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DateRange {
    after: Option<DateTime<Utc>>,
    before: Option<DateTime<Utc>>,
}

impl DateRange {
    /// Both dates are `YYYY-MM-DD` and inclusive; either may be omitted.
    pub fn parse_inclusive(start: Option<&str>, end: Option<&str>) -> Result<Self> {
        let start = start.map(str::trim).filter(|s| !s.is_empty()).map(parse_date).transpose()?;
        let end = end.map(str::trim).filter(|s| !s.is_empty()).map(parse_date).transpose()?;

        if let (Some(s), Some(e)) = (start, end) {
            if s > e {
                return Err(HarvestError::resolution(
                    format!("{s}..{e}"),
                    "start date is after end date",
                ));
            }
        }

        Ok(Self {
            after: start.map(start_of_day),
            before: end.map(|d| end_of_day(d) + Duration::seconds(1)),
        })
    }

    pub fn published_after(&self) -> Option<String> {
        self.after.map(rfc3339)
    }

    pub fn published_before(&self) -> Option<String> {
        self.before.map(rfc3339)
    }

    pub fn is_unbounded(&self) -> bool {
        self.after.is_none() && self.before.is_none()
    }
}

fn parse_date(raw: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|e| HarvestError::resolution(raw, format!("invalid date: {e}")))
}

fn offset() -> FixedOffset {
    FixedOffset::east_opt(UTC_OFFSET_SECS).expect("UTC+9 is a valid offset")
}

fn start_of_day(date: NaiveDate) -> DateTime<Utc> {
    local_to_utc(date, NaiveTime::MIN)
}

fn end_of_day(date: NaiveDate) -> DateTime<Utc> {
    let last_second = NaiveTime::from_hms_opt(23, 59, 59).expect("23:59:59 is a valid time");
    local_to_utc(date, last_second)
}

fn local_to_utc(date: NaiveDate, time: NaiveTime) -> DateTime<Utc> {
    offset()
        .from_local_datetime(&date.and_time(time))
        .single()
        .expect("fixed offsets have no ambiguous local times")
        .with_timezone(&Utc)
}

fn rfc3339(t: DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Secs, true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inclusive_dates_become_half_open_utc_bounds() {
        let range = DateRange::parse_inclusive(Some("2024-03-01"), Some("2024-03-31")).unwrap();
        assert_eq!(range.published_after().unwrap(), "2024-02-29T15:00:00Z");
        assert_eq!(range.published_before().unwrap(), "2024-03-31T15:00:00Z");
    }

    #[test]
    fn single_day_range_spans_exactly_one_day() {
        let range = DateRange::parse_inclusive(Some("2024-01-10"), Some("2024-01-10")).unwrap();
        assert_eq!(range.published_after().unwrap(), "2024-01-09T15:00:00Z");
        assert_eq!(range.published_before().unwrap(), "2024-01-10T15:00:00Z");
    }

    #[test]
    fn open_ended_and_blank_bounds_are_omitted() {
        let range = DateRange::parse_inclusive(None, Some("  ")).unwrap();
        assert!(range.is_unbounded());

        let from_only = DateRange::parse_inclusive(Some("2023-12-25"), None).unwrap();
        assert!(from_only.published_before().is_none());
        assert_eq!(from_only.published_after().unwrap(), "2023-12-24T15:00:00Z");
    }

    #[test]
    fn reversed_or_malformed_dates_are_rejected() {
        assert!(DateRange::parse_inclusive(Some("2024-02-01"), Some("2024-01-01")).is_err());
        assert!(DateRange::parse_inclusive(Some("01/02/2024"), None).is_err());
    }
}
