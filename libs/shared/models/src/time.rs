// libs/shared/models/src/time.rs
//
// Time-of-day primitives shared by every scheduling cell. `overlaps` is the
// only overlap rule in the workspace; conflict checks, slot blocking and the
// room/day schedule rule all go through it.

use std::fmt;

use chrono::{Datelike, Duration, NaiveDate, NaiveTime, Timelike, Weekday};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TimeError {
    #[error("Invalid time '{0}', expected HH:MM")]
    InvalidTime(String),

    #[error("Start time {start} must be before end time {end}")]
    EmptyRange { start: String, end: String },

    #[error("Invalid day of week: {0}")]
    InvalidDay(String),
}

/// Parse a clinic wall-clock time. Accepts `HH:MM` and the `HH:MM:SS` form
/// Postgres returns for `time` columns.
pub fn parse_clock_time(raw: &str) -> Result<NaiveTime, TimeError> {
    let trimmed = raw.trim();
    NaiveTime::parse_from_str(trimmed, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(trimmed, "%H:%M:%S"))
        .map_err(|_| TimeError::InvalidTime(raw.to_string()))
}

pub fn format_clock_time(time: &NaiveTime) -> String {
    format!("{:02}:{:02}", time.hour(), time.minute())
}

/// Serde adapter for `NaiveTime` as zero-padded `HH:MM`.
pub mod hhmm {
    use super::*;

    pub fn serialize<S: Serializer>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format_clock_time(time))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveTime, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse_clock_time(&raw).map_err(serde::de::Error::custom)
    }
}

// ==============================================================================
// TIME RANGE
// ==============================================================================

/// Half-open `[start_time, end_time)` interval within one clinic day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawTimeRange")]
pub struct TimeRange {
    #[serde(with = "hhmm")]
    start_time: NaiveTime,
    #[serde(with = "hhmm")]
    end_time: NaiveTime,
}

#[derive(Deserialize)]
struct RawTimeRange {
    #[serde(with = "hhmm")]
    start_time: NaiveTime,
    #[serde(with = "hhmm")]
    end_time: NaiveTime,
}

impl TryFrom<RawTimeRange> for TimeRange {
    type Error = TimeError;

    fn try_from(raw: RawTimeRange) -> Result<Self, Self::Error> {
        TimeRange::new(raw.start_time, raw.end_time)
    }
}

impl TimeRange {
    pub fn new(start_time: NaiveTime, end_time: NaiveTime) -> Result<Self, TimeError> {
        if start_time >= end_time {
            return Err(TimeError::EmptyRange {
                start: format_clock_time(&start_time),
                end: format_clock_time(&end_time),
            });
        }
        Ok(Self { start_time, end_time })
    }

    /// Build a range from `HH:MM` strings.
    pub fn parse(start: &str, end: &str) -> Result<Self, TimeError> {
        Self::new(parse_clock_time(start)?, parse_clock_time(end)?)
    }

    pub fn start_time(&self) -> NaiveTime {
        self.start_time
    }

    pub fn end_time(&self) -> NaiveTime {
        self.end_time
    }

    pub fn duration_minutes(&self) -> i64 {
        (self.end_time - self.start_time).num_minutes()
    }

    pub fn overlaps(&self, other: &TimeRange) -> bool {
        overlaps(self, other)
    }

    /// Consecutive whole slots of `slot_minutes`; a trailing remainder
    /// shorter than one slot is dropped.
    pub fn partition(&self, slot_minutes: u32) -> Vec<TimeRange> {
        let mut slots = Vec::new();
        if slot_minutes == 0 {
            return slots;
        }

        let step = Duration::minutes(i64::from(slot_minutes));
        let mut cursor = self.start_time;
        loop {
            let (slot_end, wrapped) = cursor.overflowing_add_signed(step);
            if wrapped != 0 || slot_end > self.end_time {
                break;
            }
            slots.push(TimeRange { start_time: cursor, end_time: slot_end });
            cursor = slot_end;
        }
        slots
    }
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}-{}",
            format_clock_time(&self.start_time),
            format_clock_time(&self.end_time)
        )
    }
}

/// `a.start < b.end && a.end > b.start`. Back-to-back ranges do not overlap.
pub fn overlaps(a: &TimeRange, b: &TimeRange) -> bool {
    a.start_time < b.end_time && a.end_time > b.start_time
}

// ==============================================================================
// DAY OF WEEK
// ==============================================================================

/// Weekday of a recurring schedule. Indexed Sunday = 0 .. Saturday = 6;
/// `from_date` is the one date-to-weekday mapping in the workspace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DayOfWeek {
    Sunday,
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
}

impl DayOfWeek {
    pub const ALL: [DayOfWeek; 7] = [
        DayOfWeek::Sunday,
        DayOfWeek::Monday,
        DayOfWeek::Tuesday,
        DayOfWeek::Wednesday,
        DayOfWeek::Thursday,
        DayOfWeek::Friday,
        DayOfWeek::Saturday,
    ];

    pub fn from_date(date: NaiveDate) -> Self {
        Self::from(date.weekday())
    }

    pub fn index(&self) -> u32 {
        self.to_weekday().num_days_from_sunday()
    }

    pub fn from_index(index: u32) -> Result<Self, TimeError> {
        Self::ALL
            .get(index as usize)
            .copied()
            .ok_or_else(|| TimeError::InvalidDay(index.to_string()))
    }

    pub fn to_weekday(&self) -> Weekday {
        match self {
            DayOfWeek::Sunday => Weekday::Sun,
            DayOfWeek::Monday => Weekday::Mon,
            DayOfWeek::Tuesday => Weekday::Tue,
            DayOfWeek::Wednesday => Weekday::Wed,
            DayOfWeek::Thursday => Weekday::Thu,
            DayOfWeek::Friday => Weekday::Fri,
            DayOfWeek::Saturday => Weekday::Sat,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DayOfWeek::Sunday => "SUNDAY",
            DayOfWeek::Monday => "MONDAY",
            DayOfWeek::Tuesday => "TUESDAY",
            DayOfWeek::Wednesday => "WEDNESDAY",
            DayOfWeek::Thursday => "THURSDAY",
            DayOfWeek::Friday => "FRIDAY",
            DayOfWeek::Saturday => "SATURDAY",
        }
    }
}

impl From<Weekday> for DayOfWeek {
    fn from(weekday: Weekday) -> Self {
        match weekday {
            Weekday::Sun => DayOfWeek::Sunday,
            Weekday::Mon => DayOfWeek::Monday,
            Weekday::Tue => DayOfWeek::Tuesday,
            Weekday::Wed => DayOfWeek::Wednesday,
            Weekday::Thu => DayOfWeek::Thursday,
            Weekday::Fri => DayOfWeek::Friday,
            Weekday::Sat => DayOfWeek::Saturday,
        }
    }
}

impl fmt::Display for DayOfWeek {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for DayOfWeek {
    type Err = TimeError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let upper = raw.trim().to_ascii_uppercase();
        Self::ALL
            .iter()
            .copied()
            .find(|day| day.as_str() == upper)
            .ok_or_else(|| TimeError::InvalidDay(raw.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn range(start: &str, end: &str) -> TimeRange {
        TimeRange::parse(start, end).unwrap()
    }

    #[test]
    fn test_back_to_back_ranges_do_not_overlap() {
        assert!(!overlaps(&range("09:00", "10:00"), &range("10:00", "11:00")));
        assert!(!overlaps(&range("10:00", "11:00"), &range("09:00", "10:00")));
    }

    #[test]
    fn test_partial_overlap() {
        assert!(overlaps(&range("09:00", "10:00"), &range("09:30", "10:30")));
    }

    #[test]
    fn test_containment_overlaps() {
        assert!(overlaps(&range("09:00", "12:00"), &range("10:00", "10:15")));
        assert!(overlaps(&range("10:00", "10:15"), &range("09:00", "12:00")));
    }

    #[test]
    fn test_overlap_is_symmetric() {
        let samples = [
            range("08:00", "08:30"),
            range("08:15", "09:00"),
            range("08:30", "09:30"),
            range("09:00", "09:30"),
            range("07:00", "12:00"),
            range("12:00", "12:01"),
        ];
        for a in &samples {
            for b in &samples {
                assert_eq!(overlaps(a, b), overlaps(b, a), "{} vs {}", a, b);
            }
        }
    }

    #[test]
    fn test_empty_or_inverted_range_rejected() {
        assert!(TimeRange::parse("10:00", "10:00").is_err());
        assert!(TimeRange::parse("11:00", "10:00").is_err());
        assert!(TimeRange::parse("25:00", "26:00").is_err());
    }

    #[test]
    fn test_parse_accepts_postgres_seconds() {
        let parsed = TimeRange::parse("09:00:00", "09:30:00").unwrap();
        assert_eq!(parsed, range("09:00", "09:30"));
        assert_eq!(parsed.to_string(), "09:00-09:30");
        assert_eq!(parsed.duration_minutes(), 30);
    }

    #[test]
    fn test_partition_exact_multiple() {
        let slots = range("09:00", "10:00").partition(30);
        assert_eq!(slots, vec![range("09:00", "09:30"), range("09:30", "10:00")]);
    }

    #[test]
    fn test_partition_drops_remainder() {
        let slots = range("09:00", "09:45").partition(30);
        assert_eq!(slots, vec![range("09:00", "09:30")]);
    }

    #[test]
    fn test_partition_slot_longer_than_range() {
        assert!(range("09:00", "09:20").partition(30).is_empty());
        assert!(range("09:00", "09:20").partition(0).is_empty());
    }

    #[test]
    fn test_partition_near_midnight_stops() {
        let slots = range("23:00", "23:59").partition(30);
        assert_eq!(slots, vec![range("23:00", "23:30")]);
    }

    #[test]
    fn test_serde_round_trip_uses_hhmm() {
        let json = serde_json::to_value(range("09:05", "17:30")).unwrap();
        assert_eq!(json, serde_json::json!({"start_time": "09:05", "end_time": "17:30"}));

        let invalid: Result<TimeRange, _> =
            serde_json::from_value(serde_json::json!({"start_time": "10:00", "end_time": "09:00"}));
        assert!(invalid.is_err());
    }

    #[test]
    fn test_day_of_week_mapping_starts_sunday() {
        // 2025-06-15 is a Sunday, 2025-06-16 a Monday
        let sunday = NaiveDate::from_ymd_opt(2025, 6, 15).unwrap();
        let monday = NaiveDate::from_ymd_opt(2025, 6, 16).unwrap();
        assert_eq!(DayOfWeek::from_date(sunday), DayOfWeek::Sunday);
        assert_eq!(DayOfWeek::from_date(monday), DayOfWeek::Monday);
        assert_eq!(DayOfWeek::Sunday.index(), 0);
        assert_eq!(DayOfWeek::Saturday.index(), 6);
        for day in DayOfWeek::ALL {
            assert_eq!(DayOfWeek::from_index(day.index()).unwrap(), day);
        }
        assert!(DayOfWeek::from_index(7).is_err());
    }

    #[test]
    fn test_day_of_week_parse_and_serde() {
        assert_eq!("monday".parse::<DayOfWeek>().unwrap(), DayOfWeek::Monday);
        assert_eq!(
            serde_json::to_value(DayOfWeek::Wednesday).unwrap(),
            serde_json::json!("WEDNESDAY")
        );
        assert!("funday".parse::<DayOfWeek>().is_err());
    }
}
