//! Calendar-aware time values.
//!
//! Files store time as a numeric offset under CF units such as
//! `days since 2000-01-01`. Offsets are converted to [`Time`] values at
//! ingestion so that shards written with different units still compare
//! consistently.

mod axis;

pub use axis::TimeAxis;

use std::cmp::Ordering;
use std::fmt;

use crate::error::{CurateError, Result};

const MICROS_PER_SECOND: i64 = 1_000_000;
const SECONDS_PER_DAY: i64 = 86_400;
const MICROS_PER_DAY: i64 = SECONDS_PER_DAY * MICROS_PER_SECOND;

/// Largest accepted reference year magnitude.
const MAX_YEAR: i32 = 100_000;
/// Largest accepted distance from 1970 in either direction. Wide enough for
/// any reference year plus any plausible offset, small enough that every
/// calendar conversion stays within `i64`.
const MAX_ABS_MICROS: i64 = 2 * (MAX_YEAR as i64) * 366 * MICROS_PER_DAY;

const CUMULATIVE_DAYS: [i64; 12] = [0, 31, 59, 90, 120, 151, 181, 212, 243, 273, 304, 334];
const CUMULATIVE_DAYS_LEAP: [i64; 12] = [0, 31, 60, 91, 121, 152, 182, 213, 244, 274, 305, 335];

/// Calendar used to interpret time offsets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Calendar {
    /// Proleptic Gregorian calendar.
    #[default]
    Standard,
    /// Every year has 365 days.
    NoLeap,
    /// Every year has 366 days.
    AllLeap,
    /// Twelve months of 30 days.
    Day360,
}

impl Calendar {
    /// Parse a CF calendar attribute value.
    pub fn from_name(name: &str) -> Result<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "standard" | "gregorian" | "proleptic_gregorian" => Ok(Calendar::Standard),
            "noleap" | "no_leap" | "365_day" => Ok(Calendar::NoLeap),
            "all_leap" | "366_day" => Ok(Calendar::AllLeap),
            "360_day" => Ok(Calendar::Day360),
            _ => Err(CurateError::UnknownCalendar(name.to_string())),
        }
    }

    /// CF name of the calendar.
    pub fn name(self) -> &'static str {
        match self {
            Calendar::Standard => "standard",
            Calendar::NoLeap => "noleap",
            Calendar::AllLeap => "all_leap",
            Calendar::Day360 => "360_day",
        }
    }

    /// Number of days in the given month.
    pub fn days_in_month(self, year: i32, month: u32) -> u32 {
        match self {
            Calendar::Day360 => 30,
            Calendar::NoLeap => days_in_month_table(month, false),
            Calendar::AllLeap => days_in_month_table(month, true),
            Calendar::Standard => days_in_month_table(month, is_gregorian_leap(year as i64)),
        }
    }

    fn days_from_date(self, year: i32, month: u32, day: u32) -> i64 {
        let (y, m, d) = (year as i64, month as i64, day as i64);
        match self {
            Calendar::Standard => {
                // Days since 1970-01-01 (H. Hinnant's civil algorithm).
                let y = if m <= 2 { y - 1 } else { y };
                let era = if y >= 0 { y } else { y - 399 } / 400;
                let yoe = y - era * 400;
                let mp = (m + 9) % 12;
                let doy = (153 * mp + 2) / 5 + d - 1;
                let doe = yoe * 365 + yoe / 4 - yoe / 100 + doy;
                era * 146_097 + doe - 719_468
            },
            Calendar::NoLeap => y * 365 + CUMULATIVE_DAYS[(m - 1) as usize] + d - 1,
            Calendar::AllLeap => y * 366 + CUMULATIVE_DAYS_LEAP[(m - 1) as usize] + d - 1,
            Calendar::Day360 => y * 360 + (m - 1) * 30 + d - 1,
        }
    }

    fn date_from_days(self, days: i64) -> (i64, u32, u32) {
        match self {
            Calendar::Standard => {
                let z = days + 719_468;
                let era = if z >= 0 { z } else { z - 146_096 } / 146_097;
                let doe = z - era * 146_097;
                let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365;
                let y = yoe + era * 400;
                let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
                let mp = (5 * doy + 2) / 153;
                let d = doy - (153 * mp + 2) / 5 + 1;
                let m = if mp < 10 { mp + 3 } else { mp - 9 };
                let y = if m <= 2 { y + 1 } else { y };
                (y, m as u32, d as u32)
            },
            Calendar::NoLeap => split_fixed_year(days, 365, &CUMULATIVE_DAYS),
            Calendar::AllLeap => split_fixed_year(days, 366, &CUMULATIVE_DAYS_LEAP),
            Calendar::Day360 => {
                let year = days.div_euclid(360);
                let rem = days.rem_euclid(360);
                (year, (rem / 30 + 1) as u32, (rem % 30 + 1) as u32)
            },
        }
    }
}

fn is_gregorian_leap(year: i64) -> bool {
    (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
}

fn days_in_month_table(month: u32, leap: bool) -> u32 {
    match month {
        2 if leap => 29,
        2 => 28,
        4 | 6 | 9 | 11 => 30,
        _ => 31,
    }
}

fn split_fixed_year(days: i64, year_len: i64, table: &[i64; 12]) -> (i64, u32, u32) {
    let year = days.div_euclid(year_len);
    let doy = days.rem_euclid(year_len);
    let month = table.iter().rposition(|&start| start <= doy).unwrap_or(0);
    (year, month as u32 + 1, (doy - table[month]) as u32 + 1)
}

/// A point in time under a calendar, with microsecond resolution.
///
/// Ordering and equality compare the calendar fields only; the calendar tag
/// is carried for conversions back to offsets.
#[derive(Debug, Clone, Copy)]
pub struct Time {
    calendar: Calendar,
    year: i32,
    month: u32,
    day: u32,
    seconds: u32,
    micros: u32,
}

impl Time {
    /// Create a time from calendar fields.
    pub fn new(
        calendar: Calendar,
        year: i32,
        month: u32,
        day: u32,
        hour: u32,
        minute: u32,
        second: u32,
    ) -> Result<Self> {
        if !(-MAX_YEAR..=MAX_YEAR).contains(&year) {
            return Err(CurateError::InvalidTimeUnits(format!(
                "year {} outside [{}, {}]",
                year, -MAX_YEAR, MAX_YEAR
            )));
        }
        if !(1..=12).contains(&month) || day == 0 || day > calendar.days_in_month(year, month) {
            return Err(CurateError::InvalidTimeUnits(format!(
                "{:04}-{:02}-{:02}",
                year, month, day
            )));
        }
        if hour > 23 || minute > 59 || second > 60 {
            return Err(CurateError::InvalidTimeUnits(format!(
                "{:02}:{:02}:{:02}",
                hour, minute, second
            )));
        }

        Ok(Self {
            calendar,
            year,
            month,
            day,
            seconds: hour * 3600 + minute * 60 + second,
            micros: 0,
        })
    }

    /// Convert a raw offset under the given units into a time.
    ///
    /// Non-finite values (including unset fill values) and offsets landing
    /// outside the representable range are rejected.
    pub fn from_offset(units: &TimeUnits, value: f64) -> Result<Self> {
        let out_of_range = || CurateError::TimeOutOfRange {
            value,
            units: units.text.clone(),
        };
        if !value.is_finite() {
            return Err(out_of_range());
        }

        let delta = (value * units.unit.micros() as f64).round();
        if delta.abs() > MAX_ABS_MICROS as f64 {
            return Err(out_of_range());
        }
        let micros = units
            .reference_micros
            .checked_add(delta as i64)
            .filter(|m| m.abs() <= MAX_ABS_MICROS)
            .ok_or_else(out_of_range)?;
        Self::from_micros(units.reference.calendar, micros).ok_or_else(out_of_range)
    }

    /// Express this time as an offset under the given units.
    pub fn to_offset(&self, units: &TimeUnits) -> f64 {
        let micros = self.micros_in(units.reference.calendar);
        (micros - units.reference_micros) as f64 / units.unit.micros() as f64
    }

    fn micros_in(&self, calendar: Calendar) -> i64 {
        calendar.days_from_date(self.year, self.month, self.day) * MICROS_PER_DAY
            + self.seconds as i64 * MICROS_PER_SECOND
            + self.micros as i64
    }

    fn from_micros(calendar: Calendar, micros: i64) -> Option<Self> {
        let days = micros.div_euclid(MICROS_PER_DAY);
        let rem = micros.rem_euclid(MICROS_PER_DAY);
        let (year, month, day) = calendar.date_from_days(days);
        Some(Self {
            calendar,
            year: i32::try_from(year).ok()?,
            month,
            day,
            seconds: (rem / MICROS_PER_SECOND) as u32,
            micros: (rem % MICROS_PER_SECOND) as u32,
        })
    }

    /// Calendar this time was created under.
    pub fn calendar(&self) -> Calendar {
        self.calendar
    }

    /// Year.
    pub fn year(&self) -> i32 {
        self.year
    }

    /// Month (1-12).
    pub fn month(&self) -> u32 {
        self.month
    }

    /// Day of month (1-based).
    pub fn day(&self) -> u32 {
        self.day
    }

    /// Seconds elapsed since midnight.
    pub fn seconds_of_day(&self) -> u32 {
        self.seconds
    }

    /// Compact form used in generated filenames: `YYYY-MM-DD-SSSSS`.
    pub fn to_short_string(&self) -> String {
        format!(
            "{:04}-{:02}-{:02}-{:05}",
            self.year, self.month, self.day, self.seconds
        )
    }

    fn key(&self) -> (i32, u32, u32, u32, u32) {
        (self.year, self.month, self.day, self.seconds, self.micros)
    }
}

impl PartialEq for Time {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for Time {}

impl PartialOrd for Time {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Time {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key().cmp(&other.key())
    }
}

impl fmt::Display for Time {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:04}-{:02}-{:02} {:02}:{:02}:{:02}",
            self.year,
            self.month,
            self.day,
            self.seconds / 3600,
            (self.seconds / 60) % 60,
            self.seconds % 60
        )?;
        if self.micros != 0 {
            write!(f, ".{:06}", self.micros)?;
        }
        Ok(())
    }
}

/// Unit of a CF time offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeUnit {
    /// Seconds.
    Seconds,
    /// Minutes.
    Minutes,
    /// Hours.
    Hours,
    /// Days.
    Days,
}

impl TimeUnit {
    fn micros(self) -> i64 {
        match self {
            TimeUnit::Seconds => MICROS_PER_SECOND,
            TimeUnit::Minutes => 60 * MICROS_PER_SECOND,
            TimeUnit::Hours => 3600 * MICROS_PER_SECOND,
            TimeUnit::Days => MICROS_PER_DAY,
        }
    }

    fn parse(word: &str) -> Option<Self> {
        match word {
            "seconds" | "second" | "secs" | "sec" | "s" => Some(TimeUnit::Seconds),
            "minutes" | "minute" | "mins" | "min" => Some(TimeUnit::Minutes),
            "hours" | "hour" | "hrs" | "hr" | "h" => Some(TimeUnit::Hours),
            "days" | "day" | "d" => Some(TimeUnit::Days),
            _ => None,
        }
    }
}

/// Parsed CF time units, e.g. `hours since 1979-01-01 00:00:00`.
#[derive(Debug, Clone)]
pub struct TimeUnits {
    text: String,
    unit: TimeUnit,
    reference: Time,
    reference_micros: i64,
}

impl TimeUnits {
    /// Parse a units string under the given calendar.
    pub fn parse(text: &str, calendar: Calendar) -> Result<Self> {
        let invalid = || CurateError::InvalidTimeUnits(text.to_string());

        let lower = text.trim().to_ascii_lowercase();
        let (unit_word, reference) = lower.split_once(" since ").ok_or_else(invalid)?;
        let unit = TimeUnit::parse(unit_word.trim()).ok_or_else(invalid)?;

        let mut tokens: Vec<&str> = reference.split_whitespace().collect();
        if tokens.is_empty() {
            return Err(invalid());
        }
        // ISO form: 1979-01-01T12:00:00
        if let Some((date, clock)) = tokens[0].split_once('t') {
            tokens.splice(0..1, [date, clock]);
        }

        let date = tokens[0];
        let mut date_parts = date.splitn(3, '-');
        let year = parse_field::<i32>(date_parts.next()).ok_or_else(invalid)?;
        let month = parse_field::<u32>(date_parts.next()).unwrap_or(1);
        let day = parse_field::<u32>(date_parts.next()).unwrap_or(1);

        let (mut hour, mut minute, mut second, mut micros) = (0, 0, 0, 0);
        for token in tokens.into_iter().skip(1) {
            let token = token.trim_end_matches('z');
            let (token, offset) = match token.find(|c| c == '+' || c == '-') {
                Some(pos) => token.split_at(pos),
                None => (token, ""),
            };
            // Only UTC references are supported.
            if !offset.is_empty() && !is_zero_offset(offset) {
                return Err(invalid());
            }
            if token.is_empty() || token == "utc" || token == "gmt" {
                continue;
            }
            let mut clock = token.splitn(3, ':');
            hour = parse_field::<u32>(clock.next()).ok_or_else(invalid)?;
            minute = parse_field::<u32>(clock.next()).unwrap_or(0);
            if let Some(sec) = clock.next() {
                let (whole, frac) = sec.split_once('.').unwrap_or((sec, ""));
                second = whole.parse::<u32>().map_err(|_| invalid())?;
                micros = parse_fraction(frac).ok_or_else(invalid)?;
            }
        }

        let mut reference =
            Time::new(calendar, year, month, day, hour, minute, second).map_err(|_| invalid())?;
        reference.micros = micros;

        Ok(Self {
            text: text.trim().to_string(),
            unit,
            reference_micros: reference.micros_in(calendar),
            reference,
        })
    }

    /// Original units string.
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Calendar the units were parsed under.
    pub fn calendar(&self) -> Calendar {
        self.reference.calendar
    }

    /// Reference time ("since" part).
    pub fn reference(&self) -> Time {
        self.reference
    }
}

fn parse_field<T: std::str::FromStr>(field: Option<&str>) -> Option<T> {
    field.and_then(|s| s.trim().parse().ok())
}

fn parse_fraction(frac: &str) -> Option<u32> {
    if frac.is_empty() {
        return Some(0);
    }
    if !frac.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let digits: String = frac.chars().chain(std::iter::repeat('0')).take(6).collect();
    digits.parse().ok()
}

/// Offsets such as `+00:00`, `-0` or `+0000`.
fn is_zero_offset(offset: &str) -> bool {
    offset.len() > 1 && offset[1..].chars().all(|c| c == '0' || c == ':')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn days(text: &str) -> TimeUnits {
        TimeUnits::parse(text, Calendar::Standard).unwrap()
    }

    #[test]
    fn test_calendar_names() {
        assert_eq!(Calendar::from_name("gregorian").unwrap(), Calendar::Standard);
        assert_eq!(Calendar::from_name("365_day").unwrap(), Calendar::NoLeap);
        assert_eq!(Calendar::from_name("360_day").unwrap(), Calendar::Day360);
        assert!(matches!(
            Calendar::from_name("julian"),
            Err(CurateError::UnknownCalendar(_))
        ));
    }

    #[test]
    fn test_days_since_epoch() {
        let units = days("days since 2000-01-01");
        let t = Time::from_offset(&units, 31.0).unwrap();
        assert_eq!((t.year(), t.month(), t.day()), (2000, 2, 1));

        let t = Time::from_offset(&units, 366.0).unwrap();
        assert_eq!((t.year(), t.month(), t.day()), (2001, 1, 1));
    }

    #[test]
    fn test_fractional_days_and_display() {
        let units = days("days since 2000-01-01 00:00:00");
        let t = Time::from_offset(&units, 1.25).unwrap();
        assert_eq!(t.to_string(), "2000-01-02 06:00:00");
        assert_eq!(t.to_short_string(), "2000-01-02-21600");
    }

    #[test]
    fn test_hours_with_time_of_day() {
        let units = days("hours since 1979-01-01T12:00:00Z");
        let t = Time::from_offset(&units, 12.0).unwrap();
        assert_eq!(t.to_string(), "1979-01-02 00:00:00");
    }

    #[test]
    fn test_negative_offsets() {
        let units = days("days since 2000-01-01");
        let t = Time::from_offset(&units, -1.0).unwrap();
        assert_eq!(t.to_string(), "1999-12-31 00:00:00");
    }

    #[test]
    fn test_noleap_skips_february_29() {
        let units = TimeUnits::parse("days since 2000-02-28", Calendar::NoLeap).unwrap();
        let t = Time::from_offset(&units, 1.0).unwrap();
        assert_eq!((t.month(), t.day()), (3, 1));
    }

    #[test]
    fn test_360_day_months() {
        let units = TimeUnits::parse("days since 2000-01-01", Calendar::Day360).unwrap();
        let t = Time::from_offset(&units, 30.0).unwrap();
        assert_eq!((t.month(), t.day()), (2, 1));
        let t = Time::from_offset(&units, 360.0).unwrap();
        assert_eq!((t.year(), t.month(), t.day()), (2001, 1, 1));
    }

    #[test]
    fn test_offset_inverse() {
        let units = days("hours since 1850-01-01 00:00:00");
        let t = Time::from_offset(&units, 1_234_567.0).unwrap();
        assert_eq!(t.to_offset(&units), 1_234_567.0);
    }

    #[test]
    fn test_ordering_ignores_unit_choice() {
        let a = Time::from_offset(&days("days since 2000-01-01"), 1.0).unwrap();
        let b = Time::from_offset(&days("hours since 2000-01-01"), 24.0).unwrap();
        let c = Time::from_offset(&days("hours since 2000-01-01"), 25.0).unwrap();
        assert_eq!(a, b);
        assert!(b < c);
    }

    #[test]
    fn test_invalid_units() {
        assert!(TimeUnits::parse("furlongs since 2000-01-01", Calendar::Standard).is_err());
        assert!(TimeUnits::parse("days", Calendar::Standard).is_err());
        assert!(TimeUnits::parse("days since 2000-13-01", Calendar::Standard).is_err());
        assert!(TimeUnits::parse("days since 900000-01-01", Calendar::Standard).is_err());
    }

    #[test]
    fn test_utc_offsets() {
        let zero = days("hours since 2000-01-01 06:00:00 +00:00");
        assert_eq!(zero.reference().to_string(), "2000-01-01 06:00:00");
        let compact = days("hours since 2000-01-01T06:00:00+0000");
        assert_eq!(compact.reference().to_string(), "2000-01-01 06:00:00");
        let utc = days("hours since 2000-01-01 06:00:00 UTC");
        assert_eq!(utc.reference().seconds_of_day(), 6 * 3600);

        for text in [
            "hours since 2000-01-01 00:00:00 +05:00",
            "hours since 2000-01-01T00:00:00-03:30",
        ] {
            assert!(matches!(
                TimeUnits::parse(text, Calendar::Standard),
                Err(CurateError::InvalidTimeUnits(_))
            ));
        }
    }

    #[test]
    fn test_unrepresentable_offsets() {
        let units = days("days since 2000-01-01");
        for value in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY, 1e36, -1e36, 9.969_209_968_386_869e36] {
            assert!(
                matches!(
                    Time::from_offset(&units, value),
                    Err(CurateError::TimeOutOfRange { .. })
                ),
                "{} accepted",
                value
            );
        }

        // Large but representable offsets still convert.
        let far = Time::from_offset(&units, 36_500_000.0).unwrap();
        assert!(far.year() > 100_000);
        assert_eq!(far.to_offset(&units), 36_500_000.0);
    }
}
