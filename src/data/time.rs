use std::fmt;

use chrono::{Datelike, Days, NaiveDate};

use super::error::DataError;

#[cfg_attr(not(feature = "netcdf"), allow(dead_code))]
const SECONDS_PER_DAY: i64 = 86_400;

// ---------------------------------------------------------------------------
// CfDate – calendar-agnostic timestamp
// ---------------------------------------------------------------------------

/// A decoded time coordinate.
///
/// Model output frequently uses calendars (`noleap`, `360_day`) that have no
/// representation in `chrono`, so dates are kept as plain fields and ordered
/// lexicographically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CfDate {
    pub year: i32,
    pub month: u32,
    pub day: u32,
    pub second_of_day: u32,
}

impl CfDate {
    #[cfg(test)]
    pub fn ymd(year: i32, month: u32, day: u32) -> Self {
        CfDate {
            year,
            month,
            day,
            second_of_day: 0,
        }
    }

    #[cfg(test)]
    pub fn ymd_hms(year: i32, month: u32, day: u32, h: u32, m: u32, s: u32) -> Self {
        CfDate {
            year,
            month,
            day,
            second_of_day: h * 3600 + m * 60 + s,
        }
    }

    /// Parse `YYYY-MM-DD`, `YYYY-MM-DD hh:mm:ss` or `YYYY-MM-DDThh:mm:ss`.
    /// Single-digit months and days are accepted (`1920-1-1`), as are
    /// fractional seconds, which are truncated.
    pub fn parse(s: &str) -> Result<Self, DataError> {
        let invalid = || DataError::InvalidDate(s.to_string());
        let trimmed = s.trim();
        let (date_part, time_part) = match trimmed.split_once(['T', ' ']) {
            Some((d, t)) => (d, Some(t.trim())),
            None => (trimmed, None),
        };

        let mut fields = date_part.splitn(3, '-');
        let year: i32 = fields.next().and_then(|v| v.parse().ok()).ok_or_else(invalid)?;
        let month: u32 = fields.next().and_then(|v| v.parse().ok()).ok_or_else(invalid)?;
        let day: u32 = fields.next().and_then(|v| v.parse().ok()).ok_or_else(invalid)?;
        if !(1..=12).contains(&month) || !(1..=31).contains(&day) {
            return Err(invalid());
        }

        let second_of_day = match time_part {
            None | Some("") => 0,
            Some(t) => {
                let mut hms = t.splitn(3, ':');
                let h: u32 = hms.next().and_then(|v| v.parse().ok()).ok_or_else(invalid)?;
                let m: u32 = hms.next().map_or(Some(0), |v| v.parse().ok()).ok_or_else(invalid)?;
                let sec: f64 = hms.next().map_or(Some(0.0), |v| v.parse().ok()).ok_or_else(invalid)?;
                if h > 23 || m > 59 || !(0.0..61.0).contains(&sec) {
                    return Err(invalid());
                }
                h * 3600 + m * 60 + sec as u32
            }
        };

        Ok(CfDate {
            year,
            month,
            day,
            second_of_day,
        })
    }
}

impl fmt::Display for CfDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = self.second_of_day;
        write!(
            f,
            "{:04}-{:02}-{:02} {:02}:{:02}:{:02}",
            self.year,
            self.month,
            self.day,
            s / 3600,
            (s / 60) % 60,
            s % 60
        )
    }
}

// ---------------------------------------------------------------------------
// Calendars
// ---------------------------------------------------------------------------

#[cfg_attr(not(feature = "netcdf"), allow(dead_code))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Calendar {
    /// `standard`, `gregorian` and `proleptic_gregorian` are all treated as
    /// proleptic Gregorian.
    Gregorian,
    NoLeap,
    AllLeap,
    Day360,
}

#[cfg_attr(not(feature = "netcdf"), allow(dead_code))]
const NOLEAP_MONTHS: [u32; 12] = [31, 28, 31, 30, 31, 30, 31, 31, 30, 31, 30, 31];
#[cfg_attr(not(feature = "netcdf"), allow(dead_code))]
const ALL_LEAP_MONTHS: [u32; 12] = [31, 29, 31, 30, 31, 30, 31, 31, 30, 31, 30, 31];
#[cfg_attr(not(feature = "netcdf"), allow(dead_code))]
const DAY360_MONTHS: [u32; 12] = [30; 12];

#[cfg_attr(not(feature = "netcdf"), allow(dead_code))]
impl Calendar {
    pub fn from_attribute(name: &str) -> Result<Self, DataError> {
        match name.trim().to_ascii_lowercase().as_str() {
            "" | "standard" | "gregorian" | "proleptic_gregorian" => Ok(Calendar::Gregorian),
            "noleap" | "365_day" => Ok(Calendar::NoLeap),
            "all_leap" | "366_day" => Ok(Calendar::AllLeap),
            "360_day" => Ok(Calendar::Day360),
            other => Err(DataError::UnsupportedCalendar(other.to_string())),
        }
    }

    fn month_lengths(self) -> Option<&'static [u32; 12]> {
        match self {
            Calendar::Gregorian => None,
            Calendar::NoLeap => Some(&NOLEAP_MONTHS),
            Calendar::AllLeap => Some(&ALL_LEAP_MONTHS),
            Calendar::Day360 => Some(&DAY360_MONTHS),
        }
    }

    /// Shift a calendar date by a signed number of days.
    pub fn add_days(self, date: (i32, u32, u32), days: i64) -> Result<(i32, u32, u32), DataError> {
        let (year, month, day) = date;
        let out_of_range = || DataError::InvalidDate(format!("{year:04}-{month:02}-{day:02} + {days} days"));

        let Some(lengths) = self.month_lengths() else {
            let start = NaiveDate::from_ymd_opt(year, month, day).ok_or_else(out_of_range)?;
            let shifted = if days >= 0 {
                start.checked_add_days(Days::new(days.unsigned_abs()))
            } else {
                start.checked_sub_days(Days::new(days.unsigned_abs()))
            }
            .ok_or_else(out_of_range)?;
            return Ok((shifted.year(), shifted.month(), shifted.day()));
        };

        if month == 0 || month > 12 || day == 0 || day > lengths[month as usize - 1] {
            return Err(out_of_range());
        }
        let year_len: i64 = lengths.iter().map(|&d| d as i64).sum();
        let before_month: i64 = lengths[..month as usize - 1].iter().map(|&d| d as i64).sum();
        let ordinal = year as i64 * year_len + before_month + (day as i64 - 1) + days;

        let new_year = ordinal.div_euclid(year_len);
        let mut rest = ordinal.rem_euclid(year_len);
        let mut new_month = 1;
        for &len in lengths {
            if rest < len as i64 {
                break;
            }
            rest -= len as i64;
            new_month += 1;
        }
        let new_year = i32::try_from(new_year).map_err(|_| out_of_range())?;
        Ok((new_year, new_month, rest as u32 + 1))
    }
}

// ---------------------------------------------------------------------------
// CF time units: "<unit> since <reference>"
// ---------------------------------------------------------------------------

#[cfg_attr(not(feature = "netcdf"), allow(dead_code))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeUnits {
    pub seconds_per_unit: f64,
    pub reference: CfDate,
    pub calendar: Calendar,
}

#[cfg_attr(not(feature = "netcdf"), allow(dead_code))]
impl TimeUnits {
    /// Parse a CF `units` attribute together with its `calendar` attribute.
    pub fn parse(units: &str, calendar: &str) -> Result<Self, DataError> {
        let invalid = || DataError::InvalidTimeUnits(units.to_string());
        let (unit, reference) = units.trim().split_once(" since ").ok_or_else(invalid)?;

        let seconds_per_unit = match unit.trim().to_ascii_lowercase().as_str() {
            "days" | "day" | "d" => 86_400.0,
            "hours" | "hour" | "hrs" | "hr" | "h" => 3_600.0,
            "minutes" | "minute" | "mins" | "min" => 60.0,
            "seconds" | "second" | "secs" | "sec" | "s" => 1.0,
            _ => return Err(invalid()),
        };

        // Drop a trailing time zone ("UTC", "Z", "+00:00") if present.
        let mut tokens = reference.split_whitespace();
        let date = tokens.next().ok_or_else(invalid)?;
        let reference = match tokens.next() {
            Some(time) if time.contains(':') => CfDate::parse(&format!("{date} {time}")),
            _ => CfDate::parse(date.trim_end_matches('Z')),
        }
        .map_err(|_| invalid())?;

        Ok(TimeUnits {
            seconds_per_unit,
            reference,
            calendar: Calendar::from_attribute(calendar)?,
        })
    }

    /// Decode one numeric time value, rounding to the nearest second.
    pub fn decode(&self, value: f64) -> Result<CfDate, DataError> {
        if !value.is_finite() {
            return Err(DataError::InvalidDate(format!("non-finite time value {value}")));
        }
        let offset = (value * self.seconds_per_unit).round() as i64;
        let total = offset + self.reference.second_of_day as i64;
        let days = total.div_euclid(SECONDS_PER_DAY);
        let second_of_day = total.rem_euclid(SECONDS_PER_DAY) as u32;

        let r = self.reference;
        let (year, month, day) = self.calendar.add_days((r.year, r.month, r.day), days)?;
        Ok(CfDate {
            year,
            month,
            day,
            second_of_day,
        })
    }

    pub fn decode_all(&self, values: &[f64]) -> Result<Vec<CfDate>, DataError> {
        values.iter().map(|&v| self.decode(v)).collect()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_date_forms() {
        assert_eq!(CfDate::parse("1980-01-01").unwrap(), CfDate::ymd(1980, 1, 1));
        assert_eq!(
            CfDate::parse("2000-01-01 00:00:00").unwrap(),
            CfDate::ymd(2000, 1, 1)
        );
        assert_eq!(
            CfDate::parse("2020-6-5T12:30:15").unwrap(),
            CfDate::ymd_hms(2020, 6, 5, 12, 30, 15)
        );
        assert!(CfDate::parse("2020-13-01").is_err());
        assert!(CfDate::parse("not a date").is_err());
    }

    #[test]
    fn dates_order_chronologically() {
        let a = CfDate::ymd(1999, 12, 31);
        let b = CfDate::ymd(2000, 1, 1);
        let c = CfDate::ymd_hms(2000, 1, 1, 6, 0, 0);
        assert!(a < b && b < c);
    }

    #[test]
    fn noleap_never_visits_february_29() {
        let units = TimeUnits::parse("days since 1920-01-01 00:00:00", "noleap").unwrap();
        // 1920 would be a leap year in the Gregorian calendar.
        assert_eq!(units.decode(59.0).unwrap(), CfDate::ymd(1920, 3, 1));
        assert_eq!(units.decode(365.0).unwrap(), CfDate::ymd(1921, 1, 1));
        assert_eq!(units.decode(365.0 * 80.0).unwrap(), CfDate::ymd(2000, 1, 1));
    }

    #[test]
    fn gregorian_counts_leap_days() {
        let units = TimeUnits::parse("days since 1920-01-01", "standard").unwrap();
        assert_eq!(units.decode(59.0).unwrap(), CfDate::ymd(1920, 2, 29));
        assert_eq!(units.decode(366.0).unwrap(), CfDate::ymd(1921, 1, 1));
        assert_eq!(units.decode(-1.0).unwrap(), CfDate::ymd(1919, 12, 31));
    }

    #[test]
    fn day360_months_are_thirty_days() {
        let units = TimeUnits::parse("days since 2000-01-01", "360_day").unwrap();
        assert_eq!(units.decode(30.0).unwrap(), CfDate::ymd(2000, 2, 1));
        assert_eq!(units.decode(59.0).unwrap(), CfDate::ymd(2000, 2, 30));
        assert_eq!(units.decode(360.0).unwrap(), CfDate::ymd(2001, 1, 1));
    }

    #[test]
    fn hours_with_fractional_days() {
        let units = TimeUnits::parse("hours since 1980-01-01 00:00:00 UTC", "noleap").unwrap();
        assert_eq!(units.decode(36.0).unwrap(), CfDate::ymd_hms(1980, 1, 2, 12, 0, 0));
        assert_eq!(units.decode(-6.0).unwrap(), CfDate::ymd_hms(1979, 12, 31, 18, 0, 0));
    }

    #[test]
    fn rejects_unknown_units_and_calendars() {
        assert!(matches!(
            TimeUnits::parse("fortnights since 2000-01-01", "standard"),
            Err(DataError::InvalidTimeUnits(_))
        ));
        assert!(matches!(
            TimeUnits::parse("days since 2000-01-01", "julian_lunar"),
            Err(DataError::UnsupportedCalendar(_))
        ));
    }
}
