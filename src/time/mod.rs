//! Time-division channel access
//!
//! Peers share the channel by transmitting only inside their own TDMA slot.
//! Schedules are evaluated against an externally supplied absolute time, such
//! as the UTC time of a GPS fix, so nodes stay aligned without any clock
//! synchronization traffic of their own.
//!
//! # Examples
//!
//! ```
//! use tdma_acomms::time::{util, TdmaSchedule};
//!
//! let schedule = TdmaSchedule::configure(3, 1, 10).unwrap();
//! let second = util::second_of_minute_from_day_seconds(12.0 * 3600.0 + 15.2).unwrap();
//! assert!(schedule.is_my_turn(second));
//! ```

mod tdma;

pub use self::tdma::TdmaSchedule;

/// Utility functions for deriving schedule time from UTC
pub mod util {
    use chrono::{DateTime, Duration, NaiveDate, TimeZone, Timelike, Utc};
    use crate::core::{Error, Result, SECONDS_PER_CYCLE};

    /// Seconds in one UTC day
    const SECONDS_PER_DAY: f64 = 86_400.0;

    /// Second of the minute of a UTC instant
    pub fn second_of_minute(time: DateTime<Utc>) -> u32 {
        // Leap seconds are reported as 59 with an oversized nanosecond field
        time.second()
    }

    /// Index of the minute containing `time`, counted from the Unix epoch
    pub fn cycle_index(time: DateTime<Utc>) -> i64 {
        time.timestamp().div_euclid(SECONDS_PER_CYCLE as i64)
    }

    /// Second of the minute from a GPS fix's UTC time of day
    ///
    /// The time is rounded to the nearest second; a value rounding up to 60
    /// belongs to the next minute and yields 0.
    pub fn second_of_minute_from_day_seconds(utc_time: f64) -> Result<u32> {
        if !utc_time.is_finite() || !(0.0..=SECONDS_PER_DAY).contains(&utc_time) {
            return Err(Error::timing(format!("Invalid UTC time of day: {}", utc_time)));
        }

        let second = utc_time.rem_euclid(SECONDS_PER_CYCLE as f64).round() as u32;
        Ok(second % SECONDS_PER_CYCLE)
    }

    /// UTC instant of a GPS fix, from its date and time of day in seconds
    pub fn from_gps_fix(date: NaiveDate, utc_time: f64) -> Result<DateTime<Utc>> {
        if !utc_time.is_finite() || !(0.0..=SECONDS_PER_DAY).contains(&utc_time) {
            return Err(Error::timing(format!("Invalid UTC time of day: {}", utc_time)));
        }

        let midnight = date
            .and_hms_opt(0, 0, 0)
            .ok_or_else(|| Error::timing("Invalid GPS date"))?;
        let offset = Duration::milliseconds((utc_time * 1000.0).round() as i64);

        Ok(Utc.from_utc_datetime(&midnight) + offset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone, Utc};

    #[test]
    fn test_second_of_minute() {
        let time = Utc.with_ymd_and_hms(2024, 5, 17, 10, 41, 27).unwrap();
        assert_eq!(util::second_of_minute(time), 27);
        assert_eq!(util::cycle_index(time), time.timestamp() / 60);
    }

    #[test]
    fn test_second_from_day_seconds() {
        assert_eq!(util::second_of_minute_from_day_seconds(3615.0).unwrap(), 15);
        assert_eq!(util::second_of_minute_from_day_seconds(3615.4).unwrap(), 15);
        assert_eq!(util::second_of_minute_from_day_seconds(3615.6).unwrap(), 16);
        // Rounds into the next minute
        assert_eq!(util::second_of_minute_from_day_seconds(3659.7).unwrap(), 0);
        assert_eq!(util::second_of_minute_from_day_seconds(0.0).unwrap(), 0);

        assert!(util::second_of_minute_from_day_seconds(-1.0).is_err());
        assert!(util::second_of_minute_from_day_seconds(f64::NAN).is_err());
    }

    #[test]
    fn test_from_gps_fix() {
        let date = NaiveDate::from_ymd_opt(2024, 5, 17).unwrap();
        let time = util::from_gps_fix(date, 10.0 * 3600.0 + 41.0 * 60.0 + 27.25).unwrap();

        assert_eq!(time, Utc.with_ymd_and_hms(2024, 5, 17, 10, 41, 27).unwrap() + chrono::Duration::milliseconds(250));
        assert_eq!(util::second_of_minute(time), 27);
        assert!(util::from_gps_fix(date, 90_000.0).is_err());
    }

    #[test]
    fn test_schedule_against_gps_time() {
        let schedule = TdmaSchedule::configure(3, 1, 10).unwrap();
        let date = NaiveDate::from_ymd_opt(2024, 5, 17).unwrap();

        let mine = util::from_gps_fix(date, 3600.0 + 12.0).unwrap();
        let theirs = util::from_gps_fix(date, 3600.0 + 25.0).unwrap();
        assert!(schedule.is_my_turn(util::second_of_minute(mine)));
        assert!(!schedule.is_my_turn(util::second_of_minute(theirs)));
    }
}
