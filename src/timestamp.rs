//! # Civil timestamp
//! This module contains the date-time type the schedule is computed against.
//!
//! The RTC hands us calendar fields, not an epoch, so the timestamp keeps the
//! calendar fields and does its own rollover math. Field order gives the
//! derived ordering: year before month before day before time of day.

/// A second-resolution calendar timestamp.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Timestamp {
    pub year: u16,
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
}

impl Timestamp {
    pub const fn new(year: u16, month: u8, day: u8, hour: u8, minute: u8, second: u8) -> Self {
        Self {
            year,
            month,
            day,
            hour,
            minute,
            second,
        }
    }

    /// The same calendar day at `hour:minute:00`.
    pub const fn at_time(self, hour: u8, minute: u8) -> Self {
        Self {
            year: self.year,
            month: self.month,
            day: self.day,
            hour,
            minute,
            second: 0,
        }
    }

    /// Advance by `secs` seconds, rolling over days, months and years.
    pub fn add_secs(self, secs: u32) -> Self {
        let total = self.hour as u32 * 3600 + self.minute as u32 * 60 + self.second as u32 + secs;
        let mut result = self;
        result.hour = ((total / 3600) % 24) as u8;
        result.minute = ((total / 60) % 60) as u8;
        result.second = (total % 60) as u8;
        for _ in 0..total / 86_400 {
            result = result.next_day();
        }
        result
    }

    /// The same time of day on the following calendar day.
    pub fn next_day(self) -> Self {
        let mut next = self;
        next.day += 1;
        if next.day > days_in_month(next.month, next.year) {
            next.day = 1;
            next.month += 1;
            if next.month > 12 {
                next.month = 1;
                next.year += 1;
            }
        }
        next
    }
}

/// Get the number of days in a given month and year
const fn days_in_month(month: u8, year: u16) -> u8 {
    match month {
        1 | 3 | 5 | 7 | 8 | 10 | 12 => 31,
        2 => {
            if is_leap_year(year) {
                29
            } else {
                28
            }
        }
        _ => 30, // all other months
    }
}

/// Check if a year is a leap year
/// A year is a leap year if it is divisible by 4, but not by 100, unless it is also divisible by 400.
const fn is_leap_year(year: u16) -> bool {
    year % 4 == 0 && year % 100 != 0 || year % 400 == 0
}

/// A clock sample: best-effort timestamp plus a validity flag.
///
/// The clock collaborator always returns a timestamp; `valid` is false when the
/// hardware could not produce a trustworthy reading (RTC not running yet).
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ClockReading {
    pub time: Timestamp,
    pub valid: bool,
}

impl ClockReading {
    pub const fn valid(time: Timestamp) -> Self {
        Self { time, valid: true }
    }

    pub const fn invalid() -> Self {
        Self {
            time: Timestamp::new(0, 0, 0, 0, 0, 0),
            valid: false,
        }
    }
}
