//! Host-side tests for the calendar timestamp math the schedule relies on.

use pico_sync_alarmclock::Timestamp;

#[test]
fn ordering_is_calendar_order() {
    let base = Timestamp::new(2024, 6, 15, 12, 30, 30);
    assert!(Timestamp::new(2023, 12, 31, 23, 59, 59) < base);
    assert!(Timestamp::new(2024, 6, 15, 12, 30, 29) < base);
    assert!(Timestamp::new(2024, 6, 15, 12, 30, 31) > base);
    assert!(Timestamp::new(2024, 7, 1, 0, 0, 0) > base);
    assert_eq!(Timestamp::new(2024, 6, 15, 12, 30, 30), base);
}

#[test]
fn at_time_keeps_the_day_and_zeroes_seconds() {
    let now = Timestamp::new(2024, 1, 1, 7, 0, 42);
    assert_eq!(now.at_time(21, 5), Timestamp::new(2024, 1, 1, 21, 5, 0));
}

#[test]
fn add_secs_within_a_day() {
    let t = Timestamp::new(2024, 1, 1, 10, 0, 50);
    assert_eq!(t.add_secs(15), Timestamp::new(2024, 1, 1, 10, 1, 5));
    assert_eq!(t.add_secs(3600), Timestamp::new(2024, 1, 1, 11, 0, 50));
}

#[test]
fn add_secs_across_midnight() {
    let t = Timestamp::new(2024, 1, 1, 23, 59, 50);
    assert_eq!(t.add_secs(15), Timestamp::new(2024, 1, 2, 0, 0, 5));
}

#[test]
fn add_secs_across_a_month_end() {
    let t = Timestamp::new(2024, 1, 31, 23, 59, 59);
    assert_eq!(t.add_secs(1), Timestamp::new(2024, 2, 1, 0, 0, 0));
}

#[test]
fn add_secs_across_a_year_end() {
    let t = Timestamp::new(2023, 12, 31, 23, 0, 0);
    assert_eq!(t.add_secs(2 * 3600), Timestamp::new(2024, 1, 1, 1, 0, 0));
}

#[test]
fn add_secs_over_multiple_days() {
    let t = Timestamp::new(2024, 2, 28, 12, 0, 0);
    assert_eq!(t.add_secs(3 * 86_400), Timestamp::new(2024, 3, 2, 12, 0, 0));
}

#[test]
fn february_rollover_follows_leap_years() {
    // 2024 is a leap year, 2023 is not
    assert_eq!(
        Timestamp::new(2024, 2, 28, 8, 0, 0).next_day(),
        Timestamp::new(2024, 2, 29, 8, 0, 0)
    );
    assert_eq!(
        Timestamp::new(2023, 2, 28, 8, 0, 0).next_day(),
        Timestamp::new(2023, 3, 1, 8, 0, 0)
    );
    // century rules: 1900 is not a leap year, 2000 is
    assert_eq!(
        Timestamp::new(1900, 2, 28, 8, 0, 0).next_day(),
        Timestamp::new(1900, 3, 1, 8, 0, 0)
    );
    assert_eq!(
        Timestamp::new(2000, 2, 28, 8, 0, 0).next_day(),
        Timestamp::new(2000, 2, 29, 8, 0, 0)
    );
}
