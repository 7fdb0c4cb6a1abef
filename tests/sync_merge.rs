//! Host-side tests for sync-batch ingestion: record validation, fire-time
//! computation relative to "now", and wholesale set replacement.

use heapless::Vec;
use pico_sync_alarmclock::{
    build_alarm_set, ClockReading, RingDevice, Scheduler, SchedulerConfig, SyncRecord, Timestamp,
    MAX_ALARMS, MAX_SYNC_RECORDS,
};

#[derive(Default)]
struct FakeRing {
    starts: u32,
    stops: u32,
}

impl RingDevice for FakeRing {
    fn start(&mut self) -> bool {
        self.starts += 1;
        true
    }

    fn stop(&mut self) -> bool {
        self.stops += 1;
        true
    }
}

#[test]
fn future_time_fires_today() {
    let now = Timestamp::new(2024, 1, 1, 7, 0, 0);
    let (set, outcome) = build_alarm_set(&[SyncRecord::new(7, 30, "a", true)], now);

    assert_eq!(outcome.accepted, 1);
    assert_eq!(outcome.skipped, 0);
    let item = set.get(0).unwrap();
    assert_eq!(item.fire_time, Timestamp::new(2024, 1, 1, 7, 30, 0));
    assert_eq!(item.id.as_str(), "a");
    assert!(item.active);
    assert!(!item.has_rung);
    assert!(!item.is_ringing);
}

#[test]
fn past_time_rolls_to_tomorrow() {
    let now = Timestamp::new(2024, 1, 1, 7, 0, 0);
    let (set, _) = build_alarm_set(&[SyncRecord::new(6, 0, "a", true)], now);
    assert_eq!(set.get(0).unwrap().fire_time, Timestamp::new(2024, 1, 2, 6, 0, 0));
}

#[test]
fn current_minute_rolls_to_tomorrow() {
    // hh:mm:00 is not after now when now is inside that minute
    let now = Timestamp::new(2024, 1, 1, 7, 0, 30);
    let (set, _) = build_alarm_set(&[SyncRecord::new(7, 0, "a", true)], now);
    assert_eq!(set.get(0).unwrap().fire_time, Timestamp::new(2024, 1, 2, 7, 0, 0));
}

#[test]
fn malformed_records_are_skipped_and_counted() {
    let now = Timestamp::new(2024, 1, 1, 0, 0, 0);
    let records = [
        SyncRecord::new(7, 30, "good", true),
        SyncRecord::new(24, 0, "hour-range", true),
        SyncRecord::new(0, 60, "minute-range", true),
        SyncRecord {
            hour: Some(8),
            minute: Some(0),
            id: None,
            active: Some(true),
        },
        SyncRecord {
            hour: Some(8),
            minute: Some(0),
            id: "no-active".try_into().ok(),
            active: None,
        },
        SyncRecord::new(9, 15, "also-good", false),
    ];
    let (set, outcome) = build_alarm_set(&records, now);

    assert_eq!(outcome.accepted, 2);
    assert_eq!(outcome.skipped, 4);
    assert_eq!(set.len(), 2);
    assert_eq!(set.get(0).unwrap().id.as_str(), "good");
    assert_eq!(set.get(1).unwrap().id.as_str(), "also-good");
}

#[test]
fn overflowing_batch_is_truncated_and_counted() {
    let now = Timestamp::new(2024, 1, 1, 0, 0, 0);
    let records: std::vec::Vec<SyncRecord> = (0..MAX_ALARMS + 2)
        .map(|i| SyncRecord::new(10, (i % 60) as u8, "x", true))
        .collect();
    let (set, outcome) = build_alarm_set(&records, now);

    assert_eq!(set.len(), MAX_ALARMS);
    assert_eq!(outcome.accepted, MAX_ALARMS);
    assert_eq!(outcome.skipped, 2);
}

#[test]
fn replacement_stops_the_current_ring_first() {
    let mut scheduler = Scheduler::new(SchedulerConfig {
        bootstrap_offset_secs: None,
        ..SchedulerConfig::default()
    });
    let mut ring = FakeRing::default();
    let now = Timestamp::new(2024, 1, 1, 0, 0, 0);
    scheduler.apply_sync(&[SyncRecord::new(10, 0, "a", true)], now, &mut ring);

    scheduler.tick(
        ClockReading::valid(Timestamp::new(2024, 1, 1, 10, 0, 0)),
        false,
        0,
        &mut ring,
    );
    assert!(scheduler.alarms().ringing_item().is_some());

    // mid-ring replacement: the device is stopped, nothing in the new set rings
    let now = Timestamp::new(2024, 1, 1, 10, 0, 5);
    scheduler.apply_sync(&[SyncRecord::new(11, 0, "b", true)], now, &mut ring);
    assert_eq!(ring.stops, 1);
    assert!(scheduler.alarms().ringing_item().is_none());
    assert!(scheduler.alarms().iter().all(|item| !item.is_ringing));
    assert!(scheduler.alarms().iter().all(|item| !item.has_rung));
}

#[test]
fn replacement_with_nothing_ringing_touches_no_device() {
    let mut scheduler = Scheduler::new(SchedulerConfig {
        bootstrap_offset_secs: None,
        ..SchedulerConfig::default()
    });
    let mut ring = FakeRing::default();
    let now = Timestamp::new(2024, 1, 1, 0, 0, 0);

    scheduler.apply_sync(&[SyncRecord::new(10, 0, "a", true)], now, &mut ring);
    scheduler.apply_sync(&[SyncRecord::new(11, 0, "b", true)], now, &mut ring);
    assert_eq!(ring.stops, 0);
}

#[test]
fn records_parse_from_json() {
    let body = br#"[{"hour":7,"minute":30,"id":"a","active":true},{"hour":22,"minute":5,"id":"b","active":false}]"#;
    let (records, _) =
        serde_json_core::de::from_slice::<Vec<SyncRecord, MAX_ALARMS>>(body).unwrap();

    let now = Timestamp::new(2024, 1, 1, 0, 0, 0);
    let (set, outcome) = build_alarm_set(&records, now);
    assert_eq!(outcome.accepted, 2);
    assert_eq!(set.get(0).unwrap().fire_time, Timestamp::new(2024, 1, 1, 7, 30, 0));
    assert!(!set.get(1).unwrap().active);
}

#[test]
fn oversized_document_parses_and_surplus_is_skipped() {
    // one record more than the alarm set holds, as the firmware receives it:
    // the wire capacity is larger, so the parse succeeds and the merge does
    // the truncation and counting
    let mut body = String::from("[");
    for i in 0..MAX_ALARMS + 1 {
        if i > 0 {
            body.push(',');
        }
        body.push_str(&format!(
            r#"{{"hour":10,"minute":{},"id":"r{}","active":true}}"#,
            i % 60,
            i
        ));
    }
    body.push(']');

    let (records, _) =
        serde_json_core::de::from_slice::<Vec<SyncRecord, MAX_SYNC_RECORDS>>(body.as_bytes())
            .expect("oversized document must still parse");
    assert_eq!(records.len(), MAX_ALARMS + 1);

    let (set, outcome) = build_alarm_set(&records, Timestamp::new(2024, 1, 1, 0, 0, 0));
    assert_eq!(set.len(), MAX_ALARMS);
    assert_eq!(outcome.accepted, MAX_ALARMS);
    assert_eq!(outcome.skipped, 1);
    // the first records survive, the surplus tail is dropped
    assert_eq!(set.get(0).unwrap().id.as_str(), "r0");
}

#[test]
fn missing_fields_parse_but_fail_validation() {
    // a record without an id parses (all fields are optional on the wire) and
    // is then rejected during the merge
    let body = br#"[{"hour":7,"minute":30,"active":true}]"#;
    let (records, _) =
        serde_json_core::de::from_slice::<Vec<SyncRecord, MAX_ALARMS>>(body).unwrap();

    let (set, outcome) = build_alarm_set(&records, Timestamp::new(2024, 1, 1, 0, 0, 0));
    assert!(set.is_empty());
    assert_eq!(outcome.skipped, 1);
}
