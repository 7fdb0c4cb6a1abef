//! Scheduling core of the alarm clock.
//!
//! Everything in here is hardware-free `no_std` code: the civil timestamp, the
//! alarm set with its single-ringer invariant, the per-tick scheduling state
//! machine and the sync merge. The firmware tasks in `src/task/` drive this
//! from the RP2040 peripherals; the tests under `tests/` drive it from the
//! host.
#![no_std]

pub mod schedule;
pub mod scheduler;
pub mod timestamp;

pub use schedule::{
    build_alarm_set, AlarmItem, AlarmSet, SyncOutcome, SyncRecord, MAX_ALARMS, MAX_SYNC_RECORDS,
};
pub use scheduler::{RingDevice, Scheduler, SchedulerConfig};
pub use timestamp::{ClockReading, Timestamp};
