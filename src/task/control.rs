//! # Control loop task
//! This module contains the polling loop that owns the scheduling core.
//!
//! Once per second the loop drains a pending sync batch, reads the RTC,
//! consumes the stop-button flag and runs one scheduler tick. Everything that
//! mutates the alarm set happens here, on this single task, so a tick never
//! observes a partially-replaced set.

use defmt::{info, warn};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use embassy_time::{Duration, Instant, Ticker};
use heapless::Vec;
use portable_atomic::{AtomicBool, Ordering};

use pico_sync_alarmclock::{
    ClockReading, Scheduler, SchedulerConfig, SyncRecord, Timestamp, MAX_SYNC_RECORDS,
};

use crate::task::display::{publish_display_state, DisplaySnapshot};
use crate::task::net_sync::RTC_MUTEX;
use crate::task::sound::SoundRing;

/// One batch of alarm definitions from the remote store. Wire capacity is
/// deliberately larger than the alarm set so surplus records reach the merge
/// and get counted as skipped rather than failing the parse.
pub type SyncBatch = Vec<SyncRecord, MAX_SYNC_RECORDS>;

/// Channel for freshly-fetched sync batches. Capacity 1: the fetcher waits at
/// most one tick for the previous batch to be consumed.
static SYNC_CHANNEL: Channel<CriticalSectionRawMutex, SyncBatch, 1> = Channel::new();

/// Stop-button presses land here and are consumed by the next tick. Any
/// interrupt or task context may set it; only the control loop clears it.
static STOP_PRESSED: AtomicBool = AtomicBool::new(false);

/// Hands a fetched sync batch to the control loop.
pub async fn send_sync_batch(batch: SyncBatch) {
    SYNC_CHANNEL.sender().send(batch).await;
}

/// Records a debounced stop-button press for the next tick.
pub fn report_stop_press() {
    STOP_PRESSED.store(true, Ordering::Relaxed);
}

/// Reads the RTC out of its mutex into a clock reading. An RTC that is not
/// running yet yields an invalid reading; the scheduler will not fire on it.
async fn read_clock() -> ClockReading {
    let rtc_guard = RTC_MUTEX.lock().await;
    let Some(rtc) = rtc_guard.as_ref() else {
        return ClockReading::invalid();
    };
    match rtc.now() {
        Ok(dt) => ClockReading::valid(Timestamp::new(
            dt.year, dt.month, dt.day, dt.hour, dt.minute, dt.second,
        )),
        Err(_) => ClockReading::invalid(),
    }
}

/// This task runs the scheduling state machine. It is the single writer of
/// the alarm set; the button, sound and display tasks only touch it through
/// the flag, the ring signals and the published snapshot.
#[embassy_executor::task]
pub async fn control_loop() {
    info!("Control loop task started");

    let mut scheduler = Scheduler::new(SchedulerConfig::default());
    let mut ring = SoundRing;
    let mut ticker = Ticker::every(Duration::from_secs(1));
    let mut bootstrapped = false;

    loop {
        // a sync batch replaces the whole set, between ticks only
        if let Ok(batch) = SYNC_CHANNEL.try_receive() {
            let reading = read_clock().await;
            if reading.valid {
                let outcome = scheduler.apply_sync(&batch, reading.time, &mut ring);
                info!(
                    "sync batch merged: {} accepted, {} skipped",
                    outcome.accepted, outcome.skipped
                );
            } else {
                // fire times computed against a bogus "today" would be worse
                // than waiting for the next fetch cycle
                warn!("dropping sync batch, clock not valid yet");
            }
        }

        let reading = read_clock().await;

        // one self-test alarm shortly after the clock first becomes valid
        if !bootstrapped && reading.valid {
            scheduler.bootstrap(reading);
            bootstrapped = true;
        }

        let stop_pressed = STOP_PRESSED.swap(false, Ordering::Relaxed);
        scheduler.tick(reading, stop_pressed, Instant::now().as_millis(), &mut ring);

        publish_display_state(DisplaySnapshot::capture(&scheduler, reading)).await;

        ticker.next().await;
    }
}
