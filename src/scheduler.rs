//! # Alarm scheduler
//! This module contains the per-tick state machine that decides when an alarm
//! starts ringing, how long it rings, and how it is stopped.
//!
//! A single logical thread of control drives everything: the owning task calls
//! [`Scheduler::tick`] about once per second and [`Scheduler::apply_sync`]
//! between ticks when a new alarm batch has arrived. The debounce timer is an
//! explicit field on the scheduler, updated per call, so no state hides in
//! function-local statics.

use crate::schedule::{build_alarm_set, AlarmItem, AlarmSet, SyncOutcome, SyncRecord};
use crate::timestamp::{ClockReading, Timestamp};

/// Tolerance after the exact fire time during which a late tick still counts
/// as on-time firing. The tick period is ~1 s, so this window guarantees a
/// fire is not missed due to scheduling slip.
pub const RING_WINDOW_SECS: u32 = 10;

/// How long an unattended alarm rings before it is cut off.
pub const MAX_RING_SECS: u32 = 60;

/// Minimum elapsed time between accepted stop-button actions.
pub const STOP_DEBOUNCE_MS: u64 = 500;

/// Offset of the self-test alarm inserted at startup.
pub const BOOTSTRAP_OFFSET_SECS: u32 = 15;

/// The sound device the scheduler rings.
///
/// Both operations are idempotent; the return value reports success so a
/// device fault can be counted, but the scheduler never blocks on it — ringing
/// state transitions regardless so the schedule cannot wedge.
pub trait RingDevice {
    fn start(&mut self) -> bool;
    fn stop(&mut self) -> bool;
}

/// Tunables of the scheduler. The defaults match the deployed device.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SchedulerConfig {
    /// Seconds an alarm may ring before the automatic cut-off.
    pub max_ring_secs: u32,
    /// Late-tick tolerance for the fire condition.
    pub ring_window_secs: u32,
    /// Debounce interval for the stop input.
    pub stop_debounce_ms: u64,
    /// Self-test alarm offset at startup; `None` disables the bootstrap alarm.
    pub bootstrap_offset_secs: Option<u32>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_ring_secs: MAX_RING_SECS,
            ring_window_secs: RING_WINDOW_SECS,
            stop_debounce_ms: STOP_DEBOUNCE_MS,
            bootstrap_offset_secs: Some(BOOTSTRAP_OFFSET_SECS),
        }
    }
}

/// The alarm firing state machine.
pub struct Scheduler {
    alarms: AlarmSet,
    config: SchedulerConfig,
    /// Uptime of the last accepted stop action; `None` until the first one.
    last_stop_accept_ms: Option<u64>,
    /// Count of failed ring device start/stop calls.
    device_faults: u32,
}

impl Scheduler {
    pub fn new(config: SchedulerConfig) -> Self {
        Self {
            alarms: AlarmSet::new(),
            config,
            last_stop_accept_ms: None,
            device_faults: 0,
        }
    }

    pub fn alarms(&self) -> &AlarmSet {
        &self.alarms
    }

    /// Failed ring device calls so far. Non-fatal, surfaced for diagnostics.
    pub fn device_faults(&self) -> u32 {
        self.device_faults
    }

    /// Insert the startup self-test alarm, if configured. Call once, with a
    /// valid clock reading.
    pub fn bootstrap(&mut self, reading: ClockReading) {
        let Some(offset) = self.config.bootstrap_offset_secs else {
            return;
        };
        if !reading.valid {
            return;
        }
        let fire_time = reading.time.add_secs(offset);
        #[cfg(feature = "defmt")]
        defmt::info!(
            "bootstrap alarm set for {:02}:{:02}:{:02}",
            fire_time.hour,
            fire_time.minute,
            fire_time.second
        );
        let _ = self.alarms.push(AlarmItem::new(fire_time));
    }

    /// Append one alarm outside a sync batch. Rejected when the set is full.
    pub fn push_alarm(&mut self, item: AlarmItem) -> Result<(), AlarmItem> {
        self.alarms.push(item)
    }

    /// One iteration of the control loop.
    ///
    /// `stop_pressed` is the debounced-at-the-edge stop input sampled this
    /// tick, `uptime_ms` a monotonic millisecond counter for the action
    /// debounce. The stop input is handled before the scan, in a fixed order,
    /// so at most one net effect per item per tick is possible.
    pub fn tick<R: RingDevice>(
        &mut self,
        reading: ClockReading,
        stop_pressed: bool,
        uptime_ms: u64,
        ring: &mut R,
    ) {
        self.handle_stop_input(stop_pressed, uptime_ms, ring);

        // A bogus timestamp must not produce false fires; the stop input above
        // still works so a stuck ring can always be silenced.
        if !reading.valid {
            #[cfg(feature = "defmt")]
            defmt::warn!("clock reading invalid, skipping alarm scan");
            return;
        }

        self.scan(reading.time, ring);
    }

    /// Replace the whole alarm set from a sync batch.
    ///
    /// Whatever is ringing is stopped first, so the sound device is never left
    /// running with no owning item. Fresh items start with no ring history.
    pub fn apply_sync<R: RingDevice>(
        &mut self,
        records: &[SyncRecord],
        now: Timestamp,
        ring: &mut R,
    ) -> SyncOutcome {
        self.turn_off_alarm(ring);
        let (set, outcome) = build_alarm_set(records, now);
        self.alarms = set;
        #[cfg(feature = "defmt")]
        defmt::info!(
            "alarm sync applied: {} accepted, {} skipped",
            outcome.accepted,
            outcome.skipped
        );
        outcome
    }

    /// Stop the currently-ringing alarm, if any. Returns whether anything was
    /// stopped. This is also the stop-button action.
    pub fn turn_off_alarm<R: RingDevice>(&mut self, ring: &mut R) -> bool {
        match self.alarms.ringing {
            Some(idx) => {
                self.stop_alarm(idx, ring);
                true
            }
            None => false,
        }
    }

    fn handle_stop_input<R: RingDevice>(&mut self, pressed: bool, uptime_ms: u64, ring: &mut R) {
        if !pressed {
            return;
        }
        if let Some(last) = self.last_stop_accept_ms {
            if uptime_ms.saturating_sub(last) < self.config.stop_debounce_ms {
                return;
            }
        }
        // Only arm the debounce timer when the press actually stopped
        // something; a no-op press must not consume the debounce window.
        if self.turn_off_alarm(ring) {
            self.last_stop_accept_ms = Some(uptime_ms);
        }
    }

    /// The fire/timeout scan over the full set. Conditions per item are
    /// evaluated in priority order; the first match wins.
    fn scan<R: RingDevice>(&mut self, now: Timestamp, ring: &mut R) {
        for idx in 0..self.alarms.items.len() {
            let (fire_time, active, has_rung, is_ringing) = {
                let Some(item) = self.alarms.items.get(idx) else {
                    break;
                };
                (item.fire_time, item.active, item.has_rung, item.is_ringing)
            };
            let window_end = fire_time.add_secs(self.config.ring_window_secs);
            let ring_deadline = fire_time.add_secs(self.config.max_ring_secs);

            if active && !has_rung && !is_ringing && now >= fire_time && now <= window_end {
                self.run_alarm(idx, ring);
            } else if is_ringing && now >= ring_deadline {
                self.stop_alarm(idx, ring);
            } else if now == ring_deadline {
                // Desync sweep: an item flagged ringing without owning the
                // ring still gets cut off here; anything else is a no-op.
                self.stop_alarm(idx, ring);
            }
        }
    }

    /// Promote one item to ringing, keeping the single-ringer invariant.
    fn run_alarm<R: RingDevice>(&mut self, idx: usize, ring: &mut R) {
        // At most one ringer globally.
        self.turn_off_alarm(ring);

        let Some(item) = self.alarms.items.get_mut(idx) else {
            return;
        };
        // Re-check after the turn-off above mutated the set.
        if item.has_rung || item.is_ringing {
            return;
        }
        item.has_rung = true;
        item.is_ringing = true;
        self.alarms.ringing = Some(idx);
        #[cfg(feature = "defmt")]
        defmt::info!("alarm {} ringing", idx);
        if !ring.start() {
            self.device_faults += 1;
            #[cfg(feature = "defmt")]
            defmt::warn!("ring device failed to start");
        }
    }

    /// Silence one item. Idempotent for the item itself, and a no-op for an
    /// item with no claim on the ring: when an expired item's deadline second
    /// comes around again while a different item rings, touching the ringer
    /// index or the device here would orphan that live ring.
    fn stop_alarm<R: RingDevice>(&mut self, idx: usize, ring: &mut R) {
        let owns_ring = self.alarms.ringing == Some(idx);
        let flagged = self
            .alarms
            .items
            .get(idx)
            .is_some_and(|item| item.is_ringing);
        if !owns_ring && !flagged {
            return;
        }
        #[cfg(feature = "defmt")]
        if owns_ring != flagged {
            defmt::warn!("ring state desynced on alarm {}", idx);
        }
        if owns_ring {
            self.alarms.ringing = None;
        }
        if let Some(item) = self.alarms.items.get_mut(idx) {
            item.is_ringing = false;
        }
        if !ring.stop() {
            self.device_faults += 1;
            #[cfg(feature = "defmt")]
            defmt::warn!("ring device failed to stop");
        }
    }
}
