//! # Alarm schedule data
//! This module contains the alarm set and the sync-record ingestion that
//! rebuilds it from a remote batch.
//!
//! The set owns its items in a fixed-capacity vector; the "currently ringing"
//! reference is a plain index into that vector, never a pointer, because the
//! whole set gets replaced wholesale on every sync.

use heapless::{String, Vec};
use serde::Deserialize;

use crate::timestamp::Timestamp;

/// Capacity of the alarm set. A sync batch larger than this has its surplus
/// records skipped and counted.
pub const MAX_ALARMS: usize = 16;

/// Wire-side capacity for one sync document. Larger than [`MAX_ALARMS`] so an
/// over-capacity document still parses and the merge gets to skip and count
/// the surplus instead of the whole batch failing at the deserializer.
pub const MAX_SYNC_RECORDS: usize = 2 * MAX_ALARMS;

/// Capacity of an externally-assigned alarm id.
pub const MAX_ID_LEN: usize = 24;

/// Externally-assigned alarm identifier. Unique within one sync batch only.
pub type AlarmId = String<MAX_ID_LEN>;

/// One schedulable alarm occurrence.
///
/// `has_rung` and `is_ringing` are independent: an item that rang and was
/// stopped keeps `has_rung = true` with `is_ringing = false` and never fires
/// again until the whole set is replaced.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct AlarmItem {
    /// When the alarm should start ringing.
    pub fire_time: Timestamp,
    /// Identifier assigned by the remote store; empty for the bootstrap alarm.
    pub id: AlarmId,
    /// An inactive item is never evaluated for firing.
    pub active: bool,
    /// Set once the item has started ringing; prevents re-firing.
    pub has_rung: bool,
    /// Set while this item is the one producing sound.
    pub is_ringing: bool,
}

impl AlarmItem {
    /// A fresh active item with no ring history.
    pub fn new(fire_time: Timestamp) -> Self {
        Self {
            fire_time,
            id: AlarmId::new(),
            active: true,
            has_rung: false,
            is_ringing: false,
        }
    }

    fn from_parts(fire_time: Timestamp, id: AlarmId, active: bool) -> Self {
        Self {
            fire_time,
            id,
            active,
            has_rung: false,
            is_ringing: false,
        }
    }
}

/// The live, atomically-replaceable collection of alarms plus the
/// single-ringer index.
#[derive(Clone, Default, Debug)]
pub struct AlarmSet {
    pub(crate) items: Vec<AlarmItem, MAX_ALARMS>,
    /// Index of the one currently-ringing item, if any.
    pub(crate) ringing: Option<usize>,
}

impl AlarmSet {
    pub fn new() -> Self {
        Self {
            items: Vec::new(),
            ringing: None,
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> core::slice::Iter<'_, AlarmItem> {
        self.items.iter()
    }

    pub fn get(&self, idx: usize) -> Option<&AlarmItem> {
        self.items.get(idx)
    }

    /// The currently-ringing item, if any.
    pub fn ringing_item(&self) -> Option<&AlarmItem> {
        self.ringing.and_then(|idx| self.items.get(idx))
    }

    /// Append an item, rejecting it when the set is full.
    pub fn push(&mut self, item: AlarmItem) -> Result<(), AlarmItem> {
        self.items.push(item)
    }

    /// Number of active items, for the display.
    pub fn active_count(&self) -> usize {
        self.items.iter().filter(|item| item.active).count()
    }

    /// The earliest active item that has not rung yet, for the display.
    pub fn next_pending(&self) -> Option<&AlarmItem> {
        self.items
            .iter()
            .filter(|item| item.active && !item.has_rung)
            .min_by_key(|item| item.fire_time)
    }
}

/// One alarm definition as delivered by the remote store.
///
/// Every field is optional at the wire level so that a single malformed record
/// can be rejected during validation instead of failing the whole batch.
/// Unknown fields are ignored by the deserializer.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct SyncRecord {
    #[serde(default)]
    pub hour: Option<u8>,
    #[serde(default)]
    pub minute: Option<u8>,
    #[serde(default)]
    pub id: Option<AlarmId>,
    #[serde(default)]
    pub active: Option<bool>,
}

impl SyncRecord {
    /// A fully-populated record, mostly useful in tests.
    pub fn new(hour: u8, minute: u8, id: &str, active: bool) -> Self {
        Self {
            hour: Some(hour),
            minute: Some(minute),
            id: AlarmId::try_from(id).ok(),
            active: Some(active),
        }
    }

    /// Validate the record and compute its concrete fire time relative to
    /// `now`. A time already past rolls over to tomorrow.
    fn into_item(self, now: Timestamp) -> Option<AlarmItem> {
        let hour = self.hour.filter(|h| *h <= 23)?;
        let minute = self.minute.filter(|m| *m <= 59)?;
        let id = self.id?;
        let active = self.active?;

        let mut fire_time = now.at_time(hour, minute);
        if fire_time <= now {
            fire_time = fire_time.next_day();
        }
        Some(AlarmItem::from_parts(fire_time, id, active))
    }
}

/// Result of merging one sync batch.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SyncOutcome {
    /// Records that made it into the new set.
    pub accepted: usize,
    /// Records rejected as malformed, out of range or over capacity.
    pub skipped: usize,
}

/// Build a fresh alarm set from a sync batch. Fresh items start with no ring
/// history; malformed records are skipped and counted, never propagated with
/// an undefined fire time.
pub fn build_alarm_set(records: &[SyncRecord], now: Timestamp) -> (AlarmSet, SyncOutcome) {
    let mut set = AlarmSet::new();
    let mut outcome = SyncOutcome {
        accepted: 0,
        skipped: 0,
    };

    for record in records {
        let Some(item) = record.clone().into_item(now) else {
            #[cfg(feature = "defmt")]
            defmt::warn!("skipping malformed sync record");
            outcome.skipped += 1;
            continue;
        };
        match set.push(item) {
            Ok(()) => outcome.accepted += 1,
            Err(_) => {
                #[cfg(feature = "defmt")]
                defmt::warn!("alarm set full, skipping sync record");
                outcome.skipped += 1;
            }
        }
    }

    (set, outcome)
}
