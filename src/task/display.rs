//! # Display task
//! This module contains the task that shows the clock and schedule state on
//! the OLED display.
//!
//! The control loop publishes a snapshot after every tick and signals this
//! task; drawing happens entirely here so the tick path never waits on I2C.

use core::fmt::Write;

use defmt::{error, info};
use embassy_rp::i2c::{Config, I2c};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::mutex::Mutex;
use embassy_sync::signal::Signal;
use embedded_graphics::{
    mono_font::{
        ascii::{FONT_6X13, FONT_9X18_BOLD},
        MonoTextStyleBuilder,
    },
    pixelcolor::BinaryColor,
    prelude::*,
    text::{Baseline, Text},
};
use heapless::String;
use ssd1306_async::{prelude::*, I2CDisplayInterface, Ssd1306};

use pico_sync_alarmclock::{ClockReading, Scheduler, Timestamp};

use crate::task::resources::{DisplayResources, Irqs};

/// What the display shows; captured from the scheduler once per tick.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct DisplaySnapshot {
    pub time: Timestamp,
    pub time_valid: bool,
    pub ringing: bool,
    pub active_alarms: usize,
    pub total_alarms: usize,
    /// Hour and minute of the earliest pending alarm, if any.
    pub next_fire: Option<(u8, u8)>,
}

impl DisplaySnapshot {
    pub fn capture(scheduler: &Scheduler, reading: ClockReading) -> Self {
        let alarms = scheduler.alarms();
        Self {
            time: reading.time,
            time_valid: reading.valid,
            ringing: alarms.ringing_item().is_some(),
            active_alarms: alarms.active_count(),
            total_alarms: alarms.len(),
            next_fire: alarms
                .next_pending()
                .map(|item| (item.fire_time.hour, item.fire_time.minute)),
        }
    }
}

/// The latest snapshot, written by the control loop, read here.
static DISPLAY_STATE: Mutex<CriticalSectionRawMutex, Option<DisplaySnapshot>> = Mutex::new(None);

/// Redraw command for the display task.
static DISPLAY_SIGNAL: Signal<CriticalSectionRawMutex, ()> = Signal::new();

/// Stores a fresh snapshot and wakes the display task.
pub async fn publish_display_state(snapshot: DisplaySnapshot) {
    *(DISPLAY_STATE.lock().await) = Some(snapshot);
    DISPLAY_SIGNAL.signal(());
}

#[embassy_executor::task]
pub async fn display(r: DisplayResources) {
    info!("Display task started");

    let mut config = Config::default();
    config.frequency = 400_000;
    let i2c = I2c::new_async(r.i2c0, r.scl, r.sda, Irqs, config);

    let interface = I2CDisplayInterface::new(i2c);
    let mut display = Ssd1306::new(interface, DisplaySize128x64, DisplayRotation::Rotate0)
        .into_buffered_graphics_mode();
    match display.init().await {
        Ok(_) => {}
        Err(e) => {
            error!("Failed to initialize display: {}", defmt::Debug2Format(&e));
            return;
        }
    }

    display.set_brightness(Brightness::DIM).await.unwrap();

    let time_style = MonoTextStyleBuilder::new()
        .font(&FONT_9X18_BOLD)
        .text_color(BinaryColor::On)
        .build();
    let text_style = MonoTextStyleBuilder::new()
        .font(&FONT_6X13)
        .text_color(BinaryColor::On)
        .build();

    loop {
        // Wait for a signal to update the display
        DISPLAY_SIGNAL.wait().await;

        // get the snapshot out of the mutex and quickly drop the mutex
        let state_guard = DISPLAY_STATE.lock().await;
        let Some(snapshot) = *state_guard else {
            continue;
        };
        drop(state_guard);

        // prepare the display, note that nothing is sent to the display before flush()
        display.clear();

        // the time, or a placeholder while the RTC is not running yet
        let mut time_line: String<16> = String::new();
        if snapshot.time_valid {
            let _ = write!(
                time_line,
                "{:02}:{:02}:{:02}",
                snapshot.time.hour, snapshot.time.minute, snapshot.time.second
            );
        } else {
            let _ = write!(time_line, "--:--:--");
        }
        Text::with_baseline(&time_line, Point::new(28, 8), time_style, Baseline::Top)
            .draw(&mut display)
            .unwrap();

        // the schedule state
        let mut alarm_line: String<24> = String::new();
        let _ = write!(
            alarm_line,
            "alarms {}/{}",
            snapshot.active_alarms, snapshot.total_alarms
        );
        Text::with_baseline(&alarm_line, Point::new(0, 32), text_style, Baseline::Top)
            .draw(&mut display)
            .unwrap();

        // ringing beats "next alarm" on the bottom line
        let mut status_line: String<24> = String::new();
        if snapshot.ringing {
            let _ = write!(status_line, "RINGING");
        } else if let Some((hour, minute)) = snapshot.next_fire {
            let _ = write!(status_line, "next {:02}:{:02}", hour, minute);
        }
        Text::with_baseline(&status_line, Point::new(0, 48), text_style, Baseline::Top)
            .draw(&mut display)
            .unwrap();

        // finally: send the display buffer to the display
        display.flush().await.unwrap();
        // and we are done for this cycle
    }
}
