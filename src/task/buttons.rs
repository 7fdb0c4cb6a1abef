//! # Button tasks
//! This module contains the tasks for the alarm stop button and the two
//! volume buttons.
//!
//! Buttons are debounced at the edge level here; the 500 ms action debounce
//! (which press actually gets to stop an alarm) lives in the scheduler. A
//! detected stop press only sets an atomic flag that the next control tick
//! consumes, and volume presses step an atomic shared with the sound task,
//! so these tasks never reach into shared scheduling state.

use defmt::info;
use embassy_rp::gpio::{Input, Level, Pull};
use embassy_time::{Duration, Timer};

use crate::task::control::report_stop_press;
use crate::task::resources::{
    StopButtonResources, VolumeDownButtonResources, VolumeUpButtonResources,
};
use crate::task::sound::nudge_volume;

/// Debounced press detector for a push button.
pub struct PushButton<'a> {
    /// The input pin for the button
    input: Input<'a>,
    /// The debounce duration
    debounce_duration: Duration,
}

impl<'a> PushButton<'a> {
    pub fn new(input: Input<'a>) -> Self {
        Self {
            input,
            debounce_duration: Duration::from_millis(80),
        }
    }

    /// Wait for the next stable level change and return the new level. We
    /// determine the input level, then await any edge, then wait for the
    /// debounce duration, then check if the input level has changed. If it
    /// has, we return the new level.
    async fn debounce(&mut self) -> Level {
        loop {
            let l1 = self.input.get_level();

            self.input.wait_for_any_edge().await;

            Timer::after(self.debounce_duration).await;

            let l2 = self.input.get_level();
            if l1 != l2 {
                break l2;
            }
        }
    }
}

/// This task watches the stop button. The button is normally high and goes
/// low when pressed; every debounced press is reported to the control loop.
#[embassy_executor::task]
pub async fn stop_button(r: StopButtonResources) {
    let mut btn = PushButton::new(Input::new(r.button_pin, Pull::Up));
    info!("Stop button task started");

    loop {
        if btn.debounce().await == Level::Low {
            report_stop_press();
        }
    }
}

/// One volume step up per debounced press.
#[embassy_executor::task]
pub async fn volume_up_button(r: VolumeUpButtonResources) {
    let mut btn = PushButton::new(Input::new(r.button_pin, Pull::Up));
    info!("Volume up button task started");

    loop {
        if btn.debounce().await == Level::Low {
            nudge_volume(1);
        }
    }
}

/// One volume step down per debounced press.
#[embassy_executor::task]
pub async fn volume_down_button(r: VolumeDownButtonResources) {
    let mut btn = PushButton::new(Input::new(r.button_pin, Pull::Up));
    info!("Volume down button task started");

    loop {
        if btn.debounce().await == Level::Low {
            nudge_volume(-1);
        }
    }
}
