//! # Sound task
//! This module contains the task that plays the alarm sound using the
//! DFPlayer Mini module, and the [`RingDevice`] the scheduler rings.
//!
//! The task is responsible for initializing the DFPlayer, powering it on,
//! playing the alarm track, and powering it off again when the ring stops.

use defmt::{info, Debug2Format};
use dfplayer_async::{DfPlayer, Equalizer, PlayBackSource, TimeSource};
use embassy_futures::select::{select, Either};
use embassy_rp::gpio::{Level, Output};
use embassy_rp::uart::{BufferedUart, Config};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;
use embassy_time::{Delay, Duration, Instant, Timer};
use portable_atomic::{AtomicU8, Ordering};

use pico_sync_alarmclock::RingDevice;

use crate::task::resources::{DfPlayerResources, Irqs};

/// Power-on volume.
const DEFAULT_VOLUME: u8 = 15;

/// Upper bound of the DFPlayer volume range.
const MAX_VOLUME: u8 = 30;

/// Start-ringing command for the sound task.
static SOUND_START_SIGNAL: Signal<CriticalSectionRawMutex, ()> = Signal::new();

/// Stop-ringing command for the sound task.
static SOUND_STOP_SIGNAL: Signal<CriticalSectionRawMutex, ()> = Signal::new();

/// Signals the sound task to start ringing.
pub fn signal_sound_start() {
    SOUND_START_SIGNAL.signal(());
}

/// Signals the sound task to stop ringing.
pub fn signal_sound_stop() {
    SOUND_STOP_SIGNAL.signal(());
}

/// The user-adjustable playback volume, shared with the volume button tasks.
static VOLUME: AtomicU8 = AtomicU8::new(DEFAULT_VOLUME);

/// Wakes the sound task to re-apply the volume mid-ring.
static VOLUME_CHANGED: Signal<CriticalSectionRawMutex, ()> = Signal::new();

/// Steps the volume by `delta`, clamped to the DFPlayer range. Called from the
/// volume button tasks; applied immediately when a ring is in progress,
/// otherwise on the next ring.
pub fn nudge_volume(delta: i8) {
    let current = VOLUME.load(Ordering::Relaxed);
    let stepped = current.saturating_add_signed(delta).min(MAX_VOLUME);
    if stepped != current {
        VOLUME.store(stepped, Ordering::Relaxed);
        info!("volume set to {}", stepped);
        VOLUME_CHANGED.signal(());
    }
}

/// The scheduler's handle on the sound hardware. Signaling cannot fail, so
/// both operations always report success; the sound task deals with a
/// misbehaving DFPlayer on its own.
pub struct SoundRing;

impl RingDevice for SoundRing {
    fn start(&mut self) -> bool {
        signal_sound_start();
        true
    }

    fn stop(&mut self) -> bool {
        signal_sound_stop();
        true
    }
}

// Time source implementation for DFPlayer
struct MyTimeSource;

impl TimeSource for MyTimeSource {
    type Instant = Instant;

    fn now(&self) -> Self::Instant {
        Instant::now()
    }

    fn is_elapsed(&self, since: Self::Instant, timeout_ms: u64) -> bool {
        Instant::now().duration_since(since) >= Duration::from_millis(timeout_ms)
    }
}

#[embassy_executor::task]
pub async fn sound_handler(r: DfPlayerResources) {
    info!("Sound task started");

    let mut config = Config::default();
    config.baudrate = 9600;

    let mut tx_buffer = [0; 256];
    let mut rx_buffer = [0; 256];

    let mut uart = BufferedUart::new(
        r.uart,
        Irqs,
        r.tx_pin,
        r.rx_pin,
        &mut tx_buffer,
        &mut rx_buffer,
        config,
    );

    // power pin, not a part of the dfplayer, using a mosfet to control power to the dfplayer because it draws too much current when idle
    let mut pwr = Output::new(r.power_pin, Level::Low);

    let feedback_enable = false; // fails to acknoweledge when enabled
    let timeout = Duration::from_secs(1);
    let reset_duration_override = Some(Duration::from_millis(1000));

    loop {
        // wait for the signal to start ringing
        SOUND_START_SIGNAL.wait().await;
        // a stale stop from an earlier ring must not cut this one short
        SOUND_STOP_SIGNAL.reset();

        // power on the dfplayer
        info!("Powering on the dfplayer");
        pwr.set_high();
        Timer::after(Duration::from_secs(1)).await;
        info!("Powered on the dfplayer");

        let time_source = MyTimeSource;
        let delay = Delay;
        let mut dfp_result = DfPlayer::new(
            &mut uart,
            feedback_enable,
            timeout.as_millis() as u64,
            time_source,
            delay,
            reset_duration_override.map(|d| d.as_millis() as u64),
        )
        .await;

        match dfp_result {
            Ok(_) => info!("DfPlayer initialized successfully"),
            Err(ref e) => info!(
                "DfPlayer initialization failed with error {:?}",
                Debug2Format(&e)
            ),
        }

        info!("Playing alarm sound");
        if let Ok(ref mut dfp) = dfp_result {
            let _ = dfp.set_volume(VOLUME.load(Ordering::Relaxed)).await;
            Timer::after(Duration::from_millis(100)).await;
            let _ = dfp.set_equalizer(Equalizer::Classic).await;
            Timer::after(Duration::from_millis(100)).await;
            let _ = dfp.set_playback_source(PlayBackSource::SDCard).await;
            Timer::after(Duration::from_millis(100)).await;
            let _ = dfp.play(1).await;
            Timer::after(Duration::from_millis(200)).await;
        } else {
            info!("DfPlayer not initialized, skipping sound playback.");
        }

        // wait for the signal to stop ringing, re-applying the volume when a
        // button changes it mid-ring
        loop {
            match select(SOUND_STOP_SIGNAL.wait(), VOLUME_CHANGED.wait()).await {
                Either::First(()) => break,
                Either::Second(()) => {
                    if let Ok(ref mut dfp) = dfp_result {
                        let _ = dfp.set_volume(VOLUME.load(Ordering::Relaxed)).await;
                    }
                }
            }
        }

        // power off the dfplayer
        info!("Powering off the dfplayer");
        pwr.set_low();
    }
}
