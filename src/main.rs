// we are in an environment with constrained resources, so we do not use the standard library and we define a different entry point.
#![no_std]
#![no_main]

use defmt::info;
use embassy_executor::Spawner;
use {defmt_rtt as _, panic_probe as _}; // global logger and panic handler

#[allow(unused_imports)]
use crate::task::resources::*; // resource structs; `split_resources!` is exported at the crate root

// firmware tasks (submodule of src)
mod task;

// Entry point
#[embassy_executor::main]
async fn main(spawner: Spawner) {
    info!("Program start");

    // Initialize the peripherals for the RP2040 and group them per task
    let p = embassy_rp::init(Default::default());
    let r = split_resources!(p);

    // buttons: stop press into the control loop, volume steps into the sound task
    info!("init buttons");
    spawner
        .spawn(task::buttons::stop_button(r.stop_btn))
        .unwrap();
    spawner
        .spawn(task::buttons::volume_up_button(r.vol_up_btn))
        .unwrap();
    spawner
        .spawn(task::buttons::volume_down_button(r.vol_down_btn))
        .unwrap();

    // sound, rings the DFPlayer when signaled
    info!("init sound");
    spawner.spawn(task::sound::sound_handler(r.dfplayer)).unwrap();

    // display, redraws when signaled
    info!("init display");
    spawner.spawn(task::display::display(r.display)).unwrap();

    // network: RTC time sync and alarm batch fetch
    info!("init net sync");
    spawner
        .spawn(task::net_sync::net_sync(spawner, r.wifi, r.rtc))
        .unwrap();

    // the control loop owning the scheduler
    info!("init control loop");
    spawner.spawn(task::control::control_loop()).unwrap();
}
