//! Firmware tasks of the alarm clock.
//!
//! Each peripheral concern runs as its own embassy task; the control loop in
//! [`control`] owns the scheduling core and the others feed it through
//! signals, channels and one atomic flag.

pub mod buttons;
pub mod control;
pub mod display;
pub mod net_sync;
pub mod resources;
pub mod sound;
