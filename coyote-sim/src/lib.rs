//! # coyote-sim: simulated Coyote appliance
//!
//! Speaks the device side of the control protocol over TCP so the
//! `coyote-core` client can be exercised without hardware. The simulated
//! unit keeps a preset playlist, per-channel playback, a disk list and a
//! hardware mode, and answers with the appliance's status codes.

pub mod config;
pub mod device;
pub mod server;
