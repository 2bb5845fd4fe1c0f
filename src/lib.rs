//! Direct console user interface for Proxmox VE hosts: host identity while idle, a
//! credential gate, and a fixed menu of host actions.

pub mod checks;
pub mod config;
pub mod core;
pub mod host_info;
pub mod input;
pub mod launcher;
pub mod logging;
pub mod status;
pub mod ui;
