//! Vial keyboard driver
//!
//! Front-end support shared by the `vial_driver` binary: the configuration
//! file and the text forms used on the command line. The protocol itself
//! lives in the `vial-keyboard` and `vial-transport` crates.

pub mod config;
pub mod format;

pub use config::{ConfigError, DriverConfig};
