//! Capability module interface.
//!
//! This module contains the traits hardware drivers implement and the
//! error type shared by every driver.

pub mod driver;
