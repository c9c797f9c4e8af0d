//! # openDAQ-Core
//! This library provides the shared protocol and numeric pieces for talking to openDAQ
//! data acquisition instruments. It is used by opendaq-rs.
//! ## Features
//! - Building and validating command frames in the [frame] module
//! - Sending commands over a lossy serial link with retries in the [transport] module
//! - Converting between raw ADC/DAC codes and physical units in the [convert] module
//! - Handling shared device errors in the [error] module
pub mod convert;
pub mod error;
pub mod frame;
#[cfg(any(test, feature = "mock"))]
pub mod mock;
pub mod transport;
