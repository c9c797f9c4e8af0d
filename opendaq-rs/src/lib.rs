//! # openDAQ-rs
//! This library provides a platform independent rust driver for openDAQ data acquisition
//! instruments and the EM08/TP04 industrial modules built on the same firmware.
//! Readings and output values are converted between raw codes and physical units using
//! the calibration stored on each instrument.
//! ## Quick start
//! ```no_run
//! use opendaq_rs::device::{Color, Device};
//!
//! let daq = Device::open("/dev/ttyUSB0").unwrap();
//! println!("connected to {}", daq.features().name);
//! daq.set_indicator(1, Color::Green).unwrap();
//! daq.configure_input(1, 0, 1, 20).unwrap();
//! println!("input 1: {} V", daq.read_physical().unwrap());
//! ```
//! ## Testing
//! Most tests run against a scripted transport and need no hardware. The tests in
//! `tests/hardware.rs` talk to a real instrument and are ignored by default. Set
//! `OPENDAQ_PORT` to the serial port and run them with `cargo test -- --ignored`.

pub mod calibration;
pub mod config;
pub mod device;
pub mod inputs;
pub mod models;
pub mod outputs;

pub use opendaq_core::{convert, error, frame, transport};
pub use serialport;
