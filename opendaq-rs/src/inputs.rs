//! Analog input types shared between hardware models.
//!
//! A model lists one [InputType] per input channel. The type carries the ADC
//! parameters, the amplifier gain table, and the units the channel can be read in.

use opendaq_core::convert::{Adc, Calib};
use opendaq_core::error::DeviceError;

/// One way of interpreting the voltage at an input.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct InputMode {
    pub unit: &'static str,
    /// Applied to the measured voltage, e.g. the shunt factor for a current reading.
    pub scale: f64,
}

pub const VOLTS: InputMode = InputMode {
    unit: "V",
    scale: 1.0,
};
/// 4-20 mA loop current measured across a 100 ohm shunt.
pub const MILLIAMPS: InputMode = InputMode {
    unit: "mA",
    scale: 10.0,
};
pub const OHMS: InputMode = InputMode {
    unit: "ohm",
    scale: 1.0,
};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct InputType {
    pub name: &'static str,
    pub adc: Adc<'static>,
    /// Reading modes, indexed by mode number.
    pub modes: &'static [InputMode],
}

/// A converted reading and its unit.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Reading {
    pub value: f64,
    pub unit: &'static str,
}

impl InputType {
    pub fn mode(&self, mode: u8) -> Result<&InputMode, DeviceError> {
        self.modes
            .get(usize::from(mode))
            .ok_or(DeviceError::InvalidInputMode(mode))
    }

    /// Converts a raw ADC value using the unit of the given reading mode.
    ///
    /// `first` is the pre-amplifier calibration and `second` the post-amplifier one.
    pub fn raw_to_units(
        &self,
        raw: i64,
        gain_id: u8,
        mode: u8,
        first: Calib,
        second: Calib,
    ) -> Result<Reading, DeviceError> {
        let mode = self.mode(mode)?;
        let volts = self.adc.to_volts(raw, gain_id, first, second)?;
        Ok(Reading {
            value: volts * mode.scale,
            unit: mode.unit,
        })
    }
}

const GAINS_X32: &[f64] = &[1.0, 2.0, 4.0, 5.0, 8.0, 10.0, 16.0, 32.0];

pub const INPUT_A: InputType = InputType {
    name: "INPUT_TYPE_A",
    adc: Adc {
        bits: 16,
        signed: true,
        invert: false,
        vmin: -24.0,
        vmax: 24.0,
        gains: GAINS_X32,
    },
    modes: &[VOLTS],
};

/// Like [INPUT_A] with a switchable shunt for loop current.
pub const INPUT_AS: InputType = InputType {
    name: "INPUT_TYPE_AS",
    adc: Adc {
        bits: 16,
        signed: true,
        invert: false,
        vmin: -24.0,
        vmax: 24.0,
        gains: GAINS_X32,
    },
    modes: &[VOLTS, MILLIAMPS],
};

pub const INPUT_M: InputType = InputType {
    name: "INPUT_TYPE_M",
    adc: Adc {
        bits: 16,
        signed: true,
        invert: false,
        vmin: -4.096,
        vmax: 4.096,
        gains: &[1.0 / 3.0, 1.0, 2.0, 10.0, 100.0],
    },
    modes: &[VOLTS],
};

pub const INPUT_S: InputType = InputType {
    name: "INPUT_TYPE_S",
    adc: Adc {
        bits: 16,
        signed: true,
        invert: false,
        vmin: -12.0,
        vmax: 12.0,
        gains: &[1.0, 2.0, 4.0, 5.0, 8.0, 10.0, 16.0, 20.0],
    },
    modes: &[VOLTS],
};

pub const INPUT_N: InputType = InputType {
    name: "INPUT_TYPE_N",
    adc: Adc {
        bits: 16,
        signed: true,
        invert: false,
        vmin: -12.288,
        vmax: 12.288,
        gains: GAINS_X32,
    },
    modes: &[VOLTS],
};

/// Resistance input (PT100 style probes).
pub const INPUT_P: InputType = InputType {
    name: "INPUT_TYPE_P",
    adc: Adc {
        bits: 16,
        signed: true,
        invert: false,
        vmin: -24.0,
        vmax: 24.0,
        gains: GAINS_X32,
    },
    modes: &[OHMS],
};
