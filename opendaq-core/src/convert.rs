//! Conversions between physical values and raw converter codes.
//!
//! Output values go through a [Dac], input readings through an [Adc]. Both take
//! the calibration pairs read from the instrument.

use crate::error::DeviceError;

/// A gain and offset correction read from a calibration register.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Calib {
    /// Multiplicative correction, 1.0 means none.
    pub gain: f64,
    /// Additive correction in raw code units.
    pub offset: f64,
}

impl Calib {
    pub const IDENTITY: Self = Self {
        gain: 1.0,
        offset: 0.0,
    };

    pub fn new(gain: f64, offset: f64) -> Self {
        Self { gain, offset }
    }

    /// Decodes the fixed point values stored in a calibration register.
    pub fn from_raw(gain: i16, offset: i16, scale: CalibScale) -> Self {
        Self {
            gain: 1.0 + f64::from(gain) / scale.gain,
            offset: f64::from(offset) / scale.offset,
        }
    }
}

impl Default for Calib {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Divisors turning raw register values into a [Calib].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CalibScale {
    pub gain: f64,
    pub offset: f64,
}

impl CalibScale {
    pub const fn new(gain: f64, offset: f64) -> Self {
        Self { gain, offset }
    }
}

/// Smallest and largest integer representable with `bits` bits.
pub fn bit_range(bits: u32, signed: bool) -> (i64, i64) {
    if signed {
        (-(1_i64 << (bits - 1)), (1_i64 << (bits - 1)) - 1)
    } else {
        (0, (1_i64 << bits) - 1)
    }
}

/// Saturates `value` to the range of a `bits` wide integer.
pub fn clamp(value: i64, bits: u32, signed: bool) -> i64 {
    let (lower, upper) = bit_range(bits, signed);
    value.clamp(lower, upper)
}

// ties go up, -2.5 rounds to -2
fn round(value: f64) -> i64 {
    (value + 0.5).floor() as i64
}

/// Digital-to-analog converter
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Dac {
    pub bits: u32,
    pub signed: bool,
    pub invert: bool,
    pub vmin: f64,
    pub vmax: f64,
}

impl Dac {
    pub fn bit_range(&self) -> (i64, i64) {
        bit_range(self.bits, self.signed)
    }

    pub fn clamp_value(&self, value: i64) -> i64 {
        clamp(value, self.bits, self.signed)
    }

    /// Physical value represented by one code step.
    fn base_gain(&self) -> f64 {
        let (min, max) = self.bit_range();
        let gain = if self.signed {
            self.vmax / (max + 1) as f64
        } else {
            (self.vmax - self.vmin) / (max - min + 1) as f64
        };
        if self.invert { -gain } else { gain }
    }

    /// Converts a physical value to the code to write, saturating at the DAC range.
    pub fn from_volts(&self, v: f64, cal: Calib) -> i64 {
        let base_gain = self.base_gain();
        let mut raw = round((v - cal.offset) / (base_gain * cal.gain));
        if !self.signed {
            raw -= (self.vmin / base_gain).floor() as i64;
        }
        self.clamp_value(raw)
    }
}

/// Analog-to-digital converter
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Adc<'a> {
    pub bits: u32,
    pub signed: bool,
    pub invert: bool,
    pub vmin: f64,
    pub vmax: f64,
    /// Gains selectable on the programmable gain amplifier.
    pub gains: &'a [f64],
}

impl Adc<'_> {
    pub fn bit_range(&self) -> (i64, i64) {
        bit_range(self.bits, self.signed)
    }

    pub fn gain(&self, gain_id: u8) -> Result<f64, DeviceError> {
        self.gains
            .get(usize::from(gain_id))
            .copied()
            .ok_or(DeviceError::InvalidGainId(gain_id))
    }

    /// Converts a raw reading to volts.
    ///
    /// `first` is the correction applied before the amplifier and `second` the one
    /// applied after it. Inputs without an amplifier stage use [Calib::IDENTITY]
    /// for one of them.
    pub fn to_volts(
        &self,
        raw: i64,
        gain_id: u8,
        first: Calib,
        second: Calib,
    ) -> Result<f64, DeviceError> {
        let max = (1_i64 << self.bits) as f64;
        let pga_gain = self.gain(gain_id)? * second.gain;
        let adc_gain = max / (self.vmax - self.vmin) * first.gain;
        let base_offset = if self.signed { 0 } else { 1_i64 << (self.bits - 1) };

        let v = (((raw - base_offset) as f64 - second.offset) / pga_gain - first.offset) / adc_gain;
        Ok(if self.invert { -v } else { v })
    }
}
