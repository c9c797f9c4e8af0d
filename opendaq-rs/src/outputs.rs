//! Analog output types shared between hardware models.

use opendaq_core::convert::{Calib, Dac};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct OutputType {
    pub name: &'static str,
    pub dac: Dac,
    /// Unit of `dac.vmin` and `dac.vmax`.
    pub unit: &'static str,
}

impl OutputType {
    /// Converts a value in [OutputType::unit] to the DAC code to write.
    pub fn from_units(&self, value: f64, cal: Calib) -> i16 {
        let raw = self.dac.from_volts(value, cal);
        // every output type is 16 bits wide, this only guards wider tables
        i16::try_from(raw).unwrap_or(if raw < 0 { i16::MIN } else { i16::MAX })
    }
}

pub const OUTPUT_M: OutputType = OutputType {
    name: "OUTPUT_TYPE_M",
    dac: Dac {
        bits: 16,
        signed: true,
        invert: false,
        vmin: -4.096,
        vmax: 4.096,
    },
    unit: "V",
};

// The DAC has 12 bits, the firmware scales the 16 bit value.
pub const OUTPUT_S: OutputType = OutputType {
    name: "OUTPUT_TYPE_S",
    dac: Dac {
        bits: 16,
        signed: true,
        invert: false,
        vmin: 0.0,
        vmax: 4.096,
    },
    unit: "V",
};

/// Tacho bias reference.
pub const OUTPUT_T: OutputType = OutputType {
    name: "OUTPUT_TYPE_T",
    dac: Dac {
        bits: 16,
        signed: true,
        invert: false,
        vmin: -24.0,
        vmax: 24.0,
    },
    unit: "V",
};

/// Current loop output.
pub const OUTPUT_L: OutputType = OutputType {
    name: "OUTPUT_TYPE_L",
    dac: Dac {
        bits: 16,
        signed: true,
        invert: false,
        vmin: 0.0,
        vmax: 40.96,
    },
    unit: "mA",
};

#[cfg(test)]
mod tests {
    use super::*;

    const ID: Calib = Calib::IDENTITY;

    #[test]
    fn output_s_range() {
        assert_eq!(OUTPUT_S.dac.bit_range(), (-32768, 32767));
        assert_eq!(OUTPUT_S.dac.clamp_value(-200000), -32768);
        assert_eq!(OUTPUT_S.dac.clamp_value(86000), 32767);
        assert_eq!(OUTPUT_S.dac.clamp_value(200), 200);
    }

    #[test]
    fn output_s_from_units() {
        assert_eq!(OUTPUT_S.from_units(0.0, ID), 0);
        assert_eq!(OUTPUT_S.from_units(2.048, ID), 16384);
        assert_eq!(OUTPUT_S.from_units(4.096, ID), 32767);
        assert_eq!(OUTPUT_S.from_units(10.0, ID), 32767);
    }

    #[test]
    fn output_l_milliamps() {
        assert_eq!(OUTPUT_L.unit, "mA");
        // 20 mA out of a 40.96 mA full scale
        assert_eq!(OUTPUT_L.from_units(20.48, ID), 16384);
        assert_eq!(OUTPUT_L.from_units(-1.0, ID), -800);
    }

    #[test]
    fn output_t_calibrated() {
        // one step is 24 / 32768 V
        let cal = Calib::new(1.0, 12.0);
        assert_eq!(OUTPUT_T.from_units(12.0, cal), 0);
        assert_eq!(OUTPUT_T.from_units(24.0, cal), 16384);
    }
}
