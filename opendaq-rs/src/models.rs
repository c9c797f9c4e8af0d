//! Hardware models supported by the driver.
//!
//! Each model is identified by the number the instrument reports in its info
//! response. The [Registry] maps those numbers to a [HardwareModel] describing the
//! channel counts, the converter types and where each calibration pair lives.

use opendaq_core::convert::CalibScale;
use opendaq_core::error::DeviceError;

use crate::inputs::{InputType, INPUT_A, INPUT_AS, INPUT_M, INPUT_N, INPUT_S};
use crate::outputs::{OutputType, OUTPUT_L, OUTPUT_M, OUTPUT_S, OUTPUT_T};

pub const MODEL_M: u8 = 1;
pub const MODEL_S: u8 = 2;
pub const MODEL_N: u8 = 3;
pub const MODEL_EM08_ABRR: u8 = 10;
pub const MODEL_TP04_AR: u8 = 11;
pub const MODEL_TP04_AB: u8 = 12;
pub const MODEL_EM08_RRLL: u8 = 13;
pub const MODEL_EM08_LLLB: u8 = 14;
pub const MODEL_EM08_LLLL: u8 = 15;
pub const MODEL_EM08_LLAR: u8 = 16;
pub const MODEL_EM08_ABRR2: u8 = 17;

/// Register scale of the output (and hidden output) calibration slots.
pub const OUTPUT_SCALE: CalibScale = CalibScale::new(65536.0, 65536.0);
/// Register scale of the input calibration slots.
pub const INPUT_SCALE: CalibScale = CalibScale::new(65536.0, 32.0);

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Features {
    pub name: &'static str,
    pub n_pios: usize,
    pub n_leds: usize,
    pub n_inputs: usize,
    pub n_outputs: usize,
    /// Internal reference outputs, not wired to a terminal.
    pub n_hidden_outputs: usize,
    pub n_calib_regs: usize,
    /// Output type of each output channel, hidden outputs included.
    pub dac_types: &'static [&'static OutputType],
    /// Input type of each input channel.
    pub adc_types: &'static [&'static InputType],
}

impl Features {
    /// Outputs occupying calibration slots, hidden ones included.
    pub fn total_outputs(&self) -> usize {
        self.n_outputs + self.n_hidden_outputs
    }

    pub fn input_type(&self, channel: u8) -> Result<&'static InputType, DeviceError> {
        usize::from(channel)
            .checked_sub(1)
            .and_then(|i| self.adc_types.get(i))
            .copied()
            .ok_or(DeviceError::InvalidInput(channel))
    }

    pub fn output_type(&self, channel: u8) -> Result<&'static OutputType, DeviceError> {
        usize::from(channel)
            .checked_sub(1)
            .filter(|&i| i < self.total_outputs())
            .and_then(|i| self.dac_types.get(i))
            .copied()
            .ok_or(DeviceError::InvalidOutput(channel))
    }

    /// Gain table of the model's amplifier, empty when it has no inputs.
    pub fn gains(&self) -> &'static [f64] {
        self.adc_types.first().map(|t| t.adc.gains).unwrap_or_default()
    }
}

/// Where the calibration pairs of the inputs are stored.
///
/// Outputs always come first, one slot per output, followed by one first stage
/// slot per input.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CalibScheme {
    /// One second stage slot per input after the first stage block.
    PerChannel,
    /// One second stage slot per amplifier gain after the first stage block.
    /// With `differential` set, a second copy of both blocks holds the
    /// differential mode calibration.
    PerGain { differential: bool },
    /// Like [CalibScheme::PerChannel], with a separate first stage block for
    /// each reading mode, `2 * n_inputs` slots apart.
    MultiMode,
}

/// Which negative inputs can be paired with a positive one.
/// A negative input of 0 (single ended) is always accepted.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NegativeInputs {
    SingleEndedOnly,
    UpTo(u8),
    OneOf(&'static [u8]),
}

impl NegativeInputs {
    fn accepts(&self, neg: u8) -> bool {
        match self {
            _ if neg == 0 => true,
            Self::SingleEndedOnly => false,
            Self::UpTo(max) => neg <= *max,
            Self::OneOf(valid) => valid.contains(&neg),
        }
    }
}

/// How the raw DAC value is sent.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DacCommand {
    /// Command 24, value only, for single output models.
    ValueOnly,
    /// Command 13, value followed by the output number.
    WithChannel,
}

impl DacCommand {
    pub fn number(&self) -> u8 {
        match self {
            Self::ValueOnly => 24,
            Self::WithChannel => 13,
        }
    }
}

/// How the LED color is sent with command 18.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LedCommand {
    /// Only the color, the model has a single LED.
    ColorOnly,
    /// The color followed by the LED number.
    WithChannel,
}

/// A calibration slot lookup.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CalibRequest {
    pub output: bool,
    pub differential: bool,
    pub second_stage: bool,
    pub channel: u8,
    pub gain_id: u8,
    /// Reading mode, only used by multi mode inputs.
    pub mode: u8,
}

impl CalibRequest {
    pub fn output(channel: u8) -> Self {
        Self {
            output: true,
            differential: false,
            second_stage: false,
            channel,
            gain_id: 0,
            mode: 0,
        }
    }

    /// First stage slot of an input.
    pub fn input(channel: u8, gain_id: u8) -> Self {
        Self {
            output: false,
            ..Self::output(channel)
        }
        .gain(gain_id)
    }

    pub fn gain(mut self, gain_id: u8) -> Self {
        self.gain_id = gain_id;
        self
    }

    pub fn differential(mut self, differential: bool) -> Self {
        self.differential = differential;
        self
    }

    pub fn second_stage(mut self) -> Self {
        self.second_stage = true;
        self
    }

    pub fn mode(mut self, mode: u8) -> Self {
        self.mode = mode;
        self
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HardwareModel {
    pub id: u8,
    pub features: Features,
    pub scheme: CalibScheme,
    pub negative_inputs: NegativeInputs,
    pub dac_command: DacCommand,
    pub led_command: LedCommand,
    pub output_scale: CalibScale,
    pub input_scale: CalibScale,
}

impl HardwareModel {
    pub fn features(&self) -> &Features {
        &self.features
    }

    /// Register scale of calibration slot `index`.
    pub fn calib_scale(&self, index: usize) -> CalibScale {
        if index < self.features.total_outputs() {
            self.output_scale
        } else {
            self.input_scale
        }
    }

    fn check_input(&self, channel: u8) -> Result<usize, DeviceError> {
        let n = usize::from(channel);
        if n < 1 || n > self.features.n_inputs {
            return Err(DeviceError::InvalidInput(channel));
        }
        Ok(n)
    }

    /// Get the index of a calibration register.
    /// Each register contains a pair of calibration values: a gain and an offset.
    pub fn calib_index(&self, request: &CalibRequest) -> Result<usize, DeviceError> {
        let f = &self.features;
        let outputs = f.total_outputs();
        let n = usize::from(request.channel);

        if request.output {
            if n < 1 || n > outputs {
                return Err(DeviceError::InvalidOutput(request.channel));
            }
            return Ok(n - 1);
        }

        match self.scheme {
            CalibScheme::PerChannel => {
                let n = self.check_input(request.channel)?;
                let index = outputs + n - 1;
                if request.second_stage {
                    Ok(index + f.n_inputs)
                } else {
                    Ok(index)
                }
            }
            CalibScheme::PerGain { differential } => {
                let n_gains = f.gains().len();
                let mut index = if request.second_stage {
                    let gain_id = usize::from(request.gain_id);
                    if gain_id >= n_gains {
                        return Err(DeviceError::InvalidGainId(request.gain_id));
                    }
                    outputs + f.n_inputs + gain_id
                } else {
                    outputs + self.check_input(request.channel)? - 1
                };
                if differential && request.differential {
                    index += f.n_inputs + n_gains;
                }
                Ok(index)
            }
            CalibScheme::MultiMode => {
                let n = self.check_input(request.channel)?;
                if request.second_stage {
                    Ok(outputs + f.n_inputs + n - 1)
                } else {
                    Ok(outputs + n - 1 + 2 * f.n_inputs * usize::from(request.mode))
                }
            }
        }
    }

    /// Checks that a positive and a negative input can be read together.
    pub fn check_valid_inputs(&self, pos: u8, neg: u8) -> Result<(), DeviceError> {
        self.check_input(pos)?;
        if !self.negative_inputs.accepts(neg) {
            return Err(DeviceError::InvalidInput(neg));
        }
        Ok(())
    }
}

/// An immutable table of hardware models.
#[derive(Clone, Copy, Debug)]
pub struct Registry {
    models: &'static [HardwareModel],
}

impl Registry {
    pub const fn new(models: &'static [HardwareModel]) -> Self {
        Self { models }
    }

    /// Every model this crate knows about.
    pub fn builtin() -> &'static Registry {
        &BUILTIN
    }

    pub fn get(&self, id: u8) -> Option<&'static HardwareModel> {
        self.models.iter().find(|m| m.id == id)
    }

    pub fn iter(&self) -> std::slice::Iter<'static, HardwareModel> {
        self.models.iter()
    }
}

static BUILTIN: Registry = Registry::new(&MODELS);

/// Ground referenced negative inputs of the openDAQ M and S.
const OPENDAQ_NEGATIVE_INPUTS: &[u8] = &[5, 6, 7, 8, 25];

const OPENDAQ_PIOS: usize = 6;

static MODELS: [HardwareModel; 11] = [
    HardwareModel {
        id: MODEL_M,
        features: Features {
            name: "OpenDAQ M",
            n_pios: OPENDAQ_PIOS,
            n_leds: 1,
            n_inputs: 8,
            n_outputs: 1,
            n_hidden_outputs: 0,
            n_calib_regs: 1 + 8 + 5,
            dac_types: &[&OUTPUT_M],
            adc_types: &[&INPUT_M; 8],
        },
        scheme: CalibScheme::PerGain {
            differential: false,
        },
        negative_inputs: NegativeInputs::OneOf(OPENDAQ_NEGATIVE_INPUTS),
        dac_command: DacCommand::ValueOnly,
        led_command: LedCommand::ColorOnly,
        output_scale: OUTPUT_SCALE,
        input_scale: INPUT_SCALE,
    },
    HardwareModel {
        id: MODEL_S,
        features: Features {
            name: "OpenDAQ S",
            n_pios: OPENDAQ_PIOS,
            n_leds: 1,
            n_inputs: 8,
            n_outputs: 1,
            n_hidden_outputs: 0,
            n_calib_regs: 1 + 2 * (8 + 8),
            dac_types: &[&OUTPUT_S],
            adc_types: &[&INPUT_S; 8],
        },
        // the only model with a differential calibration bank, 1 + 2 * (8 + 8) registers
        scheme: CalibScheme::PerGain { differential: true },
        negative_inputs: NegativeInputs::OneOf(OPENDAQ_NEGATIVE_INPUTS),
        dac_command: DacCommand::ValueOnly,
        led_command: LedCommand::ColorOnly,
        output_scale: OUTPUT_SCALE,
        input_scale: INPUT_SCALE,
    },
    HardwareModel {
        id: MODEL_N,
        features: Features {
            name: "OpenDAQ N",
            n_pios: OPENDAQ_PIOS,
            n_leds: 1,
            n_inputs: 8,
            n_outputs: 1,
            n_hidden_outputs: 0,
            n_calib_regs: 1 + 2 * (8 + 8),
            dac_types: &[&OUTPUT_M],
            adc_types: &[&INPUT_N; 8],
        },
        scheme: CalibScheme::PerChannel,
        negative_inputs: NegativeInputs::UpTo(8),
        dac_command: DacCommand::ValueOnly,
        led_command: LedCommand::ColorOnly,
        output_scale: OUTPUT_SCALE,
        input_scale: INPUT_SCALE,
    },
    // 2 static/tacho inputs, 2 static inputs and 4 relays
    HardwareModel {
        id: MODEL_EM08_ABRR,
        features: Features {
            name: "EM08S-ABRR",
            n_pios: 4,
            n_leds: 4,
            n_inputs: 4,
            n_outputs: 0,
            n_hidden_outputs: 2, // tacho bias references
            n_calib_regs: 2 + 2 * 4,
            dac_types: &[&OUTPUT_T; 2],
            adc_types: &[&INPUT_A; 4],
        },
        scheme: CalibScheme::PerChannel,
        negative_inputs: NegativeInputs::SingleEndedOnly,
        dac_command: DacCommand::WithChannel,
        led_command: LedCommand::WithChannel,
        output_scale: OUTPUT_SCALE,
        input_scale: INPUT_SCALE,
    },
    // 2 static/tacho inputs and 2 relays
    HardwareModel {
        id: MODEL_TP04_AR,
        features: Features {
            name: "TP04AR",
            n_pios: 2,
            n_leds: 2,
            n_inputs: 2,
            n_outputs: 0,
            n_hidden_outputs: 2,
            n_calib_regs: 2 + 2 * 2,
            dac_types: &[&OUTPUT_T; 2],
            adc_types: &[&INPUT_A; 2],
        },
        scheme: CalibScheme::PerChannel,
        negative_inputs: NegativeInputs::SingleEndedOnly,
        dac_command: DacCommand::WithChannel,
        led_command: LedCommand::WithChannel,
        output_scale: OUTPUT_SCALE,
        input_scale: INPUT_SCALE,
    },
    // 2 static/tacho inputs and 2 static inputs
    HardwareModel {
        id: MODEL_TP04_AB,
        features: Features {
            name: "TP04AB",
            n_pios: 0,
            n_leds: 4,
            n_inputs: 4,
            n_outputs: 0,
            n_hidden_outputs: 2,
            n_calib_regs: 2 + 2 * 4,
            dac_types: &[&OUTPUT_T; 2],
            adc_types: &[&INPUT_A; 4],
        },
        scheme: CalibScheme::PerChannel,
        negative_inputs: NegativeInputs::SingleEndedOnly,
        dac_command: DacCommand::WithChannel,
        led_command: LedCommand::WithChannel,
        output_scale: OUTPUT_SCALE,
        input_scale: INPUT_SCALE,
    },
    // 4 relays and 4 current outputs
    HardwareModel {
        id: MODEL_EM08_RRLL,
        features: Features {
            name: "EM08C-RRLL",
            n_pios: 4,
            n_leds: 0,
            n_inputs: 0,
            n_outputs: 4,
            n_hidden_outputs: 0,
            n_calib_regs: 4,
            dac_types: &[&OUTPUT_L; 4],
            adc_types: &[],
        },
        scheme: CalibScheme::PerChannel,
        negative_inputs: NegativeInputs::SingleEndedOnly,
        dac_command: DacCommand::WithChannel,
        led_command: LedCommand::WithChannel,
        output_scale: OUTPUT_SCALE,
        input_scale: INPUT_SCALE,
    },
    // 2 analog inputs and 6 current outputs
    HardwareModel {
        id: MODEL_EM08_LLLB,
        features: Features {
            name: "EM08C-LLLB",
            n_pios: 0,
            n_leds: 2,
            n_inputs: 2,
            n_outputs: 6,
            n_hidden_outputs: 0,
            n_calib_regs: 6 + 2 * 2,
            dac_types: &[&OUTPUT_L; 6],
            adc_types: &[&INPUT_A; 2],
        },
        scheme: CalibScheme::PerChannel,
        negative_inputs: NegativeInputs::SingleEndedOnly,
        dac_command: DacCommand::WithChannel,
        led_command: LedCommand::WithChannel,
        output_scale: OUTPUT_SCALE,
        input_scale: INPUT_SCALE,
    },
    // 8 current outputs
    HardwareModel {
        id: MODEL_EM08_LLLL,
        features: Features {
            name: "EM08C-LLLL",
            n_pios: 0,
            n_leds: 0,
            n_inputs: 0,
            n_outputs: 8,
            n_hidden_outputs: 0,
            n_calib_regs: 8,
            dac_types: &[&OUTPUT_L; 8],
            adc_types: &[],
        },
        scheme: CalibScheme::PerChannel,
        negative_inputs: NegativeInputs::SingleEndedOnly,
        dac_command: DacCommand::WithChannel,
        led_command: LedCommand::WithChannel,
        output_scale: OUTPUT_SCALE,
        input_scale: INPUT_SCALE,
    },
    // 4 current outputs, 2 relays and 2 voltage/current inputs
    HardwareModel {
        id: MODEL_EM08_LLAR,
        features: Features {
            name: "EM08C-LLAR",
            n_pios: 2,
            n_leds: 2,
            n_inputs: 2,
            n_outputs: 4,
            n_hidden_outputs: 0,
            n_calib_regs: 4 + 2 * 2,
            dac_types: &[&OUTPUT_L; 4],
            adc_types: &[&INPUT_AS; 2],
        },
        scheme: CalibScheme::MultiMode,
        negative_inputs: NegativeInputs::SingleEndedOnly,
        dac_command: DacCommand::WithChannel,
        led_command: LedCommand::WithChannel,
        output_scale: OUTPUT_SCALE,
        input_scale: INPUT_SCALE,
    },
    // ABRR with shunt resistors for loop current, it reports the same name
    HardwareModel {
        id: MODEL_EM08_ABRR2,
        features: Features {
            name: "EM08S-ABRR",
            n_pios: 4,
            n_leds: 4,
            n_inputs: 4,
            n_outputs: 0,
            n_hidden_outputs: 2,
            n_calib_regs: 2 + 2 * 4,
            dac_types: &[&OUTPUT_T; 2],
            adc_types: &[&INPUT_AS; 4],
        },
        scheme: CalibScheme::MultiMode,
        negative_inputs: NegativeInputs::SingleEndedOnly,
        dac_command: DacCommand::WithChannel,
        led_command: LedCommand::WithChannel,
        output_scale: OUTPUT_SCALE,
        input_scale: INPUT_SCALE,
    },
];
