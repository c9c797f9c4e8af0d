use std::sync::{Mutex, MutexGuard, PoisonError};
use std::thread;

use arrayvec::ArrayVec;
use log::info;
use serialport::SerialPort;

use opendaq_core::convert::Calib;
use opendaq_core::error::DeviceError;
use opendaq_core::frame::{expect_len, Body, Command};
use opendaq_core::transport::{send_command, Transport};

use crate::calibration::CalibrationStore;
use crate::config::DeviceConfig;
use crate::inputs::Reading;
use crate::models::{CalibRequest, DacCommand, Features, HardwareModel, LedCommand, Registry};

pub const CMD_READ_ADC: u8 = 1;
pub const CMD_CONFIGURE_ADC: u8 = 2;
pub const CMD_SET_PIO: u8 = 3;
pub const CMD_SET_PIO_DIR: u8 = 5;
pub const CMD_SET_LED: u8 = 18;
pub const CMD_GET_INFO: u8 = 39;

/// Model numbers from here on belong to the EM08/TP04 family.
const FAMILY_MODEL_START: u8 = 10;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DeviceInfo {
    pub model: u8,
    pub version: u8,
    pub serial: u32,
}

impl DeviceInfo {
    fn from_body(body: &[u8]) -> Result<Self, DeviceError> {
        let data = expect_len(body, 6)?;
        Ok(Self {
            model: data[0],
            version: data[1],
            serial: u32::from_be_bytes([data[2], data[3], data[4], data[5]]),
        })
    }

    /// Serial number as printed on the instrument.
    ///
    /// EM08 and TP04 instruments prefix the serial with an 8 and their model number.
    pub fn serial_label(&self) -> String {
        if self.model >= FAMILY_MODEL_START {
            format!("8{:02}{:04}", self.model, self.serial)
        } else {
            self.serial.to_string()
        }
    }
}

#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Color {
    Off,
    Green,
    Red,
    Yellow,
}

impl TryFrom<u8> for Color {
    type Error = DeviceError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Off),
            1 => Ok(Self::Green),
            2 => Ok(Self::Red),
            3 => Ok(Self::Yellow),
            _ => Err(DeviceError::InvalidColor(value)),
        }
    }
}

/// The analog input selected with [Device::configure_input].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct InputConfig {
    pub pos: u8,
    /// 0 when reading single ended.
    pub neg: u8,
    pub gain_id: u8,
}

impl InputConfig {
    pub fn is_differential(&self) -> bool {
        self.neg != 0
    }
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            pos: 1,
            neg: 0,
            gain_id: 0,
        }
    }
}

/// A connection to one instrument.
///
/// Commands from different threads are serialized, so a `Device` can be shared
/// behind an [std::sync::Arc].
pub struct Device<T: Transport> {
    port: Mutex<T>,
    model: &'static HardwareModel,
    info: DeviceInfo,
    calibration: CalibrationStore,
    input: Mutex<InputConfig>,
    attempts: usize,
}

impl Device<Box<dyn SerialPort>> {
    /// Opens the serial port at `path` with the default settings.
    pub fn open(path: &str) -> Result<Self, DeviceError> {
        Self::open_with(path, &DeviceConfig::default())
    }

    pub fn open_with(path: &str, config: &DeviceConfig) -> Result<Self, DeviceError> {
        let port = serialport::new(path, config.baud_rate)
            .timeout(config.timeout)
            .open()?;
        thread::sleep(config.settle_time);
        Self::new(port, Registry::builtin(), config)
    }
}

impl<T: Transport> Device<T> {
    /// Identifies the instrument on `port` and reads its calibration.
    pub fn new(
        mut port: T,
        registry: &Registry,
        config: &DeviceConfig,
    ) -> Result<Self, DeviceError> {
        let body = send_command(&mut port, &Command::empty(CMD_GET_INFO), 6, config.attempts)?;
        let info = DeviceInfo::from_body(&body)?;
        let model = registry
            .get(info.model)
            .ok_or(DeviceError::UnknownModel(info.model))?;

        let calibration = CalibrationStore::load(&mut port, model, config.attempts)?;
        info!(
            "connected to {} version {} serial {}, {} calibration registers",
            model.features.name,
            info.version,
            info.serial_label(),
            calibration.len()
        );

        Ok(Self {
            port: Mutex::new(port),
            model,
            info,
            calibration,
            input: Mutex::new(InputConfig::default()),
            attempts: config.attempts,
        })
    }

    /// Flushes and releases the port.
    pub fn close(self) -> Result<(), DeviceError> {
        let mut port = self.into_inner();
        port.flush()?;
        Ok(())
    }

    pub fn into_inner(self) -> T {
        self.port.into_inner().unwrap_or_else(PoisonError::into_inner)
    }

    /// Handshake read when the device was opened.
    pub fn info(&self) -> DeviceInfo {
        self.info
    }

    pub fn get_info(&self) -> Result<DeviceInfo, DeviceError> {
        let body = self.send(&Command::empty(CMD_GET_INFO), 6)?;
        DeviceInfo::from_body(&body)
    }

    pub fn model(&self) -> &'static HardwareModel {
        self.model
    }

    pub fn features(&self) -> &'static Features {
        &self.model.features
    }

    pub fn calibration(&self) -> &CalibrationStore {
        &self.calibration
    }

    pub fn input_config(&self) -> InputConfig {
        *self.lock_input()
    }

    /// Calibration pair for a channel, or [Calib::IDENTITY] when the model has no
    /// register for it.
    pub fn get_calibration(&self, request: &CalibRequest) -> Calib {
        self.model
            .calib_index(request)
            .ok()
            .and_then(|index| self.calibration.get(index))
            .unwrap_or(Calib::IDENTITY)
    }

    /// Selects the analog input read by the next [Device::read_raw].
    pub fn configure_input(
        &self,
        pos: u8,
        neg: u8,
        gain_id: u8,
        samples: u8,
    ) -> Result<(), DeviceError> {
        self.model.check_valid_inputs(pos, neg)?;
        self.model.features.input_type(pos)?.adc.gain(gain_id)?;

        let mut input = self.lock_input();
        self.send(&Command::new(CMD_CONFIGURE_ADC, &[pos, neg, gain_id, samples])?, 6)?;
        *input = InputConfig { pos, neg, gain_id };
        Ok(())
    }

    pub fn read_raw(&self) -> Result<i16, DeviceError> {
        let body = self.send(&Command::empty(CMD_READ_ADC), 2)?;
        let data = expect_len(&body, 2)?;
        Ok(i16::from_be_bytes([data[0], data[1]]))
    }

    /// Reads the configured input in volts.
    ///
    /// The input selection stays locked until the reading is converted, so the
    /// calibration always matches the input that was sampled.
    pub fn read_physical(&self) -> Result<f64, DeviceError> {
        let input = self.lock_input();
        let input_type = self.model.features.input_type(input.pos)?;
        let raw = self.read_raw()?;
        let (first, second) = self.input_calibration(&input, 0);
        input_type.adc.to_volts(i64::from(raw), input.gain_id, first, second)
    }

    /// Reads the configured input in the unit of reading `mode`.
    pub fn read_units(&self, mode: u8) -> Result<Reading, DeviceError> {
        let input = self.lock_input();
        let input_type = self.model.features.input_type(input.pos)?;
        input_type.mode(mode)?;
        let raw = self.read_raw()?;
        let (first, second) = self.input_calibration(&input, mode);
        input_type.raw_to_units(i64::from(raw), input.gain_id, mode, first, second)
    }

    fn input_calibration(&self, input: &InputConfig, mode: u8) -> (Calib, Calib) {
        let request = CalibRequest::input(input.pos, input.gain_id)
            .differential(input.is_differential())
            .mode(mode);
        (
            self.get_calibration(&request),
            self.get_calibration(&request.second_stage()),
        )
    }

    pub fn set_output_raw(&self, channel: u8, raw: i16) -> Result<(), DeviceError> {
        self.model.features.output_type(channel)?;

        let dac = self.model.dac_command;
        let mut body = ArrayVec::<u8, 3>::new();
        body.extend(raw.to_be_bytes());
        if dac == DacCommand::WithChannel {
            body.push(channel);
        }
        self.send(&Command::new(dac.number(), &body)?, body.len())?;
        Ok(())
    }

    /// Sets an output in its physical unit, volts or milliamps.
    pub fn set_output_physical(&self, channel: u8, value: f64) -> Result<(), DeviceError> {
        let output_type = self.model.features.output_type(channel)?;
        let cal = self.get_calibration(&CalibRequest::output(channel));
        self.set_output_raw(channel, output_type.from_units(value, cal))
    }

    pub fn set_indicator(&self, channel: u8, color: Color) -> Result<(), DeviceError> {
        if channel < 1 || usize::from(channel) > self.model.features.n_leds {
            return Err(DeviceError::InvalidLed(channel));
        }

        let command = match self.model.led_command {
            LedCommand::ColorOnly => Command::new(CMD_SET_LED, &[color as u8])?,
            LedCommand::WithChannel => Command::new(CMD_SET_LED, &[color as u8, channel])?,
        };
        self.send(&command, command.body().len())?;
        Ok(())
    }

    pub fn set_digital_line(&self, channel: u8, value: bool) -> Result<(), DeviceError> {
        self.check_pio(channel)?;
        self.send(&Command::new(CMD_SET_PIO, &[channel, u8::from(value)])?, 2)?;
        Ok(())
    }

    /// Configures a digital line as an output (`true`) or an input.
    pub fn set_digital_direction(&self, channel: u8, output: bool) -> Result<(), DeviceError> {
        self.check_pio(channel)?;
        self.send(&Command::new(CMD_SET_PIO_DIR, &[channel, u8::from(output)])?, 2)?;
        Ok(())
    }

    fn check_pio(&self, channel: u8) -> Result<(), DeviceError> {
        if channel < 1 || usize::from(channel) > self.model.features.n_pios {
            return Err(DeviceError::InvalidPio(channel));
        }
        Ok(())
    }

    // The port stays locked until the reply, or the last retry, has been read.
    // Callers holding the input lock take it before this one.
    fn send(&self, command: &Command, response_len: usize) -> Result<Body, DeviceError> {
        let mut port = self.port.lock().unwrap_or_else(PoisonError::into_inner);
        send_command(&mut *port, command, response_len, self.attempts)
    }

    fn lock_input(&self) -> MutexGuard<'_, InputConfig> {
        self.input.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
