use log::debug;

use opendaq_core::convert::Calib;
use opendaq_core::error::DeviceError;
use opendaq_core::frame::{expect_len, Command};
use opendaq_core::transport::{send_command, Transport};

use crate::models::HardwareModel;

pub const CMD_READ_CALIB: u8 = 36;
pub const CALIB_RESPONSE_LEN: usize = 5;

/// Calibration pairs of one instrument, indexed by register number.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CalibrationStore {
    pairs: Vec<Calib>,
}

impl CalibrationStore {
    pub fn new(pairs: Vec<Calib>) -> Self {
        Self { pairs }
    }

    /// Reads every calibration register of `model`.
    /// Any register that can't be read aborts the load.
    pub fn load<T: Transport + ?Sized>(
        port: &mut T,
        model: &HardwareModel,
        attempts: usize,
    ) -> Result<Self, DeviceError> {
        let n_regs = model.features.n_calib_regs;
        let mut pairs = Vec::with_capacity(n_regs);
        for (index, register) in (0..=u8::MAX).take(n_regs).enumerate() {
            let command = Command::new(CMD_READ_CALIB, &[register])?;
            let body = send_command(port, &command, CALIB_RESPONSE_LEN, attempts)?;
            let calib = from_register(model, index, &body)?;
            debug!("calibration register {}: gain {} offset {}", index, calib.gain, calib.offset);
            pairs.push(calib);
        }
        Ok(Self { pairs })
    }

    pub fn get(&self, index: usize) -> Option<Calib> {
        self.pairs.get(index).copied()
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn as_slice(&self) -> &[Calib] {
        &self.pairs
    }
}

/// Decodes the body of a calibration register response.
///
/// The body holds a reserved byte, then the gain and offset as big endian `i16`.
pub fn from_register(
    model: &HardwareModel,
    index: usize,
    body: &[u8],
) -> Result<Calib, DeviceError> {
    let data = expect_len(body, CALIB_RESPONSE_LEN)?;
    let gain = i16::from_be_bytes([data[1], data[2]]);
    let offset = i16::from_be_bytes([data[3], data[4]]);
    Ok(Calib::from_raw(gain, offset, model.calib_scale(index)))
}

#[cfg(test)]
mod tests {
    use super::*;

    use approx::assert_relative_eq;
    use opendaq_core::frame::FrameError;
    use opendaq_core::mock::{MockTransport, Reply};

    use crate::models::{Registry, MODEL_M, MODEL_TP04_AB};

    fn register(gain: i16, offset: i16) -> [u8; 5] {
        let [g0, g1] = gain.to_be_bytes();
        let [o0, o1] = offset.to_be_bytes();
        [0, g0, g1, o0, o1]
    }

    #[test]
    fn decode_output_register() {
        let model = Registry::builtin().get(MODEL_M).unwrap();
        let calib = from_register(model, 0, &register(-32768, 16384)).unwrap();
        assert_relative_eq!(calib.gain, 0.5);
        assert_relative_eq!(calib.offset, 0.25);
    }

    #[test]
    fn decode_input_register() {
        let model = Registry::builtin().get(MODEL_M).unwrap();
        let calib = from_register(model, 1, &register(6553, -64)).unwrap();
        assert_relative_eq!(calib.gain, 1.0 + 6553.0 / 65536.0);
        assert_relative_eq!(calib.offset, -2.0);
    }

    #[test]
    fn decode_short_register() {
        let model = Registry::builtin().get(MODEL_M).unwrap();
        let err = from_register(model, 0, &[0, 1, 2]).unwrap_err();
        assert!(matches!(err, DeviceError::FrameError(FrameError::NotEnoughData(5, 3))));
    }

    #[test]
    fn load_every_register() {
        let model = Registry::builtin().get(MODEL_TP04_AB).unwrap();
        let mut port = MockTransport::with_responder(|cmd, body| {
            assert_eq!(cmd, CMD_READ_CALIB);
            // gain and offset follow the register number
            let i = i16::from(body[0]);
            Reply::frame(cmd, &register(i * 64, i * 32))
        });

        let store = CalibrationStore::load(&mut port, model, 8).unwrap();
        assert_eq!(store.len(), 10);
        assert_eq!(port.commands_written(), 10);

        // outputs use the output scale
        let out = store.get(1).unwrap();
        assert_relative_eq!(out.gain, 1.0 + 64.0 / 65536.0);
        assert_relative_eq!(out.offset, 32.0 / 65536.0);

        // inputs use the input scale
        let inp = store.get(2).unwrap();
        assert_relative_eq!(inp.gain, 1.0 + 128.0 / 65536.0);
        assert_relative_eq!(inp.offset, 2.0);

        assert!(store.get(10).is_none());
    }

    #[test]
    fn load_retries_corrupted_register() {
        let model = Registry::builtin().get(MODEL_M).unwrap();
        let mut port = MockTransport::with_responder(|cmd, _| Reply::frame(cmd, &register(0, 0)));
        port.push(Reply::corrupted(CMD_READ_CALIB, &register(0, 0)));

        let store = CalibrationStore::load(&mut port, model, 8).unwrap();
        assert_eq!(store.len(), 14);
        assert_eq!(port.discards(), 1);
        assert!(store.as_slice().iter().all(|c| *c == Calib::IDENTITY));
    }

    #[test]
    fn load_aborts_on_failure() {
        let model = Registry::builtin().get(MODEL_M).unwrap();
        let mut port = MockTransport::with_responder(|cmd, body| {
            if body[0] == 3 {
                Reply::nak(CALIB_RESPONSE_LEN)
            } else {
                Reply::frame(cmd, &register(0, 0))
            }
        });

        let err = CalibrationStore::load(&mut port, model, 8).unwrap_err();
        assert!(matches!(err, DeviceError::FrameError(FrameError::Nak)));
        assert_eq!(port.commands_written(), 4);
    }
}
