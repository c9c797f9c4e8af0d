use crate::frame::FrameError;

use std::fmt::Display;

#[derive(Debug)]
pub enum DeviceError {
    /// An error when writing data or reading data from the device.
    IoError(std::io::Error),
    /// The serial port could not be opened or configured.
    PortError(serialport::Error),
    /// The response frame was rejected.
    FrameError(FrameError),
    /// The device reported a model number the registry does not know.
    UnknownModel(u8),
    /// The input channel, or the positive/negative pairing, is not valid for this model.
    InvalidInput(u8),
    /// The output channel is not valid for this model.
    InvalidOutput(u8),
    /// The gain index is outside of the input's gain table.
    InvalidGainId(u8),
    /// The reading mode is not supported by the input type.
    InvalidInputMode(u8),
    InvalidLed(u8),
    InvalidPio(u8),
    /// LED colors go from 0 (off) to 3 (yellow).
    InvalidColor(u8),
}

impl DeviceError {
    /// Whether resending the same command could succeed.
    ///
    /// Transport failures and corrupted frames are retried. A NAK or a length
    /// mismatch comes back the same way every time, as do validation errors.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::IoError(_)
                | Self::FrameError(FrameError::InvalidChecksum(_, _))
        )
    }
}

impl Display for DeviceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::IoError(e) => e.fmt(f),
            Self::PortError(e) => e.fmt(f),
            Self::FrameError(e) => e.fmt(f),
            Self::UnknownModel(model) => write!(f, "unknown device model number: {}", model),
            Self::InvalidInput(n) => write!(f, "invalid input number: {}", n),
            Self::InvalidOutput(n) => write!(f, "invalid output number: {}", n),
            Self::InvalidGainId(id) => write!(f, "invalid gain ID: {}", id),
            Self::InvalidInputMode(mode) => write!(f, "invalid input mode: {}", mode),
            Self::InvalidLed(n) => write!(f, "invalid LED number: {}", n),
            Self::InvalidPio(n) => write!(f, "invalid PIO number: {}", n),
            Self::InvalidColor(c) => write!(f, "invalid LED color: {}", c),
        }
    }
}

impl std::error::Error for DeviceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::IoError(e) => Some(e),
            Self::PortError(e) => Some(e),
            Self::FrameError(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for DeviceError {
    fn from(value: std::io::Error) -> Self {
        Self::IoError(value)
    }
}

impl From<FrameError> for DeviceError {
    fn from(value: FrameError) -> Self {
        Self::FrameError(value)
    }
}

impl From<serialport::Error> for DeviceError {
    fn from(value: serialport::Error) -> Self {
        Self::PortError(value)
    }
}
