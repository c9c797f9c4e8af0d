use std::time::Duration;

use opendaq_core::transport::DEFAULT_ATTEMPTS;

pub const DEFAULT_BAUD_RATE: u32 = 115200;

/// Serial and session settings used when connecting to an instrument.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DeviceConfig {
    pub baud_rate: u32,
    /// How long a single read may block before the attempt fails.
    pub timeout: Duration,
    /// Exchanges per command, including the first one.
    pub attempts: usize,
    /// The instrument resets when the port is opened and ignores commands until
    /// it has booted.
    pub settle_time: Duration,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            baud_rate: DEFAULT_BAUD_RATE,
            timeout: Duration::from_millis(100),
            attempts: DEFAULT_ATTEMPTS,
            settle_time: Duration::from_millis(1500),
        }
    }
}

impl DeviceConfig {
    pub fn with_baud_rate(mut self, baud_rate: u32) -> Self {
        self.baud_rate = baud_rate;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_attempts(mut self, attempts: usize) -> Self {
        self.attempts = attempts;
        self
    }

    pub fn with_settle_time(mut self, settle_time: Duration) -> Self {
        self.settle_time = settle_time;
        self
    }
}
