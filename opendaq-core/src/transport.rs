//! Sending commands over the serial link.
//!
//! The protocol has no request IDs, so a reply can only be matched to the command
//! written just before it. Callers must keep the transport exclusive for the whole
//! retry sequence of [send_command].

use std::io::{Read, Write};

use log::{debug, trace, warn};
use serialport::{ClearBuffer, SerialPort};

use crate::error::DeviceError;
use crate::frame::{self, Body, Command, HEADER_LEN};

/// How many times a command is sent before giving up.
pub const DEFAULT_ATTEMPTS: usize = 8;

/// A byte channel to the instrument.
pub trait Transport: Read + Write {
    /// Drops any bytes still waiting in the input or output buffers.
    fn discard_buffers(&mut self) -> std::io::Result<()>;
}

impl Transport for Box<dyn SerialPort> {
    fn discard_buffers(&mut self) -> std::io::Result<()> {
        self.clear(ClearBuffer::All)?;
        Ok(())
    }
}

/// Writes a command and reads back a response carrying `response_len` body bytes.
///
/// No retries are attempted here.
pub fn exchange<T: Transport + ?Sized>(
    port: &mut T,
    command: &Command,
    response_len: usize,
) -> Result<Body, DeviceError> {
    let raw = command.marshal();
    trace!("tx {:02x?}", raw.as_slice());
    port.write_all(&raw)?;
    port.flush()?;

    let mut buff = [0_u8; frame::MAX_FRAME_LEN];
    let response = buff
        .get_mut(..response_len + HEADER_LEN)
        .ok_or(frame::FrameError::DataTooLarge)?;
    port.read_exact(response)?;
    trace!("rx {:02x?}", response);

    Ok(frame::parse(response)?)
}

/// Sends a command, retrying transport failures and corrupted replies.
///
/// At most `attempts` exchanges are made. The error of the last one is returned.
/// The transport buffers are discarded after every failed exchange.
pub fn send_command<T: Transport + ?Sized>(
    port: &mut T,
    command: &Command,
    response_len: usize,
    attempts: usize,
) -> Result<Body, DeviceError> {
    let attempts = attempts.max(1);
    let mut attempt = 1;
    loop {
        match exchange(port, command, response_len) {
            Ok(body) => {
                debug!(
                    "command {} answered with {} bytes after {} attempt(s)",
                    command.number(),
                    body.len(),
                    attempt
                );
                return Ok(body);
            }
            Err(e) => {
                // leftover reply bytes would be read as the start of the next reply
                if let Err(flush) = port.discard_buffers() {
                    warn!("could not discard serial buffers: {}", flush);
                }
                if !e.is_retryable() || attempt >= attempts {
                    debug!("command {} failed: {}", command.number(), e);
                    return Err(e);
                }
                warn!(
                    "command {} failed on attempt {}/{}: {}",
                    command.number(),
                    attempt,
                    attempts,
                    e
                );
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::FrameError;
    use crate::mock::{MockTransport, Reply};

    use std::io::ErrorKind;

    fn read_adc() -> Command {
        Command::empty(1)
    }

    #[test]
    fn success_on_first_attempt() {
        let mut port = MockTransport::new();
        port.push(Reply::frame(1, &[0x01, 0x02]));

        let body = send_command(&mut port, &read_adc(), 2, DEFAULT_ATTEMPTS).unwrap();
        assert_eq!(body.as_slice(), &[0x01, 0x02]);
        assert_eq!(port.written(), &[0x00, 0x01, 0x01, 0x00]);
        assert_eq!(port.discards(), 0);
    }

    #[test]
    fn succeeds_on_last_attempt() {
        let mut port = MockTransport::new();
        for _ in 0..7 {
            port.push(Reply::Fail(ErrorKind::TimedOut));
        }
        port.push(Reply::frame(1, &[0x7F, 0xFF]));

        let body = send_command(&mut port, &read_adc(), 2, DEFAULT_ATTEMPTS).unwrap();
        assert_eq!(body.as_slice(), &[0x7F, 0xFF]);
        assert_eq!(port.commands_written(), 8);
        assert_eq!(port.discards(), 7);
    }

    #[test]
    fn gives_up_after_budget() {
        let mut port = MockTransport::new();
        for _ in 0..7 {
            port.push(Reply::Fail(ErrorKind::TimedOut));
        }
        port.push(Reply::Fail(ErrorKind::BrokenPipe));
        port.push(Reply::frame(1, &[0, 0]));

        let err = send_command(&mut port, &read_adc(), 2, DEFAULT_ATTEMPTS).unwrap_err();
        match err {
            DeviceError::IoError(e) => assert_eq!(e.kind(), ErrorKind::BrokenPipe),
            other => panic!("unexpected error {:?}", other),
        }
        assert_eq!(port.commands_written(), 8);
        assert_eq!(port.discards(), 8);
    }

    #[test]
    fn checksum_errors_are_retried() {
        let mut port = MockTransport::new();
        port.push(Reply::corrupted(1, &[0, 5]));
        port.push(Reply::frame(1, &[0, 5]));

        let body = send_command(&mut port, &read_adc(), 2, DEFAULT_ATTEMPTS).unwrap();
        assert_eq!(body.as_slice(), &[0, 5]);
        assert_eq!(port.commands_written(), 2);
    }

    #[test]
    fn nak_is_not_retried() {
        let mut port = MockTransport::new();
        port.push(Reply::nak(2));
        port.push(Reply::frame(1, &[0, 5]));

        let err = send_command(&mut port, &read_adc(), 2, DEFAULT_ATTEMPTS).unwrap_err();
        assert!(matches!(err, DeviceError::FrameError(FrameError::Nak)));
        assert_eq!(port.commands_written(), 1);
        assert_eq!(port.discards(), 1);
    }

    #[test]
    fn overlong_reply_does_not_leak_into_next_command() {
        let mut port = MockTransport::new();
        // one byte more than the 2 byte body being read
        port.push(Reply::frame(1, &[0, 5, 9]));

        let err = send_command(&mut port, &read_adc(), 2, 1).unwrap_err();
        assert!(matches!(err, DeviceError::FrameError(FrameError::InvalidChecksum(_, _))));
        assert_eq!(port.discards(), 1);

        port.push(Reply::frame(1, &[0, 7]));
        let body = send_command(&mut port, &read_adc(), 2, 1).unwrap();
        assert_eq!(body.as_slice(), &[0, 7]);
    }

    #[test]
    fn short_reply_times_out() {
        let mut port = MockTransport::new();
        port.push(Reply::frame(1, &[0]));

        let err = send_command(&mut port, &read_adc(), 2, 1).unwrap_err();
        assert!(matches!(err, DeviceError::IoError(_)));
    }

    #[test]
    fn zero_attempts_still_sends_once() {
        let mut port = MockTransport::new();
        port.push(Reply::frame(1, &[1, 1]));

        assert!(send_command(&mut port, &read_adc(), 2, 0).is_ok());
        assert_eq!(port.commands_written(), 1);
    }
}
