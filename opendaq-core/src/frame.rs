//! Framing for the openDAQ command protocol.
//!
//! Every message on the wire is `checksum (u16 BE) | command | length | body`.
//! The checksum is the wrapping 16 bit sum of every byte after the checksum field.
//! Responses use the same layout, with the command byte replaced by [NAK] when the
//! instrument rejects a command.

use std::fmt::Display;

use arrayvec::ArrayVec;

/// Status byte sent back instead of the command number when a command is rejected.
pub const NAK: u8 = 160;
/// Checksum, command and length bytes in front of every body.
pub const HEADER_LEN: usize = 4;
pub const MAX_BODY_LEN: usize = 255;
pub const MAX_FRAME_LEN: usize = HEADER_LEN + MAX_BODY_LEN;

/// Payload of a command or a response.
pub type Body = ArrayVec<u8, MAX_BODY_LEN>;

/// A command sent from the host to the instrument.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Command {
    number: u8,
    body: Body,
}

impl Command {
    pub fn new(number: u8, data: &[u8]) -> Result<Self, FrameError> {
        let mut body = Body::new();
        body.try_extend_from_slice(data)
            .map_err(|_| FrameError::DataTooLarge)?;

        Ok(Self { number, body })
    }

    /// A command without a body.
    pub fn empty(number: u8) -> Self {
        Self {
            number,
            body: Body::new(),
        }
    }

    pub fn number(&self) -> u8 {
        self.number
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Serializes the command, checksum first.
    pub fn marshal(&self) -> ArrayVec<u8, MAX_FRAME_LEN> {
        let mut raw = ArrayVec::new();
        raw.push(0);
        raw.push(0);
        raw.push(self.number);
        raw.push(self.body.len() as u8);
        // the body is bounded by MAX_BODY_LEN so the frame always fits
        let _ = raw.try_extend_from_slice(&self.body);

        let ck = calculate_checksum(&raw[2..]).to_be_bytes();
        raw[0] = ck[0];
        raw[1] = ck[1];
        raw
    }
}

/// A response read back from the instrument.
#[derive(Debug, PartialEq, Eq)]
pub struct Response {
    checksum: u16,
    status: u8,
    data_length: u8,
    data: Body,
}

impl Response {
    /// Validates a raw response and splits it into its fields.
    ///
    /// The checksum is checked first, then the NAK status, then the declared length.
    pub fn from_bytes(data: &[u8]) -> Result<Self, FrameError> {
        if data.len() < HEADER_LEN {
            return Err(FrameError::NotEnoughData(HEADER_LEN, data.len()));
        }

        let checksum = u16::from_be_bytes([data[0], data[1]]);
        let calculated = calculate_checksum(&data[2..]);
        if checksum != calculated {
            return Err(FrameError::InvalidChecksum(checksum, calculated));
        }

        let status = data[2];
        if status == NAK {
            return Err(FrameError::Nak);
        }

        let data_length = data[3];
        if data_length as usize != data.len() - HEADER_LEN {
            return Err(FrameError::InvalidLength(
                data_length,
                data.len() - HEADER_LEN,
            ));
        }

        let mut body = Body::new();
        body.try_extend_from_slice(&data[HEADER_LEN..])
            .map_err(|_| FrameError::DataTooLarge)?;

        Ok(Self {
            checksum,
            status,
            data_length,
            data: body,
        })
    }

    pub fn get_checksum(&self) -> u16 {
        self.checksum
    }

    /// The command number echoed by the instrument.
    pub fn get_status(&self) -> u8 {
        self.status
    }

    pub fn get_length(&self) -> u8 {
        self.data_length
    }

    pub fn into_data(self) -> Body {
        self.data
    }
}

/// Parses a raw response and returns its body.
pub fn parse(data: &[u8]) -> Result<Body, FrameError> {
    Response::from_bytes(data).map(Response::into_data)
}

pub fn calculate_checksum(data: &[u8]) -> u16 {
    data.iter()
        .fold(0_u16, |acc, &b| acc.wrapping_add(u16::from(b)))
}

/// Checks that a body holds at least `expected` bytes before it is decoded.
pub fn expect_len(body: &[u8], expected: usize) -> Result<&[u8], FrameError> {
    if body.len() < expected {
        return Err(FrameError::NotEnoughData(expected, body.len()));
    }
    Ok(&body[..expected])
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameError {
    /// The body did not fit in a single frame.
    DataTooLarge,
    /// Expected at least the first value in bytes, found the second.
    NotEnoughData(usize, usize),
    /// The checksum recived was the first value when the second was calculated.
    InvalidChecksum(u16, u16),
    /// The length field was the first value but the frame carried the second.
    InvalidLength(u8, usize),
    /// The instrument rejected the command.
    Nak,
}

impl Display for FrameError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DataTooLarge => {
                write!(f, "data exceeded maximum body length of {}", MAX_BODY_LEN)
            }
            Self::NotEnoughData(expected, found) => {
                write!(f, "expected at least {} bytes, found {} bytes", expected, found)
            }
            Self::InvalidChecksum(recived, expected) => write!(
                f,
                "checksum recived: {:#06x} did not match expected value: {:#06x}",
                recived, expected
            ),
            Self::InvalidLength(declared, found) => write!(
                f,
                "length field declared {} bytes but the frame carried {}",
                declared, found
            ),
            Self::Nak => write!(f, "NAK response received"),
        }
    }
}

impl std::error::Error for FrameError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checksum_skips_nothing_it_is_given() {
        assert_eq!(calculate_checksum(&[]), 0);
        assert_eq!(calculate_checksum(&[1, 2, 3]), 6);
        assert_eq!(calculate_checksum(&[0xFF; 4]), 0x03FC);
    }

    #[test]
    fn checksum_wraps() {
        let data = [0xFF_u8; 300];
        let expected = (300_u32 * 0xFF) as u16;
        assert_eq!(calculate_checksum(&data), expected);
    }

    #[test]
    fn marshal_info_request() {
        let raw = Command::empty(39).marshal();
        assert_eq!(raw.as_slice(), &[0x00, 39, 39, 0]);
    }

    #[test]
    fn marshal_configure_adc() {
        let raw = Command::new(2, &[1, 0, 1, 20]).unwrap().marshal();
        // 2 + 4 + 1 + 0 + 1 + 20
        assert_eq!(raw.as_slice(), &[0x00, 28, 2, 4, 1, 0, 1, 20]);
    }

    #[test]
    fn marshal_checksum_is_big_endian() {
        let raw = Command::new(13, &[0xFF, 0xFF, 0xFF]).unwrap().marshal();
        // 13 + 3 + 3 * 255 = 781
        assert_eq!(&raw[..2], &[0x03, 0x0D]);
    }

    #[test]
    fn body_too_large() {
        let data = [0_u8; 256];
        assert_eq!(Command::new(1, &data), Err(FrameError::DataTooLarge));
        assert!(Command::new(1, &data[..255]).is_ok());
    }

    #[test]
    fn parse_returns_marshaled_body() {
        let bodies: [&[u8]; 4] = [&[], &[0x7E], &[1, 2, 3, 4, 5, 6], &[0xAB; 255]];
        for body in bodies {
            let raw = Command::new(36, body).unwrap().marshal();
            assert_eq!(parse(&raw).unwrap().as_slice(), body);
        }
    }

    #[test]
    fn parse_rejects_bad_checksum() {
        let mut raw = Command::new(1, &[0x01, 0x02]).unwrap().marshal();
        raw[5] ^= 0x10;
        assert!(matches!(parse(&raw), Err(FrameError::InvalidChecksum(_, _))));
    }

    #[test]
    fn parse_checks_checksum_before_nak() {
        let mut raw = Command::new(NAK, &[]).unwrap().marshal();
        assert_eq!(parse(&raw), Err(FrameError::Nak));
        raw[1] = raw[1].wrapping_add(1);
        assert!(matches!(parse(&raw), Err(FrameError::InvalidChecksum(_, _))));
    }

    #[test]
    fn parse_rejects_length_mismatch() {
        // length field says 3, only 2 body bytes present
        let mut raw = [0_u8, 0, 1, 3, 9, 9];
        let ck = calculate_checksum(&raw[2..]).to_be_bytes();
        raw[0] = ck[0];
        raw[1] = ck[1];
        assert_eq!(parse(&raw), Err(FrameError::InvalidLength(3, 2)));
    }

    #[test]
    fn parse_short_frame() {
        assert_eq!(parse(&[0, 1]), Err(FrameError::NotEnoughData(4, 2)));
    }

    #[test]
    fn response_fields() {
        let raw = Command::new(39, &[1, 2]).unwrap().marshal();
        let response = Response::from_bytes(&raw).unwrap();
        assert_eq!(response.get_status(), 39);
        assert_eq!(response.get_checksum(), 39 + 2 + 1 + 2);
        assert_eq!(response.get_length(), 2);
    }

    #[test]
    fn expect_len_guards_short_bodies() {
        assert_eq!(expect_len(&[1, 2, 3], 2).unwrap(), &[1, 2]);
        assert_eq!(expect_len(&[1], 2), Err(FrameError::NotEnoughData(2, 1)));
    }
}
