//! In-memory transport that answers commands from a script, for testing without an instrument.

use std::collections::VecDeque;
use std::io::{self, ErrorKind, Read, Write};

use crate::frame::{calculate_checksum, HEADER_LEN, NAK};
use crate::transport::Transport;

/// What the instrument does after a command is written.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Reply {
    /// These bytes become readable.
    Bytes(Vec<u8>),
    /// The next read fails with this error kind.
    Fail(ErrorKind),
}

impl Reply {
    /// A well formed response frame.
    pub fn frame(status: u8, body: &[u8]) -> Self {
        let mut raw = vec![0, 0, status, body.len() as u8];
        raw.extend_from_slice(body);
        let ck = calculate_checksum(&raw[2..]).to_be_bytes();
        raw[..2].copy_from_slice(&ck);
        Self::Bytes(raw)
    }

    /// A response frame whose checksum is off by one.
    pub fn corrupted(status: u8, body: &[u8]) -> Self {
        match Self::frame(status, body) {
            Self::Bytes(mut raw) => {
                raw[1] = raw[1].wrapping_add(1);
                Self::Bytes(raw)
            }
            fail => fail,
        }
    }

    /// A rejection padded to `body_len` bytes so it fills the expected read.
    pub fn nak(body_len: usize) -> Self {
        Self::frame(NAK, &vec![0; body_len])
    }
}

type Responder = Box<dyn FnMut(u8, &[u8]) -> Reply + Send>;

/// Queued replies are used first, in order. Once the queue is empty the
/// responder, if any, answers. Without either, reads time out.
#[derive(Default)]
pub struct MockTransport {
    replies: VecDeque<Reply>,
    responder: Option<Responder>,
    pending: VecDeque<u8>,
    failure: Option<ErrorKind>,
    commands: Vec<Vec<u8>>,
    discards: usize,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// A transport answering every command through `responder`, which gets the
    /// command number and body.
    pub fn with_responder<F>(responder: F) -> Self
    where
        F: FnMut(u8, &[u8]) -> Reply + Send + 'static,
    {
        Self {
            responder: Some(Box::new(responder)),
            ..Self::default()
        }
    }

    pub fn push(&mut self, reply: Reply) {
        self.replies.push_back(reply);
    }

    /// Every byte written so far.
    pub fn written(&self) -> Vec<u8> {
        self.commands.concat()
    }

    /// Raw frames written so far, one per command.
    pub fn commands(&self) -> &[Vec<u8>] {
        &self.commands
    }

    pub fn commands_written(&self) -> usize {
        self.commands.len()
    }

    /// How many times the buffers were discarded.
    pub fn discards(&self) -> usize {
        self.discards
    }

    fn answer(&mut self, raw: &[u8]) -> Option<Reply> {
        if let Some(reply) = self.replies.pop_front() {
            return Some(reply);
        }
        let responder = self.responder.as_mut()?;
        if raw.len() < HEADER_LEN {
            return None;
        }
        Some(responder(raw[2], &raw[HEADER_LEN..]))
    }
}

impl Write for MockTransport {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.commands.push(buf.to_vec());
        match self.answer(buf) {
            Some(Reply::Bytes(bytes)) => self.pending.extend(bytes),
            Some(Reply::Fail(kind)) => self.failure = Some(kind),
            None => {}
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Read for MockTransport {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if let Some(kind) = self.failure.take() {
            return Err(io::Error::new(kind, "scripted failure"));
        }
        if self.pending.is_empty() {
            return Err(io::Error::new(ErrorKind::TimedOut, "no reply"));
        }
        let n = buf.len().min(self.pending.len());
        for (dst, src) in buf.iter_mut().zip(self.pending.drain(..n)) {
            *dst = src;
        }
        Ok(n)
    }
}

impl Transport for MockTransport {
    fn discard_buffers(&mut self) -> io::Result<()> {
        self.pending.clear();
        self.failure = None;
        self.discards += 1;
        Ok(())
    }
}
