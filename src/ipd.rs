//! # Inbound data decoder
//!
//! Reconstructs socket payload delivered inline on the serial stream as `+IPD,<length>:<payload>`
//! frames. Protocol markers are only searched for between frames. Inside a frame the declared
//! length is counted down, so payload bytes are copied verbatim, even if they look like a token.
use crate::engine::{
    ProtocolError, TransactionError, CLOSED_TOKEN, ERROR_TOKEN, IPD_END_TOKEN, IPD_TOKEN, MAX_RESPONSE_SIZE,
};
use crate::serial::ByteSource;
use log::{debug, trace};

/// Max. non-payload bytes scanned since the last frame before a receive call ends
pub(crate) const MAX_SCAN_LENGTH: usize = 8192;

/// Max. digits of the chunk length field
const MAX_LENGTH_DIGITS: usize = 5;

/// Window size for marker detection, needs to hold the longest marker
const WINDOW_SIZE: usize = 16;

/// Decoder state
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum State {
    /// Scanning protocol bytes for the next frame prefix or a terminating marker
    AwaitingHeader,

    /// Parsing the decimal chunk length up to the colon
    HeaderLength { length: usize, digits: usize },

    /// Copying payload, the given number of bytes is still outstanding
    Payload { remaining: usize },
}

/// Outcome of a receive call
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) struct Received {
    /// Payload bytes written to the buffer
    pub length: usize,

    /// A `CLOSED` notification was observed between frames
    pub closed: bool,
}

/// Decoder for `+IPD` frames. Lives for a single receive call.
pub(crate) struct ChunkDecoder {
    state: State,

    /// Trailing protocol bytes since the last frame
    window: [u8; WINDOW_SIZE],
    window_len: usize,

    /// Protocol bytes scanned since the last frame
    scanned: usize,
}

impl ChunkDecoder {
    pub fn new() -> Self {
        Self {
            state: State::AwaitingHeader,
            window: [0x0; WINDOW_SIZE],
            window_len: 0,
            scanned: 0,
        }
    }

    /// Reads frames from the source and writes their payload to the buffer.
    ///
    /// Ends successfully if no more data arrives between frames, the end-of-data marker is seen,
    /// the module reports a closed connection or the buffer is full after a completed frame. At most
    /// [MAX_RESPONSE_SIZE] bytes are written, even if the buffer is larger.
    pub fn receive<S: ByteSource>(
        &mut self,
        source: &mut S,
        buffer: &mut [u8],
        timeout_ms: u32,
    ) -> Result<Received, TransactionError> {
        // Larger buffers are only filled up to the receive limit
        let limit = buffer.len().min(MAX_RESPONSE_SIZE);
        let buffer = &mut buffer[..limit];
        let mut position = 0;
        let mut closed = false;

        loop {
            let byte = match source.read_byte(timeout_ms)? {
                Some(byte) => byte,
                None => return self.end_of_stream(position, closed),
            };

            match self.state {
                State::AwaitingHeader => {
                    self.scanned += 1;
                    self.push_window(byte);

                    if self.window_ends_with(IPD_TOKEN) {
                        self.state = State::HeaderLength { length: 0, digits: 0 };
                    } else if self.window_ends_with(ERROR_TOKEN) {
                        debug!("Module reported error while receiving");
                        return Err(TransactionError::Protocol(ProtocolError::ErrorResponse));
                    } else if self.window_ends_with(IPD_END_TOKEN) {
                        return Ok(Received { length: position, closed });
                    } else if self.window_ends_with(CLOSED_TOKEN) {
                        debug!("Connection closed by remote");
                        closed = true;
                    }

                    if self.scanned >= MAX_SCAN_LENGTH && self.state == State::AwaitingHeader {
                        return Ok(Received { length: position, closed });
                    }
                }
                State::HeaderLength { length, digits } => {
                    if byte == b':' && digits > 0 {
                        trace!("Receiving chunk of {} bytes", length);
                        self.state = State::Payload { remaining: length };
                    } else if byte.is_ascii_digit() && digits < MAX_LENGTH_DIGITS {
                        self.state = State::HeaderLength {
                            length: length * 10 + (byte - b'0') as usize,
                            digits: digits + 1,
                        };
                    } else {
                        debug!("Invalid chunk header byte {:#04x}", byte);
                        return Err(TransactionError::Protocol(ProtocolError::InvalidHeader));
                    }
                }
                State::Payload { remaining } => {
                    if position >= buffer.len() {
                        return Err(TransactionError::Overflow);
                    }

                    buffer[position] = byte;
                    position += 1;
                    self.state = State::Payload { remaining: remaining - 1 };
                }
            }

            // Zero length chunks complete without reading any payload byte
            if self.state == (State::Payload { remaining: 0 }) {
                self.finish_chunk();

                if position >= buffer.len() {
                    return Ok(Received { length: position, closed });
                }
            }
        }
    }

    /// Handles a read timeout
    fn end_of_stream(&self, position: usize, closed: bool) -> Result<Received, TransactionError> {
        match self.state {
            State::AwaitingHeader if !self.partial_header() => Ok(Received { length: position, closed }),
            _ => {
                debug!("Frame truncated in state {:?}", self.state);
                Err(TransactionError::Protocol(ProtocolError::TruncatedFrame))
            }
        }
    }

    fn finish_chunk(&mut self) {
        self.state = State::AwaitingHeader;
        self.window_len = 0;
        self.scanned = 0;
    }

    fn push_window(&mut self, byte: u8) {
        if self.window_len == WINDOW_SIZE {
            self.window.copy_within(1.., 0);
            self.window_len -= 1;
        }

        self.window[self.window_len] = byte;
        self.window_len += 1;
    }

    fn window_ends_with(&self, marker: &[u8]) -> bool {
        self.window[..self.window_len].ends_with(marker)
    }

    /// True if the window ends with a strict prefix of the frame header
    fn partial_header(&self) -> bool {
        (1..IPD_TOKEN.len()).any(|length| self.window_ends_with(&IPD_TOKEN[..length]))
    }
}
