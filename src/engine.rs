//! # AT transaction engine
//!
//! Issues one command at a time and accumulates the reply until a success token, the error token
//! or the capacity limit is reached. Matching is done on the accumulated bytes instead of lines,
//! as not all replies are line terminated (e.g. the send prompt `>`).
//!
//! The response accumulator is owned by the engine and borrowed by the returned response, so a
//! second transaction can't be started while a previous response is still in use.
use crate::ipd::ChunkDecoder;
use crate::ring::Consumer;
use crate::serial::{ByteSource, IoError, SerialInterface, DEFAULT_TIMEOUT_MS};
use embedded_io::Write;
use fugit_timer::Timer;
use heapless::Vec;
use log::{debug, trace, warn};

/// Max. length of a formatted command
pub const MAX_COMMAND_SIZE: usize = 256;

/// Capacity of the response accumulator
pub const MAX_RESPONSE_SIZE: usize = 8 * 1024;

/// Generic success token
pub const OK_TOKEN: &[u8] = b"OK\r\n";

/// Success token of connection establishment
pub const CONNECT_TOKEN: &[u8] = b"CONNECT\r\n";

/// Module is ready to receive raw socket data
pub const SEND_PROMPT_TOKEN: &[u8] = b"OK\r\n\r\n>";

/// Raw socket data was transmitted
pub const SEND_OK_TOKEN: &[u8] = b"SEND OK\r\n";

/// Generic error token
pub const ERROR_TOKEN: &[u8] = b"ERROR\r\n";

/// Prefix of inbound socket data frames
pub const IPD_TOKEN: &[u8] = b"+IPD,";

/// End of inbound socket data
pub const IPD_END_TOKEN: &[u8] = b"OK\r\n\r\n";

/// Connection got closed
pub const CLOSED_TOKEN: &[u8] = b"CLOSED\r\n";

/// Errors of a single transaction
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TransactionError {
    /// Transport failure, driver needs to be reinitialized
    Io(IoError),

    /// No terminal token observed in time. May be retried.
    Timeout,

    /// Module responded with an error or sent an invalid frame
    Protocol(ProtocolError),

    /// Command, response or payload exceeded a fixed capacity
    Overflow,
}

/// Details of [TransactionError::Protocol]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ProtocolError {
    /// Module replied with `ERROR`
    ErrorResponse,

    /// Data stopped inside a declared frame
    TruncatedFrame,

    /// Frame length field is not a decimal number terminated by a colon
    InvalidHeader,
}

impl From<IoError> for TransactionError {
    fn from(error: IoError) -> Self {
        TransactionError::Io(error)
    }
}

/// Synchronous command/response engine on top of [SerialInterface]
pub struct AtEngine<'a, W: Write, T: Timer<TIMER_HZ>, const TIMER_HZ: u32, const RX_SIZE: usize> {
    /// Serial byte source
    pub(crate) serial: SerialInterface<'a, W, T, TIMER_HZ, RX_SIZE>,

    /// Response of the current/last transaction
    response: Vec<u8, MAX_RESPONSE_SIZE>,

    /// Timeout for reading a single byte
    pub(crate) byte_timeout_ms: u32,

    /// Module signaled a closed connection since the flag got last taken
    peer_closed: bool,
}

impl<'a, W: Write, T: Timer<TIMER_HZ>, const TIMER_HZ: u32, const RX_SIZE: usize> AtEngine<'a, W, T, TIMER_HZ, RX_SIZE> {
    pub fn new(writer: W, rx: Consumer<'a, RX_SIZE>, timer: T) -> Self {
        Self {
            serial: SerialInterface::new(writer, rx, timer),
            response: Vec::new(),
            byte_timeout_ms: DEFAULT_TIMEOUT_MS,
            peer_closed: false,
        }
    }

    /// Sends the command and waits until the response contains the given token.
    ///
    /// The whole transaction is bounded by `timeout_ms`. On success the accumulated response is returned.
    pub fn execute(&mut self, command: &[u8], token: &[u8], timeout_ms: u32) -> Result<&[u8], TransactionError> {
        self.response.clear();
        trace!("Sending {} command bytes", command.len());

        self.serial.write(command)?;
        self.collect(token, timeout_ms)?;
        Ok(self.response.as_slice())
    }

    /// Waits for the given token without sending anything, e.g. for catching unsolicited messages
    pub fn await_token(&mut self, token: &[u8], timeout_ms: u32) -> Result<&[u8], TransactionError> {
        self.response.clear();
        self.collect(token, timeout_ms)?;
        Ok(self.response.as_slice())
    }

    /// Receives socket data delivered as `+IPD` frames and returns the payload length written to the buffer
    pub fn receive(&mut self, buffer: &mut [u8]) -> Result<usize, TransactionError> {
        let received = ChunkDecoder::new().receive(&mut self.serial, buffer, self.byte_timeout_ms)?;
        self.peer_closed |= received.closed;
        Ok(received.length)
    }

    /// Response accumulated by the last transaction, also available if the transaction failed
    pub fn response(&self) -> &[u8] {
        &self.response
    }

    /// Returns true once if a closed connection was signaled by the module
    pub(crate) fn take_peer_closed(&mut self) -> bool {
        core::mem::take(&mut self.peer_closed)
    }

    /// Reads bytes until a terminal condition is met
    fn collect(&mut self, token: &[u8], timeout_ms: u32) -> Result<(), TransactionError> {
        let start = self.serial.now();

        loop {
            let elapsed = self.serial.elapsed_ms(start);
            if elapsed >= timeout_ms {
                warn!("Transaction timed out after {} ms ({} bytes received)", elapsed, self.response.len());
                return Err(TransactionError::Timeout);
            }

            let byte_timeout = self.byte_timeout_ms.min(timeout_ms - elapsed);
            let byte = match self.serial.read_byte(byte_timeout)? {
                Some(byte) => byte,
                None => continue,
            };

            if self.response.push(byte).is_err() || self.response.is_full() {
                warn!("Response exceeded {} bytes", MAX_RESPONSE_SIZE);
                return Err(TransactionError::Overflow);
            }

            if self.response.ends_with(CLOSED_TOKEN) {
                debug!("Connection closed by remote");
                self.peer_closed = true;
            }

            if self.response.ends_with(token) {
                return Ok(());
            }

            if self.response.ends_with(ERROR_TOKEN) {
                debug!("Module responded with error");
                return Err(TransactionError::Protocol(ProtocolError::ErrorResponse));
            }
        }
    }

    /// Releases the transport resources
    pub(crate) fn release(self) -> (W, Consumer<'a, RX_SIZE>, T) {
        self.serial.release()
    }
}
