//! # Serial byte source
//!
//! Couples the transmit side of the transport ([embedded_io::Write]) with the receiving
//! [Consumer] of the ring buffer and a [Timer] used for timeout measurement.
use crate::ring::{Consumer, RingError};
use embedded_io::Write;
use fugit::{TimerDurationU32, TimerInstantU32};
use fugit_timer::Timer;
use log::warn;

/// Default timeout for a single byte read and for transmitting a buffer
pub const DEFAULT_TIMEOUT_MS: u32 = 1_000;

/// Transport level errors. Fatal for the current session, the driver needs to be reinitialized.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum IoError {
    /// Transport reported a failure on sending or receiving
    Transport,

    /// Transport did not accept all bytes within the write timeout
    WriteTimeout,

    /// Received bytes got dropped, since the ring buffer was full
    Overrun,
}

impl From<RingError> for IoError {
    fn from(error: RingError) -> Self {
        match error {
            RingError::Overrun => IoError::Overrun,
            RingError::Fault => IoError::Transport,
        }
    }
}

/// Source of single bytes with timeout
pub trait ByteSource {
    /// Reads exactly one byte. Returns `Ok(None)` if no byte arrived within the given timeout.
    fn read_byte(&mut self, timeout_ms: u32) -> Result<Option<u8>, IoError>;
}

/// Byte level access to the serial transport
pub struct SerialInterface<'a, W: Write, T: Timer<TIMER_HZ>, const TIMER_HZ: u32, const RX_SIZE: usize> {
    /// Transmitting side of the transport
    pub(crate) writer: W,

    /// Receiving side, filled by the hardware receive path
    pub(crate) rx: Consumer<'a, RX_SIZE>,

    /// Timer used for timeout measurement
    pub(crate) timer: T,

    /// Max. time for the transport to accept a buffer
    pub(crate) write_timeout_ms: u32,
}

impl<'a, W: Write, T: Timer<TIMER_HZ>, const TIMER_HZ: u32, const RX_SIZE: usize>
    SerialInterface<'a, W, T, TIMER_HZ, RX_SIZE>
{
    pub fn new(writer: W, rx: Consumer<'a, RX_SIZE>, timer: T) -> Self {
        Self {
            writer,
            rx,
            timer,
            write_timeout_ms: DEFAULT_TIMEOUT_MS,
        }
    }

    /// Sends all bytes. Fails if the transport reports an error or did not accept all bytes in time.
    pub fn write(&mut self, mut data: &[u8]) -> Result<(), IoError> {
        let start = self.timer.now();

        while !data.is_empty() {
            match self.writer.write(data) {
                Ok(0) => {}
                Ok(written) => data = &data[written..],
                Err(_) => {
                    warn!("Transport failed while writing");
                    return Err(IoError::Transport);
                }
            }

            if !data.is_empty() && self.elapsed_ms(start) >= self.write_timeout_ms {
                warn!("Transport write timed out with {} bytes pending", data.len());
                return Err(IoError::WriteTimeout);
            }
        }

        self.writer.flush().map_err(|_| IoError::Transport)
    }

    /// Discards all pending received bytes and clears latched receive errors
    pub fn clear(&mut self) {
        self.rx.clear();
    }

    /// Current timer instant
    pub(crate) fn now(&mut self) -> TimerInstantU32<TIMER_HZ> {
        self.timer.now()
    }

    /// Milliseconds elapsed since the given instant. Robust against timer wraparound.
    pub(crate) fn elapsed_ms(&mut self, since: TimerInstantU32<TIMER_HZ>) -> u32 {
        let ticks = self.timer.now().ticks().wrapping_sub(since.ticks());
        TimerDurationU32::<TIMER_HZ>::from_ticks(ticks).to_millis()
    }

    /// Releases the transport resources
    pub(crate) fn release(self) -> (W, Consumer<'a, RX_SIZE>, T) {
        (self.writer, self.rx, self.timer)
    }
}

impl<W: Write, T: Timer<TIMER_HZ>, const TIMER_HZ: u32, const RX_SIZE: usize> ByteSource
    for SerialInterface<'_, W, T, TIMER_HZ, RX_SIZE>
{
    fn read_byte(&mut self, timeout_ms: u32) -> Result<Option<u8>, IoError> {
        if let Some(byte) = self.rx.pop()? {
            return Ok(Some(byte));
        }

        let start = self.timer.now();
        loop {
            if let Some(byte) = self.rx.pop()? {
                return Ok(Some(byte));
            }

            if self.elapsed_ms(start) >= timeout_ms {
                return Ok(None);
            }
        }
    }
}
