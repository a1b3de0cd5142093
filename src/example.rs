//! Mocks for doc examples
use crate::ring::Producer;
use embedded_io::{ErrorKind, ErrorType, Write};
use fugit::{TimerDurationU32, TimerInstantU32};
use fugit_timer::Timer;
use heapless::Vec;

/// Transport mock, which answers known commands by feeding a canned reply to the ring buffer
pub struct ExampleTransport<'a, const N: usize> {
    /// Receive path of the simulated module
    producer: Producer<'a, N>,

    /// Bytes written since the last flush
    written: Vec<u8, 256>,
}

impl<'a, const N: usize> ExampleTransport<'a, N> {
    pub fn new(producer: Producer<'a, N>) -> Self {
        Self {
            producer,
            written: Vec::new(),
        }
    }

    fn reply(&self) -> &'static [u8] {
        match self.written.as_slice() {
            b"ATE0\r\n" | b"AT+CWMODE=1\r\n" | b"AT+CIPMUX=0\r\n" | b"AT+RST\r\n" | b"AT+CWQAP\r\n" => {
                b"\r\nOK\r\n"
            }
            b"AT+CWJAP=\"test_wifi\",\"secret\"\r\n" => b"WIFI CONNECTED\r\nWIFI GOT IP\r\n\r\nOK\r\n",
            b"AT+CIFSR\r\n" => b"+CIFSR:STAIP,\"10.0.0.181\"\r\n+CIFSR:STAMAC,\"10:fe:ed:05:ba:50\"\r\n\r\nOK\r\n",
            b"AT+CIPSTART=\"TCP\",\"10.0.0.1\",21\r\n" => b"CONNECT\r\n\r\nOK\r\n",
            b"AT+CIPSEND=6\r\n" => b"\r\nOK\r\n\r\n>",
            b"hallo!" => b"\r\nRecv 6 bytes\r\n\r\nSEND OK\r\n\r\n+IPD,16:nice to see you!\r\nOK\r\n\r\n",
            b"AT+CIPCLOSE\r\n" => b"CLOSED\r\n\r\nOK\r\n",
            _ => b"\r\nERROR\r\n",
        }
    }
}

impl<const N: usize> ErrorType for ExampleTransport<'_, N> {
    type Error = ErrorKind;
}

impl<const N: usize> Write for ExampleTransport<'_, N> {
    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        let length = buf.len().min(self.written.capacity() - self.written.len());
        if length == 0 && !buf.is_empty() {
            return Err(ErrorKind::OutOfMemory);
        }

        self.written.extend_from_slice(&buf[..length]).map_err(|_| ErrorKind::OutOfMemory)?;
        Ok(length)
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        let reply = self.reply();
        self.written.clear();

        self.producer.push_slice(reply).map_err(|_| ErrorKind::OutOfMemory)?;
        Ok(())
    }
}

/// Timer mock, advancing by one millisecond on every clock read
#[derive(Default)]
pub struct ExampleTimer {
    ticks: u32,
}

impl Timer<1_000_000> for ExampleTimer {
    type Error = u32;

    fn now(&mut self) -> TimerInstantU32<1_000_000> {
        self.ticks = self.ticks.wrapping_add(1_000);
        TimerInstantU32::from_ticks(self.ticks)
    }

    fn start(&mut self, _duration: TimerDurationU32<1_000_000>) -> Result<(), Self::Error> {
        Ok(())
    }

    fn cancel(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }

    fn wait(&mut self) -> nb::Result<(), Self::Error> {
        nb::Result::Ok(())
    }
}
