//! # SNTP time
//!
//! The module synchronizes its clock using the built-in SNTP client. The time is returned as
//! formatted by the module, e.g. `Thu Aug 04 14:48:05 2016`.
use crate::commands::{SntpConfigCommand, SntpTimeCommand};
use crate::engine::TransactionError;
use crate::responses::field_after;
use crate::wifi::Adapter;
use core::str::from_utf8;
use embedded_io::Write;
use fugit_timer::Timer;
use heapless::String;

/// Max. length of the time string
pub const MAX_TIME_LENGTH: usize = 32;

/// Errors of the SNTP client
#[derive(Clone, Debug, PartialEq)]
pub enum SntpError {
    /// Error while configuring the SNTP client
    ConfigError(TransactionError),

    /// Error while querying the time
    QueryError(TransactionError),

    /// Response does not contain a valid time string
    InvalidResponse,
}

impl<W: Write, T: Timer<TIMER_HZ>, const TIMER_HZ: u32, const RX_SIZE: usize> Adapter<'_, W, T, TIMER_HZ, RX_SIZE> {
    /// Enables the SNTP client with the given server and UTC offset in hours
    pub fn configure_sntp(&mut self, server: &str, timezone: i8) -> Result<(), SntpError> {
        self.send_command(SntpConfigCommand::new(timezone, server))?;
        Ok(())
    }

    /// Returns the current time string of the module
    pub fn get_sntp_time(&mut self) -> Result<String<MAX_TIME_LENGTH>, SntpError> {
        let response = self.send_command(SntpTimeCommand)?;

        let time = field_after(response, b"+CIPSNTPTIME:", b'\r').ok_or(SntpError::InvalidResponse)?;
        let time = from_utf8(time).map_err(|_| SntpError::InvalidResponse)?;

        let mut result = String::new();
        result.push_str(time.trim()).map_err(|_| SntpError::InvalidResponse)?;
        Ok(result)
    }
}
