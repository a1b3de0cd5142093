//! # ESP-AT serial driver
//!
//! Blocking driver for ESP8266 modules running the ESP-AT firmware, connected by a serial line.
//!
//! Received bytes are expected to be pushed to a [ring::RingBuffer] by the hardware receive path
//! (e.g. an UART interrupt handler), while commands are written by the driver through an
//! [embedded_io::Write] transport.
//!
//! Network functionality is provided by [wifi::Adapter]:
//! * Module setup, joining access points and address information: [wifi]
//! * A single TCP connection or UDP transmission, also as [embedded_nal::TcpClientStack]: [stack]
//! * SNTP time: [sntp]
//! * MQTT client of the module firmware: [mqtt]
//!
//! The lower layers ([serial], [engine]) may also be used directly for issuing custom commands.
#![cfg_attr(not(test), no_std)]
#![cfg_attr(feature = "strict", deny(warnings))]

pub(crate) mod commands;
pub mod engine;
pub(crate) mod ipd;
pub mod mqtt;
pub(crate) mod responses;
pub mod ring;
pub mod serial;
pub mod sntp;
pub mod stack;
pub mod wifi;

#[cfg(feature = "examples")]
pub mod example;

#[cfg(test)]
mod tests;
