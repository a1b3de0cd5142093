//! # WIFI access point client
//!
//! Module setup, joining a network and obtaining address information.
//!
//! All operations are blocking and bounded by the timeout of the respective command. Only one
//! command is in flight at a time, which is enforced by the `&mut self` receivers.
//!
//! ## Example
//!
//! ````
//! # use esp_at_serial::example::{ExampleTimer, ExampleTransport};
//! # use esp_at_serial::ring::RingBuffer;
//! use esp_at_serial::wifi::{Adapter, WifiAdapter};
//!
//! let mut ring: RingBuffer<1024> = RingBuffer::new();
//! let (producer, consumer) = ring.split();
//!
//! // The transport writes commands to the module, the hardware receive path feeds the producer
//! let transport = ExampleTransport::new(producer);
//! let mut adapter: Adapter<_, _, 1_000_000, 1024> = Adapter::new(transport, consumer, ExampleTimer::default());
//! adapter.init().unwrap();
//!
//! // Setting target WIFI access point
//! let state = adapter.join("test_wifi", "secret").unwrap();
//! assert!(state.connected);
//! assert!(state.ip_assigned);
//!
//! let address = adapter.get_address().unwrap();
//! assert_eq!("10:fe:ed:05:ba:50", address.mac.unwrap().as_str());
//! assert_eq!("10.0.0.181", address.ipv4.unwrap().to_string());
//! ````
use crate::commands::{
    AccessPointConnectCommand, AccessPointDisconnectCommand, AtCommand, CommandErrorHandler, EchoCommand,
    ObtainLocalAddressCommand, RestartCommand, SetMultipleConnectionsCommand, WifiModeCommand,
};
use crate::engine::{AtEngine, TransactionError};
use crate::responses::{contains, field_after};
use crate::ring::Consumer;
use crate::stack::Connection;
use core::fmt::Debug;
use core::net::Ipv4Addr;
use core::str::FromStr;
use embedded_io::Write;
use fugit_timer::Timer;
use heapless::String;
use log::{debug, info};

/// Default timeout for transmitting socket data
const DEFAULT_SEND_TIMEOUT_MS: u32 = 5_000;

/// Wifi network adapter trait
pub trait WifiAdapter {
    /// Error when joining a WIFI network
    type JoinError: Debug;

    /// Error when receiving local address information
    type AddressError: Debug;

    /// Connects to an WIFI access point and returns the connection state
    fn join(&mut self, ssid: &str, key: &str) -> Result<JoinState, Self::JoinError>;

    /// Returns the last known WIFI connection status
    fn get_join_status(&mut self) -> JoinState;

    /// Returns local address information
    fn get_address(&mut self) -> Result<LocalAddress, Self::AddressError>;
}

/// Central client for network communication
///
/// TIMER_HZ: Frequency of the timer used for timeout measurement
///
/// RX_SIZE: Size of the receive ring buffer, which holds `RX_SIZE - 1` bytes
pub struct Adapter<'a, W: Write, T: Timer<TIMER_HZ>, const TIMER_HZ: u32, const RX_SIZE: usize> {
    /// AT transaction engine
    pub(crate) engine: AtEngine<'a, W, T, TIMER_HZ, RX_SIZE>,

    /// Network state
    pub(crate) session: Session,
}

/// Network state of the adapter
pub(crate) struct Session {
    /// Currently joined to WIFI network?
    pub(crate) joined: bool,

    /// True if an IP was assigned by access point
    pub(crate) ip_assigned: bool,

    /// Currently established connection
    pub(crate) connection: Option<Connection>,

    /// True if the socket of the TCP stack is handed out
    pub(crate) socket_in_use: bool,

    /// Timeout for data transmission
    pub(crate) send_timeout_ms: u32,
}

impl Session {
    fn new(send_timeout_ms: u32) -> Self {
        Self {
            joined: false,
            ip_assigned: false,
            connection: None,
            socket_in_use: false,
            send_timeout_ms,
        }
    }
}

/// Possible errors when initializing the module
#[derive(Clone, Debug, PartialEq)]
pub enum InitError {
    /// Error while disabling command echo
    EchoError(TransactionError),

    /// Error wile setting WIFI mode to station
    ModeError(TransactionError),

    /// Error while switching to single connection mode
    SingleConnectionError(TransactionError),
}

/// Possible errors when joining an access point
#[derive(Clone, Debug, PartialEq)]
pub enum JoinError {
    /// Error while setting WIFI credentials
    ConnectError(TransactionError),

    /// Given SSD is longer then the max. size of 32 chars
    InvalidSSDLength,

    /// Given password is longer then the max. size of 64 chars
    InvalidPasswordLength,
}

/// Errors of simple module commands
#[derive(Clone, Debug, PartialEq)]
pub enum CommandError {
    /// Restart command failed
    RestartFailed(TransactionError),

    /// Disconnecting from the access point failed
    DisconnectFailed(TransactionError),
}

/// Errors when receiving local address information
#[derive(Clone, Debug, PartialEq)]
pub enum AddressErrors {
    /// CIFSR command failed
    CommandError(TransactionError),

    /// Error while parsing addresses
    AddressParseError,
}

/// Current WIFI connection state
#[derive(Copy, Clone, Debug)]
pub struct JoinState {
    /// True if connected to an WIFI access point
    pub connected: bool,

    /// True if an IP was assigned
    pub ip_assigned: bool,
}

/// Transport resources handed back by [Adapter::deinit]
pub struct Released<'a, W, T, const RX_SIZE: usize> {
    /// Transmitting side of the transport
    pub writer: W,

    /// Receiving side of the ring buffer
    pub rx: Consumer<'a, RX_SIZE>,

    /// Timer
    pub timer: T,
}

impl<W: Write, T: Timer<TIMER_HZ>, const TIMER_HZ: u32, const RX_SIZE: usize> WifiAdapter
    for Adapter<'_, W, T, TIMER_HZ, RX_SIZE>
{
    type JoinError = JoinError;
    type AddressError = AddressErrors;

    /// Connects to an WIFI access point and returns the connection state
    ///
    /// The state is derived from the `WIFI CONNECTED` and `WIFI GOT IP` messages of the response.
    fn join(&mut self, ssid: &str, key: &str) -> Result<JoinState, JoinError> {
        if ssid.len() > 32 {
            return Err(JoinError::InvalidSSDLength);
        }

        if key.len() > 64 {
            return Err(JoinError::InvalidPasswordLength);
        }

        let response = self.send_command(AccessPointConnectCommand::new(ssid, key))?;
        let connected = contains(response, b"WIFI CONNECTED");
        let ip_assigned = contains(response, b"WIFI GOT IP");

        self.session.joined = connected;
        self.session.ip_assigned = ip_assigned;
        info!("Joined access point (ip assigned: {})", ip_assigned);

        Ok(self.get_join_status())
    }

    /// Returns the WIFI connection status as observed by the last join/quit
    fn get_join_status(&mut self) -> JoinState {
        JoinState {
            connected: self.session.joined,
            ip_assigned: self.session.ip_assigned,
        }
    }

    /// Returns local address information
    fn get_address(&mut self) -> Result<LocalAddress, AddressErrors> {
        let response = self.send_command(ObtainLocalAddressCommand)?;
        LocalAddress::from_response(response)
    }
}

impl<'a, W: Write, T: Timer<TIMER_HZ>, const TIMER_HZ: u32, const RX_SIZE: usize> Adapter<'a, W, T, TIMER_HZ, RX_SIZE> {
    /// Creates a new network adapter. Call [Adapter::init] before issuing other commands.
    pub fn new(writer: W, rx: Consumer<'a, RX_SIZE>, timer: T) -> Self {
        Self {
            engine: AtEngine::new(writer, rx, timer),
            session: Session::new(DEFAULT_SEND_TIMEOUT_MS),
        }
    }

    /// (Re)initializes the module: Discards stale received data, disables command echo,
    /// enables station mode and single connection mode.
    ///
    /// Also recovers from transport errors latched by the receive path.
    pub fn init(&mut self) -> Result<(), InitError> {
        self.engine.serial.clear();
        self.engine.take_peer_closed();
        self.session = Session::new(self.session.send_timeout_ms);

        self.send_command(EchoCommand::disable())?;
        self.send_command(WifiModeCommand::station_mode())?;
        self.send_command(SetMultipleConnectionsCommand::single())?;

        debug!("Module initialized");
        Ok(())
    }

    /// Restarts the module. Network and connection state gets reset.
    pub fn reset(&mut self) -> Result<(), CommandError> {
        self.session = Session::new(self.session.send_timeout_ms);
        self.send_command(RestartCommand)?;
        Ok(())
    }

    /// Restarts the module and hands back the transport resources, also if the restart command failed.
    pub fn deinit(mut self) -> (Released<'a, W, T, RX_SIZE>, Result<(), CommandError>) {
        let result = self.reset();
        let (writer, rx, timer) = self.engine.release();

        (Released { writer, rx, timer }, result)
    }

    /// Disconnects from the current access point
    pub fn quit(&mut self) -> Result<(), CommandError> {
        self.send_command(AccessPointDisconnectCommand)?;
        self.session.joined = false;
        self.session.ip_assigned = false;
        Ok(())
    }

    /// Returns the local station IPv4 address
    pub fn get_ip(&mut self) -> Result<Ipv4Addr, AddressErrors> {
        self.get_address()?.ipv4.ok_or(AddressErrors::AddressParseError)
    }

    /// Waits until the given token is received without sending a command, e.g. for catching
    /// incoming messages. Returns all bytes received including the token.
    pub fn wait_for_token(&mut self, token: &[u8], timeout_ms: u32) -> Result<&[u8], TransactionError> {
        self.engine.await_token(token, timeout_ms)
    }

    /// Sends a command and maps the error if the command failed
    pub(crate) fn send_command<Cmd: AtCommand + CommandErrorHandler>(
        &mut self,
        command: Cmd,
    ) -> Result<&[u8], Cmd::Error> {
        let encoded = command.encode().map_err(|error| command.command_error(error))?;

        self.engine
            .execute(encoded.as_bytes(), Cmd::TOKEN, Cmd::TIMEOUT_MS)
            .map_err(|error| command.command_error(error))
    }

    /// Sets the timeout for sending TCP data in ms
    pub fn set_send_timeout_ms(&mut self, timeout: u32) {
        self.session.send_timeout_ms = timeout;
    }

    /// Sets the timeout for receiving a single byte in ms
    pub fn set_byte_timeout_ms(&mut self, timeout: u32) {
        self.engine.byte_timeout_ms = timeout;
    }

    /// Sets the timeout for the transport to accept a buffer in ms
    pub fn set_write_timeout_ms(&mut self, timeout: u32) {
        self.engine.serial.write_timeout_ms = timeout;
    }
}

/// Local IP and MAC addresses
#[derive(Default, Clone, Debug)]
pub struct LocalAddress {
    /// Local IPv4 address if assigned
    pub ipv4: Option<Ipv4Addr>,

    /// Local MAC address
    pub mac: Option<String<17>>,
}

impl LocalAddress {
    /// Parses the `+CIFSR:STAIP,"<ip>"` and `+CIFSR:STAMAC,"<mac>"` lines
    pub(crate) fn from_response(response: &[u8]) -> Result<Self, AddressErrors> {
        let mut data = Self::default();

        if let Some(ip) = field_after(response, b"STAIP,\"", b'"') {
            let ip = core::str::from_utf8(ip).map_err(|_| AddressErrors::AddressParseError)?;
            data.ipv4 = Some(Ipv4Addr::from_str(ip).map_err(|_| AddressErrors::AddressParseError)?);
        }

        if let Some(mac) = field_after(response, b"STAMAC,\"", b'"') {
            let mac = core::str::from_utf8(mac).map_err(|_| AddressErrors::AddressParseError)?;
            data.mac = Some(String::from_str(mac).map_err(|_| AddressErrors::AddressParseError)?);
        }

        Ok(data)
    }
}
