//! # Connection handling
//!
//! A single TCP connection or UDP transmission is supported. Besides the explicit
//! [Adapter::establish_connection] API, [TcpClientStack] of [embedded_nal] is implemented on top
//! of it, limited to one socket and IPv4.
//!
//! ## Example
//!
//! ````
//! # use core::str::FromStr;
//! # use core::net::SocketAddr;
//! # use embedded_nal::TcpClientStack;
//! # use esp_at_serial::example::{ExampleTimer, ExampleTransport};
//! # use esp_at_serial::ring::RingBuffer;
//! # use esp_at_serial::wifi::Adapter;
//! #
//! let mut ring: RingBuffer<1024> = RingBuffer::new();
//! let (producer, consumer) = ring.split();
//! let mut adapter: Adapter<_, _, 1_000_000, 1024> =
//!     Adapter::new(ExampleTransport::new(producer), consumer, ExampleTimer::default());
//!
//! // Creating a TCP connection
//! let mut socket = adapter.socket().unwrap();
//! adapter.connect(&mut socket, SocketAddr::from_str("10.0.0.1:21").unwrap()).unwrap();
//!
//! // Sending some data
//! adapter.send(&mut socket, b"hallo!").unwrap();
//!
//! // Receiving some data
//! let mut rx_buffer = [0x0; 64];
//! let length = adapter.receive(&mut socket, &mut rx_buffer).unwrap();
//! assert_eq!(16, length);
//! assert_eq!(b"nice to see you!", &rx_buffer[..16]);
//!
//! // Closing socket
//! adapter.close(socket).unwrap();
//! ````
use crate::commands::{AtCommand, CloseSocketCommand, ConnectCommand, TransmissionPrepareCommand};
use crate::engine::{ProtocolError, TransactionError, OK_TOKEN, SEND_OK_TOKEN};
use crate::responses::contains;
use crate::wifi::Adapter;
use core::fmt::Write as _;
use core::net::SocketAddr;
use embedded_io::Write;
use embedded_nal::{TcpClientStack, TcpError, TcpErrorKind};
use fugit_timer::Timer;
use heapless::String;
use log::{debug, info, warn};

/// Max. payload length of a single CIPSEND command
pub const MAX_SEND_CHUNK: usize = 2048;

/// Max. length of the remote host
pub const MAX_HOST_LENGTH: usize = 64;

/// Transport protocol of a connection
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Protocol {
    Tcp,
    Udp,
}

/// Handling of the remote peer of UDP transmissions
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PeerPolicy {
    /// Remote peer is fixed
    NoChange = 0,

    /// Remote peer changes once to the sender of the first received datagram
    ChangeOnce = 1,

    /// Remote peer changes to the sender of every received datagram
    ChangeAllowed = 2,
}

/// Parameters of a connection to establish
#[derive(Copy, Clone, Debug)]
pub struct ConnectionInfo<'a> {
    pub protocol: Protocol,

    /// IP address or domain name
    pub remote_host: &'a str,

    pub remote_port: u16,

    /// Local port, UDP only
    pub local_port: Option<u16>,

    /// Peer policy, UDP only. Just applied if a local port is set.
    pub peer_policy: PeerPolicy,

    /// Listen instead of connect. Currently not supported.
    pub server: bool,
}

impl<'a> ConnectionInfo<'a> {
    /// TCP client connection
    pub fn tcp(remote_host: &'a str, remote_port: u16) -> Self {
        Self {
            protocol: Protocol::Tcp,
            remote_host,
            remote_port,
            local_port: None,
            peer_policy: PeerPolicy::NoChange,
            server: false,
        }
    }

    /// UDP transmission
    pub fn udp(remote_host: &'a str, remote_port: u16, local_port: u16, peer_policy: PeerPolicy) -> Self {
        Self {
            protocol: Protocol::Udp,
            remote_host,
            remote_port,
            local_port: Some(local_port),
            peer_policy,
            server: false,
        }
    }
}

/// Established connection
#[derive(Clone, Debug, PartialEq)]
pub struct Connection {
    pub protocol: Protocol,
    pub remote_host: String<MAX_HOST_LENGTH>,
    pub remote_port: u16,
    pub local_port: Option<u16>,
}

impl Connection {
    fn new(info: &ConnectionInfo<'_>) -> Result<Self, Error> {
        let mut remote_host = String::new();
        remote_host.push_str(info.remote_host).map_err(|_| Error::InvalidRemoteHost)?;

        Ok(Self {
            protocol: info.protocol,
            remote_host,
            remote_port: info.remote_port,
            local_port: info.local_port,
        })
    }
}

/// Socket of the single connection
#[derive(Debug)]
pub struct Socket {
    _private: (),
}

/// Network related errors
#[derive(Clone, Debug, PartialEq)]
pub enum Error {
    /// Connect command failed
    ConnectError(TransactionError),

    /// Preparing the transmission failed (CIPSEND command)
    TransmissionStartFailed(TransactionError),

    /// Transmission of data failed
    SendFailed(TransactionError),

    /// Receiving data failed
    ReceiveFailed(TransactionError),

    /// Close command failed
    CloseError(TransactionError),

    /// Server mode is not supported
    ServerModeUnsupported,

    /// Remote host is empty or longer then 64 chars
    InvalidRemoteHost,

    /// Only IPv4 remote addresses are supported
    UnsupportedAddress,

    /// No socket available, since the single socket is in use
    NoSocketAvailable,

    /// A connection is already established. Needs to be closed first.
    AlreadyConnected,

    /// Unable to send data if not connected
    SocketUnconnected,
}

impl TcpError for Error {
    fn kind(&self) -> TcpErrorKind {
        match self {
            Error::SocketUnconnected => TcpErrorKind::PipeClosed,
            _ => TcpErrorKind::Other,
        }
    }
}

impl<W: Write, T: Timer<TIMER_HZ>, const TIMER_HZ: u32, const RX_SIZE: usize> Adapter<'_, W, T, TIMER_HZ, RX_SIZE> {
    /// Establishes a TCP connection or UDP transmission
    ///
    /// An `ALREADY CONNECTED` response is accepted, as the module state is leading.
    pub fn establish_connection(&mut self, info: &ConnectionInfo<'_>) -> Result<(), Error> {
        if info.server {
            return Err(Error::ServerModeUnsupported);
        }

        self.update_connection_state();
        if self.session.connection.is_some() {
            return Err(Error::AlreadyConnected);
        }

        if info.remote_host.is_empty() {
            return Err(Error::InvalidRemoteHost);
        }
        let connection = Connection::new(info)?;

        let result = self.send_command(ConnectCommand::new(info)).map(|_| ());
        let connected = match result {
            Ok(()) => true,
            Err(Error::ConnectError(TransactionError::Protocol(ProtocolError::ErrorResponse)))
                if contains(self.engine.response(), b"ALREADY CONNECTED") =>
            {
                debug!("Module reported connection as already established");
                false
            }
            Err(error) => return Err(error),
        };

        // Messages of a previous connection
        self.engine.take_peer_closed();

        info!("Connected to {}:{}", info.remote_host, info.remote_port);
        self.session.connection = Some(connection);

        // Trailing OK of the CONNECT reply, would terminate the next command early otherwise
        if connected {
            if let Err(error) = self.engine.await_token(OK_TOKEN, ConnectCommand::TIMEOUT_MS) {
                warn!("Missing OK after CONNECT: {:?}", error);
            }
        }

        Ok(())
    }

    /// Closes the connection
    ///
    /// If the connection is not established or was closed by the remote side, no command is sent.
    /// In case of an error the connection is considered as closed anyway.
    pub fn close_connection(&mut self) -> Result<(), Error> {
        self.update_connection_state();
        if self.session.connection.is_none() {
            return Ok(());
        }

        let result = self.send_command(CloseSocketCommand).map(|_| ());
        let result = match result {
            Ok(()) => Ok(()),
            Err(Error::CloseError(TransactionError::Protocol(ProtocolError::ErrorResponse)))
                if contains(self.engine.response(), b"UNLINK") =>
            {
                Ok(())
            }
            Err(error) => Err(error),
        };

        self.session.connection = None;
        self.engine.take_peer_closed();
        debug!("Connection closed");
        result
    }

    /// Sends the given data. The data is split in chunks of max. [MAX_SEND_CHUNK] bytes.
    pub fn send_data(&mut self, data: &[u8]) -> Result<usize, Error> {
        self.update_connection_state();
        if self.session.connection.is_none() {
            return Err(Error::SocketUnconnected);
        }

        for chunk in data.chunks(MAX_SEND_CHUNK) {
            let result = self.send_chunk(chunk);
            self.update_connection_state();
            result?;
        }

        Ok(data.len())
    }

    /// Receives available socket data and returns the length written to the buffer.
    ///
    /// Returns zero if no data is available.
    pub fn recv_data(&mut self, buffer: &mut [u8]) -> Result<usize, Error> {
        let result = self.engine.receive(buffer).map_err(Error::ReceiveFailed);
        self.update_connection_state();
        result
    }

    /// Returns the currently established connection
    pub fn connection(&self) -> Option<&Connection> {
        self.session.connection.as_ref()
    }

    /// Returns true if a connection is established. Remote closes are taken into account once observed.
    pub fn is_connected(&mut self) -> bool {
        self.update_connection_state();
        self.session.connection.is_some()
    }

    fn send_chunk(&mut self, chunk: &[u8]) -> Result<(), Error> {
        self.send_command(TransmissionPrepareCommand::new(chunk.len()))?;

        let timeout = self.session.send_timeout_ms;
        self.engine
            .execute(chunk, SEND_OK_TOKEN, timeout)
            .map_err(Error::SendFailed)?;
        Ok(())
    }

    /// Drops the connection if the module reported a remote close
    fn update_connection_state(&mut self) {
        if self.engine.take_peer_closed() && self.session.connection.take().is_some() {
            info!("Connection closed by remote");
        }
    }
}

impl<W: Write, T: Timer<TIMER_HZ>, const TIMER_HZ: u32, const RX_SIZE: usize> TcpClientStack
    for Adapter<'_, W, T, TIMER_HZ, RX_SIZE>
{
    type TcpSocket = Socket;
    type Error = Error;

    /// Returns the single socket. [Error::NoSocketAvailable] is returned if it is in use.
    fn socket(&mut self) -> Result<Self::TcpSocket, Self::Error> {
        if self.session.socket_in_use {
            return Err(Error::NoSocketAvailable);
        }

        self.session.socket_in_use = true;
        Ok(Socket { _private: () })
    }

    /// Opens a new TCP connection. Only IPv4 is supported.
    fn connect(&mut self, _socket: &mut Socket, remote: SocketAddr) -> nb::Result<(), Self::Error> {
        let address = match remote {
            SocketAddr::V4(address) => address,
            SocketAddr::V6(_) => return nb::Result::Err(nb::Error::Other(Error::UnsupportedAddress)),
        };

        let mut host: String<15> = String::new();
        write!(host, "{}", address.ip()).map_err(|_| Error::InvalidRemoteHost)?;

        self.establish_connection(&ConnectionInfo::tcp(&host, address.port()))?;
        nb::Result::Ok(())
    }

    /// Sends the given buffer and returns the length (in bytes) sent.
    fn send(&mut self, _socket: &mut Socket, buffer: &[u8]) -> nb::Result<usize, Self::Error> {
        nb::Result::Ok(self.send_data(buffer)?)
    }

    /// Receives available data. Returns WouldBlock if no data is available on an established connection.
    fn receive(&mut self, _socket: &mut Socket, buffer: &mut [u8]) -> nb::Result<usize, Self::Error> {
        let length = self.recv_data(buffer)?;
        if length > 0 {
            return nb::Result::Ok(length);
        }

        if self.session.connection.is_none() {
            return nb::Result::Err(nb::Error::Other(Error::SocketUnconnected));
        }

        nb::Result::Err(nb::Error::WouldBlock)
    }

    /// Closes the connection and releases the socket
    fn close(&mut self, _socket: Socket) -> Result<(), Self::Error> {
        self.session.socket_in_use = false;
        self.close_connection()
    }
}
