use crate::engine::{TransactionError, CONNECT_TOKEN, MAX_COMMAND_SIZE, OK_TOKEN, SEND_PROMPT_TOKEN};
use crate::mqtt::{MqttError, QoS};
use crate::sntp::SntpError;
use crate::stack::{ConnectionInfo, Error as StackError, Protocol};
use crate::wifi::{AddressErrors, CommandError, InitError, JoinError};
use core::fmt::{self, Display, Write};
use heapless::String;

/// Single AT command
pub trait AtCommand {
    /// Token signaling a successful execution
    const TOKEN: &'static [u8] = OK_TOKEN;

    /// Timeout of the whole transaction
    const TIMEOUT_MS: u32;

    /// Writes the command without terminator
    fn write_command(&self, buffer: &mut String<MAX_COMMAND_SIZE>) -> fmt::Result;

    /// Returns the CRLF terminated command. Fails if the command buffer capacity is exceeded.
    fn encode(&self) -> Result<String<MAX_COMMAND_SIZE>, TransactionError> {
        let mut buffer = String::new();
        self.write_command(&mut buffer).map_err(|_| TransactionError::Overflow)?;
        buffer.push_str("\r\n").map_err(|_| TransactionError::Overflow)?;
        Ok(buffer)
    }
}

/// Trait for mapping command errors
pub trait CommandErrorHandler {
    type Error;

    /// Maps transaction errors
    fn command_error(&self, error: TransactionError) -> Self::Error;
}

/// String parameter, escapes special characters by backslash
pub(crate) struct Escaped<'a>(pub &'a str);

impl Display for Escaped<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for character in self.0.chars() {
            if matches!(character, '"' | ',' | '\\') {
                f.write_char('\\')?;
            }
            f.write_char(character)?;
        }

        Ok(())
    }
}

/// Enables/Disables echoing of commands
pub struct EchoCommand {
    enabled: bool,
}

impl EchoCommand {
    pub fn disable() -> Self {
        Self { enabled: false }
    }
}

impl AtCommand for EchoCommand {
    const TIMEOUT_MS: u32 = 1_000;

    fn write_command(&self, buffer: &mut String<MAX_COMMAND_SIZE>) -> fmt::Result {
        write!(buffer, "ATE{}", self.enabled as u8)
    }
}

impl CommandErrorHandler for EchoCommand {
    type Error = InitError;

    fn command_error(&self, error: TransactionError) -> Self::Error {
        InitError::EchoError(error)
    }
}

/// Sets the WIFI mode
pub struct WifiModeCommand {
    /// WIFI mode:
    ///     0: Null mode. Wi-Fi RF will be disabled.
    ///     1: Station mode.
    ///     2: SoftAP mode.
    ///     3: SoftAP+Station mode.
    mode: usize,
}

impl WifiModeCommand {
    pub fn station_mode() -> Self {
        Self { mode: 1 }
    }
}

impl AtCommand for WifiModeCommand {
    const TIMEOUT_MS: u32 = 1_000;

    fn write_command(&self, buffer: &mut String<MAX_COMMAND_SIZE>) -> fmt::Result {
        write!(buffer, "AT+CWMODE={}", self.mode)
    }
}

impl CommandErrorHandler for WifiModeCommand {
    type Error = InitError;

    fn command_error(&self, error: TransactionError) -> Self::Error {
        InitError::ModeError(error)
    }
}

/// Enables/Disables multiple connections
pub struct SetMultipleConnectionsCommand {
    /// 0: single connection, 1: multiple connections
    mode: usize,
}

impl SetMultipleConnectionsCommand {
    /// Restricts the module to a single connection
    pub fn single() -> Self {
        Self { mode: 0 }
    }
}

impl AtCommand for SetMultipleConnectionsCommand {
    const TIMEOUT_MS: u32 = 1_000;

    fn write_command(&self, buffer: &mut String<MAX_COMMAND_SIZE>) -> fmt::Result {
        write!(buffer, "AT+CIPMUX={}", self.mode)
    }
}

impl CommandErrorHandler for SetMultipleConnectionsCommand {
    type Error = InitError;

    fn command_error(&self, error: TransactionError) -> Self::Error {
        InitError::SingleConnectionError(error)
    }
}

/// Restarts the module
pub struct RestartCommand;

impl AtCommand for RestartCommand {
    const TIMEOUT_MS: u32 = 2_000;

    fn write_command(&self, buffer: &mut String<MAX_COMMAND_SIZE>) -> fmt::Result {
        buffer.write_str("AT+RST")
    }
}

impl CommandErrorHandler for RestartCommand {
    type Error = CommandError;

    fn command_error(&self, error: TransactionError) -> Self::Error {
        CommandError::RestartFailed(error)
    }
}

/// Command for setting the target WIFI access point parameters
pub struct AccessPointConnectCommand<'a> {
    /// The SSID of the target access point
    ssid: &'a str,

    /// The password/key of the target access point
    password: &'a str,
}

impl<'a> AccessPointConnectCommand<'a> {
    pub fn new(ssid: &'a str, password: &'a str) -> Self {
        Self { ssid, password }
    }
}

impl AtCommand for AccessPointConnectCommand<'_> {
    const TIMEOUT_MS: u32 = 20_000;

    fn write_command(&self, buffer: &mut String<MAX_COMMAND_SIZE>) -> fmt::Result {
        write!(buffer, "AT+CWJAP=\"{}\",\"{}\"", Escaped(self.ssid), Escaped(self.password))
    }
}

impl CommandErrorHandler for AccessPointConnectCommand<'_> {
    type Error = JoinError;

    fn command_error(&self, error: TransactionError) -> Self::Error {
        JoinError::ConnectError(error)
    }
}

/// Disconnects from the current access point
pub struct AccessPointDisconnectCommand;

impl AtCommand for AccessPointDisconnectCommand {
    const TIMEOUT_MS: u32 = 1_000;

    fn write_command(&self, buffer: &mut String<MAX_COMMAND_SIZE>) -> fmt::Result {
        buffer.write_str("AT+CWQAP")
    }
}

impl CommandErrorHandler for AccessPointDisconnectCommand {
    type Error = CommandError;

    fn command_error(&self, error: TransactionError) -> Self::Error {
        CommandError::DisconnectFailed(error)
    }
}

/// Queries the local IP and MAC addresses
pub struct ObtainLocalAddressCommand;

impl AtCommand for ObtainLocalAddressCommand {
    const TIMEOUT_MS: u32 = 1_000;

    fn write_command(&self, buffer: &mut String<MAX_COMMAND_SIZE>) -> fmt::Result {
        buffer.write_str("AT+CIFSR")
    }
}

impl CommandErrorHandler for ObtainLocalAddressCommand {
    type Error = AddressErrors;

    fn command_error(&self, error: TransactionError) -> Self::Error {
        AddressErrors::CommandError(error)
    }
}

/// Establish TCP Connection or UDP Transmission
pub struct ConnectCommand<'a> {
    info: &'a ConnectionInfo<'a>,
}

impl<'a> ConnectCommand<'a> {
    pub fn new(info: &'a ConnectionInfo<'a>) -> Self {
        Self { info }
    }
}

impl AtCommand for ConnectCommand<'_> {
    const TOKEN: &'static [u8] = CONNECT_TOKEN;
    const TIMEOUT_MS: u32 = 10_000;

    fn write_command(&self, buffer: &mut String<MAX_COMMAND_SIZE>) -> fmt::Result {
        let connection_type = match self.info.protocol {
            Protocol::Tcp => "TCP",
            Protocol::Udp => "UDP",
        };

        write!(
            buffer,
            "AT+CIPSTART=\"{}\",\"{}\",{}",
            connection_type,
            Escaped(self.info.remote_host),
            self.info.remote_port
        )?;

        if let (Protocol::Udp, Some(local_port)) = (self.info.protocol, self.info.local_port) {
            write!(buffer, ",{},{}", local_port, self.info.peer_policy as u8)?;
        }

        Ok(())
    }
}

impl CommandErrorHandler for ConnectCommand<'_> {
    type Error = StackError;

    fn command_error(&self, error: TransactionError) -> Self::Error {
        StackError::ConnectError(error)
    }
}

/// Closes the connection
pub struct CloseSocketCommand;

impl AtCommand for CloseSocketCommand {
    const TIMEOUT_MS: u32 = 5_000;

    fn write_command(&self, buffer: &mut String<MAX_COMMAND_SIZE>) -> fmt::Result {
        buffer.write_str("AT+CIPCLOSE")
    }
}

impl CommandErrorHandler for CloseSocketCommand {
    type Error = StackError;

    fn command_error(&self, error: TransactionError) -> Self::Error {
        StackError::CloseError(error)
    }
}

/// Announces the length of the following socket data and waits for the send prompt
pub struct TransmissionPrepareCommand {
    length: usize,
}

impl TransmissionPrepareCommand {
    pub fn new(length: usize) -> Self {
        Self { length }
    }
}

impl AtCommand for TransmissionPrepareCommand {
    const TOKEN: &'static [u8] = SEND_PROMPT_TOKEN;
    const TIMEOUT_MS: u32 = 5_000;

    fn write_command(&self, buffer: &mut String<MAX_COMMAND_SIZE>) -> fmt::Result {
        write!(buffer, "AT+CIPSEND={}", self.length)
    }
}

impl CommandErrorHandler for TransmissionPrepareCommand {
    type Error = StackError;

    fn command_error(&self, error: TransactionError) -> Self::Error {
        StackError::TransmissionStartFailed(error)
    }
}

/// Configures the SNTP client
pub struct SntpConfigCommand<'a> {
    /// UTC offset in hours
    timezone: i8,

    /// NTP server host
    server: &'a str,
}

impl<'a> SntpConfigCommand<'a> {
    pub fn new(timezone: i8, server: &'a str) -> Self {
        Self { timezone, server }
    }
}

impl AtCommand for SntpConfigCommand<'_> {
    const TIMEOUT_MS: u32 = 1_000;

    fn write_command(&self, buffer: &mut String<MAX_COMMAND_SIZE>) -> fmt::Result {
        write!(buffer, "AT+CIPSNTPCFG=1,{},\"{}\"", self.timezone, Escaped(self.server))
    }
}

impl CommandErrorHandler for SntpConfigCommand<'_> {
    type Error = SntpError;

    fn command_error(&self, error: TransactionError) -> Self::Error {
        SntpError::ConfigError(error)
    }
}

/// Queries the SNTP time
pub struct SntpTimeCommand;

impl AtCommand for SntpTimeCommand {
    const TIMEOUT_MS: u32 = 1_000;

    fn write_command(&self, buffer: &mut String<MAX_COMMAND_SIZE>) -> fmt::Result {
        buffer.write_str("AT+CIPSNTPTIME?")
    }
}

impl CommandErrorHandler for SntpTimeCommand {
    type Error = SntpError;

    fn command_error(&self, error: TransactionError) -> Self::Error {
        SntpError::QueryError(error)
    }
}

/// Sets the MQTT client credentials. Uses plain MQTT over TCP.
pub struct MqttUserConfigCommand<'a> {
    client_id: &'a str,
    username: &'a str,
    password: &'a str,
}

impl<'a> MqttUserConfigCommand<'a> {
    pub fn new(client_id: &'a str, username: &'a str, password: &'a str) -> Self {
        Self {
            client_id,
            username,
            password,
        }
    }
}

impl AtCommand for MqttUserConfigCommand<'_> {
    const TIMEOUT_MS: u32 = 1_000;

    fn write_command(&self, buffer: &mut String<MAX_COMMAND_SIZE>) -> fmt::Result {
        write!(
            buffer,
            "AT+MQTTUSERCFG=0,1,\"{}\",\"{}\",\"{}\",0,0,\"\"",
            Escaped(self.client_id),
            Escaped(self.username),
            Escaped(self.password)
        )
    }
}

impl CommandErrorHandler for MqttUserConfigCommand<'_> {
    type Error = MqttError;

    fn command_error(&self, error: TransactionError) -> Self::Error {
        MqttError::UserConfigError(error)
    }
}

/// Connects to a MQTT broker
pub struct MqttConnectCommand<'a> {
    host: &'a str,
    port: u16,

    /// Reconnect automatically if the broker connection is lost
    reconnect: bool,
}

impl<'a> MqttConnectCommand<'a> {
    pub fn new(host: &'a str, port: u16, reconnect: bool) -> Self {
        Self { host, port, reconnect }
    }
}

impl AtCommand for MqttConnectCommand<'_> {
    const TIMEOUT_MS: u32 = 10_000;

    fn write_command(&self, buffer: &mut String<MAX_COMMAND_SIZE>) -> fmt::Result {
        write!(
            buffer,
            "AT+MQTTCONN=0,\"{}\",{},{}",
            Escaped(self.host),
            self.port,
            self.reconnect as u8
        )
    }
}

impl CommandErrorHandler for MqttConnectCommand<'_> {
    type Error = MqttError;

    fn command_error(&self, error: TransactionError) -> Self::Error {
        MqttError::ConnectError(error)
    }
}

/// Subscribes to a MQTT topic
pub struct MqttSubscribeCommand<'a> {
    topic: &'a str,
    qos: QoS,
}

impl<'a> MqttSubscribeCommand<'a> {
    pub fn new(topic: &'a str, qos: QoS) -> Self {
        Self { topic, qos }
    }
}

impl AtCommand for MqttSubscribeCommand<'_> {
    const TIMEOUT_MS: u32 = 5_000;

    fn write_command(&self, buffer: &mut String<MAX_COMMAND_SIZE>) -> fmt::Result {
        write!(buffer, "AT+MQTTSUB=0,\"{}\",{}", Escaped(self.topic), self.qos as u8)
    }
}

impl CommandErrorHandler for MqttSubscribeCommand<'_> {
    type Error = MqttError;

    fn command_error(&self, error: TransactionError) -> Self::Error {
        MqttError::SubscribeError(error)
    }
}

/// Publishes a string message
pub struct MqttPublishCommand<'a> {
    topic: &'a str,
    message: &'a str,
    qos: QoS,
    retain: bool,
}

impl<'a> MqttPublishCommand<'a> {
    pub fn new(topic: &'a str, message: &'a str, qos: QoS, retain: bool) -> Self {
        Self {
            topic,
            message,
            qos,
            retain,
        }
    }
}

impl AtCommand for MqttPublishCommand<'_> {
    const TIMEOUT_MS: u32 = 5_000;

    fn write_command(&self, buffer: &mut String<MAX_COMMAND_SIZE>) -> fmt::Result {
        write!(
            buffer,
            "AT+MQTTPUB=0,\"{}\",\"{}\",{},{}",
            Escaped(self.topic),
            Escaped(self.message),
            self.qos as u8,
            self.retain as u8
        )
    }
}

impl CommandErrorHandler for MqttPublishCommand<'_> {
    type Error = MqttError;

    fn command_error(&self, error: TransactionError) -> Self::Error {
        MqttError::PublishError(error)
    }
}
