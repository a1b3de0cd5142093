use crate::engine::{ProtocolError, TransactionError};
use crate::ring::RingBuffer;
use crate::serial::IoError;
use crate::tests::mock::{MockTimer, MockTransport, MockedCommand};
use crate::wifi::{AddressErrors, Adapter, CommandError, InitError, JoinError, WifiAdapter};
use core::net::Ipv4Addr;
use core::str::FromStr;

type AdapterType<'a> = Adapter<'a, MockTransport<'a, 1024>, MockTimer, 1_000_000, 1024>;

const ERROR: TransactionError = TransactionError::Protocol(ProtocolError::ErrorResponse);

#[test]
fn test_init_correct_commands() {
    let mut ring: RingBuffer<1024> = RingBuffer::new();
    let (producer, consumer) = ring.split();
    let mut transport = MockTransport::new(producer);
    transport.add_response(MockedCommand::ok(b"ATE0\r\n"));
    transport.add_response(MockedCommand::ok(b"AT+CWMODE=1\r\n"));
    transport.add_response(MockedCommand::ok(b"AT+CIPMUX=0\r\n"));

    let mut adapter: AdapterType = Adapter::new(transport, consumer, MockTimer::ticking(100));
    adapter.init().unwrap();

    adapter.engine.serial.writer.assert_all_cmds_sent();
}

#[test]
fn test_init_discards_stale_data_and_errors() {
    let mut ring: RingBuffer<1024> = RingBuffer::new();
    let (producer, consumer) = ring.split();
    let mut transport = MockTransport::new(producer);

    // Garbage of the module boot and an old transport error
    transport.inject(b"\x00\xffets Jan  8 2013,rst cause:2\r\nready\r\nOK\r\n");
    transport.report_fault();

    transport.add_response(MockedCommand::new(Some(b"ATE0\r\n"), b"ATE0\r\n\r\nOK\r\n"));
    transport.add_response(MockedCommand::ok(b"AT+CWMODE=1\r\n"));
    transport.add_response(MockedCommand::ok(b"AT+CIPMUX=0\r\n"));

    let mut adapter: AdapterType = Adapter::new(transport, consumer, MockTimer::ticking(100));
    adapter.init().unwrap();

    adapter.engine.serial.writer.assert_all_cmds_sent();
    assert!(adapter.engine.serial.rx.is_empty());
}

#[test]
fn test_init_echo_error() {
    let mut ring: RingBuffer<1024> = RingBuffer::new();
    let (producer, consumer) = ring.split();
    let mut transport = MockTransport::new(producer);
    transport.add_response(MockedCommand::error(b"ATE0\r\n"));

    let mut adapter: AdapterType = Adapter::new(transport, consumer, MockTimer::ticking(100));
    assert_eq!(InitError::EchoError(ERROR), adapter.init().unwrap_err());
}

#[test]
fn test_init_mode_error() {
    let mut ring: RingBuffer<1024> = RingBuffer::new();
    let (producer, consumer) = ring.split();
    let mut transport = MockTransport::new(producer);
    transport.add_response(MockedCommand::ok(b"ATE0\r\n"));
    transport.add_response(MockedCommand::error(b"AT+CWMODE=1\r\n"));

    let mut adapter: AdapterType = Adapter::new(transport, consumer, MockTimer::ticking(100));
    assert_eq!(InitError::ModeError(ERROR), adapter.init().unwrap_err());
}

#[test]
fn test_init_single_connection_timeout() {
    let mut ring: RingBuffer<1024> = RingBuffer::new();
    let (producer, consumer) = ring.split();
    let mut transport = MockTransport::new(producer);
    transport.add_response(MockedCommand::ok(b"ATE0\r\n"));
    transport.add_response(MockedCommand::ok(b"AT+CWMODE=1\r\n"));
    transport.add_response(MockedCommand::new(Some(b"AT+CIPMUX=0\r\n"), b""));

    let mut adapter: AdapterType = Adapter::new(transport, consumer, MockTimer::ticking(1_000));
    assert_eq!(
        InitError::SingleConnectionError(TransactionError::Timeout),
        adapter.init().unwrap_err()
    );
}

#[test]
fn test_join_correct_command() {
    let mut ring: RingBuffer<1024> = RingBuffer::new();
    let (producer, consumer) = ring.split();
    let mut transport = MockTransport::new(producer);
    transport.add_response(MockedCommand::new(
        Some(b"AT+CWJAP=\"test_wifi\",\"secret\"\r\n"),
        b"WIFI CONNECTED\r\nWIFI GOT IP\r\n\r\nOK\r\n",
    ));

    let mut adapter: AdapterType = Adapter::new(transport, consumer, MockTimer::ticking(100));
    let state = adapter.join("test_wifi", "secret").unwrap();

    assert!(state.connected);
    assert!(state.ip_assigned);
    assert!(adapter.get_join_status().connected);
}

#[test]
fn test_join_without_ip() {
    let mut ring: RingBuffer<1024> = RingBuffer::new();
    let (producer, consumer) = ring.split();
    let mut transport = MockTransport::new(producer);
    transport.add_response(MockedCommand::new(
        Some(b"AT+CWJAP=\"test_wifi\",\"secret\"\r\n"),
        b"WIFI CONNECTED\r\n\r\nOK\r\n",
    ));

    let mut adapter: AdapterType = Adapter::new(transport, consumer, MockTimer::ticking(100));
    let state = adapter.join("test_wifi", "secret").unwrap();

    assert!(state.connected);
    assert!(!state.ip_assigned);
}

#[test]
fn test_join_escaped_credentials() {
    let mut ring: RingBuffer<1024> = RingBuffer::new();
    let (producer, consumer) = ring.split();
    let mut transport = MockTransport::new(producer);
    transport.add_response(MockedCommand::new(
        Some(b"AT+CWJAP=\"my\\\"wifi\\,\",\"pa\\\\ss\"\r\n"),
        b"WIFI CONNECTED\r\nWIFI GOT IP\r\n\r\nOK\r\n",
    ));

    let mut adapter: AdapterType = Adapter::new(transport, consumer, MockTimer::ticking(100));
    adapter.join("my\"wifi,", "pa\\ss").unwrap();

    adapter.engine.serial.writer.assert_all_cmds_sent();
}

#[test]
fn test_join_connect_command_error() {
    let mut ring: RingBuffer<1024> = RingBuffer::new();
    let (producer, consumer) = ring.split();
    let mut transport = MockTransport::new(producer);
    transport.add_response(MockedCommand::new(
        Some(b"AT+CWJAP=\"test_wifi\",\"secret\"\r\n"),
        b"+CWJAP:1\r\n\r\nFAIL\r\n\r\nERROR\r\n",
    ));

    let mut adapter: AdapterType = Adapter::new(transport, consumer, MockTimer::ticking(100));
    let error = adapter.join("test_wifi", "secret").unwrap_err();

    assert_eq!(JoinError::ConnectError(ERROR), error);
    assert!(!adapter.get_join_status().connected);
}

#[test]
fn test_join_invalid_ssid_length() {
    let mut ring: RingBuffer<1024> = RingBuffer::new();
    let (producer, consumer) = ring.split();

    let mut adapter: AdapterType = Adapter::new(MockTransport::new(producer), consumer, MockTimer::new());
    let error = adapter.join("0123456789012345678901234567890123", "secret").unwrap_err();

    assert_eq!(JoinError::InvalidSSDLength, error);
}

#[test]
fn test_join_invalid_password_length() {
    let mut ring: RingBuffer<1024> = RingBuffer::new();
    let (producer, consumer) = ring.split();

    let mut adapter: AdapterType = Adapter::new(MockTransport::new(producer), consumer, MockTimer::new());
    let error = adapter.join("test_wifi", &"x".repeat(65)).unwrap_err();

    assert_eq!(JoinError::InvalidPasswordLength, error);
}

#[test]
fn test_quit_resets_join_state() {
    let mut ring: RingBuffer<1024> = RingBuffer::new();
    let (producer, consumer) = ring.split();
    let mut transport = MockTransport::new(producer);
    transport.add_response(MockedCommand::new(
        Some(b"AT+CWJAP=\"test_wifi\",\"secret\"\r\n"),
        b"WIFI CONNECTED\r\nWIFI GOT IP\r\n\r\nOK\r\n",
    ));
    transport.add_response(MockedCommand::new(Some(b"AT+CWQAP\r\n"), b"\r\nOK\r\nWIFI DISCONNECT\r\n"));

    let mut adapter: AdapterType = Adapter::new(transport, consumer, MockTimer::ticking(100));
    adapter.join("test_wifi", "secret").unwrap();
    adapter.quit().unwrap();

    let state = adapter.get_join_status();
    assert!(!state.connected);
    assert!(!state.ip_assigned);
}

#[test]
fn test_quit_error() {
    let mut ring: RingBuffer<1024> = RingBuffer::new();
    let (producer, consumer) = ring.split();
    let mut transport = MockTransport::new(producer);
    transport.add_response(MockedCommand::error(b"AT+CWQAP\r\n"));

    let mut adapter: AdapterType = Adapter::new(transport, consumer, MockTimer::ticking(100));
    assert_eq!(CommandError::DisconnectFailed(ERROR), adapter.quit().unwrap_err());
}

#[test]
fn test_get_address() {
    let mut ring: RingBuffer<1024> = RingBuffer::new();
    let (producer, consumer) = ring.split();
    let mut transport = MockTransport::new(producer);
    transport.add_response(MockedCommand::new(
        Some(b"AT+CIFSR\r\n"),
        b"+CIFSR:STAIP,\"10.0.0.181\"\r\n+CIFSR:STAMAC,\"10:fe:ed:05:ba:50\"\r\n\r\nOK\r\n",
    ));

    let mut adapter: AdapterType = Adapter::new(transport, consumer, MockTimer::ticking(100));
    let address = adapter.get_address().unwrap();

    assert_eq!(Some(Ipv4Addr::from_str("10.0.0.181").unwrap()), address.ipv4);
    assert_eq!("10:fe:ed:05:ba:50", address.mac.unwrap().as_str());
}

#[test]
fn test_get_ip() {
    let mut ring: RingBuffer<1024> = RingBuffer::new();
    let (producer, consumer) = ring.split();
    let mut transport = MockTransport::new(producer);
    transport.add_response(MockedCommand::new(
        Some(b"AT+CIFSR\r\n"),
        b"+CIFSR:STAIP,\"192.168.1.23\"\r\n+CIFSR:STAMAC,\"10:fe:ed:05:ba:50\"\r\n\r\nOK\r\n",
    ));

    let mut adapter: AdapterType = Adapter::new(transport, consumer, MockTimer::ticking(100));
    assert_eq!(Ipv4Addr::new(192, 168, 1, 23), adapter.get_ip().unwrap());
}

#[test]
fn test_get_ip_missing() {
    let mut ring: RingBuffer<1024> = RingBuffer::new();
    let (producer, consumer) = ring.split();
    let mut transport = MockTransport::new(producer);
    transport.add_response(MockedCommand::new(
        Some(b"AT+CIFSR\r\n"),
        b"+CIFSR:STAMAC,\"10:fe:ed:05:ba:50\"\r\n\r\nOK\r\n",
    ));

    let mut adapter: AdapterType = Adapter::new(transport, consumer, MockTimer::ticking(100));
    assert_eq!(AddressErrors::AddressParseError, adapter.get_ip().unwrap_err());
}

#[test]
fn test_get_address_invalid_ip() {
    let mut ring: RingBuffer<1024> = RingBuffer::new();
    let (producer, consumer) = ring.split();
    let mut transport = MockTransport::new(producer);
    transport.add_response(MockedCommand::new(
        Some(b"AT+CIFSR\r\n"),
        b"+CIFSR:STAIP,\"10.0.0.300\"\r\n\r\nOK\r\n",
    ));

    let mut adapter: AdapterType = Adapter::new(transport, consumer, MockTimer::ticking(100));
    assert_eq!(AddressErrors::AddressParseError, adapter.get_address().unwrap_err());
}

#[test]
fn test_get_address_command_error() {
    let mut ring: RingBuffer<1024> = RingBuffer::new();
    let (producer, consumer) = ring.split();
    let mut transport = MockTransport::new(producer);
    transport.add_response(MockedCommand::error(b"AT+CIFSR\r\n"));

    let mut adapter: AdapterType = Adapter::new(transport, consumer, MockTimer::ticking(100));
    assert_eq!(AddressErrors::CommandError(ERROR), adapter.get_address().unwrap_err());
}

#[test]
fn test_reset() {
    let mut ring: RingBuffer<1024> = RingBuffer::new();
    let (producer, consumer) = ring.split();
    let mut transport = MockTransport::new(producer);
    transport.add_response(MockedCommand::ok(b"AT+RST\r\n"));

    let mut adapter: AdapterType = Adapter::new(transport, consumer, MockTimer::ticking(100));
    adapter.reset().unwrap();
    adapter.engine.serial.writer.assert_all_cmds_sent();
}

#[test]
fn test_deinit_returns_resources_on_error() {
    let mut ring: RingBuffer<1024> = RingBuffer::new();
    let (producer, consumer) = ring.split();
    let mut transport = MockTransport::new(producer);
    transport.add_response(MockedCommand::error(b"AT+RST\r\n"));

    let adapter: AdapterType = Adapter::new(transport, consumer, MockTimer::ticking(100));
    let (released, result) = adapter.deinit();

    assert_eq!(Err(CommandError::RestartFailed(ERROR)), result);
    assert_eq!(vec!["AT+RST\r\n".to_string()], released.writer.get_commands_as_strings());
}

#[test]
fn test_wait_for_token() {
    let mut ring: RingBuffer<1024> = RingBuffer::new();
    let (producer, consumer) = ring.split();
    let mut transport = MockTransport::new(producer);
    transport.inject(b"+MQTTSUBRECV:0,\"home/light\",2,on\r\n");

    let mut adapter: AdapterType = Adapter::new(transport, consumer, MockTimer::ticking(100));
    let response = adapter.wait_for_token(b"on\r\n", 1_000).unwrap();

    assert_eq!(b"+MQTTSUBRECV:0,\"home/light\",2,on\r\n", response);
}

#[test]
fn test_transport_fault_until_init() {
    let mut ring: RingBuffer<1024> = RingBuffer::new();
    let (producer, consumer) = ring.split();
    let mut transport = MockTransport::new(producer);
    transport.add_response(MockedCommand::ok(b"AT+CIFSR\r\n"));
    transport.add_response(MockedCommand::ok(b"ATE0\r\n"));
    transport.add_response(MockedCommand::ok(b"AT+CWMODE=1\r\n"));
    transport.add_response(MockedCommand::ok(b"AT+CIPMUX=0\r\n"));
    transport.report_fault();

    let mut adapter: AdapterType = Adapter::new(transport, consumer, MockTimer::ticking(100));
    assert_eq!(
        AddressErrors::CommandError(TransactionError::Io(IoError::Transport)),
        adapter.get_address().unwrap_err()
    );

    adapter.init().unwrap();
    adapter.engine.serial.writer.assert_all_cmds_sent();
}

#[test]
fn test_timeout_setters() {
    let mut ring: RingBuffer<1024> = RingBuffer::new();
    let (producer, consumer) = ring.split();
    let transport = MockTransport::new(producer);

    let mut adapter: AdapterType = Adapter::new(transport, consumer, MockTimer::ticking(100));
    adapter.set_send_timeout_ms(7_000);
    adapter.set_byte_timeout_ms(50);
    adapter.set_write_timeout_ms(250);

    assert_eq!(7_000, adapter.session.send_timeout_ms);
    assert_eq!(50, adapter.engine.byte_timeout_ms);
    assert_eq!(250, adapter.engine.serial.write_timeout_ms);
}
