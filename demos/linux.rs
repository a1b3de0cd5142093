//! Example that runs on Linux using a serial-USB-adapter.
use std::{
    env,
    io::{self, Read},
    net::ToSocketAddrs,
    thread,
    time::Duration,
};

use embedded_nal::TcpClientStack;
use esp_at_serial::{
    ring::RingBuffer,
    wifi::{Adapter, WifiAdapter},
};
use serialport::{DataBits, FlowControl, Parity, SerialPort, StopBits};

// Capacity of the receive ring buffer. Needs to hold the complete response of a receive() call.
const RX_SIZE: usize = 4096;

// Size of the application receive buffer
const BUFFER_SIZE: usize = 2048;

// Timer frequency in Hz
const TIMER_HZ: u32 = 1000;

fn main() {
    env_logger::init();

    // Parse args
    let args: Vec<String> = env::args().collect();
    if args.len() != 5 {
        println!("Usage: {} <path-to-serial> <baudrate> <ssid> <psk>", args[0]);
        println!("Example: {} /dev/ttyUSB0 115200 mywifi hellopasswd123", args[0]);
        println!("\nNote: To run the example with debug logging, run it like this:");
        println!("\n  RUST_LOG=trace cargo run --example linux -- /dev/ttyUSB0 115200 mywifi hellopasswd123");
        std::process::exit(1);
    }
    let dev = &args[1];
    let baud_rate: u32 = args[2].parse().unwrap();
    let ssid = &args[3];
    let psk = &args[4];

    println!("Starting (dev={}, baud={:?})...", dev, baud_rate);

    // Open serial port
    let serial_tx = serialport::new(dev, baud_rate)
        .data_bits(DataBits::Eight)
        .flow_control(FlowControl::None)
        .parity(Parity::None)
        .stop_bits(StopBits::One)
        .timeout(Duration::from_millis(500))
        .open()
        .expect("Could not open serial port");
    let mut serial_rx = serial_tx.try_clone().expect("Could not clone serial port");

    // Flush serial RX buffer, to ensure that there isn't any remaining left
    // form previous sessions.
    flush_serial(&mut serial_rx);

    // Ring buffer shared between the reading thread and the adapter
    let ring: &'static mut RingBuffer<RX_SIZE> = Box::leak(Box::new(RingBuffer::new()));
    let (mut producer, consumer) = ring.split();

    // Launch reading thread, taking the role of the UART interrupt handler
    thread::Builder::new()
        .name("serial_read".to_string())
        .spawn(move || loop {
            let mut buffer = [0; 32];
            match serial_rx.read(&mut buffer[..]) {
                Ok(0) => {}
                Ok(bytes_read) => {
                    if producer.push_slice(&buffer[..bytes_read]).is_err() {
                        log::error!("Ring buffer overrun, dropped received data");
                    }
                }
                Err(e) => match e.kind() {
                    io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut | io::ErrorKind::Interrupted => {
                        // Ignore
                    }
                    _ => {
                        log::error!("Serial reading thread error while reading: {}", e);
                        producer.report_fault();
                    }
                },
            }
        })
        .unwrap();

    // ESP AT adapter
    let mut adapter: Adapter<_, _, TIMER_HZ, RX_SIZE> =
        Adapter::new(transport::SerialWriter(serial_tx), consumer, timer::SysTimer::new());
    adapter.init().expect("Failed to initialize module");

    // Join WIFI access point
    println!("Join WiFi \"{}\"...", ssid);
    let state = adapter.join(ssid, psk).unwrap();
    assert!(state.connected);
    println!("Local IP: {}", adapter.get_ip().unwrap());

    // Resolve IPv4 for ifconfig.net
    let remote_host = "ifconfig.net";
    let socket_addr = (remote_host, 80)
        .to_socket_addrs()
        .unwrap()
        .find(|addr| addr.is_ipv4())
        .unwrap();

    // Create TCP connection
    let mut socket = adapter.socket().expect("Failed to create socket");
    println!("Connecting to {}...", remote_host);
    adapter
        .connect(&mut socket, socket_addr)
        .unwrap_or_else(|_| panic!("Failed to connect to {}", remote_host));
    println!("Connected!");

    // Send HTTP request
    println!("Sending HTTP request...");
    let request = b"GET / HTTP/1.1\r\nAccept: text/plain\r\nHost: ifconfig.net\r\nConnection: close\r\n\r\n";
    adapter.send(&mut socket, request).expect("Could not send HTTP request");

    // Read response
    let mut rx_buf = [0; BUFFER_SIZE];
    let bytes_read = nb::block!(adapter.receive(&mut socket, &mut rx_buf)).expect("Error while receiving data");
    println!("Read {} bytes", bytes_read);
    let response = std::str::from_utf8(&rx_buf[..bytes_read]).expect("HTTP response is not valid UTF8");

    // Very primitive HTTP response parsing
    let (headers, body) = response.split_once("\r\n\r\n").unwrap_or_else(|| {
        println!("Response:\n---\n{}\n---", response);
        panic!("Could not parse HTTP response");
    });
    if !headers.starts_with("HTTP/1.1 200 ") {
        panic!("Bad HTTP response, found {}", headers.lines().next().unwrap_or_default());
    }
    println!("Your public IP, as returned by {}: {}", remote_host, body.trim());

    adapter.close(socket).unwrap();
}

/// Flush the serial port receive buffer.
fn flush_serial(serial_rx: &mut Box<dyn SerialPort>) {
    let mut buf = [0; 32];
    loop {
        match serial_rx.read(&mut buf[..]) {
            Ok(0) => break,
            Err(e) if e.kind() == io::ErrorKind::WouldBlock || e.kind() == io::ErrorKind::TimedOut => break,
            Ok(_) => continue,
            Err(e) => panic!("Error while flushing serial: {}", e),
        }
    }
}

mod transport {
    use serialport::SerialPort;
    use std::io::Write as _;

    /// Transmitting side of the serial port
    pub struct SerialWriter(pub Box<dyn SerialPort>);

    impl embedded_io::ErrorType for SerialWriter {
        type Error = embedded_io::ErrorKind;
    }

    impl embedded_io::Write for SerialWriter {
        fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
            match self.0.write(buf) {
                Ok(written) => Ok(written),
                Err(e) if e.kind() == std::io::ErrorKind::TimedOut => Ok(0),
                Err(_) => Err(embedded_io::ErrorKind::Other),
            }
        }

        fn flush(&mut self) -> Result<(), Self::Error> {
            self.0.flush().map_err(|_| embedded_io::ErrorKind::Other)
        }
    }
}

mod timer {
    use fugit::{TimerDurationU32, TimerInstantU32};
    use fugit_timer::Timer;
    use std::time::Instant;

    /// Monotonic millisecond clock since creation
    pub struct SysTimer {
        origin: Instant,
        deadline: Option<u32>,
    }

    impl SysTimer {
        pub fn new() -> Self {
            Self {
                origin: Instant::now(),
                deadline: None,
            }
        }

        fn ticks(&self) -> u32 {
            // Wraps after ~49 days, which the driver tolerates
            self.origin.elapsed().as_millis() as u32
        }
    }

    impl Timer<1000> for SysTimer {
        type Error = &'static str;

        fn now(&mut self) -> TimerInstantU32<1000> {
            TimerInstantU32::from_ticks(self.ticks())
        }

        fn start(&mut self, duration: TimerDurationU32<1000>) -> Result<(), Self::Error> {
            self.deadline = Some(self.ticks().wrapping_add(duration.ticks()));
            Ok(())
        }

        fn cancel(&mut self) -> Result<(), Self::Error> {
            self.deadline.take().map(|_| ()).ok_or("cannot cancel stopped timer")
        }

        fn wait(&mut self) -> nb::Result<(), Self::Error> {
            match self.deadline {
                Some(deadline) if (self.ticks().wrapping_sub(deadline) as i32) >= 0 => Ok(()),
                Some(_) => Err(nb::Error::WouldBlock),
                None => Err(nb::Error::Other("timer not started")),
            }
        }
    }
}
