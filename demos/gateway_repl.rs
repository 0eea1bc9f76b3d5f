use anyhow::{bail, Context, Result};
use serialport::{DataBits, Parity, SerialPort, StopBits};
use std::io::{Read, Write};
use std::str::SplitWhitespace;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use ems_proto::transport::{BusLink, Clock, RxByte};
use ems_proto::{
    Config, Dispatcher, NetworkDiagnostics, NetworkModule, Orchestrator, Request, Timestamp,
    Timezone,
};

/// Serial port adapter. Breaks are generated with the port's break control;
/// a received zero byte with nothing queued behind it is taken as the break
/// ending a frame.
struct SerialLink {
    port: Box<dyn SerialPort>,
}

impl BusLink for SerialLink {
    type Error = serialport::Error;

    fn available(&mut self) -> Result<bool, Self::Error> {
        Ok(self.port.bytes_to_read()? > 0)
    }

    fn read_byte(&mut self) -> Result<Option<RxByte>, Self::Error> {
        if self.port.bytes_to_read()? == 0 {
            return Ok(None);
        }
        let mut byte = [0u8];
        self.port.read_exact(&mut byte)?;
        if byte[0] == 0 && self.port.bytes_to_read()? == 0 {
            return Ok(Some(RxByte::boundary()));
        }
        Ok(Some(RxByte::data(byte[0])))
    }

    fn write_byte(&mut self, byte: u8) -> Result<(), Self::Error> {
        self.port.write_all(&[byte])?;
        Ok(())
    }

    fn send_break(&mut self) -> Result<(), Self::Error> {
        self.port.flush()?;
        self.port.set_break()?;
        std::thread::sleep(Duration::from_micros(1100));
        self.port.clear_break()
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        self.port.flush()?;
        Ok(())
    }
}

struct StdClock(Instant);

impl Clock for StdClock {
    fn now_ms(&mut self) -> u32 {
        // truncation wraps like a hardware tick counter
        self.0.elapsed().as_millis() as u32
    }

    fn delay_us(&mut self, micros: u32) {
        std::thread::sleep(Duration::from_micros(micros.into()));
    }
}

/// Stands in for the wireless bridge when running on a host.
#[derive(Default)]
struct HostNetwork {
    timezone: Option<Timezone>,
    started: Option<Instant>,
}

impl NetworkModule for HostNetwork {
    fn timestamp(&mut self) -> Timestamp {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as Timestamp)
            .unwrap_or_default()
    }

    fn reboot(&mut self) -> bool {
        println!("Reboot isn't supported on the host.");
        false
    }

    fn reconfigure(&mut self, timezone: Timezone) -> bool {
        println!("Timezone set to {:?}", timezone);
        self.timezone = Some(timezone);
        true
    }

    fn diagnostics(&mut self) -> NetworkDiagnostics {
        NetworkDiagnostics {
            uptime_s: self
                .started
                .get_or_insert_with(Instant::now)
                .elapsed()
                .as_secs() as u32,
            ..NetworkDiagnostics::default()
        }
    }
}

/// Parse `<code> [circuit=N] [mode=N] [temp=N] [tz=N] [value=N]`.
fn parse_request(line: &str) -> Result<Request> {
    let mut words: SplitWhitespace = line.split_whitespace();
    let code = words.next().context("Missing operation code")?;
    let mut request = Request::new(code.parse().context("Operation code must be a number")?);
    for word in words {
        let (key, value) = word.split_once('=').context("Expected key=value")?;
        let value: u8 = value
            .parse()
            .with_context(|| format!("Invalid value for {}", key))?;
        request = match key {
            "circuit" | "hc" => request.circuit(value),
            "mode" => request.mode(value),
            "temp" => request.temp(value),
            "tz" | "timezone" => request.timezone(value),
            "value" => request.value(value),
            _ => bail!("Unknown parameter {}", key),
        };
    }
    Ok(request)
}

fn main() -> Result<()> {
    env_logger::init();

    let mut args = std::env::args();
    args.next(); // Skip program name
    let port = args.next().unwrap_or_else(|| "/dev/ttyUSB0".to_string());

    let port = serialport::new(&port, 9600)
        .data_bits(DataBits::Eight)
        .parity(Parity::None)
        .stop_bits(StopBits::One)
        .timeout(Duration::from_millis(10))
        .open()
        .with_context(|| format!("Failed to open serial port {}", port))?;

    let engine = Orchestrator::new(
        SerialLink { port },
        StdClock(Instant::now()),
        Config::default(),
    );
    let mut gateway = Dispatcher::new(engine, HostNetwork::default());

    let mut stdout = std::io::stdout();
    let mut line = String::new();
    loop {
        print!(">> ");
        stdout.flush()?;
        line.clear();
        if std::io::stdin().read_line(&mut line)? == 0 {
            return Ok(());
        }
        if line.trim().is_empty() {
            continue;
        }
        match parse_request(&line) {
            Ok(request) => println!("{:#?}", gateway.handle(&request)),
            Err(err) => println!("{:?}", err),
        }
    }
}
