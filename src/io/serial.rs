//! Serial scanner input (SPP / virtual COM port scanners)
//!
//! These scanners send the barcode as plain ASCII followed by CR and/or LF.

use crate::domain::types::{KeyInput, KeyState};
use crate::infra::config::Config;
use crate::infra::metrics::Metrics;
use crate::io::hid::wait_reconnect;
use crate::io::key_stream::KeyStream;
use crate::services::scan_worker::{ScanInput, ScanOrigin};
use std::io::ErrorKind;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::sync::watch;
use tokio_serial::SerialPortBuilderExt;
use tracing::{error, info, warn};

/// Map one received byte to decoder input
pub fn byte_input(byte: u8) -> KeyInput {
    match byte {
        b'\r' | b'\n' => KeyInput::Enter,
        0x20..=0x7E => KeyInput::Char(byte as char),
        other => KeyInput::Unmapped(other as u16),
    }
}

pub struct SerialListener {
    device: String,
    baud: u32,
    stream: KeyStream,
    input: ScanInput,
}

impl SerialListener {
    pub fn new(config: &Config, input: ScanInput, metrics: Arc<Metrics>) -> Self {
        Self {
            device: config.scanner_device().to_string(),
            baud: config.scanner_baud(),
            stream: KeyStream::new(Duration::from_millis(config.scanner_timeout_ms()), metrics),
            input,
        }
    }

    fn forward(&self, barcode: Option<String>) {
        if let Some(barcode) = barcode {
            if let Err(e) = self.input.submit(barcode, ScanOrigin::Scanner) {
                warn!(error = %e, "serial_barcode_not_forwarded");
            }
        }
    }

    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        info!(device = %self.device, baud = %self.baud, "serial_listener_started");

        loop {
            let port = tokio_serial::new(&self.device, self.baud)
                .timeout(Duration::from_millis(100))
                .open_native_async();

            let mut port = match port {
                Ok(p) => {
                    info!(device = %self.device, "serial_port_opened");
                    p
                }
                Err(e) => {
                    error!(device = %self.device, error = %e, "serial_port_open_failed");
                    if wait_reconnect(&mut shutdown).await {
                        break;
                    }
                    continue;
                }
            };

            let mut buf = [0u8; 256];
            let mut tick = tokio::time::interval(self.stream.tick_interval());

            let stop = loop {
                tokio::select! {
                    read = port.read(&mut buf) => {
                        match read {
                            Ok(0) => {
                                warn!(device = %self.device, "serial_port_closed");
                                break false;
                            }
                            Ok(n) => {
                                for &byte in &buf[..n] {
                                    // Bytes have no release; each one is a press
                                    let barcode = self.stream.key(byte_input(byte), KeyState::Press);
                                    self.forward(barcode);
                                }
                            }
                            Err(e) if e.kind() == ErrorKind::TimedOut => {}
                            Err(e) => {
                                warn!(device = %self.device, error = %e, "serial_read_error");
                                break false;
                            }
                        }
                    }
                    _ = tick.tick() => {
                        let barcode = self.stream.tick();
                        self.forward(barcode);
                    }
                    _ = shutdown.changed() => break true,
                }
            };

            self.stream.reset();
            if stop || wait_reconnect(&mut shutdown).await {
                break;
            }
        }

        info!("serial_listener_stopped");
    }
}
