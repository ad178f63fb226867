//! USB HID scanner input (Linux evdev)
//!
//! Record layout (`struct input_event`, 64-bit):
//! - 0..8   tv_sec  (i64)
//! - 8..16  tv_usec (i64)
//! - 16..18 type    (u16)
//! - 18..20 code    (u16)
//! - 20..24 value   (i32)
//!
//! Only `EV_KEY` records are used. The kernel timestamp is ignored in favour
//! of the reception clock so the decoder timeout stays monotonic.
//!
//! The device is opened `O_NONBLOCK` and polled through the reactor, so no
//! thread is ever parked in read(2) and shutdown releases the device at once.

use crate::domain::keymap::key_input;
use crate::domain::types::KeyState;
use crate::infra::config::Config;
use crate::infra::metrics::Metrics;
use crate::io::key_stream::KeyStream;
use crate::services::scan_worker::{ScanInput, ScanOrigin};
use bytes::{Buf, BytesMut};
use std::fs::{File, OpenOptions};
use std::io::{self, Read};
use std::os::unix::fs::OpenOptionsExt;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::unix::AsyncFd;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

pub const INPUT_EVENT_SIZE: usize = 24;
pub const EV_KEY: u16 = 0x01;

const PROC_INPUT_DEVICES: &str = "/proc/bus/input/devices";
const RECONNECT_DELAY: Duration = Duration::from_secs(2);

/// Decode one `input_event`; `None` for anything other than a key event
pub fn parse_input_event(record: &[u8]) -> Option<(u16, KeyState)> {
    if record.len() < INPUT_EVENT_SIZE {
        return None;
    }
    let ev_type = u16::from_ne_bytes([record[16], record[17]]);
    if ev_type != EV_KEY {
        return None;
    }
    let code = u16::from_ne_bytes([record[18], record[19]]);
    let value = i32::from_ne_bytes([record[20], record[21], record[22], record[23]]);
    Some((code, KeyState::from_evdev_value(value)))
}

/// Find the event node of the first device whose name looks like a scanner
pub fn find_scanner_device(proc_devices: &str) -> Option<String> {
    for block in proc_devices.split("\n\n") {
        let mut name_matches = false;
        let mut event_node = None;

        for line in block.lines() {
            if let Some(name) = line.strip_prefix("N: Name=") {
                let name = name.to_ascii_lowercase();
                name_matches = name.contains("scanner") || name.contains("barcode");
            } else if let Some(handlers) = line.strip_prefix("H: Handlers=") {
                event_node = handlers
                    .split_whitespace()
                    .find(|h| h.starts_with("event"))
                    .map(|h| format!("/dev/input/{}", h));
            }
        }

        if name_matches {
            if let Some(node) = event_node {
                return Some(node);
            }
        }
    }
    None
}

/// Open an input device for reactor-driven reads. Must run inside a runtime.
pub fn open_device(path: impl AsRef<Path>) -> io::Result<AsyncFd<File>> {
    let file = OpenOptions::new()
        .read(true)
        .custom_flags(libc::O_NONBLOCK)
        .open(path)?;
    AsyncFd::new(file)
}

/// Read whatever the device has buffered, waiting for readiness first.
/// Dropping the future abandons the wait without touching the fd.
pub async fn read_device(device: &AsyncFd<File>, buf: &mut [u8]) -> io::Result<usize> {
    loop {
        let mut guard = device.readable().await?;
        match guard.try_io(|inner| {
            let mut file: &File = inner.get_ref();
            file.read(buf)
        }) {
            Ok(result) => return result,
            Err(_would_block) => continue,
        }
    }
}

/// Sleep before reconnecting; true when shutdown was signalled instead
pub(crate) async fn wait_reconnect(shutdown: &mut watch::Receiver<bool>) -> bool {
    tokio::select! {
        _ = tokio::time::sleep(RECONNECT_DELAY) => false,
        _ = shutdown.changed() => true,
    }
}

pub struct HidListener {
    device: String,
    stream: KeyStream,
    input: ScanInput,
}

impl HidListener {
    pub fn new(config: &Config, input: ScanInput, metrics: Arc<Metrics>) -> Self {
        Self {
            device: config.scanner_device().to_string(),
            stream: KeyStream::new(Duration::from_millis(config.scanner_timeout_ms()), metrics),
            input,
        }
    }

    async fn resolve_device(&self) -> Option<String> {
        if !self.device.is_empty() {
            return Some(self.device.clone());
        }
        match tokio::fs::read_to_string(PROC_INPUT_DEVICES).await {
            Ok(text) => find_scanner_device(&text),
            Err(e) => {
                warn!(error = %e, "hid_device_list_unreadable");
                None
            }
        }
    }

    fn forward(&self, barcode: Option<String>) {
        if let Some(barcode) = barcode {
            if let Err(e) = self.input.submit(barcode, ScanOrigin::Scanner) {
                warn!(error = %e, "hid_barcode_not_forwarded");
            }
        }
    }

    /// Read the device until shutdown, reopening it when it disappears
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        info!(device = %self.device, "hid_listener_started");

        loop {
            let Some(device) = self.resolve_device().await else {
                warn!("hid_no_scanner_found");
                if wait_reconnect(&mut shutdown).await {
                    break;
                }
                continue;
            };

            let fd = match open_device(&device) {
                Ok(f) => {
                    info!(device = %device, "hid_device_opened");
                    f
                }
                Err(e) => {
                    error!(device = %device, error = %e, "hid_device_open_failed");
                    if wait_reconnect(&mut shutdown).await {
                        break;
                    }
                    continue;
                }
            };

            let mut buf = [0u8; INPUT_EVENT_SIZE * 64];
            let mut acc = BytesMut::with_capacity(INPUT_EVENT_SIZE * 64);
            let mut tick = tokio::time::interval(self.stream.tick_interval());

            let stop = loop {
                tokio::select! {
                    read = read_device(&fd, &mut buf) => {
                        match read {
                            Ok(0) => {
                                warn!(device = %device, "hid_device_closed");
                                break false;
                            }
                            Ok(n) => {
                                acc.extend_from_slice(&buf[..n]);
                                while acc.len() >= INPUT_EVENT_SIZE {
                                    if let Some((code, state)) = parse_input_event(&acc[..INPUT_EVENT_SIZE]) {
                                        let barcode = self.stream.key(key_input(code), state);
                                        self.forward(barcode);
                                    }
                                    acc.advance(INPUT_EVENT_SIZE);
                                }
                            }
                            Err(e) => {
                                warn!(device = %device, error = %e, "hid_read_error");
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

            drop(fd);
            self.stream.reset();
            if stop {
                break;
            }
            debug!(device = %device, "hid_reconnect_wait");
            if wait_reconnect(&mut shutdown).await {
                break;
            }
        }

        info!("hid_listener_stopped");
    }
}
