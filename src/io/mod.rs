//! IO modules - external system interfaces
//!
//! - `grocy` - Grocy REST client implementing `Inventory`
//! - `feedback` - User feedback sink
//! - `key_stream` - Decoder front end shared by input sources
//! - `hid` - Linux evdev scanner input
//! - `serial` - Serial port scanner input
//! - `replay` - Barcodes typed from a file
//! - `control` - HTTP control surface and Prometheus endpoint

pub mod control;
pub mod feedback;
pub mod grocy;
pub mod hid;
pub mod key_stream;
pub mod replay;
pub mod serial;

// Re-export commonly used types
pub use control::{start_control_server, ControlContext};
pub use feedback::{FeedbackEvent, FeedbackSink, TracingFeedback};
pub use grocy::{GrocyClient, GrocyOptions};
pub use hid::HidListener;
pub use replay::run_replay;
pub use serial::SerialListener;
