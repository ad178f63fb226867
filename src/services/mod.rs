//! Services - scan processing logic and session state
//!
//! - `decoder` - Key events to barcode strings
//! - `interpreter` - Mode / attribute state machine
//! - `quantity` - Per-action quantity rules
//! - `inventory` - Inventory service interface
//! - `dispatcher` - Product action routing
//! - `processor` - One barcode end to end
//! - `scan_worker` - Single-writer actor owning the processor

pub mod decoder;
pub mod dispatcher;
pub mod interpreter;
pub mod inventory;
pub mod processor;
pub mod quantity;
pub mod scan_worker;

// Re-export commonly used types
pub use decoder::KeyDecoder;
pub use dispatcher::{CreateOutcome, DispatchError, Dispatcher};
pub use interpreter::{InterpretResult, Interpreter};
pub use inventory::{Inventory, InventoryError};
pub use processor::{ProcessError, ScanProcessor};
pub use scan_worker::{create_scan_worker, ScanInput, ScanOrigin, ScanWorker, SubmitError};
