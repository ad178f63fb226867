//! Domain models - core types shared by every layer
//!
//! This module contains the canonical data types used throughout the system:
//! - `Mode` / `SessionState` - persistent scanner session
//! - `RawEvent` / `KeyInput` - key events from an input source
//! - `ProductSnapshot` - normalized inventory product data
//! - `ActionResult` / `ScanReport` - outcome of a processed barcode
//! - `keymap` - Linux key code to character mapping

pub mod keymap;
pub mod types;

pub use types::{
    ActionResult, AttributeKind, KeyInput, KeyState, Mode, Overrides, ProductId, ProductSnapshot, RawEvent,
    ReportKind, ScanReport, SessionState,
};
