//! Shared types for the barcode gateway

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

/// Newtype wrapper for inventory product IDs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(transparent)]
pub struct ProductId(pub i64);

impl std::fmt::Display for ProductId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Scanner mode: the action applied to subsequently scanned product barcodes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Mode {
    Consume,
    Finish,
    Purchase,
    Shopping,
    Create,
    Open,
    Expire,
    ClearScanner,
}

impl Mode {
    pub const ALL: [Mode; 8] = [
        Mode::Consume,
        Mode::Finish,
        Mode::Purchase,
        Mode::Shopping,
        Mode::Create,
        Mode::Open,
        Mode::Expire,
        Mode::ClearScanner,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Consume => "consume",
            Mode::Finish => "finish",
            Mode::Purchase => "purchase",
            Mode::Shopping => "shopping",
            Mode::Create => "create",
            Mode::Open => "open",
            Mode::Expire => "expire",
            Mode::ClearScanner => "clear-scanner",
        }
    }

    /// Case-insensitive match against the mode vocabulary
    pub fn from_token(token: &str) -> Option<Mode> {
        Self::ALL.into_iter().find(|mode| mode.as_str().eq_ignore_ascii_case(token))
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The four kinds of session attribute override
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeKind {
    Store,
    Location,
    Quantity,
    Group,
}

impl AttributeKind {
    /// Order used when describing overrides to the user
    pub const DESCRIBE_ORDER: [AttributeKind; 4] = [
        AttributeKind::Group,
        AttributeKind::Quantity,
        AttributeKind::Location,
        AttributeKind::Store,
    ];

    /// `ST`, `LC`, `QT` or `GRP`, case-insensitive
    pub fn from_type_code(code: &str) -> Option<Self> {
        if code.eq_ignore_ascii_case("ST") {
            Some(AttributeKind::Store)
        } else if code.eq_ignore_ascii_case("LC") {
            Some(AttributeKind::Location)
        } else if code.eq_ignore_ascii_case("QT") {
            Some(AttributeKind::Quantity)
        } else if code.eq_ignore_ascii_case("GRP") {
            Some(AttributeKind::Group)
        } else {
            None
        }
    }
}

/// Session-scoped attribute overrides set by `ST-`, `LC-`, `QT-` and `GRP-` tokens
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Overrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub store: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quantity: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
}

impl Overrides {
    pub fn get(&self, kind: AttributeKind) -> Option<&str> {
        match kind {
            AttributeKind::Store => self.store.as_deref(),
            AttributeKind::Location => self.location.as_deref(),
            AttributeKind::Quantity => self.quantity.as_deref(),
            AttributeKind::Group => self.group.as_deref(),
        }
    }

    pub fn slot_mut(&mut self, kind: AttributeKind) -> &mut Option<String> {
        match kind {
            AttributeKind::Store => &mut self.store,
            AttributeKind::Location => &mut self.location,
            AttributeKind::Quantity => &mut self.quantity,
            AttributeKind::Group => &mut self.group,
        }
    }

    /// Set overrides in describe order
    pub fn iter(&self) -> impl Iterator<Item = (AttributeKind, &str)> + '_ {
        AttributeKind::DESCRIBE_ORDER
            .into_iter()
            .filter_map(move |kind| self.get(kind).map(|id| (kind, id)))
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_none()
            && self.location.is_none()
            && self.quantity.is_none()
            && self.group.is_none()
    }
}

/// The only state that outlives a single barcode
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionState {
    pub mode: Mode,
    pub overrides: Overrides,
}

impl SessionState {
    pub fn new(default_mode: Mode) -> Self {
        Self { mode: default_mode, overrides: Overrides::default() }
    }
}

/// What a key event means to the decoder
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyInput {
    /// Printable key with its mapped character
    Char(char),
    /// Terminator (Enter / CR / LF)
    Enter,
    /// Key with no character mapping (shift, function keys, ...)
    Unmapped(u16),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyState {
    Press,
    Release,
    Repeat,
}

impl KeyState {
    /// Map a Linux `input_event.value` for `EV_KEY`
    pub fn from_evdev_value(value: i32) -> Self {
        match value {
            0 => KeyState::Release,
            1 => KeyState::Press,
            _ => KeyState::Repeat,
        }
    }
}

/// A single timestamped key event from an input source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawEvent {
    pub key: KeyInput,
    pub state: KeyState,
    /// Monotonic timestamp relative to the source's start
    pub at: Duration,
}

impl RawEvent {
    pub fn press(key: KeyInput, at: Duration) -> Self {
        Self { key, state: KeyState::Press, at }
    }

    pub fn release(key: KeyInput, at: Duration) -> Self {
        Self { key, state: KeyState::Release, at }
    }
}

/// Per-barcode entry from the product's barcode list
#[derive(Debug, Clone, PartialEq)]
pub struct ProductBarcode {
    pub barcode: String,
    pub amount: Option<f64>,
}

/// Stock unit names used for message composition
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QuantityUnitNames {
    pub name: Option<String>,
    pub name_plural: Option<String>,
}

/// Normalized product data read from the inventory service
#[derive(Debug, Clone, PartialEq)]
pub struct ProductSnapshot {
    pub id: ProductId,
    pub name: String,
    pub stock_amount: f64,
    pub stock_amount_opened: f64,
    pub quick_consume_amount: f64,
    pub quick_open_amount: f64,
    pub quick_purchase_amount: f64,
    pub purchase_to_stock_factor: f64,
    pub barcodes: Vec<ProductBarcode>,
    pub unit: QuantityUnitNames,
}

impl ProductSnapshot {
    /// First per-barcode override matching the literal scanned barcode
    pub fn barcode_override(&self, barcode: &str) -> Option<&ProductBarcode> {
        self.barcodes.iter().find(|b| b.barcode == barcode)
    }
}

/// Result of an external catalog lookup, used to create unknown products
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CatalogEntry {
    pub name: String,
    pub location_id: Option<String>,
    pub quantity_unit_id: Option<String>,
    pub product_group_id: Option<String>,
    pub shopping_location_id: Option<String>,
}

/// Product creation request
#[derive(Debug, Clone, PartialEq)]
pub struct NewProduct {
    pub name: String,
    pub barcode: String,
    pub description: String,
    pub quantity_unit_id: Option<String>,
    pub location_id: Option<String>,
    pub product_group_id: Option<String>,
    pub shopping_location_id: Option<String>,
}

/// Normalized outcome of one action, never mutated after creation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActionResult {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Value::is_null")]
    pub raw: Value,
}

impl ActionResult {
    pub fn ok(message: impl Into<String>) -> Self {
        Self { success: true, message: message.into(), raw: Value::Null }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self { success: false, message: message.into(), raw: Value::Null }
    }

    /// Normalize an arbitrary collaborator response.
    ///
    /// Objects keep their own `success`/`message` when present; anything else is
    /// wrapped as `{"data": ...}`. A missing `success` flag means success.
    pub fn from_response(raw: Value, fallback_message: impl Into<String>) -> Self {
        let raw = match raw {
            Value::Object(_) => raw,
            Value::Null => Value::Object(Default::default()),
            other => serde_json::json!({ "data": other }),
        };
        let success = raw.get("success").and_then(Value::as_bool).unwrap_or(true);
        let message = raw
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| fallback_message.into());
        Self { success, message, raw }
    }
}

/// Classification of a processed scan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportKind {
    ScannerCleared,
    ModeChange,
    ModeAttributeChange,
    AttributesUpdated,
    Create,
    ProductAction,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductSummary {
    pub id: ProductId,
    pub name: String,
}

/// Structured result returned for every processed barcode
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScanReport {
    pub kind: ReportKind,
    pub mode: Mode,
    pub barcode: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product: Option<ProductSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attributes: Option<Overrides>,
    /// Amount sent to the inventory for a product action
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quantity: Option<f64>,
    pub result: ActionResult,
}
