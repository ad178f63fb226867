//! Inventory service interface
//!
//! The core only talks to the stock-tracking service through this trait.
//! Implementations normalize whatever payload shape the service returns into
//! `ProductSnapshot` before it crosses this boundary.

use crate::domain::types::{AttributeKind, CatalogEntry, NewProduct, ProductId, ProductSnapshot};
use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InventoryError {
    /// The service has no product with this barcode
    #[error("Product not found for barcode: {0}")]
    NotFound(String),
    #[error("inventory request timed out")]
    Timeout,
    #[error("inventory returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("inventory request failed: {0}")]
    Transport(String),
    #[error("unexpected inventory payload: {0}")]
    Decode(String),
}

impl InventoryError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, InventoryError::NotFound(_))
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, InventoryError::Timeout)
    }
}

#[async_trait]
pub trait Inventory: Send + Sync {
    /// Look up a product and its stock by barcode
    async fn product_by_barcode(&self, barcode: &str) -> Result<ProductSnapshot, InventoryError>;

    /// External catalog lookup; `None` when the catalog has no entry
    async fn external_lookup(&self, barcode: &str) -> Result<Option<CatalogEntry>, InventoryError>;

    /// Display name of the location, unit, group or store behind an override id
    async fn attribute_name(&self, kind: AttributeKind, id: &str) -> Result<String, InventoryError>;

    /// Create a product and attach its barcode, returning the new id
    async fn create_product(&self, product: &NewProduct) -> Result<ProductId, InventoryError>;

    async fn consume(&self, id: ProductId, amount: f64) -> Result<Value, InventoryError>;

    /// Consume as spoiled
    async fn trash(&self, id: ProductId, amount: f64) -> Result<Value, InventoryError>;

    async fn open(&self, id: ProductId, amount: f64) -> Result<Value, InventoryError>;

    async fn add_to_shopping_list(&self, id: ProductId, amount: f64) -> Result<Value, InventoryError>;

    async fn purchase(&self, id: ProductId, amount: f64) -> Result<Value, InventoryError>;
}
