//! Quantity resolution - how much to consume, open, purchase or list
//!
//! Each action has its own deterministic rule over the product's stock
//! snapshot, the literal scanned barcode (for per-barcode overrides) and a
//! nominal requested quantity. Every resolution also carries the snapshot's
//! total stock amount for message composition.

use crate::domain::types::{ProductSnapshot, QuantityUnitNames};
use thiserror::Error;
use tracing::{debug, info};

/// Quantity requested by a single scan
pub const NOMINAL_QUANTITY: f64 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolvedQuantity {
    pub quantity: f64,
    pub total: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QuantityError {
    #[error("Nothing left in the inventory to consume.")]
    NothingLeft,
}

/// Consume: drain opened stock first, in quick-consume sized steps
pub fn consume_quantity(product: &ProductSnapshot) -> Result<ResolvedQuantity, QuantityError> {
    let stock = product.stock_amount;
    let opened = product.stock_amount_opened;
    let quick = product.quick_consume_amount;

    info!(
        quick_consume = quick,
        stock_amount_opened = opened,
        stock_amount = stock,
        "consume_quantity_inputs"
    );

    if stock <= 0.0 {
        return Err(QuantityError::NothingLeft);
    }

    let quantity = if quick < opened {
        quick
    } else if opened != 0.0 {
        opened
    } else if quick < stock {
        quick
    } else {
        stock
    };

    Ok(ResolvedQuantity { quantity, total: stock })
}

/// Finish: everything opened, otherwise everything in stock
pub fn finish_quantity(product: &ProductSnapshot) -> Result<ResolvedQuantity, QuantityError> {
    let stock = product.stock_amount;
    let opened = product.stock_amount_opened;
    let quantity = if opened != 0.0 { opened } else { stock };

    info!(quantity = quantity, stock_amount_opened = opened, stock_amount = stock, "finish_quantity");

    if quantity == 0.0 {
        return Err(QuantityError::NothingLeft);
    }
    Ok(ResolvedQuantity { quantity, total: stock })
}

/// Expire uses the finish rule; the caller routes it to trash
pub fn expire_quantity(product: &ProductSnapshot) -> Result<ResolvedQuantity, QuantityError> {
    finish_quantity(product)
}

/// Purchase: barcode override, else quick-purchase default, else nominal
pub fn purchase_quantity(product: &ProductSnapshot, barcode: &str, nominal: f64) -> ResolvedQuantity {
    let mut quantity = product.quick_purchase_amount;
    if let Some(entry) = product.barcode_override(barcode) {
        quantity = entry.amount.unwrap_or(0.0);
        info!(barcode = %barcode, quantity = quantity, "purchase_barcode_override");
    }
    if quantity == 0.0 {
        quantity = nominal;
    }
    ResolvedQuantity { quantity, total: product.stock_amount }
}

/// Shopping: nominal times the purchase-to-stock factor.
///
/// A matching barcode override is only logged, never applied.
pub fn shopping_quantity(product: &ProductSnapshot, barcode: &str, nominal: f64) -> ResolvedQuantity {
    let factor = if product.purchase_to_stock_factor == 0.0 {
        1.0
    } else {
        product.purchase_to_stock_factor.trunc()
    };
    let mut quantity = nominal * factor;

    if let Some(entry) = product.barcode_override(barcode) {
        debug!(
            barcode = %barcode,
            override_amount = ?entry.amount,
            quantity = quantity,
            "shopping_barcode_override_ignored"
        );
    }
    if quantity == 0.0 {
        quantity = nominal;
    }
    ResolvedQuantity { quantity, total: product.stock_amount }
}

/// Open: barcode override, else quick-open default, else nominal
pub fn open_quantity(product: &ProductSnapshot, barcode: &str, nominal: f64) -> ResolvedQuantity {
    let mut quantity = product.quick_open_amount;
    if let Some(entry) = product.barcode_override(barcode) {
        quantity = entry.amount.unwrap_or(0.0);
        debug!(barcode = %barcode, quantity = quantity, "open_barcode_override");
    }
    if quantity == 0.0 {
        quantity = nominal;
    }
    ResolvedQuantity { quantity, total: product.stock_amount }
}

/// One decimal place, trailing zero and point stripped, leading zero stripped
pub fn format_quantity(quantity: f64) -> String {
    let formatted = format!("{:.1}", quantity);
    formatted.trim_end_matches('0').trim_end_matches('.').trim_start_matches('0').to_string()
}

/// "1 Piece" / "2 Pieces": singular only when the quantity is exactly 1
pub fn quantity_label(unit: &QuantityUnitNames, quantity: f64) -> String {
    let name = if quantity == 1.0 {
        unit.name.as_deref()
    } else {
        unit.name_plural.as_deref().or(unit.name.as_deref())
    };
    match name {
        Some(name) => format!("{} {}", format_quantity(quantity), name),
        None => format_quantity(quantity),
    }
}
