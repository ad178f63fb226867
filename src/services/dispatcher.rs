//! Action dispatcher - routes a resolved product scan to the inventory
//!
//! Given the current mode and a product snapshot, resolves the quantity,
//! performs the matching inventory mutation and composes the user-facing
//! message and feedback event.

use crate::domain::types::{
    ActionResult, Mode, NewProduct, Overrides, ProductId, ProductSnapshot,
};
use crate::infra::metrics::Metrics;
use crate::io::feedback::FeedbackEvent;
use crate::services::inventory::{Inventory, InventoryError};
use crate::services::quantity::{
    consume_quantity, expire_quantity, finish_quantity, open_quantity, purchase_quantity,
    quantity_label, shopping_quantity, QuantityError, ResolvedQuantity, NOMINAL_QUANTITY,
};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error(transparent)]
    Quantity(#[from] QuantityError),
    #[error(transparent)]
    Inventory(#[from] InventoryError),
    #[error("no product action for mode {0}")]
    UnsupportedAction(Mode),
}

/// Outcome of one dispatched product action
#[derive(Debug, Clone, PartialEq)]
pub struct Dispatched {
    pub result: ActionResult,
    pub quantity: ResolvedQuantity,
    pub feedback: FeedbackEvent,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CreateOutcome {
    Created { id: ProductId, name: String },
    /// The external catalog has nothing for this barcode
    NoCatalogEntry,
    Failed(InventoryError),
}

#[derive(Debug, Clone, Copy)]
enum Mutation {
    Consume,
    Trash,
    Open,
    Shopping,
    Purchase,
}

pub struct Dispatcher {
    inventory: Arc<dyn Inventory>,
    metrics: Arc<Metrics>,
}

impl Dispatcher {
    pub fn new(inventory: Arc<dyn Inventory>, metrics: Arc<Metrics>) -> Self {
        Self { inventory, metrics }
    }

    /// Perform the product action for `mode`.
    ///
    /// `create` and `clear-scanner` have no product action and yield
    /// `UnsupportedAction`.
    pub async fn dispatch(
        &self,
        mode: Mode,
        product: &ProductSnapshot,
        barcode: &str,
    ) -> Result<Dispatched, DispatchError> {
        let name = &product.name;
        let (mutation, resolved) = match mode {
            Mode::Consume => (Mutation::Consume, consume_quantity(product)?),
            Mode::Finish => (Mutation::Consume, finish_quantity(product)?),
            Mode::Expire => (Mutation::Trash, expire_quantity(product)?),
            Mode::Open => (Mutation::Open, open_quantity(product, barcode, NOMINAL_QUANTITY)),
            Mode::Shopping => {
                (Mutation::Shopping, shopping_quantity(product, barcode, NOMINAL_QUANTITY))
            }
            Mode::Purchase => {
                (Mutation::Purchase, purchase_quantity(product, barcode, NOMINAL_QUANTITY))
            }
            Mode::Create | Mode::ClearScanner => {
                warn!(mode = %mode, barcode = %barcode, "unsupported_action");
                return Err(DispatchError::UnsupportedAction(mode));
            }
        };

        let label = quantity_label(&product.unit, resolved.quantity);
        let total = resolved.total;
        let (message, feedback) = match mutation {
            Mutation::Consume => {
                let m = format!("Consumed {} of {} {}", label, total, name);
                (m.clone(), FeedbackEvent::Consume(m))
            }
            Mutation::Trash => {
                let m = format!("Trashed {} of {} {}", label, total, name);
                (m.clone(), FeedbackEvent::Consume(m))
            }
            Mutation::Open => {
                let m = format!("Opened {} {}", label, name);
                (m.clone(), FeedbackEvent::Open(m))
            }
            Mutation::Shopping => {
                let m = format!("Added {} to shopping list", name);
                (m.clone(), FeedbackEvent::Shopping(m))
            }
            Mutation::Purchase => {
                let m = format!("Added {} to {} {} to inventory", label, total, name);
                (m.clone(), FeedbackEvent::Success(m))
            }
        };

        info!(
            mode = %mode,
            product_id = %product.id,
            barcode = %barcode,
            quantity = resolved.quantity,
            "dispatch_action"
        );

        let raw = match self.mutate(mutation, product.id, resolved.quantity).await {
            Ok(raw) => raw,
            Err(e) if e.is_timeout() => {
                self.metrics.record_inventory_error();
                self.metrics.record_action(false);
                warn!(mode = %mode, product_id = %product.id, "inventory_timeout");
                let message = format!("{} timed out for {}", mode, name);
                return Ok(Dispatched {
                    result: ActionResult::failed(message.clone()),
                    quantity: resolved,
                    feedback: FeedbackEvent::Error(message),
                });
            }
            Err(e) => {
                self.metrics.record_inventory_error();
                return Err(e.into());
            }
        };

        let result = ActionResult::from_response(raw, message);
        self.metrics.record_action(result.success);
        let feedback = if result.success { feedback } else { FeedbackEvent::Error(result.message.clone()) };

        Ok(Dispatched { result, quantity: resolved, feedback })
    }

    async fn mutate(
        &self,
        mutation: Mutation,
        id: ProductId,
        amount: f64,
    ) -> Result<serde_json::Value, InventoryError> {
        let start = Instant::now();
        let result = match mutation {
            Mutation::Consume => self.inventory.consume(id, amount).await,
            Mutation::Trash => self.inventory.trash(id, amount).await,
            Mutation::Open => self.inventory.open(id, amount).await,
            Mutation::Shopping => self.inventory.add_to_shopping_list(id, amount).await,
            Mutation::Purchase => self.inventory.purchase(id, amount).await,
        };
        self.metrics.record_inventory_latency(start.elapsed());
        result
    }

    /// Create an unknown product from the external catalog.
    ///
    /// Session overrides win over catalog-provided fields. Only errors from
    /// the catalog lookup itself are returned as `Err`; a failed creation is
    /// reported as `CreateOutcome::Failed`.
    pub async fn create(
        &self,
        barcode: &str,
        overrides: &Overrides,
    ) -> Result<CreateOutcome, InventoryError> {
        let start = Instant::now();
        let lookup = self.inventory.external_lookup(barcode).await;
        self.metrics.record_inventory_latency(start.elapsed());

        let entry = match lookup {
            Ok(Some(entry)) => entry,
            Ok(None) | Err(InventoryError::NotFound(_)) => {
                debug!(barcode = %barcode, "external_lookup_empty");
                return Ok(CreateOutcome::NoCatalogEntry);
            }
            Err(e) => {
                self.metrics.record_inventory_error();
                return Err(e);
            }
        };

        let product = NewProduct {
            name: entry.name.clone(),
            barcode: barcode.to_string(),
            description: entry.name.clone(),
            quantity_unit_id: overrides.quantity.clone().or(entry.quantity_unit_id),
            location_id: overrides.location.clone().or(entry.location_id),
            product_group_id: overrides.group.clone().or(entry.product_group_id),
            shopping_location_id: overrides.store.clone().or(entry.shopping_location_id),
        };

        let start = Instant::now();
        let created = self.inventory.create_product(&product).await;
        self.metrics.record_inventory_latency(start.elapsed());

        match created {
            Ok(id) => {
                self.metrics.record_product_created();
                info!(barcode = %barcode, product_id = %id, name = %product.name, "product_created");
                Ok(CreateOutcome::Created { id, name: product.name })
            }
            Err(e) => {
                self.metrics.record_creation_failure();
                warn!(barcode = %barcode, error = %e, "product_create_failed");
                Ok(CreateOutcome::Failed(e))
            }
        }
    }
}
