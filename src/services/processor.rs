//! Scan processor - turns one decoded barcode into a `ScanReport`
//!
//! Owns the interpreter (and therefore the session state). Control barcodes
//! only update the session; product barcodes are looked up in the inventory
//! and handed to the dispatcher. Every outcome is also emitted as a feedback
//! event.

use crate::domain::types::{
    ActionResult, AttributeKind, Mode, Overrides, ProductSummary, ReportKind, ScanReport, SessionState,
};
use crate::infra::metrics::Metrics;
use crate::io::feedback::{describe_attributes, FeedbackEvent, FeedbackSink};
use crate::services::dispatcher::{CreateOutcome, DispatchError, Dispatcher};
use crate::services::interpreter::{InterpretResult, Interpreter};
use crate::services::inventory::{Inventory, InventoryError};
use crate::services::quantity::QuantityError;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, error, info, warn};

pub const NOT_FOUND_MESSAGE: &str =
    "Product not found with that barcode. Please create the product first.";

#[derive(Debug, Error)]
pub enum ProcessError {
    #[error(transparent)]
    Inventory(#[from] InventoryError),
    #[error(transparent)]
    Quantity(#[from] QuantityError),
    #[error("no product action for mode {0}")]
    UnsupportedAction(Mode),
}

impl From<DispatchError> for ProcessError {
    fn from(e: DispatchError) -> Self {
        match e {
            DispatchError::Inventory(e) => ProcessError::Inventory(e),
            DispatchError::UnsupportedAction(mode) => ProcessError::UnsupportedAction(mode),
            DispatchError::Quantity(e) => ProcessError::Quantity(e),
        }
    }
}

pub struct ScanProcessor {
    interpreter: Interpreter,
    inventory: Arc<dyn Inventory>,
    dispatcher: Dispatcher,
    feedback: Arc<dyn FeedbackSink>,
    metrics: Arc<Metrics>,
}

impl ScanProcessor {
    pub fn new(
        default_mode: Mode,
        inventory: Arc<dyn Inventory>,
        feedback: Arc<dyn FeedbackSink>,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            interpreter: Interpreter::new(default_mode),
            dispatcher: Dispatcher::new(inventory.clone(), metrics.clone()),
            inventory,
            feedback,
            metrics,
        }
    }

    pub fn state(&self) -> &SessionState {
        self.interpreter.state()
    }

    pub async fn process(&mut self, barcode: &str) -> Result<ScanReport, ProcessError> {
        let start = Instant::now();
        let interpreted = self.interpreter.interpret(barcode);
        let mode = self.interpreter.mode();

        let report = match interpreted {
            InterpretResult::ScannerCleared => {
                let result = ActionResult::ok("Scanner cleared");
                self.feedback.emit(FeedbackEvent::Success(result.message.clone()));
                self.report(ReportKind::ScannerCleared, barcode, None, None, result)
            }
            InterpretResult::ModeChanged { mode } => {
                let result = ActionResult::ok(format!("Mode changed to {}", mode));
                self.feedback.emit(FeedbackEvent::Success(format!("Mode changed to: {}", mode)));
                self.report(ReportKind::ModeChange, barcode, None, None, result)
            }
            InterpretResult::ModeAndAttributesChanged { mode, attributes } => {
                let description = self.resolve_attributes(&attributes).await;
                let result = ActionResult::ok(format!(
                    "Mode changed to {}; Attributes updated to {}",
                    mode, description
                ));
                self.feedback.emit(FeedbackEvent::AttributesUpdated {
                    message: format!("Mode changed to {}; ", mode),
                    attributes: attributes.clone(),
                    description,
                });
                self.report(ReportKind::ModeAttributeChange, barcode, None, Some(attributes), result)
            }
            InterpretResult::AttributesUpdated { attributes } => {
                let description = self.resolve_attributes(&attributes).await;
                let result = ActionResult::ok(format!("Attributes updated to {}", description));
                self.feedback.emit(FeedbackEvent::AttributesUpdated {
                    message: String::new(),
                    attributes: attributes.clone(),
                    description,
                });
                self.report(ReportKind::AttributesUpdated, barcode, None, Some(attributes), result)
            }
            InterpretResult::ProductBarcode { code } => {
                if mode == Mode::Create {
                    self.create_flow(&code).await?
                } else {
                    self.product_flow(mode, &code).await?
                }
            }
        };

        debug!(
            barcode = %barcode,
            kind = ?report.kind,
            success = report.result.success,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "scan_processed"
        );
        Ok(report)
    }

    async fn product_flow(&mut self, mode: Mode, barcode: &str) -> Result<ScanReport, ProcessError> {
        let product = match self.inventory.product_by_barcode(barcode).await {
            Ok(product) => product,
            Err(e) => {
                if e.is_not_found() {
                    debug!(barcode = %barcode, "product_not_found");
                } else {
                    self.metrics.record_inventory_error();
                    warn!(barcode = %barcode, error = %e, "product_lookup_failed");
                }
                self.metrics.record_unknown_product();
                self.feedback.emit(FeedbackEvent::UnknownProduct(NOT_FOUND_MESSAGE.to_string()));
                return Ok(self.report(
                    ReportKind::ProductAction,
                    barcode,
                    None,
                    None,
                    ActionResult::failed(NOT_FOUND_MESSAGE),
                ));
            }
        };

        let summary = ProductSummary { id: product.id, name: product.name.clone() };
        let (result, quantity) = match self.dispatcher.dispatch(mode, &product, barcode).await {
            Ok(dispatched) => {
                self.feedback.emit(dispatched.feedback);
                (dispatched.result, Some(dispatched.quantity.quantity))
            }
            Err(DispatchError::Quantity(e)) => {
                info!(barcode = %barcode, product_id = %product.id, "nothing_left");
                self.metrics.record_action(false);
                let message = e.to_string();
                self.feedback.emit(FeedbackEvent::Error(message.clone()));
                (ActionResult::failed(message), None)
            }
            Err(e) => return Err(e.into()),
        };

        let mut report = self.report(ReportKind::ProductAction, barcode, Some(summary), None, result);
        report.quantity = quantity;
        Ok(report)
    }

    /// Looks up the display name of each override, keeping the raw id when
    /// the lookup fails
    async fn resolve_attributes(&self, overrides: &Overrides) -> String {
        let mut named: Vec<(AttributeKind, String)> = Vec::new();
        for (kind, id) in overrides.iter() {
            let start = Instant::now();
            let name = match self.inventory.attribute_name(kind, id).await {
                Ok(name) => name,
                Err(e) => {
                    if !e.is_not_found() {
                        self.metrics.record_inventory_error();
                    }
                    warn!(attribute = ?kind, id = %id, error = %e, "attribute_name_lookup_failed");
                    id.to_string()
                }
            };
            self.metrics.record_inventory_latency(start.elapsed());
            named.push((kind, name));
        }
        describe_attributes(&named)
    }

    async fn create_flow(&mut self, barcode: &str) -> Result<ScanReport, ProcessError> {
        match self.inventory.product_by_barcode(barcode).await {
            Ok(product) => {
                let message = format!("Product already exists with barcode: {}", barcode);
                self.feedback.emit(FeedbackEvent::ProductExists(message.clone()));
                let summary = ProductSummary { id: product.id, name: product.name };
                return Ok(self.report(
                    ReportKind::Create,
                    barcode,
                    Some(summary),
                    None,
                    ActionResult::failed(message),
                ));
            }
            Err(e) if !e.is_not_found() => {
                warn!(barcode = %barcode, error = %e, "product_lookup_failed");
            }
            Err(_) => {}
        }

        self.feedback
            .emit(FeedbackEvent::Waiting(format!("Creating new product with barcode: {}", barcode)));

        let overrides: Overrides = self.interpreter.overrides().clone();
        match self.dispatcher.create(barcode, &overrides).await? {
            CreateOutcome::Created { id, name } => {
                self.feedback.emit(FeedbackEvent::Success(format!("Created {} ({})", name, id)));
            }
            CreateOutcome::NoCatalogEntry => {
                self.feedback.emit(FeedbackEvent::Error(format!(
                    "No catalog entry found for barcode: {}",
                    barcode
                )));
            }
            CreateOutcome::Failed(e) => {
                error!(barcode = %barcode, error = %e, "create_product_failed");
                self.feedback
                    .emit(FeedbackEvent::Error(format!("Failed to create product: {}", e)));
            }
        }

        Ok(self.report(
            ReportKind::Create,
            barcode,
            None,
            None,
            ActionResult::ok(format!("Ready to create product with barcode: {}", barcode)),
        ))
    }

    fn report(
        &self,
        kind: ReportKind,
        barcode: &str,
        product: Option<ProductSummary>,
        attributes: Option<Overrides>,
        result: ActionResult,
    ) -> ScanReport {
        ScanReport {
            kind,
            mode: self.interpreter.mode(),
            barcode: barcode.to_string(),
            product,
            attributes,
            quantity: None,
            result,
        }
    }
}
