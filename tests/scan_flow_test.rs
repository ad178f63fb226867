//! End-to-end scan flow tests against an in-memory inventory

use async_trait::async_trait;
use barcode_gateway::domain::types::{
    AttributeKind, CatalogEntry, Mode, NewProduct, ProductBarcode, ProductId, ProductSnapshot, QuantityUnitNames,
    ReportKind,
};
use barcode_gateway::infra::Metrics;
use barcode_gateway::io::{FeedbackEvent, FeedbackSink};
use barcode_gateway::services::{
    create_scan_worker, Inventory, InventoryError, ProcessError, ScanOrigin, ScanProcessor,
    SubmitError,
};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Default)]
struct MockInventory {
    products: Mutex<HashMap<String, ProductSnapshot>>,
    catalog: HashMap<String, CatalogEntry>,
    names: HashMap<(AttributeKind, String), String>,
    fail_create: bool,
    fail_mutations_with: Option<InventoryError>,
    calls: Mutex<Vec<String>>,
    created: Mutex<Vec<NewProduct>>,
}

impl MockInventory {
    fn with_product(self, barcode: &str, product: ProductSnapshot) -> Self {
        self.products.lock().insert(barcode.to_string(), product);
        self
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    fn mutation(&self, name: &str, id: ProductId, amount: f64) -> Result<Value, InventoryError> {
        self.calls.lock().push(format!("{} {} {}", name, id, amount));
        match &self.fail_mutations_with {
            Some(e) => Err(e.clone()),
            None => Ok(json!({})),
        }
    }
}

#[async_trait]
impl Inventory for MockInventory {
    async fn product_by_barcode(&self, barcode: &str) -> Result<ProductSnapshot, InventoryError> {
        self.products
            .lock()
            .get(barcode)
            .cloned()
            .ok_or_else(|| InventoryError::NotFound(barcode.to_string()))
    }

    async fn external_lookup(&self, barcode: &str) -> Result<Option<CatalogEntry>, InventoryError> {
        self.calls.lock().push(format!("external_lookup {}", barcode));
        Ok(self.catalog.get(barcode).cloned())
    }

    async fn attribute_name(&self, kind: AttributeKind, id: &str) -> Result<String, InventoryError> {
        self.calls.lock().push(format!("attribute_name {:?} {}", kind, id));
        match self.names.get(&(kind, id.to_string())) {
            Some(name) => Ok(name.clone()),
            None if id == "500" => Err(InventoryError::Status { status: 500, body: "boom".to_string() }),
            None => Err(InventoryError::NotFound(id.to_string())),
        }
    }

    async fn create_product(&self, product: &NewProduct) -> Result<ProductId, InventoryError> {
        self.calls.lock().push(format!("create_product {}", product.barcode));
        if self.fail_create {
            return Err(InventoryError::Status { status: 500, body: "boom".to_string() });
        }
        self.created.lock().push(product.clone());
        let snapshot = snapshot(99, &product.name, 0.0, 0.0, 1.0);
        self.products.lock().insert(product.barcode.clone(), snapshot);
        Ok(ProductId(99))
    }

    async fn consume(&self, id: ProductId, amount: f64) -> Result<Value, InventoryError> {
        self.mutation("consume", id, amount)
    }

    async fn trash(&self, id: ProductId, amount: f64) -> Result<Value, InventoryError> {
        self.mutation("trash", id, amount)
    }

    async fn open(&self, id: ProductId, amount: f64) -> Result<Value, InventoryError> {
        self.mutation("open", id, amount)
    }

    async fn add_to_shopping_list(&self, id: ProductId, amount: f64) -> Result<Value, InventoryError> {
        self.mutation("shopping", id, amount)
    }

    async fn purchase(&self, id: ProductId, amount: f64) -> Result<Value, InventoryError> {
        self.mutation("purchase", id, amount)
    }
}

#[derive(Default)]
struct RecordingFeedback {
    events: Mutex<Vec<FeedbackEvent>>,
}

impl RecordingFeedback {
    fn kinds(&self) -> Vec<&'static str> {
        self.events.lock().iter().map(|e| e.kind()).collect()
    }
}

impl FeedbackSink for RecordingFeedback {
    fn emit(&self, event: FeedbackEvent) {
        self.events.lock().push(event);
    }
}

fn snapshot(id: i64, name: &str, stock: f64, opened: f64, quick_consume: f64) -> ProductSnapshot {
    ProductSnapshot {
        id: ProductId(id),
        name: name.to_string(),
        stock_amount: stock,
        stock_amount_opened: opened,
        quick_consume_amount: quick_consume,
        quick_open_amount: 0.0,
        quick_purchase_amount: 0.0,
        purchase_to_stock_factor: 1.0,
        barcodes: Vec::new(),
        unit: QuantityUnitNames {
            name: Some("Piece".to_string()),
            name_plural: Some("Pieces".to_string()),
        },
    }
}

fn processor(
    inventory: Arc<MockInventory>,
    feedback: Arc<RecordingFeedback>,
) -> ScanProcessor {
    ScanProcessor::new(Mode::Consume, inventory, feedback, Arc::new(Metrics::new()))
}

#[tokio::test]
async fn test_consume_default_mode() {
    let inventory =
        Arc::new(MockInventory::default().with_product("0012345", snapshot(4, "Soup", 5.0, 0.0, 1.0)));
    let feedback = Arc::new(RecordingFeedback::default());
    let mut p = processor(inventory.clone(), feedback.clone());

    let report = p.process("0012345").await.unwrap();

    assert_eq!(report.kind, ReportKind::ProductAction);
    assert!(report.result.success);
    assert_eq!(report.result.message, "Consumed 1 Piece of 5 Soup");
    assert_eq!(report.quantity, Some(1.0));
    assert_eq!(report.product.unwrap().id, ProductId(4));
    assert_eq!(inventory.calls(), vec!["consume 4 1"]);
    assert_eq!(feedback.kinds(), vec!["consume"]);
}

#[tokio::test]
async fn test_create_mode_ready_then_exists() {
    let mut inventory = MockInventory::default();
    inventory.catalog.insert(
        "9999999999".to_string(),
        CatalogEntry {
            name: "Granola".to_string(),
            location_id: Some("2".to_string()),
            quantity_unit_id: Some("3".to_string()),
            ..Default::default()
        },
    );
    let inventory = Arc::new(inventory);
    let feedback = Arc::new(RecordingFeedback::default());
    let mut p = processor(inventory.clone(), feedback.clone());

    p.process("create/LC-7").await.unwrap();
    let report = p.process("9999999999").await.unwrap();

    assert_eq!(report.kind, ReportKind::Create);
    assert!(report.result.success);
    assert_eq!(report.result.message, "Ready to create product with barcode: 9999999999");

    let created = inventory.created.lock().clone();
    assert_eq!(created.len(), 1);
    assert_eq!(created[0].name, "Granola");
    assert_eq!(created[0].description, "Granola");
    // Session override wins, catalog fills the rest
    assert_eq!(created[0].location_id.as_deref(), Some("7"));
    assert_eq!(created[0].quantity_unit_id.as_deref(), Some("3"));

    let report = p.process("9999999999").await.unwrap();
    assert!(!report.result.success);
    assert_eq!(report.result.message, "Product already exists with barcode: 9999999999");
    assert_eq!(feedback.kinds().last(), Some(&"product_exists"));

    let calls = inventory.calls();
    assert!(!calls.iter().any(|c| c.starts_with("consume") || c.starts_with("purchase")));
}

#[tokio::test]
async fn test_create_failure_reported_through_feedback() {
    let mut inventory = MockInventory { fail_create: true, ..Default::default() };
    inventory
        .catalog
        .insert("555".to_string(), CatalogEntry { name: "Beans".to_string(), ..Default::default() });
    let inventory = Arc::new(inventory);
    let feedback = Arc::new(RecordingFeedback::default());
    let mut p = processor(inventory, feedback.clone());

    p.process("create").await.unwrap();
    let report = p.process("555").await.unwrap();

    assert!(report.result.success);
    assert_eq!(report.kind, ReportKind::Create);
    assert_eq!(feedback.kinds(), vec!["success", "waiting", "error"]);
}

#[tokio::test]
async fn test_unknown_product_is_not_found_outcome() {
    let inventory = Arc::new(MockInventory::default());
    let feedback = Arc::new(RecordingFeedback::default());
    let mut p = processor(inventory.clone(), feedback.clone());

    let report = p.process("404404").await.unwrap();

    assert!(!report.result.success);
    assert!(report.result.message.starts_with("Product not found"));
    assert!(inventory.calls().is_empty());
    assert_eq!(feedback.kinds(), vec!["unknown_product"]);
}

#[tokio::test]
async fn test_nothing_left_to_consume() {
    let inventory =
        Arc::new(MockInventory::default().with_product("777", snapshot(8, "Jam", 0.0, 0.0, 1.0)));
    let feedback = Arc::new(RecordingFeedback::default());
    let mut p = processor(inventory.clone(), feedback.clone());

    let report = p.process("777").await.unwrap();

    assert!(!report.result.success);
    assert_eq!(report.result.message, "Nothing left in the inventory to consume.");
    assert!(inventory.calls().is_empty());
}

#[tokio::test]
async fn test_finish_consumes_opened_amount_first() {
    let inventory =
        Arc::new(MockInventory::default().with_product("2020", snapshot(11, "Tea", 4.0, 1.5, 1.0)));
    let feedback = Arc::new(RecordingFeedback::default());
    let mut p = processor(inventory.clone(), feedback.clone());

    p.process("finish").await.unwrap();
    let report = p.process("2020").await.unwrap();

    assert!(report.result.success);
    assert_eq!(report.result.message, "Consumed 1.5 Pieces of 4 Tea");
    assert_eq!(report.quantity, Some(1.5));
    assert_eq!(inventory.calls(), vec!["consume 11 1.5"]);
    assert_eq!(feedback.kinds(), vec!["success", "consume"]);
}

#[tokio::test]
async fn test_finish_consumes_whole_stock_when_nothing_opened() {
    let inventory =
        Arc::new(MockInventory::default().with_product("2121", snapshot(12, "Flour", 3.0, 0.0, 1.0)));
    let mut p = processor(inventory.clone(), Arc::new(RecordingFeedback::default()));

    p.process("FINISH").await.unwrap();
    let report = p.process("2121").await.unwrap();

    assert_eq!(report.result.message, "Consumed 3 Pieces of 3 Flour");
    assert_eq!(report.quantity, Some(3.0));
    assert_eq!(inventory.calls(), vec!["consume 12 3"]);
}

#[tokio::test]
async fn test_expire_trashes_instead_of_consuming() {
    let inventory = Arc::new(
        MockInventory::default()
            .with_product("3030", snapshot(13, "Yoghurt", 3.0, 0.0, 1.0))
            .with_product("3131", snapshot(14, "Cream", 2.0, 0.5, 1.0)),
    );
    let feedback = Arc::new(RecordingFeedback::default());
    let mut p = processor(inventory.clone(), feedback.clone());

    p.process("expire").await.unwrap();
    let report = p.process("3030").await.unwrap();
    assert!(report.result.success);
    assert_eq!(report.result.message, "Trashed 3 Pieces of 3 Yoghurt");
    assert_eq!(report.quantity, Some(3.0));

    let report = p.process("3131").await.unwrap();
    assert_eq!(report.result.message, "Trashed 0.5 Pieces of 2 Cream");

    assert_eq!(inventory.calls(), vec!["trash 13 3", "trash 14 0.5"]);
    assert!(!inventory.calls().iter().any(|c| c.starts_with("consume")));
}

#[tokio::test]
async fn test_attribute_names_resolved_for_feedback() {
    let mut inventory = MockInventory::default();
    inventory.names.insert((AttributeKind::Location, "3".to_string()), "Fridge".to_string());
    inventory.names.insert((AttributeKind::Store, "5".to_string()), "Aldi".to_string());
    inventory.names.insert((AttributeKind::Group, "2".to_string()), "Dairy".to_string());
    let inventory = Arc::new(inventory);
    let feedback = Arc::new(RecordingFeedback::default());
    let mut p = processor(inventory.clone(), feedback.clone());

    let report = p.process("purchase/ST-5/LC-3/GRP-2").await.unwrap();

    assert_eq!(report.kind, ReportKind::ModeAttributeChange);
    assert_eq!(
        report.result.message,
        "Mode changed to purchase; Attributes updated to Dairy, in the Fridge, Store: Aldi"
    );
    assert_eq!(
        inventory.calls(),
        vec!["attribute_name Group 2", "attribute_name Location 3", "attribute_name Store 5"]
    );
    match &feedback.events.lock()[0] {
        FeedbackEvent::AttributesUpdated { message, attributes, description } => {
            assert_eq!(message, "Mode changed to purchase; ");
            assert_eq!(attributes.store.as_deref(), Some("5"));
            assert_eq!(description, "Dairy, in the Fridge, Store: Aldi");
        }
        other => panic!("unexpected event {:?}", other),
    };
}

#[tokio::test]
async fn test_attribute_name_lookup_failure_keeps_id() {
    let mut inventory = MockInventory::default();
    inventory.names.insert((AttributeKind::Quantity, "4".to_string()), "Pack".to_string());
    let inventory = Arc::new(inventory);
    let feedback = Arc::new(RecordingFeedback::default());
    let metrics = Arc::new(Metrics::new());
    let mut p = ScanProcessor::new(Mode::Consume, inventory, feedback.clone(), metrics.clone());

    let report = p.process("QT-4/LC-500").await.unwrap();

    assert!(report.result.success);
    assert_eq!(report.kind, ReportKind::AttributesUpdated);
    assert_eq!(report.result.message, "Attributes updated to Pack, in the 500");
    assert_eq!(feedback.kinds(), vec!["attributes_updated"]);
    assert_eq!(metrics.report().inventory_errors, 1);
}

#[tokio::test]
async fn test_shopping_uses_conversion_factor() {
    let mut product = snapshot(5, "Water", 2.0, 0.0, 1.0);
    product.purchase_to_stock_factor = 6.0;
    product.barcodes.push(ProductBarcode { barcode: "321".to_string(), amount: Some(24.0) });
    let inventory = Arc::new(MockInventory::default().with_product("321", product));
    let feedback = Arc::new(RecordingFeedback::default());
    let mut p = processor(inventory.clone(), feedback.clone());

    p.process("shopping").await.unwrap();
    let report = p.process("321").await.unwrap();

    assert_eq!(report.result.message, "Added Water to shopping list");
    assert_eq!(inventory.calls(), vec!["shopping 5 6"]);
}

#[tokio::test]
async fn test_purchase_barcode_override() {
    let mut product = snapshot(6, "Eggs", 3.0, 0.0, 1.0);
    product.quick_purchase_amount = 6.0;
    product.barcodes.push(ProductBarcode { barcode: "1212".to_string(), amount: Some(12.0) });
    let inventory = Arc::new(MockInventory::default().with_product("1212", product));
    let feedback = Arc::new(RecordingFeedback::default());
    let mut p = processor(inventory.clone(), feedback.clone());

    p.process("PURCHASE").await.unwrap();
    let report = p.process("1212").await.unwrap();

    assert_eq!(report.result.message, "Added 12 Pieces to 3 Eggs to inventory");
    assert_eq!(inventory.calls(), vec!["purchase 6 12"]);
}

#[tokio::test]
async fn test_clear_scanner_mode_product_scan_is_unsupported() {
    let inventory =
        Arc::new(MockInventory::default().with_product("888", snapshot(9, "Salt", 1.0, 0.0, 1.0)));
    let mut p = processor(inventory.clone(), Arc::new(RecordingFeedback::default()));

    // Compound barcode sets the mode without clearing
    p.process("clear-scanner/ST-1").await.unwrap();
    assert_eq!(p.state().mode, Mode::ClearScanner);

    let err = p.process("888").await.unwrap_err();
    assert!(matches!(err, ProcessError::UnsupportedAction(Mode::ClearScanner)));
    assert_eq!(inventory.calls(), vec!["attribute_name Store 1"]);
}

#[tokio::test]
async fn test_transport_error_propagates() {
    let inventory = Arc::new(
        MockInventory {
            fail_mutations_with: Some(InventoryError::Transport("connection refused".to_string())),
            ..Default::default()
        }
        .with_product("1", snapshot(1, "Tea", 4.0, 0.0, 1.0)),
    );
    let mut p = processor(inventory, Arc::new(RecordingFeedback::default()));

    let err = p.process("1").await.unwrap_err();
    assert!(matches!(err, ProcessError::Inventory(InventoryError::Transport(_))));
}

#[tokio::test]
async fn test_worker_serializes_scans_and_publishes_state() {
    let inventory =
        Arc::new(MockInventory::default().with_product("42", snapshot(2, "Rice", 10.0, 0.0, 2.0)));
    let feedback = Arc::new(RecordingFeedback::default());
    let metrics = Arc::new(Metrics::new());
    let p = ScanProcessor::new(Mode::Consume, inventory.clone(), feedback.clone(), metrics.clone());
    let (input, worker, state_rx) = create_scan_worker(p, feedback.clone(), metrics.clone(), true);
    let handle = tokio::spawn(worker.run());

    input.process("open/ST-3".to_string(), ScanOrigin::Scanner).await.unwrap();
    let report = input.simulate("42").await.unwrap();

    assert_eq!(report.result.message, "Opened 1 Piece Rice");
    assert_eq!(state_rx.borrow().mode, Mode::Open);
    assert_eq!(state_rx.borrow().overrides.store.as_deref(), Some("3"));
    assert_eq!(metrics.report().scans_simulated, 1);

    drop(input);
    handle.await.unwrap();
}

#[tokio::test]
async fn test_worker_reports_processing_error_as_feedback() {
    let inventory =
        Arc::new(MockInventory::default().with_product("888", snapshot(9, "Salt", 1.0, 0.0, 1.0)));
    let feedback = Arc::new(RecordingFeedback::default());
    let metrics = Arc::new(Metrics::new());
    let p = ScanProcessor::new(Mode::ClearScanner, inventory, feedback.clone(), metrics.clone());
    let (input, worker, _state_rx) = create_scan_worker(p, feedback.clone(), metrics.clone(), false);
    let handle = tokio::spawn(worker.run());

    let err = input.process("888".to_string(), ScanOrigin::Scanner).await.unwrap_err();
    assert!(matches!(err, SubmitError::Processing(_)));
    assert_eq!(feedback.kinds(), vec!["error"]);
    assert_eq!(metrics.report().processing_errors, 1);

    drop(input);
    handle.await.unwrap();
}

#[tokio::test]
async fn test_simulate_rejected_outside_test_mode() {
    let inventory = Arc::new(MockInventory::default());
    let feedback = Arc::new(RecordingFeedback::default());
    let metrics = Arc::new(Metrics::new());
    let p = ScanProcessor::new(Mode::Consume, inventory.clone(), feedback.clone(), metrics.clone());
    let (input, worker, _state_rx) = create_scan_worker(p, feedback.clone(), metrics.clone(), false);
    let handle = tokio::spawn(worker.run());

    let err = input.simulate("0012345").await.unwrap_err();
    assert_eq!(err, SubmitError::SimulationDisabled);
    assert_eq!(metrics.report().scans_received, 0);
    assert!(feedback.kinds().is_empty());

    drop(input);
    handle.await.unwrap();
}
