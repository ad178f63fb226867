//! User feedback sink
//!
//! Feedback is fire-and-forget: the core emits semantic events and never
//! reads anything back. The default sink writes them to the log; hardware
//! beep/LED or audio sinks plug in behind the same trait.

use crate::domain::types::{AttributeKind, Overrides};
use tracing::{error, info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedbackEvent {
    Success(String),
    Error(String),
    Consume(String),
    Shopping(String),
    Open(String),
    UnknownProduct(String),
    ProductExists(String),
    Waiting(String),
    /// `description` carries the resolved names, e.g. "Dairy, in the Fridge"
    AttributesUpdated { message: String, attributes: Overrides, description: String },
}

impl FeedbackEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            FeedbackEvent::Success(_) => "success",
            FeedbackEvent::Error(_) => "error",
            FeedbackEvent::Consume(_) => "consume",
            FeedbackEvent::Shopping(_) => "shopping",
            FeedbackEvent::Open(_) => "open",
            FeedbackEvent::UnknownProduct(_) => "unknown_product",
            FeedbackEvent::ProductExists(_) => "product_exists",
            FeedbackEvent::Waiting(_) => "waiting",
            FeedbackEvent::AttributesUpdated { .. } => "attributes_updated",
        }
    }

    pub fn message(&self) -> &str {
        match self {
            FeedbackEvent::Success(m)
            | FeedbackEvent::Error(m)
            | FeedbackEvent::Consume(m)
            | FeedbackEvent::Shopping(m)
            | FeedbackEvent::Open(m)
            | FeedbackEvent::UnknownProduct(m)
            | FeedbackEvent::ProductExists(m)
            | FeedbackEvent::Waiting(m) => m,
            FeedbackEvent::AttributesUpdated { message, .. } => message,
        }
    }
}

pub trait FeedbackSink: Send + Sync {
    fn emit(&self, event: FeedbackEvent);
}

/// Phrase for one override: locations read "in the Fridge", stores "Store: Aldi"
pub fn describe_attribute(kind: AttributeKind, name: &str) -> String {
    match kind {
        AttributeKind::Location => format!("in the {}", name),
        AttributeKind::Store => format!("Store: {}", name),
        AttributeKind::Quantity | AttributeKind::Group => name.to_string(),
    }
}

/// Joins resolved overrides in the order given
pub fn describe_attributes(named: &[(AttributeKind, String)]) -> String {
    named
        .iter()
        .map(|(kind, name)| describe_attribute(*kind, name))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Logs every feedback event
#[derive(Debug, Default)]
pub struct TracingFeedback;

impl FeedbackSink for TracingFeedback {
    fn emit(&self, event: FeedbackEvent) {
        let kind = event.kind();
        match &event {
            FeedbackEvent::Success(m)
            | FeedbackEvent::Consume(m)
            | FeedbackEvent::Shopping(m)
            | FeedbackEvent::Open(m) => info!(kind = kind, message = %m, "feedback"),
            FeedbackEvent::Waiting(m)
            | FeedbackEvent::UnknownProduct(m)
            | FeedbackEvent::ProductExists(m) => warn!(kind = kind, message = %m, "feedback"),
            FeedbackEvent::Error(m) => error!(kind = kind, message = %m, "feedback"),
            FeedbackEvent::AttributesUpdated { message, description, .. } => {
                info!(kind = kind, message = %format!("{}{}", message, description), "feedback")
            }
        }
    }
}
