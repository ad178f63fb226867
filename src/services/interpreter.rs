//! Command interpreter - scanner mode state machine
//!
//! Barcodes are split on `/` into tokens. Each token is checked against the
//! mode vocabulary and, independently, split on its first `-` into a
//! `TYPE-value` attribute override (`ST`, `LC`, `QT`, `GRP`). A barcode that
//! changes neither mode nor attributes is a product barcode.

use crate::domain::types::{AttributeKind, Mode, Overrides, SessionState};
use smallvec::SmallVec;
use tracing::{debug, info};

/// Reserved barcode that resets the whole session
pub const CLEAR_SCANNER: &str = "clear-scanner";

/// Snapshot of one barcode's parse, computed fresh for every call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedAttributes {
    pub overrides: Overrides,
    pub mode_changed: bool,
    pub attributes_updated: bool,
    pub mode: Mode,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InterpretResult {
    ScannerCleared,
    ModeAndAttributesChanged { mode: Mode, attributes: Overrides },
    ModeChanged { mode: Mode },
    AttributesUpdated { attributes: Overrides },
    ProductBarcode { code: String },
}

/// Owns the session state; every `interpret` call mutates it in place
pub struct Interpreter {
    default_mode: Mode,
    state: SessionState,
}

impl Interpreter {
    pub fn new(default_mode: Mode) -> Self {
        Self { default_mode, state: SessionState::new(default_mode) }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn mode(&self) -> Mode {
        self.state.mode
    }

    pub fn overrides(&self) -> &Overrides {
        &self.state.overrides
    }

    /// Reset mode to the default and unset every override
    pub fn clear(&mut self) {
        self.state = SessionState::new(self.default_mode);
    }

    /// Apply every token of `barcode` to the session
    pub fn parse_attributes(&mut self, barcode: &str) -> ParsedAttributes {
        let mut mode_changed = false;
        let mut attributes_updated = false;

        let tokens: SmallVec<[&str; 4]> = barcode.split('/').collect();
        for token in tokens {
            if let Some(mode) = Mode::from_token(token) {
                self.state.mode = mode;
                mode_changed = true;
                debug!(mode = %mode, "mode_token");
            }

            if let Some((type_code, value)) = token.split_once('-') {
                if let Some(kind) = AttributeKind::from_type_code(type_code) {
                    *self.state.overrides.slot_mut(kind) = Some(value.to_string());
                    attributes_updated = true;
                    debug!(attribute = ?kind, value = %value, "attribute_token");
                }
            }
        }

        ParsedAttributes {
            overrides: self.state.overrides.clone(),
            mode_changed,
            attributes_updated,
            mode: self.state.mode,
        }
    }

    pub fn interpret(&mut self, barcode: &str) -> InterpretResult {
        let parsed = self.parse_attributes(barcode);
        info!(
            mode = %parsed.mode,
            mode_changed = parsed.mode_changed,
            attributes_updated = parsed.attributes_updated,
            overrides = ?parsed.overrides,
            "barcode_interpreted"
        );

        if barcode == CLEAR_SCANNER {
            self.clear();
            return InterpretResult::ScannerCleared;
        }

        match (parsed.mode_changed, parsed.attributes_updated) {
            (true, true) => InterpretResult::ModeAndAttributesChanged {
                mode: parsed.mode,
                attributes: parsed.overrides,
            },
            (true, false) => InterpretResult::ModeChanged { mode: parsed.mode },
            (false, true) => InterpretResult::AttributesUpdated { attributes: parsed.overrides },
            (false, false) => InterpretResult::ProductBarcode { code: barcode.to_string() },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_tokens_last_write_wins() {
        let mut interpreter = Interpreter::new(Mode::Consume);
        let result = interpreter.interpret("consume/purchase");
        assert_eq!(result, InterpretResult::ModeChanged { mode: Mode::Purchase });
        assert_eq!(interpreter.mode(), Mode::Purchase);
    }

    #[test]
    fn test_mode_token_case_insensitive() {
        let mut interpreter = Interpreter::new(Mode::Consume);
        interpreter.interpret("SHOPPING");
        assert_eq!(interpreter.mode(), Mode::Shopping);
    }

    #[test]
    fn test_store_override_persists_until_cleared() {
        let mut interpreter = Interpreter::new(Mode::Consume);

        let result = interpreter.interpret("ST-5");
        let expected =
            Overrides { store: Some("5".to_string()), ..Default::default() };
        assert_eq!(result, InterpretResult::AttributesUpdated { attributes: expected });

        let result = interpreter.interpret("0012345");
        assert_eq!(result, InterpretResult::ProductBarcode { code: "0012345".to_string() });
        assert_eq!(interpreter.overrides().store.as_deref(), Some("5"));

        let result = interpreter.interpret(CLEAR_SCANNER);
        assert_eq!(result, InterpretResult::ScannerCleared);
        assert_eq!(interpreter.overrides().store, None);
        assert_eq!(interpreter.mode(), Mode::Consume);
    }

    #[test]
    fn test_clear_resets_mode_to_default() {
        let mut interpreter = Interpreter::new(Mode::Purchase);
        interpreter.interpret("expire/lc-3/grp-2");
        assert_eq!(interpreter.mode(), Mode::Expire);

        interpreter.interpret("clear-scanner");
        assert_eq!(interpreter.state(), &SessionState::new(Mode::Purchase));
    }

    #[test]
    fn test_mode_and_attributes_together() {
        let mut interpreter = Interpreter::new(Mode::Consume);
        let result = interpreter.interpret("create/LC-3/QT-2/grp-7");
        let expected = Overrides {
            store: None,
            location: Some("3".to_string()),
            quantity: Some("2".to_string()),
            group: Some("7".to_string()),
        };
        assert_eq!(
            result,
            InterpretResult::ModeAndAttributesChanged { mode: Mode::Create, attributes: expected }
        );
    }

    #[test]
    fn test_attribute_value_split_on_first_dash() {
        let mut interpreter = Interpreter::new(Mode::Consume);
        interpreter.interpret("ST-shop-north");
        assert_eq!(interpreter.overrides().store.as_deref(), Some("shop-north"));

        // Last write wins for the same kind
        interpreter.interpret("st-1/ST-2");
        assert_eq!(interpreter.overrides().store.as_deref(), Some("2"));
    }

    #[test]
    fn test_unknown_type_codes_ignored() {
        let mut interpreter = Interpreter::new(Mode::Consume);
        let result = interpreter.interpret("XX-5");
        assert_eq!(result, InterpretResult::ProductBarcode { code: "XX-5".to_string() });
        assert!(interpreter.overrides().is_empty());
    }

    #[test]
    fn test_clear_scanner_token_inside_compound_barcode_only_sets_mode() {
        let mut interpreter = Interpreter::new(Mode::Consume);
        let result = interpreter.interpret("clear-scanner/ST-1");
        assert_eq!(
            result,
            InterpretResult::ModeAndAttributesChanged {
                mode: Mode::ClearScanner,
                attributes: Overrides { store: Some("1".to_string()), ..Default::default() },
            }
        );
        assert_eq!(interpreter.mode(), Mode::ClearScanner);
    }

    #[test]
    fn test_parse_attributes_reports_flags() {
        let mut interpreter = Interpreter::new(Mode::Consume);
        let parsed = interpreter.parse_attributes("4006381333931");
        assert!(!parsed.mode_changed);
        assert!(!parsed.attributes_updated);
        assert_eq!(parsed.mode, Mode::Consume);
    }
}
