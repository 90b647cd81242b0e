//! The individual extraction stages.
//!
//! Every stage makes one generation call. Generation and parse failures
//! come back as recoverable [`StageError`]s and leave the record untouched;
//! the orchestrator decides what a failure means for the run.

use serde_json::{Map, Value};
use tracing::{debug, warn};

use invex_llm::GenerationBackend;

use super::fallback::find_candidate_keys;
use super::prompts;
use super::response::{kind_of, parse_array, parse_object, parse_response};
use crate::error::{ParseError, StageError};
use crate::models::record::{EntityRecord, MergeOutcome, NullPolicy, line_items_from};
use crate::models::result::{KeySource, Stage};

/// Entity keys found by the identification stage.
#[derive(Debug, Clone, PartialEq)]
pub struct Identification {
    /// Keys in document order, never empty.
    pub keys: Vec<String>,
    pub source: KeySource,
    /// Why the model's answer was not used, if it was not.
    pub error: Option<String>,
}

/// Runs stages against one generation backend.
pub struct StageRunner<'a, B: GenerationBackend + ?Sized> {
    backend: &'a B,
    policy: NullPolicy,
}

impl<'a, B: GenerationBackend + ?Sized> StageRunner<'a, B> {
    pub fn new(backend: &'a B, policy: NullPolicy) -> Self {
        Self { backend, policy }
    }

    /// Find the invoice numbers in the document.
    ///
    /// The model is asked first. When it fails, answers with something that
    /// is not a list, or lists nothing, label patterns are matched against
    /// the text. If that finds nothing too, the document is treated as a
    /// single entity named `sentinel`.
    pub fn identify(&self, document_text: &str, sentinel: &str) -> Identification {
        let (model_keys, error) = match self.identify_with_model(document_text) {
            Ok(keys) => (keys, None),
            Err(e) => {
                warn!("Model identification failed: {}", e);
                (Vec::new(), Some(e.to_string()))
            }
        };

        if !model_keys.is_empty() {
            return Identification {
                keys: model_keys,
                source: KeySource::Model,
                error,
            };
        }

        let regex_keys = find_candidate_keys(document_text);
        if !regex_keys.is_empty() {
            debug!("Using {} regex keys", regex_keys.len());
            return Identification {
                keys: regex_keys,
                source: KeySource::Regex,
                error,
            };
        }

        debug!("No invoice numbers found, using sentinel key {}", sentinel);
        Identification {
            keys: vec![sentinel.to_string()],
            source: KeySource::Sentinel,
            error,
        }
    }

    fn identify_with_model(&self, document_text: &str) -> Result<Vec<String>, StageError> {
        let answer = self.backend.generate(&prompts::identify(document_text))?;
        let items = parse_array(&answer)?;

        let mut keys: Vec<String> = Vec::new();
        for item in items {
            let key = match item {
                Value::String(s) => s.trim().to_string(),
                Value::Number(n) => n.to_string(),
                _ => continue,
            };
            if !key.is_empty() && !keys.contains(&key) {
                keys.push(key);
            }
        }
        Ok(keys)
    }

    /// Run one per-entity stage against `record`.
    pub fn run(
        &self,
        stage: Stage,
        document_text: &str,
        key: &str,
        record: &mut EntityRecord,
    ) -> Result<MergeOutcome, StageError> {
        match stage {
            Stage::Basic => self.basic(document_text, key, record),
            Stage::Detailed => self.detailed(document_text, key, record),
            Stage::LineItems => self.line_items(document_text, key, record),
            Stage::Identify => Err(StageError::Internal {
                kind: "InvalidStage".to_string(),
                message: "identification does not run per entity".to_string(),
            }),
        }
    }

    /// Extract the minimal fields for `key`.
    pub fn basic(
        &self,
        document_text: &str,
        key: &str,
        record: &mut EntityRecord,
    ) -> Result<MergeOutcome, StageError> {
        let answer = self.backend.generate(&prompts::basic(document_text, key))?;
        let fields = parse_object(&answer)?;
        Ok(self.apply(record, key, fields, self.policy))
    }

    /// Extract the secondary fields for `key`, given the record so far.
    pub fn detailed(
        &self,
        document_text: &str,
        key: &str,
        record: &mut EntityRecord,
    ) -> Result<MergeOutcome, StageError> {
        let current = current_data(record)?;
        let answer = self
            .backend
            .generate(&prompts::detailed(document_text, key, &current))?;
        let fields = parse_object(&answer)?;
        Ok(self.apply(record, key, fields, self.policy))
    }

    /// Extract the line items for `key`.
    ///
    /// A bare array answer is taken as the item list. The answer's
    /// `line_items` always replaces the current items, so an explicit empty
    /// array and a missing list both leave the record with no items. Other
    /// fields in the answer may fill gaps but never null out existing values.
    pub fn line_items(
        &self,
        document_text: &str,
        key: &str,
        record: &mut EntityRecord,
    ) -> Result<MergeOutcome, StageError> {
        let current = current_data(record)?;
        let answer = self
            .backend
            .generate(&prompts::line_items(document_text, key, &current))?;

        let mut fields = match parse_response(&answer)? {
            Value::Object(map) => map,
            Value::Array(items) => {
                let mut map = Map::new();
                map.insert("line_items".to_string(), Value::Array(items));
                map
            }
            other => {
                return Err(ParseError::UnexpectedShape {
                    expected: "object",
                    found: kind_of(&other),
                }
                .into());
            }
        };

        let items = match fields.remove("line_items") {
            Some(Value::Array(items)) => items,
            _ => Vec::new(),
        };

        let mut outcome = self.apply(record, key, fields, NullPolicy::KeepExisting);
        record.line_items = line_items_from(items);
        outcome.updated.push("line_items".to_string());

        debug!("{} line items for {}", record.line_items.len(), key);
        Ok(outcome)
    }

    fn apply(
        &self,
        record: &mut EntityRecord,
        key: &str,
        fields: Map<String, Value>,
        policy: NullPolicy,
    ) -> MergeOutcome {
        let outcome = record.merge(fields, policy);
        record.pin_key(key);
        debug!(
            "Merged {} fields into {} ({} kept, {} extra)",
            outcome.updated.len(),
            key,
            outcome.kept.len(),
            outcome.extra.len()
        );
        outcome
    }
}

fn current_data(record: &EntityRecord) -> Result<String, StageError> {
    serde_json::to_string_pretty(record).map_err(|e| StageError::Internal {
        kind: "SerializationError".to_string(),
        message: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use invex_llm::{GenerationError, ScriptedBackend};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    const TEXT: &str = "Invoice No: INV-7\nVendor: Acme\nTotal: 100.00";

    #[test]
    fn test_identify_from_model() {
        let backend = ScriptedBackend::new().then_answer("```json\n[\"INV-7\", 42, \" \", \"INV-7\"]\n```");
        let found = StageRunner::new(&backend, NullPolicy::default()).identify(TEXT, "UNKNOWN");

        assert_eq!(found.keys, vec!["INV-7", "42"]);
        assert_eq!(found.source, KeySource::Model);
        assert_eq!(found.error, None);
    }

    #[test]
    fn test_identify_falls_back_to_regex_on_error() {
        let backend = ScriptedBackend::new().then_fail(GenerationError::Unavailable("down".into()));
        let found = StageRunner::new(&backend, NullPolicy::default()).identify(TEXT, "UNKNOWN");

        assert_eq!(found.keys, vec!["INV-7"]);
        assert_eq!(found.source, KeySource::Regex);
        assert!(found.error.is_some());
    }

    #[test]
    fn test_identify_non_list_answer_uses_regex() {
        let backend = ScriptedBackend::new().then_answer("{\"invoice\": \"INV-7\"}");
        let found = StageRunner::new(&backend, NullPolicy::default()).identify(TEXT, "UNKNOWN");
        assert_eq!(found.source, KeySource::Regex);
    }

    #[test]
    fn test_identify_sentinel() {
        let backend = ScriptedBackend::new().then_answer("[]");
        let found = StageRunner::new(&backend, NullPolicy::default())
            .identify("Thank you for your order", "UNKNOWN");

        assert_eq!(found.keys, vec!["UNKNOWN"]);
        assert_eq!(found.source, KeySource::Sentinel);
        assert_eq!(found.error, None);
    }

    #[test]
    fn test_basic_merges_and_pins_key() {
        let backend = ScriptedBackend::new()
            .then_answer(r#"{"invoice_number": null, "vendor_name": "Acme", "total_amount": "100.00"}"#);
        let mut record = EntityRecord::for_key("INV-7");

        StageRunner::new(&backend, NullPolicy::Overwrite)
            .basic(TEXT, "INV-7", &mut record)
            .unwrap();

        assert_eq!(record.invoice_number, Some(json!("INV-7")));
        assert_eq!(record.vendor_name, Some(json!("Acme")));
        assert_eq!(record.total_amount, Some(json!("100.00")));
        assert!(backend.prompts()[0].contains("invoice INV-7 only"));
    }

    #[test]
    fn test_failed_stage_leaves_record_unchanged() {
        let backend = ScriptedBackend::new().then_answer("no json here");
        let mut record = EntityRecord::for_key("INV-7");
        record.vendor_name = Some(json!("Acme"));
        let before = record.clone();

        let err = StageRunner::new(&backend, NullPolicy::default())
            .detailed(TEXT, "INV-7", &mut record)
            .unwrap_err();

        assert!(matches!(err, StageError::Parse(ParseError::NoJsonFound)));
        assert!(err.is_recoverable());
        assert_eq!(record, before);
    }

    #[test]
    fn test_detailed_prompt_carries_current_record() {
        let backend = ScriptedBackend::new().then_answer(r#"{"currency": "INR", "vendor_name": null}"#);
        let mut record = EntityRecord::for_key("INV-7");
        record.vendor_name = Some(json!("Acme"));

        StageRunner::new(&backend, NullPolicy::KeepExisting)
            .detailed(TEXT, "INV-7", &mut record)
            .unwrap();

        assert!(backend.prompts()[0].contains("\"vendor_name\": \"Acme\""));
        assert_eq!(record.vendor_name, Some(json!("Acme")));
        assert_eq!(record.currency, Some(json!("INR")));
    }

    #[test]
    fn test_line_items_bare_array() {
        let backend = ScriptedBackend::new()
            .then_answer(r#"[{"item_description": "Widget", "quantity": 2}, "Shipping"]"#);
        let mut record = EntityRecord::for_key("INV-7");

        StageRunner::new(&backend, NullPolicy::default())
            .line_items(TEXT, "INV-7", &mut record)
            .unwrap();

        assert_eq!(record.line_items.len(), 2);
        assert_eq!(record.line_items[0].quantity, Some(json!(2)));
        assert_eq!(record.line_items[1].description_text().as_deref(), Some("Shipping"));
    }

    #[test]
    fn test_line_items_absent_clears_items() {
        let backend = ScriptedBackend::new().then_answer(r#"{"invoice_number": "INV-7"}"#);
        let mut record = EntityRecord::for_key("INV-7");
        record.line_items = line_items_from(vec![json!("old")]);

        StageRunner::new(&backend, NullPolicy::default())
            .line_items(TEXT, "INV-7", &mut record)
            .unwrap();

        assert!(record.line_items.is_empty());
    }

    #[test]
    fn test_line_items_explicit_empty_list_replaces_items() {
        let backend = ScriptedBackend::new().then_answer(r#"{"line_items": []}"#);
        let mut record = EntityRecord::for_key("INV-7");
        record.line_items = line_items_from(vec![json!("from detailed")]);

        let outcome = StageRunner::new(&backend, NullPolicy::KeepExisting)
            .line_items(TEXT, "INV-7", &mut record)
            .unwrap();

        assert!(record.line_items.is_empty());
        assert!(outcome.updated.contains(&"line_items".to_string()));
    }

    #[test]
    fn test_line_items_never_null_out_fields_under_overwrite() {
        let backend = ScriptedBackend::new().then_answer(
            r#"{"total_amount": null, "vendor_name": "null", "currency": "INR", "line_items": [{"item_description": "Widget"}]}"#,
        );
        let mut record = EntityRecord::for_key("INV-7");
        record.total_amount = Some(json!("100"));
        record.vendor_name = Some(json!("Acme"));

        let outcome = StageRunner::new(&backend, NullPolicy::Overwrite)
            .line_items(TEXT, "INV-7", &mut record)
            .unwrap();

        assert_eq!(record.total_amount, Some(json!("100")));
        assert_eq!(record.vendor_name, Some(json!("Acme")));
        assert_eq!(record.currency, Some(json!("INR")));
        assert_eq!(record.line_items.len(), 1);
        assert!(outcome.kept.contains(&"total_amount".to_string()));
    }

    #[test]
    fn test_identify_is_not_an_entity_stage() {
        let backend = ScriptedBackend::new();
        let mut record = EntityRecord::for_key("INV-7");
        let err = StageRunner::new(&backend, NullPolicy::default())
            .run(Stage::Identify, TEXT, "INV-7", &mut record)
            .unwrap_err();
        assert!(!err.is_recoverable());
        assert!(backend.prompts().is_empty());
    }
}
