//! Completeness scoring of extraction results.
//!
//! Every invoice earns points for the fields it carries: 25 for each
//! required field, 10 for each important one and 5 per line item (at most
//! 50), capped at 130. The overall score is the mean percentage across
//! invoices.

pub mod values;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::models::config::ValidationConfig;
use crate::models::record::{EntityRecord, is_meaningful};
use crate::models::result::PipelineResult;

pub use values::{parse_amount, parse_amount_text, parse_date};

/// Fields an invoice must have to be valid.
pub const REQUIRED_FIELDS: &[&str] = &["invoice_number", "invoice_date", "vendor_name", "total_amount"];

/// Fields that add to the score but do not affect validity.
pub const IMPORTANT_FIELDS: &[&str] = &["vendor_address", "buyer_name", "line_items"];

const REQUIRED_POINTS: u32 = 25;
const IMPORTANT_POINTS: u32 = 10;
const LINE_ITEM_POINTS: u32 = 5;
const LINE_ITEM_CAP: u32 = 50;

/// Highest score an invoice can reach.
pub const MAX_SCORE: u32 = 130;

/// Coarse quality assessment of an overall score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityBand {
    Excellent,
    Good,
    Fair,
    Poor,
}

impl QualityBand {
    pub fn from_score(score: f64) -> Self {
        if score >= 80.0 {
            QualityBand::Excellent
        } else if score >= 60.0 {
            QualityBand::Good
        } else if score >= 40.0 {
            QualityBand::Fair
        } else {
            QualityBand::Poor
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            QualityBand::Excellent => "excellent",
            QualityBand::Good => "good",
            QualityBand::Fair => "fair",
            QualityBand::Poor => "poor",
        }
    }
}

impl std::fmt::Display for QualityBand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Informational findings that do not affect the score.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ValidationWarning {
    #[error("No line items found for {invoice}")]
    NoLineItems { invoice: String },

    #[error("total_amount of {invoice} is not numeric: {value}")]
    NonNumericTotal { invoice: String, value: String },

    #[error("invoice_date of {invoice} is not a recognizable date: {value}")]
    UnrecognizedDate { invoice: String, value: String },

    #[error("line items of {invoice} sum to {sum}, invoice total is {total}")]
    LineItemTotalMismatch {
        invoice: String,
        sum: Decimal,
        total: Decimal,
    },
}

/// Score of a single invoice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityValidation {
    pub index: usize,
    pub invoice_number: String,
    pub missing_required_fields: Vec<String>,
    pub missing_important_fields: Vec<String>,
    /// Points out of [`MAX_SCORE`].
    pub score: u32,
    pub completeness_percentage: f64,
    pub populated_fields_count: usize,
    pub total_fields_count: usize,
    pub line_items_count: usize,
}

/// Validation outcome of a whole run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub is_valid: bool,
    /// Mean completeness percentage, 0 to 100.
    pub overall_score: f64,
    pub quality: QualityBand,
    pub invoices: Vec<EntityValidation>,
    pub warnings: Vec<ValidationWarning>,
    pub critical_issues: Vec<String>,
}

impl ValidationReport {
    fn rejected(issue: String) -> Self {
        Self {
            is_valid: false,
            overall_score: 0.0,
            quality: QualityBand::Poor,
            invoices: Vec::new(),
            warnings: Vec::new(),
            critical_issues: vec![issue],
        }
    }

    /// Warning texts, in the order found.
    pub fn warning_messages(&self) -> Vec<String> {
        self.warnings.iter().map(ToString::to_string).collect()
    }
}

/// Scores pipeline results.
#[derive(Debug, Clone, Default)]
pub struct Validator {
    config: ValidationConfig,
}

impl Validator {
    pub fn new(config: ValidationConfig) -> Self {
        Self { config }
    }

    /// Score a pipeline result. Never fails.
    pub fn score(&self, result: &PipelineResult) -> ValidationReport {
        if let Some((kind, message)) = result.error() {
            return ValidationReport::rejected(format!("Extraction failed ({}): {}", kind, message));
        }

        let invoices = result.invoices();
        if invoices.is_empty() {
            return ValidationReport::rejected("No invoices found in extracted data".to_string());
        }

        let mut warnings = Vec::new();
        let entities: Vec<EntityValidation> = invoices
            .iter()
            .enumerate()
            .map(|(index, record)| self.score_entity(index, record, &mut warnings))
            .collect();

        let overall_score = entities.iter().map(|e| e.completeness_percentage).sum::<f64>()
            / entities.len() as f64;
        let is_valid = entities.iter().all(|e| e.missing_required_fields.is_empty());

        debug!(
            "Scored {} invoices: {:.1}% ({} warnings)",
            entities.len(),
            overall_score,
            warnings.len()
        );

        ValidationReport {
            is_valid,
            overall_score,
            quality: QualityBand::from_score(overall_score),
            invoices: entities,
            warnings,
            critical_issues: Vec::new(),
        }
    }

    fn score_entity(
        &self,
        index: usize,
        record: &EntityRecord,
        warnings: &mut Vec<ValidationWarning>,
    ) -> EntityValidation {
        let invoice = record
            .invoice_number_text()
            .unwrap_or_else(|| format!("Invoice_{}", index));

        let mut score = 0;
        let mut missing_required_fields = Vec::new();
        for field in REQUIRED_FIELDS {
            if record.is_populated(field) {
                score += REQUIRED_POINTS;
            } else {
                missing_required_fields.push(field.to_string());
            }
        }

        let mut missing_important_fields = Vec::new();
        for field in IMPORTANT_FIELDS {
            if record.is_populated(field) {
                score += IMPORTANT_POINTS;
            } else {
                missing_important_fields.push(field.to_string());
            }
        }

        let line_items_count = record.line_items.len();
        if line_items_count == 0 {
            warnings.push(ValidationWarning::NoLineItems {
                invoice: invoice.clone(),
            });
        } else {
            let points = u32::try_from(line_items_count)
                .unwrap_or(u32::MAX)
                .saturating_mul(LINE_ITEM_POINTS);
            score += points.min(LINE_ITEM_CAP);
        }
        let score = score.min(MAX_SCORE);

        if self.config.check_values {
            self.check_values(&invoice, record, warnings);
        }

        EntityValidation {
            index,
            invoice_number: invoice,
            missing_required_fields,
            missing_important_fields,
            score,
            completeness_percentage: f64::from(score) / f64::from(MAX_SCORE) * 100.0,
            populated_fields_count: record.populated_count(),
            total_fields_count: record.total_count(),
            line_items_count,
        }
    }

    fn check_values(&self, invoice: &str, record: &EntityRecord, warnings: &mut Vec<ValidationWarning>) {
        let total = record.total_amount.as_ref().filter(|v| is_meaningful(v));
        let total_value = total.and_then(parse_amount);
        if let (Some(raw), None) = (total, total_value) {
            warnings.push(ValidationWarning::NonNumericTotal {
                invoice: invoice.to_string(),
                value: display(raw),
            });
        }

        if let Some(date) = record.invoice_date.as_ref().filter(|v| is_meaningful(v)) {
            let parsed = date.as_str().and_then(parse_date);
            if parsed.is_none() {
                warnings.push(ValidationWarning::UnrecognizedDate {
                    invoice: invoice.to_string(),
                    value: display(date),
                });
            }
        }

        let item_totals: Option<Vec<Decimal>> = record
            .line_items
            .iter()
            .map(|item| item.total_item_value.as_ref().and_then(parse_amount))
            .collect();
        let Some(item_totals) = item_totals.filter(|t| !t.is_empty()) else {
            return;
        };
        let sum: Decimal = item_totals.into_iter().sum();

        let invoice_value = record.total_invoice_value.as_ref().and_then(parse_amount);
        let candidates: Vec<Decimal> = [total_value, invoice_value].into_iter().flatten().collect();
        let Some(&reference) = candidates.first() else {
            return;
        };

        let tolerance = self.config.total_tolerance;
        if candidates.iter().all(|t| (sum - *t).abs() > tolerance) {
            warnings.push(ValidationWarning::LineItemTotalMismatch {
                invoice: invoice.to_string(),
                sum,
                total: reference,
            });
        }
    }
}

/// Score a pipeline result with the default configuration.
pub fn score(result: &PipelineResult) -> ValidationReport {
    Validator::default().score(result)
}

fn display(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
