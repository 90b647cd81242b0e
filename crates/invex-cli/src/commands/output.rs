//! Rendering of pipeline results as JSON, CSV or a text summary.

use serde_json::Value;

use invex_core::models::record::value_text;
use invex_core::models::{EntityRecord, LineItem, PipelineResult};
use invex_core::validation::ValidationReport;

/// Output format for extraction results.
#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    /// JSON output
    Json,
    /// CSV output, one row per line item
    Csv,
    /// Plain text summary
    Text,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Json => "json",
            OutputFormat::Csv => "csv",
            OutputFormat::Text => "txt",
        }
    }
}

const INVOICE_COLUMNS: &[&str] = &[
    "invoice_number",
    "invoice_date",
    "due_date",
    "vendor_name",
    "vendor_gst",
    "buyer_name",
    "buyer_gst",
    "currency",
    "total_amount",
    "total_invoice_value",
];

const ITEM_COLUMNS: &[&str] = &[
    "item_description",
    "quantity",
    "unit_price",
    "total_item_value",
    "hsn_sac_code",
    "taxable_value",
    "cgst_amount",
    "sgst_amount",
    "igst_amount",
];

/// Render a result; the validation report is attached to JSON output as
/// `_validation`.
pub fn format_result(
    result: &PipelineResult,
    report: Option<&ValidationReport>,
    format: OutputFormat,
) -> anyhow::Result<String> {
    match format {
        OutputFormat::Json => {
            let mut json = serde_json::to_value(result)?;
            if let (Some(report), Some(obj)) = (report, json.as_object_mut()) {
                obj.insert("_validation".to_string(), serde_json::to_value(report)?);
            }
            Ok(serde_json::to_string_pretty(&json)?)
        }
        OutputFormat::Csv => format_csv(result),
        OutputFormat::Text => Ok(format_text(result, report)),
    }
}

fn format_csv(result: &PipelineResult) -> anyhow::Result<String> {
    if let Some((kind, message)) = result.error() {
        anyhow::bail!("Cannot export failed extraction to CSV ({}): {}", kind, message);
    }

    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(INVOICE_COLUMNS.iter().chain(ITEM_COLUMNS))?;

    for invoice in result.invoices() {
        let head: Vec<String> = INVOICE_COLUMNS
            .iter()
            .map(|name| cell(invoice.field(name)))
            .collect();

        if invoice.line_items.is_empty() {
            let blanks = ITEM_COLUMNS.iter().map(|_| String::new());
            wtr.write_record(head.iter().cloned().chain(blanks))?;
            continue;
        }

        for item in &invoice.line_items {
            wtr.write_record(head.iter().cloned().chain(item_cells(item)))?;
        }
    }

    let data = String::from_utf8(wtr.into_inner()?)?;
    Ok(data)
}

fn item_cells(item: &LineItem) -> Vec<String> {
    [
        &item.item_description,
        &item.quantity,
        &item.unit_price,
        &item.total_item_value,
        &item.hsn_sac_code,
        &item.taxable_value,
        &item.cgst_amount,
        &item.sgst_amount,
        &item.igst_amount,
    ]
    .into_iter()
    .map(|v| cell(v.as_ref()))
    .collect()
}

fn cell(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(v) => value_text(v).unwrap_or_else(|| v.to_string()),
    }
}

fn format_text(result: &PipelineResult, report: Option<&ValidationReport>) -> String {
    let mut output = String::new();
    let metadata = result.metadata();

    output.push_str(&format!("Source: {}\n", metadata.source_file));

    if let Some((kind, message)) = result.error() {
        output.push_str(&format!("Extraction failed ({}): {}\n", kind, message));
        return output;
    }

    output.push_str(&format!(
        "Invoices: {} ({})\n",
        metadata.invoice_count,
        metadata.invoice_numbers.join(", ")
    ));
    if metadata.cancelled {
        output.push_str("Run was cancelled; some stages were skipped.\n");
    }

    for (index, invoice) in result.invoices().iter().enumerate() {
        output.push('\n');
        push_invoice(&mut output, invoice);

        let failed = metadata
            .extraction_stages
            .get(index)
            .map(|p| p.failed_stages())
            .unwrap_or_default();
        if !failed.is_empty() {
            let labels: Vec<_> = failed.iter().map(|s| s.label()).collect();
            output.push_str(&format!("  Failed stages: {}\n", labels.join(", ")));
        }
    }

    if let Some(report) = report {
        output.push_str(&format!(
            "\nQuality: {:.1}% ({})\n",
            report.overall_score, report.quality
        ));
        for warning in &report.warnings {
            output.push_str(&format!("  - {}\n", warning));
        }
    }

    output
}

fn push_invoice(output: &mut String, invoice: &EntityRecord) {
    let text = |name: &str| cell(invoice.field(name));

    output.push_str(&format!("Invoice: {}\n", text("invoice_number")));
    output.push_str(&format!("  Date:   {}\n", text("invoice_date")));
    output.push_str(&format!("  Vendor: {}\n", text("vendor_name")));
    output.push_str(&format!("  Buyer:  {}\n", text("buyer_name")));
    output.push_str(&format!("  Total:  {} {}\n", text("total_amount"), text("currency")));

    if !invoice.line_items.is_empty() {
        output.push_str(&format!("  Line items ({}):\n", invoice.line_items.len()));
        for item in &invoice.line_items {
            output.push_str(&format!(
                "    - {} x{} = {}\n",
                cell(item.item_description.as_ref()),
                cell(item.quantity.as_ref()),
                cell(item.total_item_value.as_ref())
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use invex_core::models::record::line_items_from;
    use invex_core::models::{Extraction, RunMetadata};
    use serde_json::json;

    fn sample() -> PipelineResult {
        let mut invoice = EntityRecord::for_key("INV-7");
        invoice.vendor_name = Some(json!("Acme, Ltd"));
        invoice.total_amount = Some(json!(118));
        invoice.line_items = line_items_from(vec![
            json!({"item_description": "Widget", "quantity": 2, "total_item_value": 100}),
            json!({"item_description": "Tax", "total_item_value": 18}),
        ]);

        let mut metadata = RunMetadata::new("inv.txt", "scripted");
        metadata.invoice_count = 1;
        metadata.invoice_numbers = vec!["INV-7".to_string()];

        PipelineResult::Extracted(Extraction {
            error: false,
            invoices: vec![invoice],
            metadata,
            raw_text: "Invoice No: INV-7".to_string(),
        })
    }

    #[test]
    fn test_csv_has_one_row_per_line_item() {
        let csv = format_result(&sample(), None, OutputFormat::Csv).unwrap();
        let lines: Vec<&str> = csv.lines().collect();

        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("invoice_number,invoice_date"));
        assert!(lines[1].starts_with("INV-7,,,\"Acme, Ltd\""));
        assert!(lines[1].contains("Widget,2,"));
        assert!(lines[2].contains("Tax,,,18"));
    }

    #[test]
    fn test_json_carries_validation() {
        let result = sample();
        let report = invex_core::validation::score(&result);
        let json = format_result(&result, Some(&report), OutputFormat::Json).unwrap();
        let value: Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["invoices"][0]["invoice_number"], json!("INV-7"));
        assert_eq!(value["_validation"]["is_valid"], json!(false));
    }

    #[test]
    fn test_text_summary() {
        let text = format_result(&sample(), None, OutputFormat::Text).unwrap();
        assert!(text.contains("Invoices: 1 (INV-7)"));
        assert!(text.contains("Vendor: Acme, Ltd"));
        assert!(text.contains("- Widget x2 = 100"));
    }
}
