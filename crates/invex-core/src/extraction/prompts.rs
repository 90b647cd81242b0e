//! Prompt templates for each extraction stage.

use crate::models::record::{BASIC_FIELDS, DETAILED_FIELDS};

/// Prompt asking for every invoice number in the document.
pub fn identify(document_text: &str) -> String {
    format!(
        r#"You are an expert document analyzer. Find all unique invoice numbers in this document.

Look for patterns like:
- Invoice No: ABC123
- Invoice Number: INV-001
- Bill No: 12345
- Invoice #: XYZ789

Document text:
{document_text}

Return ONLY a JSON array like: ["INV001", "INV002", "INV003"]
If no invoice numbers found, return: []
"#
    )
}

/// Prompt for the minimal fields of one invoice.
pub fn basic(document_text: &str, key: &str) -> String {
    let fields = bullet_list(BASIC_FIELDS);
    format!(
        r#"You are an expert invoice data extractor. Extract data for invoice {key} only.

Invoice content:
{document_text}

Extract these fields for invoice {key}:
{fields}

Return JSON format:
{{
    "invoice_number": "{key}",
    "invoice_date": "YYYY-MM-DD or null",
    "vendor_name": "vendor name or null",
    "total_amount": "number or null",
    "vendor_address": "address or null",
    "buyer_name": "buyer name or null"
}}

ONLY extract data clearly visible for invoice {key}. Use null for missing fields.
"#
    )
}

/// Prompt for the secondary fields, given what is known so far.
pub fn detailed(document_text: &str, key: &str, current_data: &str) -> String {
    let fields = DETAILED_FIELDS.join(", ");
    format!(
        r#"You are an expert invoice data extractor. Extract detailed data for invoice {key}.

Current data:
{current_data}

Invoice content:
{document_text}

Add these additional fields:
{fields}

Return the complete updated JSON with all fields (keep existing + add new ones).
Use null for fields not found.
"#
    )
}

/// Prompt for the line items of one invoice.
pub fn line_items(document_text: &str, key: &str, current_data: &str) -> String {
    format!(
        r#"You are an expert at extracting line items from invoice {key}.

Current data:
{current_data}

Invoice content:
{document_text}

Extract all line items for invoice {key} and add them to the "line_items" array.

Each line item should have:
- item_description
- quantity
- unit_price (if available)
- total_item_value
- hsn_sac_code (if available)
- taxable_value (if available)
- cgst_amount, sgst_amount, igst_amount (if available)

Return the complete updated JSON with the line_items array filled.
"#
    )
}

fn bullet_list(fields: &[&str]) -> String {
    fields
        .iter()
        .map(|f| format!("- {}", f))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompts_embed_document_and_key() {
        let text = "Invoice No: INV-7\nTotal: 100";

        assert!(identify(text).contains(text));

        let prompt = basic(text, "INV-7");
        assert!(prompt.contains("invoice INV-7 only"));
        assert!(prompt.contains("\"invoice_number\": \"INV-7\""));
        assert!(prompt.contains("- buyer_name"));

        let prompt = detailed(text, "INV-7", "{\"vendor_name\": \"Acme\"}");
        assert!(prompt.contains("\"vendor_name\": \"Acme\""));
        assert!(prompt.contains("total_invoice_value"));

        let prompt = line_items(text, "INV-7", "{}");
        assert!(prompt.contains("\"line_items\" array"));
    }
}
