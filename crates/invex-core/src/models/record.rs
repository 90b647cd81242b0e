//! Invoice record built up stage by stage.
//!
//! Every recognized field is declared up front so a serialized record
//! always carries the full field set: `null` means "not extracted", which
//! is different from the field being unknown. Anything the model returns
//! beyond the schema lands in `extra`.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// How an incoming `null` treats a field that already holds a value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NullPolicy {
    /// Last non-null value wins; an incoming null never erases data.
    #[default]
    KeepExisting,
    /// Every field present in the response replaces the current value,
    /// explicit nulls included.
    Overwrite,
}

/// What a merge changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeOutcome {
    /// Fields whose value was set or replaced.
    pub updated: Vec<String>,
    /// Fields where an incoming null was ignored to keep existing data.
    pub kept: Vec<String>,
    /// Unrecognized fields stored in the extra bucket.
    pub extra: Vec<String>,
}

macro_rules! entity_record {
    ($($(#[$meta:meta])* $field:ident),+ $(,)?) => {
        /// One invoice discovered in a document.
        #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
        pub struct EntityRecord {
            $(
                $(#[$meta])*
                #[serde(default)]
                pub $field: Option<Value>,
            )+

            /// Line items, in document order. Never null.
            #[serde(default, deserialize_with = "deserialize_line_items")]
            pub line_items: Vec<LineItem>,

            /// Fields returned by the model that the schema does not know.
            #[serde(flatten)]
            pub extra: Map<String, Value>,
        }

        impl EntityRecord {
            /// Names of all scalar fields, in declaration order.
            pub const FIELD_NAMES: &'static [&'static str] = &[$(stringify!($field)),+];

            /// Look up a scalar or extra field by name.
            pub fn field(&self, name: &str) -> Option<&Value> {
                match name {
                    $(stringify!($field) => self.$field.as_ref(),)+
                    _ => self.extra.get(name),
                }
            }

            fn slot_mut(&mut self, name: &str) -> Option<&mut Option<Value>> {
                match name {
                    $(stringify!($field) => Some(&mut self.$field),)+
                    _ => None,
                }
            }
        }
    };
}

entity_record! {
    /// Invoice identifier; doubles as the entity key.
    invoice_number,
    invoice_date,
    vendor_name,
    vendor_address,
    /// Vendor tax registration number.
    vendor_gst,
    vendor_state,
    vendor_pincode,
    vendor_contact,
    vendor_email,
    /// Amount payable as printed on the invoice.
    total_amount,
    due_date,
    currency,
    consignee_name,
    consignee_address,
    consignee_gst,
    consignee_state,
    consignee_pincode,
    consignee_contact,
    consignee_email,
    buyer_name,
    buyer_address,
    buyer_gst,
    buyer_state,
    buyer_pincode,
    buyer_contact,
    buyer_email,
    place_of_supply,
    discount,
    total_invoice_value,
    reverse_charge_applicable,
    supplier_signature,
    buyer_pan,
    shipping_address,
    billing_address,
    terms_of_supply,
    payment_terms,
    bank_account_details,
    eway_bill_number,
    vehicle_number,
    invoice_reference_number,
    remarks,
}

/// Fields requested by the basic stage.
pub const BASIC_FIELDS: &[&str] = &[
    "invoice_number",
    "invoice_date",
    "vendor_name",
    "total_amount",
    "vendor_address",
    "buyer_name",
];

/// Fields requested by the detailed stage.
pub const DETAILED_FIELDS: &[&str] = &[
    "vendor_gst",
    "vendor_contact",
    "vendor_email",
    "vendor_state",
    "vendor_pincode",
    "buyer_address",
    "buyer_gst",
    "buyer_contact",
    "buyer_email",
    "buyer_pan",
    "consignee_name",
    "consignee_address",
    "due_date",
    "currency",
    "payment_terms",
    "terms_of_supply",
    "place_of_supply",
    "discount",
    "total_invoice_value",
    "bank_account_details",
];

impl EntityRecord {
    /// An empty record whose identifier is the entity key.
    pub fn for_key(key: &str) -> Self {
        Self {
            invoice_number: Some(Value::String(key.to_string())),
            ..Self::default()
        }
    }

    /// Identifier as text, if set.
    pub fn invoice_number_text(&self) -> Option<String> {
        self.invoice_number.as_ref().and_then(value_text)
    }

    /// Whether a field holds a meaningful value (not null, not blank, not
    /// an empty collection). `line_items` is accepted as a field name.
    pub fn is_populated(&self, name: &str) -> bool {
        if name == "line_items" {
            return !self.line_items.is_empty();
        }
        self.field(name).is_some_and(is_meaningful)
    }

    /// Number of populated fields, line items and extras included.
    pub fn populated_count(&self) -> usize {
        let scalars = Self::FIELD_NAMES
            .iter()
            .filter(|name| self.is_populated(name))
            .count();
        let extras = self.extra.values().filter(|v| is_meaningful(v)).count();
        scalars + extras + usize::from(!self.line_items.is_empty())
    }

    /// Number of fields the record carries, line items and extras included.
    pub fn total_count(&self) -> usize {
        Self::FIELD_NAMES.len() + self.extra.len() + 1
    }

    /// Make sure the identifier is set, falling back to the entity key.
    pub fn pin_key(&mut self, key: &str) {
        let blank = self
            .invoice_number
            .as_ref()
            .is_none_or(|v| !is_meaningful(v));
        if blank {
            self.invoice_number = Some(Value::String(key.to_string()));
        }
    }

    /// Merge a model response into this record field by field.
    ///
    /// `line_items` in the response replaces the current items when it is
    /// an array. Placeholder strings such as `"null"` count as null.
    pub fn merge(&mut self, incoming: Map<String, Value>, policy: NullPolicy) -> MergeOutcome {
        let mut outcome = MergeOutcome::default();

        for (name, value) in incoming {
            let value = normalize(value);

            if name == "line_items" {
                match value {
                    Value::Array(items) => {
                        let items = line_items_from(items);
                        if !items.is_empty() || policy == NullPolicy::Overwrite {
                            self.line_items = items;
                            outcome.updated.push(name);
                        }
                    }
                    Value::Null if policy == NullPolicy::Overwrite => {
                        self.line_items.clear();
                        outcome.updated.push(name);
                    }
                    _ => {}
                }
                continue;
            }

            // `extra` would otherwise shadow the flattened bucket on output.
            if name == "extra" {
                continue;
            }

            match self.slot_mut(&name) {
                Some(slot) => {
                    if value.is_null() && policy == NullPolicy::KeepExisting && slot.is_some() {
                        outcome.kept.push(name);
                        continue;
                    }
                    *slot = (!value.is_null()).then_some(value);
                    outcome.updated.push(name);
                }
                None => {
                    let existing = self.extra.get(&name).is_some_and(|v| !v.is_null());
                    if value.is_null() && policy == NullPolicy::KeepExisting && existing {
                        outcome.kept.push(name);
                        continue;
                    }
                    self.extra.insert(name.clone(), value);
                    outcome.extra.push(name);
                }
            }
        }

        outcome
    }
}

/// A single line item of an invoice.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    #[serde(default)]
    pub item_description: Option<Value>,
    #[serde(default)]
    pub quantity: Option<Value>,
    #[serde(default)]
    pub unit_price: Option<Value>,
    #[serde(default)]
    pub total_item_value: Option<Value>,
    /// Harmonized System / service accounting code.
    #[serde(default)]
    pub hsn_sac_code: Option<Value>,
    #[serde(default)]
    pub taxable_value: Option<Value>,
    #[serde(default)]
    pub cgst_amount: Option<Value>,
    #[serde(default)]
    pub sgst_amount: Option<Value>,
    #[serde(default)]
    pub igst_amount: Option<Value>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl LineItem {
    /// A line item holding only a description.
    pub fn described(description: impl Into<String>) -> Self {
        Self {
            item_description: Some(Value::String(description.into())),
            ..Self::default()
        }
    }

    /// Description as text, if set.
    pub fn description_text(&self) -> Option<String> {
        self.item_description.as_ref().and_then(value_text)
    }
}

/// Convert loosely shaped model output into line items.
///
/// Objects are decoded leniently, bare strings become description-only
/// items, and anything else is dropped.
pub fn line_items_from(values: Vec<Value>) -> Vec<LineItem> {
    values
        .into_iter()
        .filter_map(|v| match v {
            Value::Object(map) => {
                let map: Map<String, Value> =
                    map.into_iter().map(|(k, v)| (k, normalize(v))).collect();
                serde_json::from_value(Value::Object(map)).ok()
            }
            Value::String(s) if !s.trim().is_empty() => Some(LineItem::described(s.trim())),
            _ => None,
        })
        .collect()
}

fn deserialize_line_items<'de, D>(deserializer: D) -> Result<Vec<LineItem>, D::Error>
where
    D: Deserializer<'de>,
{
    let values: Option<Vec<Value>> = Option::deserialize(deserializer)?;
    Ok(values.map(line_items_from).unwrap_or_default())
}

/// Whether a value counts as extracted data.
pub fn is_meaningful(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::String(s) => !s.trim().is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
        _ => true,
    }
}

/// Render a scalar value as text.
pub fn value_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn normalize(value: Value) -> Value {
    match value {
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("null") {
                Value::Null
            } else {
                Value::String(s)
            }
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("not an object"),
        }
    }

    #[test]
    fn test_serialized_record_has_every_field() {
        let record = EntityRecord::for_key("INV-1");
        let json = serde_json::to_value(&record).unwrap();
        let map = json.as_object().unwrap();

        for name in EntityRecord::FIELD_NAMES {
            assert!(map.contains_key(*name), "missing {name}");
        }
        assert_eq!(map["invoice_number"], json!("INV-1"));
        assert_eq!(map["vendor_name"], Value::Null);
        assert_eq!(map["line_items"], json!([]));
    }

    #[test]
    fn test_deserialize_null_line_items() {
        let record: EntityRecord =
            serde_json::from_value(json!({"invoice_number": "A1", "line_items": null, "colour": "red"}))
                .unwrap();
        assert!(record.line_items.is_empty());
        assert_eq!(record.extra.get("colour"), Some(&json!("red")));
    }

    #[test]
    fn test_merge_keep_existing_ignores_null() {
        let mut record = EntityRecord::for_key("INV-1");
        record.merge(object(json!({"vendor_name": "Acme", "total_amount": 10})), NullPolicy::KeepExisting);

        let outcome = record.merge(
            object(json!({"vendor_name": null, "currency": "INR"})),
            NullPolicy::KeepExisting,
        );

        assert_eq!(record.vendor_name, Some(json!("Acme")));
        assert_eq!(record.currency, Some(json!("INR")));
        assert_eq!(outcome.kept, vec!["vendor_name".to_string()]);
    }

    #[test]
    fn test_merge_overwrite_applies_null() {
        let mut record = EntityRecord::for_key("INV-1");
        record.merge(object(json!({"vendor_name": "Acme"})), NullPolicy::Overwrite);
        record.merge(object(json!({"vendor_name": null})), NullPolicy::Overwrite);
        assert_eq!(record.vendor_name, None);
    }

    #[test]
    fn test_merge_treats_null_string_as_null() {
        let mut record = EntityRecord::for_key("INV-1");
        record.merge(object(json!({"invoice_date": "2024-01-02"})), NullPolicy::KeepExisting);
        record.merge(object(json!({"invoice_date": "null"})), NullPolicy::KeepExisting);
        assert_eq!(record.invoice_date, Some(json!("2024-01-02")));
    }

    #[test]
    fn test_merge_unknown_fields_go_to_extra() {
        let mut record = EntityRecord::default();
        let outcome = record.merge(object(json!({"po_number": "PO-9"})), NullPolicy::KeepExisting);
        assert_eq!(outcome.extra, vec!["po_number".to_string()]);
        assert_eq!(record.field("po_number"), Some(&json!("PO-9")));
    }

    #[test]
    fn test_merge_line_items() {
        let mut record = EntityRecord::for_key("INV-1");
        record.merge(
            object(json!({"line_items": [
                {"item_description": "Widget", "quantity": 2, "total_item_value": "20.00", "batch": "B1"},
                "Freight",
                42
            ]})),
            NullPolicy::KeepExisting,
        );

        assert_eq!(record.line_items.len(), 2);
        assert_eq!(record.line_items[0].description_text().as_deref(), Some("Widget"));
        assert_eq!(record.line_items[0].extra.get("batch"), Some(&json!("B1")));
        assert_eq!(record.line_items[1].description_text().as_deref(), Some("Freight"));
    }

    #[test]
    fn test_pin_key_restores_blank_identifier() {
        let mut record = EntityRecord::for_key("INV-1");
        record.merge(object(json!({"invoice_number": ""})), NullPolicy::Overwrite);
        assert_eq!(record.invoice_number, None);
        record.pin_key("INV-1");
        assert_eq!(record.invoice_number_text().as_deref(), Some("INV-1"));
    }

    #[test]
    fn test_populated_count() {
        let mut record = EntityRecord::for_key("INV-1");
        record.vendor_name = Some(json!("  "));
        record.total_amount = Some(json!(0));
        record.line_items.push(LineItem::described("x"));

        assert!(!record.is_populated("vendor_name"));
        assert!(record.is_populated("total_amount"));
        assert_eq!(record.populated_count(), 3);
        assert_eq!(record.total_count(), EntityRecord::FIELD_NAMES.len() + 1);
    }
}
