use crate::domain::field_schema::{FieldKey, FieldSchema};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// One converted record with a value for every canonical field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderRow {
    pub recipient_name: String,
    pub recipient_phone: String,
    pub delivery_address: String,
    pub product_name: String,
    pub product_spec: String,
    pub quantity: String,
    pub remarks: String,
    /// 0 = ungrouped; positive ids are only meaningful within one result.
    pub group_id: usize,
    /// Fields whose aggregation could not be resolved for this row.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub unresolved: Vec<FieldKey>,
}

impl Default for OrderRow {
    fn default() -> Self {
        let mut row = Self {
            recipient_name: String::new(),
            recipient_phone: String::new(),
            delivery_address: String::new(),
            product_name: String::new(),
            product_spec: String::new(),
            quantity: String::new(),
            remarks: String::new(),
            group_id: 0,
            unresolved: Vec::new(),
        };
        for field in FieldSchema::fields() {
            row.set(field.key, field.default_value.to_string());
        }
        row
    }
}

impl OrderRow {
    pub fn get(&self, key: FieldKey) -> &str {
        match key {
            FieldKey::RecipientName => &self.recipient_name,
            FieldKey::RecipientPhone => &self.recipient_phone,
            FieldKey::DeliveryAddress => &self.delivery_address,
            FieldKey::ProductName => &self.product_name,
            FieldKey::ProductSpec => &self.product_spec,
            FieldKey::Quantity => &self.quantity,
            FieldKey::Remarks => &self.remarks,
        }
    }

    pub fn set(&mut self, key: FieldKey, value: String) {
        let slot = match key {
            FieldKey::RecipientName => &mut self.recipient_name,
            FieldKey::RecipientPhone => &mut self.recipient_phone,
            FieldKey::DeliveryAddress => &mut self.delivery_address,
            FieldKey::ProductName => &mut self.product_name,
            FieldKey::ProductSpec => &mut self.product_spec,
            FieldKey::Quantity => &mut self.quantity,
            FieldKey::Remarks => &mut self.remarks,
        };
        *slot = value;
    }

    pub fn mark_unresolved(&mut self, key: FieldKey) {
        if !self.unresolved.contains(&key) {
            self.unresolved.push(key);
        }
    }

    pub fn is_unresolved(&self, key: FieldKey) -> bool {
        self.unresolved.contains(&key)
    }

    /// Identity used to decide whether two rows are duplicates.
    pub fn recipient_key(&self) -> (&str, &str, &str) {
        (
            &self.recipient_name,
            &self.recipient_phone,
            &self.delivery_address,
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultOrigin {
    Converted,
    Merged,
}

/// Outcome of a convert or merge. The summary fields are always derived from
/// `rows`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionResult {
    pub rows: Vec<OrderRow>,
    pub total_rows: usize,
    pub has_duplicates: bool,
    pub duplicate_count: usize,
    pub origin: ResultOrigin,
}

impl ConversionResult {
    pub fn new(rows: Vec<OrderRow>, origin: ResultOrigin) -> Self {
        let duplicate_count = rows.iter().filter(|row| row.group_id > 0).count();
        Self {
            total_rows: rows.len(),
            has_duplicates: duplicate_count > 0,
            duplicate_count,
            rows,
            origin,
        }
    }

    pub fn group_count(&self) -> usize {
        self.rows
            .iter()
            .filter(|row| row.group_id > 0)
            .map(|row| row.group_id)
            .collect::<BTreeSet<_>>()
            .len()
    }
}
