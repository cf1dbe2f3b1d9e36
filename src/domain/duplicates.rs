//! Duplicate grouping and merging used by the bundled backend.
//!
//! Two rows are duplicates when recipient name, phone and address are equal.

use std::collections::HashMap;

use crate::domain::field_schema::FieldKey;
use crate::domain::order::OrderRow;

type RecipientKey = (String, String, String);

fn owned_key(row: &OrderRow) -> RecipientKey {
    let (name, phone, address) = row.recipient_key();
    (name.to_string(), phone.to_string(), address.to_string())
}

pub struct DuplicateDetector;

impl DuplicateDetector {
    /// Sorts rows by recipient key (stable) and numbers every key that occurs
    /// at least twice, in order of first appearance.
    pub fn assign_groups(rows: &mut [OrderRow]) {
        rows.sort_by(|a, b| a.recipient_key().cmp(&b.recipient_key()));

        let mut key_count: HashMap<RecipientKey, usize> = HashMap::new();
        for row in rows.iter() {
            *key_count.entry(owned_key(row)).or_insert(0) += 1;
        }

        let mut group_ids: HashMap<RecipientKey, usize> = HashMap::new();
        let mut next_group_id = 1usize;

        for row in rows.iter_mut() {
            let key = owned_key(row);
            let count = key_count.get(&key).copied().unwrap_or(0);
            row.group_id = if count >= 2 {
                *group_ids.entry(key).or_insert_with(|| {
                    let id = next_group_id;
                    next_group_id += 1;
                    id
                })
            } else {
                0
            };
        }
    }
}

pub const MERGE_SEPARATOR: &str = "；";

pub struct DuplicateMerger;

impl DuplicateMerger {
    /// Collapses each recipient group into one row, keeping first-appearance
    /// order. Merged rows are ungrouped.
    pub fn merge(rows: &[OrderRow]) -> Vec<OrderRow> {
        let mut group_order: Vec<RecipientKey> = Vec::new();
        let mut groups: HashMap<RecipientKey, Vec<&OrderRow>> = HashMap::new();

        for row in rows {
            let key = owned_key(row);
            if !groups.contains_key(&key) {
                group_order.push(key.clone());
            }
            groups.entry(key).or_default().push(row);
        }

        group_order
            .into_iter()
            .filter_map(|key| groups.remove(&key).map(|group| (key, group)))
            .map(|(key, group)| match group.as_slice() {
                [single] => OrderRow {
                    group_id: 0,
                    ..(*single).clone()
                },
                _ => Self::merge_group(key, &group),
            })
            .collect()
    }

    fn merge_group(key: RecipientKey, group: &[&OrderRow]) -> OrderRow {
        let mut product_names: Vec<&str> = Vec::new();
        let mut product_specs: Vec<&str> = Vec::new();
        let mut remarks: Vec<&str> = Vec::new();
        let mut unresolved: Vec<FieldKey> = Vec::new();
        // `None` once a quantity is unresolved or the sum overflows.
        let mut total_quantity: Option<u64> = Some(0);

        for row in group {
            push_distinct(&mut product_names, &row.product_name);
            push_distinct(&mut product_specs, &row.product_spec);
            push_distinct(&mut remarks, &row.remarks);
            for key in &row.unresolved {
                if !unresolved.contains(key) {
                    unresolved.push(*key);
                }
            }
            total_quantity = if row.is_unresolved(FieldKey::Quantity) {
                None
            } else {
                let quantity = row.quantity.trim().parse::<u64>().unwrap_or(1);
                total_quantity.and_then(|total| total.checked_add(quantity))
            };
        }

        // Several products: one unit each, aligned with the product list, so
        // the source quantities no longer matter.
        let quantity = if product_names.len() > 1 {
            unresolved.retain(|key| *key != FieldKey::Quantity);
            vec!["1"; product_names.len()].join(MERGE_SEPARATOR)
        } else {
            match total_quantity {
                Some(total) => total.to_string(),
                None => {
                    if !unresolved.contains(&FieldKey::Quantity) {
                        unresolved.push(FieldKey::Quantity);
                    }
                    String::new()
                }
            }
        };

        let (recipient_name, recipient_phone, delivery_address) = key;
        OrderRow {
            recipient_name,
            recipient_phone,
            delivery_address,
            product_name: product_names.join(MERGE_SEPARATOR),
            product_spec: product_specs.join(MERGE_SEPARATOR),
            quantity,
            remarks: remarks.join(MERGE_SEPARATOR),
            group_id: 0,
            unresolved,
        }
    }
}

fn push_distinct<'a>(values: &mut Vec<&'a str>, value: &'a str) {
    if !value.is_empty() && !values.contains(&value) {
        values.push(value);
    }
}
