//! Mapping configuration model.
//!
//! A [`Mapping`] associates canonical fields with an ordered list of source
//! columns and the operator that combines them. Fields the user left empty are
//! omitted entirely; the backend then writes the field's schema default.

use crate::domain::column::ColumnDescriptor;
use crate::domain::error::{AppError, Result};
use crate::domain::field_schema::{FieldKey, FieldSchema, Operation};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// What the user picked for one field in the mapping panel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSelection {
    /// Column indices in the order they were selected.
    #[serde(default)]
    pub indices: Vec<usize>,
    pub operation: Operation,
}

impl FieldSelection {
    pub fn new(indices: Vec<usize>, operation: Operation) -> Self {
        Self { indices, operation }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnMapping {
    pub source_indices: Vec<usize>,
    pub operation: Operation,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Mapping {
    entries: BTreeMap<FieldKey, ColumnMapping>,
}

impl Mapping {
    pub fn get(&self, key: FieldKey) -> Option<&ColumnMapping> {
        self.entries.get(&key)
    }

    pub fn contains(&self, key: FieldKey) -> bool {
        self.entries.contains_key(&key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (FieldKey, &ColumnMapping)> {
        self.entries.iter().map(|(key, entry)| (*key, entry))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Turns raw panel selections into a validated [`Mapping`].
pub struct MappingBuilder<'a> {
    columns: &'a [ColumnDescriptor],
}

impl<'a> MappingBuilder<'a> {
    pub fn new(columns: &'a [ColumnDescriptor]) -> Self {
        Self { columns }
    }

    pub fn build(&self, selections: &HashMap<String, FieldSelection>) -> Result<Mapping> {
        let mut by_key: HashMap<FieldKey, &FieldSelection> = HashMap::new();
        for (raw_key, selection) in selections {
            let key: FieldKey = raw_key.parse()?;
            by_key.insert(key, selection);
        }

        let mut entries = BTreeMap::new();
        for field in FieldSchema::fields() {
            let Some(selection) = by_key.get(&field.key) else {
                continue;
            };
            if selection.indices.is_empty() {
                continue;
            }

            if !field.kind.allows(selection.operation) {
                return Err(AppError::InvalidMapping(format!(
                    "operation '{}' is not allowed for field '{}'",
                    selection.operation.as_str(),
                    field.key
                )));
            }

            if let Some(bad) = selection
                .indices
                .iter()
                .find(|&&index| index >= self.columns.len())
            {
                return Err(AppError::InvalidMapping(format!(
                    "field '{}' refers to column {} but only {} columns are loaded",
                    field.key,
                    bad,
                    self.columns.len()
                )));
            }

            entries.insert(
                field.key,
                ColumnMapping {
                    source_indices: selection.indices.clone(),
                    operation: selection.operation,
                },
            );
        }

        Ok(Mapping { entries })
    }
}

/// Selections of a mapping panel that is still being composed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MappingDraft {
    selections: BTreeMap<FieldKey, FieldSelection>,
}

impl Default for MappingDraft {
    fn default() -> Self {
        let selections = FieldSchema::fields()
            .iter()
            .map(|field| {
                (
                    field.key,
                    FieldSelection::new(Vec::new(), field.kind.default_operation()),
                )
            })
            .collect();
        Self { selections }
    }
}

impl MappingDraft {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, key: FieldKey, selection: FieldSelection) {
        self.selections.insert(key, selection);
    }

    pub fn get(&self, key: FieldKey) -> Option<&FieldSelection> {
        self.selections.get(&key)
    }

    /// Selections keyed the way [`MappingBuilder::build`] accepts them.
    pub fn to_selections(&self) -> HashMap<String, FieldSelection> {
        self.selections
            .iter()
            .map(|(key, selection)| (key.as_str().to_string(), selection.clone()))
            .collect()
    }
}
