use std::collections::HashMap;

use tracing::warn;

use crate::record::{FieldValue, Record};

/// Active inclusion criteria: field name to the list of accepted values.
/// Values are matched lower-cased; the widgets that populate the store
/// insert them lower-cased already.
pub type FilterState = HashMap<String, Vec<String>>;

/// Holds the per-field inclusion criteria for the whole session. Mutated
/// by the filter panel, read by [`apply`] through [`FilterStore::snapshot`].
#[derive(Debug, Default)]
pub struct FilterStore {
    state: FilterState,
}

impl FilterStore {
    pub fn new() -> Self {
        FilterStore::default()
    }

    /// Add or remove one accepted value for a field. Blank fields or values
    /// are ignored. Adding is idempotent. Removing the last value drops the
    /// field entirely so an empty list is never representable.
    pub fn set_value(&mut self, field: &str, value: &str, adding: bool) {
        if field.trim().is_empty() || value.trim().is_empty() {
            return;
        }
        if adding {
            let values = self.state.entry(field.to_string()).or_default();
            if !values.iter().any(|v| v == value) {
                values.push(value.to_string());
            }
        } else if let Some(values) = self.state.get_mut(field) {
            values.retain(|v| v != value);
            if values.is_empty() {
                self.state.remove(field);
            }
        }
    }

    /// Replace a field's accepted values wholesale. Values are stored
    /// verbatim. An empty sequence removes the field, same as never having
    /// set it.
    pub fn bulk_replace(&mut self, field: &str, values: Vec<String>) {
        if values.is_empty() {
            self.state.remove(field);
        } else {
            self.state.insert(field.to_string(), values);
        }
    }

    /// Remove a field's criteria regardless of contents.
    pub fn clear_field(&mut self, field: &str) {
        self.state.remove(field);
    }

    /// The field's current accepted values, empty if unset.
    pub fn values_for(&self, field: &str) -> &[String] {
        self.state.get(field).map(Vec::as_slice).unwrap_or_default()
    }

    /// Owned copy of the current state: reflects every mutation applied
    /// before this call and none applied after.
    pub fn snapshot(&self) -> FilterState {
        self.state.clone()
    }

    pub fn is_empty(&self) -> bool {
        self.state.is_empty()
    }
}

/// Select the records the filter accepts, keeping input order and listing
/// each record at most once however many fields it matches on.
///
/// A record is accepted when ANY active field accepts it. Criteria form a
/// union across fields, not an intersection.
///
/// A field value that is neither a string nor a list of strings cannot be
/// compared; the first such value aborts filtering and the full input is
/// returned unfiltered, never a partially filtered set.
pub fn apply(records: &[Record], filter: &FilterState) -> Vec<Record> {
    let active: Vec<(&String, &Vec<String>)> = filter
        .iter()
        .filter(|(_, values)| !values.is_empty())
        .collect();
    if active.is_empty() {
        return records.to_vec();
    }

    let mut result = Vec::new();
    for (idx, record) in records.iter().enumerate() {
        let mut matched = false;
        // Every active field gets examined even after a match so that a
        // malformed value later in the same record still aborts cleanly.
        for (field, accepted) in &active {
            match record.get(field) {
                Some(FieldValue::Text(value)) => {
                    if accepted.contains(&value.to_lowercase()) {
                        matched = true;
                    }
                }
                Some(FieldValue::List(items)) => {
                    if items.iter().any(|item| accepted.contains(&item.to_lowercase())) {
                        matched = true;
                    }
                }
                Some(FieldValue::Other(value)) => {
                    warn!(
                        "Could not filter record {idx} on field [{field}]: unexpected value {value}, returning data unfiltered"
                    );
                    return records.to_vec();
                }
                None => {}
            }
        }
        if matched {
            result.push(record.clone());
        }
    }
    result
}
