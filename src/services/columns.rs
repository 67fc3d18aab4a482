//! Grid column derivation from the CSV header row.

use crate::core::ColumnDescriptor;
use std::collections::HashMap;

/// Fixed widths for well-known FMCSA fields, in terminal cells
const DEFAULT_WIDTHS: &[(&str, u16)] = &[
    ("created_dt", 22),
    ("data_source_modified_dt", 24),
    ("entity_type", 14),
    ("operating_status", 20),
    ("legal_name", 36),
    ("dba_name", 30),
    ("physical_address", 44),
    ("phone", 16),
    ("usdot_number", 14),
    ("mc_mx_ff_number", 16),
    ("power_units", 12),
    ("out_of_service_date", 20),
];

/// Width from the built-in table
pub fn default_width(field: &str) -> Option<u16> {
    DEFAULT_WIDTHS
        .iter()
        .find(|(name, _)| *name == field)
        .map(|(_, width)| *width)
}

/// Display label: underscores become spaces, then upper-cased
pub fn label_for(field: &str) -> String {
    field.replace('_', " ").to_uppercase()
}

/// Map header keys to column descriptors, one per key, in order
///
/// `overrides` take precedence over the built-in width table.
pub fn derive_columns<S: AsRef<str>>(
    keys: &[S],
    overrides: &HashMap<String, u16>,
) -> Vec<ColumnDescriptor> {
    keys.iter()
        .map(|key| {
            let field = key.as_ref();
            ColumnDescriptor {
                field: field.to_string(),
                label: label_for(field),
                width: overrides
                    .get(field)
                    .copied()
                    .or_else(|| default_width(field)),
            }
        })
        .collect()
}
