//! Group cleaned rows by employee and project them onto the claim schema.
//!
//! # Architecture
//!
//! ```text
//! Cleaned rows                     Employee groups            Claim records
//! ┌──────────────────────┐        ┌──────────────────┐       ┌────────────────────┐
//! │ Smith  $10.00 Lunch  │        │ Smith            │       │ KEC │ … │ 10.00 │ …│
//! │ Jones  $20.00 Hotel  │  ──▶   │   2 rows         │  ──▶  │ KEC │ … │ 12.50 │ …│
//! │ Smith  $12.50 Taxi   │        ├──────────────────┤       ├────────────────────┤
//! │ ""     $3.00  Fee    │ (out)  │ Jones            │       │ KEC │ … │ 20.00 │ …│
//! └──────────────────────┘        │   1 row          │       └────────────────────┘
//!                                 └──────────────────┘
//! ```
//!
//! Groups come out in first-seen key order. Rows with an empty key belong to
//! no group and are returned separately so they can be counted.

use std::collections::HashMap;

use super::schema::ClaimSchema;
use crate::models::{CleanedRow, ClaimRecord, ColumnRoles, EmployeeGroup, ResolvedColumn};

/// Result of [`partition`].
#[derive(Debug, Clone, Default)]
pub struct Partition {
    pub groups: Vec<EmployeeGroup>,
    /// Rows whose key cell was empty.
    pub unkeyed: Vec<CleanedRow>,
}

/// Stable partition of `rows` by the exact text of the `key` column.
pub fn partition(rows: Vec<CleanedRow>, key: &ResolvedColumn) -> Partition {
    let mut out = Partition::default();
    let mut index: HashMap<String, usize> = HashMap::new();

    for row in rows {
        let cell = row.cell(key);
        if cell.is_blank() {
            out.unkeyed.push(row);
            continue;
        }

        let value = cell.as_text();
        match index.get(&value) {
            Some(&i) => out.groups[i].rows.push(row),
            None => {
                index.insert(value.clone(), out.groups.len());
                out.groups.push(EmployeeGroup { key: value, rows: vec![row] });
            }
        }
    }

    out
}

/// One claim record per row of `group`, in row order.
pub fn project(group: &EmployeeGroup, schema: &ClaimSchema, roles: &ColumnRoles) -> Vec<ClaimRecord> {
    group
        .rows
        .iter()
        .map(|row| ClaimRecord {
            values: schema.fields.iter().map(|f| f.value_for(row, roles)).collect(),
        })
        .collect()
}
