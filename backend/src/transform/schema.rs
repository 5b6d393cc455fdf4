//! Claim schema definition
//!
//! The schema is the fixed destination layout of every claim file: an ordered
//! list of output columns, each saying where its value comes from. It is plain
//! data, so a different ERP layout is a JSON file rather than new code.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::error::{SchemaError, SchemaResult};
use crate::models::{CleanedRow, ClaimValue, ColumnRoles, Role};

/// Branch code written on every claim line.
pub const DEFAULT_BRANCH: &str = "KEC";

/// Payment method written on every claim line.
pub const DEFAULT_PAID_WITH: &str = "Corporate Card, Company Expense";

/// Ordered destination columns of a claim file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClaimSchema {
    #[serde(default)]
    pub description: String,

    pub fields: Vec<ClaimField>,
}

/// One destination column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClaimField {
    pub name: String,
    pub source: FieldSource,
}

/// Where a destination value comes from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FieldSource {
    /// Fixed literal.
    Constant { value: String },

    /// Text of the column resolved for `role`; blank when the role is absent.
    Column { role: Role },

    /// Cleaned numeric amount.
    Amount,

    /// Reference column when present, otherwise the scrubbed description.
    Reference,

    /// Always empty.
    Blank,
}

impl ClaimSchema {
    /// The Acumatica expense-claim import layout.
    pub fn acumatica(branch: &str, paid_with: &str) -> Self {
        Self {
            description: "Acumatica expense claim import".to_string(),
            fields: vec![
                ClaimField::constant("Branch", branch),
                ClaimField::column("Date", Role::Date),
                ClaimField::new("Ref. Nbr.", FieldSource::Reference),
                ClaimField::blank("Expense Item"),
                ClaimField::blank("Expense Account"),
                ClaimField::column("Description", Role::Description),
                ClaimField::new("Amount", FieldSource::Amount),
                ClaimField::new("Claim Amount", FieldSource::Amount),
                ClaimField::constant("Paid With", paid_with),
                ClaimField::blank("Corporate Card"),
                ClaimField::blank("AR Reference Nbr."),
            ],
        }
    }

    pub fn from_json(json: &str) -> SchemaResult<Self> {
        let schema: Self = serde_json::from_str(json)
            .map_err(|e| SchemaError::InvalidClaimSchema(e.to_string()))?;
        schema.validate()?;
        Ok(schema)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Replace the literal of the constant field `name`. Returns false when
    /// the schema has no such constant field.
    pub fn set_constant(&mut self, name: &str, value: &str) -> bool {
        match self.fields.iter_mut().find(|f| f.name == name) {
            Some(ClaimField { source: FieldSource::Constant { value: current }, .. }) => {
                *current = value.to_string();
                true
            }
            _ => false,
        }
    }

    /// Destination column names, in output order.
    pub fn headers(&self) -> Vec<&str> {
        self.fields.iter().map(|f| f.name.as_str()).collect()
    }

    /// Names must be non-empty and unique, and there must be at least one.
    pub fn validate(&self) -> SchemaResult<()> {
        if self.fields.is_empty() {
            return Err(SchemaError::InvalidClaimSchema("schema has no fields".into()));
        }
        let mut seen = HashSet::new();
        for field in &self.fields {
            if field.name.trim().is_empty() {
                return Err(SchemaError::InvalidClaimSchema("field with empty name".into()));
            }
            if !seen.insert(field.name.as_str()) {
                return Err(SchemaError::InvalidClaimSchema(format!(
                    "duplicate field '{}'",
                    field.name
                )));
            }
        }
        Ok(())
    }
}

impl Default for ClaimSchema {
    fn default() -> Self {
        Self::acumatica(DEFAULT_BRANCH, DEFAULT_PAID_WITH)
    }
}

impl ClaimField {
    pub fn new(name: &str, source: FieldSource) -> Self {
        Self { name: name.to_string(), source }
    }

    pub fn constant(name: &str, value: &str) -> Self {
        Self::new(name, FieldSource::Constant { value: value.to_string() })
    }

    pub fn column(name: &str, role: Role) -> Self {
        Self::new(name, FieldSource::Column { role })
    }

    pub fn blank(name: &str) -> Self {
        Self::new(name, FieldSource::Blank)
    }

    /// Value of this field for one cleaned row.
    pub fn value_for(&self, row: &CleanedRow, roles: &ColumnRoles) -> ClaimValue {
        match &self.source {
            FieldSource::Constant { value } => ClaimValue::Text(value.clone()),
            FieldSource::Column { role } => text_of(row, roles, *role),
            FieldSource::Amount => row.amount.map_or(ClaimValue::Blank, ClaimValue::Amount),
            FieldSource::Reference => match text_of(row, roles, Role::Reference) {
                ClaimValue::Blank => text_of(row, roles, Role::Description),
                value => value,
            },
            FieldSource::Blank => ClaimValue::Blank,
        }
    }
}

fn text_of(row: &CleanedRow, roles: &ColumnRoles, role: Role) -> ClaimValue {
    match roles.get(role).map(|column| row.cell(column)) {
        Some(cell) if !cell.is_blank() => ClaimValue::Text(cell.as_text().trim().to_string()),
        _ => ClaimValue::Blank,
    }
}
