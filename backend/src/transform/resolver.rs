//! Column role resolution.
//!
//! Statement revisions rename their columns, so roles are found by pattern
//! rather than by exact name. The rules live in one ordered table: a new
//! revision adds a row there.
//!
//! Matching runs against [`match_form`] of each column name (lowercase,
//! whitespace collapsed). For a role, rules are tried in table order, and for
//! each rule the columns are scanned in declared order; the first hit wins.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

use crate::error::{SchemaError, SchemaResult};
use crate::models::{ColumnRoles, ResolvedColumn, Role};

/// Role patterns, most specific first within each role.
const RULE_TABLE: &[(Role, &str)] = &[
    (Role::EmployeeKey, r"supplemental.*cardmember.*last"),
    (Role::EmployeeKey, r"cardmember.*last"),
    (Role::Amount, r"^transaction amount usd$"),
    (Role::Amount, r"^transaction amount"),
    (Role::Amount, r"\bamount\b"),
    (Role::Date, r"^transaction date$"),
    (Role::Date, r"\bdate\b"),
    (Role::Description, r"^transaction description"),
    (Role::Description, r"description"),
    (Role::Reference, r"^reference\b"),
];

/// One compiled rule.
#[derive(Debug, Clone)]
pub struct ColumnRule {
    pub role: Role,
    pub pattern: Regex,
}

static RULES: Lazy<Vec<ColumnRule>> = Lazy::new(|| {
    RULE_TABLE
        .iter()
        .map(|(role, pattern)| ColumnRule {
            role: *role,
            pattern: Regex::new(pattern).expect("valid column rule"),
        })
        .collect()
});

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid regex"));

/// The built-in rules.
pub fn default_rules() -> &'static [ColumnRule] {
    &RULES
}

/// Lowercase, whitespace-collapsed form used for matching.
pub fn match_form(name: &str) -> String {
    WHITESPACE.replace_all(name.trim(), " ").to_lowercase()
}

/// Resolve roles with the built-in rules.
pub fn resolve(columns: &[String]) -> SchemaResult<ColumnRoles> {
    resolve_with(default_rules(), columns)
}

/// Resolve roles against `columns`.
///
/// Roles are resolved in the order employee key, amount, date, description,
/// reference, and a column bound to one role is not offered to the next.
/// Fails when the employee key or the amount finds no column; the error lists
/// every column name.
pub fn resolve_with(rules: &[ColumnRule], columns: &[String]) -> SchemaResult<ColumnRoles> {
    let forms: Vec<String> = columns.iter().map(|c| match_form(c)).collect();
    let mut claimed = HashSet::new();

    let mut find = |role: Role| -> Option<ResolvedColumn> {
        let index = rules.iter().filter(|r| r.role == role).find_map(|rule| {
            forms
                .iter()
                .enumerate()
                .find(|(i, form)| !claimed.contains(i) && rule.pattern.is_match(form))
                .map(|(i, _)| i)
        })?;
        claimed.insert(index);
        Some(ResolvedColumn { name: columns[index].clone(), index })
    };

    let employee_key = find(Role::EmployeeKey);
    let amount = find(Role::Amount);
    let date = find(Role::Date);
    let description = find(Role::Description);
    let reference = find(Role::Reference);

    Ok(ColumnRoles {
        employee_key: employee_key.ok_or_else(|| missing(Role::EmployeeKey, columns))?,
        amount: amount.ok_or_else(|| missing(Role::Amount, columns))?,
        description,
        date,
        reference,
    })
}

/// Whether a candidate header row carries an employee-key column.
pub fn is_header_row(names: &[String]) -> bool {
    default_rules()
        .iter()
        .filter(|r| r.role == Role::EmployeeKey)
        .any(|rule| names.iter().any(|n| rule.pattern.is_match(&match_form(n))))
}

fn missing(role: Role, columns: &[String]) -> SchemaError {
    SchemaError::MissingColumn {
        role: role.as_str().to_string(),
        expected: role.expected_name().to_string(),
        available: columns.to_vec(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn columns(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_resolve_current_revision() {
        let cols = columns(&[
            "Transaction Date",
            "Supplemental Cardmember Last Name",
            "Transaction Description",
            "Transaction Amount USD",
            "Reference",
        ]);
        let roles = resolve(&cols).unwrap();
        assert_eq!(roles.employee_key.index, 1);
        assert_eq!(roles.amount.name, "Transaction Amount USD");
        assert_eq!(roles.date.unwrap().index, 0);
        assert_eq!(roles.description.unwrap().index, 2);
        assert_eq!(roles.reference.unwrap().index, 4);
    }

    #[test]
    fn test_strict_rule_beats_fallback() {
        let cols = columns(&["Cardmember Last Name", "SUPPLEMENTAL  Cardmember LAST Name", "Amount"]);
        let roles = resolve(&cols).unwrap();
        assert_eq!(roles.employee_key.index, 1);
    }

    #[test]
    fn test_fallback_rule() {
        let cols = columns(&["Date", "Basic Cardmember Last Name", "Amount"]);
        let roles = resolve(&cols).unwrap();
        assert_eq!(roles.employee_key.name, "Basic Cardmember Last Name");
        assert_eq!(roles.amount.index, 2);
    }

    #[test]
    fn test_first_declared_column_wins() {
        let cols = columns(&["Amount", "Cardmember Last Name", "Cardmember Last Name.1"]);
        let first = resolve(&cols).unwrap();
        assert_eq!(first.employee_key.index, 1);
        assert_eq!(resolve(&cols).unwrap(), first);
    }

    #[test]
    fn test_exact_amount_preferred() {
        let cols = columns(&["Cardmember Last Name", "Foreign Amount", "Transaction Amount USD"]);
        assert_eq!(resolve(&cols).unwrap().amount.index, 2);
    }

    #[test]
    fn test_optional_roles_absent() {
        let cols = columns(&["Cardmember Last Name", "Amount"]);
        let roles = resolve(&cols).unwrap();
        assert!(roles.date.is_none());
        assert!(roles.description.is_none());
        assert!(roles.reference.is_none());
    }

    #[test]
    fn test_missing_key_lists_columns() {
        let cols = columns(&["Date", "Description", "Amount"]);
        match resolve(&cols).unwrap_err() {
            SchemaError::MissingColumn { role, available, .. } => {
                assert_eq!(role, "employee_key");
                assert_eq!(available, cols);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_missing_amount() {
        let cols = columns(&["Cardmember Last Name", "Description"]);
        let err = resolve(&cols).unwrap_err();
        assert!(err.to_string().contains("Transaction Amount USD"));
    }

    #[test]
    fn test_header_row_predicate() {
        assert!(is_header_row(&columns(&["Date", "Supplemental Cardmember\nLast Name"])));
        assert!(!is_header_row(&columns(&["Prepared For", "ACME"])));
    }
}
