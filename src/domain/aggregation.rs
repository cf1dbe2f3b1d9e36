//! Operator semantics for combining several source cells into one field.
//!
//! Both the bundled backend and any other backend must agree on these rules:
//! concat joins in selection order with no separator, arithmetic folds left to
//! right, and a missing, non-numeric or zero-divisor operand leaves the field
//! unresolved for that row instead of failing it.

use crate::domain::field_schema::Operation;
use crate::domain::mapping::ColumnMapping;

#[derive(Debug, Clone, PartialEq)]
pub enum AggregatedValue {
    Resolved(String),
    Unresolved(UnresolvedReason),
}

#[derive(Debug, Clone, PartialEq)]
pub enum UnresolvedReason {
    MissingOperand { position: usize },
    NotANumber { position: usize, value: String },
    DivisionByZero { position: usize },
    NonFinite,
}

impl AggregatedValue {
    pub fn is_resolved(&self) -> bool {
        matches!(self, AggregatedValue::Resolved(_))
    }
}

pub struct AggregationEvaluator;

impl AggregationEvaluator {
    /// Evaluates `entry` against a full source row.
    pub fn evaluate_row(entry: &ColumnMapping, row: &[String]) -> AggregatedValue {
        let cells: Vec<Option<&str>> = entry
            .source_indices
            .iter()
            .map(|&index| row.get(index).map(String::as_str))
            .collect();
        Self::evaluate(entry.operation, &cells)
    }

    /// `cells` holds the values at the entry's source indices, in order;
    /// `None` marks a cell the row does not have.
    pub fn evaluate(operation: Operation, cells: &[Option<&str>]) -> AggregatedValue {
        match operation {
            Operation::Concat => AggregatedValue::Resolved(
                cells.iter().map(|cell| cell.unwrap_or_default()).collect(),
            ),
            Operation::Add => Self::fold_numbers(cells, |a, b| Some(a + b)),
            Operation::Subtract => Self::fold_numbers(cells, |a, b| Some(a - b)),
            Operation::Multiply => Self::fold_numbers(cells, |a, b| Some(a * b)),
            Operation::Divide => {
                Self::fold_numbers(cells, |a, b| if b == 0.0 { None } else { Some(a / b) })
            }
        }
    }

    /// `step` returns `None` only for a zero divisor.
    fn fold_numbers(
        cells: &[Option<&str>],
        step: impl Fn(f64, f64) -> Option<f64>,
    ) -> AggregatedValue {
        let mut acc: Option<f64> = None;
        for (position, cell) in cells.iter().enumerate() {
            let value = match parse_operand(position, *cell) {
                Ok(value) => value,
                Err(reason) => return AggregatedValue::Unresolved(reason),
            };

            acc = match acc {
                None => Some(value),
                Some(current) => match step(current, value) {
                    Some(next) => Some(next),
                    None => {
                        return AggregatedValue::Unresolved(UnresolvedReason::DivisionByZero {
                            position,
                        })
                    }
                },
            };
        }

        match acc {
            Some(result) if result.is_finite() => AggregatedValue::Resolved(format_number(result)),
            Some(_) => AggregatedValue::Unresolved(UnresolvedReason::NonFinite),
            None => AggregatedValue::Unresolved(UnresolvedReason::MissingOperand { position: 0 }),
        }
    }
}

fn parse_operand(position: usize, cell: Option<&str>) -> Result<f64, UnresolvedReason> {
    let raw = cell.map(str::trim).unwrap_or_default();
    if raw.is_empty() {
        return Err(UnresolvedReason::MissingOperand { position });
    }
    match raw.parse::<f64>() {
        Ok(value) if value.is_finite() => Ok(value),
        _ => Err(UnresolvedReason::NotANumber {
            position,
            value: raw.to_string(),
        }),
    }
}

/// Integral values print without a fractional part (`3`, not `3.0`).
pub fn format_number(value: f64) -> String {
    if value == value.trunc() && value.abs() < i64::MAX as f64 {
        format!("{}", value as i64)
    } else {
        format!("{}", value)
    }
}
