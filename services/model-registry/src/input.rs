//! Conversion of JSON request payloads into numeric arrays.

use crate::error::{RegistryError, Result};
use ndarray::{Array1, Array2};
use serde_json::Value;

/// Accepts a non-empty list of equally sized, non-empty lists of numbers.
pub fn matrix_from_json(value: &Value) -> Result<Array2<f64>> {
    let rows = value
        .as_array()
        .ok_or_else(|| RegistryError::MalformedInput(format!("expected a list of rows, got {}", kind_of(value))))?;
    if rows.is_empty() {
        return Err(RegistryError::MalformedInput("no rows given".into()));
    }
    let mut width = None;
    let mut flat = Vec::new();
    for (i, row) in rows.iter().enumerate() {
        let cells = row
            .as_array()
            .ok_or_else(|| RegistryError::MalformedInput(format!("row {i} is {}, not a list", kind_of(row))))?;
        match width {
            None if cells.is_empty() => return Err(RegistryError::MalformedInput(format!("row {i} is empty"))),
            None => width = Some(cells.len()),
            Some(w) if w != cells.len() => {
                return Err(RegistryError::MalformedInput(format!("row {i} has {} values, expected {w}", cells.len())))
            }
            Some(_) => {}
        }
        for (j, cell) in cells.iter().enumerate() {
            flat.push(number(cell).ok_or_else(|| {
                RegistryError::MalformedInput(format!("value at [{i}][{j}] is {}, not a number", kind_of(cell)))
            })?);
        }
    }
    let width = width.unwrap_or_default();
    Array2::from_shape_vec((rows.len(), width), flat).map_err(|e| RegistryError::MalformedInput(e.to_string()))
}

/// Accepts a non-empty list of numbers.
pub fn vector_from_json(value: &Value) -> Result<Array1<f64>> {
    let items = value
        .as_array()
        .ok_or_else(|| RegistryError::MalformedInput(format!("expected a list of numbers, got {}", kind_of(value))))?;
    if items.is_empty() {
        return Err(RegistryError::MalformedInput("target is empty".into()));
    }
    items
        .iter()
        .enumerate()
        .map(|(i, v)| {
            number(v).ok_or_else(|| RegistryError::MalformedInput(format!("target[{i}] is {}, not a number", kind_of(v))))
        })
        .collect()
}

fn number(v: &Value) -> Option<f64> { v.as_f64().filter(|n| n.is_finite()) }

fn kind_of(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "an object",
    }
}
