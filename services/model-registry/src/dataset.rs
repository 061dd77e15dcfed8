//! Named in-memory datasets parsed from CSV text.
//!
//! The feature matrix and target vector are derived once at load time and
//! shared with fit/validate calls through an `Arc`.

use crate::error::{RegistryError, Result};
use ndarray::{Array1, Array2};
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Clone)]
pub struct Dataset {
    pub name: String,
    pub feature_columns: Vec<String>,
    pub target_column: String,
    pub x: Array2<f64>,
    pub y: Array1<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatasetInfo {
    pub name: String,
    pub rows: usize,
    pub features: Vec<String>,
    pub target_column: String,
}

impl Dataset {
    /// Header line first, then one numeric value per column on every
    /// non-empty line. `target_column` becomes `y`, the rest `x` in header
    /// order.
    pub fn from_csv(name: &str, csv: &str, target_column: &str) -> Result<Self> {
        let malformed = |msg: String| RegistryError::MalformedInput(msg);
        let mut lines = csv.lines().enumerate().filter(|(_, l)| !l.trim().is_empty());

        let (_, header) = lines.next().ok_or_else(|| malformed("csv is empty".into()))?;
        let columns: Vec<String> = header.split(',').map(|c| unquote(c).to_string()).collect();
        if columns.iter().any(String::is_empty) {
            return Err(malformed("csv header has an empty column name".into()));
        }
        if columns.len() < 2 {
            return Err(malformed("csv needs a target column and at least one feature column".into()));
        }
        let target_idx = columns
            .iter()
            .position(|c| c == target_column)
            .ok_or_else(|| malformed(format!("target column {target_column:?} not in header {columns:?}")))?;

        let width = columns.len() - 1;
        let mut flat = Vec::new();
        let mut target = Vec::new();
        for (line_no, line) in lines {
            let cells: Vec<&str> = line.split(',').collect();
            if cells.len() != columns.len() {
                return Err(malformed(format!(
                    "line {} has {} fields, header has {}",
                    line_no + 1,
                    cells.len(),
                    columns.len()
                )));
            }
            for (j, cell) in cells.iter().enumerate() {
                let raw = unquote(cell);
                let value = raw.parse::<f64>().ok().filter(|v| v.is_finite()).ok_or_else(|| {
                    malformed(format!("line {} column {:?}: {:?} is not a finite number", line_no + 1, columns[j], raw))
                })?;
                if j == target_idx { target.push(value) } else { flat.push(value) }
            }
        }
        if target.is_empty() {
            return Err(malformed("csv has a header but no data rows".into()));
        }

        let x = Array2::from_shape_vec((target.len(), width), flat).map_err(|e| malformed(e.to_string()))?;
        let mut feature_columns = columns;
        let target_column = feature_columns.remove(target_idx);
        Ok(Self { name: name.to_string(), feature_columns, target_column, x, y: Array1::from(target) })
    }

    pub fn info(&self) -> DatasetInfo {
        DatasetInfo {
            name: self.name.clone(),
            rows: self.y.len(),
            features: self.feature_columns.clone(),
            target_column: self.target_column.clone(),
        }
    }
}

/// Header names and data cells share this trimming.
fn unquote(cell: &str) -> &str { cell.trim().trim_matches('"').trim() }

#[derive(Debug, Default)]
pub struct DatasetStore {
    sets: RwLock<HashMap<String, Arc<Dataset>>>,
}

impl DatasetStore {
    pub fn new() -> Self { Self::default() }

    /// Parses and registers a dataset, replacing any previous one with the
    /// same name.
    pub fn load(&self, name: &str, csv: &str, target_column: &str) -> Result<DatasetInfo> {
        if name.trim().is_empty() {
            return Err(RegistryError::MalformedInput("dataset name is empty".into()));
        }
        let dataset = Dataset::from_csv(name, csv, target_column)?;
        let info = dataset.info();
        let replaced = self.sets.write().insert(name.to_string(), Arc::new(dataset)).is_some();
        info!(dataset = name, rows = info.rows, features = info.features.len(), replaced, "dataset loaded");
        Ok(info)
    }

    pub fn get(&self, name: &str) -> Result<Arc<Dataset>> {
        self.sets.read().get(name).cloned().ok_or_else(|| RegistryError::DatasetNotFound(name.to_string()))
    }

    pub fn list(&self) -> Vec<DatasetInfo> {
        let mut infos: Vec<DatasetInfo> = self.sets.read().values().map(|d| d.info()).collect();
        infos.sort_by(|a, b| a.name.cmp(&b.name));
        infos
    }

    pub fn remove(&self, name: &str) -> Result<()> {
        self.sets
            .write()
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| RegistryError::DatasetNotFound(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    const HOUSES: &str = "rooms,price,age\n3,300,10\n\n4,420,2\n2,180,30\n";

    #[test]
    fn splits_target_from_features() {
        let ds = Dataset::from_csv("houses", HOUSES, "price").unwrap();
        assert_eq!(ds.feature_columns, vec!["rooms".to_string(), "age".to_string()]);
        assert_eq!(ds.x, array![[3.0, 10.0], [4.0, 2.0], [2.0, 30.0]]);
        assert_eq!(ds.y, array![300.0, 420.0, 180.0]);
    }

    #[test]
    fn unknown_target_is_malformed() {
        let err = Dataset::from_csv("houses", HOUSES, "bedrooms").unwrap_err();
        assert!(matches!(err, RegistryError::MalformedInput(_)));
    }

    #[test]
    fn non_numeric_or_ragged_rows_are_rejected() {
        assert!(Dataset::from_csv("d", "a,b\n1,x\n", "b").is_err());
        assert!(Dataset::from_csv("d", "a,b\n1,2,3\n", "b").is_err());
        assert!(Dataset::from_csv("d", "a,b\n", "b").is_err());
        assert!(Dataset::from_csv("d", "b\n1\n", "b").is_err());
    }

    #[test]
    fn non_finite_cells_are_rejected() {
        for csv in ["x,y\nNaN,1\n2,3\n", "x,y\n1,inf\n", "x,y\n-infinity,1\n", "x,y\n1e400,1\n"] {
            let err = Dataset::from_csv("d", csv, "y").unwrap_err();
            assert!(matches!(err, RegistryError::MalformedInput(_)), "{csv:?}");
        }
    }

    #[test]
    fn quoted_cells_parse_like_the_header() {
        let ds = Dataset::from_csv("q", "\"x\",\"y\"\n\"1.5\", \"2\"\n3,4\n", "y").unwrap();
        assert_eq!(ds.x, array![[1.5], [3.0]]);
        assert_eq!(ds.y, array![2.0, 4.0]);
    }

    #[test]
    fn store_replaces_lists_and_removes() {
        let store = DatasetStore::new();
        store.load("b", "x,y\n1,2\n", "y").unwrap();
        store.load("a", HOUSES, "price").unwrap();
        let info = store.load("b", "x,y\n1,2\n3,4\n", "y").unwrap();
        assert_eq!(info.rows, 2);
        let names: Vec<String> = store.list().into_iter().map(|i| i.name).collect();
        assert_eq!(names, vec!["a".to_string(), "b".to_string()]);

        store.remove("a").unwrap();
        assert!(matches!(store.get("a"), Err(RegistryError::DatasetNotFound(_))));
        assert!(matches!(store.remove("a"), Err(RegistryError::DatasetNotFound(_))));
    }
}
