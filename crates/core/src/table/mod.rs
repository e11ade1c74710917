//! Tabular per-pixel data
//!
//! A [`FeatureTable`] is the hand-off format between pixel sampling,
//! feature derivation and prediction: one row per sampled pixel, keyed by
//! `(date, latitude, longitude)`, with an ordered set of named columns.

use chrono::NaiveDate;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::ops::Range;

use crate::error::{Error, Result};

/// Name of the date key column in persisted tables
pub const DATE_COLUMN: &str = "Date";
/// Name of the latitude (northing) key column in persisted tables
pub const LATITUDE_COLUMN: &str = "Latitude";
/// Name of the longitude (easting) key column in persisted tables
pub const LONGITUDE_COLUMN: &str = "Longitude";

/// Identity of one sampled pixel
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RowKey {
    pub date: NaiveDate,
    pub latitude: f64,
    pub longitude: f64,
}

impl RowKey {
    pub fn new(date: NaiveDate, latitude: f64, longitude: f64) -> Self {
        Self {
            date,
            latitude,
            longitude,
        }
    }

    /// Hashable form; coordinates compare bit-for-bit
    pub fn bits(&self) -> (NaiveDate, u64, u64) {
        (self.date, self.latitude.to_bits(), self.longitude.to_bits())
    }
}

impl fmt::Display for RowKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.date, self.latitude, self.longitude)
    }
}

/// One column of values
#[derive(Debug, Clone, PartialEq)]
pub enum Column {
    /// Numeric values, `NaN` marks a missing value
    Float(Vec<f64>),
    /// Values that did not parse as numbers when the table was read
    Text(Vec<String>),
}

impl Column {
    pub fn len(&self) -> usize {
        match self {
            Column::Float(v) => v.len(),
            Column::Text(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Numeric values, if this is a numeric column
    pub fn as_float(&self) -> Option<&[f64]> {
        match self {
            Column::Float(v) => Some(v),
            Column::Text(_) => None,
        }
    }

    /// Best-effort numeric view: text cells that parse become numbers,
    /// everything else becomes `NaN`.
    pub fn to_float_lossy(&self) -> Vec<f64> {
        match self {
            Column::Float(v) => v.clone(),
            Column::Text(v) => v
                .iter()
                .map(|s| s.trim().parse::<f64>().unwrap_or(f64::NAN))
                .collect(),
        }
    }

    fn is_missing(&self, row: usize) -> bool {
        match self {
            Column::Float(v) => v[row].is_nan(),
            Column::Text(v) => v[row].trim().is_empty(),
        }
    }

    fn retain(&mut self, keep: &[bool]) {
        match self {
            Column::Float(v) => retain_by_mask(v, keep),
            Column::Text(v) => retain_by_mask(v, keep),
        }
    }
}

fn retain_by_mask<T>(values: &mut Vec<T>, keep: &[bool]) {
    let mut i = 0;
    values.retain(|_| {
        let k = keep[i];
        i += 1;
        k
    });
}

/// Ordered, uniquely named columns over uniquely keyed rows
#[derive(Debug, Clone, Default)]
pub struct FeatureTable {
    keys: Vec<RowKey>,
    names: Vec<String>,
    columns: Vec<Column>,
    index: HashMap<String, usize>,
}

impl FeatureTable {
    /// Create a table with the given row keys and no columns.
    ///
    /// Fails if a `(date, latitude, longitude)` triple repeats.
    pub fn new(keys: Vec<RowKey>) -> Result<Self> {
        let mut seen = HashSet::with_capacity(keys.len());
        for key in &keys {
            if !seen.insert(key.bits()) {
                return Err(Error::DuplicateRow(key.to_string()));
            }
        }
        Ok(Self {
            keys,
            ..Self::default()
        })
    }

    /// Number of rows
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn keys(&self) -> &[RowKey] {
        &self.keys
    }

    /// Number of non-key columns
    pub fn width(&self) -> usize {
        self.names.len()
    }

    /// Non-key column names in table order
    pub fn column_names(&self) -> &[String] {
        &self.names
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.index.get(name).map(|&i| &self.columns[i])
    }

    pub fn float_column(&self, name: &str) -> Option<&[f64]> {
        self.column(name).and_then(Column::as_float)
    }

    /// Iterate `(name, column)` pairs in table order
    pub fn columns(&self) -> impl Iterator<Item = (&str, &Column)> {
        self.names.iter().map(String::as_str).zip(self.columns.iter())
    }

    /// Append a column at the end of the table
    pub fn push_column(&mut self, name: impl Into<String>, column: Column) -> Result<()> {
        let name = name.into();
        if column.len() != self.len() {
            return Err(Error::SizeMismatch {
                expected: self.len(),
                actual: column.len(),
            });
        }
        if self.index.contains_key(&name) {
            return Err(Error::DuplicateColumn(name));
        }
        self.index.insert(name.clone(), self.columns.len());
        self.names.push(name);
        self.columns.push(column);
        Ok(())
    }

    /// Append a numeric column
    pub fn push_float(&mut self, name: impl Into<String>, values: Vec<f64>) -> Result<()> {
        self.push_column(name, Column::Float(values))
    }

    /// Remove a column, returning it
    pub fn remove_column(&mut self, name: &str) -> Option<Column> {
        let i = self.index.remove(name)?;
        self.names.remove(i);
        let column = self.columns.remove(i);
        for (j, n) in self.names.iter().enumerate().skip(i) {
            self.index.insert(n.clone(), j);
        }
        Some(column)
    }

    /// Rename columns through `f`; `None` keeps the current name.
    ///
    /// Fails without modifying the table if two columns would end up with
    /// the same name.
    pub fn rename_columns<F>(&mut self, mut f: F) -> Result<()>
    where
        F: FnMut(&str) -> Option<String>,
    {
        let renamed: Vec<String> = self
            .names
            .iter()
            .map(|n| f(n).unwrap_or_else(|| n.clone()))
            .collect();

        let mut index = HashMap::with_capacity(renamed.len());
        for (i, n) in renamed.iter().enumerate() {
            if index.insert(n.clone(), i).is_some() {
                return Err(Error::DuplicateColumn(n.clone()));
            }
        }

        self.names = renamed;
        self.index = index;
        Ok(())
    }

    /// New table with the same rows and the columns at `positions`
    pub fn slice_columns(&self, positions: Range<usize>) -> Result<Self> {
        if positions.end > self.width() {
            return Err(Error::InvalidParameter {
                name: "positions",
                value: format!("{:?}", positions),
                reason: format!("table has {} columns", self.width()),
            });
        }
        let mut out = Self {
            keys: self.keys.clone(),
            ..Self::default()
        };
        for i in positions {
            out.push_column(self.names[i].clone(), self.columns[i].clone())?;
        }
        Ok(out)
    }

    /// Drop every row holding a missing value in any column.
    ///
    /// Returns the number of rows dropped.
    pub fn drop_incomplete_rows(&mut self) -> usize {
        let keep: Vec<bool> = (0..self.len())
            .map(|row| !self.columns.iter().any(|c| c.is_missing(row)))
            .collect();

        let dropped = keep.iter().filter(|k| !**k).count();
        if dropped == 0 {
            return 0;
        }

        retain_by_mask(&mut self.keys, &keep);
        for column in &mut self.columns {
            column.retain(&keep);
        }
        dropped
    }

    /// Replace each missing numeric value with the last present value above
    /// it in the same column. Leading gaps stay missing.
    ///
    /// Returns the number of cells filled.
    pub fn forward_fill(&mut self) -> usize {
        let mut filled = 0;
        for column in &mut self.columns {
            if let Column::Float(values) = column {
                let mut last = None;
                for v in values.iter_mut() {
                    if v.is_nan() {
                        if let Some(prev) = last {
                            *v = prev;
                            filled += 1;
                        }
                    } else {
                        last = Some(*v);
                    }
                }
            }
        }
        filled
    }

    /// Row position of each key, for joins on `(date, latitude, longitude)`
    pub fn key_positions(&self) -> HashMap<(NaiveDate, u64, u64), usize> {
        self.keys
            .iter()
            .enumerate()
            .map(|(i, k)| (k.bits(), i))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2023, 7, 15).unwrap()
    }

    fn table() -> FeatureTable {
        let keys = (0..4)
            .map(|i| RowKey::new(date(), 4_170_000.0 - i as f64 * 20.0, 690_000.0))
            .collect();
        let mut t = FeatureTable::new(keys).unwrap();
        t.push_float("a", vec![1.0, f64::NAN, 3.0, 4.0]).unwrap();
        t.push_float("b", vec![f64::NAN, 2.0, f64::NAN, 8.0]).unwrap();
        t
    }

    #[test]
    fn test_duplicate_keys_rejected() {
        let k = RowKey::new(date(), 1.0, 2.0);
        assert!(matches!(
            FeatureTable::new(vec![k, k]),
            Err(Error::DuplicateRow(_))
        ));
    }

    #[test]
    fn test_push_column_checks() {
        let mut t = table();
        assert!(matches!(
            t.push_float("a", vec![0.0; 4]),
            Err(Error::DuplicateColumn(_))
        ));
        assert!(matches!(
            t.push_float("c", vec![0.0; 3]),
            Err(Error::SizeMismatch { expected: 4, actual: 3 })
        ));
    }

    #[test]
    fn test_drop_incomplete_rows() {
        let mut t = table();
        assert_eq!(t.drop_incomplete_rows(), 3);
        assert_eq!(t.len(), 1);
        assert_eq!(t.float_column("b").unwrap(), &[8.0]);
        assert_eq!(t.keys()[0].latitude, 4_170_000.0 - 60.0);
    }

    #[test]
    fn test_forward_fill() {
        let mut t = table();
        assert_eq!(t.forward_fill(), 2);
        assert_eq!(t.float_column("a").unwrap(), &[1.0, 1.0, 3.0, 4.0]);
        let b = t.float_column("b").unwrap();
        assert!(b[0].is_nan(), "leading gap stays missing");
        assert_eq!(&b[1..], &[2.0, 2.0, 8.0]);
    }

    #[test]
    fn test_rename_and_remove() {
        let mut t = table();
        t.rename_columns(|n| (n == "a").then(|| "alpha".to_string())).unwrap();
        assert!(t.has_column("alpha"));
        assert!(t.rename_columns(|_| Some("same".into())).is_err());
        assert_eq!(t.column_names(), &["alpha".to_string(), "b".to_string()]);

        t.remove_column("alpha").unwrap();
        assert_eq!(t.column_names(), &["b".to_string()]);
        assert!(t.float_column("b").is_some());
    }

    #[test]
    fn test_slice_columns() {
        let t = table();
        let s = t.slice_columns(1..2).unwrap();
        assert_eq!(s.column_names(), &["b".to_string()]);
        assert_eq!(s.len(), 4);
        assert!(t.slice_columns(1..3).is_err());
    }

    #[test]
    fn test_lossy_text_column() {
        let c = Column::Text(vec!["1.5".into(), "x".into(), " 2 ".into()]);
        let v = c.to_float_lossy();
        assert_eq!(v[0], 1.5);
        assert!(v[1].is_nan());
        assert_eq!(v[2], 2.0);
    }
}
