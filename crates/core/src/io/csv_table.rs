//! CSV persistence for feature tables
//!
//! Layout: a header row, the three key columns `Date`, `Latitude`,
//! `Longitude`, then every table column in order. Missing numeric values
//! are written as empty cells.

use chrono::NaiveDate;
use std::io::{Read, Write};
use std::path::Path;

use crate::error::{Error, Result};
use crate::table::{
    Column, FeatureTable, RowKey, DATE_COLUMN, LATITUDE_COLUMN, LONGITUDE_COLUMN,
};

/// Write a table to a CSV file
pub fn write_table_csv<P: AsRef<Path>>(table: &FeatureTable, path: P) -> Result<()> {
    let writer = csv::Writer::from_path(path.as_ref())?;
    write_table(table, writer)
}

fn write_table<W: Write>(table: &FeatureTable, mut writer: csv::Writer<W>) -> Result<()> {
    let mut header = vec![DATE_COLUMN, LATITUDE_COLUMN, LONGITUDE_COLUMN];
    header.extend(table.column_names().iter().map(String::as_str));
    writer.write_record(&header)?;

    let columns: Vec<&Column> = table.columns().map(|(_, c)| c).collect();
    let mut record = Vec::with_capacity(header.len());
    for (row, key) in table.keys().iter().enumerate() {
        record.clear();
        record.push(key.date.format("%Y-%m-%d").to_string());
        record.push(format_float(key.latitude));
        record.push(format_float(key.longitude));
        for column in &columns {
            record.push(match column {
                Column::Float(v) => format_float(v[row]),
                Column::Text(v) => v[row].clone(),
            });
        }
        writer.write_record(&record)?;
    }

    writer.flush()?;
    Ok(())
}

/// Format a value for CSV output; `NaN` becomes an empty cell
pub fn format_float(v: f64) -> String {
    if v.is_nan() { String::new() } else { v.to_string() }
}

/// Read a table from a CSV file
pub fn read_table_csv<P: AsRef<Path>>(path: P) -> Result<FeatureTable> {
    let reader = csv::Reader::from_path(path.as_ref())?;
    read_table(reader)
}

/// Read a table from any CSV source
pub fn read_table_from<R: Read>(reader: R) -> Result<FeatureTable> {
    read_table(csv::Reader::from_reader(reader))
}

fn read_table<R: Read>(mut reader: csv::Reader<R>) -> Result<FeatureTable> {
    let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();

    let position = |name: &str| {
        headers
            .iter()
            .position(|h| h == name)
            .ok_or_else(|| Error::MissingColumn(name.to_string()))
    };
    let date_idx = position(DATE_COLUMN)?;
    let lat_idx = position(LATITUDE_COLUMN)?;
    let lon_idx = position(LONGITUDE_COLUMN)?;

    let mut keys = Vec::new();
    let mut cells: Vec<Vec<String>> = vec![Vec::new(); headers.len()];

    for (row_no, result) in reader.records().enumerate() {
        let record = result?;
        let field = |i: usize| record.get(i).unwrap_or("");

        let date = parse_date(field(date_idx)).ok_or_else(|| Error::InvalidParameter {
            name: "Date",
            value: field(date_idx).to_string(),
            reason: format!("row {} is not a YYYY-MM-DD date", row_no),
        })?;
        let lat = parse_coordinate(field(lat_idx), LATITUDE_COLUMN, row_no)?;
        let lon = parse_coordinate(field(lon_idx), LONGITUDE_COLUMN, row_no)?;
        keys.push(RowKey::new(date, lat, lon));

        for (i, column) in cells.iter_mut().enumerate() {
            if i != date_idx && i != lat_idx && i != lon_idx {
                column.push(field(i).to_string());
            }
        }
    }

    let mut table = FeatureTable::new(keys)?;
    for (i, (name, raw)) in headers.iter().zip(cells).enumerate() {
        if i == date_idx || i == lat_idx || i == lon_idx {
            continue;
        }
        table.push_column(name.clone(), infer_column(raw))?;
    }
    Ok(table)
}

/// Accepts `2023-07-15` and datetime renderings such as `2023-07-15 00:00:00`
fn parse_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    let head = s.get(..10).unwrap_or(s);
    NaiveDate::parse_from_str(head, "%Y-%m-%d").ok()
}

fn parse_coordinate(s: &str, name: &'static str, row: usize) -> Result<f64> {
    s.trim().parse::<f64>().map_err(|_| Error::InvalidParameter {
        name,
        value: s.to_string(),
        reason: format!("row {} is not a number", row),
    })
}

/// Numeric if every non-empty cell parses, text otherwise
fn infer_column(raw: Vec<String>) -> Column {
    let parsed: Option<Vec<f64>> = raw
        .iter()
        .map(|s| {
            let t = s.trim();
            if t.is_empty() {
                Some(f64::NAN)
            } else {
                t.parse::<f64>().ok()
            }
        })
        .collect();

    match parsed {
        Some(values) => Column::Float(values),
        None => Column::Text(raw),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
Date,Latitude,Longitude,rhow_B2,Season,note
2023-07-15 00:00:00,4170010.0,690010.0,0.031,Verano,a
2023-07-15 00:00:00,4170010.0,690030.0,,Verano,b
";

    #[test]
    fn test_read_infers_column_types() {
        let table = read_table_from(SAMPLE.as_bytes()).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.keys()[1].longitude, 690_030.0);
        assert_eq!(
            table.keys()[0].date,
            NaiveDate::from_ymd_opt(2023, 7, 15).unwrap()
        );

        let b2 = table.float_column("rhow_B2").unwrap();
        assert_eq!(b2[0], 0.031);
        assert!(b2[1].is_nan());
        assert!(matches!(table.column("Season"), Some(Column::Text(_))));
    }

    #[test]
    fn test_missing_key_column() {
        let err = read_table_from("Date,Latitude\n2023-01-01,1\n".as_bytes()).unwrap_err();
        assert!(matches!(err, Error::MissingColumn(c) if c == "Longitude"));
    }

    #[test]
    fn test_write_then_read_file() {
        let table = read_table_from(SAMPLE.as_bytes()).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("table.csv");

        write_table_csv(&table, &path).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("Date,Latitude,Longitude,rhow_B2,Season,note\n2023-07-15,"));
        assert!(text.contains(",,Verano,b"), "NaN written as empty cell: {}", text);

        let back = read_table_csv(&path).unwrap();
        assert_eq!(back.column_names(), table.column_names());
        assert_eq!(back.keys(), table.keys());
    }
}
