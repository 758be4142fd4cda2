//! CSV export of the composite series.
//!
//! The file always starts with `date,index`. When constituents are attached,
//! one extra column per contributing symbol holds that symbol's close on the
//! row's date, or an empty cell when it did not trade.

use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use thiserror::Error;

use crate::index::{IndexPoint, IndexSeries};
use crate::{PriceSeries, TradingDate};

pub const DATE_COLUMN: &str = "date";
pub const INDEX_COLUMN: &str = "index";

#[derive(Debug, Error)]
pub enum ExportError {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("csv header is missing required column '{name}'")]
    MissingColumn { name: &'static str },

    #[error("csv row {row}: {message}")]
    InvalidRow { row: usize, message: String },
}

/// Writer for an index series and, optionally, its constituents.
#[derive(Debug, Clone, Copy)]
pub struct CsvExport<'a> {
    index: &'a IndexSeries,
    constituents: &'a [PriceSeries],
}

impl<'a> CsvExport<'a> {
    pub fn new(index: &'a IndexSeries) -> Self {
        Self {
            index,
            constituents: &[],
        }
    }

    /// Add a close column for each index constituent found in `series`.
    pub fn with_constituents(mut self, series: &'a [PriceSeries]) -> Self {
        self.constituents = series;
        self
    }

    /// Write the CSV and return the number of data rows.
    pub fn write_to<W: Write>(&self, writer: W) -> Result<usize, ExportError> {
        let columns: Vec<&PriceSeries> = self
            .index
            .constituents()
            .iter()
            .filter_map(|symbol| {
                self.constituents
                    .iter()
                    .find(|candidate| candidate.symbol() == symbol)
            })
            .collect();

        let mut csv_writer = csv::Writer::from_writer(writer);

        let mut header = vec![DATE_COLUMN.to_owned(), INDEX_COLUMN.to_owned()];
        header.extend(columns.iter().map(|series| series.symbol().to_string()));
        csv_writer.write_record(&header)?;

        for point in self.index.points() {
            let mut record = vec![point.date.format_iso(), point.value.to_string()];
            record.extend(columns.iter().map(|series| {
                series
                    .close_on(point.date)
                    .map(|close| close.to_string())
                    .unwrap_or_default()
            }));
            csv_writer.write_record(&record)?;
        }

        csv_writer.flush()?;
        Ok(self.index.len())
    }

    pub fn write_to_path(&self, path: &Path) -> Result<usize, ExportError> {
        self.write_to(File::create(path)?)
    }
}

/// Read the `date` and `index` columns back; other columns are ignored.
///
/// Rows may be in any order. A repeated date keeps its last row.
pub fn read_index_csv<R: Read>(reader: R) -> Result<IndexSeries, ExportError> {
    let mut csv_reader = csv::Reader::from_reader(reader);
    let headers = csv_reader.headers()?.clone();

    let position = |name: &'static str| {
        headers
            .iter()
            .position(|header| header.trim().eq_ignore_ascii_case(name))
            .ok_or(ExportError::MissingColumn { name })
    };
    let date_col = position(DATE_COLUMN)?;
    let index_col = position(INDEX_COLUMN)?;

    let mut points = Vec::new();
    for (row, record) in csv_reader.records().enumerate() {
        let record = record?;
        let invalid = |message: String| ExportError::InvalidRow {
            row: row + 1,
            message,
        };

        let date = TradingDate::parse(record.get(date_col).unwrap_or_default())
            .map_err(|e| invalid(e.to_string()))?;
        let raw_value = record.get(index_col).unwrap_or_default();
        let value = raw_value
            .trim()
            .parse::<f64>()
            .map_err(|e| invalid(format!("index value '{raw_value}': {e}")))?;

        points.push(IndexPoint { date, value });
    }

    Ok(IndexSeries::from_points(points))
}

pub fn read_index_csv_path(path: &Path) -> Result<IndexSeries, ExportError> {
    read_index_csv(File::open(path)?)
}
