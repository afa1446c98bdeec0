//! Flattening records into CSV rows, one column per argument name.

use std::{
    fs::OpenOptions,
    io::{self, Write},
    path::{Path, PathBuf},
};

use alloy::primitives::Address;
use thiserror::Error;

use crate::{attribute_text::parse_args_text, event_scanner::EventRecord};

/// Columns every export starts with.
pub const FIXED_COLUMNS: [&str; 5] = ["timestamp", "block_number", "tx_hash", "tx_from", "tx_to"];

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("cannot write {path}: {source}")]
    Io { path: PathBuf, source: io::Error },
    #[error(transparent)]
    Csv(#[from] csv::Error),
}

/// Result of [`ExportTable::write_csv`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteOutcome {
    pub rows: usize,
    /// The file existed, so rows were appended and no header was written.
    pub appended: bool,
}

/// Records reconciled to a common column set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportTable {
    columns: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl ExportTable {
    /// Builds the table from `records`.
    ///
    /// Columns are [`FIXED_COLUMNS`] followed by the sorted union of argument names parsed from
    /// every record's `args_text`. An argument named like a fixed column becomes `arg_<name>`.
    /// Cells of arguments a record does not carry are empty.
    #[must_use]
    pub fn from_records(records: &[EventRecord]) -> Self {
        let parsed: Vec<_> = records
            .iter()
            .map(|record| {
                let args: Vec<(String, String)> = parse_args_text(&record.args_text)
                    .into_iter()
                    .map(|(name, value)| (column_name(name), value.to_string()))
                    .collect();
                (record, args)
            })
            .collect();

        let mut arg_columns: Vec<String> =
            parsed.iter().flat_map(|(_, args)| args.iter().map(|(name, _)| name.clone())).collect();
        arg_columns.sort();
        arg_columns.dedup();

        let rows = parsed
            .into_iter()
            .map(|(record, args)| {
                let mut row = vec![
                    record.timestamp.format(TIMESTAMP_FORMAT).to_string(),
                    record.block_number.to_string(),
                    record.tx_hash.to_string(),
                    record.from.to_checksum(None),
                    record.to.map(|to| to.to_checksum(None)).unwrap_or_default(),
                ];
                row.extend(arg_columns.iter().map(|column| {
                    args.iter()
                        .find(|(name, _)| name == column)
                        .map(|(_, value)| value.clone())
                        .unwrap_or_default()
                }));
                row
            })
            .collect();

        let mut columns: Vec<String> = FIXED_COLUMNS.iter().map(|c| (*c).to_owned()).collect();
        columns.extend(arg_columns);

        Self { columns, rows }
    }

    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    #[must_use]
    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    /// Writes the rows to `writer`, preceded by the header when `header` is set.
    pub fn write_to<W: Write>(&self, writer: W, header: bool) -> Result<(), ExportError> {
        let mut csv = csv::WriterBuilder::new().has_headers(false).from_writer(writer);
        if header {
            csv.write_record(&self.columns)?;
        }
        for row in &self.rows {
            csv.write_record(row)?;
        }
        csv.flush().map_err(csv::Error::from)?;
        Ok(())
    }

    /// Writes to `path`. An existing file is appended to without a new header, even if its
    /// columns differ.
    pub fn write_csv(&self, path: &Path) -> Result<WriteOutcome, ExportError> {
        let appended = path.is_file();
        let io_error = |source| ExportError::Io { path: path.to_owned(), source };

        let file = OpenOptions::new().create(true).append(true).open(path).map_err(io_error)?;
        self.write_to(io::BufWriter::new(file), !appended)?;

        info!(path = %path.display(), rows = self.rows.len(), appended, "Exported records");
        Ok(WriteOutcome { rows: self.rows.len(), appended })
    }
}

fn column_name(arg: String) -> String {
    if FIXED_COLUMNS.contains(&arg.as_str()) { format!("arg_{arg}") } else { arg }
}

/// `<first 8 characters of the checksummed address>_<event>.csv`
#[must_use]
pub fn default_file_name(address: Address, event_name: &str) -> String {
    let address = address.to_checksum(None);
    format!("{}_{event_name}.csv", &address[..8])
}
