use std::collections::HashSet;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use log::{info, warn};

use crate::error::HarvestResult;
use crate::models::{CleanedRecord, Record, DERIVED_FIELDS, RECORD_FIELDS};
use crate::patterns::canonicalize;

pub const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

pub fn strip_bom(text: &str) -> &str {
    text.strip_prefix('\u{feff}').unwrap_or(text)
}

fn reader_for(content: &str) -> csv::Reader<&[u8]> {
    csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(strip_bom(content).as_bytes())
}

/// Profile URLs already present in an interchange file. A missing or unreadable file yields an empty set.
pub fn read_existing_profile_urls(path: &str) -> HashSet<String> {
    let mut seen = HashSet::new();
    if !Path::new(path).exists() {
        return seen;
    }
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            warn!("Resume: failed to read existing CSV {}: {}", path, e);
            return seen;
        }
    };
    let mut reader = reader_for(&content);
    let column = match reader.headers() {
        Ok(headers) => headers.iter().position(|h| h.trim() == "profile_url"),
        Err(e) => {
            warn!("Resume: failed to read header of {}: {}", path, e);
            None
        }
    };
    let Some(column) = column else {
        return seen;
    };
    for row in reader.records() {
        match row {
            Ok(row) => {
                let url = row.get(column).unwrap_or_default().trim();
                if !url.is_empty() {
                    seen.insert(url.to_string());
                }
            }
            Err(e) => warn!("Resume: skipping unreadable row in {}: {}", path, e),
        }
    }
    seen
}

/// Append-only interchange writer. Every record is flushed as soon as it is written.
pub struct RecordSink {
    writer: csv::Writer<File>,
    path: String,
    written: usize,
}

impl RecordSink {
    /// Opens `path` for appending, writing the BOM and header first when the file is new or empty.
    pub fn open(path: &str) -> HarvestResult<Self> {
        let is_new = fs::metadata(path).map(|m| m.len() == 0).unwrap_or(true);
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        if is_new {
            file.write_all(UTF8_BOM)?;
        }
        let mut writer = csv::WriterBuilder::new().has_headers(false).from_writer(file);
        if is_new {
            writer.write_record(RECORD_FIELDS)?;
            writer.flush()?;
        }
        Ok(Self {
            writer,
            path: path.to_string(),
            written: 0,
        })
    }

    pub fn append(&mut self, record: &Record) -> HarvestResult<()> {
        let row: Vec<String> = record.to_csv_record().into_iter().map(canonicalize).collect();
        self.writer.write_record(&row)?;
        self.writer.flush()?;
        self.written += 1;
        Ok(())
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Records appended through this sink.
    pub fn written(&self) -> usize {
        self.written
    }
}

/// An interchange file held in memory: its header order and its rows.
#[derive(Debug, Clone, Default)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<CleanedRecord>,
    /// Cell text exactly as read, row by row. Empty for tables built in memory.
    pub cells: Vec<Vec<String>>,
}

impl Table {
    /// The text a cell had in the source file, if the row and column came from one.
    pub fn original_cell(&self, row: usize, column: &str) -> Option<&str> {
        let index = self.headers.iter().position(|h| h == column)?;
        self.cells.get(row)?.get(index).map(String::as_str)
    }
}

pub fn load_table(path: &str) -> Result<Table> {
    let content = fs::read_to_string(path).with_context(|| format!("Failed to read input file: {}", path))?;
    let mut reader = reader_for(&content);
    let headers: Vec<String> = reader
        .headers()
        .with_context(|| format!("Failed to read header of {}", path))?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    let mut rows = Vec::new();
    let mut cells = Vec::new();
    for (line, result) in reader.records().enumerate() {
        let record = result.with_context(|| format!("Malformed row {} in {}", line + 2, path))?;
        let columns = headers
            .iter()
            .enumerate()
            .map(|(i, h)| (h.as_str(), record.get(i).unwrap_or_default()));
        rows.push(CleanedRecord::from_columns(columns));
        cells.push(record.iter().map(str::to_string).collect());
    }
    info!("Loaded {} rows from {}", rows.len(), path);
    Ok(Table { headers, rows, cells })
}

/// Input headers (or the record columns when there are none) followed by any missing derived columns.
pub fn output_headers(input: &[String]) -> Vec<String> {
    let mut headers: Vec<String> = if input.is_empty() {
        RECORD_FIELDS.iter().map(|h| h.to_string()).collect()
    } else {
        input.to_vec()
    };
    for derived in DERIVED_FIELDS {
        if !headers.iter().any(|h| h == derived) {
            headers.push(derived.to_string());
        }
    }
    headers
}

fn write_rows<I>(path: &str, headers: &[String], rows: I) -> Result<()>
where
    I: IntoIterator<Item = Vec<String>>,
{
    let mut file = File::create(path).with_context(|| format!("Failed to create output file: {}", path))?;
    file.write_all(UTF8_BOM)
        .with_context(|| format!("Failed to write to {}", path))?;
    let mut writer = csv::Writer::from_writer(file);
    writer.write_record(headers)?;
    for values in rows {
        writer.write_record(&values)?;
    }
    writer.flush().with_context(|| format!("Failed to flush {}", path))?;
    Ok(())
}

pub fn write_table(path: &str, headers: &[String], rows: &[CleanedRecord]) -> Result<()> {
    write_rows(
        path,
        headers,
        rows.iter()
            .map(|row| headers.iter().map(|h| row.column(h).unwrap_or_default()).collect()),
    )
}

/// Writes `table` with only the `changed` columns rendered from the parsed rows.
/// Every other cell keeps the text it was read with.
pub fn write_table_preserving(path: &str, headers: &[String], table: &Table, changed: &[&str]) -> Result<()> {
    write_rows(
        path,
        headers,
        table.rows.iter().enumerate().map(|(i, row)| {
            headers
                .iter()
                .map(|h| match table.original_cell(i, h) {
                    Some(text) if !changed.contains(&h.as_str()) => text.to_string(),
                    _ => row.column(h).unwrap_or_default(),
                })
                .collect()
        }),
    )
}
