//! Header-driven CSV codecs for export files and seed archives.

pub mod clients;
pub mod reviews;
pub mod transactions;

use std::collections::HashMap;
use std::fs::File;
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use csv::StringRecord;

#[derive(Debug, thiserror::Error)]
pub enum CsvError {
    #[error("csv io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("csv {0} has no header row")]
    MissingHeader(PathBuf),
}

/// Rows parsed from one file plus how many were dropped as malformed.
#[derive(Debug, Clone, Default)]
pub struct Parsed<T> {
    pub rows: Vec<T>,
    pub skipped: usize,
}

/// Column positions keyed by trimmed, lowercased header name.
#[derive(Debug, Clone, Default)]
pub struct HeaderIndex {
    positions: HashMap<String, usize>,
}

impl HeaderIndex {
    pub fn new(header: &StringRecord) -> Self {
        let positions = header
            .iter()
            .enumerate()
            .map(|(i, name)| (name.trim().to_lowercase(), i))
            .collect();
        Self { positions }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.positions.contains_key(name)
    }

    pub fn row<'a>(&'a self, record: &'a StringRecord) -> Row<'a> {
        Row {
            index: self,
            record,
        }
    }
}

/// One record viewed through its header. Absent columns read as empty.
pub struct Row<'a> {
    index: &'a HeaderIndex,
    record: &'a StringRecord,
}

impl Row<'_> {
    pub fn raw(&self, name: &str) -> &str {
        self.index
            .positions
            .get(name)
            .and_then(|&i| self.record.get(i))
            .unwrap_or("")
    }

    pub fn text(&self, name: &str) -> String {
        self.raw(name).to_string()
    }

    pub fn float(&self, name: &str) -> f64 {
        self.opt_float(name).unwrap_or(0.0)
    }

    pub fn opt_float(&self, name: &str) -> Option<f64> {
        self.raw(name).trim().parse().ok()
    }

    pub fn opt_int(&self, name: &str) -> Option<i32> {
        self.raw(name).trim().parse().ok()
    }

    pub fn int(&self, name: &str) -> i32 {
        self.opt_int(name).unwrap_or(0)
    }

    pub fn bigint(&self, name: &str) -> i64 {
        self.raw(name).trim().parse().unwrap_or(0)
    }

    pub fn flag(&self, name: &str) -> bool {
        parse_bool(self.raw(name))
    }

    pub fn date(&self, name: &str) -> Option<NaiveDate> {
        parse_date(self.raw(name))
    }

    pub fn clock(&self, name: &str) -> Option<NaiveTime> {
        parse_clock(self.raw(name))
    }

    pub fn timestamp(&self, name: &str) -> Option<DateTime<Utc>> {
        parse_timestamp(self.raw(name))
    }
}

pub fn parse_bool(raw: &str) -> bool {
    matches!(
        raw.trim().to_lowercase().as_str(),
        "1" | "true" | "t" | "yes" | "y"
    )
}

pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").ok()
}

pub fn parse_clock(raw: &str) -> Option<NaiveTime> {
    let raw = raw.trim();
    ["%H:%M:%S%.f", "%H:%M:%S", "%H:%M"]
        .iter()
        .find_map(|fmt| NaiveTime::parse_from_str(raw, fmt).ok())
}

/// RFC 3339, or a zone-less timestamp read as UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    [
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S",
    ]
    .iter()
    .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
    .map(|naive| naive.and_utc())
}

/// Open `path` and index its header.
pub fn open(path: &Path) -> Result<(csv::Reader<File>, HeaderIndex), CsvError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::Headers)
        .from_path(path)?;

    let header = reader.headers()?.clone();
    if header.iter().all(|h| h.trim().is_empty()) {
        return Err(CsvError::MissingHeader(path.to_path_buf()));
    }
    Ok((reader, HeaderIndex::new(&header)))
}

/// Read every record of `path` through `map`. Rows the reader cannot decode,
/// or that `map` rejects, are counted as skipped.
pub fn read_rows<T, F>(path: &Path, mut map: F) -> Result<Parsed<T>, CsvError>
where
    F: FnMut(&Row<'_>) -> Option<T>,
{
    let (mut reader, index) = open(path)?;
    let mut parsed = Parsed {
        rows: Vec::new(),
        skipped: 0,
    };

    for (line, result) in reader.records().enumerate() {
        let record = match result {
            Ok(record) => record,
            Err(e) => {
                tracing::warn!(path = %path.display(), line = line + 2, error = %e, "skipping unreadable csv row");
                parsed.skipped += 1;
                continue;
            }
        };
        match map(&index.row(&record)) {
            Some(row) => parsed.rows.push(row),
            None => parsed.skipped += 1,
        }
    }

    Ok(parsed)
}

/// Run blocking csv work off the async runtime.
pub async fn run_blocking<T, F>(path: PathBuf, parse: F) -> Result<T, CsvError>
where
    T: Send + 'static,
    F: FnOnce(&Path) -> Result<T, CsvError> + Send + 'static,
{
    tokio::task::spawn_blocking(move || parse(&path))
        .await
        .map_err(|e| CsvError::Io(std::io::Error::other(e)))?
}

/// `*.csv` files directly under `dir`, in lexical order. A missing
/// directory yields nothing.
pub fn list_csv_files(dir: &Path) -> Result<Vec<PathBuf>, CsvError> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    let mut files = Vec::new();
    for entry in entries {
        let path = entry?.path();
        let is_csv = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"));
        if path.is_file() && is_csv {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}
