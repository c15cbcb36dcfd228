use crate::core::{PlateError, PlateResult};
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

pub const LEDGER_HEADER: [&str; 2] = ["Date", "License Plate"];
const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlateRecord {
    pub timestamp: DateTime<Local>,
    pub text: String,
}

impl PlateRecord {
    pub fn now(text: impl Into<String>) -> Self {
        Self {
            timestamp: Local::now(),
            text: text.into(),
        }
    }

    pub fn date_string(&self) -> String {
        self.timestamp.format(DATE_FORMAT).to_string()
    }
}

/// One persisted ledger row, exactly as stored.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LedgerRow {
    #[serde(rename = "Date")]
    pub date: String,
    #[serde(rename = "License Plate")]
    pub plate: String,
}

/// Durable CSV log of recognized plates. Every append is written and synced
/// before it returns.
pub struct LedgerFile {
    path: PathBuf,
    file: File,
    /// A previous write failed and may have left a partial row behind
    needs_repair: bool,
}

impl LedgerFile {
    pub fn open(path: impl AsRef<Path>) -> PlateResult<Self> {
        let path = path.as_ref().to_path_buf();

        let existing_len = match std::fs::metadata(&path) {
            Ok(meta) => meta.len(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => 0,
            Err(e) => return Err(PlateError::persistence(&path, e)),
        };

        if existing_len > 0 {
            Self::check_header(&path)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&path)
            .map_err(|e| PlateError::persistence(&path, e))?;

        let mut ledger = Self {
            path,
            file,
            needs_repair: existing_len > 0,
        };

        if existing_len == 0 {
            ledger.write_row(LEDGER_HEADER)?;
            log::info!("Created plate ledger at {}", ledger.path.display());
        } else {
            ledger.repair_tail()?;
            log::info!("Appending to existing plate ledger at {}", ledger.path.display());
        }

        Ok(ledger)
    }

    fn check_header(path: &Path) -> PlateResult<()> {
        let mut reader = csv::Reader::from_path(path)
            .map_err(|e| PlateError::persistence(path, e))?;
        let headers = reader.headers()
            .map_err(|e| PlateError::persistence(path, e))?;
        if headers.iter().ne(LEDGER_HEADER.iter().copied()) {
            return Err(PlateError::persistence(
                path,
                format!("unexpected header {:?}", headers),
            ));
        }
        Ok(())
    }

    /// Terminates a trailing partial line so the next row starts cleanly.
    fn repair_tail(&mut self) -> PlateResult<()> {
        let result = (|| -> std::io::Result<()> {
            self.file.seek(SeekFrom::End(-1))?;
            let mut last = [0u8; 1];
            self.file.read_exact(&mut last)?;
            if last[0] != b'\n' {
                self.file.write_all(b"\n")?;
            }
            Ok(())
        })();
        result.map_err(|e| PlateError::persistence(&self.path, e))?;
        self.needs_repair = false;
        Ok(())
    }

    /// Encodes the row completely before touching the file, so a failed
    /// write never leaves buffered bytes for the next append.
    fn write_row(&mut self, fields: [&str; 2]) -> PlateResult<()> {
        let mut encoder = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(Vec::new());
        encoder.write_record(fields)
            .map_err(|e| PlateError::persistence(&self.path, e))?;
        let row = encoder.into_inner()
            .map_err(|e| PlateError::persistence(&self.path, e.error()))?;

        let written = self.file.write_all(&row).and_then(|()| self.file.sync_data());
        if let Err(e) = written {
            self.needs_repair = true;
            return Err(PlateError::persistence(&self.path, e));
        }
        Ok(())
    }

    pub fn append(&mut self, record: &PlateRecord) -> PlateResult<()> {
        if self.needs_repair {
            self.repair_tail()?;
        }
        let date = record.date_string();
        self.write_row([date.as_str(), record.text.as_str()])
    }

    /// Re-reads every row persisted so far, header excluded.
    pub fn rows(&self) -> PlateResult<Vec<LedgerRow>> {
        read_rows(&self.path)
    }

    /// Sends later writes to `file` instead of the ledger path.
    #[cfg(test)]
    pub(crate) fn replace_file(&mut self, file: File) {
        self.file = file;
    }
}

pub fn read_rows(path: &Path) -> PlateResult<Vec<LedgerRow>> {
    let mut reader = csv::Reader::from_path(path)
        .map_err(|e| PlateError::persistence(path, e))?;
    reader.deserialize()
        .map(|row| row.map_err(|e| PlateError::persistence(path, e)))
        .collect()
}

/// Session history of recognized plates backed by the durable ledger file.
pub struct HistoryLedger {
    records: Vec<PlateRecord>,
    file: LedgerFile,
}

impl HistoryLedger {
    pub fn open(path: impl AsRef<Path>) -> PlateResult<Self> {
        let file = LedgerFile::open(path)?;
        match file.rows() {
            Ok(rows) => log::info!("Plate ledger holds {} earlier record(s)", rows.len()),
            Err(e) => log::warn!("Could not read earlier ledger rows: {}", e),
        }
        Ok(Self {
            records: Vec::new(),
            file,
        })
    }

    /// Appends to the session history, then to the ledger file. The session
    /// entry is kept even when the durable write fails.
    pub fn record(&mut self, record: PlateRecord) -> PlateResult<()> {
        self.records.push(record);
        let last = &self.records[self.records.len() - 1];
        self.file.append(last)
    }

    pub fn history(&self) -> &[PlateRecord] {
        &self.records
    }

    #[cfg(test)]
    pub(crate) fn file(&self) -> &LedgerFile {
        &self.file
    }

    #[cfg(test)]
    pub(crate) fn file_mut(&mut self) -> &mut LedgerFile {
        &mut self.file
    }
}
