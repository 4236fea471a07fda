// VIP record store
//
// The desired VIP list lives in a small CSV file: a header row, then one
// `identifier,name` record each. Quoted names may span lines. Files written
// by older tooling put the name column first, so columns are located by
// header rather than position.

use crate::error::{Result, SyncError};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// One privileged player.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VipEntry {
    /// Platform account id; the natural key.
    pub identifier: String,
    /// Free text, may contain quotes.
    pub display_name: String,
}

impl VipEntry {
    pub fn new(identifier: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            display_name: display_name.into(),
        }
    }
}

/// Source and sink of the desired VIP set.
pub trait VipRecordStore {
    fn load_desired(&self) -> Result<Vec<VipEntry>>;
    fn save_desired(&self, entries: &[VipEntry]) -> Result<()>;
}

/// CSV-file backed record store.
#[derive(Debug, Clone)]
pub struct CsvVipStore {
    path: PathBuf,
}

impl CsvVipStore {
    pub const ID_COLUMN: &'static str = "SteamId";
    pub const NAME_COLUMN: &'static str = "Name";

    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    fn parse<R: Read>(&self, input: R) -> Result<Vec<VipEntry>> {
        let mut reader = csv::ReaderBuilder::new().flexible(true).from_reader(input);

        let header = reader
            .headers()
            .map_err(|e| self.error(format!("header: {}", e)))?
            .clone();
        if header.is_empty() {
            return Ok(Vec::new());
        }
        let column = |name: &str| {
            header
                .iter()
                .map(|h| h.trim_start_matches('\u{feff}').trim())
                .position(|h| h.eq_ignore_ascii_case(name))
                .ok_or_else(|| self.error(format!("missing `{}` column", name)))
        };
        let id_col = column(Self::ID_COLUMN)?;
        let name_col = column(Self::NAME_COLUMN)?;

        let mut entries = Vec::new();
        for record in reader.records() {
            let record = record.map_err(|e| self.error(e.to_string()))?;

            let identifier = record.get(id_col).map(str::trim).unwrap_or_default();
            if identifier.is_empty() {
                let line = record.position().map(|p| p.line()).unwrap_or_default();
                warn!(file = %self.path.display(), line, "skipping record without identifier");
                continue;
            }
            let name = record.get(name_col).unwrap_or_default();
            entries.push(VipEntry::new(identifier, name));
        }

        Ok(entries)
    }

    fn error(&self, msg: String) -> SyncError {
        SyncError::Records(format!("{}: {}", self.path.display(), msg))
    }
}

impl VipRecordStore for CsvVipStore {
    fn load_desired(&self) -> Result<Vec<VipEntry>> {
        if !self.path.exists() {
            return Err(self.error("not found".to_string()));
        }
        let file = fs::File::open(&self.path).map_err(|e| self.error(e.to_string()))?;
        let entries = self.parse(file)?;
        debug!(file = %self.path.display(), count = entries.len(), "loaded VIP records");
        Ok(entries)
    }

    /// Replace the file contents (atomic write).
    fn save_desired(&self, entries: &[VipEntry]) -> Result<()> {
        let temp_file = self.path.with_extension("tmp");

        let write = || -> std::result::Result<(), csv::Error> {
            // Header written by hand so an empty list still gets one.
            let mut writer = csv::WriterBuilder::new()
                .has_headers(false)
                .terminator(csv::Terminator::Any(b'\n'))
                .from_path(&temp_file)?;
            writer.write_record([Self::ID_COLUMN, Self::NAME_COLUMN])?;
            for entry in entries {
                writer.serialize(CsvRecord {
                    identifier: &entry.identifier,
                    display_name: &entry.display_name,
                })?;
            }
            let file = writer.into_inner().map_err(|e| e.into_error())?;
            file.sync_all()?;
            fs::rename(&temp_file, &self.path)?;
            Ok(())
        };
        write().map_err(|e| self.error(e.to_string()))?;

        debug!(file = %self.path.display(), count = entries.len(), "saved VIP records");
        Ok(())
    }
}

/// On-disk row layout, identifier first.
#[derive(Serialize)]
struct CsvRecord<'a> {
    identifier: &'a str,
    display_name: &'a str,
}
