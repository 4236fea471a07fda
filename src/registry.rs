// Server registry
//
// Registered RCON targets are kept in a JSON array. Key names match the
// files the original VIP tool wrote (`Id`, `Ip`, `Port`, `Password`), so an
// existing `servers.json` loads unchanged.

use crate::error::{Result, SyncError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::debug;

/// One RCON endpoint. Read-only to the sync core.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerTarget {
    #[serde(rename = "Id")]
    pub id: String,
    #[serde(rename = "Ip")]
    pub address: String,
    #[serde(rename = "Port")]
    pub port: u16,
    #[serde(rename = "Password")]
    pub password: String,
}

impl ServerTarget {
    /// Create a target with a freshly generated id.
    pub fn new(address: impl Into<String>, port: u16, password: impl Into<String>) -> Self {
        let address = address.into();
        let id = generate_id(&address, port);
        Self {
            id,
            address,
            port,
            password: password.into(),
        }
    }
}

impl fmt::Display for ServerTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.address, self.port)
    }
}

impl fmt::Debug for ServerTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerTarget")
            .field("id", &self.id)
            .field("address", &self.address)
            .field("port", &self.port)
            .field("password", &"***")
            .finish()
    }
}

/// 32 hex chars derived from the endpoint and the current time.
fn generate_id(address: &str, port: u16) -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default();

    let mut hasher = blake3::Hasher::new();
    hasher.update(address.as_bytes());
    hasher.update(&port.to_be_bytes());
    hasher.update(&nanos.to_be_bytes());
    hasher.update(&std::process::id().to_be_bytes());
    hex::encode(&hasher.finalize().as_bytes()[..16])
}

/// Where the list of servers comes from.
pub trait ServerRegistry {
    fn load_targets(&self) -> Result<Vec<ServerTarget>>;
    fn save_targets(&self, targets: &[ServerTarget]) -> Result<()>;
}

/// JSON-file backed registry.
#[derive(Debug, Clone)]
pub struct JsonServerRegistry {
    path: PathBuf,
}

impl JsonServerRegistry {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append a target and persist.
    pub fn add(&self, target: ServerTarget) -> Result<ServerTarget> {
        let mut targets = self.load_targets()?;
        targets.push(target.clone());
        self.save_targets(&targets)?;
        Ok(target)
    }

    /// Remove the target with `id` and persist. Unknown ids leave the file
    /// untouched.
    pub fn remove(&self, id: &str) -> Result<ServerTarget> {
        let mut targets = self.load_targets()?;
        let index = targets
            .iter()
            .position(|t| t.id == id)
            .ok_or_else(|| SyncError::Registry(format!("ID doesn't match any server: {}", id)))?;
        let removed = targets.remove(index);
        self.save_targets(&targets)?;
        Ok(removed)
    }

    fn error(&self, msg: impl fmt::Display) -> SyncError {
        SyncError::Registry(format!("{}: {}", self.path.display(), msg))
    }
}

impl ServerRegistry for JsonServerRegistry {
    /// Missing file means no servers yet.
    fn load_targets(&self) -> Result<Vec<ServerTarget>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let content = fs::read_to_string(&self.path).map_err(|e| self.error(e))?;
        if content.trim().is_empty() {
            return Ok(Vec::new());
        }
        let targets: Vec<ServerTarget> =
            serde_json::from_str(&content).map_err(|e| self.error(e))?;
        debug!(file = %self.path.display(), count = targets.len(), "loaded servers");
        Ok(targets)
    }

    /// Atomic write: temp file then rename.
    fn save_targets(&self, targets: &[ServerTarget]) -> Result<()> {
        let json = serde_json::to_string_pretty(targets).map_err(|e| self.error(e))?;
        let temp_file = self.path.with_extension("tmp");
        fs::write(&temp_file, json).map_err(|e| self.error(e))?;
        fs::rename(&temp_file, &self.path).map_err(|e| self.error(e))?;
        Ok(())
    }
}
