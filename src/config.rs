use std::path::PathBuf;

use crate::error::{Error, Result};

/// Productivity constant relating tracked hours to planned mass:
/// `planned_mass_tons = hours / hours_per_ton`. Historical exports used
/// several values; 3.0 is the canonical default.
pub const DEFAULT_HOURS_PER_TON: f64 = 3.0;

/// Explicit configuration for the reporting core. Constructed by the
/// caller (the CLI, a test) and passed down; there is no process-wide
/// configuration state.
#[derive(Debug, Clone)]
pub struct ReportConfig {
    /// Path to the SQLite database file. `None` selects the default
    /// location under the user's home directory.
    pub db_path: Option<PathBuf>,
    /// Hours of tracked work that correspond to one ton of planned mass.
    pub hours_per_ton: f64,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            db_path: None,
            hours_per_ton: DEFAULT_HOURS_PER_TON,
        }
    }
}

impl ReportConfig {
    pub fn new(db_path: Option<PathBuf>, hours_per_ton: Option<f64>) -> Result<Self> {
        let hours_per_ton = hours_per_ton.unwrap_or(DEFAULT_HOURS_PER_TON);
        if !hours_per_ton.is_finite() || hours_per_ton <= 0.0 {
            return Err(Error::Config(format!(
                "hours_per_ton must be positive, got {hours_per_ton}"
            )));
        }
        Ok(Self {
            db_path,
            hours_per_ton,
        })
    }

    /// Resolve the database path, falling back to
    /// `~/.progressdw/progressdw.db` and creating the directory.
    pub fn resolve_db_path(&self) -> Result<PathBuf> {
        if let Some(ref path) = self.db_path {
            return Ok(path.clone());
        }
        let dir = dirs::home_dir()
            .ok_or_else(|| Error::Config("cannot determine home directory".into()))?
            .join(".progressdw");
        std::fs::create_dir_all(&dir).map_err(|e| Error::Config(e.to_string()))?;
        Ok(dir.join("progressdw.db"))
    }
}
