use std::path::Path;

use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use thiserror::Error;

use crate::convert::RateTable;
use crate::store::{self, StoreError};

/// Display settings kept outside the main store: the base currency every
/// aggregate is converted into, and the user-maintained rate table. Loaded
/// and saved by the caller and passed into the read side explicitly.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub base_currency_id: Option<String>,
    #[serde(default)]
    pub rates: RateTable,
}

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to read settings file: {0}")]
    Io(#[from] std::io::Error),
    #[error("settings file is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),
}

impl Settings {
    /// Load from `path`; an absent file is not an error, just defaults.
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    pub fn save(&self, path: &Path) -> Result<(), SettingsError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let raw = serde_json::to_string_pretty(self)?;
        std::fs::write(path, raw)?;
        Ok(())
    }
}

/// The currency aggregates convert into: the configured one when set,
/// otherwise the first active currency, otherwise none.
pub async fn default_base_currency(
    pool: &SqlitePool,
    settings: &Settings,
) -> Result<Option<String>, StoreError> {
    if let Some(id) = &settings.base_currency_id {
        return Ok(Some(id.clone()));
    }
    Ok(store::list_active_currencies(pool)
        .await?
        .first()
        .map(|c| c.id.clone()))
}
